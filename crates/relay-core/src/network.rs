//! Externally-mutated network condition profile. The broadcast loop reads
//! it every tick; it never enters the telemetry store.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use rand::Rng;
use tracing::info;

use relay_proto::telemetry::{NetworkInfo, NetworkType};

const SIMULATION_PERIOD: Duration = Duration::from_secs(5);

pub struct NetworkProfile {
    inner: RwLock<NetworkInfo>,
}

impl NetworkProfile {
    pub fn new(network_type: NetworkType) -> Self {
        Self {
            inner: RwLock::new(NetworkInfo {
                network_type,
                ..Default::default()
            }),
        }
    }

    pub fn info(&self) -> NetworkInfo {
        *self.inner.read().unwrap()
    }

    pub fn switch(&self, network_type: NetworkType) {
        self.inner.write().unwrap().network_type = network_type;
        info!("switched to {network_type} network");
    }
}

/// Periodically jitters latency and bandwidth within per-type envelopes.
/// Ethernet is left untouched.
pub async fn run_simulator(profile: Arc<NetworkProfile>) {
    loop {
        {
            let mut rng = rand::thread_rng();
            let mut info = profile.inner.write().unwrap();
            match info.network_type {
                NetworkType::Lte => {
                    info.latency_ms = rng.gen_range(30..=100);
                    info.bandwidth_mbps = rng.gen_range(10..=50);
                }
                NetworkType::Wifi => {
                    info.latency_ms = rng.gen_range(10..=50);
                    info.bandwidth_mbps = rng.gen_range(50..=100);
                }
                NetworkType::FiveG => {
                    info.latency_ms = rng.gen_range(5..=20);
                    info.bandwidth_mbps = rng.gen_range(100..=200);
                }
                NetworkType::Ethernet => {}
            }
        }
        tokio::time::sleep(SIMULATION_PERIOD).await;
    }
}
