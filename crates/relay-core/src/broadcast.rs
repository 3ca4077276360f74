//! Broadcast loop: one snapshot per tick, serialized once, delivered to
//! every subscriber independently.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use relay_proto::wire::{ServerMessage, TelemetryFrame};

use crate::network::NetworkProfile;
use crate::registry::ClientRegistry;
use crate::store::TelemetryStore;

#[derive(Debug, Clone, Copy)]
pub struct BroadcastConfig {
    pub tick: Duration,
    /// When set, a positive profile latency inserts one pre-send delay per
    /// tick to emulate transport conditions. Global, not per client.
    pub shape_latency: bool,
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            tick: Duration::from_millis(100),
            shape_latency: false,
        }
    }
}

pub async fn run_broadcast(
    store: Arc<TelemetryStore>,
    registry: Arc<ClientRegistry>,
    network: Arc<NetworkProfile>,
    cfg: BroadcastConfig,
) {
    let mut interval = tokio::time::interval(cfg.tick);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        interval.tick().await;

        // empty registry still ticks so cadence stays deterministic
        if registry.is_empty() {
            continue;
        }

        let frame = ServerMessage::Telemetry {
            data: TelemetryFrame {
                telemetry: store.snapshot(),
                network: network.info(),
            },
            timestamp: unix_now(),
        };
        let payload = match serde_json::to_string(&frame) {
            Ok(p) => p,
            Err(e) => {
                warn!("snapshot serialization failed, skipping tick: {e}");
                continue;
            }
        };

        if cfg.shape_latency {
            let latency_ms = network.info().latency_ms;
            if latency_ms > 0 {
                tokio::time::sleep(Duration::from_millis(latency_ms)).await;
            }
        }

        let dropped = deliver(&registry, &payload);
        if dropped > 0 {
            debug!("dropped {dropped} unreachable client(s) during broadcast");
        }
    }
}

/// Sends the identical payload to every registered client. A failed send
/// unregisters exactly that client and never delays the rest. Returns how
/// many clients were dropped.
pub fn deliver(registry: &ClientRegistry, payload: &str) -> usize {
    let mut dropped = 0;
    for (id, tx) in registry.clients() {
        if tx.send(payload.to_owned()).is_err() {
            registry.unregister(id);
            dropped += 1;
        }
    }
    dropped
}

fn unix_now() -> f64 {
    time::OffsetDateTime::now_utc().unix_timestamp_nanos() as f64 / 1e9
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[test]
    fn one_failed_client_does_not_affect_the_rest() {
        let registry = ClientRegistry::new();

        let (tx_a, mut rx_a) = mpsc::unbounded_channel();
        let (tx_b, rx_b) = mpsc::unbounded_channel();
        let (tx_c, mut rx_c) = mpsc::unbounded_channel();
        registry.register(tx_a);
        let dead = registry.register(tx_b);
        registry.register(tx_c);
        drop(rx_b); // this subscriber's send will fail

        let dropped = deliver(&registry, r#"{"type":"telemetry"}"#);
        assert_eq!(dropped, 1);
        assert_eq!(registry.len(), 2);
        assert!(!registry.unregister(dead), "failed client already removed");

        // survivors got the same tick's payload
        assert_eq!(rx_a.try_recv().unwrap(), r#"{"type":"telemetry"}"#);
        assert_eq!(rx_c.try_recv().unwrap(), r#"{"type":"telemetry"}"#);
    }

    #[test]
    fn empty_registry_delivers_nothing() {
        let registry = ClientRegistry::new();
        assert_eq!(deliver(&registry, "payload"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn latency_shaping_delays_each_tick_once_globally() {
        use relay_proto::telemetry::NetworkType;

        let store = Arc::new(TelemetryStore::new());
        let registry = Arc::new(ClientRegistry::new());
        let network = Arc::new(NetworkProfile::new(NetworkType::Wifi));
        assert_eq!(network.info().latency_ms, 50);

        let (tx_a, mut rx_a) = mpsc::unbounded_channel();
        let (tx_b, mut rx_b) = mpsc::unbounded_channel();
        registry.register(tx_a);
        registry.register(tx_b);

        let start = tokio::time::Instant::now();
        let loop_task = tokio::spawn(run_broadcast(
            Arc::clone(&store),
            Arc::clone(&registry),
            Arc::clone(&network),
            BroadcastConfig {
                tick: Duration::from_millis(100),
                shape_latency: true,
            },
        ));

        // first tick fires immediately, then one pre-send delay of 50 ms
        let first_a = rx_a.recv().await.unwrap();
        assert_eq!(start.elapsed(), Duration::from_millis(50));

        // the other client sees the same tick with no additional delay
        let first_b = rx_b.recv().await.unwrap();
        assert_eq!(first_a, first_b);
        assert_eq!(start.elapsed(), Duration::from_millis(50));

        // second tick: 100 ms cadence plus one more shaping delay
        rx_a.recv().await.unwrap();
        assert_eq!(start.elapsed(), Duration::from_millis(150));

        loop_task.abort();
    }
}
