use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use relay_core::broadcast::{self, BroadcastConfig};
use relay_core::store::TelemetryUpdate;
use relay_core::{ingest, network, Hub, SharedLink};
use relay_link::mav::MavlinkLink;
use relay_link::mock::MockLink;
use relay_link::{LinkConfig, OfflineLink, VehicleLink};
use relay_proto::telemetry::NetworkType;
use relay_proto::wire::FeatureSet;

#[derive(Debug, Parser)]
#[command(name = "relay", version, about = "AeroRelay - telemetry aggregation & broadcast server")]
struct Cli {
    #[arg(long)]
    config: String,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Validate the configuration and exit.
    Doctor,
    /// Run the relay server.
    Run,
}

#[derive(Debug, serde::Deserialize)]
struct Config {
    server: ServerCfg,
    link: LinkConfig,
    network: Option<NetworkCfg>,
}

#[derive(Debug, serde::Deserialize)]
struct ServerCfg {
    host: String,
    port: u16,
    /// Broadcast tick period; 100 ms (10 Hz) when unset.
    tick_ms: Option<u64>,
    /// Delay each tick by the profile latency to emulate the transport.
    shape_latency: Option<bool>,
}

#[derive(Debug, serde::Deserialize)]
struct NetworkCfg {
    simulate: bool,
    /// "WiFi", "4G/LTE", "5G" or "Ethernet".
    initial: Option<String>,
}

fn load_config(path: &str) -> Result<Config> {
    let s = std::fs::read_to_string(path).context("read config")?;
    Ok(toml::from_str(&s).context("parse config toml")?)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let cfg = load_config(&cli.config)?;

    match cli.cmd {
        Command::Doctor => doctor(&cfg),
        Command::Run => run(&cfg).await,
    }
}

fn doctor(cfg: &Config) -> Result<()> {
    info!("doctor: starting");

    listen_addr(cfg)?;
    anyhow::ensure!(
        cfg.server.tick_ms.unwrap_or(100) > 0,
        "server.tick_ms must be positive"
    );

    match cfg.link.mode.as_str() {
        "mock" => {}
        "mavlink" => anyhow::ensure!(
            cfg.link.url.as_ref().map(|u| !u.is_empty()).unwrap_or(false),
            "link.url missing (mode=mavlink)"
        ),
        other => anyhow::bail!("unknown link.mode: {other}"),
    }

    if let Some(net) = &cfg.network {
        if let Some(initial) = &net.initial {
            anyhow::ensure!(
                NetworkType::parse(initial).is_some(),
                "unknown network.initial: {initial}"
            );
        }
    }

    info!("doctor: OK");
    Ok(())
}

/// Backoff between attempts to bring a down vehicle link up.
const LINK_RETRY_BACKOFF: Duration = Duration::from_secs(1);

async fn run(cfg: &Config) -> Result<()> {
    info!("run: starting");

    let (link, connected) = open_link(&cfg.link)?;

    let simulate = cfg.network.as_ref().map(|n| n.simulate).unwrap_or(false);
    let initial_network = cfg
        .network
        .as_ref()
        .and_then(|n| n.initial.as_deref())
        .and_then(NetworkType::parse)
        .unwrap_or_default();
    let features = FeatureSet {
        mavlink: cfg.link.mode == "mavlink",
        zerotier_vpn: false,
        network_simulation: simulate,
        video_streaming: false,
    };

    let hub = Arc::new(Hub::new(Arc::clone(&link), initial_network, features));

    // connectivity is an adapter-lifecycle fact, not a message
    hub.store.apply(TelemetryUpdate::Connected(connected));
    if !connected {
        // only the mavlink path can start down, and doctor/open_link
        // already guaranteed it has a url
        if let Some(url) = cfg.link.url.clone() {
            tokio::spawn(run_link_retry(
                cfg.link.clone(),
                url,
                Arc::clone(&link),
                Arc::clone(&hub.store),
            ));
        }
    }

    tokio::spawn(ingest::run_ingest(link, Arc::clone(&hub.store)));
    tokio::spawn(broadcast::run_broadcast(
        Arc::clone(&hub.store),
        Arc::clone(&hub.registry),
        Arc::clone(&hub.network),
        BroadcastConfig {
            tick: Duration::from_millis(cfg.server.tick_ms.unwrap_or(100)),
            shape_latency: cfg.server.shape_latency.unwrap_or(false),
        },
    ));
    if simulate {
        tokio::spawn(network::run_simulator(Arc::clone(&hub.network)));
    }

    let addr = listen_addr(cfg)?;
    tokio::select! {
        res = relay_ws::serve(addr, hub) => res,
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown requested");
            Ok(())
        }
    }
}

fn listen_addr(cfg: &Config) -> Result<SocketAddr> {
    format!("{}:{}", cfg.server.host, cfg.server.port)
        .parse()
        .context("server.host/server.port do not form a listen address")
}

/// Opens the configured link. A mavlink connect failure is transient, not
/// fatal: the server starts with a down link serving `connected: false`
/// and the retry task brings it up later.
fn open_link(cfg: &LinkConfig) -> Result<(SharedLink, bool)> {
    match cfg.mode.as_str() {
        "mock" => {
            info!("using synthetic vehicle link");
            Ok((share(Box::new(MockLink::new())), true))
        }
        "mavlink" => {
            let url = cfg.url.as_ref().context("link.url missing (mode=mavlink)")?;
            match connect_mavlink(cfg, url) {
                Ok(link) => Ok((share(Box::new(link)), true)),
                Err(e) => {
                    warn!("vehicle link connect failed, serving disconnected and retrying: {e:#}");
                    Ok((share(Box::new(OfflineLink)), false))
                }
            }
        }
        other => anyhow::bail!("unknown link.mode: {other}"),
    }
}

fn connect_mavlink(cfg: &LinkConfig, url: &str) -> Result<MavlinkLink> {
    MavlinkLink::connect(
        url,
        cfg.system_id.unwrap_or(255),
        cfg.component_id.unwrap_or(190),
        cfg.target_system.unwrap_or(1),
        cfg.target_component.unwrap_or(1),
    )
}

fn share(link: Box<dyn VehicleLink>) -> SharedLink {
    Arc::new(Mutex::new(link))
}

/// Retries the vehicle link until it comes up, then swaps it in behind the
/// shared handle and flips the connectivity flag. Clients keep receiving
/// `connected: false` telemetry in the meantime.
async fn run_link_retry(
    cfg: LinkConfig,
    url: String,
    link: SharedLink,
    store: Arc<relay_core::store::TelemetryStore>,
) {
    loop {
        tokio::time::sleep(LINK_RETRY_BACKOFF).await;
        match connect_mavlink(&cfg, &url) {
            Ok(new_link) => {
                *link.lock().unwrap() = Box::new(new_link);
                store.apply(TelemetryUpdate::Connected(true));
                info!("vehicle link established");
                return;
            }
            Err(e) => warn!("vehicle link connect retry failed: {e:#}"),
        }
    }
}
