//! JSON envelope exchanged with subscribers. Every frame carries a `type`
//! tag; unknown inbound tags fail deserialization and are dropped by the
//! transport layer.

use serde::{Deserialize, Serialize};

use crate::telemetry::{NetworkInfo, TelemetrySnapshot};

/// Snapshot as broadcast: vehicle state plus the current network profile
/// merged in at send time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryFrame {
    #[serde(flatten)]
    pub telemetry: TelemetrySnapshot,
    pub network: NetworkInfo,
}

/// Capability flags advertised in `system_info`. Flags for surfaces this
/// server does not provide are still present, hard-wired false, so
/// frontends can key off them uniformly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureSet {
    pub mavlink: bool,
    pub zerotier_vpn: bool,
    pub network_simulation: bool,
    pub video_streaming: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    SystemInfo {
        features: FeatureSet,
        network: NetworkInfo,
    },
    Initial {
        data: TelemetrySnapshot,
    },
    Telemetry {
        data: TelemetryFrame,
        timestamp: f64,
    },
    CommandResponse {
        command: String,
        success: bool,
    },
    NetworkUpdate {
        network: NetworkInfo,
    },
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Command {
        command: String,
        #[serde(default)]
        params: serde_json::Value,
    },
    NetworkSwitch {
        network: String,
    },
}
