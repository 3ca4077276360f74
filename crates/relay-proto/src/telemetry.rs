use serde::{Deserialize, Serialize};

/// Derived flight-mode label for PX4 custom-mode codes.
///
/// Codes absent from the table map to `Unknown`; the mapping is part of the
/// wire contract, not an internal detail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FlightMode {
    Manual,
    Hold,
    Loiter,
    Auto,
    Rtl,
    Land,
    Takeoff,
    #[default]
    Unknown,
}

impl FlightMode {
    pub fn from_custom_mode(code: u32) -> Self {
        match code {
            0 => FlightMode::Manual,
            4 => FlightMode::Hold,
            5 => FlightMode::Loiter,
            10 => FlightMode::Auto,
            12 => FlightMode::Rtl,
            14 => FlightMode::Land,
            15 => FlightMode::Takeoff,
            _ => FlightMode::Unknown,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Heartbeat {
    #[serde(rename = "type")]
    pub vehicle_type: u8,
    pub autopilot: u8,
    pub base_mode: u8,
    pub custom_mode: u32,
    pub system_status: u8,
    pub flight_mode: FlightMode,
    pub mavlink_version: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub latitude: f64,
    pub longitude: f64,
    /// AMSL altitude in meters.
    pub altitude: f64,
    /// Altitude above home in meters. Set independently of `altitude`.
    pub relative_altitude: f64,
    pub heading: f64,
    pub ground_speed: f64,
    pub velocity_x: f64,
    pub velocity_y: f64,
    pub velocity_z: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Attitude {
    pub roll: f64,
    pub pitch: f64,
    pub yaw: f64,
    pub rollspeed: f64,
    pub pitchspeed: f64,
    pub yawspeed: f64,
}

/// Battery readings. A raw value of 0 V and "no reading" are
/// indistinguishable on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Battery {
    pub remaining: u8,
    pub voltage: f64,
    pub current: f64,
    pub power_consumed: f64,
}

/// VFR_HUD view of flight state. Overlaps `Position` (ground speed,
/// heading, altitude) but comes from a different source category and is
/// never reconciled against it.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct FlightStatus {
    pub airspeed: f32,
    pub ground_speed: f32,
    pub heading: i32,
    pub throttle: u16,
    pub altitude: f32,
    pub climb_rate: f32,
}

/// Consolidated vehicle state. Each sub-record is replaced wholesale when
/// its source category arrives and retains its last value otherwise.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TelemetrySnapshot {
    pub connected: bool,
    pub heartbeat: Heartbeat,
    pub position: Position,
    pub attitude: Attitude,
    pub battery: Battery,
    pub status: FlightStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum NetworkType {
    #[serde(rename = "WiFi")]
    #[default]
    Wifi,
    #[serde(rename = "4G/LTE")]
    Lte,
    #[serde(rename = "5G")]
    FiveG,
    #[serde(rename = "Ethernet")]
    Ethernet,
}

impl NetworkType {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "WiFi" => Some(NetworkType::Wifi),
            "4G/LTE" => Some(NetworkType::Lte),
            "5G" => Some(NetworkType::FiveG),
            "Ethernet" => Some(NetworkType::Ethernet),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            NetworkType::Wifi => "WiFi",
            NetworkType::Lte => "4G/LTE",
            NetworkType::FiveG => "5G",
            NetworkType::Ethernet => "Ethernet",
        }
    }
}

impl std::fmt::Display for NetworkType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Externally-maintained network conditions, merged into outbound frames
/// only. Never stored alongside the vehicle state.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NetworkInfo {
    #[serde(rename = "type")]
    pub network_type: NetworkType,
    pub latency_ms: u64,
    pub bandwidth_mbps: u64,
    pub connected: bool,
}

impl Default for NetworkInfo {
    fn default() -> Self {
        Self {
            network_type: NetworkType::Wifi,
            latency_ms: 50,
            bandwidth_mbps: 100,
            connected: true,
        }
    }
}
