//! Vehicle link boundary: the trait the engine polls and commands, the
//! closed set of message categories it recognizes, and the two link
//! implementations (live MAVLink, synthetic mock).

pub mod mav;
pub mod mock;

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LinkError {
    /// The adapter's read side is gone; callers back off and retry.
    #[error("vehicle link closed")]
    Closed,
    #[error("vehicle link i/o: {0}")]
    Io(#[from] std::io::Error),
    #[error("command send failed: {0}")]
    Send(String),
}

/// Raw HEARTBEAT fields as they arrive on the wire.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawHeartbeat {
    pub vehicle_type: u8,
    pub autopilot: u8,
    pub base_mode: u8,
    pub custom_mode: u32,
    pub system_status: u8,
    pub mavlink_version: u8,
}

/// Raw GLOBAL_POSITION_INT fields. lat/lon in degE7, altitudes in mm,
/// heading in centidegrees, velocities in cm/s.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawGlobalPosition {
    pub lat: i32,
    pub lon: i32,
    pub alt: i32,
    pub relative_alt: i32,
    pub hdg: u16,
    pub vx: i16,
    pub vy: i16,
    pub vz: i16,
}

/// Raw VFR_HUD fields (already in display units).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawVfrHud {
    pub airspeed: f32,
    pub ground_speed: f32,
    pub heading: i16,
    pub throttle: u16,
    pub altitude: f32,
    pub climb_rate: f32,
}

/// Raw SYS_STATUS battery fields. voltage in mV, current in cA,
/// remaining in percent with -1 meaning unknown.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawSysStatus {
    pub voltage_battery: u16,
    pub current_battery: i16,
    pub battery_remaining: i8,
}

/// Raw ATTITUDE fields, radians and rad/s.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawAttitude {
    pub roll: f32,
    pub pitch: f32,
    pub yaw: f32,
    pub rollspeed: f32,
    pub pitchspeed: f32,
    pub yawspeed: f32,
}

/// Closed set of categories the engine understands. Anything else on the
/// link collapses into `Unhandled`, which the ingestion loop drops without
/// logging so new message kinds stay forward compatible.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LinkMessage {
    Heartbeat(RawHeartbeat),
    GlobalPosition(RawGlobalPosition),
    FlightStatus(RawVfrHud),
    SystemStatus(RawSysStatus),
    Attitude(RawAttitude),
    Unhandled,
}

/// High-level commands subscribers may issue. Each maps to exactly one
/// fixed-parameter adapter call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum VehicleCommand {
    Takeoff { altitude_m: f32 },
    Land,
    ReturnToLaunch,
}

impl VehicleCommand {
    pub const DEFAULT_TAKEOFF_ALT_M: f32 = 10.0;

    /// Parses a command name plus its JSON params. `None` means the
    /// request never reaches the adapter.
    pub fn parse(name: &str, params: &serde_json::Value) -> Option<Self> {
        match name {
            "TAKEOFF" => {
                let altitude_m = match params.get("altitude") {
                    None => Self::DEFAULT_TAKEOFF_ALT_M,
                    Some(v) => v.as_f64()? as f32,
                };
                if !altitude_m.is_finite() || altitude_m <= 0.0 {
                    return None;
                }
                Some(VehicleCommand::Takeoff { altitude_m })
            }
            "LAND" => Some(VehicleCommand::Land),
            "RTL" | "RETURN_TO_LAUNCH" => Some(VehicleCommand::ReturnToLaunch),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            VehicleCommand::Takeoff { .. } => "TAKEOFF",
            VehicleCommand::Land => "LAND",
            VehicleCommand::ReturnToLaunch => "RTL",
        }
    }
}

/// Boundary the engine drives. `poll_message` must not block; `Ok(None)`
/// means nothing is ready and the caller should yield.
pub trait VehicleLink: Send {
    fn poll_message(&mut self) -> Result<Option<LinkMessage>, LinkError>;
    fn send_command(&mut self, cmd: &VehicleCommand) -> Result<(), LinkError>;
}

/// Stand-in while a real link is being (re)established. Every poll reports
/// the link closed, which keeps the ingestion loop on its long backoff;
/// commands fail without side effects.
pub struct OfflineLink;

impl VehicleLink for OfflineLink {
    fn poll_message(&mut self) -> Result<Option<LinkMessage>, LinkError> {
        Err(LinkError::Closed)
    }

    fn send_command(&mut self, _cmd: &VehicleCommand) -> Result<(), LinkError> {
        Err(LinkError::Send("vehicle link is down".into()))
    }
}

/// Link section of the daemon config.
#[derive(Debug, Clone, Deserialize)]
pub struct LinkConfig {
    /// "mavlink" or "mock".
    pub mode: String,

    /// Connection url for mavlink mode, e.g. "udpin:0.0.0.0:14550",
    /// "tcpout:host:port" or "serial:/dev/ttyUSB0:57600".
    pub url: Option<String>,

    /// MAVLink ids we use (GCS side).
    pub system_id: Option<u8>,
    pub component_id: Option<u8>,

    /// Target system/component (vehicle side). 1/1 is common.
    pub target_system: Option<u8>,
    pub target_component: Option<u8>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn recognized_commands_parse() {
        assert_eq!(
            VehicleCommand::parse("LAND", &serde_json::Value::Null),
            Some(VehicleCommand::Land)
        );
        assert_eq!(
            VehicleCommand::parse("RTL", &serde_json::Value::Null),
            Some(VehicleCommand::ReturnToLaunch)
        );
        assert_eq!(
            VehicleCommand::parse("RETURN_TO_LAUNCH", &serde_json::Value::Null),
            Some(VehicleCommand::ReturnToLaunch)
        );
        assert_eq!(
            VehicleCommand::parse("TAKEOFF", &serde_json::Value::Null),
            Some(VehicleCommand::Takeoff {
                altitude_m: VehicleCommand::DEFAULT_TAKEOFF_ALT_M
            })
        );
        assert_eq!(
            VehicleCommand::parse("TAKEOFF", &json!({ "altitude": 25.0 })),
            Some(VehicleCommand::Takeoff { altitude_m: 25.0 })
        );
    }

    #[test]
    fn offline_link_reports_closed_without_side_effects() {
        let mut link = OfflineLink;
        assert!(matches!(link.poll_message(), Err(LinkError::Closed)));
        assert!(link.send_command(&VehicleCommand::Land).is_err());
    }

    #[test]
    fn unknown_or_malformed_commands_fail_locally() {
        assert_eq!(VehicleCommand::parse("SELF_DESTRUCT", &serde_json::Value::Null), None);
        assert_eq!(VehicleCommand::parse("takeoff", &serde_json::Value::Null), None);
        assert_eq!(VehicleCommand::parse("TAKEOFF", &json!({ "altitude": "high" })), None);
        assert_eq!(VehicleCommand::parse("TAKEOFF", &json!({ "altitude": -3.0 })), None);
    }
}
