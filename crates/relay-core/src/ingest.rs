//! Ingestion loop: drains the vehicle link, converts raw wire units into
//! snapshot sub-records, and applies exactly one store update per message.

use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use relay_link::{
    LinkMessage, RawAttitude, RawGlobalPosition, RawHeartbeat, RawSysStatus, RawVfrHud,
};
use relay_proto::telemetry::{
    Attitude, Battery, FlightMode, FlightStatus, Heartbeat, Position,
};

use crate::store::{TelemetryStore, TelemetryUpdate};
use crate::SharedLink;

/// Yield between polls when the link has nothing ready.
const IDLE_POLL: Duration = Duration::from_millis(10);
/// Back-off after a sustained adapter failure; the loop never terminates.
const ERROR_BACKOFF: Duration = Duration::from_secs(1);

pub async fn run_ingest(link: SharedLink, store: Arc<TelemetryStore>) {
    loop {
        let polled = link.lock().unwrap().poll_message();
        match polled {
            Ok(Some(msg)) => {
                if let Some(update) = convert(msg) {
                    store.apply(update);
                }
            }
            Ok(None) => tokio::time::sleep(IDLE_POLL).await,
            Err(e) => {
                warn!("vehicle link read failed: {e}");
                tokio::time::sleep(ERROR_BACKOFF).await;
            }
        }
    }
}

/// Raw category -> sub-record update. `Unhandled` maps to `None` so
/// unrecognized message kinds stay a silent no-op.
pub fn convert(msg: LinkMessage) -> Option<TelemetryUpdate> {
    match msg {
        LinkMessage::Heartbeat(raw) => Some(TelemetryUpdate::Heartbeat(convert_heartbeat(raw))),
        LinkMessage::GlobalPosition(raw) => {
            Some(TelemetryUpdate::Position(convert_position(raw)))
        }
        LinkMessage::FlightStatus(raw) => Some(TelemetryUpdate::Status(convert_status(raw))),
        LinkMessage::SystemStatus(raw) => Some(TelemetryUpdate::Battery(convert_battery(raw))),
        LinkMessage::Attitude(raw) => Some(TelemetryUpdate::Attitude(convert_attitude(raw))),
        LinkMessage::Unhandled => None,
    }
}

fn convert_heartbeat(raw: RawHeartbeat) -> Heartbeat {
    Heartbeat {
        vehicle_type: raw.vehicle_type,
        autopilot: raw.autopilot,
        base_mode: raw.base_mode,
        custom_mode: raw.custom_mode,
        system_status: raw.system_status,
        flight_mode: FlightMode::from_custom_mode(raw.custom_mode),
        mavlink_version: raw.mavlink_version,
    }
}

fn convert_position(raw: RawGlobalPosition) -> Position {
    let vx = raw.vx as f64 / 100.0;
    let vy = raw.vy as f64 / 100.0;
    Position {
        latitude: raw.lat as f64 / 1e7,
        longitude: raw.lon as f64 / 1e7,
        altitude: raw.alt as f64 / 1000.0,
        relative_altitude: raw.relative_alt as f64 / 1000.0,
        // raw 0 means "no heading", which is indistinguishable from due
        // north by the wire format
        heading: if raw.hdg != 0 {
            raw.hdg as f64 / 100.0
        } else {
            0.0
        },
        ground_speed: vx.hypot(vy),
        velocity_x: vx,
        velocity_y: vy,
        velocity_z: raw.vz as f64 / 100.0,
    }
}

fn convert_status(raw: RawVfrHud) -> FlightStatus {
    FlightStatus {
        airspeed: raw.airspeed,
        ground_speed: raw.ground_speed,
        heading: raw.heading as i32,
        throttle: raw.throttle,
        altitude: raw.altitude,
        climb_rate: raw.climb_rate,
    }
}

fn convert_battery(raw: RawSysStatus) -> Battery {
    Battery {
        remaining: if raw.battery_remaining < 0 {
            0
        } else {
            raw.battery_remaining as u8
        },
        voltage: if raw.voltage_battery != 0 {
            raw.voltage_battery as f64 / 1000.0
        } else {
            0.0
        },
        current: if raw.current_battery != -1 {
            raw.current_battery as f64 / 100.0
        } else {
            0.0
        },
        power_consumed: 0.0,
    }
}

fn convert_attitude(raw: RawAttitude) -> Attitude {
    Attitude {
        roll: (raw.roll as f64).to_degrees(),
        pitch: (raw.pitch as f64).to_degrees(),
        yaw: (raw.yaw as f64).to_degrees(),
        rollspeed: (raw.rollspeed as f64).to_degrees(),
        pitchspeed: (raw.pitchspeed as f64).to_degrees(),
        yawspeed: (raw.yawspeed as f64).to_degrees(),
    }
}
