//! Live vehicle link over the `mavlink` crate.
//!
//! The mavlink connection's read side blocks, so a dedicated reader thread
//! drains it into a channel and `poll_message` only ever does a
//! `try_recv`. Sends go straight out on the shared connection.

use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use mavlink::common::{MavCmd, MavMessage, COMMAND_LONG_DATA};
use mavlink::{MavConnection, MavHeader};
use tracing::{info, warn};

use crate::{
    LinkError, LinkMessage, RawAttitude, RawGlobalPosition, RawHeartbeat, RawSysStatus,
    RawVfrHud, VehicleCommand, VehicleLink,
};

type SharedConn = Arc<Box<dyn MavConnection<MavMessage> + Sync + Send>>;

pub struct MavlinkLink {
    conn: SharedConn,
    rx: Receiver<LinkMessage>,
    hdr: MavHeader,
    target_system: u8,
    target_component: u8,
}

impl MavlinkLink {
    /// Opens the connection url (udpin/udpout/tcpout/serial forms) and
    /// starts the reader thread.
    pub fn connect(
        url: &str,
        system_id: u8,
        component_id: u8,
        target_system: u8,
        target_component: u8,
    ) -> Result<Self> {
        let conn: SharedConn = Arc::new(
            mavlink::connect::<MavMessage>(url)
                .with_context(|| format!("mavlink connect {url}"))?,
        );

        let (tx, rx) = mpsc::channel();
        let reader = Arc::clone(&conn);
        thread::Builder::new()
            .name("mavlink-reader".into())
            .spawn(move || loop {
                match reader.recv() {
                    Ok((_hdr, msg)) => {
                        if tx.send(classify(&msg)).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        warn!("mavlink recv failed: {e}");
                        thread::sleep(Duration::from_millis(100));
                    }
                }
            })
            .context("spawn mavlink reader")?;

        info!("mavlink link up on {url}");
        Ok(Self {
            conn,
            rx,
            hdr: MavHeader {
                system_id,
                component_id,
                sequence: 0,
            },
            target_system,
            target_component,
        })
    }

    fn command_long(&self, command: MavCmd, param7: f32) -> COMMAND_LONG_DATA {
        COMMAND_LONG_DATA {
            target_system: self.target_system,
            target_component: self.target_component,
            command: command.into(),
            confirmation: 0,
            param1: 0.0,
            param2: 0.0,
            param3: 0.0,
            param4: 0.0,
            param5: 0.0,
            param6: 0.0,
            param7,
        }
    }

    fn send(&mut self, msg: MavMessage) -> Result<(), LinkError> {
        self.hdr.sequence = self.hdr.sequence.wrapping_add(1);
        self.conn
            .send(&self.hdr, &msg)
            .map(|_| ())
            .map_err(|e| LinkError::Send(e.to_string()))
    }
}

impl VehicleLink for MavlinkLink {
    fn poll_message(&mut self) -> Result<Option<LinkMessage>, LinkError> {
        match self.rx.try_recv() {
            Ok(msg) => Ok(Some(msg)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(LinkError::Closed),
        }
    }

    fn send_command(&mut self, cmd: &VehicleCommand) -> Result<(), LinkError> {
        let data = match *cmd {
            VehicleCommand::Takeoff { altitude_m } => {
                self.command_long(MavCmd::MAV_CMD_NAV_TAKEOFF, altitude_m)
            }
            VehicleCommand::Land => self.command_long(MavCmd::MAV_CMD_NAV_LAND, 0.0),
            VehicleCommand::ReturnToLaunch => {
                self.command_long(MavCmd::MAV_CMD_NAV_RETURN_TO_LAUNCH, 0.0)
            }
        };
        info!("vehicle command {}", cmd.name());
        self.send(MavMessage::COMMAND_LONG(data))
    }
}

/// Maps the wire message onto the closed category set. Anything we do not
/// aggregate becomes `Unhandled`.
fn classify(msg: &MavMessage) -> LinkMessage {
    match msg {
        MavMessage::HEARTBEAT(hb) => LinkMessage::Heartbeat(RawHeartbeat {
            vehicle_type: hb.mavtype as u8,
            autopilot: hb.autopilot as u8,
            base_mode: hb.base_mode.bits(),
            custom_mode: hb.custom_mode,
            system_status: hb.system_status as u8,
            mavlink_version: hb.mavlink_version,
        }),
        MavMessage::GLOBAL_POSITION_INT(p) => LinkMessage::GlobalPosition(RawGlobalPosition {
            lat: p.lat,
            lon: p.lon,
            alt: p.alt,
            relative_alt: p.relative_alt,
            hdg: p.hdg,
            vx: p.vx,
            vy: p.vy,
            vz: p.vz,
        }),
        MavMessage::VFR_HUD(h) => LinkMessage::FlightStatus(RawVfrHud {
            airspeed: h.airspeed,
            ground_speed: h.groundspeed,
            heading: h.heading,
            throttle: h.throttle,
            altitude: h.alt,
            climb_rate: h.climb,
        }),
        MavMessage::SYS_STATUS(s) => LinkMessage::SystemStatus(RawSysStatus {
            voltage_battery: s.voltage_battery,
            current_battery: s.current_battery,
            battery_remaining: s.battery_remaining,
        }),
        MavMessage::ATTITUDE(a) => LinkMessage::Attitude(RawAttitude {
            roll: a.roll,
            pitch: a.pitch,
            yaw: a.yaw,
            rollspeed: a.rollspeed,
            pitchspeed: a.pitchspeed,
            yawspeed: a.yawspeed,
        }),
        _ => LinkMessage::Unhandled,
    }
}
