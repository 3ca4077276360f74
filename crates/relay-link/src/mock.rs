//! Synthetic vehicle link for bench use: flies a slow circle around a base
//! coordinate and drains the battery, emitting the same raw-unit messages
//! the live link would so every conversion downstream is exercised.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use tracing::info;

use crate::{
    LinkError, LinkMessage, RawAttitude, RawGlobalPosition, RawHeartbeat, RawSysStatus,
    RawVfrHud, VehicleCommand, VehicleLink,
};

const BASE_LAT: f64 = 47.3769;
const BASE_LON: f64 = 8.5417;
const ORBIT_RADIUS_DEG: f64 = 0.001; // roughly a 100 m circle

pub struct MockLink {
    counter: u64,
    period: Duration,
    last_batch: Option<Instant>,
    queue: VecDeque<LinkMessage>,
    sent: Vec<VehicleCommand>,
}

impl MockLink {
    pub fn new() -> Self {
        Self::with_period(Duration::from_millis(200))
    }

    pub fn with_period(period: Duration) -> Self {
        Self {
            counter: 0,
            period,
            last_batch: None,
            queue: VecDeque::new(),
            sent: Vec::new(),
        }
    }

    /// Commands accepted so far, for inspection in tests.
    pub fn sent_commands(&self) -> &[VehicleCommand] {
        &self.sent
    }

    fn batch_due(&self) -> bool {
        match self.last_batch {
            None => true,
            Some(t) => t.elapsed() >= self.period,
        }
    }

    fn generate_batch(&mut self) {
        let c = self.counter as f64;
        let angle = c * 0.05;
        let heading_deg = angle.to_degrees().rem_euclid(360.0);

        let lat = BASE_LAT + angle.cos() * ORBIT_RADIUS_DEG;
        let lon = BASE_LON + angle.sin() * ORBIT_RADIUS_DEG;
        let alt_m = 100.0 + (c * 0.1).sin() * 20.0;
        let ground_speed = 8.0 + (c * 0.2).sin() * 4.0; // m/s
        let climb = (c * 0.1).cos() * 2.0;

        let heading_rad = heading_deg.to_radians();
        let vx_cm = (ground_speed * heading_rad.cos() * 100.0) as i16;
        let vy_cm = (ground_speed * heading_rad.sin() * 100.0) as i16;

        self.queue.push_back(LinkMessage::Heartbeat(RawHeartbeat {
            vehicle_type: 2,   // quadrotor
            autopilot: 12,     // PX4
            base_mode: 217,
            custom_mode: 10,   // AUTO
            system_status: 4,  // ACTIVE
            mavlink_version: 3,
        }));

        self.queue
            .push_back(LinkMessage::GlobalPosition(RawGlobalPosition {
                lat: (lat * 1e7) as i32,
                lon: (lon * 1e7) as i32,
                alt: (alt_m * 1000.0) as i32,
                // the mock flies relative to its launch point, so both
                // altitudes track together here; the live link sets them
                // independently
                relative_alt: (alt_m * 1000.0) as i32,
                hdg: (heading_deg * 100.0) as u16,
                vx: vx_cm,
                vy: vy_cm,
                vz: (-climb * 100.0) as i16,
            }));

        self.queue.push_back(LinkMessage::SystemStatus(RawSysStatus {
            voltage_battery: ((12.6 - c * 0.0001) * 1000.0) as u16,
            current_battery: 850,
            battery_remaining: (87.0 - c * 0.001).max(0.0) as i8,
        }));

        self.queue.push_back(LinkMessage::Attitude(RawAttitude {
            roll: (((c * 0.2).sin() * 5.0).to_radians()) as f32,
            pitch: (((c * 0.15).cos() * 3.0).to_radians()) as f32,
            yaw: heading_rad as f32,
            rollspeed: 0.0,
            pitchspeed: 0.0,
            yawspeed: 0.05,
        }));

        self.queue.push_back(LinkMessage::FlightStatus(RawVfrHud {
            airspeed: (ground_speed + 2.0) as f32,
            ground_speed: ground_speed as f32,
            heading: heading_deg as i16,
            throttle: 55,
            altitude: alt_m as f32,
            climb_rate: climb as f32,
        }));

        self.counter += 1;
        self.last_batch = Some(Instant::now());
    }
}

impl Default for MockLink {
    fn default() -> Self {
        Self::new()
    }
}

impl VehicleLink for MockLink {
    fn poll_message(&mut self) -> Result<Option<LinkMessage>, LinkError> {
        if self.queue.is_empty() && self.batch_due() {
            self.generate_batch();
        }
        Ok(self.queue.pop_front())
    }

    fn send_command(&mut self, cmd: &VehicleCommand) -> Result<(), LinkError> {
        info!("mock link accepted {}", cmd.name());
        self.sent.push(*cmd);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // one generated batch is exactly five messages
    fn drain_batch(link: &mut MockLink) -> Vec<LinkMessage> {
        (0..5)
            .map(|_| link.poll_message().unwrap().expect("batch message"))
            .collect()
    }

    #[test]
    fn first_poll_emits_a_full_batch() {
        let mut link = MockLink::new();
        let batch = drain_batch(&mut link);
        assert_eq!(batch.len(), 5);
        assert!(matches!(batch[0], LinkMessage::Heartbeat(_)));
        assert!(matches!(batch[1], LinkMessage::GlobalPosition(_)));
        // nothing more until the period elapses
        assert!(matches!(link.poll_message(), Ok(None)));
    }

    #[test]
    fn position_stays_near_base_coordinate() {
        let mut link = MockLink::with_period(Duration::from_millis(0));
        for _ in 0..50 {
            for msg in drain_batch(&mut link) {
                if let LinkMessage::GlobalPosition(p) = msg {
                    let lat = p.lat as f64 / 1e7;
                    let lon = p.lon as f64 / 1e7;
                    assert!((lat - BASE_LAT).abs() <= ORBIT_RADIUS_DEG + 1e-6);
                    assert!((lon - BASE_LON).abs() <= ORBIT_RADIUS_DEG + 1e-6);
                    assert!(p.hdg < 36000);
                }
            }
        }
    }

    #[test]
    fn battery_drains_monotonically() {
        let mut link = MockLink::with_period(Duration::from_millis(0));
        let mut last = i8::MAX;
        for _ in 0..20 {
            for msg in drain_batch(&mut link) {
                if let LinkMessage::SystemStatus(s) = msg {
                    assert!(s.battery_remaining <= last);
                    assert!(s.battery_remaining >= 0);
                    last = s.battery_remaining;
                }
            }
        }
    }

    #[test]
    fn commands_are_recorded() {
        let mut link = MockLink::new();
        link.send_command(&VehicleCommand::Land).unwrap();
        link.send_command(&VehicleCommand::Takeoff { altitude_m: 25.0 })
            .unwrap();
        assert_eq!(
            link.sent_commands(),
            &[
                VehicleCommand::Land,
                VehicleCommand::Takeoff { altitude_m: 25.0 }
            ]
        );
    }
}
