//! Single writable owner of the consolidated vehicle state.

use std::sync::RwLock;

use relay_proto::telemetry::{
    Attitude, Battery, FlightStatus, Heartbeat, Position, TelemetrySnapshot,
};

/// One decoded message becomes exactly one of these; applying it replaces
/// the named sub-record wholesale and touches nothing else.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TelemetryUpdate {
    Connected(bool),
    Heartbeat(Heartbeat),
    Position(Position),
    Attitude(Attitude),
    Battery(Battery),
    Status(FlightStatus),
}

pub struct TelemetryStore {
    inner: RwLock<TelemetrySnapshot>,
}

impl TelemetryStore {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(TelemetrySnapshot::default()),
        }
    }

    pub fn apply(&self, update: TelemetryUpdate) {
        let mut state = self.inner.write().unwrap();
        match update {
            TelemetryUpdate::Connected(v) => state.connected = v,
            TelemetryUpdate::Heartbeat(v) => state.heartbeat = v,
            TelemetryUpdate::Position(v) => state.position = v,
            TelemetryUpdate::Attitude(v) => state.attitude = v,
            TelemetryUpdate::Battery(v) => state.battery = v,
            TelemetryUpdate::Status(v) => state.status = v,
        }
    }

    /// Point-in-time copy of the full state; never observes a sub-record
    /// mid-replacement.
    pub fn snapshot(&self) -> TelemetrySnapshot {
        self.inner.read().unwrap().clone()
    }
}

impl Default for TelemetryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_proto::telemetry::FlightMode;

    #[test]
    fn last_update_per_category_wins() {
        let store = TelemetryStore::new();
        store.apply(TelemetryUpdate::Position(Position {
            latitude: 1.0,
            ..Default::default()
        }));
        store.apply(TelemetryUpdate::Position(Position {
            latitude: 2.0,
            ..Default::default()
        }));
        assert_eq!(store.snapshot().position.latitude, 2.0);
    }

    #[test]
    fn updates_do_not_leak_across_categories() {
        let store = TelemetryStore::new();
        let hb = Heartbeat {
            custom_mode: 12,
            flight_mode: FlightMode::Rtl,
            ..Default::default()
        };
        store.apply(TelemetryUpdate::Heartbeat(hb));
        store.apply(TelemetryUpdate::Battery(Battery {
            remaining: 55,
            ..Default::default()
        }));
        store.apply(TelemetryUpdate::Connected(true));

        let snap = store.snapshot();
        assert_eq!(snap.heartbeat, hb);
        assert_eq!(snap.battery.remaining, 55);
        assert!(snap.connected);
        // untouched sub-records keep their defaults
        assert_eq!(snap.position, Position::default());
        assert_eq!(snap.attitude, Attitude::default());
    }

    #[test]
    fn snapshot_is_idempotent() {
        let store = TelemetryStore::new();
        store.apply(TelemetryUpdate::Status(FlightStatus {
            airspeed: 18.0,
            ..Default::default()
        }));
        assert_eq!(store.snapshot(), store.snapshot());
    }
}
