//! The aggregation and fan-out engine: state store, ingestion loop,
//! client registry, broadcast loop, network profile, command dispatcher.
//!
//! Everything here is shared through explicit `Arc` handles passed into
//! each task; there are no ambient globals.

pub mod broadcast;
pub mod command;
pub mod ingest;
pub mod network;
pub mod registry;
pub mod store;

use std::sync::{Arc, Mutex};

use relay_link::VehicleLink;
use relay_proto::telemetry::NetworkType;
use relay_proto::wire::FeatureSet;

use crate::command::CommandDispatcher;
use crate::network::NetworkProfile;
use crate::registry::ClientRegistry;
use crate::store::TelemetryStore;

/// The vehicle link is polled by ingestion and written by the dispatcher;
/// both hold the lock only for one non-blocking call at a time.
pub type SharedLink = Arc<Mutex<Box<dyn VehicleLink>>>;

/// Handle bundle passed to the transport layer and the background tasks.
pub struct Hub {
    pub store: Arc<TelemetryStore>,
    pub registry: Arc<ClientRegistry>,
    pub network: Arc<NetworkProfile>,
    pub dispatcher: CommandDispatcher,
    pub features: FeatureSet,
}

impl Hub {
    pub fn new(link: SharedLink, initial_network: NetworkType, features: FeatureSet) -> Self {
        Self {
            store: Arc::new(TelemetryStore::new()),
            registry: Arc::new(ClientRegistry::new()),
            network: Arc::new(NetworkProfile::new(initial_network)),
            dispatcher: CommandDispatcher::new(link),
            features,
        }
    }
}
