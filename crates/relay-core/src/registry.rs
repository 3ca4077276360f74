//! Live subscriber membership. Broadcasts iterate over a copied membership
//! list so connect/disconnect never stalls an in-flight fan-out, and the
//! map lock is held only for the map operation itself.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use tokio::sync::mpsc::UnboundedSender;
use tracing::info;

pub type ClientId = u64;

/// Outbound side of one subscriber: pre-serialized frames go through this
/// channel to the client's writer task.
pub type ClientSender = UnboundedSender<String>;

pub struct ClientRegistry {
    clients: Mutex<HashMap<ClientId, ClientSender>>,
    next_id: AtomicU64,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self {
            clients: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn register(&self, sender: ClientSender) -> ClientId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let total = {
            let mut clients = self.clients.lock().unwrap();
            clients.insert(id, sender);
            clients.len()
        };
        info!("client {id} connected, {total} total");
        id
    }

    pub fn unregister(&self, id: ClientId) -> bool {
        let removed = self.clients.lock().unwrap().remove(&id).is_some();
        if removed {
            info!("client {id} removed");
        }
        removed
    }

    /// Membership snapshot taken before iteration; safe against concurrent
    /// register/unregister.
    pub fn clients(&self) -> Vec<(ClientId, ClientSender)> {
        self.clients
            .lock()
            .unwrap()
            .iter()
            .map(|(id, tx)| (*id, tx.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.clients.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ClientRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[test]
    fn register_and_unregister_track_membership() {
        let registry = ClientRegistry::new();
        assert!(registry.is_empty());

        let (tx_a, _rx_a) = mpsc::unbounded_channel();
        let (tx_b, _rx_b) = mpsc::unbounded_channel();
        let a = registry.register(tx_a);
        let b = registry.register(tx_b);
        assert_ne!(a, b);
        assert_eq!(registry.len(), 2);

        assert!(registry.unregister(a));
        assert!(!registry.unregister(a));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn iteration_snapshot_survives_mutation() {
        let registry = ClientRegistry::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let id = registry.register(tx);

        let snapshot = registry.clients();
        registry.unregister(id);

        // the snapshot still carries the sender taken before removal
        assert_eq!(snapshot.len(), 1);
        snapshot[0].1.send("late frame".into()).unwrap();
        assert_eq!(rx.try_recv().unwrap(), "late frame");
        assert!(registry.is_empty());
    }
}
