use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use crate::alerts::connection::{ConnectionClosed, ConnectionHandle, ConnectionId};
use crate::logging::LogContext;

/// Outcome of sending one payload to many connections
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    pub delivered: usize,
    pub pruned: usize,
}

/// All currently known subscriber connections
pub struct ConnectionRegistry {
    connections: Mutex<HashMap<ConnectionId, ConnectionHandle>>,
    next_id: AtomicU64,
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            connections: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<ConnectionId, ConnectionHandle>> {
        // every mutation is a single map call, so a poisoned map is still consistent
        self.connections.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Track a new connection and return its id
    pub fn insert(&self, handle: ConnectionHandle) -> ConnectionId {
        let id = ConnectionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.lock().insert(id, handle);

        LogContext::new("connection_registry", "insert")
            .with_connection(id)
            .debug("Connection registered");
        id
    }

    pub fn remove(&self, id: ConnectionId) -> bool {
        self.lock().remove(&id).is_some()
    }

    pub fn contains(&self, id: ConnectionId) -> bool {
        self.lock().contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Send to one connection. Unknown or closed connections report
    /// `ConnectionClosed`; closed ones are dropped from the registry.
    pub fn send_to(&self, id: ConnectionId, payload: &str) -> Result<(), ConnectionClosed> {
        let mut connections = self.lock();
        let handle = connections.get(&id).ok_or(ConnectionClosed)?;

        match handle.send(payload) {
            Ok(()) => Ok(()),
            Err(closed) => {
                connections.remove(&id);
                LogContext::new("connection_registry", "prune")
                    .with_connection(id)
                    .debug("Pruned closed connection");
                Err(closed)
            }
        }
    }

    /// Send to every open connection, pruning the closed ones
    pub fn broadcast(&self, payload: &str) -> BroadcastReport {
        let mut connections = self.lock();
        let mut report = BroadcastReport::default();

        connections.retain(|id, handle| match handle.send(payload) {
            Ok(()) => {
                report.delivered += 1;
                true
            }
            Err(ConnectionClosed) => {
                report.pruned += 1;
                LogContext::new("connection_registry", "prune")
                    .with_connection(*id)
                    .debug("Pruned closed connection");
                false
            }
        });

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_assigns_unique_ids() {
        let registry = ConnectionRegistry::new();
        let (a, _ra) = ConnectionHandle::channel();
        let (b, _rb) = ConnectionHandle::channel();

        let id_a = registry.insert(a);
        let id_b = registry.insert(b);

        assert_ne!(id_a, id_b);
        assert_eq!(registry.len(), 2);
        assert!(registry.contains(id_a));
    }

    #[test]
    fn test_broadcast_prunes_closed_connection() {
        let registry = ConnectionRegistry::new();
        let mut receivers = Vec::new();
        let mut ids = Vec::new();
        for _ in 0..5 {
            let (handle, receiver) = ConnectionHandle::channel();
            ids.push(registry.insert(handle));
            receivers.push(Some(receiver));
        }

        receivers[2] = None;

        let report = registry.broadcast("price");
        assert_eq!(report, BroadcastReport { delivered: 4, pruned: 1 });
        assert_eq!(registry.len(), 4);
        assert!(!registry.contains(ids[2]));

        for receiver in receivers.iter_mut().flatten() {
            assert_eq!(receiver.try_recv().unwrap(), "price");
        }
    }

    #[test]
    fn test_send_to_unknown_and_closed() {
        let registry = ConnectionRegistry::new();
        assert_eq!(registry.send_to(ConnectionId(99), "x"), Err(ConnectionClosed));

        let (handle, receiver) = ConnectionHandle::channel();
        let id = registry.insert(handle);
        drop(receiver);

        assert_eq!(registry.send_to(id, "x"), Err(ConnectionClosed));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_remove() {
        let registry = ConnectionRegistry::new();
        let (handle, _receiver) = ConnectionHandle::channel();
        let id = registry.insert(handle);

        assert!(registry.remove(id));
        assert!(!registry.remove(id));
    }
}
