//! Set of currently connected display clients.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

/// One serialized snapshot. Shared by every recipient of a cycle.
pub type Frame = Arc<str>;

/// Frames a client may have queued before it counts as stalled.
pub const CLIENT_QUEUE_CAPACITY: usize = 8;

static NEXT_CLIENT_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClientId(u64);

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "client-{}", self.0)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SendError {
    /// The socket writer has exited.
    #[error("{0} is no longer accepting frames")]
    Closed(ClientId),

    /// The socket writer stopped draining; its queue is full.
    #[error("{0} has {1} undelivered frames")]
    Stalled(ClientId, usize),
}

impl SendError {
    pub fn client(&self) -> ClientId {
        match self {
            SendError::Closed(id) | SendError::Stalled(id, _) => *id,
        }
    }
}

/// Send half of one connection. Cloning shares the same identity.
#[derive(Debug, Clone)]
pub struct ClientHandle {
    id: ClientId,
    tx: mpsc::Sender<Frame>,
    connected_at: DateTime<Utc>,
}

impl ClientHandle {
    pub fn new(tx: mpsc::Sender<Frame>) -> Self {
        Self {
            id: ClientId(NEXT_CLIENT_ID.fetch_add(1, Ordering::Relaxed)),
            tx,
            connected_at: Utc::now(),
        }
    }

    /// A handle plus the receiver its socket writer drains.
    pub fn channel() -> (Self, mpsc::Receiver<Frame>) {
        let (tx, rx) = mpsc::channel(CLIENT_QUEUE_CAPACITY);
        (Self::new(tx), rx)
    }

    pub fn id(&self) -> ClientId {
        self.id
    }

    pub fn connected_at(&self) -> DateTime<Utc> {
        self.connected_at
    }

    /// Queue a frame without waiting. A client that is gone or no longer
    /// draining its queue is reported, never waited on.
    pub fn send(&self, frame: Frame) -> Result<(), SendError> {
        self.tx.try_send(frame).map_err(|e| match e {
            TrySendError::Full(_) => SendError::Stalled(self.id, self.tx.max_capacity()),
            TrySendError::Closed(_) => SendError::Closed(self.id),
        })
    }
}

#[derive(Debug, Default)]
pub struct ClientRegistry {
    clients: HashMap<ClientId, ClientHandle>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` when this was the first client (0 → 1).
    pub fn add(&mut self, handle: ClientHandle) -> bool {
        let was_empty = self.clients.is_empty();
        self.clients.insert(handle.id, handle);
        was_empty
    }

    /// Returns `true` when this removal emptied the registry (1 → 0).
    /// Removing an unknown client is a no-op.
    pub fn remove(&mut self, id: ClientId) -> bool {
        self.clients.remove(&id).is_some() && self.clients.is_empty()
    }

    pub fn contains(&self, id: ClientId) -> bool {
        self.clients.contains_key(&id)
    }

    pub fn get(&self, id: ClientId) -> Option<&ClientHandle> {
        self.clients.get(&id)
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    /// Point-in-time copy of the membership for one fan-out.
    pub fn members(&self) -> Vec<ClientHandle> {
        self.clients.values().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_reports_first_client() {
        let mut registry = ClientRegistry::new();
        let (a, _rx_a) = ClientHandle::channel();
        let (b, _rx_b) = ClientHandle::channel();

        assert!(registry.add(a));
        assert!(!registry.add(b));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_remove_reports_last_client() {
        let mut registry = ClientRegistry::new();
        let (a, _rx_a) = ClientHandle::channel();
        let (b, _rx_b) = ClientHandle::channel();
        let (a_id, b_id) = (a.id(), b.id());
        registry.add(a);
        registry.add(b);

        assert!(!registry.remove(a_id));
        assert!(!registry.remove(a_id), "second removal is a no-op");
        assert!(registry.remove(b_id));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_members_is_detached_copy() {
        let mut registry = ClientRegistry::new();
        let (a, _rx_a) = ClientHandle::channel();
        let a_id = a.id();
        registry.add(a);

        let members = registry.members();
        registry.remove(a_id);

        assert_eq!(members.len(), 1);
        assert_eq!(members[0].id(), a_id);
    }

    #[test]
    fn test_send_fails_once_receiver_dropped() {
        let (handle, rx) = ClientHandle::channel();
        drop(rx);
        let err = handle.send(Frame::from("{}")).unwrap_err();
        assert_eq!(err, SendError::Closed(handle.id()));
    }

    #[test]
    fn test_send_fails_once_queue_is_full() {
        let (handle, mut rx) = ClientHandle::channel();
        for _ in 0..CLIENT_QUEUE_CAPACITY {
            handle.send(Frame::from("{}")).unwrap();
        }

        let err = handle.send(Frame::from("{}")).unwrap_err();
        assert_eq!(err, SendError::Stalled(handle.id(), CLIENT_QUEUE_CAPACITY));
        assert_eq!(err.client(), handle.id());

        // Draining one frame makes room again
        rx.try_recv().unwrap();
        assert!(handle.send(Frame::from("{}")).is_ok());
    }

    #[test]
    fn test_get_returns_registered_handle() {
        let mut registry = ClientRegistry::new();
        let (a, _rx_a) = ClientHandle::channel();
        let (a_id, connected_at) = (a.id(), a.connected_at());
        registry.add(a);

        assert_eq!(registry.get(a_id).map(ClientHandle::connected_at), Some(connected_at));
        registry.remove(a_id);
        assert!(registry.get(a_id).is_none());
    }

    #[test]
    fn test_client_ids_are_unique() {
        let (a, _rx_a) = ClientHandle::channel();
        let (b, _rx_b) = ClientHandle::channel();
        assert_ne!(a.id(), b.id());
        assert_eq!(a.clone().id(), a.id());
    }
}
