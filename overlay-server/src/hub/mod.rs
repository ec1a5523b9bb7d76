//! Connection registry and broadcast hub
//!
//! The hub owns every live display connection. Stores hand it finished
//! [`OverlayEvent`]s after releasing their own locks; the hub encodes each
//! event once and offers the frame to every connection.
//!
//! Delivery is best-effort and never buffered beyond a connection's own
//! bounded outbound channel: a connection that cannot take a frame right now
//! is closed and evicted, not retried. A missed event is superseded by the
//! next state broadcast (or by a rehydrate).

pub mod session;

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use overlay_common::{Error, OverlayEvent};
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, warn};

pub use session::{run_session, KeepaliveConfig};

/// Encoded wire frame shared by all connections for one broadcast
pub type Frame = Arc<str>;

/// Process-unique connection identity
pub type ConnectionId = u64;

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Hub-side handle to one display client
///
/// Writing means enqueuing onto the connection's bounded outbound channel;
/// the transport task drains it onto the socket. Dropping the handle closes
/// the channel, which tells the transport task to close the socket.
#[derive(Debug)]
pub struct Connection {
    id: ConnectionId,
    tx: mpsc::Sender<Frame>,
}

impl Connection {
    /// Create a connection and the receiver its transport task drains
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<Frame>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let id = NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed);
        (Self { id, tx }, rx)
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Offer one frame without waiting
    fn try_write(&self, frame: &Frame) -> overlay_common::Result<()> {
        self.tx
            .try_send(Arc::clone(frame))
            .map_err(|e| Error::Transport(format!("connection {}: {}", self.id, e)))
    }
}

impl PartialEq for Connection {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Connection {}

/// Connection registry with fan-out broadcast
pub struct Hub {
    connections: Mutex<HashMap<ConnectionId, Connection>>,
}

impl Hub {
    pub fn new() -> Self {
        Self {
            connections: Mutex::new(HashMap::new()),
        }
    }

    /// Add a connection; returns the new total
    pub async fn register(&self, conn: Connection) -> usize {
        let mut connections = self.connections.lock().await;
        connections.insert(conn.id, conn);
        connections.len()
    }

    /// Remove a connection (idempotent); returns the remaining total
    pub async fn unregister(&self, id: ConnectionId) -> usize {
        let mut connections = self.connections.lock().await;
        connections.remove(&id);
        connections.len()
    }

    /// Deliver an event to every registered connection
    ///
    /// Returns the number of connections that accepted the frame. Any
    /// connection whose write fails is dropped (closing it) before moving on.
    pub async fn broadcast(&self, event: &OverlayEvent) -> usize {
        let frame: Frame = match event.encode() {
            Ok(json) => Arc::from(json),
            Err(e) => {
                warn!("Failed to encode {} event: {}", event.event_type(), e);
                return 0;
            }
        };

        let mut connections = self.connections.lock().await;
        let mut delivered = 0;
        connections.retain(|_, conn| match conn.try_write(&frame) {
            Ok(()) => {
                delivered += 1;
                true
            }
            Err(e) => {
                warn!("Evicting display client: {}", e);
                false
            }
        });
        let remaining = connections.len();
        drop(connections);

        debug!(
            "Broadcast {} to {} client(s) ({} registered)",
            event.event_type(),
            delivered,
            remaining
        );
        delivered
    }

    /// Current registry size
    pub async fn clients_count(&self) -> usize {
        self.connections.lock().await.len()
    }
}

impl Default for Hub {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event() -> OverlayEvent {
        OverlayEvent::RequestRemove { id: 1 }
    }

    #[tokio::test]
    async fn test_register_returns_total() {
        let hub = Hub::new();
        let (a, _rx_a) = Connection::channel(4);
        let (b, _rx_b) = Connection::channel(4);

        assert_eq!(hub.register(a).await, 1);
        assert_eq!(hub.register(b).await, 2);
        assert_eq!(hub.clients_count().await, 2);
    }

    #[tokio::test]
    async fn test_unregister_is_idempotent() {
        let hub = Hub::new();
        let (a, _rx) = Connection::channel(4);
        let id = a.id();
        hub.register(a).await;

        assert_eq!(hub.unregister(id).await, 0);
        assert_eq!(hub.unregister(id).await, 0);
    }

    #[tokio::test]
    async fn test_broadcast_encodes_once_for_all() {
        let hub = Hub::new();
        let (a, mut rx_a) = Connection::channel(4);
        let (b, mut rx_b) = Connection::channel(4);
        hub.register(a).await;
        hub.register(b).await;

        assert_eq!(hub.broadcast(&event()).await, 2);

        let fa = rx_a.try_recv().unwrap();
        let fb = rx_b.try_recv().unwrap();
        assert!(Arc::ptr_eq(&fa, &fb));
        assert_eq!(&*fa, r#"{"type":"REQUEST_REMOVE","data":{"id":1}}"#);
    }

    #[tokio::test]
    async fn test_broadcast_evicts_closed_connection() {
        let hub = Hub::new();
        let (alive, mut rx_alive) = Connection::channel(4);
        let (dead, rx_dead) = Connection::channel(4);
        hub.register(alive).await;
        hub.register(dead).await;
        drop(rx_dead);

        assert_eq!(hub.broadcast(&event()).await, 1);
        assert_eq!(hub.clients_count().await, 1);

        // Later broadcasts only see the survivor
        assert_eq!(hub.broadcast(&event()).await, 1);
        assert!(rx_alive.try_recv().is_ok());
        assert!(rx_alive.try_recv().is_ok());
        assert!(rx_alive.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_broadcast_evicts_full_connection() {
        let hub = Hub::new();
        let (slow, mut rx_slow) = Connection::channel(1);
        hub.register(slow).await;

        assert_eq!(hub.broadcast(&event()).await, 1);
        // Outbound buffer is full; the client is dropped, not queued for
        assert_eq!(hub.broadcast(&event()).await, 0);
        assert_eq!(hub.clients_count().await, 0);

        // The first frame is still readable, then the channel reports closed
        assert!(rx_slow.try_recv().is_ok());
        assert!(rx_slow.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_broadcast_with_no_clients() {
        let hub = Hub::new();
        assert_eq!(hub.broadcast(&event()).await, 0);
    }

    #[test]
    fn test_connection_identity() {
        let (a, _rx_a) = Connection::channel(1);
        let (b, _rx_b) = Connection::channel(1);
        assert_ne!(a, b);
        assert_ne!(a.id(), b.id());
    }
}
