use std::fmt;
use tokio::sync::mpsc;

/// Opaque identifier of an accepted subscriber connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// The peer has gone away; the payload was not delivered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionClosed;

/// Sending side of a subscriber connection.
///
/// The transport drains the paired receiver into the socket. Once the
/// socket closes the receiver is dropped and every further `send` fails,
/// which is how closed connections are discovered at broadcast time.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    sender: mpsc::UnboundedSender<String>,
}

impl ConnectionHandle {
    pub fn new(sender: mpsc::UnboundedSender<String>) -> Self {
        Self { sender }
    }

    /// Create a handle together with the receiver the transport should drain
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<String>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self::new(sender), receiver)
    }

    pub fn is_open(&self) -> bool {
        !self.sender.is_closed()
    }

    pub fn send(&self, payload: &str) -> Result<(), ConnectionClosed> {
        self.sender.send(payload.to_string()).map_err(|_| ConnectionClosed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_send_to_open_connection() {
        let (handle, mut receiver) = ConnectionHandle::channel();
        assert!(handle.is_open());
        assert!(handle.send("hello").is_ok());
        assert_eq!(receiver.try_recv().unwrap(), "hello");
    }

    #[test]
    fn test_send_to_closed_connection() {
        let (handle, receiver) = ConnectionHandle::channel();
        drop(receiver);
        assert!(!handle.is_open());
        assert_eq!(handle.send("hello"), Err(ConnectionClosed));
    }

    #[test]
    fn test_connection_id_display() {
        assert_eq!(ConnectionId(7).to_string(), "conn-7");
    }
}
