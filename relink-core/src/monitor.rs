//! Client lifecycle monitoring.
//!
//! Provides an event stream for tracking connection lifecycle: connects,
//! failures, reconnects and teardown.

use crate::endpoint::Endpoint;
use crate::transport::ConnectionId;
use std::fmt;

/// Client lifecycle events.
#[derive(Debug, Clone)]
pub enum ClientEvent {
    /// Initial connection established.
    Connected {
        endpoint: Endpoint,
        connection: ConnectionId,
    },

    /// A live connection failed and is being replaced.
    Disconnected {
        endpoint: Endpoint,
        connection: ConnectionId,
        reason: String,
    },

    /// A reconnect attempt failed.
    ConnectFailed {
        endpoint: Endpoint,
        attempt: u32,
        reason: String,
    },

    /// A replacement connection is live.
    Reconnected {
        endpoint: Endpoint,
        connection: ConnectionId,
        count: u32,
    },

    /// The client has been torn down.
    Closed { endpoint: Endpoint },
}

impl fmt::Display for ClientEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connected {
                endpoint,
                connection,
            } => write!(f, "Connected to {endpoint} ({connection})"),
            Self::Disconnected {
                endpoint,
                connection,
                reason,
            } => write!(f, "Disconnected from {endpoint} ({connection}): {reason}"),
            Self::ConnectFailed {
                endpoint,
                attempt,
                reason,
            } => write!(f, "Connect attempt {attempt} to {endpoint} failed: {reason}"),
            Self::Reconnected {
                endpoint,
                connection,
                count,
            } => write!(f, "Reconnected to {endpoint} ({connection}), rebuild #{count}"),
            Self::Closed { endpoint } => write!(f, "Closed client for {endpoint}"),
        }
    }
}

/// Handle for receiving client events.
pub type ClientMonitor = flume::Receiver<ClientEvent>;

/// Sender half, stored in the client options.
pub type ClientEventSender = flume::Sender<ClientEvent>;

/// Creates a new monitoring channel pair.
#[must_use]
pub fn create_monitor() -> (ClientEventSender, ClientMonitor) {
    flume::unbounded()
}

/// Emit `event` if a monitor is installed. A dropped monitor is ignored.
pub fn emit(sender: Option<&ClientEventSender>, event: ClientEvent) {
    if let Some(sender) = sender {
        let _ = sender.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_event_display() {
        let event = ClientEvent::Connected {
            endpoint: Endpoint::new("127.0.0.1", 5555),
            connection: ConnectionId::from_raw(1),
        };
        assert_eq!(event.to_string(), "Connected to tcp://127.0.0.1:5555 (conn-1)");
    }

    #[test]
    fn test_monitor_channel() {
        let (sender, receiver) = create_monitor();
        emit(
            Some(&sender),
            ClientEvent::Closed {
                endpoint: Endpoint::new("localhost", 1),
            },
        );
        emit(None, ClientEvent::Closed {
            endpoint: Endpoint::new("localhost", 1),
        });

        let event = receiver.recv().unwrap();
        assert!(matches!(event, ClientEvent::Closed { .. }));
        assert!(receiver.try_recv().is_err());
    }
}
