/// Relink Error Types
///
/// Every failure the runtime can observe, plus the `Fault` record that carries
/// one of them through the internal and public error queues.

use crate::endpoint::Endpoint;
use crate::transport::ConnectionId;
use bytes::Bytes;
use std::io;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Failure to establish a connection.
#[derive(Error, Debug)]
pub enum ConnectError {
    /// The TCP connect (or name resolution) failed
    #[error("Connect to {endpoint} failed: {source}")]
    Io {
        endpoint: Endpoint,
        #[source]
        source: io::Error,
    },

    /// The connect did not complete in time
    #[error("Connect to {endpoint} timed out after {after:?}")]
    TimedOut { endpoint: Endpoint, after: Duration },
}

/// Asynchronous send/receive failure on an established connection.
#[derive(Error, Debug)]
pub enum TransportError {
    /// IO error on the socket
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// The peer closed the connection (EOF)
    #[error("Peer closed the connection")]
    PeerClosed,

    /// The connection was closed locally before the operation completed
    #[error("Connection closed")]
    Closed,

    /// A pipeline stage rejected the data
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),
}

/// Pipeline stage failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// A line exceeded the configured maximum length
    #[error("Line too long: {len} bytes (max: {max})")]
    LineTooLong { len: usize, max: usize },

    /// Malformed input
    #[error("Invalid frame: {0}")]
    Invalid(String),
}

/// Main error type for client operations.
#[derive(Error, Debug)]
pub enum ClientError {
    /// Establishing a connection failed
    #[error(transparent)]
    Connect(#[from] ConnectError),

    /// A live connection failed
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The reconnect budget is exhausted; the client has been torn down
    #[error("Retry limit {limit} exceeded after {attempts} attempts: {cause}")]
    RetryLimitExceeded {
        limit: u32,
        attempts: u32,
        #[source]
        cause: Arc<ClientError>,
    },

    /// The client is closed
    #[error("Client closed")]
    Closed,
}

/// Result type alias for client operations
pub type Result<T> = std::result::Result<T, ClientError>;

impl ClientError {
    /// The fault that started the chain, looking through `RetryLimitExceeded`.
    #[must_use]
    pub fn root_cause(&self) -> &ClientError {
        match self {
            Self::RetryLimitExceeded { cause, .. } => cause.root_cause(),
            other => other,
        }
    }

    /// Check if reconnecting may clear this error
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        match self {
            Self::Connect(_) | Self::Transport(_) => true,
            Self::RetryLimitExceeded { .. } | Self::Closed => false,
        }
    }

    /// Check if this is the terminal retry-budget classification
    #[must_use]
    pub const fn is_retry_limit(&self) -> bool {
        matches!(self, Self::RetryLimitExceeded { .. })
    }
}

/// A fault and the context it was raised in.
///
/// `connection` identifies the connection that failed; `failed_write` holds the
/// payload whose send failed, so that it can be redelivered after recovery.
#[derive(Debug, Clone)]
pub struct Fault {
    pub error: Arc<ClientError>,
    pub connection: ConnectionId,
    pub failed_write: Option<Bytes>,
}

impl Fault {
    /// Fault raised by a connection, with no write attached.
    pub fn new(error: impl Into<ClientError>, connection: ConnectionId) -> Self {
        Self {
            error: Arc::new(error.into()),
            connection,
            failed_write: None,
        }
    }

    /// Fault raised by a send whose payload should be redelivered.
    pub fn failed_write(
        error: impl Into<ClientError>,
        connection: ConnectionId,
        payload: Bytes,
    ) -> Self {
        Self {
            error: Arc::new(error.into()),
            connection,
            failed_write: Some(payload),
        }
    }

    /// Wrap this fault as the terminal retry-budget failure.
    #[must_use]
    pub fn exhausted(self, limit: u32, attempts: u32) -> Self {
        Self {
            error: Arc::new(ClientError::RetryLimitExceeded {
                limit,
                attempts,
                cause: self.error,
            }),
            connection: self.connection,
            failed_write: self.failed_write,
        }
    }
}
