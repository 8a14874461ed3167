//! Transport contract.
//!
//! The client runtime never touches sockets directly. It needs exactly four
//! things from a transport:
//!
//! - `connect` one outbound connection, installing the codec pipeline and the
//!   receive callback ([`Inbound`]) on it
//! - `send` a payload without blocking, observing the outcome later through a
//!   [`SendCompletion`]
//! - deliver received payloads and connection faults to the [`Inbound`] callback
//! - `close` the connection (idempotent)
//!
//! [`TcpTransport`](crate::tcp::TcpTransport) is the production implementation.

use crate::codec::Pipeline;
use crate::endpoint::Endpoint;
use crate::error::{ConnectError, TransportError};
use async_trait::async_trait;
use bytes::Bytes;
use flume::{Receiver, Sender};
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Global counter handing out connection identities
static CONNECTION_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of one physical connection.
///
/// A reconnect always yields a new id, which lets the fault monitor tell a
/// fault on the live connection from a late fault on a replaced one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Allocate the next id.
    pub fn next() -> Self {
        Self(CONNECTION_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    #[must_use]
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Outcome of a submitted send, resolved by the transport once the payload has
/// been written (or has failed to be).
#[derive(Debug)]
pub struct SendCompletion {
    rx: Receiver<Result<(), TransportError>>,
}

/// Transport-side half of a [`SendCompletion`].
#[derive(Debug)]
pub struct CompletionSender {
    tx: Sender<Result<(), TransportError>>,
}

impl SendCompletion {
    /// Create a pending completion and the sender that resolves it.
    #[must_use]
    pub fn pending() -> (CompletionSender, Self) {
        let (tx, rx) = flume::bounded(1);
        (CompletionSender { tx }, Self { rx })
    }

    /// A completion that is already resolved.
    #[must_use]
    pub fn ready(result: Result<(), TransportError>) -> Self {
        let (tx, completion) = Self::pending();
        tx.complete(result);
        completion
    }

    /// Wait for the outcome.
    ///
    /// A transport that drops the sender without resolving it reports
    /// [`TransportError::Closed`].
    pub async fn wait(self) -> Result<(), TransportError> {
        match self.rx.recv_async().await {
            Ok(result) => result,
            Err(_) => Err(TransportError::Closed),
        }
    }
}

impl CompletionSender {
    /// Resolve the completion. Nobody may be listening; that is fine.
    pub fn complete(self, result: Result<(), TransportError>) {
        let _ = self.tx.try_send(result);
    }
}

/// One live connection.
///
/// Handles are shared between the write pump, the fault monitor and the
/// caller, so every operation takes `&self`.
pub trait Connection: Send + Sync + fmt::Debug {
    /// Identity of this connection.
    fn id(&self) -> ConnectionId;

    /// Submit `payload` for sending without waiting for the write.
    ///
    /// An `Err` means the payload was not accepted at all (for example the
    /// connection is already closed).
    fn send(&self, payload: Bytes) -> Result<SendCompletion, TransportError>;

    /// Close the connection and release its resources. Idempotent.
    fn close(&self);

    /// Whether `close` has been called (or the transport closed it).
    fn is_closed(&self) -> bool;
}

/// Receive callback installed on a connection.
///
/// Invoked from the transport's reader; awaiting inside `on_payload` applies
/// backpressure to the reader.
#[async_trait(?Send)]
pub trait Inbound {
    /// A decoded payload arrived.
    async fn on_payload(&self, payload: Bytes);

    /// The connection failed. Called at most once per connection.
    async fn on_exception(&self, connection: Arc<dyn Connection>, error: TransportError);
}

/// Factory for connections to an endpoint.
#[async_trait(?Send)]
pub trait Transport: 'static {
    /// Establish one connection, install `pipeline` ahead of `inbound`, and
    /// start delivering received data.
    async fn connect(
        &self,
        endpoint: &Endpoint,
        pipeline: Pipeline,
        inbound: Rc<dyn Inbound>,
    ) -> Result<Arc<dyn Connection>, ConnectError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_ids_are_unique() {
        let a = ConnectionId::next();
        let b = ConnectionId::next();
        assert_ne!(a, b);
        assert!(b > a);
        assert_eq!(ConnectionId::from_raw(3).to_string(), "conn-3");
    }

    #[compio::test]
    async fn test_ready_completion() {
        assert!(SendCompletion::ready(Ok(())).wait().await.is_ok());
        let failed = SendCompletion::ready(Err(TransportError::PeerClosed));
        assert!(matches!(failed.wait().await, Err(TransportError::PeerClosed)));
    }

    #[compio::test]
    async fn test_dropped_sender_reports_closed() {
        let (tx, completion) = SendCompletion::pending();
        drop(tx);
        assert!(matches!(completion.wait().await, Err(TransportError::Closed)));
    }
}
