//! In-crate doubles for exercising the background tasks directly.

use crate::client::{Client, Shared};
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use relink_core::codec::Pipeline;
use relink_core::endpoint::Endpoint;
use relink_core::error::{ConnectError, TransportError};
use relink_core::options::ClientOptions;
use relink_core::transport::{Connection, ConnectionId, Inbound, SendCompletion, Transport};
use std::cell::Cell;
use std::io;
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Accepts every send and remembers the payload.
#[derive(Debug)]
pub(crate) struct RecordingConnection {
    id: ConnectionId,
    sent: Mutex<Vec<Bytes>>,
    closed: AtomicBool,
}

impl RecordingConnection {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            id: ConnectionId::next(),
            sent: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
        })
    }

    pub(crate) fn sent(&self) -> Vec<Bytes> {
        self.sent.lock().clone()
    }
}

impl Connection for RecordingConnection {
    fn id(&self) -> ConnectionId {
        self.id
    }

    fn send(&self, payload: Bytes) -> Result<SendCompletion, TransportError> {
        if self.is_closed() {
            return Err(TransportError::Closed);
        }
        self.sent.lock().push(payload);
        Ok(SendCompletion::ready(Ok(())))
    }

    fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

/// Refuses every connect and counts the attempts.
#[derive(Clone, Default)]
pub(crate) struct RefusingTransport {
    attempts: Rc<Cell<usize>>,
}

impl RefusingTransport {
    pub(crate) fn attempts(&self) -> usize {
        self.attempts.get()
    }
}

#[async_trait(?Send)]
impl Transport for RefusingTransport {
    async fn connect(
        &self,
        endpoint: &Endpoint,
        _pipeline: Pipeline,
        _inbound: Rc<dyn Inbound>,
    ) -> Result<Arc<dyn Connection>, ConnectError> {
        self.attempts.set(self.attempts.get() + 1);
        Err(ConnectError::Io {
            endpoint: endpoint.clone(),
            source: io::Error::from(io::ErrorKind::ConnectionRefused),
        })
    }
}

/// A client bound to `conn` with no background tasks running.
pub(crate) fn client(conn: Arc<RecordingConnection>, options: ClientOptions) -> Client {
    let shared = Shared::new(Endpoint::new("127.0.0.1", 1), options);
    Client::new(conn, Arc::new(shared))
}
