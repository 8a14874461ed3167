//! Scripted in-memory transport for driving the client runtime in tests.

#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use relink::{
    Connection, ConnectError, ConnectionId, Endpoint, Inbound, Pipeline, SendCompletion,
    Transport, TransportError,
};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::io;
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// How a mock connection treats `send`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendMode {
    /// Record the payload and complete successfully
    Accept,
    /// Record nothing; the completion resolves with `PeerClosed`
    FailAsync,
    /// Refuse synchronously with a codec error
    Reject,
}

pub struct MockConnection {
    id: ConnectionId,
    sent: Mutex<Vec<Bytes>>,
    mode: Mutex<SendMode>,
    closed: AtomicBool,
}

impl MockConnection {
    fn new() -> Self {
        Self {
            id: ConnectionId::next(),
            sent: Mutex::new(Vec::new()),
            mode: Mutex::new(SendMode::Accept),
            closed: AtomicBool::new(false),
        }
    }

    pub fn sent(&self) -> Vec<Bytes> {
        self.sent.lock().clone()
    }

    pub fn set_mode(&self, mode: SendMode) {
        *self.mode.lock() = mode;
    }
}

impl fmt::Debug for MockConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockConnection").field("id", &self.id).finish()
    }
}

impl Connection for MockConnection {
    fn id(&self) -> ConnectionId {
        self.id
    }

    fn send(&self, payload: Bytes) -> Result<SendCompletion, TransportError> {
        if self.is_closed() {
            return Err(TransportError::Closed);
        }
        match *self.mode.lock() {
            SendMode::Accept => {
                self.sent.lock().push(payload);
                Ok(SendCompletion::ready(Ok(())))
            }
            SendMode::FailAsync => Ok(SendCompletion::ready(Err(TransportError::PeerClosed))),
            SendMode::Reject => Err(TransportError::Codec(relink::CodecError::Invalid(
                "rejected".into(),
            ))),
        }
    }

    fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

#[derive(Default)]
struct State {
    /// Outcomes for upcoming connects; `true` succeeds
    script: VecDeque<bool>,
    /// Outcome once the script runs out
    refuse_rest: bool,
    attempts: usize,
    connections: Vec<(Arc<MockConnection>, Rc<dyn Inbound>)>,
}

/// Cloneable handle; clones share the same script and connection log.
#[derive(Clone, Default)]
pub struct MockTransport {
    state: Rc<RefCell<State>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue connect outcomes, consumed in order.
    pub fn script(&self, outcomes: impl IntoIterator<Item = bool>) -> &Self {
        self.state.borrow_mut().script.extend(outcomes);
        self
    }

    /// Refuse every connect once the script is exhausted.
    pub fn refuse_rest(&self) -> &Self {
        self.state.borrow_mut().refuse_rest = true;
        self
    }

    pub fn attempts(&self) -> usize {
        self.state.borrow().attempts
    }

    pub fn connection_count(&self) -> usize {
        self.state.borrow().connections.len()
    }

    pub fn connection(&self, index: usize) -> Arc<MockConnection> {
        self.state.borrow().connections[index].0.clone()
    }

    /// Deliver `payload` as if connection `index` had received it.
    pub async fn inject(&self, index: usize, payload: &'static [u8]) {
        let inbound = self.state.borrow().connections[index].1.clone();
        inbound.on_payload(Bytes::from_static(payload)).await;
    }

    /// Raise `error` on connection `index` as its reader would.
    pub async fn fail(&self, index: usize, error: TransportError) {
        let (conn, inbound) = {
            let state = self.state.borrow();
            let (conn, inbound) = &state.connections[index];
            (conn.clone(), inbound.clone())
        };
        inbound.on_exception(conn, error).await;
    }
}

#[async_trait(?Send)]
impl Transport for MockTransport {
    async fn connect(
        &self,
        endpoint: &Endpoint,
        _pipeline: Pipeline,
        inbound: Rc<dyn Inbound>,
    ) -> Result<Arc<dyn Connection>, ConnectError> {
        let mut state = self.state.borrow_mut();
        state.attempts += 1;

        let refuse_rest = state.refuse_rest;
        let succeed = state.script.pop_front().unwrap_or(!refuse_rest);
        if !succeed {
            return Err(ConnectError::Io {
                endpoint: endpoint.clone(),
                source: io::Error::from(io::ErrorKind::ConnectionRefused),
            });
        }

        let conn = Arc::new(MockConnection::new());
        state.connections.push((conn.clone(), inbound));
        Ok(conn as Arc<dyn Connection>)
    }
}

pub fn endpoint() -> Endpoint {
    Endpoint::new("127.0.0.1", 7000)
}

/// Poll `check` every 5ms until it holds or `within` elapses.
pub async fn eventually(within: Duration, mut check: impl FnMut() -> bool) -> bool {
    let step = Duration::from_millis(5);
    let mut waited = Duration::ZERO;
    while waited < within {
        if check() {
            return true;
        }
        compio::time::sleep(step).await;
        waited += step;
    }
    check()
}
