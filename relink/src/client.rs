//! Client handle.
//!
//! A [`Client`] pairs the current connection with state shared by every handle
//! of the same logical client: the four queues, the reconnect counter and the
//! closed flag. Handles are cheap to clone. After a reconnect the caller
//! receives a [`Message::Reconnected`] carrying a handle bound to the new
//! connection; old handles keep working for queue operations since the queues
//! never change.

use crate::adapter::ChannelAdapter;
use crate::message::{Message, Signal};
use crate::pump;
use crate::supervisor::FaultMonitor;
use bytes::Bytes;
use relink_core::codec::Pipeline;
use relink_core::endpoint::Endpoint;
use relink_core::error::{ClientError, Fault, Result};
use relink_core::monitor::{emit, ClientEvent};
use relink_core::options::ClientOptions;
use relink_core::queue::BoundedQueue;
use relink_core::tcp::TcpTransport;
use relink_core::transport::{Connection, ConnectionId, Transport};
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Outcome of a bounded write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteStatus {
    /// The payload is on the write queue.
    Queued,
    /// The write queue stayed full for the whole timeout; the payload was dropped.
    TimedOut,
}

pub(crate) struct Queues {
    pub(crate) read: BoundedQueue<Message>,
    pub(crate) write: BoundedQueue<Message>,
    pub(crate) internal: BoundedQueue<Signal>,
    pub(crate) errors: BoundedQueue<Fault>,
}

pub(crate) struct Shared {
    pub(crate) endpoint: Endpoint,
    pub(crate) options: ClientOptions,
    pub(crate) queues: Queues,
    reconnects: AtomicU32,
    closed: AtomicBool,
}

impl Shared {
    pub(crate) fn new(endpoint: Endpoint, options: ClientOptions) -> Self {
        let queues = Queues {
            read: BoundedQueue::new(options.read_queue_capacity),
            write: BoundedQueue::new(options.write_queue_capacity),
            internal: BoundedQueue::new(options.error_queue_capacity),
            errors: BoundedQueue::new(options.error_queue_capacity),
        };
        Self {
            endpoint,
            options,
            queues,
            reconnects: AtomicU32::new(0),
            closed: AtomicBool::new(false),
        }
    }

    #[inline]
    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Returns `true` if this call performed the transition.
    pub(crate) fn mark_closed(&self) -> bool {
        !self.closed.swap(true, Ordering::AcqRel)
    }

    #[inline]
    pub(crate) fn reconnect_count(&self) -> u32 {
        self.reconnects.load(Ordering::Acquire)
    }

    /// Returns the updated count.
    pub(crate) fn increment_reconnects(&self) -> u32 {
        self.reconnects.fetch_add(1, Ordering::AcqRel) + 1
    }

    pub(crate) fn reset_reconnects(&self) {
        self.reconnects.store(0, Ordering::Release);
    }

    pub(crate) fn emit(&self, event: ClientEvent) {
        emit(self.options.monitor.as_ref(), event);
    }

    /// Hand a fault to the fault monitor. Dropped once the client is closed.
    pub(crate) async fn report(&self, fault: Fault) {
        if self.is_closed() {
            debug!(
                "[Client] Dropping fault from {} after close: {}",
                fault.connection, fault.error
            );
            return;
        }
        self.queues.internal.push(Signal::Fault(fault)).await;
    }

    /// Place `Poison` on the internal, write and read queues.
    ///
    /// Never waits. A queue that is full gets its `Poison` from a detached
    /// task once the consumer frees a slot, so every loop still observes it
    /// behind the items already queued.
    pub(crate) fn broadcast_poison(&self) {
        if !self.queues.internal.push_detached(Signal::Poison) {
            debug!("[Client] Internal queue full, poison deferred");
        }
        if !self.queues.write.push_detached(Message::Poison) {
            debug!("[Client] Write queue full, poison deferred");
        }
        if !self.queues.read.push_detached(Message::Poison) {
            debug!("[Client] Read queue full, poison deferred");
        }
    }
}

/// Handle to a self-healing client connection.
#[derive(Clone)]
pub struct Client {
    conn: Arc<dyn Connection>,
    pub(crate) shared: Arc<Shared>,
}

/// Connect to `host:port` over TCP and start the client.
///
/// Shorthand for [`Client::connect`].
pub async fn start(host: &str, port: u16, options: ClientOptions) -> Result<Client> {
    Client::connect(Endpoint::new(host, port), options).await
}

impl Client {
    /// Connect to `endpoint` over TCP and start the client.
    pub async fn connect(endpoint: Endpoint, options: ClientOptions) -> Result<Client> {
        let transport = TcpTransport::from_options(&options);
        Self::start_with(transport, endpoint, options).await
    }

    /// Start the client over an arbitrary transport.
    ///
    /// Opens the initial connection with the configured handler pipeline plus
    /// the channel adapter, then launches the write pump and the fault
    /// monitor. A failed initial connect is returned as-is; no retry happens
    /// before the client is up.
    pub async fn start_with<T: Transport>(
        transport: T,
        endpoint: Endpoint,
        options: ClientOptions,
    ) -> Result<Client> {
        let shared = Arc::new(Shared::new(endpoint, options));
        let adapter = Rc::new(ChannelAdapter::new(shared.clone()));

        let pipeline = Pipeline::from_factory(&shared.options.handlers);
        let conn = match transport
            .connect(&shared.endpoint, pipeline, adapter.clone())
            .await
        {
            Ok(conn) => conn,
            Err(e) => {
                warn!("[Client] Initial connect to {} failed: {}", shared.endpoint, e);
                shared.emit(ClientEvent::ConnectFailed {
                    endpoint: shared.endpoint.clone(),
                    attempt: 1,
                    reason: e.to_string(),
                });
                return Err(e.into());
            }
        };

        info!("[Client] Connected to {} ({})", shared.endpoint, conn.id());
        shared.emit(ClientEvent::Connected {
            endpoint: shared.endpoint.clone(),
            connection: conn.id(),
        });

        let client = Client::new(conn, shared);

        compio::runtime::spawn(pump::run(client.clone())).detach();
        compio::runtime::spawn(FaultMonitor::new(transport, adapter, client.clone()).run())
            .detach();

        Ok(client)
    }

    pub(crate) fn new(conn: Arc<dyn Connection>, shared: Arc<Shared>) -> Client {
        Client { conn, shared }
    }

    /// Same client, bound to a replacement connection.
    pub(crate) fn with_connection(&self, conn: Arc<dyn Connection>) -> Client {
        Client {
            conn,
            shared: self.shared.clone(),
        }
    }

    /// Enqueue `payload`, waiting while the write queue is full.
    ///
    /// Returns `ClientError::Closed` once the client has been torn down.
    pub async fn write(&self, payload: impl Into<Bytes>) -> Result<()> {
        if self.is_closed() {
            return Err(ClientError::Closed);
        }
        self.shared
            .queues
            .write
            .push(Message::Data(payload.into()))
            .await;
        Ok(())
    }

    /// Enqueue `payload`, giving up after `timeout` if the write queue stays full.
    pub async fn write_timeout(
        &self,
        payload: impl Into<Bytes>,
        timeout: Duration,
    ) -> Result<WriteStatus> {
        if self.is_closed() {
            return Err(ClientError::Closed);
        }
        let queued = self
            .shared
            .queues
            .write
            .push_timeout(Message::Data(payload.into()), timeout)
            .await;
        Ok(if queued {
            WriteStatus::Queued
        } else {
            WriteStatus::TimedOut
        })
    }

    /// [`write_timeout`](Self::write_timeout) with the configured write timeout.
    pub async fn write_default(&self, payload: impl Into<Bytes>) -> Result<WriteStatus> {
        self.write_timeout(payload, self.shared.options.write_timeout)
            .await
    }

    /// Next item from the read queue. Waits indefinitely.
    pub async fn read(&self) -> Message {
        self.shared.queues.read.pop().await
    }

    /// Next item from the read queue, or `None` if nothing arrived within `timeout`.
    pub async fn read_timeout(&self, timeout: Duration) -> Option<Message> {
        self.shared.queues.read.pop_timeout(timeout).await
    }

    /// [`read_timeout`](Self::read_timeout) with the configured read timeout.
    pub async fn read_default(&self) -> Option<Message> {
        self.read_timeout(self.shared.options.read_timeout).await
    }

    /// Next fault surfaced to the application. Waits indefinitely.
    pub async fn read_error(&self) -> Fault {
        self.shared.queues.errors.pop().await
    }

    /// Next surfaced fault, or `None` if none arrived within `timeout`.
    pub async fn read_error_timeout(&self, timeout: Duration) -> Option<Fault> {
        self.shared.queues.errors.pop_timeout(timeout).await
    }

    /// [`read_error_timeout`](Self::read_error_timeout) with the configured read timeout.
    pub async fn read_error_default(&self) -> Option<Fault> {
        self.read_error_timeout(self.shared.options.read_timeout)
            .await
    }

    /// Ask the write pump to stop draining for `duration`.
    ///
    /// The pause is queued behind any pending writes.
    pub async fn pause_writes(&self, duration: Duration) {
        self.shared.queues.write.push(Message::Pause(duration)).await;
    }

    /// Ask the write pump to exit once the writes queued before this call are submitted.
    pub async fn stop_writer(&self) {
        self.shared.queues.write.push(Message::Stop).await;
    }

    /// Tear the client down.
    ///
    /// Marks the client closed, poisons every queue and closes the current
    /// connection. Idempotent; only the first call does anything.
    pub async fn close(&self) {
        if !self.shared.mark_closed() {
            return;
        }
        debug!("[Client] Closing {}", self.shared.endpoint);

        self.shared.broadcast_poison();
        self.conn.close();

        self.shared.emit(ClientEvent::Closed {
            endpoint: self.shared.endpoint.clone(),
        });
    }

    /// Whether the client has been torn down, by `close` or by an exhausted retry budget.
    #[inline]
    pub fn is_closed(&self) -> bool {
        self.shared.is_closed()
    }

    /// Connection rebuilds since the last successful write.
    #[inline]
    pub fn reconnect_count(&self) -> u32 {
        self.shared.reconnect_count()
    }

    /// Identity of the connection this handle is bound to.
    #[inline]
    pub fn connection_id(&self) -> ConnectionId {
        self.conn.id()
    }

    /// The connection this handle is bound to.
    #[inline]
    pub fn connection(&self) -> &Arc<dyn Connection> {
        &self.conn
    }

    /// Remote endpoint.
    #[inline]
    pub fn endpoint(&self) -> &Endpoint {
        &self.shared.endpoint
    }

    /// Options the client was started with.
    #[inline]
    pub fn options(&self) -> &ClientOptions {
        &self.shared.options
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("endpoint", &self.shared.endpoint)
            .field("connection", &self.conn.id())
            .field("reconnects", &self.reconnect_count())
            .field("closed", &self.is_closed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shared() -> Shared {
        Shared::new(
            Endpoint::new("127.0.0.1", 1),
            ClientOptions::default()
                .with_read_queue_capacity(2)
                .with_write_queue_capacity(3)
                .with_error_queue_capacity(4),
        )
    }

    #[test]
    fn test_queue_capacities_follow_options() {
        let shared = shared();
        assert_eq!(shared.queues.read.capacity(), 2);
        assert_eq!(shared.queues.write.capacity(), 3);
        assert_eq!(shared.queues.internal.capacity(), 4);
        assert_eq!(shared.queues.errors.capacity(), 4);
    }

    #[test]
    fn test_reconnect_counter() {
        let shared = shared();
        assert_eq!(shared.increment_reconnects(), 1);
        assert_eq!(shared.increment_reconnects(), 2);
        assert_eq!(shared.reconnect_count(), 2);
        shared.reset_reconnects();
        assert_eq!(shared.reconnect_count(), 0);
    }

    #[test]
    fn test_mark_closed_once() {
        let shared = shared();
        assert!(!shared.is_closed());
        assert!(shared.mark_closed());
        assert!(!shared.mark_closed());
        assert!(shared.is_closed());
    }

    #[compio::test]
    async fn test_report_after_close_is_dropped() {
        let shared = shared();
        shared.mark_closed();
        shared
            .report(Fault::new(ClientError::Closed, ConnectionId::from_raw(1)))
            .await;
        assert!(shared.queues.internal.is_empty());
    }

    #[compio::test]
    async fn test_broadcast_poison_reaches_every_queue() {
        let shared = shared();
        shared.broadcast_poison();
        assert!(matches!(shared.queues.internal.try_pop(), Some(Signal::Poison)));
        assert!(matches!(shared.queues.write.try_pop(), Some(Message::Poison)));
        assert!(matches!(shared.queues.read.try_pop(), Some(Message::Poison)));
    }

    #[compio::test]
    async fn test_poison_reaches_full_read_queue_after_drain() {
        let shared = shared();
        for payload in [&b"one"[..], &b"two"[..]] {
            assert!(shared
                .queues
                .read
                .try_push(Message::Data(Bytes::from_static(payload)))
                .is_ok());
        }

        shared.broadcast_poison();

        let read = &shared.queues.read;
        assert!(matches!(read.pop().await, Message::Data(_)));
        assert!(matches!(read.pop().await, Message::Data(_)));
        assert!(matches!(
            read.pop_timeout(Duration::from_millis(500)).await,
            Some(Message::Poison)
        ));
    }
}
