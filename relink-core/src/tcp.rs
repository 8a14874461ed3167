//! TCP transport built on compio.
//!
//! Each connection runs two local tasks over clones of one socket:
//!
//! - a writer that drains submitted payloads in order, runs them through the
//!   outbound side of the pipeline and resolves each [`SendCompletion`]
//! - a reader that runs received bytes through the inbound side and hands the
//!   frames to the [`Inbound`] callback
//!
//! Closing the connection stops both tasks; the socket is released when the
//! last clone drops.
//!
//! # Safety
//!
//! [`enable_tcp_nodelay`] borrows the raw file descriptor/socket to set a
//! socket option. The borrowed handle is never closed.

#![allow(unsafe_code)]

use crate::codec::Pipeline;
use crate::endpoint::Endpoint;
use crate::error::{ConnectError, TransportError};
use crate::options::ClientOptions;
use crate::transport::{
    CompletionSender, Connection, ConnectionId, Inbound, SendCompletion, Transport,
};
use async_trait::async_trait;
use bytes::Bytes;
use compio::buf::BufResult;
use compio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use compio::net::TcpStream;
use compio::runtime::TryClone;
use flume::{Receiver, Sender};
use futures::future::{select, Either};
use std::cell::RefCell;
use std::io;
use std::pin::pin;
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace, warn};

/// Enable TCP_NODELAY on a compio TcpStream for minimal latency.
///
/// This disables Nagle's algorithm, trading bandwidth efficiency for lower latency.
///
/// # Errors
///
/// Returns an error if the socket option cannot be set.
#[inline]
pub fn enable_tcp_nodelay(stream: &TcpStream) -> io::Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::io::{AsRawFd, FromRawFd};
        let fd = stream.as_raw_fd();
        let sock = unsafe { socket2::Socket::from_raw_fd(fd) };
        let result = sock.set_nodelay(true);
        std::mem::forget(sock); // Don't close the fd
        result
    }

    #[cfg(windows)]
    {
        use std::os::windows::io::{AsRawSocket, FromRawSocket};
        let raw = stream.as_raw_socket();
        let sock = unsafe { socket2::Socket::from_raw_socket(raw) };
        let result = sock.set_nodelay(true);
        std::mem::forget(sock); // Don't close the socket
        result
    }

    #[cfg(not(any(unix, windows)))]
    {
        let _ = stream;
        Ok(())
    }
}

/// Production transport: one compio `TcpStream` per connection.
#[derive(Debug, Clone)]
pub struct TcpTransport {
    connect_timeout: Duration,
    nodelay: bool,
    read_buffer_size: usize,
}

impl TcpTransport {
    pub fn new(connect_timeout: Duration, nodelay: bool, read_buffer_size: usize) -> Self {
        Self {
            connect_timeout,
            nodelay,
            read_buffer_size: read_buffer_size.max(1),
        }
    }

    /// Take the TCP settings from client options.
    pub fn from_options(options: &ClientOptions) -> Self {
        Self::new(
            options.connect_timeout,
            options.tcp_nodelay,
            options.read_buffer_size,
        )
    }

    async fn open(&self, endpoint: &Endpoint) -> Result<TcpStream, ConnectError> {
        let addr = endpoint.authority();
        let connect = TcpStream::connect(addr.as_str());

        let result = if self.connect_timeout.is_zero() {
            connect.await
        } else {
            match compio::time::timeout(self.connect_timeout, connect).await {
                Ok(result) => result,
                Err(_) => {
                    return Err(ConnectError::TimedOut {
                        endpoint: endpoint.clone(),
                        after: self.connect_timeout,
                    })
                }
            }
        };

        result.map_err(|source| ConnectError::Io {
            endpoint: endpoint.clone(),
            source,
        })
    }
}

impl Default for TcpTransport {
    fn default() -> Self {
        Self::from_options(&ClientOptions::default())
    }
}

#[async_trait(?Send)]
impl Transport for TcpTransport {
    async fn connect(
        &self,
        endpoint: &Endpoint,
        pipeline: Pipeline,
        inbound: Rc<dyn Inbound>,
    ) -> Result<Arc<dyn Connection>, ConnectError> {
        let stream = self.open(endpoint).await?;

        if self.nodelay {
            if let Err(e) = enable_tcp_nodelay(&stream) {
                warn!("[TcpTransport] Failed to set TCP_NODELAY on {}: {}", endpoint, e);
            }
        }

        let reader = stream.try_clone().map_err(|source| ConnectError::Io {
            endpoint: endpoint.clone(),
            source,
        })?;

        let (write_tx, write_rx) = flume::unbounded();
        let (shutdown_tx, shutdown_rx) = flume::bounded(1);
        let conn = Arc::new(TcpConnection {
            id: ConnectionId::next(),
            write_tx,
            shutdown_tx,
            closed: AtomicBool::new(false),
        });
        debug!("[TcpTransport] {} connected to {}", conn.id, endpoint);

        let pipeline = Rc::new(RefCell::new(pipeline));

        compio::runtime::spawn(write_loop(stream, write_rx, pipeline.clone(), conn.id)).detach();
        compio::runtime::spawn(read_loop(
            reader,
            conn.clone(),
            pipeline,
            inbound,
            shutdown_rx,
            self.read_buffer_size,
        ))
        .detach();

        Ok(conn)
    }
}

/// Commands for the writer task
enum WriteCmd {
    Send {
        payload: Bytes,
        done: CompletionSender,
    },
    Close,
}

/// Handle to one TCP connection.
#[derive(Debug)]
pub struct TcpConnection {
    id: ConnectionId,
    write_tx: Sender<WriteCmd>,
    shutdown_tx: Sender<()>,
    closed: AtomicBool,
}

impl std::fmt::Debug for WriteCmd {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Send { payload, .. } => write!(f, "Send({} bytes)", payload.len()),
            Self::Close => f.write_str("Close"),
        }
    }
}

impl Connection for TcpConnection {
    fn id(&self) -> ConnectionId {
        self.id
    }

    fn send(&self, payload: Bytes) -> Result<SendCompletion, TransportError> {
        if self.is_closed() {
            return Err(TransportError::Closed);
        }
        let (done, completion) = SendCompletion::pending();
        self.write_tx
            .send(WriteCmd::Send { payload, done })
            .map_err(|_| TransportError::Closed)?;
        Ok(completion)
    }

    fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        trace!("[TcpConnection] {} closing", self.id);
        let _ = self.write_tx.send(WriteCmd::Close);
        let _ = self.shutdown_tx.try_send(());
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

/// Writer task: serializes submitted payloads onto the socket.
///
/// After the first failed write every further payload fails with
/// `TransportError::Closed`; the stream is not reused.
async fn write_loop(
    mut stream: TcpStream,
    rx: Receiver<WriteCmd>,
    pipeline: Rc<RefCell<Pipeline>>,
    id: ConnectionId,
) {
    let mut broken = false;

    while let Ok(cmd) = rx.recv_async().await {
        let (payload, done) = match cmd {
            WriteCmd::Send { payload, done } => (payload, done),
            WriteCmd::Close => break,
        };

        if broken {
            done.complete(Err(TransportError::Closed));
            continue;
        }

        let frames = match pipeline.borrow_mut().outbound(payload) {
            Ok(frames) => frames,
            Err(e) => {
                done.complete(Err(e.into()));
                continue;
            }
        };

        let mut result = Ok(());
        for frame in frames {
            let BufResult(res, _) = stream.write_all(frame.to_vec()).await;
            if let Err(e) = res {
                debug!("[TcpConnection] {} write failed: {}", id, e);
                broken = true;
                result = Err(TransportError::Io(e));
                break;
            }
        }
        done.complete(result);
    }

    // Anything still queued was never written
    while let Ok(cmd) = rx.try_recv() {
        if let WriteCmd::Send { done, .. } = cmd {
            done.complete(Err(TransportError::Closed));
        }
    }

    if let Err(e) = AsyncWrite::shutdown(&mut stream).await {
        trace!("[TcpConnection] {} shutdown: {}", id, e);
    }
    trace!("[TcpConnection] {} writer stopped", id);
}

/// Reader task: decodes received bytes and feeds the inbound callback.
async fn read_loop(
    mut stream: TcpStream,
    conn: Arc<TcpConnection>,
    pipeline: Rc<RefCell<Pipeline>>,
    inbound: Rc<dyn Inbound>,
    shutdown: Receiver<()>,
    buffer_size: usize,
) {
    let error = loop {
        let buf = Vec::with_capacity(buffer_size);
        let read = pin!(AsyncRead::read(&mut stream, buf));
        let stop = pin!(shutdown.recv_async());

        let (n, buf) = match select(read, stop).await {
            Either::Left((BufResult(Ok(n), buf), _)) => (n, buf),
            Either::Left((BufResult(Err(e), _), _)) => break TransportError::Io(e),
            Either::Right(_) => {
                trace!("[TcpConnection] {} reader stopped", conn.id);
                return;
            }
        };

        if n == 0 {
            trace!("[TcpConnection] {} EOF", conn.id);
            break TransportError::PeerClosed;
        }

        let frames = pipeline.borrow_mut().inbound(Bytes::from(buf));
        match frames {
            Ok(frames) => {
                for frame in frames {
                    inbound.on_payload(frame).await;
                }
            }
            Err(e) => break TransportError::Codec(e),
        }
    };

    // A locally closed connection has nothing to report
    if !conn.is_closed() {
        debug!("[TcpConnection] {} failed: {}", conn.id, error);
        inbound.on_exception(conn.clone(), error).await;
    }
    conn.close();
}
