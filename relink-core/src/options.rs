//! Client configuration options
//!
//! Queue capacities, timeouts, the retry budget and the codec pipeline for a
//! client. Every field has a default; use the `with_*` builders to override.

use crate::codec::{default_handlers, Handler, HandlerFactory};
use crate::monitor::ClientEventSender;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Default number of reconnect attempts per fault, and rebuilds per session
pub const DEFAULT_RETRY_LIMIT: u32 = 5;

/// Default write queue capacity
pub const DEFAULT_WRITE_QUEUE_CAPACITY: usize = 100;

/// Default read queue capacity
pub const DEFAULT_READ_QUEUE_CAPACITY: usize = 100;

/// Default capacity of the internal and public error queues
pub const DEFAULT_ERROR_QUEUE_CAPACITY: usize = 1000;

/// Default bound for `write_default` and teardown broadcasts
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_millis(1500);

/// Default bound for `read_default`
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(1500);

/// How long the write pump is paused when a fault is triaged
pub const DEFAULT_FAULT_PAUSE: Duration = Duration::from_millis(1000);

/// Delay before a failed write is resubmitted on a recovered connection
pub const DEFAULT_REDELIVERY_DELAY: Duration = Duration::from_millis(500);

/// Client configuration options.
///
/// # Examples
///
/// ```
/// use relink_core::codec::LineCodec;
/// use relink_core::options::ClientOptions;
/// use std::time::Duration;
///
/// let opts = ClientOptions::default()
///     .with_retry_limit(3)
///     .with_read_queue_capacity(16)
///     .with_handler(LineCodec::new)
///     .with_fault_pause(Duration::from_millis(100));
///
/// assert_eq!(opts.retry_limit, 3);
/// ```
#[derive(Clone)]
pub struct ClientOptions {
    /// Codec stages installed on every connection, first to last
    ///
    /// - Default: a single `BytesCodec` (raw bytes in and out)
    pub handlers: HandlerFactory,

    /// Retry budget
    ///
    /// Bounds both the reconnect attempts made for one fault and the number
    /// of times a session may be rebuilt without a successful write in between.
    /// - Default: 5
    pub retry_limit: u32,

    /// Write queue capacity (messages)
    ///
    /// `write` suspends while this many items are pending.
    /// - Default: 100
    pub write_queue_capacity: usize,

    /// Read queue capacity (messages)
    ///
    /// The transport stops reading while this many items are unread.
    /// - Default: 100
    pub read_queue_capacity: usize,

    /// Capacity of the internal fault queue and the public error queue
    ///
    /// - Default: 1000
    pub error_queue_capacity: usize,

    /// Bound used by `write_default` and by teardown broadcasts
    ///
    /// - Default: 1500ms
    pub write_timeout: Duration,

    /// Bound used by `read_default` and `read_error_default`
    ///
    /// - Default: 1500ms
    pub read_timeout: Duration,

    /// Maximum time to wait for one TCP connect to complete
    ///
    /// - Default: 5 seconds
    pub connect_timeout: Duration,

    /// Pause pushed to the write pump when a fault is triaged
    ///
    /// - Default: 1000ms
    pub fault_pause: Duration,

    /// Delay before a failed write is resubmitted after recovery
    ///
    /// - Default: 500ms
    pub redelivery_delay: Duration,

    /// Delay before the second reconnect attempt for one fault
    ///
    /// - Default: 0 (retry immediately)
    /// - Use with `reconnect_ivl_max` for exponential backoff
    pub reconnect_ivl: Duration,

    /// Maximum delay between reconnect attempts
    ///
    /// - Default: 0 (no growth, use `reconnect_ivl` always)
    /// - When > 0: Doubles `reconnect_ivl` up to this value
    pub reconnect_ivl_max: Duration,

    /// Disable Nagle's algorithm on TCP connections
    ///
    /// - Default: true
    pub tcp_nodelay: bool,

    /// Read buffer size (bytes)
    ///
    /// Size of each buffer handed to the kernel for reading.
    /// - Default: 8192 (8KB)
    pub read_buffer_size: usize,

    /// Optional lifecycle event sink
    ///
    /// - Default: None
    pub monitor: Option<ClientEventSender>,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            handlers: default_handlers(),
            retry_limit: DEFAULT_RETRY_LIMIT,
            write_queue_capacity: DEFAULT_WRITE_QUEUE_CAPACITY,
            read_queue_capacity: DEFAULT_READ_QUEUE_CAPACITY,
            error_queue_capacity: DEFAULT_ERROR_QUEUE_CAPACITY,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
            read_timeout: DEFAULT_READ_TIMEOUT,
            connect_timeout: Duration::from_secs(5),
            fault_pause: DEFAULT_FAULT_PAUSE,
            redelivery_delay: DEFAULT_REDELIVERY_DELAY,
            reconnect_ivl: Duration::ZERO,
            reconnect_ivl_max: Duration::ZERO,
            tcp_nodelay: true,
            read_buffer_size: 8192,
            monitor: None,
        }
    }
}

impl ClientOptions {
    /// Create new client options with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the stage list with a custom factory.
    ///
    /// The factory runs once per connection, so stateful stages start fresh
    /// after a reconnect.
    pub fn with_handlers<F>(mut self, factory: F) -> Self
    where
        F: Fn() -> Vec<Box<dyn Handler>> + Send + Sync + 'static,
    {
        self.handlers = Arc::new(factory);
        self
    }

    /// Use a single stage built by `make`.
    ///
    /// # Examples
    ///
    /// ```
    /// use relink_core::codec::LineCodec;
    /// use relink_core::options::ClientOptions;
    ///
    /// let opts = ClientOptions::new().with_handler(|| LineCodec::with_max_length(1024));
    /// ```
    pub fn with_handler<H, F>(self, make: F) -> Self
    where
        H: Handler,
        F: Fn() -> H + Send + Sync + 'static,
    {
        self.with_handlers(move || vec![Box::new(make()) as Box<dyn Handler>])
    }

    /// Set the retry budget.
    pub fn with_retry_limit(mut self, limit: u32) -> Self {
        self.retry_limit = limit;
        self
    }

    /// Set write queue capacity.
    pub fn with_write_queue_capacity(mut self, capacity: usize) -> Self {
        self.write_queue_capacity = capacity;
        self
    }

    /// Set read queue capacity.
    pub fn with_read_queue_capacity(mut self, capacity: usize) -> Self {
        self.read_queue_capacity = capacity;
        self
    }

    /// Set error queue capacity (internal and public).
    pub fn with_error_queue_capacity(mut self, capacity: usize) -> Self {
        self.error_queue_capacity = capacity;
        self
    }

    /// Set the default write timeout.
    pub fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    /// Set the default read timeout.
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Set connection timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the write pump pause applied on each fault.
    pub fn with_fault_pause(mut self, pause: Duration) -> Self {
        self.fault_pause = pause;
        self
    }

    /// Set the delay before a failed write is resubmitted.
    pub fn with_redelivery_delay(mut self, delay: Duration) -> Self {
        self.redelivery_delay = delay;
        self
    }

    /// Set reconnection interval.
    pub fn with_reconnect_ivl(mut self, ivl: Duration) -> Self {
        self.reconnect_ivl = ivl;
        self
    }

    /// Set maximum reconnection interval for exponential backoff.
    pub fn with_reconnect_ivl_max(mut self, max: Duration) -> Self {
        self.reconnect_ivl_max = max;
        self
    }

    /// Enable or disable `TCP_NODELAY`.
    pub fn with_tcp_nodelay(mut self, enabled: bool) -> Self {
        self.tcp_nodelay = enabled;
        self
    }

    /// Set read buffer size.
    pub fn with_read_buffer_size(mut self, size: usize) -> Self {
        self.read_buffer_size = size;
        self
    }

    /// Emit lifecycle events to `sender`.
    ///
    /// # Examples
    ///
    /// ```
    /// use relink_core::monitor::create_monitor;
    /// use relink_core::options::ClientOptions;
    ///
    /// let (sender, _events) = create_monitor();
    /// let opts = ClientOptions::new().with_monitor(sender);
    /// assert!(opts.monitor.is_some());
    /// ```
    pub fn with_monitor(mut self, sender: ClientEventSender) -> Self {
        self.monitor = Some(sender);
        self
    }
}

impl fmt::Debug for ClientOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientOptions")
            .field("retry_limit", &self.retry_limit)
            .field("write_queue_capacity", &self.write_queue_capacity)
            .field("read_queue_capacity", &self.read_queue_capacity)
            .field("error_queue_capacity", &self.error_queue_capacity)
            .field("write_timeout", &self.write_timeout)
            .field("read_timeout", &self.read_timeout)
            .field("connect_timeout", &self.connect_timeout)
            .field("fault_pause", &self.fault_pause)
            .field("redelivery_delay", &self.redelivery_delay)
            .field("reconnect_ivl", &self.reconnect_ivl)
            .field("reconnect_ivl_max", &self.reconnect_ivl_max)
            .field("tcp_nodelay", &self.tcp_nodelay)
            .field("read_buffer_size", &self.read_buffer_size)
            .field("monitor", &self.monitor.is_some())
            .finish_non_exhaustive()
    }
}
