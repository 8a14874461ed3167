//! Reconnection backoff.
//!
//! Tracks the delay between consecutive failed reconnect attempts for one
//! fault. With the default options the interval is zero and attempts run
//! back to back.

use crate::options::ClientOptions;
use std::time::Duration;

/// Reconnection state tracker for managing attempt delays.
///
/// # Example
///
/// ```rust
/// use relink_core::options::ClientOptions;
/// use relink_core::reconnect::ReconnectState;
/// use std::time::Duration;
///
/// let options = ClientOptions::default()
///     .with_reconnect_ivl(Duration::from_millis(100))
///     .with_reconnect_ivl_max(Duration::from_secs(10));
///
/// let mut reconnect = ReconnectState::new(&options);
///
/// assert_eq!(reconnect.next_delay(), Duration::from_millis(100));
/// assert_eq!(reconnect.next_delay(), Duration::from_millis(200));
/// assert_eq!(reconnect.next_delay(), Duration::from_millis(400));
///
/// reconnect.reset();
/// assert_eq!(reconnect.next_delay(), Duration::from_millis(100));
/// ```
#[derive(Debug, Clone)]
pub struct ReconnectState {
    /// Base reconnection interval
    base_interval: Duration,
    /// Maximum reconnection interval (zero = no growth)
    max_interval: Duration,
    /// Delays handed out so far
    attempt: u32,
    /// Current backoff interval
    current_interval: Duration,
}

impl ReconnectState {
    /// Create a new reconnection state tracker from client options.
    pub const fn new(options: &ClientOptions) -> Self {
        Self {
            base_interval: options.reconnect_ivl,
            max_interval: options.reconnect_ivl_max,
            attempt: 0,
            current_interval: options.reconnect_ivl,
        }
    }

    /// Get the delay to wait before the next reconnection attempt.
    ///
    /// Doubles with each call until it reaches `reconnect_ivl_max`. When no
    /// maximum is configured the base interval is used every time.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current_interval;

        self.attempt += 1;
        if !self.max_interval.is_zero() {
            self.current_interval = self
                .base_interval
                .saturating_mul(1_u32 << self.attempt.min(10))
                .min(self.max_interval);
        }

        delay
    }

    /// Reset after a successful connection.
    pub fn reset(&mut self) {
        self.attempt = 0;
        self.current_interval = self.base_interval;
    }

    #[inline]
    #[must_use]
    pub const fn attempt(&self) -> u32 {
        self.attempt
    }

    #[inline]
    #[must_use]
    pub const fn current_interval(&self) -> Duration {
        self.current_interval
    }
}
