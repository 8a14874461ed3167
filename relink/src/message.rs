//! Items flowing through the client's queues.
//!
//! Payloads and control messages share the read and write queues, so a control
//! message is observed in order relative to the data queued before it.

use crate::client::Client;
use bytes::Bytes;
use relink_core::error::Fault;
use std::time::Duration;

/// Item on the read or write queue.
#[derive(Debug, Clone)]
pub enum Message {
    /// Application payload
    Data(Bytes),

    /// The connection was replaced; switch to the new client handle.
    Reconnected(Reconnected),

    /// Write pump: stop draining for the given interval.
    Pause(Duration),

    /// Write pump: terminate.
    Stop,

    /// Full-system shutdown; every loop that observes it exits.
    Poison,
}

/// Announcement of a replaced connection.
#[derive(Debug, Clone)]
pub struct Reconnected {
    /// Handle bound to the new connection
    pub client: Client,
    /// The fault that triggered the reconnect
    pub cause: Fault,
}

impl Message {
    /// Payload bytes, if this is a data message.
    #[must_use]
    pub fn as_data(&self) -> Option<&Bytes> {
        match self {
            Self::Data(bytes) => Some(bytes),
            _ => None,
        }
    }

    /// Consume into the payload, if this is a data message.
    #[must_use]
    pub fn into_data(self) -> Option<Bytes> {
        match self {
            Self::Data(bytes) => Some(bytes),
            _ => None,
        }
    }

    /// Whether this is the shutdown marker.
    #[inline]
    #[must_use]
    pub const fn is_poison(&self) -> bool {
        matches!(self, Self::Poison)
    }

    /// Whether this carries a payload.
    #[inline]
    #[must_use]
    pub const fn is_data(&self) -> bool {
        matches!(self, Self::Data(_))
    }
}

impl From<Bytes> for Message {
    fn from(bytes: Bytes) -> Self {
        Self::Data(bytes)
    }
}

/// Item on the internal fault queue.
#[derive(Debug, Clone)]
pub(crate) enum Signal {
    /// A fault awaiting triage
    Fault(Fault),
    /// Shut the fault monitor down
    Poison,
}
