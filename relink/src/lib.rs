//! # Relink
//!
//! A self-healing asynchronous TCP client runtime built on `io_uring` (via `compio`).
//!
//! ## Architecture
//!
//! - **`relink-core`**: endpoints, options, bounded queues, codec pipeline,
//!   transport contract and its TCP implementation, backoff, lifecycle events
//! - **`relink`**: the client runtime (this crate)
//!
//! A started client runs two background tasks next to the connection's own
//! reader and writer:
//!
//! - the **write pump** drains the write queue into the current connection
//! - the **fault monitor** drains the internal fault queue, rebuilds failed
//!   connections, redelivers failed writes and enforces the retry budget
//!
//! The application only sees the read, write and error queues through the
//! [`Client`] handle. Connection replacement is announced in-band with
//! [`Message::Reconnected`]; teardown is announced with [`Message::Poison`].
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use relink::prelude::*;
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), ClientError> {
//! let options = ClientOptions::default()
//!     .with_handler(LineCodec::new)
//!     .with_retry_limit(3);
//!
//! let client = relink::start("127.0.0.1", 7000, options).await?;
//! client.write("ping").await?;
//!
//! match client.read_timeout(Duration::from_secs(1)).await {
//!     Some(Message::Data(line)) => println!("{line:?}"),
//!     Some(Message::Reconnected(r)) => println!("reconnected: {}", r.cause.error),
//!     Some(Message::Poison) => println!("client closed"),
//!     _ => {}
//! }
//!
//! client.close().await;
//! # Ok(())
//! # }
//! ```
//!
//! ## Failures
//!
//! Connection failures never reach the read queue as errors. They are
//! recovered internally; only faults that recovery cannot handle show up on
//! [`Client::read_error`]: payloads the codec pipeline rejects, and the
//! terminal [`ClientError::RetryLimitExceeded`].

#![warn(missing_docs)]
#![warn(clippy::all)]

mod adapter;
mod client;
pub mod dev_tracing;
mod message;
mod pump;
mod supervisor;
#[cfg(test)]
mod testing;

pub use bytes::Bytes;
pub use client::{start, Client, WriteStatus};
pub use message::{Message, Reconnected};
pub use relink_core::codec::{
    BytesCodec, Direction, Frames, Handler, HandlerFactory, LineCodec, Pipeline,
};
pub use relink_core::endpoint::{Endpoint, EndpointError};
pub use relink_core::error::{
    ClientError, CodecError, ConnectError, Fault, Result, TransportError,
};
pub use relink_core::monitor::{create_monitor, ClientEvent, ClientMonitor};
pub use relink_core::options::ClientOptions;
pub use relink_core::tcp::TcpTransport;
pub use relink_core::transport::{Connection, ConnectionId, Inbound, SendCompletion, Transport};

/// Everything needed to run a client.
pub mod prelude {
    pub use crate::{
        start, Bytes, Client, ClientError, ClientEvent, ClientOptions, Endpoint, Fault, LineCodec,
        Message, Reconnected, WriteStatus,
    };
}
