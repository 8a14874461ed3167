//! Relink Core
//!
//! This crate contains the building blocks the client runtime is assembled from:
//! - Remote addressing (`endpoint`)
//! - Error taxonomy and fault records (`error`)
//! - Client configuration (`options`)
//! - Bounded FIFO queues, the backpressure boundary (`queue`)
//! - Codec pipeline stages (`codec`)
//! - Transport contract (`transport`) and its compio TCP implementation (`tcp`)
//! - Reconnect backoff (`reconnect`)
//! - Lifecycle events (`monitor`)

// The tcp module needs raw fd/socket access for socket configuration
#![cfg_attr(not(test), deny(unsafe_code))]
// Allow some pedantic lints that are intentional in this crate
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::match_same_arms)]

pub mod codec;
pub mod endpoint;
pub mod error;
pub mod monitor;
pub mod options;
pub mod queue;
pub mod reconnect;
pub mod tcp;
pub mod transport;

/// Common imports for transport implementors and the client runtime.
pub mod prelude {
    pub use crate::codec::{BytesCodec, Direction, Frames, Handler, HandlerFactory, LineCodec, Pipeline};
    pub use crate::endpoint::Endpoint;
    pub use crate::error::{ClientError, CodecError, ConnectError, Fault, TransportError};
    pub use crate::monitor::{create_monitor, ClientEvent, ClientMonitor};
    pub use crate::options::ClientOptions;
    pub use crate::queue::BoundedQueue;
    pub use crate::reconnect::ReconnectState;
    pub use crate::tcp::{enable_tcp_nodelay, TcpTransport};
    pub use crate::transport::{Connection, ConnectionId, Inbound, SendCompletion, Transport};
}
