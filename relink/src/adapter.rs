//! Channel adapter: the receive callback installed on every connection.
//!
//! Turns the transport's callbacks into queue writes. Payloads go to the read
//! queue (suspending the transport's reader while it is full); connection
//! failures go to the internal fault queue for the fault monitor to triage.

use crate::client::Shared;
use crate::message::Message;
use async_trait::async_trait;
use bytes::Bytes;
use relink_core::error::{Fault, TransportError};
use relink_core::transport::{Connection, Inbound};
use std::sync::Arc;
use tracing::trace;

pub(crate) struct ChannelAdapter {
    shared: Arc<Shared>,
}

impl ChannelAdapter {
    pub(crate) fn new(shared: Arc<Shared>) -> Self {
        Self { shared }
    }
}

#[async_trait(?Send)]
impl Inbound for ChannelAdapter {
    async fn on_payload(&self, payload: Bytes) {
        trace!("[ChannelAdapter] {} bytes received", payload.len());
        self.shared.queues.read.push(Message::Data(payload)).await;
    }

    async fn on_exception(&self, connection: Arc<dyn Connection>, error: TransportError) {
        trace!("[ChannelAdapter] {} raised: {}", connection.id(), error);
        self.shared.report(Fault::new(error, connection.id())).await;
        connection.close();
    }
}
