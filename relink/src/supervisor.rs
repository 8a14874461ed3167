//! Fault monitor.
//!
//! Drains the internal fault queue and decides, per fault, whether to rebuild
//! the connection, redeliver a failed write, surface the fault, or give up.
//!
//! Retry budget: the reconnect counter counts rebuilds since the last
//! successful write. A fault arriving while the counter is above
//! `retry_limit` terminates the client, as does a rebuild that fails
//! `retry_limit` connect attempts in a row.

use crate::adapter::ChannelAdapter;
use crate::client::Client;
use crate::message::{Message, Reconnected, Signal};
use bytes::Bytes;
use relink_core::codec::Pipeline;
use relink_core::error::{ClientError, Fault, TransportError};
use relink_core::monitor::ClientEvent;
use relink_core::reconnect::ReconnectState;
use relink_core::transport::Transport;
use std::rc::Rc;
use tracing::{debug, error, info, trace, warn};

pub(crate) struct FaultMonitor<T: Transport> {
    transport: T,
    adapter: Rc<ChannelAdapter>,
    client: Client,
}

impl<T: Transport> FaultMonitor<T> {
    pub(crate) fn new(transport: T, adapter: Rc<ChannelAdapter>, client: Client) -> Self {
        Self {
            transport,
            adapter,
            client,
        }
    }

    pub(crate) async fn run(mut self) {
        let internal = self.client.shared.queues.internal.clone();

        loop {
            let fault = match internal.pop().await {
                Signal::Fault(fault) => fault,
                Signal::Poison => {
                    debug!("[FaultMonitor] Poisoned, exiting");
                    self.client.connection().close();
                    return;
                }
            };
            trace!(
                "[FaultMonitor] Fault on {}: {}",
                fault.connection,
                fault.error
            );

            let limit = self.client.options().retry_limit;
            let rebuilds = self.client.reconnect_count();
            if rebuilds > limit {
                warn!(
                    "[FaultMonitor] {} rebuilds without a successful write, giving up",
                    rebuilds
                );
                self.terminate(fault, rebuilds).await;
                return;
            }

            if fault.connection != self.client.connection_id() {
                debug!(
                    "[FaultMonitor] Stale fault from {} (live: {})",
                    fault.connection,
                    self.client.connection_id()
                );
                if let Some(payload) = fault.failed_write {
                    self.redeliver(payload);
                }
                continue;
            }

            if fault.failed_write.is_some() && is_codec_error(&fault.error) {
                warn!(
                    "[FaultMonitor] Payload rejected by the pipeline: {}",
                    fault.error
                );
                self.surface(fault);
                continue;
            }

            let Some(client) = self.rebuild(&fault).await else {
                return;
            };
            self.client = client;

            if let Some(payload) = fault.failed_write {
                self.redeliver(payload);
            }
        }
    }

    /// Replace the failed connection. `None` means the client is gone.
    async fn rebuild(&mut self, fault: &Fault) -> Option<Client> {
        let shared = self.client.shared.clone();
        let options = &shared.options;

        info!(
            "[FaultMonitor] {} to {} failed: {}",
            fault.connection, shared.endpoint, fault.error
        );
        shared.emit(ClientEvent::Disconnected {
            endpoint: shared.endpoint.clone(),
            connection: fault.connection,
            reason: fault.error.to_string(),
        });

        shared
            .queues
            .write
            .push(Message::Pause(options.fault_pause))
            .await;
        self.client.connection().close();

        let mut backoff = ReconnectState::new(options);
        let mut attempts = 0u32;

        loop {
            if shared.is_closed() {
                debug!("[FaultMonitor] Client closed during reconnect");
                return None;
            }

            let pipeline = Pipeline::from_factory(&options.handlers);
            match self
                .transport
                .connect(&shared.endpoint, pipeline, self.adapter.clone())
                .await
            {
                Ok(conn) => {
                    if shared.is_closed() {
                        conn.close();
                        return None;
                    }

                    let client = self.client.with_connection(conn);
                    let count = shared.increment_reconnects();
                    info!(
                        "[FaultMonitor] Reconnected to {} ({}), rebuild #{}",
                        shared.endpoint,
                        client.connection_id(),
                        count
                    );

                    let announce = Reconnected {
                        client: client.clone(),
                        cause: fault.clone(),
                    };
                    shared
                        .queues
                        .write
                        .push(Message::Reconnected(announce.clone()))
                        .await;
                    // The monitor never waits on the application's reader
                    if !shared
                        .queues
                        .read
                        .push_detached(Message::Reconnected(announce))
                    {
                        debug!("[FaultMonitor] Read queue full, announcement deferred");
                    }

                    shared.emit(ClientEvent::Reconnected {
                        endpoint: shared.endpoint.clone(),
                        connection: client.connection_id(),
                        count,
                    });
                    return Some(client);
                }
                Err(e) => {
                    attempts += 1;
                    warn!(
                        "[FaultMonitor] Reconnect attempt {} to {} failed: {}",
                        attempts, shared.endpoint, e
                    );
                    shared.emit(ClientEvent::ConnectFailed {
                        endpoint: shared.endpoint.clone(),
                        attempt: attempts,
                        reason: e.to_string(),
                    });

                    if attempts >= options.retry_limit {
                        self.terminate(fault.clone(), attempts).await;
                        return None;
                    }

                    let delay = backoff.next_delay();
                    if !delay.is_zero() {
                        compio::time::sleep(delay).await;
                    }
                }
            }
        }
    }

    /// Close the client for good and surface the terminal error.
    async fn terminate(&self, fault: Fault, attempts: u32) {
        let shared = &self.client.shared;
        let limit = shared.options.retry_limit;

        error!(
            "[FaultMonitor] Retry limit {} exceeded for {}: {}",
            limit, shared.endpoint, fault.error
        );

        let first = shared.mark_closed();
        shared.broadcast_poison();
        self.client.connection().close();

        self.surface(fault.exhausted(limit, attempts));

        if first {
            shared.emit(ClientEvent::Closed {
                endpoint: shared.endpoint.clone(),
            });
        }
    }

    /// Hand `fault` to the application. Never waits on a full error queue.
    fn surface(&self, fault: Fault) {
        if !self.client.shared.queues.errors.push_detached(fault) {
            debug!("[FaultMonitor] Error queue full, fault deferred");
        }
    }

    /// Re-enqueue `payload` after the redelivery delay.
    fn redeliver(&self, payload: Bytes) {
        let shared = self.client.shared.clone();
        let delay = shared.options.redelivery_delay;
        debug!(
            "[FaultMonitor] Redelivering {} bytes in {:?}",
            payload.len(),
            delay
        );

        compio::runtime::spawn(async move {
            compio::time::sleep(delay).await;
            if shared.is_closed() {
                trace!("[FaultMonitor] Client closed, redelivery dropped");
                return;
            }
            shared.queues.write.push(Message::Data(payload)).await;
        })
        .detach();
    }
}

fn is_codec_error(error: &ClientError) -> bool {
    matches!(error, ClientError::Transport(TransportError::Codec(_)))
}
