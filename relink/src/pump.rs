//! Write pump.
//!
//! A single task drains the write queue and submits payloads to the current
//! connection. Control messages on the same queue swap the connection
//! (`Reconnected`), suspend draining (`Pause`) or end the loop (`Stop`,
//! `Poison`).
//!
//! Sends are not awaited. Each submission gets a detached observer that turns
//! a failed completion into a `FailedWrite` fault, so the fault monitor can
//! redeliver the payload after recovery.

use crate::client::Client;
use crate::message::Message;
use bytes::Bytes;
use relink_core::error::Fault;
use tracing::{debug, trace};

pub(crate) async fn run(mut client: Client) {
    let write = client.shared.queues.write.clone();

    loop {
        match write.pop().await {
            Message::Data(payload) => submit(&client, payload).await,
            Message::Pause(duration) => {
                trace!("[WritePump] Paused for {:?}", duration);
                compio::time::sleep(duration).await;
            }
            Message::Reconnected(reconnected) => {
                debug!(
                    "[WritePump] Switching {} -> {}",
                    client.connection_id(),
                    reconnected.client.connection_id()
                );
                client = reconnected.client;
            }
            Message::Stop => {
                debug!("[WritePump] Stopped");
                break;
            }
            Message::Poison => {
                debug!("[WritePump] Poisoned, exiting");
                break;
            }
        }
    }
}

async fn submit(client: &Client, payload: Bytes) {
    let conn = client.connection_id();

    match client.connection().send(payload.clone()) {
        Ok(completion) => {
            let shared = client.shared.clone();
            compio::runtime::spawn(async move {
                if let Err(e) = completion.wait().await {
                    shared.report(Fault::failed_write(e, conn, payload)).await;
                }
            })
            .detach();

            client.shared.reset_reconnects();
        }
        Err(e) => {
            debug!("[WritePump] Submit to {} rejected: {}", conn, e);
            client
                .shared
                .report(Fault::failed_write(e, conn, payload))
                .await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Reconnected;
    use crate::testing::{self, RecordingConnection};
    use relink_core::error::TransportError;
    use relink_core::options::ClientOptions;
    use relink_core::transport::Connection;
    use std::time::Duration;

    const WAIT: Duration = Duration::from_secs(1);

    #[compio::test]
    async fn test_exits_on_poison() {
        let conn = RecordingConnection::new();
        let client = testing::client(conn.clone(), ClientOptions::default());
        let write = &client.shared.queues.write;
        write.push(Message::Data(Bytes::from_static(b"a"))).await;
        write.push(Message::Poison).await;
        write.push(Message::Data(Bytes::from_static(b"b"))).await;

        assert!(compio::time::timeout(WAIT, run(client.clone())).await.is_ok());
        assert_eq!(conn.sent(), vec![Bytes::from_static(b"a")]);
        assert_eq!(write.len(), 1);
    }

    #[compio::test]
    async fn test_switches_connection_on_reconnected() {
        let first = RecordingConnection::new();
        let second = RecordingConnection::new();
        let client = testing::client(first.clone(), ClientOptions::default());
        let replacement = client.with_connection(second.clone());

        let write = &client.shared.queues.write;
        write.push(Message::Data(Bytes::from_static(b"before"))).await;
        write
            .push(Message::Reconnected(Reconnected {
                client: replacement,
                cause: Fault::new(TransportError::PeerClosed, first.id()),
            }))
            .await;
        write.push(Message::Data(Bytes::from_static(b"after"))).await;
        write.push(Message::Stop).await;

        assert!(compio::time::timeout(WAIT, run(client.clone())).await.is_ok());
        assert_eq!(first.sent(), vec![Bytes::from_static(b"before")]);
        assert_eq!(second.sent(), vec![Bytes::from_static(b"after")]);
    }

    #[compio::test]
    async fn test_accepted_send_resets_reconnects() {
        let conn = RecordingConnection::new();
        let client = testing::client(conn, ClientOptions::default());
        client.shared.increment_reconnects();

        let write = &client.shared.queues.write;
        write.push(Message::Data(Bytes::from_static(b"a"))).await;
        write.push(Message::Stop).await;

        assert!(compio::time::timeout(WAIT, run(client.clone())).await.is_ok());
        assert_eq!(client.reconnect_count(), 0);
    }
}
