//! Line-oriented client that polls a server and survives restarts.
//!
//! Writes "hello" halfway through 20 polling reads and prints every reply,
//! reconnect and lifecycle event. Kill and restart the server while it runs
//! to watch the client recover.
//!
//! Run with:
//! ```bash
//! RUST_LOG=relink=debug cargo run --example line_client -- 127.0.0.1:7000
//! ```

use relink::prelude::*;
use relink::{create_monitor, dev_tracing};
use std::time::Duration;

#[compio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dev_tracing::init_tracing();

    let endpoint: Endpoint = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "127.0.0.1:7000".to_string())
        .parse()?;

    let (events, monitor) = create_monitor();
    compio::runtime::spawn(async move {
        while let Ok(event) = monitor.recv_async().await {
            println!("[event] {event}");
        }
    })
    .detach();

    let options = ClientOptions::default()
        .with_handler(LineCodec::new)
        .with_reconnect_ivl(Duration::from_millis(100))
        .with_reconnect_ivl_max(Duration::from_secs(2))
        .with_monitor(events);

    let client = Client::connect(endpoint, options).await?;

    for i in 0..20 {
        if i == 10 {
            client.write("hello").await?;
        }
        match client.read_default().await {
            Some(Message::Data(line)) => {
                println!("[{i:2}] {}", String::from_utf8_lossy(&line));
            }
            Some(Message::Reconnected(r)) => {
                println!("[{i:2}] reconnected ({}): {}", r.client.connection_id(), r.cause.error);
            }
            Some(Message::Poison) => {
                println!("[{i:2}] client shut down");
                break;
            }
            Some(other) => println!("[{i:2}] {other:?}"),
            None => println!("[{i:2}] no reply"),
        }
    }

    if let Some(fault) = client.read_error_timeout(Duration::from_millis(10)).await {
        println!("error: {}", fault.error);
    }

    client.close().await;
    Ok(())
}
