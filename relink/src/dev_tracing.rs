//! Development helper: initialize a tracing subscriber when `RUST_LOG` is set.

/// Install a `fmt` subscriber filtered by `RUST_LOG`.
///
/// Tests and demos call `relink::dev_tracing::init_tracing()` to see the
/// client's `[WritePump]`, `[FaultMonitor]` and `[TcpConnection]` logs. No-op
/// when `RUST_LOG` is unset or a global subscriber is already installed.
pub fn init_tracing() {
    use std::env;

    if env::var("RUST_LOG").is_ok() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    }
}
