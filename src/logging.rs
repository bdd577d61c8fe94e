//! Logging setup
//!
//! Log lines go to stdout and to `collector.log` in the working
//! directory. Both sinks honor `RUST_LOG`, defaulting to "info".

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

fn level_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Install the collector's tracing subscriber.
///
/// The file appender guard is leaked on purpose: the non-blocking writer
/// must stay alive for the whole process lifetime.
pub fn init_logging() {
    let (log_file, guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::never(".", "collector.log"));

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stdout)
                .with_filter(level_filter()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(log_file)
                .with_ansi(false)
                .with_filter(level_filter()),
        )
        .init();

    std::mem::forget(guard);
}
