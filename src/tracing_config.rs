use tracing_appender::{non_blocking::WorkerGuard, rolling};
use tracing_subscriber::{EnvFilter, Layer, layer::SubscriberExt, util::SubscriberInitExt};

/// Console verbosity when `RUST_LOG` is not set
const DEFAULT_CONSOLE_FILTER: &str = "info,sqlx=warn";

/// Install the global subscriber: console at INFO (or `RUST_LOG`) and a
/// daily rolling file under `log_dir` at DEBUG
///
/// The returned guard owns the background writer of the file layer. Hold it
/// for the life of the process; dropping it flushes and stops file logging.
pub fn init_tracing(log_dir: &str) -> WorkerGuard {
    // review_backend.log.2025-11-01, review_backend.log.2025-11-02, ...
    let file_appender = rolling::daily(log_dir, "review_backend.log");
    let (non_blocking_file, guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking_file)
        .with_ansi(false)
        .with_filter(EnvFilter::new("debug"));

    let console_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_CONSOLE_FILTER));
    let console_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stdout)
        .with_filter(console_filter);

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .init();

    tracing::info!(log_dir, "Tracing initialized (console=INFO+, file=DEBUG+)");
    guard
}
