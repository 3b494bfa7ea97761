use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Quieter defaults with focused sync summaries. Override via RUST_LOG.
pub const DEFAULT_LOG_FILTER: &str =
    "info,sync::summary=info,sync::reaper=info,sqlx=warn";

/// Installs the global subscriber: `RUST_LOG` (or the default filter) plus
/// the fmt layer. Call once, before the first log line.
pub fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
