use tracing::Span;
use tracing_subscriber::EnvFilter;
use crate::config::{LogFormat, LoggingConfig};

/// Installs the global subscriber. `RUST_LOG` overrides the configured level.
/// Safe to call more than once; later calls are ignored.
pub fn init_tracing(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.level));

    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(false);

    let installed = match config.format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Pretty => builder.try_init(),
    };

    if installed.is_err() {
        tracing::debug!("Tracing subscriber already installed");
    }
}

pub fn trace_source_resolution(source_id: &str) -> Span {
    tracing::info_span!(
        "source_resolution",
        source_id = %source_id,
    )
}

pub fn trace_aggregation(source_count: usize) -> Span {
    tracing::info_span!(
        "aggregation",
        sources = source_count,
    )
}
