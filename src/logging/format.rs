//! Log output: JSON lines for ingestion, or the human-readable formatter.

use crate::config::LogConfig;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::EnvFilter;

pub struct StructuredLogger;

impl StructuredLogger {
    /// Install the global subscriber. `RUST_LOG` wins over `config.level`.
    pub fn init(config: &LogConfig) -> Result<(), TryInitError> {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));
        if config.json {
            let fmt = tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_events(FmtSpan::NONE)
                .with_thread_names(true)
                .with_writer(std::io::stderr);
            tracing_subscriber::registry().with(filter).with(fmt).try_init()
        } else {
            let fmt = tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_thread_names(true)
                .with_writer(std::io::stderr);
            tracing_subscriber::registry().with(filter).with(fmt).try_init()
        }
    }
}
