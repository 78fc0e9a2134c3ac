//! # GSAT
//!
//! Serial port worker for GRBL-like G-code controllers.
//!
//! ## Architecture
//!
//! GSAT is organized as a workspace with multiple crates:
//!
//! 1. **gsat-core** - Commands, events, worker state, configuration, errors
//! 2. **gsat-communication** - Serial transport, line framing, the port worker
//! 3. **gsat** - Logging setup and the `gsat` line monitor binary
//!
//! The worker owns one serial connection on a dedicated thread. Commands go
//! in through an unbounded channel, events come out through any `EventSink`.

pub use gsat_communication::{
    available_ports, control_channel, CommandSender, SerialWorker, WorkerHandle,
};
pub use gsat_core::{
    event_channel, ConfigError, ConnectionConfig, ConnectionError, EventDispatcher, EventSink,
    SerialCommand, SerialEvent, Verbosity, WorkerConfig, WorkerState,
};

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human readable, multi-line records
    #[default]
    Pretty,
    /// One JSON object per record
    Json,
}

impl LogFormat {
    /// Read the format from `GSAT_LOG_FORMAT` ("json" or anything else)
    pub fn from_env() -> Self {
        match std::env::var("GSAT_LOG_FORMAT") {
            Ok(value) if value.eq_ignore_ascii_case("json") => LogFormat::Json,
            _ => LogFormat::Pretty,
        }
    }
}

/// Initialize logging with the default configuration
///
/// Sets up structured logging with:
/// - Output on stderr, so stdout stays free for received data
/// - RUST_LOG environment variable support
/// - Pretty or JSON formatting, per `GSAT_LOG_FORMAT`
pub fn init_logging() -> anyhow::Result<()> {
    init_logging_with(LogFormat::from_env())
}

/// Initialize logging with an explicit output format
pub fn init_logging_with(format: LogFormat) -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::EnvFilter;

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(tracing::Level::INFO.as_str()));

    let registry = tracing_subscriber::registry().with(env_filter);
    let layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_level(true)
        .with_thread_names(true)
        .with_line_number(true);

    match format {
        LogFormat::Pretty => registry.with(layer.pretty()).try_init()?,
        LogFormat::Json => registry.with(layer.json()).try_init()?,
    }

    Ok(())
}
