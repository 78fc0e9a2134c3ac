//! Serial worker configuration
//!
//! Provides the connection parameters and worker timing settings.
//! Supports JSON and TOML files, selected by file extension.
//!
//! The serial framing itself is fixed (8 data bits, no parity, one stop bit,
//! no flow control) and is not configurable.

use crate::error::ConfigError;
use serde::{Deserialize, Deserializer, Serialize};
use std::path::Path;
use std::time::Duration;

/// Port name that stands for "no port selected"
pub const NO_PORT: &str = "None";

/// Default baud rate for GRBL controllers
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// Default sleep between worker ticks
pub const DEFAULT_TICK_INTERVAL_MS: u64 = 10;

/// Default pause after each received record
pub const DEFAULT_LINE_PACING_MS: u64 = 10;

/// Diagnostics level of the worker
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verbosity {
    /// Lifecycle warnings only
    #[default]
    Quiet,
    /// One log line per transmitted or received record
    Verbose,
    /// Everything, including hex dumps of each record
    VeryVerbose,
}

impl Verbosity {
    /// Per-record logging enabled
    pub fn verbose(&self) -> bool {
        *self >= Verbosity::Verbose
    }

    /// Lifecycle and hex-dump logging enabled
    pub fn very_verbose(&self) -> bool {
        *self >= Verbosity::VeryVerbose
    }
}

/// Serial connection parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Port name (e.g., "/dev/ttyUSB0", "COM3"); `None` when no port is selected
    #[serde(default, deserialize_with = "deserialize_port")]
    pub port: Option<String>,
    /// Baud rate
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
}

impl ConnectionConfig {
    /// Create connection parameters, mapping the "no port" sentinel to `None`
    pub fn new(port: impl AsRef<str>, baud_rate: u32) -> Self {
        Self {
            port: port_from_name(port.as_ref()),
            baud_rate,
        }
    }

    /// Connection parameters with no port selected
    pub fn no_port() -> Self {
        Self {
            port: None,
            baud_rate: DEFAULT_BAUD_RATE,
        }
    }

    /// Port name for display, with the sentinel for an unselected port
    pub fn port_name(&self) -> &str {
        self.port.as_deref().unwrap_or(NO_PORT)
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self::no_port()
    }
}

/// Complete worker configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Serial connection parameters
    pub connection: ConnectionConfig,
    /// Sleep between worker ticks in milliseconds
    pub tick_interval_ms: u64,
    /// Pause after each received record in milliseconds (0 disables)
    pub line_pacing_ms: u64,
    /// Diagnostics level
    pub verbosity: Verbosity,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            connection: ConnectionConfig::default(),
            tick_interval_ms: DEFAULT_TICK_INTERVAL_MS,
            line_pacing_ms: DEFAULT_LINE_PACING_MS,
            verbosity: Verbosity::default(),
        }
    }
}

impl WorkerConfig {
    /// Create a configuration for the given connection with default timings
    pub fn new(connection: ConnectionConfig) -> Self {
        Self {
            connection,
            ..Self::default()
        }
    }

    /// Set the diagnostics level
    pub fn with_verbosity(mut self, verbosity: Verbosity) -> Self {
        self.verbosity = verbosity;
        self
    }

    /// Set the tick interval and record pacing
    ///
    /// Both are stored in whole milliseconds: a non-zero duration below one
    /// millisecond rounds up to 1, and anything beyond `u64::MAX` saturates.
    pub fn with_timing(mut self, tick_interval: Duration, line_pacing: Duration) -> Self {
        self.tick_interval_ms = duration_to_millis(tick_interval);
        self.line_pacing_ms = duration_to_millis(line_pacing);
        self
    }

    /// Sleep between ticks
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    /// Pause after each received record
    pub fn line_pacing(&self) -> Duration {
        Duration::from_millis(self.line_pacing_ms)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.connection.baud_rate == 0 {
            return Err(ConfigError::InvalidValue {
                key: "connection.baud_rate".to_string(),
                reason: "must be positive".to_string(),
            });
        }
        Ok(())
    }

    /// Parse and validate a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate a JSON document
    pub fn from_json_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a `.toml` or `.json` file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let config = match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Self::from_toml_str(&content)?,
            Some("json") => Self::from_json_str(&content)?,
            other => {
                return Err(ConfigError::UnsupportedFormat(
                    other.unwrap_or_default().to_string(),
                ))
            }
        };
        tracing::debug!("Loaded worker configuration from {}", path.display());
        Ok(config)
    }
}

fn duration_to_millis(duration: Duration) -> u64 {
    let millis = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
    if millis == 0 && !duration.is_zero() {
        1
    } else {
        millis
    }
}

fn default_baud_rate() -> u32 {
    DEFAULT_BAUD_RATE
}

fn port_from_name(name: &str) -> Option<String> {
    let name = name.trim();
    if name.is_empty() || name == NO_PORT {
        None
    } else {
        Some(name.to_string())
    }
}

fn deserialize_port<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let name = Option::<String>::deserialize(deserializer)?;
    Ok(name.as_deref().and_then(port_from_name))
}
