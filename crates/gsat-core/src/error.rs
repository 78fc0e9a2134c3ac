//! Error handling for GSAT
//!
//! Provides the error types shared by the serial worker and its consumers:
//! - Connection errors (opening, reading, writing a serial port)
//! - Configuration errors (loading and validating worker settings)
//!
//! All error types use `thiserror` for ergonomic error handling.

use thiserror::Error;

/// Connection error type
///
/// Every failure the serial transport can produce is mapped to one of these
/// kinds. The worker turns each of them into a single `Aborted` event whose
/// message is the `Display` text of the error.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectionError {
    /// The configuration carries the "no port" sentinel
    #[error("There is no valid serial port selected")]
    NoPortConfigured,

    /// The device could not be opened (absent, busy, permission, OS error)
    #[error("Failed to open port {port}: {reason}")]
    OpenFailure {
        /// The name of the port that failed to open.
        port: String,
        /// The reason the port failed to open.
        reason: String,
    },

    /// An I/O error occurred on an otherwise open connection
    #[error("Serial port I/O error: {reason}")]
    TransportFailure {
        /// The reason for the transport failure.
        reason: String,
    },

    /// Anything not classified above
    #[error("Unexpected serial port error: {reason}")]
    UnexpectedFailure {
        /// The error message.
        reason: String,
    },
}

impl ConnectionError {
    /// Create an open failure for the given port
    pub fn open_failure(port: impl Into<String>, reason: impl ToString) -> Self {
        Self::OpenFailure {
            port: port.into(),
            reason: reason.to_string(),
        }
    }

    /// Create a transport failure
    pub fn transport(reason: impl ToString) -> Self {
        Self::TransportFailure {
            reason: reason.to_string(),
        }
    }

    /// Create an unexpected failure
    pub fn unexpected(reason: impl ToString) -> Self {
        Self::UnexpectedFailure {
            reason: reason.to_string(),
        }
    }

    /// Map an I/O error raised while reading or writing an open connection.
    ///
    /// Errors that carry an OS error code or a recognised kind are transport
    /// failures; bare `Other` errors without a code are unexpected.
    pub fn from_io(err: &std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::Other && err.raw_os_error().is_none() {
            Self::unexpected(err)
        } else {
            Self::transport(err)
        }
    }
}

/// Configuration error type
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML deserialization error.
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// JSON deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The configuration file format is not supported.
    #[error("Unsupported config format: {0}")]
    UnsupportedFormat(String),

    /// A configuration value is invalid.
    #[error("Invalid setting '{key}': {reason}")]
    InvalidValue {
        /// The offending key.
        key: String,
        /// Why the value was rejected.
        reason: String,
    },
}
