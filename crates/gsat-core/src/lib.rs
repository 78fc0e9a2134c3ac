//! # GSAT Core
//!
//! Core types shared by the serial worker and the rest of the application:
//! the command/event channel protocol, worker state, configuration, and
//! error types.

pub mod config;
pub mod error;
pub mod event;
pub mod state;

pub use config::{ConnectionConfig, Verbosity, WorkerConfig, NO_PORT};
pub use error::{ConfigError, ConnectionError};
pub use event::{event_channel, EventDispatcher, EventSink, SerialCommand, SerialEvent};
pub use state::WorkerState;
