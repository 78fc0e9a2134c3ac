//! # GSAT Communication
//!
//! The serial port worker and the pieces it is built from:
//! - `serial`: device access through `serialport`, port enumeration
//! - `transport`: the connection owner the worker drives
//! - `framer`: newline record extraction
//! - `channel`: the control-in command queue
//! - `worker`: the background loop tying them together
//! - `mock`: a scripted device for tests and simulation

pub mod channel;
pub mod framer;
pub mod mock;
pub mod serial;
pub mod transport;
pub mod worker;

pub use channel::{control_channel, CommandReceiver, CommandSendError, CommandSender};
pub use framer::LineFramer;
pub use mock::{MockPort, MockPortOpener, MockStep};
pub use serial::{
    available_ports, PortOpener, SerialLink, SerialPortInfo, SystemPortOpener, READ_TIMEOUT,
};
pub use transport::SerialTransport;
pub use worker::{SerialWorker, WorkerHandle};

pub use gsat_core::{event_channel, EventDispatcher, EventSink, SerialCommand, SerialEvent};
