//! Channel protocol between the serial worker and its consumers
//!
//! Provides:
//! - `SerialCommand`, the control-in messages consumed by the worker
//! - `SerialEvent`, the event-out notifications produced by the worker
//! - `EventSink`, the capability the worker publishes events through
//! - `EventDispatcher`, a fan-out sink for several subscribers

use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Commands accepted by the serial worker, applied in FIFO order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SerialCommand {
    /// Close the port and stop the worker; later commands are never applied
    Exit,
    /// Write the bytes verbatim to the port
    Transmit(Vec<u8>),
}

impl SerialCommand {
    /// Build a transmit command from anything byte-like
    pub fn transmit(data: impl Into<Vec<u8>>) -> Self {
        SerialCommand::Transmit(data.into())
    }
}

/// Notifications published by the serial worker
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SerialEvent {
    /// The port was opened
    PortOpened(String),
    /// The port was closed
    PortClosed,
    /// A complete record arrived; always ends in a single `'\n'`
    LineReceived(String),
    /// The connection failed; the message may be empty
    Aborted(String),
    /// The worker has stopped and will publish nothing else
    Terminated,
}

impl SerialEvent {
    /// Returns true for the final event of a worker
    pub fn is_terminal(&self) -> bool {
        matches!(self, SerialEvent::Terminated)
    }
}

impl std::fmt::Display for SerialEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SerialEvent::PortOpened(port) => write!(f, "Port opened: {}", port),
            SerialEvent::PortClosed => write!(f, "Port closed"),
            SerialEvent::LineReceived(line) => write!(f, "<- {}", line.trim_end()),
            SerialEvent::Aborted(msg) if msg.is_empty() => write!(f, "Aborted"),
            SerialEvent::Aborted(msg) => write!(f, "Aborted: {}", msg.trim_end()),
            SerialEvent::Terminated => write!(f, "Terminated"),
        }
    }
}

/// Anything that can receive worker events, possibly on another thread.
///
/// Emitting never fails from the worker's point of view: a sink whose
/// consumers have gone away drops the event.
pub trait EventSink: Send {
    /// Deliver one event
    fn emit(&self, event: SerialEvent);
}

impl EventSink for mpsc::UnboundedSender<SerialEvent> {
    fn emit(&self, event: SerialEvent) {
        if let Err(e) = self.send(event) {
            tracing::trace!("Dropping serial event, receiver closed: {:?}", e.0);
        }
    }
}

impl<S: EventSink + Sync> EventSink for Arc<S> {
    fn emit(&self, event: SerialEvent) {
        (**self).emit(event)
    }
}

/// Event dispatcher for publishing worker events to several subscribers
///
/// Every subscriber gets its own unbounded queue, so a slow reader never
/// loses events. Subscribers whose receiver was dropped are pruned on the
/// next emit.
#[derive(Clone, Default)]
pub struct EventDispatcher {
    subscribers: Arc<Mutex<Vec<mpsc::UnboundedSender<SerialEvent>>>>,
}

impl EventDispatcher {
    /// Create a new event dispatcher with no subscribers
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to events published from now on
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<SerialEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.lock().push(tx);
        rx
    }

    /// Get number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        let mut subscribers = self.subscribers.lock();
        subscribers.retain(|tx| !tx.is_closed());
        subscribers.len()
    }
}

impl EventSink for EventDispatcher {
    fn emit(&self, event: SerialEvent) {
        let mut subscribers = self.subscribers.lock();
        subscribers.retain(|tx| tx.send(event.clone()).is_ok());
        if subscribers.is_empty() {
            tracing::trace!("Dropping serial event, no subscribers: {:?}", event);
        }
    }
}

/// Create the unbounded event-out channel
pub fn event_channel() -> (
    mpsc::UnboundedSender<SerialEvent>,
    mpsc::UnboundedReceiver<SerialEvent>,
) {
    mpsc::unbounded_channel()
}
