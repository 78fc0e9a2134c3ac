//! Control-in channel
//!
//! An unbounded FIFO of `SerialCommand`s. Any number of `CommandSender`
//! clones may feed one worker; the worker peeks it once per tick and never
//! blocks on it.

use gsat_core::SerialCommand;
use tokio::sync::mpsc;

/// Receiving half of the control-in channel, owned by the worker
pub type CommandReceiver = mpsc::UnboundedReceiver<SerialCommand>;

/// Error returned when the worker is gone
pub type CommandSendError = mpsc::error::SendError<SerialCommand>;

/// Sending half of the control-in channel
#[derive(Debug, Clone)]
pub struct CommandSender {
    tx: mpsc::UnboundedSender<SerialCommand>,
}

impl CommandSender {
    /// Queue a command
    pub fn send(&self, command: SerialCommand) -> Result<(), CommandSendError> {
        self.tx.send(command)
    }

    /// Queue bytes to be written verbatim
    pub fn transmit(&self, data: impl Into<Vec<u8>>) -> Result<(), CommandSendError> {
        self.send(SerialCommand::transmit(data))
    }

    /// Ask the worker to close the port and stop
    pub fn exit(&self) -> Result<(), CommandSendError> {
        self.send(SerialCommand::Exit)
    }

    /// True once the worker has dropped its receiver
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Create the control-in channel
pub fn control_channel() -> (CommandSender, CommandReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (CommandSender { tx }, rx)
}
