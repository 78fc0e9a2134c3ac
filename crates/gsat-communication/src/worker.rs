//! Serial port worker
//!
//! A single dedicated thread that owns the port for its whole lifetime.
//! Consumers talk to it only through the control-in channel and the event
//! sink, so the connection and receive buffer need no locking.
//!
//! Each tick the worker:
//! 1. applies at most one queued command,
//! 2. stops if `Exit` was applied,
//! 3. reads and publishes inbound records while running,
//! 4. reports an abort and stops if the port has gone away,
//! 5. sleeps for the tick interval.
//!
//! Whatever the exit path, `Terminated` is the last event published.

use crate::channel::CommandReceiver;
use crate::framer::LineFramer;
use crate::serial::{PortOpener, SystemPortOpener};
use crate::transport::SerialTransport;
use gsat_core::{
    ConnectionError, EventSink, SerialCommand, SerialEvent, WorkerConfig, WorkerState,
};
use std::borrow::Cow;
use std::io;
use std::thread::{self, JoinHandle};
use tokio::sync::mpsc::error::TryRecvError;

/// Name given to worker threads
pub const WORKER_THREAD_NAME: &str = "serial-port";

/// Background owner of one serial connection
pub struct SerialWorker<S: EventSink> {
    config: WorkerConfig,
    transport: SerialTransport,
    framer: LineFramer,
    commands: CommandReceiver,
    events: S,
    state: WorkerState,
    end_thread: bool,
}

impl<S: EventSink> SerialWorker<S> {
    /// Create a worker that opens its port through `opener`
    pub fn new(
        config: WorkerConfig,
        opener: impl PortOpener + 'static,
        commands: CommandReceiver,
        events: S,
    ) -> Self {
        Self {
            config,
            transport: SerialTransport::new(Box::new(opener)),
            framer: LineFramer::new(),
            commands,
            events,
            state: WorkerState::Idle,
            end_thread: false,
        }
    }

    /// Create a worker for a real serial port
    pub fn system(config: WorkerConfig, commands: CommandReceiver, events: S) -> Self {
        Self::new(config, SystemPortOpener::new(), commands, events)
    }

    /// Current state
    pub fn state(&self) -> WorkerState {
        self.state
    }

    /// Open the port and run the loop on the calling thread until it ends
    pub fn run(mut self) {
        let verbosity = self.config.verbosity;
        if verbosity.very_verbose() {
            tracing::info!("Serial worker start");
        }

        if self.open_port() {
            while self.tick() {
                thread::sleep(self.config.tick_interval());
            }
        }

        if verbosity.very_verbose() {
            tracing::info!("Serial worker exit");
        }
        self.events.emit(SerialEvent::Terminated);
    }

    /// Run the worker on its own named thread
    pub fn spawn(self) -> io::Result<WorkerHandle>
    where
        S: 'static,
    {
        let thread = thread::Builder::new()
            .name(WORKER_THREAD_NAME.to_string())
            .spawn(move || self.run())?;
        Ok(WorkerHandle { thread })
    }

    /// One loop iteration without the trailing sleep.
    ///
    /// Returns false when the loop must stop.
    fn tick(&mut self) -> bool {
        self.process_queue();

        if self.end_thread {
            return false;
        }

        if self.transport.is_open() {
            match self.state {
                WorkerState::Running => self.read_port(),
                WorkerState::Aborted => {
                    // Nothing to do until Exit arrives.
                }
                WorkerState::Idle => {
                    tracing::warn!(
                        "Serial worker in unexpected state {} while connected, moving back to {}",
                        self.state,
                        WorkerState::Running
                    );
                    self.state = WorkerState::Running;
                }
            }
            true
        } else {
            if !self.state.is_aborted() {
                if self.config.verbosity.verbose() {
                    tracing::warn!("Serial port is closed, serial worker terminating");
                }
                self.abort(String::new());
            }
            false
        }
    }

    /// Apply at most one queued command
    fn process_queue(&mut self) {
        match self.commands.try_recv() {
            Ok(SerialCommand::Exit) => {
                if self.config.verbosity.very_verbose() {
                    tracing::info!("Serial worker got Exit");
                }
                self.close_port();
                self.end_thread = true;
            }
            Ok(SerialCommand::Transmit(data)) => self.write_port(&data),
            Err(TryRecvError::Empty) => {}
            Err(TryRecvError::Disconnected) => {
                tracing::debug!("Serial worker control channel closed, exiting");
                self.close_port();
                self.end_thread = true;
            }
        }
    }

    fn open_port(&mut self) -> bool {
        self.close_port();

        match self.transport.open(&self.config.connection) {
            Ok(port) => {
                if self.config.verbosity.very_verbose() {
                    tracing::info!(
                        "Opened serial port [{}] at {} bps",
                        port,
                        self.config.connection.baud_rate
                    );
                }
                self.state = WorkerState::Running;
                self.events.emit(SerialEvent::PortOpened(port));
                true
            }
            Err(e) => {
                self.report_failure(&e);
                false
            }
        }
    }

    fn close_port(&mut self) {
        self.framer.clear();
        if self.transport.close() {
            if self.config.verbosity.very_verbose() {
                tracing::info!("Closed serial port");
            }
            self.events.emit(SerialEvent::PortClosed);
        }
    }

    fn write_port(&mut self, data: &[u8]) {
        if data.is_empty() {
            return;
        }
        if self.state != WorkerState::Running || !self.transport.is_open() {
            tracing::debug!(
                "Dropping {} byte transmit, serial worker is {}",
                data.len(),
                self.state
            );
            return;
        }

        match self.transport.write(data) {
            Ok(()) => self.log_record("->", data),
            Err(e) => self.fail(&e),
        }
    }

    fn read_port(&mut self) {
        if let Err(e) = self.drain_input() {
            self.fail(&e);
        }
    }

    /// Read until nothing is available, publishing each complete record
    fn drain_input(&mut self) -> Result<(), ConnectionError> {
        let pacing = self.config.line_pacing();

        let mut available = self.transport.poll_available()?;
        while available > 0 {
            let data = self.transport.read_available(available)?;
            for record in self.framer.feed(&data) {
                self.publish_line(&record);
                if !pacing.is_zero() {
                    thread::sleep(pacing);
                }
            }
            available = self.transport.poll_available()?;
        }
        Ok(())
    }

    fn publish_line(&mut self, record: &[u8]) {
        self.log_record("<-", record);
        let mut line = match String::from_utf8_lossy(record) {
            Cow::Borrowed(text) => text.to_string(),
            Cow::Owned(text) => {
                tracing::debug!(
                    "Received {} byte record with invalid UTF-8, replaced undecodable bytes",
                    record.len()
                );
                text
            }
        };
        line.push('\n');
        self.events.emit(SerialEvent::LineReceived(line));
    }

    /// Report a transport failure and drop the connection
    fn fail(&mut self, err: &ConnectionError) {
        self.report_failure(err);
        self.close_port();
    }

    fn report_failure(&mut self, err: &ConnectionError) {
        if self.config.verbosity.verbose() {
            tracing::error!("{}", err);
        }
        self.abort(err.to_string());
    }

    fn abort(&mut self, message: String) {
        self.state = WorkerState::Aborted;
        self.events.emit(SerialEvent::Aborted(message));
    }

    fn log_record(&self, direction: &str, record: &[u8]) {
        let verbosity = self.config.verbosity;
        if verbosity.very_verbose() {
            let hex: Vec<String> = record.iter().map(|b| format!("{:02x}", b)).collect();
            tracing::debug!(
                "[{:03}] {} ASCII:{{{}}} HEX:{{{}}}",
                record.len(),
                direction,
                String::from_utf8_lossy(record).trim(),
                hex.join(":")
            );
        } else if verbosity.verbose() {
            tracing::info!(
                "[{:03}] {} {}",
                record.len(),
                direction,
                String::from_utf8_lossy(record).trim()
            );
        }
    }
}

/// Handle onto a spawned worker thread
#[derive(Debug)]
pub struct WorkerHandle {
    thread: JoinHandle<()>,
}

impl WorkerHandle {
    /// Wait for the worker thread to finish
    pub fn join(self) -> thread::Result<()> {
        self.thread.join()
    }
}
