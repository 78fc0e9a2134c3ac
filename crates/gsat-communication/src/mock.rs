//! Scripted serial port for tests and simulation
//!
//! `MockPort` is a cloneable handle onto shared device state. Its opener
//! hands the worker a link that replays a script of inbound chunks, read
//! failures and disconnects, and records every write.

use crate::serial::{PortOpener, SerialLink};
use gsat_core::ConnectionError;
use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex, MutexGuard};

/// One scripted step of inbound traffic
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockStep {
    /// Bytes that become available to read
    Data(Vec<u8>),
    /// The next read fails with this message
    ReadError(String),
    /// The device reports itself closed
    Disconnect,
}

#[derive(Debug, Default)]
struct MockState {
    script: VecDeque<MockStep>,
    written: Vec<Vec<u8>>,
    open: bool,
    open_count: usize,
    last_baud_rate: Option<u32>,
    open_error: Option<ConnectionError>,
    write_error: Option<String>,
}

/// Handle onto a simulated serial device
#[derive(Debug, Clone, Default)]
pub struct MockPort {
    state: Arc<Mutex<MockState>>,
}

impl MockPort {
    /// Create a device with an empty script
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Opener that connects to this device
    pub fn opener(&self) -> MockPortOpener {
        MockPortOpener {
            state: self.state.clone(),
        }
    }

    /// Queue inbound bytes
    pub fn push_data(&self, data: impl Into<Vec<u8>>) {
        self.lock().script.push_back(MockStep::Data(data.into()));
    }

    /// Queue a read failure
    pub fn push_read_error(&self, message: impl Into<String>) {
        self.lock()
            .script
            .push_back(MockStep::ReadError(message.into()));
    }

    /// Queue a device-side disconnect
    pub fn push_disconnect(&self) {
        self.lock().script.push_back(MockStep::Disconnect);
    }

    /// Make every open attempt fail with `err`
    pub fn fail_open(&self, err: ConnectionError) {
        self.lock().open_error = Some(err);
    }

    /// Make every write fail with `message`
    pub fn fail_writes(&self, message: impl Into<String>) {
        self.lock().write_error = Some(message.into());
    }

    /// Everything written so far, one entry per write
    pub fn written(&self) -> Vec<Vec<u8>> {
        self.lock().written.clone()
    }

    /// Number of successful opens
    pub fn open_count(&self) -> usize {
        self.lock().open_count
    }

    /// Baud rate of the most recent open
    pub fn last_baud_rate(&self) -> Option<u32> {
        self.lock().last_baud_rate
    }

    /// Whether a link to this device is currently open
    pub fn is_open(&self) -> bool {
        self.lock().open
    }

    /// Scripted steps not yet consumed
    pub fn remaining_steps(&self) -> usize {
        self.lock().script.len()
    }
}

/// Opener for a `MockPort`
#[derive(Debug, Clone)]
pub struct MockPortOpener {
    state: Arc<Mutex<MockState>>,
}

impl PortOpener for MockPortOpener {
    fn open(
        &mut self,
        port: &str,
        baud_rate: u32,
    ) -> Result<Box<dyn SerialLink>, ConnectionError> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(err) = state.open_error.clone() {
            return Err(err);
        }
        state.open = true;
        state.open_count += 1;
        state.last_baud_rate = Some(baud_rate);

        Ok(Box::new(MockLink {
            state: self.state.clone(),
            name: port.to_string(),
        }))
    }
}

struct MockLink {
    state: Arc<Mutex<MockState>>,
    name: String,
}

impl MockLink {
    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl SerialLink for MockLink {
    fn bytes_available(&mut self) -> io::Result<usize> {
        let mut state = self.lock();
        match state.script.front() {
            Some(MockStep::Data(data)) => Ok(data.len()),
            Some(MockStep::ReadError(_)) => Ok(1),
            Some(MockStep::Disconnect) => {
                state.script.pop_front();
                state.open = false;
                Ok(0)
            }
            None => Ok(0),
        }
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut state = self.lock();
        match state.script.pop_front() {
            Some(MockStep::Data(mut data)) => {
                let count = data.len().min(buf.len());
                buf[..count].copy_from_slice(&data[..count]);
                if count < data.len() {
                    state.script.push_front(MockStep::Data(data.split_off(count)));
                }
                Ok(count)
            }
            Some(MockStep::ReadError(message)) => {
                Err(io::Error::new(io::ErrorKind::BrokenPipe, message))
            }
            Some(step @ MockStep::Disconnect) => {
                state.script.push_front(step);
                Ok(0)
            }
            None => Err(io::Error::new(io::ErrorKind::TimedOut, "no data")),
        }
    }

    fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        let mut state = self.lock();
        if let Some(message) = state.write_error.clone() {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, message));
        }
        state.written.push(data.to_vec());
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.lock().open
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for MockLink {
    fn drop(&mut self) {
        self.lock().open = false;
    }
}
