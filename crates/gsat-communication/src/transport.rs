//! Transport adapter
//!
//! Owns the single connection of a worker and exposes open, close, poll,
//! read and write. Every low-level failure comes back as a
//! `ConnectionError`; the adapter never publishes events itself.

use crate::serial::{PortOpener, SerialLink};
use gsat_core::{ConnectionConfig, ConnectionError};
use std::io;

/// Owner of the worker's connection
pub struct SerialTransport {
    opener: Box<dyn PortOpener>,
    link: Option<Box<dyn SerialLink>>,
}

impl SerialTransport {
    /// Create a transport that opens links through `opener`
    pub fn new(opener: Box<dyn PortOpener>) -> Self {
        Self { opener, link: None }
    }

    /// Open the configured port, returning its name.
    ///
    /// Callers close any previous connection first.
    pub fn open(&mut self, config: &ConnectionConfig) -> Result<String, ConnectionError> {
        let port = config
            .port
            .as_deref()
            .ok_or(ConnectionError::NoPortConfigured)?;

        let link = self.opener.open(port, config.baud_rate)?;
        if !link.is_open() {
            return Err(ConnectionError::open_failure(
                port,
                "port reported closed after open",
            ));
        }

        self.link = Some(link);
        Ok(port.to_string())
    }

    /// Close the connection.
    ///
    /// Returns true only if an open connection was closed.
    pub fn close(&mut self) -> bool {
        match self.link.take() {
            Some(link) => link.is_open(),
            None => false,
        }
    }

    /// Whether a connection exists and reports itself open
    pub fn is_open(&self) -> bool {
        self.link.as_ref().is_some_and(|link| link.is_open())
    }

    /// Name of the open port
    pub fn port_name(&self) -> Option<&str> {
        self.link.as_ref().map(|link| link.name())
    }

    /// Write `data` verbatim; empty input is a no-op
    pub fn write(&mut self, data: &[u8]) -> Result<(), ConnectionError> {
        if data.is_empty() {
            return Ok(());
        }

        self.open_link()?
            .write_all(data)
            .map_err(|e| ConnectionError::from_io(&e))
    }

    /// Number of bytes readable without blocking
    pub fn poll_available(&mut self) -> Result<usize, ConnectionError> {
        self.open_link()?
            .bytes_available()
            .map_err(|e| ConnectionError::from_io(&e))
    }

    /// Read up to `count` bytes; a read timeout yields no data
    pub fn read_available(&mut self, count: usize) -> Result<Vec<u8>, ConnectionError> {
        let link = self.open_link()?;
        let mut buf = vec![0u8; count];
        match link.read(&mut buf) {
            Ok(read) => {
                buf.truncate(read);
                Ok(buf)
            }
            Err(e) if matches!(e.kind(), io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock) => {
                Ok(Vec::new())
            }
            Err(e) => Err(ConnectionError::from_io(&e)),
        }
    }

    fn open_link(&mut self) -> Result<&mut Box<dyn SerialLink>, ConnectionError> {
        match self.link.as_mut() {
            Some(link) if link.is_open() => Ok(link),
            _ => Err(ConnectionError::transport("port is not open")),
        }
    }
}
