//! Inbound line framing
//!
//! Turns the raw byte stream from the controller into newline-delimited
//! records. Splitting happens on `b'\n'` only, so a `'\r'` sent by the
//! controller stays part of the record. Empty records are dropped.

/// Record delimiter
pub const DELIMITER: u8 = b'\n';

/// Receive buffer plus line extraction
#[derive(Debug, Default, Clone)]
pub struct LineFramer {
    buffer: Vec<u8>,
}

impl LineFramer {
    /// Create an empty framer
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `raw` and return every record completed by it, in order.
    ///
    /// Each record excludes its delimiter. Bytes after the last delimiter
    /// stay buffered for the next call.
    pub fn feed(&mut self, raw: &[u8]) -> Vec<Vec<u8>> {
        let scan_from = self.buffer.len();
        self.buffer.extend_from_slice(raw);

        let mut records = Vec::new();
        let mut start = 0;
        let mut search = scan_from;
        while let Some(offset) = self.buffer[search..].iter().position(|&b| b == DELIMITER) {
            let end = search + offset;
            if end > start {
                records.push(self.buffer[start..end].to_vec());
            }
            start = end + 1;
            search = start;
        }

        self.buffer.drain(..start);
        records
    }

    /// Bytes waiting for a delimiter
    pub fn pending(&self) -> &[u8] {
        &self.buffer
    }

    /// Discard any partial record
    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}
