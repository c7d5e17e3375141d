//! Streaming line framing
//!
//! ExtPlane lines are terminated by `\n`; a `\r` before it is tolerated.
//! [`LineCodec`] buffers bytes as they arrive from the transport and hands
//! out complete lines, decoded or raw.

use crate::error::DecodeError;
use crate::output::Output;

/// Maximum buffered bytes without a terminator before the buffer is discarded
pub const MAX_LINE_LEN: usize = 64 * 1024;

/// Line terminator written after every outbound command
pub const LINE_TERMINATOR: u8 = b'\n';

/// Frame one encoded line for the wire
pub fn frame_line(line: &str) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(line.len() + 1);
    bytes.extend_from_slice(line.as_bytes());
    bytes.push(LINE_TERMINATOR);
    bytes
}

/// Streaming ExtPlane line codec
pub struct LineCodec {
    buffer: Vec<u8>,
}

impl LineCodec {
    /// Create a new line codec
    pub fn new() -> Self {
        Self {
            buffer: Vec::with_capacity(256),
        }
    }

    /// Push raw bytes into the codec's buffer
    pub fn push_bytes(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);

        // A runaway line with no terminator is garbage; drop it and resync
        if self.buffer.len() > MAX_LINE_LEN && !self.buffer.contains(&LINE_TERMINATOR) {
            tracing::warn!(
                "Discarding {} buffered bytes without a line terminator",
                self.buffer.len()
            );
            self.buffer.clear();
        }
    }

    /// Extract the next complete line, without its terminator
    ///
    /// Bytes that are not valid UTF-8 are replaced rather than rejected, so
    /// the decoder reports a typed error for them instead of the stream
    /// stalling.
    pub fn next_line(&mut self) -> Option<String> {
        let term_pos = self.buffer.iter().position(|&b| b == LINE_TERMINATOR)?;
        let line_bytes: Vec<u8> = self.buffer.drain(..=term_pos).collect();

        let mut line = &line_bytes[..line_bytes.len() - 1];
        if let Some(stripped) = line.strip_suffix(b"\r") {
            line = stripped;
        }

        Some(String::from_utf8_lossy(line).into_owned())
    }

    /// Extract and decode the next complete line
    ///
    /// Returns the raw line alongside the decode result so callers can
    /// report which line failed.
    pub fn next_output(&mut self) -> Option<(String, Result<Output, DecodeError>)> {
        let line = self.next_line()?;
        let output = Output::decode(&line);
        Some((line, output))
    }

    /// Bytes currently buffered without a terminator
    pub fn pending_len(&self) -> usize {
        self.buffer.len()
    }

    /// Clear the internal buffer
    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

impl Default for LineCodec {
    fn default() -> Self {
        Self::new()
    }
}
