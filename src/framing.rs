//! Message framing
//!
//! Turns the raw byte stream of a connection into text messages. A message
//! is whatever one awaited read returns plus every byte that can be pulled
//! off the socket without waiting.

use std::io;

use tokio::io::AsyncReadExt;
use tokio::net::tcp::OwnedReadHalf;

/// Best-effort message reader over the read half of a connection.
///
/// There are no delimiters or length prefixes on the wire, so framing
/// follows arrival timing: two messages sent in quick succession may arrive
/// as one frame, and one large message may land split across frames when
/// the sender's writes straddle the poll. Callers must treat frame
/// boundaries as advisory.
pub struct FrameReader {
    reader: OwnedReadHalf,
    buf: Vec<u8>,
    max_message_bytes: usize,
}

impl FrameReader {
    pub fn new(reader: OwnedReadHalf, read_buffer_bytes: usize, max_message_bytes: usize) -> Self {
        Self {
            reader,
            buf: vec![0u8; read_buffer_bytes],
            max_message_bytes,
        }
    }

    /// Reads the next message, waiting until at least one byte has arrived.
    ///
    /// Returns `Ok(None)` once the peer has closed the connection. The
    /// accumulated bytes are decoded as UTF-8 in a single pass after the
    /// frame is complete, so a multibyte character split across socket
    /// reads within one frame stays intact; invalid sequences are replaced
    /// rather than rejected.
    pub async fn next_frame(&mut self) -> io::Result<Option<String>> {
        let mut frame: Vec<u8> = Vec::new();

        let n = self.reader.read(&mut self.buf).await?;
        if n == 0 {
            return Ok(None);
        }
        frame.extend_from_slice(&self.buf[..n]);

        // Drain whatever else has already arrived, without waiting. The cap
        // is soft: an oversized burst continues as the next frame.
        while frame.len() < self.max_message_bytes {
            match self.reader.try_read(&mut self.buf) {
                Ok(0) => break, // closed; reported as None on the next call
                Ok(n) => frame.extend_from_slice(&self.buf[..n]),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) => return Err(e),
            }
        }

        Ok(Some(String::from_utf8_lossy(&frame).into_owned()))
    }
}
