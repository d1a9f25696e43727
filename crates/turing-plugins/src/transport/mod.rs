//! `Content-Length` framing over byte streams.
//!
//! Each message is framed as:
//! ```text
//! Content-Length: <length>\r\n
//! \r\n
//! <payload>
//! ```
//!
//! The same framing is used in both directions, over the plugin's stdin and
//! stdout.

use std::io::{self, BufRead, BufReader, BufWriter, Read, Write};

use crate::error::TransportError;

/// Largest body accepted by [`FrameReader`].
pub const MAX_FRAME_BYTES: usize = 16 * 1024 * 1024;

const CONTENT_LENGTH: &str = "content-length";

/// Reads framed messages.
pub struct FrameReader<R> {
    reader: BufReader<R>,
}

impl<R: Read> FrameReader<R> {
    /// Wraps a byte stream.
    pub fn new(reader: R) -> Self {
        Self {
            reader: BufReader::new(reader),
        }
    }

    /// Receives one message body (blocks until complete).
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Closed`] when the stream ends before a new
    /// frame starts, [`TransportError::MissingContentLength`] or
    /// [`TransportError::InvalidHeader`] for malformed headers,
    /// [`TransportError::FrameTooLarge`] for oversized bodies, and
    /// [`TransportError::Io`] when reading fails or the stream ends mid-frame.
    pub fn receive(&mut self) -> Result<Vec<u8>, TransportError> {
        let length = self.read_headers()?;
        if length > MAX_FRAME_BYTES {
            return Err(TransportError::FrameTooLarge {
                length,
                limit: MAX_FRAME_BYTES,
            });
        }
        let mut content = vec![0u8; length];
        self.reader.read_exact(&mut content)?;
        Ok(content)
    }

    fn read_headers(&mut self) -> Result<usize, TransportError> {
        let mut content_length: Option<usize> = None;
        let mut started = false;

        loop {
            let mut line = String::new();
            if self.reader.read_line(&mut line)? == 0 {
                if started {
                    return Err(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "connection closed while reading headers",
                    )
                    .into());
                }
                return Err(TransportError::Closed);
            }

            let trimmed = line.trim();
            if trimmed.is_empty() {
                if started {
                    break;
                }
                continue;
            }
            started = true;

            let (name, value) = trimmed
                .split_once(':')
                .ok_or(TransportError::InvalidHeader)?;
            if name.trim().eq_ignore_ascii_case(CONTENT_LENGTH) {
                content_length = Some(
                    value
                        .trim()
                        .parse()
                        .map_err(|_| TransportError::InvalidHeader)?,
                );
            }
        }

        content_length.ok_or(TransportError::MissingContentLength)
    }
}

/// Writes framed messages.
pub struct FrameWriter<W: Write> {
    writer: BufWriter<W>,
}

impl<W: Write> FrameWriter<W> {
    /// Wraps a byte sink.
    pub fn new(writer: W) -> Self {
        Self {
            writer: BufWriter::new(writer),
        }
    }

    /// Sends one message body and flushes.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Io`] if writing fails.
    pub fn send(&mut self, message: &[u8]) -> Result<(), TransportError> {
        write!(self.writer, "Content-Length: {}\r\n\r\n", message.len())?;
        self.writer.write_all(message)?;
        self.writer.flush()?;
        Ok(())
    }
}
