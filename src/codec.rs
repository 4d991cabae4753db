//! reads the server's half of the beanstalkd TCP protocol.
use std::io;

use bytes::{Bytes, BytesMut};
use itertools::Itertools;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::trace;

/// Reads server replies from a stream: CRLF-terminated status lines, plus
/// the sized data chunks that `RESERVED`/`FOUND`/`OK` lines announce.
pub struct FrameReader<T: AsyncRead + Unpin> {
    /// Bytes read in but not yet consumed as a line or chunk.
    buf: BytesMut,
    /// Index in buf from which a valid CRLF pair may appear (and before
    /// which a CRLF sequence hasn't been seen).
    scan_from: usize,
    reader: T,
    /// On a reading error, this field is set and its value returned once the
    /// buffer is drained of pending lines.
    pending_error: Option<io::Error>,
}

impl<T: AsyncRead + Unpin> FrameReader<T> {
    /// Reads one status line, without its CRLF terminator. Returns None on a
    /// clean end-of-stream, discarding any partly-read line.
    ///
    /// On a read error, the error is surfaced after all complete lines in
    /// the internal buffer have been handed out.
    pub async fn read_line(&mut self) -> io::Result<Option<Bytes>> {
        loop {
            // Scan from one position before the newest bytes in case a \r
            // arrived in an earlier read and its \n in this one; skipping the
            // already-scanned prefix keeps this O(bytes_read).
            if let Some(eol) = self
                .buf
                .iter()
                .skip(self.scan_from)
                .tuple_windows::<(_, _)>()
                .position(|x| x == (&b'\r', &b'\n'))
            {
                let line = self.buf.split_to(self.scan_from + eol + 2).freeze();
                let line = line.slice(0..line.len() - 2);
                self.scan_from = 0;

                trace!(line = %line.escape_ascii(), "received");

                return Ok(Some(line));
            }

            let n = self.fill().await;
            self.scan_from = self.buf.len().saturating_sub(n + 1);

            if n == 0 {
                return match self.pending_error.take() {
                    Some(e) => Err(e),
                    None => Ok(None),
                };
            }
        }
    }

    /// Reads a data chunk of exactly `n_bytes` bytes plus its trailing CRLF,
    /// which is consumed but not returned. An end-of-stream inside a chunk
    /// is an error: the server announced bytes it never sent.
    pub async fn read_chunk(&mut self, n_bytes: usize) -> io::Result<Bytes> {
        while self.buf.len() < n_bytes + 2 {
            if self.fill().await == 0 {
                return Err(self.pending_error.take().unwrap_or_else(|| {
                    io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "stream ended inside a data chunk",
                    )
                }));
            }
        }

        let chunk = self.buf.split_to(n_bytes + 2).freeze();
        self.scan_from = 0;

        if &chunk[n_bytes..] != b"\r\n" {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "data chunk not CRLF-terminated",
            ));
        }

        trace!(n_bytes, "received data chunk");

        Ok(chunk.slice(0..n_bytes))
    }

    /// One read into the buffer, stashing errors for later surfacing.
    /// Returns 0 on end-of-stream or error.
    async fn fill(&mut self) -> usize {
        match self.reader.read_buf(&mut self.buf).await {
            Ok(n) => n,
            Err(e) => {
                self.pending_error = Some(e);
                0
            },
        }
    }
}

impl<T: AsyncRead + Unpin> From<T> for FrameReader<T> {
    fn from(value: T) -> Self {
        Self {
            buf: BytesMut::new(),
            scan_from: 0,
            reader: value,
            pending_error: None,
        }
    }
}
