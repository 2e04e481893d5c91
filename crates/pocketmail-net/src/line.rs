//! Buffered line I/O shared by the IMAP, POP3 and SMTP clients.
//!
//! All three protocols exchange CRLF-terminated lines. This module reads
//! one line at a time (accepting a bare LF as well), writes command lines
//! with the terminator appended and keeps exact byte counters for progress
//! reporting.

#![allow(clippy::missing_errors_doc)]

use bytes::BytesMut;
use tokio::io::{
    AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader,
};
use tracing::trace;

use crate::stream::TlsUpgrade;
use crate::{Error, Result};

/// Default buffer size for reading and writing.
const DEFAULT_BUFFER_SIZE: usize = 8192;

/// Maximum line length to prevent memory exhaustion.
pub const MAX_LINE_LENGTH: usize = 1024 * 1024; // 1 MB

/// A line-oriented connection to a mail server.
pub struct LineConnection<S> {
    reader: BufReader<S>,
    write_buffer: BytesMut,
    bytes_received: u64,
    bytes_sent: u64,
}

impl<S> LineConnection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Wraps an already-connected stream.
    pub fn new(stream: S) -> Self {
        Self {
            reader: BufReader::with_capacity(DEFAULT_BUFFER_SIZE, stream),
            write_buffer: BytesMut::with_capacity(DEFAULT_BUFFER_SIZE),
            bytes_received: 0,
            bytes_sent: 0,
        }
    }

    /// Writes one command line followed by CRLF and flushes.
    pub async fn send(&mut self, line: &str) -> Result<()> {
        self.write_buffer.clear();
        self.write_buffer.extend_from_slice(line.as_bytes());
        self.write_buffer.extend_from_slice(b"\r\n");

        let stream = self.reader.get_mut();
        stream.write_all(&self.write_buffer).await?;
        stream.flush().await?;

        self.bytes_sent += self.write_buffer.len() as u64;
        trace!(bytes = self.write_buffer.len(), "sent line");
        Ok(())
    }

    /// Writes raw bytes without adding a terminator.
    pub async fn send_raw(&mut self, data: &[u8]) -> Result<()> {
        let stream = self.reader.get_mut();
        stream.write_all(data).await?;
        stream.flush().await?;

        self.bytes_sent += data.len() as u64;
        trace!(bytes = data.len(), "sent raw data");
        Ok(())
    }

    /// Reads one line and returns it without its terminator.
    ///
    /// Invalid UTF-8 is replaced rather than rejected; servers routinely
    /// send 8-bit header bytes.
    pub async fn receive(&mut self) -> Result<String> {
        let line = self.receive_bytes().await?;
        Ok(String::from_utf8_lossy(&line).into_owned())
    }

    /// Reads one line as raw bytes, without its terminator.
    pub async fn receive_bytes(&mut self) -> Result<Vec<u8>> {
        let mut line = Vec::new();

        loop {
            let buf = self.reader.fill_buf().await?;
            if buf.is_empty() {
                return Err(Error::Closed);
            }

            if let Some(pos) = buf.iter().position(|&b| b == b'\n') {
                line.extend_from_slice(&buf[..=pos]);
                self.reader.consume(pos + 1);
                break;
            }

            let len = buf.len();
            line.extend_from_slice(buf);
            self.reader.consume(len);

            if line.len() > MAX_LINE_LENGTH {
                return Err(Error::LineTooLong(MAX_LINE_LENGTH));
            }
        }

        self.bytes_received += line.len() as u64;

        line.pop();
        if line.last() == Some(&b'\r') {
            line.pop();
        }
        Ok(line)
    }

    /// Reads exactly `len` bytes, used for IMAP literals.
    pub async fn read_exact(&mut self, len: usize) -> Result<Vec<u8>> {
        let mut data = vec![0u8; len];
        self.reader.read_exact(&mut data).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::UnexpectedEof {
                Error::Closed
            } else {
                Error::Io(e)
            }
        })?;
        self.bytes_received += len as u64;
        Ok(data)
    }

    /// Waits until unread data is available, without consuming it.
    ///
    /// Cancel-safe, so it can be raced against a timer before a
    /// [`receive`](Self::receive). Returns [`Error::Closed`] at EOF.
    pub async fn wait_readable(&mut self) -> Result<()> {
        if self.reader.fill_buf().await?.is_empty() {
            return Err(Error::Closed);
        }
        Ok(())
    }

    /// Total bytes consumed by reads, terminators included.
    #[must_use]
    pub const fn bytes_received(&self) -> u64 {
        self.bytes_received
    }

    /// Total bytes written.
    #[must_use]
    pub const fn bytes_sent(&self) -> u64 {
        self.bytes_sent
    }

    /// Number of bytes read from the socket but not yet consumed.
    #[must_use]
    pub fn buffered(&self) -> usize {
        self.reader.buffer().len()
    }

    /// Gets a reference to the underlying stream.
    pub fn get_ref(&self) -> &S {
        self.reader.get_ref()
    }

    /// Closes the write half of the connection.
    pub async fn shutdown(&mut self) -> Result<()> {
        self.reader.get_mut().shutdown().await?;
        Ok(())
    }
}

impl<S: TlsUpgrade> LineConnection<S> {
    /// Re-wraps the plaintext stream in TLS.
    ///
    /// Must be called right after the server accepted STARTTLS/STLS. If
    /// the server already sent bytes past that reply they would belong to
    /// the plaintext session, so the upgrade fails with
    /// [`Error::BufferedResidue`] instead of discarding them.
    pub async fn start_tls(self, host: &str) -> Result<Self> {
        let residue = self.buffered();
        if residue > 0 {
            return Err(Error::BufferedResidue(residue));
        }

        let Self {
            reader,
            write_buffer,
            bytes_received,
            bytes_sent,
        } = self;

        let stream = reader.into_inner().upgrade(host).await?;

        Ok(Self {
            reader: BufReader::with_capacity(DEFAULT_BUFFER_SIZE, stream),
            write_buffer,
            bytes_received,
            bytes_sent,
        })
    }

    /// Returns true if the connection is TLS-encrypted.
    pub fn is_tls(&self) -> bool {
        self.reader.get_ref().is_tls()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::similar_names)]
mod tests {
    use tokio_test::io::Builder;

    use super::*;
    use crate::testing::ScriptedStream;

    #[tokio::test]
    async fn test_receive_strips_terminators() {
        let mock = Builder::new().read(b"+OK one\r\n-ERR two\n").build();
        let mut conn = LineConnection::new(mock);

        assert_eq!(conn.receive().await.unwrap(), "+OK one");
        assert_eq!(conn.receive().await.unwrap(), "-ERR two");
    }

    #[tokio::test]
    async fn test_bytes_received_counts_terminators() {
        let mock = Builder::new().read(b"* OK ready\r\n").read(b"x\n").build();
        let mut conn = LineConnection::new(mock);

        conn.receive().await.unwrap();
        assert_eq!(conn.bytes_received(), 12);
        conn.receive().await.unwrap();
        assert_eq!(conn.bytes_received(), 14);
    }

    #[tokio::test]
    async fn test_line_split_across_reads() {
        let mock = Builder::new().read(b"250-mail.exa").read(b"mple.com\r\n").build();
        let mut conn = LineConnection::new(mock);

        assert_eq!(conn.receive().await.unwrap(), "250-mail.example.com");
        assert_eq!(conn.bytes_received(), 22);
    }

    #[tokio::test]
    async fn test_send_appends_crlf() {
        let mock = Builder::new().write(b"NOOP\r\n").build();
        let mut conn = LineConnection::new(mock);

        conn.send("NOOP").await.unwrap();
        assert_eq!(conn.bytes_sent(), 6);
    }

    #[tokio::test]
    async fn test_eof_is_closed() {
        let mock = Builder::new().read(b"partial").build();
        let mut conn = LineConnection::new(mock);

        assert!(matches!(conn.receive().await, Err(Error::Closed)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_readable_survives_timeout() {
        let mock = Builder::new()
            .wait(std::time::Duration::from_secs(5))
            .read(b"* 4 EXISTS\r\n")
            .build();
        let mut conn = LineConnection::new(mock);

        let early =
            tokio::time::timeout(std::time::Duration::from_secs(1), conn.wait_readable()).await;
        assert!(early.is_err());

        conn.wait_readable().await.unwrap();
        assert_eq!(conn.receive().await.unwrap(), "* 4 EXISTS");
    }

    #[tokio::test]
    async fn test_read_exact_literal() {
        let mock = Builder::new().read(b"hello world)\r\n").build();
        let mut conn = LineConnection::new(mock);

        assert_eq!(conn.read_exact(11).await.unwrap(), b"hello world");
        assert_eq!(conn.receive().await.unwrap(), ")");
        assert_eq!(conn.bytes_received(), 14);
    }

    #[tokio::test]
    async fn test_start_tls_upgrades() {
        let (stream, log) = ScriptedStream::new(
            Builder::new()
                .read(b"+OK begin TLS\r\n")
                .write(b"CAPA\r\n")
                .build(),
        );
        let mut conn = LineConnection::new(stream);

        conn.receive().await.unwrap();
        let mut conn = conn.start_tls("pop.example.com").await.unwrap();
        assert!(conn.is_tls());
        assert_eq!(conn.bytes_received(), 15);

        conn.send("CAPA").await.unwrap();
        assert_eq!(log.writes(), vec![(true, b"CAPA\r\n".to_vec())]);
    }

    #[tokio::test]
    async fn test_start_tls_rejects_buffered_residue() {
        let (stream, _log) = ScriptedStream::new(
            Builder::new()
                .read(b"220 go ahead\r\n250 injected\r\n")
                .build(),
        );
        let mut conn = LineConnection::new(stream);

        conn.receive().await.unwrap();
        let err = conn.start_tls("smtp.example.com").await.err().unwrap();
        assert!(matches!(err, Error::BufferedResidue(14)));
    }
}
