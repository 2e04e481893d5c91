//! Scripted streams for protocol tests.
//!
//! [`ScriptedStream`] wraps a [`tokio_test::io::Mock`] and implements
//! [`TlsUpgrade`] by flipping a flag, so STARTTLS conversations can be
//! replayed without a server. Every write is recorded together with the
//! TLS state at the time it happened.

use std::io;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio_test::io::Mock;

use crate::{Error, Result, TlsUpgrade};

/// Writes seen by a [`ScriptedStream`], shared with the test.
#[derive(Debug, Clone, Default)]
pub struct WriteLog {
    entries: Arc<Mutex<Vec<(bool, Vec<u8>)>>>,
}

impl WriteLog {
    /// Returns every write as `(tls_active, bytes)`.
    #[must_use]
    pub fn writes(&self) -> Vec<(bool, Vec<u8>)> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn record(&self, tls: bool, data: &[u8]) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((tls, data.to_vec()));
    }
}

/// A mock stream that can pretend to perform a TLS handshake.
#[derive(Debug)]
pub struct ScriptedStream {
    inner: Mock,
    tls: bool,
    log: WriteLog,
}

impl ScriptedStream {
    /// Wraps a scripted mock. Returns the stream and a handle to its write log.
    #[must_use]
    pub fn new(inner: Mock) -> (Self, WriteLog) {
        let log = WriteLog::default();
        (
            Self {
                inner,
                tls: false,
                log: log.clone(),
            },
            log,
        )
    }

    /// Like [`ScriptedStream::new`] but already "encrypted".
    #[must_use]
    pub fn tls(inner: Mock) -> (Self, WriteLog) {
        let (mut stream, log) = Self::new(inner);
        stream.tls = true;
        (stream, log)
    }
}

impl TlsUpgrade for ScriptedStream {
    async fn upgrade(mut self, _host: &str) -> Result<Self> {
        if self.tls {
            return Err(Error::InvalidState("Stream is already TLS".to_string()));
        }
        self.tls = true;
        Ok(self)
    }

    fn is_tls(&self) -> bool {
        self.tls
    }
}

impl AsyncRead for ScriptedStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_read(cx, buf)
    }
}

impl AsyncWrite for ScriptedStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        let poll = Pin::new(&mut this.inner).poll_write(cx, buf);
        if let Poll::Ready(Ok(n)) = &poll {
            this.log.record(this.tls, &buf[..*n]);
        }
        poll
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_shutdown(cx)
    }
}
