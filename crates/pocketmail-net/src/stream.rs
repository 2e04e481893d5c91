//! Socket types for mail connections.

#![allow(clippy::missing_errors_doc)]

use std::future::Future;
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use rustls::pki_types::ServerName;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tokio_rustls::client::TlsStream;
use tracing::{debug, info};

use crate::line::LineConnection;
use crate::{ConnectOptions, Error, Result, Security};

/// A byte stream that can be re-wrapped in TLS after a STARTTLS exchange.
///
/// Implemented by [`MailStream`] for real sockets and by the scripted
/// stream in [`crate::testing`] so protocol conversations can be tested
/// without a server.
pub trait TlsUpgrade: AsyncRead + AsyncWrite + Unpin + Send + Sized {
    /// Performs the TLS handshake over this stream and returns the encrypted stream.
    fn upgrade(self, host: &str) -> impl Future<Output = Result<Self>> + Send;

    /// Returns true if the stream is TLS-encrypted.
    fn is_tls(&self) -> bool;
}

/// A stream that can be either plaintext or TLS.
pub enum MailStream {
    /// Plaintext TCP stream.
    Plain(TcpStream),
    /// TLS-encrypted stream (boxed to reduce enum size).
    Tls(Box<TlsStream<TcpStream>>),
}

impl MailStream {
    async fn wrap(tcp: TcpStream, host: &str) -> Result<Self> {
        let connector = create_tls_connector();
        let server_name = ServerName::try_from(host.to_string())?;
        let tls = connector.connect(server_name, tcp).await?;
        Ok(Self::Tls(Box::new(tls)))
    }
}

impl TlsUpgrade for MailStream {
    async fn upgrade(self, host: &str) -> Result<Self> {
        match self {
            Self::Plain(tcp) => {
                debug!(host, "upgrading connection to TLS");
                Self::wrap(tcp, host).await
            }
            Self::Tls(_) => Err(Error::InvalidState("Stream is already TLS".to_string())),
        }
    }

    fn is_tls(&self) -> bool {
        matches!(self, Self::Tls(_))
    }
}

impl AsyncRead for MailStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Plain(stream) => Pin::new(stream).poll_read(cx, buf),
            Self::Tls(stream) => Pin::new(stream).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for MailStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            Self::Plain(stream) => Pin::new(stream).poll_write(cx, buf),
            Self::Tls(stream) => Pin::new(stream).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Plain(stream) => Pin::new(stream).poll_flush(cx),
            Self::Tls(stream) => Pin::new(stream).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Plain(stream) => Pin::new(stream).poll_shutdown(cx),
            Self::Tls(stream) => Pin::new(stream).poll_shutdown(cx),
        }
    }
}

/// Creates a TLS connector with the webpki root certificates.
#[must_use]
pub fn create_tls_connector() -> TlsConnector {
    let root_store = rustls::RootCertStore {
        roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
    };

    let config = rustls::ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth();

    TlsConnector::from(Arc::new(config))
}

/// Opens a line connection.
///
/// With [`Security::Implicit`] the TLS handshake completes before any
/// protocol data is exchanged. Any failure here, including the timeout,
/// is reported as a connect failure rather than an I/O error.
pub async fn connect(options: &ConnectOptions) -> Result<LineConnection<MailStream>> {
    let host = options.host.as_str();
    let port = options.port;

    let open = async {
        let tcp = TcpStream::connect((host, port))
            .await
            .map_err(|e| Error::connect(host, port, e.to_string()))?;

        if options.security == Security::Implicit {
            MailStream::wrap(tcp, host)
                .await
                .map_err(|e| Error::connect(host, port, e.to_string()))
        } else {
            Ok(MailStream::Plain(tcp))
        }
    };

    let stream = tokio::time::timeout(options.connect_timeout, open)
        .await
        .map_err(|_| Error::Timeout(options.connect_timeout))??;

    info!(host, port, tls = stream.is_tls(), "connected");
    Ok(LineConnection::new(stream))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn test_create_tls_connector() {
        let _connector = create_tls_connector();
    }

    #[tokio::test]
    async fn test_connect_refused_is_connect_failure() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let options = ConnectOptions::new("127.0.0.1", port, Security::None)
            .connect_timeout(Duration::from_secs(5));
        let err = connect(&options).await.err().unwrap();
        assert!(err.is_connect_failure());
    }

    #[tokio::test]
    async fn test_connect_plain() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            tokio::io::AsyncWriteExt::write_all(&mut socket, b"+OK ready\r\n")
                .await
                .unwrap();
        });

        let options = ConnectOptions::new("127.0.0.1", port, Security::None);
        let mut conn = connect(&options).await.unwrap();
        assert!(!conn.is_tls());
        assert_eq!(conn.receive().await.unwrap(), "+OK ready");
        server.await.unwrap();
    }
}
