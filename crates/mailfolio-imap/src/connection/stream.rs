//! Transport adapter: TCP and TLS streams.
//!
//! The engine only needs an `AsyncRead + AsyncWrite` byte stream; these
//! helpers open one for a [`Config`].

#![allow(clippy::missing_errors_doc)]

use std::io;
use std::pin::Pin;
use std::sync::{Arc, OnceLock};
use std::task::{Context, Poll};

use rustls::pki_types::ServerName;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tokio_rustls::client::TlsStream;
use tracing::debug;

use super::config::{Config, Security};
use crate::{Error, Result};

/// Socket to an IMAP server, before or after the TLS handshake.
pub enum ImapStream {
    /// Plaintext TCP, either unencrypted or awaiting STARTTLS.
    Plain(TcpStream),
    /// TLS session over TCP.
    Tls(Box<TlsStream<TcpStream>>),
}

impl ImapStream {
    /// Opens the socket described by `config`.
    ///
    /// Implicit TLS finishes the handshake here. STARTTLS and unencrypted
    /// configurations return a plaintext socket; the upgrade happens after
    /// the greeting.
    pub async fn open(config: &Config) -> Result<Self> {
        let tcp = TcpStream::connect((config.host.as_str(), config.port)).await?;
        tcp.set_nodelay(true)?;
        match config.security {
            Security::Implicit => handshake(tcp, &config.host).await,
            Security::StartTls | Security::None => Ok(Self::Plain(tcp)),
        }
    }

    /// Wraps a plaintext socket in TLS once the server accepted STARTTLS.
    pub async fn start_tls(self, host: &str) -> Result<Self> {
        match self {
            Self::Plain(tcp) => handshake(tcp, host).await,
            Self::Tls(_) => Err(Error::Protocol("stream is already TLS".to_string())),
        }
    }

    /// Whether the TLS handshake has completed.
    #[must_use]
    pub const fn is_tls(&self) -> bool {
        matches!(self, Self::Tls(_))
    }
}

async fn handshake(tcp: TcpStream, host: &str) -> Result<ImapStream> {
    let server_name = ServerName::try_from(host.to_string())?;
    let tls = tls_connector().connect(server_name, tcp).await?;
    debug!(host, "TLS handshake complete");
    Ok(ImapStream::Tls(Box::new(tls)))
}

/// Process-wide connector trusting the webpki root certificates.
#[must_use]
pub fn tls_connector() -> TlsConnector {
    static CONFIG: OnceLock<Arc<rustls::ClientConfig>> = OnceLock::new();
    let config = CONFIG.get_or_init(|| {
        let roots = rustls::RootCertStore {
            roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
        };
        Arc::new(
            rustls::ClientConfig::builder()
                .with_root_certificates(roots)
                .with_no_client_auth(),
        )
    });
    TlsConnector::from(Arc::clone(config))
}

impl AsyncRead for ImapStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Plain(tcp) => Pin::new(tcp).poll_read(cx, buf),
            Self::Tls(tls) => Pin::new(tls).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for ImapStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            Self::Plain(tcp) => Pin::new(tcp).poll_write(cx, buf),
            Self::Tls(tls) => Pin::new(tls).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Plain(tcp) => Pin::new(tcp).poll_flush(cx),
            Self::Tls(tls) => Pin::new(tls).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Plain(tcp) => Pin::new(tcp).poll_shutdown(cx),
            Self::Tls(tls) => Pin::new(tls).poll_shutdown(cx),
        }
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    use super::*;

    #[test]
    fn test_connector_is_shared() {
        let _first = tls_connector();
        let _second = tls_connector();
    }

    #[tokio::test]
    async fn test_starttls_config_opens_plaintext() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            socket.write_all(b"* OK hello\r\n").await.unwrap();
        });

        let config = Config::builder("127.0.0.1")
            .security(Security::StartTls)
            .port(port)
            .build();
        let mut stream = ImapStream::open(&config).await.unwrap();
        assert!(!stream.is_tls());
        let mut buf = [0u8; 12];
        stream.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"* OK hello\r\n");
        server.await.unwrap();
    }
}
