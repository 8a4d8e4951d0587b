//! TCP dialing, direct or through a SOCKS5 proxy.

use std::fmt;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::{lookup_host, TcpStream};
use tokio_socks::tcp::Socks5Stream;
use url::Url;

use cloakgate_types::TransportError;

const DEFAULT_SOCKS_PORT: u16 = 1080;

#[derive(Clone, PartialEq, Eq)]
pub enum ProxyDialer {
    Direct,
    Socks5 {
        /// `host:port` of the proxy
        proxy_addr: String,
        auth: Option<(String, String)>,
        /// `socks5h`: let the proxy resolve target names
        remote_dns: bool,
    },
}

impl fmt::Debug for ProxyDialer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Direct => f.write_str("Direct"),
            Self::Socks5 { proxy_addr, auth, remote_dns } => f
                .debug_struct("Socks5")
                .field("proxy_addr", proxy_addr)
                .field("auth", &auth.as_ref().map(|(user, _)| user))
                .field("remote_dns", remote_dns)
                .finish(),
        }
    }
}

impl ProxyDialer {
    /// Build a dialer from a proxy URL. Empty means direct.
    ///
    /// HTTP(S) proxies cannot carry a raw TLS stream here, so they fall back
    /// to a direct connection with a warning.
    pub fn from_proxy_url(raw: &str) -> Result<Self, TransportError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Ok(Self::Direct);
        }

        let parsed = Url::parse(trimmed).map_err(|e| TransportError::InvalidProxyUrl {
            url: trimmed.to_string(),
            message: e.to_string(),
        })?;

        match parsed.scheme() {
            scheme @ ("socks5" | "socks5h") => {
                let host = parsed.host_str().filter(|h| !h.is_empty()).ok_or_else(|| {
                    TransportError::InvalidProxyUrl {
                        url: trimmed.to_string(),
                        message: "missing proxy host".to_string(),
                    }
                })?;
                let port = parsed.port().unwrap_or(DEFAULT_SOCKS_PORT);
                let auth = (!parsed.username().is_empty()).then(|| {
                    (parsed.username().to_string(), parsed.password().unwrap_or_default().to_string())
                });
                Ok(Self::Socks5 {
                    proxy_addr: format!("{host}:{port}"),
                    auth,
                    remote_dns: scheme == "socks5h",
                })
            },
            "http" | "https" => {
                tracing::warn!(
                    proxy = %parsed.host_str().unwrap_or_default(),
                    "[Fingerprint] HTTP proxy not supported for fingerprinted TLS, using direct connection"
                );
                Ok(Self::Direct)
            },
            other => Err(TransportError::UnsupportedProxyScheme { scheme: other.to_string() }),
        }
    }

    pub const fn is_direct(&self) -> bool {
        matches!(self, Self::Direct)
    }

    /// Open a TCP stream to `addr` (`host:port`).
    pub async fn dial(&self, addr: &str) -> Result<DialedStream, TransportError> {
        let dial_err = |message: String| TransportError::Dial { addr: addr.to_string(), message };

        match self {
            Self::Direct => {
                let stream = TcpStream::connect(addr).await.map_err(|e| dial_err(e.to_string()))?;
                let _ = stream.set_nodelay(true);
                Ok(DialedStream::Direct(stream))
            },
            Self::Socks5 { proxy_addr, auth, remote_dns } => {
                let stream = if *remote_dns {
                    connect_socks(proxy_addr.as_str(), addr, auth.as_ref()).await
                } else {
                    let resolved = lookup_host(addr)
                        .await
                        .map_err(|e| dial_err(format!("DNS resolution failed: {}", e)))?
                        .next()
                        .ok_or_else(|| dial_err("no addresses found".to_string()))?;
                    connect_socks(proxy_addr.as_str(), resolved, auth.as_ref()).await
                }
                .map_err(|e| dial_err(format!("SOCKS5 via {}: {}", proxy_addr, e)))?;

                tracing::debug!(target_addr = %addr, proxy = %proxy_addr, "[Fingerprint] Dialed through SOCKS5");
                Ok(DialedStream::Socks(stream))
            },
        }
    }
}

async fn connect_socks<'t, T>(
    proxy_addr: &str,
    target: T,
    auth: Option<&(String, String)>,
) -> Result<Socks5Stream<TcpStream>, tokio_socks::Error>
where
    T: tokio_socks::IntoTargetAddr<'t>,
{
    match auth {
        Some((user, pass)) => Socks5Stream::connect_with_password(proxy_addr, target, user, pass).await,
        None => Socks5Stream::connect(proxy_addr, target).await,
    }
}

/// TCP stream that is either direct or tunneled through SOCKS5.
pub enum DialedStream {
    Direct(TcpStream),
    Socks(Socks5Stream<TcpStream>),
}

impl fmt::Debug for DialedStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Direct(stream) => f.debug_tuple("Direct").field(&stream.peer_addr().ok()).finish(),
            Self::Socks(_) => f.write_str("Socks"),
        }
    }
}

impl AsyncRead for DialedStream {
    fn poll_read(mut self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<io::Result<()>> {
        match &mut *self {
            Self::Direct(stream) => Pin::new(stream).poll_read(cx, buf),
            Self::Socks(stream) => Pin::new(stream).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for DialedStream {
    fn poll_write(mut self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
        match &mut *self {
            Self::Direct(stream) => Pin::new(stream).poll_write(cx, buf),
            Self::Socks(stream) => Pin::new(stream).poll_write(cx, buf),
        }
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match &mut *self {
            Self::Direct(stream) => Pin::new(stream).poll_flush(cx),
            Self::Socks(stream) => Pin::new(stream).poll_flush(cx),
        }
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match &mut *self {
            Self::Direct(stream) => Pin::new(stream).poll_shutdown(cx),
            Self::Socks(stream) => Pin::new(stream).poll_shutdown(cx),
        }
    }
}

#[cfg(test)]
#[path = "dialer_tests.rs"]
mod dialer_tests;
