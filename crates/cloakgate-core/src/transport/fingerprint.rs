//! HTTPS transport with a controlled TLS ClientHello.
//!
//! Every connection is dialed through [`ProxyDialer`] and handshaken with a
//! BoringSSL connector shaped either by a [`ClientHelloProfile`] or a
//! [`HelloPreset`]. When the peer negotiates `h2` the multiplexed sender is
//! cached per `host:port` and reused while it stays ready; otherwise the
//! request runs over HTTP/1.1 on that one connection.
//!
//! Only the TLS handshake is bounded by the deadline. Dialing, request and
//! response body are governed by the caller. Nothing is retried here.

use boring::ssl::SslConnector;
use bytes::Bytes;
use http::{header, HeaderValue, Request, Response, Uri, Version};
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::client::conn::{http1, http2};
use hyper_util::rt::{TokioExecutor, TokioIo};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_boring::SslStream;

use cloakgate_types::{TlsFingerprintConfig, TransportError};

use super::connector::{build_connector, handshake, negotiated_h2, HelloSource, TlsSettings};
use super::dialer::{DialedStream, ProxyDialer};
use super::preset::HelloPreset;
use super::profile::ClientHelloProfile;

pub type FingerprintBody = Full<Bytes>;

const DEFAULT_HTTPS_PORT: u16 = 443;
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FingerprintTransportConfig {
    /// SNI override; empty derives it from the request host
    pub server_name: String,
    /// `socks5://[user[:pass]@]host:port`, empty for direct
    pub proxy_url: String,
    /// Use [`ClientHelloProfile::node_js_24`] instead of `preset`
    pub use_custom_profile: bool,
    pub preset: HelloPreset,
    pub tls: TlsSettings,
    pub handshake_timeout: Duration,
}

impl Default for FingerprintTransportConfig {
    fn default() -> Self {
        Self {
            server_name: String::new(),
            proxy_url: String::new(),
            use_custom_profile: false,
            preset: HelloPreset::default(),
            tls: TlsSettings::default(),
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
        }
    }
}

impl From<&TlsFingerprintConfig> for FingerprintTransportConfig {
    fn from(config: &TlsFingerprintConfig) -> Self {
        Self {
            server_name: config.server_name.clone(),
            proxy_url: config.proxy_url.clone(),
            use_custom_profile: config.use_custom_spec,
            preset: HelloPreset::default(),
            tls: TlsSettings { insecure_skip_verify: config.insecure_skip_verify, root_certs: Vec::new() },
            handshake_timeout: if config.handshake_timeout_secs == 0 {
                DEFAULT_HANDSHAKE_TIMEOUT
            } else {
                config.handshake_timeout()
            },
        }
    }
}

struct CachedConnection {
    /// Distinguishes a replacement from the connection a failed request used
    id: u64,
    sender: http2::SendRequest<FingerprintBody>,
    driver: JoinHandle<()>,
}

/// Request destination after normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Target {
    host: String,
    port: u16,
    /// `host:port`, also the cache key
    authority: String,
}

impl Target {
    fn from_uri(uri: &Uri) -> Result<Self, TransportError> {
        match uri.scheme_str() {
            Some("https") => {},
            other => return Err(TransportError::InsecureScheme { scheme: other.unwrap_or_default().to_string() }),
        }
        let host = uri.host().filter(|h| !h.is_empty()).ok_or_else(|| TransportError::InvalidRequest {
            message: format!("missing host in '{}'", uri),
        })?;
        let port = uri.port_u16().unwrap_or(DEFAULT_HTTPS_PORT);
        Ok(Self { host: host.to_string(), port, authority: format!("{host}:{port}") })
    }

    /// Host header value: port omitted when it is the default.
    fn host_header(&self) -> &str {
        if self.port == DEFAULT_HTTPS_PORT {
            &self.host
        } else {
            &self.authority
        }
    }
}

/// `host:port` cache key for an `https` URI.
pub fn normalize_host(uri: &Uri) -> Result<String, TransportError> {
    Target::from_uri(uri).map(|t| t.authority)
}

pub struct FingerprintTransport {
    config: FingerprintTransportConfig,
    dialer: ProxyDialer,
    connector: SslConnector,
    connections: Mutex<HashMap<String, CachedConnection>>,
    next_connection_id: AtomicU64,
}

impl FingerprintTransport {
    pub fn new(config: FingerprintTransportConfig) -> Result<Self, TransportError> {
        let dialer = ProxyDialer::from_proxy_url(&config.proxy_url)?;
        let hello = if config.use_custom_profile {
            HelloSource::Custom(ClientHelloProfile::node_js_24(&config.server_name))
        } else {
            HelloSource::Preset(config.preset)
        };
        let label = if config.server_name.is_empty() { "*" } else { config.server_name.as_str() };
        let connector = build_connector(&hello, &config.tls, label)?;

        tracing::info!(
            server_name = %label,
            custom_profile = config.use_custom_profile,
            preset = %config.preset,
            direct = dialer.is_direct(),
            "[Fingerprint] Transport initialized"
        );

        Ok(Self {
            config,
            dialer,
            connector,
            connections: Mutex::new(HashMap::new()),
            next_connection_id: AtomicU64::new(1),
        })
    }

    pub fn from_config(config: &TlsFingerprintConfig) -> Result<Self, TransportError> {
        Self::new(FingerprintTransportConfig::from(config))
    }

    pub fn config(&self) -> &FingerprintTransportConfig {
        &self.config
    }

    /// Send with the configured handshake timeout.
    pub async fn send(&self, req: Request<FingerprintBody>) -> Result<Response<Incoming>, TransportError> {
        let deadline = Instant::now() + self.config.handshake_timeout;
        self.send_with_deadline(req, deadline).await
    }

    /// Send with a caller-supplied deadline for the TLS handshake.
    pub async fn send_with_deadline(
        &self,
        req: Request<FingerprintBody>,
        deadline: Instant,
    ) -> Result<Response<Incoming>, TransportError> {
        let target = Target::from_uri(req.uri())?;

        if let Some((id, sender)) = self.reusable_sender(&target.authority) {
            tracing::debug!(host = %target.authority, "[Fingerprint] Reusing HTTP/2 connection");
            return self.send_h2(sender, &target.authority, id, req).await;
        }

        let tls = self.connect(&target, deadline).await?;

        if negotiated_h2(&tls) {
            let (sender, conn) = http2::Builder::new(TokioExecutor::new())
                .handshake(TokioIo::new(tls))
                .await
                .map_err(|e| http_err(&target.authority, e))?;
            let host = target.authority.clone();
            let driver = tokio::spawn(async move {
                if let Err(e) = conn.await {
                    tracing::debug!(host = %host, error = %e, "[Fingerprint] HTTP/2 connection ended");
                }
            });
            let id = self.cache_connection(target.authority.clone(), sender.clone(), driver);
            self.send_h2(sender, &target.authority, id, req).await
        } else {
            tracing::debug!(host = %target.authority, "[Fingerprint] No h2 via ALPN, using HTTP/1.1");
            self.send_h1(tls, &target, req).await
        }
    }

    /// Abort and drop every cached connection.
    pub fn close(&self) {
        let drained: Vec<(String, CachedConnection)> = self.connections.lock().drain().collect();
        for (host, conn) in drained {
            conn.driver.abort();
            tracing::debug!(host = %host, "[Fingerprint] Closed cached connection");
        }
    }

    pub fn close_idle_connections(&self) {
        self.close();
    }

    /// Hosts with a cached HTTP/2 connection, sorted.
    pub fn cached_hosts(&self) -> Vec<String> {
        let mut hosts: Vec<String> = self.connections.lock().keys().cloned().collect();
        hosts.sort();
        hosts
    }

    fn server_name_for<'a>(&'a self, target: &'a Target) -> &'a str {
        if self.config.server_name.is_empty() {
            target.host.trim_start_matches('[').trim_end_matches(']')
        } else {
            &self.config.server_name
        }
    }

    async fn connect(&self, target: &Target, deadline: Instant) -> Result<SslStream<DialedStream>, TransportError> {
        let tcp = self.dialer.dial(&target.authority).await?;
        let server_name = self.server_name_for(target);
        let verify_hostname = !self.config.tls.insecure_skip_verify;

        match tokio::time::timeout_at(deadline, handshake(&self.connector, server_name, verify_hostname, tcp)).await {
            Ok(Ok(stream)) => {
                tracing::debug!(
                    host = %target.authority,
                    sni = %server_name,
                    h2 = negotiated_h2(&stream),
                    "[Fingerprint] TLS handshake complete"
                );
                Ok(stream)
            },
            Ok(Err(e)) => Err(e),
            Err(_) => Err(TransportError::HandshakeTimeout { addr: target.authority.clone() }),
        }
    }

    /// Cached sender and its connection id if still usable; stale entries are evicted.
    fn reusable_sender(&self, authority: &str) -> Option<(u64, http2::SendRequest<FingerprintBody>)> {
        let mut connections = self.connections.lock();
        let cached = connections.get(authority)?;
        if cached.sender.is_ready() && !cached.sender.is_closed() {
            return Some((cached.id, cached.sender.clone()));
        }
        if let Some(stale) = connections.remove(authority) {
            stale.driver.abort();
            tracing::debug!(host = %authority, "[Fingerprint] Evicted stale HTTP/2 connection");
        }
        None
    }

    /// Cache a fresh connection under `authority`, returning its id.
    fn cache_connection(
        &self,
        authority: String,
        sender: http2::SendRequest<FingerprintBody>,
        driver: JoinHandle<()>,
    ) -> u64 {
        let id = self.next_connection_id.fetch_add(1, Ordering::Relaxed);
        // A replaced entry is only dropped: in-flight requests on it finish on their own.
        self.connections.lock().insert(authority, CachedConnection { id, sender, driver });
        id
    }

    /// Drop the cached connection for `authority` only if it is still connection `id`.
    fn evict(&self, authority: &str, id: u64) {
        let mut connections = self.connections.lock();
        if connections.get(authority).is_some_and(|c| c.id == id) {
            if let Some(failed) = connections.remove(authority) {
                failed.driver.abort();
                tracing::debug!(host = %authority, "[Fingerprint] Evicted HTTP/2 connection after failure");
            }
        }
    }

    async fn send_h2(
        &self,
        mut sender: http2::SendRequest<FingerprintBody>,
        authority: &str,
        connection_id: u64,
        mut req: Request<FingerprintBody>,
    ) -> Result<Response<Incoming>, TransportError> {
        *req.version_mut() = Version::HTTP_2;
        match sender.send_request(req).await {
            Ok(response) => Ok(response),
            Err(e) => {
                self.evict(authority, connection_id);
                Err(http_err(authority, e))
            },
        }
    }

    async fn send_h1(
        &self,
        tls: SslStream<DialedStream>,
        target: &Target,
        req: Request<FingerprintBody>,
    ) -> Result<Response<Incoming>, TransportError> {
        let (mut sender, conn) = http1::handshake(TokioIo::new(tls)).await.map_err(|e| http_err(&target.authority, e))?;
        let host = target.authority.clone();
        tokio::spawn(async move {
            if let Err(e) = conn.await {
                tracing::debug!(host = %host, error = %e, "[Fingerprint] HTTP/1.1 connection ended");
            }
        });

        let req = into_origin_form(req, target)?;
        sender.send_request(req).await.map_err(|e| http_err(&target.authority, e))
    }
}

impl Drop for FingerprintTransport {
    fn drop(&mut self) {
        for (_, conn) in self.connections.get_mut().drain() {
            conn.driver.abort();
        }
    }
}

fn http_err(host: &str, e: hyper::Error) -> TransportError {
    TransportError::Http { host: host.to_string(), message: e.to_string() }
}

/// HTTP/1.1 wants an origin-form target plus an explicit Host header.
fn into_origin_form(req: Request<FingerprintBody>, target: &Target) -> Result<Request<FingerprintBody>, TransportError> {
    let (mut parts, body) = req.into_parts();

    if !parts.headers.contains_key(header::HOST) {
        let value = HeaderValue::from_str(target.host_header())
            .map_err(|e| TransportError::InvalidRequest { message: format!("invalid host header: {}", e) })?;
        parts.headers.insert(header::HOST, value);
    }

    let origin: Uri = parts
        .uri
        .path_and_query()
        .map_or("/", |pq| pq.as_str())
        .parse()
        .map_err(|e| TransportError::InvalidRequest { message: format!("invalid request path: {}", e) })?;
    parts.uri = origin;
    parts.version = Version::HTTP_11;

    Ok(Request::from_parts(parts, body))
}

#[cfg(test)]
#[path = "fingerprint_tests.rs"]
mod fingerprint_tests;
