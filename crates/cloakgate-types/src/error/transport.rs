//! Outbound transport errors.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised by the fingerprinting transport.
///
/// None of these are retried internally; retry policy belongs to the caller.
#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "details")]
pub enum TransportError {
    /// Request scheme is not `https`
    #[error("Fingerprint transport only supports HTTPS, got scheme '{scheme}'")]
    InsecureScheme { scheme: String },

    /// Request is missing a host or otherwise cannot be sent
    #[error("Invalid request: {message}")]
    InvalidRequest { message: String },

    /// Proxy URL could not be parsed
    #[error("Invalid proxy URL '{url}': {message}")]
    InvalidProxyUrl { url: String, message: String },

    /// Proxy scheme is neither socks5 nor http(s)
    #[error("Unsupported proxy scheme: {scheme}")]
    UnsupportedProxyScheme { scheme: String },

    /// TCP dial (direct or through SOCKS5) failed
    #[error("Failed to connect to {addr}: {message}")]
    Dial { addr: String, message: String },

    /// TLS context setup or handshake failed
    #[error("TLS error for {server_name}: {message}")]
    Tls { server_name: String, message: String },

    /// TLS handshake did not complete before the deadline
    #[error("TLS handshake with {addr} timed out")]
    HandshakeTimeout { addr: String },

    /// HTTP/1.1 or HTTP/2 exchange failed
    #[error("HTTP error for {host}: {message}")]
    Http { host: String, message: String },
}

impl TransportError {
    /// Failures that happened before any bytes of the request were sent.
    pub const fn is_connect_error(&self) -> bool {
        matches!(
            self,
            Self::Dial { .. } | Self::Tls { .. } | Self::HandshakeTimeout { .. }
        )
    }

    /// Failures caused by local configuration rather than the network.
    pub const fn is_config_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidProxyUrl { .. } | Self::UnsupportedProxyScheme { .. }
        )
    }
}
