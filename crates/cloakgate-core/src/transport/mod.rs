//! Outbound HTTPS with a controlled TLS fingerprint.

mod connector;
mod dialer;
mod fingerprint;
mod preset;
mod profile;

pub use connector::{build_connector, HelloSource, TlsSettings};
pub use dialer::{DialedStream, ProxyDialer};
pub use fingerprint::{
    normalize_host, FingerprintBody, FingerprintTransport, FingerprintTransportConfig, DEFAULT_HANDSHAKE_TIMEOUT,
};
pub use preset::HelloPreset;
pub use profile::{
    CertCompression, CipherSuite, ClientHelloProfile, NamedGroup, SignatureScheme, TlsExtension, TLS1_2, TLS1_3,
};
