//! BoringSSL connector setup and the TLS handshake.

use boring::ssl::{SslConnector, SslMethod, SslSessionCacheMode, SslVerifyMode, SslVersion};
use boring::x509::X509;
use boring_sys::{CRYPTO_BUFFER, SSL, SSL_CTX};
use std::io::Read;
use std::os::raw::c_int;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_boring::SslStream;

use cloakgate_types::TransportError;

use super::preset::HelloPreset;
use super::profile::{CertCompression, ClientHelloProfile, TLS1_3};

const DEFAULT_ALPN: &[u8] = b"\x02h2\x08http/1.1";

/// Certificate verification settings shared by every connection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TlsSettings {
    pub insecure_skip_verify: bool,
    /// Extra trusted roots, DER or PEM
    pub root_certs: Vec<Vec<u8>>,
}

/// Where the ClientHello shape comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HelloSource {
    Custom(ClientHelloProfile),
    Preset(HelloPreset),
}

/// Brotli certificate decompression callback for BoringSSL.
unsafe extern "C" fn decompress_brotli_cert(
    _ssl: *mut SSL,
    out: *mut *mut CRYPTO_BUFFER,
    uncompressed_len: usize,
    in_: *const u8,
    in_len: usize,
) -> c_int {
    // SAFETY: BoringSSL guarantees `in_` points to `in_len` readable bytes.
    let compressed = unsafe { std::slice::from_raw_parts(in_, in_len) };

    let mut decompressed = Vec::with_capacity(uncompressed_len);
    let mut decoder = brotli::Decompressor::new(compressed, 4096);
    match decoder.read_to_end(&mut decompressed) {
        Ok(_) if decompressed.len() == uncompressed_len => {
            // SAFETY: CRYPTO_BUFFER_new copies the bytes; a null pool is allowed.
            let buffer = unsafe {
                boring_sys::CRYPTO_BUFFER_new(decompressed.as_ptr(), decompressed.len(), std::ptr::null_mut())
            };
            if buffer.is_null() {
                return 0;
            }
            // SAFETY: `out` is a valid out-pointer supplied by BoringSSL.
            unsafe { *out = buffer };
            1
        },
        _ => 0,
    }
}

fn tls_err(label: &str, what: &str, e: impl std::fmt::Display) -> TransportError {
    TransportError::Tls { server_name: label.to_string(), message: format!("{}: {}", what, e) }
}

/// Build the connector for `hello`. `label` only names the context in errors.
pub fn build_connector(hello: &HelloSource, settings: &TlsSettings, label: &str) -> Result<SslConnector, TransportError> {
    let mut builder =
        SslConnector::builder(SslMethod::tls_client()).map_err(|e| tls_err(label, "Failed to create SSL connector", e))?;

    for cert_bytes in &settings.root_certs {
        match X509::from_der(cert_bytes).or_else(|_| X509::from_pem(cert_bytes)) {
            Ok(cert) => {
                if let Err(e) = builder.cert_store_mut().add_cert(cert) {
                    tracing::warn!(error = %e, "[Fingerprint] Failed to add root certificate");
                }
            },
            Err(_) => tracing::warn!("[Fingerprint] Ignoring unparsable root certificate"),
        }
    }

    if settings.insecure_skip_verify {
        builder.set_verify(SslVerifyMode::NONE);
    }

    let ctx = builder.as_ptr();
    match hello {
        HelloSource::Custom(profile) => {
            let cipher_list = profile.cipher_list();
            if !cipher_list.is_empty() {
                builder.set_cipher_list(&cipher_list).map_err(|e| tls_err(label, "Failed to set cipher list", e))?;
            }
            let curves = profile.curves_list();
            if !curves.is_empty() {
                builder.set_curves_list(&curves).map_err(|e| tls_err(label, "Failed to set curves", e))?;
            }
            let sigalgs = profile.sigalgs_list();
            if !sigalgs.is_empty() {
                builder
                    .set_sigalgs_list(&sigalgs)
                    .map_err(|e| tls_err(label, "Failed to set signature algorithms", e))?;
            }

            // Fixed order: no GREASE, no permutation.
            // SAFETY: `ctx` comes from the live builder above.
            unsafe {
                boring_sys::SSL_CTX_set_grease_enabled(ctx, 0);
                boring_sys::SSL_CTX_set_permute_extensions(ctx, 0);
                if profile.has_extension(5) {
                    boring_sys::SSL_CTX_enable_ocsp_stapling(ctx);
                }
                if profile.has_extension(18) {
                    boring_sys::SSL_CTX_enable_signed_cert_timestamps(ctx);
                }
            }
            if profile.cert_compression().contains(&CertCompression::Brotli) {
                // SAFETY: `ctx` comes from the live builder above.
                unsafe { add_brotli_decompression(ctx, label) }?;
            }

            let max = if profile.max_version >= TLS1_3 { SslVersion::TLS1_3 } else { SslVersion::TLS1_2 };
            builder
                .set_min_proto_version(Some(SslVersion::TLS1_2))
                .map_err(|e| tls_err(label, "Failed to set min TLS version", e))?;
            builder
                .set_max_proto_version(Some(max))
                .map_err(|e| tls_err(label, "Failed to set max TLS version", e))?;

            let alpn = profile.alpn_wire();
            if !alpn.is_empty() {
                builder.set_alpn_protos(&alpn).map_err(|e| tls_err(label, "Failed to set ALPN", e))?;
            }
        },
        HelloSource::Preset(preset) => {
            if let Some(ciphers) = preset.cipher_list() {
                builder.set_cipher_list(&ciphers).map_err(|e| tls_err(label, "Failed to set cipher list", e))?;
            }
            if let Some(curves) = preset.curves_list() {
                builder.set_curves_list(&curves).map_err(|e| tls_err(label, "Failed to set curves", e))?;
            }
            if let Some(sigalgs) = preset.sigalgs_list() {
                builder
                    .set_sigalgs_list(&sigalgs)
                    .map_err(|e| tls_err(label, "Failed to set signature algorithms", e))?;
            }

            // SAFETY: `ctx` comes from the live builder above.
            unsafe {
                boring_sys::SSL_CTX_set_grease_enabled(ctx, c_int::from(preset.grease()));
                boring_sys::SSL_CTX_set_permute_extensions(ctx, c_int::from(preset.permute_extensions()));
                if preset.status_extensions() {
                    boring_sys::SSL_CTX_enable_ocsp_stapling(ctx);
                    boring_sys::SSL_CTX_enable_signed_cert_timestamps(ctx);
                }
            }
            if preset.brotli_cert_compression() {
                // SAFETY: `ctx` comes from the live builder above.
                unsafe { add_brotli_decompression(ctx, label) }?;
            }

            builder
                .set_min_proto_version(Some(SslVersion::TLS1_2))
                .map_err(|e| tls_err(label, "Failed to set min TLS version", e))?;
            builder
                .set_max_proto_version(Some(SslVersion::TLS1_3))
                .map_err(|e| tls_err(label, "Failed to set max TLS version", e))?;
            builder.set_alpn_protos(DEFAULT_ALPN).map_err(|e| tls_err(label, "Failed to set ALPN", e))?;
        },
    }

    builder.set_session_cache_mode(SslSessionCacheMode::CLIENT);
    Ok(builder.build())
}

/// # Safety
/// `ctx` must point to a live `SSL_CTX`.
unsafe fn add_brotli_decompression(ctx: *mut SSL_CTX, label: &str) -> Result<(), TransportError> {
    // Client only decompresses, so no compression callback.
    // SAFETY: guaranteed by the caller.
    let ok = unsafe {
        boring_sys::SSL_CTX_add_cert_compression_alg(
            ctx,
            boring_sys::TLSEXT_cert_compression_brotli as u16,
            None,
            Some(decompress_brotli_cert),
        )
    };
    if ok == 1 {
        Ok(())
    } else {
        Err(tls_err(label, "Failed to register brotli certificate compression", boring::error::ErrorStack::get()))
    }
}

/// Run the client handshake on an already dialed stream.
pub async fn handshake<S>(
    connector: &SslConnector,
    server_name: &str,
    verify_hostname: bool,
    stream: S,
) -> Result<SslStream<S>, TransportError>
where
    S: AsyncRead + AsyncWrite + Unpin + std::fmt::Debug,
{
    let mut config = connector.configure().map_err(|e| tls_err(server_name, "Failed to configure SSL", e))?;
    config.set_verify_hostname(verify_hostname);

    tokio_boring::connect(config, server_name, stream)
        .await
        .map_err(|e| tls_err(server_name, "TLS handshake failed", e))
}

/// Whether the peer picked HTTP/2 via ALPN.
pub fn negotiated_h2<S>(stream: &SslStream<S>) -> bool {
    stream.ssl().selected_alpn_protocol() == Some(b"h2".as_slice())
}
