//! Declarative ClientHello description.
//!
//! A profile lists cipher suites, groups, signature schemes and extensions in
//! wire order. It is the reference for what the transport should send and is
//! rendered to a JA3 string for comparison against captures.

/// TLS protocol version code points.
pub const TLS1_2: u16 = 0x0303;
pub const TLS1_3: u16 = 0x0304;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CipherSuite {
    pub code: u16,
    /// OpenSSL-style name used by the cipher list. TLS 1.3 suites have none:
    /// they are not configurable and always offered.
    pub openssl_name: Option<&'static str>,
}

impl CipherSuite {
    const fn tls13(code: u16) -> Self {
        Self { code, openssl_name: None }
    }

    const fn tls12(code: u16, name: &'static str) -> Self {
        Self { code, openssl_name: Some(name) }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NamedGroup {
    X25519,
    Secp256r1,
    Secp384r1,
}

impl NamedGroup {
    pub const fn code(self) -> u16 {
        match self {
            Self::X25519 => 29,
            Self::Secp256r1 => 23,
            Self::Secp384r1 => 24,
        }
    }

    pub const fn curve_name(self) -> &'static str {
        match self {
            Self::X25519 => "X25519",
            Self::Secp256r1 => "P-256",
            Self::Secp384r1 => "P-384",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureScheme {
    EcdsaSecp256r1Sha256,
    EcdsaSecp384r1Sha384,
    EcdsaSecp521r1Sha512,
    RsaPssRsaeSha256,
    RsaPssRsaeSha384,
    RsaPssRsaeSha512,
    RsaPkcs1Sha256,
    RsaPkcs1Sha384,
    RsaPkcs1Sha512,
}

impl SignatureScheme {
    pub const fn code(self) -> u16 {
        match self {
            Self::EcdsaSecp256r1Sha256 => 0x0403,
            Self::EcdsaSecp384r1Sha384 => 0x0503,
            Self::EcdsaSecp521r1Sha512 => 0x0603,
            Self::RsaPssRsaeSha256 => 0x0804,
            Self::RsaPssRsaeSha384 => 0x0805,
            Self::RsaPssRsaeSha512 => 0x0806,
            Self::RsaPkcs1Sha256 => 0x0401,
            Self::RsaPkcs1Sha384 => 0x0501,
            Self::RsaPkcs1Sha512 => 0x0601,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::EcdsaSecp256r1Sha256 => "ecdsa_secp256r1_sha256",
            Self::EcdsaSecp384r1Sha384 => "ecdsa_secp384r1_sha384",
            Self::EcdsaSecp521r1Sha512 => "ecdsa_secp521r1_sha512",
            Self::RsaPssRsaeSha256 => "rsa_pss_rsae_sha256",
            Self::RsaPssRsaeSha384 => "rsa_pss_rsae_sha384",
            Self::RsaPssRsaeSha512 => "rsa_pss_rsae_sha512",
            Self::RsaPkcs1Sha256 => "rsa_pkcs1_sha256",
            Self::RsaPkcs1Sha384 => "rsa_pkcs1_sha384",
            Self::RsaPkcs1Sha512 => "rsa_pkcs1_sha512",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CertCompression {
    Brotli,
}

/// PSK key exchange mode `psk_dhe_ke`.
pub const PSK_MODE_DHE: u8 = 1;
/// EC point format `uncompressed`.
pub const POINT_FORMAT_UNCOMPRESSED: u8 = 0;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TlsExtension {
    ServerName(String),
    ExtendedMasterSecret,
    RenegotiationInfo,
    SupportedGroups(Vec<NamedGroup>),
    EcPointFormats(Vec<u8>),
    SessionTicket,
    Alpn(Vec<String>),
    StatusRequest,
    SignatureAlgorithms(Vec<SignatureScheme>),
    SignedCertificateTimestamp,
    KeyShare(Vec<NamedGroup>),
    PskKeyExchangeModes(Vec<u8>),
    SupportedVersions(Vec<u16>),
    CompressCertificate(Vec<CertCompression>),
    /// BoringSSL-style padding
    Padding,
}

impl TlsExtension {
    /// IANA extension type.
    pub const fn id(&self) -> u16 {
        match self {
            Self::ServerName(_) => 0,
            Self::StatusRequest => 5,
            Self::SupportedGroups(_) => 10,
            Self::EcPointFormats(_) => 11,
            Self::SignatureAlgorithms(_) => 13,
            Self::Alpn(_) => 16,
            Self::SignedCertificateTimestamp => 18,
            Self::Padding => 21,
            Self::ExtendedMasterSecret => 23,
            Self::CompressCertificate(_) => 27,
            Self::SessionTicket => 35,
            Self::SupportedVersions(_) => 43,
            Self::PskKeyExchangeModes(_) => 45,
            Self::KeyShare(_) => 51,
            Self::RenegotiationInfo => 65281,
        }
    }
}

/// Immutable, ordered ClientHello description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientHelloProfile {
    pub min_version: u16,
    pub max_version: u16,
    pub cipher_suites: Vec<CipherSuite>,
    pub compression_methods: Vec<u8>,
    pub extensions: Vec<TlsExtension>,
}

const NODE_JS_24_CIPHER_SUITES: [CipherSuite; 9] = [
    CipherSuite::tls13(0x1301),
    CipherSuite::tls13(0x1302),
    CipherSuite::tls13(0x1303),
    CipherSuite::tls12(0xC02B, "ECDHE-ECDSA-AES128-GCM-SHA256"),
    CipherSuite::tls12(0xC02F, "ECDHE-RSA-AES128-GCM-SHA256"),
    CipherSuite::tls12(0xC02C, "ECDHE-ECDSA-AES256-GCM-SHA384"),
    CipherSuite::tls12(0xC030, "ECDHE-RSA-AES256-GCM-SHA384"),
    CipherSuite::tls12(0xCCA9, "ECDHE-ECDSA-CHACHA20-POLY1305"),
    CipherSuite::tls12(0xCCA8, "ECDHE-RSA-CHACHA20-POLY1305"),
];

const NODE_JS_24_GROUPS: [NamedGroup; 3] = [NamedGroup::X25519, NamedGroup::Secp256r1, NamedGroup::Secp384r1];

const NODE_JS_24_SIGNATURE_SCHEMES: [SignatureScheme; 9] = [
    SignatureScheme::EcdsaSecp256r1Sha256,
    SignatureScheme::EcdsaSecp384r1Sha384,
    SignatureScheme::EcdsaSecp521r1Sha512,
    SignatureScheme::RsaPssRsaeSha256,
    SignatureScheme::RsaPssRsaeSha384,
    SignatureScheme::RsaPssRsaeSha512,
    SignatureScheme::RsaPkcs1Sha256,
    SignatureScheme::RsaPkcs1Sha384,
    SignatureScheme::RsaPkcs1Sha512,
];

impl ClientHelloProfile {
    /// ClientHello of the Node.js 24 HTTPS stack (OpenSSL 3 defaults).
    pub fn node_js_24(server_name: &str) -> Self {
        Self {
            min_version: TLS1_2,
            max_version: TLS1_3,
            cipher_suites: NODE_JS_24_CIPHER_SUITES.to_vec(),
            compression_methods: vec![0],
            extensions: vec![
                TlsExtension::ServerName(server_name.to_string()),
                TlsExtension::ExtendedMasterSecret,
                TlsExtension::RenegotiationInfo,
                TlsExtension::SupportedGroups(NODE_JS_24_GROUPS.to_vec()),
                TlsExtension::EcPointFormats(vec![POINT_FORMAT_UNCOMPRESSED]),
                TlsExtension::SessionTicket,
                TlsExtension::Alpn(vec!["h2".to_string(), "http/1.1".to_string()]),
                TlsExtension::StatusRequest,
                TlsExtension::SignatureAlgorithms(NODE_JS_24_SIGNATURE_SCHEMES.to_vec()),
                TlsExtension::SignedCertificateTimestamp,
                TlsExtension::KeyShare(vec![NamedGroup::X25519]),
                TlsExtension::PskKeyExchangeModes(vec![PSK_MODE_DHE]),
                TlsExtension::SupportedVersions(vec![TLS1_3, TLS1_2]),
                TlsExtension::CompressCertificate(vec![CertCompression::Brotli]),
                TlsExtension::Padding,
            ],
        }
    }

    pub fn server_name(&self) -> Option<&str> {
        self.extensions.iter().find_map(|ext| match ext {
            TlsExtension::ServerName(name) => Some(name.as_str()),
            _ => None,
        })
    }

    pub fn extension_ids(&self) -> Vec<u16> {
        self.extensions.iter().map(TlsExtension::id).collect()
    }

    pub fn has_extension(&self, id: u16) -> bool {
        self.extensions.iter().any(|ext| ext.id() == id)
    }

    pub fn alpn_protocols(&self) -> &[String] {
        self.extensions
            .iter()
            .find_map(|ext| match ext {
                TlsExtension::Alpn(protos) => Some(protos.as_slice()),
                _ => None,
            })
            .unwrap_or(&[])
    }

    /// ALPN list in wire format (length-prefixed protocol names).
    pub fn alpn_wire(&self) -> Vec<u8> {
        let mut wire = Vec::new();
        for proto in self.alpn_protocols() {
            wire.push(proto.len() as u8);
            wire.extend_from_slice(proto.as_bytes());
        }
        wire
    }

    pub fn groups(&self) -> &[NamedGroup] {
        self.extensions
            .iter()
            .find_map(|ext| match ext {
                TlsExtension::SupportedGroups(groups) => Some(groups.as_slice()),
                _ => None,
            })
            .unwrap_or(&[])
    }

    pub fn signature_schemes(&self) -> &[SignatureScheme] {
        self.extensions
            .iter()
            .find_map(|ext| match ext {
                TlsExtension::SignatureAlgorithms(schemes) => Some(schemes.as_slice()),
                _ => None,
            })
            .unwrap_or(&[])
    }

    pub fn point_formats(&self) -> &[u8] {
        self.extensions
            .iter()
            .find_map(|ext| match ext {
                TlsExtension::EcPointFormats(formats) => Some(formats.as_slice()),
                _ => None,
            })
            .unwrap_or(&[])
    }

    pub fn cert_compression(&self) -> &[CertCompression] {
        self.extensions
            .iter()
            .find_map(|ext| match ext {
                TlsExtension::CompressCertificate(algs) => Some(algs.as_slice()),
                _ => None,
            })
            .unwrap_or(&[])
    }

    /// Colon-separated TLS 1.2 cipher list in declared order.
    pub fn cipher_list(&self) -> String {
        self.cipher_suites
            .iter()
            .filter_map(|suite| suite.openssl_name)
            .collect::<Vec<_>>()
            .join(":")
    }

    pub fn curves_list(&self) -> String {
        self.groups().iter().map(|g| g.curve_name()).collect::<Vec<_>>().join(":")
    }

    pub fn sigalgs_list(&self) -> String {
        self.signature_schemes().iter().map(|s| s.name()).collect::<Vec<_>>().join(":")
    }

    /// JA3 string: `version,ciphers,extensions,groups,point_formats`.
    pub fn ja3_string(&self) -> String {
        fn join<T: ToString>(items: impl Iterator<Item = T>) -> String {
            items.map(|item| item.to_string()).collect::<Vec<_>>().join("-")
        }

        // legacy_version field is capped at TLS 1.2
        let version = self.max_version.min(TLS1_2);
        format!(
            "{},{},{},{},{}",
            version,
            join(self.cipher_suites.iter().map(|s| s.code)),
            join(self.extensions.iter().map(TlsExtension::id)),
            join(self.groups().iter().map(|g| g.code())),
            join(self.point_formats().iter()),
        )
    }
}
