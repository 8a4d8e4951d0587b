//! Named browser identities used when no custom profile is configured.

use serde::{Deserialize, Serialize};
use std::fmt;

const CHROME_CIPHER_LIST: &[&str] = &[
    "ECDHE-ECDSA-AES128-GCM-SHA256",
    "ECDHE-RSA-AES128-GCM-SHA256",
    "ECDHE-ECDSA-AES256-GCM-SHA384",
    "ECDHE-RSA-AES256-GCM-SHA384",
    "ECDHE-ECDSA-CHACHA20-POLY1305",
    "ECDHE-RSA-CHACHA20-POLY1305",
    "ECDHE-RSA-AES128-SHA",
    "ECDHE-RSA-AES256-SHA",
    "AES128-GCM-SHA256",
    "AES256-GCM-SHA384",
    "AES128-SHA",
    "AES256-SHA",
];

const CHROME_CURVES: &[&str] = &["X25519", "P-256", "P-384"];

const CHROME_SIGALGS: &[&str] = &[
    "ecdsa_secp256r1_sha256",
    "rsa_pss_rsae_sha256",
    "rsa_pkcs1_sha256",
    "ecdsa_secp384r1_sha384",
    "rsa_pss_rsae_sha384",
    "rsa_pkcs1_sha384",
    "rsa_pss_rsae_sha512",
    "rsa_pkcs1_sha512",
];

const FIREFOX_CIPHER_LIST: &[&str] = &[
    "ECDHE-ECDSA-AES128-GCM-SHA256",
    "ECDHE-RSA-AES128-GCM-SHA256",
    "ECDHE-ECDSA-CHACHA20-POLY1305",
    "ECDHE-RSA-CHACHA20-POLY1305",
    "ECDHE-ECDSA-AES256-GCM-SHA384",
    "ECDHE-RSA-AES256-GCM-SHA384",
    "ECDHE-ECDSA-AES256-SHA",
    "ECDHE-ECDSA-AES128-SHA",
    "ECDHE-RSA-AES128-SHA",
    "ECDHE-RSA-AES256-SHA",
    "AES128-GCM-SHA256",
    "AES256-GCM-SHA384",
    "AES128-SHA",
    "AES256-SHA",
];

const FIREFOX_CURVES: &[&str] = &["X25519", "P-256", "P-384", "P-521"];

const FIREFOX_SIGALGS: &[&str] = &[
    "ecdsa_secp256r1_sha256",
    "ecdsa_secp384r1_sha384",
    "ecdsa_secp521r1_sha512",
    "rsa_pss_rsae_sha256",
    "rsa_pss_rsae_sha384",
    "rsa_pss_rsae_sha512",
    "rsa_pkcs1_sha256",
    "rsa_pkcs1_sha384",
    "rsa_pkcs1_sha512",
];

/// Browser identity applied through BoringSSL's own knobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HelloPreset {
    /// GREASE, extension permutation, brotli certificate compression
    #[default]
    Chrome,
    /// Extension permutation without GREASE
    Firefox,
    /// Library defaults
    Default,
}

impl HelloPreset {
    pub fn cipher_list(self) -> Option<String> {
        match self {
            Self::Chrome => Some(CHROME_CIPHER_LIST.join(":")),
            Self::Firefox => Some(FIREFOX_CIPHER_LIST.join(":")),
            Self::Default => None,
        }
    }

    pub fn curves_list(self) -> Option<String> {
        match self {
            Self::Chrome => Some(CHROME_CURVES.join(":")),
            Self::Firefox => Some(FIREFOX_CURVES.join(":")),
            Self::Default => None,
        }
    }

    pub fn sigalgs_list(self) -> Option<String> {
        match self {
            Self::Chrome => Some(CHROME_SIGALGS.join(":")),
            Self::Firefox => Some(FIREFOX_SIGALGS.join(":")),
            Self::Default => None,
        }
    }

    pub const fn grease(self) -> bool {
        matches!(self, Self::Chrome)
    }

    pub const fn permute_extensions(self) -> bool {
        matches!(self, Self::Chrome | Self::Firefox)
    }

    pub const fn brotli_cert_compression(self) -> bool {
        matches!(self, Self::Chrome)
    }

    /// OCSP stapling and SCT requests.
    pub const fn status_extensions(self) -> bool {
        matches!(self, Self::Chrome)
    }

    /// Parse from string (case-insensitive). Unknown values map to `Chrome`.
    pub fn from_string(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "firefox" => Self::Firefox,
            "default" | "none" => Self::Default,
            _ => Self::Chrome,
        }
    }
}

impl fmt::Display for HelloPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::Chrome => write!(f, "chrome"),
            Self::Firefox => write!(f, "firefox"),
            Self::Default => write!(f, "default"),
        }
    }
}
