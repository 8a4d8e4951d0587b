//! Application-level configuration.

use serde::{Deserialize, Serialize};
use validator::Validate;

use super::cloak::{CloakConfig, MasqueradeTraceConfig, SessionPoolConfig, TlsFingerprintConfig};

/// Full Cloakgate configuration as stored in `cloakgate.json`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default, Validate)]
pub struct CloakgateConfig {
    #[validate(nested)]
    #[serde(default)]
    pub cloak: CloakConfig,
    #[validate(nested)]
    #[serde(default)]
    pub session_pool: SessionPoolConfig,
    #[validate(nested)]
    #[serde(default)]
    pub masquerade_trace: MasqueradeTraceConfig,
    #[validate(nested)]
    #[serde(default)]
    pub tls_fingerprint: TlsFingerprintConfig,
}

impl CloakgateConfig {
    /// Create default configuration.
    pub fn new() -> Self {
        Self::default()
    }
}
