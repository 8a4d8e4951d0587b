//! Core domain models for Cloakgate.

mod config;
mod trace;

pub use config::{
    CloakConfig, CloakMode, CloakgateConfig, MasqueradeTraceConfig, SessionPoolConfig,
    TlsFingerprintConfig,
};
pub use trace::{HashSource, MasqueradeTraceRecord, MasqueradeTraceSummary};
