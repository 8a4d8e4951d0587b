//! # Cloakgate Types
//!
//! Core types, models, and error definitions for Cloakgate.
//!
//! - **`error`** - Typed error hierarchy for the outbound transport and configuration
//! - **`models`** - Configuration models and masquerade trace records
//!
//! ## Architecture Role
//!
//! `cloakgate-types` sits at the bottom of the dependency graph:
//!
//! ```text
//!      cloakgate-types (this crate)
//!              │
//!              ▼
//!       cloakgate-core
//!              │
//!              ▼
//!      cloakgate-server
//! ```
//!
//! All types are designed to be:
//! - **Serializable** via serde for API/config files
//! - **Clone** for cheap sharing across async boundaries
//! - **PartialEq** for testing and comparison

pub mod error;
pub mod models;

pub use error::{ConfigError, TransportError};

pub use models::{
    CloakConfig, CloakMode, CloakgateConfig, HashSource, MasqueradeTraceConfig,
    MasqueradeTraceRecord, MasqueradeTraceSummary, SessionPoolConfig, TlsFingerprintConfig,
};
