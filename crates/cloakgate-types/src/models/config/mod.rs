//! Application and cloaking configuration models.

mod app;
mod cloak;
mod enums;

pub use app::CloakgateConfig;
pub use cloak::{CloakConfig, MasqueradeTraceConfig, SessionPoolConfig, TlsFingerprintConfig};
pub use enums::CloakMode;
