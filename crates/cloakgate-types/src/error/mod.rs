//! Typed error definitions for Cloakgate.
//!
//! Only the outbound transport and configuration loading can fail. Session
//! pools and the masquerade trace store degrade to defaults instead of
//! returning errors, so they have no error type here.
//!
//! All errors are:
//!
//! - **Serializable** for API responses via serde
//! - **Displayable** for logging via Display trait
//! - **Matchable** for error handling logic via enum variants

mod config;
mod transport;

pub use config::ConfigError;
pub use transport::TransportError;
