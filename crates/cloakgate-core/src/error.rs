//! Unified error types for Cloakgate Core.

use cloakgate_types::{ConfigError, TransportError};
use thiserror::Error;

/// Startup and management failures surfaced to the server.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum AppError {
    /// Outbound fingerprint transport failed.
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Configuration loading, validation or saving failed.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Result type alias for Cloakgate operations.
pub type AppResult<T> = Result<T, AppError>;
