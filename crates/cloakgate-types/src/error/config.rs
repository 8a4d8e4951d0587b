//! Errors from reading, validating and writing `cloakgate.json`.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure while handling the gateway's JSON config file.
#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "details")]
pub enum ConfigError {
    /// No file at `path`; callers usually fall back to defaults
    #[error("cloakgate.json missing at {path}")]
    NotFound { path: String },

    /// File exists but could not be read
    #[error("cloakgate.json unreadable: {message}")]
    ReadError { message: String },

    /// File is not valid JSON or does not match the config shape
    #[error("cloakgate.json is malformed: {message}")]
    ParseError { message: String },

    /// A section is out of range, e.g. `masquerade_trace.max_records = 0`.
    /// `field` names the top-level section.
    #[error("invalid {field} settings: {message}")]
    ValidationError { field: String, message: String },

    #[error("cannot save cloakgate.json: {message}")]
    WriteError { message: String },
}

impl ConfigError {
    pub fn from_json_error(e: &serde_json::Error) -> Self {
        Self::ParseError { message: e.to_string() }
    }

    pub fn from_read_error(e: &std::io::Error) -> Self {
        Self::ReadError { message: e.to_string() }
    }

    pub fn from_io_error(e: &std::io::Error) -> Self {
        Self::WriteError { message: e.to_string() }
    }

    /// First offending section from a `validator` report; nested errors included.
    pub fn from_validation(errors: &validator::ValidationErrors) -> Self {
        let field = errors
            .errors()
            .keys()
            .next()
            .map(|k| k.to_string())
            .unwrap_or_else(|| "config".to_string());
        Self::ValidationError { field, message: errors.to_string() }
    }
}
