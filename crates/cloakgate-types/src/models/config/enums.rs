//! Configuration enums.

use serde::{Deserialize, Serialize};
use std::fmt;

/// When outbound requests get their identity masked.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum CloakMode {
    /// Cloak unless the caller already is the reference client
    #[default]
    Auto,
    /// Cloak every request
    Always,
    /// Never cloak
    Never,
}

impl fmt::Display for CloakMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::Auto => write!(f, "auto"),
            Self::Always => write!(f, "always"),
            Self::Never => write!(f, "never"),
        }
    }
}

impl CloakMode {
    /// Parse from string (case-insensitive). Unknown values map to `Auto`.
    pub fn from_string(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "always" => Self::Always,
            "never" => Self::Never,
            _ => Self::Auto,
        }
    }
}
