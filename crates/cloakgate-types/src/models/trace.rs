//! Masquerade trace records: original vs. masked request snapshots.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Where the pool key hash of a session identifier came from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum HashSource {
    /// Reused from the identifier the client sent
    Client,
    /// Derived from the channel / API key
    #[default]
    Channel,
}

impl HashSource {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Client => "client",
            Self::Channel => "channel",
        }
    }
}

impl fmt::Display for HashSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single masquerade trace entry.
///
/// `Clone` is a deep copy: every field is owned, including both header maps.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct MasqueradeTraceRecord {
    pub id: String,
    /// Unix milliseconds
    pub timestamp: i64,
    pub model: String,
    pub auth_id: String,
    pub auth_label: String,

    pub original_headers: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub original_body: String,

    pub masked_headers: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub masked_body: String,

    pub original_user_id: String,
    pub masked_user_id: String,
    pub original_session: String,
    pub masked_session: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash_source: Option<HashSource>,
}

/// Lightweight view of a record for list responses.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MasqueradeTraceSummary {
    pub id: String,
    pub timestamp: i64,
    pub model: String,
    pub auth_id: String,
    pub auth_label: String,
    pub original_user_id: String,
    pub masked_user_id: String,
    pub user_id_changed: bool,
    pub headers_modified: usize,
}

impl MasqueradeTraceRecord {
    /// Number of masked headers that were added or rewritten.
    ///
    /// Headers present only in the original (i.e. stripped by masking) are not counted.
    pub fn headers_modified(&self) -> usize {
        self.masked_headers
            .iter()
            .filter(|(k, v)| self.original_headers.get(*k) != Some(*v))
            .count()
    }

    pub fn to_summary(&self) -> MasqueradeTraceSummary {
        MasqueradeTraceSummary {
            id: self.id.clone(),
            timestamp: self.timestamp,
            model: self.model.clone(),
            auth_id: self.auth_id.clone(),
            auth_label: self.auth_label.clone(),
            original_user_id: self.original_user_id.clone(),
            masked_user_id: self.masked_user_id.clone(),
            user_id_changed: self.original_user_id != self.masked_user_id,
            headers_modified: self.headers_modified(),
        }
    }
}
