//! Session identifier format: `user_<64-hex>_account__session_<uuid>`.

use rand::RngCore;
use regex::Regex;
use sha2::{Digest, Sha256};
use std::sync::OnceLock;
use uuid::Uuid;

use cloakgate_types::HashSource;

pub const USER_PREFIX: &str = "user_";
pub const SESSION_MARKER: &str = "_account__session_";

const HASH_LEN: usize = 64;
const UUID_LEN: usize = 36;

#[allow(clippy::expect_used, reason = "static pattern")]
fn user_id_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r"^user_[a-fA-F0-9]{64}_account__session_[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}$",
        )
        .expect("valid user_id regex")
    })
}

/// Strict check against the reference client's format (lowercase UUID tail).
pub fn is_valid_user_id(user_id: &str) -> bool {
    user_id_pattern().is_match(user_id)
}

/// Extract the 64-hex hash segment from a client identifier.
///
/// Only the prefix and the hash are checked; the session tail may be anything.
pub fn extract_hash(user_id: &str) -> Option<&str> {
    let rest = user_id.strip_prefix(USER_PREFIX)?;
    let mut parts = rest.split(SESSION_MARKER);
    let hash = parts.next()?;
    // exactly one marker
    parts.next()?;
    if parts.next().is_some() {
        return None;
    }
    (hash.len() == HASH_LEN && hash.bytes().all(|b| b.is_ascii_hexdigit())).then_some(hash)
}

/// Session UUID tail of an identifier, or empty when the input is too short.
pub fn extract_session(user_id: &str) -> &str {
    if user_id.len() > SESSION_MARKER.len() + UUID_LEN {
        user_id.get(user_id.len() - UUID_LEN..).unwrap_or("")
    } else {
        ""
    }
}

/// Lowercase hex SHA-256 of the channel key.
pub fn channel_hash(channel_key: &str) -> String {
    format!("{:x}", Sha256::digest(channel_key.as_bytes()))
}

/// Reuse the client's hash when it sent a well-formed identifier, otherwise
/// derive one from the channel key.
pub fn extract_or_generate_hash(client_user_id: &str, channel_key: &str) -> (String, HashSource) {
    match extract_hash(client_user_id) {
        Some(hash) => (hash.to_string(), HashSource::Client),
        None => (channel_hash(channel_key), HashSource::Channel),
    }
}

pub fn compose(hash_part: &str, session_uuid: &str) -> String {
    format!("{USER_PREFIX}{hash_part}{SESSION_MARKER}{session_uuid}")
}

/// One-off random identifier that is not tied to any pool.
pub fn generate_fake_user_id() -> String {
    let mut bytes = [0_u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    let hex: String = bytes.iter().map(|b| format!("{b:02x}")).collect();
    compose(&hex, &Uuid::new_v4().to_string())
}
