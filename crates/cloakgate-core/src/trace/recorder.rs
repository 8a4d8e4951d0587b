//! Builds trace records from raw request snapshots.

use std::collections::HashMap;

use cloakgate_types::{HashSource, MasqueradeTraceRecord};

use super::store::MasqueradeTraceStore;
use crate::cloak::user_id::extract_session;

/// Bodies longer than this are cut and suffixed with [`TRUNCATION_MARKER`].
pub const MAX_TRACE_BODY_BYTES: usize = 4096;
const TRUNCATION_MARKER: &str = "...[truncated]";

/// Original and masked view of one outbound request.
#[derive(Debug, Clone, Default)]
pub struct MasqueradeCapture<'a> {
    pub model: &'a str,
    pub auth_id: &'a str,
    pub auth_label: &'a str,
    pub original_headers: HashMap<String, String>,
    pub masked_headers: HashMap<String, String>,
    pub original_body: &'a [u8],
    pub masked_body: &'a [u8],
    pub original_user_id: &'a str,
    pub masked_user_id: &'a str,
    pub hash_source: Option<HashSource>,
}

/// Record a capture if the store is enabled. Returns the trace id, if stored.
pub fn record_masquerade(store: &MasqueradeTraceStore, capture: MasqueradeCapture<'_>) -> Option<String> {
    if !store.is_enabled() {
        return None;
    }

    let record = MasqueradeTraceRecord {
        model: capture.model.to_string(),
        auth_id: capture.auth_id.to_string(),
        auth_label: capture.auth_label.to_string(),
        original_headers: capture.original_headers,
        original_body: truncate_body(capture.original_body, MAX_TRACE_BODY_BYTES),
        masked_headers: capture.masked_headers,
        masked_body: truncate_body(capture.masked_body, MAX_TRACE_BODY_BYTES),
        original_user_id: capture.original_user_id.to_string(),
        masked_user_id: capture.masked_user_id.to_string(),
        original_session: extract_session(capture.original_user_id).to_string(),
        masked_session: extract_session(capture.masked_user_id).to_string(),
        hash_source: capture.hash_source,
        ..Default::default()
    };

    // store may have been disabled in between
    let id = store.add(record);
    (!id.is_empty()).then_some(id)
}

/// Lossy UTF-8 rendering of at most `max_len` bytes of `body`.
pub fn truncate_body(body: &[u8], max_len: usize) -> String {
    if body.len() <= max_len {
        return String::from_utf8_lossy(body).into_owned();
    }
    let mut out = String::from_utf8_lossy(&body[..max_len]).into_owned();
    out.push_str(TRUNCATION_MARKER);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cloak::user_id::compose;

    const HASH: &str = "0123456789abcdef0123456789abcdef0123456789abcdef0123456789abcdef";
    const UUID_A: &str = "11111111-2222-4333-8444-555555555555";
    const UUID_B: &str = "66666666-7777-4888-9999-aaaaaaaaaaaa";

    #[test]
    fn test_truncate_body() {
        assert_eq!(truncate_body(b"short", 10), "short");
        assert_eq!(truncate_body(b"", 10), "");
        assert_eq!(truncate_body(b"0123456789", 10), "0123456789");
        assert_eq!(truncate_body(b"0123456789ab", 10), "0123456789...[truncated]");

        let big = vec![b'x'; MAX_TRACE_BODY_BYTES + 1];
        let out = truncate_body(&big, MAX_TRACE_BODY_BYTES);
        assert_eq!(out.len(), MAX_TRACE_BODY_BYTES + TRUNCATION_MARKER.len());
        assert!(out.ends_with(TRUNCATION_MARKER));
    }

    #[test]
    fn test_record_skipped_when_disabled() {
        let store = MasqueradeTraceStore::default();
        assert_eq!(record_masquerade(&store, MasqueradeCapture::default()), None);
        assert_eq!(store.count(), 0);
    }

    #[test]
    fn test_record_extracts_sessions() {
        let store = MasqueradeTraceStore::new(5);
        store.set_enabled(true);

        let original = compose(HASH, UUID_A);
        let masked = compose(HASH, UUID_B);
        let capture = MasqueradeCapture {
            model: "claude-sonnet-4",
            auth_id: "acct-1",
            auth_label: "primary",
            original_headers: HashMap::from([("user-agent".to_string(), "curl/8".to_string())]),
            masked_headers: HashMap::from([("user-agent".to_string(), "claude-cli/2.0".to_string())]),
            original_body: br#"{"metadata":{}}"#,
            masked_body: br#"{"metadata":{"user_id":"x"}}"#,
            original_user_id: &original,
            masked_user_id: &masked,
            hash_source: Some(HashSource::Client),
        };

        let id = record_masquerade(&store, capture).unwrap();
        let rec = store.get(&id).unwrap();
        assert_eq!(rec.original_session, UUID_A);
        assert_eq!(rec.masked_session, UUID_B);
        assert_eq!(rec.hash_source, Some(HashSource::Client));
        assert_eq!(rec.original_body, r#"{"metadata":{}}"#);
        assert_eq!(rec.to_summary().headers_modified, 1);
    }

    #[test]
    fn test_non_identifier_user_id_has_no_session() {
        let store = MasqueradeTraceStore::new(5);
        store.set_enabled(true);
        let capture = MasqueradeCapture { original_user_id: "anon", ..Default::default() };
        let id = record_masquerade(&store, capture).unwrap();
        assert_eq!(store.get(&id).unwrap().original_session, "");
    }
}
