//! Request-level cloaking: decide, resolve the session identifier, rewrite
//! `metadata.user_id`, apply header overrides and record a trace.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use cloakgate_types::{CloakConfig, HashSource, SessionPoolConfig};

use super::policy::should_cloak;
use super::registry::SessionPoolRegistry;
use crate::trace::{record_masquerade, MasqueradeCapture, MasqueradeTraceStore};

/// Everything the cloaker needs to know about one outbound request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CloakRequest {
    pub auth_id: String,
    pub auth_label: String,
    pub model: String,
    /// API / channel key the client authenticated with
    pub channel_key: String,
    pub user_agent: String,
    pub headers: BTreeMap<String, String>,
    pub body: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CloakOutcome {
    pub cloaked: bool,
    pub headers: BTreeMap<String, String>,
    pub body: Value,
    /// Identifier written into the body; empty when not cloaked
    pub user_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hash_source: Option<HashSource>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<String>,
}

impl CloakOutcome {
    fn passthrough(request: CloakRequest) -> Self {
        Self {
            cloaked: false,
            headers: request.headers,
            body: request.body,
            user_id: String::new(),
            hash_source: None,
            trace_id: None,
        }
    }
}

pub struct Cloaker {
    registry: Arc<SessionPoolRegistry>,
    traces: Arc<MasqueradeTraceStore>,
    config: CloakConfig,
    pool_config: SessionPoolConfig,
}

impl Cloaker {
    pub fn new(
        registry: Arc<SessionPoolRegistry>,
        traces: Arc<MasqueradeTraceStore>,
        config: CloakConfig,
        pool_config: SessionPoolConfig,
    ) -> Self {
        Self { registry, traces, config, pool_config }
    }

    pub fn registry(&self) -> &Arc<SessionPoolRegistry> {
        &self.registry
    }

    pub fn traces(&self) -> &Arc<MasqueradeTraceStore> {
        &self.traces
    }

    pub fn config(&self) -> &CloakConfig {
        &self.config
    }

    pub fn cloak(&self, request: CloakRequest) -> CloakOutcome {
        if !should_cloak(self.config.mode, &request.user_agent) {
            tracing::debug!(
                auth_id = %request.auth_id,
                mode = %self.config.mode,
                "[Cloak] Passing request through"
            );
            return CloakOutcome::passthrough(request);
        }

        let Value::Object(_) = request.body else {
            tracing::warn!(auth_id = %request.auth_id, "[Cloak] Body is not a JSON object, skipping");
            return CloakOutcome::passthrough(request);
        };

        let original_user_id = client_user_id(&request.body).unwrap_or_default().to_string();
        let resolved = self.registry.resolve_detailed(
            &request.auth_id,
            &original_user_id,
            &request.channel_key,
            self.pool_config.max_sessions,
            self.pool_config.rotation_interval(),
        );

        let mut body = request.body.clone();
        set_user_id(&mut body, &resolved.user_id);

        let mut headers = request.headers.clone();
        apply_header_overrides(&mut headers, &self.config.header_overrides);

        let trace_id = if self.traces.is_enabled() {
            let original_body = serde_json::to_vec(&request.body).unwrap_or_default();
            let masked_body = serde_json::to_vec(&body).unwrap_or_default();
            record_masquerade(
                &self.traces,
                MasqueradeCapture {
                    model: &request.model,
                    auth_id: &request.auth_id,
                    auth_label: &request.auth_label,
                    original_headers: to_hash_map(&request.headers),
                    masked_headers: to_hash_map(&headers),
                    original_body: &original_body,
                    masked_body: &masked_body,
                    original_user_id: &original_user_id,
                    masked_user_id: &resolved.user_id,
                    hash_source: Some(resolved.hash_source),
                },
            )
        } else {
            None
        };

        tracing::debug!(
            auth_id = %request.auth_id,
            model = %request.model,
            hash_source = %resolved.hash_source,
            traced = trace_id.is_some(),
            "[Cloak] Request cloaked"
        );

        CloakOutcome {
            cloaked: true,
            headers,
            body,
            user_id: resolved.user_id,
            hash_source: Some(resolved.hash_source),
            trace_id,
        }
    }
}

fn client_user_id(body: &Value) -> Option<&str> {
    body.get("metadata")?.get("user_id")?.as_str()
}

/// Set `metadata.user_id`, replacing a non-object `metadata`.
fn set_user_id(body: &mut Value, user_id: &str) {
    let Value::Object(map) = body else {
        return;
    };
    let metadata = map.entry("metadata").or_insert_with(|| Value::Object(serde_json::Map::new()));
    if !metadata.is_object() {
        *metadata = Value::Object(serde_json::Map::new());
    }
    if let Value::Object(meta) = metadata {
        meta.insert("user_id".to_string(), Value::String(user_id.to_string()));
    }
}

/// Header names compare case-insensitively; an override replaces every
/// existing spelling of its name.
fn apply_header_overrides(headers: &mut BTreeMap<String, String>, overrides: &HashMap<String, String>) {
    for (name, value) in overrides {
        headers.retain(|existing, _| !existing.eq_ignore_ascii_case(name));
        headers.insert(name.clone(), value.clone());
    }
}

fn to_hash_map(headers: &BTreeMap<String, String>) -> HashMap<String, String> {
    headers.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cloak::user_id::{channel_hash, compose, is_valid_user_id};
    use cloakgate_types::CloakMode;
    use serde_json::json;

    const CLIENT_HASH: &str = "abcdefabcdefabcdefabcdefabcdefabcdefabcdefabcdefabcdefabcdefabcd";

    fn cloaker(mode: CloakMode, tracing_on: bool) -> Cloaker {
        let traces = Arc::new(MasqueradeTraceStore::new(10));
        traces.set_enabled(tracing_on);
        let config = CloakConfig {
            mode,
            header_overrides: HashMap::from([("User-Agent".to_string(), "claude-cli/2.0.14 (external, cli)".to_string())]),
        };
        Cloaker::new(Arc::new(SessionPoolRegistry::default()), traces, config, SessionPoolConfig::default())
    }

    fn request(body: Value) -> CloakRequest {
        CloakRequest {
            auth_id: "acct-1".to_string(),
            auth_label: "primary".to_string(),
            model: "claude-sonnet-4".to_string(),
            channel_key: "sk-channel".to_string(),
            user_agent: "curl/8.4".to_string(),
            headers: BTreeMap::from([
                ("user-agent".to_string(), "curl/8.4".to_string()),
                ("x-trace".to_string(), "1".to_string()),
            ]),
            body,
        }
    }

    #[test]
    fn test_body_rewrite_creates_metadata() {
        let cloaker = cloaker(CloakMode::Auto, false);
        let outcome = cloaker.cloak(request(json!({"model": "claude-sonnet-4", "messages": []})));
        assert!(outcome.cloaked);
        assert!(is_valid_user_id(&outcome.user_id));
        assert_eq!(outcome.body["metadata"]["user_id"], json!(outcome.user_id));
        assert_eq!(outcome.body["model"], json!("claude-sonnet-4"));
        assert!(outcome.user_id.starts_with(&format!("user_{}", channel_hash("sk-channel"))));
        assert_eq!(outcome.hash_source, Some(HashSource::Channel));
        assert_eq!(outcome.trace_id, None);
    }

    #[test]
    fn test_client_hash_reused_and_other_metadata_kept() {
        let cloaker = cloaker(CloakMode::Always, false);
        let client_id = compose(CLIENT_HASH, "client-session");
        let outcome = cloaker.cloak(request(json!({"metadata": {"user_id": client_id, "tag": "t"}})));
        assert_eq!(outcome.hash_source, Some(HashSource::Client));
        assert!(outcome.user_id.starts_with(&format!("user_{}", CLIENT_HASH)));
        assert_ne!(outcome.user_id, client_id);
        assert_eq!(outcome.body["metadata"]["tag"], json!("t"));
    }

    #[test]
    fn test_header_overrides_replace_case_insensitively() {
        let cloaker = cloaker(CloakMode::Always, false);
        let outcome = cloaker.cloak(request(json!({})));
        assert_eq!(outcome.headers.get("User-Agent").map(String::as_str), Some("claude-cli/2.0.14 (external, cli)"));
        assert!(!outcome.headers.contains_key("user-agent"));
        assert_eq!(outcome.headers["x-trace"], "1");
    }

    #[test]
    fn test_mode_never_passes_through() {
        let cloaker = cloaker(CloakMode::Never, true);
        let body = json!({"metadata": {"user_id": "anything"}});
        let outcome = cloaker.cloak(request(body.clone()));
        assert!(!outcome.cloaked);
        assert_eq!(outcome.body, body);
        assert_eq!(outcome.headers["user-agent"], "curl/8.4");
        assert!(outcome.user_id.is_empty());
        assert_eq!(cloaker.traces().count(), 0);
    }

    #[test]
    fn test_auto_skips_reference_client() {
        let cloaker = cloaker(CloakMode::Auto, false);
        let mut req = request(json!({}));
        req.user_agent = "claude-cli/2.0.14 (external, cli)".to_string();
        assert!(!cloaker.cloak(req).cloaked);
    }

    #[test]
    fn test_non_object_body_passes_through() {
        let cloaker = cloaker(CloakMode::Always, true);
        let outcome = cloaker.cloak(request(json!(["not", "an", "object"])));
        assert!(!outcome.cloaked);
        assert_eq!(outcome.body, json!(["not", "an", "object"]));
    }

    #[test]
    fn test_non_object_metadata_is_replaced() {
        let cloaker = cloaker(CloakMode::Always, false);
        let outcome = cloaker.cloak(request(json!({"metadata": "oops"})));
        assert!(outcome.body["metadata"]["user_id"].is_string());
    }

    #[test]
    fn test_trace_recorded_when_enabled() {
        let cloaker = cloaker(CloakMode::Always, true);
        let outcome = cloaker.cloak(request(json!({"messages": []})));
        let trace_id = outcome.trace_id.unwrap();
        let record = cloaker.traces().get(&trace_id).unwrap();
        assert_eq!(record.auth_id, "acct-1");
        assert_eq!(record.masked_user_id, outcome.user_id);
        assert_eq!(record.original_user_id, "");
        assert_eq!(record.hash_source, Some(HashSource::Channel));
        assert!(record.masked_body.contains(&outcome.user_id));
        assert_eq!(record.masked_session.len(), 36);
    }

    #[test]
    fn test_same_key_same_identifier() {
        let cloaker = cloaker(CloakMode::Always, false);
        let a = cloaker.cloak(request(json!({}))).user_id;
        let b = cloaker.cloak(request(json!({}))).user_id;
        assert_eq!(a, b);
        assert_eq!(cloaker.registry().pool_count(), 1);
    }
}
