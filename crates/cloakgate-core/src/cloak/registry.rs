//! Registry of session pools keyed by `credential_id:hash_part`.
//!
//! Pools are created lazily and live for the lifetime of the registry.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use cloakgate_types::{HashSource, SessionPoolConfig};

use super::session_pool::{AuthSessionPool, DEFAULT_MAX_SESSIONS, DEFAULT_ROTATION_INTERVAL};
use super::user_id;

/// Identifier handed back to request handlers, plus where its hash came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedUserId {
    pub user_id: String,
    pub hash_source: HashSource,
}

pub struct SessionPoolRegistry {
    pools: RwLock<HashMap<String, Arc<AuthSessionPool>>>,
    default_max_sessions: usize,
    default_rotation_interval: Duration,
}

impl SessionPoolRegistry {
    /// Zero values fall back to the built-in defaults.
    pub fn new(default_max_sessions: usize, default_rotation_interval: Duration) -> Self {
        Self {
            pools: RwLock::new(HashMap::new()),
            default_max_sessions: if default_max_sessions == 0 {
                DEFAULT_MAX_SESSIONS
            } else {
                default_max_sessions
            },
            default_rotation_interval: if default_rotation_interval.is_zero() {
                DEFAULT_ROTATION_INTERVAL
            } else {
                default_rotation_interval
            },
        }
    }

    pub fn from_config(config: &SessionPoolConfig) -> Self {
        Self::new(config.max_sessions, config.rotation_interval())
    }

    /// Session identifier for a request made with `credential_id`.
    ///
    /// `client_user_id` is whatever identifier the caller sent (may be empty);
    /// `channel_key` is the API/channel key used both for hashing and for
    /// picking a session inside the pool. Never fails.
    pub fn resolve(
        &self,
        credential_id: &str,
        client_user_id: &str,
        channel_key: &str,
        max_sessions: usize,
        rotation_interval: Duration,
    ) -> String {
        self.resolve_detailed(credential_id, client_user_id, channel_key, max_sessions, rotation_interval)
            .user_id
    }

    pub fn resolve_detailed(
        &self,
        credential_id: &str,
        client_user_id: &str,
        channel_key: &str,
        max_sessions: usize,
        rotation_interval: Duration,
    ) -> ResolvedUserId {
        self.resolve_at(
            credential_id,
            client_user_id,
            channel_key,
            max_sessions,
            rotation_interval,
            Utc::now(),
        )
    }

    /// Same as [`resolve_detailed`](Self::resolve_detailed) with an explicit clock.
    pub fn resolve_at(
        &self,
        credential_id: &str,
        client_user_id: &str,
        channel_key: &str,
        max_sessions: usize,
        rotation_interval: Duration,
        now: DateTime<Utc>,
    ) -> ResolvedUserId {
        let (hash_part, hash_source) = user_id::extract_or_generate_hash(client_user_id, channel_key);
        let pool = self.get_or_create_pool(
            credential_id,
            &hash_part,
            hash_source,
            max_sessions,
            rotation_interval,
            now,
        );
        ResolvedUserId { user_id: pool.user_id_at(channel_key, now), hash_source }
    }

    fn get_or_create_pool(
        &self,
        credential_id: &str,
        hash_part: &str,
        hash_source: HashSource,
        max_sessions: usize,
        rotation_interval: Duration,
        now: DateTime<Utc>,
    ) -> Arc<AuthSessionPool> {
        let key = pool_key(credential_id, hash_part);

        // Fast path: check read lock
        {
            let pools = self.pools.read();
            if let Some(pool) = pools.get(&key) {
                return Arc::clone(pool);
            }
        }

        // Slow path: create under write lock
        let mut pools = self.pools.write();
        // Double-check after acquiring write lock
        if let Some(pool) = pools.get(&key) {
            return Arc::clone(pool);
        }

        let max_sessions = if max_sessions == 0 { self.default_max_sessions } else { max_sessions };
        let rotation_interval = if rotation_interval.is_zero() {
            self.default_rotation_interval
        } else {
            rotation_interval
        };

        let pool = Arc::new(AuthSessionPool::new(
            credential_id,
            hash_part,
            hash_source,
            max_sessions,
            rotation_interval,
            now,
        ));
        tracing::debug!(
            auth_id = %credential_id,
            hash_source = %hash_source,
            max_sessions,
            rotation_secs = rotation_interval.as_secs(),
            "[SessionPool] Created pool"
        );
        pools.insert(key, Arc::clone(&pool));
        pool
    }

    pub fn pool_count(&self) -> usize {
        self.pools.read().len()
    }

    pub fn pool(&self, credential_id: &str, hash_part: &str) -> Option<Arc<AuthSessionPool>> {
        self.pools.read().get(&pool_key(credential_id, hash_part)).cloned()
    }
}

impl Default for SessionPoolRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_SESSIONS, DEFAULT_ROTATION_INTERVAL)
    }
}

fn pool_key(credential_id: &str, hash_part: &str) -> String {
    format!("{credential_id}:{hash_part}")
}
