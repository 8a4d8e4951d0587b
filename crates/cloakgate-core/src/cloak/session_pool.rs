//! Rotating session identities for a single credential.
//!
//! Each pool holds a handful of session UUIDs. A caller's channel key is mapped
//! onto one of the currently active sessions, so the same key keeps seeing the
//! same identifier until rotation evicts that session. Rotation is lazy: it
//! happens on the first `user_id_at` call after the interval elapsed.
//!
//! Selection is `digest(key) mod active_count`, not a consistent-hash ring. It
//! is stable only while the active set is unchanged, which in practice means
//! between rotations.

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use cloakgate_types::HashSource;

use super::user_id;

pub const DEFAULT_MAX_SESSIONS: usize = 5;
pub const DEFAULT_ROTATION_INTERVAL: std::time::Duration = std::time::Duration::from_secs(6 * 60 * 60);
/// Overlap during which a retiring session is still handed out.
pub const DEFAULT_GRACE_PERIOD: std::time::Duration = std::time::Duration::from_secs(5 * 60);

/// A single session UUID with lifecycle metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionEntry {
    pub uuid: String,
    pub created_at: DateTime<Utc>,
    pub active_at: Option<DateTime<Utc>>,
    /// `None` = active indefinitely
    pub retire_at: Option<DateTime<Utc>>,
}

impl SessionEntry {
    fn new(now: DateTime<Utc>) -> Self {
        Self {
            uuid: Uuid::new_v4().to_string(),
            created_at: now,
            active_at: Some(now),
            retire_at: None,
        }
    }

    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        let started = self.active_at.map_or(true, |at| at <= now);
        let not_retired = self.retire_at.map_or(true, |at| now < at);
        started && not_retired
    }

    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.retire_at.is_some_and(|at| now >= at)
    }
}

#[derive(Debug)]
struct PoolState {
    sessions: Vec<SessionEntry>,
    last_rotation: DateTime<Utc>,
}

/// Session pool for one `(credential, hash)` key.
#[derive(Debug)]
pub struct AuthSessionPool {
    auth_id: String,
    hash_part: String,
    hash_source: HashSource,
    max_sessions: usize,
    rotation_interval: Duration,
    state: Mutex<PoolState>,
}

pub(crate) fn to_chrono(interval: std::time::Duration) -> Duration {
    Duration::from_std(interval).unwrap_or_else(|_| Duration::days(36_500))
}

impl AuthSessionPool {
    /// Zero `max_sessions` or `rotation_interval` fall back to the defaults.
    pub fn new(
        auth_id: impl Into<String>,
        hash_part: impl Into<String>,
        hash_source: HashSource,
        max_sessions: usize,
        rotation_interval: std::time::Duration,
        now: DateTime<Utc>,
    ) -> Self {
        let max_sessions = if max_sessions == 0 { DEFAULT_MAX_SESSIONS } else { max_sessions };
        let rotation_interval = if rotation_interval.is_zero() {
            DEFAULT_ROTATION_INTERVAL
        } else {
            rotation_interval
        };

        let mut sessions = Vec::with_capacity(max_sessions + 1);
        sessions.push(SessionEntry::new(now));

        Self {
            auth_id: auth_id.into(),
            hash_part: hash_part.into(),
            hash_source,
            max_sessions,
            rotation_interval: to_chrono(rotation_interval),
            state: Mutex::new(PoolState { sessions, last_rotation: now }),
        }
    }

    pub fn auth_id(&self) -> &str {
        &self.auth_id
    }

    pub fn hash_part(&self) -> &str {
        &self.hash_part
    }

    pub fn hash_source(&self) -> HashSource {
        self.hash_source
    }

    pub fn max_sessions(&self) -> usize {
        self.max_sessions
    }

    /// Rotate if due, then pick the session for `channel_key` and render the identifier.
    pub fn user_id_at(&self, channel_key: &str, now: DateTime<Utc>) -> String {
        let mut state = self.state.lock();

        self.maybe_rotate(&mut state, now);

        let mut active = active_sessions(&state.sessions, now);
        if active.is_empty() {
            tracing::debug!(auth_id = %self.auth_id, "[SessionPool] No active sessions, creating one");
            state.sessions.push(SessionEntry::new(now));
            active = active_sessions(&state.sessions, now);
        }

        let session = select_session_by_key(channel_key, &active);
        user_id::compose(&self.hash_part, &session)
    }

    /// Snapshot of all sessions, including ones in their grace period.
    pub fn sessions(&self) -> Vec<SessionEntry> {
        self.state.lock().sessions.clone()
    }

    pub fn active_count_at(&self, now: DateTime<Utc>) -> usize {
        self.state.lock().sessions.iter().filter(|s| s.is_active(now)).count()
    }

    fn maybe_rotate(&self, state: &mut PoolState, now: DateTime<Utc>) {
        if now - state.last_rotation < self.rotation_interval {
            return;
        }

        let before = state.sessions.len();
        state.sessions.retain(|s| !s.is_expired(now));
        let removed = before - state.sessions.len();

        let active_count = state.sessions.iter().filter(|s| s.is_active(now)).count();
        let retired = if active_count >= self.max_sessions {
            retire_oldest(&mut state.sessions, now)
        } else {
            None
        };

        state.sessions.push(SessionEntry::new(now));
        state.last_rotation = now;

        tracing::debug!(
            auth_id = %self.auth_id,
            removed,
            retiring = retired.as_deref().unwrap_or("none"),
            total = state.sessions.len(),
            "[SessionPool] Rotated sessions"
        );
    }
}

fn active_sessions(sessions: &[SessionEntry], now: DateTime<Utc>) -> Vec<String> {
    sessions.iter().filter(|s| s.is_active(now)).map(|s| s.uuid.clone()).collect()
}

/// Schedule the oldest active session for retirement after the grace period.
fn retire_oldest(sessions: &mut [SessionEntry], now: DateTime<Utc>) -> Option<String> {
    let oldest = sessions
        .iter_mut()
        .filter(|s| s.is_active(now))
        .min_by_key(|s| s.created_at)?;
    oldest.retire_at = Some(now + to_chrono(DEFAULT_GRACE_PERIOD));
    Some(oldest.uuid.clone())
}

/// Index = first 8 bytes of SHA-256(key), big-endian, modulo the active count.
pub fn select_index(channel_key: &str, len: usize) -> usize {
    if len <= 1 {
        return 0;
    }
    let digest = Sha256::digest(channel_key.as_bytes());
    let mut head = [0_u8; 8];
    head.copy_from_slice(&digest[..8]);
    (u64::from_be_bytes(head) % len as u64) as usize
}

fn select_session_by_key(channel_key: &str, sessions: &[String]) -> String {
    match sessions {
        [] => Uuid::new_v4().to_string(),
        [only] => only.clone(),
        _ => sessions[select_index(channel_key, sessions.len())].clone(),
    }
}

#[cfg(test)]
#[path = "session_pool_tests.rs"]
mod session_pool_tests;
