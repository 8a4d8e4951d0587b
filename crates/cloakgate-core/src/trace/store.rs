//! Ring buffer of masquerade trace records.
//!
//! Disabled by default: `add` is a no-op until tracing is switched on via
//! `set_enabled` or `apply_config`. Records are owned by the store, and every
//! read hands out clones, so callers can never mutate stored entries.

use parking_lot::RwLock;
use uuid::Uuid;

use cloakgate_types::{MasqueradeTraceConfig, MasqueradeTraceRecord, MasqueradeTraceSummary};

pub const DEFAULT_MAX_TRACE_RECORDS: usize = 100;

#[derive(Debug)]
struct Ring {
    slots: Vec<Option<MasqueradeTraceRecord>>,
    /// Next write position
    cursor: usize,
    /// Writes since the last clear/resize, may exceed capacity
    total: usize,
    /// Set once the ring has wrapped
    full: bool,
    enabled: bool,
}

impl Ring {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: vec![None; capacity],
            cursor: 0,
            total: 0,
            full: false,
            enabled: false,
        }
    }

    fn capacity(&self) -> usize {
        self.slots.len()
    }

    fn active_count(&self) -> usize {
        if self.full {
            self.capacity()
        } else {
            self.cursor
        }
    }

    /// Occupied slots, newest first.
    fn newest_first(&self) -> impl Iterator<Item = &MasqueradeTraceRecord> + '_ {
        let cap = self.capacity();
        (0..self.active_count())
            .map(move |i| (self.cursor + cap - 1 - i) % cap)
            .filter_map(move |idx| self.slots[idx].as_ref())
    }
}

pub struct MasqueradeTraceStore {
    inner: RwLock<Ring>,
}

impl MasqueradeTraceStore {
    /// Zero capacity falls back to [`DEFAULT_MAX_TRACE_RECORDS`].
    pub fn new(max_size: usize) -> Self {
        let capacity = if max_size == 0 { DEFAULT_MAX_TRACE_RECORDS } else { max_size };
        Self { inner: RwLock::new(Ring::with_capacity(capacity)) }
    }

    pub fn set_enabled(&self, enabled: bool) {
        let mut ring = self.inner.write();
        if ring.enabled != enabled {
            tracing::info!(enabled, "[TraceStore] Masquerade tracing toggled");
        }
        ring.enabled = enabled;
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.read().enabled
    }

    /// Store `record` and return its id, or an empty string while disabled.
    ///
    /// Missing id and timestamp are filled in (UUID v4, Unix milliseconds).
    pub fn add(&self, mut record: MasqueradeTraceRecord) -> String {
        let mut ring = self.inner.write();
        if !ring.enabled {
            return String::new();
        }

        if record.id.is_empty() {
            record.id = Uuid::new_v4().to_string();
        }
        if record.timestamp == 0 {
            record.timestamp = chrono::Utc::now().timestamp_millis();
        }
        let id = record.id.clone();

        let cursor = ring.cursor;
        let capacity = ring.capacity();
        ring.slots[cursor] = Some(record);
        ring.cursor = (cursor + 1) % capacity;
        ring.total += 1;
        if ring.total >= capacity {
            ring.full = true;
        }

        tracing::debug!(trace_id = %id, total = ring.total, "[TraceStore] Recorded trace");
        id
    }

    pub fn get(&self, id: &str) -> Option<MasqueradeTraceRecord> {
        self.inner.read().slots.iter().flatten().find(|r| r.id == id).cloned()
    }

    /// Summaries, newest first.
    pub fn list(&self) -> Vec<MasqueradeTraceSummary> {
        self.inner.read().newest_first().map(MasqueradeTraceRecord::to_summary).collect()
    }

    /// Full records, newest first.
    pub fn list_full(&self) -> Vec<MasqueradeTraceRecord> {
        self.inner.read().newest_first().cloned().collect()
    }

    pub fn clear(&self) {
        let mut ring = self.inner.write();
        ring.slots.iter_mut().for_each(|slot| *slot = None);
        ring.cursor = 0;
        ring.total = 0;
        ring.full = false;
        tracing::info!("[TraceStore] Cleared all records");
    }

    pub fn count(&self) -> usize {
        self.inner.read().active_count()
    }

    pub fn capacity(&self) -> usize {
        self.inner.read().capacity()
    }

    /// Resize the ring, keeping the newest `min(count, max_size)` records in
    /// their original order. Zero falls back to the default capacity.
    pub fn set_max_size(&self, max_size: usize) {
        let max_size = if max_size == 0 { DEFAULT_MAX_TRACE_RECORDS } else { max_size };
        let mut ring = self.inner.write();
        let old_cap = ring.capacity();
        if max_size == old_cap {
            return;
        }

        let copied = ring.active_count().min(max_size);
        let mut slots: Vec<Option<MasqueradeTraceRecord>> = vec![None; max_size];
        for (i, slot) in slots.iter_mut().take(copied).enumerate() {
            // oldest kept record first
            let src = if ring.full {
                (ring.cursor + old_cap - copied + i) % old_cap
            } else {
                ring.cursor - copied + i
            };
            *slot = ring.slots[src].take();
        }

        ring.slots = slots;
        ring.cursor = copied % max_size;
        ring.full = copied >= max_size;
        ring.total = copied;

        tracing::debug!(old_cap, new_cap = max_size, kept = copied, "[TraceStore] Resized ring buffer");
    }

    /// Capacity first, then the enabled flag.
    pub fn apply_config(&self, config: &MasqueradeTraceConfig) {
        self.set_max_size(config.max_records);
        self.set_enabled(config.enable);
    }
}

impl Default for MasqueradeTraceStore {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_TRACE_RECORDS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn record(id: &str) -> MasqueradeTraceRecord {
        MasqueradeTraceRecord {
            id: id.to_string(),
            model: "claude-sonnet".to_string(),
            ..Default::default()
        }
    }

    fn enabled_store(capacity: usize) -> MasqueradeTraceStore {
        let store = MasqueradeTraceStore::new(capacity);
        store.set_enabled(true);
        store
    }

    fn ids(store: &MasqueradeTraceStore) -> Vec<String> {
        store.list().into_iter().map(|s| s.id).collect()
    }

    #[test]
    fn test_disabled_by_default_and_add_is_noop() {
        let store = MasqueradeTraceStore::default();
        assert!(!store.is_enabled());
        assert_eq!(store.capacity(), DEFAULT_MAX_TRACE_RECORDS);
        assert_eq!(store.add(record("r1")), "");
        assert_eq!(store.count(), 0);
        assert!(store.get("r1").is_none());
    }

    #[test]
    fn test_add_assigns_id_and_timestamp() {
        let store = enabled_store(4);
        let id = store.add(MasqueradeTraceRecord::default());
        assert_eq!(id.len(), 36);
        let stored = store.get(&id).unwrap();
        assert!(stored.timestamp > 0);

        let explicit = MasqueradeTraceRecord { timestamp: 42, ..record("fixed") };
        assert_eq!(store.add(explicit), "fixed");
        assert_eq!(store.get("fixed").unwrap().timestamp, 42);
    }

    #[test]
    fn test_wraparound_keeps_newest() {
        let store = enabled_store(10);
        for i in 1..=12 {
            store.add(record(&format!("r{}", i)));
        }
        assert_eq!(store.count(), 10);
        let expected: Vec<String> = (3..=12).rev().map(|i| format!("r{}", i)).collect();
        assert_eq!(ids(&store), expected);
        assert!(store.get("r1").is_none());
        assert!(store.get("r2").is_none());
        assert!(store.get("r3").is_some());
    }

    #[test]
    fn test_list_full_matches_list_order() {
        let store = enabled_store(3);
        for i in 1..=5 {
            store.add(record(&format!("r{}", i)));
        }
        let full: Vec<String> = store.list_full().into_iter().map(|r| r.id).collect();
        assert_eq!(full, ids(&store));
        assert_eq!(full, vec!["r5", "r4", "r3"]);
    }

    #[test]
    fn test_get_returns_deep_copy() {
        let store = enabled_store(10);
        let mut rec = record("r1");
        rec.original_headers = HashMap::from([("X-Test".to_string(), "original".to_string())]);
        rec.masked_headers = HashMap::from([("X-Test".to_string(), "masked".to_string())]);
        store.add(rec);

        let mut first = store.get("r1").unwrap();
        first.original_headers.insert("X-Test".to_string(), "mutated".to_string());
        first.masked_headers.insert("X-Test".to_string(), "mutated".to_string());

        let second = store.get("r1").unwrap();
        assert_eq!(second.original_headers["X-Test"], "original");
        assert_eq!(second.masked_headers["X-Test"], "masked");

        let mut listed = store.list_full();
        listed[0].masked_headers.clear();
        assert_eq!(store.get("r1").unwrap().masked_headers.len(), 1);
    }

    #[test]
    fn test_clear_resets_ring() {
        let store = enabled_store(3);
        for i in 1..=4 {
            store.add(record(&format!("r{}", i)));
        }
        store.clear();
        assert_eq!(store.count(), 0);
        assert!(store.list().is_empty());
        store.add(record("fresh"));
        assert_eq!(ids(&store), vec!["fresh"]);
    }

    #[test]
    fn test_shrink_then_grow_wrapped() {
        let store = enabled_store(5);
        for i in 1..=7 {
            store.add(record(&format!("r{}", i)));
        }
        store.set_max_size(3);
        assert_eq!(store.capacity(), 3);
        assert_eq!(ids(&store), vec!["r7", "r6", "r5"]);

        store.set_max_size(6);
        assert_eq!(ids(&store), vec!["r7", "r6", "r5"]);
        store.add(record("r8"));
        assert_eq!(ids(&store), vec!["r8", "r7", "r6", "r5"]);
    }

    #[test]
    fn test_shrink_not_wrapped() {
        let store = enabled_store(10);
        for i in 1..=4 {
            store.add(record(&format!("r{}", i)));
        }
        store.set_max_size(2);
        assert_eq!(ids(&store), vec!["r4", "r3"]);
        // ring is full at the new size, next add overwrites the oldest
        store.add(record("r5"));
        assert_eq!(ids(&store), vec!["r5", "r4"]);
    }

    #[test]
    fn test_set_max_size_zero_and_same_size() {
        let store = enabled_store(4);
        store.add(record("r1"));
        store.set_max_size(4);
        assert_eq!(ids(&store), vec!["r1"]);
        store.set_max_size(0);
        assert_eq!(store.capacity(), DEFAULT_MAX_TRACE_RECORDS);
        assert_eq!(ids(&store), vec!["r1"]);
    }

    #[test]
    fn test_apply_config() {
        let store = MasqueradeTraceStore::default();
        store.apply_config(&MasqueradeTraceConfig { enable: true, max_records: 7 });
        assert!(store.is_enabled());
        assert_eq!(store.capacity(), 7);
        store.apply_config(&MasqueradeTraceConfig { enable: false, max_records: 0 });
        assert!(!store.is_enabled());
        assert_eq!(store.capacity(), DEFAULT_MAX_TRACE_RECORDS);
    }

    #[test]
    fn test_summary_headers_modified() {
        let store = enabled_store(2);
        let mut rec = record("r1");
        rec.original_headers = HashMap::from([
            ("a".to_string(), "1".to_string()),
            ("b".to_string(), "2".to_string()),
        ]);
        rec.masked_headers = HashMap::from([
            ("a".to_string(), "1".to_string()),
            ("c".to_string(), "3".to_string()),
        ]);
        rec.original_user_id = "x".to_string();
        rec.masked_user_id = "y".to_string();
        store.add(rec);
        let summary = &store.list()[0];
        assert_eq!(summary.headers_modified, 1);
        assert!(summary.user_id_changed);
    }
}
