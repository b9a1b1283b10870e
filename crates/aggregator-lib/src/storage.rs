//! In-memory windowed sample store
//!
//! Retains the two most recent samples per entity so short-term usage rates
//! can be derived without a timeseries database. Entries are replaced
//! wholesale on update so concurrent readers never observe a half-written
//! window, and a per-tick sweep evicts entities whose data has gone stale.
//!
//! Each entity's window moves through a small lifecycle:
//! absent -> warm (one sample) -> ready (two samples, rate computable)
//! -> evicted.

use crate::models::{EntityKey, Sample, UsageRate};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use dashmap::DashMap;
use std::time::Duration;
use tracing::debug;

/// How many refresh intervals an entity may go unrefreshed before its
/// window is evicted.
pub const RETENTION_TICKS: u32 = 3;

/// Per-entity window state: the two most recent samples plus the wall-clock
/// time of the last successful update, which drives eviction.
#[derive(Debug, Clone)]
struct WindowEntry {
    latest: Sample,
    previous: Option<Sample>,
    updated_at: DateTime<Utc>,
}

/// Keyed store of per-entity sample windows. One writer (the refresh tick)
/// at a time; any number of concurrent readers.
pub struct WindowStore {
    entries: DashMap<EntityKey, WindowEntry>,
    retention: ChronoDuration,
}

impl WindowStore {
    /// `retention` bounds how long an entity may go without a successful
    /// sample before `sweep` removes it.
    pub fn new(retention: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            retention: ChronoDuration::from_std(retention).unwrap_or(ChronoDuration::MAX),
        }
    }

    /// Commit one scrape cycle's samples. For a known entity the current
    /// `latest` shifts to `previous`; for a new entity the window starts
    /// warm with a single sample. Entries are inserted whole, never mutated
    /// in place, so readers always see a consistent window.
    pub fn update(&self, samples: Vec<Sample>, now: DateTime<Utc>) {
        for sample in samples {
            let previous = self
                .entries
                .get(&sample.entity)
                .map(|entry| entry.latest.clone());

            let key = sample.entity.clone();
            self.entries.insert(
                key,
                WindowEntry {
                    latest: sample,
                    previous,
                    updated_at: now,
                },
            );
        }
    }

    /// Most recent sample for an entity.
    pub fn latest(&self, key: &EntityKey) -> Option<Sample> {
        self.entries.get(key).map(|entry| entry.latest.clone())
    }

    /// CPU usage rate over the entity's current window. None until two
    /// samples exist, and None when the window is non-positive or the CPU
    /// counter moved backwards: a usable rate or nothing, never a
    /// fabricated or negative value.
    pub fn rate(&self, key: &EntityKey) -> Option<UsageRate> {
        let entry = self.entries.get(key)?;
        let previous = entry.previous.as_ref()?;

        let window = entry
            .latest
            .timestamp
            .signed_duration_since(previous.timestamp)
            .to_std()
            .ok()?;
        let window_seconds = window.as_secs_f64();
        if window_seconds <= 0.0 {
            return None;
        }

        let cpu_delta = entry
            .latest
            .cpu_usage_ns
            .checked_sub(previous.cpu_usage_ns)?;

        Some(UsageRate {
            cpu_nanocores: cpu_delta as f64 / window_seconds,
            memory_working_set_bytes: entry.latest.memory_working_set_bytes,
            window_seconds,
            timestamp: entry.latest.timestamp,
        })
    }

    /// Evict entities whose last successful update is older than the
    /// retention bound. Called once per refresh tick.
    pub fn sweep(&self, now: DateTime<Utc>) {
        let retention = self.retention;
        let before = self.entries.len();
        self.entries
            .retain(|_, entry| now.signed_duration_since(entry.updated_at) <= retention);

        let evicted = before - self.entries.len();
        if evicted > 0 {
            debug!(
                evicted = evicted,
                remaining = self.entries.len(),
                "Swept stale entities from the window store"
            );
        }
    }

    /// All entities currently tracked, in no particular order.
    pub fn entities(&self) -> Vec<EntityKey> {
        self.entries
            .iter()
            .map(|entry| entry.key().clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn base_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap()
    }

    fn sample(name: &str, offset_secs: i64, cpu_ns: u64, mem_bytes: u64) -> Sample {
        Sample {
            entity: EntityKey::node(name),
            timestamp: base_time() + ChronoDuration::seconds(offset_secs),
            cpu_usage_ns: cpu_ns,
            memory_working_set_bytes: mem_bytes,
        }
    }

    fn new_store() -> WindowStore {
        WindowStore::new(Duration::from_secs(30))
    }

    #[test]
    fn test_rate_from_two_sequential_samples() {
        let store = new_store();
        store.update(vec![sample("a", 0, 100, 512)], base_time());
        store.update(
            vec![sample("a", 10, 150, 1024)],
            base_time() + ChronoDuration::seconds(10),
        );

        let rate = store.rate(&EntityKey::node("a")).unwrap();
        assert_eq!(rate.cpu_nanocores, 5.0); // (150 - 100) / 10s
        assert_eq!(rate.memory_working_set_bytes, 1024);
        assert_eq!(rate.window_seconds, 10.0);
    }

    #[test]
    fn test_cold_start_has_no_rate() {
        let store = new_store();
        store.update(vec![sample("a", 0, 100, 512)], base_time());

        assert!(store.latest(&EntityKey::node("a")).is_some());
        assert!(store.rate(&EntityKey::node("a")).is_none());
    }

    #[test]
    fn test_unknown_entity_is_not_found() {
        let store = new_store();
        assert!(store.latest(&EntityKey::node("ghost")).is_none());
        assert!(store.rate(&EntityKey::node("ghost")).is_none());
    }

    #[test]
    fn test_update_shifts_the_window() {
        let store = new_store();
        store.update(vec![sample("a", 0, 100, 512)], base_time());
        store.update(
            vec![sample("a", 10, 150, 512)],
            base_time() + ChronoDuration::seconds(10),
        );
        store.update(
            vec![sample("a", 20, 250, 512)],
            base_time() + ChronoDuration::seconds(20),
        );

        // Rate must come from the two newest samples only.
        let rate = store.rate(&EntityKey::node("a")).unwrap();
        assert_eq!(rate.cpu_nanocores, 10.0); // (250 - 150) / 10s

        let latest = store.latest(&EntityKey::node("a")).unwrap();
        assert_eq!(latest.cpu_usage_ns, 250);
    }

    #[test]
    fn test_non_positive_window_has_no_rate() {
        let store = new_store();
        store.update(vec![sample("a", 10, 100, 512)], base_time());
        // Second sample carries an identical timestamp.
        store.update(
            vec![sample("a", 10, 200, 512)],
            base_time() + ChronoDuration::seconds(10),
        );
        assert!(store.rate(&EntityKey::node("a")).is_none());

        // And one that goes backwards.
        let store2 = new_store();
        store2.update(vec![sample("b", 10, 100, 512)], base_time());
        store2.update(
            vec![sample("b", 5, 200, 512)],
            base_time() + ChronoDuration::seconds(10),
        );
        assert!(store2.rate(&EntityKey::node("b")).is_none());
    }

    #[test]
    fn test_cpu_counter_reset_has_no_rate() {
        let store = new_store();
        store.update(vec![sample("a", 0, 5_000_000, 512)], base_time());
        // Agent restarted; the counter starts over from a lower value.
        store.update(
            vec![sample("a", 10, 1_000, 512)],
            base_time() + ChronoDuration::seconds(10),
        );

        assert!(store.rate(&EntityKey::node("a")).is_none());
        // The window itself is intact and the next sample restores the rate.
        store.update(
            vec![sample("a", 20, 11_000, 512)],
            base_time() + ChronoDuration::seconds(20),
        );
        assert_eq!(store.rate(&EntityKey::node("a")).unwrap().cpu_nanocores, 1000.0);
    }

    #[test]
    fn test_sweep_evicts_entities_past_retention() {
        let store = new_store(); // 30s retention
        store.update(vec![sample("a", 0, 100, 512)], base_time());

        store.sweep(base_time() + ChronoDuration::seconds(31));

        assert!(store.latest(&EntityKey::node("a")).is_none());
        assert!(store.rate(&EntityKey::node("a")).is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn test_sweep_keeps_entities_within_retention() {
        let store = new_store();
        store.update(vec![sample("a", 0, 100, 512)], base_time());

        store.sweep(base_time() + ChronoDuration::seconds(30));

        assert!(store.latest(&EntityKey::node("a")).is_some());
    }

    #[test]
    fn test_failed_scrape_leaves_stale_data_in_place() {
        let store = new_store();
        let t0 = base_time();
        store.update(
            vec![sample("a", 0, 100, 512), sample("b", 0, 100, 512)],
            t0,
        );

        // Next tick: node b failed to scrape, so only a's sample arrives.
        let t1 = t0 + ChronoDuration::seconds(10);
        store.update(vec![sample("a", 10, 150, 512)], t1);
        store.sweep(t1);

        // b's stale sample survives until retention expires.
        let stale = store.latest(&EntityKey::node("b")).unwrap();
        assert_eq!(stale.cpu_usage_ns, 100);
    }

    #[test]
    fn test_entity_lifecycle_warm_ready_evicted() {
        let store = new_store();
        let key = EntityKey::node("a");

        // absent
        assert!(store.latest(&key).is_none());

        // warm: latest only
        store.update(vec![sample("a", 0, 100, 512)], base_time());
        assert!(store.latest(&key).is_some());
        assert!(store.rate(&key).is_none());

        // ready: rate computable
        store.update(
            vec![sample("a", 10, 200, 512)],
            base_time() + ChronoDuration::seconds(10),
        );
        assert!(store.rate(&key).is_some());

        // evicted
        store.sweep(base_time() + ChronoDuration::seconds(60));
        assert!(store.latest(&key).is_none());
    }

    #[test]
    fn test_entities_listing_and_len() {
        let store = new_store();
        store.update(
            vec![
                sample("a", 0, 1, 1),
                sample("b", 0, 1, 1),
                Sample {
                    entity: EntityKey::container("default", "web-abc", "app"),
                    timestamp: base_time(),
                    cpu_usage_ns: 1,
                    memory_working_set_bytes: 1,
                },
            ],
            base_time(),
        );

        assert_eq!(store.len(), 3);
        let entities = store.entities();
        assert!(entities.contains(&EntityKey::node("a")));
        assert!(entities.contains(&EntityKey::container("default", "web-abc", "app")));
    }
}
