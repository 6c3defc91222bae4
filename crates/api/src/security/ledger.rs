//! Sliding-window bookkeeping of payment attempts.
//!
//! One ledger per key kind (user, IP, device). Entries live in a `moka`
//! cache with idle expiry so quiet keys disappear on their own; events older
//! than the retention window are pruned whenever a key is touched.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use moka::sync::Cache;

/// One recorded attempt.
#[derive(Debug, Clone)]
struct Event {
    at: DateTime<Utc>,
    /// Who made the attempt, for "distinct users per device" checks.
    subject: Option<String>,
}

type Events = Arc<Mutex<Vec<Event>>>;

/// Attempts per key inside a retention window.
#[derive(Clone)]
pub struct EventLedger {
    entries: Cache<String, Events>,
    retention: Duration,
}

impl EventLedger {
    /// Create a ledger keeping events for `retention`.
    #[must_use]
    pub fn new(retention: Duration, max_keys: u64) -> Self {
        let idle = retention.to_std().unwrap_or(StdDuration::from_secs(86_400));
        Self {
            entries: Cache::builder()
                .max_capacity(max_keys)
                .time_to_idle(idle)
                .build(),
            retention,
        }
    }

    /// Record an attempt for `key` at `at`.
    pub fn record(&self, key: &str, at: DateTime<Utc>, subject: Option<&str>) {
        let events = self.entries.get_with(key.to_owned(), Events::default);
        let mut events = events.lock().unwrap_or_else(PoisonError::into_inner);
        self.prune(&mut events, at);
        events.push(Event {
            at,
            subject: subject.map(str::to_owned),
        });
    }

    /// Attempts for `key` at or after `since`.
    #[must_use]
    pub fn count_since(&self, key: &str, since: DateTime<Utc>) -> usize {
        self.with_events(key, since, |events| {
            events.iter().filter(|e| e.at >= since).count()
        })
    }

    /// Distinct subjects seen for `key` at or after `since`.
    #[must_use]
    pub fn distinct_subjects_since(&self, key: &str, since: DateTime<Utc>) -> usize {
        self.with_events(key, since, |events| {
            let mut subjects: Vec<&str> = events
                .iter()
                .filter(|e| e.at >= since)
                .filter_map(|e| e.subject.as_deref())
                .collect();
            subjects.sort_unstable();
            subjects.dedup();
            subjects.len()
        })
    }

    /// Number of keys currently tracked.
    #[must_use]
    pub fn tracked_keys(&self) -> u64 {
        self.entries.run_pending_tasks();
        self.entries.entry_count()
    }

    fn with_events<R: Default>(
        &self,
        key: &str,
        now: DateTime<Utc>,
        f: impl FnOnce(&[Event]) -> R,
    ) -> R {
        let Some(events) = self.entries.get(key) else {
            return R::default();
        };
        let mut events = events.lock().unwrap_or_else(PoisonError::into_inner);
        self.prune(&mut events, now);
        f(&events)
    }

    fn prune(&self, events: &mut Vec<Event>, now: DateTime<Utc>) {
        let cutoff = now - self.retention;
        events.retain(|e| e.at >= cutoff);
    }
}

/// Ledgers for every key kind the risk engine looks at.
#[derive(Clone)]
pub struct AttemptLedger {
    pub users: EventLedger,
    pub ips: EventLedger,
    pub devices: EventLedger,
}

impl AttemptLedger {
    /// Retention long enough for the widest heuristic window (24 h).
    #[must_use]
    pub fn new() -> Self {
        let day = Duration::hours(24);
        Self {
            users: EventLedger::new(day, 100_000),
            ips: EventLedger::new(day, 100_000),
            devices: EventLedger::new(day, 100_000),
        }
    }
}

impl Default for AttemptLedger {
    fn default() -> Self {
        Self::new()
    }
}
