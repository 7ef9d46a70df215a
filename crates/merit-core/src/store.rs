//! Storage interfaces and the in-memory implementation.
//!
//! Provides the [`ScoreStore`], [`EventStore`], [`LeaderboardStore`], and
//! [`ProfileDirectory`] traits. The [`MemoryScoreStore`] backs tests and
//! small deployments; the production service uses RocksDB (merit-service).
//!
//! Stores are deliberately dumb: they check versions and keep bytes, nothing
//! else. All scoring rules, validation, and per-user write serialization
//! live in the engine layer, which is the only writer.

use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;

use crate::error::StoreError;
use crate::types::{
    ActivityEvent, EventDraft, LeaderboardEntry, SnapshotKey, TimestampMs, UserId,
    UserScoreRecord,
};

/// Persistent user score records.
///
/// Implementations are internally synchronized (`&self` methods); writers
/// additionally serialize per-user through the engine's lock registry, and
/// [`commit_record`](ScoreStore::commit_record) rechecks the version so a
/// racing writer loses cleanly instead of silently clobbering.
pub trait ScoreStore: Send + Sync {
    /// Fetch a user's record. Returns `None` for users never seen.
    fn user_record(&self, user_id: UserId) -> Result<Option<UserScoreRecord>, StoreError>;

    /// Write a record, optionally appending an audit event in the same
    /// atomic commit.
    ///
    /// The caller bumps `record.version` before committing and passes the
    /// version it read as `expected_version`:
    ///
    /// * `expected_version: None` inserts a fresh record (`version` 1).
    /// * `expected_version: Some(v)` replaces the stored record only if its
    ///   version is still exactly `v`.
    ///
    /// # Errors
    ///
    /// - [`StoreError::RecordExists`] on insert when the user already has a record
    /// - [`StoreError::Conflict`] on replace when the stored version moved (or the record vanished)
    fn commit_record(
        &self,
        record: &UserScoreRecord,
        expected_version: Option<u64>,
        audit: Option<&EventDraft>,
    ) -> Result<(), StoreError>;

    /// Page through all records in ascending `user_id` order.
    ///
    /// Returns up to `limit` records with ids strictly greater than
    /// `start_after` (`None` starts from the beginning). Soft-deleted
    /// records are included; filtering is the reader's business.
    fn scan_records(
        &self,
        start_after: Option<UserId>,
        limit: usize,
    ) -> Result<Vec<UserScoreRecord>, StoreError>;
}

/// Append-only activity event log.
pub trait EventStore: Send + Sync {
    /// Append an event, assigning it the next id. Returns the stored event.
    fn append_event(&self, draft: EventDraft) -> Result<ActivityEvent, StoreError>;

    /// All events with `start_ms <= created_at_ms < end_ms`, ordered by
    /// `created_at_ms` then id. An empty or inverted window yields an empty
    /// vec; window validation is the caller's business.
    fn events_in_window(
        &self,
        start_ms: TimestampMs,
        end_ms: TimestampMs,
    ) -> Result<Vec<ActivityEvent>, StoreError>;
}

/// Materialized leaderboard snapshots.
pub trait LeaderboardStore: Send + Sync {
    /// Atomically replace the snapshot under `key` with `entries` (already
    /// ranked). Rebuilding the same period is idempotent by construction.
    fn replace_snapshot(
        &self,
        key: &SnapshotKey,
        entries: Vec<LeaderboardEntry>,
    ) -> Result<(), StoreError>;

    /// The top `limit` entries of the snapshot under `key`, best first.
    /// A snapshot that was never built reads as empty, not as an error.
    fn top_entries(
        &self,
        key: &SnapshotKey,
        limit: usize,
    ) -> Result<Vec<LeaderboardEntry>, StoreError>;
}

/// Read-only username lookup, owned by the (out-of-scope) user system.
pub trait ProfileDirectory: Send + Sync {
    /// The display name for a user, if the directory knows one.
    fn username(&self, user_id: UserId) -> Result<Option<String>, StoreError>;
}

/// In-memory store for tests and small deployments.
///
/// Implements all three storage traits over maps guarded by `RwLock`s, with
/// no persistence. Lock order is records, then events; no method takes them
/// in the other order.
pub struct MemoryScoreStore {
    /// User records, keyed and iterated by `user_id`.
    records: RwLock<BTreeMap<UserId, UserScoreRecord>>,
    /// Append-only event log in insertion order.
    events: RwLock<Vec<ActivityEvent>>,
    /// Snapshot per `(kind, period)` key.
    boards: RwLock<HashMap<SnapshotKey, Vec<LeaderboardEntry>>>,
    /// Next event id to assign; ids start at 1.
    next_event_id: AtomicU64,
}

impl MemoryScoreStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self {
            records: RwLock::new(BTreeMap::new()),
            events: RwLock::new(Vec::new()),
            boards: RwLock::new(HashMap::new()),
            next_event_id: AtomicU64::new(1),
        }
    }

    /// Number of user records stored.
    pub fn record_count(&self) -> usize {
        self.records.read().len()
    }

    /// Number of events logged.
    pub fn event_count(&self) -> usize {
        self.events.read().len()
    }

    /// Snapshot of the full event log in insertion order.
    pub fn all_events(&self) -> Vec<ActivityEvent> {
        self.events.read().clone()
    }

    fn push_event(&self, draft: EventDraft) -> ActivityEvent {
        let id = self.next_event_id.fetch_add(1, Ordering::Relaxed);
        let event = draft.into_event(id);
        self.events.write().push(event.clone());
        event
    }
}

impl Default for MemoryScoreStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ScoreStore for MemoryScoreStore {
    fn user_record(&self, user_id: UserId) -> Result<Option<UserScoreRecord>, StoreError> {
        Ok(self.records.read().get(&user_id).cloned())
    }

    fn commit_record(
        &self,
        record: &UserScoreRecord,
        expected_version: Option<u64>,
        audit: Option<&EventDraft>,
    ) -> Result<(), StoreError> {
        let mut records = self.records.write();
        match (records.get(&record.user_id), expected_version) {
            (Some(_), None) => return Err(StoreError::RecordExists(record.user_id)),
            (Some(stored), Some(expected)) if stored.version != expected => {
                return Err(StoreError::Conflict(record.user_id));
            }
            (None, Some(_)) => return Err(StoreError::Conflict(record.user_id)),
            _ => {}
        }
        records.insert(record.user_id, record.clone());
        // Event appended while the records lock is held so record and audit
        // land together or not at all.
        if let Some(draft) = audit {
            self.push_event(draft.clone());
        }
        Ok(())
    }

    fn scan_records(
        &self,
        start_after: Option<UserId>,
        limit: usize,
    ) -> Result<Vec<UserScoreRecord>, StoreError> {
        let lower = match start_after {
            Some(id) => Bound::Excluded(id),
            None => Bound::Unbounded,
        };
        let records = self.records.read();
        Ok(records
            .range((lower, Bound::Unbounded))
            .take(limit)
            .map(|(_, rec)| rec.clone())
            .collect())
    }
}

impl EventStore for MemoryScoreStore {
    fn append_event(&self, draft: EventDraft) -> Result<ActivityEvent, StoreError> {
        Ok(self.push_event(draft))
    }

    fn events_in_window(
        &self,
        start_ms: TimestampMs,
        end_ms: TimestampMs,
    ) -> Result<Vec<ActivityEvent>, StoreError> {
        let events = self.events.read();
        let mut hits: Vec<ActivityEvent> = events
            .iter()
            .filter(|e| e.created_at_ms >= start_ms && e.created_at_ms < end_ms)
            .cloned()
            .collect();
        // Insertion order is not time order: submitters supply timestamps.
        hits.sort_by_key(|e| (e.created_at_ms, e.id));
        Ok(hits)
    }
}

impl LeaderboardStore for MemoryScoreStore {
    fn replace_snapshot(
        &self,
        key: &SnapshotKey,
        entries: Vec<LeaderboardEntry>,
    ) -> Result<(), StoreError> {
        self.boards.write().insert(*key, entries);
        Ok(())
    }

    fn top_entries(
        &self,
        key: &SnapshotKey,
        limit: usize,
    ) -> Result<Vec<LeaderboardEntry>, StoreError> {
        let boards = self.boards.read();
        Ok(boards
            .get(key)
            .map(|entries| entries.iter().take(limit).cloned().collect())
            .unwrap_or_default())
    }
}

/// In-memory username directory for tests.
pub struct MemoryProfiles {
    names: RwLock<HashMap<UserId, String>>,
}

impl MemoryProfiles {
    pub fn new() -> Self {
        Self {
            names: RwLock::new(HashMap::new()),
        }
    }

    /// Register or replace a username.
    pub fn insert(&self, user_id: UserId, username: impl Into<String>) {
        self.names.write().insert(user_id, username.into());
    }
}

impl Default for MemoryProfiles {
    fn default() -> Self {
        Self::new()
    }
}

impl ProfileDirectory for MemoryProfiles {
    fn username(&self, user_id: UserId) -> Result<Option<String>, StoreError> {
        Ok(self.names.read().get(&user_id).cloned())
    }
}

/// Directory that knows nobody. Wired in when no user system is attached;
/// leaderboard rows then carry the placeholder name.
pub struct NullProfiles;

impl ProfileDirectory for NullProfiles {
    fn username(&self, _user_id: UserId) -> Result<Option<String>, StoreError> {
        Ok(None)
    }
}
