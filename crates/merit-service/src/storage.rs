//! RocksDB-backed persistent score storage.
//!
//! Implements [`ScoreStore`], [`EventStore`], and [`LeaderboardStore`] over
//! RocksDB column families for score records, the activity event log,
//! leaderboard snapshots, and metadata. A record commit and its audit event
//! go to disk in one atomic [`WriteBatch`].

use std::path::Path;

use parking_lot::Mutex;
use rocksdb::{ColumnFamilyDescriptor, Direction, IteratorMode, Options, WriteBatch, DB};

use merit_core::error::StoreError;
use merit_core::store::{EventStore, LeaderboardStore, ScoreStore};
use merit_core::types::{
    ActivityEvent, BoardKind, EventDraft, EventId, LeaderboardEntry, SnapshotKey, TimestampMs,
    UserId, UserScoreRecord,
};

// --- Column family names ---

const CF_SCORES: &str = "scores";
const CF_EVENTS: &str = "events";
const CF_BOARDS: &str = "leaderboards";
const CF_META: &str = "meta";

/// All column family names.
const ALL_CFS: &[&str] = &[CF_SCORES, CF_EVENTS, CF_BOARDS, CF_META];

// --- Metadata keys ---

const META_NEXT_EVENT_ID: &[u8] = b"next_event_id";

/// RocksDB-backed implementation of all three storage traits.
///
/// Key layout:
/// - `scores`: big-endian `user_id`, so paged scans come back in ascending
///   id order.
/// - `events`: big-endian `(created_at_ms, id)` composite, so a window read
///   is a single forward range scan in `(time, id)` order.
/// - `leaderboards`: `(kind, period_start, period_end)` composite; the full
///   ranked snapshot is one value, so replacement is a single put.
/// - `meta`: the event-id sequence.
///
/// RocksDB has no compare-and-swap, so `write_lock` serializes the
/// read-check-write inside [`commit_record`](ScoreStore::commit_record) and
/// the id allocation inside event appends. Reads never take it.
pub struct RocksStore {
    db: DB,
    write_lock: Mutex<()>,
}

impl RocksStore {
    /// Open or create a database at the given path, creating missing column
    /// families.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);

        let cf_descriptors: Vec<ColumnFamilyDescriptor> = ALL_CFS
            .iter()
            .map(|name| ColumnFamilyDescriptor::new(*name, Options::default()))
            .collect();

        let db = DB::open_cf_descriptors(&db_opts, path.as_ref(), cf_descriptors)
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        Ok(Self {
            db,
            write_lock: Mutex::new(()),
        })
    }

    // --- Internal helpers ---

    /// Get a column family handle.
    fn cf_handle(&self, name: &str) -> Result<&rocksdb::ColumnFamily, StoreError> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| StoreError::Unavailable(format!("missing column family: {name}")))
    }

    /// Encode a user id as big-endian bytes for ordered iteration.
    fn user_key(user_id: UserId) -> [u8; 8] {
        user_id.to_be_bytes()
    }

    /// Order-preserving timestamp encoding: the sign bit is flipped so
    /// negative millis sort before positive ones.
    fn ts_key(ms: TimestampMs) -> [u8; 8] {
        ((ms as u64) ^ (1 << 63)).to_be_bytes()
    }

    /// Composite event key: timestamp, then id for a stable order within one
    /// millisecond.
    fn event_key(ms: TimestampMs, id: EventId) -> [u8; 16] {
        let mut key = [0u8; 16];
        key[0..8].copy_from_slice(&Self::ts_key(ms));
        key[8..16].copy_from_slice(&id.to_be_bytes());
        key
    }

    /// Composite snapshot key: board kind tag, then period bounds.
    fn board_key(key: &SnapshotKey) -> [u8; 17] {
        let tag: u8 = match key.kind {
            BoardKind::Daily => 0,
            BoardKind::Weekly => 1,
            BoardKind::Monthly => 2,
            BoardKind::AllTime => 3,
        };
        let mut out = [0u8; 17];
        out[0] = tag;
        out[1..9].copy_from_slice(&Self::ts_key(key.period_start_ms));
        out[9..17].copy_from_slice(&Self::ts_key(key.period_end_ms));
        out
    }

    /// The next unassigned event id; ids start at 1.
    fn next_event_id(&self) -> Result<EventId, StoreError> {
        let cf = self.cf_handle(CF_META)?;
        match self
            .db
            .get_cf(&cf, META_NEXT_EVENT_ID)
            .map_err(|e| StoreError::Unavailable(e.to_string()))?
        {
            Some(bytes) if bytes.len() == 8 => Ok(u64::from_le_bytes(bytes.try_into().unwrap())),
            Some(_) => Err(StoreError::Corrupt("invalid event id sequence length".into())),
            None => Ok(1),
        }
    }

    /// Allocate the next event id and stage the event plus the bumped
    /// sequence into `batch`. Callers hold `write_lock`.
    fn stage_event(
        &self,
        batch: &mut WriteBatch,
        draft: &EventDraft,
    ) -> Result<ActivityEvent, StoreError> {
        let id = self.next_event_id()?;
        let event = draft.clone().into_event(id);

        let cf_events = self.cf_handle(CF_EVENTS)?;
        let cf_meta = self.cf_handle(CF_META)?;
        let event_bytes = bincode::encode_to_vec(&event, bincode::config::standard())
            .map_err(|e| StoreError::Corrupt(e.to_string()))?;
        batch.put_cf(
            cf_events,
            Self::event_key(event.created_at_ms, id),
            &event_bytes,
        );
        batch.put_cf(cf_meta, META_NEXT_EVENT_ID, (id + 1).to_le_bytes());
        Ok(event)
    }
}

impl ScoreStore for RocksStore {
    fn user_record(&self, user_id: UserId) -> Result<Option<UserScoreRecord>, StoreError> {
        let cf = self.cf_handle(CF_SCORES)?;
        match self
            .db
            .get_cf(&cf, Self::user_key(user_id))
            .map_err(|e| StoreError::Unavailable(e.to_string()))?
        {
            Some(data) => {
                let (record, _): (UserScoreRecord, _) =
                    bincode::decode_from_slice(&data, bincode::config::standard())
                        .map_err(|e| StoreError::Corrupt(e.to_string()))?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    fn commit_record(
        &self,
        record: &UserScoreRecord,
        expected_version: Option<u64>,
        audit: Option<&EventDraft>,
    ) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock();

        let stored_version = self.user_record(record.user_id)?.map(|r| r.version);
        match (expected_version, stored_version) {
            (None, None) => {}
            (None, Some(_)) => return Err(StoreError::RecordExists(record.user_id)),
            (Some(expected), Some(stored)) if stored == expected => {}
            (Some(_), _) => return Err(StoreError::Conflict(record.user_id)),
        }

        let cf_scores = self.cf_handle(CF_SCORES)?;
        let record_bytes = bincode::encode_to_vec(record, bincode::config::standard())
            .map_err(|e| StoreError::Corrupt(e.to_string()))?;

        let mut batch = WriteBatch::default();
        batch.put_cf(cf_scores, Self::user_key(record.user_id), &record_bytes);
        if let Some(draft) = audit {
            self.stage_event(&mut batch, draft)?;
        }
        self.db
            .write(batch)
            .map_err(|e| StoreError::Unavailable(e.to_string()))
    }

    fn scan_records(
        &self,
        start_after: Option<UserId>,
        limit: usize,
    ) -> Result<Vec<UserScoreRecord>, StoreError> {
        let cf = self.cf_handle(CF_SCORES)?;
        let first_key;
        let mode = match start_after {
            None => IteratorMode::Start,
            Some(id) => match id.checked_add(1) {
                Some(first) => {
                    first_key = Self::user_key(first);
                    IteratorMode::From(&first_key, Direction::Forward)
                }
                None => return Ok(Vec::new()),
            },
        };

        let mut records = Vec::new();
        for item in self.db.iterator_cf(&cf, mode) {
            if records.len() >= limit {
                break;
            }
            let (_, value) = item.map_err(|e| StoreError::Unavailable(e.to_string()))?;
            let (record, _): (UserScoreRecord, _) =
                bincode::decode_from_slice(&value, bincode::config::standard())
                    .map_err(|e| StoreError::Corrupt(e.to_string()))?;
            records.push(record);
        }
        Ok(records)
    }
}

impl EventStore for RocksStore {
    fn append_event(&self, draft: EventDraft) -> Result<ActivityEvent, StoreError> {
        let _guard = self.write_lock.lock();

        let mut batch = WriteBatch::default();
        let event = self.stage_event(&mut batch, &draft)?;
        self.db
            .write(batch)
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        Ok(event)
    }

    fn events_in_window(
        &self,
        start_ms: TimestampMs,
        end_ms: TimestampMs,
    ) -> Result<Vec<ActivityEvent>, StoreError> {
        if start_ms >= end_ms {
            return Ok(Vec::new());
        }

        let cf = self.cf_handle(CF_EVENTS)?;
        let start_key = Self::event_key(start_ms, 0);
        let iter = self
            .db
            .iterator_cf(&cf, IteratorMode::From(&start_key, Direction::Forward));

        let mut events = Vec::new();
        for item in iter {
            let (_, value) = item.map_err(|e| StoreError::Unavailable(e.to_string()))?;
            let (event, _): (ActivityEvent, _) =
                bincode::decode_from_slice(&value, bincode::config::standard())
                    .map_err(|e| StoreError::Corrupt(e.to_string()))?;
            // Keys sort by (time, id), so the first event at or past the end
            // bound terminates the scan.
            if event.created_at_ms >= end_ms {
                break;
            }
            events.push(event);
        }
        Ok(events)
    }
}

impl LeaderboardStore for RocksStore {
    fn replace_snapshot(
        &self,
        key: &SnapshotKey,
        entries: Vec<LeaderboardEntry>,
    ) -> Result<(), StoreError> {
        let cf = self.cf_handle(CF_BOARDS)?;
        let bytes = bincode::encode_to_vec(&entries, bincode::config::standard())
            .map_err(|e| StoreError::Corrupt(e.to_string()))?;
        self.db
            .put_cf(&cf, Self::board_key(key), &bytes)
            .map_err(|e| StoreError::Unavailable(e.to_string()))
    }

    fn top_entries(
        &self,
        key: &SnapshotKey,
        limit: usize,
    ) -> Result<Vec<LeaderboardEntry>, StoreError> {
        let cf = self.cf_handle(CF_BOARDS)?;
        match self
            .db
            .get_cf(&cf, Self::board_key(key))
            .map_err(|e| StoreError::Unavailable(e.to_string()))?
        {
            Some(data) => {
                let (mut entries, _): (Vec<LeaderboardEntry>, _) =
                    bincode::decode_from_slice(&data, bincode::config::standard())
                        .map_err(|e| StoreError::Corrupt(e.to_string()))?;
                entries.truncate(limit);
                Ok(entries)
            }
            None => Ok(Vec::new()),
        }
    }
}
