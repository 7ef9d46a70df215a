//! The service facade.
//!
//! [`MeritService`] is the composition root: it owns a store, the engine
//! components, and a [`ConfigHandle`], and exposes the operator surface
//! with configured tunables filled in. Callers supply `now_ms` explicitly;
//! only the binary and the scheduler read the wall clock, so every
//! operation here is deterministic and replayable.

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Datelike, Days, Months, NaiveDate, NaiveTime, Utc};
use tracing::{debug, info, warn};

use merit_core::constants::{ALL_TIME_END_MS, ALL_TIME_START_MS};
use merit_core::error::MeritError;
use merit_core::store::{EventStore, LeaderboardStore, ProfileDirectory, ScoreStore};
use merit_core::types::{
    ActivitySubmission, BoardKind, LeaderboardEntry, SnapshotKey, SuspensionOutcome,
    SuspiciousUser, TimestampMs, UpdatedScore, UserId, UserScoreRecord,
};
use merit_engine::{AdminOverride, AnomalyDetector, LeaderboardAggregator, ScoreUpdateEngine};

use crate::config::ConfigHandle;
use crate::storage::RocksStore;

/// Outcome of one decay sweep.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecaySweep {
    /// Records examined.
    pub scanned: usize,
    /// Users whose score actually moved.
    pub decayed: usize,
    /// Users whose decay failed; the sweep continues past them.
    pub failed: usize,
}

/// Outcome of one leaderboard snapshot pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotPass {
    /// Boards rebuilt, with the entry count written for each.
    pub built: Vec<(SnapshotKey, usize)>,
    /// Boards that failed; the pass continues past them.
    pub failed: usize,
}

/// Composition root over a store, the engine components, and configuration.
pub struct MeritService {
    scores: Arc<dyn ScoreStore>,
    engine: Arc<ScoreUpdateEngine>,
    admin: AdminOverride,
    detector: AnomalyDetector,
    aggregator: LeaderboardAggregator,
    config: Arc<ConfigHandle>,
}

impl MeritService {
    /// Open a RocksDB-backed service at `path`.
    pub fn open(
        path: impl AsRef<Path>,
        profiles: Arc<dyn ProfileDirectory>,
        config: Arc<ConfigHandle>,
    ) -> Result<Self, MeritError> {
        let store = Arc::new(RocksStore::open(path)?);
        Ok(Self::with_store(store, profiles, config))
    }

    /// Assemble the service over any store implementation.
    pub fn with_store<S>(
        store: Arc<S>,
        profiles: Arc<dyn ProfileDirectory>,
        config: Arc<ConfigHandle>,
    ) -> Self
    where
        S: ScoreStore + EventStore + LeaderboardStore + 'static,
    {
        let scores: Arc<dyn ScoreStore> = Arc::clone(&store);
        let events: Arc<dyn EventStore> = Arc::clone(&store);
        let boards: Arc<dyn LeaderboardStore> = store;

        let engine = Arc::new(ScoreUpdateEngine::new(Arc::clone(&scores)));
        let admin = AdminOverride::new(Arc::clone(&engine));
        let detector = AnomalyDetector::new(events);
        let aggregator = LeaderboardAggregator::new(Arc::clone(&scores), boards, profiles);

        Self {
            scores,
            engine,
            admin,
            detector,
            aggregator,
            config,
        }
    }

    /// The configuration handle, shared with the scheduler.
    pub fn config(&self) -> &ConfigHandle {
        &self.config
    }

    /// Direct engine access for embedders that manage their own tunables.
    pub fn engine(&self) -> &ScoreUpdateEngine {
        &self.engine
    }

    // ------------------------------------------------------------------
    // Scoring
    // ------------------------------------------------------------------

    /// Apply a user activity through the EWMA update, using the configured
    /// weight for its kind.
    pub fn record_activity(&self, sub: &ActivitySubmission) -> Result<UpdatedScore, MeritError> {
        let settings = self.config.snapshot();
        let weight = settings.weights.weight_for(sub.activity_type);
        let update = self
            .engine
            .apply_activity(sub, weight, settings.alpha, &settings.tiers)?;
        Ok(update)
    }

    /// Apply one round of inactivity decay to a single user.
    pub fn decay_user(
        &self,
        user_id: UserId,
        now_ms: TimestampMs,
    ) -> Result<UpdatedScore, MeritError> {
        let settings = self.config.snapshot();
        let update = self
            .engine
            .decay(user_id, settings.decay_factor, &settings.tiers, now_ms)?;
        Ok(update)
    }

    /// Register a report, suspending at the configured threshold.
    pub fn report_user(
        &self,
        user_id: UserId,
        now_ms: TimestampMs,
    ) -> Result<SuspensionOutcome, MeritError> {
        let settings = self.config.snapshot();
        let outcome = self.engine.register_report(
            user_id,
            settings.suspension_threshold,
            settings.report_penalty,
            &settings.tiers,
            now_ms,
        )?;
        Ok(outcome)
    }

    /// A user's current record, if any.
    pub fn user_score(&self, user_id: UserId) -> Result<Option<UserScoreRecord>, MeritError> {
        Ok(self.engine.user_record(user_id)?)
    }

    // ------------------------------------------------------------------
    // Anomaly detection
    // ------------------------------------------------------------------

    /// Scan an explicit window against the configured threshold.
    pub fn scan_window(
        &self,
        start_ms: TimestampMs,
        end_ms: TimestampMs,
    ) -> Result<Vec<SuspiciousUser>, MeritError> {
        let settings = self.config.snapshot();
        Ok(self
            .detector
            .scan_window(start_ms, end_ms, settings.anomaly_threshold)?)
    }

    /// Scan the configured trailing window ending at `now_ms`.
    pub fn scan_recent(&self, now_ms: TimestampMs) -> Result<Vec<SuspiciousUser>, MeritError> {
        let settings = self.config.snapshot();
        let (start_ms, end_ms) = settings.anomaly_window(now_ms);
        Ok(self
            .detector
            .scan_window(start_ms, end_ms, settings.anomaly_threshold)?)
    }

    // ------------------------------------------------------------------
    // Admin surface
    // ------------------------------------------------------------------

    /// Apply a raw signed score delta, bypassing the EWMA blend.
    pub fn adjust_score(
        &self,
        user_id: UserId,
        delta: i64,
        reason: &str,
        now_ms: TimestampMs,
    ) -> Result<UpdatedScore, MeritError> {
        let settings = self.config.snapshot();
        Ok(self
            .admin
            .adjust_score(user_id, delta, reason, &settings.tiers, now_ms)?)
    }

    /// Suspend the account, independent of the report counter.
    pub fn suspend(
        &self,
        user_id: UserId,
        reason: &str,
        now_ms: TimestampMs,
    ) -> Result<SuspensionOutcome, MeritError> {
        let settings = self.config.snapshot();
        Ok(self.admin.suspend(user_id, reason, &settings.tiers, now_ms)?)
    }

    /// Lift a suspension, however it came about.
    pub fn unsuspend(
        &self,
        user_id: UserId,
        now_ms: TimestampMs,
    ) -> Result<SuspensionOutcome, MeritError> {
        let settings = self.config.snapshot();
        Ok(self.admin.unsuspend(user_id, &settings.tiers, now_ms)?)
    }

    /// Flag the user for review.
    pub fn mark_suspicious(
        &self,
        user_id: UserId,
        reason: &str,
        now_ms: TimestampMs,
    ) -> Result<UserScoreRecord, MeritError> {
        let settings = self.config.snapshot();
        Ok(self
            .admin
            .mark_suspicious(user_id, reason, &settings.tiers, now_ms)?)
    }

    /// Clear the review flag.
    pub fn clear_suspicious(
        &self,
        user_id: UserId,
        now_ms: TimestampMs,
    ) -> Result<UserScoreRecord, MeritError> {
        let settings = self.config.snapshot();
        Ok(self.admin.clear_suspicious(user_id, &settings.tiers, now_ms)?)
    }

    /// Zero the report counter without touching suspension state.
    pub fn reset_reports(
        &self,
        user_id: UserId,
        reason: &str,
        now_ms: TimestampMs,
    ) -> Result<UserScoreRecord, MeritError> {
        let settings = self.config.snapshot();
        Ok(self
            .admin
            .reset_reports(user_id, reason, &settings.tiers, now_ms)?)
    }

    /// Soft-delete the user. Terminal.
    pub fn remove_user(
        &self,
        user_id: UserId,
        reason: &str,
        now_ms: TimestampMs,
    ) -> Result<UserScoreRecord, MeritError> {
        let settings = self.config.snapshot();
        Ok(self
            .admin
            .remove_user(user_id, reason, &settings.tiers, now_ms)?)
    }

    // ------------------------------------------------------------------
    // Leaderboards
    // ------------------------------------------------------------------

    /// Rebuild the current-period snapshot for one board. Returns the key
    /// it was built under and the number of entries written.
    pub fn build_snapshot(
        &self,
        kind: BoardKind,
        now_ms: TimestampMs,
    ) -> Result<(SnapshotKey, usize), MeritError> {
        let settings = self.config.snapshot();
        let key = period_key(kind, now_ms);
        let entries = self.aggregator.build_snapshot(&key, settings.batch_size)?;
        Ok((key, entries))
    }

    /// The top `n` of the current-period snapshot for a board.
    pub fn top(
        &self,
        kind: BoardKind,
        n: usize,
        now_ms: TimestampMs,
    ) -> Result<Vec<LeaderboardEntry>, MeritError> {
        Ok(self.aggregator.top(&period_key(kind, now_ms), n)?)
    }

    // ------------------------------------------------------------------
    // Background passes
    // ------------------------------------------------------------------

    /// Page through all records and decay the eligible ones: not deleted,
    /// score above zero, idle since before the configured cutoff.
    ///
    /// Per-user failures are logged and counted, never fatal. A store
    /// failure while paging aborts the sweep.
    pub fn decay_sweep(&self, now_ms: TimestampMs) -> Result<DecaySweep, MeritError> {
        let settings = self.config.snapshot();
        let cutoff_ms = settings.inactivity_cutoff(now_ms);

        let mut sweep = DecaySweep {
            scanned: 0,
            decayed: 0,
            failed: 0,
        };
        let mut start_after: Option<UserId> = None;
        loop {
            let page = self.scores.scan_records(start_after, settings.batch_size)?;
            let Some(last) = page.last() else { break };
            start_after = Some(last.user_id);

            for record in &page {
                sweep.scanned += 1;
                if record.deleted
                    || record.current_score == 0
                    || record.last_activity_at_ms >= cutoff_ms
                {
                    continue;
                }
                match self.engine.decay(
                    record.user_id,
                    settings.decay_factor,
                    &settings.tiers,
                    now_ms,
                ) {
                    Ok(update) => {
                        if update.current_score != update.previous_score {
                            sweep.decayed += 1;
                        }
                    }
                    Err(e) => {
                        sweep.failed += 1;
                        warn!(user_id = record.user_id, error = %e, "decay failed, sweep continues");
                    }
                }
            }
        }

        info!(
            scanned = sweep.scanned,
            decayed = sweep.decayed,
            failed = sweep.failed,
            "decay sweep complete"
        );
        Ok(sweep)
    }

    /// Rebuild the current-period snapshot of every configured board.
    /// Boards fail independently; one bad build never blocks the rest.
    pub fn snapshot_pass(&self, now_ms: TimestampMs) -> SnapshotPass {
        let settings = self.config.snapshot();
        let mut pass = SnapshotPass {
            built: Vec::new(),
            failed: 0,
        };
        for &kind in &settings.scheduler.boards {
            let key = period_key(kind, now_ms);
            match self.aggregator.build_snapshot(&key, settings.batch_size) {
                Ok(entries) => {
                    debug!(board = %key, entries, "snapshot rebuilt");
                    pass.built.push((key, entries));
                }
                Err(e) => {
                    pass.failed += 1;
                    warn!(board = %key, error = %e, "snapshot build failed, pass continues");
                }
            }
        }
        pass
    }
}

/// The period a board covers at `now_ms`, in UTC.
///
/// Daily runs midnight to midnight; weekly runs Monday to Monday; monthly
/// runs the first of the month to the first of the next. The all-time
/// board keeps one fixed sentinel period, so its snapshot key never moves.
pub fn period_key(kind: BoardKind, now_ms: TimestampMs) -> SnapshotKey {
    let today = utc_date(now_ms);
    let (start, end) = match kind {
        BoardKind::Daily => (today, add_days(today, 1)),
        BoardKind::Weekly => {
            let monday = today
                .checked_sub_days(Days::new(u64::from(today.weekday().num_days_from_monday())))
                .unwrap_or(NaiveDate::MIN);
            (monday, add_days(monday, 7))
        }
        BoardKind::Monthly => {
            let first = today.with_day(1).unwrap_or(today);
            let next = first
                .checked_add_months(Months::new(1))
                .unwrap_or(NaiveDate::MAX);
            (first, next)
        }
        BoardKind::AllTime => {
            return SnapshotKey {
                kind,
                period_start_ms: ALL_TIME_START_MS,
                period_end_ms: ALL_TIME_END_MS,
            };
        }
    };
    SnapshotKey {
        kind,
        period_start_ms: day_start_ms(start),
        period_end_ms: day_start_ms(end),
    }
}

/// The UTC calendar date of an instant, clamped at chrono's range ends.
fn utc_date(now_ms: TimestampMs) -> NaiveDate {
    match DateTime::from_timestamp_millis(now_ms) {
        Some(dt) => dt.date_naive(),
        None if now_ms < 0 => DateTime::<Utc>::MIN_UTC.date_naive(),
        None => DateTime::<Utc>::MAX_UTC.date_naive(),
    }
}

fn day_start_ms(date: NaiveDate) -> TimestampMs {
    date.and_time(NaiveTime::MIN).and_utc().timestamp_millis()
}

fn add_days(date: NaiveDate, days: u64) -> NaiveDate {
    date.checked_add_days(Days::new(days)).unwrap_or(NaiveDate::MAX)
}
