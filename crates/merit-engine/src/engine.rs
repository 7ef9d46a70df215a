//! The authoritative score write path.
//!
//! Every score or account-state change in the system commits through
//! [`ScoreUpdateEngine`]: user activity (EWMA), inactivity decay, report
//! handling, and the mutations behind admin overrides. Each mutation runs
//! as read, recompute, versioned commit under a per-user lock, and appends
//! its audit event in the same commit. Tunables arrive as arguments so a
//! configuration reload needs no engine state to flush.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use merit_core::constants::MAX_COMMIT_ATTEMPTS;
use merit_core::error::{EngineError, ParamError, StoreError};
use merit_core::scoring::{apply_delta, decay_score, ewma_update};
use merit_core::store::ScoreStore;
use merit_core::tier::TierTable;
use merit_core::types::{
    ActivitySubmission, ActivityType, EventDraft, SuspensionOutcome, TimestampMs, UpdatedScore,
    UserId, UserScoreRecord,
};

/// Serialized, audited score mutations over a [`ScoreStore`].
///
/// Writers for the same user are serialized through an in-process lock
/// registry; the store's version check catches writers this instance cannot
/// see (a second process on the same store). A commit that keeps losing the
/// version race is dropped with [`EngineError::Contention`] after
/// [`MAX_COMMIT_ATTEMPTS`] tries rather than retried forever.
pub struct ScoreUpdateEngine {
    scores: Arc<dyn ScoreStore>,
    /// Per-user write locks, created on first touch and never removed.
    locks: DashMap<UserId, Arc<Mutex<()>>>,
}

impl ScoreUpdateEngine {
    pub fn new(scores: Arc<dyn ScoreStore>) -> Self {
        Self {
            scores,
            locks: DashMap::new(),
        }
    }

    /// Read-through to the underlying store.
    pub fn user_record(&self, user_id: UserId) -> Result<Option<UserScoreRecord>, EngineError> {
        Ok(self.scores.user_record(user_id)?)
    }

    // ------------------------------------------------------------------
    // Activity path
    // ------------------------------------------------------------------

    /// Apply one user activity: EWMA-blend the configured `weight` into the
    /// user's score and re-resolve the tier.
    ///
    /// A user without a record gets one at the baseline score first, then
    /// the activity applies to it, all in one commit. `last_activity_at_ms`
    /// only moves forward; a late-arriving older activity still updates the
    /// score but does not rewind it.
    ///
    /// The audit event carries `weight` itself, not the blended movement:
    /// a windowed scan totals what the user's activity earned, and the
    /// EWMA dampening never hides a burst.
    ///
    /// # Errors
    ///
    /// - [`ParamError::UnsupportedActivity`] for non-user activity kinds
    /// - [`ParamError::Alpha`] when `alpha` is outside `[0, 1]`
    /// - [`EngineError::UnknownUser`] when the record is soft-deleted
    pub fn apply_activity(
        &self,
        sub: &ActivitySubmission,
        weight: i64,
        alpha: f64,
        tiers: &TierTable,
    ) -> Result<UpdatedScore, EngineError> {
        if !sub.activity_type.is_user_activity() {
            return Err(ParamError::UnsupportedActivity(sub.activity_type).into());
        }
        validate_fraction(alpha).map_err(|_| ParamError::Alpha(alpha))?;

        let record = self.mutate_user(sub.user_id, tiers, Some(sub.at_ms), |rec| {
            let before = rec.current_score;
            let after = ewma_update(before, weight, alpha);
            rec.previous_score = before;
            rec.current_score = after;
            rec.rank_tier = tiers.resolve(after);
            rec.last_activity_at_ms = rec.last_activity_at_ms.max(sub.at_ms);
            EventDraft::from_submission(sub, weight)
        })?;

        debug!(
            user_id = record.user_id,
            previous = record.previous_score,
            current = record.current_score,
            activity = %sub.activity_type,
            "applied activity"
        );
        Ok(updated(&record))
    }

    /// Apply inactivity decay: multiply the score by `1 - decay_factor`.
    ///
    /// Decay that would not change the score commits nothing, so repeated
    /// passes over dormant zero-score users are free. Decay never moves
    /// `last_activity_at_ms`.
    ///
    /// # Errors
    ///
    /// - [`ParamError::DecayFactor`] when the factor is outside `[0, 1]`
    /// - [`EngineError::UnknownUser`] for missing or soft-deleted records
    pub fn decay(
        &self,
        user_id: UserId,
        decay_factor: f64,
        tiers: &TierTable,
        now_ms: TimestampMs,
    ) -> Result<UpdatedScore, EngineError> {
        validate_fraction(decay_factor).map_err(|_| ParamError::DecayFactor(decay_factor))?;

        let current = match self.scores.user_record(user_id)? {
            Some(rec) if !rec.deleted => rec,
            _ => return Err(EngineError::UnknownUser(user_id)),
        };
        if decay_score(current.current_score, decay_factor) == current.current_score {
            return Ok(UpdatedScore {
                user_id,
                previous_score: current.current_score,
                current_score: current.current_score,
                rank_tier: current.rank_tier,
            });
        }

        let record = self.mutate_user(user_id, tiers, None, |rec| {
            let before = rec.current_score;
            let after = decay_score(before, decay_factor);
            rec.previous_score = before;
            rec.current_score = after;
            rec.rank_tier = tiers.resolve(after);
            EventDraft::audit(
                user_id,
                ActivityType::ScoreDecay,
                after as i64 - before as i64,
                None,
                now_ms,
            )
        })?;

        debug!(
            user_id,
            previous = record.previous_score,
            current = record.current_score,
            "applied inactivity decay"
        );
        Ok(updated(&record))
    }

    /// Register a report against a user, suspending the account with a
    /// one-time score penalty when the count reaches `threshold`.
    ///
    /// Reports against a never-seen user create a baseline record first.
    /// Reports past the threshold keep counting but never re-penalize; the
    /// penalty rides the single false-to-true suspension transition.
    ///
    /// # Errors
    ///
    /// - [`ParamError::SuspensionThreshold`] when `threshold` is 0
    /// - [`EngineError::UnknownUser`] when the record is soft-deleted
    pub fn register_report(
        &self,
        user_id: UserId,
        threshold: u32,
        penalty: u64,
        tiers: &TierTable,
        now_ms: TimestampMs,
    ) -> Result<SuspensionOutcome, EngineError> {
        if threshold == 0 {
            return Err(ParamError::SuspensionThreshold(threshold).into());
        }

        let mut newly_suspended = false;
        let record = self.mutate_user(user_id, tiers, Some(now_ms), |rec| {
            rec.report_count = rec.report_count.saturating_add(1);
            newly_suspended = !rec.account_suspended && rec.report_count >= threshold;
            let before = rec.current_score;
            if newly_suspended {
                rec.account_suspended = true;
                let after = apply_delta(before, -(penalty.min(i64::MAX as u64) as i64));
                rec.previous_score = before;
                rec.current_score = after;
                rec.rank_tier = tiers.resolve(after);
            }
            EventDraft::audit(
                user_id,
                ActivityType::Report,
                rec.current_score as i64 - before as i64,
                None,
                now_ms,
            )
        })?;

        if newly_suspended {
            info!(
                user_id,
                report_count = record.report_count,
                current = record.current_score,
                "account suspended at report threshold"
            );
        }
        Ok(SuspensionOutcome {
            user_id,
            report_count: record.report_count,
            account_suspended: record.account_suspended,
            newly_suspended,
            current_score: record.current_score,
        })
    }

    // ------------------------------------------------------------------
    // Mutations behind the admin surface
    // ------------------------------------------------------------------

    /// Add a signed delta to the score, clamping at zero. The audit event
    /// records the delta as requested; what the clamp took off stays
    /// readable from the before and after scores.
    pub fn admin_adjust(
        &self,
        user_id: UserId,
        delta: i64,
        reason: Option<&str>,
        tiers: &TierTable,
        now_ms: TimestampMs,
    ) -> Result<UpdatedScore, EngineError> {
        let record = self.mutate_user(user_id, tiers, None, |rec| {
            let before = rec.current_score;
            let after = apply_delta(before, delta);
            rec.previous_score = before;
            rec.current_score = after;
            rec.rank_tier = tiers.resolve(after);
            EventDraft::audit(user_id, ActivityType::AdminAdjustment, delta, reason, now_ms)
        })?;
        Ok(updated(&record))
    }

    /// Set the suspension flag. Re-suspending or re-unsuspending is a
    /// recorded no-op: the flag is already there but the admin action still
    /// lands in the audit log.
    pub fn set_suspended(
        &self,
        user_id: UserId,
        suspended: bool,
        reason: Option<&str>,
        tiers: &TierTable,
        now_ms: TimestampMs,
    ) -> Result<SuspensionOutcome, EngineError> {
        let mut newly_suspended = false;
        let record = self.mutate_user(user_id, tiers, None, |rec| {
            newly_suspended = suspended && !rec.account_suspended;
            rec.account_suspended = suspended;
            let kind = if suspended {
                ActivityType::AdminSuspension
            } else {
                ActivityType::AdminUnsuspension
            };
            EventDraft::audit(user_id, kind, 0, reason, now_ms)
        })?;

        info!(user_id, suspended, "admin set suspension state");
        Ok(SuspensionOutcome {
            user_id,
            report_count: record.report_count,
            account_suspended: record.account_suspended,
            newly_suspended,
            current_score: record.current_score,
        })
    }

    /// Set or clear the suspicious flag.
    pub fn set_suspicious(
        &self,
        user_id: UserId,
        flagged: bool,
        reason: Option<&str>,
        tiers: &TierTable,
        now_ms: TimestampMs,
    ) -> Result<UserScoreRecord, EngineError> {
        self.mutate_user(user_id, tiers, None, |rec| {
            rec.suspicious_flag = flagged;
            let kind = if flagged {
                ActivityType::AdminFlag
            } else {
                ActivityType::AdminUnflag
            };
            EventDraft::audit(user_id, kind, 0, reason, now_ms)
        })
    }

    /// Zero the report count. Suspension and flags stay as they are;
    /// lifting a suspension is its own audited action.
    pub fn reset_reports(
        &self,
        user_id: UserId,
        reason: Option<&str>,
        tiers: &TierTable,
        now_ms: TimestampMs,
    ) -> Result<UserScoreRecord, EngineError> {
        self.mutate_user(user_id, tiers, None, |rec| {
            rec.report_count = 0;
            EventDraft::audit(user_id, ActivityType::AdminReportReset, 0, reason, now_ms)
        })
    }

    /// Soft-delete the record. The user disappears from leaderboards and
    /// every later write for them, admin ones included, fails with
    /// [`EngineError::UnknownUser`]. There is no undelete.
    pub fn remove_user(
        &self,
        user_id: UserId,
        reason: Option<&str>,
        tiers: &TierTable,
        now_ms: TimestampMs,
    ) -> Result<UserScoreRecord, EngineError> {
        let record = self.mutate_user(user_id, tiers, None, |rec| {
            rec.deleted = true;
            EventDraft::audit(user_id, ActivityType::AdminRemoval, 0, reason, now_ms)
        })?;
        info!(user_id, "user removed");
        Ok(record)
    }

    // ------------------------------------------------------------------
    // The single write path
    // ------------------------------------------------------------------

    /// Run one mutation as read, apply, versioned commit.
    ///
    /// `create_at: Some(ts)` lazily creates a baseline record stamped `ts`
    /// for users never seen; `None` surfaces them as [`EngineError::UnknownUser`].
    /// Soft-deleted records are unknown to every mutation. On a version
    /// conflict the whole cycle reruns against a fresh read, bounded by
    /// [`MAX_COMMIT_ATTEMPTS`].
    fn mutate_user<F>(
        &self,
        user_id: UserId,
        tiers: &TierTable,
        create_at: Option<TimestampMs>,
        mut apply: F,
    ) -> Result<UserScoreRecord, EngineError>
    where
        F: FnMut(&mut UserScoreRecord) -> EventDraft,
    {
        let lock = {
            let entry = self.locks.entry(user_id).or_default();
            Arc::clone(entry.value())
        };
        let _guard = lock.lock();

        let mut attempt = 0;
        loop {
            attempt += 1;
            let (mut record, expected_version) = match self.scores.user_record(user_id)? {
                Some(rec) if rec.deleted => return Err(EngineError::UnknownUser(user_id)),
                Some(rec) => {
                    let version = rec.version;
                    (rec, Some(version))
                }
                None => match create_at {
                    Some(at_ms) => (UserScoreRecord::new(user_id, tiers, at_ms), None),
                    None => return Err(EngineError::UnknownUser(user_id)),
                },
            };

            let draft = apply(&mut record);
            record.version = expected_version.map_or(1, |v| v + 1);

            match self
                .scores
                .commit_record(&record, expected_version, Some(&draft))
            {
                Ok(()) => return Ok(record),
                Err(StoreError::Conflict(_)) | Err(StoreError::RecordExists(_))
                    if attempt < MAX_COMMIT_ATTEMPTS =>
                {
                    warn!(user_id, attempt, "score commit raced, retrying");
                    std::thread::sleep(Duration::from_millis(1u64 << (attempt - 1)));
                }
                Err(StoreError::Conflict(_)) | Err(StoreError::RecordExists(_)) => {
                    warn!(user_id, attempt, "score commit dropped after repeated conflicts");
                    return Err(EngineError::Contention {
                        user_id,
                        attempts: attempt,
                    });
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}

fn updated(record: &UserScoreRecord) -> UpdatedScore {
    UpdatedScore {
        user_id: record.user_id,
        previous_score: record.previous_score,
        current_score: record.current_score,
        rank_tier: record.rank_tier,
    }
}

fn validate_fraction(value: f64) -> Result<(), ()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(())
    }
}
