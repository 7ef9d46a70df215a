//! Audited operator surface over the score engine.
//!
//! Every override lands as a normal engine mutation, so it rides the same
//! per-user serialization and leaves the same kind of audit event as the
//! activity path. Operations that change a user's standing take a mandatory
//! reason; the reason travels into the event log verbatim.

use std::sync::Arc;

use tracing::info;

use merit_core::error::EngineError;
use merit_core::tier::TierTable;
use merit_core::types::{SuspensionOutcome, TimestampMs, UpdatedScore, UserId, UserScoreRecord};

use crate::engine::ScoreUpdateEngine;

/// Manual score and account-state controls for operators.
///
/// Unlike the activity path, overrides never create records: acting on a
/// user the engine has never seen is an [`EngineError::UnknownUser`].
pub struct AdminOverride {
    engine: Arc<ScoreUpdateEngine>,
}

impl AdminOverride {
    pub fn new(engine: Arc<ScoreUpdateEngine>) -> Self {
        Self { engine }
    }

    /// Apply a raw signed delta to the score, bypassing the EWMA blend.
    /// Clamped at zero; the audit event records the applied change.
    pub fn adjust_score(
        &self,
        user_id: UserId,
        delta: i64,
        reason: &str,
        tiers: &TierTable,
        now_ms: TimestampMs,
    ) -> Result<UpdatedScore, EngineError> {
        info!(user_id, delta, reason, "admin score adjustment");
        self.engine.admin_adjust(user_id, delta, Some(reason), tiers, now_ms)
    }

    /// Suspend the account. Independent of the report counter and carries
    /// no score penalty.
    pub fn suspend(
        &self,
        user_id: UserId,
        reason: &str,
        tiers: &TierTable,
        now_ms: TimestampMs,
    ) -> Result<SuspensionOutcome, EngineError> {
        info!(user_id, reason, "admin suspension");
        self.engine.set_suspended(user_id, true, Some(reason), tiers, now_ms)
    }

    /// Lift a suspension, whether it came from reports or an override.
    pub fn unsuspend(
        &self,
        user_id: UserId,
        tiers: &TierTable,
        now_ms: TimestampMs,
    ) -> Result<SuspensionOutcome, EngineError> {
        info!(user_id, "admin unsuspension");
        self.engine.set_suspended(user_id, false, None, tiers, now_ms)
    }

    /// Flag the user for review, typically off the back of an anomaly scan.
    /// Flagging is bookkeeping only; it never touches the score.
    pub fn mark_suspicious(
        &self,
        user_id: UserId,
        reason: &str,
        tiers: &TierTable,
        now_ms: TimestampMs,
    ) -> Result<UserScoreRecord, EngineError> {
        info!(user_id, reason, "user flagged suspicious");
        self.engine.set_suspicious(user_id, true, Some(reason), tiers, now_ms)
    }

    /// Clear the review flag.
    pub fn clear_suspicious(
        &self,
        user_id: UserId,
        tiers: &TierTable,
        now_ms: TimestampMs,
    ) -> Result<UserScoreRecord, EngineError> {
        info!(user_id, "suspicious flag cleared");
        self.engine.set_suspicious(user_id, false, None, tiers, now_ms)
    }

    /// Zero the report counter without touching suspension state.
    pub fn reset_reports(
        &self,
        user_id: UserId,
        reason: &str,
        tiers: &TierTable,
        now_ms: TimestampMs,
    ) -> Result<UserScoreRecord, EngineError> {
        info!(user_id, reason, "report count reset");
        self.engine.reset_reports(user_id, Some(reason), tiers, now_ms)
    }

    /// Soft-delete the user. Terminal: the record stays for audit but no
    /// later write, this surface included, will touch it.
    pub fn remove_user(
        &self,
        user_id: UserId,
        reason: &str,
        tiers: &TierTable,
        now_ms: TimestampMs,
    ) -> Result<UserScoreRecord, EngineError> {
        info!(user_id, reason, "user removal");
        self.engine.remove_user(user_id, Some(reason), tiers, now_ms)
    }
}
