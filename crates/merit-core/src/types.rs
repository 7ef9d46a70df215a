//! Core domain types: score records, activity events, leaderboard entries.
//!
//! Timestamps in persisted types are unix-epoch milliseconds (`TimestampMs`).
//! Scores are non-negative `u64`; score deltas are signed `i64`.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::constants::BASELINE_SCORE;
use crate::tier::{RankTier, TierTable};

/// Opaque user identifier, assigned by the (out-of-scope) user system.
pub type UserId = u64;

/// Store-assigned activity event identifier, monotonically increasing.
pub type EventId = u64;

/// Unix-epoch milliseconds.
pub type TimestampMs = i64;

/// What an activity event acted on.
#[derive(
    Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash,
    bincode::Encode, bincode::Decode,
)]
pub enum TargetType {
    /// A piece of content (post, upload).
    Content,
    /// A comment on content.
    Comment,
    /// A user account; audit events always target the affected user.
    User,
}

impl TargetType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TargetType::Content => "CONTENT",
            TargetType::Comment => "COMMENT",
            TargetType::User => "USER",
        }
    }
}

impl fmt::Display for TargetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The kind of activity behind a score change.
///
/// User-originated kinds carry a configured weight into the EWMA update;
/// the remaining kinds exist so the event log is a complete audit trail of
/// every score and state change.
#[derive(
    Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash,
    bincode::Encode, bincode::Decode,
)]
pub enum ActivityType {
    Like,
    Comment,
    ContentCreate,
    /// A report filed against the user (the event's `user_id` is the
    /// reported user).
    Report,
    /// Inactivity decay applied by the scheduler.
    ScoreDecay,
    AdminAdjustment,
    AdminSuspension,
    AdminUnsuspension,
    AdminFlag,
    AdminUnflag,
    AdminReportReset,
    AdminRemoval,
}

impl ActivityType {
    /// True for the kinds accepted by the activity-ingestion path.
    pub fn is_user_activity(&self) -> bool {
        matches!(
            self,
            ActivityType::Like | ActivityType::Comment | ActivityType::ContentCreate
        )
    }

    /// True for kinds written only by the admin override surface.
    pub fn is_admin_action(&self) -> bool {
        matches!(
            self,
            ActivityType::AdminAdjustment
                | ActivityType::AdminSuspension
                | ActivityType::AdminUnsuspension
                | ActivityType::AdminFlag
                | ActivityType::AdminUnflag
                | ActivityType::AdminReportReset
                | ActivityType::AdminRemoval
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityType::Like => "LIKE",
            ActivityType::Comment => "COMMENT",
            ActivityType::ContentCreate => "CONTENT_CREATE",
            ActivityType::Report => "REPORT",
            ActivityType::ScoreDecay => "SCORE_DECAY",
            ActivityType::AdminAdjustment => "ADMIN_ADJUSTMENT",
            ActivityType::AdminSuspension => "ADMIN_SUSPENSION",
            ActivityType::AdminUnsuspension => "ADMIN_UNSUSPENSION",
            ActivityType::AdminFlag => "ADMIN_FLAG",
            ActivityType::AdminUnflag => "ADMIN_UNFLAG",
            ActivityType::AdminReportReset => "ADMIN_REPORT_RESET",
            ActivityType::AdminRemoval => "ADMIN_REMOVAL",
        }
    }
}

impl fmt::Display for ActivityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One user activity as emitted by an activity source: the
/// `(userId, targetId, targetType, activityType, timestamp)` tuple.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ActivitySubmission {
    pub user_id: UserId,
    pub target_id: u64,
    pub target_type: TargetType,
    pub activity_type: ActivityType,
    /// When the activity happened, per the submitter.
    pub at_ms: TimestampMs,
}

/// Per-user reputation state. One record per user, created lazily on first
/// activity.
///
/// # Invariants
///
/// * `current_score >= 0` (enforced by clamping in every score mutation).
/// * `rank_tier` always equals the tier table's resolution of
///   `current_score` after any mutation; it is never set independently.
/// * `version` increases by exactly 1 on every committed mutation.
#[derive(
    Serialize, Deserialize, Clone, Debug, PartialEq, Eq,
    bincode::Encode, bincode::Decode,
)]
pub struct UserScoreRecord {
    pub user_id: UserId,
    pub current_score: u64,
    /// Score before the most recent update, kept for anomaly comparison.
    pub previous_score: u64,
    pub rank_tier: RankTier,
    /// Last user-originated activity. Reports against the user, admin
    /// actions, and decay do not move this.
    pub last_activity_at_ms: TimestampMs,
    pub suspicious_flag: bool,
    /// Monotonically non-decreasing except through the audited admin reset.
    pub report_count: u32,
    pub account_suspended: bool,
    /// Soft-delete marker; records are never hard-deleted.
    pub deleted: bool,
    /// Optimistic-concurrency version, starting at 1.
    pub version: u64,
}

impl UserScoreRecord {
    /// A fresh record at the baseline score.
    pub fn new(user_id: UserId, tiers: &TierTable, now_ms: TimestampMs) -> Self {
        Self {
            user_id,
            current_score: BASELINE_SCORE,
            previous_score: BASELINE_SCORE,
            rank_tier: tiers.resolve(BASELINE_SCORE),
            last_activity_at_ms: now_ms,
            suspicious_flag: false,
            report_count: 0,
            account_suspended: false,
            deleted: false,
            version: 1,
        }
    }
}

/// An activity event before the store has assigned it an id.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct EventDraft {
    pub user_id: UserId,
    pub target_id: u64,
    pub target_type: TargetType,
    pub activity_type: ActivityType,
    /// Signed audit delta: the configured weight for user activity, the
    /// requested delta for admin adjustments, the change applied for
    /// reports and decay (0 when nothing changed).
    pub score_delta: i64,
    /// Operator-supplied audit note; admin events only.
    pub reason: Option<String>,
    pub created_at_ms: TimestampMs,
}

impl EventDraft {
    /// Draft for a user-originated activity.
    pub fn from_submission(sub: &ActivitySubmission, score_delta: i64) -> Self {
        Self {
            user_id: sub.user_id,
            target_id: sub.target_id,
            target_type: sub.target_type,
            activity_type: sub.activity_type,
            score_delta,
            reason: None,
            created_at_ms: sub.at_ms,
        }
    }

    /// Draft for an audit event targeting the affected user (reports, decay,
    /// admin actions).
    pub fn audit(
        user_id: UserId,
        activity_type: ActivityType,
        score_delta: i64,
        reason: Option<&str>,
        at_ms: TimestampMs,
    ) -> Self {
        Self {
            user_id,
            target_id: user_id,
            target_type: TargetType::User,
            activity_type,
            score_delta,
            reason: reason.map(str::to_owned),
            created_at_ms: at_ms,
        }
    }

    /// Attach the store-assigned id.
    pub fn into_event(self, id: EventId) -> ActivityEvent {
        ActivityEvent {
            id,
            user_id: self.user_id,
            target_id: self.target_id,
            target_type: self.target_type,
            activity_type: self.activity_type,
            score_delta: self.score_delta,
            reason: self.reason,
            created_at_ms: self.created_at_ms,
        }
    }
}

/// Immutable, append-only audit record of one score or state change.
#[derive(
    Serialize, Deserialize, Clone, Debug, PartialEq, Eq,
    bincode::Encode, bincode::Decode,
)]
pub struct ActivityEvent {
    pub id: EventId,
    pub user_id: UserId,
    pub target_id: u64,
    pub target_type: TargetType,
    pub activity_type: ActivityType,
    pub score_delta: i64,
    pub reason: Option<String>,
    pub created_at_ms: TimestampMs,
}

/// Which leaderboard a snapshot belongs to.
#[derive(
    Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash,
    bincode::Encode, bincode::Decode,
)]
#[serde(rename_all = "lowercase")]
pub enum BoardKind {
    Daily,
    Weekly,
    Monthly,
    AllTime,
}

impl BoardKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BoardKind::Daily => "daily",
            BoardKind::Weekly => "weekly",
            BoardKind::Monthly => "monthly",
            BoardKind::AllTime => "alltime",
        }
    }
}

impl fmt::Display for BoardKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifies one leaderboard snapshot: kind plus `[period_start, period_end)`.
#[derive(
    Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash,
    bincode::Encode, bincode::Decode,
)]
pub struct SnapshotKey {
    pub kind: BoardKind,
    pub period_start_ms: TimestampMs,
    pub period_end_ms: TimestampMs,
}

impl fmt::Display for SnapshotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}[{}..{})",
            self.kind, self.period_start_ms, self.period_end_ms
        )
    }
}

/// One ranked row of a leaderboard snapshot. Denormalized at build time;
/// later mutations of the user record do not touch it.
#[derive(
    Serialize, Deserialize, Clone, Debug, PartialEq, Eq,
    bincode::Encode, bincode::Decode,
)]
pub struct LeaderboardEntry {
    pub user_id: UserId,
    pub username: String,
    pub score: u64,
    pub rank_tier: RankTier,
    /// 1-based, dense: positions form `1..=N` with no gaps.
    pub rank_position: u32,
}

/// Result of a score mutation.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct UpdatedScore {
    pub user_id: UserId,
    pub previous_score: u64,
    pub current_score: u64,
    pub rank_tier: RankTier,
}

/// Result of registering a report against a user.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct SuspensionOutcome {
    pub user_id: UserId,
    pub report_count: u32,
    pub account_suspended: bool,
    /// True only on the call that flipped `account_suspended` to true.
    pub newly_suspended: bool,
    pub current_score: u64,
}

/// One flagged user from an anomaly scan.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct SuspiciousUser {
    pub user_id: UserId,
    /// Sum of `score_delta` over the scanned window.
    pub total_score_change: i64,
    /// Number of events in the window.
    pub activity_count: u64,
    /// Timestamp of the user's latest event inside the window.
    pub last_activity_at_ms: TimestampMs,
    /// `total_score_change / threshold` in basis points, saturating.
    /// 10 000 means exactly at the threshold.
    pub severity_bps: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tiers() -> TierTable {
        TierTable::default()
    }

    #[test]
    fn new_record_starts_at_baseline() {
        let rec = UserScoreRecord::new(7, &tiers(), 1_000);
        assert_eq!(rec.current_score, BASELINE_SCORE);
        assert_eq!(rec.previous_score, BASELINE_SCORE);
        assert_eq!(rec.rank_tier, RankTier::Bronze);
        assert_eq!(rec.last_activity_at_ms, 1_000);
        assert_eq!(rec.report_count, 0);
        assert_eq!(rec.version, 1);
        assert!(!rec.suspicious_flag && !rec.account_suspended && !rec.deleted);
    }

    #[test]
    fn activity_type_classification() {
        assert!(ActivityType::Like.is_user_activity());
        assert!(ActivityType::Comment.is_user_activity());
        assert!(ActivityType::ContentCreate.is_user_activity());
        assert!(!ActivityType::Report.is_user_activity());
        assert!(!ActivityType::ScoreDecay.is_user_activity());
        assert!(!ActivityType::AdminAdjustment.is_user_activity());

        assert!(ActivityType::AdminRemoval.is_admin_action());
        assert!(!ActivityType::Report.is_admin_action());
        assert!(!ActivityType::ScoreDecay.is_admin_action());
    }

    #[test]
    fn draft_from_submission_carries_fields() {
        let sub = ActivitySubmission {
            user_id: 42,
            target_id: 9,
            target_type: TargetType::Content,
            activity_type: ActivityType::Like,
            at_ms: 5_000,
        };
        let event = EventDraft::from_submission(&sub, 50).into_event(1);
        assert_eq!(event.id, 1);
        assert_eq!(event.user_id, 42);
        assert_eq!(event.target_id, 9);
        assert_eq!(event.activity_type, ActivityType::Like);
        assert_eq!(event.score_delta, 50);
        assert_eq!(event.reason, None);
        assert_eq!(event.created_at_ms, 5_000);
    }

    #[test]
    fn audit_draft_targets_the_user() {
        let draft = EventDraft::audit(
            42,
            ActivityType::AdminSuspension,
            0,
            Some("tos violation"),
            6_000,
        );
        assert_eq!(draft.target_id, 42);
        assert_eq!(draft.target_type, TargetType::User);
        assert_eq!(draft.reason.as_deref(), Some("tos violation"));
    }

    #[test]
    fn display_names_are_canonical() {
        assert_eq!(ActivityType::ContentCreate.to_string(), "CONTENT_CREATE");
        assert_eq!(ActivityType::AdminReportReset.to_string(), "ADMIN_REPORT_RESET");
        assert_eq!(BoardKind::AllTime.to_string(), "alltime");
        let key = SnapshotKey {
            kind: BoardKind::Daily,
            period_start_ms: 100,
            period_end_ms: 200,
        };
        assert_eq!(key.to_string(), "daily[100..200)");
    }
}
