//! Shared helpers for the end-to-end tests.

use merit_core::types::{ActivitySubmission, ActivityType, TargetType, TimestampMs, UserId};

pub const HOUR_MS: i64 = 3_600_000;

/// A fixed "now" for tests: 2023-11-14T22:13:20Z.
pub const NOW_MS: TimestampMs = 1_700_000_000_000;

/// One user activity of the given kind against a fixed content target.
pub fn submission(
    user_id: UserId,
    activity_type: ActivityType,
    at_ms: TimestampMs,
) -> ActivitySubmission {
    ActivitySubmission {
        user_id,
        target_id: 400,
        target_type: TargetType::Content,
        activity_type,
        at_ms,
    }
}

/// A like, the lightest-weighted activity.
pub fn like(user_id: UserId, at_ms: TimestampMs) -> ActivitySubmission {
    submission(user_id, ActivityType::Like, at_ms)
}
