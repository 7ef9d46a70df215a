//! Engine-wide constants and default tunables.
//!
//! Runtime configuration (see `merit-service`) starts from these values;
//! everything here can be overridden per deployment except the baseline
//! score, which is part of the record lifecycle contract.

/// Score assigned to a user record when it is lazily created on first
/// activity.
///
/// # Examples
///
/// ```
/// use merit_core::constants::BASELINE_SCORE;
///
/// assert_eq!(BASELINE_SCORE, 1000);
/// ```
pub const BASELINE_SCORE: u64 = 1000;

/// Default EWMA smoothing factor: the share of the new activity's weight in
/// the updated score. `0.2` means a single activity moves the score 20% of
/// the way toward its weight.
pub const DEFAULT_ALPHA: f64 = 0.2;

/// Default per-pass decay factor applied to inactive users.
pub const DEFAULT_DECAY_FACTOR: f64 = 0.05;

/// Default number of reports at which an account is suspended.
pub const DEFAULT_SUSPENSION_THRESHOLD: u32 = 5;

/// Score penalty applied once when the report threshold suspends an account.
pub const DEFAULT_REPORT_PENALTY: u64 = 100;

/// Default summed-score-change threshold for the anomaly scan.
pub const DEFAULT_ANOMALY_THRESHOLD: i64 = 300;

/// Default anomaly scan window, in hours.
pub const DEFAULT_ANOMALY_WINDOW_HOURS: u64 = 24;

/// Users with no activity for this many hours are eligible for decay.
pub const DEFAULT_INACTIVITY_WINDOW_HOURS: u64 = 72;

/// Default activity weights fed into the EWMA update.
pub const DEFAULT_LIKE_WEIGHT: i64 = 50;
pub const DEFAULT_COMMENT_WEIGHT: i64 = 80;
pub const DEFAULT_CONTENT_CREATE_WEIGHT: i64 = 120;

/// Default page size for background passes (decay sweep, snapshot scan).
pub const DEFAULT_BATCH_SIZE: usize = 500;

/// Maximum version-conflict commit attempts before an update is dropped
/// and logged.
pub const MAX_COMMIT_ATTEMPTS: u32 = 3;

/// Default tier cutoffs (minimum score, inclusive).
///
/// Bronze starts at 0 so the tier table is total over all scores.
///
/// # Examples
///
/// ```
/// use merit_core::constants::{SILVER_MIN_SCORE, DIAMOND_MIN_SCORE};
///
/// assert!(SILVER_MIN_SCORE < DIAMOND_MIN_SCORE);
/// ```
pub const BRONZE_MIN_SCORE: u64 = 0;
pub const SILVER_MIN_SCORE: u64 = 1201;
pub const GOLD_MIN_SCORE: u64 = 1501;
pub const PLATINUM_MIN_SCORE: u64 = 1801;
pub const DIAMOND_MIN_SCORE: u64 = 2101;

/// Sentinel period bounds for all-time leaderboards.
///
/// Periodic boards use real UTC calendar bounds; the all-time board keeps a
/// single snapshot under this fixed key.
pub const ALL_TIME_START_MS: i64 = 0;
pub const ALL_TIME_END_MS: i64 = i64::MAX;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tier_cutoffs_strictly_ascending() {
        let cutoffs = [
            BRONZE_MIN_SCORE,
            SILVER_MIN_SCORE,
            GOLD_MIN_SCORE,
            PLATINUM_MIN_SCORE,
            DIAMOND_MIN_SCORE,
        ];
        for pair in cutoffs.windows(2) {
            assert!(pair[0] < pair[1], "cutoffs out of order: {pair:?}");
        }
    }

    #[test]
    fn default_tunables_in_range() {
        assert!((0.0..=1.0).contains(&DEFAULT_ALPHA));
        assert!((0.0..=1.0).contains(&DEFAULT_DECAY_FACTOR));
        assert!(DEFAULT_SUSPENSION_THRESHOLD >= 1);
        assert!(DEFAULT_ANOMALY_THRESHOLD >= 1);
    }
}
