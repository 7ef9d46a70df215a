//! Windowed anomaly detection over the activity event log.
//!
//! A scan is a pure read: group the window's events per user, sum the score
//! deltas, and flag every user whose total meets the threshold. "Nobody
//! flagged" is an empty list; an unreachable event store is
//! [`AnomalyError::Unavailable`]. The two never blur into each other, and a
//! scan never writes anything — suspending a flagged user is a separate,
//! audited admin action.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use merit_core::error::{AnomalyError, ParamError};
use merit_core::store::EventStore;
use merit_core::types::{SuspiciousUser, TimestampMs, UserId};

/// Read-only scanner producing deterministic fraud signals.
pub struct AnomalyDetector {
    events: Arc<dyn EventStore>,
}

impl AnomalyDetector {
    pub fn new(events: Arc<dyn EventStore>) -> Self {
        Self { events }
    }

    /// Flag users whose summed score change in `[start_ms, end_ms)` meets
    /// `threshold`.
    ///
    /// Every event kind counts: user activity at its configured weight,
    /// admin adjustments at the granted delta, decay and report penalties
    /// at the change applied. Results are sorted by total change
    /// descending, then `user_id` ascending, and carry a severity of
    /// `total_score_change / threshold` in saturating basis points
    /// (10 000 means exactly at the threshold).
    ///
    /// # Errors
    ///
    /// - [`ParamError::Window`] when `start_ms >= end_ms`
    /// - [`ParamError::AnomalyThreshold`] when `threshold < 1`
    /// - [`AnomalyError::Unavailable`] when the event store cannot be read
    pub fn scan_window(
        &self,
        start_ms: TimestampMs,
        end_ms: TimestampMs,
        threshold: i64,
    ) -> Result<Vec<SuspiciousUser>, AnomalyError> {
        if start_ms >= end_ms {
            return Err(ParamError::Window { start_ms, end_ms }.into());
        }
        if threshold < 1 {
            return Err(ParamError::AnomalyThreshold(threshold).into());
        }

        let events = self.events.events_in_window(start_ms, end_ms)?;
        let scanned = events.len();

        let mut per_user: HashMap<UserId, (i64, u64, TimestampMs)> = HashMap::new();
        for event in events {
            let entry = per_user
                .entry(event.user_id)
                .or_insert((0, 0, event.created_at_ms));
            entry.0 = entry.0.saturating_add(event.score_delta);
            entry.1 += 1;
            entry.2 = entry.2.max(event.created_at_ms);
        }

        let mut flagged: Vec<SuspiciousUser> = per_user
            .into_iter()
            .filter(|(_, (total, _, _))| *total >= threshold)
            .map(|(user_id, (total, count, last))| SuspiciousUser {
                user_id,
                total_score_change: total,
                activity_count: count,
                last_activity_at_ms: last,
                severity_bps: severity_bps(total, threshold),
            })
            .collect();
        flagged.sort_by(|a, b| {
            b.total_score_change
                .cmp(&a.total_score_change)
                .then(a.user_id.cmp(&b.user_id))
        });

        debug!(
            start_ms,
            end_ms,
            scanned,
            flagged = flagged.len(),
            "anomaly scan complete"
        );
        Ok(flagged)
    }
}

/// `total / threshold` in basis points, saturating at `u32::MAX`.
/// Only called with `total >= threshold >= 1`, so the result is >= 10 000.
fn severity_bps(total: i64, threshold: i64) -> u32 {
    let bps = (total as i128 * 10_000) / threshold as i128;
    u32::try_from(bps).unwrap_or(u32::MAX)
}
