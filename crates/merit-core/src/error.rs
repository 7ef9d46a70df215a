//! Error types for the Merit engine.
use thiserror::Error;

use crate::types::{ActivityType, TimestampMs, UserId};

/// Tunable validation failures. Raised before any mutation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParamError {
    #[error("alpha {0} outside [0, 1]")] Alpha(f64),
    #[error("decay factor {0} outside [0, 1]")] DecayFactor(f64),
    #[error("suspension threshold must be >= 1, got {0}")] SuspensionThreshold(u32),
    #[error("anomaly threshold must be >= 1, got {0}")] AnomalyThreshold(i64),
    #[error("window start {start_ms} is not before end {end_ms}")] Window { start_ms: TimestampMs, end_ms: TimestampMs },
    #[error("batch size must be >= 1")] BatchSize,
    #[error("activity type {0} is not accepted on the activity path")] UnsupportedActivity(ActivityType),
}

/// Tier table construction failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TierTableError {
    #[error("tier table is empty")] EmptyTable,
    #[error("first cutoff must start at score 0, got {0}")] MissingFloor(u64),
    #[error("cutoff scores not strictly ascending at index {index}")] UnorderedCutoffs { index: usize },
    #[error("tiers not strictly ascending at index {index}")] UnorderedTiers { index: usize },
}

/// Persistence failures surfaced by store implementations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("record already exists for user {0}")] RecordExists(UserId),
    #[error("write conflict for user {0}")] Conflict(UserId),
    #[error("storage unavailable: {0}")] Unavailable(String),
    #[error("corrupt data: {0}")] Corrupt(String),
}

/// Score-update failures.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error(transparent)] Param(#[from] ParamError),
    #[error("unknown user {0}")] UnknownUser(UserId),
    #[error("update dropped for user {user_id} after {attempts} conflicting attempts")] Contention { user_id: UserId, attempts: u32 },
    #[error(transparent)] Store(#[from] StoreError),
}

/// Anomaly scan failures. Store trouble is always `Unavailable`, distinct
/// from an empty result.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnomalyError {
    #[error(transparent)] Param(#[from] ParamError),
    #[error("detection unavailable: {0}")] Unavailable(#[from] StoreError),
}

/// Leaderboard build/query failures. Store trouble is always `Unavailable`,
/// distinct from an empty leaderboard.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LeaderboardError {
    #[error(transparent)] Param(#[from] ParamError),
    #[error("leaderboard unavailable: {0}")] Unavailable(#[from] StoreError),
}

/// Top-level error for callers that work across components.
#[derive(Error, Debug)]
pub enum MeritError {
    #[error(transparent)] Param(#[from] ParamError),
    #[error(transparent)] TierTable(#[from] TierTableError),
    #[error(transparent)] Store(#[from] StoreError),
    #[error(transparent)] Engine(#[from] EngineError),
    #[error(transparent)] Anomaly(#[from] AnomalyError),
    #[error(transparent)] Leaderboard(#[from] LeaderboardError),
}
