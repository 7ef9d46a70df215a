//! # merit-engine — Score updates, anomaly detection, and leaderboards.
//!
//! All score arithmetic is integer fixed-point for determinism.
//!
//! This crate holds the write path and the derived read models:
//! - [`engine::ScoreUpdateEngine`] — the single authoritative score writer:
//!   EWMA activity updates, inactivity decay, report handling, and the
//!   mutations behind admin overrides, serialized per user.
//! - [`anomaly::AnomalyDetector`] — pure aggregation over the event log
//!   flagging users whose windowed score swing crosses a threshold.
//! - [`leaderboard::LeaderboardAggregator`] — idempotent ranked snapshots
//!   built from full score scans.
//! - [`admin::AdminOverride`] — the audited operator surface over the engine.

pub mod admin;
pub mod anomaly;
pub mod engine;
pub mod leaderboard;

pub use admin::AdminOverride;
pub use anomaly::AnomalyDetector;
pub use engine::ScoreUpdateEngine;
pub use leaderboard::LeaderboardAggregator;
