//! End-to-end test suite for the Merit engine.
//!
//! These tests run the full service over RocksDB: activity scoring,
//! reports and suspension, anomaly scans, decay sweeps, leaderboard
//! snapshots, and concurrent writers against one store.

pub mod helpers;
