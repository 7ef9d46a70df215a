//! # merit-core
//! Foundation types and traits for the Merit reputation engine.

pub mod constants;
pub mod error;
pub mod scoring;
pub mod store;
pub mod tier;
pub mod types;
