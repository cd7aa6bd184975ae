//! Snapshot ingestion for the CE/PE comparison pipeline.
//!
//! This crate handles:
//! - Capture timestamp resolution from filenames
//! - CSV validation and parsing into snapshots
//! - Per-file warnings for skipped uploads

pub mod loader;
pub mod timestamp;

pub use loader::{LoadOutcome, LoadedBatch, SnapshotLoader};
pub use timestamp::{Clock, FixedClock, SystemClock, TimestampResolver};
