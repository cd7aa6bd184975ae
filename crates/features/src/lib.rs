//! Feature computation for the CE/PE comparison pipeline.
//!
//! This crate handles:
//! - Reference strike selection by mean open interest
//! - Per-snapshot CE/PE averages over the reference strikes
//! - Batch-wide z-score normalization

pub mod averages;
pub mod normalizer;
pub mod selector;
pub mod stats;

pub use averages::AverageComputer;
pub use normalizer::{NormalizationSummary, Normalizer, SeriesMoments};
pub use selector::{StrikeOpenInterest, TopStrikeSelector};
