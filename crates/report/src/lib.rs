//! Result assembly for the CE/PE comparison pipeline.
//!
//! This crate provides:
//! - Time ordering and display formatting of aggregate records
//! - CSV export and re-ingestion of the result table
//! - The end-to-end batch pipeline

pub mod assembler;
pub mod pipeline;

pub use assembler::{parse_csv, ExportRow, Series, SeriesAssembler, SeriesRow, COLUMNS};
pub use pipeline::{BatchStats, ComparisonPipeline, ComparisonReport};
