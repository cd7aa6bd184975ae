//! Error types for the CE/PE comparison pipeline.
//!
//! Only batch-fatal conditions are errors. Per-file problems are reported
//! as [`crate::types::Warning`]s and never abort a batch.

use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the CE/PE comparison pipeline.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The reference snapshot lacks a column the strike selection needs.
    #[error("Reference file '{filename}' is missing required column '{column}'")]
    MissingColumn { filename: String, column: String },

    /// Every uploaded file was skipped during loading.
    #[error("No valid files: all {0} uploaded file(s) were skipped")]
    NoValidFiles(usize),

    /// Every loaded snapshot was excluded before aggregation.
    #[error("No records: none of the {0} loaded file(s) contained the reference strikes")]
    NoRecords(usize),

    /// Data error (invalid or missing data).
    #[error("Data error: {0}")]
    Data(String),

    /// CSV reading/writing error.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    /// Create a missing column error.
    pub fn missing_column(filename: impl Into<String>, column: impl Into<String>) -> Self {
        Error::MissingColumn {
            filename: filename.into(),
            column: column.into(),
        }
    }

    /// Create a data error.
    pub fn data(msg: impl Into<String>) -> Self {
        Error::Data(msg.into())
    }

    /// Whether this error aborts a batch (as opposed to a setup problem).
    pub fn is_batch_fatal(&self) -> bool {
        matches!(
            self,
            Error::MissingColumn { .. } | Error::NoValidFiles(_) | Error::NoRecords(_)
        )
    }
}
