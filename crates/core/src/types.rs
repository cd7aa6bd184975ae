//! Core data types for the CE/PE comparison pipeline.

use std::fmt;

use chrono::NaiveDateTime;
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

/// Strike price with ordering and hashing support.
pub type Strike = OrderedFloat<f64>;

/// Strike column (grouping key).
pub const STRIKE_COLUMN: &str = "CE_strikePrice";
/// Call open interest column (ranking signal).
pub const OPEN_INTEREST_COLUMN: &str = "CE_openInterest";
/// Call last traded price column.
pub const CE_PRICE_COLUMN: &str = "CE_lastPrice";
/// Put last traded price column.
pub const PE_PRICE_COLUMN: &str = "PE_lastPrice";

/// One uploaded file: name plus raw contents.
#[derive(Debug, Clone)]
pub struct InputFile {
    pub filename: String,
    pub bytes: Vec<u8>,
}

impl InputFile {
    pub fn new(filename: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            filename: filename.into(),
            bytes: bytes.into(),
        }
    }
}

/// Which recognised columns a file's header contained.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ColumnSet {
    pub strike: bool,
    pub open_interest: bool,
    pub ce_price: bool,
    pub pe_price: bool,
}

impl ColumnSet {
    /// All four columns present.
    pub fn all() -> Self {
        Self {
            strike: true,
            open_interest: true,
            ce_price: true,
            pe_price: true,
        }
    }

    /// First column the strike selection needs but is absent, if any.
    pub fn missing_for_selection(&self) -> Option<&'static str> {
        if !self.strike {
            Some(STRIKE_COLUMN)
        } else if !self.open_interest {
            Some(OPEN_INTEREST_COLUMN)
        } else {
            None
        }
    }
}

/// A single option-chain row. Missing or non-numeric cells are `None`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OptionRow {
    pub strike: Option<Strike>,
    pub ce_open_interest: Option<f64>,
    pub ce_last_price: Option<f64>,
    pub pe_last_price: Option<f64>,
}

/// How a snapshot's timestamp was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimestampSource {
    /// Parsed from the filename.
    Parsed,
    /// Filename did not match; wall-clock time at resolution.
    Fallback,
}

/// A timestamp tagged with its source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedTimestamp {
    pub time: NaiveDateTime,
    pub source: TimestampSource,
}

impl ResolvedTimestamp {
    pub fn parsed(time: NaiveDateTime) -> Self {
        Self {
            time,
            source: TimestampSource::Parsed,
        }
    }

    pub fn fallback(time: NaiveDateTime) -> Self {
        Self {
            time,
            source: TimestampSource::Fallback,
        }
    }

    #[inline]
    pub fn is_fallback(&self) -> bool {
        self.source == TimestampSource::Fallback
    }
}

/// One parsed option-chain file at one point in time.
///
/// Only the loader creates snapshots; a snapshot always has at least one row.
#[derive(Debug, Clone)]
pub struct Snapshot {
    /// Source filename.
    pub filename: String,
    /// Capture time.
    pub timestamp: ResolvedTimestamp,
    /// Recognised columns present in the header.
    pub columns: ColumnSet,
    /// Rows in file order.
    pub rows: Vec<OptionRow>,
}

impl Snapshot {
    /// Number of data rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Strikes chosen from the reference snapshot, best first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceStrikeSet {
    /// File the strikes were taken from.
    pub source_filename: String,
    /// Selected strikes, ranked by mean open interest.
    pub strikes: Vec<Strike>,
}

impl ReferenceStrikeSet {
    pub fn len(&self) -> usize {
        self.strikes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strikes.is_empty()
    }

    pub fn contains(&self, strike: Strike) -> bool {
        self.strikes.contains(&strike)
    }

    /// Strikes as plain floats.
    pub fn values(&self) -> Vec<f64> {
        self.strikes.iter().map(|s| s.into_inner()).collect()
    }
}

/// Per-snapshot averages plus their batch-normalized counterparts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateRecord {
    /// Source filename.
    pub filename: String,
    /// Capture time.
    pub timestamp: NaiveDateTime,
    /// Whether `timestamp` came from the filename.
    pub timestamp_source: TimestampSource,
    /// Mean CE last price over the reference strikes.
    pub avg_ce: Option<f64>,
    /// Mean PE last price over the reference strikes.
    pub avg_pe: Option<f64>,
    /// `avg_ce - avg_pe`.
    pub ce_minus_pe: Option<f64>,
    /// Z-score of `avg_ce` across the batch.
    pub ce_norm: Option<f64>,
    /// Z-score of `avg_pe` across the batch.
    pub pe_norm: Option<f64>,
    /// `ce_norm - pe_norm`.
    pub diff_norm: Option<f64>,
}

impl AggregateRecord {
    /// Create a record with raw fields only; normalized fields start undefined.
    pub fn new(
        filename: impl Into<String>,
        timestamp: ResolvedTimestamp,
        avg_ce: Option<f64>,
        avg_pe: Option<f64>,
    ) -> Self {
        let ce_minus_pe = match (avg_ce, avg_pe) {
            (Some(ce), Some(pe)) => Some(ce - pe),
            _ => None,
        };
        Self {
            filename: filename.into(),
            timestamp: timestamp.time,
            timestamp_source: timestamp.source,
            avg_ce,
            avg_pe,
            ce_minus_pe,
            ce_norm: None,
            pe_norm: None,
            diff_norm: None,
        }
    }
}

/// Why a file was skipped or degraded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum WarningKind {
    /// No content, or only whitespace.
    EmptyFile,
    /// Content could not be read as CSV.
    Unparsable(String),
    /// Header present but no data rows.
    NoRows,
    /// A price column is absent; that side's average is undefined.
    MissingPriceColumn(String),
    /// No rows matched the reference strikes.
    NoMatchingStrikes,
    /// Filename carried no usable timestamp; wall-clock time was used.
    TimestampFallback,
}

impl WarningKind {
    /// Short machine-readable name.
    pub fn code(&self) -> &'static str {
        match self {
            WarningKind::EmptyFile => "empty_file",
            WarningKind::Unparsable(_) => "unparsable",
            WarningKind::NoRows => "no_rows",
            WarningKind::MissingPriceColumn(_) => "missing_price_column",
            WarningKind::NoMatchingStrikes => "no_matching_strikes",
            WarningKind::TimestampFallback => "timestamp_fallback",
        }
    }

    /// Whether the file was dropped from the batch.
    pub fn excludes_file(&self) -> bool {
        matches!(
            self,
            WarningKind::EmptyFile
                | WarningKind::Unparsable(_)
                | WarningKind::NoRows
                | WarningKind::NoMatchingStrikes
        )
    }
}

impl fmt::Display for WarningKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WarningKind::EmptyFile => write!(f, "file is empty, skipped"),
            WarningKind::Unparsable(reason) => write!(f, "could not parse CSV ({}), skipped", reason),
            WarningKind::NoRows => write!(f, "file has no data rows, skipped"),
            WarningKind::MissingPriceColumn(column) => {
                write!(f, "column '{}' is missing, its average is undefined", column)
            }
            WarningKind::NoMatchingStrikes => {
                write!(f, "no rows match the reference strikes, skipped")
            }
            WarningKind::TimestampFallback => {
                write!(f, "no timestamp in filename, using current time")
            }
        }
    }
}

/// A per-file warning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Warning {
    pub filename: String,
    #[serde(flatten)]
    pub kind: WarningKind,
}

impl Warning {
    pub fn new(filename: impl Into<String>, kind: WarningKind) -> Self {
        Self {
            filename: filename.into(),
            kind,
        }
    }
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.filename, self.kind)
    }
}
