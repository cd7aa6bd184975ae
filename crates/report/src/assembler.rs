//! Series assembly and CSV export.
//!
//! Orders aggregate records by capture time, attaches the display strings
//! and serializes the result table. The exported column order matches
//! [`ExportRow`] field order exactly so that [`parse_csv`] can read it back.

use std::io::Write;

use chrono::format::{Item, StrftimeItems};
use serde::{Deserialize, Serialize};

use cepe_core::config::OutputConfig;
use cepe_core::{AggregateRecord, Error, Result};

/// Display-level column names, in export order.
pub const COLUMNS: [&str; 8] = [
    "Timestamp",
    "Time",
    "Avg CE",
    "Avg PE",
    "CE−PE",
    "Norm CE",
    "Norm PE",
    "Norm Diff (CE−PE)",
];

/// One row of the result table as exported. Undefined values are empty cells.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportRow {
    #[serde(rename = "Timestamp")]
    pub timestamp: String,
    #[serde(rename = "Time")]
    pub time: String,
    #[serde(rename = "Avg CE")]
    pub avg_ce: Option<f64>,
    #[serde(rename = "Avg PE")]
    pub avg_pe: Option<f64>,
    #[serde(rename = "CE−PE")]
    pub ce_minus_pe: Option<f64>,
    #[serde(rename = "Norm CE")]
    pub ce_norm: Option<f64>,
    #[serde(rename = "Norm PE")]
    pub pe_norm: Option<f64>,
    #[serde(rename = "Norm Diff (CE−PE)")]
    pub diff_norm: Option<f64>,
}

/// A record with its display strings.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesRow {
    /// Full date-time display string.
    pub timestamp_display: String,
    /// Time-of-day display string.
    pub time_display: String,
    #[serde(flatten)]
    pub record: AggregateRecord,
}

impl SeriesRow {
    /// Project onto the exported columns.
    pub fn export_row(&self) -> ExportRow {
        ExportRow {
            timestamp: self.timestamp_display.clone(),
            time: self.time_display.clone(),
            avg_ce: self.record.avg_ce,
            avg_pe: self.record.avg_pe,
            ce_minus_pe: self.record.ce_minus_pe,
            ce_norm: self.record.ce_norm,
            pe_norm: self.record.pe_norm,
            diff_norm: self.record.diff_norm,
        }
    }
}

/// Time-ordered result table.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Series {
    rows: Vec<SeriesRow>,
}

impl Series {
    pub fn rows(&self) -> &[SeriesRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Records in time order.
    pub fn records(&self) -> impl Iterator<Item = &AggregateRecord> {
        self.rows.iter().map(|r| &r.record)
    }

    /// The in-memory table with exported columns.
    pub fn table(&self) -> Vec<ExportRow> {
        self.rows.iter().map(SeriesRow::export_row).collect()
    }

    /// Write the table as CSV, header first.
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<()> {
        let mut csv_writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(writer);
        // Explicit header so an empty table still has one.
        csv_writer.write_record(COLUMNS)?;
        for row in &self.rows {
            csv_writer.serialize(row.export_row())?;
        }
        csv_writer.flush()?;
        Ok(())
    }

    /// Serialize the table to CSV text.
    pub fn to_csv(&self) -> Result<String> {
        let mut buf = Vec::new();
        self.write_csv(&mut buf)?;
        String::from_utf8(buf).map_err(|e| Error::data(format!("CSV output is not UTF-8: {}", e)))
    }
}

/// Read an exported table back.
pub fn parse_csv(text: &str) -> Result<Vec<ExportRow>> {
    let mut reader = csv::Reader::from_reader(text.as_bytes());

    let headers = reader.headers()?;
    if headers.iter().ne(COLUMNS.iter().copied()) {
        return Err(Error::data(format!(
            "unexpected columns: {:?}",
            headers.iter().collect::<Vec<_>>()
        )));
    }

    let rows = reader
        .deserialize()
        .collect::<std::result::Result<Vec<ExportRow>, _>>()?;
    Ok(rows)
}

/// Check that a chrono format string is valid.
fn validate_format(format: &str) -> Result<()> {
    if StrftimeItems::new(format).any(|item| matches!(item, Item::Error)) {
        return Err(Error::config(format!("invalid time format '{}'", format)));
    }
    Ok(())
}

/// Orders records and attaches display strings.
#[derive(Debug, Clone)]
pub struct SeriesAssembler {
    datetime_format: String,
    time_format: String,
}

impl SeriesAssembler {
    /// Create an assembler; fails on invalid display formats.
    pub fn new(config: &OutputConfig) -> Result<Self> {
        validate_format(&config.datetime_format)?;
        validate_format(&config.time_format)?;
        Ok(Self {
            datetime_format: config.datetime_format.clone(),
            time_format: config.time_format.clone(),
        })
    }

    /// Sort by timestamp (stable, so equal timestamps keep input order) and format.
    pub fn assemble(&self, mut records: Vec<AggregateRecord>) -> Series {
        records.sort_by_key(|r| r.timestamp);

        let rows = records
            .into_iter()
            .map(|record| SeriesRow {
                timestamp_display: record.timestamp.format(&self.datetime_format).to_string(),
                time_display: record.timestamp.format(&self.time_format).to_string(),
                record,
            })
            .collect();

        Series { rows }
    }
}

impl Default for SeriesAssembler {
    fn default() -> Self {
        let config = OutputConfig::default();
        Self {
            datetime_format: config.datetime_format,
            time_format: config.time_format,
        }
    }
}
