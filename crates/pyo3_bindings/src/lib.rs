//! PyO3 bindings for the CE/PE comparison pipeline.
//!
//! Exposes the batch comparison to Python front ends:
//! - `compare_files` runs the whole pipeline over uploaded files
//! - result rows, per-file warnings and the CSV export as Python objects

use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;

use cepe_core::{
    config::ChartType, Config as RustConfig, Error as RustError, Warning as RustWarning,
    InputFile,
};
use cepe_report::{ComparisonPipeline, ComparisonReport as RustReport, SeriesRow as RustSeriesRow};

fn to_py_err(err: RustError) -> PyErr {
    PyValueError::new_err(err.to_string())
}

// ============================================================================
// Python-exposed Types
// ============================================================================

/// One row of the comparison table.
#[pyclass]
#[derive(Clone)]
pub struct SeriesRow {
    #[pyo3(get)]
    pub filename: String,
    #[pyo3(get)]
    pub timestamp: String,
    #[pyo3(get)]
    pub time: String,
    #[pyo3(get)]
    pub timestamp_fallback: bool,
    #[pyo3(get)]
    pub avg_ce: Option<f64>,
    #[pyo3(get)]
    pub avg_pe: Option<f64>,
    #[pyo3(get)]
    pub ce_minus_pe: Option<f64>,
    #[pyo3(get)]
    pub ce_norm: Option<f64>,
    #[pyo3(get)]
    pub pe_norm: Option<f64>,
    #[pyo3(get)]
    pub diff_norm: Option<f64>,
}

#[pymethods]
impl SeriesRow {
    fn __repr__(&self) -> String {
        format!(
            "SeriesRow(timestamp='{}', avg_ce={:?}, avg_pe={:?}, diff_norm={:?})",
            self.timestamp, self.avg_ce, self.avg_pe, self.diff_norm
        )
    }
}

impl From<&RustSeriesRow> for SeriesRow {
    fn from(row: &RustSeriesRow) -> Self {
        let r = &row.record;
        SeriesRow {
            filename: r.filename.clone(),
            timestamp: row.timestamp_display.clone(),
            time: row.time_display.clone(),
            timestamp_fallback: r.timestamp_source == cepe_core::TimestampSource::Fallback,
            avg_ce: r.avg_ce,
            avg_pe: r.avg_pe,
            ce_minus_pe: r.ce_minus_pe,
            ce_norm: r.ce_norm,
            pe_norm: r.pe_norm,
            diff_norm: r.diff_norm,
        }
    }
}

/// A per-file warning.
#[pyclass]
#[derive(Clone)]
pub struct FileWarning {
    #[pyo3(get)]
    pub filename: String,
    #[pyo3(get)]
    pub kind: String,
    #[pyo3(get)]
    pub message: String,
    #[pyo3(get)]
    pub excluded: bool,
}

#[pymethods]
impl FileWarning {
    fn __repr__(&self) -> String {
        format!("FileWarning(filename='{}', kind='{}')", self.filename, self.kind)
    }

    fn __str__(&self) -> String {
        format!("{}: {}", self.filename, self.message)
    }
}

impl From<&RustWarning> for FileWarning {
    fn from(w: &RustWarning) -> Self {
        FileWarning {
            filename: w.filename.clone(),
            kind: w.kind.code().to_string(),
            message: w.kind.to_string(),
            excluded: w.kind.excludes_file(),
        }
    }
}

/// Finished comparison for one batch.
#[pyclass]
#[derive(Clone)]
pub struct ComparisonResult {
    #[pyo3(get)]
    pub rows: Vec<SeriesRow>,
    #[pyo3(get)]
    pub warnings: Vec<FileWarning>,
    #[pyo3(get)]
    pub reference_file: String,
    #[pyo3(get)]
    pub reference_strikes: Vec<f64>,
    #[pyo3(get)]
    pub files_received: usize,
    #[pyo3(get)]
    pub files_loaded: usize,
    #[pyo3(get)]
    pub total_rows: usize,
    #[pyo3(get)]
    pub chart_type: String,
    #[pyo3(get)]
    pub export_filename: String,
    #[pyo3(get)]
    pub csv: String,
}

#[pymethods]
impl ComparisonResult {
    /// Exported column names, in order.
    #[staticmethod]
    fn columns() -> Vec<&'static str> {
        cepe_report::COLUMNS.to_vec()
    }

    fn __len__(&self) -> usize {
        self.rows.len()
    }

    fn __repr__(&self) -> String {
        format!(
            "ComparisonResult(rows={}, warnings={}, reference_strikes={:?})",
            self.rows.len(),
            self.warnings.len(),
            self.reference_strikes
        )
    }
}

impl TryFrom<&RustReport> for ComparisonResult {
    type Error = RustError;

    fn try_from(report: &RustReport) -> Result<Self, Self::Error> {
        Ok(ComparisonResult {
            rows: report.series.rows().iter().map(SeriesRow::from).collect(),
            warnings: report.warnings.iter().map(FileWarning::from).collect(),
            reference_file: report.reference.source_filename.clone(),
            reference_strikes: report.reference.values(),
            files_received: report.stats.files_received,
            files_loaded: report.stats.files_loaded,
            total_rows: report.stats.total_rows,
            chart_type: report.chart_type.as_str().to_string(),
            export_filename: report.export_filename.clone(),
            csv: report.to_csv()?,
        })
    }
}

// ============================================================================
// Python-exposed Functions
// ============================================================================

/// Compare average CE/PE prices across uploaded option-chain files.
///
/// `files` is a list of `(filename, bytes)` in upload order. Raises
/// `ValueError` when the batch cannot produce any output.
#[pyfunction]
#[pyo3(signature = (files, num_strikes=6, chart_type="line"))]
fn compare_files(
    files: Vec<(String, Vec<u8>)>,
    num_strikes: usize,
    chart_type: &str,
) -> PyResult<ComparisonResult> {
    let mut config = RustConfig::default();
    config.selection.num_strikes = num_strikes;
    config.output.chart_type = chart_type.parse::<ChartType>().map_err(to_py_err)?;

    let inputs: Vec<InputFile> = files
        .into_iter()
        .map(|(filename, bytes)| InputFile::new(filename, bytes))
        .collect();

    let pipeline = ComparisonPipeline::new(&config).map_err(to_py_err)?;
    let report = pipeline.run(&inputs).map_err(to_py_err)?;
    ComparisonResult::try_from(&report).map_err(to_py_err)
}

/// Parse an exported comparison CSV back into rows of floats.
///
/// Returns `(timestamp, time, [avg_ce, avg_pe, ce_minus_pe, ce_norm, pe_norm, diff_norm])`.
#[pyfunction]
fn parse_export(text: &str) -> PyResult<Vec<(String, String, Vec<Option<f64>>)>> {
    let rows = cepe_report::parse_csv(text).map_err(to_py_err)?;
    Ok(rows
        .into_iter()
        .map(|r| {
            (
                r.timestamp,
                r.time,
                vec![r.avg_ce, r.avg_pe, r.ce_minus_pe, r.ce_norm, r.pe_norm, r.diff_norm],
            )
        })
        .collect())
}

// ============================================================================
// Module Definition
// ============================================================================

/// CE/PE comparison - Rust pipeline for Python front ends.
#[pymodule]
fn cepe_compare(m: &Bound<'_, PyModule>) -> PyResult<()> {
    // Types
    m.add_class::<SeriesRow>()?;
    m.add_class::<FileWarning>()?;
    m.add_class::<ComparisonResult>()?;

    // Functions
    m.add_function(wrap_pyfunction!(compare_files, m)?)?;
    m.add_function(wrap_pyfunction!(parse_export, m)?)?;

    Ok(())
}
