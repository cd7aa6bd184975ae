//! Option-chain CSV loading.
//!
//! Turns raw upload bytes into [`Snapshot`]s. A file that cannot be used is
//! skipped with a [`Warning`]; loading never fails the batch. Column
//! presence is recorded but not enforced here, since which columns are
//! required depends on whether the file ends up as the reference snapshot.

use std::collections::HashMap;

use csv::StringRecord;
use ordered_float::OrderedFloat;
use tracing::{debug, info, warn};

use cepe_core::config::ResolverConfig;
use cepe_core::{
    ColumnSet, InputFile, OptionRow, Snapshot, Warning, WarningKind, CE_PRICE_COLUMN,
    OPEN_INTEREST_COLUMN, PE_PRICE_COLUMN, STRIKE_COLUMN,
};

use crate::timestamp::{Clock, SystemClock, TimestampResolver};

/// Result of loading one file.
#[derive(Debug, Clone)]
pub enum LoadOutcome {
    Loaded(Snapshot),
    Skipped(Warning),
}

/// All snapshots of a batch, in upload order, plus what went wrong.
#[derive(Debug, Clone, Default)]
pub struct LoadedBatch {
    /// Valid snapshots in upload order.
    pub snapshots: Vec<Snapshot>,
    /// Skips and degradations, in upload order.
    pub warnings: Vec<Warning>,
    /// Number of files handed to the loader.
    pub files_received: usize,
    /// Data rows across all valid snapshots.
    pub total_rows: usize,
}

impl LoadedBatch {
    /// Number of files that produced a snapshot.
    pub fn files_loaded(&self) -> usize {
        self.snapshots.len()
    }
}

/// Positions of the recognised columns in a header row.
#[derive(Debug, Clone, Copy, Default)]
struct ColumnIndex {
    strike: Option<usize>,
    open_interest: Option<usize>,
    ce_price: Option<usize>,
    pe_price: Option<usize>,
}

impl ColumnIndex {
    fn from_headers(headers: &StringRecord) -> Self {
        let mut map: HashMap<&str, usize> = HashMap::new();
        for (idx, name) in headers.iter().enumerate() {
            // Spreadsheet exports often prefix the first header with a BOM.
            let name = name.trim().trim_start_matches('\u{feff}');
            map.entry(name).or_insert(idx);
        }

        Self {
            strike: map.get(STRIKE_COLUMN).copied(),
            open_interest: map.get(OPEN_INTEREST_COLUMN).copied(),
            ce_price: map.get(CE_PRICE_COLUMN).copied(),
            pe_price: map.get(PE_PRICE_COLUMN).copied(),
        }
    }

    fn columns(&self) -> ColumnSet {
        ColumnSet {
            strike: self.strike.is_some(),
            open_interest: self.open_interest.is_some(),
            ce_price: self.ce_price.is_some(),
            pe_price: self.pe_price.is_some(),
        }
    }

    fn row(&self, record: &StringRecord) -> OptionRow {
        let number = |idx: Option<usize>| idx.and_then(|i| record.get(i)).and_then(parse_number);

        OptionRow {
            strike: number(self.strike).map(OrderedFloat),
            ce_open_interest: number(self.open_interest),
            ce_last_price: number(self.ce_price),
            pe_last_price: number(self.pe_price),
        }
    }
}

/// Parse a numeric cell. Blank, non-numeric and non-finite cells are missing.
fn parse_number(field: &str) -> Option<f64> {
    field.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Parse CSV bytes into the recognised columns and rows.
fn parse_rows(bytes: &[u8]) -> Result<(ColumnSet, Vec<OptionRow>), String> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(bytes);

    let headers = reader.headers().map_err(|e| e.to_string())?.clone();
    let index = ColumnIndex::from_headers(&headers);

    let mut rows = Vec::new();
    for (idx, result) in reader.records().enumerate() {
        let record = result.map_err(|e| e.to_string())?;
        // Short records are padded with missing values; long ones are malformed.
        if record.len() > headers.len() {
            return Err(format!(
                "record {} has {} fields, header has {}",
                idx + 1,
                record.len(),
                headers.len()
            ));
        }
        rows.push(index.row(&record));
    }

    Ok((index.columns(), rows))
}

/// Loads option-chain snapshots from raw file contents.
#[derive(Debug, Clone)]
pub struct SnapshotLoader<C: Clock = SystemClock> {
    resolver: TimestampResolver<C>,
}

impl SnapshotLoader<SystemClock> {
    /// Create a loader resolving timestamps with the system clock fallback.
    pub fn new(config: &ResolverConfig) -> Self {
        Self::with_resolver(TimestampResolver::new(config))
    }
}

impl Default for SnapshotLoader<SystemClock> {
    fn default() -> Self {
        Self::new(&ResolverConfig::default())
    }
}

impl<C: Clock> SnapshotLoader<C> {
    /// Create a loader around an existing resolver.
    pub fn with_resolver(resolver: TimestampResolver<C>) -> Self {
        Self { resolver }
    }

    /// The timestamp resolver in use.
    pub fn resolver(&self) -> &TimestampResolver<C> {
        &self.resolver
    }

    /// Validate and parse one file.
    pub fn load(&self, filename: &str, bytes: &[u8]) -> LoadOutcome {
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return LoadOutcome::Skipped(Warning::new(filename, WarningKind::EmptyFile));
        }

        let (columns, rows) = match parse_rows(bytes) {
            Ok(parsed) => parsed,
            Err(reason) => {
                return LoadOutcome::Skipped(Warning::new(filename, WarningKind::Unparsable(reason)));
            }
        };

        if rows.is_empty() {
            return LoadOutcome::Skipped(Warning::new(filename, WarningKind::NoRows));
        }

        let timestamp = self.resolver.resolve(filename);
        debug!(
            filename,
            rows = rows.len(),
            time = %timestamp.time,
            fallback = timestamp.is_fallback(),
            "loaded snapshot"
        );

        LoadOutcome::Loaded(Snapshot {
            filename: filename.to_string(),
            timestamp,
            columns,
            rows,
        })
    }

    /// Load every file in upload order.
    ///
    /// Snapshots keep upload order. Each skipped file and each file whose
    /// timestamp fell back to the clock gets a warning naming it.
    pub fn load_batch(&self, files: &[InputFile]) -> LoadedBatch {
        let mut batch = LoadedBatch {
            files_received: files.len(),
            ..LoadedBatch::default()
        };

        for file in files {
            match self.load(&file.filename, &file.bytes) {
                LoadOutcome::Loaded(snapshot) => {
                    if snapshot.timestamp.is_fallback() {
                        let warning = Warning::new(&snapshot.filename, WarningKind::TimestampFallback);
                        warn!("{}", warning);
                        batch.warnings.push(warning);
                    }
                    batch.total_rows += snapshot.len();
                    batch.snapshots.push(snapshot);
                }
                LoadOutcome::Skipped(warning) => {
                    warn!("{}", warning);
                    batch.warnings.push(warning);
                }
            }
        }

        info!(
            received = batch.files_received,
            loaded = batch.files_loaded(),
            rows = batch.total_rows,
            "loaded {} file(s), {} rows total",
            batch.files_loaded(),
            batch.total_rows
        );
        batch
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timestamp::FixedClock;
    use approx::assert_relative_eq;
    use cepe_core::TimestampSource;
    use chrono::NaiveDate;

    const CHAIN: &str = "\
CE_strikePrice,CE_openInterest,CE_lastPrice,PE_lastPrice,PE_openInterest
100,50,12.5,3.0,10
200,80,8.0,6.5,20
300,80,,9.25,30
";

    fn loader() -> SnapshotLoader<FixedClock> {
        let now = NaiveDate::from_ymd_opt(2030, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        SnapshotLoader::with_resolver(TimestampResolver::with_clock(
            &ResolverConfig::default(),
            FixedClock(now),
        ))
    }

    fn expect_loaded(outcome: LoadOutcome) -> Snapshot {
        match outcome {
            LoadOutcome::Loaded(snapshot) => snapshot,
            LoadOutcome::Skipped(w) => panic!("expected snapshot, got warning: {}", w),
        }
    }

    fn expect_skipped(outcome: LoadOutcome) -> WarningKind {
        match outcome {
            LoadOutcome::Skipped(w) => w.kind,
            LoadOutcome::Loaded(s) => panic!("expected skip, got snapshot {}", s.filename),
        }
    }

    #[test]
    fn test_load_valid_file() {
        let snapshot = expect_loaded(loader().load("nifty_01012024_093000.csv", CHAIN.as_bytes()));

        assert_eq!(snapshot.len(), 3);
        assert_eq!(snapshot.columns, ColumnSet::all());
        assert_eq!(snapshot.timestamp.source, TimestampSource::Parsed);
        assert_eq!(snapshot.rows[0].strike, Some(OrderedFloat(100.0)));
        assert_relative_eq!(snapshot.rows[0].ce_last_price.unwrap(), 12.5);
        assert_relative_eq!(snapshot.rows[2].pe_last_price.unwrap(), 9.25);
        assert_eq!(snapshot.rows[2].ce_last_price, None);
    }

    #[test]
    fn test_empty_and_whitespace_skipped() {
        let loader = loader();
        assert_eq!(expect_skipped(loader.load("a.csv", b"")), WarningKind::EmptyFile);
        assert_eq!(expect_skipped(loader.load("b.csv", b"  \n\t\r\n")), WarningKind::EmptyFile);
    }

    #[test]
    fn test_header_only_skipped() {
        let outcome = loader().load("a.csv", b"CE_strikePrice,CE_openInterest\n");
        assert_eq!(expect_skipped(outcome), WarningKind::NoRows);
    }

    #[test]
    fn test_too_many_fields_unparsable() {
        let outcome = loader().load("a.csv", b"CE_strikePrice,CE_openInterest\n100,5,extra\n");
        assert!(matches!(expect_skipped(outcome), WarningKind::Unparsable(_)));
    }

    #[test]
    fn test_invalid_utf8_unparsable() {
        let outcome = loader().load("a.csv", b"CE_strikePrice\n\xff\xfe\n");
        assert!(matches!(expect_skipped(outcome), WarningKind::Unparsable(_)));
    }

    #[test]
    fn test_short_record_padded() {
        let data = "CE_strikePrice,CE_openInterest,CE_lastPrice,PE_lastPrice\n100,5\n";
        let snapshot = expect_loaded(loader().load("a_01012024_093000.csv", data.as_bytes()));
        assert_eq!(snapshot.rows[0].strike, Some(OrderedFloat(100.0)));
        assert_eq!(snapshot.rows[0].ce_last_price, None);
        assert_eq!(snapshot.rows[0].pe_last_price, None);
    }

    #[test]
    fn test_missing_columns_recorded() {
        let data = "CE_strikePrice,CE_lastPrice\n100,4.5\n";
        let snapshot = expect_loaded(loader().load("a_01012024_093000.csv", data.as_bytes()));
        assert!(snapshot.columns.strike);
        assert!(!snapshot.columns.open_interest);
        assert!(!snapshot.columns.pe_price);
        assert_eq!(snapshot.columns.missing_for_selection(), Some(OPEN_INTEREST_COLUMN));
    }

    #[test]
    fn test_bom_and_padding_in_headers() {
        let data = "\u{feff}CE_strikePrice , CE_openInterest,CE_lastPrice,PE_lastPrice\n 100 , 7 ,1,2\n";
        let snapshot = expect_loaded(loader().load("a_01012024_093000.csv", data.as_bytes()));
        assert_eq!(snapshot.columns, ColumnSet::all());
        assert_eq!(snapshot.rows[0].strike, Some(OrderedFloat(100.0)));
        assert_eq!(snapshot.rows[0].ce_open_interest, Some(7.0));
    }

    #[test]
    fn test_non_numeric_cells_missing() {
        let data = "CE_strikePrice,CE_openInterest,CE_lastPrice,PE_lastPrice\n100,-,NaN,inf\n";
        let snapshot = expect_loaded(loader().load("a_01012024_093000.csv", data.as_bytes()));
        assert_eq!(snapshot.rows[0].ce_open_interest, None);
        assert_eq!(snapshot.rows[0].ce_last_price, None);
        assert_eq!(snapshot.rows[0].pe_last_price, None);
    }

    #[test]
    fn test_batch_keeps_upload_order_and_warnings() {
        let files = vec![
            InputFile::new("late_01012024_150000.csv", CHAIN),
            InputFile::new("empty.csv", ""),
            InputFile::new("undated.csv", CHAIN),
            InputFile::new("early_01012024_090000.csv", CHAIN),
        ];

        let batch = loader().load_batch(&files);

        assert_eq!(batch.files_received, 4);
        assert_eq!(batch.files_loaded(), 3);
        assert_eq!(batch.total_rows, 9);
        let names: Vec<_> = batch.snapshots.iter().map(|s| s.filename.as_str()).collect();
        assert_eq!(
            names,
            vec!["late_01012024_150000.csv", "undated.csv", "early_01012024_090000.csv"]
        );

        assert_eq!(batch.warnings.len(), 2);
        assert_eq!(batch.warnings[0], Warning::new("empty.csv", WarningKind::EmptyFile));
        assert_eq!(
            batch.warnings[1],
            Warning::new("undated.csv", WarningKind::TimestampFallback)
        );
    }

    #[test]
    fn test_batch_all_empty() {
        let files = vec![InputFile::new("a.csv", ""), InputFile::new("b.csv", " ")];
        let batch = loader().load_batch(&files);
        assert!(batch.snapshots.is_empty());
        assert_eq!(batch.warnings.len(), 2);
        assert!(batch.warnings.iter().all(|w| w.kind.excludes_file()));
    }
}
