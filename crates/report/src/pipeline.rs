//! End-to-end comparison pipeline.
//!
//! One forward pass over a batch of uploads:
//! load → select reference strikes → average per snapshot → normalize →
//! assemble. Per-file problems become warnings; structural problems abort
//! the batch with no partial output.

use serde::Serialize;
use tracing::{info, warn};

use cepe_core::config::{ChartType, Config};
use cepe_core::{
    Error, InputFile, ReferenceStrikeSet, Result, Warning, WarningKind, CE_PRICE_COLUMN,
    PE_PRICE_COLUMN,
};
use cepe_features::{AverageComputer, NormalizationSummary, Normalizer, TopStrikeSelector};
use cepe_ingestion::{Clock, SnapshotLoader, SystemClock, TimestampResolver};

use crate::assembler::{Series, SeriesAssembler};

/// Batch counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchStats {
    /// Files handed to the pipeline.
    pub files_received: usize,
    /// Files that parsed into a snapshot.
    pub files_loaded: usize,
    /// Data rows across loaded files.
    pub total_rows: usize,
    /// Records in the final series.
    pub records: usize,
}

/// Finished comparison for one batch.
#[derive(Debug, Clone, Serialize)]
pub struct ComparisonReport {
    /// Time-ordered result table.
    pub series: Series,
    /// Strikes the averages were computed over.
    pub reference: ReferenceStrikeSet,
    /// Per-file warnings in upload order.
    pub warnings: Vec<Warning>,
    pub stats: BatchStats,
    /// Moments used for the z-scores.
    pub normalization: NormalizationSummary,
    /// Chart style for the renderer.
    pub chart_type: ChartType,
    /// Suggested export filename.
    pub export_filename: String,
}

impl ComparisonReport {
    /// The result table as CSV text.
    pub fn to_csv(&self) -> Result<String> {
        self.series.to_csv()
    }
}

/// Runs the comparison over a batch of uploaded files.
#[derive(Debug, Clone)]
pub struct ComparisonPipeline<C: Clock = SystemClock> {
    loader: SnapshotLoader<C>,
    selector: TopStrikeSelector,
    normalizer: Normalizer,
    assembler: SeriesAssembler,
    chart_type: ChartType,
    export_filename: String,
}

impl ComparisonPipeline<SystemClock> {
    /// Create a pipeline from configuration.
    pub fn new(config: &Config) -> Result<Self> {
        Self::with_clock(config, SystemClock)
    }
}

impl<C: Clock> ComparisonPipeline<C> {
    /// Create a pipeline whose filename-timestamp fallback reads `clock`.
    pub fn with_clock(config: &Config, clock: C) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            loader: SnapshotLoader::with_resolver(TimestampResolver::with_clock(&config.resolver, clock)),
            selector: TopStrikeSelector::from_config(&config.selection)?,
            normalizer: Normalizer::new(),
            assembler: SeriesAssembler::new(&config.output)?,
            chart_type: config.output.chart_type,
            export_filename: config.output.export_filename.clone(),
        })
    }

    /// Run the batch. `files` must be in upload order.
    pub fn run(&self, files: &[InputFile]) -> Result<ComparisonReport> {
        let batch = self.loader.load_batch(files);
        let mut warnings = batch.warnings;

        // The first loaded file in upload order is the reference, regardless of time.
        let reference = batch
            .snapshots
            .first()
            .ok_or(Error::NoValidFiles(files.len()))?;
        let strikes = self.selector.select(reference)?;
        info!(
            reference = %strikes.source_filename,
            strikes = ?strikes.values(),
            "top {} strikes from reference file",
            strikes.len()
        );

        let computer = AverageComputer::new(&strikes);
        let mut records = Vec::with_capacity(batch.snapshots.len());

        for snapshot in &batch.snapshots {
            let Some(record) = computer.aggregate(snapshot) else {
                let warning = Warning::new(&snapshot.filename, WarningKind::NoMatchingStrikes);
                warn!("{}", warning);
                warnings.push(warning);
                continue;
            };

            for (present, column) in [
                (snapshot.columns.ce_price, CE_PRICE_COLUMN),
                (snapshot.columns.pe_price, PE_PRICE_COLUMN),
            ] {
                if !present {
                    let warning = Warning::new(
                        &snapshot.filename,
                        WarningKind::MissingPriceColumn(column.to_string()),
                    );
                    warn!("{}", warning);
                    warnings.push(warning);
                }
            }
            records.push(record);
        }

        if records.is_empty() {
            return Err(Error::NoRecords(batch.snapshots.len()));
        }

        let normalization = self.normalizer.normalize(&mut records);
        let series = self.assembler.assemble(records);

        let stats = BatchStats {
            files_received: batch.files_received,
            files_loaded: batch.snapshots.len(),
            total_rows: batch.total_rows,
            records: series.len(),
        };
        info!(
            received = stats.files_received,
            loaded = stats.files_loaded,
            records = stats.records,
            warnings = warnings.len(),
            "comparison complete"
        );

        Ok(ComparisonReport {
            series,
            reference: strikes,
            warnings,
            stats,
            normalization,
            chart_type: self.chart_type,
            export_filename: self.export_filename.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembler::parse_csv;
    use approx::{assert_abs_diff_eq, assert_relative_eq};
    use cepe_core::TimestampSource;
    use cepe_ingestion::FixedClock;
    use chrono::NaiveDate;

    const HEADER: &str = "CE_strikePrice,CE_openInterest,CE_lastPrice,PE_lastPrice";

    fn chain(rows: &[(f64, f64, &str, &str)]) -> String {
        let mut out = String::from(HEADER);
        out.push('\n');
        for (strike, oi, ce, pe) in rows {
            out.push_str(&format!("{},{},{},{}\n", strike, oi, ce, pe));
        }
        out
    }

    fn pipeline(num_strikes: usize) -> ComparisonPipeline<FixedClock> {
        let mut config = Config::default();
        config.selection.num_strikes = num_strikes;
        let now = NaiveDate::from_ymd_opt(2030, 1, 1)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();
        ComparisonPipeline::with_clock(&config, FixedClock(now)).unwrap()
    }

    /// Three snapshots uploaded out of time order with CE averages 30, 10, 20
    /// and PE averages 6, 5, 5.
    fn three_files() -> Vec<InputFile> {
        let late = chain(&[
            (100.0, 50.0, "1000", "1"),
            (200.0, 80.0, "30", "4"),
            (300.0, 80.0, "30", "8"),
        ]);
        let early = chain(&[(200.0, 1.0, "10", "5"), (300.0, 999.0, "10", "5"), (400.0, 5000.0, "7", "7")]);
        let mid = chain(&[(300.0, 1.0, "25", "5"), (200.0, 1.0, "15", "")]);
        vec![
            InputFile::new("nifty_01012024_150000.csv", late),
            InputFile::new("nifty_01012024_090000.csv", early),
            InputFile::new("nifty_01012024_120000.csv", mid),
        ]
    }

    #[test]
    fn test_end_to_end() {
        let report = pipeline(2).run(&three_files()).unwrap();

        // Strikes come from the first upload (the latest in time).
        assert_eq!(report.reference.source_filename, "nifty_01012024_150000.csv");
        assert_eq!(report.reference.values(), vec![200.0, 300.0]);

        let records: Vec<_> = report.series.records().collect();
        let names: Vec<_> = records.iter().map(|r| r.filename.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "nifty_01012024_090000.csv",
                "nifty_01012024_120000.csv",
                "nifty_01012024_150000.csv"
            ]
        );

        let ce: Vec<f64> = records.iter().map(|r| r.avg_ce.unwrap()).collect();
        assert_eq!(ce, vec![10.0, 20.0, 30.0]);
        assert_eq!(records[1].avg_pe, Some(5.0));

        assert_abs_diff_eq!(records[0].ce_norm.unwrap(), -1.224744871391589, epsilon = 1e-9);
        assert_abs_diff_eq!(records[1].ce_norm.unwrap(), 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(records[2].ce_norm.unwrap(), 1.224744871391589, epsilon = 1e-9);
        for r in &records {
            assert_abs_diff_eq!(
                r.diff_norm.unwrap(),
                r.ce_norm.unwrap() - r.pe_norm.unwrap(),
                epsilon = 1e-12
            );
        }

        assert!(report.warnings.is_empty());
        assert_eq!(
            report.stats,
            BatchStats {
                files_received: 3,
                files_loaded: 3,
                total_rows: 8,
                records: 3
            }
        );
        assert_eq!(report.export_filename, "ce_pe_comparison.csv");

        let NormalizationSummary { ce, pe } = report.normalization;
        assert_eq!(ce.unwrap().count, 3);
        assert_relative_eq!(ce.unwrap().mean, 20.0);
        assert!(!pe.unwrap().is_degenerate());
    }

    #[test]
    fn test_csv_round_trip() {
        let report = pipeline(2).run(&three_files()).unwrap();
        let parsed = parse_csv(&report.to_csv().unwrap()).unwrap();
        assert_eq!(parsed, report.series.table());
        assert_eq!(parsed[0].timestamp, "2024-01-01 09:00:00");
        assert_eq!(parsed[2].time, "15:00:00");
    }

    #[test]
    fn test_all_empty_files_fatal() {
        let files = vec![InputFile::new("a.csv", ""), InputFile::new("b.csv", "\n\n")];
        let err = pipeline(6).run(&files).unwrap_err();
        assert!(matches!(err, Error::NoValidFiles(2)));
    }

    #[test]
    fn test_reference_is_first_valid_upload() {
        let mut files = three_files();
        files.insert(0, InputFile::new("broken.csv", "   "));
        let report = pipeline(2).run(&files).unwrap();

        assert_eq!(report.reference.source_filename, "nifty_01012024_150000.csv");
        assert_eq!(report.warnings, vec![Warning::new("broken.csv", WarningKind::EmptyFile)]);
        assert_eq!(report.stats.files_received, 4);
        assert_eq!(report.stats.files_loaded, 3);
    }

    #[test]
    fn test_reference_missing_columns_fatal() {
        let files = vec![
            InputFile::new("ref_01012024_090000.csv", "CE_strikePrice,CE_lastPrice\n100,1\n"),
            InputFile::new("other_01012024_100000.csv", chain(&[(100.0, 1.0, "1", "1")])),
        ];
        let err = pipeline(2).run(&files).unwrap_err();
        assert!(matches!(err, Error::MissingColumn { ref filename, .. } if filename == "ref_01012024_090000.csv"));
    }

    #[test]
    fn test_no_matching_snapshot_skipped() {
        let files = vec![
            InputFile::new("a_01012024_090000.csv", chain(&[(100.0, 1.0, "2", "1")])),
            InputFile::new("b_01012024_100000.csv", chain(&[(900.0, 1.0, "2", "1")])),
            InputFile::new("c_01012024_110000.csv", chain(&[(100.0, 1.0, "4", "3")])),
        ];
        let report = pipeline(1).run(&files).unwrap();

        assert_eq!(report.series.len(), 2);
        assert_eq!(
            report.warnings,
            vec![Warning::new("b_01012024_100000.csv", WarningKind::NoMatchingStrikes)]
        );
    }

    #[test]
    fn test_every_snapshot_excluded_fatal() {
        // The reference has no usable strike values, so nothing can match.
        let files = vec![
            InputFile::new("a_01012024_090000.csv", format!("{}\n-,1,2,3\n", HEADER)),
            InputFile::new("b_01012024_100000.csv", chain(&[(100.0, 1.0, "2", "1")])),
        ];
        let err = pipeline(3).run(&files).unwrap_err();
        assert!(matches!(err, Error::NoRecords(2)));
    }

    #[test]
    fn test_missing_price_column_degrades() {
        let files = vec![
            InputFile::new("a_01012024_090000.csv", chain(&[(100.0, 1.0, "2", "1")])),
            InputFile::new(
                "b_01012024_100000.csv",
                "CE_strikePrice,CE_openInterest,CE_lastPrice\n100,1,4\n",
            ),
        ];
        let report = pipeline(1).run(&files).unwrap();
        let records: Vec<_> = report.series.records().collect();

        assert_eq!(records[1].avg_ce, Some(4.0));
        assert_eq!(records[1].avg_pe, None);
        assert_eq!(records[1].ce_minus_pe, None);
        // Only one defined PE value: zero spread, undefined z-scores.
        assert!(records.iter().all(|r| r.pe_norm.is_none() && r.diff_norm.is_none()));
        assert_eq!(
            report.warnings,
            vec![Warning::new(
                "b_01012024_100000.csv",
                WarningKind::MissingPriceColumn(PE_PRICE_COLUMN.to_string())
            )]
        );
    }

    #[test]
    fn test_fallback_timestamp_recorded() {
        let files = vec![
            InputFile::new("a_01012024_090000.csv", chain(&[(100.0, 1.0, "2", "1")])),
            InputFile::new("latest.csv", chain(&[(100.0, 1.0, "4", "3")])),
        ];
        let report = pipeline(1).run(&files).unwrap();
        let records: Vec<_> = report.series.records().collect();

        assert_eq!(records[1].filename, "latest.csv");
        assert_eq!(records[1].timestamp_source, TimestampSource::Fallback);
        assert_eq!(
            report.warnings,
            vec![Warning::new("latest.csv", WarningKind::TimestampFallback)]
        );
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = Config::default();
        config.selection.num_strikes = 25;
        assert!(matches!(ComparisonPipeline::new(&config), Err(Error::Config(_))));
    }
}
