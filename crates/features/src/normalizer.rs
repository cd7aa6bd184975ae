//! Batch-wide z-score normalization.
//!
//! CE and PE averages are normalized independently using the population
//! mean and standard deviation of the whole batch; the normalized
//! difference is the difference of the two z-scores.

use serde::{Deserialize, Serialize};
use tracing::debug;

use cepe_core::AggregateRecord;

use crate::stats::population_moments;

/// Population moments of one field across a batch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeriesMoments {
    pub mean: f64,
    pub std_dev: f64,
    /// Number of defined values the moments were computed from.
    pub count: usize,
}

impl SeriesMoments {
    /// Moments of the defined values, or `None` if there are none.
    pub fn from_values(values: &[Option<f64>]) -> Option<Self> {
        let present: Vec<f64> = values.iter().flatten().copied().collect();
        let (mean, std_dev) = population_moments(&present)?;
        Some(Self {
            mean,
            std_dev,
            count: present.len(),
        })
    }

    /// Whether the values are all identical, making z-scores undefined.
    pub fn is_degenerate(&self) -> bool {
        self.std_dev == 0.0 || !self.std_dev.is_finite()
    }

    /// Z-score of `value`, undefined for a degenerate series.
    pub fn zscore(&self, value: f64) -> Option<f64> {
        if self.is_degenerate() {
            None
        } else {
            Some((value - self.mean) / self.std_dev)
        }
    }
}

/// Z-score every value against the population moments of the defined ones.
pub fn zscores(values: &[Option<f64>]) -> Vec<Option<f64>> {
    match SeriesMoments::from_values(values) {
        Some(moments) => values
            .iter()
            .map(|v| v.and_then(|x| moments.zscore(x)))
            .collect(),
        None => vec![None; values.len()],
    }
}

/// Fills the normalized fields of a batch of records.
#[derive(Debug, Clone, Copy, Default)]
pub struct Normalizer;

/// Moments used for the last normalization.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct NormalizationSummary {
    pub ce: Option<SeriesMoments>,
    pub pe: Option<SeriesMoments>,
}

impl Normalizer {
    pub fn new() -> Self {
        Self
    }

    /// Normalize `records` in place. Record order does not matter.
    pub fn normalize(&self, records: &mut [AggregateRecord]) -> NormalizationSummary {
        let ce: Vec<Option<f64>> = records.iter().map(|r| r.avg_ce).collect();
        let pe: Vec<Option<f64>> = records.iter().map(|r| r.avg_pe).collect();

        let summary = NormalizationSummary {
            ce: SeriesMoments::from_values(&ce),
            pe: SeriesMoments::from_values(&pe),
        };

        let ce_norm = zscores(&ce);
        let pe_norm = zscores(&pe);

        for ((record, ce), pe) in records.iter_mut().zip(ce_norm).zip(pe_norm) {
            record.ce_norm = ce;
            record.pe_norm = pe;
            record.diff_norm = match (ce, pe) {
                (Some(ce), Some(pe)) => Some(ce - pe),
                _ => None,
            };
        }

        debug!(
            records = records.len(),
            ce_degenerate = summary.ce.map_or(true, |m| m.is_degenerate()),
            pe_degenerate = summary.pe.map_or(true, |m| m.is_degenerate()),
            "normalized series"
        );
        summary
    }
}
