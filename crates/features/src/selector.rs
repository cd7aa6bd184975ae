//! Reference strike selection.
//!
//! Ranks the strikes of the reference snapshot by mean call open interest
//! and keeps the top N. The result is computed once per batch and applied
//! unchanged to every snapshot.

use std::cmp::Ordering;
use std::collections::HashMap;

use tracing::debug;

use cepe_core::config::{SelectionConfig, MAX_STRIKES, MIN_STRIKES};
use cepe_core::{Error, ReferenceStrikeSet, Result, Snapshot, Strike};

use crate::stats::mean_present;

/// A strike with its mean open interest in the reference snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct StrikeOpenInterest {
    pub strike: Strike,
    /// `None` when every open-interest cell for the strike is missing.
    pub mean_open_interest: Option<f64>,
}

/// Picks the N strikes with the highest mean open interest.
#[derive(Debug, Clone, Copy)]
pub struct TopStrikeSelector {
    num_strikes: usize,
}

impl TopStrikeSelector {
    /// Create a selector keeping `num_strikes` strikes (1 to 20).
    pub fn new(num_strikes: usize) -> Result<Self> {
        if !(MIN_STRIKES..=MAX_STRIKES).contains(&num_strikes) {
            return Err(Error::config(format!(
                "num_strikes must be between {} and {}, got {}",
                MIN_STRIKES, MAX_STRIKES, num_strikes
            )));
        }
        Ok(Self { num_strikes })
    }

    /// Create a selector from configuration.
    pub fn from_config(config: &SelectionConfig) -> Result<Self> {
        Self::new(config.num_strikes)
    }

    /// Configured set size.
    pub fn num_strikes(&self) -> usize {
        self.num_strikes
    }

    /// Rank every strike of `snapshot`, best first.
    ///
    /// Rows without a strike are ignored. Ties keep first-seen order, and
    /// strikes with undefined mean open interest rank last.
    pub fn rank(&self, snapshot: &Snapshot) -> Vec<StrikeOpenInterest> {
        let mut groups: Vec<(Strike, Vec<Option<f64>>)> = Vec::new();
        let mut index: HashMap<Strike, usize> = HashMap::new();

        for row in &snapshot.rows {
            let Some(strike) = row.strike else {
                continue;
            };
            let slot = *index.entry(strike).or_insert_with(|| {
                groups.push((strike, Vec::new()));
                groups.len() - 1
            });
            groups[slot].1.push(row.ce_open_interest);
        }

        let mut ranked: Vec<StrikeOpenInterest> = groups
            .into_iter()
            .map(|(strike, open_interest)| StrikeOpenInterest {
                strike,
                mean_open_interest: mean_present(open_interest),
            })
            .collect();

        // sort_by is stable, which gives the first-seen tie-break.
        ranked.sort_by(|a, b| match (a.mean_open_interest, b.mean_open_interest) {
            (Some(x), Some(y)) => y.total_cmp(&x),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        });
        ranked
    }

    /// Select the reference strike set from `reference`.
    ///
    /// Fails if the snapshot lacks the strike or open-interest column. Returns
    /// fewer than N strikes when the snapshot has fewer distinct strikes.
    pub fn select(&self, reference: &Snapshot) -> Result<ReferenceStrikeSet> {
        if let Some(column) = reference.columns.missing_for_selection() {
            return Err(Error::missing_column(&reference.filename, column));
        }

        let strikes: Vec<Strike> = self
            .rank(reference)
            .into_iter()
            .take(self.num_strikes)
            .map(|s| s.strike)
            .collect();

        debug!(
            reference = %reference.filename,
            requested = self.num_strikes,
            selected = strikes.len(),
            "selected reference strikes"
        );

        Ok(ReferenceStrikeSet {
            source_filename: reference.filename.clone(),
            strikes,
        })
    }
}
