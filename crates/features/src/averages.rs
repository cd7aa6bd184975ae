//! Per-snapshot CE/PE averages over the reference strikes.

use std::collections::HashSet;

use tracing::debug;

use cepe_core::{AggregateRecord, ReferenceStrikeSet, Snapshot, Strike};

use crate::stats::mean_present;

/// Computes mean CE/PE last prices restricted to a fixed strike set.
#[derive(Debug, Clone)]
pub struct AverageComputer {
    strikes: HashSet<Strike>,
}

impl AverageComputer {
    /// Create a computer for the given reference strikes.
    pub fn new(reference: &ReferenceStrikeSet) -> Self {
        Self {
            strikes: reference.strikes.iter().copied().collect(),
        }
    }

    /// Aggregate one snapshot.
    ///
    /// Returns `None` if no row matches the reference strikes. Missing prices
    /// are ignored; a side with no prices at all has an undefined average.
    pub fn aggregate(&self, snapshot: &Snapshot) -> Option<AggregateRecord> {
        let matched: Vec<_> = snapshot
            .rows
            .iter()
            .filter(|row| row.strike.is_some_and(|s| self.strikes.contains(&s)))
            .collect();

        if matched.is_empty() {
            debug!(filename = %snapshot.filename, "no rows match reference strikes");
            return None;
        }

        let avg_ce = mean_present(matched.iter().map(|row| row.ce_last_price));
        let avg_pe = mean_present(matched.iter().map(|row| row.pe_last_price));

        debug!(
            filename = %snapshot.filename,
            matched = matched.len(),
            ?avg_ce,
            ?avg_pe,
            "aggregated snapshot"
        );

        Some(AggregateRecord::new(
            &snapshot.filename,
            snapshot.timestamp,
            avg_ce,
            avg_pe,
        ))
    }
}
