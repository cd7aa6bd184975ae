//! Capture timestamp resolution from filenames.
//!
//! Option-chain exports are named `<anything>_DDMMYYYY_HHMMSS.csv`. The last
//! two `_`-separated tokens of the name (extension stripped) carry the
//! capture time. Names that do not match fall back to the wall clock, sampled
//! per call, and are tagged as such.

use chrono::{Local, NaiveDateTime};
use tracing::debug;

use cepe_core::config::ResolverConfig;
use cepe_core::ResolvedTimestamp;

/// Source of "now" for the fallback path.
pub trait Clock {
    fn now(&self) -> NaiveDateTime;
}

/// Local wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// Always returns the same instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub NaiveDateTime);

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        self.0
    }
}

/// Resolves a filename into a tagged capture timestamp. Never fails.
#[derive(Debug, Clone)]
pub struct TimestampResolver<C: Clock = SystemClock> {
    extension: String,
    format: String,
    clock: C,
}

impl TimestampResolver<SystemClock> {
    /// Create a resolver using the system clock for fallbacks.
    pub fn new(config: &ResolverConfig) -> Self {
        Self::with_clock(config, SystemClock)
    }
}

impl Default for TimestampResolver<SystemClock> {
    fn default() -> Self {
        Self::new(&ResolverConfig::default())
    }
}

impl<C: Clock> TimestampResolver<C> {
    /// Create a resolver with a custom fallback clock.
    pub fn with_clock(config: &ResolverConfig, clock: C) -> Self {
        Self {
            extension: config.extension.clone(),
            format: config.timestamp_format.clone(),
            clock,
        }
    }

    /// Resolve the capture time of `filename`.
    pub fn resolve(&self, filename: &str) -> ResolvedTimestamp {
        match self.parse_filename(filename) {
            Some(time) => ResolvedTimestamp::parsed(time),
            None => {
                let now = self.clock.now();
                debug!(filename, %now, "filename timestamp not recognised, using clock");
                ResolvedTimestamp::fallback(now)
            }
        }
    }

    /// Parse the timestamp embedded in `filename`, if any.
    pub fn parse_filename(&self, filename: &str) -> Option<NaiveDateTime> {
        // Only the last path component counts.
        let name = filename.rsplit(['/', '\\']).next().unwrap_or(filename);
        let base = name.strip_suffix(self.extension.as_str()).unwrap_or(name);

        let tokens: Vec<&str> = base.split('_').collect();
        if tokens.len() < 2 {
            return None;
        }
        let tail = format!("{}_{}", tokens[tokens.len() - 2], tokens[tokens.len() - 1]);

        NaiveDateTime::parse_from_str(&tail, &self.format).ok()
    }
}
