//! Configuration structures for the CE/PE comparison pipeline.

use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Smallest allowed reference strike set.
pub const MIN_STRIKES: usize = 1;
/// Largest allowed reference strike set.
pub const MAX_STRIKES: usize = 20;

/// Main configuration for a comparison run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Reference strike selection.
    pub selection: SelectionConfig,
    /// Filename timestamp resolution.
    pub resolver: ResolverConfig,
    /// Output formatting.
    pub output: OutputConfig,
}

impl Config {
    /// Parse a (possibly partial) JSON configuration. Missing fields take defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a JSON configuration file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<()> {
        let n = self.selection.num_strikes;
        if !(MIN_STRIKES..=MAX_STRIKES).contains(&n) {
            return Err(Error::config(format!(
                "num_strikes must be between {} and {}, got {}",
                MIN_STRIKES, MAX_STRIKES, n
            )));
        }
        if self.resolver.timestamp_format.is_empty() {
            return Err(Error::config("resolver.timestamp_format must not be empty"));
        }
        if self.output.datetime_format.is_empty() || self.output.time_format.is_empty() {
            return Err(Error::config("output display formats must not be empty"));
        }
        Ok(())
    }
}

/// Reference strike selection configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionConfig {
    /// Number of strikes (by open interest) kept from the reference file.
    pub num_strikes: usize,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self { num_strikes: 6 }
    }
}

/// Filename timestamp configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Suffix stripped before splitting the name.
    pub extension: String,
    /// chrono format of the last two `_`-separated tokens.
    pub timestamp_format: String,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            extension: ".csv".to_string(),
            timestamp_format: "%d%m%Y_%H%M%S".to_string(),
        }
    }
}

/// Chart style requested by the rendering side. Does not affect the numbers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartType {
    Bar,
    #[default]
    Line,
}

impl FromStr for ChartType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "bar" => Ok(Self::Bar),
            "line" => Ok(Self::Line),
            _ => Err(Error::config(format!("unknown chart type '{}'", s))),
        }
    }
}

impl ChartType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bar => "bar",
            Self::Line => "line",
        }
    }
}

/// Output formatting configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Chart style passed through to the renderer.
    pub chart_type: ChartType,
    /// Format of the `Timestamp` display column.
    pub datetime_format: String,
    /// Format of the `Time` display column.
    pub time_format: String,
    /// Suggested name for the exported CSV.
    pub export_filename: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            chart_type: ChartType::Line,
            datetime_format: "%Y-%m-%d %H:%M:%S".to_string(),
            time_format: "%H:%M:%S".to_string(),
            export_filename: "ce_pe_comparison.csv".to_string(),
        }
    }
}
