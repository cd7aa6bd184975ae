//! Compare average CE/PE prices across option-chain snapshots.
//!
//! # Default settings, CSV to stdout
//! cepe-compare data/nifty_01012024_093000.csv data/nifty_01012024_100000.csv
//!
//! # Top 10 strikes, JSON report to a file
//! cepe-compare -n 10 --format json -o report.json data/*.csv
//!
//! Files are processed in the order given; the first valid one supplies the
//! reference strikes.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use tracing::info;

use cepe_core::config::ChartType;
use cepe_core::{Config, InputFile};
use cepe_report::{ComparisonPipeline, ComparisonReport};

#[derive(Parser)]
#[command(name = "cepe-compare")]
#[command(about = "Compare average CE/PE prices across option-chain snapshots")]
#[command(version)]
struct Cli {
    /// Option-chain CSV files, in upload order
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// JSON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Number of top strikes by open interest (1-20)
    #[arg(short, long, value_parser = clap::value_parser!(u8).range(1..=20))]
    num_strikes: Option<u8>,

    /// Chart style recorded in the report
    #[arg(long, value_enum)]
    chart_type: Option<ChartArg>,

    /// Output file (defaults to stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Csv)]
    format: OutputFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ChartArg {
    Bar,
    Line,
}

impl From<ChartArg> for ChartType {
    fn from(arg: ChartArg) -> Self {
        match arg {
            ChartArg::Bar => ChartType::Bar,
            ChartArg::Line => ChartType::Line,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    /// Result table only
    Csv,
    /// Full report with warnings and reference strikes
    Json,
}

/// Config file (if any) with command-line overrides applied.
fn build_config(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::from_json_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => Config::default(),
    };
    if let Some(n) = cli.num_strikes {
        config.selection.num_strikes = n as usize;
    }
    if let Some(chart_type) = cli.chart_type {
        config.output.chart_type = chart_type.into();
    }
    config.validate()?;
    Ok(config)
}

/// Read every file in order. The upload name is the path's file name.
fn read_inputs(paths: &[PathBuf]) -> Result<Vec<InputFile>> {
    paths
        .iter()
        .map(|path| {
            let bytes = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
            let filename = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string());
            Ok(InputFile::new(filename, bytes))
        })
        .collect()
}

fn render(report: &ComparisonReport, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Csv => Ok(report.to_csv()?),
        OutputFormat::Json => Ok(serde_json::to_string_pretty(report)?),
    }
}

fn write_output(text: &str, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            fs::write(path, text).with_context(|| format!("writing {}", path.display()))
        }
        None => {
            print!("{}", text);
            Ok(())
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = build_config(&cli)?;
    let files = read_inputs(&cli.files)?;

    let pipeline = ComparisonPipeline::new(&config)?;
    let report = pipeline.run(&files)?;

    let text = render(&report, cli.format)?;
    write_output(&text, cli.output.as_deref())?;

    info!(
        records = report.stats.records,
        warnings = report.warnings.len(),
        "wrote {} record(s)",
        report.stats.records
    );
    Ok(())
}
