//! Command-line argument definitions for the registration pipeline
//!
//! The CLI only maps arguments onto [`PipelineConfig`] and a requested
//! [`Period`]; all behaviour lives in the library.

use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::models::{DateRange, SourceEncoding, YearMonth};
use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// CLI arguments for the BEV registration pipeline
///
/// Downloads the authority's daily registration files, keeps the
/// battery-electric registrations and consolidates them into one CSV
/// dataset per month.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "ev_registrations",
    version,
    about = "Acquire daily vehicle registration files and consolidate monthly BEV datasets"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Commands {
    /// Download the daily files of a period into the data directory
    Fetch(FetchArgs),
    /// Consolidate downloaded files into monthly datasets
    Process(ProcessArgs),
    /// Fetch, then consolidate the months the period touches
    Run(RunArgs),
    /// Print the summary of consolidated monthly datasets
    Summary(SummaryArgs),
}

impl Commands {
    pub fn common(&self) -> &CommonArgs {
        match self {
            Commands::Fetch(args) => &args.common,
            Commands::Process(args) => &args.common,
            Commands::Run(args) => &args.common,
            Commands::Summary(args) => &args.common,
        }
    }
}

/// Options shared by every subcommand
#[derive(Debug, Clone, Parser)]
pub struct CommonArgs {
    /// Directory holding the raw daily files
    #[arg(long = "data-dir", value_name = "PATH")]
    pub data_dir: Option<PathBuf>,

    /// Directory holding the monthly datasets
    #[arg(long = "output-dir", value_name = "PATH")]
    pub output_dir: Option<PathBuf>,

    /// Concurrency budget for fetches and month consolidations
    #[arg(short = 'j', long = "workers", value_name = "COUNT")]
    pub workers: Option<usize>,

    /// Show progress bars
    #[arg(long = "progress")]
    pub progress: bool,

    #[arg(
        short = 'v',
        long = "verbose",
        action = clap::ArgAction::Count,
        help = "Increase logging verbosity (-v: info, -vv: debug, -vvv: trace)"
    )]
    pub verbose: u8,

    /// Only show errors
    #[arg(short = 'q', long = "quiet", conflicts_with = "verbose")]
    pub quiet: bool,
}

impl CommonArgs {
    pub fn log_level(&self) -> &'static str {
        if self.quiet {
            return "error";
        }
        match self.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    }

    fn apply(&self, mut config: PipelineConfig) -> PipelineConfig {
        if let Some(ref data_dir) = self.data_dir {
            config = config.with_data_dir(data_dir.clone());
        }
        if let Some(ref output_dir) = self.output_dir {
            config = config.with_output_dir(output_dir.clone());
        }
        if let Some(workers) = self.workers {
            config = config.with_workers(workers);
        }
        config.with_progress(self.progress && !self.quiet)
    }
}

/// Requested period: whole months of one year, or an explicit date range
#[derive(Debug, Clone, Parser)]
pub struct PeriodArgs {
    /// Year of the months to process
    #[arg(long = "year", required_unless_present = "from", requires = "months")]
    pub year: Option<i32>,

    /// Month(s) to process, comma-separated (e.g. 1,2,3)
    #[arg(
        long = "month",
        alias = "months",
        value_name = "LIST",
        value_delimiter = ',',
        requires = "year"
    )]
    pub months: Vec<u32>,

    /// First date of an explicit range (YYYY-MM-DD)
    #[arg(long = "from", value_name = "DATE", conflicts_with = "year")]
    pub from: Option<NaiveDate>,

    /// Last date of the range; defaults to --from
    #[arg(long = "to", value_name = "DATE", requires = "from")]
    pub to: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Period {
    Months(Vec<YearMonth>),
    Range(DateRange),
}

impl Period {
    /// Individual ranges to fetch; non-contiguous months are not bridged
    pub fn fetch_ranges(&self) -> Result<Vec<DateRange>> {
        match self {
            Period::Range(range) => Ok(vec![*range]),
            Period::Months(months) => months.iter().map(|m| DateRange::for_month(*m)).collect(),
        }
    }

    pub fn months(&self) -> Vec<YearMonth> {
        match self {
            Period::Range(range) => range.months(),
            Period::Months(months) => months.clone(),
        }
    }
}

impl PeriodArgs {
    pub fn resolve(&self) -> Result<Period> {
        if let Some(from) = self.from {
            let to = self.to.unwrap_or(from);
            return Ok(Period::Range(DateRange::new(from, to)?));
        }

        let year = self
            .year
            .ok_or_else(|| PipelineError::configuration("either --year or --from is required"))?;
        if self.months.is_empty() {
            return Err(PipelineError::configuration(
                "--month is required with --year",
            ));
        }

        let mut months = self
            .months
            .iter()
            .map(|&month| YearMonth::new(year, month))
            .collect::<Result<Vec<_>>>()?;
        months.sort();
        months.dedup();
        Ok(Period::Months(months))
    }
}

/// Retrieval options
#[derive(Debug, Clone, Parser)]
pub struct AcquisitionArgs {
    /// Retries after the first failed attempt
    #[arg(long = "retries", value_name = "COUNT")]
    pub retries: Option<u32>,

    /// Per-attempt request timeout in seconds
    #[arg(long = "timeout", value_name = "SECONDS")]
    pub timeout: Option<u64>,

    /// Base URL of the remote publication tree
    #[arg(long = "base-url", value_name = "URL")]
    pub base_url: Option<String>,

    /// List fetched, skipped and failed dates after the summary
    #[arg(long = "show-failures")]
    pub show_failures: bool,
}

impl AcquisitionArgs {
    fn apply(&self, mut config: PipelineConfig) -> PipelineConfig {
        if let Some(retries) = self.retries {
            config = config.with_retry_count(retries);
        }
        if let Some(timeout) = self.timeout {
            config = config.with_timeout_seconds(timeout);
        }
        if let Some(ref base_url) = self.base_url {
            config = config.with_base_url(base_url.clone());
        }
        config
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum EncodingArg {
    Latin1,
    Utf8,
}

impl From<EncodingArg> for SourceEncoding {
    fn from(value: EncodingArg) -> Self {
        match value {
            EncodingArg::Latin1 => SourceEncoding::Latin1,
            EncodingArg::Utf8 => SourceEncoding::Utf8,
        }
    }
}

#[derive(Debug, Clone, Parser)]
pub struct FetchArgs {
    #[command(flatten)]
    pub period: PeriodArgs,

    #[command(flatten)]
    pub acquisition: AcquisitionArgs,

    /// Re-download files that already exist
    #[arg(long = "force")]
    pub force: bool,

    #[command(flatten)]
    pub common: CommonArgs,
}

#[derive(Debug, Clone, Parser)]
pub struct ProcessArgs {
    #[command(flatten)]
    pub period: PeriodArgs,

    /// Re-extract and re-merge days already present in the dataset
    #[arg(long = "force")]
    pub force: bool,

    /// Encoding of the raw files
    #[arg(long = "encoding", value_enum, default_value = "latin1")]
    pub encoding: EncodingArg,

    #[command(flatten)]
    pub common: CommonArgs,
}

#[derive(Debug, Clone, Parser)]
pub struct RunArgs {
    #[command(flatten)]
    pub period: PeriodArgs,

    #[command(flatten)]
    pub acquisition: AcquisitionArgs,

    /// Re-download existing files and re-merge merged days
    #[arg(long = "force")]
    pub force: bool,

    /// Encoding of the raw files
    #[arg(long = "encoding", value_enum, default_value = "latin1")]
    pub encoding: EncodingArg,

    #[command(flatten)]
    pub common: CommonArgs,
}

#[derive(Debug, Clone, Parser)]
pub struct SummaryArgs {
    #[command(flatten)]
    pub period: PeriodArgs,

    /// Entries in the top makes and models tables
    #[arg(long = "top", value_name = "N", default_value_t = crate::constants::dataset::SUMMARY_TOP_N)]
    pub top: usize,

    /// Also list registrations per day
    #[arg(long = "daily")]
    pub daily: bool,

    #[command(flatten)]
    pub common: CommonArgs,
}

impl FetchArgs {
    pub fn config(&self) -> PipelineConfig {
        let config = self.acquisition.apply(PipelineConfig::default());
        self.common.apply(config).with_force(self.force)
    }
}

impl ProcessArgs {
    pub fn config(&self) -> PipelineConfig {
        self.common
            .apply(PipelineConfig::default())
            .with_force(self.force)
            .with_encoding(self.encoding.into())
    }
}

impl RunArgs {
    pub fn config(&self) -> PipelineConfig {
        let config = self.acquisition.apply(PipelineConfig::default());
        self.common
            .apply(config)
            .with_force(self.force)
            .with_encoding(self.encoding.into())
    }
}

impl SummaryArgs {
    pub fn config(&self) -> PipelineConfig {
        self.common.apply(PipelineConfig::default())
    }
}
