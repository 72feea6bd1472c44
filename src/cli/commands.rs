//! Command implementations for the registration pipeline CLI
//!
//! Each subcommand builds a [`PipelineConfig`] from its arguments, runs the
//! library stage(s) and prints a summary. The returned count is the number
//! of per-item failures (dates that could not be fetched, files rejected).

use super::args::{
    Args, Commands, CommonArgs, FetchArgs, Period, ProcessArgs, RunArgs, SummaryArgs,
};
use super::report;
use crate::acquisition::AcquisitionScheduler;
use crate::config::PipelineConfig;
use crate::consolidation::{
    ConsolidationEngine, ConsolidationReport, MonthlyDataset, MonthlySummary,
};
use crate::models::AcquisitionReport;
use anyhow::{Context, Result};
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub async fn run(args: Args, cancel: CancellationToken) -> Result<usize> {
    let command = args
        .command
        .context("no subcommand given (expected fetch, process, run or summary)")?;

    setup_logging(command.common())?;
    debug!("Command line arguments: {:?}", command);

    match command {
        Commands::Fetch(args) => run_fetch(args, cancel).await,
        Commands::Process(args) => run_process(args, cancel).await,
        Commands::Run(args) => run_all(args, cancel).await,
        Commands::Summary(args) => run_summary(args),
    }
}

/// Set up structured logging based on CLI arguments
fn setup_logging(args: &CommonArgs) -> Result<()> {
    use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

    let log_level = args.log_level();
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("ev_registrations={}", log_level)));

    let result = if args.quiet {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_level(true)
                    .with_writer(std::io::stderr)
                    .compact(),
            )
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_level(true)
                    .with_timer(fmt::time::uptime())
                    .with_writer(std::io::stderr),
            )
            .try_init()
    };
    result.context("failed to initialise logging")?;

    debug!("Logging initialized at level: {}", log_level);
    Ok(())
}

fn validated(config: PipelineConfig) -> Result<PipelineConfig> {
    config.validate().context("invalid configuration")?;
    debug!("Configuration: {:?}", config);
    Ok(config)
}

async fn run_fetch(args: FetchArgs, cancel: CancellationToken) -> Result<usize> {
    let config = validated(args.config())?;
    let period = args.period.resolve()?;

    let started = Instant::now();
    let report = acquire(&config, &period, &cancel).await?;
    report::print_acquisition(&report, args.acquisition.show_failures, started.elapsed());
    Ok(report.summary.failed)
}

async fn run_process(args: ProcessArgs, cancel: CancellationToken) -> Result<usize> {
    let config = validated(args.config())?;
    let period = args.period.resolve()?;

    let started = Instant::now();
    let report = consolidate(&config, &period, &cancel).await?;
    report::print_consolidation(&report, started.elapsed());
    Ok(report.failures().count())
}

async fn run_all(args: RunArgs, cancel: CancellationToken) -> Result<usize> {
    let config = validated(args.config())?;
    let period = args.period.resolve()?;

    let started = Instant::now();
    let acquisition = acquire(&config, &period, &cancel).await?;
    report::print_acquisition(
        &acquisition,
        args.acquisition.show_failures,
        started.elapsed(),
    );

    if cancel.is_cancelled() {
        warn!("Interrupted after acquisition, skipping consolidation");
        return Ok(acquisition.summary.failed);
    }

    let started = Instant::now();
    let consolidation = consolidate(&config, &period, &cancel).await?;
    report::print_consolidation(&consolidation, started.elapsed());

    Ok(acquisition.summary.failed + consolidation.failures().count())
}

fn run_summary(args: SummaryArgs) -> Result<usize> {
    let config = validated(args.config())?;
    let period = args.period.resolve()?;

    for month in period.months() {
        let path = MonthlyDataset::path_in(&config.output_dir, month);
        let summary = MonthlySummary::from_file(&path, month, args.top)
            .with_context(|| format!("cannot summarise {}", month))?;
        report::print_summary(&summary, args.daily);
    }
    Ok(0)
}

async fn acquire(
    config: &PipelineConfig,
    period: &Period,
    cancel: &CancellationToken,
) -> Result<AcquisitionReport> {
    let scheduler = AcquisitionScheduler::new(config)?;
    let mut combined = AcquisitionReport::default();

    for range in period.fetch_ranges()? {
        info!("Fetching {}", range);
        let report = scheduler.run(&range, cancel).await?;
        for (date, outcome) in report.outcomes {
            combined.insert(date, outcome);
        }
    }
    Ok(combined)
}

async fn consolidate(
    config: &PipelineConfig,
    period: &Period,
    cancel: &CancellationToken,
) -> Result<ConsolidationReport> {
    let engine = ConsolidationEngine::new(config).with_cancellation(cancel.clone());
    let report = match period {
        Period::Months(months) => engine.consolidate_months(months, config.force).await?,
        Period::Range(range) => engine.consolidate_range(range, config.force).await?,
    };
    Ok(report)
}
