//! Concurrent acquisition over a date range

use super::fetcher::{Fetcher, sweep_partial_downloads};
use crate::config::PipelineConfig;
use crate::constants::PARTIAL_DOWNLOAD_MAX_AGE;
use crate::error::{FetchError, PipelineError, Result};
use crate::models::{AcquisitionReport, DateRange, FetchOutcome};
use crate::progress::ProgressReporter;
use futures::stream::{self, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Drives one [`Fetcher`] call per date with at most `workers` in flight
pub struct AcquisitionScheduler {
    fetcher: Fetcher,
    workers: usize,
    show_progress: bool,
}

impl AcquisitionScheduler {
    pub fn new(config: &PipelineConfig) -> Result<Self> {
        Ok(Self::with_fetcher(Fetcher::new(config)?, config.workers)
            .with_progress(config.show_progress))
    }

    pub fn with_fetcher(fetcher: Fetcher, workers: usize) -> Self {
        Self {
            fetcher,
            workers: workers.max(1),
            show_progress: false,
        }
    }

    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    /// Fetch every date in `range`.
    ///
    /// Per-date failures are reported in the returned outcomes; only an
    /// unusable data directory fails the call. Outcomes reflect the current
    /// filesystem state and nothing is remembered between calls.
    pub async fn run(
        &self,
        range: &DateRange,
        cancel: &CancellationToken,
    ) -> Result<AcquisitionReport> {
        let data_dir = self.fetcher.data_dir();
        tokio::fs::create_dir_all(data_dir)
            .await
            .map_err(|e| PipelineError::DataDirUnavailable {
                path: data_dir.to_path_buf(),
                reason: e.to_string(),
            })?;

        let swept = sweep_partial_downloads(data_dir, PARTIAL_DOWNLOAD_MAX_AGE)?;
        if swept > 0 {
            info!("Removed {} stale partial download(s)", swept);
        }

        info!(
            "Acquiring {} date(s) {} with {} worker(s)",
            range.day_count(),
            range,
            self.workers
        );

        let progress = ProgressReporter::new(range.day_count(), "Fetching", self.show_progress);

        let outcomes: Vec<_> = stream::iter(range.days())
            .map(|date| {
                let progress = progress.clone();
                async move {
                    progress.set_message(format!("Fetching {}", date));
                    let outcome = if cancel.is_cancelled() {
                        cancelled()
                    } else {
                        tokio::select! {
                            outcome = self.fetcher.fetch(date) => outcome,
                            _ = cancel.cancelled() => {
                                debug!("Fetch for {} cancelled", date);
                                cancelled()
                            }
                        }
                    };
                    progress.inc();
                    (date, outcome)
                }
            })
            .buffer_unordered(self.workers)
            .collect()
            .await;

        let mut report = AcquisitionReport::default();
        for (date, outcome) in outcomes {
            report.insert(date, outcome);
        }

        progress.finish(format!(
            "{} fetched, {} skipped, {} failed",
            report.summary.fetched, report.summary.skipped, report.summary.failed
        ));

        if report.summary.failed > 0 {
            warn!(
                "Acquisition finished with {} failure(s) out of {} date(s)",
                report.summary.failed,
                report.summary.total()
            );
        } else {
            info!(
                "Acquisition finished: {} fetched, {} skipped",
                report.summary.fetched, report.summary.skipped
            );
        }

        Ok(report)
    }
}

fn cancelled() -> FetchOutcome {
    FetchOutcome::Failed {
        error: FetchError::Cancelled,
        attempts: 0,
    }
}
