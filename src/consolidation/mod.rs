//! Monthly consolidation of extracted BEV registrations.
//!
//! Each raw daily file is extracted, classified and deduplicated, then
//! merged into the dataset of its month. Merges into the same month are
//! serialised by a per-month lock; different months proceed concurrently.
//! A merge that changes nothing does not touch the persisted file.
//! Merging can be interrupted between files through a cancellation token.

pub mod dataset;
pub mod summary;

pub use dataset::MonthlyDataset;
pub use summary::MonthlySummary;

use crate::classifier::BevClassifier;
use crate::config::PipelineConfig;
use crate::deduplication::{MergeStats, dedupe_day, merge_into};
use crate::error::{PipelineError, Result};
use crate::extraction::{RecordExtractor, SourceFile};
use crate::models::{DateRange, YearMonth, raw_file_name};
use crate::progress::ProgressReporter;
use chrono::NaiveDate;
use futures::stream::{self, StreamExt};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::task;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Per-day counts of one successful merge
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DayReport {
    pub records_extracted: usize,
    pub malformed_lines: usize,
    pub bev_records: usize,
    pub duplicates: usize,
    pub merge: MergeStats,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DayStatus {
    Merged(DayReport),
    /// The month's ledger lists this file and `force` is off
    AlreadyMerged,
    /// No raw file for the date in the data directory
    MissingSource,
}

impl DayStatus {
    pub fn label(&self) -> &'static str {
        match self {
            DayStatus::Merged(_) => "merged",
            DayStatus::AlreadyMerged => "already-merged",
            DayStatus::MissingSource => "missing",
        }
    }
}

/// Outcome of consolidating one month
#[derive(Debug, Clone)]
pub struct MonthReport {
    pub month: YearMonth,
    /// Keyed by raw filename
    pub days: BTreeMap<String, DayStatus>,
    /// Files rejected for a per-file reason, with that reason
    pub failures: Vec<(PathBuf, String)>,
    pub totals: MergeStats,
    pub malformed_lines: usize,
    pub dataset_path: PathBuf,
}

impl MonthReport {
    fn new(month: YearMonth, output_dir: &Path) -> Self {
        Self {
            month,
            days: BTreeMap::new(),
            failures: Vec::new(),
            totals: MergeStats::default(),
            malformed_lines: 0,
            dataset_path: MonthlyDataset::path_in(output_dir, month),
        }
    }

    fn record_day(&mut self, name: String, status: DayStatus) {
        if let DayStatus::Merged(day) = &status {
            self.totals.absorb(day.merge);
            self.malformed_lines += day.malformed_lines;
        }
        self.days.insert(name, status);
    }

    /// Fold a per-item result in; fatal errors are handed back to the caller
    fn absorb(&mut self, path: &Path, result: Result<DayStatus>) -> Result<()> {
        let name = file_name(path);
        match result {
            Ok(status) => {
                self.record_day(name, status);
                Ok(())
            }
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => {
                warn!("Skipping {}: {}", path.display(), e);
                self.failures.push((path.to_path_buf(), e.to_string()));
                Ok(())
            }
        }
    }

    pub fn count(&self, label: &str) -> usize {
        self.days.values().filter(|s| s.label() == label).count()
    }
}

/// Outcome of a multi-month consolidation
#[derive(Debug, Clone, Default)]
pub struct ConsolidationReport {
    pub months: BTreeMap<YearMonth, MonthReport>,
}

impl ConsolidationReport {
    pub fn totals(&self) -> MergeStats {
        let mut totals = MergeStats::default();
        for month in self.months.values() {
            totals.absorb(month.totals);
        }
        totals
    }

    pub fn failures(&self) -> impl Iterator<Item = &(PathBuf, String)> {
        self.months.values().flat_map(|m| m.failures.iter())
    }

    pub fn count(&self, label: &str) -> usize {
        self.months.values().map(|m| m.count(label)).sum()
    }
}

/// Single-writer locks, one per month
#[derive(Default)]
struct MonthLocks {
    locks: Mutex<HashMap<YearMonth, Arc<tokio::sync::Mutex<()>>>>,
}

impl MonthLocks {
    fn get(&self, month: YearMonth) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        locks.entry(month).or_default().clone()
    }
}

pub struct ConsolidationEngine {
    data_dir: PathBuf,
    output_dir: PathBuf,
    workers: usize,
    extractor: RecordExtractor,
    classifier: BevClassifier,
    locks: MonthLocks,
    show_progress: bool,
    cancel: CancellationToken,
}

impl ConsolidationEngine {
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            data_dir: config.data_dir.clone(),
            output_dir: config.output_dir.clone(),
            workers: config.workers.max(1),
            extractor: RecordExtractor::new(config.layout.clone(), config.encoding),
            classifier: BevClassifier::new(),
            locks: MonthLocks::default(),
            show_progress: config.show_progress,
            cancel: CancellationToken::new(),
        }
    }

    /// Stop starting new files once `cancel` fires; a file already being
    /// merged completes.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Merge one raw file into its month's dataset.
    ///
    /// A malformed filename rejects the file; an unwritable dataset is fatal.
    pub async fn consolidate_file(&self, path: &Path, force: bool) -> Result<DayStatus> {
        let source = SourceFile::from_path(path)?;
        let month = YearMonth::of(source.date);

        let lock = self.locks.get(month);
        let _guard = lock.lock().await;

        let extractor = self.extractor.clone();
        let classifier = self.classifier.clone();
        let output_dir = self.output_dir.clone();

        task::spawn_blocking(move || {
            merge_source(&extractor, &classifier, &source, month, &output_dir, force)
        })
        .await
        .map_err(|e| PipelineError::TaskFailed {
            reason: format!("consolidation of {}: {}", path.display(), e),
        })?
    }

    /// Merge the raw file of `date`, if it has been acquired
    pub async fn consolidate_day(&self, date: NaiveDate, force: bool) -> Result<DayStatus> {
        let path = self.data_dir.join(raw_file_name(date));
        if !path.is_file() {
            debug!("No raw file for {}", date);
            return Ok(DayStatus::MissingSource);
        }
        self.consolidate_file(&path, force).await
    }

    /// Merge every raw file of `month` found in the data directory
    pub async fn consolidate_month(&self, month: YearMonth, force: bool) -> Result<MonthReport> {
        let files = self.discover(month)?;
        info!("Consolidating {} file(s) for {}", files.len(), month);

        let mut report = MonthReport::new(month, &self.output_dir);
        let progress =
            ProgressReporter::new(files.len(), &format!("Merging {}", month), self.show_progress);
        for path in files {
            if self.cancel.is_cancelled() {
                warn!("Interrupted, {} left partially consolidated", month);
                break;
            }
            progress.set_message(file_name(&path));
            let result = self.consolidate_file(&path, force).await;
            report.absorb(&path, result)?;
            progress.inc();
        }
        progress.finish(format!("{} merged", month));

        log_month(&report);
        Ok(report)
    }

    /// Merge every date of `range`. Dates without a raw file are reported
    /// as missing.
    pub async fn consolidate_range(
        &self,
        range: &DateRange,
        force: bool,
    ) -> Result<ConsolidationReport> {
        let mut by_month: BTreeMap<YearMonth, Vec<NaiveDate>> = BTreeMap::new();
        for date in range.days() {
            by_month.entry(YearMonth::of(date)).or_default().push(date);
        }

        let results: Vec<Result<MonthReport>> = stream::iter(by_month)
            .map(|(month, dates)| async move {
                let mut report = MonthReport::new(month, &self.output_dir);
                for date in dates {
                    if self.cancel.is_cancelled() {
                        warn!("Interrupted, {} left partially consolidated", month);
                        break;
                    }
                    let path = self.data_dir.join(raw_file_name(date));
                    let result = self.consolidate_day(date, force).await;
                    report.absorb(&path, result)?;
                }
                log_month(&report);
                Ok(report)
            })
            .buffer_unordered(self.workers)
            .collect()
            .await;

        collect_months(results)
    }

    /// Merge whole months, discovering their raw files
    pub async fn consolidate_months(
        &self,
        months: &[YearMonth],
        force: bool,
    ) -> Result<ConsolidationReport> {
        let results: Vec<Result<MonthReport>> = stream::iter(months.iter().copied())
            .map(|month| self.consolidate_month(month, force))
            .buffer_unordered(self.workers)
            .collect()
            .await;

        collect_months(results)
    }

    /// Raw files of `month` in the data directory, in name order
    pub fn discover(&self, month: YearMonth) -> Result<Vec<PathBuf>> {
        if !self.data_dir.is_dir() {
            return Err(PipelineError::DataDirUnavailable {
                path: self.data_dir.clone(),
                reason: "not a directory".to_string(),
            });
        }

        let pattern = format!(
            "{}/{}",
            glob::Pattern::escape(&self.data_dir.to_string_lossy()),
            month.raw_file_glob()
        );
        let paths = glob::glob(&pattern)
            .map_err(|e| PipelineError::configuration(format!("invalid glob pattern: {}", e)))?;

        let mut files: Vec<PathBuf> = paths.flatten().filter(|p| p.is_file()).collect();
        files.sort();
        debug!("Discovered {} raw file(s) for {}", files.len(), month);
        Ok(files)
    }
}

/// Blocking body of a single-file merge; runs under the month lock
fn merge_source(
    extractor: &RecordExtractor,
    classifier: &BevClassifier,
    source: &SourceFile,
    month: YearMonth,
    output_dir: &Path,
    force: bool,
) -> Result<DayStatus> {
    let mut dataset = MonthlyDataset::load_or_empty(output_dir, month)?;

    if !force && dataset.contains_source(&source.name) {
        debug!("{} already merged into {}", source.name, month);
        return Ok(DayStatus::AlreadyMerged);
    }

    let extraction = extractor.extract_file(&source.path)?;
    let records_extracted = extraction.records.len();
    let bev: Vec<_> = extraction
        .records
        .into_iter()
        .filter(|record| classifier.is_bev(record))
        .collect();
    let bev_records = bev.len();

    let (unique, dedup) = dedupe_day(bev);
    let merge = merge_into(&mut dataset, unique);
    let newly_merged = dataset.mark_merged(&source.name);

    if merge.changed() {
        dataset.save(output_dir)?;
    } else if newly_merged {
        dataset.save_ledger(output_dir)?;
    }

    debug!(
        "{}: {} extracted, {} BEV, {} inserted, {} replaced, {} unchanged",
        source.name, records_extracted, bev_records, merge.inserted, merge.replaced, merge.unchanged
    );

    Ok(DayStatus::Merged(DayReport {
        records_extracted,
        malformed_lines: extraction.malformed_lines,
        bev_records,
        duplicates: dedup.duplicates(),
        merge,
    }))
}

fn collect_months(results: Vec<Result<MonthReport>>) -> Result<ConsolidationReport> {
    let mut report = ConsolidationReport::default();
    for result in results {
        match result {
            Ok(month) => {
                report.months.insert(month.month, month);
            }
            Err(e) => {
                error!("Consolidation halted: {}", e);
                return Err(e);
            }
        }
    }
    Ok(report)
}

fn log_month(report: &MonthReport) {
    info!(
        "{}: {} inserted, {} replaced, {} unchanged ({} already merged, {} rejected)",
        report.month,
        report.totals.inserted,
        report.totals.replaced,
        report.totals.unchanged,
        report.count("already-merged"),
        report.failures.len()
    );
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests;
