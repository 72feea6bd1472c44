//! Configuration management and validation.
//!
//! Provides the configuration consumed by the acquisition and consolidation
//! stages: directories, remote source, concurrency budget, retry tunables
//! and the fixed-width layout of the source files.

use crate::acquisition::RetryPolicy;
use crate::constants::{
    APP_DIR_NAME, DEFAULT_BACKOFF_BASE_MS, DEFAULT_BACKOFF_MAX_MS, DEFAULT_BASE_URL,
    DEFAULT_RETRY_COUNT, DEFAULT_TIMEOUT_SECONDS, MAX_DEFAULT_WORKERS,
};
use crate::error::{PipelineError, Result};
use crate::extraction::FieldLayout;
use crate::models::SourceEncoding;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Global configuration for a pipeline run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Directory holding raw daily files (`export_mat_YYYYMMDD.txt`)
    pub data_dir: PathBuf,

    /// Directory holding monthly datasets (`ev_data_YYYY_MM.csv`)
    pub output_dir: PathBuf,

    /// Base URL of the remote publication tree
    pub base_url: String,

    /// Re-fetch existing files and re-merge already merged days
    pub force: bool,

    /// Concurrency budget for fetches and month consolidations
    pub workers: usize,

    /// Retries after the first failed attempt
    pub retry_count: u32,

    /// Per-attempt request timeout
    pub timeout_seconds: u64,

    /// Delay before the first retry (doubles per retry)
    pub backoff_base_ms: u64,

    /// Ceiling for any single retry delay
    pub backoff_max_ms: u64,

    /// Encoding of the raw files
    pub encoding: SourceEncoding,

    /// Column layout of the raw files
    pub layout: FieldLayout,

    /// Render progress bars on stderr
    pub show_progress: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        let root = default_root_dir();
        Self {
            data_dir: root.join("data"),
            output_dir: root.join("report"),
            base_url: DEFAULT_BASE_URL.to_string(),
            force: false,
            workers: num_cpus::get().clamp(1, MAX_DEFAULT_WORKERS),
            retry_count: DEFAULT_RETRY_COUNT,
            timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
            backoff_base_ms: DEFAULT_BACKOFF_BASE_MS,
            backoff_max_ms: DEFAULT_BACKOFF_MAX_MS,
            encoding: SourceEncoding::default(),
            layout: FieldLayout::default(),
            show_progress: false,
        }
    }
}

/// `<platform data dir>/ev-registrations`, or `./ev-registrations` when the
/// platform has none.
pub fn default_root_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR_NAME)
}

impl PipelineConfig {
    /// Create configuration rooted at a single directory (`data/` and `report/`)
    pub fn rooted_at(root: &Path) -> Self {
        Self {
            data_dir: root.join("data"),
            output_dir: root.join("report"),
            ..Default::default()
        }
    }

    pub fn with_data_dir(mut self, data_dir: PathBuf) -> Self {
        self.data_dir = data_dir;
        self
    }

    pub fn with_output_dir(mut self, output_dir: PathBuf) -> Self {
        self.output_dir = output_dir;
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_retry_count(mut self, retry_count: u32) -> Self {
        self.retry_count = retry_count;
        self
    }

    pub fn with_timeout_seconds(mut self, timeout_seconds: u64) -> Self {
        self.timeout_seconds = timeout_seconds;
        self
    }

    /// Set base and ceiling of the retry backoff
    pub fn with_backoff(mut self, base_ms: u64, max_ms: u64) -> Self {
        self.backoff_base_ms = base_ms;
        self.backoff_max_ms = max_ms;
        self
    }

    pub fn with_encoding(mut self, encoding: SourceEncoding) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn with_layout(mut self, layout: FieldLayout) -> Self {
        self.layout = layout;
        self
    }

    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    /// Retry policy derived from the retry and backoff settings
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::exponential(
            self.retry_count + 1,
            Duration::from_millis(self.backoff_base_ms),
            Duration::from_millis(self.backoff_max_ms),
        )
    }

    /// Reject settings that cannot produce a meaningful run
    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(PipelineError::configuration("workers must be at least 1"));
        }
        if self.timeout_seconds == 0 {
            return Err(PipelineError::configuration(
                "timeout_seconds must be at least 1",
            ));
        }
        if self.backoff_max_ms < self.backoff_base_ms {
            return Err(PipelineError::configuration(format!(
                "backoff ceiling {}ms is below the base delay {}ms",
                self.backoff_max_ms, self.backoff_base_ms
            )));
        }
        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(PipelineError::configuration(format!(
                "base_url must be an http(s) URL, got '{}'",
                self.base_url
            )));
        }
        self.layout.validate()?;

        debug!(
            workers = self.workers,
            retry_count = self.retry_count,
            timeout_seconds = self.timeout_seconds,
            "configuration validated"
        );
        Ok(())
    }
}
