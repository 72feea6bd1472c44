//! Error handling for registration acquisition and consolidation.
//!
//! Errors are split by the scope they affect: [`LineError`] for a single
//! fixed-width line, [`FetchError`] for a single date's download, and
//! [`PipelineError`] for files, months and the run as a whole.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    #[error("Data directory not accessible: {path} - {reason}")]
    DataDirUnavailable { path: PathBuf, reason: String },

    #[error("Malformed source filename: {path} (expected export_mat_YYYYMMDD.txt)")]
    MalformedFilename { path: PathBuf },

    #[error("Extraction failed for file: {path} - {reason}")]
    ExtractionFailed { path: PathBuf, reason: String },

    #[error("Failed to persist monthly dataset: {path} - {reason}")]
    Persistence { path: PathBuf, reason: String },

    #[error("No consolidated dataset at {path}")]
    DatasetMissing { path: PathBuf },

    #[error("Monthly dataset is corrupt: {path} - {reason}")]
    CorruptDataset { path: PathBuf, reason: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Invalid date range: {start} is after {end}")]
    InvalidDateRange {
        start: chrono::NaiveDate,
        end: chrono::NaiveDate,
    },

    #[error("Background task failed: {reason}")]
    TaskFailed { reason: String },

    #[error("Processing interrupted: {reason}")]
    Interrupted { reason: String },
}

impl PipelineError {
    /// Whether this error must halt the run rather than be reported per item.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            PipelineError::DataDirUnavailable { .. }
                | PipelineError::Persistence { .. }
                | PipelineError::CorruptDataset { .. }
                | PipelineError::Configuration { .. }
                | PipelineError::TaskFailed { .. }
                | PipelineError::Interrupted { .. }
        )
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        PipelineError::Configuration {
            message: message.into(),
        }
    }

    pub fn persistence(path: impl Into<PathBuf>, reason: impl std::fmt::Display) -> Self {
        PipelineError::Persistence {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;

/// Classified failure of a single remote retrieval attempt.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("No file published at {url}")]
    NotFound { url: String },

    #[error("Request rejected with HTTP {status} at {url}")]
    ClientStatus { url: String, status: u16 },

    #[error("Server error HTTP {status} at {url}")]
    ServerStatus { url: String, status: u16 },

    #[error("Request timed out: {url}")]
    Timeout { url: String },

    #[error("Connection failed for {url}: {reason}")]
    Connection { url: String, reason: String },

    #[error("Response from {url} is not a usable archive: {reason}")]
    InvalidArchive { url: String, reason: String },

    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Archive extraction task failed: {reason}")]
    Task { reason: String },

    #[error("Fetch cancelled before completion")]
    Cancelled,
}

impl FetchError {
    /// Transient failures (network, timeout, 5xx) are worth another attempt;
    /// everything else is terminal for the date.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            FetchError::ServerStatus { .. }
                | FetchError::Timeout { .. }
                | FetchError::Connection { .. }
        )
    }

    pub(crate) fn from_reqwest(url: &str, error: reqwest::Error) -> Self {
        if error.is_timeout() {
            FetchError::Timeout {
                url: url.to_string(),
            }
        } else if let Some(status) = error.status() {
            FetchError::from_status(url, status.as_u16())
        } else {
            FetchError::Connection {
                url: url.to_string(),
                reason: error.to_string(),
            }
        }
    }

    pub(crate) fn from_status(url: &str, status: u16) -> Self {
        match status {
            404 | 410 => FetchError::NotFound {
                url: url.to_string(),
            },
            500..=599 => FetchError::ServerStatus {
                url: url.to_string(),
                status,
            },
            _ => FetchError::ClientStatus {
                url: url.to_string(),
                status,
            },
        }
    }
}

/// A single fixed-width line that could not be turned into a record.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LineError {
    #[error("line {line}: width {width} is below the minimum of {minimum} characters")]
    TooShort {
        line: usize,
        width: usize,
        minimum: usize,
    },

    #[error("line {line}: required field '{field}' is blank")]
    MissingField { line: usize, field: &'static str },

    #[error("line {line}: not valid {encoding}")]
    Decoding { line: usize, encoding: &'static str },

    #[error("line {line}: read failed: {reason}")]
    Read { line: usize, reason: String },
}

impl LineError {
    pub fn line(&self) -> usize {
        match self {
            LineError::TooShort { line, .. }
            | LineError::MissingField { line, .. }
            | LineError::Decoding { line, .. }
            | LineError::Read { line, .. } => *line,
        }
    }
}
