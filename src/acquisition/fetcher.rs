//! Single-date retrieval of the authority's daily archives.
//!
//! A fetch downloads `export_mat_YYYYMMDD.zip`, unpacks the text file into a
//! hidden temporary file in the data directory and renames it into place.
//! The destination path therefore only ever holds a complete file.

use super::retry::RetryPolicy;
use crate::config::PipelineConfig;
use crate::constants::{
    ARCHIVE_EXTENSION, DAILY_FILE_PREFIX, PARTIAL_DOWNLOAD_PREFIX, PARTIAL_DOWNLOAD_SUFFIX,
    REMOTE_DAILY_SEGMENT, USER_AGENT,
};
use crate::error::{FetchError, PipelineError, Result};
use crate::models::{FetchOutcome, raw_file_name};
use chrono::{Datelike, NaiveDate};
use reqwest::Client;
use std::fs;
use std::io::{Cursor, Read, Seek, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::{debug, warn};
use zip::ZipArchive;
use zip::result::ZipError;

#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
    base_url: String,
    data_dir: PathBuf,
    policy: RetryPolicy,
    force: bool,
}

impl Fetcher {
    pub fn new(config: &PipelineConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(config.timeout())
            .build()
            .map_err(|e| PipelineError::configuration(format!("HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            data_dir: config.data_dir.clone(),
            policy: config.retry_policy(),
            force: config.force,
        })
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// `{base}/{year}/{month}/vehiculos/matriculaciones/export_mat_YYYYMMDD.zip`;
    /// the month path segment is not zero-padded.
    pub fn url_for(&self, date: NaiveDate) -> String {
        format!(
            "{}/{}/{}/{}/{}{}.{}",
            self.base_url,
            date.year(),
            date.month(),
            REMOTE_DAILY_SEGMENT,
            DAILY_FILE_PREFIX,
            date.format("%Y%m%d"),
            ARCHIVE_EXTENSION
        )
    }

    pub fn destination(&self, date: NaiveDate) -> PathBuf {
        self.data_dir.join(raw_file_name(date))
    }

    /// Produce the raw file for `date`.
    ///
    /// An existing destination is left alone unless `force` is set, without
    /// any network access.
    pub async fn fetch(&self, date: NaiveDate) -> FetchOutcome {
        let destination = self.destination(date);
        if !self.force && destination.is_file() {
            debug!("{} already present, skipping", destination.display());
            return FetchOutcome::AlreadyPresent;
        }

        let url = self.url_for(date);
        let (downloaded, attempts) = self.policy.run(|_| self.download(&url)).await;

        let result = match downloaded {
            Ok(archive) => self.install(archive, date, &url).await,
            Err(error) => Err(error),
        };

        match result {
            Ok(bytes) => {
                debug!(
                    "Fetched {} ({} bytes, {} attempt(s))",
                    destination.display(),
                    bytes,
                    attempts
                );
                FetchOutcome::Fetched { bytes, attempts }
            }
            Err(error) => {
                warn!("Fetch failed for {}: {}", date, error);
                FetchOutcome::Failed { error, attempts }
            }
        }
    }

    async fn download(&self, url: &str) -> std::result::Result<Vec<u8>, FetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::from_status(url, status.as_u16()));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| FetchError::from_reqwest(url, e))?;
        Ok(body.to_vec())
    }

    async fn install(
        &self,
        archive: Vec<u8>,
        date: NaiveDate,
        url: &str,
    ) -> std::result::Result<u64, FetchError> {
        let data_dir = self.data_dir.clone();
        let destination = self.destination(date);
        let entry_name = raw_file_name(date);
        let url = url.to_string();

        tokio::task::spawn_blocking(move || {
            unpack_archive(&archive, &entry_name, &data_dir, &destination, &url)
        })
        .await
        .map_err(|e| FetchError::Task {
            reason: e.to_string(),
        })?
    }
}

/// Extract `entry_name` (or, failing that, the first file entry) from a zip
/// held in memory and atomically place it at `destination`.
pub fn unpack_archive(
    archive: impl AsRef<[u8]>,
    entry_name: &str,
    data_dir: &Path,
    destination: &Path,
    url: &str,
) -> std::result::Result<u64, FetchError> {
    let invalid = |reason: String| FetchError::InvalidArchive {
        url: url.to_string(),
        reason,
    };

    let mut zip = ZipArchive::new(Cursor::new(archive)).map_err(|e| invalid(e.to_string()))?;

    let index = match zip.index_for_name(entry_name) {
        Some(index) => index,
        None => first_file_entry(&mut zip)
            .map_err(|e| invalid(e.to_string()))?
            .ok_or_else(|| invalid("archive holds no file entry".to_string()))?,
    };

    let mut contents = Vec::new();
    let mut entry = zip.by_index(index).map_err(|e| invalid(e.to_string()))?;
    debug!("Unpacking archive entry {}", entry.name());
    entry
        .read_to_end(&mut contents)
        .map_err(|e| invalid(e.to_string()))?;
    drop(entry);

    let write_error = |source: std::io::Error| FetchError::Write {
        path: destination.to_path_buf(),
        source,
    };

    let mut temp = tempfile::Builder::new()
        .prefix(PARTIAL_DOWNLOAD_PREFIX)
        .suffix(PARTIAL_DOWNLOAD_SUFFIX)
        .tempfile_in(data_dir)
        .map_err(write_error)?;
    temp.write_all(&contents).map_err(write_error)?;
    temp.as_file().sync_all().map_err(write_error)?;
    temp.persist(destination).map_err(|e| write_error(e.error))?;

    Ok(contents.len() as u64)
}

/// Index of the first entry that is not a directory
fn first_file_entry<R: Read + Seek>(
    zip: &mut ZipArchive<R>,
) -> std::result::Result<Option<usize>, ZipError> {
    for index in 0..zip.len() {
        if !zip.by_index(index)?.is_dir() {
            return Ok(Some(index));
        }
    }
    Ok(None)
}

/// Remove leftover `.export_mat_*.part` files from interrupted runs.
///
/// Only files last modified at least `max_age` ago are removed; younger
/// ones may still be written by another run on the same directory.
pub fn sweep_partial_downloads(data_dir: &Path, max_age: Duration) -> Result<usize> {
    let pattern = format!(
        "{}/{}*{}",
        glob::Pattern::escape(&data_dir.to_string_lossy()),
        PARTIAL_DOWNLOAD_PREFIX,
        PARTIAL_DOWNLOAD_SUFFIX
    );
    let paths = glob::glob(&pattern)
        .map_err(|e| PipelineError::configuration(format!("invalid sweep pattern: {}", e)))?;

    let now = SystemTime::now();
    let mut removed = 0;
    for path in paths.flatten() {
        let age = fs::metadata(&path)
            .and_then(|meta| meta.modified())
            .map(|modified| now.duration_since(modified).unwrap_or_default());
        match age {
            Ok(age) if age >= max_age => {}
            Ok(_) => {
                debug!("Leaving recent partial download {}", path.display());
                continue;
            }
            Err(e) => {
                warn!("Could not inspect {}: {}", path.display(), e);
                continue;
            }
        }
        match fs::remove_file(&path) {
            Ok(()) => {
                debug!("Removed stale partial download {}", path.display());
                removed += 1;
            }
            Err(e) => warn!("Could not remove {}: {}", path.display(), e),
        }
    }
    Ok(removed)
}
