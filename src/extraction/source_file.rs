//! Source file identity: the registration date lives in the filename.

use crate::constants::{FILENAME_DATE_FORMAT, RAW_FILENAME_PATTERN};
use crate::error::{PipelineError, Result};
use chrono::NaiveDate;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

static RAW_FILENAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(RAW_FILENAME_PATTERN).expect("raw filename pattern is a valid regex")
});

/// A raw daily file whose name has been validated
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub path: PathBuf,
    /// Bare filename, used as the record's `source_file`
    pub name: String,
    /// Registration date encoded in the name
    pub date: NaiveDate,
}

impl SourceFile {
    /// Validate `path`'s filename. A name that does not match
    /// `export_mat_YYYYMMDD.txt`, or whose digits are not a calendar date,
    /// rejects the whole file.
    pub fn from_path(path: &Path) -> Result<Self> {
        let malformed = || PipelineError::MalformedFilename {
            path: path.to_path_buf(),
        };

        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(malformed)?;
        let captures = RAW_FILENAME.captures(name).ok_or_else(malformed)?;
        let date = NaiveDate::parse_from_str(&captures[1], FILENAME_DATE_FORMAT)
            .map_err(|_| malformed())?;

        Ok(Self {
            path: path.to_path_buf(),
            name: name.to_string(),
            date,
        })
    }
}
