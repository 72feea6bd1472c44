//! Core data structures for registration processing.
//!
//! Defines the extracted registration record, its derived identity key,
//! calendar helpers for date ranges and months, and the per-date outcomes
//! reported by acquisition.

use crate::constants::{DAILY_FILE_PREFIX, RAW_FILE_EXTENSION, dataset, layout};
use crate::error::{FetchError, PipelineError, Result};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// One registration event extracted from a daily source file.
///
/// Records are never mutated after extraction; classification and
/// deduplication produce new filtered collections.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationRecord {
    /// Manufacturer, trimmed and uppercased
    pub make: String,
    /// Model name, trimmed
    pub model: String,
    /// Vehicle identification number; `None` when blank or fully masked
    pub vin: Option<String>,
    /// Raw fuel descriptor, trimmed
    pub fuel_code: String,
    /// Date taken from the source filename
    pub registration_date: NaiveDate,
    /// Name of the file the record came from
    pub source_file: String,
}

impl RegistrationRecord {
    pub fn has_vin(&self) -> bool {
        self.vin.is_some()
    }

    pub fn identity_key(&self) -> IdentityKey {
        IdentityKey::of(self)
    }
}

/// Normalise a raw VIN field: blank or mask-only values are absent.
pub fn normalize_vin(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.chars().all(|c| c == layout::VIN_MASK_CHAR) {
        None
    } else {
        Some(trimmed.to_uppercase())
    }
}

/// Trim, uppercase and collapse internal whitespace runs.
pub fn normalize_label(raw: &str) -> String {
    raw.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_uppercase()
}

/// Equality key used to decide whether two records describe the same
/// physical registration.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum IdentityKey {
    Vin(String),
    Synthetic {
        make: String,
        model: String,
        date: NaiveDate,
    },
}

impl IdentityKey {
    pub fn of(record: &RegistrationRecord) -> Self {
        match &record.vin {
            Some(vin) => IdentityKey::Vin(vin.trim().to_uppercase()),
            None => IdentityKey::Synthetic {
                make: normalize_label(&record.make),
                model: normalize_label(&record.model),
                date: record.registration_date,
            },
        }
    }
}

impl fmt::Display for IdentityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdentityKey::Vin(vin) => write!(f, "vin:{}", vin),
            IdentityKey::Synthetic { make, model, date } => {
                write!(f, "{}|{}|{}", make, model, date)
            }
        }
    }
}

/// Text encoding of the authority's fixed-width files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SourceEncoding {
    /// ISO-8859-1; every byte maps to one character
    #[default]
    Latin1,
    Utf8,
}

impl SourceEncoding {
    pub fn name(&self) -> &'static str {
        match self {
            SourceEncoding::Latin1 => "ISO-8859-1",
            SourceEncoding::Utf8 => "UTF-8",
        }
    }

    /// Decode one line; `None` when the bytes are not valid in this encoding.
    pub fn decode(&self, bytes: &[u8]) -> Option<String> {
        match self {
            SourceEncoding::Latin1 => Some(bytes.iter().map(|&b| char::from(b)).collect()),
            SourceEncoding::Utf8 => std::str::from_utf8(bytes).ok().map(str::to_owned),
        }
    }
}

/// A calendar month, the unit of persistence
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct YearMonth {
    pub year: i32,
    pub month: u32,
}

impl YearMonth {
    pub fn new(year: i32, month: u32) -> Result<Self> {
        if !(1..=12).contains(&month) {
            return Err(PipelineError::configuration(format!(
                "month must be between 1 and 12, got {}",
                month
            )));
        }
        Ok(Self { year, month })
    }

    pub fn of(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn first_day(&self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year, self.month, 1)
    }

    pub fn last_day(&self) -> Option<NaiveDate> {
        let (year, month) = if self.month == 12 {
            (self.year + 1, 1)
        } else {
            (self.year, self.month + 1)
        };
        NaiveDate::from_ymd_opt(year, month, 1).and_then(|d| d.pred_opt())
    }

    /// `ev_data_2025_02.csv`
    pub fn dataset_file_name(&self) -> String {
        format!(
            "{}{}_{:02}.{}",
            dataset::FILE_PREFIX,
            self.year,
            self.month,
            dataset::FILE_EXTENSION
        )
    }

    /// Glob matching every raw file of the month, e.g. `export_mat_202502*.txt`
    pub fn raw_file_glob(&self) -> String {
        format!(
            "{}{}{:02}*.{}",
            DAILY_FILE_PREFIX, self.year, self.month, RAW_FILE_EXTENSION
        )
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{:02}", self.year, self.month)
    }
}

/// Inclusive range of calendar dates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if start > end {
            return Err(PipelineError::InvalidDateRange { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn single(date: NaiveDate) -> Self {
        Self {
            start: date,
            end: date,
        }
    }

    /// Every day of the given month, leap years included.
    pub fn for_month(year_month: YearMonth) -> Result<Self> {
        match (year_month.first_day(), year_month.last_day()) {
            (Some(start), Some(end)) => Self::new(start, end),
            _ => Err(PipelineError::configuration(format!(
                "month {} is outside the supported calendar",
                year_month
            ))),
        }
    }

    pub fn days(&self) -> impl Iterator<Item = NaiveDate> + use<> {
        let end = self.end;
        self.start.iter_days().take_while(move |d| *d <= end)
    }

    pub fn day_count(&self) -> usize {
        (self.end - self.start).num_days() as usize + 1
    }

    /// Months touched by the range, in calendar order.
    pub fn months(&self) -> Vec<YearMonth> {
        let mut months: Vec<YearMonth> = self.days().map(YearMonth::of).collect();
        months.dedup();
        months
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..={}", self.start, self.end)
    }
}

/// Name of the raw file for a date, e.g. `export_mat_20250201.txt`
pub fn raw_file_name(date: NaiveDate) -> String {
    format!(
        "{}{}.{}",
        DAILY_FILE_PREFIX,
        date.format("%Y%m%d"),
        RAW_FILE_EXTENSION
    )
}

/// Result of acquiring one date's file
#[derive(Debug)]
pub enum FetchOutcome {
    /// Destination already existed and `force` was not set; no network access
    AlreadyPresent,
    /// Downloaded and written into place
    Fetched { bytes: u64, attempts: u32 },
    /// Terminal failure, or retries exhausted
    Failed { error: FetchError, attempts: u32 },
}

impl FetchOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            FetchOutcome::AlreadyPresent => "skipped",
            FetchOutcome::Fetched { .. } => "fetched",
            FetchOutcome::Failed { .. } => "failed",
        }
    }
}

/// Aggregate counts over an acquisition batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcquisitionSummary {
    pub skipped: usize,
    pub fetched: usize,
    pub failed: usize,
}

impl AcquisitionSummary {
    pub fn total(&self) -> usize {
        self.skipped + self.fetched + self.failed
    }

    pub fn record(&mut self, outcome: &FetchOutcome) {
        match outcome {
            FetchOutcome::AlreadyPresent => self.skipped += 1,
            FetchOutcome::Fetched { .. } => self.fetched += 1,
            FetchOutcome::Failed { .. } => self.failed += 1,
        }
    }
}

/// Per-date outcomes plus their aggregate, for one scheduler invocation
#[derive(Debug, Default)]
pub struct AcquisitionReport {
    pub outcomes: BTreeMap<NaiveDate, FetchOutcome>,
    pub summary: AcquisitionSummary,
}

impl AcquisitionReport {
    pub fn insert(&mut self, date: NaiveDate, outcome: FetchOutcome) {
        self.summary.record(&outcome);
        self.outcomes.insert(date, outcome);
    }

    pub fn failed(&self) -> impl Iterator<Item = (&NaiveDate, &FetchError)> {
        self.outcomes.iter().filter_map(|(date, outcome)| match outcome {
            FetchOutcome::Failed { error, .. } => Some((date, error)),
            _ => None,
        })
    }

    pub fn dates_with(&self, label: &str) -> Vec<NaiveDate> {
        self.outcomes
            .iter()
            .filter(|(_, outcome)| outcome.label() == label)
            .map(|(date, _)| *date)
            .collect()
    }
}
