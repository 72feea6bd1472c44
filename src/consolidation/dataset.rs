//! Persisted monthly dataset (`ev_data_YYYY_MM.csv`)
//!
//! Next to each dataset sits a one-column ledger of the raw files merged
//! into it. A raw file stays merged even after every record it contributed
//! has been superseded by a later day.

use crate::constants::dataset::{
    COL_FUEL_CODE, COL_MAKE, COL_MODEL, COL_REGISTRATION_DATE, COL_SOURCE_FILE, COL_VIN, DATE_FORMAT,
    LEDGER_EXTENSION,
};
use crate::error::{PipelineError, Result};
use crate::models::{IdentityKey, RegistrationRecord, YearMonth};
use chrono::NaiveDate;
use polars::prelude::*;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// BEV registrations of one month keyed by identity. Holding the records
/// in a map makes duplicate keys unrepresentable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonthlyDataset {
    pub month: YearMonth,
    pub records: BTreeMap<IdentityKey, RegistrationRecord>,
    /// Raw filenames merged so far, whether or not any of their records survive
    pub merged_sources: BTreeSet<String>,
}

impl MonthlyDataset {
    pub fn empty(month: YearMonth) -> Self {
        Self {
            month,
            records: BTreeMap::new(),
            merged_sources: BTreeSet::new(),
        }
    }

    pub fn path_in(output_dir: &Path, month: YearMonth) -> PathBuf {
        output_dir.join(month.dataset_file_name())
    }

    pub fn ledger_path_in(output_dir: &Path, month: YearMonth) -> PathBuf {
        ledger_path(&Self::path_in(output_dir, month))
    }

    /// Load the month's dataset from `output_dir`, or start empty when the
    /// file does not exist yet. The ledger is read either way: a day with
    /// no BEV registrations leaves a ledger and no dataset.
    pub fn load_or_empty(output_dir: &Path, month: YearMonth) -> Result<Self> {
        let path = Self::path_in(output_dir, month);
        if path.is_file() {
            Self::load(&path, month)
        } else {
            let mut dataset = Self::empty(month);
            dataset.merged_sources = read_ledger(&ledger_path(&path))?;
            Ok(dataset)
        }
    }

    /// Load a dataset file and the ledger beside it, if any
    pub fn load(path: &Path, month: YearMonth) -> Result<Self> {
        let df = read_frame(path)?;
        let corrupt = |reason: String| PipelineError::CorruptDataset {
            path: path.to_path_buf(),
            reason,
        };

        let column = |name: &str| -> Result<StringChunked> {
            let column = df
                .column(name)
                .map_err(|_| corrupt(format!("missing column '{}'", name)))?;
            column
                .as_materialized_series()
                .str()
                .cloned()
                .map_err(|e| corrupt(format!("column '{}': {}", name, e)))
        };
        let makes = column(COL_MAKE)?;
        let models = column(COL_MODEL)?;
        let vins = column(COL_VIN)?;
        let fuels = column(COL_FUEL_CODE)?;
        let dates = column(COL_REGISTRATION_DATE)?;
        let sources = column(COL_SOURCE_FILE)?;

        let mut dataset = Self::empty(month);
        for row in 0..df.height() {
            let required = |values: &StringChunked, name: &str| {
                values
                    .get(row)
                    .map(str::to_string)
                    .ok_or_else(|| corrupt(format!("row {}: '{}' is empty", row + 1, name)))
            };

            let raw_date = required(&dates, COL_REGISTRATION_DATE)?;
            let registration_date = NaiveDate::parse_from_str(&raw_date, DATE_FORMAT)
                .map_err(|_| corrupt(format!("row {}: bad date '{}'", row + 1, raw_date)))?;

            let record = RegistrationRecord {
                make: required(&makes, COL_MAKE)?,
                model: required(&models, COL_MODEL)?,
                vin: vins.get(row).map(str::to_string),
                fuel_code: fuels.get(row).unwrap_or_default().to_string(),
                registration_date,
                source_file: required(&sources, COL_SOURCE_FILE)?,
            };
            dataset.records.insert(record.identity_key(), record);
        }
        dataset.merged_sources = read_ledger(&ledger_path(path))?;

        debug!(
            "Loaded {} records for {} from {}",
            dataset.len(),
            month,
            path.display()
        );
        Ok(dataset)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Whether the named raw file has been merged. Datasets written without
    /// a ledger fall back to the sources of their stored records.
    pub fn contains_source(&self, source_file: &str) -> bool {
        self.merged_sources.contains(source_file)
            || self
                .records
                .values()
                .any(|record| record.source_file == source_file)
    }

    /// Record `source_file` as merged; false if it already was
    pub fn mark_merged(&mut self, source_file: &str) -> bool {
        self.merged_sources.insert(source_file.to_string())
    }

    pub fn sources(&self) -> BTreeSet<&str> {
        self.records
            .values()
            .map(|record| record.source_file.as_str())
            .chain(self.merged_sources.iter().map(String::as_str))
            .collect()
    }

    /// Records in file order: registration date, then identity key
    pub fn ordered(&self) -> Vec<&RegistrationRecord> {
        let mut rows: Vec<(&IdentityKey, &RegistrationRecord)> = self.records.iter().collect();
        rows.sort_by(|(ka, a), (kb, b)| {
            a.registration_date
                .cmp(&b.registration_date)
                .then_with(|| ka.cmp(kb))
        });
        rows.into_iter().map(|(_, record)| record).collect()
    }

    pub fn to_frame(&self) -> Result<DataFrame> {
        let rows = self.ordered();
        let strings = |f: fn(&RegistrationRecord) -> String| -> Vec<String> {
            rows.iter().map(|record| f(record)).collect()
        };

        let vins: Vec<Option<String>> = rows.iter().map(|record| record.vin.clone()).collect();
        let df = DataFrame::new(vec![
            Column::new(COL_MAKE.into(), strings(|r| r.make.clone())),
            Column::new(COL_MODEL.into(), strings(|r| r.model.clone())),
            Column::new(COL_VIN.into(), vins),
            Column::new(COL_FUEL_CODE.into(), strings(|r| r.fuel_code.clone())),
            Column::new(
                COL_REGISTRATION_DATE.into(),
                strings(|r| r.registration_date.format(DATE_FORMAT).to_string()),
            ),
            Column::new(COL_SOURCE_FILE.into(), strings(|r| r.source_file.clone())),
        ])?;
        Ok(df)
    }

    /// Write the dataset, then its ledger, to `output_dir`. Each file goes
    /// through a temporary file renamed into place; a failed save leaves the
    /// previous file untouched.
    pub fn save(&self, output_dir: &Path) -> Result<PathBuf> {
        let path = Self::path_in(output_dir, self.month);
        let mut df = self.to_frame()?;
        write_frame(&mut df, output_dir, &path)?;
        debug!("Persisted {} records to {}", self.len(), path.display());

        self.save_ledger(output_dir)?;
        Ok(path)
    }

    /// Write only the ledger; an empty ledger is not written
    pub fn save_ledger(&self, output_dir: &Path) -> Result<()> {
        if self.merged_sources.is_empty() {
            return Ok(());
        }
        let path = Self::ledger_path_in(output_dir, self.month);
        let sources: Vec<&str> = self.merged_sources.iter().map(String::as_str).collect();
        let mut df = DataFrame::new(vec![Column::new(COL_SOURCE_FILE.into(), sources)])?;
        write_frame(&mut df, output_dir, &path)?;
        debug!(
            "Recorded {} merged source(s) in {}",
            self.merged_sources.len(),
            path.display()
        );
        Ok(())
    }
}

fn ledger_path(dataset_path: &Path) -> PathBuf {
    dataset_path.with_extension(LEDGER_EXTENSION)
}

fn write_frame(df: &mut DataFrame, output_dir: &Path, path: &Path) -> Result<()> {
    fs::create_dir_all(output_dir).map_err(|e| PipelineError::persistence(output_dir, e))?;

    let mut temp = tempfile::Builder::new()
        .prefix(".ev_data_")
        .suffix(".tmp")
        .tempfile_in(output_dir)
        .map_err(|e| PipelineError::persistence(path, e))?;

    CsvWriter::new(temp.as_file_mut())
        .include_header(true)
        .finish(df)
        .map_err(|e| PipelineError::persistence(path, e))?;
    temp.as_file()
        .sync_all()
        .map_err(|e| PipelineError::persistence(path, e))?;
    temp.persist(path)
        .map_err(|e| PipelineError::persistence(path, e.error))?;
    Ok(())
}

/// Merged raw filenames listed in a ledger; none when it does not exist
fn read_ledger(path: &Path) -> Result<BTreeSet<String>> {
    if !path.is_file() {
        return Ok(BTreeSet::new());
    }
    let df = read_frame(path)?;
    let sources = df
        .column(COL_SOURCE_FILE)
        .and_then(|column| column.as_materialized_series().str().cloned())
        .map_err(|e| PipelineError::CorruptDataset {
            path: path.to_path_buf(),
            reason: format!("ledger: {}", e),
        })?;
    Ok(sources.into_iter().flatten().map(str::to_string).collect())
}

/// Read a dataset file with every column as string
pub fn read_frame(path: &Path) -> Result<DataFrame> {
    CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(0))
        .try_into_reader_with_file_path(Some(path.to_path_buf()))
        .and_then(|reader| reader.finish())
        .map_err(|e| PipelineError::CorruptDataset {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
}
