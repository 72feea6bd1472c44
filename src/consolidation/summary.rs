//! Read-only monthly summary computed from a persisted dataset

use super::dataset::read_frame;
use crate::constants::dataset::{COL_MAKE, COL_MODEL, COL_REGISTRATION_DATE};
use crate::error::{PipelineError, Result};
use crate::models::YearMonth;
use polars::prelude::*;
use std::path::Path;

const COUNT_COLUMN: &str = "registrations";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonthlySummary {
    pub month: YearMonth,
    pub total_records: usize,
    pub unique_makes: usize,
    pub unique_models: usize,
    /// `(make, registrations)`, most registrations first
    pub top_makes: Vec<(String, u64)>,
    /// `(make, model, registrations)`, most registrations first
    pub top_models: Vec<(String, String, u64)>,
    /// `(YYYY-MM-DD, registrations)` in date order
    pub per_day: Vec<(String, u64)>,
}

impl MonthlySummary {
    /// Summarise the dataset file at `path`. Ties in the top tables are
    /// broken alphabetically.
    pub fn from_file(path: &Path, month: YearMonth, top_n: usize) -> Result<Self> {
        if !path.is_file() {
            return Err(PipelineError::DatasetMissing {
                path: path.to_path_buf(),
            });
        }
        Self::from_frame(read_frame(path)?, month, top_n)
    }

    pub fn from_frame(df: DataFrame, month: YearMonth, top_n: usize) -> Result<Self> {
        let total_records = df.height();
        let unique_makes = df.column(COL_MAKE)?.as_materialized_series().n_unique()?;
        let unique_models = df.column(COL_MODEL)?.as_materialized_series().n_unique()?;

        let top_makes = counted(&df, &[COL_MAKE], true, Some(top_n))?;
        let top_makes = top_makes
            .into_iter()
            .map(|(mut keys, count)| (keys.remove(0), count))
            .collect();

        let top_models = counted(&df, &[COL_MAKE, COL_MODEL], true, Some(top_n))?;
        let top_models = top_models
            .into_iter()
            .map(|(mut keys, count)| {
                let model = keys.pop().unwrap_or_default();
                let make = keys.pop().unwrap_or_default();
                (make, model, count)
            })
            .collect();

        let per_day = counted(&df, &[COL_REGISTRATION_DATE], false, None)?;
        let per_day = per_day
            .into_iter()
            .map(|(mut keys, count)| (keys.remove(0), count))
            .collect();

        Ok(Self {
            month,
            total_records,
            unique_makes,
            unique_models,
            top_makes,
            top_models,
            per_day,
        })
    }
}

/// Group by `keys` and count rows. Ordered by count descending when
/// `by_count`, otherwise by the keys.
fn counted(
    df: &DataFrame,
    keys: &[&str],
    by_count: bool,
    limit: Option<usize>,
) -> Result<Vec<(Vec<String>, u64)>> {
    let key_exprs: Vec<Expr> = keys.iter().map(|k| col(*k)).collect();

    let (sort_exprs, descending) = if by_count {
        let mut exprs = vec![col(COUNT_COLUMN)];
        exprs.extend(key_exprs.iter().cloned());
        let mut descending = vec![true];
        descending.extend(keys.iter().map(|_| false));
        (exprs, descending)
    } else {
        (key_exprs.clone(), keys.iter().map(|_| false).collect())
    };

    let mut grouped = df
        .clone()
        .lazy()
        .group_by(key_exprs)
        .agg([len().alias(COUNT_COLUMN)])
        .sort_by_exprs(
            sort_exprs,
            SortMultipleOptions::default().with_order_descending_multi(descending),
        );
    if let Some(n) = limit {
        grouped = grouped.limit(n as IdxSize);
    }
    let grouped = grouped.collect()?;

    let key_columns = keys
        .iter()
        .map(|k| {
            grouped
                .column(k)
                .and_then(|c| c.as_materialized_series().str().cloned())
        })
        .collect::<PolarsResult<Vec<StringChunked>>>()?;
    let counts = grouped
        .column(COUNT_COLUMN)?
        .cast(&DataType::UInt64)?;
    let counts = counts.as_materialized_series().u64()?.clone();

    let rows = (0..grouped.height())
        .map(|row| {
            let keys = key_columns
                .iter()
                .map(|c| c.get(row).unwrap_or_default().to_string())
                .collect();
            (keys, counts.get(row).unwrap_or_default())
        })
        .collect();
    Ok(rows)
}
