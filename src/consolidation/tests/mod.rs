//! Consolidation engine tests over real files in temporary directories

pub mod idempotence_tests;

use crate::config::PipelineConfig;
use crate::test_support::{FixtureLine, write_raw_file};
use chrono::NaiveDate;
use std::path::{Path, PathBuf};

pub(crate) fn date(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 2, day).unwrap()
}

pub(crate) fn test_config(root: &Path) -> PipelineConfig {
    PipelineConfig::rooted_at(root).with_workers(2)
}

/// Write `export_mat_202502DD.txt` into the config's data directory
pub(crate) fn write_day(config: &PipelineConfig, day: u32, lines: &[FixtureLine]) -> PathBuf {
    let rendered: Vec<String> = lines.iter().map(FixtureLine::render).collect();
    write_raw_file(
        &config.data_dir,
        &format!("export_mat_202502{:02}.txt", day),
        &rendered,
    )
}

pub(crate) fn bev(make: &str, model: &str, vin: &str) -> FixtureLine {
    FixtureLine::new(make, model, vin, "BEV")
}
