//! Repeated and forced consolidation

use super::{bev, date, test_config, write_day};
use crate::consolidation::{ConsolidationEngine, DayStatus, MonthlyDataset};
use crate::models::{DateRange, YearMonth};
use crate::test_support::FixtureLine;
use std::fs;
use tempfile::TempDir;

#[tokio::test]
async fn test_rerun_without_force_changes_nothing() {
    let temp_dir = TempDir::new().unwrap();
    let config = test_config(temp_dir.path());
    let path = write_day(
        &config,
        1,
        &[
            bev("TESLA", "MODEL 3", "VIN00000000000001"),
            bev("RENAULT", "MEGANE", ""),
        ],
    );
    let engine = ConsolidationEngine::new(&config);
    engine.consolidate_file(&path, false).await.unwrap();

    let month = YearMonth::new(2025, 2).unwrap();
    let dataset_path = MonthlyDataset::path_in(&config.output_dir, month);
    let before = fs::read(&dataset_path).unwrap();
    let modified = fs::metadata(&dataset_path).unwrap().modified().unwrap();

    let status = engine.consolidate_file(&path, false).await.unwrap();

    assert_eq!(status, DayStatus::AlreadyMerged);
    assert_eq!(fs::read(&dataset_path).unwrap(), before);
    assert_eq!(fs::metadata(&dataset_path).unwrap().modified().unwrap(), modified);
}

#[tokio::test]
async fn test_forced_rerun_of_identical_data_is_unchanged() {
    let temp_dir = TempDir::new().unwrap();
    let config = test_config(temp_dir.path());
    let path = write_day(&config, 2, &[bev("KIA", "EV6", "VIN00000000000002")]);
    let engine = ConsolidationEngine::new(&config);
    engine.consolidate_file(&path, false).await.unwrap();

    let month = YearMonth::new(2025, 2).unwrap();
    let dataset_path = MonthlyDataset::path_in(&config.output_dir, month);
    let before = fs::read(&dataset_path).unwrap();

    let status = engine.consolidate_file(&path, true).await.unwrap();

    match status {
        DayStatus::Merged(day) => {
            assert!(!day.merge.changed());
            assert_eq!(day.merge.unchanged, 1);
        }
        other => panic!("expected merge, got {:?}", other),
    }
    assert_eq!(fs::read(&dataset_path).unwrap(), before);
}

#[tokio::test]
async fn test_forced_rerun_absorbs_correction() {
    let temp_dir = TempDir::new().unwrap();
    let config = test_config(temp_dir.path());
    write_day(&config, 3, &[bev("TESLA", "MODEL 3", "VIN00000000000003")]);
    let engine = ConsolidationEngine::new(&config);
    let month = YearMonth::new(2025, 2).unwrap();
    engine.consolidate_month(month, false).await.unwrap();

    // The authority republishes the day with a corrected model
    let path = write_day(
        &config,
        3,
        &[bev("TESLA", "MODEL 3 LONG RANGE", "VIN00000000000003")],
    );

    let unforced = engine.consolidate_file(&path, false).await.unwrap();
    assert_eq!(unforced, DayStatus::AlreadyMerged);

    let forced = engine.consolidate_file(&path, true).await.unwrap();
    assert!(matches!(forced, DayStatus::Merged(day) if day.merge.replaced == 1));

    let dataset = MonthlyDataset::load_or_empty(&config.output_dir, month).unwrap();
    assert_eq!(dataset.len(), 1);
    assert_eq!(
        dataset.records.values().next().unwrap().model,
        "MODEL 3 LONG RANGE"
    );
}

#[tokio::test]
async fn test_month_rerun_reports_already_merged() {
    let temp_dir = TempDir::new().unwrap();
    let config = test_config(temp_dir.path());
    write_day(&config, 1, &[bev("TESLA", "MODEL 3", "VIN00000000000001")]);
    write_day(&config, 2, &[bev("TESLA", "MODEL Y", "VIN00000000000002")]);
    let engine = ConsolidationEngine::new(&config);
    let month = YearMonth::new(2025, 2).unwrap();

    let first = engine.consolidate_month(month, false).await.unwrap();
    assert_eq!(first.totals.inserted, 2);

    let second = engine.consolidate_month(month, false).await.unwrap();
    assert_eq!(second.count("already-merged"), 2);
    assert!(!second.totals.changed());
}

/// The same vehicle published on Feb 1 and again on Feb 2
fn write_shared_vin_days(config: &crate::config::PipelineConfig) {
    write_day(
        config,
        1,
        &[
            bev("TESLA", "MODEL 3", "5YJ3E7EB1NF000001"),
            bev("CUPRA", "BORN", "VSSZZZK1ZPP000002"),
        ],
    );
    write_day(
        config,
        2,
        &[
            bev("TESLA", "MODEL 3", "5YJ3E7EB1NF000001"),
            bev("KIA", "EV6", "KNAC381A5N5000003"),
        ],
    );
}

#[tokio::test]
async fn test_vin_shared_across_days_reruns_cleanly() {
    let temp_dir = TempDir::new().unwrap();
    let config = test_config(temp_dir.path());
    write_shared_vin_days(&config);
    let engine = ConsolidationEngine::new(&config);
    let month = YearMonth::new(2025, 2).unwrap();
    let dataset_path = MonthlyDataset::path_in(&config.output_dir, month);

    let first = engine.consolidate_month(month, false).await.unwrap();
    assert_eq!(first.totals.inserted, 3);
    assert_eq!(first.totals.replaced, 1);
    let before = fs::read(&dataset_path).unwrap();

    for _ in 0..2 {
        let again = engine.consolidate_month(month, false).await.unwrap();
        assert_eq!(again.count("already-merged"), 2);
        assert!(!again.totals.changed());
        assert_eq!(again.totals.unchanged, 0);
        assert_eq!(fs::read(&dataset_path).unwrap(), before);
    }

    // Feb 1 contributes no surviving record yet is still known as merged
    let status = engine.consolidate_day(date(1), false).await.unwrap();
    assert_eq!(status, DayStatus::AlreadyMerged);
}

#[tokio::test]
async fn test_forced_earlier_day_keeps_later_registration() {
    let temp_dir = TempDir::new().unwrap();
    let config = test_config(temp_dir.path());
    write_shared_vin_days(&config);
    let engine = ConsolidationEngine::new(&config);
    let month = YearMonth::new(2025, 2).unwrap();
    engine.consolidate_month(month, false).await.unwrap();
    let dataset_path = MonthlyDataset::path_in(&config.output_dir, month);
    let before = fs::read(&dataset_path).unwrap();

    let status = engine.consolidate_day(date(1), true).await.unwrap();
    match status {
        DayStatus::Merged(day) => {
            assert_eq!(day.merge.replaced, 0);
            assert_eq!(day.merge.unchanged, 2);
        }
        other => panic!("expected merge, got {:?}", other),
    }
    assert_eq!(fs::read(&dataset_path).unwrap(), before);

    let content = fs::read_to_string(&dataset_path).unwrap();
    let tesla = content.lines().find(|l| l.starts_with("TESLA")).unwrap();
    assert!(tesla.ends_with(",2025-02-02,export_mat_20250202.txt"));
}

#[tokio::test]
async fn test_day_order_does_not_change_result() {
    let forward_dir = TempDir::new().unwrap();
    let forward = test_config(forward_dir.path());
    write_shared_vin_days(&forward);
    ConsolidationEngine::new(&forward)
        .consolidate_range(&DateRange::new(date(1), date(2)).unwrap(), false)
        .await
        .unwrap();

    let backward_dir = TempDir::new().unwrap();
    let backward = test_config(backward_dir.path());
    write_shared_vin_days(&backward);
    let engine = ConsolidationEngine::new(&backward);
    engine.consolidate_day(date(2), false).await.unwrap();
    engine.consolidate_day(date(1), false).await.unwrap();

    let month = YearMonth::new(2025, 2).unwrap();
    assert_eq!(
        fs::read(MonthlyDataset::path_in(&forward.output_dir, month)).unwrap(),
        fs::read(MonthlyDataset::path_in(&backward.output_dir, month)).unwrap()
    );
}

#[tokio::test]
async fn test_day_without_bev_is_remembered() {
    let temp_dir = TempDir::new().unwrap();
    let config = test_config(temp_dir.path());
    write_day(
        &config,
        6,
        &[FixtureLine::new("SEAT", "IBIZA", "VSSZZZKJZNR000006", "GASOLINA")],
    );
    let engine = ConsolidationEngine::new(&config);
    let month = YearMonth::new(2025, 2).unwrap();

    let first = engine.consolidate_day(date(6), false).await.unwrap();
    assert!(matches!(first, DayStatus::Merged(day) if !day.merge.changed()));
    assert!(!MonthlyDataset::path_in(&config.output_dir, month).exists());
    assert!(MonthlyDataset::ledger_path_in(&config.output_dir, month).is_file());

    let second = engine.consolidate_day(date(6), false).await.unwrap();
    assert_eq!(second, DayStatus::AlreadyMerged);
}
