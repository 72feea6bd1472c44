//! Record deduplication by identity key
//!
//! Deduplication runs in two phases: within one day's records, then against
//! the month's persisted dataset. Both phases resolve collisions with the
//! same [`prefers`] rule:
//! 1. A record with a VIN beats one without
//! 2. Otherwise the later registration date wins
//! 3. On equal dates the later-seen record wins (treated as an amendment)
//!
//! Ordering by date keeps the outcome independent of the order in which
//! days are merged.

use crate::consolidation::MonthlyDataset;
use crate::models::{IdentityKey, RegistrationRecord};
use std::collections::HashMap;
use std::collections::btree_map::Entry;
use tracing::debug;

/// Whether `candidate`, seen after `incumbent`, should replace it
pub fn prefers(candidate: &RegistrationRecord, incumbent: &RegistrationRecord) -> bool {
    match (candidate.has_vin(), incumbent.has_vin()) {
        (true, false) => return true,
        (false, true) => return false,
        _ => {}
    }
    candidate.registration_date >= incumbent.registration_date
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DedupStats {
    pub input: usize,
    pub unique: usize,
}

impl DedupStats {
    pub fn duplicates(&self) -> usize {
        self.input - self.unique
    }
}

/// Collapse one day's records to unique identity keys.
///
/// Output keeps the position of each key's first occurrence, holding the
/// content of the record [`prefers`] selects.
pub fn dedupe_day(records: Vec<RegistrationRecord>) -> (Vec<RegistrationRecord>, DedupStats) {
    let input = records.len();
    let mut positions: HashMap<IdentityKey, usize> = HashMap::with_capacity(input);
    let mut unique: Vec<RegistrationRecord> = Vec::with_capacity(input);

    for record in records {
        match positions.get(&record.identity_key()) {
            Some(&index) => {
                if prefers(&record, &unique[index]) {
                    unique[index] = record;
                }
            }
            None => {
                positions.insert(record.identity_key(), unique.len());
                unique.push(record);
            }
        }
    }

    let stats = DedupStats {
        input,
        unique: unique.len(),
    };
    if stats.duplicates() > 0 {
        debug!(
            "Resolved {} duplicate records, {} remaining",
            stats.duplicates(),
            stats.unique
        );
    }
    (unique, stats)
}

/// Outcome of merging one day into a monthly dataset
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeStats {
    pub inserted: usize,
    pub replaced: usize,
    pub unchanged: usize,
}

impl MergeStats {
    pub fn changed(&self) -> bool {
        self.inserted + self.replaced > 0
    }

    pub fn absorb(&mut self, other: MergeStats) {
        self.inserted += other.inserted;
        self.replaced += other.replaced;
        self.unchanged += other.unchanged;
    }
}

/// Merge already day-deduplicated records into `dataset`.
///
/// A record identical to the one stored under its key counts as unchanged,
/// so merging the same input twice changes nothing the second time.
pub fn merge_into(dataset: &mut MonthlyDataset, records: Vec<RegistrationRecord>) -> MergeStats {
    let mut stats = MergeStats::default();

    for record in records {
        match dataset.records.entry(record.identity_key()) {
            Entry::Vacant(slot) => {
                slot.insert(record);
                stats.inserted += 1;
            }
            Entry::Occupied(mut slot) => {
                if slot.get() != &record && prefers(&record, slot.get()) {
                    slot.insert(record);
                    stats.replaced += 1;
                } else {
                    stats.unchanged += 1;
                }
            }
        }
    }

    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::YearMonth;
    use chrono::NaiveDate;

    fn record(model: &str, vin: Option<&str>, source: &str) -> RegistrationRecord {
        on_day(model, vin, source, 1)
    }

    fn on_day(model: &str, vin: Option<&str>, source: &str, day: u32) -> RegistrationRecord {
        RegistrationRecord {
            make: "TESLA".to_string(),
            model: model.to_string(),
            vin: vin.map(str::to_string),
            fuel_code: "BEV".to_string(),
            registration_date: NaiveDate::from_ymd_opt(2025, 2, day).unwrap(),
            source_file: source.to_string(),
        }
    }

    fn empty_dataset() -> MonthlyDataset {
        MonthlyDataset::empty(YearMonth::new(2025, 2).unwrap())
    }

    #[test]
    fn test_prefers_vin_then_later() {
        let with_vin = record("MODEL 3", Some("VIN1"), "a");
        let without_vin = record("MODEL 3", None, "b");
        assert!(prefers(&with_vin, &without_vin));
        assert!(!prefers(&without_vin, &with_vin));

        let later = record("MODEL 3", Some("VIN1"), "c");
        assert!(prefers(&later, &with_vin));
    }

    #[test]
    fn test_prefers_later_registration_date() {
        let first = on_day("MODEL 3", Some("VIN1"), "export_mat_20250201.txt", 1);
        let second = on_day("MODEL 3", Some("VIN1"), "export_mat_20250202.txt", 2);
        assert!(prefers(&second, &first));
        // Seen later but registered earlier
        assert!(!prefers(&first, &second));
    }

    #[test]
    fn test_merge_outcome_ignores_day_order() {
        let first = on_day("MODEL 3", Some("VIN1"), "export_mat_20250201.txt", 1);
        let second = on_day("MODEL 3", Some("VIN1"), "export_mat_20250202.txt", 2);

        let mut forward = empty_dataset();
        merge_into(&mut forward, vec![first.clone()]);
        merge_into(&mut forward, vec![second.clone()]);

        let mut backward = empty_dataset();
        merge_into(&mut backward, vec![second.clone()]);
        let stats = merge_into(&mut backward, vec![first]);
        assert_eq!(stats.unchanged, 1);
        assert!(!stats.changed());

        assert_eq!(forward, backward);
        assert_eq!(forward.records.values().next(), Some(&second));
    }

    #[test]
    fn test_same_vin_different_model_padding() {
        let records = vec![
            record("MODEL 3", Some("5YJ3E1EA7KF000001"), "export_mat_20250201.txt"),
            record("MODEL 3 ", Some("5yj3e1ea7kf000001"), "export_mat_20250201.txt"),
        ];

        let (unique, stats) = dedupe_day(records);
        assert_eq!(unique.len(), 1);
        assert_eq!(stats.duplicates(), 1);
        assert!(unique[0].has_vin());
        // Later-seen amendment wins when both carry a VIN
        assert_eq!(unique[0].model, "MODEL 3 ");
    }

    #[test]
    fn test_synthetic_keys_collapse_case_and_whitespace() {
        let records = vec![
            record("Model  Y", None, "x"),
            record("MODEL Y", None, "x"),
            record("MODEL 3", None, "x"),
        ];
        let (unique, _) = dedupe_day(records);
        assert_eq!(unique.len(), 2);
        assert_eq!(unique[0].model, "MODEL Y");
        assert_eq!(unique[1].model, "MODEL 3");
    }

    #[test]
    fn test_dedupe_is_idempotent() {
        let records = vec![
            record("A", Some("V1"), "x"),
            record("B", Some("V2"), "x"),
            record("A2", Some("V1"), "x"),
            record("C", None, "x"),
            record("C", None, "x"),
        ];
        let (once, _) = dedupe_day(records);
        let (twice, stats) = dedupe_day(once.clone());
        assert_eq!(once, twice);
        assert_eq!(stats.duplicates(), 0);
    }

    #[test]
    fn test_merge_counts_and_idempotence() {
        let mut dataset = empty_dataset();
        let day = vec![record("A", Some("V1"), "x"), record("B", None, "x")];

        let first = merge_into(&mut dataset, day.clone());
        assert_eq!(first.inserted, 2);
        assert!(first.changed());

        let second = merge_into(&mut dataset, day);
        assert_eq!(second.unchanged, 2);
        assert!(!second.changed());
        assert_eq!(dataset.len(), 2);
    }

    #[test]
    fn test_merge_applies_amendment() {
        let mut dataset = empty_dataset();
        merge_into(&mut dataset, vec![record("MODEL 3", Some("V1"), "d1")]);

        let stats = merge_into(&mut dataset, vec![record("MODEL 3 LR", Some("V1"), "d2")]);
        assert_eq!(stats.replaced, 1);
        let stored = dataset.records.values().next().unwrap();
        assert_eq!(stored.model, "MODEL 3 LR");
        assert_eq!(stored.source_file, "d2");
    }
}
