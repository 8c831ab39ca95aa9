use std::collections::{HashMap, HashSet};

use super::record::{PermitKey, PermitRecord};

/// The reconciled master dataset plus what the run changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeOutcome {
    pub records: Vec<PermitRecord>,
    /// Keys already in the master that the run superseded.
    pub replaced: usize,
    /// Keys the master did not have before.
    pub added: usize,
}

/// Appends `incoming` to `previous` and keeps only the last record seen for each key.
///
/// Survivors keep the position of their last occurrence: untouched master rows stay in place
/// and superseded ones move to where the run delivered them.
pub fn merge_master(previous: Vec<PermitRecord>, incoming: Vec<PermitRecord>) -> MergeOutcome {
    let boundary = previous.len();
    let known: HashSet<PermitKey> = previous.iter().map(PermitRecord::key).collect();
    let combined: Vec<PermitRecord> = previous.into_iter().chain(incoming).collect();

    let mut last_seen: HashMap<PermitKey, usize> = HashMap::with_capacity(combined.len());
    for (index, record) in combined.iter().enumerate() {
        last_seen.insert(record.key(), index);
    }

    let (mut replaced, mut added) = (0, 0);
    for (key, index) in &last_seen {
        if *index < boundary {
            continue;
        }
        if known.contains(key) {
            replaced += 1;
        } else {
            added += 1;
        }
    }

    let records = combined
        .into_iter()
        .enumerate()
        .filter(|(index, record)| last_seen.get(&record.key()) == Some(index))
        .map(|(_, record)| record)
        .collect();

    MergeOutcome {
        records,
        replaced,
        added,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn record(city: &str, permit_id: &str, cost: u64) -> PermitRecord {
        let day = NaiveDate::from_ymd_opt(2025, 9, 30).expect("valid date");
        PermitRecord {
            city: city.to_string(),
            permit_id: permit_id.to_string(),
            issue_date: day,
            full_address: "1 Main St".to_string(),
            area: "N/A".to_string(),
            zip_code: None,
            description: "N/A".to_string(),
            estimated_cost: cost,
            contractor_name: "N/A".to_string(),
            contractor_license: "N/A".to_string(),
            applicant_name: "N/A".to_string(),
            owner_name: "N/A".to_string(),
            architect_name: "N/A".to_string(),
            license_status: "N/A".to_string(),
            business_address: "N/A".to_string(),
            business_phone: "N/A".to_string(),
            data_source: "test".to_string(),
            scraped_at: day.and_hms_opt(12, 0, 0).expect("valid time"),
        }
    }

    fn assert_unique(records: &[PermitRecord]) {
        let keys: HashSet<_> = records.iter().map(PermitRecord::key).collect();
        assert_eq!(keys.len(), records.len(), "duplicate keys in {records:?}");
    }

    #[test]
    fn new_run_supersedes_existing_key() {
        let outcome = merge_master(
            vec![record("nyc", "NYC-1", 5_000_000)],
            vec![
                record("nyc", "NYC-1", 7_000_000),
                record("sf", "SF-1", 2_000_000),
            ],
        );

        assert_eq!(outcome.records.len(), 2);
        let nyc = outcome
            .records
            .iter()
            .find(|r| r.permit_id == "NYC-1")
            .expect("nyc record kept");
        assert_eq!(nyc.estimated_cost, 7_000_000);
        assert_eq!((outcome.replaced, outcome.added), (1, 1));
    }

    #[test]
    fn untouched_master_rows_keep_their_position() {
        let outcome = merge_master(
            vec![
                record("nyc", "A", 2_000_000),
                record("nyc", "B", 3_000_000),
                record("la", "C", 4_000_000),
            ],
            vec![record("nyc", "A", 9_000_000)],
        );

        let ids: Vec<_> = outcome.records.iter().map(|r| r.permit_id.as_str()).collect();
        assert_eq!(ids, ["B", "C", "A"]);
        assert_eq!(outcome.records[2].estimated_cost, 9_000_000);
    }

    #[test]
    fn duplicates_within_a_run_keep_the_last() {
        let outcome = merge_master(
            Vec::new(),
            vec![
                record("chicago", "X", 2_000_000),
                record("chicago", "Y", 3_000_000),
                record("chicago", "X", 4_000_000),
            ],
        );

        assert_unique(&outcome.records);
        assert_eq!(outcome.records.len(), 2);
        assert_eq!(outcome.records[1].estimated_cost, 4_000_000);
        assert_eq!((outcome.replaced, outcome.added), (0, 2));
    }

    #[test]
    fn same_permit_id_in_different_cities_is_distinct() {
        let outcome = merge_master(
            vec![record("nyc", "100", 2_000_000)],
            vec![record("sf", "100", 3_000_000)],
        );
        assert_eq!(outcome.records.len(), 2);
    }

    #[test]
    fn merging_the_same_run_twice_is_idempotent() {
        let master = vec![
            record("nyc", "A", 2_000_000),
            record("nyc", "A", 2_500_000),
            record("la", "B", 3_000_000),
        ];
        let run = vec![
            record("la", "B", 3_500_000),
            record("sf", "C", 4_000_000),
            record("sf", "C", 4_100_000),
        ];

        let once = merge_master(master, run.clone());
        let twice = merge_master(once.records.clone(), run.clone());

        assert_unique(&once.records);
        assert_unique(&twice.records);
        assert_eq!(once.records, twice.records);
        for incoming in &run[..1] {
            assert!(twice.records.contains(incoming));
        }
        assert!(twice.records.contains(&run[2]));
    }

    #[test]
    fn empty_master_takes_the_run_as_is() {
        let run = vec![record("la", "1", 2_000_000), record("la", "2", 2_000_000)];
        let outcome = merge_master(Vec::new(), run.clone());
        assert_eq!(outcome.records, run);
    }
}
