//! File artifacts: per-city CSV snapshots, the cumulative master CSV, and run state JSON.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::record::{PermitRecord, COLUMNS};

pub const MASTER_FILE: &str = "master_permits.csv";
pub const STATE_FILE: &str = "last_run.json";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("i/o error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("csv error in {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("state file {path} is not valid JSON: {source}")]
    State {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl StoreError {
    fn io(path: &Path, source: io::Error) -> Self {
        StoreError::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    fn csv(path: &Path, source: csv::Error) -> Self {
        StoreError::Csv {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Bookkeeping for one city across runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CityState {
    /// Time of the last successful collection.
    pub last_run: Option<DateTime<Utc>>,
    pub permits_found: usize,
    pub last_file: Option<String>,
    pub last_error: Option<String>,
}

/// Contents of `last_run.json`, keyed by city key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunState {
    cities: BTreeMap<String, CityState>,
}

impl RunState {
    pub fn city(&self, key: &str) -> Option<&CityState> {
        self.cities.get(key)
    }

    pub fn record_success(
        &mut self,
        key: &str,
        at: DateTime<Utc>,
        permits_found: usize,
        file: Option<&Path>,
    ) {
        self.cities.insert(
            key.to_string(),
            CityState {
                last_run: Some(at),
                permits_found,
                last_file: file.map(|path| path.display().to_string()),
                last_error: None,
            },
        );
    }

    /// Notes the error while keeping the last success intact.
    pub fn record_failure(&mut self, key: &str, error: impl Into<String>) {
        self.cities.entry(key.to_string()).or_default().last_error = Some(error.into());
    }

    /// True when the city's last success is younger than `window`.
    pub fn recently_succeeded(&self, key: &str, now: DateTime<Utc>, window: Duration) -> bool {
        self.city(key)
            .and_then(|state| state.last_run)
            .is_some_and(|last_run| now - last_run < window)
    }
}

/// Owns the output and state directories.
#[derive(Debug, Clone)]
pub struct PermitStore {
    output_dir: PathBuf,
    state_dir: PathBuf,
}

impl PermitStore {
    pub fn new(output_dir: impl Into<PathBuf>, state_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            state_dir: state_dir.into(),
        }
    }

    pub fn master_path(&self) -> PathBuf {
        self.output_dir.join(MASTER_FILE)
    }

    pub fn state_path(&self) -> PathBuf {
        self.state_dir.join(STATE_FILE)
    }

    pub fn city_path(&self, city_key: &str, day: NaiveDate) -> PathBuf {
        self.output_dir
            .join(format!("{city_key}_permits_{}.csv", day.format("%Y%m%d")))
    }

    /// Writes one city's records for the day, replacing an earlier file from the same day.
    pub fn write_city_file(
        &self,
        city_key: &str,
        day: NaiveDate,
        records: &[PermitRecord],
    ) -> Result<PathBuf, StoreError> {
        let path = self.city_path(city_key, day);
        write_records(&path, records)?;
        Ok(path)
    }

    /// Reads the master dataset. A missing file is an empty dataset.
    pub fn load_master(&self) -> Result<Vec<PermitRecord>, StoreError> {
        let path = self.master_path();
        let file = match File::open(&path) {
            Ok(file) => file,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(StoreError::io(&path, err)),
        };

        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::Fields)
            .from_reader(file);
        reader
            .deserialize::<PermitRecord>()
            .collect::<Result<Vec<_>, _>>()
            .map_err(|err| StoreError::csv(&path, err))
    }

    /// Replaces the master file; readers never observe a half-written file.
    pub fn write_master(&self, records: &[PermitRecord]) -> Result<PathBuf, StoreError> {
        let path = self.master_path();
        let staging = path.with_extension("csv.tmp");
        write_records(&staging, records)?;
        fs::rename(&staging, &path).map_err(|err| StoreError::io(&path, err))?;
        Ok(path)
    }

    /// Reads run state, treating a missing or unreadable file as empty.
    pub fn load_state(&self) -> RunState {
        let path = self.state_path();
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(err) => {
                if err.kind() != io::ErrorKind::NotFound {
                    tracing::warn!(path = %path.display(), error = %err, "run state unreadable");
                }
                return RunState::default();
            }
        };

        serde_json::from_str(&raw).unwrap_or_else(|err| {
            tracing::warn!(path = %path.display(), error = %err, "run state corrupt, starting fresh");
            RunState::default()
        })
    }

    pub fn save_state(&self, state: &RunState) -> Result<(), StoreError> {
        let path = self.state_path();
        ensure_parent(&path)?;
        let body = serde_json::to_string_pretty(state).map_err(|source| StoreError::State {
            path: path.clone(),
            source,
        })?;
        fs::write(&path, body).map_err(|err| StoreError::io(&path, err))
    }
}

fn ensure_parent(path: &Path) -> Result<(), StoreError> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            fs::create_dir_all(parent).map_err(|err| StoreError::io(parent, err))
        }
        _ => Ok(()),
    }
}

fn write_records(path: &Path, records: &[PermitRecord]) -> Result<(), StoreError> {
    ensure_parent(path)?;
    let file = File::create(path).map_err(|err| StoreError::io(path, err))?;

    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .quote_style(csv::QuoteStyle::Necessary)
        .from_writer(file);
    writer
        .write_record(COLUMNS)
        .map_err(|err| StoreError::csv(path, err))?;
    for record in records {
        writer
            .serialize(record)
            .map_err(|err| StoreError::csv(path, err))?;
    }
    writer.flush().map_err(|err| StoreError::io(path, err))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record(city: &str, permit_id: &str, description: &str) -> PermitRecord {
        let day = NaiveDate::from_ymd_opt(2025, 9, 30).expect("valid date");
        PermitRecord {
            city: city.to_string(),
            permit_id: permit_id.to_string(),
            issue_date: day,
            full_address: "100 Main St".to_string(),
            area: "SOMA".to_string(),
            zip_code: if permit_id.ends_with('1') {
                Some("94103".to_string())
            } else {
                None
            },
            description: description.to_string(),
            estimated_cost: 2_500_000,
            contractor_name: "Skyline Construction".to_string(),
            contractor_license: "N/A".to_string(),
            applicant_name: "N/A".to_string(),
            owner_name: "N/A".to_string(),
            architect_name: "N/A".to_string(),
            license_status: "Active".to_string(),
            business_address: "N/A".to_string(),
            business_phone: "N/A".to_string(),
            data_source: "DataSF Building Permits".to_string(),
            scraped_at: day.and_hms_opt(14, 5, 9).expect("valid time"),
        }
    }

    #[test]
    fn master_round_trips_through_disk() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = PermitStore::new(dir.path().join("output"), dir.path().join("state"));
        let records = vec![
            record("San Francisco", "SF-1", "Tower, with \"quoted\" retail podium"),
            record("San Francisco", "SF-2", "Plain description"),
        ];

        store.write_master(&records).expect("master written");
        let loaded = store.load_master().expect("master loads");
        assert_eq!(loaded, records);
        assert!(!store.master_path().with_extension("csv.tmp").exists());
    }

    #[test]
    fn csv_uses_minimal_quoting_and_fixed_header() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = PermitStore::new(dir.path(), dir.path());
        let day = NaiveDate::from_ymd_opt(2025, 10, 1).expect("valid date");
        let path = store
            .write_city_file("sf", day, &[record("San Francisco", "SF-2", "Mixed, use")])
            .expect("city file written");

        assert!(path.ends_with("sf_permits_20251001.csv"));
        let body = fs::read_to_string(&path).expect("readable");
        let mut lines = body.lines();
        assert_eq!(lines.next(), Some(COLUMNS.join(",").as_str()));
        let row = lines.next().expect("data row");
        assert!(row.starts_with("San Francisco,SF-2,2025-09-30,100 Main St,SOMA,,\"Mixed, use\",2500000,"));
        assert!(row.ends_with(",DataSF Building Permits,2025-09-30 14:05:09"));
    }

    #[test]
    fn empty_dataset_still_writes_header() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = PermitStore::new(dir.path(), dir.path());
        store.write_master(&[]).expect("master written");
        assert_eq!(store.load_master().expect("loads"), Vec::new());
    }

    #[test]
    fn missing_master_is_empty_and_corrupt_master_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = PermitStore::new(dir.path(), dir.path());
        assert!(store.load_master().expect("missing file is fine").is_empty());

        fs::write(store.master_path(), "city,permit_id\nnyc\n").expect("write garbage");
        assert!(matches!(store.load_master(), Err(StoreError::Csv { .. })));
    }

    #[test]
    fn state_tracks_success_and_failure_per_city() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = PermitStore::new(dir.path(), dir.path().join("state"));
        let at = Utc.with_ymd_and_hms(2025, 10, 1, 12, 0, 0).unwrap();

        let mut state = store.load_state();
        state.record_success("nyc", at, 4, Some(Path::new("output/nyc_permits_20251001.csv")));
        state.record_failure("nyc", "source unavailable: timeout");
        state.record_failure("la", "source unavailable: HTTP 503");
        store.save_state(&state).expect("state saved");

        let reloaded = store.load_state();
        assert_eq!(reloaded, state);
        let nyc = reloaded.city("nyc").expect("nyc state");
        assert_eq!(nyc.last_run, Some(at));
        assert_eq!(nyc.permits_found, 4);
        assert_eq!(nyc.last_error.as_deref(), Some("source unavailable: timeout"));
        assert_eq!(reloaded.city("la").and_then(|s| s.last_run), None);

        let window = Duration::minutes(60);
        assert!(reloaded.recently_succeeded("nyc", at + Duration::minutes(30), window));
        assert!(!reloaded.recently_succeeded("nyc", at + Duration::minutes(61), window));
        assert!(!reloaded.recently_succeeded("la", at, window));
    }

    #[test]
    fn corrupt_state_is_treated_as_empty() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = PermitStore::new(dir.path(), dir.path());
        fs::write(store.state_path(), "{ not json").expect("write garbage");
        assert_eq!(store.load_state(), RunState::default());
    }
}
