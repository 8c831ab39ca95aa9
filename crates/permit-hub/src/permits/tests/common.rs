use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use axum::response::Response;
use serde_json::{json, Value};

use crate::config::PipelineConfig;
use crate::permits::record::{PermitKey, PermitRecord};
use crate::permits::repository::{PermitRepository, RepositoryError, RunRepository};
use crate::permits::run::RunReport;
use crate::permits::service::PermitRunService;
use crate::permits::sources::{RawRow, SourceError, StaticSource};
use crate::permits::{permit_router, CityProfile};

pub(super) type TestService<P = MemoryPermits> = PermitRunService<StaticSource, MemoryRuns, P>;

pub(super) fn row(value: Value) -> RawRow {
    value.as_object().cloned().expect("fixture rows are objects")
}

pub(super) fn nyc_rows() -> Vec<RawRow> {
    vec![
        row(json!({
            "job_filing_number": "B00012345-I1",
            "issued_date": "2025-09-24T00:00:00.000",
            "estimated_job_costs": "5000000",
            "house_no": "350",
            "street_name": "5th Avenue",
            "borough": "MANHATTAN",
            "zip_code": "10118",
            "job_description": "Facade restoration and new curtain wall",
            "applicant_business_name": "Skyline Construction",
            "owner_business_name": "Empire Holdings",
        })),
        row(json!({
            "job_filing_number": "B00067890-I1",
            "issued_date": "2025-09-20",
            "estimated_job_costs": 2500000,
            "house_no": "1",
            "street_name": "Court Square",
            "borough": "QUEENS",
            "job_description": "Interior fit-out of office floors",
            "permittee_s_business_name": "Metro Building Systems",
        })),
        row(json!({
            "job_filing_number": "B00011111-I1",
            "issued_date": "2025-09-21",
            "estimated_job_costs": "500000",
            "house_no": "20",
            "street_name": "Jay Street",
        })),
    ]
}

pub(super) fn chicago_rows() -> Vec<RawRow> {
    vec![row(json!({
        "permit_": "100945",
        "issue_date": "2025-09-18T00:00:00.000",
        "reported_cost": "12500000",
        "street_number": "401",
        "street_direction": "N",
        "street_name": "WABASH",
        "suffix": "AVE",
        "community_area": "8",
        "work_description": "Erect 30 story mixed-use tower",
        "contact_1_type": "OWNER",
        "contact_1_name": "Riverside Holdings",
        "contact_2_type": "CONTRACTOR-ELECTRICAL",
        "contact_2_name": "Spark Co",
        "contact_3_type": "GENERAL CONTRACTOR",
        "contact_3_name": "Crown Contractors",
    }))]
}

pub(super) fn la_rows() -> Vec<RawRow> {
    vec![
        row(json!({
            "pcis_permit": "LA-1001",
            "issue_date": "2025-09-15T00:00:00",
            "valuation": "1500000.00",
            "address_start": "100",
            "street_direction": "",
            "street_name": "Main",
            "street_suffix": "St",
            "work_description": "New mixed-use building",
            "contractors_business_name": "Pacific Construction Group",
        })),
        row(json!({
            "pcis_permit": "LA-1002",
            "issue_date": "2025-09-16T00:00:00",
            "valuation": "not-a-number",
        })),
    ]
}

pub(super) fn sf_rows() -> Vec<RawRow> {
    vec![row(json!({
        "permit_number": "202509150001",
        "issued_date": "2025-09-18T00:00:00.000",
        "estimated_cost": "2000000",
        "revised_cost": "2600000",
        "street_number": "500",
        "street_name": "Howard",
        "street_suffix": "St",
        "zipcode": "94105",
        "description": "Office tower addition",
        "contractor_name": "Summit Building Corp",
    }))]
}

/// Records the fixtures above produce with the default one-million threshold.
pub(super) const FIXTURE_RECORDS: usize = 5;
pub(super) const FIXTURE_VALUE: u64 = 5_000_000 + 2_500_000 + 12_500_000 + 1_500_000 + 2_600_000;

pub(super) fn full_source() -> StaticSource {
    StaticSource::new()
        .with_rows("nyc", nyc_rows())
        .with_rows("chicago", chicago_rows())
        .with_rows("la", la_rows())
        .with_rows("sf", sf_rows())
}

pub(super) fn unavailable(message: &str) -> SourceError {
    SourceError::Unavailable(message.to_string())
}

pub(super) fn pipeline_config(root: &Path) -> PipelineConfig {
    PipelineConfig {
        output_dir: root.join("output"),
        state_dir: root.join("state"),
        ..PipelineConfig::default()
    }
}

pub(super) fn catalog_city(key: &str) -> CityProfile {
    CityProfile::find(&CityProfile::catalog(), key)
        .cloned()
        .expect("catalog city")
}

pub(super) fn build_service(
    source: StaticSource,
    config: &PipelineConfig,
) -> (Arc<TestService>, Arc<MemoryRuns>, Arc<MemoryPermits>) {
    let runs = Arc::new(MemoryRuns::default());
    let permits = Arc::new(MemoryPermits::default());
    let service = PermitRunService::new(source, config, Arc::clone(&runs), Arc::clone(&permits));
    (Arc::new(service), runs, permits)
}

pub(super) fn router_for(service: Arc<TestService>) -> axum::Router {
    permit_router(service)
}

#[derive(Default)]
pub(super) struct MemoryRuns {
    reports: Mutex<Vec<RunReport>>,
}

impl MemoryRuns {
    pub(super) fn len(&self) -> usize {
        self.reports.lock().expect("run mutex poisoned").len()
    }
}

impl RunRepository for MemoryRuns {
    fn insert(&self, report: RunReport) -> Result<RunReport, RepositoryError> {
        let mut guard = self.reports.lock().expect("run mutex poisoned");
        if guard.iter().any(|existing| existing.run_id == report.run_id) {
            return Err(RepositoryError::Conflict);
        }
        guard.push(report.clone());
        Ok(report)
    }

    fn update(&self, report: RunReport) -> Result<(), RepositoryError> {
        let mut guard = self.reports.lock().expect("run mutex poisoned");
        match guard
            .iter_mut()
            .find(|existing| existing.run_id == report.run_id)
        {
            Some(existing) => {
                *existing = report;
                Ok(())
            }
            None => Err(RepositoryError::NotFound),
        }
    }

    fn fetch(&self, run_id: &str) -> Result<Option<RunReport>, RepositoryError> {
        let guard = self.reports.lock().expect("run mutex poisoned");
        Ok(guard.iter().find(|report| report.run_id == run_id).cloned())
    }

    fn recent(&self, limit: usize) -> Result<Vec<RunReport>, RepositoryError> {
        let guard = self.reports.lock().expect("run mutex poisoned");
        Ok(guard.iter().rev().take(limit).cloned().collect())
    }
}

#[derive(Default)]
pub(super) struct MemoryPermits {
    records: Mutex<BTreeMap<PermitKey, PermitRecord>>,
}

impl PermitRepository for MemoryPermits {
    fn upsert_many(&self, records: &[PermitRecord]) -> Result<usize, RepositoryError> {
        let mut guard = self.records.lock().expect("permit mutex poisoned");
        for record in records {
            guard.insert(record.key(), record.clone());
        }
        Ok(records.len())
    }

    fn fetch(&self, key: &PermitKey) -> Result<Option<PermitRecord>, RepositoryError> {
        let guard = self.records.lock().expect("permit mutex poisoned");
        Ok(guard.get(key).cloned())
    }

    fn all(&self) -> Result<Vec<PermitRecord>, RepositoryError> {
        let guard = self.records.lock().expect("permit mutex poisoned");
        Ok(guard.values().cloned().collect())
    }
}

pub(super) struct UnavailablePermits;

impl PermitRepository for UnavailablePermits {
    fn upsert_many(&self, _records: &[PermitRecord]) -> Result<usize, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn fetch(&self, _key: &PermitKey) -> Result<Option<PermitRecord>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn all(&self) -> Result<Vec<PermitRecord>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 1 << 20)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
