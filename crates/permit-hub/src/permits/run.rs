use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::aggregator::{CityFailure, CityStatus, CitySummary};

/// Lifecycle of a pipeline run: `idle -> running -> completed | partial | failed`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    #[default]
    Idle,
    Running,
    Completed,
    Partial,
    Failed,
}

impl RunStatus {
    pub fn label(&self) -> &'static str {
        match self {
            RunStatus::Idle => "idle",
            RunStatus::Running => "running",
            RunStatus::Completed => "completed",
            RunStatus::Partial => "partial",
            RunStatus::Failed => "failed",
        }
    }

    pub fn is_finished(&self) -> bool {
        matches!(
            self,
            RunStatus::Completed | RunStatus::Partial | RunStatus::Failed
        )
    }

    /// Final status once the master write has been attempted.
    ///
    /// Skipped cities count neither for nor against completion.
    pub fn resolve(summaries: &[CitySummary], master_written: bool) -> RunStatus {
        if !master_written {
            return RunStatus::Failed;
        }

        let all_succeeded = summaries
            .iter()
            .filter(|summary| summary.status != CityStatus::Skipped)
            .all(|summary| summary.status == CityStatus::Succeeded);

        if all_succeeded {
            RunStatus::Completed
        } else {
            RunStatus::Partial
        }
    }
}

/// Optional parameters of a run trigger.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunRequest {
    /// City keys or names; empty means every configured city.
    pub cities: Vec<String>,
    pub force_rescrape: bool,
}

/// One entry of a run's error list. `city` is absent for run-wide failures such as persistence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunError {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    pub error: String,
}

impl RunError {
    pub fn run_wide(error: impl Into<String>) -> Self {
        Self {
            city: None,
            error: error.into(),
        }
    }
}

impl From<CityFailure> for RunError {
    fn from(failure: CityFailure) -> Self {
        Self {
            city: Some(failure.city_key),
            error: failure.error,
        }
    }
}

/// The externally observed outcome of a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    pub run_id: String,
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    pub duration_seconds: f64,
    pub total_records: usize,
    pub total_value: u64,
    /// Size of the master dataset after the merge.
    pub master_records: usize,
    pub city_summaries: Vec<CitySummary>,
    pub errors: Vec<RunError>,
}

impl RunReport {
    pub fn started(run_id: String, started_at: DateTime<Utc>) -> Self {
        Self {
            run_id,
            status: RunStatus::Running,
            started_at,
            finished_at: None,
            duration_seconds: 0.0,
            total_records: 0,
            total_value: 0,
            master_records: 0,
            city_summaries: Vec::new(),
            errors: Vec::new(),
        }
    }

    pub fn finish(&mut self, status: RunStatus, finished_at: DateTime<Utc>) {
        self.status = status;
        self.finished_at = Some(finished_at);
        self.duration_seconds =
            (finished_at - self.started_at).num_milliseconds().max(0) as f64 / 1000.0;
    }
}

/// `run_<8 hex>_<YYYYmmdd_HHMMSS>`.
pub fn new_run_id(now: DateTime<Utc>) -> String {
    let uuid = uuid::Uuid::new_v4().simple().to_string();
    format!("run_{}_{}", &uuid[..8], now.format("%Y%m%d_%H%M%S"))
}
