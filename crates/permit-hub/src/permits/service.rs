use std::path::PathBuf;
use std::sync::Arc;

use chrono::{Duration, Timelike, Utc};
use tokio::sync::Mutex;

use super::aggregator::{AggregateOutcome, Aggregator, CityStatus, UnknownCity};
use super::merge::merge_master;
use super::query::{DashboardStats, Page, PermitQuery, QueryError};
use super::record::{PermitKey, PermitRecord};
use super::repository::{PermitRepository, RepositoryError, RunRepository};
use super::run::{new_run_id, RunError, RunReport, RunRequest, RunStatus};
use super::sources::{CityProfile, RowSource};
use super::store::{PermitStore, RunState, StoreError};
use crate::config::PipelineConfig;

/// Service composing the aggregator, master merge, file store, and repositories.
pub struct PermitRunService<S, R, P> {
    aggregator: Aggregator<S>,
    store: PermitStore,
    runs: Arc<R>,
    permits: Arc<P>,
    rescrape_after: Option<Duration>,
    // Only one run at a time may read, merge and rewrite the master dataset.
    writer: Mutex<()>,
}

impl<S, R, P> PermitRunService<S, R, P>
where
    S: RowSource + 'static,
    R: RunRepository + 'static,
    P: PermitRepository + 'static,
{
    /// Builds the service over the built-in city catalog.
    pub fn new(source: S, config: &PipelineConfig, runs: Arc<R>, permits: Arc<P>) -> Self {
        Self::with_cities(source, CityProfile::catalog(), config, runs, permits)
    }

    pub fn with_cities(
        source: S,
        cities: Vec<CityProfile>,
        config: &PipelineConfig,
        runs: Arc<R>,
        permits: Arc<P>,
    ) -> Self {
        Self {
            aggregator: Aggregator::new(source, cities, config),
            store: PermitStore::new(&config.output_dir, &config.state_dir),
            runs,
            permits,
            rescrape_after: config.rescrape_after,
            writer: Mutex::new(()),
        }
    }

    pub fn cities(&self) -> &[CityProfile] {
        self.aggregator.cities()
    }

    pub fn store(&self) -> &PermitStore {
        &self.store
    }

    /// Executes one run end to end and returns its final report.
    pub async fn trigger(&self, request: RunRequest) -> Result<RunReport, RunServiceError> {
        let selected = self.aggregator.select(&request.cities)?;

        let started_at = Utc::now();
        let run_id = new_run_id(started_at);
        let mut report = self.runs.insert(RunReport::started(run_id, started_at))?;
        tracing::info!(run_id = %report.run_id, cities = selected.len(), "run started");

        let _writer = self.writer.lock().await;

        let mut state = self.store.load_state();
        let skipped: Vec<&str> = match self.rescrape_after {
            Some(window) if !request.force_rescrape => selected
                .iter()
                .filter(|city| state.recently_succeeded(city.key, started_at, window))
                .map(|city| city.key)
                .collect(),
            _ => Vec::new(),
        };

        let scraped_at = started_at.naive_utc();
        let scraped_at = scraped_at.with_nanosecond(0).unwrap_or(scraped_at);
        let mut outcome = self.aggregator.run(&selected, &skipped, scraped_at).await;

        let mut run_errors = Vec::new();
        let collected =
            self.write_city_files(&mut outcome, &mut state, &mut run_errors, started_at);

        let incoming: Vec<PermitRecord> = outcome.records().cloned().collect();
        let previous = match self.store.load_master() {
            Ok(records) => records,
            Err(error) => {
                tracing::warn!(%error, "master dataset unreadable, rebuilding from this run");
                run_errors.push(RunError::run_wide(format!(
                    "previous master dataset discarded: {error}"
                )));
                Vec::new()
            }
        };

        let mut master_written = true;
        let mut repository_failed = false;
        let master_records = if incoming.is_empty() {
            previous.len()
        } else {
            let merged = merge_master(previous, incoming);
            tracing::info!(
                replaced = merged.replaced,
                added = merged.added,
                records = merged.records.len(),
                "master merged"
            );
            match self.store.write_master(&merged.records) {
                Ok(_) => {
                    if let Err(error) = self.permits.upsert_many(&merged.records) {
                        tracing::error!(%error, "permit repository rejected merged records");
                        run_errors.push(RunError::run_wide(format!(
                            "permit repository not updated: {error}"
                        )));
                        repository_failed = true;
                    }
                }
                Err(error) => {
                    tracing::error!(%error, "master dataset write failed");
                    run_errors.push(RunError::run_wide(format!(
                        "master dataset not written: {error}"
                    )));
                    master_written = false;
                }
            }
            merged.records.len()
        };

        // A city only counts as freshly collected once its records reached the master.
        if master_written {
            for city in &collected {
                state.record_success(&city.key, started_at, city.records, city.file.as_deref());
            }
        }
        if let Err(error) = self.store.save_state(&state) {
            tracing::warn!(%error, "run state not saved");
            run_errors.push(RunError::run_wide(format!("run state not saved: {error}")));
        }

        let mut status = RunStatus::resolve(&outcome.summaries, master_written);
        if repository_failed && status == RunStatus::Completed {
            status = RunStatus::Partial;
        }

        report.total_records = outcome.total_records();
        report.total_value = outcome.total_value();
        report.master_records = master_records;
        report.errors = outcome
            .errors
            .drain(..)
            .map(RunError::from)
            .chain(run_errors)
            .collect();
        report.city_summaries = outcome.summaries;
        report.finish(status, Utc::now());
        self.runs.update(report.clone())?;

        tracing::info!(
            run_id = %report.run_id,
            status = report.status.label(),
            total_records = report.total_records,
            total_value = report.total_value,
            duration_seconds = report.duration_seconds,
            "run finished"
        );
        Ok(report)
    }

    fn write_city_files(
        &self,
        outcome: &mut AggregateOutcome,
        state: &mut RunState,
        run_errors: &mut Vec<RunError>,
        at: chrono::DateTime<Utc>,
    ) -> Vec<CollectedCity> {
        let day = at.date_naive();
        let mut collected = Vec::new();
        for summary in outcome.summaries.iter_mut() {
            let batch = outcome
                .batches
                .iter()
                .find(|batch| batch.city_key == summary.city_key);

            let file = match batch {
                Some(batch) => match self.store.write_city_file(batch.city_key, day, &batch.records) {
                    Ok(path) => {
                        summary.file = Some(path.display().to_string());
                        Some(path)
                    }
                    Err(error) => {
                        tracing::warn!(city = %summary.city_key, %error, "city file not written");
                        run_errors.push(RunError {
                            city: Some(summary.city_key.clone()),
                            error: format!("city file not written: {error}"),
                        });
                        None
                    }
                },
                None => None,
            };

            match summary.status {
                CityStatus::Succeeded => collected.push(CollectedCity {
                    key: summary.city_key.clone(),
                    records: summary.records,
                    file,
                }),
                CityStatus::Failed | CityStatus::Placeholder => {
                    let error = outcome
                        .errors
                        .iter()
                        .find(|failure| failure.city_key == summary.city_key)
                        .map(|failure| failure.error.clone())
                        .unwrap_or_else(|| "source failed".to_string());
                    state.record_failure(&summary.city_key, error);
                }
                CityStatus::Empty | CityStatus::Skipped => {}
            }
        }
        collected
    }

    pub fn run_status(&self, run_id: &str) -> Result<RunReport, RunServiceError> {
        self.runs
            .fetch(run_id)?
            .ok_or_else(|| RunServiceError::NotFound(format!("run '{run_id}'")))
    }

    pub fn recent_runs(&self, limit: usize) -> Result<Vec<RunReport>, RunServiceError> {
        Ok(self.runs.recent(limit)?)
    }

    pub fn list_permits(&self, query: &PermitQuery) -> Result<Page<PermitRecord>, RunServiceError> {
        let records = self.permits.all()?;
        Ok(query.apply(self.cities(), records)?)
    }

    /// Looks a permit up by city key or display name plus permit id.
    pub fn permit(&self, city: &str, permit_id: &str) -> Result<PermitRecord, RunServiceError> {
        let city_name = CityProfile::find(self.cities(), city)
            .map(|profile| profile.name.to_string())
            .unwrap_or_else(|| city.to_string());
        let key = PermitKey::new(city_name, permit_id);
        self.permits
            .fetch(&key)?
            .ok_or_else(|| RunServiceError::NotFound(format!("permit {key}")))
    }

    pub fn dashboard(&self) -> Result<DashboardStats, RunServiceError> {
        let records = self.permits.all()?;
        let runs = self.runs.recent(usize::MAX)?;
        Ok(DashboardStats::compute(self.cities(), &records, runs))
    }

    /// Loads the persisted master dataset into the permit repository.
    pub fn hydrate(&self) -> Result<usize, RunServiceError> {
        let records = self.store.load_master()?;
        let count = self.permits.upsert_many(&records)?;
        tracing::info!(records = count, "permit repository hydrated from master dataset");
        Ok(count)
    }
}

struct CollectedCity {
    key: String,
    records: usize,
    file: Option<PathBuf>,
}

/// Error raised by the run service.
#[derive(Debug, thiserror::Error)]
pub enum RunServiceError {
    #[error(transparent)]
    UnknownCity(#[from] UnknownCity),
    #[error(transparent)]
    InvalidQuery(#[from] QueryError),
    #[error("{0} not found")]
    NotFound(String),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Store(#[from] StoreError),
}
