use metrics_exporter_prometheus::PrometheusHandle;
use permit_hub::config::PipelineConfig;
use permit_hub::error::AppError;
use permit_hub::permits::sources::FetchOptions;
use permit_hub::permits::{
    CityProfile, PermitKey, PermitRecord, PermitRepository, PermitRunService, RawRow,
    RepositoryError, RowSource, RunReport, RunRepository, SocrataSource, SourceError,
    StaticSource,
};
use std::collections::BTreeMap;
use std::fs::File;
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};

pub(crate) type ApiService =
    PermitRunService<PortalSource, InMemoryRunRepository, InMemoryPermitRepository>;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Live Socrata portals, or a recorded snapshot when running offline.
pub(crate) enum PortalSource {
    Live(SocrataSource),
    Fixture(StaticSource),
}

impl PortalSource {
    pub(crate) fn from_config(
        config: &PipelineConfig,
        fixture: Option<&Path>,
    ) -> Result<Self, AppError> {
        match fixture {
            Some(path) => {
                let file = File::open(path)?;
                let source = StaticSource::from_json_reader(file)?;
                tracing::info!(fixture = %path.display(), "using recorded portal snapshot");
                Ok(Self::Fixture(source))
            }
            None => {
                let source = SocrataSource::new(config.http_timeout)?
                    .with_app_token(config.app_token.clone());
                tracing::info!(
                    timeout_secs = config.http_timeout.as_secs(),
                    app_token = config.app_token.is_some(),
                    "using live city portals"
                );
                Ok(Self::Live(source))
            }
        }
    }
}

impl RowSource for PortalSource {
    async fn fetch(
        &self,
        city: &CityProfile,
        options: &FetchOptions,
    ) -> Result<Vec<RawRow>, SourceError> {
        match self {
            Self::Live(source) => source.fetch(city, options).await,
            Self::Fixture(source) => source.fetch(city, options).await,
        }
    }
}

pub(crate) fn build_service(
    config: &PipelineConfig,
    fixture: Option<&Path>,
) -> Result<Arc<ApiService>, AppError> {
    let source = PortalSource::from_config(config, fixture)?;
    Ok(Arc::new(PermitRunService::new(
        source,
        config,
        Arc::new(InMemoryRunRepository::default()),
        Arc::new(InMemoryPermitRepository::default()),
    )))
}

#[derive(Default, Clone)]
pub(crate) struct InMemoryRunRepository {
    reports: Arc<Mutex<Vec<RunReport>>>,
}

impl RunRepository for InMemoryRunRepository {
    fn insert(&self, report: RunReport) -> Result<RunReport, RepositoryError> {
        let mut guard = self.reports.lock().expect("run repository mutex poisoned");
        if guard.iter().any(|existing| existing.run_id == report.run_id) {
            return Err(RepositoryError::Conflict);
        }
        guard.push(report.clone());
        Ok(report)
    }

    fn update(&self, report: RunReport) -> Result<(), RepositoryError> {
        let mut guard = self.reports.lock().expect("run repository mutex poisoned");
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
        let guard = self.reports.lock().expect("run repository mutex poisoned");
        Ok(guard.iter().find(|report| report.run_id == run_id).cloned())
    }

    fn recent(&self, limit: usize) -> Result<Vec<RunReport>, RepositoryError> {
        let guard = self.reports.lock().expect("run repository mutex poisoned");
        Ok(guard.iter().rev().take(limit).cloned().collect())
    }
}

#[derive(Default, Clone)]
pub(crate) struct InMemoryPermitRepository {
    records: Arc<Mutex<BTreeMap<PermitKey, PermitRecord>>>,
}

impl PermitRepository for InMemoryPermitRepository {
    fn upsert_many(&self, records: &[PermitRecord]) -> Result<usize, RepositoryError> {
        let mut guard = self.records.lock().expect("permit repository mutex poisoned");
        for record in records {
            guard.insert(record.key(), record.clone());
        }
        Ok(records.len())
    }

    fn fetch(&self, key: &PermitKey) -> Result<Option<PermitRecord>, RepositoryError> {
        let guard = self.records.lock().expect("permit repository mutex poisoned");
        Ok(guard.get(key).cloned())
    }

    fn all(&self) -> Result<Vec<PermitRecord>, RepositoryError> {
        let guard = self.records.lock().expect("permit repository mutex poisoned");
        Ok(guard.values().cloned().collect())
    }
}
