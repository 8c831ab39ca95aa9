use super::record::{PermitKey, PermitRecord};
use super::run::RunReport;

/// Storage for run reports so status lookups survive the request that triggered the run.
pub trait RunRepository: Send + Sync {
    fn insert(&self, report: RunReport) -> Result<RunReport, RepositoryError>;
    fn update(&self, report: RunReport) -> Result<(), RepositoryError>;
    fn fetch(&self, run_id: &str) -> Result<Option<RunReport>, RepositoryError>;
    /// Newest first.
    fn recent(&self, limit: usize) -> Result<Vec<RunReport>, RepositoryError>;
}

/// Queryable copy of the master dataset, kept in step with every merge.
pub trait PermitRepository: Send + Sync {
    /// Inserts or replaces by `(city, permit_id)`.
    fn upsert_many(&self, records: &[PermitRecord]) -> Result<usize, RepositoryError>;
    fn fetch(&self, key: &PermitKey) -> Result<Option<PermitRecord>, RepositoryError>;
    fn all(&self) -> Result<Vec<PermitRecord>, RepositoryError>;
}

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}
