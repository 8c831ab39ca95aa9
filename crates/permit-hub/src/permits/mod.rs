//! Building-permit collection: city sources, normalization, aggregation, master merge,
//! persistence, and the run/listing service exposed over HTTP.

pub mod aggregator;
pub mod fallback;
pub mod merge;
pub(crate) mod normalizer;
pub mod query;
pub mod record;
pub mod repository;
pub mod router;
pub mod run;
pub mod service;
pub mod sources;
pub mod store;

#[cfg(test)]
mod tests;

pub use aggregator::{
    AggregateOutcome, Aggregator, CityBatch, CityFailure, CityStatus, CitySummary, UnknownCity,
};
pub use fallback::FallbackMode;
pub use merge::{merge_master, MergeOutcome};
pub use query::{CityStat, DashboardStats, Page, PermitQuery, QueryError};
pub use record::{PermitKey, PermitRecord, ADDRESS_NOT_AVAILABLE, COLUMNS, NOT_AVAILABLE};
pub use repository::{PermitRepository, RepositoryError, RunRepository};
pub use router::permit_router;
pub use run::{RunError, RunReport, RunRequest, RunStatus};
pub use service::{PermitRunService, RunServiceError};
pub use sources::{
    CityProfile, RawRow, RowSource, SocrataSource, SourceError, StaticSource,
};
pub use store::{PermitStore, RunState, StoreError};
