//! City portals and the mapping from their rows to canonical permit records.

mod catalog;
mod contacts;
mod fixture;
mod mapping;
mod socrata;

use std::future::Future;

use chrono::{NaiveDate, NaiveDateTime};

pub use catalog::{CityProfile, ContractorSource, CostFields, FieldMap};
pub use contacts::{Contact, ContactSlots, MAX_CONTACT_SLOTS};
pub use fixture::StaticSource;
pub use mapping::{normalize_rows, AdapterOutcome};
pub use socrata::SocrataSource;

/// One loosely typed row as returned by a portal.
pub type RawRow = serde_json::Map<String, serde_json::Value>;

/// Failure to obtain usable rows for a city.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SourceError {
    #[error("source unavailable: {0}")]
    Unavailable(String),
    #[error("source rejected credentials (HTTP {0})")]
    Unauthorized(u16),
    #[error("malformed source response: {0}")]
    Malformed(String),
    #[error("source payload is missing expected fields: {}", .missing.join(", "))]
    SchemaMismatch { missing: Vec<String> },
}

impl SourceError {
    /// Transport-level failures that may clear up on a later run.
    pub fn is_retrievable(&self) -> bool {
        !matches!(self, SourceError::SchemaMismatch { .. })
    }
}

/// Query constraints pushed down to a portal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchOptions {
    pub min_cost: u64,
    pub limit: u32,
    pub issued_since: Option<NaiveDate>,
}

/// Per-row normalization inputs shared across a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NormalizeContext {
    pub scraped_at: NaiveDateTime,
    pub min_cost: u64,
}

/// Transport that retrieves raw rows for a city.
pub trait RowSource: Send + Sync {
    fn fetch(
        &self,
        city: &CityProfile,
        options: &FetchOptions,
    ) -> impl Future<Output = Result<Vec<RawRow>, SourceError>> + Send;
}

/// Source adapter: fetch a city's rows and map them into canonical records.
pub async fn collect_city<S: RowSource>(
    source: &S,
    city: &CityProfile,
    options: &FetchOptions,
    context: &NormalizeContext,
) -> Result<AdapterOutcome, SourceError> {
    let rows = source.fetch(city, options).await?;
    tracing::debug!(city = city.key, rows = rows.len(), "fetched source rows");
    normalize_rows(city, &rows, context)
}
