use chrono::{Days, NaiveDateTime};
use serde::Serialize;

use super::fallback::{self, FallbackMode};
use super::record::PermitRecord;
use super::sources::{collect_city, CityProfile, FetchOptions, NormalizeContext, RowSource};
use crate::config::PipelineConfig;

/// Outcome of one city within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CityStatus {
    Succeeded,
    /// The portal answered but nothing cleared normalization.
    Empty,
    Failed,
    /// The portal failed and synthetic records stand in for it.
    Placeholder,
    /// Left alone because it succeeded recently and the run was not forced.
    Skipped,
}

impl CityStatus {
    pub fn label(&self) -> &'static str {
        match self {
            CityStatus::Succeeded => "succeeded",
            CityStatus::Empty => "empty",
            CityStatus::Failed => "failed",
            CityStatus::Placeholder => "placeholder",
            CityStatus::Skipped => "skipped",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CitySummary {
    pub city_key: String,
    pub city: String,
    pub status: CityStatus,
    pub records: usize,
    pub total_value: u64,
    pub rejected: usize,
    pub below_minimum: usize,
    /// Per-city artifact written for this run, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
}

impl CitySummary {
    fn new(city: &CityProfile, status: CityStatus) -> Self {
        Self {
            city_key: city.key.to_string(),
            city: city.name.to_string(),
            status,
            records: 0,
            total_value: 0,
            rejected: 0,
            below_minimum: 0,
            file: None,
        }
    }
}

/// A city whose adapter failed outright.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CityFailure {
    pub city_key: String,
    pub city: String,
    pub error: String,
}

/// Records collected for one city, kept apart so per-city artifacts can be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CityBatch {
    pub city_key: &'static str,
    pub records: Vec<PermitRecord>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AggregateOutcome {
    pub batches: Vec<CityBatch>,
    pub summaries: Vec<CitySummary>,
    pub errors: Vec<CityFailure>,
}

impl AggregateOutcome {
    /// Every collected record, in city order.
    pub fn records(&self) -> impl Iterator<Item = &PermitRecord> {
        self.batches.iter().flat_map(|batch| batch.records.iter())
    }

    pub fn total_records(&self) -> usize {
        self.summaries.iter().map(|summary| summary.records).sum()
    }

    pub fn total_value(&self) -> u64 {
        self.summaries
            .iter()
            .fold(0u64, |total, summary| total.saturating_add(summary.total_value))
    }
}

/// Requested city key that is not part of the configured catalog.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown city '{0}'")]
pub struct UnknownCity(pub String);

/// Runs the source adapters for the configured cities, one after another.
pub struct Aggregator<S> {
    source: S,
    cities: Vec<CityProfile>,
    min_cost: u64,
    fetch_limit: u32,
    days_back: u32,
    fallback: FallbackMode,
}

impl<S: RowSource> Aggregator<S> {
    pub fn new(source: S, cities: Vec<CityProfile>, config: &PipelineConfig) -> Self {
        Self {
            source,
            cities,
            min_cost: config.min_cost,
            fetch_limit: config.fetch_limit,
            days_back: config.days_back,
            fallback: config.fallback,
        }
    }

    pub fn cities(&self) -> &[CityProfile] {
        &self.cities
    }

    /// Resolves requested keys (or display names) to cities in configured order.
    ///
    /// An empty request selects every configured city.
    pub fn select(&self, requested: &[String]) -> Result<Vec<CityProfile>, UnknownCity> {
        if requested.is_empty() {
            return Ok(self.cities.clone());
        }

        let mut wanted = Vec::with_capacity(requested.len());
        for name in requested {
            let city = CityProfile::find(&self.cities, name)
                .ok_or_else(|| UnknownCity(name.trim().to_string()))?;
            wanted.push(city.key);
        }

        Ok(self
            .cities
            .iter()
            .filter(|city| wanted.contains(&city.key))
            .cloned()
            .collect())
    }

    /// Collects every city in `cities`, except those listed in `skipped`.
    ///
    /// A failing city never stops the cities after it.
    pub async fn run(
        &self,
        cities: &[CityProfile],
        skipped: &[&str],
        scraped_at: NaiveDateTime,
    ) -> AggregateOutcome {
        let options = FetchOptions {
            min_cost: self.min_cost,
            limit: self.fetch_limit,
            // A window reaching past the calendar's range requests no window at all.
            issued_since: match self.days_back {
                0 => None,
                days => scraped_at
                    .date()
                    .checked_sub_days(Days::new(u64::from(days))),
            },
        };
        let context = NormalizeContext {
            scraped_at,
            min_cost: self.min_cost,
        };

        let mut outcome = AggregateOutcome::default();
        for city in cities {
            if skipped.contains(&city.key) {
                tracing::info!(city = city.key, "skipping city, recently collected");
                outcome
                    .summaries
                    .push(CitySummary::new(city, CityStatus::Skipped));
                continue;
            }

            let (summary, records) = match collect_city(&self.source, city, &options, &context).await
            {
                Ok(adapted) => {
                    let status = if adapted.records.is_empty() {
                        CityStatus::Empty
                    } else {
                        CityStatus::Succeeded
                    };
                    let mut summary = CitySummary::new(city, status);
                    summary.rejected = adapted.rejected;
                    summary.below_minimum = adapted.below_minimum;
                    (summary, adapted.records)
                }
                Err(error) => {
                    tracing::warn!(city = city.key, %error, "city source failed");
                    outcome.errors.push(CityFailure {
                        city_key: city.key.to_string(),
                        city: city.name.to_string(),
                        error: error.to_string(),
                    });

                    let placeholders = if error.is_retrievable() {
                        self.placeholders(city, scraped_at)
                    } else {
                        Vec::new()
                    };
                    let status = if placeholders.is_empty() {
                        CityStatus::Failed
                    } else {
                        CityStatus::Placeholder
                    };
                    (CitySummary::new(city, status), placeholders)
                }
            };

            let summary = CitySummary {
                records: records.len(),
                total_value: records
                    .iter()
                    .fold(0u64, |total, record| total.saturating_add(record.estimated_cost)),
                ..summary
            };
            tracing::info!(
                city = city.key,
                status = summary.status.label(),
                records = summary.records,
                rejected = summary.rejected,
                total_value = summary.total_value,
                "city collected"
            );

            if !records.is_empty() {
                outcome.batches.push(CityBatch {
                    city_key: city.key,
                    records,
                });
            }
            outcome.summaries.push(summary);
        }

        outcome
    }

    fn placeholders(&self, city: &CityProfile, scraped_at: NaiveDateTime) -> Vec<PermitRecord> {
        let mut rng = rand::thread_rng();
        fallback::placeholder_records(&mut rng, self.fallback, city, self.min_cost, scraped_at)
    }
}
