//! Listing filters, pagination, and dashboard aggregates over the master dataset.

use std::cmp::Reverse;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};

use super::record::PermitRecord;
use super::run::{RunReport, RunStatus};
use super::sources::CityProfile;

pub const DEFAULT_PAGE_SIZE: usize = 50;
pub const MAX_PAGE_SIZE: usize = 500;
/// Finished runs shown on the dashboard.
pub const DASHBOARD_RECENT_RUNS: usize = 5;

/// Listing filters as they arrive from a query string or the browse form.
///
/// Blank fields are treated as absent so an untouched HTML form filters nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PermitQuery {
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub city: Option<String>,
    #[serde(default, deserialize_with = "optional_date")]
    pub start_date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "optional_date")]
    pub end_date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "optional_number")]
    pub min_cost: Option<u64>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub search: Option<String>,
    #[serde(default, deserialize_with = "optional_number")]
    pub page: Option<usize>,
    #[serde(default, deserialize_with = "optional_number")]
    pub page_size: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueryError {
    #[error("page numbers start at 1")]
    ZeroPage,
    #[error("start_date {start} is after end_date {end}")]
    InvertedDateRange { start: NaiveDate, end: NaiveDate },
}

/// One page of results plus the total match count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Page<T> {
    pub count: usize,
    pub page: usize,
    pub page_size: usize,
    pub results: Vec<T>,
}

impl PermitQuery {
    pub fn validate(&self) -> Result<(), QueryError> {
        if self.page == Some(0) {
            return Err(QueryError::ZeroPage);
        }
        if let (Some(start), Some(end)) = (self.start_date, self.end_date) {
            if start > end {
                return Err(QueryError::InvertedDateRange { start, end });
            }
        }
        Ok(())
    }

    pub fn page(&self) -> usize {
        self.page.unwrap_or(1).max(1)
    }

    pub fn page_size(&self) -> usize {
        self.page_size
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE)
    }

    /// True when the record passes every supplied filter.
    pub fn matches(&self, cities: &[CityProfile], record: &PermitRecord) -> bool {
        if let Some(city) = self.city.as_deref() {
            if !city_matches(cities, city, &record.city) {
                return false;
            }
        }
        if self.start_date.is_some_and(|start| record.issue_date < start) {
            return false;
        }
        if self.end_date.is_some_and(|end| record.issue_date > end) {
            return false;
        }
        if self.min_cost.is_some_and(|min| record.estimated_cost < min) {
            return false;
        }
        if let Some(search) = self.search.as_deref() {
            let needle = search.to_lowercase();
            let hit = record.description.to_lowercase().contains(&needle)
                || record.full_address.to_lowercase().contains(&needle);
            if !hit {
                return false;
            }
        }
        true
    }

    /// Filters, orders newest first, and cuts out the requested page.
    pub fn apply(
        &self,
        cities: &[CityProfile],
        records: Vec<PermitRecord>,
    ) -> Result<Page<PermitRecord>, QueryError> {
        self.validate()?;

        let mut matched: Vec<PermitRecord> = records
            .into_iter()
            .filter(|record| self.matches(cities, record))
            .collect();
        matched.sort_by(|a, b| {
            (Reverse(a.issue_date), &a.city, &a.permit_id).cmp(&(
                Reverse(b.issue_date),
                &b.city,
                &b.permit_id,
            ))
        });

        Ok(paginate(matched, self.page(), self.page_size()))
    }
}

/// Slices a 1-based page out of `items`; pages past the end are empty.
pub fn paginate<T>(items: Vec<T>, page: usize, page_size: usize) -> Page<T> {
    let count = items.len();
    let start = page.saturating_sub(1).saturating_mul(page_size);
    let results = items.into_iter().skip(start).take(page_size).collect();
    Page {
        count,
        page,
        page_size,
        results,
    }
}

/// A filter value matches a city key exactly or any part of the display name.
fn city_matches(cities: &[CityProfile], filter: &str, record_city: &str) -> bool {
    let filter = filter.trim().to_lowercase();
    let by_key = cities
        .iter()
        .any(|city| city.key == filter && city.name == record_city);
    by_key || record_city.to_lowercase().contains(&filter)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CityStat {
    pub city_key: String,
    pub city: String,
    pub permits: usize,
    pub total_value: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardStats {
    pub total_permits: usize,
    pub total_value: u64,
    pub cities: Vec<CityStat>,
    pub recent_runs: Vec<RunReport>,
}

impl DashboardStats {
    /// Totals over `records`, one entry per catalog city, and the newest finished runs.
    ///
    /// `runs` is expected newest first; unfinished and failed runs are left out.
    pub fn compute(cities: &[CityProfile], records: &[PermitRecord], runs: Vec<RunReport>) -> Self {
        let city_stats = cities
            .iter()
            .map(|profile| {
                let (permits, total_value) = records
                    .iter()
                    .filter(|record| record.city == profile.name)
                    .fold((0, 0u64), |(count, value), record| {
                        (count + 1, value.saturating_add(record.estimated_cost))
                    });
                CityStat {
                    city_key: profile.key.to_string(),
                    city: profile.name.to_string(),
                    permits,
                    total_value,
                }
            })
            .collect();

        let recent_runs = runs
            .into_iter()
            .filter(|run| {
                matches!(run.status, RunStatus::Completed | RunStatus::Partial)
            })
            .take(DASHBOARD_RECENT_RUNS)
            .collect();

        Self {
            total_permits: records.len(),
            total_value: records
                .iter()
                .fold(0u64, |total, record| total.saturating_add(record.estimated_cost)),
            cities: city_stats,
            recent_runs,
        }
    }
}

fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    Ok(opt.and_then(|value| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    }))
}

fn optional_date<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    empty_string_as_none(deserializer)?
        .map(|raw| {
            NaiveDate::parse_from_str(&raw, "%Y-%m-%d").map_err(|err| {
                serde::de::Error::custom(format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
            })
        })
        .transpose()
}

fn optional_number<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    empty_string_as_none(deserializer)?
        .map(|raw| {
            raw.parse::<T>()
                .map_err(|err| serde::de::Error::custom(format!("invalid number '{raw}': {err}")))
        })
        .transpose()
}
