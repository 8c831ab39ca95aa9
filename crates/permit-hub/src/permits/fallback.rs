//! Explicit demonstration mode: synthetic records for cities whose portal could not be reached.

use chrono::{Datelike, Duration, NaiveDateTime};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::Serialize;

use super::record::PermitRecord;
use super::sources::CityProfile;

const COST_FLOOR: u64 = 1_000_000;
const COST_CEILING: u64 = 50_000_000;
const MAX_DAYS_AGO: i64 = 30;

const CONTRACTORS: &[&str] = &[
    "ABC Construction Corp",
    "Metro Building Systems",
    "Elite Contractors LLC",
    "Skyline Construction",
    "Premier Build Group",
    "Urban Development Co",
    "Apex Construction Services",
    "Diamond Building Solutions",
    "Crown Contractors",
    "Pacific Construction Group",
    "Summit Building Corp",
    "Prestige Builders Inc",
];

const STREETS: &[(&str, &str)] = &[
    ("123", "Main Street"),
    ("456", "Broadway"),
    ("789", "Park Avenue"),
    ("321", "First Street"),
    ("654", "Second Avenue"),
    ("987", "Third Street"),
    ("159", "Market Street"),
    ("753", "Oak Avenue"),
    ("852", "Pine Street"),
];

const DESCRIPTIONS: &[&str] = &[
    "New 30-story mixed-use commercial building with retail ground floor",
    "High-rise residential tower with 300+ luxury units",
    "Major office building renovation and modernization project",
    "New hospital wing construction and medical facilities expansion",
    "Large retail and entertainment complex development",
    "Mixed-use development with residential and commercial spaces",
    "Corporate headquarters building construction project",
    "Luxury hotel and conference center development",
    "Educational facility expansion and renovation project",
    "Industrial warehouse and distribution center construction",
];

const LICENSE_STATUSES: &[&str] = &["Active", "Verified", "Good Standing"];

/// Whether failed cities are backfilled with synthetic records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum FallbackMode {
    #[default]
    Disabled,
    /// Generate between `min` and `max` records, inclusive.
    Placeholder { min: u32, max: u32 },
}

/// Provenance label that marks a record as non-authoritative.
pub fn placeholder_source(city: &CityProfile) -> String {
    format!("{} Open Data (placeholder, not authoritative)", city.name)
}

pub fn is_placeholder(record: &PermitRecord) -> bool {
    record.data_source.ends_with("(placeholder, not authoritative)")
}

/// Synthesizes records for `city`, or nothing when the mode is disabled.
///
/// Costs always clear `min_cost` so the records satisfy the same threshold as live data.
pub fn placeholder_records<R: Rng + ?Sized>(
    rng: &mut R,
    mode: FallbackMode,
    city: &CityProfile,
    min_cost: u64,
    scraped_at: NaiveDateTime,
) -> Vec<PermitRecord> {
    let FallbackMode::Placeholder { min, max } = mode else {
        return Vec::new();
    };

    let count = rng.gen_range(min..=max.max(min));
    let cost_low = COST_FLOOR.max(min_cost.saturating_add(1));
    let cost_high = COST_CEILING.max(cost_low);
    let year = scraped_at.year();

    (1..=count)
        .map(|n| {
            let (house, street) = STREETS.choose(rng).copied().unwrap_or(("1", "Main Street"));
            let area = city.areas.choose(rng).copied().unwrap_or(city.name);

            PermitRecord {
                city: city.name.to_string(),
                permit_id: format!("{}-{year}-{n:06}", city.key.to_ascii_uppercase()),
                issue_date: scraped_at.date() - Duration::days(rng.gen_range(0..=MAX_DAYS_AGO)),
                full_address: format!("{house} {street}"),
                area: area.to_string(),
                zip_code: Some(format!("{:05}", rng.gen_range(10_000..=99_999))),
                description: pick(rng, DESCRIPTIONS),
                estimated_cost: rng.gen_range(cost_low..=cost_high),
                contractor_name: pick(rng, CONTRACTORS),
                contractor_license: format!("LIC-{}", rng.gen_range(100_000..=999_999)),
                applicant_name: format!("Development Group {} LLC", rng.gen_range(1..=100)),
                owner_name: format!("Property Holdings {} Inc", rng.gen_range(1..=50)),
                architect_name: format!("Design Studio {}", rng.gen_range(1..=25)),
                license_status: pick(rng, LICENSE_STATUSES),
                business_address: format!("{} Business Ave", rng.gen_range(100..=9_999)),
                business_phone: format!(
                    "({}) {}-{}",
                    rng.gen_range(200..=999),
                    rng.gen_range(200..=999),
                    rng.gen_range(1_000..=9_999)
                ),
                data_source: placeholder_source(city),
                scraped_at,
            }
        })
        .collect()
}

fn pick<R: Rng + ?Sized>(rng: &mut R, pool: &[&str]) -> String {
    pool.choose(rng).copied().unwrap_or_default().to_string()
}
