use crate::infra::build_service;
use clap::Args;
use permit_hub::config::AppConfig;
use permit_hub::error::AppError;
use permit_hub::permits::{CityProfile, CityStatus, RunReport, RunRequest};
use permit_hub::telemetry;
use std::path::PathBuf;

#[derive(Args, Debug, Default)]
pub(crate) struct RunArgs {
    /// City key or name to collect; repeat for several (defaults to every city)
    #[arg(long = "city", value_name = "CITY")]
    pub(crate) cities: Vec<String>,
    /// Ignore the rescrape window and fetch every selected city
    #[arg(long)]
    pub(crate) force: bool,
    /// Read rows from a recorded JSON snapshot instead of the live portals
    #[arg(long, value_name = "JSON")]
    pub(crate) fixture: Option<PathBuf>,
}

pub(crate) async fn run_pipeline(args: RunArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    telemetry::init(&config.telemetry)?;

    let service = build_service(&config.pipeline, args.fixture.as_deref())?;
    let report = service
        .trigger(RunRequest {
            cities: args.cities,
            force_rescrape: args.force,
        })
        .await?;

    print!("{}", render_report(&report));
    println!(
        "Master dataset: {}",
        service.store().master_path().display()
    );
    Ok(())
}

pub(crate) fn list_cities() {
    println!("Configured cities");
    for city in CityProfile::catalog() {
        println!("- {} ({}): {}", city.key, city.name, city.endpoint);
    }
}

pub(crate) fn render_report(report: &RunReport) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "Run {} finished {} in {:.1}s\n",
        report.run_id,
        report.status.label(),
        report.duration_seconds
    ));
    out.push_str(&format!(
        "{} permits worth ${} collected; master dataset holds {} records\n",
        report.total_records, report.total_value, report.master_records
    ));

    out.push_str("\nCities\n");
    for summary in &report.city_summaries {
        let mut line = format!(
            "- {}: {} | {} records | ${}",
            summary.city,
            summary.status.label(),
            summary.records,
            summary.total_value
        );
        if summary.rejected > 0 || summary.below_minimum > 0 {
            line.push_str(&format!(
                " | {} rejected, {} below minimum",
                summary.rejected, summary.below_minimum
            ));
        }
        if summary.status == CityStatus::Placeholder {
            line.push_str(" | placeholder data, not authoritative");
        }
        if let Some(file) = &summary.file {
            line.push_str(&format!(" -> {file}"));
        }
        out.push_str(&line);
        out.push('\n');
    }

    if !report.errors.is_empty() {
        out.push_str("\nErrors\n");
        for error in &report.errors {
            match &error.city {
                Some(city) => out.push_str(&format!("- [{city}] {}\n", error.error)),
                None => out.push_str(&format!("- {}\n", error.error)),
            }
        }
    }
    out
}
