use super::catalog::{CityProfile, ContractorSource};
use super::contacts::ContactSlots;
use super::{NormalizeContext, RawRow, SourceError};
use crate::permits::normalizer;
use crate::permits::record::{PermitRecord, NOT_AVAILABLE};

/// Records produced for one city, plus counts of rows that did not make it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdapterOutcome {
    pub records: Vec<PermitRecord>,
    /// Rows skipped because their id, cost or date could not be parsed.
    pub rejected: usize,
    /// Rows with a valid cost at or under the configured minimum.
    pub below_minimum: usize,
}

impl AdapterOutcome {
    pub fn total_value(&self) -> u64 {
        self.records
            .iter()
            .fold(0u64, |total, record| total.saturating_add(record.estimated_cost))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RowRejection {
    MissingPermitId,
    InvalidCost,
    InvalidDate,
    BelowMinimum,
}

/// Maps every row of a city's payload, skipping rows that cannot be normalized.
///
/// Fails only when the payload as a whole lacks the identifying or cost columns.
pub fn normalize_rows(
    city: &CityProfile,
    rows: &[RawRow],
    context: &NormalizeContext,
) -> Result<AdapterOutcome, SourceError> {
    check_schema(city, rows)?;

    let mut outcome = AdapterOutcome::default();
    for row in rows {
        match map_row(city, row, context) {
            Ok(record) => outcome.records.push(record),
            Err(RowRejection::BelowMinimum) => outcome.below_minimum += 1,
            Err(reason) => {
                tracing::trace!(city = city.key, ?reason, "skipping source row");
                outcome.rejected += 1;
            }
        }
    }

    Ok(outcome)
}

fn check_schema(city: &CityProfile, rows: &[RawRow]) -> Result<(), SourceError> {
    if rows.is_empty() {
        return Ok(());
    }

    let present = |field: &str| rows.iter().any(|row| row.contains_key(field));
    let cost = city.fields.cost;

    let mut missing = Vec::new();
    if !present(city.fields.permit_id) {
        missing.push(city.fields.permit_id.to_string());
    }
    if !present(cost.primary) && !cost.revised.is_some_and(present) {
        missing.push(cost.primary.to_string());
    }

    if missing.is_empty() {
        Ok(())
    } else {
        Err(SourceError::SchemaMismatch { missing })
    }
}

fn map_row(
    city: &CityProfile,
    row: &RawRow,
    context: &NormalizeContext,
) -> Result<PermitRecord, RowRejection> {
    let fields = &city.fields;

    let permit_id =
        normalizer::text(row.get(fields.permit_id)).ok_or(RowRejection::MissingPermitId)?;

    let primary = normalizer::cost(row.get(fields.cost.primary));
    let revised = fields
        .cost
        .revised
        .and_then(|column| normalizer::cost(row.get(column)));
    let estimated_cost = primary.max(revised).ok_or(RowRejection::InvalidCost)?;
    if estimated_cost <= context.min_cost {
        return Err(RowRejection::BelowMinimum);
    }

    let issue_date = normalizer::issue_date(row.get(fields.issue_date), context.scraped_at.date())
        .map_err(|_| RowRejection::InvalidDate)?;

    let address_parts = fields
        .address
        .iter()
        .map(|column| normalizer::text(row.get(*column)).unwrap_or_default());
    let full_address = normalizer::join_address(address_parts);

    let contacts = match fields.contractor {
        ContractorSource::ContactSlots { slots } => ContactSlots::from_row(row, slots),
        ContractorSource::Field { .. } => ContactSlots::default(),
    };
    let contractor_name = match fields.contractor {
        ContractorSource::Field { name, alternate } => normalizer::text(row.get(name))
            .or_else(|| alternate.and_then(|column| normalizer::text(row.get(column)))),
        ContractorSource::ContactSlots { .. } => {
            contacts.contractor().map(|contact| contact.name.clone())
        }
    }
    .unwrap_or_else(|| NOT_AVAILABLE.to_string());

    Ok(PermitRecord {
        city: city.name.to_string(),
        permit_id,
        issue_date,
        full_address,
        area: optional_column(row, fields.area),
        zip_code: fields
            .zip_code
            .and_then(|column| normalizer::zip_code(row.get(column))),
        description: normalizer::description(row.get(fields.description)),
        estimated_cost,
        contractor_name,
        contractor_license: optional_column(row, fields.contractor_license),
        applicant_name: optional_column(row, fields.applicant),
        owner_name: column_or_contact(row, fields.owner, &contacts, "OWNER"),
        architect_name: column_or_contact(row, fields.architect, &contacts, "ARCHITECT"),
        license_status: optional_column(row, fields.license_status),
        business_address: optional_column(row, fields.business_address),
        business_phone: optional_column(row, fields.business_phone),
        data_source: city.data_source.to_string(),
        scraped_at: context.scraped_at,
    })
}

fn optional_column(row: &RawRow, column: Option<&'static str>) -> String {
    normalizer::optional_text(column.and_then(|name| row.get(name)))
}

fn column_or_contact(
    row: &RawRow,
    column: Option<&'static str>,
    contacts: &ContactSlots,
    kind: &str,
) -> String {
    column
        .and_then(|name| normalizer::text(row.get(name)))
        .or_else(|| contacts.named(kind).map(|contact| contact.name.clone()))
        .unwrap_or_else(|| NOT_AVAILABLE.to_string())
}
