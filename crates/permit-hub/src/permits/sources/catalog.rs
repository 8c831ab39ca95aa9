use serde::Serialize;

/// How a city exposes the contractor responsible for a permit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ContractorSource {
    /// A single named column, with an optional alternate column name.
    Field {
        name: &'static str,
        alternate: Option<&'static str>,
    },
    /// Parallel `contact_N_type` / `contact_N_name` columns.
    ContactSlots { slots: usize },
}

/// Cost column, plus an optional revised estimate that wins when larger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CostFields {
    pub primary: &'static str,
    pub revised: Option<&'static str>,
    /// The portal types the column numerically, so the minimum can be filtered server-side.
    pub queryable: bool,
}

/// Source column names for each canonical field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldMap {
    pub permit_id: &'static str,
    pub issue_date: &'static str,
    pub cost: CostFields,
    /// Ordered address components, e.g. house number, street name, suffix.
    pub address: &'static [&'static str],
    pub area: Option<&'static str>,
    pub zip_code: Option<&'static str>,
    pub description: &'static str,
    pub contractor: ContractorSource,
    pub contractor_license: Option<&'static str>,
    pub applicant: Option<&'static str>,
    pub owner: Option<&'static str>,
    pub architect: Option<&'static str>,
    pub license_status: Option<&'static str>,
    pub business_address: Option<&'static str>,
    pub business_phone: Option<&'static str>,
}

/// Everything the pipeline needs to know about one municipal portal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CityProfile {
    pub key: &'static str,
    pub name: &'static str,
    pub areas: &'static [&'static str],
    pub endpoint: &'static str,
    pub data_source: &'static str,
    pub fields: FieldMap,
}

impl CityProfile {
    /// The built-in portals, in processing order.
    pub fn catalog() -> Vec<CityProfile> {
        vec![new_york(), chicago(), los_angeles(), san_francisco()]
    }

    pub fn find<'a>(cities: &'a [CityProfile], key_or_name: &str) -> Option<&'a CityProfile> {
        let wanted = key_or_name.trim();
        cities.iter().find(|city| {
            city.key.eq_ignore_ascii_case(wanted) || city.name.eq_ignore_ascii_case(wanted)
        })
    }
}

fn new_york() -> CityProfile {
    CityProfile {
        key: "nyc",
        name: "New York City",
        areas: &["Manhattan", "Brooklyn", "Queens", "Bronx"],
        endpoint: "https://data.cityofnewyork.us/resource/8sk9-t6ee.json",
        data_source: "NYC DOB NOW Approved Permits",
        fields: FieldMap {
            permit_id: "job_filing_number",
            issue_date: "issued_date",
            cost: CostFields {
                primary: "estimated_job_costs",
                revised: None,
                queryable: false,
            },
            address: &["house_no", "street_name"],
            area: Some("borough"),
            zip_code: Some("zip_code"),
            description: "job_description",
            contractor: ContractorSource::Field {
                name: "applicant_business_name",
                alternate: Some("permittee_s_business_name"),
            },
            contractor_license: Some("applicant_license"),
            applicant: Some("filing_representative_business_name"),
            owner: Some("owner_business_name"),
            architect: None,
            license_status: Some("permit_status"),
            business_address: Some("applicant_business_address"),
            business_phone: None,
        },
    }
}

fn chicago() -> CityProfile {
    CityProfile {
        key: "chicago",
        name: "Chicago",
        areas: &["Downtown", "North Side", "South Side", "West Side"],
        endpoint: "https://data.cityofchicago.org/resource/ydr8-5enu.json",
        data_source: "Chicago Data Portal Building Permits",
        fields: FieldMap {
            permit_id: "permit_",
            issue_date: "issue_date",
            cost: CostFields {
                primary: "reported_cost",
                revised: None,
                queryable: true,
            },
            address: &["street_number", "street_direction", "street_name", "suffix"],
            area: Some("community_area"),
            zip_code: None,
            description: "work_description",
            contractor: ContractorSource::ContactSlots { slots: 5 },
            contractor_license: None,
            applicant: None,
            owner: None,
            architect: None,
            license_status: None,
            business_address: None,
            business_phone: None,
        },
    }
}

fn los_angeles() -> CityProfile {
    CityProfile {
        key: "la",
        name: "Los Angeles",
        areas: &["Downtown", "Hollywood", "Beverly Hills", "Santa Monica"],
        endpoint: "https://data.lacity.org/resource/d9aa-v8bm.json",
        data_source: "LA Open Data Building Permits",
        fields: FieldMap {
            permit_id: "pcis_permit",
            issue_date: "issue_date",
            cost: CostFields {
                primary: "valuation",
                revised: None,
                queryable: true,
            },
            address: &["address_start", "street_direction", "street_name", "street_suffix"],
            area: Some("community_plan_area"),
            zip_code: Some("zip_code"),
            description: "work_description",
            contractor: ContractorSource::Field {
                name: "contractors_business_name",
                alternate: Some("contractor_business_name"),
            },
            contractor_license: Some("license"),
            applicant: Some("applicant_business_name"),
            owner: None,
            architect: None,
            license_status: Some("status"),
            business_address: Some("contractor_address"),
            business_phone: None,
        },
    }
}

fn san_francisco() -> CityProfile {
    CityProfile {
        key: "sf",
        name: "San Francisco",
        areas: &["SOMA", "Financial District", "Mission Bay", "Presidio"],
        endpoint: "https://data.sfgov.org/resource/i98e-djp9.json",
        data_source: "DataSF Building Permits",
        fields: FieldMap {
            permit_id: "permit_number",
            issue_date: "issued_date",
            cost: CostFields {
                primary: "estimated_cost",
                revised: Some("revised_cost"),
                queryable: true,
            },
            address: &["street_number", "street_name", "street_suffix"],
            area: Some("neighborhoods_analysis_boundaries"),
            zip_code: Some("zipcode"),
            description: "description",
            contractor: ContractorSource::Field {
                name: "contractor_name",
                alternate: None,
            },
            contractor_license: None,
            applicant: None,
            owner: None,
            architect: None,
            license_status: Some("status"),
            business_address: None,
            business_phone: None,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn catalog_keys_are_unique_and_ordered() {
        let cities = CityProfile::catalog();
        let keys: Vec<_> = cities.iter().map(|city| city.key).collect();
        assert_eq!(keys, ["nyc", "chicago", "la", "sf"]);
        assert_eq!(keys.iter().collect::<HashSet<_>>().len(), keys.len());
    }

    #[test]
    fn find_accepts_key_or_display_name() {
        let cities = CityProfile::catalog();
        assert_eq!(CityProfile::find(&cities, "SF").map(|c| c.key), Some("sf"));
        assert_eq!(
            CityProfile::find(&cities, "new york city").map(|c| c.key),
            Some("nyc")
        );
        assert!(CityProfile::find(&cities, "boston").is_none());
    }
}
