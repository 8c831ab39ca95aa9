use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Placeholder written for optional party/contact fields the source does not carry.
pub const NOT_AVAILABLE: &str = "N/A";
/// Substituted when every address component of a row is empty.
pub const ADDRESS_NOT_AVAILABLE: &str = "Address Not Available";
/// Upper bound, in characters, for description text.
pub const DESCRIPTION_LIMIT: usize = 500;

/// Column order of the persisted CSV artifacts.
pub const COLUMNS: [&str; 18] = [
    "city",
    "permit_id",
    "issue_date",
    "full_address",
    "area",
    "zip_code",
    "description",
    "estimated_cost",
    "contractor_name",
    "contractor_license",
    "applicant_name",
    "owner_name",
    "architect_name",
    "license_status",
    "business_address",
    "business_phone",
    "data_source",
    "scraped_at",
];

/// The normalized permit shape every city source is mapped into.
///
/// Field order matches [`COLUMNS`]; the CSV writer relies on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermitRecord {
    pub city: String,
    pub permit_id: String,
    pub issue_date: NaiveDate,
    pub full_address: String,
    pub area: String,
    #[serde(default)]
    pub zip_code: Option<String>,
    pub description: String,
    pub estimated_cost: u64,
    pub contractor_name: String,
    pub contractor_license: String,
    pub applicant_name: String,
    pub owner_name: String,
    pub architect_name: String,
    pub license_status: String,
    pub business_address: String,
    pub business_phone: String,
    pub data_source: String,
    #[serde(with = "timestamp_format")]
    pub scraped_at: NaiveDateTime,
}

impl PermitRecord {
    pub fn key(&self) -> PermitKey {
        PermitKey::new(&self.city, &self.permit_id)
    }
}

/// Identity of a permit across the master dataset.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct PermitKey {
    pub city: String,
    pub permit_id: String,
}

impl PermitKey {
    pub fn new(city: impl Into<String>, permit_id: impl Into<String>) -> Self {
        Self {
            city: city.into(),
            permit_id: permit_id.into(),
        }
    }
}

impl std::fmt::Display for PermitKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.city, self.permit_id)
    }
}

pub(crate) mod timestamp_format {
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub(crate) const FORMAT: &str = "%Y-%m-%d %H:%M:%S";

    pub(crate) fn serialize<S>(value: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(&value.format(FORMAT))
    }

    pub(crate) fn deserialize<'de, D>(deserializer: D) -> Result<NaiveDateTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        let trimmed = raw.trim();
        NaiveDateTime::parse_from_str(trimmed, FORMAT)
            .or_else(|_| NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S%.f"))
            .map_err(serde::de::Error::custom)
    }
}
