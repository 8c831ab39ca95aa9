use std::collections::HashMap;
use std::io::Read;

use serde_json::Value;

use super::{CityProfile, FetchOptions, RawRow, RowSource, SourceError};

/// Canned rows keyed by city key. Cities without an entry return no rows.
#[derive(Debug, Clone, Default)]
pub struct StaticSource {
    rows: HashMap<String, Vec<RawRow>>,
    errors: HashMap<String, SourceError>,
}

impl StaticSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rows(mut self, city_key: &str, rows: Vec<RawRow>) -> Self {
        self.rows.insert(city_key.to_ascii_lowercase(), rows);
        self
    }

    /// Makes every fetch for the city fail with `error`.
    pub fn with_error(mut self, city_key: &str, error: SourceError) -> Self {
        self.errors.insert(city_key.to_ascii_lowercase(), error);
        self
    }

    /// Loads `{ "<city key>": [ {row}, ... ], ... }`.
    pub fn from_json_reader<R: Read>(reader: R) -> Result<Self, SourceError> {
        let payload: HashMap<String, Value> = serde_json::from_reader(reader)
            .map_err(|err| SourceError::Malformed(err.to_string()))?;

        let mut source = Self::new();
        for (city_key, value) in payload {
            let Value::Array(items) = value else {
                return Err(SourceError::Malformed(format!(
                    "fixture entry for '{city_key}' must be an array"
                )));
            };
            let rows = items
                .into_iter()
                .filter_map(|item| match item {
                    Value::Object(row) => Some(row),
                    _ => None,
                })
                .collect();
            source = source.with_rows(&city_key, rows);
        }
        Ok(source)
    }
}

impl RowSource for StaticSource {
    async fn fetch(
        &self,
        city: &CityProfile,
        options: &FetchOptions,
    ) -> Result<Vec<RawRow>, SourceError> {
        if let Some(error) = self.errors.get(city.key) {
            return Err(error.clone());
        }

        let mut rows = self.rows.get(city.key).cloned().unwrap_or_default();
        rows.truncate(options.limit as usize);
        Ok(rows)
    }
}
