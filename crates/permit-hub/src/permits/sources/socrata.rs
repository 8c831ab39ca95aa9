use std::time::Duration;

use reqwest::StatusCode;
use serde_json::Value;

use super::{CityProfile, FetchOptions, RawRow, RowSource, SourceError};

const USER_AGENT: &str = concat!("permit-hub/", env!("CARGO_PKG_VERSION"));

/// Live transport against Socrata (SODA) open-data endpoints.
#[derive(Debug, Clone)]
pub struct SocrataSource {
    client: reqwest::Client,
    app_token: Option<String>,
}

impl SocrataSource {
    pub fn new(timeout: Duration) -> Result<Self, SourceError> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|err| SourceError::Unavailable(err.to_string()))?;

        Ok(Self {
            client,
            app_token: None,
        })
    }

    pub fn with_app_token(mut self, token: Option<String>) -> Self {
        self.app_token = token;
        self
    }
}

/// SODA query parameters for one city: row limit, newest first, and the pushed-down filters.
pub fn build_query(city: &CityProfile, options: &FetchOptions) -> Vec<(&'static str, String)> {
    let fields = &city.fields;
    let mut params = vec![
        ("$limit", options.limit.to_string()),
        ("$order", format!("{} DESC", fields.issue_date)),
    ];

    let mut clauses = Vec::new();
    if options.min_cost > 0 && fields.cost.queryable {
        let cost = match fields.cost.revised {
            Some(revised) => format!(
                "({primary} > {min} OR {revised} > {min})",
                primary = fields.cost.primary,
                min = options.min_cost,
            ),
            None => format!("{} > {}", fields.cost.primary, options.min_cost),
        };
        clauses.push(cost);
    }
    if let Some(since) = options.issued_since {
        clauses.push(format!(
            "{} >= '{}T00:00:00'",
            fields.issue_date,
            since.format("%Y-%m-%d")
        ));
    }
    if !clauses.is_empty() {
        params.push(("$where", clauses.join(" AND ")));
    }

    params
}

fn rows_from_payload(payload: Value) -> Result<Vec<RawRow>, SourceError> {
    let Value::Array(items) = payload else {
        return Err(SourceError::Malformed(
            "expected a JSON array of rows".to_string(),
        ));
    };

    items
        .into_iter()
        .map(|item| match item {
            Value::Object(row) => Ok(row),
            other => Err(SourceError::Malformed(format!(
                "expected row objects, found {other}"
            ))),
        })
        .collect()
}

impl RowSource for SocrataSource {
    async fn fetch(
        &self,
        city: &CityProfile,
        options: &FetchOptions,
    ) -> Result<Vec<RawRow>, SourceError> {
        let params = build_query(city, options);
        tracing::debug!(city = city.key, endpoint = city.endpoint, "querying portal");

        let mut request = self.client.get(city.endpoint).query(&params);
        if let Some(token) = &self.app_token {
            request = request.header("X-App-Token", token);
        }

        let response = request
            .send()
            .await
            .map_err(|err| SourceError::Unavailable(err.to_string()))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(SourceError::Unauthorized(status.as_u16()));
        }
        if !status.is_success() {
            return Err(SourceError::Unavailable(format!(
                "{} responded with HTTP {}",
                city.endpoint,
                status.as_u16()
            )));
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|err| SourceError::Malformed(err.to_string()))?;

        rows_from_payload(payload)
    }
}
