use crate::config::ConfigError;
use crate::permits::service::RunServiceError;
use crate::permits::sources::SourceError;
use crate::telemetry::TelemetryError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use std::fmt;

#[derive(Debug)]
pub enum AppError {
    Config(ConfigError),
    Telemetry(TelemetryError),
    Io(std::io::Error),
    Server(axum::Error),
    Source(SourceError),
    Run(RunServiceError),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Config(err) => write!(f, "configuration error: {}", err),
            AppError::Telemetry(err) => write!(f, "telemetry error: {}", err),
            AppError::Io(err) => write!(f, "io error: {}", err),
            AppError::Server(err) => write!(f, "server error: {}", err),
            AppError::Source(err) => write!(f, "source error: {}", err),
            AppError::Run(err) => write!(f, "run error: {}", err),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Config(err) => Some(err),
            AppError::Telemetry(err) => Some(err),
            AppError::Io(err) => Some(err),
            AppError::Server(err) => Some(err),
            AppError::Source(err) => Some(err),
            AppError::Run(err) => Some(err),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Run(RunServiceError::UnknownCity(_))
            | AppError::Run(RunServiceError::InvalidQuery(_)) => StatusCode::BAD_REQUEST,
            AppError::Run(RunServiceError::NotFound(_)) => StatusCode::NOT_FOUND,
            AppError::Config(_)
            | AppError::Telemetry(_)
            | AppError::Io(_)
            | AppError::Server(_)
            | AppError::Source(_)
            | AppError::Run(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        // Run errors already read as client-facing messages.
        let message = match &self {
            AppError::Run(err) => err.to_string(),
            other => other.to_string(),
        };
        let body = Json(json!({ "error": message }));
        (status, body).into_response()
    }
}

impl From<ConfigError> for AppError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<TelemetryError> for AppError {
    fn from(value: TelemetryError) -> Self {
        Self::Telemetry(value)
    }
}

impl From<std::io::Error> for AppError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<axum::Error> for AppError {
    fn from(value: axum::Error) -> Self {
        Self::Server(value)
    }
}

impl From<SourceError> for AppError {
    fn from(value: SourceError) -> Self {
        Self::Source(value)
    }
}

impl From<RunServiceError> for AppError {
    fn from(value: RunServiceError) -> Self {
        Self::Run(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::permits::aggregator::UnknownCity;

    #[test]
    fn run_errors_map_to_client_statuses() {
        let unknown = AppError::from(RunServiceError::from(UnknownCity("boston".to_string())));
        assert_eq!(unknown.into_response().status(), StatusCode::BAD_REQUEST);

        let missing = AppError::from(RunServiceError::NotFound("run 'x'".to_string()));
        assert_eq!(missing.into_response().status(), StatusCode::NOT_FOUND);

        let source = AppError::from(SourceError::Unavailable("timeout".to_string()));
        assert_eq!(
            source.into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn run_error_bodies_carry_the_bare_message() {
        let response =
            AppError::from(RunServiceError::from(UnknownCity("boston".to_string()))).into_response();
        let bytes = axum::body::to_bytes(response.into_body(), 1 << 16)
            .await
            .expect("read body");
        let payload: serde_json::Value = serde_json::from_slice(&bytes).expect("json body");
        assert_eq!(payload, json!({ "error": "unknown city 'boston'" }));

        let response = AppError::from(ConfigError::InvalidPort).into_response();
        let bytes = axum::body::to_bytes(response.into_body(), 1 << 16)
            .await
            .expect("read body");
        let payload: serde_json::Value = serde_json::from_slice(&bytes).expect("json body");
        assert!(payload["error"]
            .as_str()
            .is_some_and(|message| message.starts_with("configuration error:")));
    }
}
