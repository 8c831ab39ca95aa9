use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{rejection::QueryRejection, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;

use super::query::PermitQuery;
use super::repository::{PermitRepository, RunRepository};
use super::run::RunRequest;
use super::service::PermitRunService;
use super::sources::RowSource;
use crate::error::AppError;

const DEFAULT_RUN_HISTORY: usize = 20;

/// Router builder exposing run, listing, and dashboard endpoints.
pub fn permit_router<S, R, P>(service: Arc<PermitRunService<S, R, P>>) -> Router
where
    S: RowSource + 'static,
    R: RunRepository + 'static,
    P: PermitRepository + 'static,
{
    Router::new()
        .route("/api/v1/cities", get(cities_handler::<S, R, P>))
        .route(
            "/api/v1/runs",
            post(trigger_handler::<S, R, P>).get(recent_runs_handler::<S, R, P>),
        )
        .route("/api/v1/runs/:run_id", get(run_status_handler::<S, R, P>))
        .route("/api/v1/permits", get(list_handler::<S, R, P>))
        .route(
            "/api/v1/permits/:city/:permit_id",
            get(permit_handler::<S, R, P>),
        )
        .route("/api/v1/dashboard", get(dashboard_handler::<S, R, P>))
        .with_state(service)
}

pub(crate) async fn cities_handler<S, R, P>(
    State(service): State<Arc<PermitRunService<S, R, P>>>,
) -> Response
where
    S: RowSource + 'static,
    R: RunRepository + 'static,
    P: PermitRepository + 'static,
{
    let cities: Vec<_> = service
        .cities()
        .iter()
        .map(|city| {
            json!({
                "key": city.key,
                "name": city.name,
                "data_source": city.data_source,
            })
        })
        .collect();
    (StatusCode::OK, Json(cities)).into_response()
}

pub(crate) async fn trigger_handler<S, R, P>(
    State(service): State<Arc<PermitRunService<S, R, P>>>,
    body: Bytes,
) -> Response
where
    S: RowSource + 'static,
    R: RunRepository + 'static,
    P: PermitRepository + 'static,
{
    // Every trigger parameter is optional, so an empty body starts a default run.
    let request = if body.iter().all(u8::is_ascii_whitespace) {
        RunRequest::default()
    } else {
        match serde_json::from_slice::<RunRequest>(&body) {
            Ok(request) => request,
            Err(error) => {
                let payload = json!({
                    "error": format!("invalid run request: {error}"),
                });
                return (StatusCode::BAD_REQUEST, Json(payload)).into_response();
            }
        }
    };
    match service.trigger(request).await {
        Ok(report) => (StatusCode::OK, Json(report)).into_response(),
        Err(error) => AppError::from(error).into_response(),
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct HistoryParams {
    #[serde(default)]
    limit: Option<usize>,
}

pub(crate) async fn recent_runs_handler<S, R, P>(
    State(service): State<Arc<PermitRunService<S, R, P>>>,
    Query(params): Query<HistoryParams>,
) -> Response
where
    S: RowSource + 'static,
    R: RunRepository + 'static,
    P: PermitRepository + 'static,
{
    let limit = params.limit.unwrap_or(DEFAULT_RUN_HISTORY);
    match service.recent_runs(limit) {
        Ok(runs) => (StatusCode::OK, Json(runs)).into_response(),
        Err(error) => AppError::from(error).into_response(),
    }
}

pub(crate) async fn run_status_handler<S, R, P>(
    State(service): State<Arc<PermitRunService<S, R, P>>>,
    Path(run_id): Path<String>,
) -> Response
where
    S: RowSource + 'static,
    R: RunRepository + 'static,
    P: PermitRepository + 'static,
{
    match service.run_status(&run_id) {
        Ok(report) => (StatusCode::OK, Json(report)).into_response(),
        Err(error) => AppError::from(error).into_response(),
    }
}

pub(crate) async fn list_handler<S, R, P>(
    State(service): State<Arc<PermitRunService<S, R, P>>>,
    query: Result<Query<PermitQuery>, QueryRejection>,
) -> Response
where
    S: RowSource + 'static,
    R: RunRepository + 'static,
    P: PermitRepository + 'static,
{
    let Query(query) = match query {
        Ok(query) => query,
        Err(rejection) => {
            let payload = json!({
                "error": rejection.body_text(),
            });
            return (StatusCode::BAD_REQUEST, Json(payload)).into_response();
        }
    };
    match service.list_permits(&query) {
        Ok(page) => (StatusCode::OK, Json(page)).into_response(),
        Err(error) => AppError::from(error).into_response(),
    }
}

pub(crate) async fn permit_handler<S, R, P>(
    State(service): State<Arc<PermitRunService<S, R, P>>>,
    Path((city, permit_id)): Path<(String, String)>,
) -> Response
where
    S: RowSource + 'static,
    R: RunRepository + 'static,
    P: PermitRepository + 'static,
{
    match service.permit(&city, &permit_id) {
        Ok(record) => (StatusCode::OK, Json(record)).into_response(),
        Err(error) => AppError::from(error).into_response(),
    }
}

pub(crate) async fn dashboard_handler<S, R, P>(
    State(service): State<Arc<PermitRunService<S, R, P>>>,
) -> Response
where
    S: RowSource + 'static,
    R: RunRepository + 'static,
    P: PermitRepository + 'static,
{
    match service.dashboard() {
        Ok(stats) => (StatusCode::OK, Json(stats)).into_response(),
        Err(error) => AppError::from(error).into_response(),
    }
}
