use crate::cli::ServeArgs;
use crate::infra::{build_service, AppState};
use crate::routes::with_permit_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use permit_hub::config::AppConfig;
use permit_hub::error::AppError;
use permit_hub::telemetry;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{info, warn};

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let service = build_service(&config.pipeline, args.fixture.as_deref())?;
    match service.hydrate() {
        Ok(records) => info!(records, "master dataset loaded"),
        Err(error) => warn!(%error, "starting with an empty permit listing"),
    }

    let app = with_permit_routes(service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        output_dir = %config.pipeline.output_dir.display(),
        "permit hub ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
