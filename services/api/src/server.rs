use crate::cli::ServeArgs;
use crate::infra::{in_memory_workflow, AppState};
use crate::routes::with_application_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use hiretrack::config::AppConfig;
use hiretrack::error::AppError;
use hiretrack::telemetry;
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

    telemetry::init(&config.telemetry, config.environment)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let identity = config.auth.identity();
    if identity.is_empty() {
        warn!("APP_API_TOKENS is empty; every workflow route will answer 401");
    }
    let workflow = in_memory_workflow(identity, &config.workflow);

    let app = with_application_routes(workflow)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        conflict_retries = config.workflow.conflict_retries,
        "application workflow service ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
