use crate::cli::ServeArgs;
use crate::infra::{audit_chain, AppState, TokenOverlapComparer};
use crate::routes::with_resume_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use talent_pool::config::AppConfig;
use talent_pool::error::AppError;
use talent_pool::telemetry;
use talent_pool::workflows::resumes::{MemoryResumeStore, ResumeService, StaticAuditSettings};
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
    let readiness_flag = Arc::new(AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    if config.approvers.is_empty() {
        warn!("RESUME_APPROVERS is empty; every audit decision will be rejected");
    }

    let store = Arc::new(MemoryResumeStore::new());
    let audit_settings = Arc::new(StaticAuditSettings::new(audit_chain(&config.approvers)));
    let comparer = Arc::new(TokenOverlapComparer::new(store.clone()));
    let resume_service = Arc::new(ResumeService::new(
        store,
        audit_settings,
        comparer,
        config.resumes,
    ));

    let app = with_resume_routes(resume_service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        approvers = config.approvers.len(),
        min_similarity = config.resumes.min_similarity,
        "talent pool service ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
