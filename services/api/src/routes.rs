use crate::infra::AppState;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Extension, Json, Router};
use serde_json::json;
use std::sync::Arc;
use talent_pool::workflows::resumes::{
    resume_router, AuditSettingStore, ResumeComparer, ResumeService, ResumeStore,
};

pub(crate) fn with_resume_routes<S, A, C>(service: Arc<ResumeService<S, A, C>>) -> Router
where
    S: ResumeStore + 'static,
    A: AuditSettingStore + 'static,
    C: ResumeComparer + 'static,
{
    resume_router(service)
        .route("/health", get(healthcheck))
        .route("/ready", get(readiness_endpoint))
        .route("/metrics", get(metrics_endpoint))
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let (status, label) = if ready {
        (StatusCode::OK, "ready")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "initializing")
    };

    (status, Json(json!({ "status": label })))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::{audit_chain, TokenOverlapComparer};
    use axum::body::Body;
    use axum::http::Request;
    use metrics_exporter_prometheus::PrometheusBuilder;
    use std::sync::atomic::{AtomicBool, Ordering};
    use talent_pool::config::ResumeOptions;
    use talent_pool::workflows::resumes::{
        MemoryResumeStore, StaticAuditSettings, UserId, ACTOR_HEADER,
    };
    use tower::ServiceExt;

    fn app(readiness: Arc<AtomicBool>) -> Router {
        let store = Arc::new(MemoryResumeStore::new());
        let service = Arc::new(ResumeService::new(
            store.clone(),
            Arc::new(StaticAuditSettings::new(audit_chain(&[UserId::new()]))),
            Arc::new(TokenOverlapComparer::new(store)),
            ResumeOptions::default(),
        ));
        let handle = PrometheusBuilder::new().build_recorder().handle();
        with_resume_routes(service).layer(Extension(AppState {
            readiness,
            metrics: Arc::new(handle),
        }))
    }

    #[tokio::test]
    async fn readiness_tracks_the_flag() {
        let flag = Arc::new(AtomicBool::new(false));
        let router = app(flag.clone());

        let response = router
            .clone()
            .oneshot(Request::get("/ready").body(Body::empty()).expect("request"))
            .await
            .expect("router responds");
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        flag.store(true, Ordering::Release);
        let response = router
            .oneshot(Request::get("/ready").body(Body::empty()).expect("request"))
            .await
            .expect("router responds");
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn resume_routes_are_mounted_next_to_health() {
        let router = app(Arc::new(AtomicBool::new(true)));

        let response = router
            .clone()
            .oneshot(Request::get("/health").body(Body::empty()).expect("request"))
            .await
            .expect("router responds");
        assert_eq!(response.status(), StatusCode::OK);

        let response = router
            .oneshot(
                Request::get("/api/v1/resumes")
                    .header(ACTOR_HEADER, UserId::new().to_string())
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("router responds");
        assert_eq!(response.status(), StatusCode::OK);
    }
}
