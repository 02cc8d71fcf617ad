use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use super::context::RequestContext;
use super::domain::{AuditRecordId, ConcurrencyStamp, ResumeDraft, ResumeId, UserId};
use super::repository::{AuditSettingStore, ResumeComparer, ResumeFilter, ResumeStore};
use super::service::{ErrorKind, ResumeService, ResumeServiceError};

/// Header carrying the already-authenticated acting user.
pub const ACTOR_HEADER: &str = "x-user-id";

type SharedService<S, A, C> = Arc<ResumeService<S, A, C>>;

/// Router builder exposing the resume lifecycle over HTTP.
pub fn resume_router<S, A, C>(service: SharedService<S, A, C>) -> Router
where
    S: ResumeStore + 'static,
    A: AuditSettingStore + 'static,
    C: ResumeComparer + 'static,
{
    Router::new()
        .route(
            "/api/v1/resumes",
            post(create_handler::<S, A, C>).get(list_handler::<S, A, C>),
        )
        .route(
            "/api/v1/resumes/:resume_id",
            get(fetch_handler::<S, A, C>)
                .put(update_handler::<S, A, C>)
                .delete(delete_handler::<S, A, C>),
        )
        .route(
            "/api/v1/resumes/:resume_id/audits",
            post(audit_handler::<S, A, C>),
        )
        .route(
            "/api/v1/resumes/:resume_id/audits/:audit_id",
            delete(cancel_audit_handler::<S, A, C>),
        )
        .route(
            "/api/v1/resumes/:resume_id/owner",
            put(assign_owner_handler::<S, A, C>),
        )
        .with_state(service)
}

#[derive(Debug, Deserialize)]
pub(crate) struct UpdateResumeRequest {
    #[serde(flatten)]
    pub(crate) changes: ResumeDraft,
    pub(crate) concurrency_stamp: ConcurrencyStamp,
    #[serde(default)]
    pub(crate) ignore_similarity: bool,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AuditRequest {
    pub(crate) passed: bool,
    #[serde(default)]
    pub(crate) remark: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AssignOwnerRequest {
    pub(crate) owner_user_id: UserId,
}

pub(crate) fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::InvalidArgument => StatusCode::BAD_REQUEST,
        ErrorKind::DuplicateConflict | ErrorKind::ConcurrencyConflict => StatusCode::CONFLICT,
        ErrorKind::SimilarityConflict | ErrorKind::InvalidState => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        ErrorKind::Unauthorized => StatusCode::FORBIDDEN,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Cancelled => StatusCode::REQUEST_TIMEOUT,
        ErrorKind::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
    }
}

pub(crate) fn error_response(error: ResumeServiceError) -> Response {
    let kind = error.kind();
    let mut payload = json!({
        "error": error.to_string(),
        "kind": kind,
    });
    match &error {
        ResumeServiceError::SimilarityConflict { relations } => {
            payload["relations"] = json!(relations);
        }
        ResumeServiceError::DuplicateConflict(conflict) => {
            payload["owner"] = json!(conflict.owner());
        }
        _ => {}
    }
    (status_for(kind), Json(payload)).into_response()
}

fn request_context(headers: &HeaderMap) -> Result<RequestContext, Response> {
    let actor = headers
        .get(ACTOR_HEADER)
        .and_then(|value| value.to_str().ok())
        .and_then(|raw| Uuid::parse_str(raw.trim()).ok())
        .filter(|id| !id.is_nil())
        .map(UserId)
        .ok_or_else(|| {
            let payload = json!({
                "error": format!("missing or malformed {ACTOR_HEADER} header"),
                "kind": ErrorKind::InvalidArgument,
            });
            (StatusCode::UNAUTHORIZED, Json(payload)).into_response()
        })?;
    Ok(RequestContext::new(actor))
}

macro_rules! try_response {
    ($expr:expr) => {
        match $expr {
            Ok(value) => value,
            Err(error) => return error_response(error),
        }
    };
}

macro_rules! actor_context {
    ($headers:expr) => {
        match request_context(&$headers) {
            Ok(ctx) => ctx,
            Err(response) => return response,
        }
    };
}

pub(crate) async fn create_handler<S, A, C>(
    State(service): State<SharedService<S, A, C>>,
    headers: HeaderMap,
    Json(draft): Json<ResumeDraft>,
) -> Response
where
    S: ResumeStore + 'static,
    A: AuditSettingStore + 'static,
    C: ResumeComparer + 'static,
{
    let ctx = actor_context!(headers);
    let resume = try_response!(service.create(&ctx, draft).await);
    (StatusCode::CREATED, Json(resume.status_view())).into_response()
}

pub(crate) async fn list_handler<S, A, C>(
    State(service): State<SharedService<S, A, C>>,
    headers: HeaderMap,
    Query(filter): Query<ResumeFilter>,
) -> Response
where
    S: ResumeStore + 'static,
    A: AuditSettingStore + 'static,
    C: ResumeComparer + 'static,
{
    let ctx = actor_context!(headers);
    let resumes = try_response!(service.list(&ctx, &filter).await);
    let views: Vec<_> = resumes.iter().map(|resume| resume.status_view()).collect();
    (StatusCode::OK, Json(views)).into_response()
}

pub(crate) async fn fetch_handler<S, A, C>(
    State(service): State<SharedService<S, A, C>>,
    headers: HeaderMap,
    Path(resume_id): Path<Uuid>,
) -> Response
where
    S: ResumeStore + 'static,
    A: AuditSettingStore + 'static,
    C: ResumeComparer + 'static,
{
    let ctx = actor_context!(headers);
    let resume = try_response!(service.get(&ctx, ResumeId(resume_id)).await);
    (StatusCode::OK, Json(resume.status_view())).into_response()
}

pub(crate) async fn update_handler<S, A, C>(
    State(service): State<SharedService<S, A, C>>,
    headers: HeaderMap,
    Path(resume_id): Path<Uuid>,
    Json(request): Json<UpdateResumeRequest>,
) -> Response
where
    S: ResumeStore + 'static,
    A: AuditSettingStore + 'static,
    C: ResumeComparer + 'static,
{
    let ctx = actor_context!(headers);
    let mut resume = try_response!(service.get(&ctx, ResumeId(resume_id)).await);

    // The client's stamp decides whether this write is stale.
    resume.concurrency_stamp = request.concurrency_stamp;
    request.changes.apply_to(&mut resume);

    let updated = try_response!(
        service
            .update(&ctx, resume, request.ignore_similarity)
            .await
    );
    (StatusCode::OK, Json(updated.status_view())).into_response()
}

pub(crate) async fn delete_handler<S, A, C>(
    State(service): State<SharedService<S, A, C>>,
    headers: HeaderMap,
    Path(resume_id): Path<Uuid>,
) -> Response
where
    S: ResumeStore + 'static,
    A: AuditSettingStore + 'static,
    C: ResumeComparer + 'static,
{
    let ctx = actor_context!(headers);
    let resume = try_response!(service.get(&ctx, ResumeId(resume_id)).await);
    try_response!(service.delete(&ctx, resume).await);
    StatusCode::NO_CONTENT.into_response()
}

pub(crate) async fn audit_handler<S, A, C>(
    State(service): State<SharedService<S, A, C>>,
    headers: HeaderMap,
    Path(resume_id): Path<Uuid>,
    Json(request): Json<AuditRequest>,
) -> Response
where
    S: ResumeStore + 'static,
    A: AuditSettingStore + 'static,
    C: ResumeComparer + 'static,
{
    let ctx = actor_context!(headers);
    let resume = try_response!(service.get(&ctx, ResumeId(resume_id)).await);
    let approver = ctx.actor();
    let audited = try_response!(
        service
            .audit(&ctx, resume, request.passed, approver, request.remark)
            .await
    );
    (StatusCode::OK, Json(audited.status_view())).into_response()
}

pub(crate) async fn cancel_audit_handler<S, A, C>(
    State(service): State<SharedService<S, A, C>>,
    headers: HeaderMap,
    Path((resume_id, audit_id)): Path<(Uuid, Uuid)>,
) -> Response
where
    S: ResumeStore + 'static,
    A: AuditSettingStore + 'static,
    C: ResumeComparer + 'static,
{
    let ctx = actor_context!(headers);
    let resume = try_response!(service.get(&ctx, ResumeId(resume_id)).await);
    let approver = ctx.actor();
    let reopened = try_response!(
        service
            .cancel_audit(&ctx, resume, approver, AuditRecordId(audit_id))
            .await
    );
    (StatusCode::OK, Json(reopened.status_view())).into_response()
}

pub(crate) async fn assign_owner_handler<S, A, C>(
    State(service): State<SharedService<S, A, C>>,
    headers: HeaderMap,
    Path(resume_id): Path<Uuid>,
    Json(request): Json<AssignOwnerRequest>,
) -> Response
where
    S: ResumeStore + 'static,
    A: AuditSettingStore + 'static,
    C: ResumeComparer + 'static,
{
    let ctx = actor_context!(headers);
    let resume = try_response!(service.get(&ctx, ResumeId(resume_id)).await);
    let assigned = try_response!(
        service
            .assign_owner(&ctx, resume, request.owner_user_id)
            .await
    );
    (StatusCode::OK, Json(assigned.status_view())).into_response()
}
