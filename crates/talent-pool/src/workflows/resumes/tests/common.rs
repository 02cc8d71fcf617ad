use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::response::Response;
use serde_json::Value;

use crate::config::ResumeOptions;
use crate::workflows::resumes::context::RequestContext;
use crate::workflows::resumes::domain::{
    AuditRecordId, AuditSetting, DeletionMarker, Resume, ResumeAuditRecord, ResumeCompare,
    ResumeDraft, ResumeId, ResumeKeywordMap, UserId,
};
use crate::workflows::resumes::repository::{
    ComparerError, ResumeComparer, ResumeFilter, ResumeLookup, ResumeStore, StoreError,
};
use crate::workflows::resumes::store::{MemoryResumeStore, StaticAuditSettings};
use crate::workflows::resumes::validation::{ResumeValidator, ValidationError};
use crate::workflows::resumes::ResumeService;

pub(super) type MemoryService =
    ResumeService<MemoryResumeStore, StaticAuditSettings, ScriptedComparer>;

pub(super) fn options() -> ResumeOptions {
    ResumeOptions {
        min_similarity: 0.8,
    }
}

pub(super) fn recruiter() -> UserId {
    UserId(uuid::Uuid::from_u128(0x5eed))
}

pub(super) fn ctx() -> RequestContext {
    RequestContext::new(recruiter())
}

pub(super) fn draft(name: &str, phone: &str) -> ResumeDraft {
    ResumeDraft {
        name: name.to_string(),
        city: "Hangzhou".to_string(),
        phone_number: phone.to_string(),
        email: format!("{}@example.com", name.to_lowercase().replace(' ', ".")),
        description: "Five years of backend development".to_string(),
        platform_name: "Zhaopin".to_string(),
        keywords: vec!["backend".to_string()],
        ..ResumeDraft::default()
    }
}

/// Three approvers at orders 0, 1, 2.
pub(super) fn approval_chain() -> (Vec<UserId>, StaticAuditSettings) {
    let approvers: Vec<UserId> = (1..=3u128)
        .map(|seed| UserId(uuid::Uuid::from_u128(0xa000 + seed)))
        .collect();
    let settings = approvers
        .iter()
        .enumerate()
        .map(|(order, user_id)| AuditSetting {
            user_id: *user_id,
            order: order as u32,
        })
        .collect();
    (approvers, StaticAuditSettings::new(settings))
}

pub(super) struct Harness {
    pub(super) service: MemoryService,
    pub(super) store: Arc<MemoryResumeStore>,
    pub(super) comparer: Arc<ScriptedComparer>,
    pub(super) approvers: Vec<UserId>,
}

pub(super) fn build_service() -> Harness {
    let store = Arc::new(MemoryResumeStore::new());
    let comparer = Arc::new(ScriptedComparer::default());
    let (approvers, settings) = approval_chain();
    let service = ResumeService::new(
        store.clone(),
        Arc::new(settings),
        comparer.clone(),
        options(),
    );
    Harness {
        service,
        store,
        comparer,
        approvers,
    }
}

/// Comparer returning whatever relations the test scripted, recording each threshold seen.
#[derive(Default)]
pub(super) struct ScriptedComparer {
    relations: Mutex<Vec<ResumeCompare>>,
    thresholds: Mutex<Vec<f32>>,
}

impl ScriptedComparer {
    pub(super) fn script(&self, relations: Vec<ResumeCompare>) {
        *self.relations.lock().expect("comparer mutex poisoned") = relations;
    }

    pub(super) fn thresholds(&self) -> Vec<f32> {
        self.thresholds
            .lock()
            .expect("comparer mutex poisoned")
            .clone()
    }
}

#[async_trait]
impl ResumeComparer for ScriptedComparer {
    async fn compare(
        &self,
        _ctx: &RequestContext,
        _resume: &Resume,
        min_similarity: f32,
    ) -> Result<Vec<ResumeCompare>, ComparerError> {
        self.thresholds
            .lock()
            .expect("comparer mutex poisoned")
            .push(min_similarity);
        Ok(self
            .relations
            .lock()
            .expect("comparer mutex poisoned")
            .iter()
            .filter(|relation| relation.similarity >= min_similarity)
            .cloned()
            .collect())
    }
}

/// Validator that counts invocations and optionally fails every time.
pub(super) struct CountingValidator {
    pub(super) calls: Arc<AtomicUsize>,
    pub(super) fail_with: Option<ResumeId>,
}

impl CountingValidator {
    pub(super) fn passing() -> (Self, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        (
            Self {
                calls: calls.clone(),
                fail_with: None,
            },
            calls,
        )
    }

    pub(super) fn failing(owner: ResumeId) -> (Self, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        (
            Self {
                calls: calls.clone(),
                fail_with: Some(owner),
            },
            calls,
        )
    }

    pub(super) fn count(calls: &AtomicUsize) -> usize {
        calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ResumeValidator for CountingValidator {
    fn name(&self) -> &'static str {
        "counting"
    }

    async fn validate(
        &self,
        _lookup: &dyn ResumeLookup,
        _ctx: &RequestContext,
        resume: &Resume,
    ) -> Result<(), ValidationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.fail_with {
            Some(owner) => Err(
                crate::workflows::resumes::validation::DuplicateConflict::PlatformId {
                    platform_id: resume.platform_id.clone(),
                    owner,
                }
                .into(),
            ),
            None => Ok(()),
        }
    }
}

/// Store whose writes after creation always fail, for no-partial-commit checks.
#[derive(Default, Clone)]
pub(super) struct ReadOnlyStore {
    pub(super) inner: MemoryResumeStore,
}

#[async_trait]
impl ResumeLookup for ReadOnlyStore {
    async fn find_by_phone_number(
        &self,
        ctx: &RequestContext,
        phone_number: &str,
        extension_number: &str,
    ) -> Result<Option<Resume>, StoreError> {
        self.inner
            .find_by_phone_number(ctx, phone_number, extension_number)
            .await
    }

    async fn find_by_platform(
        &self,
        ctx: &RequestContext,
        platform_id: &str,
    ) -> Result<Option<Resume>, StoreError> {
        self.inner.find_by_platform(ctx, platform_id).await
    }
}

#[async_trait]
impl ResumeStore for ReadOnlyStore {
    async fn find_by_id(
        &self,
        ctx: &RequestContext,
        id: ResumeId,
    ) -> Result<Option<Resume>, StoreError> {
        self.inner.find_by_id(ctx, id).await
    }

    async fn list(
        &self,
        ctx: &RequestContext,
        filter: &ResumeFilter,
    ) -> Result<Vec<Resume>, StoreError> {
        self.inner.list(ctx, filter).await
    }

    async fn create(&self, ctx: &RequestContext, resume: Resume) -> Result<Resume, StoreError> {
        self.inner.create(ctx, resume).await
    }

    async fn update(&self, _ctx: &RequestContext, _resume: Resume) -> Result<Resume, StoreError> {
        Err(StoreError::Unavailable("read only".to_string()))
    }

    async fn delete(
        &self,
        _ctx: &RequestContext,
        _resume: Resume,
        _marker: DeletionMarker,
    ) -> Result<Resume, StoreError> {
        Err(StoreError::Unavailable("read only".to_string()))
    }

    async fn audit_record(
        &self,
        ctx: &RequestContext,
        id: AuditRecordId,
    ) -> Result<Option<ResumeAuditRecord>, StoreError> {
        self.inner.audit_record(ctx, id).await
    }

    async fn keyword_maps_by_keyword(
        &self,
        ctx: &RequestContext,
        keyword: &str,
    ) -> Result<Vec<ResumeKeywordMap>, StoreError> {
        self.inner.keyword_maps_by_keyword(ctx, keyword).await
    }

    async fn keyword_maps_for_resume(
        &self,
        ctx: &RequestContext,
        resume_id: ResumeId,
    ) -> Result<Vec<ResumeKeywordMap>, StoreError> {
        self.inner.keyword_maps_for_resume(ctx, resume_id).await
    }

    async fn remove_keyword_maps(
        &self,
        _ctx: &RequestContext,
        _maps: &[ResumeKeywordMap],
    ) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("read only".to_string()))
    }
}

pub(super) fn relation(similarity: f32) -> ResumeCompare {
    ResumeCompare {
        relation_resume_id: ResumeId(uuid::Uuid::from_u128(0xbeef)),
        relation_resume_name: "Zhang San".to_string(),
        similarity,
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
