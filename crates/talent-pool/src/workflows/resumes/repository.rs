use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::context::{Interrupted, RequestContext};
use super::domain::{
    AuditRecordId, AuditSetting, AuditStatus, ConcurrencyStamp, DeletionMarker, JobId, Resume,
    ResumeAuditRecord, ResumeCompare, ResumeId, ResumeKeywordMap, UserId,
};
use super::validation::DuplicateConflict;

/// Read-only lookups validators are allowed to run against the full record set.
///
/// Every lookup ignores soft-deleted records.
#[async_trait]
pub trait ResumeLookup: Send + Sync {
    async fn find_by_phone_number(
        &self,
        ctx: &RequestContext,
        phone_number: &str,
        extension_number: &str,
    ) -> Result<Option<Resume>, StoreError>;

    async fn find_by_platform(
        &self,
        ctx: &RequestContext,
        platform_id: &str,
    ) -> Result<Option<Resume>, StoreError>;
}

/// Durable storage for resumes and the records they own.
///
/// `update` and `delete` must compare the incoming concurrency stamp with the stored one
/// and fail with [`StoreError::ConcurrencyConflict`] without writing anything on mismatch.
/// Successful writes persist the whole aggregate (audit records, attachments, keywords,
/// similarity history) at once and return it with a fresh stamp.
///
/// `create` and `update` re-check phone/extension and platform id uniqueness under the
/// same critical section as the write and fail with [`StoreError::Duplicate`], so two
/// writers that both passed validation cannot both land.
#[async_trait]
pub trait ResumeStore: ResumeLookup {
    async fn find_by_id(
        &self,
        ctx: &RequestContext,
        id: ResumeId,
    ) -> Result<Option<Resume>, StoreError>;

    async fn list(
        &self,
        ctx: &RequestContext,
        filter: &ResumeFilter,
    ) -> Result<Vec<Resume>, StoreError>;

    async fn create(&self, ctx: &RequestContext, resume: Resume) -> Result<Resume, StoreError>;

    async fn update(&self, ctx: &RequestContext, resume: Resume) -> Result<Resume, StoreError>;

    /// Soft delete: the record stays stored but disappears from every read path.
    async fn delete(
        &self,
        ctx: &RequestContext,
        resume: Resume,
        marker: DeletionMarker,
    ) -> Result<Resume, StoreError>;

    async fn audit_record(
        &self,
        ctx: &RequestContext,
        id: AuditRecordId,
    ) -> Result<Option<ResumeAuditRecord>, StoreError>;

    async fn keyword_maps_by_keyword(
        &self,
        ctx: &RequestContext,
        keyword: &str,
    ) -> Result<Vec<ResumeKeywordMap>, StoreError>;

    async fn keyword_maps_for_resume(
        &self,
        ctx: &RequestContext,
        resume_id: ResumeId,
    ) -> Result<Vec<ResumeKeywordMap>, StoreError>;

    async fn remove_keyword_maps(
        &self,
        ctx: &RequestContext,
        maps: &[ResumeKeywordMap],
    ) -> Result<(), StoreError>;
}

/// Source of the approval chain. Re-read on every decision.
#[async_trait]
pub trait AuditSettingStore: Send + Sync {
    async fn audit_settings(&self, ctx: &RequestContext) -> Result<Vec<AuditSetting>, StoreError>;
}

/// External near-duplicate detector.
#[async_trait]
pub trait ResumeComparer: Send + Sync {
    /// Records at or above `min_similarity`, excluding `resume` itself.
    async fn compare(
        &self,
        ctx: &RequestContext,
        resume: &Resume,
        min_similarity: f32,
    ) -> Result<Vec<ResumeCompare>, ComparerError>;
}

/// Error enumeration for store failures.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error(transparent)]
    Duplicate(#[from] DuplicateConflict),
    #[error("resume {resume_id} was modified concurrently; reload and retry")]
    ConcurrencyConflict { resume_id: ResumeId },
    #[error(transparent)]
    Interrupted(#[from] Interrupted),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, thiserror::Error)]
pub enum ComparerError {
    #[error(transparent)]
    Interrupted(#[from] Interrupted),
    #[error("similarity comparer unavailable: {0}")]
    Unavailable(String),
}

/// Listing filter; unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResumeFilter {
    #[serde(default)]
    pub audit_status: Option<AuditStatus>,
    #[serde(default)]
    pub owner: Option<UserId>,
    #[serde(default)]
    pub job_id: Option<JobId>,
    #[serde(default)]
    pub creator: Option<UserId>,
}

impl ResumeFilter {
    pub fn matches(&self, resume: &Resume) -> bool {
        self.audit_status
            .map_or(true, |status| resume.audit_status == status)
            && self.owner.map_or(true, |owner| resume.owner_user_id == owner)
            && self.job_id.map_or(true, |job_id| resume.job_id == job_id)
            && self
                .creator
                .map_or(true, |creator| resume.creator_user_id == creator)
    }
}

/// Sanitized representation returned by the HTTP layer.
#[derive(Debug, Clone, Serialize)]
pub struct ResumeStatusView {
    pub id: ResumeId,
    pub name: String,
    pub job_id: JobId,
    pub phone_number: String,
    pub platform_name: String,
    pub platform_id: String,
    pub audit_status: &'static str,
    pub owner_user_id: UserId,
    pub creation_time: DateTime<Utc>,
    pub concurrency_stamp: ConcurrencyStamp,
    pub keywords: Vec<String>,
    pub audit_records: Vec<ResumeAuditRecord>,
    pub compares: Vec<ResumeCompare>,
    pub attachment_count: usize,
}

impl Resume {
    pub fn status_view(&self) -> ResumeStatusView {
        ResumeStatusView {
            id: self.id,
            name: self.name.clone(),
            job_id: self.job_id,
            phone_number: self.phone_number.clone(),
            platform_name: self.platform_name.clone(),
            platform_id: self.platform_id.clone(),
            audit_status: self.audit_status.label(),
            owner_user_id: self.owner_user_id,
            creation_time: self.creation_time,
            concurrency_stamp: self.concurrency_stamp.clone(),
            keywords: self
                .keyword_list()
                .into_iter()
                .map(str::to_string)
                .collect(),
            audit_records: self.audit_records.clone(),
            compares: self.compares.clone(),
            attachment_count: self.attachments.len(),
        }
    }
}
