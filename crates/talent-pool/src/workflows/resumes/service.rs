use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};

use super::audit::{self, AuditError};
use super::context::{Interrupted, RequestContext};
use super::domain::{
    AttachmentId, AuditRecordId, DeletionMarker, Resume, ResumeAttachment, ResumeAuditRecord,
    ResumeCompare, ResumeDraft, ResumeId, ResumeKeywordMap, UserId,
};
use super::repository::{
    AuditSettingStore, ComparerError, ResumeComparer, ResumeFilter, ResumeStore, StoreError,
};
use super::validation::{DuplicateConflict, ValidationError, ValidationPipeline};
use crate::config::ResumeOptions;

const FIELD_LIMITS: [(&str, usize); 7] = [
    ("name", 32),
    ("phone_number", 16),
    ("extension_number", 8),
    ("city", 32),
    ("email", 128),
    ("platform_name", 128),
    ("platform_id", 256),
];

/// Lifecycle engine: the only component that mutates resume state.
///
/// Request-scoped and stateless between calls; concurrent writers are arbitrated by the
/// store's concurrency stamp and conflicts are surfaced, never retried here.
pub struct ResumeService<S, A, C> {
    store: Arc<S>,
    audit_settings: Arc<A>,
    comparer: Arc<C>,
    validators: Arc<ValidationPipeline>,
    options: ResumeOptions,
}

impl<S, A, C> ResumeService<S, A, C>
where
    S: ResumeStore + 'static,
    A: AuditSettingStore + 'static,
    C: ResumeComparer + 'static,
{
    pub fn new(
        store: Arc<S>,
        audit_settings: Arc<A>,
        comparer: Arc<C>,
        options: ResumeOptions,
    ) -> Self {
        Self::with_validators(
            ValidationPipeline::standard(),
            store,
            audit_settings,
            comparer,
            options,
        )
    }

    pub fn with_validators(
        validators: ValidationPipeline,
        store: Arc<S>,
        audit_settings: Arc<A>,
        comparer: Arc<C>,
        options: ResumeOptions,
    ) -> Self {
        Self {
            store,
            audit_settings,
            comparer,
            validators: Arc::new(validators),
            options,
        }
    }

    pub fn options(&self) -> ResumeOptions {
        self.options
    }

    /// Validate and persist a new resume in `Ongoing`.
    pub async fn create(
        &self,
        ctx: &RequestContext,
        draft: ResumeDraft,
    ) -> Result<Resume, ResumeServiceError> {
        ctx.checkpoint()?;
        let resume = draft.into_resume(ctx.actor(), Utc::now());
        check_field_limits(&resume)?;

        self.validate(ctx, &resume).await?;

        let stored = self.store.create(ctx, resume).await?;
        info!(resume_id = %stored.id, creator = %stored.creator_user_id, "resume created");
        Ok(stored)
    }

    /// Validate, run the similarity gate, and persist changes to an existing resume.
    ///
    /// Similar resumes reject the update unless `ignore_duplicated` is set, in which case they
    /// are stored on the resume as review history.
    pub async fn update(
        &self,
        ctx: &RequestContext,
        mut resume: Resume,
        ignore_duplicated: bool,
    ) -> Result<Resume, ResumeServiceError> {
        ctx.checkpoint()?;
        resume.normalize();
        check_field_limits(&resume)?;
        self.keep_audit_trail(ctx, &mut resume).await?;

        self.validate(ctx, &resume).await?;

        let relations = self
            .comparer
            .compare(ctx, &resume, self.options.min_similarity)
            .await?;
        if !relations.is_empty() && !ignore_duplicated {
            warn!(
                resume_id = %resume.id,
                similar = relations.len(),
                "update rejected by similarity gate"
            );
            return Err(ResumeServiceError::SimilarityConflict { relations });
        }
        resume.compares = relations;

        self.persist(ctx, resume).await
    }

    /// Soft delete; the record keeps its history but leaves every read path.
    pub async fn delete(
        &self,
        ctx: &RequestContext,
        resume: Resume,
    ) -> Result<Resume, ResumeServiceError> {
        ctx.checkpoint()?;
        let marker = DeletionMarker {
            deleter_user_id: ctx.actor(),
            deletion_time: Utc::now(),
        };
        let deleted = self.store.delete(ctx, resume, marker).await?;
        info!(resume_id = %deleted.id, "resume deleted");
        Ok(deleted)
    }

    pub async fn find_by_id(
        &self,
        ctx: &RequestContext,
        id: ResumeId,
    ) -> Result<Option<Resume>, ResumeServiceError> {
        ctx.checkpoint()?;
        Ok(self.store.find_by_id(ctx, id).await?)
    }

    /// Like [`Self::find_by_id`] but a missing resume is an error.
    pub async fn get(
        &self,
        ctx: &RequestContext,
        id: ResumeId,
    ) -> Result<Resume, ResumeServiceError> {
        self.find_by_id(ctx, id)
            .await?
            .ok_or(ResumeServiceError::ResumeNotFound(id))
    }

    pub async fn list(
        &self,
        ctx: &RequestContext,
        filter: &ResumeFilter,
    ) -> Result<Vec<Resume>, ResumeServiceError> {
        ctx.checkpoint()?;
        Ok(self.store.list(ctx, filter).await?)
    }

    pub async fn find_by_phone_number(
        &self,
        ctx: &RequestContext,
        phone_number: &str,
        extension_number: &str,
    ) -> Result<Option<Resume>, ResumeServiceError> {
        ctx.checkpoint()?;
        let (phone_number, extension_number) = (phone_number.trim(), extension_number.trim());
        if phone_number.is_empty() {
            return Err(ResumeServiceError::InvalidArgument(
                "phone_number must not be empty".to_string(),
            ));
        }
        Ok(self
            .store
            .find_by_phone_number(ctx, phone_number, extension_number)
            .await?)
    }

    pub async fn find_by_platform(
        &self,
        ctx: &RequestContext,
        platform_id: &str,
    ) -> Result<Option<Resume>, ResumeServiceError> {
        ctx.checkpoint()?;
        let platform_id = platform_id.trim();
        if platform_id.is_empty() {
            return Err(ResumeServiceError::InvalidArgument(
                "platform_id must not be empty".to_string(),
            ));
        }
        Ok(self.store.find_by_platform(ctx, platform_id).await?)
    }

    pub async fn audit_record(
        &self,
        ctx: &RequestContext,
        id: AuditRecordId,
    ) -> Result<Option<ResumeAuditRecord>, ResumeServiceError> {
        ctx.checkpoint()?;
        Ok(self.store.audit_record(ctx, id).await?)
    }

    /// Record `approver`'s decision and advance the audit status.
    ///
    /// The audit record and the status change are written in a single store update, so a
    /// failed write commits neither.
    pub async fn audit(
        &self,
        ctx: &RequestContext,
        mut resume: Resume,
        passed: bool,
        approver: UserId,
        remark: impl Into<String>,
    ) -> Result<Resume, ResumeServiceError> {
        ctx.checkpoint()?;
        if approver.is_nil() {
            return Err(ResumeServiceError::InvalidArgument(
                "approver must be set".to_string(),
            ));
        }
        self.keep_audit_trail(ctx, &mut resume).await?;

        let chain = self.audit_settings.audit_settings(ctx).await?;
        let decision = audit::decide(resume.audit_status, &chain, approver, passed)?;

        resume.audit_records.push(ResumeAuditRecord {
            id: AuditRecordId::new(),
            resume_id: resume.id,
            creator_user_id: approver,
            creation_time: Utc::now(),
            passed,
            remark: remark.into(),
        });
        resume.audit_status = decision.next_status;

        let stored = self.persist(ctx, resume).await?;
        info!(
            resume_id = %stored.id,
            approver = %approver,
            order = decision.setting.order,
            is_final = decision.is_final,
            status = %stored.audit_status,
            "audit decision recorded"
        );
        Ok(stored)
    }

    /// Withdraw `approver`'s own decision and reopen the resume.
    pub async fn cancel_audit(
        &self,
        ctx: &RequestContext,
        mut resume: Resume,
        approver: UserId,
        audit_record_id: AuditRecordId,
    ) -> Result<Resume, ResumeServiceError> {
        ctx.checkpoint()?;
        self.keep_audit_trail(ctx, &mut resume).await?;
        let position = resume
            .audit_records
            .iter()
            .position(|record| record.id == audit_record_id)
            .ok_or(ResumeServiceError::AuditRecordNotFound(audit_record_id))?;

        let reopened = audit::cancel(&resume.audit_records[position], approver)?;
        resume.audit_records.remove(position);
        resume.audit_status = reopened;

        let stored = self.persist(ctx, resume).await?;
        info!(
            resume_id = %stored.id,
            approver = %approver,
            audit_record_id = %audit_record_id,
            "audit decision cancelled"
        );
        Ok(stored)
    }

    pub async fn assign_owner(
        &self,
        ctx: &RequestContext,
        mut resume: Resume,
        owner: UserId,
    ) -> Result<Resume, ResumeServiceError> {
        ctx.checkpoint()?;
        if owner.is_nil() {
            return Err(ResumeServiceError::InvalidArgument(
                "owner must be set".to_string(),
            ));
        }
        self.keep_audit_trail(ctx, &mut resume).await?;
        resume.owner_user_id = owner;
        self.persist(ctx, resume).await
    }

    pub async fn add_attachments(
        &self,
        ctx: &RequestContext,
        mut resume: Resume,
        attachments: Vec<ResumeAttachment>,
    ) -> Result<Resume, ResumeServiceError> {
        ctx.checkpoint()?;
        if attachments.is_empty() {
            return Err(ResumeServiceError::InvalidArgument(
                "attachments must not be empty".to_string(),
            ));
        }
        self.keep_audit_trail(ctx, &mut resume).await?;
        resume.attachments.extend(attachments);
        self.persist(ctx, resume).await
    }

    /// Removing an attachment the resume does not hold is an error and writes nothing.
    pub async fn remove_attachment(
        &self,
        ctx: &RequestContext,
        mut resume: Resume,
        attachment_id: AttachmentId,
    ) -> Result<Resume, ResumeServiceError> {
        ctx.checkpoint()?;
        self.keep_audit_trail(ctx, &mut resume).await?;
        let position = resume
            .attachments
            .iter()
            .position(|attachment| attachment.id == attachment_id)
            .ok_or(ResumeServiceError::AttachmentNotFound(attachment_id))?;
        resume.attachments.remove(position);
        self.persist(ctx, resume).await
    }

    pub async fn keyword_maps_by_keyword(
        &self,
        ctx: &RequestContext,
        keyword: &str,
    ) -> Result<Vec<ResumeKeywordMap>, ResumeServiceError> {
        ctx.checkpoint()?;
        let keyword = keyword.trim();
        if keyword.is_empty() {
            return Err(ResumeServiceError::InvalidArgument(
                "keyword must not be empty".to_string(),
            ));
        }
        Ok(self.store.keyword_maps_by_keyword(ctx, keyword).await?)
    }

    pub async fn keyword_maps_for_resume(
        &self,
        ctx: &RequestContext,
        resume_id: ResumeId,
    ) -> Result<Vec<ResumeKeywordMap>, ResumeServiceError> {
        ctx.checkpoint()?;
        Ok(self.store.keyword_maps_for_resume(ctx, resume_id).await?)
    }

    pub async fn remove_keyword_maps(
        &self,
        ctx: &RequestContext,
        maps: &[ResumeKeywordMap],
    ) -> Result<(), ResumeServiceError> {
        ctx.checkpoint()?;
        Ok(self.store.remove_keyword_maps(ctx, maps).await?)
    }

    async fn validate(
        &self,
        ctx: &RequestContext,
        resume: &Resume,
    ) -> Result<(), ResumeServiceError> {
        if let Err(err) = self.validators.run(self.store.as_ref(), ctx, resume).await {
            if let ValidationError::Duplicate(conflict) = &err {
                warn!(
                    resume_id = %resume.id,
                    owner = %conflict.owner(),
                    "duplicate resume rejected"
                );
            }
            return Err(err.into());
        }
        Ok(())
    }

    /// Replace the caller's audit status and records with the stored ones.
    ///
    /// Decisions only change through [`Self::audit`] and [`Self::cancel_audit`], and both
    /// start from the stored trail rather than whatever the caller sends back.
    async fn keep_audit_trail(
        &self,
        ctx: &RequestContext,
        resume: &mut Resume,
    ) -> Result<(), ResumeServiceError> {
        let stored = self
            .store
            .find_by_id(ctx, resume.id)
            .await?
            .ok_or(ResumeServiceError::ResumeNotFound(resume.id))?;

        if stored.audit_status != resume.audit_status
            || stored.audit_records != resume.audit_records
        {
            warn!(
                resume_id = %resume.id,
                status = %stored.audit_status,
                "ignoring audit changes outside the approval flow"
            );
        }
        resume.audit_status = stored.audit_status;
        resume.audit_records = stored.audit_records;
        Ok(())
    }

    /// Stamp modification metadata and write through the store's concurrency check.
    async fn persist(
        &self,
        ctx: &RequestContext,
        mut resume: Resume,
    ) -> Result<Resume, ResumeServiceError> {
        resume.last_modifier_user_id = Some(ctx.actor());
        resume.last_modification_time = Some(Utc::now());

        match self.store.update(ctx, resume).await {
            Ok(stored) => Ok(stored),
            Err(StoreError::ConcurrencyConflict { resume_id }) => {
                warn!(resume_id = %resume_id, "stale concurrency stamp");
                Err(ResumeServiceError::ConcurrencyConflict { resume_id })
            }
            Err(other) => Err(other.into()),
        }
    }
}

fn check_field_limits(resume: &Resume) -> Result<(), ResumeServiceError> {
    let values = [
        &resume.name,
        &resume.phone_number,
        &resume.extension_number,
        &resume.city,
        &resume.email,
        &resume.platform_name,
        &resume.platform_id,
    ];

    for ((field, limit), value) in FIELD_LIMITS.iter().zip(values) {
        let length = value.chars().count();
        if length > *limit {
            return Err(ResumeServiceError::InvalidArgument(format!(
                "{field} exceeds {limit} characters (found {length})"
            )));
        }
    }
    Ok(())
}

/// Coarse classification callers branch on (retry, re-prompt, give up).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidArgument,
    DuplicateConflict,
    SimilarityConflict,
    InvalidState,
    Unauthorized,
    ConcurrencyConflict,
    NotFound,
    Cancelled,
    Unavailable,
}

/// Error raised by the resume service.
#[derive(Debug, thiserror::Error)]
pub enum ResumeServiceError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error(transparent)]
    DuplicateConflict(#[from] DuplicateConflict),
    #[error("{} similar resume(s) found; set ignore duplicates to save anyway", .relations.len())]
    SimilarityConflict { relations: Vec<ResumeCompare> },
    #[error(transparent)]
    InvalidState(AuditError),
    #[error(transparent)]
    Unauthorized(AuditError),
    #[error("resume {resume_id} was modified concurrently; reload and retry")]
    ConcurrencyConflict { resume_id: ResumeId },
    #[error("resume {0} not found")]
    ResumeNotFound(ResumeId),
    #[error("audit record {0} not found on resume")]
    AuditRecordNotFound(AuditRecordId),
    #[error("attachment {0} not found on resume")]
    AttachmentNotFound(AttachmentId),
    #[error(transparent)]
    Interrupted(#[from] Interrupted),
    #[error(transparent)]
    Store(StoreError),
    #[error(transparent)]
    Comparer(ComparerError),
}

impl ResumeServiceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ResumeServiceError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            ResumeServiceError::DuplicateConflict(_) => ErrorKind::DuplicateConflict,
            ResumeServiceError::SimilarityConflict { .. } => ErrorKind::SimilarityConflict,
            ResumeServiceError::InvalidState(_) => ErrorKind::InvalidState,
            ResumeServiceError::Unauthorized(_) => ErrorKind::Unauthorized,
            ResumeServiceError::ConcurrencyConflict { .. } => ErrorKind::ConcurrencyConflict,
            ResumeServiceError::ResumeNotFound(_)
            | ResumeServiceError::AuditRecordNotFound(_)
            | ResumeServiceError::AttachmentNotFound(_)
            | ResumeServiceError::Store(StoreError::NotFound) => ErrorKind::NotFound,
            ResumeServiceError::Interrupted(_) => ErrorKind::Cancelled,
            ResumeServiceError::Store(_) | ResumeServiceError::Comparer(_) => {
                ErrorKind::Unavailable
            }
        }
    }
}

impl From<StoreError> for ResumeServiceError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::ConcurrencyConflict { resume_id } => {
                Self::ConcurrencyConflict { resume_id }
            }
            StoreError::Interrupted(reason) => Self::Interrupted(reason),
            StoreError::Duplicate(conflict) => Self::DuplicateConflict(conflict),
            other => Self::Store(other),
        }
    }
}

impl From<ComparerError> for ResumeServiceError {
    fn from(value: ComparerError) -> Self {
        match value {
            ComparerError::Interrupted(reason) => Self::Interrupted(reason),
            other => Self::Comparer(other),
        }
    }
}

impl From<ValidationError> for ResumeServiceError {
    fn from(value: ValidationError) -> Self {
        match value {
            ValidationError::Duplicate(conflict) => Self::DuplicateConflict(conflict),
            ValidationError::Store(err) => err.into(),
        }
    }
}

impl From<AuditError> for ResumeServiceError {
    fn from(value: AuditError) -> Self {
        match value {
            AuditError::AlreadyClosed { .. } => Self::InvalidState(value),
            AuditError::NotAnAuditor { .. } | AuditError::NotRecordCreator { .. } => {
                Self::Unauthorized(value)
            }
        }
    }
}
