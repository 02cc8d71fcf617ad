//! Candidate lifecycle: duplicate gating, similarity review, and the multi-approver audit.

pub mod audit;
pub mod context;
pub mod domain;
pub mod repository;
pub mod router;
pub mod service;
pub mod store;
pub mod validation;

#[cfg(test)]
mod tests;

pub use audit::{AuditDecision, AuditError};
pub use context::{Interrupted, RequestContext};
pub use domain::{
    AttachmentId, AuditRecordId, AuditSetting, AuditStatus, ConcurrencyStamp, DeletionMarker,
    JobId, Resume, ResumeAttachment, ResumeAuditRecord, ResumeCompare, ResumeDraft, ResumeId,
    ResumeKeywordMap, UserId,
};
pub use repository::{
    AuditSettingStore, ComparerError, ResumeComparer, ResumeFilter, ResumeLookup,
    ResumeStatusView, ResumeStore, StoreError,
};
pub use router::{resume_router, ACTOR_HEADER};
pub use service::{ErrorKind, ResumeService, ResumeServiceError};
pub use store::{MemoryResumeStore, StaticAuditSettings};
pub use validation::{
    DuplicateConflict, PhoneNumberValidator, PlatformValidator, ResumeValidator, ValidationError,
    ValidationPipeline,
};
