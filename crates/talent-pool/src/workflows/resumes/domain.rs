use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            pub fn is_nil(&self) -> bool {
                self.0.is_nil()
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }
    };
}

uuid_id!(
    /// Identity of a candidate record.
    ResumeId
);
uuid_id!(
    /// Already-authenticated user reference (creator, owner, approver).
    UserId
);
uuid_id!(
    /// Target position the candidate applied for.
    JobId
);
uuid_id!(AuditRecordId);
uuid_id!(AttachmentId);

/// Opaque version marker regenerated by the store on every successful write.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConcurrencyStamp(pub String);

impl ConcurrencyStamp {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl fmt::Display for ConcurrencyStamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Position of a resume in the approval chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditStatus {
    #[default]
    Ongoing,
    Complete,
    Unpassed,
}

impl AuditStatus {
    pub const fn label(self) -> &'static str {
        match self {
            AuditStatus::Ongoing => "ongoing",
            AuditStatus::Complete => "complete",
            AuditStatus::Unpassed => "unpassed",
        }
    }

    /// `Complete` and `Unpassed` accept no further decisions.
    pub const fn is_closed(self) -> bool {
        matches!(self, AuditStatus::Complete | AuditStatus::Unpassed)
    }
}

impl fmt::Display for AuditStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Who removed a record and when. Deleted records stay stored for history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletionMarker {
    pub deleter_user_id: UserId,
    pub deletion_time: DateTime<Utc>,
}

/// A submitted applicant profile under review.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resume {
    pub id: ResumeId,
    pub name: String,
    pub job_id: JobId,
    pub city: String,
    pub phone_number: String,
    #[serde(default)]
    pub extension_number: String,
    pub email: String,
    pub description: String,
    pub platform_name: String,
    pub platform_id: String,
    pub audit_status: AuditStatus,
    pub active_delivery: bool,
    pub owner_user_id: UserId,
    pub creator_user_id: UserId,
    pub creation_time: DateTime<Utc>,
    pub last_modifier_user_id: Option<UserId>,
    pub last_modification_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub deletion: Option<DeletionMarker>,
    #[serde(default)]
    pub concurrency_stamp: ConcurrencyStamp,
    #[serde(default)]
    pub keywords: Vec<ResumeKeywordMap>,
    #[serde(default)]
    pub compares: Vec<ResumeCompare>,
    #[serde(default)]
    pub audit_records: Vec<ResumeAuditRecord>,
    #[serde(default)]
    pub attachments: Vec<ResumeAttachment>,
}

impl Resume {
    pub fn is_deleted(&self) -> bool {
        self.deletion.is_some()
    }

    pub fn has_phone_number(&self) -> bool {
        !self.phone_number.trim().is_empty()
    }

    pub fn has_platform_id(&self) -> bool {
        !self.platform_id.trim().is_empty()
    }

    pub fn audit_record(&self, id: AuditRecordId) -> Option<&ResumeAuditRecord> {
        self.audit_records.iter().find(|record| record.id == id)
    }

    /// Trim the lookup keys and drop blank keywords, so stored values compare exactly.
    pub fn normalize(&mut self) {
        trim_in_place(&mut self.phone_number);
        trim_in_place(&mut self.extension_number);
        trim_in_place(&mut self.platform_id);
        for map in &mut self.keywords {
            trim_in_place(&mut map.keyword);
        }
        self.keywords.retain(|map| !map.keyword.is_empty());
    }

    /// Keyword strings attached to this resume, in insertion order.
    pub fn keyword_list(&self) -> Vec<&str> {
        self.keywords
            .iter()
            .map(|map| map.keyword.as_str())
            .collect()
    }
}

/// Caller-supplied fields for a new resume. Everything else is stamped by the engine.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ResumeDraft {
    pub name: String,
    pub job_id: Option<JobId>,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub phone_number: String,
    #[serde(default)]
    pub extension_number: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub platform_name: String,
    #[serde(default)]
    pub platform_id: String,
    #[serde(default)]
    pub active_delivery: bool,
    pub owner_user_id: Option<UserId>,
    #[serde(default)]
    pub keywords: Vec<String>,
}

impl ResumeDraft {
    /// Materialise a resume in `Ongoing` with creation metadata filled in.
    pub fn into_resume(self, creator: UserId, now: DateTime<Utc>) -> Resume {
        let id = ResumeId::new();
        let keywords = self
            .keywords
            .into_iter()
            .map(|keyword| ResumeKeywordMap {
                resume_id: id,
                keyword,
            })
            .collect();

        let mut resume = Resume {
            id,
            name: self.name,
            job_id: self.job_id.unwrap_or_else(|| JobId(Uuid::nil())),
            city: self.city,
            phone_number: self.phone_number,
            extension_number: self.extension_number,
            email: self.email,
            description: self.description,
            platform_name: self.platform_name,
            platform_id: self.platform_id,
            audit_status: AuditStatus::Ongoing,
            active_delivery: self.active_delivery,
            owner_user_id: self.owner_user_id.unwrap_or(creator),
            creator_user_id: creator,
            creation_time: now,
            last_modifier_user_id: None,
            last_modification_time: None,
            deletion: None,
            concurrency_stamp: ConcurrencyStamp::default(),
            keywords,
            compares: Vec::new(),
            audit_records: Vec::new(),
            attachments: Vec::new(),
        };
        resume.normalize();
        resume
    }

    /// Overwrite the editable fields of an existing resume. Unset ids keep their value.
    pub fn apply_to(self, resume: &mut Resume) {
        resume.name = self.name;
        if let Some(job_id) = self.job_id {
            resume.job_id = job_id;
        }
        resume.city = self.city;
        resume.phone_number = self.phone_number;
        resume.extension_number = self.extension_number;
        resume.email = self.email;
        resume.description = self.description;
        resume.platform_name = self.platform_name;
        resume.platform_id = self.platform_id;
        resume.active_delivery = self.active_delivery;
        if let Some(owner) = self.owner_user_id {
            resume.owner_user_id = owner;
        }
        let resume_id = resume.id;
        resume.keywords = self
            .keywords
            .into_iter()
            .map(|keyword| ResumeKeywordMap { resume_id, keyword })
            .collect();
        resume.normalize();
    }
}

fn trim_in_place(value: &mut String) {
    let trimmed = value.trim();
    if trimmed.len() != value.len() {
        *value = trimmed.to_string();
    }
}

/// A rendered approval decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResumeAuditRecord {
    pub id: AuditRecordId,
    pub resume_id: ResumeId,
    pub creator_user_id: UserId,
    pub creation_time: DateTime<Utc>,
    pub passed: bool,
    pub remark: String,
}

/// Another record the comparer judged similar, kept as review history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResumeCompare {
    pub relation_resume_id: ResumeId,
    pub relation_resume_name: String,
    pub similarity: f32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResumeAttachment {
    pub id: AttachmentId,
    pub file_name: String,
    pub file_path: String,
    pub creation_time: DateTime<Utc>,
}

impl ResumeAttachment {
    pub fn new(file_name: impl Into<String>, file_path: impl Into<String>) -> Self {
        Self {
            id: AttachmentId::new(),
            file_name: file_name.into(),
            file_path: file_path.into(),
            creation_time: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResumeKeywordMap {
    pub resume_id: ResumeId,
    pub keyword: String,
}

/// One slot of the configured approval chain. `order` is zero-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditSetting {
    pub user_id: UserId,
    pub order: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn draft_defaults_owner_to_creator_and_starts_ongoing() {
        let creator = UserId::new();
        let draft = ResumeDraft {
            name: "Li Lei".to_string(),
            keywords: vec!["rust".to_string(), "sql".to_string()],
            ..ResumeDraft::default()
        };

        let resume = draft.into_resume(creator, Utc::now());

        assert_eq!(resume.owner_user_id, creator);
        assert_eq!(resume.audit_status, AuditStatus::Ongoing);
        assert_eq!(resume.keyword_list(), vec!["rust", "sql"]);
        assert!(resume
            .keywords
            .iter()
            .all(|map| map.resume_id == resume.id));
        assert!(!resume.is_deleted());
    }

    #[test]
    fn closed_statuses_are_terminal() {
        assert!(!AuditStatus::Ongoing.is_closed());
        assert!(AuditStatus::Complete.is_closed());
        assert!(AuditStatus::Unpassed.is_closed());
    }

    #[test]
    fn whitespace_phone_counts_as_empty() {
        let mut resume = ResumeDraft::default().into_resume(UserId::new(), Utc::now());
        resume.phone_number = "   ".to_string();
        assert!(!resume.has_phone_number());
    }

    #[test]
    fn drafts_are_trimmed_before_they_reach_the_store() {
        let draft = ResumeDraft {
            name: "Li Lei".to_string(),
            phone_number: " 13800000000 ".to_string(),
            extension_number: "101\t".to_string(),
            platform_id: "  boss-1".to_string(),
            keywords: vec![" rust ".to_string(), "   ".to_string()],
            ..ResumeDraft::default()
        };

        let mut resume = draft.clone().into_resume(UserId::new(), Utc::now());
        assert_eq!(resume.phone_number, "13800000000");
        assert_eq!(resume.extension_number, "101");
        assert_eq!(resume.platform_id, "boss-1");
        assert_eq!(resume.keyword_list(), vec!["rust"]);

        resume.phone_number = "13900000000".to_string();
        draft.apply_to(&mut resume);
        assert_eq!(resume.phone_number, "13800000000");
        assert_eq!(resume.keyword_list(), vec!["rust"]);
    }
}
