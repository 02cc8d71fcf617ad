use async_trait::async_trait;
use tracing::debug;

use super::context::RequestContext;
use super::domain::{Resume, ResumeId};
use super::repository::{ResumeLookup, StoreError};

/// Collision with another live resume, naming the record that already holds the value.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DuplicateConflict {
    #[error("{}", phone_message(.phone_number, .extension_number, .owner))]
    PhoneNumber {
        phone_number: String,
        extension_number: String,
        owner: ResumeId,
    },
    #[error("resume for platform id {platform_id} already exists (resume id {owner})")]
    PlatformId { platform_id: String, owner: ResumeId },
}

impl DuplicateConflict {
    pub fn owner(&self) -> ResumeId {
        match self {
            DuplicateConflict::PhoneNumber { owner, .. }
            | DuplicateConflict::PlatformId { owner, .. } => *owner,
        }
    }
}

fn phone_message(phone_number: &str, extension_number: &str, owner: &ResumeId) -> String {
    if extension_number.is_empty() {
        format!("resume for {phone_number} already exists (resume id {owner})")
    } else {
        format!(
            "resume for {phone_number} extension {extension_number} already exists \
             (resume id {owner})"
        )
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error(transparent)]
    Duplicate(#[from] DuplicateConflict),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// A single uniqueness rule run before a resume is persisted.
#[async_trait]
pub trait ResumeValidator: Send + Sync {
    fn name(&self) -> &'static str;

    async fn validate(
        &self,
        lookup: &dyn ResumeLookup,
        ctx: &RequestContext,
        resume: &Resume,
    ) -> Result<(), ValidationError>;
}

/// Phone number plus extension must be unique among live resumes.
#[derive(Debug, Default, Clone, Copy)]
pub struct PhoneNumberValidator;

#[async_trait]
impl ResumeValidator for PhoneNumberValidator {
    fn name(&self) -> &'static str {
        "phone_number"
    }

    async fn validate(
        &self,
        lookup: &dyn ResumeLookup,
        ctx: &RequestContext,
        resume: &Resume,
    ) -> Result<(), ValidationError> {
        if !resume.has_phone_number() {
            return Ok(());
        }

        let owner = lookup
            .find_by_phone_number(ctx, &resume.phone_number, &resume.extension_number)
            .await?;

        match owner {
            Some(owner) if owner.id != resume.id => Err(DuplicateConflict::PhoneNumber {
                phone_number: resume.phone_number.clone(),
                extension_number: resume.extension_number.clone(),
                owner: owner.id,
            }
            .into()),
            _ => Ok(()),
        }
    }
}

/// Platform id must be unique, and must not collide with another resume's phone number
/// since some platforms hand out the candidate's phone as their id.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlatformValidator;

#[async_trait]
impl ResumeValidator for PlatformValidator {
    fn name(&self) -> &'static str {
        "platform"
    }

    async fn validate(
        &self,
        lookup: &dyn ResumeLookup,
        ctx: &RequestContext,
        resume: &Resume,
    ) -> Result<(), ValidationError> {
        if !resume.has_platform_id() {
            return Ok(());
        }

        let conflict = |owner: ResumeId| DuplicateConflict::PlatformId {
            platform_id: resume.platform_id.clone(),
            owner,
        };

        if let Some(owner) = lookup.find_by_platform(ctx, &resume.platform_id).await? {
            if owner.id != resume.id {
                return Err(conflict(owner.id).into());
            }
        }

        if let Some(owner) = lookup
            .find_by_phone_number(ctx, &resume.platform_id, "")
            .await?
        {
            if owner.id != resume.id {
                return Err(conflict(owner.id).into());
            }
        }

        Ok(())
    }
}

/// Ordered validator chain. The first failure stops the run; later validators never execute.
pub struct ValidationPipeline {
    validators: Vec<Box<dyn ResumeValidator>>,
}

impl Default for ValidationPipeline {
    fn default() -> Self {
        Self::standard()
    }
}

impl ValidationPipeline {
    pub fn empty() -> Self {
        Self {
            validators: Vec::new(),
        }
    }

    /// Phone number first, then platform id.
    pub fn standard() -> Self {
        Self::empty()
            .with(PhoneNumberValidator)
            .with(PlatformValidator)
    }

    pub fn with<V>(mut self, validator: V) -> Self
    where
        V: ResumeValidator + 'static,
    {
        self.register(validator);
        self
    }

    pub fn register<V>(&mut self, validator: V)
    where
        V: ResumeValidator + 'static,
    {
        self.validators.push(Box::new(validator));
    }

    pub fn len(&self) -> usize {
        self.validators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.validators.is_empty()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.validators
            .iter()
            .map(|validator| validator.name())
            .collect()
    }

    pub async fn run(
        &self,
        lookup: &dyn ResumeLookup,
        ctx: &RequestContext,
        resume: &Resume,
    ) -> Result<(), ValidationError> {
        for validator in &self.validators {
            debug!(validator = validator.name(), resume_id = %resume.id, "running validator");
            validator.validate(lookup, ctx, resume).await?;
        }
        Ok(())
    }
}
