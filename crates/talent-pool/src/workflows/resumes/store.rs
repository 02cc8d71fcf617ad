use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use super::context::RequestContext;
use super::domain::{
    AuditRecordId, AuditSetting, ConcurrencyStamp, DeletionMarker, Resume, ResumeAuditRecord,
    ResumeId, ResumeKeywordMap,
};
use super::repository::{AuditSettingStore, ResumeFilter, ResumeLookup, ResumeStore, StoreError};
use super::validation::DuplicateConflict;

/// Process-local [`ResumeStore`] used by the demo server and tests.
///
/// Soft-deleted records are kept in the map and filtered out of every read.
#[derive(Debug, Default, Clone)]
pub struct MemoryResumeStore {
    records: Arc<Mutex<HashMap<ResumeId, Resume>>>,
}

impl MemoryResumeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw stored copy, deleted or not.
    pub fn stored(&self, id: ResumeId) -> Option<Resume> {
        self.lock().ok()?.get(&id).cloned()
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<ResumeId, Resume>>, StoreError> {
        self.records
            .lock()
            .map_err(|_| StoreError::Unavailable("resume store mutex poisoned".to_string()))
    }

    fn first_live<F>(&self, predicate: F) -> Result<Option<Resume>, StoreError>
    where
        F: Fn(&Resume) -> bool,
    {
        let guard = self.lock()?;
        Ok(guard
            .values()
            .filter(|resume| !resume.is_deleted() && predicate(resume))
            .min_by_key(|resume| resume.creation_time)
            .cloned())
    }

    /// Earliest live record other than `resume` that already holds one of its keys.
    ///
    /// Mirrors the validation pipeline so the check can run under the write lock.
    fn duplicate_of(
        records: &HashMap<ResumeId, Resume>,
        resume: &Resume,
    ) -> Option<DuplicateConflict> {
        let earliest = |taken: &dyn Fn(&Resume) -> bool| {
            records
                .values()
                .filter(|other| other.id != resume.id && !other.is_deleted() && taken(*other))
                .min_by_key(|other| other.creation_time)
                .map(|other| other.id)
        };

        if resume.has_phone_number() {
            let owner = earliest(&|other: &Resume| {
                other.phone_number == resume.phone_number
                    && other.extension_number == resume.extension_number
            });
            if let Some(owner) = owner {
                return Some(DuplicateConflict::PhoneNumber {
                    phone_number: resume.phone_number.clone(),
                    extension_number: resume.extension_number.clone(),
                    owner,
                });
            }
        }

        if resume.has_platform_id() {
            let owner = earliest(&|other: &Resume| {
                other.platform_id == resume.platform_id
                    || (other.phone_number == resume.platform_id
                        && other.extension_number.is_empty())
            });
            if let Some(owner) = owner {
                return Some(DuplicateConflict::PlatformId {
                    platform_id: resume.platform_id.clone(),
                    owner,
                });
            }
        }

        None
    }

    /// Compare the caller's stamp against the live stored copy and write `next` on match.
    fn compare_and_swap(
        records: &mut HashMap<ResumeId, Resume>,
        mut next: Resume,
    ) -> Result<Resume, StoreError> {
        let current = records
            .get(&next.id)
            .filter(|stored| !stored.is_deleted())
            .ok_or(StoreError::NotFound)?;

        if current.concurrency_stamp != next.concurrency_stamp {
            return Err(StoreError::ConcurrencyConflict { resume_id: next.id });
        }

        next.concurrency_stamp = ConcurrencyStamp::generate();
        records.insert(next.id, next.clone());
        Ok(next)
    }
}

#[async_trait]
impl ResumeLookup for MemoryResumeStore {
    async fn find_by_phone_number(
        &self,
        ctx: &RequestContext,
        phone_number: &str,
        extension_number: &str,
    ) -> Result<Option<Resume>, StoreError> {
        ctx.checkpoint()?;
        self.first_live(|resume| {
            resume.phone_number == phone_number && resume.extension_number == extension_number
        })
    }

    async fn find_by_platform(
        &self,
        ctx: &RequestContext,
        platform_id: &str,
    ) -> Result<Option<Resume>, StoreError> {
        ctx.checkpoint()?;
        self.first_live(|resume| resume.platform_id == platform_id)
    }
}

#[async_trait]
impl ResumeStore for MemoryResumeStore {
    async fn find_by_id(
        &self,
        ctx: &RequestContext,
        id: ResumeId,
    ) -> Result<Option<Resume>, StoreError> {
        ctx.checkpoint()?;
        let guard = self.lock()?;
        Ok(guard
            .get(&id)
            .filter(|resume| !resume.is_deleted())
            .cloned())
    }

    async fn list(
        &self,
        ctx: &RequestContext,
        filter: &ResumeFilter,
    ) -> Result<Vec<Resume>, StoreError> {
        ctx.checkpoint()?;
        let guard = self.lock()?;
        let mut resumes: Vec<Resume> = guard
            .values()
            .filter(|resume| !resume.is_deleted() && filter.matches(resume))
            .cloned()
            .collect();
        resumes.sort_by(|a, b| b.creation_time.cmp(&a.creation_time));
        Ok(resumes)
    }

    async fn create(
        &self,
        ctx: &RequestContext,
        mut resume: Resume,
    ) -> Result<Resume, StoreError> {
        ctx.checkpoint()?;
        let mut guard = self.lock()?;
        if guard.contains_key(&resume.id) {
            return Err(StoreError::Conflict);
        }
        if let Some(conflict) = Self::duplicate_of(&guard, &resume) {
            return Err(conflict.into());
        }
        resume.concurrency_stamp = ConcurrencyStamp::generate();
        guard.insert(resume.id, resume.clone());
        Ok(resume)
    }

    async fn update(&self, ctx: &RequestContext, resume: Resume) -> Result<Resume, StoreError> {
        ctx.checkpoint()?;
        let mut guard = self.lock()?;
        if let Some(conflict) = Self::duplicate_of(&guard, &resume) {
            return Err(conflict.into());
        }
        Self::compare_and_swap(&mut guard, resume)
    }

    async fn delete(
        &self,
        ctx: &RequestContext,
        mut resume: Resume,
        marker: DeletionMarker,
    ) -> Result<Resume, StoreError> {
        ctx.checkpoint()?;
        let mut guard = self.lock()?;
        resume.deletion = Some(marker);
        Self::compare_and_swap(&mut guard, resume)
    }

    async fn audit_record(
        &self,
        ctx: &RequestContext,
        id: AuditRecordId,
    ) -> Result<Option<ResumeAuditRecord>, StoreError> {
        ctx.checkpoint()?;
        let guard = self.lock()?;
        Ok(guard
            .values()
            .filter(|resume| !resume.is_deleted())
            .find_map(|resume| resume.audit_record(id).cloned()))
    }

    async fn keyword_maps_by_keyword(
        &self,
        ctx: &RequestContext,
        keyword: &str,
    ) -> Result<Vec<ResumeKeywordMap>, StoreError> {
        ctx.checkpoint()?;
        let guard = self.lock()?;
        Ok(guard
            .values()
            .filter(|resume| !resume.is_deleted())
            .flat_map(|resume| resume.keywords.iter())
            .filter(|map| map.keyword == keyword)
            .cloned()
            .collect())
    }

    async fn keyword_maps_for_resume(
        &self,
        ctx: &RequestContext,
        resume_id: ResumeId,
    ) -> Result<Vec<ResumeKeywordMap>, StoreError> {
        ctx.checkpoint()?;
        let guard = self.lock()?;
        Ok(guard
            .get(&resume_id)
            .filter(|resume| !resume.is_deleted())
            .map(|resume| resume.keywords.clone())
            .unwrap_or_default())
    }

    async fn remove_keyword_maps(
        &self,
        ctx: &RequestContext,
        maps: &[ResumeKeywordMap],
    ) -> Result<(), StoreError> {
        ctx.checkpoint()?;
        let mut guard = self.lock()?;
        for resume in guard.values_mut().filter(|resume| !resume.is_deleted()) {
            let before = resume.keywords.len();
            resume.keywords.retain(|map| !maps.contains(map));
            if resume.keywords.len() != before {
                resume.concurrency_stamp = ConcurrencyStamp::generate();
            }
        }
        Ok(())
    }
}

/// Fixed approval chain, replaceable at runtime.
#[derive(Debug, Default, Clone)]
pub struct StaticAuditSettings {
    settings: Arc<Mutex<Vec<AuditSetting>>>,
}

impl StaticAuditSettings {
    pub fn new(settings: Vec<AuditSetting>) -> Self {
        Self {
            settings: Arc::new(Mutex::new(settings)),
        }
    }

    pub fn replace(&self, settings: Vec<AuditSetting>) -> Result<(), StoreError> {
        let mut guard = self
            .settings
            .lock()
            .map_err(|_| StoreError::Unavailable("audit settings mutex poisoned".to_string()))?;
        *guard = settings;
        Ok(())
    }
}

#[async_trait]
impl AuditSettingStore for StaticAuditSettings {
    async fn audit_settings(&self, ctx: &RequestContext) -> Result<Vec<AuditSetting>, StoreError> {
        ctx.checkpoint()?;
        let guard = self
            .settings
            .lock()
            .map_err(|_| StoreError::Unavailable("audit settings mutex poisoned".to_string()))?;
        let mut chain = guard.clone();
        chain.sort_by_key(|setting| setting.order);
        Ok(chain)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::workflows::resumes::domain::{ResumeDraft, UserId};

    fn resume(phone: &str) -> Resume {
        ResumeDraft {
            name: "Han Meimei".to_string(),
            phone_number: phone.to_string(),
            keywords: vec!["java".to_string()],
            ..ResumeDraft::default()
        }
        .into_resume(UserId::new(), Utc::now())
    }

    #[tokio::test]
    async fn update_with_stale_stamp_is_rejected_and_leaves_data_untouched() {
        let store = MemoryResumeStore::new();
        let ctx = RequestContext::new(UserId::new());
        let created = store.create(&ctx, resume("13900000000")).await.expect("create");

        let mut first = created.clone();
        first.city = "Shanghai".to_string();
        let saved = store.update(&ctx, first).await.expect("first writer wins");
        assert_ne!(saved.concurrency_stamp, created.concurrency_stamp);

        let mut stale = created.clone();
        stale.city = "Beijing".to_string();
        match store.update(&ctx, stale).await {
            Err(StoreError::ConcurrencyConflict { resume_id }) => {
                assert_eq!(resume_id, created.id)
            }
            other => panic!("expected concurrency conflict, got {other:?}"),
        }

        let stored = store.stored(created.id).expect("still stored");
        assert_eq!(stored.city, "Shanghai");
        assert_eq!(stored.concurrency_stamp, saved.concurrency_stamp);
    }

    #[tokio::test]
    async fn deleted_records_disappear_from_reads() {
        let store = MemoryResumeStore::new();
        let ctx = RequestContext::new(UserId::new());
        let created = store.create(&ctx, resume("13700000000")).await.expect("create");

        let marker = DeletionMarker {
            deleter_user_id: ctx.actor(),
            deletion_time: Utc::now(),
        };
        store
            .delete(&ctx, created.clone(), marker)
            .await
            .expect("delete");

        assert!(store.find_by_id(&ctx, created.id).await.unwrap().is_none());
        assert!(store
            .find_by_phone_number(&ctx, "13700000000", "")
            .await
            .unwrap()
            .is_none());
        assert!(store
            .keyword_maps_by_keyword(&ctx, "java")
            .await
            .unwrap()
            .is_empty());
        assert!(store.stored(created.id).expect("kept").is_deleted());
    }

    #[tokio::test]
    async fn cancelled_context_blocks_writes() {
        let store = MemoryResumeStore::new();
        let ctx = RequestContext::new(UserId::new());
        ctx.cancel();

        let draft = resume("13600000000");
        let id = draft.id;
        assert!(matches!(
            store.create(&ctx, draft).await,
            Err(StoreError::Interrupted(_))
        ));
        assert!(store.stored(id).is_none());
    }

    #[tokio::test]
    async fn writes_recheck_uniqueness_under_the_lock() {
        let store = MemoryResumeStore::new();
        let ctx = RequestContext::new(UserId::new());
        let first = store.create(&ctx, resume("13800000000")).await.expect("create");

        let twin = resume("13800000000");
        let twin_id = twin.id;
        match store.create(&ctx, twin).await {
            Err(StoreError::Duplicate(DuplicateConflict::PhoneNumber { owner, .. })) => {
                assert_eq!(owner, first.id)
            }
            other => panic!("expected duplicate, got {other:?}"),
        }
        assert!(store.stored(twin_id).is_none());

        let second = store.create(&ctx, resume("13900000000")).await.expect("create");
        let mut moved = second.clone();
        moved.platform_id = "13800000000".to_string();
        assert!(matches!(
            store.update(&ctx, moved).await,
            Err(StoreError::Duplicate(DuplicateConflict::PlatformId { .. }))
        ));
        assert_eq!(
            store.stored(second.id).expect("kept").concurrency_stamp,
            second.concurrency_stamp
        );

        let marker = DeletionMarker {
            deleter_user_id: ctx.actor(),
            deletion_time: Utc::now(),
        };
        store.delete(&ctx, first, marker).await.expect("delete");
        store
            .create(&ctx, resume("13800000000"))
            .await
            .expect("deleted records do not block");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_creates_land_at_most_once() {
        let store = MemoryResumeStore::new();
        let ctx = RequestContext::new(UserId::new());

        let writers: Vec<_> = (0..8)
            .map(|_| {
                let store = store.clone();
                let ctx = ctx.clone();
                tokio::spawn(async move { store.create(&ctx, resume("13600000000")).await })
            })
            .collect();

        let mut landed = 0;
        for writer in writers {
            if writer.await.expect("join").is_ok() {
                landed += 1;
            }
        }
        assert_eq!(landed, 1);
    }

    #[tokio::test]
    async fn audit_settings_are_returned_in_order() {
        let first = UserId::new();
        let second = UserId::new();
        let settings = StaticAuditSettings::new(vec![
            AuditSetting {
                user_id: second,
                order: 1,
            },
            AuditSetting {
                user_id: first,
                order: 0,
            },
        ]);
        let chain = settings
            .audit_settings(&RequestContext::new(first))
            .await
            .expect("chain");
        assert_eq!(chain[0].user_id, first);
        assert_eq!(chain[1].user_id, second);
    }
}
