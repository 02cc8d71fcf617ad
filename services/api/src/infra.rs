use std::collections::BTreeSet;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use async_trait::async_trait;
use metrics_exporter_prometheus::PrometheusHandle;
use talent_pool::workflows::resumes::{
    AuditSetting, ComparerError, RequestContext, Resume, ResumeComparer, ResumeCompare,
    ResumeFilter, ResumeStore, StoreError, UserId,
};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Jaccard overlap of description and keyword tokens across live resumes.
///
/// Stands in for the external near-duplicate service when the API runs on its own.
pub(crate) struct TokenOverlapComparer<S> {
    store: Arc<S>,
}

impl<S> TokenOverlapComparer<S> {
    pub(crate) fn new(store: Arc<S>) -> Self {
        Self { store }
    }
}

fn tokens(resume: &Resume) -> BTreeSet<String> {
    resume
        .description
        .split(|c: char| !c.is_alphanumeric())
        .chain(resume.keywords.iter().map(|map| map.keyword.as_str()))
        .map(str::trim)
        .filter(|token| token.chars().count() > 1)
        .map(str::to_lowercase)
        .collect()
}

fn jaccard(left: &BTreeSet<String>, right: &BTreeSet<String>) -> f32 {
    let union = left.union(right).count();
    if union == 0 {
        return 0.0;
    }
    left.intersection(right).count() as f32 / union as f32
}

#[async_trait]
impl<S> ResumeComparer for TokenOverlapComparer<S>
where
    S: ResumeStore + 'static,
{
    async fn compare(
        &self,
        ctx: &RequestContext,
        resume: &Resume,
        min_similarity: f32,
    ) -> Result<Vec<ResumeCompare>, ComparerError> {
        let candidates = self
            .store
            .list(ctx, &ResumeFilter::default())
            .await
            .map_err(|err| match err {
                StoreError::Interrupted(reason) => ComparerError::Interrupted(reason),
                other => ComparerError::Unavailable(other.to_string()),
            })?;

        let own = tokens(resume);
        let mut relations: Vec<ResumeCompare> = candidates
            .iter()
            .filter(|other| other.id != resume.id)
            .filter_map(|other| {
                let similarity = jaccard(&own, &tokens(other));
                (similarity >= min_similarity).then(|| ResumeCompare {
                    relation_resume_id: other.id,
                    relation_resume_name: other.name.clone(),
                    similarity,
                })
            })
            .collect();
        relations.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
        Ok(relations)
    }
}

/// Chain slots follow the configured order, starting at zero.
pub(crate) fn audit_chain(approvers: &[UserId]) -> Vec<AuditSetting> {
    approvers
        .iter()
        .zip(0u32..)
        .map(|(user_id, order)| AuditSetting {
            user_id: *user_id,
            order,
        })
        .collect()
}
