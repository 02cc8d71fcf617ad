use crate::infra::{audit_chain, TokenOverlapComparer};
use chrono::{DateTime, Utc};
use clap::Args;
use serde::Serialize;
use std::sync::Arc;
use talent_pool::config::ResumeOptions;
use talent_pool::error::AppError;
use talent_pool::workflows::resumes::{
    AuditStatus, MemoryResumeStore, RequestContext, Resume, ResumeDraft, ResumeService,
    ResumeServiceError, StaticAuditSettings, UserId,
};

type DemoService =
    ResumeService<MemoryResumeStore, StaticAuditSettings, TokenOverlapComparer<MemoryResumeStore>>;

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Similarity threshold for the duplicate gate (0.0 to 1.0). Defaults to 0.8.
    #[arg(long)]
    pub(crate) min_similarity: Option<f32>,
    /// Print the final resume states as JSON after the walkthrough.
    #[arg(long)]
    pub(crate) json: bool,
}

#[derive(Debug, Serialize)]
struct DemoOutcome {
    name: String,
    audit_status: AuditStatus,
    decisions: usize,
    similar_resumes: usize,
    last_modification_time: Option<DateTime<Utc>>,
}

impl From<&Resume> for DemoOutcome {
    fn from(resume: &Resume) -> Self {
        Self {
            name: resume.name.clone(),
            audit_status: resume.audit_status,
            decisions: resume.audit_records.len(),
            similar_resumes: resume.compares.len(),
            last_modification_time: resume.last_modification_time,
        }
    }
}

pub(crate) async fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let options = match args.min_similarity {
        Some(value) => ResumeOptions::new(value)?,
        None => ResumeOptions::default(),
    };

    let recruiter = UserId::new();
    let approvers = [UserId::new(), UserId::new(), UserId::new()];
    let store = Arc::new(MemoryResumeStore::new());
    let service: DemoService = ResumeService::new(
        store.clone(),
        Arc::new(StaticAuditSettings::new(audit_chain(&approvers))),
        Arc::new(TokenOverlapComparer::new(store)),
        options,
    );
    let ctx = RequestContext::new(recruiter);

    println!("Candidate lifecycle demo (threshold {:.2})", options.min_similarity);

    println!("\nIntake");
    let original = service
        .create(&ctx, candidate("Zhang Wei", "13800000000"))
        .await?;
    println!(
        "- Created {} ({}) -> {}",
        original.name, original.id, original.audit_status
    );

    match service
        .create(&ctx, candidate("Wang Fang", "13800000000"))
        .await
    {
        Ok(resume) => println!("- Unexpectedly accepted {}", resume.id),
        Err(err) => println!("- Second resume with the same phone rejected: {err}"),
    }

    let copy = service
        .create(&ctx, candidate("Zhang W.", "13700000000"))
        .await?;
    println!("- Created {} ({}) with a reused profile", copy.name, copy.id);

    println!("\nSimilarity review");
    let copy = match service.update(&ctx, copy.clone(), false).await {
        Ok(saved) => {
            println!("- No similar resumes above the threshold");
            saved
        }
        Err(ResumeServiceError::SimilarityConflict { relations }) => {
            for relation in &relations {
                println!(
                    "- Held for review: {:.0}% similar to {} ({})",
                    relation.similarity * 100.0,
                    relation.relation_resume_name,
                    relation.relation_resume_id
                );
            }
            let saved = service.update(&ctx, copy, true).await?;
            println!(
                "- Reviewer override saved {} relation(s) as history",
                saved.compares.len()
            );
            saved
        }
        Err(err) => return Err(err.into()),
    };

    println!("\nApproval chain ({} approvers)", approvers.len());
    let original = service
        .audit(&ctx, original, true, approvers[1], "technical interview passed")
        .await?;
    println!("- Approver #1 passed -> {}", original.audit_status);
    let original = service
        .audit(&ctx, original, true, approvers[2], "offer approved")
        .await?;
    println!("- Approver #2 passed -> {}", original.audit_status);
    if let Err(err) = service
        .audit(&ctx, original.clone(), false, approvers[0], "late objection")
        .await
    {
        println!("- Approver #0 after completion: {err}");
    }

    let copy = service
        .audit(&ctx, copy, false, approvers[0], "duplicate application")
        .await?;
    println!("- {} rejected by approver #0 -> {}", copy.name, copy.audit_status);
    let record_id = copy
        .audit_records
        .last()
        .map(|record| record.id)
        .ok_or(ResumeServiceError::InvalidArgument(
            "rejection was not recorded".to_string(),
        ))?;
    let copy = service
        .cancel_audit(&ctx, copy, approvers[0], record_id)
        .await?;
    println!("- Approver #0 withdrew the rejection -> {}", copy.audit_status);

    if args.json {
        let outcomes = [DemoOutcome::from(&original), DemoOutcome::from(&copy)];
        match serde_json::to_string_pretty(&outcomes) {
            Ok(json) => println!("\n{json}"),
            Err(err) => println!("\nFinal state unavailable: {err}"),
        }
    }

    Ok(())
}

fn candidate(name: &str, phone: &str) -> ResumeDraft {
    ResumeDraft {
        name: name.to_string(),
        city: "Shenzhen".to_string(),
        phone_number: phone.to_string(),
        email: "candidate@example.com".to_string(),
        description: "Backend engineer: Rust, PostgreSQL, payment gateways, on-call".to_string(),
        platform_name: "Liepin".to_string(),
        keywords: vec!["rust".to_string(), "payments".to_string()],
        ..ResumeDraft::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn demo_runs_end_to_end() {
        run_demo(DemoArgs::default()).await.expect("demo completes");
    }

    #[tokio::test]
    async fn demo_rejects_invalid_threshold() {
        let args = DemoArgs {
            min_similarity: Some(2.0),
            json: false,
        };
        assert!(matches!(run_demo(args).await, Err(AppError::Config(_))));
    }
}
