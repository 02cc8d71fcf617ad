//! Approval-chain state machine.
//!
//! `Ongoing` moves to `Complete` when the final approver passes, to `Unpassed` on any
//! rejection, and stays `Ongoing` while intermediate approvers pass. Any listed approver may
//! act at any time; only the terminal condition depends on chain position. Closed records
//! return to `Ongoing` solely through [`cancel`].

use serde::{Deserialize, Serialize};

use super::domain::{AuditRecordId, AuditSetting, AuditStatus, ResumeAuditRecord, UserId};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuditError {
    #[error("resume audit already closed as {status}; decisions are no longer accepted")]
    AlreadyClosed { status: AuditStatus },
    #[error("user {user} is not part of the approval chain")]
    NotAnAuditor { user: UserId },
    #[error("audit record {record} belongs to another approver; user {user} cannot cancel it")]
    NotRecordCreator { record: AuditRecordId, user: UserId },
}

/// Result of evaluating one approval decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditDecision {
    pub setting: AuditSetting,
    /// Acting approver sits at (or past) the last slot of the chain.
    pub is_final: bool,
    pub next_status: AuditStatus,
}

/// Evaluate a decision by `approver` against the current status and approval chain.
pub fn decide(
    current: AuditStatus,
    chain: &[AuditSetting],
    approver: UserId,
    passed: bool,
) -> Result<AuditDecision, AuditError> {
    if current.is_closed() {
        return Err(AuditError::AlreadyClosed { status: current });
    }

    let setting = *chain
        .iter()
        .find(|setting| setting.user_id == approver)
        .ok_or(AuditError::NotAnAuditor { user: approver })?;

    // Orders past the configured length still count as final.
    let last_slot = u32::try_from(chain.len())
        .unwrap_or(u32::MAX)
        .saturating_sub(1);
    let is_final = setting.order >= last_slot;

    let next_status = match (passed, is_final) {
        (false, _) => AuditStatus::Unpassed,
        (true, true) => AuditStatus::Complete,
        (true, false) => AuditStatus::Ongoing,
    };

    Ok(AuditDecision {
        setting,
        is_final,
        next_status,
    })
}

/// Only the approver who rendered a decision may withdraw it; the record reopens.
pub fn cancel(record: &ResumeAuditRecord, approver: UserId) -> Result<AuditStatus, AuditError> {
    if record.creator_user_id != approver {
        return Err(AuditError::NotRecordCreator {
            record: record.id,
            user: approver,
        });
    }
    Ok(AuditStatus::Ongoing)
}
