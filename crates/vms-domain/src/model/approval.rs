//! Approval - A host's decision on a visit that needs sign-off

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared::{CompanyId, InvalidTransitionError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
}

impl ApprovalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApprovalStatus::Pending => "pending",
            ApprovalStatus::Approved => "approved",
            ApprovalStatus::Rejected => "rejected",
        }
    }
}

/// Approval request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Approval {
    pub id: String,
    pub company_id: CompanyId,
    pub visit_id: String,
    pub approver_id: String,
    pub status: ApprovalStatus,
    pub comment: Option<String>,
    pub requested_at: DateTime<Utc>,
    pub decided_at: Option<DateTime<Utc>>,
}

impl Approval {
    pub fn new(
        company_id: CompanyId,
        visit_id: impl Into<String>,
        approver_id: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: crate::new_id(),
            company_id,
            visit_id: visit_id.into(),
            approver_id: approver_id.into(),
            status: ApprovalStatus::Pending,
            comment: None,
            requested_at: now,
            decided_at: None,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == ApprovalStatus::Pending
    }

    /// Record the approver's decision; decisions are final
    pub fn decide(
        &mut self,
        approve: bool,
        comment: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<(), InvalidTransitionError> {
        let to = if approve {
            ApprovalStatus::Approved
        } else {
            ApprovalStatus::Rejected
        };

        if !self.is_pending() {
            return Err(InvalidTransitionError::new("approval", self.status.as_str(), to.as_str()));
        }

        self.status = to;
        self.comment = comment;
        self.decided_at = Some(now);
        Ok(())
    }
}
