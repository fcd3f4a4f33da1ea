//! Visit - One scheduled or walk-in stay of a visitor on site
//!
//! ```text
//! pending_approval ──approve──▶ approved ──┐
//!        │                                 ├──check_in──▶ checked_in ──check_out──▶ checked_out
//!        └──reject──▶ rejected  scheduled ─┘
//!
//! scheduled | pending_approval | approved ──cancel──▶ cancelled
//! ```

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use shared::{CompanyId, InvalidTransitionError};

/// The current status of a Visit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VisitStatus {
    Scheduled,
    PendingApproval,
    Approved,
    Rejected,
    CheckedIn,
    CheckedOut,
    Cancelled,
}

impl VisitStatus {
    pub const ALL: [VisitStatus; 7] = [
        VisitStatus::Scheduled,
        VisitStatus::PendingApproval,
        VisitStatus::Approved,
        VisitStatus::Rejected,
        VisitStatus::CheckedIn,
        VisitStatus::CheckedOut,
        VisitStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            VisitStatus::Scheduled => "scheduled",
            VisitStatus::PendingApproval => "pending_approval",
            VisitStatus::Approved => "approved",
            VisitStatus::Rejected => "rejected",
            VisitStatus::CheckedIn => "checked_in",
            VisitStatus::CheckedOut => "checked_out",
            VisitStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.as_str() == value.trim())
    }

    /// No further transitions are possible
    pub fn is_terminal(&self) -> bool {
        matches!(self, VisitStatus::Rejected | VisitStatus::CheckedOut | VisitStatus::Cancelled)
    }
}

/// Payload for scheduling a visit
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewVisit {
    pub visitor_id: String,
    pub host_employee_id: String,
    pub location_id: Option<String>,
    pub purpose: Option<String>,
    pub scheduled_start: DateTime<Utc>,
    pub scheduled_end: DateTime<Utc>,
}

/// Visit record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Visit {
    pub id: String,
    pub company_id: CompanyId,
    pub visitor_id: String,
    pub host_employee_id: String,
    pub location_id: Option<String>,
    pub purpose: Option<String>,
    pub scheduled_start: DateTime<Utc>,
    pub scheduled_end: DateTime<Utc>,
    status: VisitStatus,
    check_in_at: Option<DateTime<Utc>>,
    check_out_at: Option<DateTime<Utc>>,
    pub badge_number: Option<String>,
    pub approval_id: Option<String>,
    #[serde(default)]
    pub walk_in: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Visit {
    /// Create a visit; it starts pending approval when one is required
    pub fn new(company_id: CompanyId, new: NewVisit, requires_approval: bool, now: DateTime<Utc>) -> Self {
        Self {
            id: crate::new_id(),
            company_id,
            visitor_id: new.visitor_id,
            host_employee_id: new.host_employee_id,
            location_id: new.location_id,
            purpose: new.purpose,
            scheduled_start: new.scheduled_start,
            scheduled_end: new.scheduled_end,
            status: if requires_approval {
                VisitStatus::PendingApproval
            } else {
                VisitStatus::Scheduled
            },
            check_in_at: None,
            check_out_at: None,
            badge_number: None,
            approval_id: None,
            walk_in: false,
            created_at: now,
            updated_at: now,
        }
    }

    // ========== Getters ==========

    pub fn status(&self) -> VisitStatus {
        self.status
    }

    pub fn check_in_at(&self) -> Option<DateTime<Utc>> {
        self.check_in_at
    }

    pub fn check_out_at(&self) -> Option<DateTime<Utc>> {
        self.check_out_at
    }

    pub fn is_on_site(&self) -> bool {
        self.status == VisitStatus::CheckedIn
    }

    /// Time spent on site, once the visitor has left
    pub fn duration(&self) -> Option<Duration> {
        match (self.status, self.check_in_at, self.check_out_at) {
            (VisitStatus::CheckedOut, Some(start), Some(end)) => Some(end - start),
            _ => None,
        }
    }

    // ========== State Transitions ==========

    fn transition(
        &mut self,
        allowed: &[VisitStatus],
        to: VisitStatus,
        now: DateTime<Utc>,
    ) -> Result<(), InvalidTransitionError> {
        if !allowed.contains(&self.status) {
            return Err(InvalidTransitionError::new("visit", self.status.as_str(), to.as_str()));
        }
        self.status = to;
        self.updated_at = now;
        Ok(())
    }

    pub fn approve(&mut self, now: DateTime<Utc>) -> Result<(), InvalidTransitionError> {
        self.transition(&[VisitStatus::PendingApproval], VisitStatus::Approved, now)
    }

    pub fn reject(&mut self, now: DateTime<Utc>) -> Result<(), InvalidTransitionError> {
        self.transition(&[VisitStatus::PendingApproval], VisitStatus::Rejected, now)
    }

    pub fn check_in(&mut self, badge_number: impl Into<String>, now: DateTime<Utc>) -> Result<(), InvalidTransitionError> {
        self.transition(&[VisitStatus::Scheduled, VisitStatus::Approved], VisitStatus::CheckedIn, now)?;
        self.check_in_at = Some(now);
        self.badge_number = Some(badge_number.into());
        Ok(())
    }

    pub fn check_out(&mut self, now: DateTime<Utc>) -> Result<(), InvalidTransitionError> {
        self.transition(&[VisitStatus::CheckedIn], VisitStatus::CheckedOut, now)?;
        self.check_out_at = Some(now);
        Ok(())
    }

    pub fn cancel(&mut self, now: DateTime<Utc>) -> Result<(), InvalidTransitionError> {
        self.transition(
            &[VisitStatus::Scheduled, VisitStatus::PendingApproval, VisitStatus::Approved],
            VisitStatus::Cancelled,
            now,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_visit(requires_approval: bool) -> Visit {
        let start = Utc::now();
        Visit::new(
            CompanyId::new("acme"),
            NewVisit {
                visitor_id: "v-1".to_string(),
                host_employee_id: "e-1".to_string(),
                location_id: None,
                purpose: Some("Interview".to_string()),
                scheduled_start: start,
                scheduled_end: start + Duration::hours(2),
            },
            requires_approval,
            start,
        )
    }

    // ============== Creation Tests ==============

    #[test]
    fn test_initial_status() {
        assert_eq!(new_visit(false).status(), VisitStatus::Scheduled);
        assert_eq!(new_visit(true).status(), VisitStatus::PendingApproval);
    }

    // ============== Happy Path Tests ==============

    #[test]
    fn test_full_lifecycle() {
        let mut visit = new_visit(false);
        let t0 = Utc::now();

        visit.check_in("B-000001", t0).unwrap();
        assert!(visit.is_on_site());
        assert_eq!(visit.badge_number.as_deref(), Some("B-000001"));
        assert!(visit.duration().is_none());

        visit.check_out(t0 + Duration::minutes(45)).unwrap();
        assert_eq!(visit.status(), VisitStatus::CheckedOut);
        assert_eq!(visit.duration(), Some(Duration::minutes(45)));
    }

    #[test]
    fn test_approval_path() {
        let mut visit = new_visit(true);
        let now = Utc::now();

        assert!(visit.check_in("B-1", now).is_err());
        visit.approve(now).unwrap();
        visit.check_in("B-1", now).unwrap();
        assert_eq!(visit.status(), VisitStatus::CheckedIn);
    }

    // ============== Invalid Transition Tests ==============

    #[test]
    fn test_rejected_is_terminal() {
        let mut visit = new_visit(true);
        let now = Utc::now();
        visit.reject(now).unwrap();

        assert!(visit.status().is_terminal());
        assert!(visit.approve(now).is_err());
        assert!(visit.cancel(now).is_err());
        assert!(visit.check_in("B-1", now).is_err());
    }

    #[test]
    fn test_cannot_cancel_on_site_visit() {
        let mut visit = new_visit(false);
        let now = Utc::now();
        visit.check_in("B-1", now).unwrap();

        let err = visit.cancel(now).unwrap_err();
        assert_eq!(err.from, "checked_in");
        assert_eq!(err.to, "cancelled");
    }

    #[test]
    fn test_cannot_check_out_twice() {
        let mut visit = new_visit(false);
        let now = Utc::now();
        visit.check_in("B-1", now).unwrap();
        visit.check_out(now).unwrap();
        assert!(visit.check_out(now).is_err());
    }

    #[test]
    fn test_approve_requires_pending() {
        let mut visit = new_visit(false);
        assert!(visit.approve(Utc::now()).is_err());
    }

    // ============== Serialization Tests ==============

    #[test]
    fn test_status_round_trip_names() {
        for status in VisitStatus::ALL {
            assert_eq!(VisitStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(VisitStatus::parse("unknown"), None);
    }

    #[test]
    fn test_serialized_status_field() {
        let visit = new_visit(true);
        let json = serde_json::to_value(&visit).unwrap();
        assert_eq!(json["status"], "pending_approval");
        assert_eq!(json["visitorId"], "v-1");
    }
}
