//! Visits and approvals

use audit::AuditEventType;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use shared::{meta, CompanyId, Result, VmsError};
use vms_domain::service::screening::ScreeningSubject;
use vms_domain::service::validation::{validate_new_visit, validate_window};
use vms_domain::{
    Approval, ApprovalQueries, NewVisit, Repository, Visit, VisitQueries, VisitStatus, Visitor, VisitorType,
};

use crate::vms_core::VmsCore;

/// Filter for listing visits
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisitQuery {
    pub status: Option<VisitStatus>,
    pub visitor_id: Option<String>,
    /// Scheduled start at or after
    pub from: Option<DateTime<Utc>>,
    /// Scheduled start before
    pub to: Option<DateTime<Utc>>,
}

impl VisitQuery {
    fn matches(&self, visit: &Visit) -> bool {
        self.status.map_or(true, |s| visit.status() == s)
            && self.visitor_id.as_deref().map_or(true, |id| visit.visitor_id == id)
            && self.from.map_or(true, |from| visit.scheduled_start >= from)
            && self.to.map_or(true, |to| visit.scheduled_start < to)
    }
}

/// An approver's answer
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalDecision {
    pub approve: bool,
    pub comment: Option<String>,
}

/// `B-` followed by six upper-case hex digits
fn badge_number() -> String {
    format!("B-{}", uuid::Uuid::new_v4().simple().to_string()[..6].to_uppercase())
}

impl VmsCore {
    /// Check the visitor and host and build the visit, unsaved
    async fn prepare_visit(&self, company: &CompanyId, new: NewVisit) -> Result<(Visit, Visitor, bool)> {
        validate_new_visit(&new)?;

        let visitor = self.provider.get_visitor(company, &new.visitor_id).await?;
        if visitor.is_erased() {
            return Err(VmsError::Conflict(format!("visitor {} has been erased", visitor.id)));
        }
        let host = self.provider.get_employee(company, &new.host_employee_id).await?;
        if !host.active {
            return Err(VmsError::validation("hostEmployeeId", format!("host {} is not active", host.id)));
        }

        let installation = self.store.installation(company)?;
        let requires_approval = installation.require_approval || visitor.visitor_type == VisitorType::Contractor;

        let new = NewVisit {
            visitor_id: visitor.id.clone(),
            host_employee_id: host.id,
            ..new
        };
        let visit = Visit::new(company.clone(), new, requires_approval, Utc::now());
        Ok((visit, visitor, requires_approval))
    }

    /// Schedule a visit; an approval is requested from the host when needed
    pub async fn schedule_visit(&self, company: &CompanyId, actor: Option<&str>, new: NewVisit) -> Result<Visit> {
        let (mut visit, _visitor, requires_approval) = self.prepare_visit(company, new).await?;

        if requires_approval {
            let approval = Approval::new(company.clone(), &visit.id, &visit.host_employee_id, visit.created_at);
            visit.approval_id = Some(approval.id.clone());
            self.store.approvals.save(&approval)?;
            self.record(company, AuditEventType::ApprovalRequested, actor, &visit.id);
        }
        self.store.visits.save(&visit)?;
        self.record(company, AuditEventType::VisitScheduled, actor, &visit.id);

        self.logger.info(
            "Visit scheduled",
            Some(&meta([
                ("company", company.as_str()),
                ("visit", visit.id.as_str()),
                ("status", visit.status().as_str()),
            ])),
        );
        Ok(visit)
    }

    /// Schedule and check in at once; only for visits that need no approval
    pub async fn walk_in(&self, company: &CompanyId, actor: Option<&str>, new: NewVisit) -> Result<Visit> {
        let (mut visit, visitor, requires_approval) = self.prepare_visit(company, new).await?;
        if requires_approval {
            return Err(VmsError::Forbidden("this visit needs an approval before check-in".to_string()));
        }
        visit.walk_in = true;
        self.screen_at_door(company, actor, &visit, &visitor)?;

        visit.check_in(badge_number(), Utc::now())?;
        self.store.visits.save(&visit)?;
        self.record(company, AuditEventType::VisitScheduled, actor, &visit.id);
        self.record(company, AuditEventType::VisitCheckedIn, actor, &visit.id);
        Ok(visit)
    }

    /// Refuse a blocked visitor at the door; alerts are recorded and let through
    fn screen_at_door(&self, company: &CompanyId, actor: Option<&str>, visit: &Visit, visitor: &Visitor) -> Result<()> {
        let outcome = self.screen(company, &ScreeningSubject::from(visitor))?;
        if outcome.is_clear() {
            return Ok(());
        }
        self.log_watchlist_hit(company, actor, &visitor.id, &outcome);
        if outcome.is_blocked() {
            self.audit_mut().log_denied(
                company,
                AuditEventType::VisitCheckedIn,
                actor,
                Some(&visit.id),
                "visitor is on the watchlist",
            );
            self.logger.warn(
                "Check-in blocked by watchlist",
                Some(&meta([("company", company.as_str()), ("visit", visit.id.as_str())])),
            );
            return Err(VmsError::Forbidden("visitor is on the watchlist".to_string()));
        }
        Ok(())
    }

    pub async fn check_in(&self, company: &CompanyId, actor: Option<&str>, visit_id: &str) -> Result<Visit> {
        let mut visit = self.store.visits.get(company, visit_id)?;
        let visitor = self.provider.get_visitor(company, &visit.visitor_id).await?;
        self.screen_at_door(company, actor, &visit, &visitor)?;

        visit.check_in(badge_number(), Utc::now())?;
        self.store.visits.save(&visit)?;
        self.record(company, AuditEventType::VisitCheckedIn, actor, &visit.id);
        Ok(visit)
    }

    pub fn check_out(&self, company: &CompanyId, actor: Option<&str>, visit_id: &str) -> Result<Visit> {
        let mut visit = self.store.visits.get(company, visit_id)?;
        visit.check_out(Utc::now())?;
        self.store.visits.save(&visit)?;
        self.record(company, AuditEventType::VisitCheckedOut, actor, &visit.id);
        Ok(visit)
    }

    /// Cancel a visit that has not started; a waiting approval is closed as rejected
    pub fn cancel_visit(&self, company: &CompanyId, actor: Option<&str>, visit_id: &str) -> Result<Visit> {
        let mut visit = self.store.visits.get(company, visit_id)?;
        let now = Utc::now();
        visit.cancel(now)?;

        if let Some(mut approval) = self.store.approvals.find_approval_for_visit(company, &visit.id)? {
            if approval.is_pending() {
                approval.decide(false, Some("visit cancelled".to_string()), now)?;
                self.store.approvals.save(&approval)?;
            }
        }
        self.store.visits.save(&visit)?;
        self.record(company, AuditEventType::VisitCancelled, actor, &visit.id);
        Ok(visit)
    }

    pub fn get_visit(&self, company: &CompanyId, visit_id: &str) -> Result<Visit> {
        Ok(self.store.visits.get(company, visit_id)?)
    }

    /// Visits matching a query, earliest scheduled first
    pub fn list_visits(&self, company: &CompanyId, query: &VisitQuery) -> Result<Vec<Visit>> {
        if let (Some(from), Some(to)) = (query.from, query.to) {
            validate_window(from, to)?;
        }
        let mut visits = self.store.visits.find_where(company, &|v: &Visit| query.matches(v))?;
        visits.sort_by_key(|v| v.scheduled_start);
        Ok(visits)
    }

    /// Visitors checked in right now, optionally at one location
    pub fn on_site(&self, company: &CompanyId, location_id: Option<&str>) -> Result<Vec<Visit>> {
        Ok(self.store.visits.list_on_site(company, location_id)?)
    }

    // ========== Approvals ==========

    pub fn pending_approvals(&self, company: &CompanyId, approver_id: Option<&str>) -> Result<Vec<Approval>> {
        Ok(self.store.approvals.list_pending_approvals(company, approver_id)?)
    }

    /// Decide an approval; only the assigned approver may do so
    pub fn decide_approval(
        &self,
        company: &CompanyId,
        actor: Option<&str>,
        approval_id: &str,
        decision: ApprovalDecision,
    ) -> Result<Approval> {
        let mut approval = self.store.approvals.get(company, approval_id)?;
        if actor != Some(approval.approver_id.as_str()) {
            self.audit_mut().log_denied(
                company,
                AuditEventType::ApprovalDecided,
                actor,
                Some(&approval.visit_id),
                "not the assigned approver",
            );
            return Err(VmsError::Forbidden("only the assigned approver can decide".to_string()));
        }

        let mut visit = self.store.visits.get(company, &approval.visit_id)?;
        let now = Utc::now();
        if decision.approve {
            visit.approve(now)?;
        } else {
            visit.reject(now)?;
        }
        approval.decide(decision.approve, decision.comment, now)?;

        self.store.approvals.save(&approval)?;
        self.store.visits.save(&visit)?;
        self.record(company, AuditEventType::ApprovalDecided, actor, &visit.id);

        self.logger.info(
            "Approval decided",
            Some(&meta([
                ("company", company.as_str()),
                ("visit", visit.id.as_str()),
                ("status", approval.status.as_str()),
            ])),
        );
        Ok(approval)
    }
}
