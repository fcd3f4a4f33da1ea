//! AuditLogger - Bounded audit trail of what happened to visitors and visits

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared::CompanyId;
use std::collections::{BTreeMap, VecDeque};

/// Audit log entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    pub timestamp: DateTime<Utc>,
    pub event_type: AuditEventType,
    pub company_id: CompanyId,
    /// User who triggered the event
    pub actor: Option<String>,
    /// Record the event is about
    pub subject_id: Option<String>,
    pub success: bool,
    pub reason: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

impl AuditEntry {
    /// Create a successful entry stamped now
    pub fn new(company: &CompanyId, event_type: AuditEventType) -> Self {
        Self {
            timestamp: Utc::now(),
            event_type,
            company_id: company.clone(),
            actor: None,
            subject_id: None,
            success: true,
            reason: None,
            metadata: None,
        }
    }

    pub fn by(mut self, actor: Option<&str>) -> Self {
        self.actor = actor.map(str::to_string);
        self
    }

    pub fn about(mut self, subject_id: impl Into<String>) -> Self {
        self.subject_id = Some(subject_id.into());
        self
    }

    pub fn failed(mut self, reason: impl Into<String>) -> Self {
        self.success = false;
        self.reason = Some(reason.into());
        self
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// Types of audit events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
    VisitorRegistered,
    VisitorUpdated,
    VisitorErased,
    EmployeeRegistered,
    EmployeeUpdated,
    VisitScheduled,
    VisitCheckedIn,
    VisitCheckedOut,
    VisitCancelled,
    ApprovalRequested,
    ApprovalDecided,
    WatchlistHit,
    WatchlistUpdated,
    EvacuationStarted,
    EvacuationClosed,
    ResidencyChanged,
    DataExported,
    SyncQueued,
}

impl AuditEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditEventType::VisitorRegistered => "visitor_registered",
            AuditEventType::VisitorUpdated => "visitor_updated",
            AuditEventType::VisitorErased => "visitor_erased",
            AuditEventType::EmployeeRegistered => "employee_registered",
            AuditEventType::EmployeeUpdated => "employee_updated",
            AuditEventType::VisitScheduled => "visit_scheduled",
            AuditEventType::VisitCheckedIn => "visit_checked_in",
            AuditEventType::VisitCheckedOut => "visit_checked_out",
            AuditEventType::VisitCancelled => "visit_cancelled",
            AuditEventType::ApprovalRequested => "approval_requested",
            AuditEventType::ApprovalDecided => "approval_decided",
            AuditEventType::WatchlistHit => "watchlist_hit",
            AuditEventType::WatchlistUpdated => "watchlist_updated",
            AuditEventType::EvacuationStarted => "evacuation_started",
            AuditEventType::EvacuationClosed => "evacuation_closed",
            AuditEventType::ResidencyChanged => "residency_changed",
            AuditEventType::DataExported => "data_exported",
            AuditEventType::SyncQueued => "sync_queued",
        }
    }
}

/// Audit logger
#[derive(Debug)]
pub struct AuditLogger {
    entries: VecDeque<AuditEntry>,
    max_entries: usize,
}

impl AuditLogger {
    /// Create a new AuditLogger
    pub fn new(max_entries: usize) -> Self {
        let max_entries = max_entries.max(1);
        Self {
            entries: VecDeque::with_capacity(max_entries.min(1024)),
            max_entries,
        }
    }

    /// Log an audit entry
    pub fn log(&mut self, entry: AuditEntry) {
        if self.entries.len() >= self.max_entries {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }

    /// Log a successful event about a record
    pub fn log_event(&mut self, company: &CompanyId, event_type: AuditEventType, actor: Option<&str>, subject_id: &str) {
        self.log(AuditEntry::new(company, event_type).by(actor).about(subject_id));
    }

    /// Log a refused action
    pub fn log_denied(
        &mut self,
        company: &CompanyId,
        event_type: AuditEventType,
        actor: Option<&str>,
        subject_id: Option<&str>,
        reason: &str,
    ) {
        let mut entry = AuditEntry::new(company, event_type).by(actor).failed(reason);
        entry.subject_id = subject_id.map(str::to_string);
        self.log(entry);
    }

    /// Log a watchlist match; blocked matches are recorded as failures
    pub fn log_watchlist_hit(
        &mut self,
        company: &CompanyId,
        actor: Option<&str>,
        subject: &str,
        blocked: bool,
        entry_ids: &[String],
    ) {
        let mut entry = AuditEntry::new(company, AuditEventType::WatchlistHit)
            .by(actor)
            .about(subject)
            .with_metadata(serde_json::json!({ "entries": entry_ids, "blocked": blocked }));
        if blocked {
            entry = entry.failed("blocked by watchlist");
        } else {
            entry = entry.with_reason("watchlist alert");
        }
        self.log(entry);
    }

    /// Log a residency switch
    pub fn log_residency_change(&mut self, company: &CompanyId, actor: Option<&str>, entity: &str, mode: &str) {
        self.log(
            AuditEntry::new(company, AuditEventType::ResidencyChanged)
                .by(actor)
                .about(entity)
                .with_reason(format!("'{}' now lives in '{}'", entity, mode)),
        );
    }

    /// Log a Platform write that had to be queued
    pub fn log_sync_queued(&mut self, company: &CompanyId, subject_id: &str, operation_id: &str) {
        self.log(
            AuditEntry::new(company, AuditEventType::SyncQueued)
                .about(subject_id)
                .with_metadata(serde_json::json!({ "operationId": operation_id })),
        );
    }

    /// Get recent entries of a company, newest first
    pub fn get_recent(&self, company: &CompanyId, limit: usize) -> Vec<&AuditEntry> {
        self.entries
            .iter()
            .rev()
            .filter(|e| &e.company_id == company)
            .take(limit)
            .collect()
    }

    /// Get recent failures of a company, newest first
    pub fn get_recent_failures(&self, company: &CompanyId, limit: usize) -> Vec<&AuditEntry> {
        self.entries
            .iter()
            .rev()
            .filter(|e| &e.company_id == company && !e.success)
            .take(limit)
            .collect()
    }

    /// Trail of one record, oldest first
    pub fn for_subject(&self, company: &CompanyId, subject_id: &str) -> Vec<&AuditEntry> {
        self.entries
            .iter()
            .filter(|e| &e.company_id == company && e.subject_id.as_deref() == Some(subject_id))
            .collect()
    }

    /// Get statistics, for one company or all of them
    pub fn get_stats(&self, company: Option<&CompanyId>) -> AuditStats {
        let mut stats = AuditStats::default();
        for entry in self.entries.iter().filter(|e| company.map_or(true, |c| &e.company_id == c)) {
            stats.total_entries += 1;
            if !entry.success {
                stats.failure_count += 1;
            }
            *stats.by_event.entry(entry.event_type.as_str().to_string()).or_default() += 1;
        }
        stats
    }

    /// Export as JSON, for one company or all of them
    pub fn export_json(&self, company: Option<&CompanyId>) -> serde_json::Value {
        let entries: Vec<&AuditEntry> = self
            .entries
            .iter()
            .filter(|e| company.map_or(true, |c| &e.company_id == c))
            .collect();
        serde_json::to_value(entries).unwrap_or_default()
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }
}

/// Audit statistics
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditStats {
    pub total_entries: usize,
    pub failure_count: usize,
    pub by_event: BTreeMap<String, usize>,
}

impl Default for AuditLogger {
    fn default() -> Self {
        Self::new(10000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn acme() -> CompanyId {
        CompanyId::new("acme")
    }

    #[test]
    fn test_log_entry() {
        let mut logger = AuditLogger::new(100);

        logger.log_event(&acme(), AuditEventType::VisitorRegistered, Some("u-1"), "v-1");

        let stats = logger.get_stats(None);
        assert_eq!(stats.total_entries, 1);
        assert_eq!(stats.failure_count, 0);
        assert_eq!(stats.by_event.get("visitor_registered"), Some(&1));
    }

    #[test]
    fn test_log_denied() {
        let mut logger = AuditLogger::new(100);

        logger.log_denied(&acme(), AuditEventType::VisitCheckedIn, None, Some("visit-1"), "visitor is blocked");

        let failures = logger.get_recent_failures(&acme(), 10);
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].reason.as_deref(), Some("visitor is blocked"));
        assert_eq!(logger.get_stats(Some(&acme())).failure_count, 1);
    }

    #[test]
    fn test_watchlist_hit_metadata() {
        let mut logger = AuditLogger::new(100);

        logger.log_watchlist_hit(&acme(), Some("guard"), "v-1", true, &["w-1".to_string()]);

        let recent = logger.get_recent(&acme(), 1);
        assert!(!recent[0].success);
        assert_eq!(recent[0].metadata.as_ref().unwrap()["entries"][0], "w-1");
    }

    #[test]
    fn test_max_entries_limit() {
        let mut logger = AuditLogger::new(3);

        for i in 1..=4 {
            logger.log_event(&acme(), AuditEventType::VisitScheduled, None, &format!("visit-{i}"));
        }

        assert_eq!(logger.get_stats(None).total_entries, 3);
        // Oldest entry should be removed
        assert!(logger.for_subject(&acme(), "visit-1").is_empty());
        assert_eq!(logger.for_subject(&acme(), "visit-4").len(), 1);
    }

    #[test]
    fn test_get_recent_is_newest_first_and_per_company() {
        let mut logger = AuditLogger::new(100);
        let globex = CompanyId::new("globex");

        logger.log_event(&acme(), AuditEventType::VisitCheckedIn, None, "visit-1");
        logger.log_event(&globex, AuditEventType::VisitCheckedIn, None, "visit-2");
        logger.log_event(&acme(), AuditEventType::VisitCheckedOut, None, "visit-1");

        let recent = logger.get_recent(&acme(), 10);
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].event_type, AuditEventType::VisitCheckedOut);
        assert_eq!(logger.get_stats(Some(&globex)).total_entries, 1);
    }

    #[test]
    fn test_for_subject_is_oldest_first() {
        let mut logger = AuditLogger::new(100);

        logger.log_event(&acme(), AuditEventType::VisitorRegistered, None, "v-1");
        logger.log_event(&acme(), AuditEventType::VisitorUpdated, None, "v-1");
        logger.log_event(&acme(), AuditEventType::VisitorRegistered, None, "v-2");

        let trail = logger.for_subject(&acme(), "v-1");
        assert_eq!(trail.len(), 2);
        assert_eq!(trail[0].event_type, AuditEventType::VisitorRegistered);
    }

    #[test]
    fn test_export_json() {
        let mut logger = AuditLogger::new(100);

        logger.log_residency_change(&acme(), Some("admin"), "visitor", "platform");
        logger.log_sync_queued(&CompanyId::new("globex"), "v-9", "op-1");

        let json = logger.export_json(Some(&acme()));
        let entries = json.as_array().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0]["eventType"], "residency_changed");
        assert_eq!(entries[0]["companyId"], "acme");
        assert_eq!(logger.export_json(None).as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_default_max_entries() {
        let logger = AuditLogger::default();
        assert_eq!(logger.max_entries(), 10000);
    }
}
