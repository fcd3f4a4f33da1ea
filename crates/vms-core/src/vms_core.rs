//! VmsCore - Central application service
//!
//! Every operation is scoped by a company and carries the acting user, when
//! known, for the audit trail.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use audit::{AuditEntry, AuditEventType, AuditLogger, AuditStats};
use chrono::{DateTime, Utc};
use federation::{
    ActorManifest, ActorMapper, DataProvider, Delivery, EmployeeFilter, PlatformClientWrapper, Residency,
    ResidencyDetector, SyncFilter, SyncOperation, SyncProcessor, SyncQueue, SyncStats, SyncStatus, VisitorFilter,
    WriteOutcome, WriteResult,
};
use platform::{EmbeddingJob, PlatformClient};
use serde::Serialize;
use shared::{meta, CompanyId, EntityType, Logger, ResidencyMode, Result, VmsConfig, VmsError};
use vms_domain::service::screening::{screen, ScreeningOutcome, ScreeningSubject};
use vms_domain::service::validation::{validate_email, validate_name, validate_new_employee, validate_new_visitor, validate_phone};
use vms_domain::{
    Approval, ApprovalQueries, Employee, EmployeeUpdate, LocalStore, Location, NewEmployee, NewLocation, NewVisitor,
    Repository, Visit, VisitQueries, Visitor, VisitorUpdate, WatchlistQueries,
};

/// A visitor registration and what screening found
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VisitorRegistration {
    pub visitor: Visitor,
    pub delivery: Delivery,
    pub screening: ScreeningOutcome,
}

/// Everything held about one visitor
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VisitorExport {
    pub visitor: Visitor,
    pub visits: Vec<Visit>,
    pub approvals: Vec<Approval>,
    pub audit_trail: Vec<AuditEntry>,
    pub exported_at: DateTime<Utc>,
}

/// VmsCore - The central orchestrator
pub struct VmsCore {
    /// Logger
    pub(crate) logger: Arc<dyn Logger>,
    /// Local database
    pub(crate) store: LocalStore,
    /// Residency-aware reads and writes of federated records
    pub(crate) provider: Arc<DataProvider>,
    /// Platform client, when one is configured
    pub(crate) platform: Option<Arc<dyn PlatformClient>>,
    /// Audit trail
    audit: RwLock<AuditLogger>,
}

impl VmsCore {
    /// Create a new VmsCore
    pub fn new(
        logger: Arc<dyn Logger>,
        store: LocalStore,
        provider: Arc<DataProvider>,
        platform: Option<Arc<dyn PlatformClient>>,
        audit: AuditLogger,
    ) -> Self {
        Self {
            logger,
            store,
            provider,
            platform,
            audit: RwLock::new(audit),
        }
    }

    /// Wire the federation layer from configuration
    pub fn from_config(
        config: &VmsConfig,
        store: LocalStore,
        platform: Option<Arc<dyn PlatformClient>>,
        manifest: ActorManifest,
        logger: Arc<dyn Logger>,
    ) -> Result<Self> {
        manifest.validate()?;
        let queue = Arc::new(SyncQueue::from_config(&config.sync)?);
        let residency = Arc::new(ResidencyDetector::new(
            store.clone(),
            platform.clone(),
            config.residency.clone(),
            logger.clone(),
        ));
        let mapper = Arc::new(ActorMapper::new(logger.clone(), manifest));
        let writer = Arc::new(PlatformClientWrapper::new(platform.clone(), queue, logger.clone()));
        let provider = Arc::new(DataProvider::new(
            store.clone(),
            residency,
            mapper,
            platform.clone(),
            writer,
            logger.clone(),
        ));

        logger.info(
            "VMS core ready",
            Some(&meta([
                ("platform", if platform.is_some() { "configured" } else { "none" }),
                ("manifest", provider.mapper().manifest().app.as_str()),
            ])),
        );

        Ok(Self::new(
            logger,
            store,
            provider,
            platform,
            AuditLogger::new(config.audit.max_entries),
        ))
    }

    /// Background worker draining the sync queue of this core
    pub fn sync_processor(&self, config: &VmsConfig) -> SyncProcessor {
        SyncProcessor::new(
            self.queue().clone(),
            self.platform.clone(),
            self.store.clone(),
            config.sync.clone(),
            self.logger.clone(),
        )
    }

    pub fn provider(&self) -> &Arc<DataProvider> {
        &self.provider
    }

    pub fn store(&self) -> &LocalStore {
        &self.store
    }

    pub(crate) fn queue(&self) -> &Arc<SyncQueue> {
        self.provider.writer().queue()
    }

    /// Platform reachability, `None` without a Platform
    pub async fn platform_health(&self) -> Option<bool> {
        match &self.platform {
            Some(platform) => Some(platform.health().await),
            None => None,
        }
    }

    // ========== Audit ==========

    pub(crate) fn audit_mut(&self) -> RwLockWriteGuard<'_, AuditLogger> {
        self.audit.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn audit_ref(&self) -> RwLockReadGuard<'_, AuditLogger> {
        self.audit.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub(crate) fn record(&self, company: &CompanyId, event: AuditEventType, actor: Option<&str>, subject_id: &str) {
        self.audit_mut().log_event(company, event, actor, subject_id);
    }

    /// Record the sync side of a federated write
    pub(crate) fn record_delivery(&self, company: &CompanyId, subject_id: &str, delivery: &Delivery) {
        if let Delivery::Queued { operation_id } = delivery {
            self.audit_mut().log_sync_queued(company, subject_id, operation_id);
        }
    }

    /// Recent audit entries, newest first
    pub fn recent_audit(&self, company: &CompanyId, limit: usize) -> Vec<AuditEntry> {
        self.audit_ref().get_recent(company, limit).into_iter().cloned().collect()
    }

    /// Recent refused actions, newest first
    pub fn recent_failures(&self, company: &CompanyId, limit: usize) -> Vec<AuditEntry> {
        self.audit_ref()
            .get_recent_failures(company, limit)
            .into_iter()
            .cloned()
            .collect()
    }

    pub fn audit_stats(&self, company: &CompanyId) -> AuditStats {
        self.audit_ref().get_stats(Some(company))
    }

    // ========== Employees ==========

    pub async fn register_employee(
        &self,
        company: &CompanyId,
        actor: Option<&str>,
        new: NewEmployee,
    ) -> Result<WriteOutcome<Employee>> {
        validate_new_employee(&new)?;
        if let Some(email) = new.email.as_deref() {
            let taken = self
                .provider
                .list_employees(company, &EmployeeFilter::default())
                .await?
                .into_iter()
                .any(|e| e.email.as_deref().is_some_and(|known| known.eq_ignore_ascii_case(email.trim())));
            if taken {
                return Err(VmsError::Conflict(format!("an employee with email '{}' exists", email)));
            }
        }

        let outcome = self.provider.create_employee(company, new).await?;
        self.record(company, AuditEventType::EmployeeRegistered, actor, &outcome.record.id);
        self.record_delivery(company, &outcome.record.id, &outcome.delivery);
        self.logger.info(
            &format!("Employee '{}' registered", outcome.record.name),
            Some(&meta([("company", company.as_str()), ("employee", outcome.record.id.as_str())])),
        );
        Ok(outcome)
    }

    pub async fn update_employee(
        &self,
        company: &CompanyId,
        actor: Option<&str>,
        id: &str,
        update: EmployeeUpdate,
    ) -> Result<WriteOutcome<Employee>> {
        if let Some(name) = update.name.as_deref() {
            validate_name("name", name)?;
        }
        if let Some(email) = update.email.as_deref() {
            validate_email(email)?;
        }
        if let Some(phone) = update.phone.as_deref() {
            validate_phone(phone)?;
        }

        let outcome = self.provider.update_employee(company, id, update).await?;
        self.record(company, AuditEventType::EmployeeUpdated, actor, &outcome.record.id);
        self.record_delivery(company, &outcome.record.id, &outcome.delivery);
        Ok(outcome)
    }

    /// Mark an employee inactive; inactive employees cannot host visits
    pub async fn deactivate_employee(
        &self,
        company: &CompanyId,
        actor: Option<&str>,
        id: &str,
    ) -> Result<WriteOutcome<Employee>> {
        let update = EmployeeUpdate {
            active: Some(false),
            ..Default::default()
        };
        self.update_employee(company, actor, id, update).await
    }

    pub async fn get_employee(&self, company: &CompanyId, id: &str) -> Result<Employee> {
        self.provider.get_employee(company, id).await
    }

    pub async fn list_employees(&self, company: &CompanyId, filter: &EmployeeFilter) -> Result<Vec<Employee>> {
        self.provider.list_employees(company, filter).await
    }

    // ========== Visitors ==========

    /// Register a visitor after screening them against the watchlist
    ///
    /// A `block` match refuses the registration; an `alert` match registers
    /// the visitor and reports the match.
    pub async fn register_visitor(
        &self,
        company: &CompanyId,
        actor: Option<&str>,
        new: NewVisitor,
    ) -> Result<VisitorRegistration> {
        validate_new_visitor(&new)?;

        let subject = ScreeningSubject {
            name: new.name.clone(),
            email: new.email.clone(),
            phone: new.phone.clone(),
            id_number: new.id_document.as_ref().map(|d| d.number.clone()),
        };
        let screening = self.screen(company, &subject)?;
        if screening.is_blocked() {
            let entry = AuditEntry::new(company, AuditEventType::WatchlistHit)
                .by(actor)
                .failed("registration refused by watchlist")
                .with_metadata(serde_json::json!({ "name": new.name, "matches": screening.matches() }));
            self.audit_mut().log(entry);
            self.logger.warn(
                "Visitor registration blocked by watchlist",
                Some(&meta([("company", company.as_str())])),
            );
            return Err(VmsError::Forbidden("visitor is on the watchlist".to_string()));
        }

        let outcome = self.provider.create_visitor(company, new).await?;
        let visitor_id = outcome.record.id.clone();
        self.record(company, AuditEventType::VisitorRegistered, actor, &visitor_id);
        self.record_delivery(company, &visitor_id, &outcome.delivery);
        if !screening.is_clear() {
            self.log_watchlist_hit(company, actor, &visitor_id, &screening);
        }

        Ok(VisitorRegistration {
            visitor: outcome.record,
            delivery: outcome.delivery,
            screening,
        })
    }

    pub async fn update_visitor(
        &self,
        company: &CompanyId,
        actor: Option<&str>,
        id: &str,
        update: VisitorUpdate,
    ) -> Result<WriteOutcome<Visitor>> {
        if let Some(name) = update.name.as_deref() {
            validate_name("name", name)?;
        }
        if let Some(email) = update.email.as_deref() {
            validate_email(email)?;
        }
        if let Some(phone) = update.phone.as_deref() {
            validate_phone(phone)?;
        }
        let current = self.provider.get_visitor(company, id).await?;
        if current.is_erased() {
            return Err(VmsError::Conflict(format!("visitor {} has been erased", current.id)));
        }

        let outcome = self.provider.update_visitor(company, &current.id, update).await?;
        self.record(company, AuditEventType::VisitorUpdated, actor, &outcome.record.id);
        self.record_delivery(company, &outcome.record.id, &outcome.delivery);
        Ok(outcome)
    }

    pub async fn get_visitor(&self, company: &CompanyId, id: &str) -> Result<Visitor> {
        self.provider.get_visitor(company, id).await
    }

    pub async fn list_visitors(&self, company: &CompanyId, filter: &VisitorFilter) -> Result<Vec<Visitor>> {
        self.provider.list_visitors(company, filter).await
    }

    /// Ask the Platform for a face embedding of a mirrored visitor
    pub async fn request_visitor_embedding(
        &self,
        company: &CompanyId,
        actor: Option<&str>,
        id: &str,
        image_ref: &str,
    ) -> Result<WriteResult<EmbeddingJob>> {
        if image_ref.trim().is_empty() {
            return Err(VmsError::validation("imageRef", "must not be empty"));
        }
        let result = self.provider.request_embedding(company, id, image_ref).await?;
        if let Some(operation_id) = result.operation_id() {
            self.audit_mut().log_sync_queued(company, id, operation_id);
        }
        self.logger.info(
            "Embedding requested",
            Some(&meta([
                ("company", company.as_str()),
                ("visitor", id),
                ("actor", actor.unwrap_or("-")),
            ])),
        );
        Ok(result)
    }

    // ========== GDPR ==========

    /// Collect everything held about a visitor
    pub async fn export_visitor(&self, company: &CompanyId, actor: Option<&str>, id: &str) -> Result<VisitorExport> {
        let visitor = self.provider.get_visitor(company, id).await?;
        let mut visits = self.store.visits.list_visits_for_visitor(company, &visitor.id)?;
        if let Some(platform_id) = visitor.platform_id.as_deref().filter(|p| *p != visitor.id) {
            visits.extend(self.store.visits.list_visits_for_visitor(company, platform_id)?);
        }
        visits.sort_by_key(|v| v.created_at);

        let mut approvals = Vec::new();
        for visit in &visits {
            if let Some(approval) = self.store.approvals.find_approval_for_visit(company, &visit.id)? {
                approvals.push(approval);
            }
        }

        let audit_trail = self
            .audit_ref()
            .for_subject(company, &visitor.id)
            .into_iter()
            .cloned()
            .collect();
        self.record(company, AuditEventType::DataExported, actor, &visitor.id);

        Ok(VisitorExport {
            visitor,
            visits,
            approvals,
            audit_trail,
            exported_at: Utc::now(),
        })
    }

    /// Anonymize a visitor; refused while they are on site
    pub async fn erase_visitor(
        &self,
        company: &CompanyId,
        actor: Option<&str>,
        id: &str,
    ) -> Result<WriteOutcome<Visitor>> {
        let visitor = self.provider.get_visitor(company, id).await?;
        let on_site = self
            .store
            .visits
            .list_visits_for_visitor(company, &visitor.id)?
            .iter()
            .any(Visit::is_on_site);
        if on_site {
            self.audit_mut()
                .log_denied(company, AuditEventType::VisitorErased, actor, Some(&visitor.id), "visitor is on site");
            return Err(VmsError::Conflict(format!("visitor {} is on site", visitor.id)));
        }

        let outcome = self.provider.erase_visitor(company, &visitor.id).await?;
        self.record(company, AuditEventType::VisitorErased, actor, &outcome.record.id);
        self.record_delivery(company, &outcome.record.id, &outcome.delivery);
        self.logger.info(
            "Visitor erased",
            Some(&meta([("company", company.as_str()), ("visitor", outcome.record.id.as_str())])),
        );
        Ok(outcome)
    }

    // ========== Locations ==========

    pub async fn list_locations(&self, company: &CompanyId) -> Result<Vec<Location>> {
        self.provider.list_locations(company).await
    }

    pub async fn create_location(&self, company: &CompanyId, new: NewLocation) -> Result<WriteOutcome<Location>> {
        validate_name("name", &new.name)?;
        self.provider.create_location(company, new).await
    }

    // ========== Watchlist screening ==========

    /// Screen details against the company's active watchlist
    pub fn screen(&self, company: &CompanyId, subject: &ScreeningSubject) -> Result<ScreeningOutcome> {
        let entries = self.store.watchlist.list_active_watchlist(company)?;
        Ok(screen(subject, &entries))
    }

    pub(crate) fn log_watchlist_hit(
        &self,
        company: &CompanyId,
        actor: Option<&str>,
        subject: &str,
        outcome: &ScreeningOutcome,
    ) {
        let entry_ids: Vec<String> = outcome.matches().iter().map(|m| m.entry_id.clone()).collect();
        self.audit_mut()
            .log_watchlist_hit(company, actor, subject, outcome.is_blocked(), &entry_ids);
    }

    // ========== Residency ==========

    /// Where each entity type currently lives, with the rule that decided it
    pub async fn residency(&self, company: &CompanyId) -> Result<BTreeMap<EntityType, Residency>> {
        self.provider.residency().detect_all(company).await
    }

    pub async fn set_residency(
        &self,
        company: &CompanyId,
        actor: Option<&str>,
        entity: EntityType,
        mode: ResidencyMode,
    ) -> Result<Residency> {
        let detector = self.provider.residency();
        if mode.is_platform() && !detector.has_platform() {
            return Err(VmsError::validation("mode", "no Platform is configured"));
        }
        detector.set_mode(company, entity, mode)?;
        self.audit_mut()
            .log_residency_change(company, actor, entity.as_str(), mode.as_str());
        self.logger.info(
            &format!("Residency of '{}' set to '{}'", entity.as_str(), mode.as_str()),
            Some(&meta([("company", company.as_str())])),
        );
        detector.detect(company, entity).await
    }

    // ========== Sync ==========

    pub fn sync_stats(&self, company: &CompanyId) -> Result<SyncStats> {
        self.queue().stats(Some(company))
    }

    pub fn sync_operations(
        &self,
        company: &CompanyId,
        status: Option<SyncStatus>,
        limit: Option<usize>,
    ) -> Result<Vec<SyncOperation>> {
        self.queue().list(&SyncFilter {
            company_id: Some(company.clone()),
            status,
            limit,
        })
    }

    /// Put a failed operation back in line
    pub fn retry_sync_operation(&self, company: &CompanyId, id: &str) -> Result<SyncOperation> {
        let op = self
            .queue()
            .get(id)?
            .filter(|op| &op.company_id == company)
            .ok_or_else(|| VmsError::not_found("sync operation", id))?;
        let op = self.queue().retry(&op.id, Utc::now())?;
        self.logger.info(
            "Sync operation requeued",
            Some(&meta([("company", company.as_str()), ("operation", op.id.as_str())])),
        );
        Ok(op)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use audit::AuditEventType;
    use federation::ResidencySource;
    use platform::InMemoryPlatform;
    use shared::NullLogger;
    use vms_adapter::in_memory_store;
    use vms_domain::{NewWatchlistEntry, WatchlistSeverity};

    pub(crate) fn company() -> CompanyId {
        CompanyId::new("acme")
    }

    pub(crate) struct Fixture {
        pub core: VmsCore,
        pub platform: Arc<InMemoryPlatform>,
    }

    pub(crate) fn fixture() -> Fixture {
        let platform = Arc::new(InMemoryPlatform::new());
        let client: Arc<dyn PlatformClient> = platform.clone();
        let core = VmsCore::from_config(
            &VmsConfig::default(),
            in_memory_store(),
            Some(client),
            ActorManifest::builtin(),
            Arc::new(NullLogger),
        )
        .unwrap();
        Fixture { core, platform }
    }

    pub(crate) fn new_visitor(name: &str) -> NewVisitor {
        NewVisitor {
            name: name.to_string(),
            email: Some(format!("{}@example.com", name.split_whitespace().collect::<String>().to_lowercase())),
            ..Default::default()
        }
    }

    pub(crate) fn new_employee(name: &str) -> NewEmployee {
        NewEmployee {
            name: name.to_string(),
            email: Some(format!("{}@acme.test", name.to_lowercase())),
            ..Default::default()
        }
    }

    pub(crate) fn watch(core: &VmsCore, name: &str, severity: WatchlistSeverity) {
        core.add_watchlist_entry(
            &company(),
            Some("security"),
            NewWatchlistEntry {
                name: name.to_string(),
                reason: "trespass".to_string(),
                severity,
                ..Default::default()
            },
        )
        .unwrap();
    }

    // ============== Employee Tests ==============

    #[tokio::test]
    async fn test_register_employee_is_audited() {
        let f = fixture();
        let outcome = f
            .core
            .register_employee(&company(), Some("admin"), new_employee("Grace"))
            .await
            .unwrap();

        assert_eq!(outcome.delivery, Delivery::Local);
        let recent = f.core.recent_audit(&company(), 10);
        assert_eq!(recent[0].event_type, AuditEventType::EmployeeRegistered);
        assert_eq!(recent[0].actor.as_deref(), Some("admin"));
    }

    #[tokio::test]
    async fn test_register_employee_rejects_duplicate_email() {
        let f = fixture();
        f.core
            .register_employee(&company(), None, new_employee("Grace"))
            .await
            .unwrap();

        let err = f
            .core
            .register_employee(&company(), None, new_employee("GRACE"))
            .await
            .unwrap_err();
        assert!(matches!(err, VmsError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_deactivate_employee() {
        let f = fixture();
        let grace = f
            .core
            .register_employee(&company(), None, new_employee("Grace"))
            .await
            .unwrap()
            .record;

        let outcome = f.core.deactivate_employee(&company(), None, &grace.id).await.unwrap();
        assert!(!outcome.record.active);

        let active = f
            .core
            .list_employees(
                &company(),
                &EmployeeFilter {
                    active: Some(true),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(active.is_empty());
    }

    #[tokio::test]
    async fn test_update_employee_validates_email() {
        let f = fixture();
        let grace = f
            .core
            .register_employee(&company(), None, new_employee("Grace"))
            .await
            .unwrap()
            .record;

        let update = EmployeeUpdate {
            email: Some("not-an-email".to_string()),
            ..Default::default()
        };
        let err = f.core.update_employee(&company(), None, &grace.id, update).await.unwrap_err();
        assert!(matches!(err, VmsError::Validation(_)));
    }

    // ============== Visitor Tests ==============

    #[tokio::test]
    async fn test_register_clear_visitor() {
        let f = fixture();
        let registration = f
            .core
            .register_visitor(&company(), None, new_visitor("Alice"))
            .await
            .unwrap();

        assert!(registration.screening.is_clear());
        assert_eq!(f.core.get_visitor(&company(), &registration.visitor.id).await.unwrap().name, "Alice");
    }

    #[tokio::test]
    async fn test_register_blocked_visitor_is_refused() {
        let f = fixture();
        watch(&f.core, "Mallory", WatchlistSeverity::Block);

        let err = f
            .core
            .register_visitor(&company(), Some("desk"), new_visitor("Mallory"))
            .await
            .unwrap_err();

        assert!(matches!(err, VmsError::Forbidden(_)));
        assert!(f.core.list_visitors(&company(), &VisitorFilter::default()).await.unwrap().is_empty());
        let failures = f.core.recent_failures(&company(), 10);
        assert_eq!(failures[0].event_type, AuditEventType::WatchlistHit);
    }

    #[tokio::test]
    async fn test_register_alert_visitor_is_flagged() {
        let f = fixture();
        watch(&f.core, "Eve", WatchlistSeverity::Alert);

        let registration = f
            .core
            .register_visitor(&company(), None, new_visitor("Eve"))
            .await
            .unwrap();

        assert!(matches!(registration.screening, ScreeningOutcome::Alert(_)));
        let stats = f.core.audit_stats(&company());
        assert_eq!(stats.by_event.get("watchlist_hit"), Some(&1));
        assert_eq!(stats.failure_count, 0);
    }

    #[tokio::test]
    async fn test_update_erased_visitor_conflicts() {
        let f = fixture();
        let alice = f
            .core
            .register_visitor(&company(), None, new_visitor("Alice"))
            .await
            .unwrap()
            .visitor;
        f.core.erase_visitor(&company(), None, &alice.id).await.unwrap();

        let update = VisitorUpdate {
            organization: Some("Initech".to_string()),
            ..Default::default()
        };
        let err = f.core.update_visitor(&company(), None, &alice.id, update).await.unwrap_err();
        assert!(matches!(err, VmsError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_queued_platform_write_is_audited() {
        let f = fixture();
        f.core
            .set_residency(&company(), Some("admin"), EntityType::Visitor, ResidencyMode::Platform)
            .await
            .unwrap();
        f.platform.set_available(false);

        let registration = f
            .core
            .register_visitor(&company(), None, new_visitor("Alice"))
            .await
            .unwrap();

        assert!(matches!(registration.delivery, Delivery::Queued { .. }));
        let stats = f.core.audit_stats(&company());
        assert_eq!(stats.by_event.get("sync_queued"), Some(&1));
        assert_eq!(f.core.sync_stats(&company()).unwrap().pending, 1);
    }

    // ============== GDPR Tests ==============

    #[tokio::test]
    async fn test_export_visitor_collects_history() {
        let f = fixture();
        let alice = f
            .core
            .register_visitor(&company(), Some("desk"), new_visitor("Alice"))
            .await
            .unwrap()
            .visitor;

        let export = f.core.export_visitor(&company(), Some("dpo"), &alice.id).await.unwrap();
        assert_eq!(export.visitor.id, alice.id);
        assert!(export.visits.is_empty());
        assert_eq!(export.audit_trail.len(), 1);
        assert_eq!(f.core.recent_audit(&company(), 1)[0].event_type, AuditEventType::DataExported);
    }

    #[tokio::test]
    async fn test_erase_visitor_anonymizes() {
        let f = fixture();
        let alice = f
            .core
            .register_visitor(&company(), None, new_visitor("Alice"))
            .await
            .unwrap()
            .visitor;

        let erased = f.core.erase_visitor(&company(), Some("dpo"), &alice.id).await.unwrap().record;
        assert!(erased.is_erased());
        assert!(erased.email.is_none());
        assert_ne!(erased.name, "Alice");
    }

    // ============== Residency Tests ==============

    #[tokio::test]
    async fn test_set_residency_is_audited() {
        let f = fixture();
        let residency = f
            .core
            .set_residency(&company(), Some("admin"), EntityType::Employee, ResidencyMode::Platform)
            .await
            .unwrap();

        assert_eq!(residency.mode, ResidencyMode::Platform);
        assert_eq!(residency.source, ResidencySource::Installation);
        let all = f.core.residency(&company()).await.unwrap();
        assert_eq!(all[&EntityType::Employee].mode, ResidencyMode::Platform);
        assert_eq!(f.core.recent_audit(&company(), 1)[0].event_type, AuditEventType::ResidencyChanged);
    }

    #[tokio::test]
    async fn test_platform_mode_needs_a_platform() {
        let core = VmsCore::from_config(
            &VmsConfig::default(),
            in_memory_store(),
            None,
            ActorManifest::builtin(),
            Arc::new(NullLogger),
        )
        .unwrap();

        let err = core
            .set_residency(&company(), None, EntityType::Visitor, ResidencyMode::Platform)
            .await
            .unwrap_err();
        assert!(matches!(err, VmsError::Validation(_)));
    }

    // ============== Sync Tests ==============

    #[tokio::test]
    async fn test_retry_failed_operation() {
        let f = fixture();
        f.core
            .set_residency(&company(), None, EntityType::Visitor, ResidencyMode::Platform)
            .await
            .unwrap();
        f.platform.set_available(false);
        let registration = f
            .core
            .register_visitor(&company(), None, new_visitor("Alice"))
            .await
            .unwrap();
        let op_id = match registration.delivery {
            Delivery::Queued { operation_id } => operation_id,
            other => panic!("expected queued write, got {other:?}"),
        };
        f.core
            .queue()
            .record_failure(&op_id, "rejected", false, Utc::now())
            .unwrap();

        let op = f.core.retry_sync_operation(&company(), &op_id).unwrap();
        assert_eq!(op.status, SyncStatus::Pending);
        assert_eq!(op.attempts, 0);

        let err = f
            .core
            .retry_sync_operation(&CompanyId::new("globex"), &op_id)
            .unwrap_err();
        assert!(matches!(err, VmsError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_sync_operations_filter_by_status() {
        let f = fixture();
        f.core
            .set_residency(&company(), None, EntityType::Visitor, ResidencyMode::Platform)
            .await
            .unwrap();
        f.platform.set_available(false);
        f.core
            .register_visitor(&company(), None, new_visitor("Alice"))
            .await
            .unwrap();

        let pending = f
            .core
            .sync_operations(&company(), Some(SyncStatus::Pending), None)
            .unwrap();
        assert_eq!(pending.len(), 1);
        let failed = f
            .core
            .sync_operations(&company(), Some(SyncStatus::Failed), None)
            .unwrap();
        assert!(failed.is_empty());
    }
}
