//! SyncProcessor - Background worker replaying queued Platform writes
//!
//! Each pass takes a batch of due operations. Once an operation for a target
//! is rescheduled or failed, later operations for that target wait for the
//! next pass so the Platform sees writes per target in creation order.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use platform::{PlatformClient, PlatformError};
use serde::Serialize;
use shared::{meta, EntityType, Logger, Result, SyncConfig, VmsError};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use vms_domain::{EmployeeQueries, LocalStore, SyncState, VisitorQueries};

use crate::sync_queue::{SyncKind, SyncOperation, SyncQueue, SyncStatus};

/// Longest accepted staleness window (one year)
const MAX_STALE_SECS: u64 = 365 * 24 * 3600;

/// Outcome of one pass over the queue
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessReport {
    pub attempted: usize,
    pub succeeded: usize,
    pub rescheduled: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl ProcessReport {
    pub fn merge(&mut self, other: ProcessReport) {
        self.attempted += other.attempted;
        self.succeeded += other.succeeded;
        self.rescheduled += other.rescheduled;
        self.failed += other.failed;
        self.skipped += other.skipped;
    }

    pub fn is_idle(&self) -> bool {
        self.attempted == 0
    }
}

pub struct SyncProcessor {
    queue: Arc<SyncQueue>,
    platform: Option<Arc<dyn PlatformClient>>,
    store: LocalStore,
    config: SyncConfig,
    logger: Arc<dyn Logger>,
}

impl SyncProcessor {
    /// Create a new SyncProcessor
    pub fn new(
        queue: Arc<SyncQueue>,
        platform: Option<Arc<dyn PlatformClient>>,
        store: LocalStore,
        config: SyncConfig,
        logger: Arc<dyn Logger>,
    ) -> Self {
        Self {
            queue,
            platform,
            store,
            config,
            logger,
        }
    }

    pub fn queue(&self) -> &Arc<SyncQueue> {
        &self.queue
    }

    /// Process one batch of due operations
    pub async fn run_once(&self, now: DateTime<Utc>) -> Result<ProcessReport> {
        let mut report = ProcessReport::default();
        let Some(platform) = &self.platform else {
            return Ok(report);
        };

        let mut held: HashSet<String> = HashSet::new();
        for op in self.queue.due(now, self.config.batch_size)? {
            let target = op.target().map(str::to_string);
            if target.as_ref().is_some_and(|t| held.contains(t)) || self.queue.has_earlier_active(&op)? {
                report.skipped += 1;
                held.extend(target);
                continue;
            }

            let op = match self.queue.claim(&op.id, now) {
                Ok(op) => op,
                // changed underneath us (cancelled or claimed elsewhere)
                Err(VmsError::NotFound(_)) | Err(VmsError::InvalidTransition(_)) => {
                    report.skipped += 1;
                    continue;
                }
                Err(e) => return Err(e),
            };
            report.attempted += 1;

            let op = self.resolve_create(op)?;
            match execute(platform.as_ref(), &op).await {
                Ok(actor_id) => {
                    self.queue.complete(&op.id, now)?;
                    self.reconcile(&op, actor_id.as_deref());
                    report.succeeded += 1;
                    self.logger.debug(
                        "Queued write delivered",
                        Some(&meta([("operation", op.id.as_str()), ("kind", op.kind.as_str())])),
                    );
                }
                Err(e) => {
                    let after = self.queue.record_failure(&op.id, &e.to_string(), e.is_retryable(), now)?;
                    if after.status == SyncStatus::Failed {
                        report.failed += 1;
                        self.logger.error(
                            &format!("Queued write failed permanently: {}", e),
                            Some(&meta([
                                ("operation", op.id.as_str()),
                                ("kind", op.kind.as_str()),
                                ("company", op.company_id.as_str()),
                            ])),
                        );
                    } else {
                        report.rescheduled += 1;
                        self.logger.warn(
                            &format!("Queued write rescheduled: {}", e),
                            Some(&meta([
                                ("operation", op.id.as_str()),
                                ("attempts", after.attempts.to_string().as_str()),
                            ])),
                        );
                    }
                    held.extend(target);
                }
            }
        }
        Ok(report)
    }

    /// Run passes until nothing due is left
    pub async fn drain(&self, now: DateTime<Utc>) -> Result<ProcessReport> {
        let mut total = ProcessReport::default();
        loop {
            let report = self.run_once(now).await?;
            total.merge(report);
            if report.is_idle() {
                return Ok(total);
            }
        }
    }

    /// Poll the queue until `shutdown` turns true
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let interval = std::time::Duration::from_secs(self.config.poll_interval_secs.max(1));
        self.logger.info("Sync processor started", None);

        loop {
            if *shutdown.borrow() {
                break;
            }

            match self.run_once(Utc::now()).await {
                Ok(report) if !report.is_idle() => self.logger.info(
                    &format!(
                        "Sync pass: {} delivered, {} rescheduled, {} failed",
                        report.succeeded, report.rescheduled, report.failed
                    ),
                    None,
                ),
                Ok(_) => {}
                Err(e) => self.logger.error(&format!("Sync pass failed: {}", e), None),
            }

            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                _ = shutdown.changed() => break,
            }
        }

        self.logger.info("Sync processor stopped", None);
    }

    /// Recover abandoned operations, then run on the tokio runtime
    pub fn spawn(self: Arc<Self>, shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        let now = Utc::now();
        let stale_before = now - chrono::Duration::seconds(self.config.stale_after_secs.min(MAX_STALE_SECS) as i64);
        match self.queue.recover_stale(stale_before, now) {
            Ok(0) => {}
            Ok(n) => self.logger.warn(&format!("Recovered {} abandoned sync operations", n), None),
            Err(e) => self.logger.error(&format!("Could not recover sync operations: {}", e), None),
        }
        tokio::spawn(async move { self.run(shutdown).await })
    }

    /// A create that waited behind an earlier create for the same record
    /// becomes an update once the record has its actor
    fn resolve_create(&self, mut op: SyncOperation) -> Result<SyncOperation> {
        let (SyncKind::CreateActor { payload }, Some(local_ref)) = (&op.kind, op.local_ref.as_deref()) else {
            return Ok(op);
        };
        let existing = match op.entity_type {
            Some(EntityType::Employee) => self
                .store
                .employees
                .find_employee_by_ref(&op.company_id, local_ref)?
                .and_then(|e| e.platform_id),
            Some(EntityType::Visitor) => self
                .store
                .visitors
                .find_visitor_by_ref(&op.company_id, local_ref)?
                .and_then(|v| v.platform_id),
            _ => None,
        };
        if let Some(actor_id) = existing {
            let payload = payload.clone();
            self.logger.debug(
                "Queued create resolved to an update",
                Some(&meta([("operation", op.id.as_str()), ("actorId", actor_id.as_str())])),
            );
            op.kind = SyncKind::UpdateActor { actor_id, payload };
        }
        Ok(op)
    }

    /// Mark the local shadow of a delivered write as synced
    fn reconcile(&self, op: &SyncOperation, actor_id: Option<&str>) {
        let (Some(local_ref), Some(actor_id)) = (op.local_ref.as_deref(), actor_id) else {
            return;
        };
        let result = match op.entity_type {
            Some(EntityType::Employee) => self.reconcile_employee(op, local_ref, actor_id),
            Some(EntityType::Visitor) => self.reconcile_visitor(op, local_ref, actor_id),
            _ => Ok(()),
        };
        if let Err(e) = result {
            self.logger.warn(
                &format!("Could not update local shadow: {}", e),
                Some(&meta([("localRef", local_ref), ("actorId", actor_id)])),
            );
        }
    }

    fn reconcile_employee(&self, op: &SyncOperation, local_ref: &str, actor_id: &str) -> Result<()> {
        if let Some(mut employee) = self.store.employees.find_employee_by_ref(&op.company_id, local_ref)? {
            employee.platform_id = Some(actor_id.to_string());
            employee.sync_state = SyncState::Synced;
            self.store.employees.save(&employee)?;
        }
        Ok(())
    }

    fn reconcile_visitor(&self, op: &SyncOperation, local_ref: &str, actor_id: &str) -> Result<()> {
        if let Some(mut visitor) = self.store.visitors.find_visitor_by_ref(&op.company_id, local_ref)? {
            visitor.platform_id = Some(actor_id.to_string());
            visitor.sync_state = SyncState::Synced;
            self.store.visitors.save(&visitor)?;
        }
        Ok(())
    }
}

/// Replay one operation; returns the actor id for creates and updates
async fn execute(platform: &dyn PlatformClient, op: &SyncOperation) -> std::result::Result<Option<String>, PlatformError> {
    let company = &op.company_id;
    match &op.kind {
        SyncKind::CreateActor { payload } => Ok(Some(platform.create_actor(company, payload).await?.id)),
        SyncKind::UpdateActor { actor_id, payload } => {
            Ok(Some(platform.update_actor(company, actor_id, payload).await?.id))
        }
        SyncKind::DeleteActor { actor_id } => match platform.delete_actor(company, actor_id).await {
            Ok(()) | Err(PlatformError::NotFound) => Ok(None),
            Err(e) => Err(e),
        },
        SyncKind::RequestEmbedding { actor_id, image_ref } => {
            platform.request_embedding(company, actor_id, image_ref).await?;
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync_queue::NewSyncOperation;
    use chrono::Duration;
    use platform::{ActorPayload, InMemoryPlatform};
    use shared::{CompanyId, NullLogger};
    use vms_adapter::in_memory_store;
    use vms_domain::{Repository, Visitor};

    fn company() -> CompanyId {
        CompanyId::new("acme")
    }

    fn processor(platform: Option<Arc<InMemoryPlatform>>, store: LocalStore) -> SyncProcessor {
        SyncProcessor::new(
            Arc::new(SyncQueue::in_memory()),
            platform.map(|p| p as Arc<dyn PlatformClient>),
            store,
            SyncConfig::default(),
            Arc::new(NullLogger),
        )
    }

    fn update(actor_id: &str) -> NewSyncOperation {
        NewSyncOperation::new(
            company(),
            SyncKind::UpdateActor {
                actor_id: actor_id.to_string(),
                payload: ActorPayload::new("visitor").with_attr("name", "B"),
            },
        )
    }

    fn embedding(actor_id: &str) -> NewSyncOperation {
        NewSyncOperation::new(
            company(),
            SyncKind::RequestEmbedding {
                actor_id: actor_id.to_string(),
                image_ref: "img://face".to_string(),
            },
        )
    }

    #[tokio::test]
    async fn test_without_platform_does_nothing() {
        let processor = processor(None, in_memory_store());
        let now = Utc::now();
        processor.queue().enqueue(update("act-1"), now).unwrap();

        let report = processor.run_once(now + Duration::hours(1)).await.unwrap();
        assert_eq!(report, ProcessReport::default());
        assert_eq!(processor.queue().stats(None).unwrap().pending, 1);
    }

    #[tokio::test]
    async fn test_create_reconciles_shadow() {
        let platform = Arc::new(InMemoryPlatform::new());
        let store = in_memory_store();
        let mut shadow = Visitor::new(company(), "Alice", Utc::now());
        shadow.sync_state = SyncState::Pending;
        store.visitors.save(&shadow).unwrap();

        let processor = processor(Some(platform.clone()), store.clone());
        let now = Utc::now();
        let op = NewSyncOperation::new(
            company(),
            SyncKind::CreateActor {
                payload: ActorPayload::new("visitor").with_attr("name", "Alice"),
            },
        )
        .for_entity(EntityType::Visitor)
        .with_local_ref(&shadow.id);
        processor.queue().enqueue(op, now).unwrap();

        let report = processor.run_once(now + Duration::minutes(1)).await.unwrap();
        assert_eq!(report.succeeded, 1);

        let actor = &platform.actors(&company())[0];
        let synced = store.visitors.find_by_id(&company(), &shadow.id).unwrap().unwrap();
        assert_eq!(synced.platform_id.as_deref(), Some(actor.id.as_str()));
        assert_eq!(synced.sync_state, SyncState::Synced);
    }

    #[tokio::test]
    async fn test_create_queued_during_inflight_create_becomes_update() {
        use crate::platform_wrapper::{PlatformClientWrapper, WriteResult};

        let platform = Arc::new(InMemoryPlatform::new());
        let store = in_memory_store();
        let mut shadow = Visitor::new(company(), "Alice", Utc::now());
        shadow.sync_state = SyncState::Pending;
        store.visitors.save(&shadow).unwrap();

        let processor = processor(Some(platform.clone()), store.clone());
        let writer = PlatformClientWrapper::new(
            Some(platform.clone() as Arc<dyn PlatformClient>),
            processor.queue().clone(),
            Arc::new(NullLogger),
        );
        let first_payload = ActorPayload::new("visitor").with_attr("name", "Alice");
        let now = Utc::now();
        let first = processor
            .queue()
            .enqueue(
                NewSyncOperation::new(
                    company(),
                    SyncKind::CreateActor {
                        payload: first_payload.clone(),
                    },
                )
                .for_entity(EntityType::Visitor)
                .with_local_ref(&shadow.id),
                now,
            )
            .unwrap();
        let first = processor.queue().claim(&first.id, now).unwrap();

        // the record is edited while its create is on the wire
        let renamed = ActorPayload::new("visitor").with_attr("name", "Alicia");
        let second = writer
            .create_actor(&company(), EntityType::Visitor, &shadow.id, &renamed)
            .await
            .unwrap();
        assert!(matches!(second, WriteResult::Queued { .. }));
        assert_eq!(processor.queue().list(&Default::default()).unwrap().len(), 2);

        let actor = platform.create_actor(&company(), &first_payload).await.unwrap();
        processor.queue().complete(&first.id, now).unwrap();
        processor.reconcile(&first, Some(&actor.id));

        let report = processor.drain(now + Duration::minutes(5)).await.unwrap();
        assert_eq!(report.succeeded, 1);

        let actors = platform.actors(&company());
        assert_eq!(actors.len(), 1);
        assert_eq!(actors[0].attr_str("name"), Some("Alicia"));
        let synced = store.visitors.find_by_id(&company(), &shadow.id).unwrap().unwrap();
        assert_eq!(synced.platform_id.as_deref(), Some(actor.id.as_str()));
    }

    #[tokio::test]
    async fn test_failure_holds_later_writes_for_target() {
        let platform = Arc::new(InMemoryPlatform::new());
        let processor = processor(Some(platform.clone()), in_memory_store());
        let t0 = Utc::now();
        let first = processor.queue().enqueue(update("act-1"), t0).unwrap();
        processor
            .queue()
            .enqueue(embedding("act-1"), t0 + Duration::seconds(1))
            .unwrap();

        platform.fail_next(PlatformError::Timeout);
        let report = processor.run_once(t0 + Duration::seconds(60)).await.unwrap();
        assert_eq!(report.attempted, 1);
        assert_eq!(report.rescheduled, 1);
        assert_eq!(report.skipped, 1);

        // the update is not due yet, but the embedding still waits behind it
        let report = processor.run_once(t0 + Duration::seconds(90)).await.unwrap();
        assert_eq!(report.attempted, 0);
        assert_eq!(report.skipped, 1);

        let op = processor.queue().get(&first.id).unwrap().unwrap();
        assert_eq!(op.status, SyncStatus::Pending);
        assert_eq!(op.attempts, 1);
    }

    #[tokio::test]
    async fn test_permanent_failure() {
        let platform = Arc::new(InMemoryPlatform::new());
        let processor = processor(Some(platform), in_memory_store());
        let now = Utc::now();
        let op = processor.queue().enqueue(update("ghost"), now).unwrap();

        let report = processor.run_once(now + Duration::minutes(1)).await.unwrap();
        assert_eq!(report.failed, 1);
        assert_eq!(processor.queue().get(&op.id).unwrap().unwrap().status, SyncStatus::Failed);
    }

    #[tokio::test]
    async fn test_delete_of_missing_actor_succeeds() {
        let platform = Arc::new(InMemoryPlatform::new());
        let processor = processor(Some(platform), in_memory_store());
        let now = Utc::now();
        processor
            .queue()
            .enqueue(
                NewSyncOperation::new(company(), SyncKind::DeleteActor { actor_id: "gone".to_string() }),
                now,
            )
            .unwrap();

        let report = processor.drain(now + Duration::minutes(1)).await.unwrap();
        assert_eq!(report.succeeded, 1);
        assert_eq!(processor.queue().stats(None).unwrap().completed, 1);
    }

    #[tokio::test]
    async fn test_spawn_recovers_and_stops_on_shutdown() {
        let processor = Arc::new(SyncProcessor::new(
            Arc::new(SyncQueue::in_memory()),
            None,
            in_memory_store(),
            SyncConfig {
                poll_interval_secs: 1,
                ..Default::default()
            },
            Arc::new(NullLogger),
        ));
        let long_ago = Utc::now() - Duration::hours(1);
        let op = processor.queue().enqueue(update("act-1"), long_ago).unwrap();
        processor.queue().claim(&op.id, long_ago).unwrap();

        let (tx, rx) = watch::channel(false);
        let handle = processor.clone().spawn(rx);
        assert_eq!(processor.queue().get(&op.id).unwrap().unwrap().status, SyncStatus::Pending);

        tx.send(true).unwrap();
        tokio::time::timeout(std::time::Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
