//! PlatformClientWrapper - Fault-tolerant write path to the Platform
//!
//! A write is sent directly unless an earlier write for the same target is
//! still queued, in which case it queues behind it. Retryable failures are
//! queued; permanent failures are returned to the caller.

use std::sync::Arc;

use chrono::Utc;
use platform::{Actor, ActorPayload, EmbeddingJob, PlatformClient, PlatformError};
use serde::Serialize;
use shared::{meta, CompanyId, EntityType, Logger, Result, VmsError};

use crate::sync_queue::{NewSyncOperation, SyncKind, SyncQueue};

/// What happened to a write
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum WriteResult<T> {
    Delivered(T),
    #[serde(rename_all = "camelCase")]
    Queued { operation_id: String },
}

impl<T> WriteResult<T> {
    pub fn is_delivered(&self) -> bool {
        matches!(self, WriteResult::Delivered(_))
    }

    pub fn operation_id(&self) -> Option<&str> {
        match self {
            WriteResult::Delivered(_) => None,
            WriteResult::Queued { operation_id } => Some(operation_id),
        }
    }
}

pub struct PlatformClientWrapper {
    platform: Option<Arc<dyn PlatformClient>>,
    queue: Arc<SyncQueue>,
    logger: Arc<dyn Logger>,
}

impl PlatformClientWrapper {
    /// Create a new PlatformClientWrapper
    pub fn new(platform: Option<Arc<dyn PlatformClient>>, queue: Arc<SyncQueue>, logger: Arc<dyn Logger>) -> Self {
        Self { platform, queue, logger }
    }

    pub fn queue(&self) -> &Arc<SyncQueue> {
        &self.queue
    }

    fn client(&self) -> Result<&Arc<dyn PlatformClient>> {
        self.platform
            .as_ref()
            .ok_or_else(|| VmsError::Platform("not configured".to_string()))
    }

    fn is_blocked(&self, company: &CompanyId, targets: &[Option<&str>]) -> Result<bool> {
        for target in targets.iter().flatten() {
            if self.queue.has_pending_for(company, target)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn enqueue<T>(&self, op: NewSyncOperation) -> Result<WriteResult<T>> {
        let company = op.company_id.clone();
        let kind = op.kind.as_str();
        let queued = self.queue.enqueue(op, Utc::now())?;
        self.logger.info(
            "Platform write queued",
            Some(&meta([
                ("company", company.as_str()),
                ("kind", kind),
                ("operation", queued.id.as_str()),
            ])),
        );
        Ok(WriteResult::Queued {
            operation_id: queued.id,
        })
    }

    /// Turn the direct call result into a delivery, a queued retry or an error
    fn settle<T>(&self, result: std::result::Result<T, PlatformError>, op: NewSyncOperation) -> Result<WriteResult<T>> {
        match result {
            Ok(value) => Ok(WriteResult::Delivered(value)),
            Err(e) if e.is_retryable() => {
                self.logger.warn(
                    &format!("Platform write failed, will retry: {}", e),
                    Some(&meta([("company", op.company_id.as_str()), ("kind", op.kind.as_str())])),
                );
                self.enqueue(op.with_error(e.to_string()))
            }
            Err(e) => {
                self.logger.error(
                    &format!("Platform rejected write: {}", e),
                    Some(&meta([("company", op.company_id.as_str()), ("kind", op.kind.as_str())])),
                );
                Err(e.into())
            }
        }
    }

    /// Create an actor for the local record `local_ref`
    pub async fn create_actor(
        &self,
        company: &CompanyId,
        entity: EntityType,
        local_ref: &str,
        payload: &ActorPayload,
    ) -> Result<WriteResult<Actor>> {
        let client = self.client()?;
        let op = NewSyncOperation::new(company.clone(), SyncKind::CreateActor { payload: payload.clone() })
            .for_entity(entity)
            .with_local_ref(local_ref);

        if self.is_blocked(company, &[Some(local_ref)])? {
            return self.enqueue(op);
        }
        let result = client.create_actor(company, payload).await;
        self.settle(result, op)
    }

    pub async fn update_actor(
        &self,
        company: &CompanyId,
        entity: EntityType,
        actor_id: &str,
        local_ref: Option<&str>,
        payload: &ActorPayload,
    ) -> Result<WriteResult<Actor>> {
        let client = self.client()?;
        let mut op = NewSyncOperation::new(
            company.clone(),
            SyncKind::UpdateActor {
                actor_id: actor_id.to_string(),
                payload: payload.clone(),
            },
        )
        .for_entity(entity);
        if let Some(local_ref) = local_ref {
            op = op.with_local_ref(local_ref);
        }

        if self.is_blocked(company, &[Some(actor_id), local_ref])? {
            return self.enqueue(op);
        }
        let result = client.update_actor(company, actor_id, payload).await;
        self.settle(result, op)
    }

    /// Delete an actor; an actor that is already gone counts as deleted
    pub async fn delete_actor(
        &self,
        company: &CompanyId,
        entity: EntityType,
        actor_id: &str,
        local_ref: Option<&str>,
    ) -> Result<WriteResult<()>> {
        let client = self.client()?;
        let mut op = NewSyncOperation::new(
            company.clone(),
            SyncKind::DeleteActor {
                actor_id: actor_id.to_string(),
            },
        )
        .for_entity(entity);
        if let Some(local_ref) = local_ref {
            op = op.with_local_ref(local_ref);
        }

        if self.is_blocked(company, &[Some(actor_id), local_ref])? {
            return self.enqueue(op);
        }
        let result = match client.delete_actor(company, actor_id).await {
            Err(PlatformError::NotFound) => Ok(()),
            other => other,
        };
        self.settle(result, op)
    }

    pub async fn request_embedding(
        &self,
        company: &CompanyId,
        actor_id: &str,
        image_ref: &str,
    ) -> Result<WriteResult<EmbeddingJob>> {
        let client = self.client()?;
        let op = NewSyncOperation::new(
            company.clone(),
            SyncKind::RequestEmbedding {
                actor_id: actor_id.to_string(),
                image_ref: image_ref.to_string(),
            },
        )
        .for_entity(EntityType::Visitor);

        if self.is_blocked(company, &[Some(actor_id)])? {
            return self.enqueue(op);
        }
        let result = client.request_embedding(company, actor_id, image_ref).await;
        self.settle(result, op)
    }
}
