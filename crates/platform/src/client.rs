//! PlatformClient - The port every Platform implementation provides

use async_trait::async_trait;
use shared::CompanyId;

use crate::error::PlatformError;
use crate::types::{Actor, ActorPayload, EmbeddingJob, PlatformEntity, ResidencyConfig};

pub type PlatformResult<T> = std::result::Result<T, PlatformError>;

/// Operations the VMS needs from the Platform
#[async_trait]
pub trait PlatformClient: Send + Sync {
    /// Residency configured for this app, `None` when the Platform has none
    async fn residency_config(&self, company: &CompanyId) -> PlatformResult<Option<ResidencyConfig>>;

    /// Actors of a company, optionally filtered by type
    async fn list_actors(&self, company: &CompanyId, actor_type: Option<&str>) -> PlatformResult<Vec<Actor>>;

    async fn get_actor(&self, company: &CompanyId, id: &str) -> PlatformResult<Option<Actor>>;

    async fn create_actor(&self, company: &CompanyId, payload: &ActorPayload) -> PlatformResult<Actor>;

    /// Merge attributes into an existing actor
    async fn update_actor(&self, company: &CompanyId, id: &str, payload: &ActorPayload) -> PlatformResult<Actor>;

    async fn delete_actor(&self, company: &CompanyId, id: &str) -> PlatformResult<()>;

    async fn list_entities(&self, company: &CompanyId) -> PlatformResult<Vec<PlatformEntity>>;

    async fn get_entity(&self, company: &CompanyId, id: &str) -> PlatformResult<Option<PlatformEntity>>;

    /// Ask the Platform to compute a face embedding for an actor
    async fn request_embedding(&self, company: &CompanyId, actor_id: &str, image_ref: &str)
        -> PlatformResult<EmbeddingJob>;

    async fn health(&self) -> bool;
}
