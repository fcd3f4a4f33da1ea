//! InMemoryPlatform - A Platform living inside the process
//!
//! Used for development runs without a Platform deployment and in tests.
//! It can be switched unavailable, can fail the next calls with chosen
//! errors, and counts every call it receives.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use shared::CompanyId;

use crate::client::{PlatformClient, PlatformResult};
use crate::error::PlatformError;
use crate::types::{Actor, ActorPayload, EmbeddingJob, PlatformEntity, ResidencyConfig};

#[derive(Debug, Default)]
struct State {
    actors: HashMap<CompanyId, Vec<Actor>>,
    entities: HashMap<CompanyId, Vec<PlatformEntity>>,
    residency: HashMap<CompanyId, ResidencyConfig>,
    embeddings: Vec<EmbeddingJob>,
    failures: VecDeque<PlatformError>,
}

/// Process-local Platform
#[derive(Debug)]
pub struct InMemoryPlatform {
    state: Mutex<State>,
    available: AtomicBool,
    calls: AtomicUsize,
}

impl Default for InMemoryPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryPlatform {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
            available: AtomicBool::new(true),
            calls: AtomicUsize::new(0),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        // A panic while holding the lock leaves plain data behind; keep serving it
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Count the call and fail it when unavailable or a failure is queued
    fn enter(&self) -> PlatformResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.available.load(Ordering::SeqCst) {
            return Err(PlatformError::Unavailable { status: 503 });
        }
        match self.lock().failures.pop_front() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    // ========== Test controls ==========

    /// Make every call fail with `Unavailable { 503 }` until switched back
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    /// Fail the next call with `err`; queued failures are consumed in order
    pub fn fail_next(&self, err: PlatformError) {
        self.lock().failures.push_back(err);
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn reset_calls(&self) {
        self.calls.store(0, Ordering::SeqCst);
    }

    // ========== Seeding and inspection ==========

    pub fn set_residency(&self, config: ResidencyConfig) {
        self.lock().residency.insert(config.company_id.clone(), config);
    }

    pub fn insert_actor(&self, actor: Actor) {
        self.lock().actors.entry(actor.company_id.clone()).or_default().push(actor);
    }

    pub fn insert_entity(&self, company: &CompanyId, entity: PlatformEntity) {
        self.lock().entities.entry(company.clone()).or_default().push(entity);
    }

    /// Snapshot of a company's actors, in creation order
    pub fn actors(&self, company: &CompanyId) -> Vec<Actor> {
        self.lock().actors.get(company).cloned().unwrap_or_default()
    }

    pub fn embeddings(&self) -> Vec<EmbeddingJob> {
        self.lock().embeddings.clone()
    }
}

#[async_trait]
impl PlatformClient for InMemoryPlatform {
    async fn residency_config(&self, company: &CompanyId) -> PlatformResult<Option<ResidencyConfig>> {
        self.enter()?;
        Ok(self.lock().residency.get(company).cloned())
    }

    async fn list_actors(&self, company: &CompanyId, actor_type: Option<&str>) -> PlatformResult<Vec<Actor>> {
        self.enter()?;
        Ok(self
            .actors(company)
            .into_iter()
            .filter(|a| actor_type.map_or(true, |t| a.is_type(t)))
            .collect())
    }

    async fn get_actor(&self, company: &CompanyId, id: &str) -> PlatformResult<Option<Actor>> {
        self.enter()?;
        Ok(self.actors(company).into_iter().find(|a| a.id == id))
    }

    async fn create_actor(&self, company: &CompanyId, payload: &ActorPayload) -> PlatformResult<Actor> {
        self.enter()?;
        let actor = Actor {
            id: format!("act-{}", uuid::Uuid::new_v4()),
            actor_type: payload.actor_type.clone(),
            company_id: company.clone(),
            attributes: payload.attributes.clone(),
            status: Some("active".to_string()),
            updated_at: Some(Utc::now()),
        };
        self.insert_actor(actor.clone());
        Ok(actor)
    }

    async fn update_actor(&self, company: &CompanyId, id: &str, payload: &ActorPayload) -> PlatformResult<Actor> {
        self.enter()?;
        let mut state = self.lock();
        let actor = state
            .actors
            .get_mut(company)
            .and_then(|actors| actors.iter_mut().find(|a| a.id == id))
            .ok_or(PlatformError::NotFound)?;
        for (key, value) in &payload.attributes {
            actor.attributes.insert(key.clone(), value.clone());
        }
        actor.updated_at = Some(Utc::now());
        Ok(actor.clone())
    }

    async fn delete_actor(&self, company: &CompanyId, id: &str) -> PlatformResult<()> {
        self.enter()?;
        let mut state = self.lock();
        let actors = state.actors.get_mut(company).ok_or(PlatformError::NotFound)?;
        let before = actors.len();
        actors.retain(|a| a.id != id);
        if actors.len() == before {
            return Err(PlatformError::NotFound);
        }
        Ok(())
    }

    async fn list_entities(&self, company: &CompanyId) -> PlatformResult<Vec<PlatformEntity>> {
        self.enter()?;
        Ok(self.lock().entities.get(company).cloned().unwrap_or_default())
    }

    async fn get_entity(&self, company: &CompanyId, id: &str) -> PlatformResult<Option<PlatformEntity>> {
        self.enter()?;
        Ok(self
            .lock()
            .entities
            .get(company)
            .and_then(|entities| entities.iter().find(|e| e.id == id).cloned()))
    }

    async fn request_embedding(
        &self,
        company: &CompanyId,
        actor_id: &str,
        _image_ref: &str,
    ) -> PlatformResult<EmbeddingJob> {
        self.enter()?;
        let mut state = self.lock();
        let exists = state
            .actors
            .get(company)
            .map_or(false, |actors| actors.iter().any(|a| a.id == actor_id));
        if !exists {
            return Err(PlatformError::NotFound);
        }
        let job = EmbeddingJob {
            job_id: format!("job-{}", uuid::Uuid::new_v4()),
            actor_id: actor_id.to_string(),
            status: "queued".to_string(),
        };
        state.embeddings.push(job.clone());
        Ok(job)
    }

    async fn health(&self) -> bool {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.is_available()
    }
}
