//! DataProvider - One read/write facade over local data and the Platform
//!
//! Every call first asks the `ResidencyDetector` where the entity lives.
//!
//! - `app`: the local repositories are the source of truth
//! - `platform`: the Platform is, and the local database keeps shadows of
//!   records written by this app until the Platform has them
//!
//! A retryable Platform failure on a read serves local data with a warning.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::Utc;
use platform::{Actor, ActorPayload, EmbeddingJob, PlatformClient, PlatformError};
use serde::{Deserialize, Serialize};
use shared::{meta, CompanyId, EntityType, Logger, ResidencyMode, Result, VmsError};
use vms_domain::{
    Document, Employee, EmployeeUpdate, LocalStore, Location, NewEmployee, NewLocation, NewVisitor, Repository,
    SyncState, Visitor, VisitorUpdate,
};

use crate::actor_mapping::ActorMapper;
use crate::platform_wrapper::{PlatformClientWrapper, WriteResult};
use crate::residency::ResidencyDetector;

/// Where a write ended up
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Delivery {
    /// Saved in the local database only
    Local,
    /// Accepted by the Platform
    Synced,
    /// Waiting in the sync queue
    #[serde(rename_all = "camelCase")]
    Queued { operation_id: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WriteOutcome<T> {
    pub record: T,
    pub delivery: Delivery,
}

impl<T> WriteOutcome<T> {
    fn new(record: T, delivery: Delivery) -> Self {
        Self { record, delivery }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmployeeFilter {
    pub active: Option<bool>,
    pub department: Option<String>,
    pub location_id: Option<String>,
    /// Case-insensitive match on name, email or employee code
    pub search: Option<String>,
}

impl EmployeeFilter {
    pub fn matches(&self, employee: &Employee) -> bool {
        if self.active.is_some_and(|active| employee.active != active) {
            return false;
        }
        if let Some(department) = &self.department {
            if !employee
                .department
                .as_deref()
                .is_some_and(|d| d.eq_ignore_ascii_case(department))
            {
                return false;
            }
        }
        if self.location_id.is_some() && employee.location_id != self.location_id {
            return false;
        }
        match &self.search {
            Some(term) => contains_any(term, [Some(&employee.name), employee.email.as_ref(), employee.employee_code.as_ref()]),
            None => true,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisitorFilter {
    /// Case-insensitive match on name, email or organization
    pub search: Option<String>,
    #[serde(default)]
    pub include_erased: bool,
}

impl VisitorFilter {
    pub fn matches(&self, visitor: &Visitor) -> bool {
        if visitor.is_erased() && !self.include_erased {
            return false;
        }
        match &self.search {
            Some(term) => contains_any(term, [Some(&visitor.name), visitor.email.as_ref(), visitor.organization.as_ref()]),
            None => true,
        }
    }
}

fn contains_any<const N: usize>(term: &str, fields: [Option<&String>; N]) -> bool {
    let term = term.trim().to_lowercase();
    term.is_empty() || fields.iter().flatten().any(|f| f.to_lowercase().contains(&term))
}

// ============================================================================
// Federated records
// ============================================================================

/// A local record that can mirror a Platform actor
trait Federated: Document + Sized {
    const ENTITY: EntityType;

    fn repo(store: &LocalStore) -> &Arc<dyn Repository<Self>>;
    fn from_actor(actor: &Actor, company: &CompanyId, mapper: &ActorMapper) -> Option<Self>;
    fn to_payload(&self, mapper: &ActorMapper) -> ActorPayload;

    fn name(&self) -> &str;
    fn platform_id(&self) -> Option<&str>;
    fn set_platform_id(&mut self, platform_id: Option<String>);
    fn sync_state(&self) -> SyncState;
    fn set_sync_state(&mut self, state: SyncState);
    fn set_id(&mut self, id: String);

    fn is_erased(&self) -> bool {
        false
    }
}

impl Federated for Employee {
    const ENTITY: EntityType = EntityType::Employee;

    fn repo(store: &LocalStore) -> &Arc<dyn Repository<Self>> {
        &store.employees
    }

    fn from_actor(actor: &Actor, company: &CompanyId, mapper: &ActorMapper) -> Option<Self> {
        mapper.actor_to_employee(actor, company)
    }

    fn to_payload(&self, mapper: &ActorMapper) -> ActorPayload {
        mapper.employee_to_payload(self)
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn platform_id(&self) -> Option<&str> {
        self.platform_id.as_deref()
    }

    fn set_platform_id(&mut self, platform_id: Option<String>) {
        self.platform_id = platform_id;
    }

    fn sync_state(&self) -> SyncState {
        self.sync_state
    }

    fn set_sync_state(&mut self, state: SyncState) {
        self.sync_state = state;
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }
}

impl Federated for Visitor {
    const ENTITY: EntityType = EntityType::Visitor;

    fn repo(store: &LocalStore) -> &Arc<dyn Repository<Self>> {
        &store.visitors
    }

    fn from_actor(actor: &Actor, company: &CompanyId, mapper: &ActorMapper) -> Option<Self> {
        mapper.actor_to_visitor(actor, company)
    }

    fn to_payload(&self, mapper: &ActorMapper) -> ActorPayload {
        mapper.visitor_to_payload(self)
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn platform_id(&self) -> Option<&str> {
        self.platform_id.as_deref()
    }

    fn set_platform_id(&mut self, platform_id: Option<String>) {
        self.platform_id = platform_id;
    }

    fn sync_state(&self) -> SyncState {
        self.sync_state
    }

    fn set_sync_state(&mut self, state: SyncState) {
        self.sync_state = state;
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn is_erased(&self) -> bool {
        Visitor::is_erased(self)
    }
}

/// Local record by local id or Platform id
fn find_by_ref<T: Federated>(repo: &dyn Repository<T>, company: &CompanyId, id: &str) -> Result<Option<T>> {
    if let Some(found) = repo.find_by_id(company, id)? {
        return Ok(Some(found));
    }
    Ok(repo
        .find_where(company, &|r: &T| r.platform_id() == Some(id))?
        .into_iter()
        .next())
}

/// The shadow wins while it holds unsent or erased data; otherwise the
/// Platform copy is served under the shadow's id. Shadows the Platform has
/// never seen are appended.
fn overlay<T: Federated>(remote: Vec<T>, shadows: Vec<T>) -> Vec<T> {
    let mut unsent = Vec::new();
    let mut by_platform_id: HashMap<String, T> = HashMap::new();
    for shadow in shadows {
        match shadow.platform_id().map(str::to_string) {
            Some(platform_id) => {
                by_platform_id.insert(platform_id, shadow);
            }
            None if shadow.sync_state() == SyncState::Pending => unsent.push(shadow),
            None => {}
        }
    }

    let mut records: Vec<T> = remote
        .into_iter()
        .map(|mut record| match by_platform_id.remove(record.id()) {
            Some(shadow) if shadow.sync_state() == SyncState::Pending || shadow.is_erased() => shadow,
            Some(shadow) => {
                record.set_id(shadow.id().to_string());
                record
            }
            None => record,
        })
        .collect();
    records.extend(unsent);
    records
}

// ============================================================================
// DataProvider
// ============================================================================

pub struct DataProvider {
    store: LocalStore,
    residency: Arc<ResidencyDetector>,
    mapper: Arc<ActorMapper>,
    platform: Option<Arc<dyn PlatformClient>>,
    writer: Arc<PlatformClientWrapper>,
    logger: Arc<dyn Logger>,
}

impl DataProvider {
    /// Create a new DataProvider
    pub fn new(
        store: LocalStore,
        residency: Arc<ResidencyDetector>,
        mapper: Arc<ActorMapper>,
        platform: Option<Arc<dyn PlatformClient>>,
        writer: Arc<PlatformClientWrapper>,
        logger: Arc<dyn Logger>,
    ) -> Self {
        Self {
            store,
            residency,
            mapper,
            platform,
            writer,
            logger,
        }
    }

    pub fn residency(&self) -> &Arc<ResidencyDetector> {
        &self.residency
    }

    pub fn mapper(&self) -> &Arc<ActorMapper> {
        &self.mapper
    }

    pub fn writer(&self) -> &Arc<PlatformClientWrapper> {
        &self.writer
    }

    fn client(&self) -> std::result::Result<&Arc<dyn PlatformClient>, PlatformError> {
        self.platform.as_ref().ok_or(PlatformError::NotConfigured)
    }

    fn serve_local(&self, company: &CompanyId, entity: EntityType, error: &PlatformError) {
        self.logger.warn(
            &format!("Platform read failed, serving local data: {}", error),
            Some(&meta([("company", company.as_str()), ("entity", entity.as_str())])),
        );
    }

    // ========== Employees ==========

    pub async fn list_employees(&self, company: &CompanyId, filter: &EmployeeFilter) -> Result<Vec<Employee>> {
        let mut employees = self.list_records::<Employee>(company).await?;
        employees.retain(|e| filter.matches(e));
        Ok(employees)
    }

    pub async fn get_employee(&self, company: &CompanyId, id: &str) -> Result<Employee> {
        self.get_record(company, id).await
    }

    pub async fn create_employee(&self, company: &CompanyId, new: NewEmployee) -> Result<WriteOutcome<Employee>> {
        self.create_record(company, new.into_employee(company.clone(), Utc::now()))
            .await
    }

    pub async fn update_employee(
        &self,
        company: &CompanyId,
        id: &str,
        update: EmployeeUpdate,
    ) -> Result<WriteOutcome<Employee>> {
        let now = Utc::now();
        self.update_record(company, id, move |e: &mut Employee| e.apply(update, now))
            .await
    }

    // ========== Visitors ==========

    pub async fn list_visitors(&self, company: &CompanyId, filter: &VisitorFilter) -> Result<Vec<Visitor>> {
        let mut visitors = self.list_records::<Visitor>(company).await?;
        visitors.retain(|v| filter.matches(v));
        Ok(visitors)
    }

    pub async fn get_visitor(&self, company: &CompanyId, id: &str) -> Result<Visitor> {
        self.get_record(company, id).await
    }

    pub async fn create_visitor(&self, company: &CompanyId, new: NewVisitor) -> Result<WriteOutcome<Visitor>> {
        self.create_record(company, new.into_visitor(company.clone(), Utc::now()))
            .await
    }

    pub async fn update_visitor(
        &self,
        company: &CompanyId,
        id: &str,
        update: VisitorUpdate,
    ) -> Result<WriteOutcome<Visitor>> {
        let now = Utc::now();
        self.update_record(company, id, move |v: &mut Visitor| v.apply(update, now))
            .await
    }

    /// Remove a visitor everywhere
    pub async fn delete_visitor(&self, company: &CompanyId, id: &str) -> Result<WriteOutcome<Visitor>> {
        let visitor = self.get_visitor(company, id).await?;
        let delivery = self.remove_actor(company, &visitor).await?;
        self.store.visitors.delete(company, &visitor.id)?;
        Ok(WriteOutcome::new(visitor, delivery))
    }

    /// Anonymize a visitor, keeping the record so visit history stays intact
    ///
    /// A mirrored Platform actor is deleted.
    pub async fn erase_visitor(&self, company: &CompanyId, id: &str) -> Result<WriteOutcome<Visitor>> {
        let mut visitor = self.get_visitor(company, id).await?;
        if visitor.is_erased() {
            return Err(VmsError::Conflict(format!("visitor {} is already erased", visitor.id)));
        }
        let delivery = self.remove_actor(company, &visitor).await?;
        visitor.anonymize(Utc::now());
        if delivery != Delivery::Local || visitor.sync_state != SyncState::Local {
            // nothing about this record is left to send
            visitor.sync_state = SyncState::Synced;
        }
        self.store.visitors.save(&visitor)?;
        Ok(WriteOutcome::new(visitor, delivery))
    }

    /// Ask the Platform to build a face embedding for a mirrored visitor
    pub async fn request_embedding(
        &self,
        company: &CompanyId,
        visitor_id: &str,
        image_ref: &str,
    ) -> Result<WriteResult<EmbeddingJob>> {
        let visitor = self.get_visitor(company, visitor_id).await?;
        let actor_id = visitor
            .platform_id
            .as_deref()
            .ok_or_else(|| VmsError::Conflict(format!("visitor {} is not on the Platform yet", visitor.id)))?;
        self.writer.request_embedding(company, actor_id, image_ref).await
    }

    /// Delete the mirrored actor, whatever the current residency mode
    async fn remove_actor(&self, company: &CompanyId, visitor: &Visitor) -> Result<Delivery> {
        match &visitor.platform_id {
            Some(_) if self.platform.is_none() => {
                self.logger.warn(
                    "Visitor has a Platform actor but no Platform is configured",
                    Some(&meta([("company", company.as_str()), ("visitor", visitor.id.as_str())])),
                );
                Ok(Delivery::Local)
            }
            Some(actor_id) => {
                let result = self
                    .writer
                    .delete_actor(company, EntityType::Visitor, actor_id, Some(visitor.id.as_str()))
                    .await?;
                Ok(match result {
                    WriteResult::Delivered(()) => Delivery::Synced,
                    WriteResult::Queued { operation_id } => Delivery::Queued { operation_id },
                })
            }
            None => {
                self.writer.queue().cancel_pending_for(company, &visitor.id)?;
                Ok(Delivery::Local)
            }
        }
    }

    // ========== Locations ==========

    pub async fn list_locations(&self, company: &CompanyId) -> Result<Vec<Location>> {
        let mut locations = match self.residency.mode(company, EntityType::Location).await? {
            ResidencyMode::App => self.store.locations.list(company)?,
            ResidencyMode::Platform => match self.remote_locations(company).await {
                Ok(locations) => locations,
                Err(e) if e.is_retryable() => {
                    self.serve_local(company, EntityType::Location, &e);
                    self.store.locations.list(company)?
                }
                Err(e) => return Err(e.into()),
            },
        };
        locations.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(locations)
    }

    pub async fn get_location(&self, company: &CompanyId, id: &str) -> Result<Location> {
        let local = self.store.locations.find_by_id(company, id)?;
        if self.residency.mode(company, EntityType::Location).await? == ResidencyMode::App {
            return local.ok_or_else(|| VmsError::not_found("location", id));
        }

        let result = match self.client() {
            Ok(platform) => platform.get_entity(company, id).await,
            Err(e) => Err(e),
        };
        match result {
            Ok(Some(entity)) => self
                .mapper
                .entity_to_location(&entity, company)
                .ok_or_else(|| VmsError::not_found("location", id)),
            Ok(None) => Err(VmsError::not_found("location", id)),
            Err(e) if e.is_retryable() => {
                self.serve_local(company, EntityType::Location, &e);
                local.ok_or_else(|| e.into())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Locations owned by the Platform are read-only here
    pub async fn create_location(&self, company: &CompanyId, new: NewLocation) -> Result<WriteOutcome<Location>> {
        if self.residency.mode(company, EntityType::Location).await? == ResidencyMode::Platform {
            return Err(VmsError::Forbidden(
                "locations are managed on the Platform for this company".to_string(),
            ));
        }
        let location = new.into_location(company.clone(), Utc::now());
        self.store.locations.save(&location)?;
        Ok(WriteOutcome::new(location, Delivery::Local))
    }

    async fn remote_locations(&self, company: &CompanyId) -> std::result::Result<Vec<Location>, PlatformError> {
        let entities = self.client()?.list_entities(company).await?;
        Ok(entities
            .iter()
            .filter_map(|entity| self.mapper.entity_to_location(entity, company))
            .collect())
    }

    // ========== Shared read/write paths ==========

    async fn list_records<T: Federated>(&self, company: &CompanyId) -> Result<Vec<T>> {
        let repo = T::repo(&self.store);
        let mut records = match self.residency.mode(company, T::ENTITY).await? {
            ResidencyMode::App => repo.list(company)?,
            ResidencyMode::Platform => {
                let shadows: Vec<T> = repo.find_where(company, &|r: &T| r.sync_state() != SyncState::Local)?;
                match self.remote_records::<T>(company).await {
                    Ok(remote) => overlay(remote, shadows),
                    Err(e) if e.is_retryable() => {
                        self.serve_local(company, T::ENTITY, &e);
                        shadows
                    }
                    Err(e) => return Err(e.into()),
                }
            }
        };
        records.sort_by(|a, b| a.name().cmp(b.name()));
        Ok(records)
    }

    /// Actors of every type mapped to `T`
    async fn remote_records<T: Federated>(&self, company: &CompanyId) -> std::result::Result<Vec<T>, PlatformError> {
        let platform = self.client()?;
        let mut seen = HashSet::new();
        let mut records = Vec::new();
        for actor_type in self.mapper.actor_types_for(T::ENTITY) {
            for actor in platform.list_actors(company, Some(&actor_type)).await? {
                if !seen.insert(actor.id.clone()) {
                    continue;
                }
                if let Some(record) = T::from_actor(&actor, company, &self.mapper) {
                    records.push(record);
                }
            }
        }
        Ok(records)
    }

    async fn get_record<T: Federated>(&self, company: &CompanyId, id: &str) -> Result<T> {
        let shadow = find_by_ref(T::repo(&self.store).as_ref(), company, id)?;
        if self.residency.mode(company, T::ENTITY).await? == ResidencyMode::App {
            return shadow.ok_or_else(|| VmsError::not_found(T::KIND, id));
        }

        if let Some(s) = &shadow {
            if s.platform_id().is_none() || s.sync_state() == SyncState::Pending || s.is_erased() {
                return Ok(s.clone());
            }
        }

        let actor_id = shadow.as_ref().and_then(|s| s.platform_id()).unwrap_or(id).to_string();
        let result = match self.client() {
            Ok(platform) => platform.get_actor(company, &actor_id).await,
            Err(e) => Err(e),
        };
        match result {
            Ok(Some(actor)) => {
                let mut record =
                    T::from_actor(&actor, company, &self.mapper).ok_or_else(|| VmsError::not_found(T::KIND, id))?;
                if let Some(s) = shadow {
                    record.set_id(s.id().to_string());
                }
                Ok(record)
            }
            Ok(None) => Err(VmsError::not_found(T::KIND, id)),
            Err(e) if e.is_retryable() => {
                self.serve_local(company, T::ENTITY, &e);
                shadow.ok_or_else(|| e.into())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn create_record<T: Federated>(&self, company: &CompanyId, mut record: T) -> Result<WriteOutcome<T>> {
        let repo = T::repo(&self.store);
        if self.residency.mode(company, T::ENTITY).await? == ResidencyMode::App {
            record.set_sync_state(SyncState::Local);
            repo.save(&record)?;
            return Ok(WriteOutcome::new(record, Delivery::Local));
        }

        record.set_sync_state(SyncState::Pending);
        repo.save(&record)?;
        let payload = record.to_payload(&self.mapper);
        let result = self.writer.create_actor(company, T::ENTITY, record.id(), &payload).await;
        match result {
            Ok(result) => self.settle(record, result),
            Err(e) => {
                // the Platform refused it, so it never existed
                repo.delete(company, record.id())?;
                Err(e)
            }
        }
    }

    async fn update_record<T: Federated>(
        &self,
        company: &CompanyId,
        id: &str,
        apply: impl FnOnce(&mut T),
    ) -> Result<WriteOutcome<T>> {
        let repo = T::repo(&self.store);
        if self.residency.mode(company, T::ENTITY).await? == ResidencyMode::App {
            let mut record = find_by_ref(repo.as_ref(), company, id)?.ok_or_else(|| VmsError::not_found(T::KIND, id))?;
            apply(&mut record);
            repo.save(&record)?;
            return Ok(WriteOutcome::new(record, Delivery::Local));
        }

        let before = find_by_ref(repo.as_ref(), company, id)?;
        let mut record: T = self.get_record(company, id).await?;
        apply(&mut record);
        record.set_sync_state(SyncState::Pending);
        repo.save(&record)?;

        let payload = record.to_payload(&self.mapper);
        let result = match record.platform_id().map(str::to_string) {
            Some(actor_id) => {
                self.writer
                    .update_actor(company, T::ENTITY, &actor_id, Some(record.id()), &payload)
                    .await
            }
            // never reached the Platform: folds into the waiting create
            None => self.writer.create_actor(company, T::ENTITY, record.id(), &payload).await,
        };
        match result {
            Ok(result) => self.settle(record, result),
            Err(e) => {
                match before {
                    Some(before) => repo.save(&before)?,
                    None => {
                        repo.delete(company, record.id())?;
                    }
                }
                Err(e)
            }
        }
    }

    fn settle<T: Federated>(&self, mut record: T, result: WriteResult<Actor>) -> Result<WriteOutcome<T>> {
        match result {
            WriteResult::Delivered(actor) => {
                record.set_platform_id(Some(actor.id));
                record.set_sync_state(SyncState::Synced);
                T::repo(&self.store).save(&record)?;
                Ok(WriteOutcome::new(record, Delivery::Synced))
            }
            WriteResult::Queued { operation_id } => Ok(WriteOutcome::new(record, Delivery::Queued { operation_id })),
        }
    }
}
