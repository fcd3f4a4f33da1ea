//! In-Memory Repository Implementations
//!
//! The local database kept in process memory. Every collection is
//! partitioned by company so one tenant never sees another's records.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use shared::CompanyId;
use vms_domain::model::installation::Installation;
use vms_domain::repository::{Document, InstallationRepository, Repository, RepositoryError};
use vms_domain::LocalStore;

type Partitions<T> = HashMap<CompanyId, HashMap<String, T>>;

fn read_lock<T>(lock: &RwLock<T>) -> Result<RwLockReadGuard<'_, T>, RepositoryError> {
    lock.read().map_err(|_| RepositoryError::PersistenceError {
        message: "Failed to acquire read lock".to_string(),
    })
}

fn write_lock<T>(lock: &RwLock<T>) -> Result<RwLockWriteGuard<'_, T>, RepositoryError> {
    lock.write().map_err(|_| RepositoryError::PersistenceError {
        message: "Failed to acquire write lock".to_string(),
    })
}

/// In-memory collection of one record type
///
/// Thread-safe implementation using RwLock. Clones share the same data.
#[derive(Debug)]
pub struct InMemoryRepository<T> {
    docs: Arc<RwLock<Partitions<T>>>,
}

impl<T> InMemoryRepository<T> {
    pub fn new() -> Self {
        Self {
            docs: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl<T> Default for InMemoryRepository<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for InMemoryRepository<T> {
    fn clone(&self) -> Self {
        Self {
            docs: Arc::clone(&self.docs),
        }
    }
}

impl<T: Document> Repository<T> for InMemoryRepository<T> {
    fn save(&self, doc: &T) -> Result<(), RepositoryError> {
        let mut docs = write_lock(&self.docs)?;
        docs.entry(doc.company_id().clone())
            .or_default()
            .insert(doc.id().to_string(), doc.clone());
        Ok(())
    }

    fn find_by_id(&self, company: &CompanyId, id: &str) -> Result<Option<T>, RepositoryError> {
        let docs = read_lock(&self.docs)?;
        Ok(docs.get(company).and_then(|p| p.get(id)).cloned())
    }

    fn list(&self, company: &CompanyId) -> Result<Vec<T>, RepositoryError> {
        let docs = read_lock(&self.docs)?;
        Ok(docs
            .get(company)
            .map(|p| p.values().cloned().collect())
            .unwrap_or_default())
    }

    fn delete(&self, company: &CompanyId, id: &str) -> Result<bool, RepositoryError> {
        let mut docs = write_lock(&self.docs)?;
        Ok(docs.get_mut(company).and_then(|p| p.remove(id)).is_some())
    }

    fn count(&self, company: &CompanyId) -> Result<usize, RepositoryError> {
        let docs = read_lock(&self.docs)?;
        Ok(docs.get(company).map_or(0, HashMap::len))
    }

    fn find_where(&self, company: &CompanyId, predicate: &dyn Fn(&T) -> bool) -> Result<Vec<T>, RepositoryError> {
        let docs = read_lock(&self.docs)?;
        Ok(docs
            .get(company)
            .map(|p| p.values().filter(|d| predicate(d)).cloned().collect())
            .unwrap_or_default())
    }
}

/// In-memory installation records
#[derive(Debug, Clone, Default)]
pub struct InMemoryInstallationRepository {
    installations: Arc<RwLock<HashMap<CompanyId, Installation>>>,
}

impl InMemoryInstallationRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl InstallationRepository for InMemoryInstallationRepository {
    fn get(&self, company: &CompanyId) -> Result<Option<Installation>, RepositoryError> {
        let installations = read_lock(&self.installations)?;
        Ok(installations.get(company).cloned())
    }

    fn save(&self, installation: &Installation) -> Result<(), RepositoryError> {
        let mut installations = write_lock(&self.installations)?;
        installations.insert(installation.company_id.clone(), installation.clone());
        Ok(())
    }
}

/// A complete, empty local database
pub fn in_memory_store() -> LocalStore {
    LocalStore {
        employees: Arc::new(InMemoryRepository::new()),
        visitors: Arc::new(InMemoryRepository::new()),
        locations: Arc::new(InMemoryRepository::new()),
        visits: Arc::new(InMemoryRepository::new()),
        approvals: Arc::new(InMemoryRepository::new()),
        watchlist: Arc::new(InMemoryRepository::new()),
        evacuations: Arc::new(InMemoryRepository::new()),
        installations: Arc::new(InMemoryInstallationRepository::new()),
    }
}
