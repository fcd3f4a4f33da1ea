//! LocalStore - The local VMS database as one handle

use std::sync::Arc;

use chrono::Utc;
use shared::{CompanyId, EntityType};

use super::{InstallationRepository, Repository, RepositoryError};
use crate::model::approval::Approval;
use crate::model::employee::Employee;
use crate::model::evacuation::Evacuation;
use crate::model::installation::Installation;
use crate::model::location::Location;
use crate::model::visit::Visit;
use crate::model::visitor::Visitor;
use crate::model::watchlist::WatchlistEntry;
use crate::model::SyncState;

/// One repository per collection
#[derive(Clone)]
pub struct LocalStore {
    pub employees: Arc<dyn Repository<Employee>>,
    pub visitors: Arc<dyn Repository<Visitor>>,
    pub locations: Arc<dyn Repository<Location>>,
    pub visits: Arc<dyn Repository<Visit>>,
    pub approvals: Arc<dyn Repository<Approval>>,
    pub watchlist: Arc<dyn Repository<WatchlistEntry>>,
    pub evacuations: Arc<dyn Repository<Evacuation>>,
    pub installations: Arc<dyn InstallationRepository>,
}

impl LocalStore {
    /// Number of records of a federated entity type owned by this database
    ///
    /// Platform mirrors and shadows waiting for the Platform are not counted.
    pub fn count_entities(&self, company: &CompanyId, entity: EntityType) -> Result<usize, RepositoryError> {
        let count = match entity {
            EntityType::Employee => self
                .employees
                .find_where(company, &|e: &Employee| e.sync_state == SyncState::Local)?
                .len(),
            EntityType::Visitor => self
                .visitors
                .find_where(company, &|v: &Visitor| v.sync_state == SyncState::Local)?
                .len(),
            EntityType::Location => self
                .locations
                .find_where(company, &|l: &Location| l.platform_id.is_none())?
                .len(),
        };
        Ok(count)
    }

    /// The company's installation record, or a fresh unsaved default
    pub fn installation(&self, company: &CompanyId) -> Result<Installation, RepositoryError> {
        Ok(self
            .installations
            .get(company)?
            .unwrap_or_else(|| Installation::new(company.clone(), Utc::now())))
    }
}

impl std::fmt::Debug for LocalStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalStore").finish_non_exhaustive()
    }
}
