//! Repository Traits - The "Ports" of the local database
//!
//! These traits define what the application needs from storage,
//! not how it is stored. Every lookup is scoped to one company.
//!
//! ```text
//! Domain Layer             │  Adapter Layer
//! ─────────────────────────┼────────────────────────
//! trait Repository<Visit>  │  InMemoryRepository<Visit>
//!   fn save()              │  (document store, …)
//!   fn find_by_id()        │
//! ```

pub mod local_store;

use chrono::{DateTime, Utc};
use shared::{CompanyId, VmsError};

use crate::model::approval::Approval;
use crate::model::employee::Employee;
use crate::model::evacuation::Evacuation;
use crate::model::installation::Installation;
use crate::model::location::Location;
use crate::model::visit::{Visit, VisitStatus};
use crate::model::visitor::Visitor;
use crate::model::watchlist::WatchlistEntry;
use crate::model::SyncState;

/// Errors that can occur during repository operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepositoryError {
    /// Record not found
    NotFound { kind: String, id: String },
    /// Failed to persist
    PersistenceError { message: String },
    /// Concurrent modification detected
    ConcurrencyError { id: String },
}

impl core::fmt::Display for RepositoryError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            RepositoryError::NotFound { kind, id } => {
                write!(f, "{} not found: {}", kind, id)
            }
            RepositoryError::PersistenceError { message } => {
                write!(f, "Persistence error: {}", message)
            }
            RepositoryError::ConcurrencyError { id } => {
                write!(f, "Concurrent modification for record: {}", id)
            }
        }
    }
}

impl std::error::Error for RepositoryError {}

impl From<RepositoryError> for VmsError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound { kind, id } => VmsError::not_found(kind, id),
            other => VmsError::Storage(other.to_string()),
        }
    }
}

/// A record stored in a company-scoped collection
pub trait Document: Clone + Send + Sync + 'static {
    /// Collection name, used in errors
    const KIND: &'static str;

    fn id(&self) -> &str;
    fn company_id(&self) -> &CompanyId;
}

/// Generic company-scoped collection
///
/// Implementations must be safe to share between request handlers.
pub trait Repository<T: Document>: Send + Sync {
    /// Save a record (create or replace)
    fn save(&self, doc: &T) -> Result<(), RepositoryError>;

    /// Find a record by id
    fn find_by_id(&self, company: &CompanyId, id: &str) -> Result<Option<T>, RepositoryError>;

    /// All records of a company
    fn list(&self, company: &CompanyId) -> Result<Vec<T>, RepositoryError>;

    /// Delete a record, returning whether it existed
    fn delete(&self, company: &CompanyId, id: &str) -> Result<bool, RepositoryError>;

    /// Count records of a company
    fn count(&self, company: &CompanyId) -> Result<usize, RepositoryError> {
        Ok(self.list(company)?.len())
    }

    /// Records matching a predicate
    fn find_where(&self, company: &CompanyId, predicate: &dyn Fn(&T) -> bool) -> Result<Vec<T>, RepositoryError> {
        Ok(self.list(company)?.into_iter().filter(|d| predicate(d)).collect())
    }

    /// Find a record or fail with `NotFound`
    fn get(&self, company: &CompanyId, id: &str) -> Result<T, RepositoryError> {
        self.find_by_id(company, id)?.ok_or_else(|| RepositoryError::NotFound {
            kind: T::KIND.to_string(),
            id: id.to_string(),
        })
    }
}

/// Installation records, one per company
pub trait InstallationRepository: Send + Sync {
    fn get(&self, company: &CompanyId) -> Result<Option<Installation>, RepositoryError>;
    fn save(&self, installation: &Installation) -> Result<(), RepositoryError>;
}

macro_rules! document {
    ($ty:ty, $kind:literal) => {
        impl Document for $ty {
            const KIND: &'static str = $kind;

            fn id(&self) -> &str {
                &self.id
            }

            fn company_id(&self) -> &CompanyId {
                &self.company_id
            }
        }
    };
}

document!(Employee, "employee");
document!(Visitor, "visitor");
document!(Location, "location");
document!(Visit, "visit");
document!(Approval, "approval");
document!(WatchlistEntry, "watchlist entry");
document!(Evacuation, "evacuation");

// ========== Query extensions ==========

pub trait EmployeeQueries {
    fn find_employee_by_email(&self, company: &CompanyId, email: &str) -> Result<Option<Employee>, RepositoryError>;
    fn find_employee_by_ref(&self, company: &CompanyId, id: &str) -> Result<Option<Employee>, RepositoryError>;
    fn list_active_employees(&self, company: &CompanyId) -> Result<Vec<Employee>, RepositoryError>;
    fn list_pending_employees(&self, company: &CompanyId) -> Result<Vec<Employee>, RepositoryError>;
}

impl<R: Repository<Employee> + ?Sized> EmployeeQueries for R {
    fn find_employee_by_email(&self, company: &CompanyId, email: &str) -> Result<Option<Employee>, RepositoryError> {
        let email = email.trim().to_lowercase();
        Ok(self
            .find_where(company, &|e: &Employee| e.email.as_deref() == Some(email.as_str()))?
            .into_iter()
            .next())
    }

    /// Look up by local id first, then by Platform id
    fn find_employee_by_ref(&self, company: &CompanyId, id: &str) -> Result<Option<Employee>, RepositoryError> {
        if let Some(found) = self.find_by_id(company, id)? {
            return Ok(Some(found));
        }
        Ok(self.find_where(company, &|e: &Employee| e.is_known_as(id))?.into_iter().next())
    }

    fn list_active_employees(&self, company: &CompanyId) -> Result<Vec<Employee>, RepositoryError> {
        self.find_where(company, &|e: &Employee| e.active)
    }

    fn list_pending_employees(&self, company: &CompanyId) -> Result<Vec<Employee>, RepositoryError> {
        self.find_where(company, &|e: &Employee| e.sync_state == SyncState::Pending && e.platform_id.is_none())
    }
}

pub trait VisitorQueries {
    fn find_visitor_by_email(&self, company: &CompanyId, email: &str) -> Result<Option<Visitor>, RepositoryError>;
    fn find_visitor_by_ref(&self, company: &CompanyId, id: &str) -> Result<Option<Visitor>, RepositoryError>;
    fn list_pending_visitors(&self, company: &CompanyId) -> Result<Vec<Visitor>, RepositoryError>;
}

impl<R: Repository<Visitor> + ?Sized> VisitorQueries for R {
    fn find_visitor_by_email(&self, company: &CompanyId, email: &str) -> Result<Option<Visitor>, RepositoryError> {
        let email = email.trim().to_lowercase();
        Ok(self
            .find_where(company, &|v: &Visitor| v.email.as_deref() == Some(email.as_str()))?
            .into_iter()
            .next())
    }

    fn find_visitor_by_ref(&self, company: &CompanyId, id: &str) -> Result<Option<Visitor>, RepositoryError> {
        if let Some(found) = self.find_by_id(company, id)? {
            return Ok(Some(found));
        }
        Ok(self.find_where(company, &|v: &Visitor| v.is_known_as(id))?.into_iter().next())
    }

    fn list_pending_visitors(&self, company: &CompanyId) -> Result<Vec<Visitor>, RepositoryError> {
        self.find_where(company, &|v: &Visitor| v.sync_state == SyncState::Pending && v.platform_id.is_none())
    }
}

pub trait VisitQueries {
    fn list_visits_by_status(&self, company: &CompanyId, status: VisitStatus) -> Result<Vec<Visit>, RepositoryError>;
    fn list_visits_for_visitor(&self, company: &CompanyId, visitor_id: &str) -> Result<Vec<Visit>, RepositoryError>;
    fn list_visits_between(
        &self,
        company: &CompanyId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Visit>, RepositoryError>;
    fn list_on_site(&self, company: &CompanyId, location_id: Option<&str>) -> Result<Vec<Visit>, RepositoryError>;
}

impl<R: Repository<Visit> + ?Sized> VisitQueries for R {
    fn list_visits_by_status(&self, company: &CompanyId, status: VisitStatus) -> Result<Vec<Visit>, RepositoryError> {
        self.find_where(company, &|v: &Visit| v.status() == status)
    }

    fn list_visits_for_visitor(&self, company: &CompanyId, visitor_id: &str) -> Result<Vec<Visit>, RepositoryError> {
        let mut visits = self.find_where(company, &|v: &Visit| v.visitor_id == visitor_id)?;
        visits.sort_by_key(|v| v.scheduled_start);
        Ok(visits)
    }

    /// Visits whose scheduled window overlaps `[from, to)`
    fn list_visits_between(
        &self,
        company: &CompanyId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Visit>, RepositoryError> {
        let mut visits = self.find_where(company, &|v: &Visit| v.scheduled_start < to && v.scheduled_end > from)?;
        visits.sort_by_key(|v| v.scheduled_start);
        Ok(visits)
    }

    fn list_on_site(&self, company: &CompanyId, location_id: Option<&str>) -> Result<Vec<Visit>, RepositoryError> {
        self.find_where(company, &|v: &Visit| {
            v.is_on_site() && location_id.map_or(true, |loc| v.location_id.as_deref() == Some(loc))
        })
    }
}

pub trait ApprovalQueries {
    fn find_approval_for_visit(&self, company: &CompanyId, visit_id: &str) -> Result<Option<Approval>, RepositoryError>;
    fn list_pending_approvals(&self, company: &CompanyId, approver_id: Option<&str>) -> Result<Vec<Approval>, RepositoryError>;
}

impl<R: Repository<Approval> + ?Sized> ApprovalQueries for R {
    fn find_approval_for_visit(&self, company: &CompanyId, visit_id: &str) -> Result<Option<Approval>, RepositoryError> {
        Ok(self
            .find_where(company, &|a: &Approval| a.visit_id == visit_id)?
            .into_iter()
            .next())
    }

    fn list_pending_approvals(&self, company: &CompanyId, approver_id: Option<&str>) -> Result<Vec<Approval>, RepositoryError> {
        let mut approvals = self.find_where(company, &|a: &Approval| {
            a.is_pending() && approver_id.map_or(true, |id| a.approver_id == id)
        })?;
        approvals.sort_by_key(|a| a.requested_at);
        Ok(approvals)
    }
}

pub trait WatchlistQueries {
    fn list_active_watchlist(&self, company: &CompanyId) -> Result<Vec<WatchlistEntry>, RepositoryError>;
}

impl<R: Repository<WatchlistEntry> + ?Sized> WatchlistQueries for R {
    fn list_active_watchlist(&self, company: &CompanyId) -> Result<Vec<WatchlistEntry>, RepositoryError> {
        self.find_where(company, &|w: &WatchlistEntry| w.active)
    }
}

pub trait EvacuationQueries {
    fn find_active_evacuation(&self, company: &CompanyId) -> Result<Option<Evacuation>, RepositoryError>;
}

impl<R: Repository<Evacuation> + ?Sized> EvacuationQueries for R {
    fn find_active_evacuation(&self, company: &CompanyId) -> Result<Option<Evacuation>, RepositoryError> {
        Ok(self
            .find_where(company, &|e: &Evacuation| e.is_active())?
            .into_iter()
            .next())
    }
}
