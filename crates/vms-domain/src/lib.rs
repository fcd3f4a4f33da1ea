//! # VMS Domain Layer
//!
//! Visitors, employees, visits and everything that happens around them,
//! expressed without any I/O.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    Domain Layer (This Crate)                     │
//! │  ┌─────────────────────────────────────────────────────────────┐│
//! │  │  model/      - Entities and their state machines            ││
//! │  │  repository/ - Ports for the local database                 ││
//! │  │  service/    - Screening, roll call, reports, validation    ││
//! │  └─────────────────────────────────────────────────────────────┘│
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod model;
pub mod repository;
pub mod service;

// Re-export commonly used types
pub use model::{
    approval::{Approval, ApprovalStatus},
    employee::{Employee, EmployeeUpdate, NewEmployee},
    evacuation::{Evacuation, EvacuationReport, EvacuationStatus, PersonKind, RollCallEntry},
    installation::Installation,
    location::{Location, LocationKind, NewLocation},
    visit::{NewVisit, Visit, VisitStatus},
    visitor::{IdDocument, NewVisitor, Visitor, VisitorType, VisitorUpdate},
    watchlist::{NewWatchlistEntry, WatchlistEntry, WatchlistSeverity},
    SyncState,
};

pub use repository::{
    local_store::LocalStore, ApprovalQueries, Document, EmployeeQueries, EvacuationQueries,
    InstallationRepository, Repository, RepositoryError, VisitQueries, VisitorQueries,
    WatchlistQueries,
};

/// Generate a new record identifier
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
