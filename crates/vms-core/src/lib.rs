//! # VMS Core
//!
//! Application services - the single entry point the REST surface and the
//! CLI talk to. Ties the domain, the federation layer and the audit trail
//! together.

mod safety;
mod visits;
mod vms_core;

pub use visits::{ApprovalDecision, VisitQuery};
pub use vms_core::{VisitorExport, VisitorRegistration, VmsCore};

// Re-export dependencies
pub use audit::{AuditEntry, AuditEventType, AuditStats};
pub use federation::{
    ActorManifest, Delivery, EmployeeFilter, ManifestLoader, ProcessReport, Residency, SyncOperation, SyncProcessor,
    SyncStats, SyncStatus, VisitorFilter, WriteOutcome, WriteResult,
};
pub use platform::EmbeddingJob;
