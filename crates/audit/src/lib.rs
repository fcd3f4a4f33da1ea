//! # VMS Audit
//!
//! Audit trail of visitor, visit and residency events.

mod audit_logger;

pub use audit_logger::{AuditEntry, AuditEventType, AuditLogger, AuditStats};
