//! # VMS Adapter Layer
//!
//! Implementations of the local database ports declared in `vms-domain`.
//!
//! ## Structure
//!
//! - `in_memory` - Thread-safe in-process collections

pub mod in_memory;

pub use in_memory::{in_memory_store, InMemoryInstallationRepository, InMemoryRepository};
