//! # VMS Federation
//!
//! Decides where employees, visitors and locations live for each company and
//! keeps the local database and the Platform consistent.
//!
//! ```text
//!            DataProvider
//!           /     |      \
//! ResidencyDetector  ActorMapper  PlatformClientWrapper ── SyncQueue ◀── SyncProcessor
//! ```

mod actor_mapping;
mod data_provider;
mod manifest;
mod platform_wrapper;
mod processor;
mod residency;
mod sync_queue;

pub use actor_mapping::{ActorMapper, ActorMapperStats};
pub use data_provider::{DataProvider, Delivery, EmployeeFilter, VisitorFilter, WriteOutcome};
pub use manifest::{ActorManifest, EntityMapping, ManifestLoader};
pub use platform_wrapper::{PlatformClientWrapper, WriteResult};
pub use processor::{ProcessReport, SyncProcessor};
pub use residency::{Residency, ResidencyDetector, ResidencySource};
pub use sync_queue::{
    BackoffPolicy, InMemorySyncQueueStore, JsonFileSyncQueueStore, NewSyncOperation, SyncFilter, SyncKind,
    SyncOperation, SyncQueue, SyncQueueStore, SyncStats, SyncStatus,
};
