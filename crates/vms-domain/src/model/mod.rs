//! Domain Models - Entities of the visitor management system
//!
//! Each entity belongs to exactly one company. Entities that can be
//! federated with the Platform carry a `platform_id` and a [`SyncState`].

pub mod approval;
pub mod employee;
pub mod evacuation;
pub mod installation;
pub mod location;
pub mod visit;
pub mod visitor;
pub mod watchlist;

use serde::{Deserialize, Serialize};

/// Relationship between a local record and the Platform
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncState {
    /// The local copy is authoritative
    #[default]
    Local,
    /// Mirror of a Platform actor
    Synced,
    /// Written locally, Platform write still queued
    Pending,
}

impl SyncState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncState::Local => "local",
            SyncState::Synced => "synced",
            SyncState::Pending => "pending",
        }
    }
}
