//! Watchlist - People who must be flagged or refused at the door

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared::CompanyId;

/// What happens when a visitor matches an entry
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WatchlistSeverity {
    /// Let in, but tell security
    #[default]
    Alert,
    /// Refuse registration and check-in
    Block,
}

/// Watchlist entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchlistEntry {
    pub id: String,
    pub company_id: CompanyId,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub id_number: Option<String>,
    pub reason: String,
    pub severity: WatchlistSeverity,
    pub active: bool,
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Payload for adding a watchlist entry
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewWatchlistEntry {
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub id_number: Option<String>,
    pub reason: String,
    #[serde(default)]
    pub severity: WatchlistSeverity,
}

impl NewWatchlistEntry {
    pub fn into_entry(self, company_id: CompanyId, created_by: Option<String>, now: DateTime<Utc>) -> WatchlistEntry {
        WatchlistEntry {
            id: crate::new_id(),
            company_id,
            name: self.name.trim().to_string(),
            email: self.email.map(|e| e.trim().to_lowercase()),
            phone: self.phone,
            id_number: self.id_number,
            reason: self.reason,
            severity: self.severity,
            active: true,
            created_by,
            created_at: now,
        }
    }

    /// An entry needs at least one identifying field besides the name
    pub fn has_identifier(&self) -> bool {
        !self.name.trim().is_empty()
            || self.email.as_deref().map_or(false, |e| !e.trim().is_empty())
            || self.phone.as_deref().map_or(false, |p| !p.trim().is_empty())
            || self.id_number.as_deref().map_or(false, |n| !n.trim().is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_outranks_alert() {
        assert!(WatchlistSeverity::Block > WatchlistSeverity::Alert);
    }

    #[test]
    fn test_into_entry_is_active() {
        let entry = NewWatchlistEntry {
            name: "Mallory".to_string(),
            email: Some("MALLORY@evil.test".to_string()),
            reason: "Tailgating".to_string(),
            severity: WatchlistSeverity::Block,
            ..Default::default()
        }
        .into_entry(CompanyId::new("acme"), Some("sec-1".to_string()), Utc::now());

        assert!(entry.active);
        assert_eq!(entry.email.as_deref(), Some("mallory@evil.test"));
        assert_eq!(entry.created_by.as_deref(), Some("sec-1"));
    }

    #[test]
    fn test_has_identifier() {
        assert!(!NewWatchlistEntry::default().has_identifier());
        let entry = NewWatchlistEntry {
            id_number: Some("P-1".to_string()),
            ..Default::default()
        };
        assert!(entry.has_identifier());
    }
}
