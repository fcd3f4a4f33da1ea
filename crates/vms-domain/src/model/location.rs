//! Location - Sites, buildings and gates visitors are admitted to

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared::CompanyId;

/// Kind of location
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocationKind {
    #[default]
    Site,
    Building,
    Floor,
    Gate,
    Area,
}

impl LocationKind {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "site" => Some(LocationKind::Site),
            "building" => Some(LocationKind::Building),
            "floor" => Some(LocationKind::Floor),
            "gate" => Some(LocationKind::Gate),
            "area" => Some(LocationKind::Area),
            _ => None,
        }
    }
}

/// Location record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    pub id: String,
    pub company_id: CompanyId,
    pub name: String,
    #[serde(default)]
    pub kind: LocationKind,
    pub parent_id: Option<String>,
    pub capacity: Option<u32>,
    pub platform_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Location {
    pub fn new(company_id: CompanyId, name: impl Into<String>, kind: LocationKind, now: DateTime<Utc>) -> Self {
        Self {
            id: crate::new_id(),
            company_id,
            name: name.into(),
            kind,
            parent_id: None,
            capacity: None,
            platform_id: None,
            created_at: now,
        }
    }
}

/// Payload for creating a location
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewLocation {
    pub name: String,
    #[serde(default)]
    pub kind: LocationKind,
    pub parent_id: Option<String>,
    pub capacity: Option<u32>,
}

impl NewLocation {
    pub fn into_location(self, company_id: CompanyId, now: DateTime<Utc>) -> Location {
        let mut location = Location::new(company_id, self.name.trim(), self.kind, now);
        location.parent_id = self.parent_id;
        location.capacity = self.capacity;
        location
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_location_kind_parse() {
        assert_eq!(LocationKind::parse("GATE"), Some(LocationKind::Gate));
        assert_eq!(LocationKind::parse("tower"), None);
    }

    #[test]
    fn test_into_location() {
        let loc = NewLocation {
            name: " HQ ".to_string(),
            kind: LocationKind::Building,
            parent_id: Some("campus".to_string()),
            capacity: Some(400),
        }
        .into_location(CompanyId::new("acme"), Utc::now());

        assert_eq!(loc.name, "HQ");
        assert_eq!(loc.kind, LocationKind::Building);
        assert_eq!(loc.capacity, Some(400));
    }
}
