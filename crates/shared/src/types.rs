//! Tenant and residency types shared by every VMS crate

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Tenant identifier
///
/// Every record in the system belongs to exactly one company.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CompanyId(String);

impl CompanyId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CompanyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for CompanyId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Kinds of data whose residency can be configured
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Employee,
    Visitor,
    Location,
}

impl EntityType {
    pub const ALL: [EntityType; 3] = [EntityType::Employee, EntityType::Visitor, EntityType::Location];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Employee => "employee",
            EntityType::Visitor => "visitor",
            EntityType::Location => "location",
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityType {
    type Err = crate::VmsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "employee" | "employees" => Ok(EntityType::Employee),
            "visitor" | "visitors" => Ok(EntityType::Visitor),
            "location" | "locations" => Ok(EntityType::Location),
            other => Err(crate::ValidationError::new("entity", format!("unknown entity type '{}'", other)).into()),
        }
    }
}

/// Where the authoritative copy of an entity type lives
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResidencyMode {
    /// Local VMS database
    #[default]
    App,
    /// Remote Platform
    Platform,
}

impl ResidencyMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResidencyMode::App => "app",
            ResidencyMode::Platform => "platform",
        }
    }

    pub fn is_platform(&self) -> bool {
        matches!(self, ResidencyMode::Platform)
    }
}

impl fmt::Display for ResidencyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResidencyMode {
    type Err = crate::VmsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "app" => Ok(ResidencyMode::App),
            "platform" => Ok(ResidencyMode::Platform),
            other => Err(crate::ValidationError::new("mode", format!("unknown residency mode '{}'", other)).into()),
        }
    }
}
