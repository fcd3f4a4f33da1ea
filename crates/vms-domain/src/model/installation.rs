//! Installation - Per-company settings of this VMS deployment

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared::{CompanyId, EntityType, ResidencyMode};
use std::collections::HashMap;

/// Local installation record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Installation {
    pub company_id: CompanyId,
    /// Company id on the Platform, when the tenant is linked
    pub platform_company_id: Option<String>,
    /// Explicit residency per entity type
    #[serde(default)]
    pub residency: HashMap<EntityType, ResidencyMode>,
    /// Every visit needs host approval
    #[serde(default)]
    pub require_approval: bool,
    pub updated_at: DateTime<Utc>,
}

impl Installation {
    pub fn new(company_id: CompanyId, now: DateTime<Utc>) -> Self {
        Self {
            company_id,
            platform_company_id: None,
            residency: HashMap::new(),
            require_approval: false,
            updated_at: now,
        }
    }

    pub fn is_linked(&self) -> bool {
        self.platform_company_id.is_some()
    }

    pub fn residency_for(&self, entity: EntityType) -> Option<ResidencyMode> {
        self.residency.get(&entity).copied()
    }

    pub fn set_residency(&mut self, entity: EntityType, mode: ResidencyMode, now: DateTime<Utc>) {
        self.residency.insert(entity, mode);
        self.updated_at = now;
    }
}
