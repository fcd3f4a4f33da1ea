//! Platform wire types

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use shared::{CompanyId, EntityType, ResidencyMode};

/// Free-form actor attributes (a JSON object)
pub type Attributes = Map<String, Value>;

/// A person known to the Platform
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Actor {
    pub id: String,
    pub actor_type: String,
    pub company_id: CompanyId,
    #[serde(default)]
    pub attributes: Attributes,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Actor {
    /// String attribute, if present
    pub fn attr_str(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).and_then(Value::as_str)
    }

    /// Actor types are compared case-insensitively
    pub fn is_type(&self, actor_type: &str) -> bool {
        self.actor_type.eq_ignore_ascii_case(actor_type)
    }
}

/// Body of actor create and update requests
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActorPayload {
    pub actor_type: String,
    #[serde(default)]
    pub attributes: Attributes,
}

impl ActorPayload {
    pub fn new(actor_type: impl Into<String>) -> Self {
        Self {
            actor_type: actor_type.into(),
            attributes: Attributes::new(),
        }
    }

    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }
}

/// A place or organisational unit owned by the Platform
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformEntity {
    pub id: String,
    pub entity_type: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    #[serde(default)]
    pub attributes: Attributes,
}

/// Residency the Platform holds for one app installation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResidencyConfig {
    pub company_id: CompanyId,
    #[serde(default)]
    pub modes: HashMap<EntityType, ResidencyMode>,
}

impl ResidencyConfig {
    pub fn new(company_id: CompanyId) -> Self {
        Self {
            company_id,
            modes: HashMap::new(),
        }
    }

    pub fn with_mode(mut self, entity: EntityType, mode: ResidencyMode) -> Self {
        self.modes.insert(entity, mode);
        self
    }

    pub fn mode_for(&self, entity: EntityType) -> Option<ResidencyMode> {
        self.modes.get(&entity).copied()
    }
}

/// Face embedding request accepted by the Platform
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmbeddingJob {
    pub job_id: String,
    pub actor_id: String,
    pub status: String,
}

/// `{ "items": [...] }` list envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemList<T> {
    pub items: Vec<T>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_actor_wire_format() {
        let actor: Actor = serde_json::from_value(json!({
            "id": "act-1",
            "actorType": "Visitor",
            "companyId": "acme",
            "attributes": { "name": "Alice", "email": "alice@example.com" }
        }))
        .unwrap();

        assert_eq!(actor.attr_str("name"), Some("Alice"));
        assert!(actor.is_type("visitor"));
        assert!(actor.status.is_none());

        let back = serde_json::to_value(&actor).unwrap();
        assert!(back.get("status").is_none());
        assert_eq!(back["actorType"], "Visitor");
    }

    #[test]
    fn test_residency_config_keys() {
        let config: ResidencyConfig = serde_json::from_value(json!({
            "companyId": "acme",
            "modes": { "visitor": "platform", "employee": "app" }
        }))
        .unwrap();

        assert_eq!(config.mode_for(EntityType::Visitor), Some(ResidencyMode::Platform));
        assert_eq!(config.mode_for(EntityType::Employee), Some(ResidencyMode::App));
        assert_eq!(config.mode_for(EntityType::Location), None);
    }

    #[test]
    fn test_payload_builder() {
        let payload = ActorPayload::new("employee").with_attr("name", "Grace");
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json, json!({ "actorType": "employee", "attributes": { "name": "Grace" } }));
    }
}
