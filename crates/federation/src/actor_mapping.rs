//! ActorMapper - Platform actors to VMS records and back
//!
//! Actor types are matched case-insensitively against the manifest. An
//! actor whose type belongs to a different entity is never converted.

use std::sync::Arc;

use chrono::Utc;
use platform::{Actor, ActorPayload, PlatformEntity};
use serde_json::Value;
use shared::{meta, CompanyId, EntityType, Logger};
use vms_domain::{Employee, IdDocument, Location, LocationKind, SyncState, Visitor, VisitorType};

use crate::manifest::{ActorManifest, EntityMapping};

/// Statistics about the loaded manifest
#[derive(Debug, Clone)]
pub struct ActorMapperStats {
    pub app: String,
    pub mapped_entities: usize,
    pub actor_types: usize,
}

/// Converts between Platform actors and VMS records
pub struct ActorMapper {
    manifest: ActorManifest,
    logger: Arc<dyn Logger>,
}

impl ActorMapper {
    /// Create a new ActorMapper
    pub fn new(logger: Arc<dyn Logger>, manifest: ActorManifest) -> Self {
        Self { manifest, logger }
    }

    pub fn manifest(&self) -> &ActorManifest {
        &self.manifest
    }

    /// Entity an actor type is read as
    pub fn entity_for_actor_type(&self, actor_type: &str) -> Option<EntityType> {
        self.manifest
            .mappings
            .iter()
            .find(|m| m.accepts(actor_type))
            .map(|m| m.entity)
    }

    /// Platform types read as `entity`
    pub fn actor_types_for(&self, entity: EntityType) -> Vec<String> {
        self.manifest
            .mapping(entity)
            .map(|m| m.actor_types.clone())
            .unwrap_or_else(|| vec![entity.as_str().to_string()])
    }

    /// Platform type used when writing `entity`
    pub fn write_type_for(&self, entity: EntityType) -> String {
        self.manifest
            .mapping(entity)
            .map(|m| m.write_type().to_string())
            .unwrap_or_else(|| entity.as_str().to_string())
    }

    fn mapping_for(&self, entity: EntityType, actor_type: &str, id: &str) -> Option<&EntityMapping> {
        match self.manifest.mapping(entity) {
            Some(mapping) if mapping.accepts(actor_type) => Some(mapping),
            _ => {
                self.logger.debug(
                    &format!("Skipping '{}' as {}: type not mapped", id, entity),
                    Some(&meta([("actorType", actor_type)])),
                );
                None
            }
        }
    }

    // ========== Platform -> VMS ==========

    pub fn actor_to_employee(&self, actor: &Actor, company: &CompanyId) -> Option<Employee> {
        let mapping = self.mapping_for(EntityType::Employee, &actor.actor_type, &actor.id)?;
        let read = |field: &str| attr_string(actor, mapping.attribute(field));
        let now = actor.updated_at.unwrap_or_else(Utc::now);

        let mut employee = Employee::new(company.clone(), read("name").unwrap_or_else(|| actor.id.clone()), now);
        employee.id = actor.id.clone();
        employee.employee_code = read("employeeCode");
        employee.email = read("email").map(|e| e.trim().to_lowercase());
        employee.phone = read("phone");
        employee.department = read("department");
        employee.designation = read("designation");
        employee.location_id = read("locationId");
        employee.active = actor
            .attributes
            .get(mapping.attribute("active"))
            .and_then(Value::as_bool)
            .unwrap_or_else(|| actor.status.as_deref().map_or(true, |s| s.eq_ignore_ascii_case("active")));
        employee.platform_id = Some(actor.id.clone());
        employee.sync_state = SyncState::Synced;
        Some(employee)
    }

    pub fn actor_to_visitor(&self, actor: &Actor, company: &CompanyId) -> Option<Visitor> {
        let mapping = self.mapping_for(EntityType::Visitor, &actor.actor_type, &actor.id)?;
        let read = |field: &str| attr_string(actor, mapping.attribute(field));
        let now = actor.updated_at.unwrap_or_else(Utc::now);

        let mut visitor = Visitor::new(company.clone(), read("name").unwrap_or_else(|| actor.id.clone()), now);
        visitor.id = actor.id.clone();
        visitor.email = read("email").map(|e| e.trim().to_lowercase());
        visitor.phone = read("phone");
        visitor.organization = read("organization");
        visitor.id_document = read("idNumber").map(|number| IdDocument {
            kind: read("idKind").unwrap_or_else(|| "id".to_string()),
            number,
        });
        // the actor type itself may name the visitor type ("contractor")
        visitor.visitor_type = read("visitorType")
            .and_then(|t| VisitorType::parse(&t))
            .or_else(|| VisitorType::parse(&actor.actor_type))
            .unwrap_or_default();
        visitor.platform_id = Some(actor.id.clone());
        visitor.sync_state = SyncState::Synced;
        Some(visitor)
    }

    pub fn entity_to_location(&self, entity: &PlatformEntity, company: &CompanyId) -> Option<Location> {
        let mapping = self.mapping_for(EntityType::Location, &entity.entity_type, &entity.id)?;
        let kind = LocationKind::parse(&entity.entity_type).unwrap_or_default();

        let mut location = Location::new(company.clone(), entity.name.clone(), kind, Utc::now());
        location.id = entity.id.clone();
        location.parent_id = entity.parent_id.clone();
        location.capacity = entity
            .attributes
            .get(mapping.attribute("capacity"))
            .and_then(Value::as_u64)
            .and_then(|c| u32::try_from(c).ok());
        location.platform_id = Some(entity.id.clone());
        Some(location)
    }

    // ========== VMS -> Platform ==========

    pub fn employee_to_payload(&self, employee: &Employee) -> ActorPayload {
        let mut payload = ActorPayload::new(self.write_type_for(EntityType::Employee));
        let mapping = self.manifest.mapping(EntityType::Employee);
        let mut put = |field: &str, value: Value| {
            let key = mapping.map_or(field, |m| m.attribute(field)).to_string();
            payload.attributes.insert(key, value);
        };

        put("name", Value::from(employee.name.clone()));
        put("active", Value::from(employee.active));
        put("localId", Value::from(employee.id.clone()));
        for (field, value) in [
            ("employeeCode", &employee.employee_code),
            ("email", &employee.email),
            ("phone", &employee.phone),
            ("department", &employee.department),
            ("designation", &employee.designation),
            ("locationId", &employee.location_id),
        ] {
            if let Some(v) = value {
                put(field, Value::from(v.clone()));
            }
        }
        payload
    }

    pub fn visitor_to_payload(&self, visitor: &Visitor) -> ActorPayload {
        let mut payload = ActorPayload::new(self.write_type_for(EntityType::Visitor));
        let mapping = self.manifest.mapping(EntityType::Visitor);
        let mut put = |field: &str, value: Value| {
            let key = mapping.map_or(field, |m| m.attribute(field)).to_string();
            payload.attributes.insert(key, value);
        };

        put("name", Value::from(visitor.name.clone()));
        put("visitorType", Value::from(visitor.visitor_type.as_str()));
        put("localId", Value::from(visitor.id.clone()));
        for (field, value) in [
            ("email", &visitor.email),
            ("phone", &visitor.phone),
            ("organization", &visitor.organization),
        ] {
            if let Some(v) = value {
                put(field, Value::from(v.clone()));
            }
        }
        if let Some(doc) = &visitor.id_document {
            put("idKind", Value::from(doc.kind.clone()));
            put("idNumber", Value::from(doc.number.clone()));
        }
        payload
    }

    /// Get statistics about the loaded manifest
    pub fn get_stats(&self) -> ActorMapperStats {
        ActorMapperStats {
            app: self.manifest.app.clone(),
            mapped_entities: self.manifest.mappings.len(),
            actor_types: self.manifest.mappings.iter().map(|m| m.actor_types.len()).sum(),
        }
    }
}

fn attr_string(actor: &Actor, key: &str) -> Option<String> {
    match actor.attributes.get(key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use shared::NullLogger;

    fn create_mapper() -> ActorMapper {
        ActorMapper::new(Arc::new(NullLogger), ActorManifest::builtin())
    }

    fn actor(actor_type: &str, attributes: Value) -> Actor {
        Actor {
            id: "act-1".to_string(),
            actor_type: actor_type.to_string(),
            company_id: CompanyId::new("acme"),
            attributes: attributes.as_object().cloned().unwrap_or_default(),
            status: None,
            updated_at: None,
        }
    }

    #[test]
    fn test_entity_for_actor_type_is_case_insensitive() {
        let mapper = create_mapper();
        assert_eq!(mapper.entity_for_actor_type("Staff"), Some(EntityType::Employee));
        assert_eq!(mapper.entity_for_actor_type("GUEST"), Some(EntityType::Visitor));
        assert_eq!(mapper.entity_for_actor_type("robot"), None);
    }

    #[test]
    fn test_actor_to_visitor() {
        let mapper = create_mapper();
        let actor = actor(
            "Contractor",
            json!({ "name": "Bob", "email": "BOB@Build.test", "company": "BuildCo", "idNumber": "X123" }),
        );

        let visitor = mapper.actor_to_visitor(&actor, &CompanyId::new("acme")).unwrap();
        assert_eq!(visitor.id, "act-1");
        assert_eq!(visitor.name, "Bob");
        assert_eq!(visitor.email.as_deref(), Some("bob@build.test"));
        assert_eq!(visitor.organization.as_deref(), Some("BuildCo"));
        assert_eq!(visitor.visitor_type, VisitorType::Contractor);
        assert_eq!(visitor.id_document.unwrap().number, "X123");
        assert_eq!(visitor.platform_id.as_deref(), Some("act-1"));
        assert_eq!(visitor.sync_state, SyncState::Synced);
    }

    #[test]
    fn test_wrong_type_is_skipped() {
        let mapper = create_mapper();
        let staff = actor("staff", json!({ "name": "Grace" }));
        let company = CompanyId::new("acme");

        assert!(mapper.actor_to_visitor(&staff, &company).is_none());
        let employee = mapper.actor_to_employee(&staff, &company).unwrap();
        assert_eq!(employee.name, "Grace");
        assert!(employee.active);
    }

    #[test]
    fn test_inactive_status() {
        let mapper = create_mapper();
        let mut staff = actor("employee", json!({ "name": "Gone" }));
        staff.status = Some("disabled".to_string());

        let employee = mapper.actor_to_employee(&staff, &CompanyId::new("acme")).unwrap();
        assert!(!employee.active);
    }

    #[test]
    fn test_entity_to_location() {
        let mapper = create_mapper();
        let entity = PlatformEntity {
            id: "ent-1".to_string(),
            entity_type: "Building".to_string(),
            name: "HQ".to_string(),
            parent_id: Some("campus".to_string()),
            attributes: json!({ "capacity": 250 }).as_object().cloned().unwrap(),
        };

        let location = mapper.entity_to_location(&entity, &CompanyId::new("acme")).unwrap();
        assert_eq!(location.kind, LocationKind::Building);
        assert_eq!(location.capacity, Some(250));
        assert_eq!(location.parent_id.as_deref(), Some("campus"));
    }

    #[test]
    fn test_visitor_payload_uses_attribute_names() {
        let mapper = create_mapper();
        let mut visitor = Visitor::new(CompanyId::new("acme"), "Alice", Utc::now()).with_email("alice@example.com");
        visitor.organization = Some("Initech".to_string());

        let payload = mapper.visitor_to_payload(&visitor);
        assert_eq!(payload.actor_type, "visitor");
        assert_eq!(payload.attributes["company"], "Initech");
        assert_eq!(payload.attributes["email"], "alice@example.com");
        assert_eq!(payload.attributes["localId"], visitor.id.as_str());
        assert!(payload.attributes.get("phone").is_none());
    }

    #[test]
    fn test_employee_round_trip_through_payload() {
        let mapper = create_mapper();
        let company = CompanyId::new("acme");
        let mut employee = Employee::new(company.clone(), "Grace", Utc::now()).with_department("Security");
        employee.designation = Some("Lead".to_string());

        let payload = mapper.employee_to_payload(&employee);
        assert_eq!(payload.attributes["title"], "Lead");

        let actor = Actor {
            id: "act-9".to_string(),
            actor_type: payload.actor_type.clone(),
            company_id: company.clone(),
            attributes: payload.attributes,
            status: None,
            updated_at: None,
        };
        let back = mapper.actor_to_employee(&actor, &company).unwrap();
        assert_eq!(back.name, "Grace");
        assert_eq!(back.department.as_deref(), Some("Security"));
        assert_eq!(back.designation.as_deref(), Some("Lead"));
    }

    #[test]
    fn test_stats() {
        let stats = create_mapper().get_stats();
        assert_eq!(stats.mapped_entities, 3);
        assert_eq!(stats.app, "vms");
    }
}
