//! Visitor - Anyone who is not staff and comes on site

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared::CompanyId;

use super::SyncState;

/// Category of visitor
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VisitorType {
    #[default]
    Guest,
    Contractor,
    Vendor,
    Interview,
    Delivery,
}

impl VisitorType {
    pub fn as_str(&self) -> &'static str {
        match self {
            VisitorType::Guest => "guest",
            VisitorType::Contractor => "contractor",
            VisitorType::Vendor => "vendor",
            VisitorType::Interview => "interview",
            VisitorType::Delivery => "delivery",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "guest" => Some(VisitorType::Guest),
            "contractor" => Some(VisitorType::Contractor),
            "vendor" => Some(VisitorType::Vendor),
            "interview" => Some(VisitorType::Interview),
            "delivery" => Some(VisitorType::Delivery),
            _ => None,
        }
    }
}

/// Identity document presented at registration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdDocument {
    pub kind: String,
    pub number: String,
}

/// Visitor record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Visitor {
    pub id: String,
    pub company_id: CompanyId,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub organization: Option<String>,
    pub id_document: Option<IdDocument>,
    #[serde(default)]
    pub visitor_type: VisitorType,
    pub platform_id: Option<String>,
    #[serde(default)]
    pub sync_state: SyncState,
    pub erased_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Visitor {
    pub fn new(company_id: CompanyId, name: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: crate::new_id(),
            company_id,
            name: name.into(),
            email: None,
            phone: None,
            organization: None,
            id_document: None,
            visitor_type: VisitorType::Guest,
            platform_id: None,
            sync_state: SyncState::Local,
            erased_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn with_phone(mut self, phone: impl Into<String>) -> Self {
        self.phone = Some(phone.into());
        self
    }

    pub fn with_type(mut self, visitor_type: VisitorType) -> Self {
        self.visitor_type = visitor_type;
        self
    }

    pub fn is_erased(&self) -> bool {
        self.erased_at.is_some()
    }

    pub fn is_known_as(&self, id: &str) -> bool {
        self.id == id || self.platform_id.as_deref() == Some(id)
    }

    pub fn apply(&mut self, update: VisitorUpdate, now: DateTime<Utc>) {
        if let Some(name) = update.name {
            self.name = name;
        }
        if let Some(email) = update.email {
            self.email = Some(email.trim().to_lowercase());
        }
        if update.phone.is_some() {
            self.phone = update.phone;
        }
        if update.organization.is_some() {
            self.organization = update.organization;
        }
        if update.id_document.is_some() {
            self.id_document = update.id_document;
        }
        if let Some(visitor_type) = update.visitor_type {
            self.visitor_type = visitor_type;
        }
        self.updated_at = now;
    }

    /// Strip personal data, keeping the record so visit history stays consistent
    pub fn anonymize(&mut self, now: DateTime<Utc>) {
        self.name = "Erased Visitor".to_string();
        self.email = None;
        self.phone = None;
        self.organization = None;
        self.id_document = None;
        self.erased_at = Some(now);
        self.updated_at = now;
    }
}

/// Payload for registering a visitor
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewVisitor {
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub organization: Option<String>,
    pub id_document: Option<IdDocument>,
    #[serde(default)]
    pub visitor_type: VisitorType,
}

impl NewVisitor {
    pub fn into_visitor(self, company_id: CompanyId, now: DateTime<Utc>) -> Visitor {
        let mut visitor = Visitor::new(company_id, self.name.trim(), now);
        visitor.email = self.email.map(|e| e.trim().to_lowercase());
        visitor.phone = self.phone;
        visitor.organization = self.organization;
        visitor.id_document = self.id_document;
        visitor.visitor_type = self.visitor_type;
        visitor
    }
}

/// Partial update for a visitor
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisitorUpdate {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub organization: Option<String>,
    pub id_document: Option<IdDocument>,
    pub visitor_type: Option<VisitorType>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn visitor() -> Visitor {
        Visitor::new(CompanyId::new("acme"), "Alan Turing", Utc::now())
            .with_email("alan@example.com")
            .with_phone("+44 20 7946 0000")
    }

    #[test]
    fn test_visitor_type_parse() {
        assert_eq!(VisitorType::parse("Contractor"), Some(VisitorType::Contractor));
        assert_eq!(VisitorType::parse("unknown"), None);
        assert_eq!(VisitorType::default(), VisitorType::Guest);
    }

    #[test]
    fn test_anonymize_removes_personal_data() {
        let mut v = visitor();
        v.id_document = Some(IdDocument {
            kind: "passport".to_string(),
            number: "X123".to_string(),
        });

        v.anonymize(Utc::now());

        assert!(v.is_erased());
        assert_eq!(v.name, "Erased Visitor");
        assert!(v.email.is_none());
        assert!(v.phone.is_none());
        assert!(v.id_document.is_none());
    }

    #[test]
    fn test_apply_update_lowercases_email() {
        let mut v = visitor();
        v.apply(
            VisitorUpdate {
                email: Some("ALAN@Bletchley.org".to_string()),
                visitor_type: Some(VisitorType::Interview),
                ..Default::default()
            },
            Utc::now(),
        );
        assert_eq!(v.email.as_deref(), Some("alan@bletchley.org"));
        assert_eq!(v.visitor_type, VisitorType::Interview);
        assert_eq!(v.name, "Alan Turing");
    }

    #[test]
    fn test_deserialize_minimal_new_visitor() {
        let json = r#"{"name": "Joan Clarke"}"#;
        let new: NewVisitor = serde_json::from_str(json).unwrap();
        assert_eq!(new.visitor_type, VisitorType::Guest);
        assert!(new.email.is_none());
    }
}
