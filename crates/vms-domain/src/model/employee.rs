//! Employee - A host, approver or member of staff

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared::CompanyId;

use super::SyncState;

/// Employee record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Employee {
    pub id: String,
    pub company_id: CompanyId,
    pub employee_code: Option<String>,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub department: Option<String>,
    pub designation: Option<String>,
    pub location_id: Option<String>,
    pub active: bool,
    pub platform_id: Option<String>,
    #[serde(default)]
    pub sync_state: SyncState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Employee {
    /// Create an active employee with a fresh id
    pub fn new(company_id: CompanyId, name: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: crate::new_id(),
            company_id,
            employee_code: None,
            name: name.into(),
            email: None,
            phone: None,
            department: None,
            designation: None,
            location_id: None,
            active: true,
            platform_id: None,
            sync_state: SyncState::Local,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn with_department(mut self, department: impl Into<String>) -> Self {
        self.department = Some(department.into());
        self
    }

    pub fn with_location(mut self, location_id: impl Into<String>) -> Self {
        self.location_id = Some(location_id.into());
        self
    }

    /// Apply a partial update
    pub fn apply(&mut self, update: EmployeeUpdate, now: DateTime<Utc>) {
        if let Some(name) = update.name {
            self.name = name;
        }
        if update.email.is_some() {
            self.email = update.email;
        }
        if update.phone.is_some() {
            self.phone = update.phone;
        }
        if update.department.is_some() {
            self.department = update.department;
        }
        if update.designation.is_some() {
            self.designation = update.designation;
        }
        if update.location_id.is_some() {
            self.location_id = update.location_id;
        }
        if let Some(active) = update.active {
            self.active = active;
        }
        self.updated_at = now;
    }

    /// True when this record points at the given id either locally or on the Platform
    pub fn is_known_as(&self, id: &str) -> bool {
        self.id == id || self.platform_id.as_deref() == Some(id)
    }
}

/// Payload for registering an employee
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewEmployee {
    pub name: String,
    pub employee_code: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub department: Option<String>,
    pub designation: Option<String>,
    pub location_id: Option<String>,
}

impl NewEmployee {
    pub fn into_employee(self, company_id: CompanyId, now: DateTime<Utc>) -> Employee {
        let mut employee = Employee::new(company_id, self.name.trim(), now);
        employee.employee_code = self.employee_code;
        employee.email = self.email.map(|e| e.trim().to_lowercase());
        employee.phone = self.phone;
        employee.department = self.department;
        employee.designation = self.designation;
        employee.location_id = self.location_id;
        employee
    }
}

/// Partial update for an employee
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmployeeUpdate {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub department: Option<String>,
    pub designation: Option<String>,
    pub location_id: Option<String>,
    pub active: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_employee_is_active_and_local() {
        let employee = Employee::new(CompanyId::new("acme"), "Ada", Utc::now());
        assert!(employee.active);
        assert_eq!(employee.sync_state, SyncState::Local);
        assert!(employee.platform_id.is_none());
    }

    #[test]
    fn test_into_employee_normalizes_email() {
        let new = NewEmployee {
            name: "  Grace Hopper ".to_string(),
            email: Some(" Grace@Example.COM ".to_string()),
            ..Default::default()
        };
        let employee = new.into_employee(CompanyId::new("acme"), Utc::now());
        assert_eq!(employee.name, "Grace Hopper");
        assert_eq!(employee.email.as_deref(), Some("grace@example.com"));
    }

    #[test]
    fn test_apply_update_keeps_unset_fields() {
        let mut employee = Employee::new(CompanyId::new("acme"), "Ada", Utc::now())
            .with_email("ada@example.com")
            .with_department("R&D");

        employee.apply(
            EmployeeUpdate {
                department: Some("Ops".to_string()),
                active: Some(false),
                ..Default::default()
            },
            Utc::now(),
        );

        assert_eq!(employee.email.as_deref(), Some("ada@example.com"));
        assert_eq!(employee.department.as_deref(), Some("Ops"));
        assert!(!employee.active);
    }

    #[test]
    fn test_is_known_as_platform_id() {
        let mut employee = Employee::new(CompanyId::new("acme"), "Ada", Utc::now());
        employee.platform_id = Some("actor-9".to_string());
        assert!(employee.is_known_as("actor-9"));
        assert!(employee.is_known_as(&employee.id.clone()));
        assert!(!employee.is_known_as("other"));
    }
}
