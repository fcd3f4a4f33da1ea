//! Input validation for registrations and schedules

use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use shared::ValidationError;

use crate::model::employee::NewEmployee;
use crate::model::visit::NewVisit;
use crate::model::visitor::NewVisitor;
use crate::model::watchlist::NewWatchlistEntry;

fn email_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("valid email pattern"))
}

fn phone_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^\+?[0-9 ()\-.]{7,20}$").expect("valid phone pattern"))
}

pub fn validate_email(email: &str) -> Result<(), ValidationError> {
    if email_pattern().is_match(email.trim()) {
        Ok(())
    } else {
        Err(ValidationError::new("email", format!("'{}' is not a valid address", email)))
    }
}

pub fn validate_phone(phone: &str) -> Result<(), ValidationError> {
    let digits = phone.chars().filter(|c| c.is_ascii_digit()).count();
    if phone_pattern().is_match(phone.trim()) && digits >= 7 {
        Ok(())
    } else {
        Err(ValidationError::new("phone", format!("'{}' is not a valid phone number", phone)))
    }
}

pub fn validate_name(field: &str, name: &str) -> Result<(), ValidationError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::new(field, "must not be empty"));
    }
    if trimmed.chars().count() > 200 {
        return Err(ValidationError::new(field, "must be at most 200 characters"));
    }
    Ok(())
}

pub fn validate_window(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<(), ValidationError> {
    if end <= start {
        return Err(ValidationError::new("scheduledEnd", "must be after scheduledStart"));
    }
    Ok(())
}

fn validate_contact(email: Option<&str>, phone: Option<&str>) -> Result<(), ValidationError> {
    if let Some(email) = email {
        validate_email(email)?;
    }
    if let Some(phone) = phone {
        validate_phone(phone)?;
    }
    Ok(())
}

pub fn validate_new_employee(new: &NewEmployee) -> Result<(), ValidationError> {
    validate_name("name", &new.name)?;
    validate_contact(new.email.as_deref(), new.phone.as_deref())
}

pub fn validate_new_visitor(new: &NewVisitor) -> Result<(), ValidationError> {
    validate_name("name", &new.name)?;
    validate_contact(new.email.as_deref(), new.phone.as_deref())?;
    if let Some(doc) = &new.id_document {
        if doc.number.trim().is_empty() {
            return Err(ValidationError::new("idDocument.number", "must not be empty"));
        }
    }
    Ok(())
}

pub fn validate_new_visit(new: &NewVisit) -> Result<(), ValidationError> {
    if new.visitor_id.trim().is_empty() {
        return Err(ValidationError::new("visitorId", "must not be empty"));
    }
    if new.host_employee_id.trim().is_empty() {
        return Err(ValidationError::new("hostEmployeeId", "must not be empty"));
    }
    validate_window(new.scheduled_start, new.scheduled_end)
}

pub fn validate_new_watchlist_entry(new: &NewWatchlistEntry) -> Result<(), ValidationError> {
    if !new.has_identifier() {
        return Err(ValidationError::new("name", "an entry needs a name, email, phone or id number"));
    }
    if new.reason.trim().is_empty() {
        return Err(ValidationError::new("reason", "must not be empty"));
    }
    validate_contact(new.email.as_deref(), new.phone.as_deref())
}
