//! Watchlist screening
//!
//! A visitor matches an entry on any of:
//! - the same email (trimmed, lowercase)
//! - the same phone digits, when both have at least 7 digits
//! - the same id number (alphanumerics only, uppercase)
//! - the same name (whitespace collapsed, lowercase), unless both sides
//!   carry an email and the emails differ

use serde::{Deserialize, Serialize};

use crate::model::visitor::Visitor;
use crate::model::watchlist::{WatchlistEntry, WatchlistSeverity};

/// Identifying details of the person being screened
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreeningSubject {
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub id_number: Option<String>,
}

impl From<&Visitor> for ScreeningSubject {
    fn from(visitor: &Visitor) -> Self {
        Self {
            name: visitor.name.clone(),
            email: visitor.email.clone(),
            phone: visitor.phone.clone(),
            id_number: visitor.id_document.as_ref().map(|d| d.number.clone()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchField {
    Name,
    Email,
    Phone,
    IdNumber,
}

/// One entry the subject matched
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreeningMatch {
    pub entry_id: String,
    pub severity: WatchlistSeverity,
    pub reason: String,
    pub matched_on: Vec<MatchField>,
}

/// Result of screening a subject against the watchlist
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "matches", rename_all = "snake_case")]
pub enum ScreeningOutcome {
    Clear,
    Alert(Vec<ScreeningMatch>),
    Blocked(Vec<ScreeningMatch>),
}

impl ScreeningOutcome {
    pub fn is_clear(&self) -> bool {
        matches!(self, ScreeningOutcome::Clear)
    }

    pub fn is_blocked(&self) -> bool {
        matches!(self, ScreeningOutcome::Blocked(_))
    }

    pub fn matches(&self) -> &[ScreeningMatch] {
        match self {
            ScreeningOutcome::Clear => &[],
            ScreeningOutcome::Alert(m) | ScreeningOutcome::Blocked(m) => m,
        }
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn phone_digits(phone: &str) -> String {
    phone.chars().filter(|c| c.is_ascii_digit()).collect()
}

fn normalize_id_number(number: &str) -> String {
    number
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_ascii_uppercase()
}

fn normalize_name(name: &str) -> String {
    name.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn match_fields(subject: &ScreeningSubject, entry: &WatchlistEntry) -> Vec<MatchField> {
    let mut fields = Vec::new();

    let subject_email = non_empty(subject.email.as_deref()).map(normalize_email);
    let entry_email = non_empty(entry.email.as_deref()).map(normalize_email);
    if let (Some(a), Some(b)) = (&subject_email, &entry_email) {
        if a == b {
            fields.push(MatchField::Email);
        }
    }

    if let (Some(a), Some(b)) = (non_empty(subject.phone.as_deref()), non_empty(entry.phone.as_deref())) {
        let (a, b) = (phone_digits(a), phone_digits(b));
        if a.len() >= 7 && a == b {
            fields.push(MatchField::Phone);
        }
    }

    if let (Some(a), Some(b)) = (non_empty(subject.id_number.as_deref()), non_empty(entry.id_number.as_deref())) {
        let (a, b) = (normalize_id_number(a), normalize_id_number(b));
        if !a.is_empty() && a == b {
            fields.push(MatchField::IdNumber);
        }
    }

    let subject_name = normalize_name(&subject.name);
    let emails_conflict = matches!((&subject_email, &entry_email), (Some(a), Some(b)) if a != b);
    if !subject_name.is_empty() && subject_name == normalize_name(&entry.name) && !emails_conflict {
        fields.push(MatchField::Name);
    }

    fields
}

/// Screen a subject against watchlist entries; inactive entries are ignored
pub fn screen(subject: &ScreeningSubject, entries: &[WatchlistEntry]) -> ScreeningOutcome {
    let matches: Vec<ScreeningMatch> = entries
        .iter()
        .filter(|e| e.active)
        .filter_map(|entry| {
            let matched_on = match_fields(subject, entry);
            (!matched_on.is_empty()).then(|| ScreeningMatch {
                entry_id: entry.id.clone(),
                severity: entry.severity,
                reason: entry.reason.clone(),
                matched_on,
            })
        })
        .collect();

    if matches.is_empty() {
        ScreeningOutcome::Clear
    } else if matches.iter().any(|m| m.severity == WatchlistSeverity::Block) {
        ScreeningOutcome::Blocked(matches)
    } else {
        ScreeningOutcome::Alert(matches)
    }
}
