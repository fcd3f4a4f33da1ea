//! Evacuation - Roll call of everyone on site during an emergency

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared::{CompanyId, InvalidTransitionError, NotFoundError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvacuationStatus {
    Active,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PersonKind {
    Visitor,
    Employee,
}

/// One person who has to be accounted for
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RollCallEntry {
    pub person_id: String,
    pub person_kind: PersonKind,
    pub name: String,
    pub visit_id: Option<String>,
    pub accounted: bool,
    pub accounted_at: Option<DateTime<Utc>>,
}

impl RollCallEntry {
    pub fn new(person_id: impl Into<String>, person_kind: PersonKind, name: impl Into<String>) -> Self {
        Self {
            person_id: person_id.into(),
            person_kind,
            name: name.into(),
            visit_id: None,
            accounted: false,
            accounted_at: None,
        }
    }

    pub fn with_visit(mut self, visit_id: impl Into<String>) -> Self {
        self.visit_id = Some(visit_id.into());
        self
    }
}

/// Evacuation event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Evacuation {
    pub id: String,
    pub company_id: CompanyId,
    pub location_id: Option<String>,
    pub status: EvacuationStatus,
    pub started_by: Option<String>,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub roll: Vec<RollCallEntry>,
}

/// Outcome of an evacuation roll call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvacuationReport {
    pub evacuation_id: String,
    pub total: usize,
    pub accounted: usize,
    pub unaccounted: Vec<RollCallEntry>,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl Evacuation {
    pub fn start(
        company_id: CompanyId,
        location_id: Option<String>,
        started_by: Option<String>,
        roll: Vec<RollCallEntry>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: crate::new_id(),
            company_id,
            location_id,
            status: EvacuationStatus::Active,
            started_by,
            started_at: now,
            ended_at: None,
            roll,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == EvacuationStatus::Active
    }

    /// Mark a person as safe; accounting twice is a no-op
    pub fn account(&mut self, person_id: &str, now: DateTime<Utc>) -> Result<&RollCallEntry, AccountError> {
        if !self.is_active() {
            return Err(AccountError::Closed(InvalidTransitionError::new(
                "evacuation",
                "closed",
                "accounted",
            )));
        }

        let entry = self
            .roll
            .iter_mut()
            .find(|e| e.person_id == person_id)
            .ok_or_else(|| AccountError::UnknownPerson(NotFoundError::new("roll call entry", person_id)))?;

        if !entry.accounted {
            entry.accounted = true;
            entry.accounted_at = Some(now);
        }
        Ok(&*entry)
    }

    pub fn close(&mut self, now: DateTime<Utc>) -> Result<EvacuationReport, InvalidTransitionError> {
        if !self.is_active() {
            return Err(InvalidTransitionError::new("evacuation", "closed", "closed"));
        }
        self.status = EvacuationStatus::Closed;
        self.ended_at = Some(now);
        Ok(self.report())
    }

    pub fn report(&self) -> EvacuationReport {
        let unaccounted: Vec<RollCallEntry> = self.roll.iter().filter(|e| !e.accounted).cloned().collect();
        EvacuationReport {
            evacuation_id: self.id.clone(),
            total: self.roll.len(),
            accounted: self.roll.len() - unaccounted.len(),
            unaccounted,
            started_at: self.started_at,
            ended_at: self.ended_at,
        }
    }
}

/// Why a person could not be accounted for
#[derive(Debug)]
pub enum AccountError {
    Closed(InvalidTransitionError),
    UnknownPerson(NotFoundError),
}

impl From<AccountError> for shared::VmsError {
    fn from(err: AccountError) -> Self {
        match err {
            AccountError::Closed(e) => e.into(),
            AccountError::UnknownPerson(e) => e.into(),
        }
    }
}
