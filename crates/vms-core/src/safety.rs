//! Watchlist, evacuations and reports

use audit::AuditEventType;
use chrono::{DateTime, Utc};
use federation::{EmployeeFilter, VisitorFilter};
use shared::{meta, CompanyId, Result, VmsError};
use vms_domain::service::reports::{summarize_visits, VisitSummary};
use vms_domain::service::roll_call::build_roll;
use vms_domain::service::validation::{validate_new_watchlist_entry, validate_window};
use vms_domain::{
    Evacuation, EvacuationQueries, EvacuationReport, NewWatchlistEntry, Repository, RollCallEntry, VisitQueries,
    WatchlistEntry,
};

use crate::vms_core::VmsCore;

impl VmsCore {
    // ========== Watchlist ==========

    pub fn add_watchlist_entry(
        &self,
        company: &CompanyId,
        actor: Option<&str>,
        new: NewWatchlistEntry,
    ) -> Result<WatchlistEntry> {
        validate_new_watchlist_entry(&new)?;
        let entry = new.into_entry(company.clone(), actor.map(str::to_string), Utc::now());
        self.store.watchlist.save(&entry)?;
        self.record(company, AuditEventType::WatchlistUpdated, actor, &entry.id);
        Ok(entry)
    }

    /// Stop an entry from matching; deactivating twice is a no-op
    pub fn deactivate_watchlist_entry(&self, company: &CompanyId, actor: Option<&str>, id: &str) -> Result<WatchlistEntry> {
        let mut entry = self.store.watchlist.get(company, id)?;
        if entry.active {
            entry.active = false;
            self.store.watchlist.save(&entry)?;
            self.record(company, AuditEventType::WatchlistUpdated, actor, &entry.id);
        }
        Ok(entry)
    }

    pub fn list_watchlist(&self, company: &CompanyId, include_inactive: bool) -> Result<Vec<WatchlistEntry>> {
        let mut entries = self
            .store
            .watchlist
            .find_where(company, &|e: &WatchlistEntry| include_inactive || e.active)?;
        entries.sort_by_key(|e| e.created_at);
        Ok(entries)
    }

    // ========== Evacuation ==========

    /// Start an evacuation and take the roll of everyone on site
    pub async fn start_evacuation(
        &self,
        company: &CompanyId,
        actor: Option<&str>,
        location_id: Option<String>,
    ) -> Result<Evacuation> {
        if let Some(active) = self.store.evacuations.find_active_evacuation(company)? {
            return Err(VmsError::Conflict(format!("evacuation {} is already active", active.id)));
        }

        let visits = self.store.visits.list_on_site(company, location_id.as_deref())?;
        let visitors = self
            .provider
            .list_visitors(
                company,
                &VisitorFilter {
                    include_erased: true,
                    ..Default::default()
                },
            )
            .await?;
        let employees = self
            .provider
            .list_employees(
                company,
                &EmployeeFilter {
                    active: Some(true),
                    ..Default::default()
                },
            )
            .await?;
        let roll = build_roll(&visits, &visitors, &employees, location_id.as_deref());

        let evacuation = Evacuation::start(
            company.clone(),
            location_id,
            actor.map(str::to_string),
            roll,
            Utc::now(),
        );
        self.store.evacuations.save(&evacuation)?;
        self.record(company, AuditEventType::EvacuationStarted, actor, &evacuation.id);

        self.logger.warn(
            "Evacuation started",
            Some(&meta([
                ("company", company.as_str()),
                ("evacuation", evacuation.id.as_str()),
                ("people", evacuation.roll.len().to_string().as_str()),
            ])),
        );
        Ok(evacuation)
    }

    /// Mark a person on the roll as safe
    pub fn account_person(&self, company: &CompanyId, evacuation_id: &str, person_id: &str) -> Result<RollCallEntry> {
        let mut evacuation = self.store.evacuations.get(company, evacuation_id)?;
        let entry = evacuation.account(person_id, Utc::now())?.clone();
        self.store.evacuations.save(&evacuation)?;
        Ok(entry)
    }

    pub fn close_evacuation(&self, company: &CompanyId, actor: Option<&str>, evacuation_id: &str) -> Result<EvacuationReport> {
        let mut evacuation = self.store.evacuations.get(company, evacuation_id)?;
        let report = evacuation.close(Utc::now())?;
        self.store.evacuations.save(&evacuation)?;
        self.audit_mut().log(
            audit::AuditEntry::new(company, AuditEventType::EvacuationClosed)
                .by(actor)
                .about(&evacuation.id)
                .with_metadata(serde_json::json!({
                    "total": report.total,
                    "accounted": report.accounted,
                })),
        );

        if !report.unaccounted.is_empty() {
            self.logger.warn(
                &format!("Evacuation closed with {} people unaccounted for", report.unaccounted.len()),
                Some(&meta([("company", company.as_str()), ("evacuation", evacuation.id.as_str())])),
            );
        }
        Ok(report)
    }

    pub fn active_evacuation(&self, company: &CompanyId) -> Result<Option<Evacuation>> {
        Ok(self.store.evacuations.find_active_evacuation(company)?)
    }

    // ========== Reports ==========

    pub fn visit_report(&self, company: &CompanyId, from: DateTime<Utc>, to: DateTime<Utc>) -> Result<VisitSummary> {
        validate_window(from, to)?;
        let visits = self.store.visits.list_visits_between(company, from, to)?;
        Ok(summarize_visits(&visits, from, to))
    }
}
