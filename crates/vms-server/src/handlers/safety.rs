//! Watchlist, evacuations and reports

use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use vms_domain::service::reports::VisitSummary;
use vms_domain::service::screening::{ScreeningOutcome, ScreeningSubject};
use vms_domain::{Evacuation, EvacuationReport, NewWatchlistEntry, RollCallEntry, WatchlistEntry};

use crate::error::{created, ok, ApiResult};
use crate::tenant::Tenant;
use crate::AppState;

// ========== Watchlist ==========

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchlistQuery {
    #[serde(default)]
    pub include_inactive: bool,
}

pub async fn list_watchlist(
    State(core): State<AppState>,
    tenant: Tenant,
    Query(query): Query<WatchlistQuery>,
) -> ApiResult<Vec<WatchlistEntry>> {
    ok(core.list_watchlist(&tenant.company, query.include_inactive)?)
}

pub async fn add_watchlist_entry(
    State(core): State<AppState>,
    tenant: Tenant,
    Json(new): Json<NewWatchlistEntry>,
) -> ApiResult<WatchlistEntry> {
    created(core.add_watchlist_entry(&tenant.company, tenant.user(), new)?)
}

pub async fn deactivate_watchlist_entry(
    State(core): State<AppState>,
    tenant: Tenant,
    Path(id): Path<String>,
) -> ApiResult<WatchlistEntry> {
    ok(core.deactivate_watchlist_entry(&tenant.company, tenant.user(), &id)?)
}

pub async fn screen(
    State(core): State<AppState>,
    tenant: Tenant,
    Json(subject): Json<ScreeningSubject>,
) -> ApiResult<ScreeningOutcome> {
    ok(core.screen(&tenant.company, &subject)?)
}

// ========== Evacuations ==========

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartEvacuation {
    pub location_id: Option<String>,
}

pub async fn start_evacuation(
    State(core): State<AppState>,
    tenant: Tenant,
    Json(request): Json<StartEvacuation>,
) -> ApiResult<Evacuation> {
    created(
        core.start_evacuation(&tenant.company, tenant.user(), request.location_id)
            .await?,
    )
}

pub async fn active_evacuation(State(core): State<AppState>, tenant: Tenant) -> ApiResult<Option<Evacuation>> {
    ok(core.active_evacuation(&tenant.company)?)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountRequest {
    pub person_id: String,
}

pub async fn account_person(
    State(core): State<AppState>,
    tenant: Tenant,
    Path(id): Path<String>,
    Json(request): Json<AccountRequest>,
) -> ApiResult<RollCallEntry> {
    ok(core.account_person(&tenant.company, &id, &request.person_id)?)
}

pub async fn close_evacuation(
    State(core): State<AppState>,
    tenant: Tenant,
    Path(id): Path<String>,
) -> ApiResult<EvacuationReport> {
    ok(core.close_evacuation(&tenant.company, tenant.user(), &id)?)
}

// ========== Reports ==========

#[derive(Debug, Deserialize)]
pub struct ReportQuery {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

pub async fn visit_report(
    State(core): State<AppState>,
    tenant: Tenant,
    Query(query): Query<ReportQuery>,
) -> ApiResult<VisitSummary> {
    ok(core.visit_report(&tenant.company, query.from, query.to)?)
}
