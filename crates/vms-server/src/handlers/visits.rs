//! Visits and approvals

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use vms_core::{ApprovalDecision, VisitQuery};
use vms_domain::{Approval, NewVisit, Visit};

use crate::error::{created, ok, ApiResult};
use crate::tenant::Tenant;
use crate::AppState;

pub async fn list_visits(
    State(core): State<AppState>,
    tenant: Tenant,
    Query(query): Query<VisitQuery>,
) -> ApiResult<Vec<Visit>> {
    ok(core.list_visits(&tenant.company, &query)?)
}

pub async fn schedule_visit(State(core): State<AppState>, tenant: Tenant, Json(new): Json<NewVisit>) -> ApiResult<Visit> {
    created(core.schedule_visit(&tenant.company, tenant.user(), new).await?)
}

pub async fn walk_in(State(core): State<AppState>, tenant: Tenant, Json(new): Json<NewVisit>) -> ApiResult<Visit> {
    created(core.walk_in(&tenant.company, tenant.user(), new).await?)
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OnSiteQuery {
    pub location_id: Option<String>,
}

pub async fn on_site(
    State(core): State<AppState>,
    tenant: Tenant,
    Query(query): Query<OnSiteQuery>,
) -> ApiResult<Vec<Visit>> {
    ok(core.on_site(&tenant.company, query.location_id.as_deref())?)
}

pub async fn get_visit(State(core): State<AppState>, tenant: Tenant, Path(id): Path<String>) -> ApiResult<Visit> {
    ok(core.get_visit(&tenant.company, &id)?)
}

pub async fn check_in(State(core): State<AppState>, tenant: Tenant, Path(id): Path<String>) -> ApiResult<Visit> {
    ok(core.check_in(&tenant.company, tenant.user(), &id).await?)
}

pub async fn check_out(State(core): State<AppState>, tenant: Tenant, Path(id): Path<String>) -> ApiResult<Visit> {
    ok(core.check_out(&tenant.company, tenant.user(), &id)?)
}

pub async fn cancel_visit(State(core): State<AppState>, tenant: Tenant, Path(id): Path<String>) -> ApiResult<Visit> {
    ok(core.cancel_visit(&tenant.company, tenant.user(), &id)?)
}

// ========== Approvals ==========

#[derive(Debug, Default, Deserialize)]
pub struct ApprovalQuery {
    pub approver: Option<String>,
}

pub async fn pending_approvals(
    State(core): State<AppState>,
    tenant: Tenant,
    Query(query): Query<ApprovalQuery>,
) -> ApiResult<Vec<Approval>> {
    ok(core.pending_approvals(&tenant.company, query.approver.as_deref())?)
}

pub async fn decide_approval(
    State(core): State<AppState>,
    tenant: Tenant,
    Path(id): Path<String>,
    Json(decision): Json<ApprovalDecision>,
) -> ApiResult<Approval> {
    ok(core.decide_approval(&tenant.company, tenant.user(), &id, decision)?)
}
