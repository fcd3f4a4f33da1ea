//! Employees, visitors and locations
//!
//! GET   /employees                 - list (filters: active, department, locationId, search)
//! POST  /employees                 - register
//! GET   /employees/:id             - fetch by local or Platform id
//! PATCH /employees/:id             - partial update
//! POST  /employees/:id/deactivate  - stop hosting visits
//! GET   /visitors                  - list (filters: search, includeErased)
//! POST  /visitors                  - register with watchlist screening
//! GET   /visitors/:id              - fetch
//! PATCH /visitors/:id              - partial update
//! GET   /visitors/:id/export       - everything held about the visitor
//! POST  /visitors/:id/erase        - anonymize
//! POST  /visitors/:id/embedding    - request a face embedding
//! GET   /locations                 - list
//! POST  /locations                 - create (local residency only)

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use vms_core::{EmbeddingJob, EmployeeFilter, VisitorExport, VisitorFilter, VisitorRegistration, WriteOutcome, WriteResult};
use vms_domain::{Employee, EmployeeUpdate, Location, NewEmployee, NewLocation, NewVisitor, Visitor, VisitorUpdate};

use crate::error::{created, ok, ApiResult};
use crate::tenant::Tenant;
use crate::AppState;

// ========== Employees ==========

pub async fn list_employees(
    State(core): State<AppState>,
    tenant: Tenant,
    Query(filter): Query<EmployeeFilter>,
) -> ApiResult<Vec<Employee>> {
    ok(core.list_employees(&tenant.company, &filter).await?)
}

pub async fn register_employee(
    State(core): State<AppState>,
    tenant: Tenant,
    Json(new): Json<NewEmployee>,
) -> ApiResult<WriteOutcome<Employee>> {
    created(core.register_employee(&tenant.company, tenant.user(), new).await?)
}

pub async fn get_employee(State(core): State<AppState>, tenant: Tenant, Path(id): Path<String>) -> ApiResult<Employee> {
    ok(core.get_employee(&tenant.company, &id).await?)
}

pub async fn update_employee(
    State(core): State<AppState>,
    tenant: Tenant,
    Path(id): Path<String>,
    Json(update): Json<EmployeeUpdate>,
) -> ApiResult<WriteOutcome<Employee>> {
    ok(core.update_employee(&tenant.company, tenant.user(), &id, update).await?)
}

pub async fn deactivate_employee(
    State(core): State<AppState>,
    tenant: Tenant,
    Path(id): Path<String>,
) -> ApiResult<WriteOutcome<Employee>> {
    ok(core.deactivate_employee(&tenant.company, tenant.user(), &id).await?)
}

// ========== Visitors ==========

pub async fn list_visitors(
    State(core): State<AppState>,
    tenant: Tenant,
    Query(filter): Query<VisitorFilter>,
) -> ApiResult<Vec<Visitor>> {
    ok(core.list_visitors(&tenant.company, &filter).await?)
}

pub async fn register_visitor(
    State(core): State<AppState>,
    tenant: Tenant,
    Json(new): Json<NewVisitor>,
) -> ApiResult<VisitorRegistration> {
    created(core.register_visitor(&tenant.company, tenant.user(), new).await?)
}

pub async fn get_visitor(State(core): State<AppState>, tenant: Tenant, Path(id): Path<String>) -> ApiResult<Visitor> {
    ok(core.get_visitor(&tenant.company, &id).await?)
}

pub async fn update_visitor(
    State(core): State<AppState>,
    tenant: Tenant,
    Path(id): Path<String>,
    Json(update): Json<VisitorUpdate>,
) -> ApiResult<WriteOutcome<Visitor>> {
    ok(core.update_visitor(&tenant.company, tenant.user(), &id, update).await?)
}

pub async fn export_visitor(
    State(core): State<AppState>,
    tenant: Tenant,
    Path(id): Path<String>,
) -> ApiResult<VisitorExport> {
    ok(core.export_visitor(&tenant.company, tenant.user(), &id).await?)
}

pub async fn erase_visitor(
    State(core): State<AppState>,
    tenant: Tenant,
    Path(id): Path<String>,
) -> ApiResult<WriteOutcome<Visitor>> {
    ok(core.erase_visitor(&tenant.company, tenant.user(), &id).await?)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmbeddingRequest {
    pub image_ref: String,
}

pub async fn request_embedding(
    State(core): State<AppState>,
    tenant: Tenant,
    Path(id): Path<String>,
    Json(request): Json<EmbeddingRequest>,
) -> ApiResult<WriteResult<EmbeddingJob>> {
    let result = core
        .request_visitor_embedding(&tenant.company, tenant.user(), &id, &request.image_ref)
        .await?;
    ok(result)
}

// ========== Locations ==========

pub async fn list_locations(State(core): State<AppState>, tenant: Tenant) -> ApiResult<Vec<Location>> {
    ok(core.list_locations(&tenant.company).await?)
}

pub async fn create_location(
    State(core): State<AppState>,
    tenant: Tenant,
    Json(new): Json<NewLocation>,
) -> ApiResult<WriteOutcome<Location>> {
    created(core.create_location(&tenant.company, new).await?)
}
