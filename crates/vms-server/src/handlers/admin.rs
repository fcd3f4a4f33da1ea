//! Health, residency, sync queue and audit trail

use std::collections::BTreeMap;

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use shared::{EntityType, ResidencyMode};
use vms_core::{AuditEntry, AuditStats, Residency, SyncOperation, SyncStats, SyncStatus};

use crate::error::{ok, ApiResult};
use crate::tenant::Tenant;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct Health {
    pub status: &'static str,
    /// Platform reachability, absent without a Platform
    pub platform: Option<bool>,
}

pub async fn health(State(core): State<AppState>) -> ApiResult<Health> {
    ok(Health {
        status: "ok",
        platform: core.platform_health().await,
    })
}

// ========== Residency ==========

pub async fn residency(State(core): State<AppState>, tenant: Tenant) -> ApiResult<BTreeMap<EntityType, Residency>> {
    ok(core.residency(&tenant.company).await?)
}

#[derive(Debug, Deserialize)]
pub struct SetResidency {
    pub mode: ResidencyMode,
}

pub async fn set_residency(
    State(core): State<AppState>,
    tenant: Tenant,
    Path(entity): Path<String>,
    Json(request): Json<SetResidency>,
) -> ApiResult<Residency> {
    let entity: EntityType = entity.parse()?;
    ok(core
        .set_residency(&tenant.company, tenant.user(), entity, request.mode)
        .await?)
}

// ========== Sync ==========

pub async fn sync_stats(State(core): State<AppState>, tenant: Tenant) -> ApiResult<SyncStats> {
    ok(core.sync_stats(&tenant.company)?)
}

#[derive(Debug, Default, Deserialize)]
pub struct OperationsQuery {
    pub status: Option<SyncStatus>,
    pub limit: Option<usize>,
}

pub async fn sync_operations(
    State(core): State<AppState>,
    tenant: Tenant,
    Query(query): Query<OperationsQuery>,
) -> ApiResult<Vec<SyncOperation>> {
    ok(core.sync_operations(&tenant.company, query.status, query.limit)?)
}

pub async fn retry_operation(
    State(core): State<AppState>,
    tenant: Tenant,
    Path(id): Path<String>,
) -> ApiResult<SyncOperation> {
    ok(core.retry_sync_operation(&tenant.company, &id)?)
}

// ========== Audit ==========

const DEFAULT_AUDIT_LIMIT: usize = 100;

#[derive(Debug, Default, Deserialize)]
pub struct AuditQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct AuditPage {
    pub entries: Vec<AuditEntry>,
    pub stats: AuditStats,
}

pub async fn audit(State(core): State<AppState>, tenant: Tenant, Query(query): Query<AuditQuery>) -> ApiResult<AuditPage> {
    let limit = query.limit.unwrap_or(DEFAULT_AUDIT_LIMIT);
    ok(AuditPage {
        entries: core.recent_audit(&tenant.company, limit),
        stats: core.audit_stats(&tenant.company),
    })
}
