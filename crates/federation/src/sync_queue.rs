//! SyncQueue - Durable list of Platform writes waiting to be retried
//!
//! ```text
//! pending ──claim──▶ in_progress ──complete──▶ completed
//!    ▲                    │
//!    └──── retryable ─────┤
//!                         └── permanent / out of attempts ──▶ failed ──retry──▶ pending
//! ```

use std::collections::HashMap;
use std::fs::OpenOptions;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, RwLock};
use std::time::{Duration as StdDuration, Instant};

use chrono::{DateTime, Duration, Utc};
use platform::{ActorPayload, Attributes};
use serde::{Deserialize, Serialize};
use shared::{CompanyId, EntityType, InvalidTransitionError, Result, SyncConfig, VmsError};

/// The write to replay against the Platform
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SyncKind {
    CreateActor {
        payload: ActorPayload,
    },
    #[serde(rename_all = "camelCase")]
    UpdateActor {
        actor_id: String,
        payload: ActorPayload,
    },
    #[serde(rename_all = "camelCase")]
    DeleteActor {
        actor_id: String,
    },
    #[serde(rename_all = "camelCase")]
    RequestEmbedding {
        actor_id: String,
        image_ref: String,
    },
}

impl SyncKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncKind::CreateActor { .. } => "create_actor",
            SyncKind::UpdateActor { .. } => "update_actor",
            SyncKind::DeleteActor { .. } => "delete_actor",
            SyncKind::RequestEmbedding { .. } => "request_embedding",
        }
    }

    pub fn actor_id(&self) -> Option<&str> {
        match self {
            SyncKind::CreateActor { .. } => None,
            SyncKind::UpdateActor { actor_id, .. }
            | SyncKind::DeleteActor { actor_id }
            | SyncKind::RequestEmbedding { actor_id, .. } => Some(actor_id.as_str()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl SyncStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStatus::Pending => "pending",
            SyncStatus::InProgress => "in_progress",
            SyncStatus::Completed => "completed",
            SyncStatus::Failed => "failed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "pending" => Some(SyncStatus::Pending),
            "in_progress" => Some(SyncStatus::InProgress),
            "completed" => Some(SyncStatus::Completed),
            "failed" => Some(SyncStatus::Failed),
            _ => None,
        }
    }

    /// Still has to reach the Platform
    pub fn is_active(&self) -> bool {
        matches!(self, SyncStatus::Pending | SyncStatus::InProgress)
    }
}

/// Queued Platform write
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncOperation {
    pub id: String,
    pub company_id: CompanyId,
    pub kind: SyncKind,
    pub entity_type: Option<EntityType>,
    /// Id of the local record this write came from
    pub local_ref: Option<String>,
    pub status: SyncStatus,
    pub attempts: u32,
    pub max_attempts: u32,
    pub next_attempt_at: DateTime<Utc>,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl SyncOperation {
    /// Ordering key: writes for the same key reach the Platform in creation order
    pub fn target(&self) -> Option<&str> {
        self.local_ref.as_deref().or_else(|| self.kind.actor_id())
    }

    pub fn concerns(&self, target: &str) -> bool {
        self.local_ref.as_deref() == Some(target) || self.kind.actor_id() == Some(target)
    }

    fn invalid(&self, to: SyncStatus) -> VmsError {
        InvalidTransitionError::new("sync operation", self.status.as_str(), to.as_str()).into()
    }
}

/// Request to queue a write
#[derive(Debug, Clone)]
pub struct NewSyncOperation {
    pub company_id: CompanyId,
    pub kind: SyncKind,
    pub entity_type: Option<EntityType>,
    pub local_ref: Option<String>,
    pub last_error: Option<String>,
}

impl NewSyncOperation {
    pub fn new(company_id: CompanyId, kind: SyncKind) -> Self {
        Self {
            company_id,
            kind,
            entity_type: None,
            local_ref: None,
            last_error: None,
        }
    }

    pub fn for_entity(mut self, entity: EntityType) -> Self {
        self.entity_type = Some(entity);
        self
    }

    pub fn with_local_ref(mut self, local_ref: impl Into<String>) -> Self {
        self.local_ref = Some(local_ref.into());
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.last_error = Some(error.into());
        self
    }
}

/// Upper bound on any single delay (one year)
const MAX_DELAY_SECS: u64 = 365 * 24 * 3600;

/// Exponential backoff: `delay(n) = min(base * 2^n, max)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub base_secs: u64,
    pub max_secs: u64,
    pub max_attempts: u32,
}

impl BackoffPolicy {
    pub fn from_config(config: &SyncConfig) -> Self {
        Self {
            base_secs: config.base_delay_secs,
            max_secs: config.max_delay_secs,
            max_attempts: config.max_attempts,
        }
    }

    /// Delay after `retries` failed retries
    pub fn delay(&self, retries: u32) -> Duration {
        let factor = 2u64.checked_pow(retries).unwrap_or(u64::MAX);
        let secs = self.base_secs.saturating_mul(factor).min(self.max_secs).min(MAX_DELAY_SECS);
        Duration::seconds(secs as i64)
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::from_config(&SyncConfig::default())
    }
}

// ============================================================================
// Storage
// ============================================================================

/// Persistence port for queued operations
pub trait SyncQueueStore: Send + Sync {
    fn insert(&self, op: &SyncOperation) -> Result<()>;
    fn update(&self, op: &SyncOperation) -> Result<()>;
    fn get(&self, id: &str) -> Result<Option<SyncOperation>>;
    /// All operations in insertion order
    fn list(&self) -> Result<Vec<SyncOperation>>;
    fn remove(&self, id: &str) -> Result<bool>;
}

fn poisoned() -> VmsError {
    VmsError::Storage("sync queue lock poisoned".to_string())
}

/// In-memory queue storage; lost on restart
#[derive(Debug, Default)]
pub struct InMemorySyncQueueStore {
    ops: RwLock<Vec<SyncOperation>>,
}

impl InMemorySyncQueueStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SyncQueueStore for InMemorySyncQueueStore {
    fn insert(&self, op: &SyncOperation) -> Result<()> {
        self.ops.write().map_err(|_| poisoned())?.push(op.clone());
        Ok(())
    }

    fn update(&self, op: &SyncOperation) -> Result<()> {
        let mut ops = self.ops.write().map_err(|_| poisoned())?;
        let slot = ops
            .iter_mut()
            .find(|o| o.id == op.id)
            .ok_or_else(|| VmsError::not_found("sync operation", &op.id))?;
        *slot = op.clone();
        Ok(())
    }

    fn get(&self, id: &str) -> Result<Option<SyncOperation>> {
        let ops = self.ops.read().map_err(|_| poisoned())?;
        Ok(ops.iter().find(|o| o.id == id).cloned())
    }

    fn list(&self) -> Result<Vec<SyncOperation>> {
        Ok(self.ops.read().map_err(|_| poisoned())?.clone())
    }

    fn remove(&self, id: &str) -> Result<bool> {
        let mut ops = self.ops.write().map_err(|_| poisoned())?;
        let before = ops.len();
        ops.retain(|o| o.id != id);
        Ok(ops.len() != before)
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct QueueDocument {
    version: u32,
    operations: Vec<SyncOperation>,
}

/// Queue storage kept in a single JSON document
///
/// Every change reloads the document under a lock file, applies the change
/// and renames a rewritten copy into place, so a server and CLI commands can
/// share one queue file.
#[derive(Debug)]
pub struct JsonFileSyncQueueStore {
    path: PathBuf,
    guard: Mutex<()>,
}

const LOCK_WAIT: StdDuration = StdDuration::from_secs(5);
const LOCK_RETRY: StdDuration = StdDuration::from_millis(10);
const LOCK_ABANDONED_AFTER: StdDuration = StdDuration::from_secs(30);

/// Held while a process reads, changes and rewrites the queue document
struct FileLock {
    path: PathBuf,
}

impl FileLock {
    fn acquire(path: PathBuf) -> Result<Self> {
        let deadline = Instant::now() + LOCK_WAIT;
        loop {
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(_) => return Ok(Self { path }),
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                    if is_abandoned(&path) {
                        tracing::warn!("Removing abandoned queue lock {}", path.display());
                        remove_lock(&path);
                        continue;
                    }
                    if Instant::now() >= deadline {
                        return Err(VmsError::Storage(format!("queue file is locked: {}", path.display())));
                    }
                    std::thread::sleep(LOCK_RETRY);
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        remove_lock(&self.path);
    }
}

fn remove_lock(path: &Path) {
    if let Err(e) = std::fs::remove_file(path) {
        if e.kind() != io::ErrorKind::NotFound {
            tracing::warn!("Could not remove queue lock {}: {}", path.display(), e);
        }
    }
}

/// A lock left behind by a process that died while holding it
fn is_abandoned(path: &Path) -> bool {
    std::fs::metadata(path)
        .and_then(|m| m.modified())
        .ok()
        .and_then(|modified| modified.elapsed().ok())
        .is_some_and(|age| age > LOCK_ABANDONED_AFTER)
}

impl JsonFileSyncQueueStore {
    /// Open the document at `path`, creating it on first write
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let store = Self {
            path: path.into(),
            guard: Mutex::new(()),
        };
        store.load()?;
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock_path(&self) -> PathBuf {
        let mut name = self.path.clone().into_os_string();
        name.push(".lock");
        PathBuf::from(name)
    }

    fn load(&self) -> Result<Vec<SyncOperation>> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }
        Ok(serde_json::from_str::<QueueDocument>(&content)?.operations)
    }

    fn persist(&self, ops: &[SyncOperation]) -> Result<()> {
        let document = QueueDocument {
            version: 1,
            operations: ops.to_vec(),
        };
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, serde_json::to_vec_pretty(&document)?)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    /// Snapshot of the document as currently on disk
    fn read(&self) -> Result<Vec<SyncOperation>> {
        let _guard = self.guard.lock().map_err(|_| poisoned())?;
        self.load()
    }

    /// Reload, apply `change` and persist when it reports a modification
    fn modify<R>(&self, change: impl FnOnce(&mut Vec<SyncOperation>) -> Result<(R, bool)>) -> Result<R> {
        let _guard = self.guard.lock().map_err(|_| poisoned())?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let _lock = FileLock::acquire(self.lock_path())?;
        let mut ops = self.load()?;
        let (result, changed) = change(&mut ops)?;
        if changed {
            self.persist(&ops)?;
        }
        Ok(result)
    }
}

impl SyncQueueStore for JsonFileSyncQueueStore {
    fn insert(&self, op: &SyncOperation) -> Result<()> {
        self.modify(|ops| {
            ops.push(op.clone());
            Ok(((), true))
        })
    }

    fn update(&self, op: &SyncOperation) -> Result<()> {
        self.modify(|ops| {
            let slot = ops
                .iter_mut()
                .find(|o| o.id == op.id)
                .ok_or_else(|| VmsError::not_found("sync operation", &op.id))?;
            *slot = op.clone();
            Ok(((), true))
        })
    }

    fn get(&self, id: &str) -> Result<Option<SyncOperation>> {
        Ok(self.read()?.into_iter().find(|o| o.id == id))
    }

    fn list(&self) -> Result<Vec<SyncOperation>> {
        self.read()
    }

    fn remove(&self, id: &str) -> Result<bool> {
        self.modify(|ops| {
            let before = ops.len();
            ops.retain(|o| o.id != id);
            let removed = ops.len() != before;
            Ok((removed, removed))
        })
    }
}

// ============================================================================
// Queue
// ============================================================================

/// Filter for listing operations
#[derive(Debug, Clone, Default)]
pub struct SyncFilter {
    pub company_id: Option<CompanyId>,
    pub status: Option<SyncStatus>,
    pub limit: Option<usize>,
}

/// Counts per status
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStats {
    pub pending: usize,
    pub in_progress: usize,
    pub completed: usize,
    pub failed: usize,
    pub oldest_pending_at: Option<DateTime<Utc>>,
}

impl SyncStats {
    pub fn total(&self) -> usize {
        self.pending + self.in_progress + self.completed + self.failed
    }
}

/// Retry queue over a `SyncQueueStore`
///
/// Read-modify-write sequences are serialized by an internal lock.
pub struct SyncQueue {
    store: Box<dyn SyncQueueStore>,
    policy: BackoffPolicy,
    guard: Mutex<()>,
}

impl SyncQueue {
    pub fn new(store: Box<dyn SyncQueueStore>, policy: BackoffPolicy) -> Self {
        Self {
            store,
            policy,
            guard: Mutex::new(()),
        }
    }

    /// In-memory queue with the default policy
    pub fn in_memory() -> Self {
        Self::new(Box::new(InMemorySyncQueueStore::new()), BackoffPolicy::default())
    }

    /// Queue described by configuration: file-backed when a store path is set
    pub fn from_config(config: &SyncConfig) -> Result<Self> {
        let store: Box<dyn SyncQueueStore> = match &config.store_path {
            Some(path) => Box::new(JsonFileSyncQueueStore::open(path)?),
            None => Box::new(InMemorySyncQueueStore::new()),
        };
        Ok(Self::new(store, BackoffPolicy::from_config(config)))
    }

    pub fn policy(&self) -> &BackoffPolicy {
        &self.policy
    }

    fn serialize(&self) -> Result<MutexGuard<'_, ()>> {
        self.guard.lock().map_err(|_| poisoned())
    }

    fn load(&self, id: &str) -> Result<SyncOperation> {
        self.store
            .get(id)?
            .ok_or_else(|| VmsError::not_found("sync operation", id))
    }

    /// Queue a write, folding it into a waiting operation where possible
    pub fn enqueue(&self, new: NewSyncOperation, now: DateTime<Utc>) -> Result<SyncOperation> {
        let _guard = self.serialize()?;
        let waiting: Vec<SyncOperation> = self
            .store
            .list()?
            .into_iter()
            .filter(|o| o.company_id == new.company_id && o.status == SyncStatus::Pending)
            .collect();

        match &new.kind {
            SyncKind::UpdateActor { actor_id, payload } => {
                let same_actor = waiting.iter().find(|o| {
                    matches!(&o.kind, SyncKind::UpdateActor { actor_id: id, .. } if id == actor_id)
                });
                if let Some(existing) = same_actor {
                    return self.merge_into(existing.clone(), payload, new.last_error, now);
                }
                if let Some(create) = Self::waiting_create(&waiting, new.local_ref.as_deref()) {
                    return self.merge_into(create.clone(), payload, new.last_error, now);
                }
            }
            SyncKind::CreateActor { payload } => {
                if let Some(create) = Self::waiting_create(&waiting, new.local_ref.as_deref()) {
                    return self.merge_into(create.clone(), payload, new.last_error, now);
                }
            }
            SyncKind::DeleteActor { actor_id } => {
                for stale in waiting.iter().filter(|o| {
                    matches!(&o.kind, SyncKind::UpdateActor { actor_id: id, .. } if id == actor_id)
                }) {
                    self.store.remove(&stale.id)?;
                }
            }
            SyncKind::RequestEmbedding { .. } => {}
        }

        let op = SyncOperation {
            id: uuid::Uuid::new_v4().to_string(),
            company_id: new.company_id,
            kind: new.kind,
            entity_type: new.entity_type,
            local_ref: new.local_ref,
            status: SyncStatus::Pending,
            attempts: 0,
            max_attempts: self.policy.max_attempts,
            next_attempt_at: now + self.policy.delay(0),
            last_error: new.last_error,
            created_at: now,
            updated_at: now,
            completed_at: None,
        };
        self.store.insert(&op)?;
        Ok(op)
    }

    fn waiting_create<'a>(waiting: &'a [SyncOperation], local_ref: Option<&str>) -> Option<&'a SyncOperation> {
        let local_ref = local_ref?;
        waiting
            .iter()
            .find(|o| matches!(o.kind, SyncKind::CreateActor { .. }) && o.local_ref.as_deref() == Some(local_ref))
    }

    fn merge_into(
        &self,
        mut op: SyncOperation,
        payload: &ActorPayload,
        last_error: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<SyncOperation> {
        if let SyncKind::CreateActor { payload: target } | SyncKind::UpdateActor { payload: target, .. } = &mut op.kind {
            merge_attributes(&mut target.attributes, &payload.attributes);
        }
        if last_error.is_some() {
            op.last_error = last_error;
        }
        op.updated_at = now;
        self.store.update(&op)?;
        Ok(op)
    }

    /// Pending operations due at `now`, by due time then creation
    pub fn due(&self, now: DateTime<Utc>, limit: usize) -> Result<Vec<SyncOperation>> {
        let mut due: Vec<SyncOperation> = self
            .store
            .list()?
            .into_iter()
            .filter(|o| o.status == SyncStatus::Pending && o.next_attempt_at <= now)
            .collect();
        due.sort_by(|a, b| {
            a.next_attempt_at
                .cmp(&b.next_attempt_at)
                .then_with(|| a.created_at.cmp(&b.created_at))
        });
        due.truncate(limit);
        Ok(due)
    }

    /// An older operation for the same target is still waiting
    pub fn has_earlier_active(&self, op: &SyncOperation) -> Result<bool> {
        let Some(target) = op.target() else {
            return Ok(false);
        };
        Ok(self.store.list()?.iter().any(|o| {
            o.id != op.id
                && o.company_id == op.company_id
                && o.status.is_active()
                && o.target() == Some(target)
                && o.created_at < op.created_at
        }))
    }

    /// pending → in_progress
    pub fn claim(&self, id: &str, now: DateTime<Utc>) -> Result<SyncOperation> {
        let _guard = self.serialize()?;
        let mut op = self.load(id)?;
        if op.status != SyncStatus::Pending {
            return Err(op.invalid(SyncStatus::InProgress));
        }
        op.status = SyncStatus::InProgress;
        op.updated_at = now;
        self.store.update(&op)?;
        Ok(op)
    }

    pub fn complete(&self, id: &str, now: DateTime<Utc>) -> Result<SyncOperation> {
        let _guard = self.serialize()?;
        let mut op = self.load(id)?;
        if op.status != SyncStatus::InProgress {
            return Err(op.invalid(SyncStatus::Completed));
        }
        op.status = SyncStatus::Completed;
        op.completed_at = Some(now);
        op.updated_at = now;
        self.store.update(&op)?;
        Ok(op)
    }

    /// Record a failed attempt; permanent errors and exhausted attempts fail the operation
    pub fn record_failure(&self, id: &str, error: &str, retryable: bool, now: DateTime<Utc>) -> Result<SyncOperation> {
        let _guard = self.serialize()?;
        let mut op = self.load(id)?;
        if !op.status.is_active() {
            return Err(op.invalid(SyncStatus::Failed));
        }
        op.attempts += 1;
        op.last_error = Some(error.to_string());
        op.updated_at = now;
        if !retryable || op.attempts >= op.max_attempts {
            op.status = SyncStatus::Failed;
        } else {
            op.status = SyncStatus::Pending;
            op.next_attempt_at = now + self.policy.delay(op.attempts);
        }
        self.store.update(&op)?;
        Ok(op)
    }

    /// failed → pending, due immediately with a fresh attempt budget
    pub fn retry(&self, id: &str, now: DateTime<Utc>) -> Result<SyncOperation> {
        let _guard = self.serialize()?;
        let mut op = self.load(id)?;
        if op.status != SyncStatus::Failed {
            return Err(op.invalid(SyncStatus::Pending));
        }
        op.status = SyncStatus::Pending;
        op.attempts = 0;
        op.next_attempt_at = now;
        op.updated_at = now;
        self.store.update(&op)?;
        Ok(op)
    }

    /// Drop a pending operation
    pub fn cancel(&self, id: &str) -> Result<SyncOperation> {
        let _guard = self.serialize()?;
        let op = self.load(id)?;
        if op.status != SyncStatus::Pending {
            return Err(InvalidTransitionError::new("sync operation", op.status.as_str(), "cancelled").into());
        }
        self.store.remove(id)?;
        Ok(op)
    }

    /// Drop every pending operation that came from a local record
    pub fn cancel_pending_for(&self, company: &CompanyId, local_ref: &str) -> Result<usize> {
        let _guard = self.serialize()?;
        let mut removed = 0;
        for op in self.store.list()? {
            if &op.company_id == company && op.status == SyncStatus::Pending && op.local_ref.as_deref() == Some(local_ref) {
                if self.store.remove(&op.id)? {
                    removed += 1;
                }
            }
        }
        Ok(removed)
    }

    /// Some write for `target` (actor id or local reference) has not reached the Platform yet
    pub fn has_pending_for(&self, company: &CompanyId, target: &str) -> Result<bool> {
        Ok(self
            .store
            .list()?
            .iter()
            .any(|o| &o.company_id == company && o.status.is_active() && o.concerns(target)))
    }

    pub fn get(&self, id: &str) -> Result<Option<SyncOperation>> {
        self.store.get(id)
    }

    /// Operations matching a filter, newest first
    pub fn list(&self, filter: &SyncFilter) -> Result<Vec<SyncOperation>> {
        let mut ops: Vec<SyncOperation> = self
            .store
            .list()?
            .into_iter()
            .filter(|o| filter.company_id.as_ref().map_or(true, |c| &o.company_id == c))
            .filter(|o| filter.status.map_or(true, |s| o.status == s))
            .collect();
        ops.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        if let Some(limit) = filter.limit {
            ops.truncate(limit);
        }
        Ok(ops)
    }

    pub fn stats(&self, company: Option<&CompanyId>) -> Result<SyncStats> {
        let mut stats = SyncStats::default();
        for op in self.store.list()? {
            if company.map_or(false, |c| &op.company_id != c) {
                continue;
            }
            match op.status {
                SyncStatus::Pending => {
                    stats.pending += 1;
                    stats.oldest_pending_at = Some(match stats.oldest_pending_at {
                        Some(t) if t <= op.created_at => t,
                        _ => op.created_at,
                    });
                }
                SyncStatus::InProgress => stats.in_progress += 1,
                SyncStatus::Completed => stats.completed += 1,
                SyncStatus::Failed => stats.failed += 1,
            }
        }
        Ok(stats)
    }

    /// Remove completed operations finished before `before`
    pub fn purge_completed(&self, before: DateTime<Utc>) -> Result<usize> {
        let _guard = self.serialize()?;
        let mut removed = 0;
        for op in self.store.list()? {
            let finished_before = op.completed_at.map_or(false, |t| t < before);
            if op.status == SyncStatus::Completed && finished_before && self.store.remove(&op.id)? {
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Return operations left in progress since before `before` (a crashed worker) to pending
    pub fn recover_stale(&self, before: DateTime<Utc>, now: DateTime<Utc>) -> Result<usize> {
        let _guard = self.serialize()?;
        let mut recovered = 0;
        for mut op in self.store.list()? {
            if op.status == SyncStatus::InProgress && op.updated_at < before {
                op.status = SyncStatus::Pending;
                op.next_attempt_at = now;
                op.updated_at = now;
                self.store.update(&op)?;
                recovered += 1;
            }
        }
        Ok(recovered)
    }

    /// Counts by kind, for diagnostics
    pub fn kinds(&self, company: &CompanyId) -> Result<HashMap<&'static str, usize>> {
        let mut kinds = HashMap::new();
        for op in self.store.list()?.iter().filter(|o| &o.company_id == company && o.status.is_active()) {
            *kinds.entry(op.kind.as_str()).or_default() += 1;
        }
        Ok(kinds)
    }
}

/// Later values win
fn merge_attributes(target: &mut Attributes, update: &Attributes) {
    for (key, value) in update {
        target.insert(key.clone(), value.clone());
    }
}
