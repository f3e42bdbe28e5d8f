//! Persistence boundary.
//!
//! Defines the [`RecordBackend`] trait the coordinator talks to and provides
//! [`MemoryBackend`], an owner-scoped in-process implementation. The JSON
//! file backend in [`crate::file_store`] shares the same table logic.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::error::{DossierError, Result};
use crate::models::{Record, RecordBody, ResourceKind};
use crate::patch::RecordPatch;

/// Async trait for record persistence.
///
/// Every call is scoped to one kind and one owner. Ids the owner does not
/// hold are reported exactly like ids that do not exist.
#[async_trait]
pub trait RecordBackend: Send + Sync {
    /// All records of `kind` owned by `owner`, most recently created first.
    async fn list(&self, kind: ResourceKind, owner: &str) -> Result<Vec<Record>>;

    /// Persist a draft. The backend assigns the id and timestamps.
    async fn create(&self, kind: ResourceKind, owner: &str, draft: RecordBody) -> Result<Record>;

    /// Apply `patch` to the record `id` and return the stored result.
    async fn update(
        &self,
        kind: ResourceKind,
        owner: &str,
        id: &str,
        patch: &RecordPatch,
    ) -> Result<Record>;

    /// Delete the record `id`. Deleting an absent record succeeds.
    async fn delete(&self, kind: ResourceKind, owner: &str, id: &str) -> Result<()>;
}

fn check_kind(kind: ResourceKind, found: ResourceKind) -> Result<()> {
    if kind != found {
        return Err(DossierError::InvalidInput(format!(
            "{found} payload sent to the {kind} collection"
        )));
    }
    Ok(())
}

/// Flat list of every owner's records, newest first.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub(crate) struct RecordTable {
    records: Vec<Record>,
}

impl RecordTable {
    pub(crate) fn list(&self, kind: ResourceKind, owner: &str) -> Vec<Record> {
        self.records
            .iter()
            .filter(|r| r.kind() == kind && r.owner_id == owner)
            .cloned()
            .collect()
    }

    pub(crate) fn create(
        &mut self,
        kind: ResourceKind,
        owner: &str,
        draft: RecordBody,
    ) -> Result<Record> {
        check_kind(kind, draft.kind())?;
        let now = Utc::now();
        let record = Record {
            id: Uuid::new_v4().to_string(),
            owner_id: owner.to_string(),
            created_at: now,
            updated_at: now,
            body: draft,
        };
        self.records.insert(0, record.clone());
        Ok(record)
    }

    pub(crate) fn update(
        &mut self,
        kind: ResourceKind,
        owner: &str,
        id: &str,
        patch: &RecordPatch,
    ) -> Result<Record> {
        check_kind(kind, patch.kind())?;
        let slot = self
            .records
            .iter_mut()
            .find(|r| r.id == id && r.kind() == kind && r.owner_id == owner)
            .ok_or_else(|| DossierError::NotFound {
                kind,
                id: id.to_string(),
            })?;

        let mut body = slot.body.clone();
        patch.apply_to(&mut body)?;
        slot.body = body;
        slot.updated_at = Utc::now().max(slot.updated_at);
        Ok(slot.clone())
    }

    pub(crate) fn delete(&mut self, kind: ResourceKind, owner: &str, id: &str) -> bool {
        let before = self.records.len();
        self.records
            .retain(|r| !(r.id == id && r.kind() == kind && r.owner_id == owner));
        self.records.len() != before
    }
}

/// In-process backend, mainly for tests and embedding.
///
/// Supports one-shot fault injection and an artificial latency so callers
/// can observe in-flight state.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    table: Mutex<RecordTable>,
    fail_next: Mutex<Option<String>>,
    latency: Mutex<Option<Duration>>,
    calls: AtomicUsize,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next call fail with [`DossierError::Remote`].
    pub fn fail_next(&self, message: impl Into<String>) {
        *self.fail_next.lock() = Some(message.into());
    }

    /// Delay every call by `latency` before it touches the table.
    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock() = Some(latency);
    }

    /// Number of calls received so far, failed ones included.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Create a record directly, bypassing fault injection and the counter.
    pub fn seed(&self, owner: &str, draft: RecordBody) -> Result<Record> {
        self.table.lock().create(draft.kind(), owner, draft)
    }

    async fn enter(&self) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let latency = *self.latency.lock();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        match self.fail_next.lock().take() {
            Some(message) => Err(DossierError::Remote(message)),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl RecordBackend for MemoryBackend {
    async fn list(&self, kind: ResourceKind, owner: &str) -> Result<Vec<Record>> {
        self.enter().await?;
        Ok(self.table.lock().list(kind, owner))
    }

    async fn create(&self, kind: ResourceKind, owner: &str, draft: RecordBody) -> Result<Record> {
        self.enter().await?;
        let record = self.table.lock().create(kind, owner, draft)?;
        debug!(kind = %kind.slug(), id = %record.id, "created record");
        Ok(record)
    }

    async fn update(
        &self,
        kind: ResourceKind,
        owner: &str,
        id: &str,
        patch: &RecordPatch,
    ) -> Result<Record> {
        self.enter().await?;
        self.table.lock().update(kind, owner, id, patch)
    }

    async fn delete(&self, kind: ResourceKind, owner: &str, id: &str) -> Result<()> {
        self.enter().await?;
        let removed = self.table.lock().delete(kind, owner, id);
        debug!(kind = %kind.slug(), id, removed, "deleted record");
        Ok(())
    }
}
