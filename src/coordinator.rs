//! Keeps the local store in step with the persistence boundary.
//!
//! Every operation names a kind, raises that kind's loading flag for its
//! duration, talks to the backend once and only then touches the store. A
//! failed call leaves the store exactly as it was.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, warn};

use crate::backend::RecordBackend;
use crate::error::{DossierError, Result};
use crate::filter::{self, SearchTerms};
use crate::identity::IdentityProvider;
use crate::models::{Record, RecordBody, ResourceKind};
use crate::patch::RecordPatch;
use crate::store::ResourceStore;

/// Lowers the loading flag when dropped, including when the owning future is
/// dropped before it completes.
struct LoadingGuard<'a> {
    counter: &'a AtomicUsize,
}

impl<'a> LoadingGuard<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self { counter }
    }
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::SeqCst);
    }
}

fn check_kind(kind: ResourceKind, payload: ResourceKind) -> Result<()> {
    if kind != payload {
        return Err(DossierError::InvalidInput(format!(
            "{payload} payload cannot be sent to the {kind} collection"
        )));
    }
    Ok(())
}

fn logged<T>(op: &'static str, kind: ResourceKind, result: Result<T>) -> Result<T> {
    if let Err(err) = &result {
        warn!(op, kind = %kind.slug(), error = %err, "sync failed");
    }
    result
}

/// Mediates between the presentation layer, the store and the backend.
pub struct SyncCoordinator {
    store: RwLock<ResourceStore>,
    search: RwLock<SearchTerms>,
    in_flight: [AtomicUsize; 6],
    last_owner: Mutex<Option<String>>,
    backend: Arc<dyn RecordBackend>,
    identity: Arc<dyn IdentityProvider>,
}

impl SyncCoordinator {
    pub fn new(backend: Arc<dyn RecordBackend>, identity: Arc<dyn IdentityProvider>) -> Self {
        Self {
            store: RwLock::new(ResourceStore::new()),
            search: RwLock::new(SearchTerms::default()),
            in_flight: Default::default(),
            last_owner: Mutex::new(None),
            backend,
            identity,
        }
    }

    /// The signed-in owner. Drops every cache when the owner has changed.
    fn owner(&self) -> Result<String> {
        let owner = self
            .identity
            .current_owner()
            .ok_or(DossierError::Unauthorized)?;

        let mut last = self.last_owner.lock();
        if last.as_deref() != Some(owner.as_str()) {
            if last.is_some() {
                debug!("owner changed, clearing cached records");
                self.store.write().clear();
            }
            *last = Some(owner.clone());
        }
        Ok(owner)
    }

    /// Apply a settled backend result to the store, unless the owner changed
    /// while the call was in flight. The cache only ever holds one owner's
    /// records.
    fn commit<T>(
        &self,
        owner: &str,
        apply: impl FnOnce(&mut ResourceStore) -> Result<T>,
    ) -> Result<T> {
        let last = self.last_owner.lock();
        if last.as_deref() != Some(owner) {
            debug!("owner changed during the call, discarding the result");
            return Err(DossierError::Unauthorized);
        }
        let mut store = self.store.write();
        apply(&mut store)
    }

    fn begin(&self, kind: ResourceKind) -> LoadingGuard<'_> {
        LoadingGuard::enter(&self.in_flight[kind.index()])
    }

    /// Reload the whole collection for `kind` from the backend.
    pub async fn refresh(&self, kind: ResourceKind) -> Result<()> {
        let owner = self.owner()?;
        let _loading = self.begin(kind);
        debug!(kind = %kind.slug(), "refreshing");

        let result = async {
            let records = self.backend.list(kind, &owner).await?;
            if let Some(stray) = records.iter().find(|r| r.owner_id != owner) {
                return Err(DossierError::Remote(format!(
                    "backend returned record {} of another owner",
                    stray.id
                )));
            }
            self.commit(&owner, |store| store.replace_collection(kind, records))
        }
        .await;
        logged("refresh", kind, result)
    }

    /// Persist `draft` and place the stored record at the front of the cache.
    pub async fn create(&self, kind: ResourceKind, draft: RecordBody) -> Result<Record> {
        check_kind(kind, draft.kind())?;
        let owner = self.owner()?;
        let _loading = self.begin(kind);
        debug!(kind = %kind.slug(), "creating");

        let result = async {
            let record = self.backend.create(kind, &owner, draft).await?;
            self.commit(&owner, |store| store.insert_record(kind, record.clone()))?;
            Ok(record)
        }
        .await;
        logged("create", kind, result)
    }

    /// Apply `patch` remotely and cache the record the backend returns.
    pub async fn update(&self, kind: ResourceKind, id: &str, patch: RecordPatch) -> Result<Record> {
        check_kind(kind, patch.kind())?;
        let owner = self.owner()?;
        let _loading = self.begin(kind);
        debug!(kind = %kind.slug(), id, "updating");

        let result = async {
            let record = self.backend.update(kind, &owner, id, &patch).await?;
            let cached = self.commit(&owner, |store| store.update_record(kind, id, record.clone()))?;
            if !cached {
                debug!(kind = %kind.slug(), id, "updated record was not cached");
            }
            Ok(record)
        }
        .await;
        logged("update", kind, result)
    }

    /// Delete `id` remotely, then drop it from the cache.
    pub async fn remove(&self, kind: ResourceKind, id: &str) -> Result<()> {
        let owner = self.owner()?;
        let _loading = self.begin(kind);
        debug!(kind = %kind.slug(), id, "removing");

        let result = async {
            self.backend.delete(kind, &owner, id).await?;
            self.commit(&owner, |store| {
                store.remove_record(kind, id);
                Ok(())
            })
        }
        .await;
        logged("remove", kind, result)
    }

    /// Whether a call for `kind` is outstanding.
    pub fn is_loading(&self, kind: ResourceKind) -> bool {
        self.in_flight[kind.index()].load(Ordering::SeqCst) > 0
    }

    pub fn search_term(&self, kind: ResourceKind) -> String {
        self.search.read().get(kind).to_string()
    }

    pub fn set_search_term(&self, kind: ResourceKind, term: impl Into<String>) {
        self.search.write().set(kind, term);
    }

    /// The cached collection narrowed by the kind's current search term.
    pub fn filtered(&self, kind: ResourceKind) -> Vec<Record> {
        let term = self.search_term(kind);
        let store = self.store.read();
        filter::filter(store.collection(kind), &term)
            .into_iter()
            .cloned()
            .collect()
    }

    /// Owned copy of the cached collection.
    pub fn snapshot(&self, kind: ResourceKind) -> Vec<Record> {
        self.store.read().collection(kind).to_vec()
    }

    pub fn find(&self, kind: ResourceKind, id: &str) -> Option<Record> {
        self.store.read().find(kind, id).cloned()
    }

    /// Look `id` up in every cached collection.
    pub fn find_any(&self, id: &str) -> Option<Record> {
        let store = self.store.read();
        ResourceKind::ALL
            .iter()
            .find_map(|kind| store.find(*kind, id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;
    use crate::identity::StaticIdentity;
    use crate::models::{Credential, MessageTemplate, Priority, Task, TaskStatus};
    use crate::patch::CredentialPatch;
    use std::time::Duration;

    fn coordinator() -> (Arc<MemoryBackend>, SyncCoordinator) {
        let backend = Arc::new(MemoryBackend::new());
        let coordinator =
            SyncCoordinator::new(backend.clone(), Arc::new(StaticIdentity::new("alice")));
        (backend, coordinator)
    }

    fn template(title: &str) -> RecordBody {
        RecordBody::MessageTemplate(MessageTemplate {
            title: title.to_string(),
            content: "Hello".to_string(),
            category: "sales".to_string(),
        })
    }

    #[tokio::test]
    async fn test_create_task_lands_in_cache() {
        let (_backend, coordinator) = coordinator();
        assert!(!coordinator.is_loading(ResourceKind::Task));

        let draft = RecordBody::Task(Task {
            title: "Ship report".to_string(),
            description: String::new(),
            priority: Priority::High,
            status: TaskStatus::Todo,
            due_date: None,
        });
        let created = coordinator.create(ResourceKind::Task, draft).await.unwrap();

        let cached = coordinator.snapshot(ResourceKind::Task);
        assert_eq!(cached.len(), 1);
        assert_eq!(cached[0], created);
        assert!(!created.id.is_empty());
        let task = cached[0].as_task().unwrap();
        assert_eq!(task.title, "Ship report");
        assert_eq!(task.priority, Priority::High);
        assert_eq!(task.due_date, None);
        assert!(!coordinator.is_loading(ResourceKind::Task));
    }

    #[tokio::test]
    async fn test_update_missing_credential_leaves_store_alone() {
        let (backend, coordinator) = coordinator();
        backend.seed("alice", template("Intro")).unwrap();
        coordinator.refresh(ResourceKind::MessageTemplate).await.unwrap();
        let before = coordinator.snapshot(ResourceKind::MessageTemplate);

        let patch = RecordPatch::Credential(CredentialPatch {
            title: Some("New".to_string()),
            ..CredentialPatch::default()
        });
        let result = coordinator
            .update(ResourceKind::Credential, "does-not-exist", patch)
            .await;

        assert!(matches!(result, Err(DossierError::NotFound { .. })));
        assert!(coordinator.snapshot(ResourceKind::Credential).is_empty());
        assert_eq!(coordinator.snapshot(ResourceKind::MessageTemplate), before);
        assert!(!coordinator.is_loading(ResourceKind::Credential));
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_cache() {
        let (backend, coordinator) = coordinator();
        backend.seed("alice", template("Intro")).unwrap();
        coordinator.refresh(ResourceKind::MessageTemplate).await.unwrap();

        backend.fail_next("503");
        let result = coordinator.refresh(ResourceKind::MessageTemplate).await;
        assert!(matches!(result, Err(DossierError::Remote(_))));
        assert_eq!(coordinator.snapshot(ResourceKind::MessageTemplate).len(), 1);
        assert!(!coordinator.is_loading(ResourceKind::MessageTemplate));
    }

    #[tokio::test]
    async fn test_failed_create_inserts_nothing() {
        let (backend, coordinator) = coordinator();
        backend.fail_next("timeout");
        let result = coordinator
            .create(ResourceKind::MessageTemplate, template("Lost"))
            .await;
        assert!(result.is_err());
        assert!(coordinator.snapshot(ResourceKind::MessageTemplate).is_empty());
        assert!(!coordinator.is_loading(ResourceKind::MessageTemplate));
    }

    #[tokio::test]
    async fn test_signed_out_fails_before_io() {
        let backend = Arc::new(MemoryBackend::new());
        let coordinator = SyncCoordinator::new(backend.clone(), Arc::new(StaticIdentity::anonymous()));

        let result = coordinator.refresh(ResourceKind::Task).await;
        assert!(matches!(result, Err(DossierError::Unauthorized)));
        let result = coordinator.remove(ResourceKind::Task, "x").await;
        assert!(matches!(result, Err(DossierError::Unauthorized)));
        assert_eq!(backend.calls(), 0);
        assert!(!coordinator.is_loading(ResourceKind::Task));
    }

    #[tokio::test]
    async fn test_kind_mismatch_fails_before_io() {
        let (backend, coordinator) = coordinator();
        let result = coordinator.create(ResourceKind::Task, template("Oops")).await;
        assert!(matches!(result, Err(DossierError::InvalidInput(_))));

        let patch = RecordPatch::empty(ResourceKind::Credential);
        let result = coordinator.update(ResourceKind::Task, "id", patch).await;
        assert!(matches!(result, Err(DossierError::InvalidInput(_))));
        assert_eq!(backend.calls(), 0);
    }

    #[tokio::test]
    async fn test_update_caches_backend_record() {
        let (_backend, coordinator) = coordinator();
        let created = coordinator
            .create(ResourceKind::MessageTemplate, template("Intro"))
            .await
            .unwrap();

        let patch =
            RecordPatch::from_assignments(ResourceKind::MessageTemplate, &["title=Intro v2"])
                .unwrap();
        let updated = coordinator
            .update(ResourceKind::MessageTemplate, &created.id, patch)
            .await
            .unwrap();

        let cached = coordinator
            .find(ResourceKind::MessageTemplate, &created.id)
            .unwrap();
        assert_eq!(cached, updated);
        assert_eq!(cached.body.headline(), "Intro v2");
        assert_eq!(coordinator.find_any(&created.id), Some(updated));
    }

    #[tokio::test]
    async fn test_remove_drops_from_cache() {
        let (_backend, coordinator) = coordinator();
        let created = coordinator
            .create(ResourceKind::MessageTemplate, template("Intro"))
            .await
            .unwrap();
        coordinator
            .remove(ResourceKind::MessageTemplate, &created.id)
            .await
            .unwrap();
        assert!(coordinator.snapshot(ResourceKind::MessageTemplate).is_empty());
    }

    #[tokio::test]
    async fn test_loading_flag_while_in_flight() {
        let (backend, coordinator) = coordinator();
        backend.set_latency(Duration::from_millis(50));

        let observe = async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            (
                coordinator.is_loading(ResourceKind::Task),
                coordinator.is_loading(ResourceKind::Credential),
            )
        };
        let (refreshed, (task_loading, credential_loading)) =
            tokio::join!(coordinator.refresh(ResourceKind::Task), observe);

        refreshed.unwrap();
        assert!(task_loading);
        assert!(!credential_loading);
        assert!(!coordinator.is_loading(ResourceKind::Task));
    }

    #[tokio::test]
    async fn test_dropped_call_clears_loading() {
        let (backend, coordinator) = coordinator();
        backend.set_latency(Duration::from_millis(200));

        let result = tokio::time::timeout(
            Duration::from_millis(10),
            coordinator.refresh(ResourceKind::Task),
        )
        .await;
        assert!(result.is_err());
        assert!(!coordinator.is_loading(ResourceKind::Task));
    }

    #[tokio::test]
    async fn test_overlapping_refreshes_do_not_corrupt() {
        let (backend, coordinator) = coordinator();
        for title in ["A", "B", "C"] {
            backend.seed("alice", template(title)).unwrap();
        }
        let kept = coordinator
            .create(ResourceKind::Credential, credential_body())
            .await
            .unwrap();
        backend.set_latency(Duration::from_millis(20));

        let (first, second) = tokio::join!(
            coordinator.refresh(ResourceKind::MessageTemplate),
            coordinator.refresh(ResourceKind::MessageTemplate)
        );
        first.unwrap();
        second.unwrap();

        let titles: Vec<String> = coordinator
            .snapshot(ResourceKind::MessageTemplate)
            .iter()
            .map(|r| r.body.headline().to_string())
            .collect();
        assert_eq!(titles, vec!["C", "B", "A"]);
        assert_eq!(coordinator.snapshot(ResourceKind::Credential), vec![kept]);
        assert!(!coordinator.is_loading(ResourceKind::MessageTemplate));
    }

    #[tokio::test]
    async fn test_search_term_filters_cache() {
        let (_backend, coordinator) = coordinator();
        for title in ["Intro", "Follow up", "Breakup"] {
            coordinator
                .create(ResourceKind::MessageTemplate, template(title))
                .await
                .unwrap();
        }
        assert_eq!(coordinator.search_term(ResourceKind::MessageTemplate), "");
        assert_eq!(coordinator.filtered(ResourceKind::MessageTemplate).len(), 3);

        coordinator.set_search_term(ResourceKind::MessageTemplate, "UP");
        let titles: Vec<String> = coordinator
            .filtered(ResourceKind::MessageTemplate)
            .iter()
            .map(|r| r.body.headline().to_string())
            .collect();
        assert_eq!(titles, vec!["Breakup", "Follow up"]);
        assert_eq!(coordinator.snapshot(ResourceKind::MessageTemplate).len(), 3);
    }

    /// Identity that can sign in as someone else mid-test.
    struct SwitchableIdentity(Mutex<Option<String>>);

    impl SwitchableIdentity {
        fn new(owner: &str) -> Self {
            Self(Mutex::new(Some(owner.to_string())))
        }

        fn switch(&self, owner: &str) {
            *self.0.lock() = Some(owner.to_string());
        }
    }

    impl IdentityProvider for SwitchableIdentity {
        fn current_owner(&self) -> Option<String> {
            self.0.lock().clone()
        }
    }

    fn cached_owners(coordinator: &SyncCoordinator) -> Vec<String> {
        let mut owners: Vec<String> = ResourceKind::ALL
            .iter()
            .flat_map(|kind| coordinator.snapshot(*kind))
            .map(|record| record.owner_id)
            .collect();
        owners.sort();
        owners.dedup();
        owners
    }

    #[tokio::test]
    async fn test_owner_change_clears_cache() {
        let backend = Arc::new(MemoryBackend::new());
        backend.seed("alice", template("Alice intro")).unwrap();
        backend.seed("bob", template("Bob intro")).unwrap();
        let identity = Arc::new(SwitchableIdentity::new("alice"));
        let coordinator = SyncCoordinator::new(backend.clone(), identity.clone());

        coordinator.refresh(ResourceKind::MessageTemplate).await.unwrap();
        assert_eq!(cached_owners(&coordinator), vec!["alice"]);

        identity.switch("bob");
        coordinator.refresh(ResourceKind::Task).await.unwrap();
        assert!(coordinator.snapshot(ResourceKind::MessageTemplate).is_empty());

        coordinator.refresh(ResourceKind::MessageTemplate).await.unwrap();
        let cached = coordinator.snapshot(ResourceKind::MessageTemplate);
        assert_eq!(cached.len(), 1);
        assert_eq!(cached[0].body.headline(), "Bob intro");
        assert_eq!(cached_owners(&coordinator), vec!["bob"]);
    }

    #[tokio::test]
    async fn test_owner_switch_during_refresh_discards_result() {
        let backend = Arc::new(MemoryBackend::new());
        backend.seed("alice", template("Alice intro")).unwrap();
        let identity = Arc::new(SwitchableIdentity::new("alice"));
        let coordinator = SyncCoordinator::new(backend.clone(), identity.clone());
        backend.set_latency(Duration::from_millis(50));

        let switch = async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            identity.switch("bob");
            coordinator.refresh(ResourceKind::Task).await
        };
        let (alice, bob) = tokio::join!(
            coordinator.refresh(ResourceKind::MessageTemplate),
            switch
        );

        assert!(matches!(alice, Err(DossierError::Unauthorized)));
        bob.unwrap();
        assert!(coordinator.snapshot(ResourceKind::MessageTemplate).is_empty());
        assert!(cached_owners(&coordinator).iter().all(|owner| owner == "bob"));
        assert!(!coordinator.is_loading(ResourceKind::MessageTemplate));
    }

    #[tokio::test]
    async fn test_owner_switch_during_create_keeps_record_out_of_cache() {
        let backend = Arc::new(MemoryBackend::new());
        let identity = Arc::new(SwitchableIdentity::new("alice"));
        let coordinator = SyncCoordinator::new(backend.clone(), identity.clone());
        backend.set_latency(Duration::from_millis(50));

        let switch = async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            identity.switch("bob");
            coordinator.refresh(ResourceKind::Task).await
        };
        let (created, bob) = tokio::join!(
            coordinator.create(ResourceKind::MessageTemplate, template("Late")),
            switch
        );

        assert!(matches!(created, Err(DossierError::Unauthorized)));
        bob.unwrap();
        assert!(coordinator.snapshot(ResourceKind::MessageTemplate).is_empty());
        assert!(cached_owners(&coordinator).is_empty());
    }

    fn credential_body() -> RecordBody {
        let cipher = crate::crypto::SecretCipher::with_params(crate::crypto::CipherParams::new(
            1024, 1, 1,
        ));
        RecordBody::Credential(Credential {
            title: "Mail".to_string(),
            username: "alice@example.com".to_string(),
            secret: cipher.encrypt("hunter2", "pw").unwrap(),
            url: None,
            notes: None,
        })
    }
}
