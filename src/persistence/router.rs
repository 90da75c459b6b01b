//! SpaceRouter - decides which space, and which backend, owns an identifier.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use futures_util::future::join_all;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use super::{BackendError, PersistenceService};
use crate::identifier::Identifier;
use crate::object::Model;
use crate::reconcile::{Space, SpaceMap, SpaceReconciler};

/// Aggregates backends and routes identifiers to spaces.
///
/// Routing order for an identifier:
/// 1. the identifier's namespace, when it names a known space,
/// 2. the reconciled mapping, keyed by the identifier's storage key,
/// 3. the default space.
///
/// Inside a space an object is stored under its bare key when its namespace
/// is empty or names a known space, and under its full `namespace:key` form
/// otherwise, so `a:k` and `b:k` never share a record.
///
/// Reconciliation runs once, on the first [`bootstrap`](Self::bootstrap);
/// afterwards the mapping only grows as new objects are created.
pub struct SpaceRouter {
    backends: Vec<Arc<dyn PersistenceService>>,
    default_space: String,
    spaces: RwLock<Vec<Space>>,
    mapping: RwLock<HashMap<String, String>>,
    reconciled: OnceCell<SpaceMap>,
}

impl SpaceRouter {
    pub fn new(backends: Vec<Arc<dyn PersistenceService>>, default_space: impl Into<String>) -> Self {
        SpaceRouter {
            backends,
            default_space: default_space.into(),
            spaces: RwLock::new(Vec::new()),
            mapping: RwLock::new(HashMap::new()),
            reconciled: OnceCell::new(),
        }
    }

    /// Discover spaces and reconcile them. Later calls return the first result.
    pub async fn bootstrap(&self) -> &SpaceMap {
        self.reconciled
            .get_or_init(|| async {
                let spaces = self.discover_spaces().await;
                *self.spaces.write().unwrap_or_else(PoisonError::into_inner) = spaces.clone();

                let map = SpaceReconciler::new(spaces).reconcile().await;
                self.mapping
                    .write()
                    .unwrap_or_else(PoisonError::into_inner)
                    .extend(map.iter().map(|(id, space)| (id.to_string(), space.to_string())));
                info!(
                    spaces = map.spaces().len(),
                    objects = map.len(),
                    gaps = map.gaps().len(),
                    "persistence spaces reconciled"
                );
                map
            })
            .await
    }

    pub fn is_bootstrapped(&self) -> bool {
        self.reconciled.initialized()
    }

    /// The reconciliation result, once bootstrapped.
    pub fn space_map(&self) -> Option<&SpaceMap> {
        self.reconciled.get()
    }

    async fn discover_spaces(&self) -> Vec<Space> {
        let listings = join_all(self.backends.iter().map(|backend| backend.list_spaces())).await;

        let mut spaces: Vec<Space> = Vec::new();
        for (backend, listing) in self.backends.iter().zip(listings) {
            match listing {
                Ok(names) => {
                    for name in names {
                        if spaces.iter().any(|space| space.name == name) {
                            warn!(space = %name, "space served by more than one backend; keeping the first");
                            continue;
                        }
                        spaces.push(Space::new(name, Arc::clone(backend)));
                    }
                }
                Err(err) => warn!(error = %err, "backend failed to list its spaces"),
            }
        }
        spaces
    }

    pub fn default_space(&self) -> &str {
        &self.default_space
    }

    /// Names of every discovered space, in discovery order.
    pub fn known_spaces(&self) -> Vec<String> {
        self.spaces
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|space| space.name.clone())
            .collect()
    }

    fn names_space(&self, id: &Identifier) -> bool {
        !id.namespace.is_empty()
            && self
                .spaces
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .iter()
                .any(|space| space.name == id.namespace)
    }

    /// The id `id` is stored under inside its space.
    pub fn storage_key(&self, id: &Identifier) -> String {
        if id.namespace.is_empty() || self.names_space(id) {
            id.key.clone()
        } else {
            id.to_string()
        }
    }

    pub fn space_for(&self, id: &Identifier) -> String {
        if self.names_space(id) {
            return id.namespace.clone();
        }
        let key = self.storage_key(id);
        self.mapping
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
            .cloned()
            .unwrap_or_else(|| self.default_space.clone())
    }

    /// Record that `id` now lives in `space`.
    ///
    /// An id routed by its namespace only fills an unmapped key, so it never
    /// shadows a bare-key object another space already holds.
    pub fn assign(&self, id: &Identifier, space: &str) {
        let key = self.storage_key(id);
        let by_namespace = self.names_space(id);
        let mut mapping = self.mapping.write().unwrap_or_else(PoisonError::into_inner);
        if by_namespace && mapping.contains_key(&key) {
            return;
        }
        if mapping.insert(key, space.to_string()).as_deref() != Some(space) {
            debug!(%id, space, "assigned object to space");
        }
    }

    pub fn backend(&self, space: &str) -> Result<Arc<dyn PersistenceService>, BackendError> {
        self.spaces
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|candidate| candidate.name == space)
            .map(|candidate| Arc::clone(&candidate.service))
            .ok_or_else(|| BackendError::UnknownSpace(space.to_string()))
    }

    /// Read the stored model for `id` from its routed space.
    pub async fn read(&self, id: &Identifier) -> Result<Option<Model>, BackendError> {
        let space = self.space_for(id);
        let backend = self.backend(&space)?;
        backend.read_object(&space, &self.storage_key(id)).await
    }

    /// Delete `id` from its routed space.
    pub async fn delete(&self, id: &Identifier) -> Result<bool, BackendError> {
        let space = self.space_for(id);
        let backend = self.backend(&space)?;
        let key = self.storage_key(id);
        let deleted = backend.delete_object(&space, &key).await?;
        if deleted {
            self.mapping
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(&key);
        }
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::InMemoryPersistence;
    use serde_json::json;

    fn persisted(at: i64) -> Model {
        Model::from_value(json!({ "persisted": at }))
    }

    #[tokio::test]
    async fn routes_by_mapping_then_namespace_then_default() {
        let primary = InMemoryPersistence::new(["mct"]);
        let secondary = InMemoryPersistence::new(["archive"]);
        secondary.create_object("archive", "old", &persisted(1)).await.unwrap();

        let router = SpaceRouter::new(
            vec![Arc::new(primary), Arc::new(secondary)],
            "mct",
        );
        router.bootstrap().await;

        assert_eq!(router.space_for(&Identifier::new("", "old")), "archive");
        assert_eq!(router.space_for(&Identifier::new("archive", "new")), "archive");
        assert_eq!(router.space_for(&Identifier::new("elsewhere", "new")), "mct");
        assert_eq!(router.known_spaces(), vec!["mct", "archive"]);
    }

    #[tokio::test]
    async fn namespace_of_a_known_space_beats_the_mapping() {
        let backend = InMemoryPersistence::new(["mct", "archive"]);
        backend.create_object("mct", "x", &persisted(1)).await.unwrap();
        let router = SpaceRouter::new(vec![Arc::new(backend)], "mct");
        router.bootstrap().await;

        assert_eq!(router.space_for(&Identifier::new("", "x")), "mct");
        assert_eq!(router.space_for(&Identifier::new("archive", "x")), "archive");
        assert_eq!(router.storage_key(&Identifier::new("archive", "x")), "x");
    }

    #[tokio::test]
    async fn foreign_namespaces_keep_distinct_records() {
        let backend = InMemoryPersistence::new(["mct"]);
        backend.create_object("mct", "a:k", &persisted(1)).await.unwrap();
        let router = SpaceRouter::new(vec![Arc::new(backend)], "mct");
        router.bootstrap().await;

        let a = Identifier::new("a", "k");
        let b = Identifier::new("b", "k");
        assert_eq!(router.storage_key(&a), "a:k");
        assert_eq!(router.storage_key(&b), "b:k");
        assert!(router.read(&a).await.unwrap().is_some());
        assert!(router.read(&b).await.unwrap().is_none());
        assert!(router.read(&Identifier::new("", "k")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn unknown_space_has_no_backend() {
        let router = SpaceRouter::new(vec![Arc::new(InMemoryPersistence::new(["mct"]))], "mct");
        router.bootstrap().await;
        assert!(router.backend("mct").is_ok());
        assert_eq!(
            router.backend("nowhere").err(),
            Some(BackendError::UnknownSpace("nowhere".into()))
        );
    }

    #[tokio::test]
    async fn bootstrap_runs_once() {
        let backend = InMemoryPersistence::new(["mct"]);
        let router = SpaceRouter::new(vec![Arc::new(backend.clone())], "mct");
        assert!(!router.is_bootstrapped());
        assert_eq!(router.bootstrap().await.len(), 0);

        backend.create_object("mct", "late", &persisted(1)).await.unwrap();
        assert_eq!(router.bootstrap().await.len(), 0);
        assert!(router.is_bootstrapped());
    }

    #[tokio::test]
    async fn delete_forgets_the_assignment() {
        let backend = InMemoryPersistence::new(["mct", "other"]);
        backend.create_object("other", "x", &persisted(1)).await.unwrap();
        let router = SpaceRouter::new(vec![Arc::new(backend)], "mct");
        router.bootstrap().await;

        let id = Identifier::new("", "x");
        assert_eq!(router.space_for(&id), "other");
        assert!(router.delete(&id).await.unwrap());
        assert_eq!(router.space_for(&id), "mct");
    }
}
