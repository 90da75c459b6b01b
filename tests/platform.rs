mod support;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use mission_objects::capability::{COMPOSITION, TYPE};
use mission_objects::composition::{CompositionEvent, ADD};
use mission_objects::{
    BackendError, CompositionProvider, DomainObject, EditorState, Error, Identifier, Model,
    Platform, PlatformConfig, Result,
};
use serde_json::{json, Value};
use support::ScriptedBackend;

async fn platform(backend: &ScriptedBackend) -> Platform {
    platform_with(backend, PlatformConfig::default()).await
}

async fn platform_with(backend: &ScriptedBackend, config: PlatformConfig) -> Platform {
    Platform::builder(config).backend(backend.clone()).build().await
}

fn folder(name: &str) -> Model {
    Model::from_value(json!({ "type": "folder", "name": name, "composition": [] }))
}

fn rename(name: &'static str) -> impl FnOnce(&mut Model) -> bool {
    move |model| {
        model.insert("name", Value::from(name));
        true
    }
}

// ============================================================================
// Persistence
// ============================================================================

#[tokio::test]
async fn save_creates_then_updates() {
    let backend = ScriptedBackend::new(&["mct"]);
    let platform = platform(&backend).await;
    let object = platform.instantiate(folder("Root"), Some(Identifier::new("", "root")));

    assert!(platform.save(&object).await.unwrap());
    let stored = backend.stored("mct", "root").await.unwrap();
    assert_eq!(stored.name(), Some("Root"));
    assert!(stored.persisted().is_some());
    assert_eq!(object.model().persisted(), stored.persisted());

    assert!(platform.mutate(&object, rename("Renamed")).await.unwrap());
    let stored = backend.stored("mct", "root").await.unwrap();
    assert_eq!(stored.name(), Some("Renamed"));
    assert_eq!(stored.persisted(), object.model().modified());
    assert_eq!(backend.storage().document("mct", "root").unwrap().generation(), 2);
    assert!(platform.locks().is_empty());
}

#[tokio::test]
async fn new_objects_are_routed_by_namespace_and_remembered() {
    let backend = ScriptedBackend::new(&["mct", "archive"]);
    let platform = platform(&backend).await;
    let object = platform.instantiate(folder("Old"), Some(Identifier::new("archive", "old")));

    platform.save(&object).await.unwrap();
    assert!(backend.stored("archive", "old").await.is_some());
    assert_eq!(platform.router().space_for(&Identifier::new("", "old")), "archive");
}

#[tokio::test]
async fn same_key_in_different_namespaces_are_separate_objects() {
    let backend = ScriptedBackend::new(&["mct"]);
    let platform = platform(&backend).await;
    let a = platform.instantiate(folder("From A"), Some(Identifier::new("a", "k")));
    let b = platform.instantiate(folder("From B"), Some(Identifier::new("b", "k")));

    assert!(platform.save(&a).await.unwrap());
    assert!(platform.save(&b).await.unwrap());
    assert_eq!(backend.stored("mct", "a:k").await.unwrap().name(), Some("From A"));
    assert_eq!(backend.stored("mct", "b:k").await.unwrap().name(), Some("From B"));
}

#[tokio::test]
async fn explicit_namespace_is_not_shadowed_by_a_reconciled_key() {
    let backend = ScriptedBackend::new(&["mct", "archive"]);
    backend.seed("mct", "x", json!({ "name": "Current", "persisted": 1 })).await;
    let platform = platform(&backend).await;
    let archived = platform.instantiate(folder("Archived"), Some(Identifier::new("archive", "x")));

    assert_eq!(platform.router().space_for(archived.id()), "archive");
    assert!(platform.save(&archived).await.unwrap());
    assert_eq!(backend.stored("archive", "x").await.unwrap().name(), Some("Archived"));
    assert_eq!(backend.stored("mct", "x").await.unwrap().name(), Some("Current"));
    assert_eq!(platform.router().space_for(&Identifier::new("", "x")), "mct");
}

#[tokio::test]
async fn persists_within_one_drain_share_a_write() {
    let backend = ScriptedBackend::new(&["mct"]);
    let config = PlatformConfig {
        queue_delay_ms: 20,
        ..PlatformConfig::default()
    };
    let platform = platform_with(&backend, config).await;
    let object = platform.instantiate(folder("Once"), None);

    let (first, second) = tokio::join!(platform.save(&object), platform.save(&object));
    assert!(first.unwrap());
    assert!(second.unwrap());
    assert_eq!(backend.writes(), 1);
}

#[tokio::test]
async fn backend_failure_reaches_every_waiter() {
    let backend = ScriptedBackend::new(&["mct"]);
    backend.fail_writes(true);
    let platform = platform(&backend).await;
    let object = platform.instantiate(folder("Doomed"), None);

    let (first, second) = tokio::join!(platform.save(&object), platform.save(&object));
    for result in [first, second] {
        assert!(matches!(
            result,
            Err(Error::Backend(BackendError::Unreachable { .. }))
        ));
    }
    assert_eq!(object.model().persisted(), None);
}

#[tokio::test]
async fn stalled_backend_times_out() {
    let backend = ScriptedBackend::new(&["mct"]);
    backend.stall_writes(true);
    let config = PlatformConfig {
        backend_timeout_ms: Some(20),
        ..PlatformConfig::default()
    };
    let platform = platform_with(&backend, config).await;
    let object = platform.instantiate(folder("Stuck"), None);

    assert!(matches!(
        platform.save(&object).await,
        Err(Error::Backend(BackendError::Timeout { operation: "create_object", .. }))
    ));
}

#[tokio::test]
async fn shutdown_flushes_queued_writes() {
    let backend = ScriptedBackend::new(&["mct"]);
    let config = PlatformConfig {
        queue_delay_ms: 60_000,
        ..PlatformConfig::default()
    };
    let platform = Arc::new(platform_with(&backend, config).await);
    let object = platform.instantiate(folder("Late"), Some(Identifier::new("", "late")));

    let pending = {
        let platform = Arc::clone(&platform);
        let object = object.clone();
        tokio::spawn(async move { platform.save(&object).await })
    };
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(platform.queue().pending_groups(), 1);

    platform.shutdown().await.unwrap();
    assert!(pending.await.unwrap().unwrap());
    assert!(backend.stored("mct", "late").await.is_some());
    assert_eq!(platform.objects().cached_len(), 0);
}

#[tokio::test]
async fn observers_see_mutations_and_refreshes() {
    let backend = ScriptedBackend::new(&["mct"]);
    backend
        .seed("mct", "watched", json!({ "name": "Stored", "persisted": 1 }))
        .await;
    let platform = platform(&backend).await;
    let object = platform.get(&Identifier::new("", "watched")).await.unwrap().unwrap();

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    platform
        .observe(&object, move |model| {
            sink.lock().unwrap().push(model.name().unwrap_or_default().to_string())
        })
        .unwrap();

    object
        .require_mutation()
        .unwrap()
        .mutate(rename("Local"), None)
        .unwrap();
    object.persistence().unwrap().refresh().await.unwrap();

    assert_eq!(*seen.lock().unwrap(), vec!["Local", "Stored"]);
    assert_eq!(object.model().name(), Some("Stored"));
}

#[tokio::test]
async fn delete_removes_and_evicts() {
    let backend = ScriptedBackend::new(&["mct"]);
    let platform = platform(&backend).await;
    let object = platform.instantiate(folder("Gone"), Some(Identifier::new("", "gone")));
    platform.save(&object).await.unwrap();

    assert!(platform.delete(object.id()).await.unwrap());
    assert!(backend.stored("mct", "gone").await.is_none());
    assert_eq!(platform.objects().cached_len(), 0);
    assert!(platform.locks().is_empty());
    assert!(platform.get(object.id()).await.unwrap().is_none());
}

// ============================================================================
// Editing
// ============================================================================

#[tokio::test]
async fn edits_are_deferred_until_save() {
    let backend = ScriptedBackend::new(&["mct"]);
    let platform = platform(&backend).await;
    let object = platform.instantiate(folder("Draft"), Some(Identifier::new("", "draft")));

    platform.editor().edit().unwrap();
    assert!(platform.save(&object).await.unwrap());
    assert!(platform.mutate(&object, rename("Draft 2")).await.unwrap());
    assert_eq!(backend.writes(), 0);
    assert!(backend.stored("mct", "draft").await.is_none());

    platform.editor().save().await.unwrap();
    assert_eq!(platform.editor().state(), EditorState::Idle);
    assert_eq!(backend.writes(), 1);
    assert_eq!(
        backend.stored("mct", "draft").await.unwrap().name(),
        Some("Draft 2")
    );
}

#[tokio::test]
async fn cancel_restores_stored_models() {
    let backend = ScriptedBackend::new(&["mct"]);
    backend
        .seed("mct", "doc", json!({ "type": "folder", "name": "Original", "persisted": 1 }))
        .await;
    let platform = platform(&backend).await;
    let object = platform.get(&Identifier::new("", "doc")).await.unwrap().unwrap();

    platform.editor().edit().unwrap();
    platform.mutate(&object, rename("Changed")).await.unwrap();
    assert_eq!(object.model().name(), Some("Changed"));

    let discard = platform.editor().cancel();
    assert!(!platform.editor().is_editing());
    discard.await.unwrap();

    assert_eq!(object.model().name(), Some("Original"));
    assert_eq!(backend.writes(), 0);
    assert!(!platform.transactions().is_active());
}

#[tokio::test]
async fn dropped_cancel_does_not_swallow_later_writes() {
    let backend = ScriptedBackend::new(&["mct"]);
    let platform = platform(&backend).await;
    let object = platform.instantiate(folder("Kept"), Some(Identifier::new("", "kept")));

    platform.editor().edit().unwrap();
    platform.save(&object).await.unwrap();
    drop(platform.editor().cancel());
    assert!(!platform.transactions().is_active());

    assert!(platform.save(&object).await.unwrap());
    platform.shutdown().await.unwrap();
    assert_eq!(
        backend.stored("mct", "kept").await.unwrap().name(),
        Some("Kept")
    );

    platform.editor().edit().unwrap();
    assert!(platform.editor().is_editing());
}

#[tokio::test]
async fn failed_save_still_leaves_edit_mode() {
    let backend = ScriptedBackend::new(&["mct"]);
    backend.fail_writes(true);
    let platform = platform(&backend).await;
    let object = platform.instantiate(folder("Unlucky"), None);

    platform.editor().edit().unwrap();
    platform.save(&object).await.unwrap();

    assert!(platform.editor().save().await.is_err());
    assert_eq!(platform.editor().state(), EditorState::Idle);
    assert!(!platform.transactions().is_active());
    platform.editor().edit().unwrap();
}

// ============================================================================
// Composition
// ============================================================================

#[tokio::test]
async fn composition_edits_persist_the_parent() {
    let backend = ScriptedBackend::new(&["mct"]);
    let platform = platform(&backend).await;
    let parent = platform.instantiate(folder("Parent"), Some(Identifier::new("", "parent")));
    let child = platform.instantiate(folder("Child"), Some(Identifier::new("", "child")));
    platform.save(&parent).await.unwrap();
    platform.save(&child).await.unwrap();

    let collection = platform.composition(&parent).unwrap();
    let added = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&added);
    collection.on(ADD, move |event| {
        if let CompositionEvent::Add { index, .. } = event {
            sink.lock().unwrap().push(*index);
        }
    });

    assert!(collection.load().await.unwrap().is_empty());
    collection.add(&child, false).await.unwrap();
    assert_eq!(*added.lock().unwrap(), vec![0]);

    let stored = backend.stored("mct", "parent").await.unwrap();
    assert_eq!(stored.composition(), Some(vec![Identifier::new("", "child")]));

    let fresh = platform.composition(&parent).unwrap();
    let children = fresh.load().await.unwrap();
    assert!(children[0].ptr_eq(&child));

    fresh.remove(&child).await.unwrap();
    let stored = backend.stored("mct", "parent").await.unwrap();
    assert_eq!(stored.composition(), Some(vec![]));
}

#[tokio::test]
async fn composition_capability_is_built_per_access() {
    let backend = ScriptedBackend::new(&["mct"]);
    let platform = platform(&backend).await;
    let parent = platform.instantiate(folder("Parent"), None);
    let leaf = platform.instantiate(Model::from_value(json!({ "type": "clock" })), None);

    let first = parent.get_capability(COMPOSITION).unwrap();
    let second = parent.get_capability(COMPOSITION).unwrap();
    assert!(!Arc::ptr_eq(
        first.as_composition().unwrap(),
        second.as_composition().unwrap()
    ));

    assert_eq!(parent.get_capability(TYPE).unwrap().as_value(), Some(&json!("folder")));
    assert!(!leaf.has_capability(COMPOSITION));
    assert!(platform.composition(&leaf).is_none());
}

struct Dictionary;

#[async_trait]
impl CompositionProvider for Dictionary {
    fn applies_to(&self, parent: &DomainObject) -> bool {
        parent.with_model(|model| model.type_name() == Some("dictionary"))
    }

    async fn load(&self, _parent: &DomainObject) -> Result<Vec<Identifier>> {
        Ok(vec![Identifier::new("", "b"), Identifier::new("", "a")])
    }

    async fn add(&self, _parent: &DomainObject, _child: &Identifier) -> Result<()> {
        Ok(())
    }

    async fn remove(&self, _parent: &DomainObject, _child: &Identifier) -> Result<()> {
        Ok(())
    }
}

#[tokio::test]
async fn higher_priority_provider_is_consulted_first() {
    let backend = ScriptedBackend::new(&["mct"]);
    backend.seed("mct", "a", json!({ "name": "A" })).await;
    backend.seed("mct", "b", json!({ "name": "B" })).await;
    let platform = Platform::builder(PlatformConfig::default())
        .backend(backend.clone())
        .composition_provider(Dictionary, 10)
        .build()
        .await;

    let dictionary = platform.instantiate(
        Model::from_value(json!({ "type": "dictionary", "composition": [] })),
        None,
    );
    let children = platform.composition(&dictionary).unwrap().load().await.unwrap();
    let names: Vec<String> = children
        .iter()
        .map(|child| child.model().name().unwrap_or_default().to_string())
        .collect();
    assert_eq!(names, vec!["B", "A"]);
}

#[tokio::test]
async fn custom_provider_objects_get_the_composition_capability() {
    let backend = ScriptedBackend::new(&["mct"]);
    backend.seed("mct", "a", json!({ "name": "A" })).await;
    backend.seed("mct", "b", json!({ "name": "B" })).await;
    let platform = Platform::builder(PlatformConfig::default())
        .backend(backend.clone())
        .composition_provider(Dictionary, 10)
        .build()
        .await;

    let dictionary = platform.instantiate(Model::from_value(json!({ "type": "dictionary" })), None);
    assert!(dictionary.has_capability(COMPOSITION));

    let capability = dictionary.get_capability(COMPOSITION).unwrap();
    let children = capability.as_composition().unwrap().load().await.unwrap();
    assert_eq!(children.len(), 2);
}
