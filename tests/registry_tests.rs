mod common;

use common::{fetch_row, open_sqlite};
use tagvault::db::Statement;
use tagvault::{LoadState, ProfileRegistry};
use uuid::Uuid;

fn no_sessions() -> Vec<(Uuid, String)> {
    Vec::new()
}

async fn rename_table(db: &common::TestDb, from: &str, to: &str) {
    let sql = format!("ALTER TABLE {from} RENAME TO {to}");
    assert!(db.executor.execute(Statement::new(sql)).unwrap().wait().await);
}

#[tokio::test]
async fn test_registry_end_to_end() {
    let db = open_sqlite().await;
    let registry = ProfileRegistry::new(db.store.clone(), no_sessions());
    let u1 = Uuid::new_v4();

    // 1. Visible right away, before the load has run
    let load = registry.on_session_start(u1, "Alice").unwrap();
    let entry = registry.by_identity(u1).unwrap();
    assert_eq!(entry.state, LoadState::Loading);
    assert_eq!(entry.profile.name, "Alice");

    // 2. No row yet: load completes with the default (empty) tag
    assert!(load.wait().await);
    let entry = registry.by_identity(u1).unwrap();
    assert_eq!(entry.state, LoadState::Loaded);
    assert_eq!(entry.profile.tag, None);
    assert_eq!(entry.profile.tag_prefix, None);

    // 3. Tag the player; only the tag columns change
    db.executor.drain().await.unwrap();
    assert!(registry.set_tag(u1, Some("VIP".into()), Some("[VIP] ".into())));
    db.executor.drain().await.unwrap();
    let row = fetch_row(&db.store, u1).await.unwrap();
    assert_eq!(row.tag.as_deref(), Some("VIP"));
    assert_eq!(row.tag_prefix.as_deref(), Some("[VIP] "));
    assert_eq!(row.name.as_deref(), Some("Alice"));

    // 4. End the session
    assert!(registry.on_session_end(u1));
    assert!(registry.by_identity(u1).is_none());
    db.executor.drain().await.unwrap();

    // 5. A rebuilt registry with U1 active reloads the stored tag
    let restarted = ProfileRegistry::new(db.store.clone(), no_sessions());
    let loads = restarted.resync(vec![(u1, "Alice")]);
    assert_eq!(loads.len(), 1);
    for load in loads {
        assert!(load.wait().await);
    }
    let entry = restarted.by_identity(u1).unwrap();
    assert!(entry.is_loaded());
    assert_eq!(entry.profile.tag.as_deref(), Some("VIP"));
    assert_eq!(entry.profile.tag_prefix.as_deref(), Some("[VIP] "));
}

#[tokio::test]
async fn load_completing_after_session_end_is_discarded() {
    let db = open_sqlite().await;
    let registry = ProfileRegistry::new(db.store.clone(), no_sessions());
    let id = Uuid::new_v4();
    assert!(
        db.store
            .upsert_tag(id, Some("OLD"), None)
            .unwrap()
            .wait()
            .await
    );

    // Nothing is awaited between start and end, so the load is still pending.
    let load = registry.on_session_start(id, "Bob").unwrap();
    assert!(registry.on_session_end(id));
    assert!(registry.by_identity(id).is_none());

    assert!(load.wait().await);
    assert!(registry.by_identity(id).is_none());
    assert!(registry.is_empty());

    // The unloaded entry was not saved over the stored row.
    db.executor.drain().await.unwrap();
    let row = fetch_row(&db.store, id).await.unwrap();
    assert_eq!(row.tag.as_deref(), Some("OLD"));
    assert_eq!(row.name, None);
}

#[tokio::test]
async fn load_syncs_stored_name_with_live_name() {
    let db = open_sqlite().await;
    let id = Uuid::new_v4();
    assert!(db.store.upsert_name(id, "OldName").unwrap().wait().await);

    let registry = ProfileRegistry::new(db.store.clone(), no_sessions());
    assert!(registry.on_session_start(id, "NewName").unwrap().wait().await);
    db.executor.drain().await.unwrap();

    let row = fetch_row(&db.store, id).await.unwrap();
    assert_eq!(row.name.as_deref(), Some("NewName"));
    assert_eq!(registry.by_name("newname").unwrap().profile.uuid, id);
}

#[tokio::test]
async fn session_end_saves_loaded_profile() {
    let db = open_sqlite().await;
    let registry = ProfileRegistry::new(db.store.clone(), no_sessions());
    let id = Uuid::new_v4();

    assert!(registry.on_session_start(id, "Carol").unwrap().wait().await);
    assert!(registry.rename(id, "Caroline"));
    assert!(registry.set_tag(id, Some("MOD".into()), None));
    assert!(registry.on_session_end(id));
    db.executor.drain().await.unwrap();

    let row = fetch_row(&db.store, id).await.unwrap();
    assert_eq!(row.name.as_deref(), Some("Caroline"));
    assert_eq!(row.tag.as_deref(), Some("MOD"));
    assert_eq!(row.tag_prefix, None);
}

#[tokio::test]
async fn duplicate_session_start_keeps_existing_entry() {
    let db = open_sqlite().await;
    let registry = ProfileRegistry::new(db.store.clone(), no_sessions());
    let id = Uuid::new_v4();

    assert!(registry.on_session_start(id, "Dave").unwrap().wait().await);
    assert!(registry.set_tag(id, Some("X".into()), Some("[X] ".into())));

    assert!(registry.on_session_start(id, "Dave").is_none());
    let entry = registry.by_identity(id).unwrap();
    assert!(entry.is_loaded());
    assert_eq!(entry.profile.tag.as_deref(), Some("X"));
    assert_eq!(registry.len(), 1);
}

#[tokio::test]
async fn registry_without_backend_still_tracks_sessions() {
    let db = open_sqlite().await;
    db.executor.shutdown().await.unwrap();

    let id = Uuid::new_v4();
    let registry = ProfileRegistry::new(db.store.clone(), vec![(id, "Eve")]);

    let entry = registry.by_identity(id).unwrap();
    assert_eq!(entry.state, LoadState::Unloaded);
    assert_eq!(registry.by_name("EVE").unwrap().profile.uuid, id);
    assert!(registry.on_session_end(id));
}

#[tokio::test]
async fn failed_load_leaves_entry_unloaded_and_editable() {
    let db = open_sqlite().await;
    let registry = ProfileRegistry::new(db.store.clone(), no_sessions());
    let id = Uuid::new_v4();

    rename_table(&db, "SimpleTags", "SimpleTagsAside").await;
    let load = registry.on_session_start(id, "Frank").unwrap();
    assert!(!load.wait().await);
    let entry = registry.by_identity(id).unwrap();
    assert_eq!(entry.state, LoadState::Unloaded);

    rename_table(&db, "SimpleTagsAside", "SimpleTags").await;
    assert!(registry.set_tag(id, Some("VIP".into()), Some("[VIP] ".into())));
    assert!(registry.on_session_end(id));
    db.executor.drain().await.unwrap();

    let row = fetch_row(&db.store, id).await.unwrap();
    assert_eq!(row.name.as_deref(), Some("Frank"));
    assert_eq!(row.tag.as_deref(), Some("VIP"));
    assert_eq!(row.tag_prefix.as_deref(), Some("[VIP] "));
}

#[tokio::test]
async fn failed_load_can_be_retried() {
    let db = open_sqlite().await;
    let registry = ProfileRegistry::new(db.store.clone(), no_sessions());
    let id = Uuid::new_v4();
    assert!(
        db.store
            .upsert_tag(id, Some("OLD"), None)
            .unwrap()
            .wait()
            .await
    );

    rename_table(&db, "SimpleTags", "SimpleTagsAside").await;
    assert!(!registry.on_session_start(id, "Grace").unwrap().wait().await);
    rename_table(&db, "SimpleTagsAside", "SimpleTags").await;

    let retry = registry.reload(id).unwrap();
    assert_eq!(registry.by_identity(id).unwrap().state, LoadState::Loading);
    assert!(registry.reload(id).is_none());
    assert!(retry.wait().await);

    let entry = registry.by_identity(id).unwrap();
    assert!(entry.is_loaded());
    assert_eq!(entry.profile.tag.as_deref(), Some("OLD"));
}

#[tokio::test]
async fn tag_set_during_load_survives_the_load() {
    let db = open_sqlite().await;
    let registry = ProfileRegistry::new(db.store.clone(), no_sessions());
    let id = Uuid::new_v4();
    assert!(
        db.store
            .upsert_tag(id, Some("OLD"), None)
            .unwrap()
            .wait()
            .await
    );

    let load = registry.on_session_start(id, "Heidi").unwrap();
    assert!(registry.set_tag(id, Some("NEW".into()), None));
    assert!(load.wait().await);

    let entry = registry.by_identity(id).unwrap();
    assert!(entry.is_loaded());
    assert_eq!(entry.profile.tag.as_deref(), Some("NEW"));
}

#[tokio::test]
async fn rename_racing_a_load_is_not_overwritten() {
    let db = open_sqlite().await;
    let id = Uuid::new_v4();
    assert!(db.store.upsert_name(id, "Stored").unwrap().wait().await);
    let registry = ProfileRegistry::new(db.store.clone(), no_sessions());

    let load = registry.on_session_start(id, "Ivan").unwrap();
    assert!(registry.rename(id, "Ivan2"));
    assert!(load.wait().await);
    db.executor.drain().await.unwrap();

    let row = fetch_row(&db.store, id).await.unwrap();
    assert_eq!(row.name.as_deref(), Some("Ivan2"));
    assert_eq!(registry.by_identity(id).unwrap().profile.name, "Ivan2");
}
