#![allow(dead_code)]

use tagvault::config::StorageConfig;
use tagvault::db::ExecutorHandle;
use tagvault::{ProfileStore, StoredProfile};
use tempfile::TempDir;
use uuid::Uuid;

pub struct TestDb {
    // Held so the database file outlives the test body.
    pub dir: TempDir,
    pub executor: ExecutorHandle,
    pub store: ProfileStore,
}

/// Connects a fresh SQLite file and bootstraps the schema.
pub async fn open_sqlite() -> TestDb {
    let dir = TempDir::new().unwrap();
    let mut cfg = StorageConfig::default();
    cfg.sqlite.path = dir.path().join("tags.db");

    let executor = tagvault::db::open(&cfg).await.unwrap();
    assert!(executor.ensure_schema().unwrap().wait().await);
    let store = ProfileStore::new(executor.clone());
    TestDb {
        dir,
        executor,
        store,
    }
}

/// Reads the persisted row for `uuid` through the store.
pub async fn fetch_row(store: &ProfileStore, uuid: Uuid) -> Option<StoredProfile> {
    let (tx, rx) = tokio::sync::oneshot::channel();
    let done = store
        .load_one(uuid, move |row| {
            let _ = tx.send(row);
        })
        .unwrap();
    assert!(done.wait().await);
    rx.await.unwrap()
}
