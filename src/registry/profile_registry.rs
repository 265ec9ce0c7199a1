use super::profile::{LoadState, Profile, ProfileEntry, eq_ignore_case};
use crate::db::Completion;
use crate::store::{ProfileStore, StoredProfile};
use indexmap::IndexMap;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Maps session identity to its cached profile.
///
/// Every method is synchronous and never waits on the database. Loads and
/// saves are scheduled through [`ProfileStore`] and their failures are only
/// logged; nothing from the persistence layer reaches the caller.
#[derive(Clone)]
pub struct ProfileRegistry {
    inner: Arc<Inner>,
}

struct Inner {
    store: ProfileStore,
    // Insertion order decides which entry wins a name lookup.
    entries: RwLock<IndexMap<Uuid, ProfileEntry>>,
    next_generation: AtomicU64,
}

impl ProfileRegistry {
    /// Builds the registry and immediately rebuilds it from `active_sessions`
    /// (see [`resync`](Self::resync)).
    pub fn new<I, S>(store: ProfileStore, active_sessions: I) -> Self
    where
        I: IntoIterator<Item = (Uuid, S)>,
        S: Into<String>,
    {
        let registry = Self {
            inner: Arc::new(Inner {
                store,
                entries: RwLock::new(IndexMap::new()),
                next_generation: AtomicU64::new(1),
            }),
        };
        registry.resync(active_sessions);
        registry
    }

    pub fn store(&self) -> &ProfileStore {
        &self.inner.store
    }

    /// Allocates a default entry and schedules its load. Returns `None` when the
    /// session is already registered or the load could not be scheduled.
    /// An already registered entry that is `Unloaded` gets its load retried.
    pub fn on_session_start(&self, uuid: Uuid, name: impl Into<String>) -> Option<Completion> {
        let generation = self.inner.next_generation.fetch_add(1, Ordering::Relaxed);
        {
            let mut entries = self.inner.entries.write();
            if let Some(entry) = entries.get_mut(&uuid) {
                if entry.state != LoadState::Unloaded {
                    debug!(%uuid, "session already registered");
                    return None;
                }
                entry.generation = generation;
                drop(entries);
                return self.schedule_load(uuid, generation);
            }
            entries.insert(
                uuid,
                ProfileEntry::new(Profile::new(uuid, name), generation),
            );
        }
        self.schedule_load(uuid, generation)
    }

    /// Evicts the entry at once. A loaded profile, or one whose tag was set
    /// locally, is saved on the way out; in-flight work for this uuid is
    /// neither awaited nor cancelled.
    pub fn on_session_end(&self, uuid: Uuid) -> bool {
        let removed = self.inner.entries.write().shift_remove(&uuid);
        let Some(entry) = removed else {
            return false;
        };
        if entry.needs_save() {
            self.inner.persist(&entry.profile);
        } else {
            debug!(%uuid, state = ?entry.state, "session ended before load completed; not saving");
        }
        true
    }

    pub fn by_identity(&self, uuid: Uuid) -> Option<ProfileEntry> {
        self.inner.entries.read().get(&uuid).cloned()
    }

    /// Case-insensitive linear scan; the earliest registered match wins.
    pub fn by_name(&self, name: &str) -> Option<ProfileEntry> {
        self.inner
            .entries
            .read()
            .values()
            .find(|entry| eq_ignore_case(&entry.profile.name, name))
            .cloned()
    }

    /// Updates the cached tag and schedules a tag-only write. Accepted in any
    /// state; a load that completes afterwards keeps this tag.
    pub fn set_tag(&self, uuid: Uuid, tag: Option<String>, tag_prefix: Option<String>) -> bool {
        {
            let mut entries = self.inner.entries.write();
            let Some(entry) = entries.get_mut(&uuid) else {
                return false;
            };
            entry.profile.tag = tag.clone();
            entry.profile.tag_prefix = tag_prefix.clone();
            entry.tag_dirty = true;
        }
        if let Err(e) = self
            .inner
            .store
            .upsert_tag(uuid, tag.as_deref(), tag_prefix.as_deref())
        {
            warn!(%uuid, error = %e, "failed to schedule tag save");
        }
        true
    }

    /// Updates the cached display name and schedules a name-only write.
    pub fn rename(&self, uuid: Uuid, name: impl Into<String>) -> bool {
        let name = name.into();
        {
            let mut entries = self.inner.entries.write();
            let Some(entry) = entries.get_mut(&uuid) else {
                return false;
            };
            entry.profile.name = name.clone();
        }
        if let Err(e) = self.inner.store.upsert_name(uuid, &name) {
            warn!(%uuid, error = %e, "failed to schedule name save");
        }
        true
    }

    /// Schedules a save of the cached name and tag. Entries still holding
    /// defaults (not loaded, tag never set) are not saved.
    pub fn save(&self, uuid: Uuid) -> bool {
        let Some(entry) = self.by_identity(uuid) else {
            return false;
        };
        if !entry.needs_save() {
            return false;
        }
        self.inner.persist(&entry.profile);
        true
    }

    /// Retries the load of an `Unloaded` entry, e.g. after a failed load.
    /// Returns `None` if the entry is missing, already loading or loaded.
    pub fn reload(&self, uuid: Uuid) -> Option<Completion> {
        let generation = self.inner.next_generation.fetch_add(1, Ordering::Relaxed);
        {
            let mut entries = self.inner.entries.write();
            let entry = entries.get_mut(&uuid)?;
            if entry.state != LoadState::Unloaded {
                return None;
            }
            entry.generation = generation;
        }
        self.schedule_load(uuid, generation)
    }

    /// Full rebuild: drops every entry, then registers and reloads each active
    /// session. Used to recover after the registry itself was restarted.
    pub fn resync<I, S>(&self, active_sessions: I) -> Vec<Completion>
    where
        I: IntoIterator<Item = (Uuid, S)>,
        S: Into<String>,
    {
        self.inner.entries.write().clear();
        let loads: Vec<Completion> = active_sessions
            .into_iter()
            .filter_map(|(uuid, name)| self.on_session_start(uuid, name))
            .collect();
        if !loads.is_empty() {
            info!(sessions = loads.len(), "registry rebuilt from active sessions");
        }
        loads
    }

    pub fn identities(&self) -> Vec<Uuid> {
        self.inner.entries.read().keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.inner.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.entries.read().is_empty()
    }

    fn schedule_load(&self, uuid: Uuid, generation: u64) -> Option<Completion> {
        self.inner.set_state(uuid, generation, LoadState::Loading);

        let on_loaded: Weak<Inner> = Arc::downgrade(&self.inner);
        let on_failed = on_loaded.clone();
        let scheduled = self.inner.store.load_one_or_else(
            uuid,
            move |stored| {
                if let Some(inner) = on_loaded.upgrade() {
                    inner.apply_load(uuid, generation, stored);
                }
            },
            move || {
                if let Some(inner) = on_failed.upgrade() {
                    warn!(%uuid, "profile load failed; entry left unloaded");
                    inner.set_state(uuid, generation, LoadState::Unloaded);
                }
            },
        );

        match scheduled {
            Ok(completion) => Some(completion),
            Err(e) => {
                warn!(%uuid, error = %e, "failed to schedule profile load");
                self.inner.set_state(uuid, generation, LoadState::Unloaded);
                None
            }
        }
    }
}

impl Inner {
    fn set_state(&self, uuid: Uuid, generation: u64, state: LoadState) {
        if let Some(entry) = self.entries.write().get_mut(&uuid) {
            if entry.generation == generation {
                entry.state = state;
            }
        }
    }

    /// Merges a completed load, unless the session has ended (or been replaced) meanwhile.
    fn apply_load(&self, uuid: Uuid, generation: u64, stored: Option<StoredProfile>) {
        let mut entries = self.entries.write();
        let Some(entry) = entries.get_mut(&uuid) else {
            debug!(%uuid, "session ended before load completed; result discarded");
            return;
        };
        if entry.generation != generation {
            debug!(%uuid, "stale load for an earlier session; result discarded");
            return;
        }
        if let Some(stored) = stored.as_ref() {
            if !entry.tag_dirty {
                entry.profile.tag = stored.tag.clone();
                entry.profile.tag_prefix = stored.tag_prefix.clone();
            }
        }
        entry.state = LoadState::Loaded;

        // Keeps the stored name in step with the live one; also creates a missing row.
        // Enqueued under the lock so a concurrent rename cannot be queued ahead of it.
        let stored_name = stored.as_ref().and_then(|s| s.name.as_deref());
        if stored_name != Some(entry.profile.name.as_str()) {
            if let Err(e) = self.store.upsert_name(uuid, &entry.profile.name) {
                warn!(%uuid, error = %e, "failed to schedule name sync");
            }
        }
    }

    fn persist(&self, profile: &Profile) {
        let uuid = profile.uuid;
        if let Err(e) = self.store.upsert_name(uuid, &profile.name) {
            warn!(%uuid, error = %e, "failed to schedule name save");
        }
        if let Err(e) = self.store.upsert_tag(
            uuid,
            profile.tag.as_deref(),
            profile.tag_prefix.as_deref(),
        ) {
            warn!(%uuid, error = %e, "failed to schedule tag save");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SqliteConfig;
    use crate::db::{ExecutorHandle, SqliteConnector};

    // A never-connected backend: loads cannot be scheduled, so entries stay unloaded.
    async fn offline_registry() -> ProfileRegistry {
        let connector = Arc::new(SqliteConnector::new(SqliteConfig::default()));
        let executor = ExecutorHandle::spawn(connector, 2).await.unwrap();
        ProfileRegistry::new(ProfileStore::new(executor), Vec::<(Uuid, String)>::new())
    }

    #[tokio::test]
    async fn entry_is_visible_before_any_load() {
        let registry = offline_registry().await;
        let id = Uuid::new_v4();

        assert!(registry.on_session_start(id, "Name").is_none());

        let entry = registry.by_identity(id).expect("entry present");
        assert_eq!(entry.state, LoadState::Unloaded);
        assert_eq!(entry.profile.name, "Name");
        assert_eq!(entry.profile.tag, None);
    }

    #[tokio::test]
    async fn name_lookup_prefers_first_inserted() {
        let registry = offline_registry().await;
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();
        registry.on_session_start(first, "Foo");
        registry.on_session_start(second, "foo");

        assert_eq!(registry.by_name("FOO").unwrap().profile.uuid, first);
        assert!(registry.by_name("bar").is_none());

        registry.on_session_end(first);
        assert_eq!(registry.by_name("FOO").unwrap().profile.uuid, second);
    }

    #[tokio::test]
    async fn unloaded_entries_accept_tag_changes() {
        let registry = offline_registry().await;
        let id = Uuid::new_v4();
        registry.on_session_start(id, "Alice");

        assert!(registry.rename(id, "Alicia"));
        assert_eq!(registry.by_identity(id).unwrap().profile.name, "Alicia");
        // Still holding defaults: nothing to write back.
        assert!(!registry.save(id));

        assert!(registry.set_tag(id, Some("VIP".into()), None));
        let entry = registry.by_identity(id).unwrap();
        assert_eq!(entry.state, LoadState::Unloaded);
        assert!(entry.tag_dirty);
        assert_eq!(entry.profile.tag.as_deref(), Some("VIP"));
        assert!(registry.save(id));
    }

    #[tokio::test]
    async fn reload_requires_an_unloaded_entry() {
        let registry = offline_registry().await;
        let id = Uuid::new_v4();

        assert!(registry.reload(id).is_none());
        registry.on_session_start(id, "Alice");
        // Backend still offline: the retry cannot be scheduled either.
        assert!(registry.reload(id).is_none());
        assert_eq!(registry.by_identity(id).unwrap().state, LoadState::Unloaded);
    }

    #[tokio::test]
    async fn session_end_evicts_immediately() {
        let registry = offline_registry().await;
        let id = Uuid::new_v4();
        registry.on_session_start(id, "Alice");

        assert!(registry.on_session_end(id));
        assert!(registry.by_identity(id).is_none());
        assert!(!registry.on_session_end(id));
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn resync_clears_before_rebuilding() {
        let registry = offline_registry().await;
        let stale = Uuid::new_v4();
        registry.on_session_start(stale, "Gone");

        let active = vec![(Uuid::new_v4(), "A"), (Uuid::new_v4(), "B")];
        registry.resync(active.clone());

        assert!(registry.by_identity(stale).is_none());
        assert_eq!(
            registry.identities(),
            active.iter().map(|(id, _)| *id).collect::<Vec<_>>()
        );
        assert_eq!(registry.len(), 2);
    }
}
