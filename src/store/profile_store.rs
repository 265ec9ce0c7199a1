use crate::db::{Completion, ExecutorHandle, ProfileSql, Statement};
use crate::error::TagVaultError;
use crate::store::models::StoredProfile;
use tracing::warn;
use uuid::Uuid;

/// Engine-agnostic record operations. Each call translates to exactly one
/// statement and returns as soon as it is scheduled.
#[derive(Clone)]
pub struct ProfileStore {
    executor: ExecutorHandle,
    sql: &'static ProfileSql,
}

impl ProfileStore {
    pub fn new(executor: ExecutorHandle) -> Self {
        let sql = ProfileSql::for_engine(executor.engine());
        Self { executor, sql }
    }

    pub fn executor(&self) -> &ExecutorHandle {
        &self.executor
    }

    /// Loads one row. `on_loaded` receives `None` when no row exists, which is
    /// not an error: the caller falls back to defaults.
    pub fn load_one<F>(&self, uuid: Uuid, on_loaded: F) -> Result<Completion, TagVaultError>
    where
        F: FnOnce(Option<StoredProfile>) + Send + 'static,
    {
        let stmt = Statement::new(self.sql.select_one).bind(uuid.to_string());
        self.executor.query(stmt, move |rows| {
            on_loaded(rows.first().and_then(StoredProfile::from_row));
        })
    }

    /// Like [`load_one`](Self::load_one); `on_failed` runs if the query fails.
    pub fn load_one_or_else<F, E>(
        &self,
        uuid: Uuid,
        on_loaded: F,
        on_failed: E,
    ) -> Result<Completion, TagVaultError>
    where
        F: FnOnce(Option<StoredProfile>) + Send + 'static,
        E: FnOnce() + Send + 'static,
    {
        let stmt = Statement::new(self.sql.select_one).bind(uuid.to_string());
        self.executor.query_or_else(
            stmt,
            move |rows| on_loaded(rows.first().and_then(StoredProfile::from_row)),
            on_failed,
        )
    }

    pub fn load_all<F>(&self, on_loaded: F) -> Result<Completion, TagVaultError>
    where
        F: FnOnce(Vec<StoredProfile>) + Send + 'static,
    {
        let stmt = Statement::new(self.sql.select_all);
        self.executor.query(stmt, move |rows| {
            let total = rows.len();
            let parsed: Vec<StoredProfile> = rows
                .rows()
                .iter()
                .filter_map(StoredProfile::from_row)
                .collect();
            if parsed.len() != total {
                warn!(
                    skipped = total - parsed.len(),
                    "rows with a malformed uuid were skipped"
                );
            }
            on_loaded(parsed);
        })
    }

    /// Writes the display name only; the tag columns are left untouched.
    pub fn upsert_name(&self, uuid: Uuid, name: &str) -> Result<Completion, TagVaultError> {
        let stmt = Statement::new(self.sql.upsert_name)
            .bind(uuid.to_string())
            .bind(name);
        self.executor.execute(stmt)
    }

    /// Writes the tag pair only; `None` clears the selection.
    pub fn upsert_tag(
        &self,
        uuid: Uuid,
        tag: Option<&str>,
        tag_prefix: Option<&str>,
    ) -> Result<Completion, TagVaultError> {
        let stmt = Statement::new(self.sql.upsert_tag)
            .bind(uuid.to_string())
            .bind(tag)
            .bind(tag_prefix);
        self.executor.execute(stmt)
    }

    /// Removes one row; a missing row is a no-op.
    pub fn delete_one(&self, uuid: Uuid) -> Result<Completion, TagVaultError> {
        let stmt = Statement::new(self.sql.delete_one).bind(uuid.to_string());
        self.executor.execute(stmt)
    }

    pub fn delete_all(&self) -> Result<Completion, TagVaultError> {
        self.executor.execute(Statement::new(self.sql.delete_all))
    }
}
