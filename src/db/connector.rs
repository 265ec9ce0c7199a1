use crate::config::{Engine, StorageConfig};
use crate::db::mysql::MySqlConnector;
use crate::db::sqlite::SqliteConnector;
use crate::db::statement::{ResultSet, Statement};
use crate::error::TagVaultError;
use async_trait::async_trait;
use std::sync::Arc;

/// Capability contract shared by every storage engine.
///
/// Implementations own a connection pool that exists only between a successful
/// [`connect`](Connector::connect) and [`close`](Connector::close). Any record
/// operation outside that window fails with [`TagVaultError::ConnectionNotReady`];
/// nothing reconnects implicitly.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    fn engine(&self) -> Engine;

    /// Establish the pool. On failure the connector stays disconnected.
    async fn connect(&self) -> Result<(), TagVaultError>;

    fn is_connected(&self) -> bool;

    /// Create the profile relation if it does not exist. Safe to repeat.
    async fn ensure_schema(&self) -> Result<(), TagVaultError>;

    /// Run a mutating statement, returning the number of affected rows.
    async fn execute(&self, statement: &Statement) -> Result<u64, TagVaultError>;

    /// Run a read statement and return every row as text columns.
    async fn query(&self, statement: &Statement) -> Result<ResultSet, TagVaultError>;

    /// Release the pool. Subsequent operations fail with `ConnectionNotReady`.
    async fn close(&self);
}

/// Build the connector for the configured engine. Nothing is connected yet.
pub fn connector_from_config(cfg: &StorageConfig) -> Arc<dyn Connector> {
    match cfg.engine {
        Engine::Sqlite => Arc::new(SqliteConnector::new(cfg.sqlite.clone())),
        Engine::MySql => Arc::new(MySqlConnector::new(cfg.mysql.clone())),
    }
}
