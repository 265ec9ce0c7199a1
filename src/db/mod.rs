//! Database module: backend connectors and the async statement executor.
//!
//! Layout:
//! - `connector.rs`: engine-agnostic `Connector` contract + engine selection
//! - `sqlite.rs` / `mysql.rs`: the two engine implementations
//! - `executor.rs`: actor that runs statements off the caller's path
//! - `schema.rs`: DDL and per-engine statement text
//! - `statement.rs`: statement / result-set types shared by both engines

pub mod connector;
pub mod executor;
pub mod mysql;
pub mod schema;
pub mod sqlite;
pub mod statement;

pub use connector::{Connector, connector_from_config};
pub use executor::{Completion, ExecutorHandle};
pub use mysql::MySqlConnector;
pub use schema::{PROFILE_INIT, ProfileSql};
pub use sqlite::SqliteConnector;
pub use statement::{ResultRow, ResultSet, SqlValue, Statement};

use crate::config::StorageConfig;
use crate::error::TagVaultError;

/// Build the configured connector, connect it, and spawn its executor.
///
/// A connect failure is returned as-is; the integrator decides whether to run
/// without persistence or refuse to start.
pub async fn open(cfg: &StorageConfig) -> Result<ExecutorHandle, TagVaultError> {
    let connector = connector_from_config(cfg);
    connector.connect().await?;
    ExecutorHandle::spawn(connector, cfg.max_in_flight).await
}
