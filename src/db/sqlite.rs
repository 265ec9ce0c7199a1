use crate::config::{Engine, SqliteConfig};
use crate::db::connector::Connector;
use crate::db::schema::{TABLE, init_statements};
use crate::db::statement::{ResultRow, ResultSet, Statement};
use crate::error::TagVaultError;
use async_trait::async_trait;
use parking_lot::RwLock;
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow, SqliteSynchronous,
};
use sqlx::{Column, Row, SqlitePool};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, error, info};

/// Embedded single-file engine.
pub struct SqliteConnector {
    cfg: SqliteConfig,
    pool: RwLock<Option<SqlitePool>>,
    transition: Mutex<()>,
}

impl SqliteConnector {
    pub fn new(cfg: SqliteConfig) -> Self {
        Self {
            cfg,
            pool: RwLock::new(None),
            transition: Mutex::new(()),
        }
    }

    fn pool(&self) -> Result<SqlitePool, TagVaultError> {
        self.pool
            .read()
            .clone()
            .ok_or(TagVaultError::ConnectionNotReady)
    }

    fn connect_options(&self) -> SqliteConnectOptions {
        SqliteConnectOptions::new()
            .filename(&self.cfg.path)
            .create_if_missing(true)
            .busy_timeout(Duration::from_secs(5))
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
    }
}

#[async_trait]
impl Connector for SqliteConnector {
    fn engine(&self) -> Engine {
        Engine::Sqlite
    }

    async fn connect(&self) -> Result<(), TagVaultError> {
        let _guard = self.transition.lock().await;
        if self.pool.read().is_some() {
            debug!(path = %self.cfg.path.display(), "sqlite already connected");
            return Ok(());
        }

        info!(path = %self.cfg.path.display(), "Connecting to SQLite...");
        let pool = SqlitePoolOptions::new()
            .max_connections(self.cfg.max_connections.max(1))
            .connect_with(self.connect_options())
            .await
            .map_err(|e| {
                error!(path = %self.cfg.path.display(), error = %e, "Could not connect to SQLite");
                TagVaultError::Connect {
                    engine: Engine::Sqlite.as_str(),
                    message: e.to_string(),
                }
            })?;

        *self.pool.write() = Some(pool);
        info!(path = %self.cfg.path.display(), "Connected to SQLite");
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.pool.read().is_some()
    }

    async fn ensure_schema(&self) -> Result<(), TagVaultError> {
        let pool = self.pool()?;
        for stmt in init_statements() {
            sqlx::query(stmt).execute(&pool).await?;
        }
        debug!(table = TABLE, "sqlite schema ensured");
        Ok(())
    }

    async fn execute(&self, statement: &Statement) -> Result<u64, TagVaultError> {
        let pool = self.pool()?;
        let mut query = sqlx::query(statement.sql());
        for value in statement.params() {
            query = query.bind(value.as_deref());
        }
        let res = query.execute(&pool).await?;
        Ok(res.rows_affected())
    }

    async fn query(&self, statement: &Statement) -> Result<ResultSet, TagVaultError> {
        let pool = self.pool()?;
        let mut query = sqlx::query(statement.sql());
        for value in statement.params() {
            query = query.bind(value.as_deref());
        }
        let rows = query.fetch_all(&pool).await?;
        let rows = rows
            .iter()
            .map(to_result_row)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ResultSet::new(rows))
    }

    async fn close(&self) {
        let _guard = self.transition.lock().await;
        let pool = self.pool.write().take();
        if let Some(pool) = pool {
            pool.close().await;
            info!(path = %self.cfg.path.display(), "SQLite pool closed");
        }
    }
}

fn to_result_row(row: &SqliteRow) -> Result<ResultRow, sqlx::Error> {
    let mut columns = Vec::with_capacity(row.len());
    for column in row.columns() {
        let value: Option<String> = row.try_get(column.ordinal())?;
        columns.push((column.name().to_string(), value));
    }
    Ok(ResultRow::new(columns))
}
