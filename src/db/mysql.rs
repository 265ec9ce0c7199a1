use crate::config::{Engine, MySqlConfig};
use crate::db::connector::Connector;
use crate::db::schema::{TABLE, init_statements};
use crate::db::statement::{ResultRow, ResultSet, Statement};
use crate::error::TagVaultError;
use async_trait::async_trait;
use parking_lot::RwLock;
use sqlx::mysql::{MySqlConnectOptions, MySqlPool, MySqlPoolOptions, MySqlRow, MySqlSslMode};
use sqlx::{Column, Row};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, error, info};

const STATEMENT_CACHE_CAPACITY: usize = 250;
const DEFAULT_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(10);

/// Networked pooled-connection engine (MySQL / MariaDB).
pub struct MySqlConnector {
    cfg: MySqlConfig,
    acquire_timeout: Duration,
    pool: RwLock<Option<MySqlPool>>,
    transition: Mutex<()>,
}

impl MySqlConnector {
    pub fn new(cfg: MySqlConfig) -> Self {
        Self {
            cfg,
            acquire_timeout: DEFAULT_ACQUIRE_TIMEOUT,
            pool: RwLock::new(None),
            transition: Mutex::new(()),
        }
    }

    /// How long `connect` (and each later checkout) waits for a connection.
    #[must_use]
    pub fn with_acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    fn pool(&self) -> Result<MySqlPool, TagVaultError> {
        self.pool
            .read()
            .clone()
            .ok_or(TagVaultError::ConnectionNotReady)
    }

    fn connect_options(&self) -> MySqlConnectOptions {
        MySqlConnectOptions::new()
            .host(&self.cfg.host)
            .port(self.cfg.port)
            .database(&self.cfg.database)
            .username(&self.cfg.username)
            .password(&self.cfg.password)
            .ssl_mode(MySqlSslMode::Disabled)
            .statement_cache_capacity(STATEMENT_CACHE_CAPACITY)
    }
}

#[async_trait]
impl Connector for MySqlConnector {
    fn engine(&self) -> Engine {
        Engine::MySql
    }

    async fn connect(&self) -> Result<(), TagVaultError> {
        let _guard = self.transition.lock().await;
        if self.pool.read().is_some() {
            debug!(host = %self.cfg.host, "mysql already connected");
            return Ok(());
        }

        info!(
            host = %self.cfg.host,
            port = self.cfg.port,
            database = %self.cfg.database,
            "Connecting to MySQL..."
        );
        let pool = MySqlPoolOptions::new()
            .max_connections(self.cfg.max_connections.max(1))
            .acquire_timeout(self.acquire_timeout)
            .connect_with(self.connect_options())
            .await
            .map_err(|e| {
                error!(host = %self.cfg.host, port = self.cfg.port, error = %e, "Could not connect to MySQL");
                TagVaultError::Connect {
                    engine: Engine::MySql.as_str(),
                    message: e.to_string(),
                }
            })?;

        *self.pool.write() = Some(pool);
        info!(host = %self.cfg.host, database = %self.cfg.database, "Connected to MySQL");
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
        debug!(table = TABLE, "mysql schema ensured");
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
            info!(host = %self.cfg.host, "MySQL pool closed");
        }
    }
}

fn to_result_row(row: &MySqlRow) -> Result<ResultRow, sqlx::Error> {
    let mut columns = Vec::with_capacity(row.len());
    for column in row.columns() {
        let value: Option<String> = row.try_get(column.ordinal())?;
        columns.push((column.name().to_string(), value));
    }
    Ok(ResultRow::new(columns))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> MySqlConfig {
        MySqlConfig {
            host: "db.internal".to_string(),
            port: 3307,
            database: "tags".to_string(),
            username: "svc".to_string(),
            password: "secret".to_string(),
            max_connections: 4,
        }
    }

    #[test]
    fn connect_options_follow_config() {
        let connector = MySqlConnector::new(cfg());
        let opts = connector.connect_options();
        assert_eq!(opts.get_host(), "db.internal");
        assert_eq!(opts.get_port(), 3307);
        assert_eq!(opts.get_database(), Some("tags"));
        assert_eq!(opts.get_username(), "svc");
    }

    #[tokio::test]
    async fn operations_before_connect_are_rejected() {
        let connector = MySqlConnector::new(cfg());
        assert!(!connector.is_connected());

        let err = connector
            .execute(&Statement::new("DELETE FROM SimpleTags"))
            .await
            .unwrap_err();
        assert!(matches!(err, TagVaultError::ConnectionNotReady));

        let err = connector.ensure_schema().await.unwrap_err();
        assert!(matches!(err, TagVaultError::ConnectionNotReady));
    }

    #[tokio::test]
    async fn failed_connect_leaves_no_handle() {
        let mut cfg = cfg();
        cfg.host = "127.0.0.1".to_string();
        cfg.port = 1;
        let connector =
            MySqlConnector::new(cfg).with_acquire_timeout(Duration::from_millis(200));

        let started = std::time::Instant::now();
        let err = connector.connect().await.unwrap_err();
        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(matches!(err, TagVaultError::Connect { engine: "mysql", .. }));
        assert!(!connector.is_connected());
    }
}
