use crate::error::TagVaultError;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::{fmt, path::PathBuf};

/// Which backend engine to use. Chosen once at startup, never mixed at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Engine {
    /// Embedded single-file engine.
    #[default]
    Sqlite,
    /// Networked pooled-connection engine.
    #[serde(alias = "mariadb")]
    MySql,
}

impl Engine {
    pub fn as_str(&self) -> &'static str {
        match self {
            Engine::Sqlite => "sqlite",
            Engine::MySql => "mysql",
        }
    }
}

impl fmt::Display for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    /// TOML: `storage.engine`. Default: `sqlite`.
    #[serde(default)]
    pub engine: Engine,

    /// Upper bound on statements running at the same time.
    /// TOML: `storage.max_in_flight`. Default: `16`.
    #[serde(default = "default_max_in_flight")]
    pub max_in_flight: u32,

    #[serde(default)]
    pub sqlite: SqliteConfig,

    #[serde(default)]
    pub mysql: MySqlConfig,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            engine: Engine::default(),
            max_in_flight: default_max_in_flight(),
            sqlite: SqliteConfig::default(),
            mysql: MySqlConfig::default(),
        }
    }
}

impl StorageConfig {
    pub(super) fn validate(&self) -> Result<(), TagVaultError> {
        if self.max_in_flight == 0 {
            return Err(TagVaultError::UnexpectedError(
                "storage.max_in_flight must be at least 1".to_string(),
            ));
        }
        match self.engine {
            Engine::Sqlite if self.sqlite.path.as_os_str().is_empty() => {
                Err(TagVaultError::UnexpectedError(
                    "storage.sqlite.path must be set".to_string(),
                ))
            }
            Engine::MySql if self.mysql.database.trim().is_empty() => {
                Err(TagVaultError::UnexpectedError(
                    "storage.mysql.database must be set".to_string(),
                ))
            }
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SqliteConfig {
    /// Database file; created if missing.
    /// TOML: `storage.sqlite.path`. Default: `tagvault.db`.
    #[serde(default)]
    pub path: PathBuf,

    /// TOML: `storage.sqlite.max_connections`. Default: `4`.
    #[serde(default)]
    pub max_connections: u32,
}

impl Default for SqliteConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("tagvault.db"),
            max_connections: 4,
        }
    }
}

#[derive(Clone, Deserialize, Serialize)]
pub struct MySqlConfig {
    /// TOML: `storage.mysql.host`. Default: `localhost`.
    #[serde(default)]
    pub host: String,

    /// TOML: `storage.mysql.port`. Default: `3306`.
    #[serde(default)]
    pub port: u16,

    /// TOML: `storage.mysql.database`. Required when `engine = "mysql"`.
    #[serde(default)]
    pub database: String,

    #[serde(default)]
    pub username: String,

    /// Accepts a string or a bare number in TOML.
    #[serde(default)]
    #[serde(deserialize_with = "deserialize_string_lax")]
    pub password: String,

    /// TOML: `storage.mysql.max_connections`. Default: `10`.
    #[serde(default)]
    pub max_connections: u32,
}

impl Default for MySqlConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 3306,
            database: "".to_string(),
            username: "root".to_string(),
            password: "".to_string(),
            max_connections: 10,
        }
    }
}

// Keeps the password out of logs.
impl fmt::Debug for MySqlConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MySqlConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("max_connections", &self.max_connections)
            .finish()
    }
}

fn deserialize_string_lax<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let v = Value::deserialize(deserializer)?;

    match v {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        _ => Err(serde::de::Error::custom(
            "expected a string or a number for storage.mysql.password",
        )),
    }
}

fn default_max_in_flight() -> u32 {
    16
}
