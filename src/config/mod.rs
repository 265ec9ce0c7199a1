mod basic;
mod storage;

pub use basic::BasicConfig;
pub use storage::{Engine, MySqlConfig, SqliteConfig, StorageConfig};

use crate::error::TagVaultError;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Application configuration managed by Figment.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct Config {
    /// Core settings (see `basic` table in config.toml).
    #[serde(default)]
    pub basic: BasicConfig,

    /// Backend engine selection and connection parameters (see `storage` table in config.toml).
    #[serde(default)]
    pub storage: StorageConfig,
}

pub const DEFAULT_CONFIG_FILE: &str = "config.toml";

const ENV_PREFIX: &str = "TAGVAULT_";

impl Config {
    /// Builds a Figment that merges defaults, the TOML file at `path` (if present)
    /// and `TAGVAULT_`-prefixed environment variables (`__` separates nested keys).
    pub fn figment(path: impl AsRef<Path>) -> Figment {
        let path = path.as_ref();
        let mut figment = Figment::new().merge(Serialized::defaults(Config::default()));
        if path.is_file() {
            figment = figment.merge(Toml::file(path));
        }
        figment.merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Loads and validates configuration. The result is passed explicitly to the
    /// backend connector and executor; there is no global instance.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, TagVaultError> {
        let cfg: Self = Self::figment(path).extract()?;
        cfg.storage.validate()?;
        Ok(cfg)
    }
}
