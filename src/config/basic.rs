use serde::{Deserialize, Serialize};

/// Basic (core) configuration managed by Figment.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BasicConfig {
    /// Log level for tracing subscriber initialization (e.g., "error", "warn", "info", "debug", "trace").
    /// TOML: `basic.loglevel`. Default: `info`.
    #[serde(default)]
    pub loglevel: String,
}

impl Default for BasicConfig {
    fn default() -> Self {
        Self {
            loglevel: "info".to_string(),
        }
    }
}
