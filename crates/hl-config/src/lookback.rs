use std::path::Path;
use std::str::FromStr;

use serde::Deserialize;

use crate::allow_list::AllowListConfig;
use crate::logging::LoggingConfig;
use crate::query::QueryConfig;
use crate::store::StoreConfig;
use crate::validate;

// ---------------------------------------------------------------------------
// LookbackConfig: parsed and validated `lookback.toml`
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct LookbackConfig {
    pub store: StoreConfig,
    #[serde(default)]
    pub query: QueryConfig,
    #[serde(default)]
    pub allow_list: AllowListConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl LookbackConfig {
    /// Read and parse a `lookback.toml` file.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| anyhow::anyhow!("failed to read {}: {e}", path.as_ref().display()))?;
        content.parse()
    }
}

impl FromStr for LookbackConfig {
    type Err = anyhow::Error;

    /// Parse a TOML string into a validated [`LookbackConfig`].
    fn from_str(toml_str: &str) -> anyhow::Result<Self> {
        let config: LookbackConfig = toml::from_str(toml_str)?;
        validate::validate(&config)?;
        Ok(config)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
