//! Runtime configuration for catalog access, filtering and batching

use crate::types::{BasemapError, BasemapResult};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Default catalog root
pub const DEFAULT_BASE_URL: &str = "https://api.planet.com/basemaps/v1";

/// Remote catalog access settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiSettings {
    /// Root of the basemaps API; `/mosaics` is appended for the listing
    pub base_url: String,
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_secs: 30,
            user_agent: format!("pbasemap/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl ApiSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// How the download-permission flag gates admission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PermissionGate {
    /// Only the first entry of each page is inspected; an absent flag
    /// skips admission for the whole page.
    #[default]
    FirstEntry,
    /// Every entry is gated on its own flag; only entries that explicitly
    /// grant quad download are evaluated.
    PerEntry,
}

/// Admission filter settings
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FilterSettings {
    pub permission_gate: PermissionGate,
}

/// AOI batch settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BatchSettings {
    /// Upper bound on AOI features walked at once by the parallel orchestrator
    pub max_concurrency: usize,
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self { max_concurrency: 4 }
    }
}

/// Top-level configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BasemapConfig {
    pub api: ApiSettings,
    pub filter: FilterSettings,
    pub batch: BatchSettings,
}

impl BasemapConfig {
    /// Load configuration from a JSON file; missing keys take their defaults
    pub fn from_file<P: AsRef<Path>>(path: P) -> BasemapResult<Self> {
        log::info!("Loading configuration: {}", path.as_ref().display());
        let content = std::fs::read_to_string(&path)?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> BasemapResult<Self> {
        let config: Self = serde_json::from_str(content)
            .map_err(|e| BasemapError::Config(format!("Invalid configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> BasemapResult<()> {
        if self.api.base_url.trim().is_empty() {
            return Err(BasemapError::Config("api.base_url is empty".to_string()));
        }
        if self.api.timeout_secs == 0 {
            return Err(BasemapError::Config("api.timeout_secs must be positive".to_string()));
        }
        if self.batch.max_concurrency == 0 {
            return Err(BasemapError::Config(
                "batch.max_concurrency must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
