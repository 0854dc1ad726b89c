//! Dashboard configuration loading and resolution
//!
//! Config file resolution priority:
//! 1. Command-line argument (highest priority)
//! 2. `FOPS_CONFIG` environment variable
//! 3. Platform config file (`<config_dir>/fops/config.toml`)
//! 4. Compiled defaults (fallback)
//!
//! A missing file is not an error: every field has a default, so a partial
//! or absent file still yields a usable configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::approval::GateLimits;
use crate::connector::ReconnectPolicy;
use crate::geography::{is_valid_region_code, US_STATE_CODES};
use crate::pagination::DEFAULT_PAGE_SIZE;
use crate::tier::Metric;
use crate::{Error, Result};

/// Environment variable naming the config file
pub const CONFIG_ENV_VAR: &str = "FOPS_CONFIG";

/// Default HTTP listen address
pub const DEFAULT_BIND: &str = "127.0.0.1:5790";

/// Top-level dashboard configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    /// HTTP listen address
    pub bind: String,
    /// Rows per list page
    pub page_size: usize,
    pub generation: GenerationConfig,
    pub stream: StreamConfig,
    pub status: StatusConfig,
    pub feed: FeedConfig,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            bind: DEFAULT_BIND.to_string(),
            page_size: DEFAULT_PAGE_SIZE,
            generation: GenerationConfig::default(),
            stream: StreamConfig::default(),
            status: StatusConfig::default(),
            feed: FeedConfig::default(),
        }
    }
}

/// Planning-area hierarchy and synthetic collections
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    pub seed: u64,
    pub regions: Vec<String>,
    pub sub_zones_per_region: u16,
    pub contractors_per_area: usize,
    pub targets_per_area: usize,
    /// Reference date for derived state; today when unset
    pub as_of: Option<NaiveDate>,
    /// Metric contractor tiers are computed from
    pub contractor_metric: Metric,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            regions: US_STATE_CODES.iter().map(|s| s.to_string()).collect(),
            sub_zones_per_region: 9,
            contractors_per_area: 2,
            targets_per_area: 2,
            as_of: None,
            contractor_metric: Metric::GpeRatio,
        }
    }
}

/// Live stream endpoint and reconnect policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// SSE endpoint; the stream stays closed when unset
    pub url: Option<String>,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub multiplier: f64,
    /// Unset retries forever
    pub max_retries: Option<u32>,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            url: None,
            initial_backoff_ms: 500,
            max_backoff_ms: 30_000,
            multiplier: 2.0,
            max_retries: None,
        }
    }
}

impl StreamConfig {
    pub fn reconnect_policy(&self) -> ReconnectPolicy {
        ReconnectPolicy {
            initial_backoff: Duration::from_millis(self.initial_backoff_ms),
            max_backoff: Duration::from_millis(self.max_backoff_ms),
            multiplier: self.multiplier,
            max_retries: self.max_retries,
        }
    }
}

/// Connected-managers status polling
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusConfig {
    /// Status endpoint; polling is disabled when unset
    pub url: Option<String>,
    pub poll_interval_ms: u64,
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self {
            url: None,
            poll_interval_ms: 15_000,
        }
    }
}

impl StatusConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Feed, approval gate and event bus sizing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    pub capacity: usize,
    pub dedup_window: usize,
    pub early_decision_limit: usize,
    pub resolved_window: usize,
    pub bus_capacity: usize,
    /// Receives a POST per operator decision when set
    pub decision_webhook: Option<String>,
}

impl Default for FeedConfig {
    fn default() -> Self {
        let limits = GateLimits::default();
        Self {
            capacity: limits.feed_capacity,
            dedup_window: limits.dedup_window,
            early_decision_limit: limits.early_decision_limit,
            resolved_window: limits.resolved_window,
            bus_capacity: 256,
            decision_webhook: None,
        }
    }
}

impl FeedConfig {
    pub fn gate_limits(&self) -> GateLimits {
        GateLimits {
            feed_capacity: self.capacity,
            dedup_window: self.dedup_window,
            early_decision_limit: self.early_decision_limit,
            resolved_window: self.resolved_window,
        }
    }
}

impl DashboardConfig {
    /// Parse TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("Invalid config: {}", e)))
    }

    /// Load from `path`; missing file yields defaults
    pub fn load(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(content) => {
                let config = Self::from_toml_str(&content)
                    .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
                info!(path = %path.display(), "Loaded configuration");
                Ok(config)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(path = %path.display(), "Config file not found, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(Error::Io(e)),
        }
    }

    /// Resolve the config file location and load it
    pub fn resolve(cli_path: Option<&Path>) -> Result<Self> {
        match resolve_config_path(cli_path) {
            Some(path) => Self::load(&path),
            None => {
                info!("No config file location available, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Reject values the runtime cannot work with
    pub fn validate(&self) -> Result<()> {
        let generation = &self.generation;
        if generation.regions.is_empty() {
            return Err(Error::Config("generation.regions must not be empty".to_string()));
        }
        let mut seen = std::collections::HashSet::new();
        for region in &generation.regions {
            if !is_valid_region_code(region) {
                return Err(Error::Config(format!(
                    "generation.regions: invalid region code {:?}",
                    region
                )));
            }
            if !seen.insert(region.as_str()) {
                return Err(Error::Config(format!(
                    "generation.regions: duplicate region code {}",
                    region
                )));
            }
        }
        if generation.sub_zones_per_region == 0 {
            return Err(Error::Config(
                "generation.sub_zones_per_region must be at least 1".to_string(),
            ));
        }
        if !matches!(generation.contractor_metric, Metric::GpeRatio | Metric::Revenue) {
            return Err(Error::Config(format!(
                "generation.contractor_metric: {:?} has no performance tier table",
                generation.contractor_metric
            )));
        }
        if self.page_size == 0 {
            return Err(Error::Config("page_size must be at least 1".to_string()));
        }
        if self.stream.max_backoff_ms < self.stream.initial_backoff_ms {
            return Err(Error::Config(
                "stream.max_backoff_ms must be >= stream.initial_backoff_ms".to_string(),
            ));
        }
        if !self.stream.multiplier.is_finite() || self.stream.multiplier < 1.0 {
            return Err(Error::Config("stream.multiplier must be >= 1.0".to_string()));
        }
        if self.status.poll_interval_ms == 0 {
            return Err(Error::Config("status.poll_interval_ms must be positive".to_string()));
        }
        if self.feed.capacity == 0 {
            return Err(Error::Config("feed.capacity must be at least 1".to_string()));
        }
        if self.feed.bus_capacity == 0 {
            return Err(Error::Config("feed.bus_capacity must be at least 1".to_string()));
        }
        Ok(())
    }

    /// Reference date for derived state
    pub fn as_of(&self) -> NaiveDate {
        self.generation
            .as_of
            .unwrap_or_else(|| chrono::Utc::now().date_naive())
    }
}

/// Config file location following the priority order above
///
/// `None` only when no platform config directory exists.
pub fn resolve_config_path(cli_path: Option<&Path>) -> Option<PathBuf> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_path {
        return Some(path.to_path_buf());
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    // Priority 3: Platform config file
    default_config_path()
}

/// `<config_dir>/fops/config.toml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("fops").join("config.toml"))
}
