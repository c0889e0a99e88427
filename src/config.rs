use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::time::Duration;

use crate::services::history::SlowHistoryConfig;

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub hierarchy: HierarchyConfig,

    #[serde(default)]
    pub latency: LatencyConfig,

    /// Children fetches running longer than this fail with a timeout
    #[serde(default)]
    pub fetch_timeout_ms: Option<u64>,

    /// Publish a snapshot when a row enters the loading state
    #[serde(default = "default_false")]
    pub broadcast_loading: bool,
}

fn default_false() -> bool {
    false
}

/// Parent -> ordered children mapping plus the ordered level-0 identities
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HierarchyConfig {
    #[serde(default)]
    pub roots: Vec<String>,

    #[serde(default)]
    pub children: BTreeMap<String, Vec<String>>,
}

impl Default for HierarchyConfig {
    fn default() -> Self {
        let children = [
            ("Fruits", &["Apple", "Orange", "Banana"][..]),
            ("Vegetables", &["Tomato", "Potato", "Onion"][..]),
            ("Apple", &["Fuji", "Macintosh"][..]),
            ("Onion", &["Yellow", "White", "Purple"][..]),
        ]
        .into_iter()
        .map(|(parent, kids)| {
            (
                parent.to_string(),
                kids.iter().map(|kid| kid.to_string()).collect(),
            )
        })
        .collect();

        Self {
            roots: vec!["Fruits".to_string(), "Vegetables".to_string()],
            children,
        }
    }
}

/// Simulated backend latency
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LatencyConfig {
    #[serde(default)]
    pub roots_delay_ms: u64,

    #[serde(default)]
    pub children_delay_ms: u64,
}

impl LatencyConfig {
    pub fn to_slow_config(&self) -> SlowHistoryConfig {
        SlowHistoryConfig {
            roots_delay: Duration::from_millis(self.roots_delay_ms),
            children_delay: Duration::from_millis(self.children_delay_ms),
            ..SlowHistoryConfig::none()
        }
    }

    pub fn is_zero(&self) -> bool {
        self.roots_delay_ms == 0 && self.children_delay_ms == 0
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            hierarchy: HierarchyConfig::default(),
            latency: LatencyConfig::default(),
            fetch_timeout_ms: None,
            broadcast_loading: false,
        }
    }
}

impl Config {
    /// Load configuration from a JSON file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        let config: Config = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a JSON file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path.as_ref(), contents)?;
        Ok(())
    }

    pub fn fetch_timeout(&self) -> Option<Duration> {
        self.fetch_timeout_ms.map(Duration::from_millis)
    }

    /// Reject configurations the projector cannot represent unambiguously
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = HashSet::new();
        for root in &self.hierarchy.roots {
            if !seen.insert(root) {
                return Err(ConfigError::Validation(format!(
                    "root '{root}' is listed more than once"
                )));
            }
        }
        if self.fetch_timeout_ms == Some(0) {
            return Err(ConfigError::Validation(
                "fetch_timeout_ms must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Validation error: {0}")]
    Validation(String),
}
