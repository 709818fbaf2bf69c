// Tracker configuration

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Tunable tracker behavior
///
/// A config file only needs the keys it overrides; missing fields take the
/// defaults below.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Log updates to the core platform
    pub track_core_updates: bool,
    /// Log updates to plugins
    pub track_plugin_updates: bool,
    /// Log updates to themes
    pub track_theme_updates: bool,
    /// Events per page on the list path
    pub page_size: u32,
    /// Seconds a captured "before" version stays usable
    pub pending_ttl_secs: u64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            track_core_updates: true,
            track_plugin_updates: true,
            track_theme_updates: true,
            page_size: crate::store::DEFAULT_PAGE_SIZE,
            pending_ttl_secs: 3600,
        }
    }
}

impl TrackerConfig {
    /// Load configuration from a YAML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file {:?}", path.as_ref()))?;
        serde_yaml::from_str(&raw).context("Failed to parse config file")
    }

    /// TTL for pending "before" versions as a duration
    pub fn pending_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.pending_ttl_secs as i64)
    }
}
