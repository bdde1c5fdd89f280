//! Configuration Management
//!
//! Handles persistent configuration storage for tablesync.

use crate::reconcile::ReconcileSettings;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_REGION: &str = "us-east-1";

/// User configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// AWS region
    #[serde(default)]
    pub region: Option<String>,
    /// Endpoint override (e.g. DynamoDB Local)
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Shared credentials profile
    #[serde(default)]
    pub profile: Option<String>,
    #[serde(default = "default_busy_backoff_ms")]
    pub busy_backoff_ms: u64,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Pause between passes once a table is converged
    #[serde(default = "default_resync_interval_ms")]
    pub resync_interval_ms: u64,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Consecutive retryable failures tolerated before a table is given up
    #[serde(default = "default_max_transport_retries")]
    pub max_transport_retries: u32,
}

fn default_busy_backoff_ms() -> u64 {
    5_000
}

fn default_poll_interval_ms() -> u64 {
    2_000
}

fn default_resync_interval_ms() -> u64 {
    60_000
}

fn default_request_timeout_ms() -> u64 {
    10_000
}

fn default_max_transport_retries() -> u32 {
    5
}

impl Default for Config {
    fn default() -> Self {
        Self {
            region: None,
            endpoint: None,
            profile: None,
            busy_backoff_ms: default_busy_backoff_ms(),
            poll_interval_ms: default_poll_interval_ms(),
            resync_interval_ms: default_resync_interval_ms(),
            request_timeout_ms: default_request_timeout_ms(),
            max_transport_retries: default_max_transport_retries(),
        }
    }
}

impl Config {
    /// Get the config file path
    fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("tablesync").join("config.json"))
    }

    /// Load configuration from disk
    pub fn load() -> Self {
        let Some(path) = Self::config_path() else {
            return Self::default();
        };

        if !path.exists() {
            return Self::default();
        }

        match std::fs::read_to_string(&path) {
            Ok(content) => Self::from_json(&content),
            Err(_) => Self::default(),
        }
    }

    /// Parse a config document; malformed files fall back to defaults
    pub fn from_json(content: &str) -> Self {
        serde_json::from_str(content).unwrap_or_else(|e| {
            tracing::warn!("Ignoring malformed config file: {}", e);
            Self::default()
        })
    }

    /// Save configuration to disk
    pub fn save(&self) -> Result<()> {
        let Some(path) = Self::config_path() else {
            return Ok(());
        };

        // Create parent directory
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, content)
            .with_context(|| format!("Failed to write {}", path.display()))?;

        Ok(())
    }

    /// Get effective profile (CLI > config > AWS_PROFILE > default)
    pub fn effective_profile(&self, cli: Option<&str>) -> String {
        crate::aws::auth::active_profile(cli.or(self.profile.as_deref()))
    }

    /// Get effective region (CLI > config > env > ~/.aws/config > us-east-1)
    pub fn effective_region(&self, cli: Option<&str>, profile: &str) -> String {
        cli.map(str::to_string)
            .or_else(|| self.region.clone())
            .or_else(|| crate::aws::auth::get_default_region(Some(profile)))
            .unwrap_or_else(|| DEFAULT_REGION.to_string())
    }

    /// Get effective endpoint override (CLI > config)
    pub fn effective_endpoint(&self, cli: Option<&str>) -> Option<String> {
        cli.map(str::to_string).or_else(|| self.endpoint.clone())
    }

    /// Timing policy for a single pass
    pub fn reconcile_settings(&self) -> ReconcileSettings {
        ReconcileSettings {
            busy_backoff: Duration::from_millis(self.busy_backoff_ms),
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            request_timeout: Duration::from_millis(self.request_timeout_ms),
        }
    }

    pub fn resync_interval(&self) -> Duration {
        Duration::from_millis(self.resync_interval_ms)
    }

    /// Set region and save
    pub fn set_region(&mut self, region: &str) -> Result<()> {
        self.region = Some(region.to_string());
        self.save()
    }
}
