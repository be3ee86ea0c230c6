//! Configuration Management
//!
//! Handles persistent defaults for cloudsweep runs.

use crate::engine::WriteOptions;
use crate::model::ClientConfig;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Concurrency used when neither the CLI nor the config file sets one
pub const DEFAULT_CONCURRENCY: usize = 1;

/// User configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Resource types skipped on every run
    #[serde(default)]
    pub exclude: Vec<String>,
    /// Number of regions crawled at once
    #[serde(default)]
    pub concurrency: Option<usize>,
    /// Passed through to the discovery provider
    #[serde(default)]
    pub client_config: ClientConfig,
    /// Collector API to forward records to
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Keep stored records of scopes with fetch failures
    #[serde(default)]
    pub skip_reconcile_on_failure: bool,
}

impl Config {
    /// Get the config file path
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("cloudsweep").join("config.json"))
    }

    /// Load configuration from the default location
    pub fn load() -> Self {
        match Self::config_path() {
            Some(path) => Self::load_from(&path),
            None => Self::default(),
        }
    }

    /// Load configuration from `path`; missing or unreadable files yield defaults
    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }

        match std::fs::read_to_string(path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                tracing::warn!("Ignoring invalid config {}: {}", path.display(), e);
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    /// Save configuration to `path`
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))?;

        Ok(())
    }

    /// Get effective concurrency (CLI > config > default)
    pub fn effective_concurrency(&self, cli: Option<usize>) -> usize {
        cli.or(self.concurrency).unwrap_or(DEFAULT_CONCURRENCY).max(1)
    }

    /// Get effective endpoint (CLI > config)
    pub fn effective_endpoint(&self, cli: Option<&str>) -> Option<String> {
        cli.map(str::to_string).or_else(|| self.endpoint.clone())
    }

    /// This config with the CLI values folded in, as `--save-config` stores it
    pub fn with_overrides(
        &self,
        cli_exclude: &[String],
        cli_concurrency: Option<usize>,
        cli_endpoint: Option<&str>,
        skip_reconcile_on_failure: bool,
    ) -> Self {
        let mut merged = self.clone();
        for resource_type in cli_exclude {
            if !merged.exclude.contains(resource_type) {
                merged.exclude.push(resource_type.clone());
            }
        }
        merged.concurrency = cli_concurrency.or(self.concurrency);
        merged.endpoint = self.effective_endpoint(cli_endpoint);
        merged.skip_reconcile_on_failure = skip_reconcile_on_failure || self.skip_reconcile_on_failure;
        merged
    }

    /// Merge CLI excludes with configured ones
    pub fn write_options(&self, cli_exclude: &[String], skip_reconcile_on_failure: bool) -> WriteOptions {
        let mut options = WriteOptions::excluding(self.exclude.iter().chain(cli_exclude).cloned());
        options.skip_reconcile_on_failure = skip_reconcile_on_failure || self.skip_reconcile_on_failure;
        options
    }
}
