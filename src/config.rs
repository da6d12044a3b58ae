// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Configuration for paas-router
//!
//! Settings are layered, later layers winning:
//! 1. ~/.paas-router/config.json
//! 2. PAAS_ADMIN_URL / KUBE_CONFIG_DIR environment variables
//! 3. Command line flags
//!
//! All paas-router data is stored under ~/.paas-router/:
//! - ~/.paas-router/config.json - user configuration
//! - ~/.paas-router/log/ - rolling log files

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Admin service address, without scheme
pub const ADMIN_URL_ENV: &str = "PAAS_ADMIN_URL";

/// Directory holding one kubeconfig per cluster id
pub const CREDENTIAL_DIR_ENV: &str = "KUBE_CONFIG_DIR";

const DEFAULT_REFRESH_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Get the base paas-router directory (~/.paas-router/)
pub fn base_dir() -> Result<PathBuf> {
    dirs::home_dir()
        .map(|p| p.join(".paas-router"))
        .context("Could not determine home directory")
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Admin service host[:port]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin_service_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential_base_dir: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_timeout_secs: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub probe_timeout_secs: Option<u64>,
    /// Build clients for ids missing from the registry
    #[serde(default)]
    pub allow_unregistered: bool,
}

/// Values given on the command line
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub admin_service_address: Option<String>,
    pub credential_base_dir: Option<PathBuf>,
    pub refresh_timeout_secs: Option<u64>,
    pub probe_timeout_secs: Option<u64>,
    pub allow_unregistered: bool,
}

impl Config {
    /// Load config from disk, or return default if not found
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            let config: Config = serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
            Ok(config)
        } else {
            Ok(Config::default())
        }
    }

    /// Config file, then process environment, then `overrides`
    pub fn resolve(overrides: &ConfigOverrides) -> Result<Self> {
        Ok(Self::load()?
            .with_env(|key| std::env::var(key).ok())
            .with_overrides(overrides))
    }

    /// Overlay environment values; empty values count as unset
    pub fn with_env(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let var = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        if let Some(address) = var(ADMIN_URL_ENV) {
            self.admin_service_address = Some(address);
        }
        if let Some(dir) = var(CREDENTIAL_DIR_ENV) {
            self.credential_base_dir = Some(PathBuf::from(dir));
        }
        self
    }

    pub fn with_overrides(mut self, overrides: &ConfigOverrides) -> Self {
        if let Some(ref address) = overrides.admin_service_address {
            self.admin_service_address = Some(address.clone());
        }
        if let Some(ref dir) = overrides.credential_base_dir {
            self.credential_base_dir = Some(dir.clone());
        }
        if overrides.refresh_timeout_secs.is_some() {
            self.refresh_timeout_secs = overrides.refresh_timeout_secs;
        }
        if overrides.probe_timeout_secs.is_some() {
            self.probe_timeout_secs = overrides.probe_timeout_secs;
        }
        self.allow_unregistered |= overrides.allow_unregistered;
        self
    }

    pub fn refresh_timeout(&self) -> Duration {
        self.refresh_timeout_secs
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_REFRESH_TIMEOUT)
    }

    pub fn probe_timeout(&self) -> Duration {
        self.probe_timeout_secs
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_PROBE_TIMEOUT)
    }

    /// Save config to disk
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    /// Write via a temp file and rename so readers never see a partial file
    pub fn save_to(&self, path: &Path) -> Result<()> {
        use tempfile::NamedTempFile;

        let parent = path.parent().unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create config directory: {}", parent.display()))?;

        let content = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        let temp_file = NamedTempFile::new_in(parent).context("Failed to create temp file")?;
        fs::write(temp_file.path(), content)
            .with_context(|| format!("Failed to write temp file {:?}", temp_file.path()))?;
        temp_file
            .persist(path)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Persist command line values on top of the config file
    ///
    /// Environment values are left out so they stay process-scoped.
    pub fn save_overrides(overrides: &ConfigOverrides) -> Result<Self> {
        Self::save_overrides_to(&Self::config_path()?, overrides)
    }

    pub fn save_overrides_to(path: &Path, overrides: &ConfigOverrides) -> Result<Self> {
        let config = Self::load_from(path)?.with_overrides(overrides);
        config.save_to(path)?;
        Ok(config)
    }

    /// Get the config file path (~/.paas-router/config.json)
    pub fn config_path() -> Result<PathBuf> {
        Ok(base_dir()?.join("config.json"))
    }
}
