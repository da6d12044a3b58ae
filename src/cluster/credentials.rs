// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Per-cluster kubeconfig lookup under the credential directory

use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;

use super::ClusterError;
use crate::config::Config;

/// Locates `{credential_base_dir}/{cluster_id}` kubeconfig files
#[derive(Debug, Clone)]
pub struct CredentialLocator {
    base_dir: Option<PathBuf>,
}

impl CredentialLocator {
    pub fn new(base_dir: Option<PathBuf>) -> Self {
        Self { base_dir }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.credential_base_dir.clone())
    }

    /// Path of the credential file for `cluster_id`, checked for presence
    pub fn locate(&self, cluster_id: &str) -> Result<PathBuf, ClusterError> {
        let base_dir = self
            .base_dir
            .as_deref()
            .filter(|d| !d.as_os_str().is_empty())
            .ok_or(ClusterError::Configuration(
                "KUBE_CONFIG_DIR should not be empty",
            ))?;

        if !is_valid_cluster_id(cluster_id) {
            return Err(ClusterError::InvalidClusterId(cluster_id.to_string()));
        }

        let path = base_dir.join(cluster_id);
        match Self::exists(&path) {
            Ok(true) => {
                debug!(cluster = %cluster_id, path = %path.display(), "Found credential file");
                Ok(path)
            }
            Ok(false) => Err(ClusterError::CredentialNotFound(path)),
            Err(source) => Err(ClusterError::CredentialCheck { path, source }),
        }
    }

    /// Presence check only; absence is `Ok(false)`, other stat failures are errors
    pub fn exists(path: &Path) -> io::Result<bool> {
        match std::fs::metadata(path) {
            Ok(_) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e),
        }
    }
}

/// Alphanumerics and inner dashes, e.g. `bj-01`
///
/// Ids of this shape always name a single entry inside the base directory.
fn is_valid_cluster_id(id: &str) -> bool {
    let bytes = id.as_bytes();
    match (bytes.first(), bytes.last()) {
        (Some(first), Some(last)) => {
            first.is_ascii_alphanumeric()
                && last.is_ascii_alphanumeric()
                && bytes.iter().all(|b| b.is_ascii_alphanumeric() || *b == b'-')
        }
        _ => false,
    }
}
