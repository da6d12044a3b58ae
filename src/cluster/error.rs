// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Error taxonomy for registry refresh, selection and client resolution

use std::path::PathBuf;

use thiserror::Error;

use super::resolver::ResolveStage;

#[derive(Debug, Error)]
pub enum ClusterError {
    /// A required setting (admin address, credential directory) is missing
    #[error("configuration error: {0}")]
    Configuration(&'static str),

    /// Transport failure talking to the admin service
    #[error("failed to fetch cluster list from {url}: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The admin service answered with something other than 200
    #[error("cluster list request returned status {status}")]
    Upstream { status: u16 },

    #[error("failed to decode cluster list: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("cluster '{0}' not found in registry")]
    NotFound(String),

    /// An exact id in a selection spec is not in the registry
    #[error("unknown cluster '{0}'")]
    UnknownCluster(String),

    #[error("no clusters matched '{0}'")]
    NoMatch(String),

    #[error("invalid cluster id '{0}'")]
    InvalidClusterId(String),

    #[error("credential file {} does not exist", .0.display())]
    CredentialNotFound(PathBuf),

    #[error("failed to check credential file {}: {source}", .path.display())]
    CredentialCheck {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    ClientFactory(anyhow::Error),

    #[error("cluster '{cluster}' at '{endpoint}' is unreachable: {source}")]
    Connectivity {
        cluster: String,
        endpoint: String,
        #[source]
        source: anyhow::Error,
    },
}

impl ClusterError {
    /// Resolution stage this error aborts at
    ///
    /// Registry and selection errors happen outside a resolution and have none.
    pub fn stage(&self) -> Option<ResolveStage> {
        match self {
            ClusterError::NotFound(_) => Some(ResolveStage::BuildEndpoint),
            ClusterError::Configuration(_)
            | ClusterError::InvalidClusterId(_)
            | ClusterError::CredentialNotFound(_)
            | ClusterError::CredentialCheck { .. } => Some(ResolveStage::LocateCredential),
            ClusterError::ClientFactory(_) => Some(ResolveStage::ConstructClient),
            ClusterError::Connectivity { .. } => Some(ResolveStage::VerifyConnectivity),
            ClusterError::Network { .. }
            | ClusterError::Upstream { .. }
            | ClusterError::Decode(_)
            | ClusterError::UnknownCluster(_)
            | ClusterError::NoMatch(_) => None,
        }
    }

    /// Whether retrying the same call may succeed without operator action
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ClusterError::Network { .. }
                | ClusterError::Upstream { .. }
                | ClusterError::Connectivity { .. }
        )
    }
}
