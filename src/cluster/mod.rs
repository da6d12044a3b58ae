// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Cluster registry, selection and client resolution
//!
//! The admin service publishes the set of known clusters. [`ClusterRegistry`]
//! keeps the last successfully fetched snapshot, [`ClusterSelector`] filters
//! queries across clusters, and [`ClusterClientResolver`] turns an id into a
//! connectivity-checked Kubernetes client.

mod client;
mod credentials;
mod error;
mod matcher;
mod registry;
mod resolver;
mod selector;

pub use client::{ApiClient, ClientFactory, KubeClientFactory};
pub use credentials::CredentialLocator;
pub use error::ClusterError;
pub use matcher::{ALL_KEYWORD, ClusterSpecMatcher};
pub use registry::ClusterRegistry;
pub use resolver::{
    ClusterClientResolver, MissingRecordPolicy, ResolveOptions, ResolveStage, ResolvedClient,
    api_server_url,
};
pub use selector::{ALL_CLUSTERS, ClusterSelector};

use serde::{Deserialize, Serialize};

/// One cluster as published by the admin service
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterRecord {
    #[serde(rename = "clusterId", default)]
    pub id: String,
    /// Region/zone tag, informational only
    #[serde(default)]
    pub area: String,
    #[serde(rename = "clusterLBIP", default)]
    pub load_balancer_host: String,
    /// Kept as text: the admin service sends it as a string and the scheme
    /// decision compares it literally
    #[serde(rename = "clusterLBPort", default)]
    pub load_balancer_port: String,
}

impl ClusterRecord {
    pub fn new(
        id: impl Into<String>,
        area: impl Into<String>,
        host: impl Into<String>,
        port: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            area: area.into(),
            load_balancer_host: host.into(),
            load_balancer_port: port.into(),
        }
    }

    /// Records with an empty id can never be looked up
    pub fn is_resolvable(&self) -> bool {
        !self.id.is_empty()
    }
}
