// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Kubernetes client construction from a per-cluster kubeconfig

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use k8s_openapi::apimachinery::pkg::version::Info;
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config};
use tracing::debug;

/// Timeout for connecting to K8s API
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Timeout for reading K8s API responses
const READ_TIMEOUT: Duration = Duration::from_secs(30);

/// The capability the resolver needs from a built client
#[async_trait]
pub trait ApiClient: Send + Sync {
    /// Ask the API server for its version
    async fn server_version(&self) -> Result<Info>;
}

/// Builds an API client from a credential file and an API server URL
#[async_trait]
pub trait ClientFactory: Send + Sync {
    type Client: ApiClient;

    async fn build(&self, credential_path: &Path, api_server: &str) -> Result<Self::Client>;
}

#[async_trait]
impl ApiClient for Client {
    async fn server_version(&self) -> Result<Info> {
        Ok(self.apiserver_version().await?)
    }
}

/// Builds `kube::Client`s, pointing them at the registry's load balancer
#[derive(Debug, Clone)]
pub struct KubeClientFactory {
    connect_timeout: Duration,
    read_timeout: Duration,
}

impl KubeClientFactory {
    pub fn new() -> Self {
        Self {
            connect_timeout: CONNECT_TIMEOUT,
            read_timeout: READ_TIMEOUT,
        }
    }

    pub fn with_timeouts(connect_timeout: Duration, read_timeout: Duration) -> Self {
        Self {
            connect_timeout,
            read_timeout,
        }
    }

    /// Load the kubeconfig and override its server with `api_server`
    ///
    /// An empty `api_server` keeps whatever server the kubeconfig names.
    pub async fn config_for(&self, credential_path: &Path, api_server: &str) -> Result<Config> {
        let kubeconfig = Kubeconfig::read_from(credential_path).with_context(|| {
            format!("Failed to read kubeconfig {}", credential_path.display())
        })?;

        let mut config =
            Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
                .await
                .with_context(|| {
                    format!("Failed to load kubeconfig {}", credential_path.display())
                })?;

        if !api_server.is_empty() {
            config.cluster_url = api_server
                .parse()
                .with_context(|| format!("Invalid API server URL '{}'", api_server))?;
        }

        config.connect_timeout = Some(self.connect_timeout);
        config.read_timeout = Some(self.read_timeout);

        Ok(config)
    }
}

impl Default for KubeClientFactory {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ClientFactory for KubeClientFactory {
    type Client = Client;

    async fn build(&self, credential_path: &Path, api_server: &str) -> Result<Client> {
        let config = self.config_for(credential_path, api_server).await?;
        debug!(
            api_server = %config.cluster_url,
            kubeconfig = %credential_path.display(),
            "Building Kubernetes client"
        );
        Client::try_from(config).with_context(|| {
            format!(
                "Failed to create client from {}",
                credential_path.display()
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const KUBECONFIG: &str = r#"apiVersion: v1
kind: Config
clusters:
- name: paas
  cluster:
    server: https://original.example:6443
    insecure-skip-tls-verify: true
contexts:
- name: paas
  context:
    cluster: paas
    user: admin
current-context: paas
users:
- name: admin
  user:
    token: secret-token
"#;

    fn write_kubeconfig() -> (TempDir, std::path::PathBuf) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("c1");
        fs::write(&path, KUBECONFIG).unwrap();
        (dir, path)
    }

    #[tokio::test]
    async fn test_config_overrides_server() {
        let (_dir, path) = write_kubeconfig();
        let factory = KubeClientFactory::new();
        let config = factory
            .config_for(&path, "https://10.0.0.1:6443")
            .await
            .unwrap();
        assert_eq!(config.cluster_url.scheme_str(), Some("https"));
        assert_eq!(config.cluster_url.host(), Some("10.0.0.1"));
        assert_eq!(config.cluster_url.port_u16(), Some(6443));
        assert_eq!(config.connect_timeout, Some(CONNECT_TIMEOUT));
        assert_eq!(config.read_timeout, Some(READ_TIMEOUT));
    }

    #[tokio::test]
    async fn test_config_keeps_server_for_empty_endpoint() {
        let (_dir, path) = write_kubeconfig();
        let config = KubeClientFactory::new()
            .config_for(&path, "")
            .await
            .unwrap();
        assert_eq!(config.cluster_url.host(), Some("original.example"));
    }

    #[tokio::test]
    async fn test_config_rejects_unreadable_kubeconfig() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("c1");
        fs::write(&path, "::: not yaml :::").unwrap();
        let result = KubeClientFactory::new().config_for(&path, "").await;
        assert!(result.is_err());
    }

    #[test]
    fn test_custom_timeouts() {
        let factory =
            KubeClientFactory::with_timeouts(Duration::from_secs(1), Duration::from_secs(2));
        assert_eq!(factory.connect_timeout, Duration::from_secs(1));
        assert_eq!(factory.read_timeout, Duration::from_secs(2));
    }
}
