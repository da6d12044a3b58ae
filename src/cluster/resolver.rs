// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Cluster id to connectivity-checked client resolution
//!
//! Each call walks the same stages:
//! LOOKUP_RECORD -> LOCATE_CREDENTIAL -> BUILD_ENDPOINT -> CONSTRUCT_CLIENT
//! -> VERIFY_CONNECTIVITY -> RESOLVED, stopping at the first failing stage.
//! A missing registry record is only acted upon once the credential file has
//! been checked.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::anyhow;
use k8s_openapi::apimachinery::pkg::version::Info;
use tracing::{debug, info, warn};

use super::client::{ApiClient, ClientFactory};
use super::{ClusterError, ClusterRecord, ClusterRegistry, ClusterSelector, CredentialLocator};
use crate::config::Config;
use crate::progress::ProgressHandle;

/// Port served without TLS; every other port gets https
const PLAINTEXT_PORT: &str = "8080";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveStage {
    LookupRecord,
    LocateCredential,
    BuildEndpoint,
    ConstructClient,
    VerifyConnectivity,
    Resolved,
}

impl fmt::Display for ResolveStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ResolveStage::LookupRecord => "LOOKUP_RECORD",
            ResolveStage::LocateCredential => "LOCATE_CREDENTIAL",
            ResolveStage::BuildEndpoint => "BUILD_ENDPOINT",
            ResolveStage::ConstructClient => "CONSTRUCT_CLIENT",
            ResolveStage::VerifyConnectivity => "VERIFY_CONNECTIVITY",
            ResolveStage::Resolved => "RESOLVED",
        };
        f.write_str(name)
    }
}

/// What to do when the registry has no record for the requested id
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MissingRecordPolicy {
    /// Fail with `NotFound` before any client is built
    #[default]
    FailFast,
    /// Build the client against an empty endpoint, leaving the server to the
    /// kubeconfig
    Permissive,
}

#[derive(Debug, Clone)]
pub struct ResolveOptions {
    pub probe_timeout: Duration,
    pub missing_record: MissingRecordPolicy,
}

impl ResolveOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            probe_timeout: config.probe_timeout(),
            missing_record: if config.allow_unregistered {
                MissingRecordPolicy::Permissive
            } else {
                MissingRecordPolicy::FailFast
            },
        }
    }
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// A client bound to one cluster, with what was used to build it
pub struct ResolvedClient<C> {
    pub client: C,
    pub cluster_id: String,
    pub endpoint: String,
    pub credential_path: PathBuf,
    pub version: Info,
}

impl<C> fmt::Debug for ResolvedClient<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedClient")
            .field("cluster_id", &self.cluster_id)
            .field("endpoint", &self.endpoint)
            .field("credential_path", &self.credential_path)
            .field("version", &self.version.git_version)
            .finish_non_exhaustive()
    }
}

/// API server URL for a record: plain http on 8080, https on anything else
pub fn api_server_url(record: &ClusterRecord) -> String {
    let scheme = if record.load_balancer_port == PLAINTEXT_PORT {
        "http"
    } else {
        "https"
    };
    format!(
        "{}://{}:{}",
        scheme, record.load_balancer_host, record.load_balancer_port
    )
}

pub struct ClusterClientResolver<F> {
    registry: Arc<ClusterRegistry>,
    locator: CredentialLocator,
    factory: F,
    options: ResolveOptions,
    progress: ProgressHandle,
}

impl<F: ClientFactory> ClusterClientResolver<F> {
    /// Progress events go to the registry's reporter
    pub fn new(
        registry: Arc<ClusterRegistry>,
        locator: CredentialLocator,
        factory: F,
        options: ResolveOptions,
    ) -> Self {
        let progress = Arc::clone(registry.progress());
        Self {
            registry,
            locator,
            factory,
            options,
            progress,
        }
    }

    pub fn registry(&self) -> &Arc<ClusterRegistry> {
        &self.registry
    }

    pub fn options(&self) -> &ResolveOptions {
        &self.options
    }

    /// Resolve with the configured probe timeout
    pub async fn resolve(&self, cluster_id: &str) -> Result<ResolvedClient<F::Client>, ClusterError> {
        self.resolve_within(cluster_id, self.options.probe_timeout)
            .await
    }

    /// Resolve `cluster_id`, bounding the connectivity probe by `probe_timeout`
    pub async fn resolve_within(
        &self,
        cluster_id: &str,
        probe_timeout: Duration,
    ) -> Result<ResolvedClient<F::Client>, ClusterError> {
        let start = Instant::now();
        match self.run_stages(cluster_id, probe_timeout).await {
            Ok(resolved) => {
                self.enter(cluster_id, ResolveStage::Resolved);
                self.progress
                    .resolved(cluster_id, start.elapsed().as_millis() as u64);
                Ok(resolved)
            }
            Err(e) => {
                warn!(
                    cluster = %cluster_id,
                    stage = %e.stage().map(|s| s.to_string()).unwrap_or_default(),
                    error = %e,
                    "Cluster resolution failed"
                );
                Err(e)
            }
        }
    }

    async fn run_stages(
        &self,
        cluster_id: &str,
        probe_timeout: Duration,
    ) -> Result<ResolvedClient<F::Client>, ClusterError> {
        self.enter(cluster_id, ResolveStage::LookupRecord);
        let record = self.registry.lookup(cluster_id).await.ok();
        if record.is_none() {
            debug!(cluster = %cluster_id, "No registry record, endpoint unresolved");
        }

        self.enter(cluster_id, ResolveStage::LocateCredential);
        let credential_path = self.locator.locate(cluster_id)?;

        self.enter(cluster_id, ResolveStage::BuildEndpoint);
        let endpoint = match (&record, self.options.missing_record) {
            (Some(record), _) => api_server_url(record),
            (None, MissingRecordPolicy::FailFast) => {
                return Err(ClusterError::NotFound(cluster_id.to_string()));
            }
            (None, MissingRecordPolicy::Permissive) => {
                warn!(cluster = %cluster_id, "Building client without a registry endpoint");
                String::new()
            }
        };
        info!(cluster = %cluster_id, api_server = %endpoint, "Cluster API server");

        self.enter(cluster_id, ResolveStage::ConstructClient);
        let client = self
            .factory
            .build(&credential_path, &endpoint)
            .await
            .map_err(ClusterError::ClientFactory)?;

        self.enter(cluster_id, ResolveStage::VerifyConnectivity);
        let version = match tokio::time::timeout(probe_timeout, client.server_version()).await {
            Ok(Ok(version)) => version,
            Ok(Err(source)) => {
                return Err(ClusterError::Connectivity {
                    cluster: cluster_id.to_string(),
                    endpoint,
                    source,
                });
            }
            Err(_) => {
                return Err(ClusterError::Connectivity {
                    cluster: cluster_id.to_string(),
                    endpoint,
                    source: anyhow!("version probe timed out after {:?}", probe_timeout),
                });
            }
        };
        info!(
            cluster = %cluster_id,
            version = %version.git_version,
            "Successful initial request to the apiserver"
        );

        Ok(ResolvedClient {
            client,
            cluster_id: cluster_id.to_string(),
            endpoint,
            credential_path,
            version,
        })
    }

    /// Resolve every cluster a selector names, concurrently
    ///
    /// An unrestricted selector covers every id in the registry; an explicit
    /// one is taken as-is so unknown ids surface as errors. Results keep the
    /// order of the ids.
    pub async fn resolve_selected(
        &self,
        selector: &ClusterSelector,
    ) -> Vec<(String, Result<ResolvedClient<F::Client>, ClusterError>)> {
        let ids: Vec<String> = if selector.is_all() {
            self.registry.ids().await
        } else {
            selector.ids().map(String::from).collect()
        };

        self.progress.start_batch(ids.len());

        let pending = ids.into_iter().map(|id| async move {
            let start = Instant::now();
            let result = self.resolve(&id).await;
            self.progress.cluster_complete(
                &id,
                result.is_ok(),
                start.elapsed().as_millis() as u64,
            );
            (id, result)
        });

        futures::future::join_all(pending).await
    }

    fn enter(&self, cluster_id: &str, stage: ResolveStage) {
        debug!(cluster = %cluster_id, stage = %stage, "Resolution stage");
        self.progress.stage(cluster_id, stage);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::ProgressUpdate;
    use anyhow::{Result, bail};
    use async_trait::async_trait;
    use std::fs;
    use std::path::Path;
    use std::sync::Mutex;
    use tempfile::TempDir;

    struct StubClient {
        reachable: bool,
        delay: Option<Duration>,
    }

    #[async_trait]
    impl ApiClient for StubClient {
        async fn server_version(&self) -> Result<Info> {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if !self.reachable {
                bail!("connection refused");
            }
            Ok(Info {
                git_version: "v1.29.3".to_string(),
                major: "1".to_string(),
                minor: "29".to_string(),
                ..Default::default()
            })
        }
    }

    struct StubFactory {
        builds: Mutex<Vec<(PathBuf, String)>>,
        fail_build: bool,
        reachable: bool,
        delay: Option<Duration>,
    }

    impl StubFactory {
        fn healthy() -> Self {
            Self {
                builds: Mutex::new(Vec::new()),
                fail_build: false,
                reachable: true,
                delay: None,
            }
        }

        fn build_count(&self) -> usize {
            self.builds.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl ClientFactory for StubFactory {
        type Client = StubClient;

        async fn build(&self, credential_path: &Path, api_server: &str) -> Result<StubClient> {
            self.builds
                .lock()
                .unwrap()
                .push((credential_path.to_path_buf(), api_server.to_string()));
            if self.fail_build {
                bail!("malformed kubeconfig");
            }
            Ok(StubClient {
                reachable: self.reachable,
                delay: self.delay,
            })
        }
    }

    struct Fixture {
        resolver: ClusterClientResolver<StubFactory>,
        dir: TempDir,
    }

    fn fixture(
        records: Vec<ClusterRecord>,
        credential_files: &[&str],
        factory: StubFactory,
        options: ResolveOptions,
    ) -> Fixture {
        let dir = TempDir::new().unwrap();
        for name in credential_files {
            fs::write(dir.path().join(name), "apiVersion: v1\nkind: Config\n").unwrap();
        }
        let registry = Arc::new(ClusterRegistry::from_records(records));
        let locator = CredentialLocator::new(Some(dir.path().to_path_buf()));
        Fixture {
            resolver: ClusterClientResolver::new(registry, locator, factory, options),
            dir,
        }
    }

    fn c1() -> ClusterRecord {
        ClusterRecord::new("c1", "bj", "10.0.0.1", "6443")
    }

    #[test]
    fn test_api_server_url_scheme() {
        let tls = ClusterRecord::new("a", "", "192.168.1.10", "6443");
        assert_eq!(api_server_url(&tls), "https://192.168.1.10:6443");

        let plain = ClusterRecord::new("b", "", "10.0.0.5", "8080");
        assert_eq!(api_server_url(&plain), "http://10.0.0.5:8080");

        for port in ["443", "8443", "80", "08080", "8080 ", ""] {
            let record = ClusterRecord::new("c", "", "h", port);
            assert!(api_server_url(&record).starts_with("https://"), "port {:?}", port);
        }
    }

    #[test]
    fn test_stage_display() {
        assert_eq!(ResolveStage::LocateCredential.to_string(), "LOCATE_CREDENTIAL");
        assert_eq!(ResolveStage::Resolved.to_string(), "RESOLVED");
    }

    #[tokio::test]
    async fn test_resolve_success() {
        let fx = fixture(vec![c1()], &["c1"], StubFactory::healthy(), ResolveOptions::default());
        let resolved = fx.resolver.resolve("c1").await.unwrap();

        assert_eq!(resolved.endpoint, "https://10.0.0.1:6443");
        assert_eq!(resolved.credential_path, fx.dir.path().join("c1"));
        assert_eq!(resolved.cluster_id, "c1");
        assert_eq!(resolved.version.git_version, "v1.29.3");

        let builds = fx.resolver.factory.builds.lock().unwrap();
        assert_eq!(
            *builds,
            vec![(fx.dir.path().join("c1"), "https://10.0.0.1:6443".to_string())]
        );
    }

    #[tokio::test]
    async fn test_resolve_walks_all_stages() {
        let fx = fixture(vec![c1()], &["c1"], StubFactory::healthy(), ResolveOptions::default());
        let mut rx = fx.resolver.registry().progress().subscribe();
        fx.resolver.resolve("c1").await.unwrap();

        let stages: Vec<ResolveStage> = std::iter::from_fn(|| rx.try_recv().ok())
            .filter_map(|u| match u {
                ProgressUpdate::Stage { stage, .. } => Some(stage),
                _ => None,
            })
            .collect();
        assert_eq!(
            stages,
            vec![
                ResolveStage::LookupRecord,
                ResolveStage::LocateCredential,
                ResolveStage::BuildEndpoint,
                ResolveStage::ConstructClient,
                ResolveStage::VerifyConnectivity,
                ResolveStage::Resolved,
            ]
        );
    }

    #[tokio::test]
    async fn test_no_record_no_credential_stops_before_client() {
        let fx = fixture(vec![c1()], &["c1"], StubFactory::healthy(), ResolveOptions::default());
        let err = fx.resolver.resolve("ghost").await.unwrap_err();

        assert!(matches!(err, ClusterError::CredentialNotFound(_)));
        assert_eq!(err.stage(), Some(ResolveStage::LocateCredential));
        assert_eq!(fx.resolver.factory.build_count(), 0);
    }

    #[tokio::test]
    async fn test_record_without_credential() {
        let fx = fixture(vec![c1()], &[], StubFactory::healthy(), ResolveOptions::default());
        let err = fx.resolver.resolve("c1").await.unwrap_err();
        assert!(matches!(err, ClusterError::CredentialNotFound(_)));
        assert_eq!(fx.resolver.factory.build_count(), 0);
    }

    #[tokio::test]
    async fn test_missing_record_fails_fast() {
        let fx = fixture(vec![c1()], &["c2"], StubFactory::healthy(), ResolveOptions::default());
        let err = fx.resolver.resolve("c2").await.unwrap_err();

        assert!(matches!(err, ClusterError::NotFound(ref id) if id == "c2"));
        assert_eq!(err.stage(), Some(ResolveStage::BuildEndpoint));
        assert_eq!(fx.resolver.factory.build_count(), 0);
    }

    #[tokio::test]
    async fn test_missing_record_permissive_uses_empty_endpoint() {
        let options = ResolveOptions {
            missing_record: MissingRecordPolicy::Permissive,
            ..Default::default()
        };
        let fx = fixture(vec![c1()], &["c2"], StubFactory::healthy(), options);
        let resolved = fx.resolver.resolve("c2").await.unwrap();

        assert_eq!(resolved.endpoint, "");
        let builds = fx.resolver.factory.builds.lock().unwrap();
        assert_eq!(builds[0].1, "");
    }

    #[tokio::test]
    async fn test_unconfigured_credential_dir() {
        let registry = Arc::new(ClusterRegistry::from_records(vec![c1()]));
        let resolver = ClusterClientResolver::new(
            registry,
            CredentialLocator::new(None),
            StubFactory::healthy(),
            ResolveOptions::default(),
        );
        let err = resolver.resolve("c1").await.unwrap_err();
        assert!(matches!(err, ClusterError::Configuration(_)));
    }

    #[tokio::test]
    async fn test_factory_error_propagates() {
        let factory = StubFactory {
            fail_build: true,
            ..StubFactory::healthy()
        };
        let fx = fixture(vec![c1()], &["c1"], factory, ResolveOptions::default());
        let err = fx.resolver.resolve("c1").await.unwrap_err();

        assert!(matches!(err, ClusterError::ClientFactory(_)));
        assert_eq!(err.to_string(), "malformed kubeconfig");
    }

    #[tokio::test]
    async fn test_unreachable_is_connectivity_error() {
        let factory = StubFactory {
            reachable: false,
            ..StubFactory::healthy()
        };
        let fx = fixture(vec![c1()], &["c1"], factory, ResolveOptions::default());
        let err = fx.resolver.resolve("c1").await.unwrap_err();

        match err {
            ClusterError::Connectivity {
                cluster, endpoint, ..
            } => {
                assert_eq!(cluster, "c1");
                assert_eq!(endpoint, "https://10.0.0.1:6443");
            }
            other => panic!("Expected Connectivity, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_probe_timeout_is_connectivity_error() {
        let factory = StubFactory {
            delay: Some(Duration::from_secs(5)),
            ..StubFactory::healthy()
        };
        let fx = fixture(vec![c1()], &["c1"], factory, ResolveOptions::default());
        let err = fx
            .resolver
            .resolve_within("c1", Duration::from_millis(20))
            .await
            .unwrap_err();

        assert!(matches!(err, ClusterError::Connectivity { .. }));
        assert!(err.to_string().contains("timed out"));
    }

    #[tokio::test]
    async fn test_plaintext_port_endpoint() {
        let record = ClusterRecord::new("c5", "sh", "10.0.0.5", "8080");
        let fx = fixture(vec![record], &["c5"], StubFactory::healthy(), ResolveOptions::default());
        let resolved = fx.resolver.resolve("c5").await.unwrap();
        assert_eq!(resolved.endpoint, "http://10.0.0.5:8080");
    }

    #[tokio::test]
    async fn test_resolve_selected_all() {
        let records = vec![
            c1(),
            ClusterRecord::new("c2", "sh", "10.0.0.2", "8080"),
            ClusterRecord::new("c3", "gz", "10.0.0.3", "6443"),
        ];
        let fx = fixture(records, &["c1", "c2"], StubFactory::healthy(), ResolveOptions::default());
        let results = fx.resolver.resolve_selected(&ClusterSelector::all()).await;

        let ids: Vec<_> = results.iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(ids, vec!["c1", "c2", "c3"]);
        assert!(results[0].1.is_ok());
        assert!(results[1].1.is_ok());
        assert!(matches!(
            results[2].1,
            Err(ClusterError::CredentialNotFound(_))
        ));
        assert_eq!(fx.resolver.registry().progress().progress(), (3, 3));
    }

    #[tokio::test]
    async fn test_resolve_selected_explicit() {
        let records = vec![c1(), ClusterRecord::new("c2", "sh", "10.0.0.2", "8080")];
        let fx = fixture(records, &["c1", "c2"], StubFactory::healthy(), ResolveOptions::default());
        let selector = ClusterSelector::new(["c2"]);
        let results = fx.resolver.resolve_selected(&selector).await;

        assert_eq!(results.len(), 1);
        let (id, result) = &results[0];
        assert_eq!(id, "c2");
        assert_eq!(result.as_ref().unwrap().endpoint, "http://10.0.0.2:8080");
    }
}
