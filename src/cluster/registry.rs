// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Registry of known clusters, fetched from the PaaS admin service
//!
//! The registry holds an immutable snapshot that is swapped wholesale on
//! every successful refresh. Readers clone the `Arc` and never wait on the
//! network; a failed refresh leaves the previous snapshot in place.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use reqwest::{Client, StatusCode};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::{ClusterError, ClusterRecord};
use crate::config::Config;
use crate::progress::{ProgressHandle, create_progress_handle};

/// Path of the cluster list on the admin service
const CLUSTER_LIST_PATH: &str = "/icbc/paas/api/cluster/getAllCluster";

/// Snapshot plus the time it was fetched
struct Snapshot {
    records: Arc<[ClusterRecord]>,
    fetched_at: Option<Instant>,
}

impl Snapshot {
    fn empty() -> Self {
        Self {
            records: Arc::from(Vec::new()),
            fetched_at: None,
        }
    }
}

pub struct ClusterRegistry {
    admin_address: Option<String>,
    refresh_timeout: Duration,
    http: Client,
    snapshot: RwLock<Snapshot>,
    progress: ProgressHandle,
}

impl ClusterRegistry {
    /// Create an empty registry; nothing is fetched until `refresh()`
    pub fn new(config: &Config) -> Self {
        Self {
            admin_address: config.admin_service_address.clone(),
            refresh_timeout: config.refresh_timeout(),
            http: Client::new(),
            snapshot: RwLock::new(Snapshot::empty()),
            progress: create_progress_handle(),
        }
    }

    /// Registry already holding `records`, as if freshly refreshed
    #[cfg(test)]
    pub(crate) fn from_records(records: Vec<ClusterRecord>) -> Self {
        Self {
            snapshot: RwLock::new(Snapshot {
                records: Arc::from(records),
                fetched_at: Some(Instant::now()),
            }),
            ..Self::new(&Config::default())
        }
    }

    /// Share a progress reporter with other components
    pub fn with_progress(mut self, progress: ProgressHandle) -> Self {
        self.progress = progress;
        self
    }

    pub fn progress(&self) -> &ProgressHandle {
        &self.progress
    }

    /// Full URL of the cluster list endpoint
    pub fn cluster_list_url(&self) -> Result<String, ClusterError> {
        let address = self
            .admin_address
            .as_deref()
            .filter(|a| !a.is_empty())
            .ok_or(ClusterError::Configuration(
                "PAAS_ADMIN_URL should not be empty",
            ))?;
        Ok(format!("http://{}{}", address, CLUSTER_LIST_PATH))
    }

    /// Refresh using the configured timeout
    pub async fn refresh(&self) -> Result<usize, ClusterError> {
        self.refresh_within(self.refresh_timeout).await
    }

    /// Fetch the cluster list and replace the snapshot
    ///
    /// The snapshot is only replaced after a 200 response whose body decodes;
    /// every other outcome returns an error and leaves it untouched.
    pub async fn refresh_within(&self, timeout: Duration) -> Result<usize, ClusterError> {
        let url = self.cluster_list_url()?;
        self.progress.refreshing(&url);
        let start = Instant::now();

        let response = self
            .http
            .get(&url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|source| ClusterError::Network {
                url: url.clone(),
                source,
            })?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|source| ClusterError::Network {
                url: url.clone(),
                source,
            })?;
        debug!(url = %url, status = %status, bytes = body.len(), "Cluster list response");

        if status != StatusCode::OK {
            warn!(url = %url, status = %status, "Cluster list request failed");
            return Err(ClusterError::Upstream {
                status: status.as_u16(),
            });
        }

        let records: Vec<ClusterRecord> = serde_json::from_slice(&body)?;
        Self::warn_malformed(&records);

        let count = records.len();
        {
            let mut snapshot = self.snapshot.write().await;
            *snapshot = Snapshot {
                records: Arc::from(records),
                fetched_at: Some(Instant::now()),
            };
        }

        let elapsed_ms = start.elapsed().as_millis() as u64;
        info!(clusters = count, elapsed_ms, "Refreshed cluster registry");
        self.progress.refresh_complete(count, elapsed_ms);
        Ok(count)
    }

    /// Refresh only if never fetched or older than `ttl`
    ///
    /// Returns `None` when the current snapshot was fresh enough.
    pub async fn refresh_if_stale(&self, ttl: Duration) -> Result<Option<usize>, ClusterError> {
        if self.is_stale(ttl).await {
            self.refresh().await.map(Some)
        } else {
            Ok(None)
        }
    }

    /// Find a record by exact id
    ///
    /// When upstream data repeats an id the last record wins.
    pub async fn lookup(&self, id: &str) -> Result<ClusterRecord, ClusterError> {
        let records = self.snapshot().await;
        find_last(&records, id)
            .cloned()
            .ok_or_else(|| ClusterError::NotFound(id.to_string()))
    }

    /// Current records in admin service order
    pub async fn snapshot(&self) -> Arc<[ClusterRecord]> {
        Arc::clone(&self.snapshot.read().await.records)
    }

    /// Distinct non-empty ids, first occurrence order
    pub async fn ids(&self) -> Vec<String> {
        let records = self.snapshot().await;
        let mut seen = HashSet::new();
        records
            .iter()
            .filter(|r| r.is_resolvable() && seen.insert(r.id.as_str()))
            .map(|r| r.id.clone())
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.snapshot.read().await.records.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Time since the last successful refresh
    pub async fn age(&self) -> Option<Duration> {
        self.snapshot.read().await.fetched_at.map(|t| t.elapsed())
    }

    pub async fn is_stale(&self, ttl: Duration) -> bool {
        self.age().await.is_none_or(|age| age > ttl)
    }

    fn warn_malformed(records: &[ClusterRecord]) {
        let mut seen = HashSet::new();
        for record in records {
            if !record.is_resolvable() {
                warn!(area = %record.area, host = %record.load_balancer_host, "Cluster record without id");
            } else if !seen.insert(record.id.as_str()) {
                warn!(cluster = %record.id, "Duplicate cluster id, last record wins");
            }
        }
    }
}

fn find_last<'a>(records: &'a [ClusterRecord], id: &str) -> Option<&'a ClusterRecord> {
    if id.is_empty() {
        return None;
    }
    records.iter().rev().find(|r| r.id == id)
}
