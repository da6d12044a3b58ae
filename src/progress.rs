// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Progress reporting for registry refreshes and cluster resolution
//!
//! The registry and resolver publish updates on a broadcast channel; the CLI
//! subscribes and turns them into spinner messages.

use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::broadcast;

use crate::cluster::ResolveStage;

/// Create a spinner with consistent styling
pub fn create_spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner()
        .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏")
        .template("{spinner:.cyan} {msg} {elapsed:.dim}")
    {
        pb.set_style(style);
    }
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(80));
    pb
}

/// Progress update message
#[derive(Clone, Debug)]
pub enum ProgressUpdate {
    // === Registry ===
    /// Fetching the cluster list
    Refreshing { url: String },
    /// Cluster list replaced
    RefreshComplete { clusters: usize, elapsed_ms: u64 },

    // === Resolution ===
    /// A resolution entered a new stage
    Stage { cluster: String, stage: ResolveStage },
    /// Client built and probed
    Resolved { cluster: String, elapsed_ms: u64 },

    // === Batch resolution ===
    StartingBatch { cluster_count: usize },
    ClusterComplete {
        cluster: String,
        ok: bool,
        elapsed_ms: u64,
    },
}

pub struct ProgressReporter {
    sender: broadcast::Sender<ProgressUpdate>,
    /// Clusters finished in the current batch
    clusters_done: AtomicUsize,
    /// Clusters in the current batch
    clusters_total: AtomicUsize,
}

impl ProgressReporter {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(100);
        Self {
            sender,
            clusters_done: AtomicUsize::new(0),
            clusters_total: AtomicUsize::new(0),
        }
    }

    /// Subscribe to progress updates
    pub fn subscribe(&self) -> broadcast::Receiver<ProgressUpdate> {
        self.sender.subscribe()
    }

    pub fn refreshing(&self, url: &str) {
        let _ = self.sender.send(ProgressUpdate::Refreshing {
            url: url.to_string(),
        });
    }

    pub fn refresh_complete(&self, clusters: usize, elapsed_ms: u64) {
        let _ = self.sender.send(ProgressUpdate::RefreshComplete {
            clusters,
            elapsed_ms,
        });
    }

    pub fn stage(&self, cluster: &str, stage: ResolveStage) {
        let _ = self.sender.send(ProgressUpdate::Stage {
            cluster: cluster.to_string(),
            stage,
        });
    }

    pub fn resolved(&self, cluster: &str, elapsed_ms: u64) {
        let _ = self.sender.send(ProgressUpdate::Resolved {
            cluster: cluster.to_string(),
            elapsed_ms,
        });
    }

    /// Report batch start, resetting the counters
    pub fn start_batch(&self, cluster_count: usize) {
        self.clusters_done.store(0, Ordering::SeqCst);
        self.clusters_total.store(cluster_count, Ordering::SeqCst);
        let _ = self
            .sender
            .send(ProgressUpdate::StartingBatch { cluster_count });
    }

    pub fn cluster_complete(&self, cluster: &str, ok: bool, elapsed_ms: u64) {
        self.clusters_done.fetch_add(1, Ordering::SeqCst);
        let _ = self.sender.send(ProgressUpdate::ClusterComplete {
            cluster: cluster.to_string(),
            ok,
            elapsed_ms,
        });
    }

    /// Get current batch progress (done/total)
    pub fn progress(&self) -> (usize, usize) {
        (
            self.clusters_done.load(Ordering::SeqCst),
            self.clusters_total.load(Ordering::SeqCst),
        )
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

/// Thread-safe handle to progress reporter
pub type ProgressHandle = Arc<ProgressReporter>;

pub fn create_progress_handle() -> ProgressHandle {
    Arc::new(ProgressReporter::new())
}
