// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Cluster routing for a multi-cluster Kubernetes console
//!
//! Resolves logical cluster ids published by the PaaS admin service into
//! connectivity-checked `kube::Client`s, and filters multi-cluster queries
//! with [`cluster::ClusterSelector`].

pub mod cluster;
pub mod config;
pub mod progress;
