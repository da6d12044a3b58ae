// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Cluster selection for multi-cluster queries
//!
//! Three cases:
//! 1. No cluster selected: every cluster matches
//! 2. One cluster selected: downstream queries can target it directly
//! 3. Several clusters selected: query broadly, then filter locally with `matches`

use std::collections::BTreeSet;

use super::ClusterRecord;

/// Request parameter meaning "all clusters", following the Kubernetes
/// all-namespaces convention
pub const ALL_CLUSTERS: &str = "";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClusterSelector {
    cluster_ids: BTreeSet<String>,
}

impl ClusterSelector {
    pub fn new<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            cluster_ids: ids.into_iter().map(Into::into).collect(),
        }
    }

    /// Selector without restriction
    pub fn all() -> Self {
        Self::default()
    }

    pub fn is_all(&self) -> bool {
        self.cluster_ids.is_empty()
    }

    pub fn len(&self) -> usize {
        self.cluster_ids.len()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.cluster_ids.iter().map(String::as_str)
    }

    /// The single selected id, or [`ALL_CLUSTERS`] otherwise
    pub fn request_parameter(&self) -> &str {
        match self.cluster_ids.len() {
            1 => self
                .cluster_ids
                .first()
                .map(String::as_str)
                .unwrap_or(ALL_CLUSTERS),
            _ => ALL_CLUSTERS,
        }
    }

    /// Exact membership test; an empty selector matches everything
    pub fn matches(&self, candidate: &str) -> bool {
        self.is_all() || self.cluster_ids.contains(candidate)
    }

    /// Records whose id this selector matches, order preserved
    pub fn filter<'a>(&self, records: &'a [ClusterRecord]) -> Vec<&'a ClusterRecord> {
        records.iter().filter(|r| self.matches(&r.id)).collect()
    }
}

impl<S: Into<String>> FromIterator<S> for ClusterSelector {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self::new(iter)
    }
}
