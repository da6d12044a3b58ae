// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Turns textual cluster specs into selectors
//!
//! Patterns are expanded against the ids currently in the registry, so the
//! resulting [`ClusterSelector`] only ever does exact matching.

use super::{ClusterError, ClusterSelector};

/// Spec keyword for "every cluster"
pub const ALL_KEYWORD: &str = "_all";

/// Expands cluster specs against the known cluster ids
///
/// Supports:
/// - Exact ids: "c1"
/// - Glob patterns: "prod-*", "bj-0?"
/// - Comma-separated lists: "c1, c2"
/// - `_all` or an empty spec: no restriction
pub struct ClusterSpecMatcher<'a> {
    known_ids: &'a [String],
}

impl<'a> ClusterSpecMatcher<'a> {
    pub fn new(known_ids: &'a [String]) -> Self {
        Self { known_ids }
    }

    /// Resolve a spec into a selector
    ///
    /// Fails with `UnknownCluster` if an exact id is unknown, or `NoMatch` if the
    /// whole spec matches nothing.
    pub fn resolve(&self, spec: &str) -> Result<ClusterSelector, ClusterError> {
        let spec = spec.trim();
        if spec.is_empty() || spec == ALL_KEYWORD {
            return Ok(ClusterSelector::all());
        }

        let mut matched: Vec<&str> = Vec::new();

        for part in spec.split(',') {
            let pattern = part.trim();
            if pattern.is_empty() {
                continue;
            }

            if pattern.contains('*') || pattern.contains('?') {
                for id in self.known_ids {
                    if glob_match(pattern, id) && !matched.contains(&id.as_str()) {
                        matched.push(id);
                    }
                }
            } else if let Some(id) = self.known_ids.iter().find(|id| *id == pattern) {
                if !matched.contains(&id.as_str()) {
                    matched.push(id);
                }
            } else {
                return Err(ClusterError::UnknownCluster(pattern.to_string()));
            }
        }

        if matched.is_empty() {
            return Err(ClusterError::NoMatch(spec.to_string()));
        }

        Ok(ClusterSelector::new(matched))
    }
}

/// Glob matching with `*` and `?`, iterative with single-star backtracking
fn glob_match(pattern: &str, text: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let text: Vec<char> = text.chars().collect();

    let (mut p, mut t) = (0, 0);
    let mut star: Option<(usize, usize)> = None;

    while t < text.len() {
        match pattern.get(p) {
            Some('?') => {
                p += 1;
                t += 1;
            }
            Some('*') => {
                star = Some((p, t));
                p += 1;
            }
            Some(&c) if c == text[t] => {
                p += 1;
                t += 1;
            }
            _ => match star {
                // let the last star swallow one more char
                Some((sp, st)) => {
                    star = Some((sp, st + 1));
                    p = sp + 1;
                    t = st + 1;
                }
                None => return false,
            },
        }
    }

    pattern[p..].iter().all(|&c| c == '*')
}
