//! Exclusion matching
//!
//! Entries are relative paths with `/` separators. A path is excluded when
//! it equals an entry or lies beneath one. There is no globbing.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Component, Path};

/// Immutable set of normalized relative paths to leave out of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExclusionSet {
    entries: BTreeSet<String>,
}

impl ExclusionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a set from user-supplied entries.
    ///
    /// Entries may use either separator and may carry `./` or a trailing
    /// `/`. An entry prefixed with any of `roots` has that prefix stripped,
    /// and an entry naming a root itself is dropped. Pass the root both as
    /// the user wrote it and in absolute form so either spelling works.
    pub fn from_entries<I, S>(entries: I, roots: &[&Path]) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let roots: Vec<String> = roots
            .iter()
            .filter_map(|r| normalize_text(&r.to_string_lossy()))
            .collect();
        let entries = entries
            .into_iter()
            .filter_map(|e| normalize_entry(e.as_ref(), &roots))
            .collect();
        Self { entries }
    }

    /// Parse a comma-separated list such as `pkg/tests, setup.py`.
    pub fn parse_list(list: &str, roots: &[&Path]) -> Self {
        Self::from_entries(list.split(','), roots)
    }

    /// Add an already-relative path, e.g. an output directory nested in the root.
    pub fn insert_relative(&mut self, relative: &Path) {
        let joined = normal_segments(relative).join("/");
        if !joined.is_empty() {
            self.entries.insert(joined);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn contains(&self, entry: &str) -> bool {
        self.entries.contains(entry)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(String::as_str)
    }

    /// See [`is_excluded`].
    pub fn matches(&self, relative_path: &Path) -> bool {
        is_excluded(relative_path, self)
    }
}

/// Whether `relative_path` equals an entry of `set` or lies within one.
pub fn is_excluded(relative_path: &Path, set: &ExclusionSet) -> bool {
    if set.is_empty() {
        return false;
    }
    let mut prefix = String::new();
    for segment in normal_segments(relative_path) {
        if !prefix.is_empty() {
            prefix.push('/');
        }
        prefix.push_str(&segment);
        if set.entries.contains(&prefix) {
            return true;
        }
    }
    false
}

fn normal_segments(path: &Path) -> Vec<String> {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect()
}

/// `/`-joined segments of a path written by a user, without `.` or empty
/// segments. A leading `/` is kept so absolute and relative text differ.
fn normalize_text(raw: &str) -> Option<String> {
    let raw = raw.trim().replace('\\', "/");
    let joined = raw
        .split('/')
        .filter(|s| !s.is_empty() && *s != ".")
        .collect::<Vec<_>>()
        .join("/");
    if joined.is_empty() {
        return None;
    }
    Some(if raw.starts_with('/') { format!("/{joined}") } else { joined })
}

fn normalize_entry(raw: &str, roots: &[String]) -> Option<String> {
    let entry = normalize_text(raw)?;
    for root in roots {
        if entry == *root {
            return None;
        }
        if let Some(rest) = entry.strip_prefix(root.as_str()).and_then(|r| r.strip_prefix('/')) {
            return Some(rest.to_string());
        }
    }
    Some(entry.trim_start_matches('/').to_string())
}
