//! In-memory model of one generation of a scope.

use crate::hashing::{Digest, HashFormat};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Path of a scope's own directory, as recorded in its generation root.
pub const ROOT_PATH: &str = ".";

/// Verification outcome of one digest observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashAction {
    /// First time this path was ever recorded in the history.
    Original,
    /// First time this format was recorded for an already known path.
    /// Provisional: promoted to `Verified` when the generation is committed.
    New,
    Verified,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HashEntry {
    pub format: HashFormat,
    pub digest: String,
    pub action: HashAction,
    /// Structure digest, only present on directory entries.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub structure: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl HashEntry {
    pub fn content_digest(&self) -> Digest {
        Digest::new(self.format, self.digest.clone())
    }

    pub fn structure_digest(&self) -> Option<Digest> {
        self.structure
            .as_ref()
            .map(|s| Digest::new(self.format, s.clone()))
    }
}

/// One tracked filesystem entry within one generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PathRecord {
    /// Posix-style path relative to the scope root.
    pub path: String,
    pub is_directory: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    /// Modification time in nanoseconds since Unix epoch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mtime_nanos: Option<u64>,
    #[serde(default)]
    pub hashes: Vec<HashEntry>,
}

impl PathRecord {
    pub fn new(path: impl Into<String>, is_directory: bool) -> Self {
        PathRecord {
            path: path.into(),
            is_directory,
            size: None,
            mtime_nanos: None,
            hashes: Vec::new(),
        }
    }

    pub fn entry(&self, format: HashFormat) -> Option<&HashEntry> {
        self.hashes.iter().find(|h| h.format == format)
    }

    /// Adds `entry`, replacing any previous entry of the same format so a
    /// record never holds two entries for one format.
    pub fn set_entry(&mut self, entry: HashEntry) {
        match self.hashes.iter_mut().find(|h| h.format == entry.format) {
            Some(existing) => *existing = entry,
            None => self.hashes.push(entry),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Creator {
    pub tool: String,
    pub version: String,
    pub created: DateTime<Utc>,
}

impl Creator {
    pub fn current(created: DateTime<Utc>) -> Self {
        Creator {
            tool: env!("CARGO_PKG_NAME").to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            created,
        }
    }
}

/// A child scope generation subsumed by a parent generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChildScopeRef {
    /// Child scope root, relative to the parent scope root.
    pub path: String,
    pub generation: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Generation {
    pub number: u32,
    /// Ignore patterns in force, excluding built-in defaults.
    #[serde(default)]
    pub ignore: Vec<String>,
    pub creator: Creator,
    /// The scope's own directory aggregate.
    pub root: PathRecord,
    #[serde(default)]
    pub children: Vec<ChildScopeRef>,
    /// Sorted by path.
    #[serde(default)]
    pub records: Vec<PathRecord>,
}

impl Generation {
    /// The record for `path`, treating [`ROOT_PATH`] as the generation root.
    pub fn record(&self, path: &str) -> Option<&PathRecord> {
        if path == ROOT_PATH {
            return Some(&self.root);
        }
        self.records
            .binary_search_by(|r| r.path.as_str().cmp(path))
            .ok()
            .map(|i| &self.records[i])
    }
}
