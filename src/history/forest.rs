use super::{History, HistoryError};
use crate::generation::ROOT_PATH;
use crate::generation_file::MARKER_DIR;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Handle of a [`History`] inside a [`HistoryForest`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HistoryId(usize);

/// The root scope and every nested scope below it.
///
/// Histories live in an arena; a child refers to its parent by [`HistoryId`]
/// only. Scope roots are discovered once when the forest is loaded.
#[derive(Debug)]
pub struct HistoryForest {
    histories: Vec<History>,
    /// Scope root path (relative to the forest root) to its history.
    scopes: BTreeMap<String, HistoryId>,
}

impl HistoryForest {
    pub const ROOT: HistoryId = HistoryId(0);

    pub fn load(root_dir: &Path) -> Result<Self, HistoryError> {
        let root = History::load(root_dir, ROOT_PATH.to_string(), None)?;
        let mut forest = HistoryForest {
            histories: vec![root],
            scopes: BTreeMap::from([(ROOT_PATH.to_string(), Self::ROOT)]),
        };

        // Pre-order, so every parent scope is registered before its children.
        for (scope_path, scope_dir) in discover_nested_scopes(root_dir) {
            let (parent, _) = forest.resolve_owner(&scope_path);
            let history = History::load(&scope_dir, scope_path.clone(), Some(parent))?;
            debug!("Registered nested scope {}", scope_path);
            let id = HistoryId(forest.histories.len());
            forest.histories.push(history);
            forest.scopes.insert(scope_path, id);
        }

        Ok(forest)
    }

    pub fn history(&self, id: HistoryId) -> &History {
        &self.histories[id.0]
    }

    pub fn history_mut(&mut self, id: HistoryId) -> &mut History {
        &mut self.histories[id.0]
    }

    pub fn ids(&self) -> impl Iterator<Item = HistoryId> + '_ {
        (0..self.histories.len()).map(HistoryId)
    }

    /// The scope whose root is exactly `path`.
    pub fn scope_at(&self, path: &str) -> Option<HistoryId> {
        self.scopes.get(path).copied()
    }

    /// Owning scope of `path` and the path relative to that scope's root.
    ///
    /// Only proper ancestors are considered, so a nested scope's own root
    /// path is owned by the enclosing scope, which records it like any
    /// other directory.
    pub fn resolve_owner(&self, path: &str) -> (HistoryId, String) {
        let mut end = path.len();
        while let Some(pos) = path[..end].rfind('/') {
            if let Some(&id) = self.scopes.get(&path[..pos]) {
                return (id, path[pos + 1..].to_string());
            }
            end = pos;
        }
        (Self::ROOT, path.to_string())
    }

    /// Path of `path_in_scope` relative to the forest root.
    pub fn forest_path(&self, id: HistoryId, path_in_scope: &str) -> String {
        join_path(self.history(id).scope_path(), path_in_scope)
    }

    /// Whether `path_in_scope` lies strictly inside a scope nested in `id`.
    pub fn is_inside_child_scope(&self, id: HistoryId, path_in_scope: &str) -> bool {
        let forest_path = self.forest_path(id, path_in_scope);
        self.resolve_owner(&forest_path).0 != id
    }

    pub fn depth(&self, id: HistoryId) -> usize {
        let mut depth = 0;
        let mut current = self.history(id).parent();
        while let Some(parent) = current {
            depth += 1;
            current = self.history(parent).parent();
        }
        depth
    }

    /// Deepest scopes first, so children always precede their parents.
    pub fn commit_order(&self) -> Vec<HistoryId> {
        let mut ids: Vec<HistoryId> = self.ids().collect();
        ids.sort_by_key(|&id| (std::cmp::Reverse(self.depth(id)), id));
        ids
    }
}

/// Joins a relative posix path and a child path; [`ROOT_PATH`] is the empty
/// prefix.
pub fn join_path(base: &str, name: &str) -> String {
    match (base, name) {
        (ROOT_PATH, _) => name.to_string(),
        (_, ROOT_PATH) => base.to_string(),
        _ => format!("{base}/{name}"),
    }
}

/// Relative posix path and on-disk directory of every nested scope root.
fn discover_nested_scopes(root_dir: &Path) -> Vec<(String, PathBuf)> {
    let walker = WalkDir::new(root_dir)
        .follow_links(false)
        .min_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.file_name() != MARKER_DIR);

    let mut scopes = Vec::new();
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Skipping during scope discovery: {}", e);
                continue;
            }
        };
        if !entry.file_type().is_dir() {
            continue;
        }
        let marker = entry.path().join(MARKER_DIR);
        let has_marker = std::fs::symlink_metadata(&marker).is_ok_and(|m| m.is_dir());
        if !has_marker {
            continue;
        }
        if let Ok(relative) = entry.path().strip_prefix(root_dir) {
            let components: Vec<String> = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect();
            scopes.push((components.join("/"), entry.path().to_path_buf()));
        }
    }
    scopes
}
