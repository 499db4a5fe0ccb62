//! One sealing or verification pass over a [`HistoryForest`].
//!
//! The caller walks the tree and feeds observations in post-order, always
//! using paths relative to the forest root. Each observation is decided
//! against the owning scope's history and accumulated into a pending
//! generation for that scope. [`GenerationSession::finish`] links nested
//! scope roots into their parents, runs the completeness check and yields a
//! [`CommitPlan`].

mod commit;
mod outcome;
mod report;

pub use commit::CommitPlan;
pub use outcome::{BenchmarkPolicy, decide, select_formats};
pub use report::{Failure, FailureCategory, FailureKind, Outcome, SessionReport};

use crate::generation::{
    ChildScopeRef, Creator, Generation, HashAction, HashEntry, PathRecord, ROOT_PATH,
};
use crate::hashing::{Digest, HashFormat};
use crate::history::{History, HistoryError, HistoryForest, HistoryId};
use crate::ignore_spec::{IgnoreError, IgnoreMatcher, IgnoreSpec};
use crate::reducer::DirectoryDigest;
use chrono::Utc;
use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use tracing::debug;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Ignore patterns: {0}")]
    Ignore(#[from] IgnoreError),
    #[error("History error: {0}")]
    History(#[from] HistoryError),
    #[error("{}", describe_violations(.0))]
    UnverifiedNew(Vec<Violation>),
}

/// A `New` entry without a verified sibling in a previously recorded format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    pub path: String,
    pub format: HashFormat,
}

fn describe_violations(violations: &[Violation]) -> String {
    let mut message = format!(
        "Refusing to commit: {} new hash entr{} could not be confirmed by a verified trusted format",
        violations.len(),
        if violations.len() == 1 { "y" } else { "ies" }
    );
    for violation in violations.iter().take(5) {
        message.push_str(&format!("\n  {} ({})", violation.path, violation.format));
    }
    message
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Formats requested by the caller.
    pub formats: Vec<HashFormat>,
    pub directory_hashes: bool,
    pub benchmark: BenchmarkPolicy,
    /// Layered over each scope's inherited ignore patterns.
    pub ignore_patterns: Vec<String>,
}

struct PendingGeneration {
    ignore: IgnoreSpec,
    matcher: IgnoreMatcher,
    root: Option<PathRecord>,
    records: BTreeMap<String, PathRecord>,
    unreadable_dirs: Vec<String>,
    children: Vec<ChildScopeRef>,
}

impl PendingGeneration {
    fn is_below_unreadable(&self, path: &str) -> bool {
        self.unreadable_dirs.iter().any(|dir| {
            dir == ROOT_PATH
                || path
                    .strip_prefix(dir.as_str())
                    .is_some_and(|rest| rest.starts_with('/'))
        })
    }
}

pub struct GenerationSession<'f> {
    forest: &'f HistoryForest,
    config: SessionConfig,
    pending: BTreeMap<HistoryId, PendingGeneration>,
    report: SessionReport,
}

impl<'f> GenerationSession<'f> {
    pub fn new(forest: &'f HistoryForest, config: SessionConfig) -> Self {
        GenerationSession {
            forest,
            config,
            pending: BTreeMap::new(),
            report: SessionReport::default(),
        }
    }

    fn pending(&mut self, id: HistoryId) -> Result<&mut PendingGeneration, SessionError> {
        match self.pending.entry(id) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => {
                let history = self.forest.history(id);
                let ignore = IgnoreSpec::compose(
                    history.inherited_ignore(),
                    &self.config.ignore_patterns,
                    None,
                )?;
                let matcher = ignore.matcher()?;
                debug!("Opened pending generation for scope {}", history.scope_path());
                Ok(entry.insert(PendingGeneration {
                    ignore,
                    matcher,
                    root: None,
                    records: BTreeMap::new(),
                    unreadable_dirs: Vec::new(),
                    children: Vec::new(),
                }))
            }
        }
    }

    /// Whether `path` is excluded by its owning scope's ignore patterns.
    pub fn is_ignored(&mut self, path: &str, is_dir: bool) -> Result<bool, SessionError> {
        if path == ROOT_PATH {
            return Ok(false);
        }
        let (id, relative) = self.forest.resolve_owner(path);
        Ok(self.pending(id)?.matcher.is_ignored(&relative, is_dir))
    }

    /// Formats to hash `path` in: the requested formats plus, when none of
    /// them was recorded before, one benchmark format that was.
    pub fn formats_for(&self, path: &str, is_dir: bool) -> Vec<HashFormat> {
        if is_dir && !self.config.directory_hashes {
            return Vec::new();
        }

        let (id, relative) = self.forest.resolve_owner(path);
        let mut formats = self.select(self.forest.history(id), &relative);
        if let Some(scope) = self.forest.scope_at(path).filter(|&s| s != id) {
            // A nested scope root is recorded both in its own scope and in
            // the enclosing one.
            formats.extend(self.select(self.forest.history(scope), ROOT_PATH));
            formats.sort();
            formats.dedup();
        }
        formats
    }

    fn select(&self, history: &History, path: &str) -> Vec<HashFormat> {
        select_formats(
            &history.existing_formats(path),
            history.find_original_entry(path).map(|e| e.format),
            &self.config.formats,
            self.config.benchmark,
        )
    }

    fn check_unexpected(&mut self, history: &History, relative: &str, path: &str) {
        if !history.generations().is_empty() && !history.is_known(relative) {
            self.report.push_failure(path, FailureKind::UnexpectedNew);
        }
    }

    /// Decides one entry and reports it under `path`.
    fn decide_entry(
        &mut self,
        history: &History,
        relative: &str,
        path: &str,
        content: &Digest,
        structure: Option<&Digest>,
        is_dir: bool,
    ) -> HashEntry {
        let action = decide(history, relative, content, structure);
        debug!("{} {}: {:?}", path, content.format(), action);

        if action == HashAction::Failed {
            let kind = if is_dir {
                FailureKind::DirectoryMismatch(content.format())
            } else {
                FailureKind::ContentMismatch(content.format())
            };
            self.report.push_failure(path, kind);
        }
        self.report.push_outcome(path, content.format(), action);

        HashEntry {
            format: content.format(),
            digest: content.as_str().to_string(),
            action,
            structure: structure.map(|s| s.as_str().to_string()),
            timestamp: Utc::now(),
        }
    }

    pub fn record_file(
        &mut self,
        path: &str,
        size: u64,
        mtime_nanos: u64,
        digests: &[Digest],
    ) -> Result<(), SessionError> {
        let forest = self.forest;
        let (id, relative) = forest.resolve_owner(path);
        let history = forest.history(id);

        let mut record = PathRecord::new(relative.clone(), false);
        record.size = Some(size);
        record.mtime_nanos = Some(mtime_nanos);
        for digest in digests {
            let entry = self.decide_entry(history, &relative, path, digest, None, false);
            record.set_entry(entry);
        }
        self.check_unexpected(history, &relative, path);

        self.pending(id)?.records.insert(relative, record);
        Ok(())
    }

    /// Records a path that could not be read. It is tracked without hashes
    /// and reported, and nothing below it is reported missing.
    pub fn record_unreadable(
        &mut self,
        path: &str,
        is_dir: bool,
        reason: String,
    ) -> Result<(), SessionError> {
        let forest = self.forest;
        let (id, relative) = forest.resolve_owner(path);
        self.report.push_failure(path, FailureKind::Unreadable(reason));
        self.check_unexpected(forest.history(id), &relative, path);

        let pending = self.pending(id)?;
        if is_dir {
            pending.unreadable_dirs.push(relative.clone());
        }
        let record = PathRecord::new(relative.clone(), is_dir);
        if relative == ROOT_PATH {
            pending.root = Some(record);
        } else {
            pending.records.insert(relative, record);
        }
        Ok(())
    }

    /// Records a directory once all its children have been recorded.
    /// `digests` is empty when directory hashing is disabled.
    pub fn record_directory(
        &mut self,
        path: &str,
        digests: &[DirectoryDigest],
    ) -> Result<(), SessionError> {
        let forest = self.forest;

        // A scope root is the generation root of its own scope. Nested scope
        // roots are linked into the enclosing scope in `finish`.
        let (id, relative) = match forest.scope_at(path) {
            Some(scope) => (scope, ROOT_PATH.to_string()),
            None => forest.resolve_owner(path),
        };
        let history = forest.history(id);

        let mut record = PathRecord::new(relative.clone(), true);
        for digest in digests {
            let entry = self.decide_entry(
                history,
                &relative,
                path,
                &digest.content,
                Some(&digest.structure),
                true,
            );
            record.set_entry(entry);
        }
        self.check_unexpected(history, &relative, path);

        let pending = self.pending(id)?;
        if relative == ROOT_PATH {
            pending.root = Some(record);
        } else {
            pending.records.insert(relative, record);
        }
        Ok(())
    }

    /// Links the latest committed root of the nested scope at `path` into
    /// the enclosing scope without descending into it.
    ///
    /// Returns the linked directory digests, or `None` if `path` is not a
    /// nested scope or that scope has never been sealed.
    pub fn link_existing_scope(
        &mut self,
        path: &str,
    ) -> Result<Option<Vec<DirectoryDigest>>, SessionError> {
        let forest = self.forest;
        let Some(child) = forest.scope_at(path).filter(|&s| s != HistoryForest::ROOT) else {
            return Ok(None);
        };
        let Some(latest) = forest.history(child).latest() else {
            return Ok(None);
        };

        let digests = latest
            .root
            .hashes
            .iter()
            .filter_map(|entry| {
                entry.structure_digest().map(|structure| DirectoryDigest {
                    content: entry.content_digest(),
                    structure,
                })
            })
            .collect();

        debug!("Reusing generation {} of nested scope {}", latest.number, path);
        self.link_into_parent(path, latest.number, &latest.root.hashes, false)?;
        Ok(Some(digests))
    }

    /// Copies a nested scope's root entries onto the enclosing scope's
    /// record for `path`, re-deciding each against the enclosing history.
    ///
    /// When the root was just decided within its own scope, that decision
    /// has already been reported under `path` and this one is not.
    fn link_into_parent(
        &mut self,
        path: &str,
        generation: u32,
        entries: &[HashEntry],
        already_reported: bool,
    ) -> Result<(), SessionError> {
        let forest = self.forest;
        let (parent, relative) = forest.resolve_owner(path);
        let history = forest.history(parent);

        let mut record = PathRecord::new(relative.clone(), true);
        for entry in entries {
            let content = entry.content_digest();
            let structure = entry.structure_digest();
            let action = if already_reported {
                decide(history, &relative, &content, structure.as_ref())
            } else {
                self.decide_entry(history, &relative, path, &content, structure.as_ref(), true)
                    .action
            };
            record.set_entry(HashEntry {
                action,
                ..entry.clone()
            });
        }
        self.check_unexpected(history, &relative, path);

        let pending = self.pending(parent)?;
        pending.records.insert(relative.clone(), record);
        pending.children.push(ChildScopeRef {
            path: relative,
            generation,
        });
        Ok(())
    }

    /// Reports every previously known path of `id` that was not observed.
    fn check_completeness(&mut self, id: HistoryId) {
        let forest = self.forest;
        let history = forest.history(id);
        if history.generations().is_empty() {
            return;
        }
        let Some(pending) = self.pending.get(&id) else {
            return;
        };

        let missing: Vec<String> = history
            .known_paths()
            .into_iter()
            .filter(|(path, is_dir)| {
                !pending.records.contains_key(*path)
                    && !pending.is_below_unreadable(path)
                    && !pending.matcher.is_ignored(path, *is_dir)
                    && !forest.is_inside_child_scope(id, path)
            })
            .map(|(path, _)| forest.forest_path(id, path))
            .collect();

        for path in missing {
            self.report.push_failure(&path, FailureKind::Missing);
        }
    }

    /// Ends the pass: links freshly sealed nested roots into their parents,
    /// checks completeness, and assembles one generation per touched scope.
    pub fn finish(mut self) -> Result<CommitPlan, SessionError> {
        let forest = self.forest;
        let order = forest.commit_order();

        for &id in &order {
            if id == HistoryForest::ROOT {
                continue;
            }
            let Some(root) = self.pending.get(&id).and_then(|p| p.root.clone()) else {
                continue;
            };
            let history = forest.history(id);
            self.link_into_parent(
                history.scope_path(),
                history.next_generation_number(),
                &root.hashes,
                true,
            )?;
        }

        for &id in &order {
            self.check_completeness(id);
        }

        let created = Utc::now();
        let mut generations = Vec::new();
        for id in order {
            let Some(pending) = self.pending.remove(&id) else {
                continue;
            };
            let mut children = pending.children;
            children.sort_by(|a, b| a.path.cmp(&b.path));
            generations.push((
                id,
                Generation {
                    number: forest.history(id).next_generation_number(),
                    ignore: pending.ignore.patterns().to_vec(),
                    creator: Creator::current(created),
                    root: pending
                        .root
                        .unwrap_or_else(|| PathRecord::new(ROOT_PATH, true)),
                    children,
                    records: pending.records.into_values().collect(),
                },
            ));
        }

        Ok(CommitPlan::new(generations, self.report))
    }
}

#[cfg(test)]
mod tests;
