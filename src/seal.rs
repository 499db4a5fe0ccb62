//! Sealing driver: walks a tree in post-order and feeds a [`GenerationSession`].
//!
//! File hashing runs on a bounded pool of worker threads. The walking thread
//! submits every file of a directory, descends into its sub-directories, then
//! waits for the directory's file results before reducing it, so a directory
//! is only reduced once all of its children are complete. All session
//! mutation happens on the walking thread.

use crate::checksum::{ChecksumError, FileChecksum, checksum_file};
use crate::dir_list::{DirListError, EntryKind, FsEntry, list_directory};
use crate::generation::ROOT_PATH;
use crate::hashing::{DigestError, HashFormat};
use crate::history::{HistoryError, HistoryForest, join_path};
use crate::ignore_spec::{IgnoreError, IgnoreSpec};
use crate::reducer::{DirectoryDigest, ReducerSet};
use crate::session::{
    BenchmarkPolicy, CommitPlan, GenerationSession, SessionConfig, SessionError, SessionReport,
};
use crossbeam_channel::{Receiver, Sender};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

#[derive(Debug, thiserror::Error)]
pub enum SealError {
    #[error("History error: {0}")]
    History(#[from] HistoryError),
    #[error("{0}")]
    Session(#[from] SessionError),
    #[error("Digest error: {0}")]
    Digest(#[from] DigestError),
    #[error("Ignore error: {0}")]
    Ignore(#[from] IgnoreError),
    #[error("Directory listing error: {0}")]
    DirList(#[from] DirListError),
    #[error("A hashing worker exited before finishing its files")]
    WorkerLost,
}

/// How nested scopes below the sealed root are handled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum NestedScopePolicy {
    /// Link the nested scope's latest root hash without descending into it.
    #[default]
    Reuse,
    /// Walk the nested scope and seal a new generation for it as well.
    Reseal,
}

#[derive(Debug, Clone)]
pub struct SealOptions {
    pub formats: Vec<HashFormat>,
    pub directory_hashes: bool,
    pub benchmark: BenchmarkPolicy,
    pub nested: NestedScopePolicy,
    pub ignore_patterns: Vec<String>,
    pub ignore_file: Option<PathBuf>,
    /// Number of hashing threads.
    pub jobs: usize,
    /// Walk, decide and validate, but write nothing.
    pub dry_run: bool,
}

impl Default for SealOptions {
    fn default() -> Self {
        SealOptions {
            formats: vec![HashFormat::Sha256],
            directory_hashes: true,
            benchmark: BenchmarkPolicy::default(),
            nested: NestedScopePolicy::default(),
            ignore_patterns: Vec::new(),
            ignore_file: None,
            jobs: 1,
            dry_run: false,
        }
    }
}

/// A generation written (or, in a dry run, that would have been written).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealedGeneration {
    pub scope: String,
    pub number: u32,
}

#[derive(Debug)]
pub struct SealResult {
    pub report: SessionReport,
    pub generations: Vec<SealedGeneration>,
    pub committed: bool,
}

/// Seals the tree at `root`, writing one new generation per touched scope.
///
/// Content, completeness and unreadable-path failures are reported in the
/// returned [`SessionReport`] and do not prevent the commit. A `New` entry
/// that cannot be confirmed by a verified trusted format aborts the whole
/// commit with [`SessionError::UnverifiedNew`] and nothing is written.
pub fn seal_tree(root: &Path, options: &SealOptions) -> Result<SealResult, SealError> {
    let root = root.canonicalize().map_err(|e| {
        if e.kind() == ErrorKind::PermissionDenied {
            DirListError::PermissionDenied(root.to_path_buf())
        } else {
            DirListError::Io(e)
        }
    })?;

    let mut forest = HistoryForest::load(&root)?;

    let ignore = IgnoreSpec::compose(
        &[],
        &options.ignore_patterns,
        options.ignore_file.as_deref(),
    )?;
    let config = SessionConfig {
        formats: options.formats.clone(),
        directory_hashes: options.directory_hashes,
        benchmark: options.benchmark,
        ignore_patterns: ignore.patterns().to_vec(),
    };

    let jobs = options.jobs.max(1);
    let plan = std::thread::scope(|scope| -> Result<CommitPlan, SealError> {
        let (job_tx, job_rx) = crossbeam_channel::bounded::<HashJob>(jobs * 4);
        for _ in 0..jobs {
            let job_rx = job_rx.clone();
            scope.spawn(move || hash_worker(job_rx));
        }
        drop(job_rx);

        let mut walker = Walker {
            session: GenerationSession::new(&forest, config),
            jobs: job_tx,
            nested: options.nested,
        };
        walker.walk_root(&root)?;

        let Walker { session, .. } = walker;
        Ok(session.finish()?)
    })?;

    let generations: Vec<SealedGeneration> = plan
        .generations()
        .map(|(id, generation)| SealedGeneration {
            scope: forest.history(id).scope_path().to_string(),
            number: generation.number,
        })
        .collect();

    if options.dry_run {
        plan.validate(&forest)?;
        info!("Dry run, not writing {} generation(s)", generations.len());
        return Ok(SealResult {
            report: plan.into_report(),
            generations,
            committed: false,
        });
    }

    let report = plan.commit(&mut forest)?;
    Ok(SealResult {
        report,
        generations,
        committed: true,
    })
}

type HashReply = (usize, Result<FileChecksum, ChecksumError>);

struct HashJob {
    index: usize,
    path: PathBuf,
    formats: Vec<HashFormat>,
    reply: Sender<HashReply>,
}

fn hash_worker(jobs: Receiver<HashJob>) {
    for job in jobs {
        let result = checksum_file(&job.path, &job.formats);
        // The receiver is gone only when the walk has already failed.
        let _ = job.reply.send((job.index, result));
    }
}

/// A file of the directory being walked, waiting for its digests.
struct PendingFile {
    name: String,
    path: String,
}

struct Walker<'f> {
    session: GenerationSession<'f>,
    jobs: Sender<HashJob>,
    nested: NestedScopePolicy,
}

impl Walker<'_> {
    fn walk_root(&mut self, root: &Path) -> Result<(), SealError> {
        let entries = list_directory(root)?;
        self.walk_entries(ROOT_PATH, root, entries, &[])?;
        Ok(())
    }

    /// Walks the directory at `path` and records it. Returns `None` if it
    /// could not be listed.
    fn walk_dir(
        &mut self,
        path: &str,
        dir: &Path,
        inherited: &[HashFormat],
    ) -> Result<Option<Vec<DirectoryDigest>>, SealError> {
        match list_directory(dir) {
            Ok(entries) => self.walk_entries(path, dir, entries, inherited).map(Some),
            Err(e) => {
                self.session.record_unreadable(path, true, e.to_string())?;
                Ok(None)
            }
        }
    }

    fn walk_entries(
        &mut self,
        path: &str,
        dir: &Path,
        entries: Vec<FsEntry>,
        inherited: &[HashFormat],
    ) -> Result<Vec<DirectoryDigest>, SealError> {
        let mut dir_formats = self.session.formats_for(path, true);
        dir_formats.extend_from_slice(inherited);
        dir_formats.sort();
        dir_formats.dedup();

        let mut reducers = ReducerSet::new(&dir_formats);
        let (reply_tx, reply_rx) = crossbeam_channel::unbounded::<HashReply>();
        let mut files = Vec::new();
        let mut subdirs = Vec::new();

        for entry in entries {
            let child = join_path(path, &entry.name);
            match entry.kind {
                EntryKind::File { size } => {
                    if self.session.is_ignored(&child, false)? {
                        debug!("Ignoring {}", child);
                        continue;
                    }
                    debug!("Queueing {} ({} bytes)", child, size);
                    let mut formats = self.session.formats_for(&child, false);
                    formats.extend_from_slice(&dir_formats);
                    formats.sort();
                    formats.dedup();

                    let job = HashJob {
                        index: files.len(),
                        path: dir.join(&entry.file_name),
                        formats,
                        reply: reply_tx.clone(),
                    };
                    self.jobs.send(job).map_err(|_| SealError::WorkerLost)?;
                    files.push(PendingFile {
                        name: entry.name,
                        path: child,
                    });
                }
                EntryKind::Dir => {
                    if self.session.is_ignored(&child, true)? {
                        debug!("Ignoring {}/", child);
                        continue;
                    }
                    subdirs.push((entry.name, dir.join(&entry.file_name), child));
                }
                EntryKind::Symlink => debug!("Skipping symbolic link {}", child),
                EntryKind::Special => debug!("Skipping special file {}", child),
            }
        }
        drop(reply_tx);

        // Sub-directories are walked while this directory's files hash.
        for (name, subdir, child) in subdirs {
            match self.enter_subdir(&child, &subdir, &dir_formats)? {
                Some(digests) => reducers.add_directory(&name, &digests)?,
                None => reducers.mark_incomplete(),
            }
        }

        let mut results: Vec<Option<Result<FileChecksum, ChecksumError>>> =
            files.iter().map(|_| None).collect();
        for (index, result) in reply_rx {
            results[index] = Some(result);
        }

        for (file, result) in files.iter().zip(results) {
            match result.ok_or(SealError::WorkerLost)? {
                Ok(checksum) => {
                    self.session.record_file(
                        &file.path,
                        checksum.size,
                        checksum.mtime_nanos,
                        &checksum.digests,
                    )?;
                    reducers.add_file(&file.name, &checksum.digests)?;
                }
                Err(e) => {
                    self.session.record_unreadable(&file.path, false, e.to_string())?;
                    reducers.mark_incomplete();
                }
            }
        }

        let digests = reducers.finish()?;
        self.session.record_directory(path, &digests)?;
        Ok(digests)
    }

    fn enter_subdir(
        &mut self,
        path: &str,
        dir: &Path,
        inherited: &[HashFormat],
    ) -> Result<Option<Vec<DirectoryDigest>>, SealError> {
        if self.nested == NestedScopePolicy::Reuse
            && let Some(digests) = self.session.link_existing_scope(path)?
        {
            info!("Reusing sealed root of nested scope {}", path);
            return Ok(Some(digests));
        }
        self.walk_dir(path, dir, inherited)
    }
}
