use super::*;
use crate::generation_file::{self, MARKER_DIR};
use crate::history::join_path;
use crate::reducer::ReducerSet;
use std::fs;
use tempfile::TempDir;

use HashFormat::{Blake3, ContentId, Sha256, Xxh3};

mod nested;
mod scenarios;

fn config(formats: &[HashFormat]) -> SessionConfig {
    SessionConfig {
        formats: formats.to_vec(),
        directory_hashes: true,
        benchmark: BenchmarkPolicy::Priority,
        ignore_patterns: Vec::new(),
    }
}

enum Node {
    File(String),
    Dir(BTreeMap<String, Node>),
}

/// Builds a tree from `(path, content)` pairs; directories are implied by
/// the paths.
fn tree(files: &[(&str, &str)]) -> BTreeMap<String, Node> {
    let mut root = BTreeMap::new();
    for (path, content) in files {
        let mut dir = &mut root;
        let mut parts = path.split('/').peekable();
        while let Some(part) = parts.next() {
            if parts.peek().is_none() {
                dir.insert(part.to_string(), Node::File(content.to_string()));
                break;
            }
            let node = dir
                .entry(part.to_string())
                .or_insert_with(|| Node::Dir(BTreeMap::new()));
            dir = match node {
                Node::Dir(children) => children,
                Node::File(_) => panic!("{part} is both a file and a directory"),
            };
        }
    }
    root
}

fn union(mut formats: Vec<HashFormat>, extra: &[HashFormat]) -> Vec<HashFormat> {
    formats.extend_from_slice(extra);
    formats.sort();
    formats.dedup();
    formats
}

/// Feeds one directory in post-order, the way the sealing walk does.
fn feed_dir(
    session: &mut GenerationSession<'_>,
    path: &str,
    children: &BTreeMap<String, Node>,
    inherited: &[HashFormat],
) -> Result<Vec<DirectoryDigest>, SessionError> {
    let dir_formats = union(session.formats_for(path, true), inherited);
    let mut reducers = ReducerSet::new(&dir_formats);

    for (name, node) in children {
        let child = join_path(path, name);
        match node {
            Node::File(content) => {
                if session.is_ignored(&child, false)? {
                    continue;
                }
                let formats = union(session.formats_for(&child, false), &dir_formats);
                let digests: Vec<Digest> = formats
                    .iter()
                    .map(|f| f.digest_bytes(content.as_bytes()))
                    .collect();
                session.record_file(&child, content.len() as u64, 0, &digests)?;
                reducers.add_file(name, &digests).unwrap();
            }
            Node::Dir(grandchildren) => {
                if session.is_ignored(&child, true)? {
                    continue;
                }
                let digests = feed_dir(session, &child, grandchildren, &dir_formats)?;
                reducers.add_directory(name, &digests).unwrap();
            }
        }
    }

    let digests = reducers.finish().unwrap();
    session.record_directory(path, &digests)?;
    Ok(digests)
}

fn run_pass(
    forest: &HistoryForest,
    config: SessionConfig,
    files: &[(&str, &str)],
) -> Result<CommitPlan, SessionError> {
    let mut session = GenerationSession::new(forest, config);
    feed_dir(&mut session, ROOT_PATH, &tree(files), &[])?;
    session.finish()
}

fn seal(
    forest: &mut HistoryForest,
    formats: &[HashFormat],
    files: &[(&str, &str)],
) -> Result<SessionReport, SessionError> {
    run_pass(forest, config(formats), files)?.commit(forest)
}

fn generation_count(forest: &HistoryForest) -> usize {
    forest.history(HistoryForest::ROOT).generations().len()
}

fn latest_record<'a>(forest: &'a HistoryForest, path: &str) -> &'a PathRecord {
    forest
        .history(HistoryForest::ROOT)
        .latest()
        .unwrap()
        .record(path)
        .unwrap()
}

fn actions(report: &SessionReport, path: &str) -> Vec<(HashFormat, HashAction)> {
    report
        .outcomes
        .iter()
        .filter(|o| o.path == path)
        .map(|o| (o.format, o.action))
        .collect()
}

fn failure_kinds(report: &SessionReport, path: &str) -> Vec<FailureKind> {
    report
        .failures
        .iter()
        .filter(|f| f.path == path)
        .map(|f| f.kind.clone())
        .collect()
}
