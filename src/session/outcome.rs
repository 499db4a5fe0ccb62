//! Per-observation verification decisions and format selection.

use crate::generation::HashAction;
use crate::hashing::{Digest, HashFormat};
use crate::history::History;

/// Which previously recorded format to re-hash when none of the requested
/// formats has ever been recorded for a path.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BenchmarkPolicy {
    /// The recorded format that comes first in verification priority.
    #[default]
    Priority,
    /// The format the path was originally recorded in.
    Original,
}

/// Decides the outcome of observing `content` (and, for directories,
/// `structure`) at `path`, relative to the scope owning `history`.
///
/// Comparison is always against the earliest entry of the same format, so a
/// path that failed once keeps failing until its content returns.
pub fn decide(
    history: &History,
    path: &str,
    content: &Digest,
    structure: Option<&Digest>,
) -> HashAction {
    if history.find_original_entry(path).is_none() {
        return HashAction::Original;
    }

    let Some(prior) = history.find_first_entry(path, Some(content.format())) else {
        return HashAction::New;
    };

    let content_matches = prior.digest == content.as_str();
    let structure_matches = match (prior.structure.as_deref(), structure) {
        (Some(prior), Some(observed)) => prior == observed.as_str(),
        _ => true,
    };

    if content_matches && structure_matches {
        HashAction::Verified
    } else {
        HashAction::Failed
    }
}

/// Formats to hash for a path: every requested format, plus one benchmark
/// format from `existing` when the two sets do not overlap. Returned in
/// priority order.
pub fn select_formats(
    existing: &[HashFormat],
    original: Option<HashFormat>,
    requested: &[HashFormat],
    policy: BenchmarkPolicy,
) -> Vec<HashFormat> {
    let mut formats: Vec<HashFormat> = requested.to_vec();

    let overlaps = existing.iter().any(|f| requested.contains(f));
    if !overlaps && !existing.is_empty() {
        let benchmark = match policy {
            BenchmarkPolicy::Priority => existing.iter().min().copied(),
            BenchmarkPolicy::Original => original
                .filter(|f| existing.contains(f))
                .or_else(|| existing.first().copied()),
        };
        formats.extend(benchmark);
    }

    formats.sort();
    formats.dedup();
    formats
}
