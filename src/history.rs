//! Committed generations of one scope, and the forest of nested scopes.
//!
//! A [`History`] is loaded read-only from a scope's marker folder and only
//! grows through [`History::append_generation`]. Lookups scan generations
//! oldest to newest, so "first" always means earliest recorded.

mod forest;

pub use forest::{HistoryForest, HistoryId, join_path};

use crate::chain::{CHAIN_FILENAME, Chain, ChainError};
use crate::generation::{Generation, HashAction, HashEntry, PathRecord};
use crate::generation_file::{self, GenerationFile, GenerationFileError, MARKER_DIR};
use crate::hashing::HashFormat;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

#[derive(Debug, thiserror::Error)]
pub enum HistoryError {
    #[error("IO error: {0}")]
    Io(std::io::Error),
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),
    #[error("Failed to read generation {}: {source}", .path.display())]
    GenerationFile {
        path: PathBuf,
        source: GenerationFileError,
    },
    #[error("Self-integrity chain of {}: {source}", .scope.display())]
    Chain { scope: PathBuf, source: ChainError },
    #[error("Generation {expected} is missing from {}", .scope.display())]
    Gap { scope: PathBuf, expected: u32 },
    #[error("{} declares generation {declared}", .path.display())]
    NumberMismatch { path: PathBuf, declared: u32 },
}

fn map_io(path: &Path, e: std::io::Error) -> HistoryError {
    if e.kind() == std::io::ErrorKind::PermissionDenied {
        HistoryError::PermissionDenied(path.to_path_buf())
    } else {
        HistoryError::Io(e)
    }
}

#[derive(Debug)]
pub struct History {
    root_dir: PathBuf,
    /// Root of this scope relative to the forest root.
    scope_path: String,
    parent: Option<HistoryId>,
    generations: Vec<Generation>,
    chain: Chain,
}

impl History {
    /// Loads every generation under `root_dir`, checking the numbering is
    /// gapless and every file matches its chain entry.
    pub fn load(
        root_dir: &Path,
        scope_path: String,
        parent: Option<HistoryId>,
    ) -> Result<Self, HistoryError> {
        let marker = root_dir.join(MARKER_DIR);
        let chain_error = |source| HistoryError::Chain {
            scope: root_dir.to_path_buf(),
            source,
        };

        let mut numbers = Vec::new();
        match std::fs::read_dir(&marker) {
            Ok(read_dir) => {
                for entry in read_dir {
                    let entry = entry.map_err(HistoryError::Io)?;
                    let name = entry.file_name();
                    if let Some(number) = name.to_str().and_then(generation_file::parse_file_name) {
                        numbers.push(number);
                    }
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(map_io(&marker, e)),
        }
        numbers.sort_unstable();

        for (index, &number) in numbers.iter().enumerate() {
            let expected = index as u32 + 1;
            if number != expected {
                return Err(HistoryError::Gap {
                    scope: root_dir.to_path_buf(),
                    expected,
                });
            }
        }

        let file_names: Vec<String> = numbers
            .iter()
            .map(|&n| generation_file::file_name(n))
            .collect();
        let chain = Chain::load(&marker.join(CHAIN_FILENAME)).map_err(chain_error)?;
        chain.verify(&marker, &file_names).map_err(chain_error)?;

        let mut generations = Vec::with_capacity(numbers.len());
        for (number, name) in numbers.iter().zip(&file_names) {
            let path = marker.join(name);
            let file =
                GenerationFile::load(&path).map_err(|source| HistoryError::GenerationFile {
                    path: path.clone(),
                    source,
                })?;
            if file.generation.number != *number {
                return Err(HistoryError::NumberMismatch {
                    path,
                    declared: file.generation.number,
                });
            }
            generations.push(file.generation);
        }

        debug!(
            "Loaded {} generation(s) for scope {}",
            generations.len(),
            root_dir.display()
        );

        Ok(History {
            root_dir: root_dir.to_path_buf(),
            scope_path,
            parent,
            generations,
            chain,
        })
    }

    pub fn scope_path(&self) -> &str {
        &self.scope_path
    }

    pub fn parent(&self) -> Option<HistoryId> {
        self.parent
    }

    pub fn generations(&self) -> &[Generation] {
        &self.generations
    }

    pub fn latest(&self) -> Option<&Generation> {
        self.generations.last()
    }

    pub fn next_generation_number(&self) -> u32 {
        self.latest().map_or(1, |g| g.number + 1)
    }

    /// Every committed record of `path`, oldest first, with its generation.
    pub fn records_for(&self, path: &str) -> impl Iterator<Item = (u32, &PathRecord)> + '_ {
        let path = path.to_owned();
        self.generations
            .iter()
            .filter_map(move |g| g.record(&path).map(|r| (g.number, r)))
    }

    /// The entry that first recorded `path`, in any format.
    pub fn find_original_entry(&self, path: &str) -> Option<&HashEntry> {
        self.records_for(path)
            .flat_map(|(_, r)| &r.hashes)
            .find(|h| h.action == HashAction::Original)
    }

    /// Earliest entry for `path` in `format`, or in any format if `None`.
    pub fn find_first_entry(&self, path: &str, format: Option<HashFormat>) -> Option<&HashEntry> {
        self.records_for(path)
            .flat_map(|(_, r)| &r.hashes)
            .find(|h| format.is_none_or(|f| h.format == f))
    }

    /// Every format ever recorded for `path`, in first-seen order.
    pub fn existing_formats(&self, path: &str) -> Vec<HashFormat> {
        let mut formats = Vec::new();
        for hash in self.records_for(path).flat_map(|(_, r)| &r.hashes) {
            if !formats.contains(&hash.format) {
                formats.push(hash.format);
            }
        }
        formats
    }

    /// Directory digests recorded for `path`, tagged with their generation.
    pub fn directory_hash_entries_for(&self, path: &str) -> Vec<(u32, &HashEntry)> {
        self.records_for(path)
            .filter(|(_, r)| r.is_directory)
            .flat_map(|(number, r)| r.hashes.iter().map(move |h| (number, h)))
            .filter(|(_, h)| h.structure.is_some())
            .collect()
    }

    /// Whether `path` appears in any committed generation.
    pub fn is_known(&self, path: &str) -> bool {
        self.records_for(path).next().is_some()
    }

    /// Ordinary record paths across all generations, with whether each was
    /// last recorded as a directory. The scope root is not included.
    pub fn known_paths(&self) -> BTreeMap<&str, bool> {
        self.generations
            .iter()
            .flat_map(|g| g.records.iter().map(|r| (r.path.as_str(), r.is_directory)))
            .collect()
    }

    pub fn inherited_ignore(&self) -> &[String] {
        self.latest().map_or(&[], |g| g.ignore.as_slice())
    }

    /// Writes `generation` durably, binds it into the chain, then appends it
    /// in memory. The generation must carry the next number.
    pub fn append_generation(&mut self, generation: Generation) -> Result<(), HistoryError> {
        let expected = self.next_generation_number();
        let marker = self.root_dir.join(MARKER_DIR);
        let name = generation_file::file_name(generation.number);
        let path = marker.join(&name);
        if generation.number != expected {
            return Err(HistoryError::NumberMismatch {
                path,
                declared: generation.number,
            });
        }

        std::fs::create_dir_all(&marker).map_err(|e| map_io(&marker, e))?;

        let file = GenerationFile::new(generation);
        file.save(&path).map_err(|source| HistoryError::GenerationFile {
            path: path.clone(),
            source,
        })?;
        let entry = self
            .chain
            .append(&marker, &name)
            .map_err(|source| HistoryError::Chain {
                scope: self.root_dir.clone(),
                source,
            })?;

        info!(
            "Committed {} for scope {} ({})",
            name,
            self.root_dir.display(),
            entry.digest
        );
        self.generations.push(file.generation);
        Ok(())
    }
}
