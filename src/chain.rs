//! Append-only self-integrity chain.
//!
//! Each committed generation file is bound to a content identifier of its
//! exact bytes by one line `<file name> <digest>` in `.treeseal/chain`. A
//! line is appended only after the generation file is durable, and lines are
//! never rewritten.

use crate::checksum::{ChecksumError, digest_file};
use crate::hashing::{Digest, REFERENCE_FORMAT};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const CHAIN_FILENAME: &str = "chain";

#[derive(Debug, thiserror::Error)]
pub enum ChainError {
    #[error("IO error: {0}")]
    Io(std::io::Error),
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),
    #[error("Malformed chain line {line} in {}", .path.display())]
    Malformed { path: PathBuf, line: usize },
    #[error("Chain entry {position} names {found}, expected {expected}")]
    OutOfOrder {
        position: usize,
        expected: String,
        found: String,
    },
    #[error("Generation file {0} has no chain entry")]
    Unchained(String),
    #[error("Chain entry {0} has no generation file")]
    Dangling(String),
    #[error("Generation file {name} does not match its chain entry")]
    Mismatch { name: String },
    #[error("Failed to digest generation file: {0}")]
    Checksum(#[from] ChecksumError),
}

fn map_io(path: &Path, e: std::io::Error) -> ChainError {
    if e.kind() == std::io::ErrorKind::PermissionDenied {
        ChainError::PermissionDenied(path.to_path_buf())
    } else {
        ChainError::Io(e)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainEntry {
    pub file_name: String,
    pub digest: Digest,
}

#[derive(Debug, Clone, Default)]
pub struct Chain {
    entries: Vec<ChainEntry>,
}

impl Chain {
    /// Reads `chain_path`; a missing file is an empty chain.
    pub fn load(chain_path: &Path) -> Result<Self, ChainError> {
        let content = match std::fs::read_to_string(chain_path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Chain::default()),
            Err(e) => return Err(map_io(chain_path, e)),
        };

        let mut entries = Vec::new();
        for (index, line) in content.lines().enumerate() {
            let malformed = || ChainError::Malformed {
                path: chain_path.to_path_buf(),
                line: index + 1,
            };
            let (file_name, encoded) = line.split_once(' ').ok_or_else(malformed)?;
            let digest = Digest::new(REFERENCE_FORMAT, encoded);
            REFERENCE_FORMAT.bytes_of(&digest).map_err(|_| malformed())?;
            entries.push(ChainEntry {
                file_name: file_name.to_string(),
                digest,
            });
        }

        Ok(Chain { entries })
    }

    #[cfg(test)]
    pub fn entries(&self) -> &[ChainEntry] {
        &self.entries
    }

    /// Checks that the chain lists exactly `file_names`, in order, and that
    /// every file in `dir` still has the digest recorded for it.
    pub fn verify(&self, dir: &Path, file_names: &[String]) -> Result<(), ChainError> {
        for (position, expected) in file_names.iter().enumerate() {
            let Some(entry) = self.entries.get(position) else {
                return Err(ChainError::Unchained(expected.clone()));
            };
            if &entry.file_name != expected {
                return Err(ChainError::OutOfOrder {
                    position: position + 1,
                    expected: expected.clone(),
                    found: entry.file_name.clone(),
                });
            }

            let actual = digest_file(&dir.join(expected), REFERENCE_FORMAT)?;
            if actual != entry.digest {
                return Err(ChainError::Mismatch {
                    name: expected.clone(),
                });
            }
            debug!("Chain entry for {} verified", expected);
        }

        if let Some(extra) = self.entries.get(file_names.len()) {
            return Err(ChainError::Dangling(extra.file_name.clone()));
        }
        Ok(())
    }

    /// Digests the durable generation file `dir/file_name` and appends its
    /// chain line, syncing the chain before returning.
    pub fn append(&mut self, dir: &Path, file_name: &str) -> Result<ChainEntry, ChainError> {
        let digest = digest_file(&dir.join(file_name), REFERENCE_FORMAT)?;
        let chain_path = dir.join(CHAIN_FILENAME);

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&chain_path)
            .map_err(|e| map_io(&chain_path, e))?;
        writeln!(file, "{} {}", file_name, digest.as_str()).map_err(|e| map_io(&chain_path, e))?;
        file.sync_all().map_err(ChainError::Io)?;

        let entry = ChainEntry {
            file_name: file_name.to_string(),
            digest,
        };
        self.entries.push(entry.clone());
        Ok(entry)
    }
}
