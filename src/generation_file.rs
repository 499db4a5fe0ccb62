use crate::generation::{Generation, HashAction};
use crate::hashing::{Digest, DigestError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Reserved folder at the root of every scope.
pub const MARKER_DIR: &str = ".treeseal";

const FILE_PREFIX: &str = "generation-";
const FILE_SUFFIX: &str = ".toml";

#[derive(Debug, thiserror::Error)]
pub enum GenerationFileError {
    #[error("IO error: {0}")]
    Io(std::io::Error),
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),
    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
    #[error("Unsupported generation file version: {0}")]
    UnsupportedVersion(u32),
    #[error("Provisional entry for {0} cannot be stored")]
    ProvisionalEntry(String),
    #[error("Invalid digest for {path}: {source}")]
    InvalidDigest { path: String, source: DigestError },
}

fn map_io(path: &Path, e: std::io::Error) -> GenerationFileError {
    if e.kind() == std::io::ErrorKind::PermissionDenied {
        GenerationFileError::PermissionDenied(path.to_path_buf())
    } else {
        GenerationFileError::Io(e)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct Metadata {
    version: u32,
}

/// Only the metadata section, so the version can be checked before the rest
/// of the file is decoded. Deliberately lenient about everything else.
#[derive(Debug, Deserialize)]
struct MetadataOnly {
    metadata: Metadata,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GenerationFile {
    metadata: Metadata,
    pub generation: Generation,
}

impl GenerationFile {
    const SUPPORTED_VERSION: u32 = 1;

    pub fn new(generation: Generation) -> Self {
        GenerationFile {
            metadata: Metadata {
                version: Self::SUPPORTED_VERSION,
            },
            generation,
        }
    }

    pub fn from_toml(content: &str) -> Result<Self, GenerationFileError> {
        // Check the version first so a file written by a newer release is
        // reported as such instead of as a confusing parse error.
        let metadata_only: MetadataOnly = toml::from_str(content)?;

        if metadata_only.metadata.version != Self::SUPPORTED_VERSION {
            return Err(GenerationFileError::UnsupportedVersion(
                metadata_only.metadata.version,
            ));
        }

        let file: GenerationFile = toml::from_str(content)?;
        file.check_persistable()?;
        Ok(file)
    }

    pub fn to_toml(&self) -> Result<String, GenerationFileError> {
        self.check_persistable()?;
        Ok(toml::to_string_pretty(self)?)
    }

    /// `New` entries are promoted before commit and must never reach disk.
    /// Every stored digest must be in its format's canonical encoding.
    fn check_persistable(&self) -> Result<(), GenerationFileError> {
        let generation = &self.generation;
        for record in std::iter::once(&generation.root).chain(&generation.records) {
            for hash in &record.hashes {
                if hash.action == HashAction::New {
                    return Err(GenerationFileError::ProvisionalEntry(record.path.clone()));
                }
                let digests =
                    std::iter::once(hash.content_digest()).chain(hash.structure_digest());
                for digest in digests {
                    check_canonical(&digest).map_err(|source| {
                        GenerationFileError::InvalidDigest {
                            path: record.path.clone(),
                            source,
                        }
                    })?;
                }
            }
        }
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, GenerationFileError> {
        let content = std::fs::read_to_string(path).map_err(|e| map_io(path, e))?;
        Self::from_toml(&content)
    }

    /// Saves atomically: temp file in the same directory, fsync, rename.
    pub fn save(&self, path: &Path) -> Result<(), GenerationFileError> {
        use std::io::Write;

        let content = self.to_toml()?;

        let parent = path.parent().unwrap_or(Path::new("."));

        let mut temp_file =
            tempfile::NamedTempFile::new_in(parent).map_err(|e| map_io(parent, e))?;

        temp_file
            .write_all(content.as_bytes())
            .map_err(|e| map_io(path, e))?;

        temp_file
            .as_file()
            .sync_all()
            .map_err(GenerationFileError::Io)?;

        temp_file
            .persist(path)
            .map_err(|e| map_io(path, e.error))?;

        Ok(())
    }
}

fn check_canonical(digest: &Digest) -> Result<(), DigestError> {
    let format = digest.format();
    if format.digest_of(&format.bytes_of(digest)?)? != *digest {
        return Err(DigestError::Malformed {
            format,
            value: digest.as_str().to_string(),
        });
    }
    Ok(())
}

pub fn file_name(number: u32) -> String {
    format!("{FILE_PREFIX}{number:06}{FILE_SUFFIX}")
}

/// Inverse of [`file_name`]; `None` for anything that is not a generation file.
pub fn parse_file_name(name: &str) -> Option<u32> {
    let digits = name.strip_prefix(FILE_PREFIX)?.strip_suffix(FILE_SUFFIX)?;
    if digits.len() < 6 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}
