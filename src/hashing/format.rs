use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unsupported hash format: {0}")]
pub struct UnsupportedFormat(pub String);

/// Supported digest algorithms.
///
/// Declaration order is verification priority: when a path has several
/// recorded formats, earlier variants are preferred as the benchmark.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum HashFormat {
    #[serde(rename = "sha256")]
    Sha256,
    #[serde(rename = "blake3")]
    Blake3,
    /// XXH3-128. Fast, not cryptographic.
    #[serde(rename = "xxh3")]
    Xxh3,
    /// Base-58 encoded SHA-512, see [`super::base58`].
    #[serde(rename = "cid")]
    ContentId,
}

impl HashFormat {
    pub const ALL: [HashFormat; 4] = [
        HashFormat::Sha256,
        HashFormat::Blake3,
        HashFormat::Xxh3,
        HashFormat::ContentId,
    ];

    pub fn name(self) -> &'static str {
        match self {
            HashFormat::Sha256 => "sha256",
            HashFormat::Blake3 => "blake3",
            HashFormat::Xxh3 => "xxh3",
            HashFormat::ContentId => "cid",
        }
    }

    /// Length of the raw digest in bytes.
    pub fn byte_len(self) -> usize {
        match self {
            HashFormat::Sha256 | HashFormat::Blake3 => 32,
            HashFormat::Xxh3 => 16,
            HashFormat::ContentId => 64,
        }
    }
}

impl fmt::Display for HashFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.name())
    }
}

impl FromStr for HashFormat {
    type Err = UnsupportedFormat;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_ascii_lowercase();
        HashFormat::ALL
            .into_iter()
            .find(|format| format.name() == lowered)
            .ok_or_else(|| UnsupportedFormat(s.to_string()))
    }
}
