//! Pluggable digest algorithms.
//!
//! Every format supports hashing bytes (streamed through [`Hasher`]),
//! round-tripping between the canonical string encoding and raw bytes, and
//! folding a set of digests into a single order-independent digest.

mod base58;
mod format;

pub use format::HashFormat;

use sha2::{Digest as _, Sha256, Sha512};
use std::fmt;
use xxhash_rust::xxh3::Xxh3;

/// Two-character tag prefixed to every content identifier.
const CONTENT_ID_TAG: &str = "S5";

/// Format used to bind generation files into the self-integrity chain,
/// independent of the formats chosen for file content.
pub const REFERENCE_FORMAT: HashFormat = HashFormat::ContentId;

#[derive(Debug, thiserror::Error)]
pub enum DigestError {
    #[error("Malformed {format} digest: {value}")]
    Malformed { format: HashFormat, value: String },
    #[error("Expected a {expected} digest, got {actual}")]
    FormatMismatch {
        expected: HashFormat,
        actual: HashFormat,
    },
}

/// A digest in its canonical string encoding.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Digest {
    format: HashFormat,
    encoded: String,
}

impl Digest {
    pub fn new(format: HashFormat, encoded: impl Into<String>) -> Self {
        Digest {
            format,
            encoded: encoded.into(),
        }
    }

    pub fn format(&self) -> HashFormat {
        self.format
    }

    pub fn as_str(&self) -> &str {
        &self.encoded
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.format, self.encoded)
    }
}

/// Incremental hasher for one format.
pub enum Hasher {
    Sha256(Sha256),
    Blake3(Box<blake3::Hasher>),
    Xxh3(Box<Xxh3>),
    ContentId(Sha512),
}

impl Hasher {
    pub fn new(format: HashFormat) -> Self {
        match format {
            HashFormat::Sha256 => Hasher::Sha256(Sha256::new()),
            HashFormat::Blake3 => Hasher::Blake3(Box::new(blake3::Hasher::new())),
            HashFormat::Xxh3 => Hasher::Xxh3(Box::new(Xxh3::new())),
            HashFormat::ContentId => Hasher::ContentId(Sha512::new()),
        }
    }

    pub fn update(&mut self, data: &[u8]) {
        match self {
            Hasher::Sha256(h) => h.update(data),
            Hasher::Blake3(h) => {
                h.update(data);
            }
            Hasher::Xxh3(h) => h.update(data),
            Hasher::ContentId(h) => h.update(data),
        }
    }

    pub fn finalize(self) -> Digest {
        match self {
            Hasher::Sha256(h) => Digest::new(HashFormat::Sha256, hex::encode(h.finalize())),
            Hasher::Blake3(h) => {
                Digest::new(HashFormat::Blake3, hex::encode(h.finalize().as_bytes()))
            }
            Hasher::Xxh3(h) => Digest::new(
                HashFormat::Xxh3,
                hex::encode(h.digest128().to_be_bytes()),
            ),
            Hasher::ContentId(h) => encode_content_id(&h.finalize()),
        }
    }
}

fn encode_content_id(bytes: &[u8]) -> Digest {
    let mut encoded = String::with_capacity(CONTENT_ID_TAG.len() + base58::ENCODED_DIGITS);
    encoded.push_str(CONTENT_ID_TAG);
    encoded.push_str(&base58::encode_fixed(bytes, base58::ENCODED_DIGITS));
    Digest::new(HashFormat::ContentId, encoded)
}

impl HashFormat {
    pub fn digest_bytes(self, data: &[u8]) -> Digest {
        let mut hasher = Hasher::new(self);
        hasher.update(data);
        hasher.finalize()
    }

    /// Decodes a digest of this format back to its raw bytes.
    pub fn bytes_of(self, digest: &Digest) -> Result<Vec<u8>, DigestError> {
        if digest.format != self {
            return Err(DigestError::FormatMismatch {
                expected: self,
                actual: digest.format,
            });
        }

        let malformed = || DigestError::Malformed {
            format: self,
            value: digest.encoded.clone(),
        };

        let bytes = match self {
            HashFormat::ContentId => {
                let digits = digest
                    .encoded
                    .strip_prefix(CONTENT_ID_TAG)
                    .filter(|digits| digits.len() == base58::ENCODED_DIGITS)
                    .ok_or_else(malformed)?;
                base58::decode_fixed(digits, self.byte_len()).ok_or_else(malformed)?
            }
            _ => hex::decode(&digest.encoded).map_err(|_| malformed())?,
        };

        if bytes.len() != self.byte_len() {
            return Err(malformed());
        }
        Ok(bytes)
    }

    /// Encodes raw digest bytes in this format's canonical string form.
    pub fn digest_of(self, bytes: &[u8]) -> Result<Digest, DigestError> {
        if bytes.len() != self.byte_len() {
            return Err(DigestError::Malformed {
                format: self,
                value: hex::encode(bytes),
            });
        }
        Ok(match self {
            HashFormat::ContentId => encode_content_id(bytes),
            _ => Digest::new(self, hex::encode(bytes)),
        })
    }

    /// Folds a set of digests into one.
    ///
    /// The encoded strings are sorted byte-wise before their raw bytes are fed
    /// to a fresh hasher, so the result does not depend on input order. An
    /// empty list yields the digest of zero bytes.
    pub fn digest_of_digest_list(self, digests: &[Digest]) -> Result<Digest, DigestError> {
        let mut sorted: Vec<&Digest> = digests.iter().collect();
        sorted.sort_by(|a, b| a.encoded.as_bytes().cmp(b.encoded.as_bytes()));

        let mut hasher = Hasher::new(self);
        for digest in sorted {
            hasher.update(&self.bytes_of(digest)?);
        }
        Ok(hasher.finalize())
    }
}
