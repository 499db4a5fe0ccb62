//! Directory digests computed from a directory's direct children.
//!
//! A directory has two digests per format:
//!
//! - The *content* digest folds the content digests of all children (file
//!   content digests and sub-directory content digests). Names play no part,
//!   so renaming a file leaves it unchanged.
//! - The *structure* digest folds `digest(name)` for every child file and
//!   `digest(name ++ bytes(structure))` for every child directory. It is
//!   sensitive to names and topology but not to file content.
//!
//! Both are folded with [`HashFormat::digest_of_digest_list`], which sorts its
//! input, so the order in which children are added does not matter.

use crate::hashing::{Digest, DigestError, HashFormat};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryDigest {
    pub content: Digest,
    pub structure: Digest,
}

impl DirectoryDigest {
    pub fn format(&self) -> HashFormat {
        self.content.format()
    }
}

/// Reduces the children of exactly one directory in exactly one format.
#[derive(Debug)]
pub struct DirectoryReducer {
    format: HashFormat,
    content: Vec<Digest>,
    structure: Vec<Digest>,
    incomplete: bool,
}

impl DirectoryReducer {
    pub fn new(format: HashFormat) -> Self {
        DirectoryReducer {
            format,
            content: Vec::new(),
            structure: Vec::new(),
            incomplete: false,
        }
    }

    pub fn add_file(&mut self, name: &str, content: &Digest) -> Result<(), DigestError> {
        self.check_format(content)?;
        self.content.push(content.clone());
        self.structure.push(self.format.digest_bytes(name.as_bytes()));
        Ok(())
    }

    pub fn add_directory(&mut self, name: &str, child: &DirectoryDigest) -> Result<(), DigestError> {
        self.check_format(&child.content)?;
        let mut named = name.as_bytes().to_vec();
        named.extend(self.format.bytes_of(&child.structure)?);

        self.content.push(child.content.clone());
        self.structure.push(self.format.digest_bytes(&named));
        Ok(())
    }

    /// Marks a child whose digest is unavailable in this format. An
    /// incomplete reducer produces no digest at all rather than one that
    /// silently omits the child.
    pub fn mark_incomplete(&mut self) {
        self.incomplete = true;
    }

    pub fn finish(self) -> Result<Option<DirectoryDigest>, DigestError> {
        if self.incomplete {
            return Ok(None);
        }
        Ok(Some(DirectoryDigest {
            content: self.format.digest_of_digest_list(&self.content)?,
            structure: self.format.digest_of_digest_list(&self.structure)?,
        }))
    }

    fn check_format(&self, digest: &Digest) -> Result<(), DigestError> {
        if digest.format() != self.format {
            return Err(DigestError::FormatMismatch {
                expected: self.format,
                actual: digest.format(),
            });
        }
        Ok(())
    }
}

/// One independent [`DirectoryReducer`] per requested format, all fed the
/// same children.
#[derive(Debug)]
pub struct ReducerSet {
    reducers: BTreeMap<HashFormat, DirectoryReducer>,
}

impl ReducerSet {
    pub fn new(formats: &[HashFormat]) -> Self {
        ReducerSet {
            reducers: formats
                .iter()
                .map(|&format| (format, DirectoryReducer::new(format)))
                .collect(),
        }
    }

    /// Adds a file child. Formats missing from `digests` mark the matching
    /// reducer incomplete.
    pub fn add_file(&mut self, name: &str, digests: &[Digest]) -> Result<(), DigestError> {
        for (format, reducer) in &mut self.reducers {
            match digests.iter().find(|d| d.format() == *format) {
                Some(digest) => reducer.add_file(name, digest)?,
                None => reducer.mark_incomplete(),
            }
        }
        Ok(())
    }

    pub fn add_directory(
        &mut self,
        name: &str,
        digests: &[DirectoryDigest],
    ) -> Result<(), DigestError> {
        for (format, reducer) in &mut self.reducers {
            match digests.iter().find(|d| d.format() == *format) {
                Some(digest) => reducer.add_directory(name, digest)?,
                None => reducer.mark_incomplete(),
            }
        }
        Ok(())
    }

    pub fn mark_incomplete(&mut self) {
        for reducer in self.reducers.values_mut() {
            reducer.mark_incomplete();
        }
    }

    /// Digests for every format whose reducer saw all children.
    pub fn finish(self) -> Result<Vec<DirectoryDigest>, DigestError> {
        let mut digests = Vec::new();
        for reducer in self.reducers.into_values() {
            if let Some(digest) = reducer.finish()? {
                digests.push(digest);
            }
        }
        Ok(digests)
    }
}
