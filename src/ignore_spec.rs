//! Layered ignore patterns in gitignore syntax.
//!
//! A scope's effective patterns are the built-in defaults, then the patterns
//! stored in its most recent generation, then patterns given on the command
//! line, then the lines of an optional pattern file. Later patterns win, so a
//! `!pattern` can re-include something an earlier layer excluded.

use ignore::gitignore::{Gitignore, GitignoreBuilder};
use std::path::{Path, PathBuf};

/// Always active and never stored in a generation.
const DEFAULT_PATTERNS: &[&str] = &[".DS_Store", "Thumbs.db", "desktop.ini"];

#[derive(Debug, thiserror::Error)]
pub enum IgnoreError {
    #[error("IO error: {0}")]
    Io(std::io::Error),
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),
    #[error("Invalid ignore pattern: {0}")]
    Pattern(#[from] ignore::Error),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IgnoreSpec {
    patterns: Vec<String>,
}

impl IgnoreSpec {
    pub fn new(patterns: Vec<String>) -> Self {
        let mut spec = IgnoreSpec::default();
        spec.extend(patterns);
        spec
    }

    /// Layers `extra` and the contents of `file` over `inherited`.
    pub fn compose(
        inherited: &[String],
        extra: &[String],
        file: Option<&Path>,
    ) -> Result<Self, IgnoreError> {
        let mut spec = IgnoreSpec::new(inherited.to_vec());
        spec.extend(extra.iter().cloned());
        if let Some(path) = file {
            spec.extend(read_pattern_file(path)?);
        }
        Ok(spec)
    }

    fn extend(&mut self, patterns: impl IntoIterator<Item = String>) {
        for pattern in patterns {
            let pattern = pattern.trim().to_string();
            if pattern.is_empty() || DEFAULT_PATTERNS.contains(&pattern.as_str()) {
                continue;
            }
            if !self.patterns.contains(&pattern) {
                self.patterns.push(pattern);
            }
        }
    }

    /// Patterns to persist, excluding the built-in defaults.
    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    pub fn matcher(&self) -> Result<IgnoreMatcher, IgnoreError> {
        let mut builder = GitignoreBuilder::new(Path::new("."));
        for pattern in DEFAULT_PATTERNS {
            builder.add_line(None, pattern)?;
        }
        for pattern in &self.patterns {
            builder.add_line(None, pattern)?;
        }
        Ok(IgnoreMatcher {
            gitignore: builder.build()?,
        })
    }
}

fn read_pattern_file(path: &Path) -> Result<Vec<String>, IgnoreError> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::PermissionDenied {
            IgnoreError::PermissionDenied(path.to_path_buf())
        } else {
            IgnoreError::Io(e)
        }
    })?;

    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect())
}

pub struct IgnoreMatcher {
    gitignore: Gitignore,
}

impl IgnoreMatcher {
    /// Whether `path` (relative to the scope root) or any of its ancestors is
    /// excluded.
    pub fn is_ignored(&self, path: &str, is_dir: bool) -> bool {
        self.gitignore
            .matched_path_or_any_parents(Path::new(path), is_dir)
            .is_ignore()
    }
}
