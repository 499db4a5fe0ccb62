use crate::generation::HashAction;
use crate::hashing::HashFormat;
use std::fmt;

/// One decided observation, as reported to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    /// Relative to the root of the sealed tree.
    pub path: String,
    pub format: HashFormat,
    pub action: HashAction,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    ContentMismatch(HashFormat),
    DirectoryMismatch(HashFormat),
    Missing,
    UnexpectedNew,
    Unreadable(String),
}

impl FailureKind {
    pub fn category(&self) -> FailureCategory {
        match self {
            FailureKind::ContentMismatch(_) => FailureCategory::ContentMismatch,
            FailureKind::DirectoryMismatch(_) => FailureCategory::DirectoryMismatch,
            FailureKind::Missing => FailureCategory::Missing,
            FailureKind::UnexpectedNew => FailureCategory::UnexpectedNew,
            FailureKind::Unreadable(_) => FailureCategory::Unreadable,
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::ContentMismatch(format) => write!(f, "content mismatch ({format})"),
            FailureKind::DirectoryMismatch(format) => {
                write!(f, "directory hash mismatch ({format})")
            }
            FailureKind::Missing => write!(f, "missing"),
            FailureKind::UnexpectedNew => write!(f, "unexpected new path"),
            FailureKind::Unreadable(reason) => write!(f, "unreadable: {reason}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    pub path: String,
    pub kind: FailureKind,
}

/// Failure categories, declared in reporting priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum FailureCategory {
    ContentMismatch,
    Unreadable,
    DirectoryMismatch,
    Missing,
    UnexpectedNew,
}

impl FailureCategory {
    pub const ALL: [FailureCategory; 5] = [
        FailureCategory::ContentMismatch,
        FailureCategory::Unreadable,
        FailureCategory::DirectoryMismatch,
        FailureCategory::Missing,
        FailureCategory::UnexpectedNew,
    ];

    pub fn label(self) -> &'static str {
        match self {
            FailureCategory::ContentMismatch => "content mismatch",
            FailureCategory::Unreadable => "unreadable",
            FailureCategory::DirectoryMismatch => "directory mismatch",
            FailureCategory::Missing => "missing",
            FailureCategory::UnexpectedNew => "unexpected new",
        }
    }

    pub fn exit_code(self) -> u8 {
        match self {
            FailureCategory::ContentMismatch => 1,
            FailureCategory::Unreadable => 2,
            FailureCategory::DirectoryMismatch => 3,
            FailureCategory::Missing => 4,
            FailureCategory::UnexpectedNew => 5,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SessionReport {
    pub outcomes: Vec<Outcome>,
    pub failures: Vec<Failure>,
}

impl SessionReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    /// Highest-priority category among all failures.
    pub fn worst_category(&self) -> Option<FailureCategory> {
        self.failures.iter().map(|f| f.kind.category()).min()
    }

    pub fn count(&self, action: HashAction) -> usize {
        self.outcomes.iter().filter(|o| o.action == action).count()
    }

    pub fn count_failures(&self, category: FailureCategory) -> usize {
        self.failures
            .iter()
            .filter(|f| f.kind.category() == category)
            .count()
    }

    pub(super) fn push_outcome(&mut self, path: &str, format: HashFormat, action: HashAction) {
        self.outcomes.push(Outcome {
            path: path.to_string(),
            format,
            action,
        });
    }

    pub(super) fn push_failure(&mut self, path: &str, kind: FailureKind) {
        self.failures.push(Failure {
            path: path.to_string(),
            kind,
        });
    }
}
