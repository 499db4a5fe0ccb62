use super::{SessionError, SessionReport, Violation};
use crate::generation::{Generation, HashAction, PathRecord};
use crate::history::{HistoryForest, HistoryId};
use tracing::info;

/// Pending generations of one session, children before parents.
#[derive(Debug)]
pub struct CommitPlan {
    generations: Vec<(HistoryId, Generation)>,
    report: SessionReport,
}

impl CommitPlan {
    pub(super) fn new(generations: Vec<(HistoryId, Generation)>, report: SessionReport) -> Self {
        CommitPlan {
            generations,
            report,
        }
    }

    pub fn report(&self) -> &SessionReport {
        &self.report
    }

    pub fn into_report(self) -> SessionReport {
        self.report
    }

    pub fn generations(&self) -> impl Iterator<Item = (HistoryId, &Generation)> {
        self.generations.iter().map(|(id, g)| (*id, g))
    }

    /// Checks every pending generation: each `New` entry needs a `Verified`
    /// sibling on the same record in a format previously recorded for that
    /// path.
    pub fn validate(&self, forest: &HistoryForest) -> Result<(), SessionError> {
        let mut violations = Vec::new();
        for (id, generation) in &self.generations {
            let history = forest.history(*id);
            for record in std::iter::once(&generation.root).chain(&generation.records) {
                let trusted = history.existing_formats(&record.path);
                let confirmed = record
                    .hashes
                    .iter()
                    .any(|h| h.action == HashAction::Verified && trusted.contains(&h.format));
                if confirmed {
                    continue;
                }
                violations.extend(
                    record
                        .hashes
                        .iter()
                        .filter(|h| h.action == HashAction::New)
                        .map(|h| Violation {
                            path: forest.forest_path(*id, &record.path),
                            format: h.format,
                        }),
                );
            }
        }

        if violations.is_empty() {
            Ok(())
        } else {
            Err(SessionError::UnverifiedNew(violations))
        }
    }

    /// Validates everything, then writes each generation and its chain
    /// entry. Nothing is written if validation fails.
    pub fn commit(self, forest: &mut HistoryForest) -> Result<SessionReport, SessionError> {
        self.validate(forest)?;

        for (id, mut generation) in self.generations {
            promote(&mut generation.root);
            for record in &mut generation.records {
                promote(record);
            }
            let number = generation.number;
            forest.history_mut(id).append_generation(generation)?;
            info!(
                "Sealed generation {} of scope {}",
                number,
                forest.history(id).scope_path()
            );
        }

        Ok(self.report)
    }
}

fn promote(record: &mut PathRecord) {
    for hash in &mut record.hashes {
        if hash.action == HashAction::New {
            hash.action = HashAction::Verified;
        }
    }
}
