use std::path::PathBuf;

use crate::rewrite::RewriteStats;

/// A reference that was replaced by its publicized copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetReference {
    /// The publicized copy
    pub path: PathBuf,
    /// The reference it replaces
    pub original: PathBuf,
    /// `false` if the copy already existed and was left alone
    pub created: bool,
    /// What the rewrite changed, `None` when the copy already existed
    pub stats: Option<RewriteStats>,
}

/// Outcome of a [`crate::publicizer::Publicizer`] run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublicizeReport {
    /// Publicized references, in reference order
    pub target_references: Vec<TargetReference>,
    /// The original paths of the replaced references
    pub removed_references: Vec<PathBuf>,
    /// Source files the consumer has to compile
    pub generated_code_files: Vec<PathBuf>,
}

impl PublicizeReport {
    /// `true` if the run did nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.target_references.is_empty()
            && self.removed_references.is_empty()
            && self.generated_code_files.is_empty()
    }

    /// Number of copies created by this run.
    #[must_use]
    pub fn created_count(&self) -> usize {
        self.target_references
            .iter()
            .filter(|reference| reference.created)
            .count()
    }

    /// Totals over every copy created by this run.
    #[must_use]
    pub fn total_stats(&self) -> RewriteStats {
        self.target_references
            .iter()
            .filter_map(|reference| reference.stats)
            .fold(RewriteStats::default(), RewriteStats::merge)
    }
}
