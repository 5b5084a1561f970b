//! Per-asset outcomes of a patch pass.

use crate::error::PatchError;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// What a pass did to one asset.
#[derive(Debug)]
pub enum AssetOutcome {
    /// Existing asset was modified.
    Patched,
    /// Asset was written from scratch.
    Created,
    /// Sentinel already present (or generated content unchanged); untouched.
    AlreadyPatched,
    /// Asset could not be processed; the pass moved on.
    Skipped(PatchError),
}

impl AssetOutcome {
    #[must_use]
    pub fn is_change(&self) -> bool {
        matches!(self, Self::Patched | Self::Created)
    }
}

#[derive(Debug)]
pub struct AssetRecord {
    /// Path relative to the bundle root.
    pub path: PathBuf,
    pub outcome: AssetOutcome,
}

/// Collected outcomes of one pass over a bundle.
#[derive(Debug)]
pub struct PatchReport {
    pass: &'static str,
    records: Vec<AssetRecord>,
}

impl PatchReport {
    #[must_use]
    pub fn new(pass: &'static str) -> Self {
        Self {
            pass,
            records: Vec::new(),
        }
    }

    /// Name of the pass that produced this report.
    #[must_use]
    pub fn pass(&self) -> &'static str {
        self.pass
    }

    /// Records an outcome; skips are logged as they happen.
    pub fn record(&mut self, path: impl Into<PathBuf>, outcome: AssetOutcome) {
        let path = path.into();
        if let AssetOutcome::Skipped(err) = &outcome {
            warn!("{} pass skipped {}: {}", self.pass, path.display(), err);
        }
        self.records.push(AssetRecord { path, outcome });
    }

    #[must_use]
    pub fn records(&self) -> &[AssetRecord] {
        &self.records
    }

    /// Returns the outcome recorded for `path`, if any.
    #[must_use]
    pub fn outcome_for(&self, path: impl AsRef<Path>) -> Option<&AssetOutcome> {
        let path = path.as_ref();
        self.records
            .iter()
            .find(|r| r.path == path)
            .map(|r| &r.outcome)
    }

    /// Number of assets created or modified.
    #[must_use]
    pub fn changed(&self) -> usize {
        self.records.iter().filter(|r| r.outcome.is_change()).count()
    }

    /// Records whose asset was skipped.
    pub fn skipped(&self) -> impl Iterator<Item = &AssetRecord> {
        self.records
            .iter()
            .filter(|r| matches!(r.outcome, AssetOutcome::Skipped(_)))
    }

    /// True when no asset was skipped.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.skipped().next().is_none()
    }

    /// Logs a one-line summary.
    pub fn log_summary(&self) {
        info!(
            "{} pass: {} assets changed, {} skipped, {} total",
            self.pass,
            self.changed(),
            self.skipped().count(),
            self.records.len()
        );
    }
}
