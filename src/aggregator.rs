use crate::errors::FileError;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::warn;

/// What happened to a single file.
#[derive(Debug)]
pub struct ReplaceOutcome {
    /// The file processed.
    pub path: PathBuf,
    /// Sum of matches over every pair.
    pub total_replacements: usize,
    /// `true` iff the substituted content differs from what was read.
    pub content_changed: bool,
    /// `true` if the run was cancelled before this file was finished.
    pub cancelled: bool,
    /// Present iff reading or writing failed.
    pub error: Option<FileError>,
}

impl ReplaceOutcome {
    /// An outcome for a file that was read but matched nothing.
    pub fn untouched(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            total_replacements: 0,
            content_changed: false,
            cancelled: false,
            error: None,
        }
    }

    pub fn failed(error: FileError) -> Self {
        Self {
            path: error.path().clone(),
            error: Some(error),
            ..Self::untouched(PathBuf::new())
        }
    }

    pub fn cancelled(path: impl Into<PathBuf>) -> Self {
        Self {
            cancelled: true,
            ..Self::untouched(path)
        }
    }
}

/// Totals for a completed run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    /// Outcomes recorded, one per dispatched file.
    pub files_processed: usize,
    /// Files whose content changed (or would change, in a dry run).
    pub files_touched: usize,
    /// Occurrences replaced across all touched files.
    pub total_replacements: usize,
    /// Files skipped because of a read or write error.
    pub failed: usize,
    /// Files skipped because the run was cancelled.
    pub cancelled: usize,
}

/// Thread-safe accumulation of [`ReplaceOutcome`]s.
///
/// Every counter is an atomic, so `record` can be called from any number of
/// workers at once. [`Aggregator::finalize`] takes the aggregator by value,
/// which means it can only run once every borrower is gone.
#[derive(Debug, Default)]
pub struct Aggregator {
    processed: AtomicUsize,
    touched: AtomicUsize,
    replacements: AtomicUsize,
    failed: AtomicUsize,
    cancelled: AtomicUsize,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, outcome: &ReplaceOutcome) {
        self.processed.fetch_add(1, Ordering::Relaxed);

        if let Some(err) = &outcome.error {
            warn!(path = %outcome.path.display(), error = %err, "skipping file");
            self.failed.fetch_add(1, Ordering::Relaxed);
            return;
        }
        if outcome.cancelled {
            self.cancelled.fetch_add(1, Ordering::Relaxed);
            return;
        }
        if outcome.content_changed {
            self.touched.fetch_add(1, Ordering::Relaxed);
            self.replacements
                .fetch_add(outcome.total_replacements, Ordering::Relaxed);
        }
    }

    /// Outcomes recorded so far.
    pub fn recorded(&self) -> usize {
        self.processed.load(Ordering::Relaxed)
    }

    pub fn finalize(self) -> RunSummary {
        RunSummary {
            files_processed: self.processed.into_inner(),
            files_touched: self.touched.into_inner(),
            total_replacements: self.replacements.into_inner(),
            failed: self.failed.into_inner(),
            cancelled: self.cancelled.into_inner(),
        }
    }
}
