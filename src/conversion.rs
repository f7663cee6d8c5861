// src/conversion.rs

//! Conversion orchestration
//!
//! Runs the tree walker over every storage root of a container, in order, and
//! commits the new `unprivileged` flag only when all of them converted
//! cleanly. Ownership changes are never rolled back: a failed run leaves the
//! filesystem partially converted and the config record untouched, so the
//! record never claims a state the filesystem does not have.

use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

use crate::container::update_unprivileged_flag;
use crate::error::Result;
use crate::filesystem::{
    ConversionResult, FsBackend, InodeSet, TreeWalker, DEFAULT_PROGRESS_INTERVAL,
};
use crate::idmap::IdShift;
use crate::progress::ProgressTracker;

/// Aggregate of all per-root results
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverallResult {
    pub shift: IdShift,
    pub paths: Vec<ConversionResult>,
}

impl OverallResult {
    /// Every root converted completely with zero errors
    pub fn is_success(&self) -> bool {
        self.paths.iter().all(ConversionResult::is_clean)
    }

    /// Roots that failed or were aborted
    pub fn failed(&self) -> impl Iterator<Item = &ConversionResult> {
        self.paths.iter().filter(|result| !result.is_clean())
    }

    pub fn total_objects(&self) -> u64 {
        self.paths.iter().map(|result| result.objects).sum()
    }

    pub fn total_errors(&self) -> u64 {
        self.paths.iter().map(|result| result.errors).sum()
    }

    pub fn total_warnings(&self) -> u64 {
        self.paths.iter().map(|result| result.warnings).sum()
    }
}

/// Result of [`Orchestrator::convert_and_commit`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Filesystem converted and config record updated
    Committed(OverallResult),
    /// Conversion failed somewhere; the record was not rewritten and the
    /// filesystem may be partially converted
    LeftUncommitted(OverallResult),
}

impl RunOutcome {
    pub fn result(&self) -> &OverallResult {
        match self {
            Self::Committed(result) | Self::LeftUncommitted(result) => result,
        }
    }

    pub fn is_committed(&self) -> bool {
        matches!(self, Self::Committed(_))
    }
}

/// Converts a set of storage roots with one id shift
pub struct Orchestrator<'a, B: FsBackend + ?Sized> {
    backend: &'a B,
    shift: IdShift,
    progress_interval: u64,
}

impl<'a, B: FsBackend + ?Sized> Orchestrator<'a, B> {
    pub fn new(backend: &'a B, shift: IdShift) -> Self {
        Self {
            backend,
            shift,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
        }
    }

    pub fn with_progress_interval(mut self, interval: u64) -> Self {
        self.progress_interval = interval;
        self
    }

    pub fn shift(&self) -> &IdShift {
        &self.shift
    }

    /// Walk every path in order
    ///
    /// A failed path does not stop the remaining ones. One inode set spans
    /// the whole run, so a root mounted inside another root is not shifted
    /// a second time.
    pub fn run(&self, paths: &[PathBuf], progress: &dyn ProgressTracker) -> OverallResult {
        let mut results = Vec::with_capacity(paths.len());
        let mut inodes = InodeSet::new();
        let walker =
            TreeWalker::new(self.backend, self.shift).with_progress_interval(self.progress_interval);

        for (index, path) in paths.iter().enumerate() {
            let child = progress.child(&path.display().to_string());
            progress.set_message(&format!(
                "[{}/{}] {}",
                index + 1,
                paths.len(),
                path.display()
            ));

            let result = walker.walk(path, &mut inodes, child.as_ref());
            if !result.is_clean() {
                warn!("Conversion of {} did not complete cleanly", path.display());
            }
            results.push(result);
        }

        let overall = OverallResult {
            shift: self.shift,
            paths: results,
        };
        info!(
            "Converted {} objects across {} paths ({} errors, {} warnings)",
            overall.total_objects(),
            overall.paths.len(),
            overall.total_errors(),
            overall.total_warnings()
        );
        overall
    }

    /// Convert `paths`, then set the record's flag to the shift's target
    ///
    /// The record is rewritten only if every path succeeded. An error is
    /// returned only when the rewrite itself fails.
    pub fn convert_and_commit(
        &self,
        record_path: &Path,
        paths: &[PathBuf],
        progress: &dyn ProgressTracker,
    ) -> Result<RunOutcome> {
        let overall = self.run(paths, progress);

        if !overall.is_success() {
            error!(
                "Conversion failed; not updating {}",
                record_path.display()
            );
            progress.finish_with_error("Conversion completed with errors");
            return Ok(RunOutcome::LeftUncommitted(overall));
        }

        let unprivileged = self.shift.target().unprivileged_flag();
        update_unprivileged_flag(record_path, unprivileged)?;
        info!(
            "Set unprivileged: {} in {}",
            u8::from(unprivileged),
            record_path.display()
        );
        progress.finish_with_message("Conversion completed successfully");

        Ok(RunOutcome::Committed(overall))
    }
}
