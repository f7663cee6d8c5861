// src/filesystem/walker.rs

//! Tree walk over one storage root
//!
//! The walk is physical (symlinks are converted as links, never followed)
//! and stays on the root's filesystem. Each object is converted once no
//! matter how many hard links reach it; the caller owns the inode set, so
//! one set spanning several roots also covers nested mount points. An
//! out-of-band id stops the walk;
//! any other per-object failure is counted and the walk carries on.

use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};
use walkdir::WalkDir;

use super::backend::FsBackend;
use super::converter::ObjectConverter;
use super::inode_set::InodeSet;
use crate::idmap::IdShift;
use crate::progress::ProgressTracker;

/// Objects between two progress updates
pub const DEFAULT_PROGRESS_INTERVAL: u64 = 1000;

/// How a walk ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalkStatus {
    /// Every object converted
    Complete,
    /// Walk finished but some objects failed
    CompletedWithErrors,
    /// Walk stopped early
    Aborted { reason: String },
}

/// Per-root outcome of a walk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionResult {
    pub root: PathBuf,
    /// Objects fully converted
    pub objects: u64,
    /// Stat/chown failures plus the fatal object, if any
    pub errors: u64,
    /// Mode-restore and ACL failures
    pub warnings: u64,
    /// Entries skipped because their inode was already converted (hard
    /// links, or a root nested in one walked earlier)
    pub hard_links: u64,
    pub status: WalkStatus,
}

impl ConversionResult {
    fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            objects: 0,
            errors: 0,
            warnings: 0,
            hard_links: 0,
            status: WalkStatus::Complete,
        }
    }

    fn aborted(root: &Path, reason: String) -> Self {
        Self {
            status: WalkStatus::Aborted { reason },
            ..Self::new(root)
        }
    }

    /// A root can be trusted only if it converted completely without errors
    pub fn is_clean(&self) -> bool {
        self.errors == 0 && self.status == WalkStatus::Complete
    }
}

/// Walks one root, converting every object not already in the inode set
pub struct TreeWalker<'a, B: FsBackend + ?Sized> {
    converter: ObjectConverter<'a, B>,
    progress_interval: u64,
}

impl<'a, B: FsBackend + ?Sized> TreeWalker<'a, B> {
    pub fn new(backend: &'a B, shift: IdShift) -> Self {
        Self {
            converter: ObjectConverter::new(backend, shift),
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
        }
    }

    /// Report progress every `interval` converted objects
    pub fn with_progress_interval(mut self, interval: u64) -> Self {
        self.progress_interval = interval.max(1);
        self
    }

    /// Walk `root` and convert everything under it
    ///
    /// Objects already in `inodes` are skipped; every object visited is added.
    pub fn walk(
        &self,
        root: &Path,
        inodes: &mut InodeSet,
        progress: &dyn ProgressTracker,
    ) -> ConversionResult {
        info!("Converting {} ({})", root.display(), self.converter.shift());

        match fs::metadata(root) {
            Ok(meta) if meta.is_dir() => {}
            Ok(_) => {
                let reason = format!("Path {} is not a directory", root.display());
                error!("{}", reason);
                progress.finish_with_error(&reason);
                return ConversionResult::aborted(root, reason);
            }
            Err(e) => {
                let reason = format!("Path {} does not exist: {}", root.display(), e);
                error!("{}", reason);
                progress.finish_with_error(&reason);
                return ConversionResult::aborted(root, reason);
            }
        }

        let mut result = ConversionResult::new(root);
        progress.set_message(&root.display().to_string());

        let entries = WalkDir::new(root).follow_links(false).same_file_system(true);
        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    let path = e.path().unwrap_or(root);
                    error!("Error walking {}: {}", path.display(), e);
                    result.errors += 1;
                    continue;
                }
            };
            let path = entry.path();

            let metadata = match self.converter.stat(path) {
                Ok(metadata) => metadata,
                Err(e) => {
                    error!("{}", e);
                    result.errors += 1;
                    continue;
                }
            };

            if !inodes.insert(metadata.identity) {
                debug!("Skipping already converted {}", path.display());
                result.hard_links += 1;
                continue;
            }

            match self.converter.convert(path, &metadata) {
                Ok(converted) => result.warnings += converted.warnings,
                Err(e) if e.is_fatal() => {
                    error!("{}", e);
                    result.errors += 1;
                    result.status = WalkStatus::Aborted {
                        reason: e.to_string(),
                    };
                    break;
                }
                Err(e) => {
                    error!("{}", e);
                    result.errors += 1;
                    continue;
                }
            }

            result.objects += 1;
            if result.objects % self.progress_interval == 0 {
                progress.set_position(result.objects);
            }
        }

        if result.status == WalkStatus::Complete && result.errors > 0 {
            result.status = WalkStatus::CompletedWithErrors;
        }

        progress.set_position(result.objects);
        let summary = format!(
            "Processed {} files (errors: {})",
            result.objects, result.errors
        );
        if result.is_clean() {
            progress.finish_with_message(&summary);
        } else {
            progress.finish_with_error(&summary);
        }
        info!("{}: {}", root.display(), summary);

        result
    }
}
