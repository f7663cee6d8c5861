// src/filesystem/converter.rs

//! Per-object ownership conversion
//!
//! For one filesystem object:
//! 1. shift uid and gid (refusing ids outside the expected band)
//! 2. `lchown` to the new ids
//! 3. restore the mode, since chown may clear setuid/setgid
//! 4. shift the access ACL, and the default ACL for directories
//!
//! Steps 3 and 4 are skipped for symlinks. Their failures are warnings.

use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;

use super::acl::{shift_acl, AclClass, AclOutcome};
use super::backend::{FsBackend, ObjectMetadata};
use crate::idmap::{IdShift, ShiftError};

/// Failure converting a single object
#[derive(Error, Debug)]
pub enum ObjectError {
    #[error("error stating {path}: {source}")]
    Stat { path: PathBuf, source: io::Error },

    #[error("{path}: {source}")]
    OutOfBand { path: PathBuf, source: ShiftError },

    #[error("error changing ownership of {path}: {source}")]
    Chown { path: PathBuf, source: io::Error },
}

impl ObjectError {
    /// Out-of-band ids mean the whole tree is in the wrong starting state
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::OutOfBand { .. })
    }
}

/// What happened to a converted object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConvertedObject {
    pub uid: u32,
    pub gid: u32,
    /// ACL entries rewritten across both classes
    pub acl_entries: usize,
    /// Mode-restore and ACL failures (not counted as errors)
    pub warnings: u64,
}

/// Applies one [`IdShift`] to individual objects
pub struct ObjectConverter<'a, B: FsBackend + ?Sized> {
    backend: &'a B,
    shift: IdShift,
}

impl<'a, B: FsBackend + ?Sized> ObjectConverter<'a, B> {
    pub fn new(backend: &'a B, shift: IdShift) -> Self {
        Self { backend, shift }
    }

    pub fn shift(&self) -> &IdShift {
        &self.shift
    }

    /// Fresh non-following stat of `path`
    pub fn stat(&self, path: &Path) -> Result<ObjectMetadata, ObjectError> {
        self.backend
            .lstat(path)
            .map_err(|source| ObjectError::Stat {
                path: path.to_path_buf(),
                source,
            })
    }

    /// Convert an object whose metadata was just read
    pub fn convert(
        &self,
        path: &Path,
        metadata: &ObjectMetadata,
    ) -> Result<ConvertedObject, ObjectError> {
        let out_of_band = |source: ShiftError| ObjectError::OutOfBand {
            path: path.to_path_buf(),
            source,
        };
        let uid = self.shift.apply(metadata.uid).map_err(out_of_band)?;
        let gid = self.shift.apply(metadata.gid).map_err(out_of_band)?;

        self.backend
            .lchown(path, uid, gid)
            .map_err(|source| ObjectError::Chown {
                path: path.to_path_buf(),
                source,
            })?;

        let mut converted = ConvertedObject {
            uid,
            gid,
            acl_entries: 0,
            warnings: 0,
        };

        if metadata.is_symlink() {
            return Ok(converted);
        }

        let mode = metadata.permission_bits();
        if let Err(e) = self.backend.chmod(path, mode) {
            warn!(
                "Could not restore mode {:o} for {}: {}",
                mode,
                path.display(),
                e
            );
            converted.warnings += 1;
        }

        self.shift_acl_class(path, AclClass::Access, &mut converted);
        if metadata.is_dir() {
            self.shift_acl_class(path, AclClass::Default, &mut converted);
        }

        Ok(converted)
    }

    fn shift_acl_class(&self, path: &Path, class: AclClass, converted: &mut ConvertedObject) {
        match shift_acl(self.backend, path, class, &self.shift) {
            Ok(AclOutcome::Changed(entries)) => converted.acl_entries += entries,
            Ok(AclOutcome::Unchanged) => {}
            Err(e) if e.is_unsupported() => {}
            Err(e) => {
                warn!("Could not update {} ACL for {}: {}", class, path.display(), e);
                converted.warnings += 1;
            }
        }
    }
}
