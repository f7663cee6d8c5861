// src/error.rs

//! Crate-wide error type
//!
//! Module-local errors (`ShiftError`, `AclError`, `RecordError`,
//! `SettingsError`) convert into [`Error`] so library callers only deal with
//! one type at the boundary.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

use crate::container::RecordError;
use crate::filesystem::AclError;
use crate::idmap::ShiftError;
use crate::settings::SettingsError;

/// Errors returned by the privconvert library
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error on {path}: {source}")]
    Io { path: PathBuf, source: io::Error },

    #[error(transparent)]
    Shift(#[from] ShiftError),

    #[error(transparent)]
    Acl(#[from] AclError),

    #[error(transparent)]
    Record(#[from] RecordError),

    #[error(transparent)]
    Settings(#[from] SettingsError),

    #[error("Invalid container id: {0}")]
    InvalidContainerId(String),

    #[error("Invalid conversion target: {0} (expected 'privileged' or 'unprivileged')")]
    InvalidTarget(String),
}

impl Error {
    /// Wrap an I/O error together with the path it happened on
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result type alias using the crate error
pub type Result<T> = std::result::Result<T, Error>;
