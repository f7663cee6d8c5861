// src/container/record.rs

//! Container config parsing and flag rewrite
//!
//! Only the main section (everything before the first `[snapshot]` header)
//! is read. Storage comes from `rootfs:` and `mpN:` lines, whose first
//! comma-separated field is either an absolute directory or a
//! `<pool>:<volume>` reference mounted at `/<pool>/<volume>`.
//!
//! The rewrite changes a single line (or inserts one) and copies every other
//! byte through. It goes to a sibling temp file that is renamed over the
//! original, so readers see either the old or the new config.

use std::collections::HashSet;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::idmap::ConversionTarget;

/// Limit on distinct storage roots in one config
pub const MAX_STORAGE_ENTRIES: usize = 64;

const FLAG_KEY: &str = "unprivileged:";

/// Config file errors
#[derive(Error, Debug)]
pub enum RecordError {
    #[error("Error opening config file {path}: {source}")]
    Read { path: PathBuf, source: io::Error },

    #[error("Error writing config file {path}: {source}")]
    Write { path: PathBuf, source: io::Error },

    #[error("line {line}: invalid 'unprivileged' value '{value}' (expected 0 or 1)")]
    InvalidFlag { line: usize, value: String },

    #[error("line {line}: could not parse storage specification '{spec}'")]
    InvalidStorageSpec { line: usize, spec: String },

    #[error("too many mount points (limit {limit})")]
    TooManyStorageEntries { limit: usize },
}

/// Where a storage root comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageSource {
    /// Literal absolute directory (bind mount or directory storage)
    Directory,
    /// Pool-relative volume, e.g. a ZFS subvolume
    Volume { pool: String, volume: String },
}

/// One storage entry from the config
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageRecord {
    /// Config key (`rootfs`, `mp0`, ...)
    pub key: String,
    /// Storage specification as written
    pub spec: String,
    pub source: StorageSource,
    /// Absolute root to convert
    pub path: PathBuf,
}

impl StorageRecord {
    /// Resolve a storage specification to its source and absolute root
    ///
    /// ```
    /// use privconvert::container::{StorageRecord, StorageSource};
    /// use std::path::PathBuf;
    ///
    /// let (source, path) = StorageRecord::resolve_spec("tank:subvol-111-disk-0").unwrap();
    /// assert_eq!(path, PathBuf::from("/tank/subvol-111-disk-0"));
    /// assert!(matches!(source, StorageSource::Volume { .. }));
    ///
    /// let (source, path) = StorageRecord::resolve_spec("/srv/data").unwrap();
    /// assert_eq!(source, StorageSource::Directory);
    /// assert_eq!(path, PathBuf::from("/srv/data"));
    ///
    /// assert!(StorageRecord::resolve_spec("no-colon").is_none());
    /// ```
    pub fn resolve_spec(spec: &str) -> Option<(StorageSource, PathBuf)> {
        if spec.starts_with('/') {
            return Some((StorageSource::Directory, PathBuf::from(spec)));
        }

        let (pool, rest) = spec.split_once(':')?;
        let volume = rest.split_whitespace().next()?;
        if pool.is_empty() {
            return None;
        }

        let path = PathBuf::from(format!("/{}/{}", pool, volume));
        Some((
            StorageSource::Volume {
                pool: pool.to_string(),
                volume: volume.to_string(),
            },
            path,
        ))
    }
}

/// Parsed main section of a container config
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerRecord {
    /// `unprivileged:` flag, if present
    pub unprivileged: Option<bool>,
    /// Storage roots in order of first appearance, duplicates removed
    pub storage: Vec<StorageRecord>,
}

impl ContainerRecord {
    pub fn parse(text: &str) -> Result<Self, RecordError> {
        Self::parse_with_limit(text, MAX_STORAGE_ENTRIES)
    }

    pub fn parse_with_limit(text: &str, limit: usize) -> Result<Self, RecordError> {
        let mut record = Self::default();
        let mut seen_paths = HashSet::new();

        for (index, line) in text.lines().enumerate() {
            let line_no = index + 1;

            if line.starts_with('[') {
                break;
            }

            if let Some(value) = line.strip_prefix(FLAG_KEY) {
                if record.unprivileged.is_some() {
                    debug!("Ignoring repeated unprivileged flag on line {}", line_no);
                    continue;
                }
                record.unprivileged = Some(parse_flag(value, line_no)?);
                continue;
            }

            let Some(key) = storage_key(line) else {
                continue;
            };

            let spec = storage_spec(line);
            let (source, path) =
                StorageRecord::resolve_spec(spec).ok_or_else(|| RecordError::InvalidStorageSpec {
                    line: line_no,
                    spec: spec.to_string(),
                })?;

            // Exact string comparison, no path normalization
            if !seen_paths.insert(path.to_string_lossy().into_owned()) {
                debug!("Skipping duplicate storage root {}", path.display());
                continue;
            }
            if record.storage.len() >= limit {
                return Err(RecordError::TooManyStorageEntries { limit });
            }

            record.storage.push(StorageRecord {
                key: key.to_string(),
                spec: spec.to_string(),
                source,
                path,
            });
        }

        if record.unprivileged.is_none() {
            warn!("Could not find 'unprivileged' flag in config");
        }

        Ok(record)
    }

    /// Read and parse a config file
    pub fn load(path: &Path, limit: usize) -> Result<Self, RecordError> {
        let text = fs::read_to_string(path).map_err(|source| RecordError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse_with_limit(&text, limit)
    }

    /// Storage roots to convert, in config order
    pub fn storage_paths(&self) -> Vec<PathBuf> {
        self.storage.iter().map(|s| s.path.clone()).collect()
    }

    /// Current representation according to the flag
    pub fn current_target(&self) -> Option<ConversionTarget> {
        self.unprivileged.map(ConversionTarget::from_unprivileged_flag)
    }
}

fn parse_flag(value: &str, line: usize) -> Result<bool, RecordError> {
    match value.trim() {
        "0" => Ok(false),
        "1" => Ok(true),
        other => Err(RecordError::InvalidFlag {
            line,
            value: other.to_string(),
        }),
    }
}

/// `rootfs` or `mp<digits>` when the line is a storage entry
fn storage_key(line: &str) -> Option<&str> {
    let (key, _) = line.split_once(':')?;
    if key == "rootfs" {
        return Some(key);
    }
    let digits = key.strip_prefix("mp")?;
    if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
        Some(key)
    } else {
        None
    }
}

/// First comma-separated field after the key, whitespace trimmed
fn storage_spec(line: &str) -> &str {
    let value = line.split_once(':').map(|(_, v)| v).unwrap_or("");
    let value = value.trim_start();
    let field = value.split(',').next().unwrap_or("");
    field.trim_end()
}

/// Set the main-section `unprivileged:` flag, leaving everything else as is
///
/// The first flag line before any section header is replaced. Without one, a
/// flag line is inserted right before the first section header, or appended.
pub fn rewrite_unprivileged(text: &str, unprivileged: bool) -> String {
    let flag_line = format!("{} {}", FLAG_KEY, u8::from(unprivileged));
    let mut out = String::with_capacity(text.len() + flag_line.len() + 1);
    let mut written = false;
    let mut in_section = false;

    for line in text.split_inclusive('\n') {
        if !in_section && line.starts_with('[') {
            in_section = true;
            if !written {
                out.push_str(&flag_line);
                out.push('\n');
                written = true;
            }
        } else if !in_section && !written && line.starts_with(FLAG_KEY) {
            let content_len = line.trim_end_matches(['\r', '\n']).len();
            out.push_str(&flag_line);
            out.push_str(&line[content_len..]);
            written = true;
            continue;
        }
        out.push_str(line);
    }

    if !written {
        if !out.is_empty() && !out.ends_with('\n') {
            out.push('\n');
        }
        out.push_str(&flag_line);
        out.push('\n');
    }

    out
}

/// Atomically rewrite the flag in the config file at `path`
///
/// On any failure the temporary file is removed and the original stays
/// untouched.
pub fn update_unprivileged_flag(path: &Path, unprivileged: bool) -> Result<(), RecordError> {
    let write_err = |source: io::Error| RecordError::Write {
        path: path.to_path_buf(),
        source,
    };

    let original = fs::read_to_string(path).map_err(|source| RecordError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let permissions = fs::metadata(path)
        .map_err(|source| RecordError::Read {
            path: path.to_path_buf(),
            source,
        })?
        .permissions();

    let rewritten = rewrite_unprivileged(&original, unprivileged);

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut temp = tempfile::Builder::new()
        .prefix(".privconvert-")
        .suffix(".tmp")
        .tempfile_in(dir)
        .map_err(write_err)?;

    temp.write_all(rewritten.as_bytes()).map_err(write_err)?;
    temp.as_file().sync_all().map_err(write_err)?;

    // pmxcfs rejects chmod; the temp file's default mode is acceptable there
    if let Err(e) = fs::set_permissions(temp.path(), permissions) {
        debug!("Could not copy permissions to {}: {}", temp.path().display(), e);
    }

    temp.persist(path).map_err(|e| write_err(e.error))?;
    info!(
        "Updated {} (unprivileged: {})",
        path.display(),
        u8::from(unprivileged)
    );
    Ok(())
}
