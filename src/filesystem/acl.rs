// src/filesystem/acl.rs

//! POSIX ACL id shifting
//!
//! Linux stores POSIX ACLs in the `system.posix_acl_access` and
//! `system.posix_acl_default` extended attributes:
//!
//! ```text
//! header: version u32 (= 2)
//! entry:  tag u16 | perm u16 | id u32     (repeated, little-endian)
//! ```
//!
//! Only named-user and named-group entries carry a meaningful id. Owner,
//! owning group, mask and other entries use `ACL_UNDEFINED_ID` and are never
//! touched, nor is any permission field.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

use super::backend::FsBackend;
use crate::idmap::{IdShift, ShiftError};

const ACL_XATTR_VERSION: u32 = 0x0002;
const ACL_HEADER_SIZE: usize = 4;
const ACL_ENTRY_SIZE: usize = 8;

/// Id stored in entries that do not name a user or group
pub const ACL_UNDEFINED_ID: u32 = u32::MAX;

/// Which ACL of an object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AclClass {
    /// Applies to the object itself
    Access,
    /// Inherited by new children (directories only)
    Default,
}

impl AclClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Access => "access",
            Self::Default => "default",
        }
    }

    /// Extended attribute backing this class
    pub fn xattr_name(&self) -> &'static str {
        match self {
            Self::Access => "system.posix_acl_access",
            Self::Default => "system.posix_acl_default",
        }
    }
}

impl fmt::Display for AclClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// ACL entry tag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AclTag {
    UserObj,
    User,
    GroupObj,
    Group,
    Mask,
    Other,
    /// Tag this tool does not know; preserved verbatim
    Unknown(u16),
}

impl AclTag {
    pub fn from_raw(raw: u16) -> Self {
        match raw {
            0x01 => Self::UserObj,
            0x02 => Self::User,
            0x04 => Self::GroupObj,
            0x08 => Self::Group,
            0x10 => Self::Mask,
            0x20 => Self::Other,
            other => Self::Unknown(other),
        }
    }

    pub fn to_raw(self) -> u16 {
        match self {
            Self::UserObj => 0x01,
            Self::User => 0x02,
            Self::GroupObj => 0x04,
            Self::Group => 0x08,
            Self::Mask => 0x10,
            Self::Other => 0x20,
            Self::Unknown(raw) => raw,
        }
    }

    /// Named-user and named-group entries are the only ones with an id
    pub fn is_named(self) -> bool {
        matches!(self, Self::User | Self::Group)
    }
}

/// One ACL entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AclEntry {
    pub tag: AclTag,
    pub perm: u16,
    pub id: u32,
}

impl AclEntry {
    pub fn named_user(uid: u32, perm: u16) -> Self {
        Self {
            tag: AclTag::User,
            perm,
            id: uid,
        }
    }

    pub fn named_group(gid: u32, perm: u16) -> Self {
        Self {
            tag: AclTag::Group,
            perm,
            id: gid,
        }
    }

    /// Entry without a qualifier (owner, owning group, mask, other)
    pub fn unnamed(tag: AclTag, perm: u16) -> Self {
        Self {
            tag,
            perm,
            id: ACL_UNDEFINED_ID,
        }
    }

    /// Numeric id for named entries
    pub fn qualifier(&self) -> Option<u32> {
        self.tag.is_named().then_some(self.id)
    }
}

/// ACL attribute bytes that cannot be decoded
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AclFormatError {
    #[error("unsupported ACL xattr version {0}")]
    Version(u32),

    #[error("ACL xattr length {0} is not a header followed by whole entries")]
    Length(usize),
}

/// Ordered ACL entries for one (path, class)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AclEntrySet {
    entries: Vec<AclEntry>,
}

impl AclEntrySet {
    pub fn new(entries: Vec<AclEntry>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[AclEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Decode the `system.posix_acl_*` xattr representation
    pub fn decode(bytes: &[u8]) -> Result<Self, AclFormatError> {
        if bytes.len() < ACL_HEADER_SIZE || (bytes.len() - ACL_HEADER_SIZE) % ACL_ENTRY_SIZE != 0 {
            return Err(AclFormatError::Length(bytes.len()));
        }

        let version = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        if version != ACL_XATTR_VERSION {
            return Err(AclFormatError::Version(version));
        }

        let entries = bytes[ACL_HEADER_SIZE..]
            .chunks_exact(ACL_ENTRY_SIZE)
            .map(|chunk| AclEntry {
                tag: AclTag::from_raw(u16::from_le_bytes([chunk[0], chunk[1]])),
                perm: u16::from_le_bytes([chunk[2], chunk[3]]),
                id: u32::from_le_bytes([chunk[4], chunk[5], chunk[6], chunk[7]]),
            })
            .collect();

        Ok(Self { entries })
    }

    /// Encode back into the xattr representation
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(ACL_HEADER_SIZE + self.entries.len() * ACL_ENTRY_SIZE);
        out.extend_from_slice(&ACL_XATTR_VERSION.to_le_bytes());
        for entry in &self.entries {
            out.extend_from_slice(&entry.tag.to_raw().to_le_bytes());
            out.extend_from_slice(&entry.perm.to_le_bytes());
            out.extend_from_slice(&entry.id.to_le_bytes());
        }
        out
    }

    /// Shift every named entry id, returning how many entries changed
    ///
    /// All new ids are computed before any entry is modified, so a rejected
    /// id leaves the set exactly as it was.
    pub fn shift_named(&mut self, shift: &IdShift) -> Result<usize, ShiftError> {
        let mut shifted = Vec::new();
        for (index, entry) in self.entries.iter().enumerate() {
            if entry.tag.is_named() {
                shifted.push((index, shift.apply(entry.id)?));
            }
        }

        let mut changed = 0;
        for (index, new_id) in shifted {
            let entry = &mut self.entries[index];
            if entry.id != new_id {
                entry.id = new_id;
                changed += 1;
            }
        }
        Ok(changed)
    }
}

/// ACL read/shift/write failures
#[derive(Error, Debug)]
pub enum AclError {
    #[error("ACLs not supported on {path}")]
    Unsupported { path: PathBuf },

    #[error("failed to {op} {class} ACL of {path}: {source}")]
    Io {
        op: &'static str,
        class: AclClass,
        path: PathBuf,
        source: io::Error,
    },

    #[error("malformed {class} ACL on {path}: {source}")]
    Malformed {
        class: AclClass,
        path: PathBuf,
        source: AclFormatError,
    },

    #[error("cannot shift {class} ACL of {path}: {source}")]
    Shift {
        class: AclClass,
        path: PathBuf,
        source: ShiftError,
    },
}

impl AclError {
    pub fn is_unsupported(&self) -> bool {
        matches!(self, Self::Unsupported { .. })
    }
}

/// Result of shifting one ACL
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AclOutcome {
    /// ACL rewritten with this many entries shifted
    Changed(usize),
    /// Nothing to shift, nothing written
    Unchanged,
}

/// Shift the named entries of one ACL and write it back if anything changed
///
/// A filesystem without ACL support and an object without an extended ACL
/// both report `Unchanged`.
pub fn shift_acl<B: FsBackend + ?Sized>(
    backend: &B,
    path: &Path,
    class: AclClass,
    shift: &IdShift,
) -> Result<AclOutcome, AclError> {
    let mut acl = match backend.read_acl(path, class) {
        Ok(Some(acl)) => acl,
        Ok(None) => return Ok(AclOutcome::Unchanged),
        Err(e) if e.is_unsupported() => {
            debug!("No ACL support for {}", path.display());
            return Ok(AclOutcome::Unchanged);
        }
        Err(e) => return Err(e),
    };

    let changed = acl.shift_named(shift).map_err(|source| AclError::Shift {
        class,
        path: path.to_path_buf(),
        source,
    })?;

    if changed == 0 {
        return Ok(AclOutcome::Unchanged);
    }

    backend.write_acl(path, class, &acl)?;
    debug!(
        "Shifted {} {} ACL entries on {}",
        changed,
        class,
        path.display()
    );
    Ok(AclOutcome::Changed(changed))
}
