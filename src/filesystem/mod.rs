// src/filesystem/mod.rs

//! Filesystem side of a conversion
//!
//! This module provides:
//! - A backend trait through which every ownership/ACL syscall is issued
//! - POSIX ACL decoding and id shifting
//! - Hard-link deduplication keyed on (device, inode)
//! - The per-object converter and the tree walker that drives it
//!
//! Everything here is single-threaded and blocking. A walk owns its inode
//! set and counters; nothing is shared between walks.

mod acl;
mod backend;
mod converter;
mod inode_set;
mod walker;

pub use acl::{
    shift_acl, AclClass, AclEntry, AclEntrySet, AclError, AclFormatError, AclOutcome, AclTag,
};
pub use backend::{FsBackend, HostFs, ObjectIdentity, ObjectKind, ObjectMetadata};
pub use converter::{ConvertedObject, ObjectConverter, ObjectError};
pub use inode_set::InodeSet;
pub use walker::{ConversionResult, TreeWalker, WalkStatus, DEFAULT_PROGRESS_INTERVAL};
