// src/filesystem/backend.rs

//! Syscall boundary for conversions
//!
//! The converter never touches the filesystem directly. It goes through
//! [`FsBackend`], which the host implementation maps onto `lstat`, `lchown`,
//! `chmod` and the `system.posix_acl_*` extended attributes.

use std::fs;
use std::io;
use std::os::unix::fs::{FileTypeExt, MetadataExt, PermissionsExt};
use std::path::Path;

use super::acl::{AclClass, AclEntrySet, AclError};

/// (device, inode) pair naming one filesystem object across all its hard links
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectIdentity {
    pub dev: u64,
    pub ino: u64,
}

/// Object type as seen by a non-following stat
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    Regular,
    Directory,
    Symlink,
    /// Devices, fifos and sockets
    Other,
}

impl ObjectKind {
    fn from_file_type(file_type: fs::FileType) -> Self {
        if file_type.is_symlink() {
            Self::Symlink
        } else if file_type.is_dir() {
            Self::Directory
        } else if file_type.is_file() {
            Self::Regular
        } else {
            debug_assert!(
                file_type.is_block_device()
                    || file_type.is_char_device()
                    || file_type.is_fifo()
                    || file_type.is_socket()
            );
            Self::Other
        }
    }
}

/// Snapshot of one object at visit time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjectMetadata {
    pub identity: ObjectIdentity,
    pub kind: ObjectKind,
    pub uid: u32,
    pub gid: u32,
    /// Full `st_mode`, file type bits included
    pub mode: u32,
}

impl ObjectMetadata {
    pub fn from_std(metadata: &fs::Metadata) -> Self {
        Self {
            identity: ObjectIdentity {
                dev: metadata.dev(),
                ino: metadata.ino(),
            },
            kind: ObjectKind::from_file_type(metadata.file_type()),
            uid: metadata.uid(),
            gid: metadata.gid(),
            mode: metadata.mode(),
        }
    }

    /// Permission bits including setuid, setgid and sticky
    pub fn permission_bits(&self) -> u32 {
        self.mode & 0o7777
    }

    pub fn is_symlink(&self) -> bool {
        self.kind == ObjectKind::Symlink
    }

    pub fn is_dir(&self) -> bool {
        self.kind == ObjectKind::Directory
    }
}

/// Operations a conversion needs from the filesystem
///
/// `read_acl` returns `Ok(None)` when the object has no extended ACL of the
/// requested class, and `Err(AclError::Unsupported)` when the filesystem has
/// no ACL support at all.
pub trait FsBackend {
    /// Stat without following symlinks
    fn lstat(&self, path: &Path) -> io::Result<ObjectMetadata>;

    /// Change ownership without following symlinks
    fn lchown(&self, path: &Path, uid: u32, gid: u32) -> io::Result<()>;

    /// Set permission bits (never called on symlinks)
    fn chmod(&self, path: &Path, mode: u32) -> io::Result<()>;

    fn read_acl(&self, path: &Path, class: AclClass) -> Result<Option<AclEntrySet>, AclError>;

    fn write_acl(&self, path: &Path, class: AclClass, acl: &AclEntrySet) -> Result<(), AclError>;
}

/// Backend operating on the real host filesystem
#[derive(Debug, Default, Clone, Copy)]
pub struct HostFs;

impl HostFs {
    pub fn new() -> Self {
        Self
    }
}

impl FsBackend for HostFs {
    fn lstat(&self, path: &Path) -> io::Result<ObjectMetadata> {
        fs::symlink_metadata(path).map(|m| ObjectMetadata::from_std(&m))
    }

    fn lchown(&self, path: &Path, uid: u32, gid: u32) -> io::Result<()> {
        std::os::unix::fs::lchown(path, Some(uid), Some(gid))
    }

    fn chmod(&self, path: &Path, mode: u32) -> io::Result<()> {
        fs::set_permissions(path, fs::Permissions::from_mode(mode))
    }

    fn read_acl(&self, path: &Path, class: AclClass) -> Result<Option<AclEntrySet>, AclError> {
        // xattr::get does not follow symlinks and maps ENODATA to None
        let raw = match xattr::get(path, class.xattr_name()) {
            Ok(raw) => raw,
            Err(e) if is_unsupported(&e) => {
                return Err(AclError::Unsupported {
                    path: path.to_path_buf(),
                });
            }
            Err(source) => {
                return Err(AclError::Io {
                    op: "read",
                    class,
                    path: path.to_path_buf(),
                    source,
                });
            }
        };

        match raw {
            None => Ok(None),
            Some(bytes) => AclEntrySet::decode(&bytes)
                .map(Some)
                .map_err(|source| AclError::Malformed {
                    class,
                    path: path.to_path_buf(),
                    source,
                }),
        }
    }

    fn write_acl(&self, path: &Path, class: AclClass, acl: &AclEntrySet) -> Result<(), AclError> {
        let bytes = acl.encode();
        xattr::set(path, class.xattr_name(), &bytes).map_err(|source| {
            if is_unsupported(&source) {
                AclError::Unsupported {
                    path: path.to_path_buf(),
                }
            } else {
                AclError::Io {
                    op: "write",
                    class,
                    path: path.to_path_buf(),
                    source,
                }
            }
        })
    }
}

/// True for errno values meaning "this filesystem has no ACLs"
pub(crate) fn is_unsupported(err: &io::Error) -> bool {
    matches!(
        err.raw_os_error(),
        Some(code) if code == libc::ENOTSUP || code == libc::EOPNOTSUPP || code == libc::ENOSYS
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_lstat_kinds() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("file");
        let link = temp_dir.path().join("link");
        fs::write(&file, b"data").unwrap();
        std::os::unix::fs::symlink(&file, &link).unwrap();

        let fs = HostFs::new();
        assert_eq!(fs.lstat(temp_dir.path()).unwrap().kind, ObjectKind::Directory);
        assert_eq!(fs.lstat(&file).unwrap().kind, ObjectKind::Regular);

        let link_meta = fs.lstat(&link).unwrap();
        assert!(link_meta.is_symlink());
        assert_ne!(link_meta.identity, fs.lstat(&file).unwrap().identity);
    }

    #[test]
    fn test_hard_links_share_identity() {
        let temp_dir = TempDir::new().unwrap();
        let a = temp_dir.path().join("a");
        let b = temp_dir.path().join("b");
        fs::write(&a, b"data").unwrap();
        fs::hard_link(&a, &b).unwrap();

        let fs = HostFs::new();
        assert_eq!(fs.lstat(&a).unwrap().identity, fs.lstat(&b).unwrap().identity);
    }

    #[test]
    fn test_permission_bits_keep_special_bits() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("tool");
        fs::write(&file, b"#!/bin/sh\n").unwrap();
        fs::set_permissions(&file, fs::Permissions::from_mode(0o4755)).unwrap();

        let meta = HostFs::new().lstat(&file).unwrap();
        assert_eq!(meta.permission_bits(), 0o4755);
        assert_ne!(meta.mode, meta.permission_bits());
    }

    #[test]
    fn test_missing_default_acl_reads_as_none() {
        // A fresh directory has no default ACL. Filesystems without ACL
        // support (some tmpfs builds) report Unsupported instead.
        let temp_dir = TempDir::new().unwrap();
        match HostFs::new().read_acl(temp_dir.path(), AclClass::Default) {
            Ok(acl) => assert!(acl.is_none()),
            Err(AclError::Unsupported { .. }) => {}
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_acl_round_trip_on_host() {
        use super::super::acl::{AclEntry, AclTag};

        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("shared");
        fs::write(&file, b"data").unwrap();

        let acl = AclEntrySet::new(vec![
            AclEntry::unnamed(AclTag::UserObj, 6),
            AclEntry::named_user(1000, 4),
            AclEntry::unnamed(AclTag::GroupObj, 4),
            AclEntry::unnamed(AclTag::Mask, 4),
            AclEntry::unnamed(AclTag::Other, 4),
        ]);

        let fs = HostFs::new();
        match fs.write_acl(&file, AclClass::Access, &acl) {
            Ok(()) => {}
            // No ACL support, or not allowed to set one here
            Err(AclError::Unsupported { .. }) | Err(AclError::Io { .. }) => return,
            Err(other) => panic!("unexpected error: {other}"),
        }
        assert_eq!(fs.read_acl(&file, AclClass::Access).unwrap(), Some(acl));
    }

    #[test]
    fn test_unsupported_errno_detection() {
        assert!(is_unsupported(&io::Error::from_raw_os_error(libc::EOPNOTSUPP)));
        assert!(is_unsupported(&io::Error::from_raw_os_error(libc::ENOSYS)));
        assert!(!is_unsupported(&io::Error::from_raw_os_error(libc::EACCES)));
    }
}
