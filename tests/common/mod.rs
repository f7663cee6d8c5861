// tests/common/mod.rs

//! Shared test utilities and helpers for integration tests.
//!
//! `OverlayFs` walks a real temporary tree but keeps ownership and ACLs in
//! memory, so conversions can be exercised without root.

#![allow(dead_code)]

use privconvert::filesystem::{
    AclClass, AclEntrySet, AclError, FsBackend, InodeSet, ObjectIdentity, ObjectKind,
    ObjectMetadata,
};
use privconvert::{ConversionResult, IdShift, SilentProgress, TreeWalker};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::io;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tempfile::TempDir;

/// A recorded backend call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Chown { path: PathBuf, uid: u32, gid: u32 },
    Chmod { path: PathBuf, mode: u32 },
    ReadAcl { path: PathBuf, class: AclClass },
    WriteAcl { path: PathBuf, class: AclClass },
}

impl Call {
    pub fn path(&self) -> &Path {
        match self {
            Call::Chown { path, .. }
            | Call::Chmod { path, .. }
            | Call::ReadAcl { path, .. }
            | Call::WriteAcl { path, .. } => path,
        }
    }

    pub fn is_acl(&self) -> bool {
        matches!(self, Call::ReadAcl { .. } | Call::WriteAcl { .. })
    }
}

#[derive(Default)]
struct OverlayState {
    owners: HashMap<ObjectIdentity, (u32, u32)>,
    acls: HashMap<(ObjectIdentity, AclClass), AclEntrySet>,
    calls: Vec<Call>,
    fail_chown: HashSet<PathBuf>,
    fail_acl_write: HashSet<PathBuf>,
}

/// Real tree structure, in-memory ownership and ACLs
pub struct OverlayFs {
    default_owner: (u32, u32),
    acl_supported: bool,
    state: Mutex<OverlayState>,
}

impl OverlayFs {
    /// Every object starts out owned by `uid:gid`
    pub fn new(uid: u32, gid: u32) -> Self {
        Self {
            default_owner: (uid, gid),
            acl_supported: true,
            state: Mutex::new(OverlayState::default()),
        }
    }

    /// Behave like a filesystem mounted without ACL support
    pub fn without_acls(mut self) -> Self {
        self.acl_supported = false;
        self
    }

    fn identity(path: &Path) -> ObjectIdentity {
        let meta = fs::symlink_metadata(path).unwrap();
        ObjectMetadata::from_std(&meta).identity
    }

    pub fn set_owner(&self, path: &Path, uid: u32, gid: u32) {
        let id = Self::identity(path);
        self.state.lock().unwrap().owners.insert(id, (uid, gid));
    }

    pub fn owner(&self, path: &Path) -> (u32, u32) {
        let id = Self::identity(path);
        self.state
            .lock()
            .unwrap()
            .owners
            .get(&id)
            .copied()
            .unwrap_or(self.default_owner)
    }

    pub fn set_acl(&self, path: &Path, class: AclClass, acl: AclEntrySet) {
        let id = Self::identity(path);
        self.state.lock().unwrap().acls.insert((id, class), acl);
    }

    pub fn acl(&self, path: &Path, class: AclClass) -> Option<AclEntrySet> {
        let id = Self::identity(path);
        self.state.lock().unwrap().acls.get(&(id, class)).cloned()
    }

    pub fn fail_chown(&self, path: &Path) {
        self.state.lock().unwrap().fail_chown.insert(path.to_path_buf());
    }

    pub fn fail_acl_write(&self, path: &Path) {
        self.state
            .lock()
            .unwrap()
            .fail_acl_write
            .insert(path.to_path_buf());
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn calls_for(&self, path: &Path) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|call| call.path() == path)
            .collect()
    }

    pub fn chown_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, Call::Chown { .. }))
            .count()
    }
}

impl FsBackend for OverlayFs {
    fn lstat(&self, path: &Path) -> io::Result<ObjectMetadata> {
        let mut meta = ObjectMetadata::from_std(&fs::symlink_metadata(path)?);
        let state = self.state.lock().unwrap();
        let (uid, gid) = state
            .owners
            .get(&meta.identity)
            .copied()
            .unwrap_or(self.default_owner);
        meta.uid = uid;
        meta.gid = gid;
        Ok(meta)
    }

    fn lchown(&self, path: &Path, uid: u32, gid: u32) -> io::Result<()> {
        let meta = fs::symlink_metadata(path)?;
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::Chown {
            path: path.to_path_buf(),
            uid,
            gid,
        });
        if state.fail_chown.contains(path) {
            return Err(io::Error::from_raw_os_error(libc::EPERM));
        }

        // chown(2) clears setuid/setgid on regular files
        if meta.file_type().is_file() {
            let mode = meta.permissions().mode() & !0o6000;
            fs::set_permissions(path, fs::Permissions::from_mode(mode))?;
        }

        let id = ObjectMetadata::from_std(&meta).identity;
        state.owners.insert(id, (uid, gid));
        Ok(())
    }

    fn chmod(&self, path: &Path, mode: u32) -> io::Result<()> {
        self.state.lock().unwrap().calls.push(Call::Chmod {
            path: path.to_path_buf(),
            mode,
        });
        fs::set_permissions(path, fs::Permissions::from_mode(mode))
    }

    fn read_acl(&self, path: &Path, class: AclClass) -> Result<Option<AclEntrySet>, AclError> {
        let id = Self::identity(path);
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::ReadAcl {
            path: path.to_path_buf(),
            class,
        });
        if !self.acl_supported {
            return Err(AclError::Unsupported {
                path: path.to_path_buf(),
            });
        }
        Ok(state.acls.get(&(id, class)).cloned())
    }

    fn write_acl(&self, path: &Path, class: AclClass, acl: &AclEntrySet) -> Result<(), AclError> {
        let id = Self::identity(path);
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::WriteAcl {
            path: path.to_path_buf(),
            class,
        });
        if state.fail_acl_write.contains(path) {
            return Err(AclError::Io {
                op: "write",
                class,
                path: path.to_path_buf(),
                source: io::Error::from_raw_os_error(libc::EIO),
            });
        }
        state.acls.insert((id, class), acl.clone());
        Ok(())
    }
}

/// Build a small container rootfs:
///
/// ```text
/// root/
///   etc/passwd
///   usr/bin/tool        (mode 4755)
///   home/user/notes
///   link -> etc/passwd
/// ```
pub fn create_rootfs(temp_dir: &TempDir, name: &str) -> PathBuf {
    let root = temp_dir.path().join(name);
    fs::create_dir_all(root.join("etc")).unwrap();
    fs::create_dir_all(root.join("usr/bin")).unwrap();
    fs::create_dir_all(root.join("home/user")).unwrap();

    fs::write(root.join("etc/passwd"), "root:x:0:0::/root:/bin/sh\n").unwrap();
    fs::write(root.join("usr/bin/tool"), "#!/bin/sh\n").unwrap();
    fs::set_permissions(root.join("usr/bin/tool"), fs::Permissions::from_mode(0o4755)).unwrap();
    fs::write(root.join("home/user/notes"), "notes").unwrap();
    std::os::unix::fs::symlink("etc/passwd", root.join("link")).unwrap();

    root
}

/// Number of objects `create_rootfs` creates, root included
pub const ROOTFS_OBJECTS: u64 = 10;

/// Walk a single root with a fresh inode set and no progress output
pub fn walk_root<B: FsBackend>(backend: &B, shift: IdShift, root: &Path) -> ConversionResult {
    TreeWalker::new(backend, shift).walk(root, &mut InodeSet::new(), &SilentProgress::new())
}

/// Object kind of `path` without following symlinks
pub fn kind_of(path: &Path) -> ObjectKind {
    ObjectMetadata::from_std(&fs::symlink_metadata(path).unwrap()).kind
}

/// Write a container config and return its path
pub fn write_config(temp_dir: &TempDir, ctid: u32, contents: &str) -> PathBuf {
    let dir = temp_dir.path().join("lxc");
    fs::create_dir_all(&dir).unwrap();
    let path = dir.join(format!("{}.conf", ctid));
    fs::write(&path, contents).unwrap();
    path
}
