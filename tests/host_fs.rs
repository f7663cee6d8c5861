// tests/host_fs.rs
//! Conversion against the real host filesystem
//!
//! Changing ownership needs root, so these tests return early otherwise.

mod common;

use common::{create_rootfs, walk_root, ROOTFS_OBJECTS};
use privconvert::filesystem::{AclClass, FsBackend};
use privconvert::{ConversionTarget, HostFs, IdShift};
use std::fs;
use std::os::unix::fs::{MetadataExt, PermissionsExt};
use tempfile::TempDir;

fn is_root() -> bool {
    nix::unistd::geteuid().is_root()
}

#[test]
fn test_host_round_trip() {
    if !is_root() {
        eprintln!("skipping: requires root");
        return;
    }

    let temp_dir = TempDir::new().unwrap();
    let root = create_rootfs(&temp_dir, "rootfs");
    for entry in walkdir::WalkDir::new(&root) {
        let entry = entry.unwrap();
        std::os::unix::fs::lchown(entry.path(), Some(0), Some(0)).unwrap();
    }
    fs::set_permissions(root.join("usr/bin/tool"), fs::Permissions::from_mode(0o4755)).unwrap();

    let backend = HostFs::new();
    let up = IdShift::with_defaults(ConversionTarget::Unprivileged);
    let result = walk_root(&backend, up, &root);
    assert!(result.is_clean(), "{:?}", result);
    assert_eq!(result.objects, ROOTFS_OBJECTS);

    let tool = fs::symlink_metadata(root.join("usr/bin/tool")).unwrap();
    assert_eq!((tool.uid(), tool.gid()), (100_000, 100_000));
    assert_eq!(tool.mode() & 0o7777, 0o4755);
    let link = fs::symlink_metadata(root.join("link")).unwrap();
    assert_eq!(link.uid(), 100_000);

    let result = walk_root(&backend, up.inverse(), &root);
    assert!(result.is_clean(), "{:?}", result);
    let passwd = fs::symlink_metadata(root.join("etc/passwd")).unwrap();
    assert_eq!((passwd.uid(), passwd.gid()), (0, 0));
}

#[test]
fn test_host_read_acl_without_extended_acl() {
    let temp_dir = TempDir::new().unwrap();
    let file = temp_dir.path().join("plain");
    fs::write(&file, "x").unwrap();

    // Either no ACL or a filesystem without ACL support
    match HostFs::new().read_acl(&file, AclClass::Access) {
        Ok(acl) => assert!(acl.is_none()),
        Err(e) => assert!(e.is_unsupported(), "{}", e),
    }
}
