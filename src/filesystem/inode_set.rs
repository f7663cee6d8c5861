// src/filesystem/inode_set.rs

//! Hard-link deduplication
//!
//! Every directory entry of a hard-linked file points at the same inode.
//! Converting each entry would shift the inode's ownership once per link, so
//! a walk records every (device, inode) it converts and skips repeats.

use std::collections::HashSet;

use super::backend::ObjectIdentity;

/// Set of objects already converted during one walk
#[derive(Debug, Default)]
pub struct InodeSet {
    seen: HashSet<ObjectIdentity>,
}

impl InodeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seen(&self, identity: ObjectIdentity) -> bool {
        self.seen.contains(&identity)
    }

    /// Record an object as converted (idempotent)
    pub fn mark(&mut self, identity: ObjectIdentity) {
        self.seen.insert(identity);
    }

    /// Mark and report whether this is the first visit
    pub fn insert(&mut self, identity: ObjectIdentity) -> bool {
        self.seen.insert(identity)
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(dev: u64, ino: u64) -> ObjectIdentity {
        ObjectIdentity { dev, ino }
    }

    #[test]
    fn test_seen_and_mark() {
        let mut set = InodeSet::new();
        assert!(!set.seen(id(1, 42)));

        set.mark(id(1, 42));
        assert!(set.seen(id(1, 42)));

        set.mark(id(1, 42));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_device_is_part_of_identity() {
        let mut set = InodeSet::new();
        assert!(set.insert(id(1, 42)));
        assert!(!set.insert(id(1, 42)));
        assert!(set.insert(id(2, 42)));
        // dev ^ ino collides for these two, identity must not
        assert!(set.insert(id(3, 0)));
        assert!(set.insert(id(0, 3)));
        assert_eq!(set.len(), 4);
    }

    #[test]
    fn test_large_population() {
        let mut set = InodeSet::new();
        for ino in 0..300_000 {
            set.mark(id(7, ino));
        }
        assert_eq!(set.len(), 300_000);
        assert!(set.seen(id(7, 299_999)));
        assert!(!set.seen(id(8, 0)));
    }
}
