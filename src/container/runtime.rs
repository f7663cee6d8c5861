// src/container/runtime.rs

//! Running-container detection
//!
//! Converting a live container would race with its processes creating and
//! chowning files. Several signals are checked because cgroup layouts differ
//! between cgroup v1 and v2 hosts.

use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::debug;

use super::ContainerId;

/// Probes the host for signs that a container is running
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeProbe {
    cgroup_root: PathBuf,
    lock_root: PathBuf,
    query_pct: bool,
}

impl Default for RuntimeProbe {
    fn default() -> Self {
        Self {
            cgroup_root: PathBuf::from("/sys/fs/cgroup"),
            lock_root: PathBuf::from("/var/lock/lxc"),
            query_pct: true,
        }
    }
}

impl RuntimeProbe {
    pub fn new(cgroup_root: impl Into<PathBuf>, lock_root: impl Into<PathBuf>, query_pct: bool) -> Self {
        Self {
            cgroup_root: cgroup_root.into(),
            lock_root: lock_root.into(),
            query_pct,
        }
    }

    pub fn is_running(&self, id: ContainerId) -> bool {
        self.running_evidence(id).is_some()
    }

    /// Describe the first signal showing the container as running
    pub fn running_evidence(&self, id: ContainerId) -> Option<String> {
        let cgroup_dirs = [
            // cgroup v2
            self.cgroup_root.join(format!("lxc.monitor.{}", id)),
            // cgroup v1, systemd hierarchy
            self.cgroup_root.join("systemd").join("lxc").join(id.to_string()),
            self.cgroup_root.join("lxc").join(id.to_string()),
        ];
        for dir in &cgroup_dirs {
            if dir.is_dir() {
                return Some(format!("cgroup {} exists", dir.display()));
            }
        }

        if self.query_pct && pct_reports_running(id) {
            return Some("pct status reports running".to_string());
        }

        let lock = self.lock_path(id);
        if lock.exists() {
            return Some(format!("lock file {} exists", lock.display()));
        }

        None
    }

    fn lock_path(&self, id: ContainerId) -> PathBuf {
        let relative = Path::new("var/lib/lxc").join(id.to_string());
        self.lock_root.join(relative)
    }
}

fn pct_reports_running(id: ContainerId) -> bool {
    match Command::new("pct").arg("status").arg(id.to_string()).output() {
        Ok(output) => String::from_utf8_lossy(&output.stdout).contains("status: running"),
        Err(e) => {
            debug!("pct status unavailable: {}", e);
            false
        }
    }
}
