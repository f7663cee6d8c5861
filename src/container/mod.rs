// src/container/mod.rs

//! Proxmox LXC container boundary
//!
//! - `record`: the `/etc/pve/lxc/<id>.conf` config file (storage roots and
//!   the `unprivileged` flag)
//! - `runtime`: detecting whether the container is currently running

mod record;
mod runtime;

pub use record::{
    rewrite_unprivileged, update_unprivileged_flag, ContainerRecord, RecordError, StorageRecord,
    StorageSource, MAX_STORAGE_ENTRIES,
};
pub use runtime::RuntimeProbe;

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::Error;

/// Default directory holding container configs
pub const DEFAULT_CONFIG_DIR: &str = "/etc/pve/lxc";

/// Numeric container id (`pct` VMID)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContainerId(u32);

impl ContainerId {
    pub fn new(id: u32) -> Result<Self, Error> {
        if id == 0 {
            return Err(Error::InvalidContainerId(id.to_string()));
        }
        Ok(Self(id))
    }

    pub fn as_u32(&self) -> u32 {
        self.0
    }

    /// `<config_dir>/<id>.conf`
    pub fn config_path(&self, config_dir: &Path) -> PathBuf {
        config_dir.join(format!("{}.conf", self.0))
    }
}

impl fmt::Display for ContainerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ContainerId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let id = s
            .trim()
            .parse::<u32>()
            .map_err(|_| Error::InvalidContainerId(s.to_string()))?;
        Self::new(id)
    }
}
