// src/settings.rs

//! Tool settings
//!
//! Everything has a default matching a stock Proxmox host, so the settings
//! file is optional. Example `/etc/privconvert.toml`:
//!
//! ```toml
//! id_band = 100000
//! max_id = 200000
//! config_dir = "/etc/pve/lxc"
//! progress_interval = 1000
//!
//! [runtime]
//! cgroup_root = "/sys/fs/cgroup"
//! lock_root = "/var/lock/lxc"
//! query_pct = true
//! ```

use serde::Deserialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

use crate::container::{ContainerId, RuntimeProbe, DEFAULT_CONFIG_DIR, MAX_STORAGE_ENTRIES};
use crate::filesystem::DEFAULT_PROGRESS_INTERVAL;
use crate::idmap::{ConversionTarget, IdShift, DEFAULT_ID_BAND, DEFAULT_MAX_ID};

/// Settings file errors
#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("Failed to read settings {path}: {source}")]
    Read { path: PathBuf, source: io::Error },

    #[error("Failed to parse settings {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Invalid settings: {0}")]
    Invalid(String),
}

/// Runtime probe configuration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RuntimeSettings {
    pub cgroup_root: PathBuf,
    pub lock_root: PathBuf,
    /// Ask `pct status` as well as checking cgroups and lock files
    pub query_pct: bool,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            cgroup_root: PathBuf::from("/sys/fs/cgroup"),
            lock_root: PathBuf::from("/var/lock/lxc"),
            query_pct: true,
        }
    }
}

/// privconvert settings
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub id_band: u32,
    pub max_id: u32,
    pub config_dir: PathBuf,
    pub progress_interval: u64,
    pub max_storage_entries: usize,
    pub runtime: RuntimeSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            id_band: DEFAULT_ID_BAND,
            max_id: DEFAULT_MAX_ID,
            config_dir: PathBuf::from(DEFAULT_CONFIG_DIR),
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
            max_storage_entries: MAX_STORAGE_ENTRIES,
            runtime: RuntimeSettings::default(),
        }
    }
}

impl Settings {
    pub const DEFAULT_PATH: &'static str = "/etc/privconvert.toml";

    /// Load settings
    ///
    /// An explicit path must exist. Without one, the default path is used if
    /// present and built-in defaults otherwise.
    pub fn load(explicit: Option<&Path>) -> Result<Self, SettingsError> {
        let path = match explicit {
            Some(path) => path,
            None => {
                let default = Path::new(Self::DEFAULT_PATH);
                if !default.exists() {
                    debug!("No settings file at {}, using defaults", default.display());
                    return Ok(Self::default());
                }
                default
            }
        };

        let text = fs::read_to_string(path).map_err(|source| SettingsError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let settings: Self = toml::from_str(&text).map_err(|source| SettingsError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        settings.validate()?;
        debug!("Loaded settings from {}", path.display());
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.id_band == 0 {
            return Err(SettingsError::Invalid("id_band must be positive".to_string()));
        }
        if self.max_id < self.id_band {
            return Err(SettingsError::Invalid(format!(
                "max_id ({}) must not be below id_band ({})",
                self.max_id, self.id_band
            )));
        }
        if self.progress_interval == 0 {
            return Err(SettingsError::Invalid(
                "progress_interval must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn id_shift(&self, target: ConversionTarget) -> IdShift {
        IdShift::new(target, self.id_band, self.max_id)
    }

    pub fn runtime_probe(&self) -> RuntimeProbe {
        RuntimeProbe::new(
            self.runtime.cgroup_root.clone(),
            self.runtime.lock_root.clone(),
            self.runtime.query_pct,
        )
    }

    pub fn config_path(&self, id: ContainerId) -> PathBuf {
        id.config_path(&self.config_dir)
    }
}
