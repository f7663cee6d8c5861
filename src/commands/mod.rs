// src/commands/mod.rs
//! Command handlers for the privconvert CLI

mod convert;
pub mod progress;
mod status;

pub use convert::{cmd_convert, ConvertOptions};
pub use status::cmd_status;

use anyhow::{Context, Result};
use privconvert::{ContainerId, ContainerRecord, Settings};
use std::path::PathBuf;

/// Parse the id and load its config record
fn load_container(settings: &Settings, ctid: &str) -> Result<(ContainerId, PathBuf, ContainerRecord)> {
    let id: ContainerId = ctid.parse()?;
    let config_path = settings.config_path(id);
    let record = ContainerRecord::load(&config_path, settings.max_storage_entries)
        .with_context(|| format!("Failed to load config for container {}", id))?;
    Ok((id, config_path, record))
}
