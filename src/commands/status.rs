// src/commands/status.rs
//! `privconvert status` command

use anyhow::Result;
use privconvert::container::StorageSource;
use privconvert::{ConversionTarget, IdShift, Settings};

use super::load_container;

pub fn cmd_status(settings: &Settings, ctid: &str) -> Result<()> {
    let (id, config_path, record) = load_container(settings, ctid)?;

    println!("Container: {}", id);
    println!("Config:    {}", config_path.display());

    let running = settings.runtime_probe().running_evidence(id);
    match &running {
        Some(evidence) => println!("Running:   yes ({})", evidence),
        None => println!("Running:   no"),
    }

    match record.current_target() {
        Some(current) => {
            let next = next_shift(settings, current);
            println!("Mode:      {}", current);
            println!(
                "Convert:   privconvert convert {} {} (ids shifted by {:+})",
                id,
                next.target(),
                next.offset()
            );
        }
        None => println!("Mode:      unknown (no 'unprivileged' flag)"),
    }

    println!();
    if record.storage.is_empty() {
        println!("No storage entries found.");
        return Ok(());
    }
    println!("Storage:");
    for storage in &record.storage {
        let source = match &storage.source {
            StorageSource::Directory => "directory".to_string(),
            StorageSource::Volume { pool, volume } => format!("{}:{}", pool, volume),
        };
        println!("  {:<8} {} ({})", storage.key, storage.path.display(), source);
    }

    Ok(())
}

/// Shift that would convert a container currently in `current`
fn next_shift(settings: &Settings, current: ConversionTarget) -> IdShift {
    settings.id_shift(current).inverse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_next_shift_uses_configured_band() {
        let settings = Settings {
            id_band: 200_000,
            ..Settings::default()
        };

        let next = next_shift(&settings, ConversionTarget::Privileged);
        assert_eq!(next.target(), ConversionTarget::Unprivileged);
        assert_eq!(next.offset(), 200_000);
        assert_eq!(next, settings.id_shift(ConversionTarget::Unprivileged));

        let next = next_shift(&settings, ConversionTarget::Unprivileged);
        assert_eq!(next.target(), ConversionTarget::Privileged);
        assert_eq!(next.offset(), -200_000);
    }
}
