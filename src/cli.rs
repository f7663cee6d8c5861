// src/cli.rs
//! CLI definitions for privconvert
//!
//! The command implementations live in the `commands` module.

use clap::builder::{PossibleValuesParser, TypedValueParser};
use clap::{Parser, Subcommand};
use clap_complete::Shell;
use privconvert::ConversionTarget;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "privconvert")]
#[command(version)]
#[command(about = "Convert Proxmox LXC containers between privileged and unprivileged mode", long_about = None)]
pub struct Cli {
    /// Settings file (default: /etc/privconvert.toml)
    #[arg(long, global = true)]
    pub settings: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Shift container storage ownership and update the config
    ///
    /// The container must be stopped. The config flag is only updated when
    /// every storage root converted without errors.
    Convert {
        /// Container id
        ctid: String,

        /// Mode to convert into
        #[arg(value_parser = target_parser())]
        target: ConversionTarget,

        /// Do not ask for confirmation
        #[arg(short, long)]
        yes: bool,

        /// Show what would be converted without changing anything
        #[arg(long)]
        dry_run: bool,
    },

    /// Show the container's current mode and storage roots
    Status {
        /// Container id
        ctid: String,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// `privileged` or `unprivileged`, parsed through `ConversionTarget::from_str`
fn target_parser() -> impl TypedValueParser<Value = ConversionTarget> {
    PossibleValuesParser::new(["privileged", "unprivileged"])
        .try_map(|value| value.parse::<ConversionTarget>())
}
