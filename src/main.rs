// src/main.rs

use anyhow::Result;
use clap::{CommandFactory, Parser};
use privconvert::Settings;

mod cli;
mod commands;

use cli::{Cli, Commands};

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_target(false)
        .init();

    match cli.command {
        Commands::Completions { shell } => {
            clap_complete::generate(
                shell,
                &mut Cli::command(),
                "privconvert",
                &mut std::io::stdout(),
            );
            Ok(())
        }
        Commands::Convert {
            ctid,
            target,
            yes,
            dry_run,
        } => {
            let settings = Settings::load(cli.settings.as_deref())?;
            commands::cmd_convert(
                &settings,
                &ctid,
                target,
                commands::ConvertOptions { yes, dry_run },
            )
        }
        Commands::Status { ctid } => {
            let settings = Settings::load(cli.settings.as_deref())?;
            commands::cmd_status(&settings, &ctid)
        }
    }
}
