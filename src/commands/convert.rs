// src/commands/convert.rs
//! `privconvert convert` command

use anyhow::{bail, Context, Result};
use privconvert::{
    ContainerId, ContainerRecord, ConversionTarget, HostFs, IdShift, LogProgress, Orchestrator,
    OverallResult, ProgressTracker, RunOutcome, Settings, WalkStatus,
};
use std::io::{self, BufRead, IsTerminal, Write};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use super::load_container;
use super::progress::CliProgress;

/// Flags for the convert command
#[derive(Debug, Clone, Copy, Default)]
pub struct ConvertOptions {
    /// Skip the confirmation prompt
    pub yes: bool,
    /// Stop after printing the plan
    pub dry_run: bool,
}

/// Decision reached before anything on disk is touched
#[derive(Debug, Clone, PartialEq, Eq)]
enum Preflight {
    /// Record already carries the target flag
    AlreadyInTarget,
    /// `--dry-run`: plan shown, nothing else
    DryRun(ConversionPlan),
    /// Convert, asking the operator first unless `--yes` was given
    Run { plan: ConversionPlan, confirm: bool },
}

/// Roots and shift for one conversion
#[derive(Debug, Clone, PartialEq, Eq)]
struct ConversionPlan {
    paths: Vec<PathBuf>,
    shift: IdShift,
}

/// Refuse running containers and empty records, then pick the next step
fn preflight(
    id: ContainerId,
    config_path: &Path,
    record: &ContainerRecord,
    running: Option<&str>,
    shift: IdShift,
    options: ConvertOptions,
) -> Result<Preflight> {
    if let Some(evidence) = running {
        info!("Container {} appears to be running: {}", id, evidence);
        bail!(
            "Container {} is currently running. Stop it first with: pct stop {}",
            id,
            id
        );
    }

    let paths = record.storage_paths();
    if paths.is_empty() {
        bail!("No storage entries found in {}", config_path.display());
    }

    if record.current_target() == Some(shift.target()) {
        return Ok(Preflight::AlreadyInTarget);
    }

    let plan = ConversionPlan { paths, shift };
    if options.dry_run {
        return Ok(Preflight::DryRun(plan));
    }
    Ok(Preflight::Run {
        plan,
        confirm: !options.yes,
    })
}

pub fn cmd_convert(
    settings: &Settings,
    ctid: &str,
    target: ConversionTarget,
    options: ConvertOptions,
) -> Result<()> {
    let (id, config_path, record) = load_container(settings, ctid)?;
    let running = settings.runtime_probe().running_evidence(id);
    let shift = settings.id_shift(target);

    let decision = preflight(
        id,
        &config_path,
        &record,
        running.as_deref(),
        shift,
        options,
    )?;
    print_plan(id, &record, target);

    let (plan, ask) = match decision {
        Preflight::AlreadyInTarget => {
            println!("Container is already in the target state!");
            return Ok(());
        }
        Preflight::DryRun(plan) => {
            print_warning(&plan);
            println!();
            println!("Dry run: no changes made.");
            return Ok(());
        }
        Preflight::Run { plan, confirm } => {
            print_warning(&plan);
            (plan, confirm)
        }
    };

    if ask && !confirm_with(io::stdin().lock(), io::stdout(), "Proceed? [y/N] ")? {
        println!("Aborted.");
        return Ok(());
    }

    if !nix::unistd::geteuid().is_root() {
        bail!("This command must be run as root");
    }

    let progress: Box<dyn ProgressTracker> = if io::stdout().is_terminal() {
        Box::new(CliProgress::root())
    } else {
        Box::new(LogProgress::new("convert"))
    };

    let backend = HostFs::new();
    let orchestrator = Orchestrator::new(&backend, plan.shift)
        .with_progress_interval(settings.progress_interval);
    let outcome = orchestrator
        .convert_and_commit(&config_path, &plan.paths, progress.as_ref())
        .with_context(|| format!("Failed to update {}", config_path.display()))?;

    print_summary(outcome.result());

    match outcome {
        RunOutcome::Committed(_) => {
            println!();
            println!("Conversion completed successfully");
            println!(
                "Container {} is now {}. Start it with: pct start {}",
                id, target, id
            );
            Ok(())
        }
        RunOutcome::LeftUncommitted(result) => {
            println!();
            println!("Conversion completed with errors.");
            println!("NOT updating configuration file.");
            println!(
                "{} was left unmodified on purpose so the 'unprivileged' flag does not",
                config_path.display()
            );
            println!("disagree with the ownership actually on disk.");
            println!("The filesystem may be partially converted; inspect it before retrying.");
            bail!(
                "Conversion failed on {} of {} storage roots",
                result.failed().count(),
                result.paths.len()
            )
        }
    }
}

fn print_plan(id: ContainerId, record: &ContainerRecord, target: ConversionTarget) {
    println!("Container {} storage:", id);
    for storage in &record.storage {
        println!("  {:<8} {}", storage.key, storage.path.display());
    }

    match record.current_target() {
        Some(current) => println!("Current state: {}", current),
        None => println!("Current state: unknown (no 'unprivileged' flag in config)"),
    }
    println!("Target state:  {}", target);
}

fn print_warning(plan: &ConversionPlan) {
    println!();
    println!(
        "This will shift all UIDs/GIDs and ACL entries by {:+}.",
        plan.shift.offset()
    );
    println!("WARNING: this cannot be undone automatically if it fails partway.");
    println!("Make sure you have a backup of the container storage.");
}

fn print_summary(result: &OverallResult) {
    println!();
    for path in &result.paths {
        let status = match &path.status {
            WalkStatus::Complete => "ok".to_string(),
            WalkStatus::CompletedWithErrors => "errors".to_string(),
            WalkStatus::Aborted { reason } => format!("aborted: {}", reason),
        };
        println!(
            "  {}: {} files, {} errors, {} warnings, {} hard links skipped [{}]",
            path.root.display(),
            path.objects,
            path.errors,
            path.warnings,
            path.hard_links,
            status
        );
    }
    if result.total_warnings() > 0 {
        warn!(
            "{} objects kept stale ACL entries or mode bits; see the log above",
            result.total_warnings()
        );
    }
}

/// Print `prompt` to `output` and read one answer line from `input`
///
/// End of input counts as a refusal.
fn confirm_with(mut input: impl BufRead, mut output: impl Write, prompt: &str) -> Result<bool> {
    write!(output, "{}", prompt)?;
    output.flush()?;

    let mut answer = String::new();
    input.read_line(&mut answer)?;
    Ok(accepts(&answer))
}

/// Anything starting with `y` or `Y` confirms
fn accepts(input: &str) -> bool {
    matches!(input.trim_start().chars().next(), Some('y' | 'Y'))
}
