// src/lib.rs

//! privconvert
//!
//! Converts Proxmox LXC containers between privileged and unprivileged mode
//! by shifting every uid, gid and named POSIX ACL entry on the container's
//! storage by a fixed band, then updating the `unprivileged:` flag in the
//! container config.
//!
//! # Architecture
//!
//! - `idmap`: band arithmetic with explicit range checks
//! - `filesystem`: syscall backend, ACL codec, per-object converter, tree walker
//! - `conversion`: runs every storage root and gates the config rewrite
//! - `container`: config record parsing/rewriting and running-state detection
//! - `settings`: optional TOML settings
//!
//! Filesystem changes are not transactional. The config flag is only
//! rewritten after every storage root converted without errors.

pub mod container;
pub mod conversion;
mod error;
pub mod filesystem;
pub mod idmap;
pub mod progress;
pub mod settings;

pub use container::{ContainerId, ContainerRecord, RuntimeProbe};
pub use conversion::{Orchestrator, OverallResult, RunOutcome};
pub use error::{Error, Result};
pub use filesystem::{ConversionResult, FsBackend, HostFs, TreeWalker, WalkStatus};
pub use idmap::{ConversionTarget, IdShift, ShiftError};
pub use progress::{CallbackProgress, LogProgress, ProgressEvent, ProgressTracker, SilentProgress};
pub use settings::Settings;
