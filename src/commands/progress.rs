// src/commands/progress.rs
//! Terminal progress for conversions
//!
//! Shows a spinner per storage root with the running object count. Used when
//! stdout is a terminal; otherwise the library's `LogProgress` is used.

use indicatif::{ProgressBar, ProgressStyle};
use privconvert::ProgressTracker;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

/// Spinner-backed progress tracker
pub struct CliProgress {
    bar: ProgressBar,
    position: AtomicU64,
    finished: AtomicBool,
}

impl CliProgress {
    /// Spinner for one storage root
    pub fn spinner(message: &str) -> Self {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg} ({pos} files, {elapsed})")
            .unwrap_or_else(|_| ProgressStyle::default_spinner());
        bar.set_style(style);
        bar.set_message(message.to_string());
        bar.enable_steady_tick(Duration::from_millis(100));

        Self {
            bar,
            position: AtomicU64::new(0),
            finished: AtomicBool::new(false),
        }
    }

    /// Top-level tracker that only hands out per-root spinners
    pub fn root() -> Self {
        Self {
            bar: ProgressBar::hidden(),
            position: AtomicU64::new(0),
            finished: AtomicBool::new(false),
        }
    }
}

impl ProgressTracker for CliProgress {
    fn set_message(&self, message: &str) {
        self.bar.set_message(message.to_string());
    }

    fn set_position(&self, position: u64) {
        self.position.store(position, Ordering::Relaxed);
        self.bar.set_position(position);
    }

    fn position(&self) -> u64 {
        self.position.load(Ordering::Relaxed)
    }

    fn finish_with_message(&self, message: &str) {
        self.finished.store(true, Ordering::Relaxed);
        self.bar.finish_with_message(message.to_string());
    }

    fn finish_with_error(&self, message: &str) {
        self.finished.store(true, Ordering::Relaxed);
        self.bar.abandon_with_message(message.to_string());
    }

    fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Relaxed)
    }

    fn child(&self, message: &str) -> Box<dyn ProgressTracker> {
        Box::new(CliProgress::spinner(message))
    }
}
