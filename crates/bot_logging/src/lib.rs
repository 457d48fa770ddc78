#![deny(missing_docs)]
//! Shared logging utilities for the bot workspace.
//!
//! This crate provides the `bot_*` logging macros used across the codebase,
//! a minimal test initializer for the global logger, and an in-memory
//! [`BufferLogger`] whose records are persisted on-wiki once per run.

use std::sync::{Arc, Mutex, MutexGuard};

use log::{LevelFilter, Log, Metadata, Record};
use simplelog::{Config, SharedLogger};

/// Logs a trace-level message using the global logging facade.
#[macro_export]
macro_rules! bot_trace {
    ($($arg:tt)*) => {{
        log::trace!($($arg)*);
    }};
}

/// Logs an info-level message using the global logging facade.
#[macro_export]
macro_rules! bot_info {
    ($($arg:tt)*) => {{
        log::info!($($arg)*);
    }};
}

/// Logs a debug-level message using the global logging facade.
#[macro_export]
macro_rules! bot_debug {
    ($($arg:tt)*) => {{
        log::debug!($($arg)*);
    }};
}

/// Logs a warn-level message using the global logging facade.
#[macro_export]
macro_rules! bot_warn {
    ($($arg:tt)*) => {{
        log::warn!($($arg)*);
    }};
}

/// Logs an error-level message using the global logging facade.
#[macro_export]
macro_rules! bot_error {
    ($($arg:tt)*) => {{
        log::error!($($arg)*);
    }};
}

/// Initializes a simple terminal logger for use in unit tests.
///
/// This safely no-ops if another logger has already been initialized.
pub fn initialize_for_tests() {
    use simplelog::{ColorChoice, CombinedLogger, TermLogger, TerminalMode};

    // Use debug level in debug builds, info in release builds.
    let level = if cfg!(debug_assertions) {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    // Ignore the error if a logger was already set by another test.
    let _ = CombinedLogger::init(vec![TermLogger::new(
        level,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )]);
}

/// Shared handle to the lines collected by a [`BufferLogger`].
///
/// Cloning the handle shares the same storage, so the application can keep a
/// copy after the logger itself has been moved into the global facade.
#[derive(Debug, Clone, Default)]
pub struct LogBuffer {
    lines: Arc<Mutex<Vec<String>>>,
}

impl LogBuffer {
    /// Creates an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends one formatted line.
    pub fn push(&self, line: String) {
        self.lock().push(line);
    }

    /// Removes and returns every buffered line, oldest first.
    pub fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.lock())
    }

    /// Returns true when nothing has been buffered since the last [`take`](Self::take).
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<String>> {
        // A panic while holding the lock leaves the vector intact.
        self.lines.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// A [`SharedLogger`] that keeps records in memory instead of writing them.
pub struct BufferLogger {
    level: LevelFilter,
    config: Config,
    buffer: LogBuffer,
}

impl BufferLogger {
    /// Creates a boxed logger ready to be handed to `CombinedLogger::init`.
    pub fn new(level: LevelFilter, config: Config, buffer: LogBuffer) -> Box<Self> {
        Box::new(Self {
            level,
            config,
            buffer,
        })
    }
}

impl Log for BufferLogger {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record<'_>) {
        if self.enabled(record.metadata()) {
            self.buffer
                .push(format!("{}: {}", record.level(), record.args()));
        }
    }

    fn flush(&self) {}
}

impl SharedLogger for BufferLogger {
    fn level(&self) -> LevelFilter {
        self.level
    }

    fn config(&self) -> Option<&Config> {
        Some(&self.config)
    }

    fn as_log(self: Box<Self>) -> Box<dyn Log> {
        Box::new(*self)
    }
}
