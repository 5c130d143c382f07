// Core types
pub mod types;
pub use types::*;

// Logging functionality
pub mod logger;
pub use logger::init_logger;

// Waiting-thread descriptor fields shared with the external scheduler
pub mod thread;

// Priority-ordered wait queue
pub mod queue;

// Adapter seams to the external scheduler and mutex
pub mod mutex;
pub mod sched;

// The condition variable itself
pub mod condvar;
pub use condvar::Condvar;

use anyhow::{Context, Result};
use std::sync::atomic::AtomicUsize;

// One id space shared by condition variables and mutex adapters.
pub(crate) static NEXT_SYNC_ID: AtomicUsize = AtomicUsize::new(1);

/// Filament configuration struct
///
/// Configures the ambient pieces of the subsystem before the runtime starts
/// creating condition variables. Currently that is the event log.
pub struct Filament {
    log_path: Option<String>,
}

impl Default for Filament {
    fn default() -> Self {
        Self::new()
    }
}

impl Filament {
    /// Create a new Filament with default settings
    ///
    /// By default, event logging is disabled.
    pub fn new() -> Self {
        Filament { log_path: None }
    }

    /// Activate the event logger and set the path for the log file
    ///
    /// # Arguments
    /// * `path` - Path to the log file
    ///
    /// # Returns
    /// The builder for method chaining
    pub fn with_log<P: AsRef<std::path::Path>>(mut self, path: P) -> Self {
        self.log_path = Some(path.as_ref().to_string_lossy().into_owned());
        self
    }

    /// Apply the configured settings
    ///
    /// # Returns
    /// A Result that is Ok if initialization succeeded, or an error if it failed
    ///
    /// # Errors
    /// Returns an error if logger initialization fails
    pub fn start(self) -> Result<()> {
        if let Some(log_path) = self.log_path {
            init_logger(Some(log_path)).context("Failed to initialize logger")?;
        }
        Ok(())
    }
}
