//! Logging functionality for Filament
//!
//! Records condition-variable events (lifecycle transitions, enqueues,
//! wakeups, timeouts, interruptions) as JSON lines, each carrying a snapshot
//! of the queued-waiter counts of every live condition variable at the time
//! of the event. Disabled unless a log file is configured.

use crate::core::types::{CondvarId, SyncEvent, ThreadId};
use anyhow::{Context, Result};
use chrono::Utc;
use fxhash::FxHashMap;
use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

/// Structure for a single log entry
#[derive(Debug, Serialize)]
pub struct LogEntry {
    /// Thread the event concerns; `None` for lifecycle events with no
    /// specific thread
    pub thread_id: Option<ThreadId>,
    /// Condition variable that was involved
    pub condvar_id: CondvarId,
    /// Type of event that occurred
    pub event: SyncEvent,
    /// Seconds since the Unix epoch with microsecond precision
    pub timestamp: f64,
}

#[derive(Debug, Serialize)]
pub struct CombinedLogEntry {
    pub event: LogEntry,
    /// Queued-waiter counts per live condition variable, after the event
    pub waiters: FxHashMap<CondvarId, usize>,
}

/// Determines how the logger should operate
#[derive(Debug)]
pub enum LoggerMode {
    /// Logging is disabled entirely
    Disabled,
    /// Log to the specified file
    ToFile(File),
}

/// Logger for recording condition-variable events
pub struct EventLogger {
    mode: LoggerMode,
    census: FxHashMap<CondvarId, usize>,
}

impl Default for EventLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl EventLogger {
    /// Create a new logger with logging disabled
    pub fn new() -> Self {
        EventLogger {
            mode: LoggerMode::Disabled,
            census: FxHashMap::default(),
        }
    }

    /// Create a new logger that writes to the specified file
    pub fn with_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .context("Failed to open log file")?;

        Ok(EventLogger {
            mode: LoggerMode::ToFile(file),
            census: FxHashMap::default(),
        })
    }

    /// Log an event based on the configured mode
    pub fn log_event(
        &mut self,
        thread_id: Option<ThreadId>,
        condvar_id: CondvarId,
        event: SyncEvent,
        waiters_now: usize,
    ) {
        // Early return if logging is disabled
        if let LoggerMode::Disabled = self.mode {
            return;
        }

        // Keep the census in step with the event before snapshotting it
        match event {
            SyncEvent::Destroy => {
                self.census.remove(&condvar_id);
            }
            _ => {
                self.census.insert(condvar_id, waiters_now);
            }
        }

        // Absolute timestamp as f64: seconds since Unix Epoch with microsecond precision
        let now = Utc::now();
        let timestamp = now.timestamp() as f64 + now.timestamp_subsec_micros() as f64 / 1_000_000.0;

        let combined_entry = CombinedLogEntry {
            event: LogEntry {
                thread_id,
                condvar_id,
                event,
                timestamp,
            },
            waiters: self.census.clone(),
        };

        if let LoggerMode::ToFile(ref file) = self.mode {
            let mut file = file;
            if let Ok(json) = serde_json::to_string(&combined_entry) {
                let _ = writeln!(file, "{}", json);
                let _ = file.flush();
            }
        }
    }

    /// Check if logging is enabled
    pub fn is_enabled(&self) -> bool {
        !matches!(self.mode, LoggerMode::Disabled)
    }
}

// Global logger instance
lazy_static::lazy_static! {
    static ref GLOBAL_LOGGER: Mutex<EventLogger> = Mutex::new(EventLogger::new());
}

/// Set the global logger to use the specified file, or disable logging if None
pub fn init_logger<P: AsRef<Path>>(path: Option<P>) -> Result<()> {
    if let Ok(mut global) = GLOBAL_LOGGER.lock() {
        match path {
            Some(path) => {
                *global =
                    EventLogger::with_file(path).context("Failed to create logger with file")?;
            }
            None => {
                *global = EventLogger::new(); // Disabled mode
            }
        }
    } else {
        anyhow::bail!("Failed to acquire lock on global logger");
    }
    Ok(())
}

/// Log an event to the global logger (if enabled)
pub fn log_event(
    thread_id: Option<ThreadId>,
    condvar_id: CondvarId,
    event: SyncEvent,
    waiters_now: usize,
) {
    if let Ok(mut logger) = GLOBAL_LOGGER.lock() {
        logger.log_event(thread_id, condvar_id, event, waiters_now);
    }
}

/// Check if the global logger is enabled
pub fn is_logging_enabled() -> bool {
    if let Ok(logger) = GLOBAL_LOGGER.lock() {
        logger.is_enabled()
    } else {
        false
    }
}
