//! # Logger Service
//!
//! This crate implements structured, leveled logging for the simulator.
//!
//! ## Philosophy
//!
//! Logging is explicit and structured, not text-based or printf-style.
//! Components receive a [`LogSink`] capability and never decide where
//! output goes.

use core_types::Pid;
use std::fmt;
use std::io::Write;
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

/// Log level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    /// Debug information
    Debug,
    /// Informational messages
    Info,
    /// Warnings
    Warn,
    /// Errors
    Error,
}

impl LogLevel {
    /// Returns the lowercase name used on the command line
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown level name
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown log level: {0}")]
pub struct ParseLevelError(String);

impl FromStr for LogLevel {
    type Err = ParseLevelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            _ => Err(ParseLevelError(s.to_string())),
        }
    }
}

/// A structured log entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    /// Log level
    pub level: LogLevel,
    /// Source process (if any)
    pub source: Option<Pid>,
    /// Log message
    pub message: String,
    /// Structured fields
    pub fields: Vec<(String, String)>,
}

impl LogEntry {
    /// Creates a new log entry
    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            source: None,
            message: message.into(),
            fields: Vec::new(),
        }
    }

    /// Sets the source process
    pub fn with_source(mut self, source: Pid) -> Self {
        self.source = Some(source);
        self
    }

    /// Adds a field to the log entry
    pub fn with_field(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.fields.push((key.into(), value.to_string()));
        self
    }

    /// Looks up a field value by key
    pub fn field(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:<5}]", self.level.as_str().to_ascii_uppercase())?;
        if let Some(source) = self.source {
            write!(f, " {}", source)?;
        }
        write!(f, " {}", self.message)?;
        for (key, value) in &self.fields {
            write!(f, " {}={}", key, value)?;
        }
        Ok(())
    }
}

/// Logging capability handed to components
///
/// Implementations decide filtering and destination. Callers may use
/// [`LogSink::enabled`] to skip building entries that would be dropped.
pub trait LogSink {
    /// Records an entry
    fn log(&mut self, entry: LogEntry);

    /// Returns true if entries at `level` would be recorded
    fn enabled(&self, level: LogLevel) -> bool;
}

/// Collects entries in memory
#[derive(Debug, Clone)]
pub struct MemoryLogSink {
    min_level: LogLevel,
    entries: Vec<LogEntry>,
}

impl MemoryLogSink {
    /// Creates a sink that keeps every entry
    pub fn new() -> Self {
        Self::with_min_level(LogLevel::Debug)
    }

    /// Creates a sink that drops entries below `min_level`
    pub fn with_min_level(min_level: LogLevel) -> Self {
        Self {
            min_level,
            entries: Vec::new(),
        }
    }

    /// Returns recorded entries in order
    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    /// Returns recorded entries at exactly `level`
    pub fn entries_at(&self, level: LogLevel) -> Vec<&LogEntry> {
        self.entries.iter().filter(|e| e.level == level).collect()
    }

    /// Removes all recorded entries
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl Default for MemoryLogSink {
    fn default() -> Self {
        Self::new()
    }
}

impl LogSink for MemoryLogSink {
    fn log(&mut self, entry: LogEntry) {
        if self.enabled(entry.level) {
            self.entries.push(entry);
        }
    }

    fn enabled(&self, level: LogLevel) -> bool {
        level >= self.min_level
    }
}

/// Memory sink that stays readable after being handed away
///
/// Clones share one buffer, so a caller can keep a handle while the
/// component owns a boxed clone.
#[derive(Debug, Clone)]
pub struct SharedLogSink {
    min_level: LogLevel,
    entries: Arc<Mutex<Vec<LogEntry>>>,
}

impl SharedLogSink {
    pub fn new() -> Self {
        Self::with_min_level(LogLevel::Debug)
    }

    pub fn with_min_level(min_level: LogLevel) -> Self {
        Self {
            min_level,
            entries: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<LogEntry>> {
        // a panicking writer cannot leave a Vec half-pushed
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Returns a copy of the recorded entries
    pub fn entries(&self) -> Vec<LogEntry> {
        self.lock().clone()
    }

    /// Returns copies of the entries at exactly `level`
    pub fn entries_at(&self, level: LogLevel) -> Vec<LogEntry> {
        self.lock()
            .iter()
            .filter(|e| e.level == level)
            .cloned()
            .collect()
    }
}

impl Default for SharedLogSink {
    fn default() -> Self {
        Self::new()
    }
}

impl LogSink for SharedLogSink {
    fn log(&mut self, entry: LogEntry) {
        if self.enabled(entry.level) {
            self.lock().push(entry);
        }
    }

    fn enabled(&self, level: LogLevel) -> bool {
        level >= self.min_level
    }
}

/// Writes one line per entry to standard error
#[derive(Debug, Clone, Copy)]
pub struct StderrLogSink {
    min_level: LogLevel,
}

impl StderrLogSink {
    /// Creates a sink that writes entries at or above `min_level`
    pub fn new(min_level: LogLevel) -> Self {
        Self { min_level }
    }
}

impl LogSink for StderrLogSink {
    fn log(&mut self, entry: LogEntry) {
        if self.enabled(entry.level) {
            let _ = writeln!(std::io::stderr().lock(), "{}", entry);
        }
    }

    fn enabled(&self, level: LogLevel) -> bool {
        level >= self.min_level
    }
}

/// Discards every entry
#[derive(Debug, Clone, Copy, Default)]
pub struct NullLogSink;

impl LogSink for NullLogSink {
    fn log(&mut self, _entry: LogEntry) {}

    fn enabled(&self, _level: LogLevel) -> bool {
        false
    }
}
