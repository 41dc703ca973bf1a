//! # Event Log Persistence
//!
//! Stores scheduling events as a single JSON array on disk.
//!
//! ## Philosophy
//!
//! - **The file is always an array**: Missing, empty, corrupt or non-array
//!   content is replaced by `[]` before anything is appended.
//! - **Whole-file rewrites**: Each append reads the array, extends it and
//!   rewrites the file pretty-printed with four-space indentation.
//! - **No durability promises**: There is no fsync and no atomic rename.

use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use serde_json::{Serializer, Value};
use sim_scheduler::{EventLogSink, ScheduleEvent, SinkError};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result type for event log operations
pub type EventLogResult<T> = Result<T, EventLogError>;

/// Errors that can occur while persisting a log
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EventLogError {
    /// Reading or writing the file failed
    #[error("I/O error on {path}: {message}")]
    Io { path: PathBuf, message: String },

    /// An entry could not be converted to JSON
    #[error("Failed to serialize log entry: {0}")]
    Serialization(String),
}

impl EventLogError {
    fn io(path: &Path, err: io::Error) -> Self {
        EventLogError::Io {
            path: path.to_path_buf(),
            message: err.to_string(),
        }
    }
}

impl From<EventLogError> for SinkError {
    fn from(err: EventLogError) -> Self {
        SinkError::EventLog(err.to_string())
    }
}

/// Reads the array stored at `path`
///
/// Anything that is not a readable JSON array yields an empty vector.
pub fn read_json_array(path: impl AsRef<Path>) -> Vec<Value> {
    let Ok(content) = fs::read_to_string(path) else {
        return Vec::new();
    };
    match serde_json::from_str::<Value>(&content) {
        Ok(Value::Array(entries)) => entries,
        _ => Vec::new(),
    }
}

/// Ensures `path` holds a JSON array
///
/// A valid array is left untouched; any other state is reset to `[]`.
pub fn create_json_array(path: impl AsRef<Path>) -> EventLogResult<()> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).unwrap_or_default();
    if matches!(serde_json::from_str::<Value>(&content), Ok(Value::Array(_))) {
        return Ok(());
    }
    write_array(path, &[])
}

/// Overwrites `path` with an empty array
pub fn reset_json_array(path: impl AsRef<Path>) -> EventLogResult<()> {
    write_array(path.as_ref(), &[])
}

/// Appends one entry to the array at `path`
pub fn append_to_json_array<T: Serialize>(path: impl AsRef<Path>, entry: &T) -> EventLogResult<()> {
    append_all_to_json_array(path, std::slice::from_ref(entry))
}

/// Appends `entries` in order with a single rewrite
pub fn append_all_to_json_array<T: Serialize>(
    path: impl AsRef<Path>,
    entries: &[T],
) -> EventLogResult<()> {
    let path = path.as_ref();
    let mut array = read_json_array(path);
    for entry in entries {
        let value =
            serde_json::to_value(entry).map_err(|e| EventLogError::Serialization(e.to_string()))?;
        array.push(value);
    }
    write_array(path, &array)
}

fn write_array(path: &Path, array: &[Value]) -> EventLogResult<()> {
    let mut buf = Vec::new();
    let mut ser = Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(b"    "));
    array
        .serialize(&mut ser)
        .map_err(|e| EventLogError::Serialization(e.to_string()))?;
    fs::write(path, buf).map_err(|e| EventLogError::io(path, e))
}

/// Event log collaborator backed by a JSON array file
#[derive(Debug, Clone)]
pub struct JsonFileEventSink {
    path: PathBuf,
}

impl JsonFileEventSink {
    /// Opens the log at `path`, discarding any previous run's events
    pub fn create(path: impl Into<PathBuf>) -> EventLogResult<Self> {
        let path = path.into();
        reset_json_array(&path)?;
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl EventLogSink for JsonFileEventSink {
    fn flush(&mut self, events: &[ScheduleEvent]) -> Result<(), SinkError> {
        append_all_to_json_array::<ScheduleEvent>(&self.path, events)?;
        Ok(())
    }
}
