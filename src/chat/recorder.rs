//! Session recording.
//!
//! While active, the recorder appends every recordable event with an ISO-8601
//! timestamp. Stopping writes the buffer as a JSON array to a [`LogSink`]
//! under a name derived from the start time.

use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::runtime::{Handle, RuntimeFlavor};

use super::event::ChatEvent;
use crate::datetime::to_iso;
use crate::{ParlorError, Result};

/// Durable key-value write used to persist recordings.
pub trait LogSink: Send + Sync {
    /// Write `contents` under `name`, replacing any previous value.
    fn write(&self, name: &str, contents: &[u8]) -> Result<()>;
}

/// Sink writing one file per recording into a directory.
#[derive(Debug, Clone)]
pub struct FileLogSink {
    dir: PathBuf,
}

impl FileLogSink {
    /// Create a sink for the given directory. The directory is created on first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn write_file(&self, name: &str, contents: &[u8]) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        fs::write(self.dir.join(name), contents)?;
        Ok(())
    }
}

impl LogSink for FileLogSink {
    fn write(&self, name: &str, contents: &[u8]) -> Result<()> {
        // block_in_place is unavailable on the current-thread runtime.
        match Handle::try_current().map(|h| h.runtime_flavor()) {
            Ok(RuntimeFlavor::MultiThread) => {
                tokio::task::block_in_place(|| self.write_file(name, contents))
            }
            _ => self.write_file(name, contents),
        }
    }
}

/// Sink keeping recordings in memory.
#[derive(Debug, Default)]
pub struct MemoryLogSink {
    entries: Mutex<Vec<(String, Vec<u8>)>>,
    fail: bool,
}

impl MemoryLogSink {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a sink whose writes always fail.
    pub fn failing() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    /// All writes so far as `(name, contents)`.
    pub fn entries(&self) -> Vec<(String, Vec<u8>)> {
        match self.entries.lock() {
            Ok(entries) => entries.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl LogSink for MemoryLogSink {
    fn write(&self, name: &str, contents: &[u8]) -> Result<()> {
        if self.fail {
            return Err(ParlorError::Persist("sink unavailable".to_string()));
        }
        let entry = (name.to_string(), contents.to_vec());
        match self.entries.lock() {
            Ok(mut entries) => entries.push(entry),
            Err(poisoned) => poisoned.into_inner().push(entry),
        }
        Ok(())
    }
}

/// One recorded event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordEntry {
    /// ISO-8601 time the event was recorded.
    pub timestamp: String,
    /// The canonical event.
    pub message: ChatEvent,
}

/// Recorder lifecycle errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RecordError {
    /// `start` while already recording.
    #[error("Recording already in progress")]
    AlreadyRecording,
    /// `stop` while not recording.
    #[error("No recording in progress")]
    NotRecording,
}

/// Result of stopping a recording.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopOutcome {
    /// The buffer was written under this name.
    Saved(String),
    /// Nothing was recorded.
    Empty,
    /// The sink rejected the write.
    Failed(String),
}

impl StopOutcome {
    /// File name, if one was produced.
    pub fn filename(&self) -> Option<&str> {
        match self {
            StopOutcome::Saved(name) => Some(name),
            _ => None,
        }
    }
}

/// Append-only event buffer with a start/stop lifecycle.
#[derive(Debug, Default)]
pub struct Recorder {
    active: bool,
    started_at: Option<DateTime<Utc>>,
    buffer: Vec<RecordEntry>,
}

impl Recorder {
    /// Create an idle recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a recording is in progress.
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Recorded entries so far.
    pub fn entries(&self) -> &[RecordEntry] {
        &self.buffer
    }

    /// Start recording, discarding any previous buffer.
    pub fn start(&mut self, now: DateTime<Utc>) -> std::result::Result<(), RecordError> {
        if self.active {
            return Err(RecordError::AlreadyRecording);
        }
        self.active = true;
        self.started_at = Some(now);
        self.buffer.clear();
        Ok(())
    }

    /// Append an event. No-op unless recording.
    pub fn record(&mut self, event: &ChatEvent, now: DateTime<Utc>) {
        if self.active {
            self.buffer.push(RecordEntry {
                timestamp: to_iso(&now),
                message: event.clone(),
            });
        }
    }

    /// Stop recording and persist the buffer.
    ///
    /// The recorder is idle and empty afterwards regardless of the outcome.
    pub fn stop(&mut self, sink: &dyn LogSink) -> std::result::Result<StopOutcome, RecordError> {
        if !self.active {
            return Err(RecordError::NotRecording);
        }
        self.active = false;
        let started_at = self.started_at.take().unwrap_or_else(Utc::now);
        let buffer = std::mem::take(&mut self.buffer);

        if buffer.is_empty() {
            return Ok(StopOutcome::Empty);
        }

        let name = recording_filename(&started_at);
        let written = serde_json::to_vec_pretty(&buffer)
            .map_err(ParlorError::from)
            .and_then(|json| sink.write(&name, &json));
        match written {
            Ok(()) => Ok(StopOutcome::Saved(name)),
            Err(e) => Ok(StopOutcome::Failed(e.to_string())),
        }
    }
}

/// File name for a recording started at `started_at`.
///
/// ```
/// use chrono::{TimeZone, Utc};
/// use parlor::chat::recorder::recording_filename;
///
/// let start = Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 0).unwrap();
/// assert_eq!(recording_filename(&start), "chat-log-2024-01-15T10-30-00.json");
/// ```
pub fn recording_filename(started_at: &DateTime<Utc>) -> String {
    format!("chat-log-{}.json", started_at.format("%Y-%m-%dT%H-%M-%S"))
}
