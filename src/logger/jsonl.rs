//! JSONL logger: append-only line-delimited JSON for agent-friendly log
//! consumption.
//!
//! Each line is a self-contained JSON object, assembled in memory and written
//! with a single `write_all` so concurrent tailers never see a torn line.
//!
//! Degradation chain:
//! 1. Primary file path
//! 2. stderr with `[DSH-JSONL]` prefix
//! 3. Silent discard (the tool must never fail because logging did)

#![allow(missing_docs)]

use std::fs::{File, OpenOptions, create_dir_all};
use std::io::{self, BufWriter, Write};
use std::path::Path;

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Severity level for log events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

/// Log event types matching the dsh activity model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    EnumerationComplete,
    EnumerationDegraded,
    SelectionComplete,
    SelectionEmpty,
    StoreComplete,
    Error,
}

/// A single JSONL log entry — all fields optional except `ts`, `event`,
/// `severity`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    /// ISO 8601 UTC timestamp.
    pub ts: String,
    /// Event type identifier.
    pub event: EventType,
    /// Severity level.
    pub severity: Severity,
    /// Volume path involved (when applicable).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume: Option<String>,
    /// Free bytes reading for the volume.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub free_bytes: Option<u64>,
    /// Number of candidate volumes considered.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub candidate_count: Option<usize>,
    /// Bytes written by a store operation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload_bytes: Option<u64>,
    /// Whether the action succeeded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ok: Option<bool>,
    /// DSH error code if the action failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    /// Human-readable error message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Freeform details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl LogEntry {
    /// Create a new entry stamped with the current UTC time.
    pub fn new(event: EventType, severity: Severity) -> Self {
        Self {
            ts: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            event,
            severity,
            volume: None,
            free_bytes: None,
            candidate_count: None,
            payload_bytes: None,
            ok: None,
            error_code: None,
            error_message: None,
            details: None,
        }
    }
}

/// Degradation state of the JSONL writer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriterState {
    /// Writing to the primary path.
    Normal,
    /// File unusable, writing to stderr.
    Stderr,
    /// Logging disabled, silently discarding.
    Discard,
}

/// Append-only JSONL log writer with stderr fallback.
pub struct JsonlLogger {
    writer: Option<BufWriter<File>>,
    state: WriterState,
}

impl JsonlLogger {
    /// Open the log file in append mode, creating parent directories as
    /// needed. Falls back to stderr when the file cannot be opened.
    pub fn open(path: &Path) -> Self {
        if let Some(parent) = path.parent() {
            let _ = create_dir_all(parent);
        }
        match OpenOptions::new().create(true).append(true).open(path) {
            Ok(file) => Self {
                writer: Some(BufWriter::new(file)),
                state: WriterState::Normal,
            },
            Err(error) => {
                let _ = writeln!(
                    io::stderr(),
                    "[DSH-JSONL] cannot open {}: {error}; logging to stderr",
                    path.display()
                );
                Self {
                    writer: None,
                    state: WriterState::Stderr,
                }
            }
        }
    }

    /// A logger that drops every entry. Used by tests and `--quiet` paths.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            writer: None,
            state: WriterState::Discard,
        }
    }

    /// Write a single log entry as one atomic JSONL line.
    pub fn log(&mut self, entry: &LogEntry) {
        let line = match serde_json::to_string(entry) {
            Ok(json) => format!("{json}\n"),
            Err(error) => {
                // Serialization failure is a programming error; surface it
                // on stderr and drop the entry.
                let _ = writeln!(io::stderr(), "[DSH-JSONL] serialize error: {error}");
                return;
            }
        };

        match self.state {
            WriterState::Normal => {
                let failed = self
                    .writer
                    .as_mut()
                    .is_none_or(|writer| writer.write_all(line.as_bytes()).is_err());
                if failed {
                    self.state = WriterState::Stderr;
                    let _ = write!(io::stderr(), "[DSH-JSONL] {line}");
                }
            }
            WriterState::Stderr => {
                let _ = write!(io::stderr(), "[DSH-JSONL] {line}");
            }
            WriterState::Discard => {}
        }
    }

    /// Flush buffered lines.
    pub fn flush(&mut self) {
        if let Some(writer) = self.writer.as_mut() {
            let _ = writer.flush();
        }
    }

    /// Current degradation state label.
    #[must_use]
    pub fn state(&self) -> &'static str {
        match self.state {
            WriterState::Normal => "normal",
            WriterState::Stderr => "stderr",
            WriterState::Discard => "discard",
        }
    }
}

impl Drop for JsonlLogger {
    fn drop(&mut self) {
        self.flush();
    }
}
