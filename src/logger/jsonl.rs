//! JSONL run log: one self-contained JSON object per event.
//!
//! Lines are assembled in memory and written with a single `write_all` so a
//! concurrent `tail -f` never sees a partial record.
//!
//! Three-level fallback chain:
//! 1. Primary file path
//! 2. stderr with `[LSW-JSONL]` prefix
//! 3. Silent discard (a run must never fail because of logging)

#![allow(missing_docs)]

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use parking_lot::Mutex;
use serde::Serialize;

use crate::core::errors::{LswError, Result};
use crate::logger::events::{Event, EventSink, Severity};

/// A single JSONL record: timestamp and level followed by the event fields.
#[derive(Debug, Serialize)]
pub struct LogRecord<'a> {
    /// ISO 8601 UTC timestamp.
    pub ts: String,
    pub level: Severity,
    #[serde(flatten)]
    pub event: &'a Event,
}

impl<'a> LogRecord<'a> {
    /// Wrap an event, stamped with the current UTC time.
    pub fn new(event: &'a Event) -> Self {
        Self {
            ts: format_utc_now(),
            level: event.severity(),
            event,
        }
    }
}

/// Degradation state of the JSONL writer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriterState {
    Normal,
    Stderr,
    Discard,
}

/// Append-only JSONL writer with stderr fallback.
pub struct JsonlWriter {
    path: PathBuf,
    writer: Option<BufWriter<File>>,
    state: WriterState,
    bytes_written: u64,
}

impl JsonlWriter {
    /// Open (or create) the log file. Falls back to stderr on failure.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let mut w = Self {
            path,
            writer: None,
            state: WriterState::Discard,
            bytes_written: 0,
        };
        match open_append(&w.path) {
            Ok((file, size)) => {
                w.writer = Some(BufWriter::with_capacity(64 * 1024, file));
                w.state = WriterState::Normal;
                w.bytes_written = size;
            }
            Err(e) => {
                let _ = writeln!(io::stderr(), "[LSW-JSONL] {e}; logging to stderr");
                w.state = WriterState::Stderr;
            }
        }
        w
    }

    /// Write one event as a single line.
    pub fn write_event(&mut self, event: &Event) {
        let line = match serde_json::to_string(&LogRecord::new(event)) {
            Ok(json) => format!("{json}\n"),
            Err(e) => {
                let _ = writeln!(io::stderr(), "[LSW-JSONL] serialize error: {e}");
                return;
            }
        };
        self.write_line(&line);
    }

    pub fn flush(&mut self) {
        if let Some(w) = self.writer.as_mut() {
            let _ = w.flush();
        }
    }

    /// Current degradation state.
    pub fn state(&self) -> &str {
        match self.state {
            WriterState::Normal => "normal",
            WriterState::Stderr => "stderr",
            WriterState::Discard => "discard",
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    fn write_line(&mut self, line: &str) {
        match self.state {
            WriterState::Normal => {
                if let Some(w) = self.writer.as_mut()
                    && w.write_all(line.as_bytes()).is_ok()
                {
                    self.bytes_written += line.len() as u64;
                    return;
                }
                self.degrade();
                self.write_line(line);
            }
            WriterState::Stderr => {
                if write!(io::stderr(), "[LSW-JSONL] {line}").is_err() {
                    self.degrade();
                }
            }
            WriterState::Discard => {}
        }
    }

    fn degrade(&mut self) {
        self.writer = None;
        self.state = match self.state {
            WriterState::Normal => {
                let _ = writeln!(
                    io::stderr(),
                    "[LSW-JSONL] write to {} failed, using stderr",
                    self.path.display()
                );
                WriterState::Stderr
            }
            WriterState::Stderr | WriterState::Discard => WriterState::Discard,
        };
    }
}

impl Drop for JsonlWriter {
    fn drop(&mut self) {
        self.flush();
    }
}

/// [`EventSink`] writing every event to a [`JsonlWriter`].
pub struct JsonlSink {
    writer: Mutex<JsonlWriter>,
}

impl JsonlSink {
    pub fn new(writer: JsonlWriter) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    /// Open a fresh per-run log file in `dir`.
    pub fn for_run(dir: &Path, started: DateTime<Local>) -> Self {
        Self::new(JsonlWriter::open(run_log_path(dir, started)))
    }

    pub fn path(&self) -> PathBuf {
        self.writer.lock().path().to_path_buf()
    }
}

impl EventSink for JsonlSink {
    fn handle(&self, event: &Event) {
        self.writer.lock().write_event(event);
    }

    fn flush(&self) {
        self.writer.lock().flush();
    }
}

/// Per-run log file name: `<dir>/scan_<YYYYmmdd_HHMMSS>.jsonl`.
pub fn run_log_path(dir: &Path, started: DateTime<Local>) -> PathBuf {
    dir.join(format!("scan_{}.jsonl", started.format("%Y%m%d_%H%M%S")))
}

/// Open or create a file for appending. Returns `(File, current_size)`.
fn open_append(path: &Path) -> Result<(File, u64)> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| LswError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|source| LswError::io(path, source))?;
    let size = file.metadata().map(|m| m.len()).unwrap_or(0);
    Ok((file, size))
}

/// Format current UTC time as ISO 8601.
fn format_utc_now() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use crate::logger::events::EventEmitter;
    use crate::scanner::classifier::Classification;

    fn broken_event() -> Event {
        Event::EntryClassified {
            path: PathBuf::from("/data/media/movies/a.mkv"),
            target: Some(PathBuf::from("/mnt/ad1/a.mkv")),
            classification: Classification::BrokenKnownMount {
                instance: "ad1".to_string(),
                category: Some("movies".to_string()),
            },
        }
    }

    #[test]
    fn write_event_produces_valid_json_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.jsonl");
        let mut writer = JsonlWriter::open(&path);

        writer.write_event(&broken_event());
        writer.write_event(&Event::ConfirmationResult { accepted: true });
        writer.flush();

        let contents = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);

        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["event"], "entry_classified");
        assert_eq!(first["level"], "warning");
        assert_eq!(first["path"], "/data/media/movies/a.mkv");
        assert_eq!(first["classification"]["instance"], "ad1");
        assert!(first["ts"].as_str().unwrap().ends_with('Z'));

        let second: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(second["event"], "confirmation_result");
        assert_eq!(second["accepted"], true);
        assert_eq!(second["level"], "info");
    }

    #[test]
    fn creates_missing_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("logs").join("run.jsonl");
        let mut writer = JsonlWriter::open(&path);
        assert_eq!(writer.state(), "normal");
        writer.write_event(&broken_event());
        writer.flush();
        assert!(writer.bytes_written() > 0);
        assert!(path.exists());
    }

    #[test]
    fn unopenable_path_falls_back_to_stderr() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        fs::write(&blocker, b"file").unwrap();

        let mut writer = JsonlWriter::open(blocker.join("run.jsonl"));
        assert_eq!(writer.state(), "stderr");
        writer.write_event(&Event::ConfirmationResult { accepted: false });
    }

    #[test]
    fn sink_writes_through_emitter() {
        let dir = tempfile::tempdir().unwrap();
        let sink = JsonlSink::new(JsonlWriter::open(dir.path().join("sink.jsonl")));
        let path = sink.path();
        let emitter = EventEmitter::new().with_sink(sink);

        emitter.emit(Event::ScanStarted {
            root: PathBuf::from("/data/media"),
        });
        emitter.emit(broken_event());
        emitter.flush();

        let contents = fs::read_to_string(path).unwrap();
        assert_eq!(contents.lines().count(), 2);
        assert!(contents.lines().next().unwrap().contains("\"scan_started\""));
    }

    #[test]
    fn run_log_path_uses_timestamped_name() {
        let started = Local.with_ymd_and_hms(2026, 3, 4, 5, 6, 7).unwrap();
        let path = run_log_path(Path::new("/var/log/linksweep"), started);
        assert_eq!(
            path,
            PathBuf::from("/var/log/linksweep/scan_20260304_050607.jsonl")
        );
    }
}
