#![warn(missing_docs)]
//! Headless testing surfaces: a scriptable AR platform, a recording UI,
//! a manual clock and the JSONL event stream.

mod clock;
mod platform;
mod ui;

use anyhow::{Context, Result};
use kitting_core::SimTick;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

pub use clock::ManualClock;
pub use platform::SimulatedPlatform;
pub use ui::RecordingUi;

/// Primary event record captured by headless sessions.
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct EventRecord<'a> {
    /// Session tick when the event occurred.
    pub tick: SimTick,
    /// Session mode label at that tick.
    pub mode: &'a str,
    /// Human-readable kind label.
    pub kind: &'a str,
    /// Free-form payload.
    pub payload: &'a str,
}

/// A sink that writes newline-delimited JSON to disk.
pub struct JsonlSink {
    file: File,
    written: usize,
}

impl JsonlSink {
    /// Create a new sink at `path`, creating parent dirs if needed.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = File::create(path)
            .with_context(|| format!("Failed to create event log {}", path.display()))?;
        Ok(Self { file, written: 0 })
    }

    /// Append an event to the log.
    pub fn write(&mut self, event: &EventRecord<'_>) -> Result<()> {
        let line = serde_json::to_string(event)?;
        self.file.write_all(line.as_bytes())?;
        self.file.write_all(b"\n")?;
        self.written += 1;
        Ok(())
    }

    /// Events written so far.
    pub fn written(&self) -> usize {
        self.written
    }
}

/// Read back every line of a JSONL log as loose JSON values.
pub fn read_events<P: AsRef<Path>>(path: P) -> Result<Vec<serde_json::Value>> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read event log {}", path.display()))?;
    contents
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| serde_json::from_str(line).map_err(Into::into))
        .collect()
}
