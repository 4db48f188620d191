//! JSON-lines delivery target for the sync outbox.
//!
//! # Responsibility
//! - Write each delivered `SyncEvent` as one JSON object per line.
//!
//! # Invariants
//! - A line is flushed before delivery is reported as successful.
//! - I/O failures are retryable; encoding failures are not.

use crate::sync::outbox::{SyncError, SyncEvent, SyncSink};
use std::cell::RefCell;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

/// Appends sync events to any writer, one JSON document per line.
pub struct JsonLinesSink<W: Write> {
    id: String,
    writer: RefCell<W>,
}

impl<W: Write> JsonLinesSink<W> {
    pub fn new(id: impl Into<String>, writer: W) -> Self {
        Self {
            id: id.into(),
            writer: RefCell::new(writer),
        }
    }

    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }
}

impl JsonLinesSink<File> {
    /// Opens `path` for appending, creating it when absent.
    pub fn append_to(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref();
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self::new(format!("jsonl:{}", path.display()), file))
    }
}

impl<W: Write> SyncSink for JsonLinesSink<W> {
    fn sink_id(&self) -> &str {
        &self.id
    }

    fn deliver(&self, event: &SyncEvent) -> Result<(), SyncError> {
        let mut line = serde_json::to_vec(event)
            .map_err(|err| SyncError::new("encode_failed", err.to_string(), false))?;
        line.push(b'\n');

        let mut writer = self.writer.borrow_mut();
        writer
            .write_all(&line)
            .and_then(|()| writer.flush())
            .map_err(|err| SyncError::new("io_error", err.to_string(), true))
    }
}
