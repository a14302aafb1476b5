//! Test and helper sinks for cws_core

use std::sync::{Arc, Mutex};

use crate::error::CoreError;
use crate::record::{LogRecord, RecordSink};

/// Keeps every record in memory; clones share the same buffer so a test can
/// hand one to the monitor and inspect the other.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    records: Arc<Mutex<Vec<LogRecord>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<LogRecord> {
        self.records.lock().map(|r| r.clone()).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.records.lock().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl RecordSink for MemorySink {
    fn append(&mut self, record: &LogRecord) -> Result<(), CoreError> {
        self.records
            .lock()
            .map_err(|_| CoreError::Sink("memory sink poisoned".into()))?
            .push(record.clone());
        Ok(())
    }
}

/// A sink whose every append fails, as a full or read-only disk does.
#[derive(Debug, Clone, Copy, Default)]
pub struct FailingSink;

impl RecordSink for FailingSink {
    fn append(&mut self, _record: &LogRecord) -> Result<(), CoreError> {
        Err(CoreError::Sink("failing sink".into()))
    }
}
