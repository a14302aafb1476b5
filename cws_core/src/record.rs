//! Per-cycle measurement records and the sinks that keep them.
//!
//! The CSV log is append-only: rows are never rewritten, and the header is
//! only written into an empty file.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use chrono::SecondsFormat;
use cws_traits::Timestamp;
use tracing::debug;

use crate::error::CoreError;
use crate::status::SystemStatus;

pub const CSV_HEADER: [&str; 12] = [
    "timestamp",
    "temperature_c",
    "humidity_pct",
    "pressure_hpa",
    "distance_cm",
    "volume_l",
    "pct_full",
    "water_out",
    "refill_added_l",
    "rate_lph",
    "forecast_empty_at",
    "status",
];

#[derive(Debug, Clone, PartialEq)]
pub struct LogRecord {
    pub timestamp: Timestamp,
    pub temperature_c: f64,
    /// `None` when the air sensor has no humidity channel or the read failed.
    pub humidity_pct: Option<f64>,
    pub pressure_hpa: Option<f64>,
    pub distance_cm: f64,
    pub volume_l: f64,
    pub pct_full: f64,
    /// `None` when no hall sensor is fitted or it could not be read.
    pub water_out: Option<bool>,
    /// Litres added by a refill detected on this cycle.
    pub refill_added_l: Option<f64>,
    pub rate_lph: Option<f64>,
    pub forecast_empty_at: Option<Timestamp>,
    pub status: SystemStatus,
}

fn rfc3339(t: &Timestamp) -> String {
    t.to_rfc3339_opts(SecondsFormat::Secs, true)
}

impl LogRecord {
    /// CSV fields in `CSV_HEADER` order; absent values are empty.
    pub fn to_row(&self) -> [String; 12] {
        [
            rfc3339(&self.timestamp),
            format!("{:.1}", self.temperature_c),
            self.humidity_pct.map(|h| format!("{h:.1}")).unwrap_or_default(),
            self.pressure_hpa.map(|p| format!("{p:.1}")).unwrap_or_default(),
            format!("{:.2}", self.distance_cm),
            format!("{:.3}", self.volume_l),
            format!("{:.1}", self.pct_full),
            self.water_out.map(|w| w.to_string()).unwrap_or_default(),
            self.refill_added_l.map(|l| format!("{l:.3}")).unwrap_or_default(),
            self.rate_lph.map(|r| format!("{r:.4}")).unwrap_or_default(),
            self.forecast_empty_at.as_ref().map(rfc3339).unwrap_or_default(),
            self.status.as_str().to_string(),
        ]
    }
}

pub trait RecordSink {
    fn append(&mut self, record: &LogRecord) -> Result<(), CoreError>;
}

impl<S: RecordSink + ?Sized> RecordSink for Box<S> {
    fn append(&mut self, record: &LogRecord) -> Result<(), CoreError> {
        (**self).append(record)
    }
}

/// Appends one CSV row per record, flushing after each.
pub struct CsvFileSink {
    path: PathBuf,
    writer: csv::Writer<File>,
}

impl CsvFileSink {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, CoreError> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| CoreError::Sink(format!("open {}: {e}", path.display())))?;
        let empty = file
            .metadata()
            .map_err(|e| CoreError::Sink(format!("stat {}: {e}", path.display())))?
            .len()
            == 0;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);
        if empty {
            writer
                .write_record(CSV_HEADER)
                .map_err(|e| CoreError::Sink(format!("write header: {e}")))?;
            writer
                .flush()
                .map_err(|e| CoreError::Sink(format!("write header: {e}")))?;
            debug!(path = %path.display(), "new record file");
        }
        Ok(Self { path, writer })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RecordSink for CsvFileSink {
    fn append(&mut self, record: &LogRecord) -> Result<(), CoreError> {
        self.writer
            .write_record(record.to_row())
            .map_err(|e| CoreError::Sink(format!("{}: {e}", self.path.display())))?;
        self.writer
            .flush()
            .map_err(|e| CoreError::Sink(format!("{}: {e}", self.path.display())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn record() -> LogRecord {
        LogRecord {
            timestamp: Utc.with_ymd_and_hms(2024, 6, 1, 8, 30, 0).unwrap(),
            temperature_c: 21.04,
            humidity_pct: None,
            pressure_hpa: Some(1013.4),
            distance_cm: 20.0,
            volume_l: 10.1853,
            pct_full: 42.0,
            water_out: None,
            refill_added_l: None,
            rate_lph: Some(0.25),
            forecast_empty_at: None,
            status: SystemStatus::Normal,
        }
    }

    #[test]
    fn row_formats_fields_in_header_order() {
        let row = record().to_row();
        assert_eq!(row[0], "2024-06-01T08:30:00Z");
        assert_eq!(row[1], "21.0");
        assert_eq!(row[2], "");
        assert_eq!(row[3], "1013.4");
        assert_eq!(row[5], "10.185");
        assert_eq!(row[7], "");
        assert_eq!(row[8], "");
        assert_eq!(row[9], "0.2500");
        assert_eq!(row[11], "normal");
    }

    #[test]
    fn refill_row_carries_added_litres() {
        let rec = LogRecord {
            humidity_pct: Some(55.04),
            refill_added_l: Some(12.5),
            ..record()
        };
        let row = rec.to_row();
        assert_eq!(CSV_HEADER[8], "refill_added_l");
        assert_eq!(row[2], "55.0");
        assert_eq!(row[8], "12.500");
    }

    #[test]
    fn header_written_once_across_reopens() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.csv");
        {
            let mut sink = CsvFileSink::open(&path).unwrap();
            sink.append(&record()).unwrap();
        }
        {
            let mut sink = CsvFileSink::open(&path).unwrap();
            sink.append(&record()).unwrap();
        }
        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], CSV_HEADER.join(","));
        assert!(lines[1].starts_with("2024-06-01T08:30:00Z,21.0,,1013.4,20.00,"));
    }
}
