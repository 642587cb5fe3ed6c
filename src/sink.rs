//! Durable outage log.
//!
//! One line per closed host outage:
//!
//! ```text
//! 2024-05-01 12:00:00 -> 2024-05-01 12:00:09 | host=8.8.8.8 missed=3 duration=9s
//! 2024-05-01 12:10:00 -> 2024-05-01 12:10:10 | host=8.8.8.8 missed=4 duration=10s [truncated]
//! ```
//!
//! Timestamps are local time. The ` [truncated]` suffix marks outages that were still
//! open when the monitor shut down.

use chrono::{DateTime, Local, Utc};
use parking_lot::Mutex;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::info;

use crate::connectivity::ConnectivityEvent;
use crate::error::SinkError;
use crate::models::{ClosedOutage, OutageRecord};

pub const LOG_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
pub const TRUNCATED_MARKER: &str = " [truncated]";

/// Receives outage lifecycle notifications. Called from the owning host's loop, so
/// notifications for one host arrive in order.
pub trait OutageSink: Send + Sync {
    fn outage_opened(&self, _outage: &OutageRecord) -> Result<(), SinkError> {
        Ok(())
    }

    fn outage_closed(&self, outage: &ClosedOutage) -> Result<(), SinkError>;

    fn connectivity(&self, _event: &ConnectivityEvent) -> Result<(), SinkError> {
        Ok(())
    }
}

pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.with_timezone(&Local).format(LOG_TIME_FORMAT).to_string()
}

pub fn format_outage_line(outage: &ClosedOutage) -> String {
    let mut line = format!(
        "{} -> {} | host={} missed={} duration={}s",
        format_timestamp(outage.start),
        format_timestamp(outage.end),
        outage.host,
        outage.missed,
        outage.duration().num_seconds().max(0),
    );
    if outage.is_truncated() {
        line.push_str(TRUNCATED_MARKER);
    }
    line
}

/// Appends outage lines to a file, rotating it aside once it goes stale.
pub struct FileOutageSink {
    path: PathBuf,
    rotate_after: Duration,
    write_lock: Mutex<()>,
}

impl FileOutageSink {
    pub fn new(path: impl Into<PathBuf>, rotate_after_days: u64) -> Self {
        Self {
            path: path.into(),
            rotate_after: Duration::from_secs(rotate_after_days * 24 * 60 * 60),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn append(&self, line: &str) -> Result<(), SinkError> {
        let _guard = self.write_lock.lock();
        self.maybe_rotate()?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|source| self.io_error(source))?;
        writeln!(file, "{}", line).map_err(|source| self.io_error(source))
    }

    fn maybe_rotate(&self) -> Result<(), SinkError> {
        let modified = match fs::metadata(&self.path).and_then(|m| m.modified()) {
            Ok(modified) => modified,
            Err(_) => return Ok(()),
        };
        let age = SystemTime::now().duration_since(modified).unwrap_or_default();
        if age <= self.rotate_after {
            return Ok(());
        }

        let stamp = DateTime::<Local>::from(modified).format("%Y%m%d%H%M%S");
        let mut rotated = self.path.clone().into_os_string();
        rotated.push(format!(".{}", stamp));
        fs::rename(&self.path, &rotated).map_err(|source| self.io_error(source))?;
        info!(from = %self.path.display(), to = ?rotated, "Rotated outage log");
        Ok(())
    }

    fn io_error(&self, source: std::io::Error) -> SinkError {
        SinkError::Io { path: self.path.clone(), source }
    }
}

impl OutageSink for FileOutageSink {
    fn outage_closed(&self, outage: &ClosedOutage) -> Result<(), SinkError> {
        self.append(&format_outage_line(outage))
    }

    fn connectivity(&self, event: &ConnectivityEvent) -> Result<(), SinkError> {
        self.append(&event.log_line())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::OutageEnd;
    use chrono::TimeZone;
    use std::fs::File;

    fn outage(kind: OutageEnd) -> ClosedOutage {
        let start = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        ClosedOutage {
            host: "1.1.1.1".into(),
            start,
            end: start + chrono::Duration::seconds(9),
            missed: 3,
            kind,
        }
    }

    #[test]
    fn test_recovered_line_layout() {
        let o = outage(OutageEnd::Recovered);
        let expected = format!(
            "{} -> {} | host=1.1.1.1 missed=3 duration=9s",
            format_timestamp(o.start),
            format_timestamp(o.end)
        );
        assert_eq!(format_outage_line(&o), expected);
    }

    #[test]
    fn test_truncated_line_has_marker() {
        let line = format_outage_line(&outage(OutageEnd::Truncated));
        assert!(line.ends_with("duration=9s [truncated]"));
    }

    #[test]
    fn test_timestamp_format_is_parseable() {
        let ts = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let formatted = format_timestamp(ts);
        assert!(chrono::NaiveDateTime::parse_from_str(&formatted, LOG_TIME_FORMAT).is_ok());
    }

    #[test]
    fn test_file_sink_appends_lines() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FileOutageSink::new(dir.path().join("outages.log"), 90);

        sink.outage_closed(&outage(OutageEnd::Recovered)).unwrap();
        sink.outage_closed(&outage(OutageEnd::Truncated)).unwrap();

        let content = fs::read_to_string(sink.path()).unwrap();
        let lines: Vec<_> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(!lines[0].ends_with(TRUNCATED_MARKER));
        assert!(lines[1].ends_with(TRUNCATED_MARKER));
    }

    #[test]
    fn test_stale_log_is_rotated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("outages.log");
        fs::write(&path, "old\n").unwrap();
        let stale = SystemTime::now() - Duration::from_secs(91 * 24 * 60 * 60);
        File::options().write(true).open(&path).unwrap().set_modified(stale).unwrap();

        let sink = FileOutageSink::new(&path, 90);
        sink.outage_closed(&outage(OutageEnd::Recovered)).unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap().lines().count(), 1);
        let rotated: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().starts_with("outages.log."))
            .collect();
        assert_eq!(rotated.len(), 1);
        assert_eq!(fs::read_to_string(rotated[0].path()).unwrap(), "old\n");
    }

    #[test]
    fn test_unwritable_path_reports_error() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FileOutageSink::new(dir.path().join("missing").join("outages.log"), 90);
        let err = sink.outage_closed(&outage(OutageEnd::Recovered)).unwrap_err();
        assert!(matches!(err, SinkError::Io { .. }));
    }
}
