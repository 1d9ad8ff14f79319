//! Append-only log files, one per record kind and day.

use crate::table::selected_fields;
use chrono::NaiveDate;
use ep2000_lib::client::{CHECKSUM_FAILED, Reply, SenseReport};
use ep2000_lib::decoder::{Record, RecordKind};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum LogPathError {
    #[error("Log path {0:?} is a file, not a directory")]
    NotADirectory(PathBuf),
    #[error("Log path {0:?} does not exist")]
    Missing(PathBuf),
}

/// Resolves `path` to an existing directory.
pub fn check_log_path(path: &Path) -> Result<PathBuf, LogPathError> {
    if path.is_file() {
        return Err(LogPathError::NotADirectory(path.to_path_buf()));
    }
    if !path.is_dir() {
        return Err(LogPathError::Missing(path.to_path_buf()));
    }
    Ok(path.canonicalize().unwrap_or_else(|_| path.to_path_buf()))
}

#[derive(Debug, Clone)]
pub struct Datalog {
    dir: PathBuf,
}

impl Datalog {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn file_path(&self, kind: RecordKind, date: NaiveDate) -> PathBuf {
        self.dir
            .join(format!("log-{kind}-{}.log", date.format("%Y-%m-%d")))
    }

    /// Appends `line` to the file for `kind` and `date`.
    pub fn append(&self, kind: RecordKind, date: NaiveDate, line: &str) -> anyhow::Result<PathBuf> {
        let path = self.file_path(kind, date);
        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
        writeln!(file, "{line}")?;
        file.flush()?;
        log::debug!("Appended {kind} line to {path:?}");
        Ok(path)
    }
}

fn join_line(timestamp: i64, device: &str, entries: impl IntoIterator<Item = String>) -> String {
    let mut parts = vec![timestamp.to_string(), device.to_string()];
    parts.extend(entries);
    parts.join(",")
}

fn checksum_failed_entry() -> String {
    format!("error:{CHECKSUM_FAILED}")
}

pub fn sense_line(timestamp: i64, device: &str, reply: &Reply<SenseReport>) -> String {
    let entries = match reply {
        Reply::Valid(report) => vec![
            format!("detected:{}", report.detected),
            format!("hex-string:{}", report.meta.hex),
        ],
        Reply::ChecksumFailed => vec![checksum_failed_entry()],
    };
    join_line(timestamp, device, entries)
}

/// `{ts},{device},{name}:{index},{raw},{value},{unit},...` for the selected fields.
pub fn record_line(
    timestamp: i64,
    device: &str,
    reply: &Reply<Record>,
    filter: Option<&[&str]>,
) -> String {
    let entries = match reply {
        Reply::Valid(record) => selected_fields(record, filter)
            .map(|field| format!("{}:{field}", field.name))
            .collect(),
        Reply::ChecksumFailed => vec![checksum_failed_entry()],
    };
    join_line(timestamp, device, entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use ep2000_lib::decoder::{Meta, decode};
    use ep2000_lib::profile;

    fn setup_record() -> Record {
        let words: [u16; 10] = [0, 230, 105, 141, 136, 20, 0, 0, 0, 1];
        let payload: Vec<u8> = words.iter().flat_map(|word| word.to_be_bytes()).collect();
        decode(&payload, &profile::SETUP, profile::MODEL).unwrap()
    }

    #[test]
    fn log_path_must_be_a_directory() {
        let dir = tempfile::tempdir().unwrap();
        assert!(check_log_path(dir.path()).unwrap().is_dir());

        let file = tempfile::NamedTempFile::new_in(dir.path()).unwrap();
        assert_matches!(check_log_path(file.path()), Err(LogPathError::NotADirectory(_)));
        assert_matches!(
            check_log_path(&dir.path().join("missing")),
            Err(LogPathError::Missing(_))
        );
    }

    #[test]
    fn file_names_per_kind_and_day() {
        let datalog = Datalog::new(PathBuf::from("log"));
        let date = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
        assert_eq!(
            datalog.file_path(RecordKind::Status, date),
            Path::new("log/log-status-2024-03-09.log")
        );
        assert_eq!(
            datalog.file_path(RecordKind::Sense, date),
            Path::new("log/log-sense-2024-03-09.log")
        );
    }

    #[test]
    fn appends_lines() {
        let dir = tempfile::tempdir().unwrap();
        let datalog = Datalog::new(dir.path().to_path_buf());
        let date = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
        let path = datalog.append(RecordKind::Setup, date, "first").unwrap();
        datalog.append(RecordKind::Setup, date, "second").unwrap();
        assert_eq!(std::fs::read_to_string(path).unwrap(), "first\nsecond\n");
    }

    #[test]
    fn record_lines() {
        let reply = Reply::Valid(setup_record());
        let line = record_line(1700000000, "/dev/ttyUSB0", &reply, None);
        assert!(line.starts_with("1700000000,/dev/ttyUSB0,GridFrequencyType:0,0,50,Hz,"));
        assert!(line.contains(",FloatChargeVoltage:4,136,13.6,V,"));
        assert_eq!(
            record_line(5, "COM3", &Reply::ChecksumFailed, None),
            "5,COM3,error:CRC failed"
        );
    }

    #[test]
    fn filtered_record_line() {
        let reply = Reply::Valid(setup_record());
        let line = record_line(1, "p", &reply, Some(&["EnableBacklight"][..]));
        assert_eq!(line, "1,p,EnableBacklight:9,1,ENABLE,");
    }

    #[test]
    fn sense_lines() {
        let payload = [0x00, 0x00, 0x00, 0xDC];
        let reply = Reply::Valid(SenseReport {
            detected: false,
            meta: Meta::new(&payload, profile::MODEL),
        });
        assert_eq!(
            sense_line(7, "/dev/ttyS0", &reply),
            "7,/dev/ttyS0,detected:false,hex-string:00 00 00 DC"
        );
    }
}
