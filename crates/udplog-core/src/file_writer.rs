//! Date-partitioned, append-only log files.
//!
//! Entries are written to `<dir>/YYYY-MM-DD.log` (UTC date of the entry), one
//! `[<timestamp>] <message>` line each. Rotation is lazy: the writer compares
//! the target path of every write with the path of the file it has open and
//! switches files only when they differ. No timer is involved, so a pause in
//! ingestion across midnight still lands the next entry in the right file.

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, Utc};
use tracing::{debug, info};

use crate::entry::LogEntry;
use crate::error::Result;

/// Extension of persisted log files.
pub const LOG_FILE_EXTENSION: &str = "log";

/// `chrono` format of the file stem.
pub const LOG_FILE_DATE_FORMAT: &str = "%Y-%m-%d";

/// Returns the file name used for entries dated `date`.
#[must_use]
pub fn file_name_for(date: NaiveDate) -> String {
    format!("{}.{LOG_FILE_EXTENSION}", date.format(LOG_FILE_DATE_FORMAT))
}

/// Append-only writer holding at most one open file.
#[derive(Debug)]
pub struct FileWriter {
    dir: PathBuf,
    current_path: Option<PathBuf>,
    handle: Option<BufWriter<File>>,
}

impl FileWriter {
    /// Creates a writer for `dir`. Nothing is opened until the first write.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            current_path: None,
            handle: None,
        }
    }

    /// Directory the files are written to.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// The file an entry with this timestamp belongs in.
    #[must_use]
    pub fn path_for(&self, timestamp: DateTime<Utc>) -> PathBuf {
        self.dir.join(file_name_for(timestamp.date_naive()))
    }

    /// The currently open file, if any.
    #[must_use]
    pub fn current_path(&self) -> Option<&Path> {
        self.current_path.as_deref()
    }

    /// Appends `entry` to its day file, rotating first if the day changed.
    ///
    /// Every line is flushed before returning.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or file cannot be created, or the
    /// write fails. After a failed open no file is current, so the next write
    /// retries.
    pub fn write(&mut self, entry: &LogEntry) -> Result<()> {
        let target = self.path_for(entry.timestamp());
        if self.current_path.as_deref() != Some(target.as_path()) {
            self.rotate(target)?;
        }

        if let Some(handle) = self.handle.as_mut() {
            writeln!(handle, "{}", entry.to_file_line())?;
            handle.flush()?;
        }
        Ok(())
    }

    /// Flushes and releases the open file. Safe to call with nothing open.
    ///
    /// # Errors
    ///
    /// Returns an error if the final flush fails; the handle is released anyway.
    pub fn close(&mut self) -> Result<()> {
        self.current_path = None;
        if let Some(mut handle) = self.handle.take() {
            handle.flush()?;
            debug!(dir = %self.dir.display(), "log file closed");
        }
        Ok(())
    }

    fn rotate(&mut self, target: PathBuf) -> Result<()> {
        // No file is current until the new one is open.
        self.close()?;

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(&target)?;

        info!(path = %target.display(), "log file opened");
        self.handle = Some(BufWriter::new(file));
        self.current_path = Some(target);
        Ok(())
    }
}

impl Drop for FileWriter {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    fn read_lines(path: &Path) -> Vec<String> {
        fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn file_name_is_utc_date() {
        let date = NaiveDate::from_ymd_opt(2024, 2, 29).unwrap();
        assert_eq!(file_name_for(date), "2024-02-29.log");
    }

    #[test]
    fn first_write_creates_directory_and_file() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("nested/logs");
        let mut writer = FileWriter::new(&dir);

        let entry = LogEntry::new(at(2024, 5, 1, 10), "hello");
        writer.write(&entry).unwrap();

        let path = dir.join("2024-05-01.log");
        assert_eq!(writer.current_path(), Some(path.as_path()));
        assert_eq!(read_lines(&path), vec![entry.to_file_line()]);
    }

    #[test]
    fn writes_are_visible_without_close() {
        let temp = TempDir::new().unwrap();
        let mut writer = FileWriter::new(temp.path());

        writer.write(&LogEntry::new(at(2024, 5, 1, 10), "one")).unwrap();
        writer.write(&LogEntry::new(at(2024, 5, 1, 11), "two")).unwrap();

        let lines = read_lines(&temp.path().join("2024-05-01.log"));
        assert_eq!(lines.len(), 2);
        assert!(lines[1].ends_with("] two"));
    }

    #[test]
    fn day_change_rotates_to_new_file() {
        let temp = TempDir::new().unwrap();
        let mut writer = FileWriter::new(temp.path());

        writer.write(&LogEntry::new(at(2024, 5, 1, 23), "late")).unwrap();
        writer.write(&LogEntry::new(at(2024, 5, 2, 0), "early")).unwrap();

        assert_eq!(read_lines(&temp.path().join("2024-05-01.log")).len(), 1);
        assert_eq!(read_lines(&temp.path().join("2024-05-02.log")).len(), 1);
        assert_eq!(
            writer.current_path(),
            Some(temp.path().join("2024-05-02.log").as_path())
        );
    }

    #[test]
    fn appends_to_existing_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("2024-05-01.log");
        fs::write(&path, "[2024-05-01T00:00:00.000000Z] earlier run\n").unwrap();

        let mut writer = FileWriter::new(temp.path());
        writer.write(&LogEntry::new(at(2024, 5, 1, 9), "this run")).unwrap();

        assert_eq!(read_lines(&path).len(), 2);
    }

    #[test]
    fn close_without_open_is_noop() {
        let temp = TempDir::new().unwrap();
        let mut writer = FileWriter::new(temp.path());
        assert!(writer.close().is_ok());
        assert!(writer.close().is_ok());
        assert!(writer.current_path().is_none());
    }

    #[test]
    fn write_after_close_reopens() {
        let temp = TempDir::new().unwrap();
        let mut writer = FileWriter::new(temp.path());

        writer.write(&LogEntry::new(at(2024, 5, 1, 9), "a")).unwrap();
        writer.close().unwrap();
        writer.write(&LogEntry::new(at(2024, 5, 1, 10), "b")).unwrap();

        assert_eq!(read_lines(&temp.path().join("2024-05-01.log")).len(), 2);
    }

    #[test]
    fn failed_open_leaves_no_current_file() {
        let temp = TempDir::new().unwrap();
        let blocker = temp.path().join("not-a-dir");
        fs::write(&blocker, "file in the way").unwrap();

        let mut writer = FileWriter::new(&blocker);
        let result = writer.write(&LogEntry::new(at(2024, 5, 1, 9), "lost"));

        assert!(result.is_err());
        assert!(writer.current_path().is_none());
    }
}
