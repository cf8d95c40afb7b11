//! Time-based deletion of persisted log files.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{Days, NaiveDate, Utc};
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::file_writer::{LOG_FILE_DATE_FORMAT, LOG_FILE_EXTENSION};

/// Default pause between sweeps.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Outcome of one sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Files removed.
    pub deleted: Vec<PathBuf>,
    /// `.log` files whose names are not dates.
    pub skipped: usize,
    /// Expired files that could not be removed.
    pub failed: usize,
}

/// Deletes day files older than `keep_days`.
///
/// Sweeping is best-effort: unparseable names are left alone and removal
/// errors are logged and skipped. A `keep_days` of zero or less disables it.
#[derive(Debug, Clone)]
pub struct RetentionSweeper {
    dir: PathBuf,
    keep_days: i64,
}

impl RetentionSweeper {
    /// Creates a sweeper for `dir`.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>, keep_days: i64) -> Self {
        Self {
            dir: dir.into(),
            keep_days,
        }
    }

    /// Returns true if sweeping does anything.
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.keep_days > 0
    }

    /// Directory being swept.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Sweeps relative to today's UTC date.
    pub fn sweep(&self) -> SweepReport {
        self.sweep_at(Utc::now().date_naive())
    }

    /// Sweeps relative to `today`: files dated before `today - keep_days` go.
    pub fn sweep_at(&self, today: NaiveDate) -> SweepReport {
        let mut report = SweepReport::default();
        if !self.is_enabled() {
            return report;
        }

        let Some(cutoff) = today.checked_sub_days(Days::new(self.keep_days.unsigned_abs())) else {
            return report;
        };

        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(dir = %self.dir.display(), error = %e, "cannot list log directory");
                return report;
            }
        };

        for path in entries.filter_map(|e| e.ok()).map(|e| e.path()) {
            if path.extension().is_none_or(|ext| ext != LOG_FILE_EXTENSION) {
                continue;
            }
            let Some(date) = file_date(&path) else {
                report.skipped += 1;
                continue;
            };
            if date >= cutoff {
                continue;
            }

            match fs::remove_file(&path) {
                Ok(()) => {
                    debug!(path = %path.display(), "expired log file removed");
                    report.deleted.push(path);
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "failed to remove expired log file");
                    report.failed += 1;
                }
            }
        }

        if !report.deleted.is_empty() {
            info!(
                deleted = report.deleted.len(),
                failed = report.failed,
                cutoff = %cutoff,
                "retention sweep finished"
            );
        }
        report
    }

    /// Sweeps every `period` until `cancel` fires.
    ///
    /// The first sweep happens one full period after start. Each sweep runs on
    /// the blocking pool; a panic inside one is logged and the loop continues.
    pub async fn run(self, period: Duration, cancel: CancellationToken) {
        if !self.is_enabled() {
            debug!("retention disabled, sweeper not running");
            return;
        }

        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(
            dir = %self.dir.display(),
            keep_days = self.keep_days,
            period_secs = period.as_secs(),
            "retention sweeper started"
        );

        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    let sweeper = self.clone();
                    if let Err(e) = tokio::task::spawn_blocking(move || sweeper.sweep()).await {
                        warn!(error = %e, "retention sweep aborted");
                    }
                }
            }
        }

        info!("retention sweeper stopped");
    }
}

fn file_date(path: &Path) -> Option<NaiveDate> {
    let stem = path.file_stem()?.to_str()?;
    NaiveDate::parse_from_str(stem, LOG_FILE_DATE_FORMAT).ok()
}
