//! ---
//! strata_section: "03-persistence-logging"
//! strata_subsection: "module"
//! strata_type: "source"
//! strata_scope: "code"
//! strata_description: "Structured logging core: events, enrichment, sinks, routing."
//! strata_version: "v0.0.0-prealpha"
//! strata_owner: "tbd"
//! ---
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Duration as ChronoDuration, NaiveDateTime, Utc};
use tracing::{debug, warn};
use walkdir::WalkDir;

use super::{RetentionPolicy, Rotation};
use crate::clock::Clock;

struct ActiveFile {
    period: String,
    path: PathBuf,
    writer: BufWriter<File>,
}

/// Appending file writer that switches to a new file every period and prunes
/// expired files whenever it does.
///
/// Files are named `{prefix}-{period}.log`. Retention is decided from the
/// period embedded in each name, not from filesystem timestamps.
pub struct RollingWriter {
    directory: PathBuf,
    prefix: String,
    rotation: Rotation,
    retention: RetentionPolicy,
    clock: Arc<dyn Clock>,
    active: Option<ActiveFile>,
}

impl RollingWriter {
    /// Create the directory if needed, open the file for the current period,
    /// and apply retention once.
    pub fn open(
        directory: &Path,
        prefix: &str,
        retention: RetentionPolicy,
        clock: Arc<dyn Clock>,
    ) -> io::Result<Self> {
        fs::create_dir_all(directory)?;
        let mut writer = Self {
            directory: directory.to_path_buf(),
            prefix: prefix.to_owned(),
            rotation: retention.rotation.unwrap_or(Rotation::Daily),
            retention,
            clock,
            active: None,
        };
        let now = writer.clock.now();
        writer.roll_to(now)?;
        Ok(writer)
    }

    /// Path of the file currently written to.
    pub fn current_path(&self) -> Option<&Path> {
        self.active.as_ref().map(|a| a.path.as_path())
    }

    /// File name for the period key `period`.
    pub fn file_name_for(&self, period: &str) -> String {
        format!("{}-{}.log", self.prefix, period)
    }

    /// Log files owned by this writer, oldest period first.
    pub fn list_files(&self) -> io::Result<Vec<(NaiveDateTime, PathBuf)>> {
        let head = format!("{}-", self.prefix);
        let mut files = Vec::new();
        for entry in WalkDir::new(&self.directory)
            .min_depth(1)
            .max_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            if !entry.file_type().is_file() {
                continue;
            }
            let Some(name) = entry.file_name().to_str() else {
                continue;
            };
            let Some(key) = name
                .strip_prefix(head.as_str())
                .and_then(|rest| rest.strip_suffix(".log"))
            else {
                continue;
            };
            if let Some(start) = self.rotation.parse_key(key) {
                files.push((start, entry.path().to_path_buf()));
            }
        }
        files.sort();
        Ok(files)
    }

    /// Make the file for the period containing `at` the active one.
    fn roll_to(&mut self, at: DateTime<Utc>) -> io::Result<&mut BufWriter<File>> {
        let period = self.rotation.period_key(at);
        let stale = self
            .active
            .as_ref()
            .map(|active| active.period != period)
            .unwrap_or(true);

        if stale {
            if let Some(mut previous) = self.active.take() {
                previous.writer.flush()?;
                debug!(path = %previous.path.display(), "rotating log file");
            }
            let path = self.directory.join(self.file_name_for(&period));
            let file = OpenOptions::new().create(true).append(true).open(&path)?;
            self.active = Some(ActiveFile {
                period,
                path,
                writer: BufWriter::new(file),
            });
            self.prune(self.clock.now());
        }

        match self.active.as_mut() {
            Some(active) => Ok(&mut active.writer),
            None => Err(io::Error::new(io::ErrorKind::Other, "no active log file")),
        }
    }

    /// Delete files outside the retention window, oldest first. The active
    /// file is never deleted. Returns the removed paths.
    pub fn prune(&self, now: DateTime<Utc>) -> Vec<PathBuf> {
        let files = match self.list_files() {
            Ok(files) => files,
            Err(err) => {
                warn!(
                    directory = %self.directory.display(),
                    error = %err,
                    "unable to list log files"
                );
                return Vec::new();
            }
        };
        let active = self.current_path();
        let mut doomed: Vec<&PathBuf> = Vec::new();

        if let Some(max_age) = self.retention.max_age {
            let max_age = ChronoDuration::from_std(max_age).unwrap_or(ChronoDuration::MAX);
            let cutoff = now
                .checked_sub_signed(max_age)
                .map(|c| self.rotation.period_start(c));
            if let Some(cutoff) = cutoff {
                doomed.extend(
                    files
                        .iter()
                        .filter(|(start, _)| *start < cutoff)
                        .map(|(_, path)| path),
                );
            }
        }

        if let Some(max_files) = self.retention.max_files {
            let excess = files.len().saturating_sub(max_files.max(1));
            for (_, path) in files.iter().take(excess) {
                if !doomed.contains(&path) {
                    doomed.push(path);
                }
            }
        }

        doomed.sort();
        let mut removed = Vec::new();
        for path in doomed {
            if Some(path.as_path()) == active {
                continue;
            }
            match fs::remove_file(path) {
                Ok(()) => {
                    debug!(path = %path.display(), "removed expired log file");
                    removed.push(path.clone());
                }
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "unable to remove expired log file")
                }
            }
        }
        removed
    }
}

/// Timestamp of a rendered JSON record, which always leads the object.
fn record_timestamp(line: &[u8]) -> Option<DateTime<Utc>> {
    let rest = line.strip_prefix(br#"{"timestamp":""#)?;
    let end = rest.iter().position(|b| *b == b'"')?;
    let text = std::str::from_utf8(&rest[..end]).ok()?;
    DateTime::parse_from_rfc3339(text)
        .ok()
        .map(|at| at.with_timezone(&Utc))
}

/// Records are filed under the period of their own timestamp; anything else
/// goes to the period of the current clock time.
impl Write for RollingWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let at = record_timestamp(buf).unwrap_or_else(|| self.clock.now());
        self.roll_to(at)?.write(buf)
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        let at = record_timestamp(buf).unwrap_or_else(|| self.clock.now());
        self.roll_to(at)?.write_all(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.active.as_mut() {
            Some(active) => active.writer.flush(),
            None => Ok(()),
        }
    }
}

impl Drop for RollingWriter {
    fn drop(&mut self) {
        let _ = self.flush();
    }
}
