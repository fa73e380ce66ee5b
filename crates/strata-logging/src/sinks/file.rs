//! ---
//! strata_section: "03-persistence-logging"
//! strata_subsection: "module"
//! strata_type: "source"
//! strata_scope: "code"
//! strata_description: "Structured logging core: events, enrichment, sinks, routing."
//! strata_version: "v0.0.0-prealpha"
//! strata_owner: "tbd"
//! ---
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use strata_common::{LogFormat, QueueConfig};

use super::{
    render_line, BackgroundWriter, RetentionPolicy, RollingWriter, Sink, FLUSH_TIMEOUT,
};
use crate::clock::Clock;
use crate::error::SinkError;
use crate::event::LogEvent;

/// Newline-delimited JSON file sink with period rotation.
///
/// Serves both the daily rolling sink and the hourly diagnostic window; the
/// [`RetentionPolicy`] picks the behaviour.
pub struct FileSink {
    name: String,
    directory: PathBuf,
    retention: RetentionPolicy,
    writer: BackgroundWriter,
}

impl FileSink {
    /// Open the sink. The first file is created eagerly so an unwritable
    /// directory fails here rather than on the writer thread.
    pub fn open(
        name: impl Into<String>,
        directory: &Path,
        prefix: &str,
        retention: RetentionPolicy,
        queue: &QueueConfig,
        clock: Arc<dyn Clock>,
    ) -> io::Result<Self> {
        let name = name.into();
        let rolling = RollingWriter::open(directory, prefix, retention, clock)?;
        let writer = BackgroundWriter::spawn(&format!("strata-{name}"), queue, rolling);
        Ok(Self {
            name,
            directory: directory.to_path_buf(),
            retention,
            writer,
        })
    }

    /// Directory holding the files.
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Retention applied on rotation.
    pub fn retention(&self) -> RetentionPolicy {
        self.retention
    }

    /// Lines dropped because the queue was full.
    pub fn dropped_lines(&self) -> usize {
        self.writer.dropped_lines()
    }

    /// Failure latched by the writer thread, until a later write succeeds.
    pub fn last_failure(&self) -> Option<io::Error> {
        self.writer.last_failure()
    }
}

impl Sink for FileSink {
    fn name(&self) -> &str {
        &self.name
    }

    fn write(&self, event: &LogEvent) -> Result<(), SinkError> {
        let line = render_line(event, LogFormat::StructuredJson)?;
        self.writer.send(&self.name, &line)
    }

    fn flush(&self) -> Result<(), SinkError> {
        self.writer.flush(&self.name, FLUSH_TIMEOUT)
    }

    fn close(&self) -> Result<(), SinkError> {
        self.writer.close()
    }
}
