//! ---
//! strata_section: "03-persistence-logging"
//! strata_subsection: "module"
//! strata_type: "source"
//! strata_scope: "code"
//! strata_description: "Structured logging core: events, enrichment, sinks, routing."
//! strata_version: "v0.0.0-prealpha"
//! strata_owner: "tbd"
//! ---
//! Log sinks and their background writers.
//!
//! Every sink renders an event into an owned line on the caller's thread and
//! hands the bytes to a dedicated writer thread. One writer per sink keeps the
//! sink's output serialized and in dispatch order without making callers wait
//! on disk or terminal I/O.
use std::io::{self, Write};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, NaiveDateTime, Timelike, Utc};
use parking_lot::{Condvar, Mutex, RwLock};
use strata_common::{Level, LogFormat, QueueConfig};
use tracing_appender::non_blocking::{ErrorCounter, NonBlocking, NonBlockingBuilder, WorkerGuard};

use crate::error::SinkError;
use crate::event::LogEvent;

pub mod console;
pub mod file;
pub mod memory;
pub mod rolling;

pub use console::{ConsoleSink, ConsoleTarget};
pub use file::FileSink;
pub use memory::MemorySink;
pub use rolling::RollingWriter;

/// A destination that records or displays fully enriched events.
pub trait Sink: Send + Sync {
    /// Name used in reports and diagnostics.
    fn name(&self) -> &str;

    /// Record `event`. Must not retain the reference past the call.
    fn write(&self, event: &LogEvent) -> Result<(), SinkError>;

    /// Block until everything accepted so far is durable or displayed.
    /// Sinks that write synchronously have nothing to do.
    fn flush(&self) -> Result<(), SinkError> {
        Ok(())
    }

    /// Flush pending output and release resources. Idempotent.
    fn close(&self) -> Result<(), SinkError>;
}

/// File rotation period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Rotation {
    /// One file per UTC day.
    Daily,
    /// One file per UTC hour.
    Hourly,
}

impl Rotation {
    fn key_format(&self) -> &'static str {
        match self {
            Rotation::Daily => "%Y%m%d",
            Rotation::Hourly => "%Y%m%d%H",
        }
    }

    fn key_len(&self) -> usize {
        match self {
            Rotation::Daily => 8,
            Rotation::Hourly => 10,
        }
    }

    /// Period identifier embedded in file names, e.g. `20261016` or `2026101614`.
    pub fn period_key(&self, at: DateTime<Utc>) -> String {
        at.format(self.key_format()).to_string()
    }

    /// Start of the period containing `at`.
    pub fn period_start(&self, at: DateTime<Utc>) -> NaiveDateTime {
        let naive = at.naive_utc();
        let hour = match self {
            Rotation::Daily => 0,
            Rotation::Hourly => naive.hour(),
        };
        naive
            .date()
            .and_hms_opt(hour, 0, 0)
            .unwrap_or(naive)
    }

    /// Parse a period key back into the start of its period.
    pub fn parse_key(&self, key: &str) -> Option<NaiveDateTime> {
        if key.len() != self.key_len() || !key.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        match self {
            Rotation::Daily => chrono::NaiveDate::parse_from_str(key, "%Y%m%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0)),
            Rotation::Hourly => {
                let (date, hour) = key.split_at(8);
                let hour: u32 = hour.parse().ok()?;
                chrono::NaiveDate::parse_from_str(date, "%Y%m%d")
                    .ok()
                    .and_then(|d| d.and_hms_opt(hour, 0, 0))
            }
        }
    }
}

/// How many rotated files survive and for how long.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionPolicy {
    /// `None` for sinks that never rotate (console).
    pub rotation: Option<Rotation>,
    /// Newest files kept, the active file included.
    pub max_files: Option<usize>,
    /// Files whose period started before `now - max_age` are deleted.
    pub max_age: Option<Duration>,
}

impl RetentionPolicy {
    /// Keep every file.
    pub const fn none() -> Self {
        Self {
            rotation: None,
            max_files: None,
            max_age: None,
        }
    }

    /// Daily files, deleted after `days` days.
    pub fn daily(days: u32) -> Self {
        Self {
            rotation: Some(Rotation::Daily),
            max_files: None,
            max_age: Some(Duration::from_secs(u64::from(days) * 24 * 60 * 60)),
        }
    }

    /// Hourly files, keeping at most `max_files`.
    pub fn hourly(max_files: usize) -> Self {
        Self {
            rotation: Some(Rotation::Hourly),
            max_files: Some(max_files),
            max_age: None,
        }
    }
}

/// What kind of sink a route uses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkKind {
    /// Console stream.
    Console {
        /// Stream written to.
        target: ConsoleTarget,
        /// Line format.
        format: LogFormat,
    },
    /// Daily rolling JSON file.
    RollingFile {
        /// File name prefix.
        prefix: String,
    },
    /// Hourly window of JSON files.
    HourlyFile {
        /// File name prefix.
        prefix: String,
    },
    /// Sink constructed outside the route table.
    Custom,
}

/// Declared identity, threshold and retention of one sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SinkConfig {
    /// Unique sink name.
    pub name: String,
    /// Destination and format.
    pub kind: SinkKind,
    /// Lowest level the sink records.
    pub minimum_level: Level,
    /// Files kept by file sinks.
    pub retention: RetentionPolicy,
}

/// How long [`BackgroundWriter::flush`] waits for the queue to drain.
pub const FLUSH_TIMEOUT: Duration = Duration::from_secs(2);

/// Leads a flush marker; rendered lines never start with NUL.
const FLUSH_MARKER: &[u8] = b"\0strata-flush\0";

fn marker_ticket(buf: &[u8]) -> Option<u64> {
    let ticket = buf.strip_prefix(FLUSH_MARKER)?;
    Some(u64::from_be_bytes(ticket.try_into().ok()?))
}

/// State shared between a sink and its writer thread.
#[derive(Default)]
struct WriterState {
    /// Last error raised on the writer thread; cleared by the next success.
    failure: Mutex<Option<(io::ErrorKind, String)>>,
    /// Highest flush ticket acknowledged by the writer thread.
    drained: Mutex<u64>,
    drained_signal: Condvar,
}

impl WriterState {
    fn failure(&self) -> Option<io::Error> {
        self.failure
            .lock()
            .as_ref()
            .map(|(kind, message)| io::Error::new(*kind, message.clone()))
    }
}

/// Runs on the writer thread. Latches I/O failures for the sink to report
/// and acknowledges flush markers once prior lines are flushed.
struct MonitoredWriter<W> {
    inner: W,
    state: Arc<WriterState>,
}

impl<W: Write> MonitoredWriter<W> {
    /// Latch an error; only a successful write clears the latch, since a
    /// flush with no open file succeeds trivially.
    fn record<T>(&self, result: io::Result<T>, is_write: bool) -> io::Result<T> {
        let mut failure = self.state.failure.lock();
        match &result {
            Ok(_) if is_write => *failure = None,
            Ok(_) => {}
            Err(err) => *failure = Some((err.kind(), err.to_string())),
        }
        result
    }

    fn acknowledge(&mut self, ticket: u64) -> io::Result<()> {
        let result = self.inner.flush();
        let result = self.record(result, false);
        let mut drained = self.state.drained.lock();
        *drained = (*drained).max(ticket);
        self.state.drained_signal.notify_all();
        result
    }
}

impl<W: Write> Write for MonitoredWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if let Some(ticket) = marker_ticket(buf) {
            return self.acknowledge(ticket).map(|_| buf.len());
        }
        let result = self.inner.write(buf);
        self.record(result, true)
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        if let Some(ticket) = marker_ticket(buf) {
            return self.acknowledge(ticket);
        }
        let result = self.inner.write_all(buf);
        self.record(result, true)
    }

    fn flush(&mut self) -> io::Result<()> {
        let result = self.inner.flush();
        self.record(result, false)
    }
}

/// Queue in front of a sink, drained by one writer thread.
///
/// Errors raised on the writer thread cannot be returned to the caller that
/// queued the line. They are latched instead and returned from every
/// [`send`](Self::send) until a later write succeeds, so the router reports
/// them and falls back.
pub struct BackgroundWriter {
    writer: RwLock<Option<NonBlocking>>,
    guard: Mutex<Option<WorkerGuard>>,
    errors: ErrorCounter,
    state: Arc<WriterState>,
    /// Last flush ticket issued.
    markers: Mutex<u64>,
}

impl BackgroundWriter {
    /// Start the writer thread `thread_name` draining into `writer`.
    pub fn spawn<W>(thread_name: &str, queue: &QueueConfig, writer: W) -> Self
    where
        W: Write + Send + 'static,
    {
        let state = Arc::new(WriterState::default());
        let monitored = MonitoredWriter {
            inner: writer,
            state: state.clone(),
        };
        let (non_blocking, guard) = NonBlockingBuilder::default()
            .lossy(queue.lossy)
            .buffered_lines_limit(queue.buffered_lines_limit)
            .thread_name(thread_name)
            .finish(monitored);
        let errors = non_blocking.error_counter();
        Self {
            writer: RwLock::new(Some(non_blocking)),
            guard: Mutex::new(Some(guard)),
            errors,
            state,
            markers: Mutex::new(0),
        }
    }

    fn handle(&self, sink: &str) -> Result<NonBlocking, SinkError> {
        self.writer
            .read()
            .as_ref()
            .cloned()
            .ok_or_else(|| SinkError::Closed(sink.to_owned()))
    }

    /// Enqueue one complete line.
    ///
    /// The line is queued even while a writer failure is latched, so the
    /// sink recovers once the destination does; the failure is still
    /// returned.
    pub fn send(&self, sink: &str, line: &[u8]) -> Result<(), SinkError> {
        let mut writer = self.handle(sink)?;
        writer.write_all(line)?;
        match self.state.failure() {
            Some(err) => Err(SinkError::Io(err)),
            None => Ok(()),
        }
    }

    /// Wait until every line queued before this call has been written and
    /// flushed, up to `timeout`.
    ///
    /// A marker travels through the queue behind those lines; a lossy queue
    /// that drops it makes this call time out.
    pub fn flush(&self, sink: &str, timeout: Duration) -> Result<(), SinkError> {
        let mut writer = self.handle(sink)?;
        let ticket = {
            let mut issued = self.markers.lock();
            *issued += 1;
            let mut marker = FLUSH_MARKER.to_vec();
            marker.extend_from_slice(&issued.to_be_bytes());
            writer.write_all(&marker)?;
            *issued
        };

        let deadline = Instant::now() + timeout;
        let mut drained = self.state.drained.lock();
        while *drained < ticket {
            if self
                .state
                .drained_signal
                .wait_until(&mut drained, deadline)
                .timed_out()
            {
                return Err(SinkError::Io(io::Error::new(
                    io::ErrorKind::TimedOut,
                    format!("sink '{sink}' did not drain within {timeout:?}"),
                )));
            }
        }
        drop(drained);

        match self.state.failure() {
            Some(err) => Err(SinkError::Io(err)),
            None => Ok(()),
        }
    }

    /// Most recent failure on the writer thread, if it has not recovered.
    pub fn last_failure(&self) -> Option<io::Error> {
        self.state.failure()
    }

    /// Lines dropped because the queue was full.
    pub fn dropped_lines(&self) -> usize {
        self.errors.dropped_lines()
    }

    /// Whether [`close`](Self::close) has run.
    pub fn is_closed(&self) -> bool {
        self.writer.read().is_none()
    }

    /// Stop accepting lines and wait (bounded) for the writer to drain.
    /// Returns the failure latched by the last write, if any.
    pub fn close(&self) -> Result<(), SinkError> {
        self.writer.write().take();
        drop(self.guard.lock().take());
        match self.state.failure() {
            Some(err) => Err(SinkError::Io(err)),
            None => Ok(()),
        }
    }
}

pub(crate) fn render_line(event: &LogEvent, format: LogFormat) -> Result<Vec<u8>, SinkError> {
    let mut line = match format {
        LogFormat::StructuredJson => event.to_json()?,
        LogFormat::Pretty => event.to_pretty(),
    };
    line.push('\n');
    Ok(line.into_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn period_keys_embed_date_and_hour() {
        let at = Utc.with_ymd_and_hms(2026, 10, 16, 14, 42, 5).unwrap();
        assert_eq!(Rotation::Daily.period_key(at), "20261016");
        assert_eq!(Rotation::Hourly.period_key(at), "2026101614");
    }

    #[test]
    fn keys_parse_back_to_period_start() {
        let at = Utc.with_ymd_and_hms(2026, 10, 16, 14, 42, 5).unwrap();
        for rotation in [Rotation::Daily, Rotation::Hourly] {
            let key = rotation.period_key(at);
            assert_eq!(rotation.parse_key(&key), Some(rotation.period_start(at)));
        }
        assert_eq!(Rotation::Daily.parse_key("2026101614"), None);
        assert_eq!(Rotation::Hourly.parse_key("diagnostic"), None);
        assert_eq!(Rotation::Hourly.parse_key("2026101699"), None);
    }

    #[test]
    fn retention_presets() {
        let daily = RetentionPolicy::daily(30);
        assert_eq!(daily.rotation, Some(Rotation::Daily));
        assert_eq!(daily.max_age, Some(Duration::from_secs(30 * 86_400)));
        assert_eq!(RetentionPolicy::hourly(6).max_files, Some(6));
        assert_eq!(RetentionPolicy::none().rotation, None);
    }

    struct Unwritable;

    impl Write for Unwritable {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::PermissionDenied, "read-only volume"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[derive(Clone, Default)]
    struct Slow(Arc<Mutex<Vec<u8>>>);

    impl Write for Slow {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            std::thread::sleep(Duration::from_millis(30));
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn writer_failures_surface_on_later_calls() {
        let writer = BackgroundWriter::spawn("strata-test", &QueueConfig::default(), Unwritable);
        let _ = writer.send("test", b"first\n");
        let flushed = writer.flush("test", FLUSH_TIMEOUT);
        assert!(matches!(
            flushed,
            Err(SinkError::Io(ref e)) if e.kind() == io::ErrorKind::PermissionDenied
        ));
        assert!(matches!(writer.send("test", b"second\n"), Err(SinkError::Io(_))));
        assert!(writer.close().is_err());
    }

    #[test]
    fn flush_waits_for_queued_lines() {
        let slow = Slow::default();
        let queue = QueueConfig::default();
        let writer = BackgroundWriter::spawn("strata-test", &queue, slow.clone());
        for n in 0..3 {
            writer.send("test", format!("line {n}\n").as_bytes()).unwrap();
        }
        writer.flush("test", FLUSH_TIMEOUT).unwrap();
        assert_eq!(&*slow.0.lock(), b"line 0\nline 1\nline 2\n");
        writer.close().unwrap();
        assert!(matches!(writer.flush("test", FLUSH_TIMEOUT), Err(SinkError::Closed(_))));
    }

    #[test]
    fn markers_carry_their_ticket() {
        let mut marker = FLUSH_MARKER.to_vec();
        marker.extend_from_slice(&7u64.to_be_bytes());
        assert_eq!(marker_ticket(&marker), Some(7));
        assert_eq!(marker_ticket(FLUSH_MARKER), None);
        assert_eq!(marker_ticket(b"{\"timestamp\":\"x\"}"), None);
    }
}
