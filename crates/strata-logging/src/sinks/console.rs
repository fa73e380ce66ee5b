//! ---
//! strata_section: "03-persistence-logging"
//! strata_subsection: "module"
//! strata_type: "source"
//! strata_scope: "code"
//! strata_description: "Structured logging core: events, enrichment, sinks, routing."
//! strata_version: "v0.0.0-prealpha"
//! strata_owner: "tbd"
//! ---
use std::io::Write;

use strata_common::{LogFormat, QueueConfig};

use super::{render_line, BackgroundWriter, Sink, FLUSH_TIMEOUT};
use crate::error::SinkError;
use crate::event::LogEvent;

/// Standard stream a console sink writes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConsoleTarget {
    /// Standard output.
    Stdout,
    /// Standard error.
    Stderr,
}

/// Console sink rendering compact JSON or human-readable lines.
pub struct ConsoleSink {
    name: String,
    format: LogFormat,
    writer: BackgroundWriter,
}

impl ConsoleSink {
    /// Console sink writing to the real `target` stream.
    pub fn new(
        name: impl Into<String>,
        target: ConsoleTarget,
        format: LogFormat,
        queue: &QueueConfig,
    ) -> Self {
        let writer: Box<dyn Write + Send> = match target {
            ConsoleTarget::Stdout => Box::new(std::io::stdout()),
            ConsoleTarget::Stderr => Box::new(std::io::stderr()),
        };
        Self::with_writer(name, format, queue, writer)
    }

    /// Console sink over an arbitrary writer, e.g. a captured buffer.
    pub fn with_writer<W>(
        name: impl Into<String>,
        format: LogFormat,
        queue: &QueueConfig,
        writer: W,
    ) -> Self
    where
        W: Write + Send + 'static,
    {
        let name = name.into();
        let writer = BackgroundWriter::spawn(&format!("strata-{name}"), queue, writer);
        Self {
            name,
            format,
            writer,
        }
    }

    /// Line format.
    pub fn format(&self) -> LogFormat {
        self.format
    }

    /// Lines discarded because the queue was full.
    pub fn dropped_lines(&self) -> usize {
        self.writer.dropped_lines()
    }
}

impl Sink for ConsoleSink {
    fn name(&self) -> &str {
        &self.name
    }

    fn write(&self, event: &LogEvent) -> Result<(), SinkError> {
        let line = render_line(event, self.format)?;
        self.writer.send(&self.name, &line)
    }

    fn flush(&self) -> Result<(), SinkError> {
        self.writer.flush(&self.name, FLUSH_TIMEOUT)
    }

    fn close(&self) -> Result<(), SinkError> {
        self.writer.close()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Properties;
    use parking_lot::Mutex;
    use std::sync::Arc;
    use strata_common::Level;

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl Captured {
        fn text(&self) -> String {
            String::from_utf8(self.0.lock().clone()).unwrap()
        }
    }

    #[test]
    fn pretty_format_renders_message() {
        let captured = Captured::default();
        let sink = ConsoleSink::with_writer(
            "console",
            LogFormat::Pretty,
            &QueueConfig::default(),
            captured.clone(),
        );
        let event = LogEvent::new(
            Level::Warning,
            "disk at {Percent}%",
            Properties::new().with("Percent", 91),
        );
        sink.write(&event).unwrap();
        sink.close().unwrap();
        let text = captured.text();
        assert!(text.contains("WRN] disk at 91%"), "{text}");
        assert!(text.ends_with('\n'));
    }

    #[test]
    fn json_format_emits_one_object_per_line() {
        let captured = Captured::default();
        let sink = ConsoleSink::with_writer(
            "console",
            LogFormat::StructuredJson,
            &QueueConfig::default(),
            captured.clone(),
        );
        for n in 0..3 {
            sink.write(&LogEvent::new(Level::Information, "n={N}", Properties::new().with("N", n)))
                .unwrap();
        }
        sink.close().unwrap();
        let text = captured.text();
        let lines: Vec<serde_json::Value> = text
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[2]["message"], "n=2");
    }
}
