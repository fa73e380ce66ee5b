//! ---
//! strata_section: "03-persistence-logging"
//! strata_subsection: "module"
//! strata_type: "source"
//! strata_scope: "code"
//! strata_description: "Structured logging core: events, enrichment, sinks, routing."
//! strata_version: "v0.0.0-prealpha"
//! strata_owner: "tbd"
//! ---
use std::fmt;
use std::io::Write;

use parking_lot::Mutex;

use crate::error::SinkError;
use crate::event::LogEvent;

/// Last-resort channel for sink failures and undeliverable events.
///
/// Writes are synchronous and best effort; a failure to write here is
/// ignored.
pub struct FallbackChannel {
    writer: Mutex<Box<dyn Write + Send>>,
}

impl FallbackChannel {
    /// Channel writing to standard error.
    pub fn stderr() -> Self {
        Self::new(std::io::stderr())
    }

    /// Channel writing to `writer`.
    pub fn new<W>(writer: W) -> Self
    where
        W: Write + Send + 'static,
    {
        Self {
            writer: Mutex::new(Box::new(writer)),
        }
    }

    /// Report that `sink` failed to record an event.
    pub fn report(&self, sink: &str, error: &SinkError) {
        self.line(format_args!("strata: sink '{sink}' failed: {error}"));
    }

    /// Emit an event no sink could record.
    pub fn deliver(&self, event: &LogEvent) {
        let rendered = event.to_json().unwrap_or_else(|_| event.to_pretty());
        self.line(format_args!("strata: undelivered event {rendered}"));
    }

    /// Free-form line about the logging pipeline itself.
    pub fn notice(&self, message: &str) {
        self.line(format_args!("strata: {message}"));
    }

    fn line(&self, args: fmt::Arguments<'_>) {
        let mut writer = self.writer.lock();
        let _ = writer.write_fmt(args);
        let _ = writer.write_all(b"\n");
        let _ = writer.flush();
    }
}

impl Default for FallbackChannel {
    fn default() -> Self {
        Self::stderr()
    }
}
