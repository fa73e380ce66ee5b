//! ---
//! strata_section: "03-persistence-logging"
//! strata_subsection: "module"
//! strata_type: "source"
//! strata_scope: "code"
//! strata_description: "Structured logging core: events, enrichment, sinks, routing."
//! strata_version: "v0.0.0-prealpha"
//! strata_owner: "tbd"
//! ---
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;

use super::Sink;
use crate::error::SinkError;
use crate::event::LogEvent;

/// Sink that keeps a copy of every event in memory. Intended for tests and
/// for embedding applications that inspect their own output.
#[derive(Default)]
pub struct MemorySink {
    name: String,
    events: Mutex<Vec<LogEvent>>,
    closed: AtomicBool,
}

impl MemorySink {
    /// Empty sink called `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Copy of everything received so far.
    pub fn events(&self) -> Vec<LogEvent> {
        self.events.lock().clone()
    }

    /// Rendered messages of everything received so far.
    pub fn messages(&self) -> Vec<String> {
        self.events
            .lock()
            .iter()
            .map(LogEvent::render_message)
            .collect()
    }

    /// Number of events recorded.
    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    /// Whether nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether `close` has been called.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl Sink for MemorySink {
    fn name(&self) -> &str {
        &self.name
    }

    fn write(&self, event: &LogEvent) -> Result<(), SinkError> {
        if self.is_closed() {
            return Err(SinkError::Closed(self.name.clone()));
        }
        self.events.lock().push(event.clone());
        Ok(())
    }

    fn close(&self) -> Result<(), SinkError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}
