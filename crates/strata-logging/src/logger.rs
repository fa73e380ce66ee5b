//! ---
//! strata_section: "03-persistence-logging"
//! strata_subsection: "module"
//! strata_type: "source"
//! strata_scope: "code"
//! strata_description: "Structured logging core: events, enrichment, sinks, routing."
//! strata_version: "v0.0.0-prealpha"
//! strata_owner: "tbd"
//! ---
//! Logger facade used by application code.
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use strata_common::Level;

use crate::clock::{system_clock, Clock};
use crate::event::{ExceptionInfo, LogEvent};
use crate::router::Router;
use crate::value::Properties;

/// Contract for anything application code logs through.
///
/// Logging never fails from the caller's point of view: implementations
/// swallow and report their own errors.
pub trait Log: Send + Sync {
    /// Whether an event at `level` would reach at least one destination.
    fn is_enabled(&self, level: Level) -> bool;

    /// Build, enrich and dispatch one event. Never fails and never panics.
    fn write(
        &self,
        level: Level,
        exception: Option<ExceptionInfo>,
        message_template: &str,
        properties: Properties,
    );

    /// Log at [`Level::Trace`].
    fn trace(&self, message_template: &str, properties: Properties) {
        self.write(Level::Trace, None, message_template, properties);
    }

    /// Log at [`Level::Debug`].
    fn debug(&self, message_template: &str, properties: Properties) {
        self.write(Level::Debug, None, message_template, properties);
    }

    /// Log at [`Level::Information`].
    fn info(&self, message_template: &str, properties: Properties) {
        self.write(Level::Information, None, message_template, properties);
    }

    /// Log at [`Level::Warning`].
    fn warn(&self, message_template: &str, properties: Properties) {
        self.write(Level::Warning, None, message_template, properties);
    }

    /// Log at [`Level::Error`].
    fn error(&self, message_template: &str, properties: Properties) {
        self.write(Level::Error, None, message_template, properties);
    }

    /// Error event carrying `error` and its cause chain.
    fn error_with(
        &self,
        error: &(dyn std::error::Error + 'static),
        message_template: &str,
        properties: Properties,
    ) {
        self.write(
            Level::Error,
            Some(ExceptionInfo::from_error(error)),
            message_template,
            properties,
        );
    }
}

/// Router-backed logger. Cheap to clone; clones share the router.
#[derive(Clone)]
pub struct Logger {
    router: Arc<Router>,
    clock: Arc<dyn Clock>,
}

impl Logger {
    /// Logger dispatching through `router`, stamped by the system clock.
    pub fn new(router: Arc<Router>) -> Self {
        Self {
            router,
            clock: system_clock(),
        }
    }

    /// Stamp events from `clock` instead of the system clock.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Router events are dispatched through.
    pub fn router(&self) -> &Arc<Router> {
        &self.router
    }
}

impl Log for Logger {
    fn is_enabled(&self, level: Level) -> bool {
        self.router.accepts(level)
    }

    fn write(
        &self,
        level: Level,
        exception: Option<ExceptionInfo>,
        message_template: &str,
        properties: Properties,
    ) {
        if !self.router.accepts(level) {
            return;
        }
        let delivered = catch_unwind(AssertUnwindSafe(|| {
            let mut event = LogEvent::at(self.clock.now(), level, message_template, properties);
            if let Some(exception) = exception {
                event = event.with_exception(exception);
            }
            let event = self.router.enrichers().enrich(event);
            self.router.dispatch(&event);
        }));
        if delivered.is_err() {
            self.router
                .fallback()
                .notice(&format!("logging call panicked; event '{message_template}' lost"));
        }
    }
}
