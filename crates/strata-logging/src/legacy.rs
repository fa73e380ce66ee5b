//! ---
//! strata_section: "03-persistence-logging"
//! strata_subsection: "module"
//! strata_type: "source"
//! strata_scope: "code"
//! strata_description: "Structured logging core: events, enrichment, sinks, routing."
//! strata_version: "v0.0.0-prealpha"
//! strata_owner: "tbd"
//! ---
//! Compatibility logger that forwards into the process `tracing` subscriber.
//!
//! Components that already log through `tracing` can be handed a
//! [`LegacyLogger`] in place of a router-backed [`Logger`](crate::Logger);
//! events are enriched the same way but rendered by whatever subscriber the
//! process installed.
use strata_common::Level;
use tracing::event;

use crate::enrich::EnricherChain;
use crate::event::{ExceptionInfo, LogEvent};
use crate::logger::Log;
use crate::value::Properties;

/// `tracing` target legacy events are emitted under.
pub const LEGACY_TARGET: &str = "strata::legacy";

/// Forwards events into the installed `tracing` subscriber.
pub struct LegacyLogger {
    enrichers: EnricherChain,
    minimum_level: Level,
}

impl LegacyLogger {
    /// Logger admitting events at `minimum_level` or above.
    pub fn new(enrichers: EnricherChain, minimum_level: Level) -> Self {
        Self {
            enrichers,
            minimum_level,
        }
    }

    /// Lowest level forwarded.
    pub fn minimum_level(&self) -> Level {
        self.minimum_level
    }
}

impl Default for LegacyLogger {
    fn default() -> Self {
        Self::new(EnricherChain::default(), Level::Information)
    }
}

macro_rules! forward {
    ($level:expr, $event:expr, $fields:expr, $exception:expr) => {
        event!(
            target: LEGACY_TARGET,
            $level,
            template = $event.message_template(),
            fields = %$fields,
            exception = $exception,
            "{}",
            $event.render_message()
        )
    };
}

impl Log for LegacyLogger {
    fn is_enabled(&self, level: Level) -> bool {
        level >= self.minimum_level
    }

    fn write(
        &self,
        level: Level,
        exception: Option<ExceptionInfo>,
        message_template: &str,
        properties: Properties,
    ) {
        if !self.is_enabled(level) {
            return;
        }
        let mut event = LogEvent::new(level, message_template, properties);
        if let Some(exception) = exception {
            event = event.with_exception(exception);
        }
        let event = self.enrichers.enrich(event);
        let fields: Properties = event
            .fields()
            .map(|(name, value)| (name, value.clone()))
            .collect();
        let fields = serde_json::to_string(&fields).unwrap_or_default();
        let exception = event.exception().map(|e| e.message.as_str());

        match level {
            Level::Trace => forward!(tracing::Level::TRACE, event, fields, exception),
            Level::Debug => forward!(tracing::Level::DEBUG, event, fields, exception),
            Level::Information => forward!(tracing::Level::INFO, event, fields, exception),
            Level::Warning => forward!(tracing::Level::WARN, event, fields, exception),
            Level::Error => forward!(tracing::Level::ERROR, event, fields, exception),
        }
    }
}
