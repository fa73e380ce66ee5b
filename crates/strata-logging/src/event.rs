//! ---
//! strata_section: "03-persistence-logging"
//! strata_subsection: "module"
//! strata_type: "source"
//! strata_scope: "code"
//! strata_description: "Structured logging core: events, enrichment, sinks, routing."
//! strata_version: "v0.0.0-prealpha"
//! strata_owner: "tbd"
//! ---
use std::fmt::Write as _;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Serialize, Serializer};
use strata_common::Level;

use crate::template;
use crate::value::{Properties, Value};

/// Error captured alongside an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExceptionInfo {
    /// Display text of the error.
    pub message: String,
    /// Rendered cause chain, one cause per line.
    #[serde(rename = "stackTrace", skip_serializing_if = "Option::is_none")]
    pub stack_trace: Option<String>,
}

impl ExceptionInfo {
    /// Exception with `message` and no stack trace.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            stack_trace: None,
        }
    }

    /// Attach a stack trace.
    pub fn with_stack_trace(mut self, stack_trace: impl Into<String>) -> Self {
        self.stack_trace = Some(stack_trace.into());
        self
    }

    /// Capture an error and its `source()` chain. The chain becomes the
    /// stack trace text, one `caused by:` line per cause.
    pub fn from_error(error: &(dyn std::error::Error + 'static)) -> Self {
        let mut chain = String::new();
        let mut source = error.source();
        while let Some(cause) = source {
            if !chain.is_empty() {
                chain.push('\n');
            }
            let _ = write!(chain, "caused by: {cause}");
            source = cause.source();
        }
        Self {
            message: error.to_string(),
            stack_trace: (!chain.is_empty()).then_some(chain),
        }
    }
}

/// A single log record. Created once per logging call and never mutated by
/// sinks, which only ever see `&LogEvent`.
#[derive(Debug, Clone, PartialEq)]
pub struct LogEvent {
    timestamp: DateTime<Utc>,
    level: Level,
    message_template: String,
    properties: Properties,
    enriched: Properties,
    exception: Option<ExceptionInfo>,
}

impl LogEvent {
    /// Create an event stamped with the current UTC time.
    pub fn new(level: Level, message_template: impl Into<String>, properties: Properties) -> Self {
        Self::at(Utc::now(), level, message_template, properties)
    }

    /// Event stamped with an explicit timestamp.
    pub fn at(
        timestamp: DateTime<Utc>,
        level: Level,
        message_template: impl Into<String>,
        properties: Properties,
    ) -> Self {
        Self {
            timestamp,
            level,
            message_template: message_template.into(),
            properties,
            enriched: Properties::new(),
            exception: None,
        }
    }

    /// Attach an exception.
    pub fn with_exception(mut self, exception: ExceptionInfo) -> Self {
        self.exception = Some(exception);
        self
    }

    /// When the event was created.
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Severity of the event.
    pub fn level(&self) -> Level {
        self.level
    }

    /// Template the message was rendered from.
    pub fn message_template(&self) -> &str {
        &self.message_template
    }

    /// Caller-supplied properties.
    pub fn properties(&self) -> &Properties {
        &self.properties
    }

    /// Fields added by the enricher chain.
    pub fn enriched(&self) -> &Properties {
        &self.enriched
    }

    /// Exception captured with the event, if any.
    pub fn exception(&self) -> Option<&ExceptionInfo> {
        self.exception.as_ref()
    }

    /// Look a field up by name; caller properties shadow enriched fields.
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.properties.get(name).or_else(|| self.enriched.get(name))
    }

    /// Whether `name` is a caller property or an enriched field.
    pub fn has_field(&self, name: &str) -> bool {
        self.properties.contains_key(name) || self.enriched.contains_key(name)
    }

    /// Caller properties followed by non-colliding enriched fields.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.properties.iter().chain(
            self.enriched
                .iter()
                .filter(|(name, _)| !self.properties.contains_key(name)),
        )
    }

    pub(crate) fn insert_enriched(&mut self, name: &str, value: Value) {
        if !self.has_field(name) {
            self.enriched.insert(name, value);
        }
    }

    /// Render the message template against this event's fields.
    pub fn render_message(&self) -> String {
        template::render(&self.message_template, |name| self.field(name))
    }

    /// Serialize as a single JSON line (no trailing newline).
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&JsonRecord::from(self))
    }

    /// Human-readable single line, followed by exception lines if present.
    pub fn to_pretty(&self) -> String {
        let mut line = format!(
            "[{} {}] {}",
            self.timestamp.format("%H:%M:%S%.3f"),
            self.level.short_code(),
            self.render_message()
        );
        if let Some(correlation) = self.field(crate::enrich::CORRELATION_ID_FIELD) {
            let _ = write!(line, " ({correlation})");
        }
        if let Some(exception) = &self.exception {
            let _ = write!(line, "\n{}", exception.message);
            if let Some(trace) = &exception.stack_trace {
                let _ = write!(line, "\n{trace}");
            }
        }
        line
    }
}

#[derive(Serialize)]
struct JsonRecord<'a> {
    timestamp: String,
    level: Level,
    message: String,
    #[serde(rename = "messageTemplate")]
    message_template: &'a str,
    properties: MergedFields<'a>,
    #[serde(skip_serializing_if = "Option::is_none")]
    exception: Option<&'a ExceptionInfo>,
}

impl<'a> From<&'a LogEvent> for JsonRecord<'a> {
    fn from(event: &'a LogEvent) -> Self {
        Self {
            timestamp: event
                .timestamp
                .to_rfc3339_opts(SecondsFormat::Micros, true),
            level: event.level,
            message: event.render_message(),
            message_template: &event.message_template,
            properties: MergedFields(event),
            exception: event.exception.as_ref(),
        }
    }
}

struct MergedFields<'a>(&'a LogEvent);

impl Serialize for MergedFields<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.0.fields())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample() -> LogEvent {
        let ts = Utc.with_ymd_and_hms(2026, 10, 16, 8, 15, 30).unwrap();
        LogEvent::at(
            ts,
            Level::Information,
            "User {UserId} logged in from {MachineName}",
            Properties::new().with("UserId", 42),
        )
    }

    #[test]
    fn caller_properties_shadow_enriched_fields() {
        let mut event = sample();
        event.insert_enriched("UserId", Value::from(7));
        event.insert_enriched("MachineName", Value::from("host-a"));
        assert_eq!(event.field("UserId"), Some(&Value::Int(42)));
        assert!(!event.enriched().contains_key("UserId"));
        assert_eq!(event.render_message(), "User 42 logged in from host-a");
    }

    #[test]
    fn json_line_contains_required_keys() {
        let mut event = sample();
        event.insert_enriched("ProcessId", Value::from(99u32));
        let line = event.to_json().unwrap();
        assert!(!line.contains('\n'));

        let parsed: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(parsed["timestamp"], "2026-10-16T08:15:30.000000Z");
        assert_eq!(parsed["level"], "Information");
        assert_eq!(parsed["message"], "User 42 logged in from {MachineName}");
        assert_eq!(parsed["messageTemplate"], "User {UserId} logged in from {MachineName}");
        assert_eq!(parsed["properties"]["UserId"], 42);
        assert_eq!(parsed["properties"]["ProcessId"], 99);
        assert!(parsed.get("exception").is_none());
    }

    #[test]
    fn exception_captures_source_chain() {
        #[derive(Debug, thiserror::Error)]
        #[error("request failed")]
        struct Outer(#[source] std::io::Error);

        let err = Outer(std::io::Error::new(std::io::ErrorKind::Other, "disk full"));
        let info = ExceptionInfo::from_error(&err);
        assert_eq!(info.message, "request failed");
        assert_eq!(info.stack_trace.as_deref(), Some("caused by: disk full"));

        let event = sample().with_exception(info);
        let parsed: serde_json::Value = serde_json::from_str(&event.to_json().unwrap()).unwrap();
        assert_eq!(parsed["exception"]["message"], "request failed");
        assert_eq!(parsed["exception"]["stackTrace"], "caused by: disk full");
    }

    #[test]
    fn pretty_line_uses_short_level() {
        let line = sample().to_pretty();
        assert!(line.starts_with("[08:15:30.000 INF] User 42 logged in"));
    }
}
