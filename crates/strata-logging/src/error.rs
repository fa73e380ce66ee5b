//! ---
//! strata_section: "03-persistence-logging"
//! strata_subsection: "module"
//! strata_type: "source"
//! strata_scope: "code"
//! strata_description: "Structured logging core: events, enrichment, sinks, routing."
//! strata_version: "v0.0.0-prealpha"
//! strata_owner: "tbd"
//! ---
/// Failure of a single sink to record an event.
///
/// Recovered by the router: the sink is skipped for that event and the
/// failure is reported on the fallback channel.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    /// Wrapper for IO errors raised while writing or opening files.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// Wrapper for JSON serialization issues.
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
    /// The sink has been closed and accepts no more events.
    #[error("sink '{0}' is closed")]
    Closed(String),
    /// The sink panicked while handling an event.
    #[error("sink '{0}' panicked while writing")]
    Panicked(String),
}

/// Failure of an enricher to compute its field. The field is omitted.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EnrichmentError {
    /// The value could not be read from the environment.
    #[error("{field} unavailable: {reason}")]
    Unavailable {
        /// Field the enricher contributes.
        field: &'static str,
        /// Why the value is missing.
        reason: String,
    },
    /// The enricher panicked while computing its value.
    #[error("{field} enricher panicked")]
    Panicked {
        /// Field the enricher contributes.
        field: &'static str,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errors_render_context() {
        let err = SinkError::Closed("rolling-file".into());
        assert_eq!(err.to_string(), "sink 'rolling-file' is closed");

        let err = EnrichmentError::Unavailable {
            field: "MachineName",
            reason: "no hostname".into(),
        };
        assert_eq!(err.to_string(), "MachineName unavailable: no hostname");
    }
}
