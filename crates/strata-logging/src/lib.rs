//! ---
//! strata_section: "03-persistence-logging"
//! strata_subsection: "module"
//! strata_type: "source"
//! strata_scope: "code"
//! strata_description: "Structured logging core: events, enrichment, sinks, routing."
//! strata_version: "v0.0.0-prealpha"
//! strata_owner: "tbd"
//! ---
//! Structured logging core.
//!
//! Application code logs through [`Log`]; a [`Logger`] builds a [`LogEvent`],
//! runs it through the [`EnricherChain`] and hands it to the [`Router`], which
//! fans it out to the sinks selected for the process [`Mode`]. The router is
//! built once by the entry point and shared as `Arc<Router>`.
#![warn(missing_docs)]

pub mod clock;
pub mod correlation;
pub mod enrich;
pub mod error;
pub mod event;
pub mod fallback;
pub mod legacy;
pub mod logger;
pub mod macros;
pub mod router;
pub mod sinks;
pub mod template;
pub mod value;

pub use clock::{Clock, ManualClock, SystemClock};
pub use correlation::{CorrelationContext, CorrelationGuard, CorrelationId};
pub use enrich::{Enricher, EnricherChain};
pub use error::{EnrichmentError, SinkError};
pub use event::{ExceptionInfo, LogEvent};
pub use fallback::FallbackChannel;
pub use legacy::LegacyLogger;
pub use logger::{Log, Logger};
pub use router::{route_table, DispatchReport, Route, Router, RouterBuilder, ShutdownReport};
pub use sinks::{RetentionPolicy, Rotation, Sink, SinkConfig, SinkKind};
pub use strata_common::{ConfigurationError, Level, LogFormat, LoggingConfig, Mode};
pub use value::{Properties, Value};
