//! ---
//! strata_section: "03-persistence-logging"
//! strata_subsection: "module"
//! strata_type: "source"
//! strata_scope: "code"
//! strata_description: "Structured logging core: events, enrichment, sinks, routing."
//! strata_version: "v0.0.0-prealpha"
//! strata_owner: "tbd"
//! ---
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::trace;

use crate::correlation::CorrelationContext;
use crate::error::EnrichmentError;
use crate::event::LogEvent;
use crate::value::Value;

/// Field holding the OS user name.
pub const USER_NAME_FIELD: &str = "EnvironmentUserName";
/// Field holding the host name.
pub const MACHINE_NAME_FIELD: &str = "MachineName";
/// Field holding the process id.
pub const PROCESS_ID_FIELD: &str = "ProcessId";
/// Field holding the per-thread id.
pub const THREAD_ID_FIELD: &str = "ThreadId";
/// Field holding the ambient correlation id.
pub const CORRELATION_ID_FIELD: &str = "CorrelationId";

/// Computes one contextual field for an event.
pub trait Enricher: Send + Sync {
    /// Name of the field this enricher contributes.
    fn field(&self) -> &'static str;

    /// Current value of the field. `Ok(None)` means "nothing to add".
    fn value(&self) -> Result<Option<Value>, EnrichmentError>;
}

/// Ordered set of enrichers applied to every event before routing.
pub struct EnricherChain {
    enrichers: Vec<Box<dyn Enricher>>,
}

impl EnricherChain {
    /// Chain running `enrichers` in order.
    pub fn new(enrichers: Vec<Box<dyn Enricher>>) -> Self {
        Self { enrichers }
    }

    /// A chain that adds nothing.
    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    /// Append an enricher to the end of the chain.
    pub fn push(&mut self, enricher: Box<dyn Enricher>) {
        self.enrichers.push(enricher);
    }

    /// Names of the fields contributed, in application order.
    pub fn fields(&self) -> Vec<&'static str> {
        self.enrichers.iter().map(|e| e.field()).collect()
    }

    /// Apply every enricher. A field already present, whether supplied by the
    /// caller or by an earlier pass, is left untouched; an enricher that fails
    /// or panics contributes nothing.
    pub fn enrich(&self, mut event: LogEvent) -> LogEvent {
        for enricher in &self.enrichers {
            let field = enricher.field();
            if event.has_field(field) {
                continue;
            }
            let value = catch_unwind(AssertUnwindSafe(|| enricher.value()))
                .unwrap_or(Err(EnrichmentError::Panicked { field }));
            match value {
                Ok(Some(value)) => event.insert_enriched(field, value),
                Ok(None) => {}
                Err(err) => trace!(field, error = %err, "enricher skipped"),
            }
        }
        event
    }
}

impl Default for EnricherChain {
    fn default() -> Self {
        Self::new(vec![
            Box::new(UserNameEnricher::new()),
            Box::new(MachineNameEnricher::new()),
            Box::new(ProcessIdEnricher),
            Box::new(ThreadIdEnricher),
            Box::new(CorrelationIdEnricher),
        ])
    }
}

/// Adds the OS user running the process, read once from `USER`/`USERNAME`.
pub struct UserNameEnricher {
    user: Result<String, EnrichmentError>,
}

impl UserNameEnricher {
    /// Resolve the user from the environment.
    pub fn new() -> Self {
        let user = std::env::var("USER")
            .or_else(|_| std::env::var("USERNAME"))
            .map_err(|err| EnrichmentError::Unavailable {
                field: USER_NAME_FIELD,
                reason: err.to_string(),
            });
        Self { user }
    }
}

impl Default for UserNameEnricher {
    fn default() -> Self {
        Self::new()
    }
}

impl Enricher for UserNameEnricher {
    fn field(&self) -> &'static str {
        USER_NAME_FIELD
    }

    fn value(&self) -> Result<Option<Value>, EnrichmentError> {
        self.user.clone().map(|user| Some(Value::Str(user)))
    }
}

/// Adds the host name, resolved once at construction.
pub struct MachineNameEnricher {
    hostname: Result<String, EnrichmentError>,
}

impl MachineNameEnricher {
    /// Resolve the host name.
    pub fn new() -> Self {
        let hostname = hostname::get()
            .map(|h| h.to_string_lossy().to_string())
            .map_err(|err| EnrichmentError::Unavailable {
                field: MACHINE_NAME_FIELD,
                reason: err.to_string(),
            });
        Self { hostname }
    }
}

impl Default for MachineNameEnricher {
    fn default() -> Self {
        Self::new()
    }
}

impl Enricher for MachineNameEnricher {
    fn field(&self) -> &'static str {
        MACHINE_NAME_FIELD
    }

    fn value(&self) -> Result<Option<Value>, EnrichmentError> {
        self.hostname.clone().map(|h| Some(Value::Str(h)))
    }
}

/// Adds the id of the current process.
pub struct ProcessIdEnricher;

impl Enricher for ProcessIdEnricher {
    fn field(&self) -> &'static str {
        PROCESS_ID_FIELD
    }

    fn value(&self) -> Result<Option<Value>, EnrichmentError> {
        Ok(Some(Value::from(std::process::id())))
    }
}

static NEXT_THREAD_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static THREAD_ID: u64 = NEXT_THREAD_ID.fetch_add(1, Ordering::Relaxed);
}

/// Adds a small integer that is stable for the lifetime of the calling thread.
pub struct ThreadIdEnricher;

impl ThreadIdEnricher {
    /// Id assigned to the calling thread.
    pub fn current() -> u64 {
        THREAD_ID.with(|id| *id)
    }
}

impl Enricher for ThreadIdEnricher {
    fn field(&self) -> &'static str {
        THREAD_ID_FIELD
    }

    fn value(&self) -> Result<Option<Value>, EnrichmentError> {
        Ok(Some(Value::UInt(Self::current())))
    }
}

/// Adds the current correlation id; absent context adds nothing.
pub struct CorrelationIdEnricher;

impl Enricher for CorrelationIdEnricher {
    fn field(&self) -> &'static str {
        CORRELATION_ID_FIELD
    }

    fn value(&self) -> Result<Option<Value>, EnrichmentError> {
        Ok(CorrelationContext::current().map(|id| Value::Str(id.as_str().to_owned())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::correlation::CorrelationId;
    use crate::value::Properties;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;
    use strata_common::Level;

    struct Failing;

    impl Enricher for Failing {
        fn field(&self) -> &'static str {
            "Broken"
        }

        fn value(&self) -> Result<Option<Value>, EnrichmentError> {
            Err(EnrichmentError::Unavailable {
                field: "Broken",
                reason: "simulated".into(),
            })
        }
    }

    struct Exploding;

    impl Enricher for Exploding {
        fn field(&self) -> &'static str {
            "Exploding"
        }

        fn value(&self) -> Result<Option<Value>, EnrichmentError> {
            panic!("enricher bug")
        }
    }

    struct Counting {
        calls: Arc<AtomicUsize>,
    }

    impl Enricher for Counting {
        fn field(&self) -> &'static str {
            "Sequence"
        }

        fn value(&self) -> Result<Option<Value>, EnrichmentError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Some(Value::from(n)))
        }
    }

    fn event() -> LogEvent {
        LogEvent::new(Level::Information, "hello", Properties::new())
    }

    #[test]
    fn default_chain_adds_process_and_thread() {
        let enriched = EnricherChain::default().enrich(event());
        assert_eq!(
            enriched.field(PROCESS_ID_FIELD),
            Some(&Value::UInt(u64::from(std::process::id())))
        );
        assert_eq!(
            enriched.field(THREAD_ID_FIELD),
            Some(&Value::UInt(ThreadIdEnricher::current()))
        );
        assert!(enriched.field(CORRELATION_ID_FIELD).is_none());
    }

    #[test]
    fn caller_properties_take_precedence() {
        let chain = EnricherChain::new(vec![Box::new(ProcessIdEnricher)]);
        let event = LogEvent::new(
            Level::Debug,
            "explicit",
            Properties::new().with(PROCESS_ID_FIELD, "caller"),
        );
        let enriched = chain.enrich(event);
        assert_eq!(enriched.field(PROCESS_ID_FIELD), Some(&Value::from("caller")));
        assert!(enriched.enriched().is_empty());
    }

    #[test]
    fn failing_enricher_is_skipped() {
        let chain = EnricherChain::new(vec![Box::new(Failing), Box::new(ProcessIdEnricher)]);
        let enriched = chain.enrich(event());
        assert!(!enriched.has_field("Broken"));
        assert!(enriched.has_field(PROCESS_ID_FIELD));
    }

    #[test]
    fn panicking_enricher_is_skipped() {
        let chain = EnricherChain::new(vec![Box::new(Exploding), Box::new(ProcessIdEnricher)]);
        let enriched = chain.enrich(event());
        assert!(!enriched.has_field("Exploding"));
        assert!(enriched.has_field(PROCESS_ID_FIELD));
    }

    #[test]
    fn enrichment_is_idempotent() {
        let calls = Arc::new(AtomicUsize::new(0));
        let chain = EnricherChain::new(vec![
            Box::new(Counting {
                calls: calls.clone(),
            }),
            Box::new(ThreadIdEnricher),
        ]);
        let once = chain.enrich(event());
        let twice = chain.enrich(once.clone());
        assert_eq!(once, twice);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn correlation_id_follows_scope() {
        let chain = EnricherChain::new(vec![Box::new(CorrelationIdEnricher)]);
        let id = CorrelationId::from("req-1");
        let enriched = CorrelationContext::sync_scope(id, || chain.enrich(event()));
        assert_eq!(enriched.field(CORRELATION_ID_FIELD), Some(&Value::from("req-1")));
        assert!(chain.enrich(event()).field(CORRELATION_ID_FIELD).is_none());
    }

    #[test]
    fn thread_ids_differ_between_threads() {
        let here = ThreadIdEnricher::current();
        let there = std::thread::spawn(ThreadIdEnricher::current).join().unwrap();
        assert_ne!(here, there);
        assert_eq!(here, ThreadIdEnricher::current());
    }
}
