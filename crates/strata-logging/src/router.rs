//! ---
//! strata_section: "03-persistence-logging"
//! strata_subsection: "module"
//! strata_type: "source"
//! strata_scope: "code"
//! strata_description: "Structured logging core: events, enrichment, sinks, routing."
//! strata_version: "v0.0.0-prealpha"
//! strata_owner: "tbd"
//! ---
//! Mode-driven routing of events to sinks.
//!
//! | Mode        | Sinks                                    | Minimum     | Retention      |
//! |-------------|------------------------------------------|-------------|----------------|
//! | Production  | console (stderr), daily rolling file     | Information | 30 days        |
//! | Diagnostic  | hourly file window                       | Trace       | newest 6 files |
//! | Development | console (stdout, all levels), daily file | Debug       | 7 days         |
//!
//! Retention figures are the [`LoggingConfig`] defaults.
use std::io::Write;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use strata_common::{ConfigurationError, Level, LogFormat, LoggingConfig, Mode};
use tracing::{debug, info, warn};

use crate::clock::{system_clock, Clock};
use crate::enrich::EnricherChain;
use crate::error::SinkError;
use crate::event::LogEvent;
use crate::fallback::FallbackChannel;
use crate::sinks::{
    ConsoleSink, ConsoleTarget, FileSink, RetentionPolicy, Sink, SinkConfig, SinkKind,
};

/// Name of the console sink.
pub const CONSOLE_SINK: &str = "console";
/// Name of the daily rolling file sink.
pub const ROLLING_FILE_SINK: &str = "rolling-file";
/// Name of the hourly diagnostic file sink.
pub const HOURLY_FILE_SINK: &str = "hourly-file";

/// Sinks, thresholds and retention for `mode`. Pure and deterministic.
pub fn route_table(mode: Mode, config: &LoggingConfig) -> Vec<SinkConfig> {
    let level = |default: Level| config.minimum_level.unwrap_or(default);
    let retention = &config.retention;
    match mode {
        Mode::Production => vec![
            SinkConfig {
                name: CONSOLE_SINK.to_owned(),
                kind: SinkKind::Console {
                    target: ConsoleTarget::Stderr,
                    format: config.console_format.unwrap_or(LogFormat::StructuredJson),
                },
                minimum_level: level(Level::Information),
                retention: RetentionPolicy::none(),
            },
            SinkConfig {
                name: ROLLING_FILE_SINK.to_owned(),
                kind: SinkKind::RollingFile {
                    prefix: config.file_prefix.clone(),
                },
                minimum_level: level(Level::Information),
                retention: RetentionPolicy::daily(retention.production_days),
            },
        ],
        Mode::Diagnostic => vec![SinkConfig {
            name: HOURLY_FILE_SINK.to_owned(),
            kind: SinkKind::HourlyFile {
                prefix: format!("{}-diagnostic", config.file_prefix),
            },
            minimum_level: level(Level::Trace),
            retention: RetentionPolicy::hourly(retention.diagnostic_files),
        }],
        Mode::Development => vec![
            SinkConfig {
                name: CONSOLE_SINK.to_owned(),
                kind: SinkKind::Console {
                    target: ConsoleTarget::Stdout,
                    format: config.console_format.unwrap_or(LogFormat::Pretty),
                },
                minimum_level: level(Level::Debug),
                retention: RetentionPolicy::none(),
            },
            SinkConfig {
                name: ROLLING_FILE_SINK.to_owned(),
                kind: SinkKind::RollingFile {
                    prefix: config.file_prefix.clone(),
                },
                minimum_level: level(Level::Debug),
                retention: RetentionPolicy::daily(retention.development_days),
            },
        ],
    }
}

/// A sink paired with its declared configuration.
#[derive(Clone)]
pub struct Route {
    config: SinkConfig,
    sink: Arc<dyn Sink>,
}

impl Route {
    /// Route `sink` according to `config`.
    pub fn new(config: SinkConfig, sink: Arc<dyn Sink>) -> Self {
        Self { config, sink }
    }

    /// Route to an externally built sink with no retention.
    pub fn custom(sink: Arc<dyn Sink>, minimum_level: Level) -> Self {
        let config = SinkConfig {
            name: sink.name().to_owned(),
            kind: SinkKind::Custom,
            minimum_level,
            retention: RetentionPolicy::none(),
        };
        Self::new(config, sink)
    }

    /// Sink configuration this route was built from.
    pub fn config(&self) -> &SinkConfig {
        &self.config
    }

    /// Destination of the route.
    pub fn sink(&self) -> &Arc<dyn Sink> {
        &self.sink
    }

    /// Sink name used in reports.
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Whether events at `level` pass the route's minimum.
    pub fn accepts(&self, level: Level) -> bool {
        level >= self.config.minimum_level
    }
}

/// Outcome of a single dispatch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Sinks whose minimum level admitted the event.
    pub eligible: usize,
    /// Sinks that recorded the event.
    pub delivered: usize,
    /// Sinks that failed or panicked.
    pub failed: usize,
}

/// Outcome of [`Router::shutdown`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShutdownReport {
    /// Sinks flushed and closed in time.
    pub closed: Vec<String>,
    /// Sinks whose close failed, with the error text.
    pub failed: Vec<(String, String)>,
    /// Sinks still closing when the grace period ran out.
    pub abandoned: Vec<String>,
}

impl ShutdownReport {
    /// Whether every sink closed without error.
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty() && self.abandoned.is_empty()
    }
}

type ConsoleWriterFactory = Box<dyn Fn(ConsoleTarget) -> Box<dyn Write + Send>>;

/// Builds a [`Router`] from a mode and configuration.
pub struct RouterBuilder<'a> {
    mode: Mode,
    config: &'a LoggingConfig,
    clock: Arc<dyn Clock>,
    enrichers: Option<EnricherChain>,
    fallback: Option<FallbackChannel>,
    console_writer: Option<ConsoleWriterFactory>,
}

impl<'a> RouterBuilder<'a> {
    /// Clock used by rolling files.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Enrichers applied before dispatch.
    pub fn enrichers(mut self, enrichers: EnricherChain) -> Self {
        self.enrichers = Some(enrichers);
        self
    }

    /// Where sink failures are reported. Defaults to standard error.
    pub fn fallback(mut self, fallback: FallbackChannel) -> Self {
        self.fallback = Some(fallback);
        self
    }

    /// Redirect console sinks away from the real standard streams.
    pub fn console_writer<F>(mut self, factory: F) -> Self
    where
        F: Fn(ConsoleTarget) -> Box<dyn Write + Send> + 'static,
    {
        self.console_writer = Some(Box::new(factory));
        self
    }

    /// Validate the configuration and open every sink of the mode's table.
    pub fn build(self) -> Result<Router, ConfigurationError> {
        self.config.validate()?;
        let directory = &self.config.directory;
        let queue = &self.config.queue;

        let mut routes = Vec::new();
        for sink_config in route_table(self.mode, self.config) {
            let sink: Arc<dyn Sink> = match &sink_config.kind {
                SinkKind::Console { target, format } => match &self.console_writer {
                    Some(factory) => Arc::new(ConsoleSink::with_writer(
                        sink_config.name.clone(),
                        *format,
                        queue,
                        factory(*target),
                    )),
                    None => Arc::new(ConsoleSink::new(
                        sink_config.name.clone(),
                        *target,
                        *format,
                        queue,
                    )),
                },
                SinkKind::RollingFile { prefix } | SinkKind::HourlyFile { prefix } => {
                    let sink = FileSink::open(
                        sink_config.name.clone(),
                        directory,
                        prefix,
                        sink_config.retention,
                        queue,
                        self.clock.clone(),
                    )
                    .map_err(|source| ConfigurationError::Destination {
                        path: directory.clone(),
                        source,
                    })?;
                    Arc::new(sink)
                }
                SinkKind::Custom => continue,
            };
            debug!(
                sink = %sink_config.name,
                minimum_level = %sink_config.minimum_level,
                "sink opened"
            );
            routes.push(Route::new(sink_config, sink));
        }

        info!(
            mode = %self.mode,
            sinks = routes.len(),
            directory = %directory.display(),
            "log router ready"
        );
        Ok(Router {
            mode: Some(self.mode),
            routes,
            enrichers: self.enrichers.unwrap_or_default(),
            fallback: self.fallback.unwrap_or_default(),
            shutdown_grace: self.config.shutdown_grace,
        })
    }
}

/// Immutable routing table plus the enrichment chain applied before dispatch.
///
/// Built once by the process entry point and shared as `Arc<Router>`.
pub struct Router {
    mode: Option<Mode>,
    routes: Vec<Route>,
    enrichers: EnricherChain,
    fallback: FallbackChannel,
    shutdown_grace: Duration,
}

impl Router {
    /// Start building a router for `mode`.
    pub fn builder(mode: Mode, config: &LoggingConfig) -> RouterBuilder<'_> {
        RouterBuilder {
            mode,
            config,
            clock: system_clock(),
            enrichers: None,
            fallback: None,
            console_writer: None,
        }
    }

    /// Router for `mode` with the default enrichers and real streams.
    pub fn build(mode: Mode, config: &LoggingConfig) -> Result<Self, ConfigurationError> {
        Self::builder(mode, config).build()
    }

    /// Router over explicitly constructed routes.
    pub fn from_routes(routes: Vec<Route>, enrichers: EnricherChain) -> Self {
        Self {
            mode: None,
            routes,
            enrichers,
            fallback: FallbackChannel::default(),
            shutdown_grace: LoggingConfig::default().shutdown_grace,
        }
    }

    /// Replace the fallback channel.
    pub fn with_fallback(mut self, fallback: FallbackChannel) -> Self {
        self.fallback = fallback;
        self
    }

    /// Override the default shutdown grace period.
    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    /// Mode this router was built for; `None` for hand-assembled routers.
    pub fn mode(&self) -> Option<Mode> {
        self.mode
    }

    /// Routes in dispatch order.
    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    /// Enrichers applied by loggers sharing this router.
    pub fn enrichers(&self) -> &EnricherChain {
        &self.enrichers
    }

    /// Channel receiving sink failures and undeliverable events.
    pub fn fallback(&self) -> &FallbackChannel {
        &self.fallback
    }

    /// Grace period used by the entry point at shutdown.
    pub fn shutdown_grace(&self) -> Duration {
        self.shutdown_grace
    }

    /// Lowest level any sink accepts.
    pub fn minimum_level(&self) -> Option<Level> {
        self.routes.iter().map(|r| r.config.minimum_level).min()
    }

    /// Whether any route admits `level`.
    pub fn accepts(&self, level: Level) -> bool {
        self.routes.iter().any(|r| r.accepts(level))
    }

    /// Deliver `event` to every sink whose minimum level admits it.
    ///
    /// A failing or panicking sink is reported on the fallback channel and
    /// skipped; the remaining sinks still receive the event. If every
    /// eligible sink fails the event itself goes to the fallback channel.
    pub fn dispatch(&self, event: &LogEvent) -> DispatchReport {
        let mut report = DispatchReport::default();
        for route in self.routes.iter().filter(|r| r.accepts(event.level())) {
            report.eligible += 1;
            let outcome = catch_unwind(AssertUnwindSafe(|| route.sink.write(event)))
                .unwrap_or_else(|_| Err(SinkError::Panicked(route.name().to_owned())));
            match outcome {
                Ok(()) => report.delivered += 1,
                Err(err) => {
                    report.failed += 1;
                    self.fallback.report(route.name(), &err);
                }
            }
        }
        if report.eligible > 0 && report.delivered == 0 {
            self.fallback.deliver(event);
        }
        report
    }

    /// Ask every sink to flush; failures go to the fallback channel.
    pub fn flush(&self) {
        for route in &self.routes {
            if let Err(err) = route.sink.flush() {
                self.fallback.report(route.name(), &err);
            }
        }
    }

    /// Flush and close every sink, waiting at most `grace`.
    ///
    /// Each sink closes on its own helper thread so one slow destination
    /// cannot hold back the others. Whatever has not closed when the grace
    /// period expires is abandoned and listed in the report.
    pub fn shutdown(&self, grace: Duration) -> ShutdownReport {
        let deadline = Instant::now() + grace;
        let (tx, rx) = mpsc::channel();
        let mut outcomes: Vec<Option<Result<(), SinkError>>> = Vec::new();
        let mut pending = 0usize;

        for (index, route) in self.routes.iter().enumerate() {
            outcomes.push(None);
            let sink = route.sink.clone();
            let tx = tx.clone();
            let spawned = thread::Builder::new()
                .name(format!("strata-close-{}", route.name()))
                .spawn(move || {
                    let result = close_sink(sink.as_ref());
                    let _ = tx.send((index, result));
                });
            match spawned {
                Ok(_) => pending += 1,
                Err(err) => {
                    warn!(
                        sink = route.name(),
                        error = %err,
                        "unable to spawn close thread; closing inline"
                    );
                    outcomes[index] = Some(close_sink(route.sink.as_ref()));
                }
            }
        }
        drop(tx);

        while pending > 0 {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match rx.recv_timeout(remaining) {
                Ok((index, result)) => {
                    outcomes[index] = Some(result);
                    pending -= 1;
                }
                Err(_) => break,
            }
        }

        let mut report = ShutdownReport::default();
        for (route, outcome) in self.routes.iter().zip(outcomes) {
            let name = route.name().to_owned();
            match outcome {
                Some(Ok(())) => report.closed.push(name),
                Some(Err(err)) => report.failed.push((name, err.to_string())),
                None => report.abandoned.push(name),
            }
        }
        for name in &report.abandoned {
            self.fallback
                .notice(&format!("sink '{name}' did not close within {grace:?}; abandoned"));
        }
        info!(
            closed = report.closed.len(),
            failed = report.failed.len(),
            abandoned = report.abandoned.len(),
            "log router shut down"
        );
        report
    }
}

fn close_sink(sink: &dyn Sink) -> Result<(), SinkError> {
    sink.flush().and_then(|_| sink.close())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sinks::{MemorySink, Rotation};
    use crate::value::Properties;
    use parking_lot::Mutex;

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

    struct Broken;

    impl Sink for Broken {
        fn name(&self) -> &str {
            "broken"
        }

        fn write(&self, _event: &LogEvent) -> Result<(), SinkError> {
            Err(SinkError::Io(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "simulated",
            )))
        }

        fn close(&self) -> Result<(), SinkError> {
            Ok(())
        }
    }

    struct Panicking;

    impl Sink for Panicking {
        fn name(&self) -> &str {
            "panicking"
        }

        fn write(&self, _event: &LogEvent) -> Result<(), SinkError> {
            panic!("sink bug")
        }

        fn close(&self) -> Result<(), SinkError> {
            Ok(())
        }
    }

    struct Slow;

    impl Sink for Slow {
        fn name(&self) -> &str {
            "slow"
        }

        fn write(&self, _event: &LogEvent) -> Result<(), SinkError> {
            Ok(())
        }

        fn close(&self) -> Result<(), SinkError> {
            thread::sleep(Duration::from_millis(500));
            Ok(())
        }
    }

    fn event(level: Level) -> LogEvent {
        LogEvent::new(level, "event at {Level}", Properties::new().with("Level", level.to_string()))
    }

    #[test]
    fn table_matches_documented_policy() {
        let config = LoggingConfig::default();

        let production = route_table(Mode::Production, &config);
        assert_eq!(production.len(), 2);
        assert_eq!(
            production[0].kind,
            SinkKind::Console {
                target: ConsoleTarget::Stderr,
                format: LogFormat::StructuredJson
            }
        );
        assert!(production.iter().all(|s| s.minimum_level == Level::Information));
        assert_eq!(production[1].retention, RetentionPolicy::daily(30));

        let diagnostic = route_table(Mode::Diagnostic, &config);
        assert_eq!(diagnostic.len(), 1);
        assert_eq!(diagnostic[0].minimum_level, Level::Trace);
        assert_eq!(diagnostic[0].retention.rotation, Some(Rotation::Hourly));
        assert_eq!(diagnostic[0].retention.max_files, Some(6));

        let development = route_table(Mode::Development, &config);
        assert_eq!(
            development[0].kind,
            SinkKind::Console {
                target: ConsoleTarget::Stdout,
                format: LogFormat::Pretty
            }
        );
        assert!(development.iter().all(|s| s.minimum_level == Level::Debug));
        assert_eq!(development[1].retention, RetentionPolicy::daily(7));
    }

    #[test]
    fn table_is_deterministic() {
        let config = LoggingConfig::default();
        for mode in [Mode::Production, Mode::Diagnostic, Mode::Development] {
            assert_eq!(route_table(mode, &config), route_table(mode, &config));
        }
    }

    #[test]
    fn minimum_level_override_applies_to_all_sinks() {
        let config = LoggingConfig {
            minimum_level: Some(Level::Warning),
            ..LoggingConfig::default()
        };
        assert!(route_table(Mode::Development, &config)
            .iter()
            .all(|s| s.minimum_level == Level::Warning));
    }

    #[test]
    fn filters_below_minimum_level() {
        let info = Arc::new(MemorySink::new("info"));
        let trace = Arc::new(MemorySink::new("trace"));
        let router = Router::from_routes(
            vec![
                Route::custom(info.clone(), Level::Information),
                Route::custom(trace.clone(), Level::Trace),
            ],
            EnricherChain::empty(),
        );

        for level in [Level::Trace, Level::Debug, Level::Information, Level::Error] {
            router.dispatch(&event(level));
        }
        assert!(info.events().iter().all(|e| e.level() >= Level::Information));
        assert_eq!(info.len(), 2);
        assert_eq!(trace.len(), 4);
        assert_eq!(router.minimum_level(), Some(Level::Trace));
    }

    #[test]
    fn failing_sinks_do_not_block_others() {
        let healthy = Arc::new(MemorySink::new("healthy"));
        let fallback = Captured::default();
        let router = Router::from_routes(
            vec![
                Route::custom(Arc::new(Broken), Level::Trace),
                Route::custom(Arc::new(Panicking), Level::Trace),
                Route::custom(healthy.clone(), Level::Trace),
            ],
            EnricherChain::empty(),
        )
        .with_fallback(FallbackChannel::new(fallback.clone()));

        let report = router.dispatch(&event(Level::Error));
        assert_eq!(
            report,
            DispatchReport {
                eligible: 3,
                delivered: 1,
                failed: 2
            }
        );
        assert_eq!(healthy.len(), 1);
        let text = String::from_utf8(fallback.0.lock().clone()).unwrap();
        assert!(text.contains("sink 'broken' failed"));
        assert!(text.contains("sink 'panicking' panicked"));
        assert!(!text.contains("undelivered"));
    }

    #[test]
    fn total_outage_reaches_fallback() {
        let fallback = Captured::default();
        let router = Router::from_routes(
            vec![Route::custom(Arc::new(Broken), Level::Trace)],
            EnricherChain::empty(),
        )
        .with_fallback(FallbackChannel::new(fallback.clone()));
        router.dispatch(&event(Level::Warning));
        let text = String::from_utf8(fallback.0.lock().clone()).unwrap();
        assert!(text.contains("undelivered event"));
        assert!(text.contains("event at Warning"));
    }

    #[test]
    fn shutdown_closes_every_sink() {
        let a = Arc::new(MemorySink::new("a"));
        let b = Arc::new(MemorySink::new("b"));
        let router = Router::from_routes(
            vec![Route::custom(a.clone(), Level::Trace), Route::custom(b.clone(), Level::Trace)],
            EnricherChain::empty(),
        );
        let report = router.shutdown(Duration::from_secs(5));
        assert!(report.is_clean());
        assert_eq!(report.closed, vec!["a".to_owned(), "b".to_owned()]);
        assert!(a.is_closed() && b.is_closed());
    }

    #[test]
    fn shutdown_abandons_slow_sinks_after_grace() {
        let fast = Arc::new(MemorySink::new("fast"));
        let router = Router::from_routes(
            vec![
                Route::custom(fast.clone(), Level::Trace),
                Route::custom(Arc::new(Slow), Level::Trace),
            ],
            EnricherChain::empty(),
        )
        .with_fallback(FallbackChannel::new(Captured::default()));
        let started = Instant::now();
        let report = router.shutdown(Duration::from_millis(100));
        assert!(started.elapsed() < Duration::from_millis(450));
        assert_eq!(report.closed, vec!["fast".to_owned()]);
        assert_eq!(report.abandoned, vec!["slow".to_owned()]);
    }

    #[test]
    fn shutdown_keeps_closing_after_a_slow_sink() {
        let fast = Arc::new(MemorySink::new("fast"));
        let router = Router::from_routes(
            vec![
                Route::custom(Arc::new(Slow), Level::Trace),
                Route::custom(fast.clone(), Level::Trace),
            ],
            EnricherChain::empty(),
        )
        .with_fallback(FallbackChannel::new(Captured::default()));
        let report = router.shutdown(Duration::from_millis(100));
        assert_eq!(report.closed, vec!["fast".to_owned()]);
        assert_eq!(report.abandoned, vec!["slow".to_owned()]);
        assert!(fast.is_closed());
    }
}
