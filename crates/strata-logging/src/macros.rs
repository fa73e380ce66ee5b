//! ---
//! strata_section: "03-persistence-logging"
//! strata_subsection: "module"
//! strata_type: "source"
//! strata_scope: "code"
//! strata_description: "Structured logging core: events, enrichment, sinks, routing."
//! strata_version: "v0.0.0-prealpha"
//! strata_owner: "tbd"
//! ---
/// Build [`Properties`](crate::Properties) from `Name = value` pairs.
#[macro_export]
macro_rules! props {
    () => {
        $crate::Properties::new()
    };
    ($($name:ident = $value:expr),+ $(,)?) => {{
        let mut properties = $crate::Properties::new();
        $(properties.insert(stringify!($name), $value);)+
        properties
    }};
}

/// Log at an explicit level. Properties are only evaluated when the level is
/// enabled.
#[macro_export]
macro_rules! strata_log {
    ($logger:expr, $level:expr, $template:expr $(, $name:ident = $value:expr)* $(,)?) => {{
        use $crate::Log as _;
        let logger = &$logger;
        let level = $level;
        if logger.is_enabled(level) {
            logger.write(level, None, $template, $crate::props!($($name = $value),*));
        }
    }};
}

/// Emit a trace event.
#[macro_export]
macro_rules! strata_trace {
    ($logger:expr, $($rest:tt)+) => {
        $crate::strata_log!($logger, $crate::Level::Trace, $($rest)+)
    };
}

/// Emit a debug event.
#[macro_export]
macro_rules! strata_debug {
    ($logger:expr, $($rest:tt)+) => {
        $crate::strata_log!($logger, $crate::Level::Debug, $($rest)+)
    };
}

/// Emit an informational event.
#[macro_export]
macro_rules! strata_info {
    ($logger:expr, $($rest:tt)+) => {
        $crate::strata_log!($logger, $crate::Level::Information, $($rest)+)
    };
}

/// Emit a warning event.
#[macro_export]
macro_rules! strata_warn {
    ($logger:expr, $($rest:tt)+) => {
        $crate::strata_log!($logger, $crate::Level::Warning, $($rest)+)
    };
}

/// Emit an error event, optionally carrying an error value.
#[macro_export]
macro_rules! strata_error {
    ($logger:expr, error = $err:expr, $template:expr $(, $name:ident = $value:expr)* $(,)?) => {{
        use $crate::Log as _;
        let logger = &$logger;
        if logger.is_enabled($crate::Level::Error) {
            logger.error_with($err, $template, $crate::props!($($name = $value),*));
        }
    }};
    ($logger:expr, $($rest:tt)+) => {
        $crate::strata_log!($logger, $crate::Level::Error, $($rest)+)
    };
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::enrich::EnricherChain;
    use crate::router::{Route, Router};
    use crate::sinks::MemorySink;
    use crate::{Level, Logger, Value};

    fn logger() -> (Logger, Arc<MemorySink>) {
        let sink = Arc::new(MemorySink::new("memory"));
        let router = Router::from_routes(
            vec![Route::custom(sink.clone(), Level::Debug)],
            EnricherChain::empty(),
        );
        (Logger::new(Arc::new(router)), sink)
    }

    #[test]
    fn props_keeps_declaration_order() {
        let properties = props!(B = 1, A = "two", C = true);
        let names: Vec<_> = properties.iter().map(|(name, _)| name).collect();
        assert_eq!(names, ["B", "A", "C"]);
        assert_eq!(properties.get("A"), Some(&Value::from("two")));
    }

    #[test]
    fn level_macros_route_through_the_logger() {
        let (logger, sink) = logger();
        strata_info!(logger, "cart {CartId} has {Items} items", CartId = "c-1", Items = 3);
        strata_warn!(logger, "disk low");
        strata_trace!(logger, "filtered out");
        assert_eq!(
            sink.messages(),
            vec!["cart c-1 has 3 items".to_owned(), "disk low".to_owned()]
        );
    }

    #[test]
    fn disabled_levels_skip_property_evaluation() {
        let (logger, sink) = logger();
        let mut evaluated = false;
        strata_trace!(logger, "x {X}", X = {
            evaluated = true;
            1
        });
        assert!(!evaluated);
        assert!(sink.is_empty());
    }

    #[test]
    fn error_macro_attaches_error() {
        let (logger, sink) = logger();
        let err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing manifest");
        strata_error!(logger, error = &err, "load of {Path} failed", Path = "app.toml");
        let event = &sink.events()[0];
        assert_eq!(event.render_message(), "load of app.toml failed");
        assert_eq!(event.exception().map(|e| e.message.as_str()), Some("missing manifest"));
    }
}
