//! ---
//! strata_section: "01-core-functionality"
//! strata_subsection: "module"
//! strata_type: "source"
//! strata_scope: "code"
//! strata_description: "Shared primitives for configuration and mode selection."
//! strata_version: "v0.0.0-prealpha"
//! strata_owner: "tbd"
//! ---
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use tracing::info;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::{Layer, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;

const LOG_ENV: &str = "STRATA_LOG";

static STDERR_GUARD: OnceCell<tracing_appender::non_blocking::WorkerGuard> = OnceCell::new();

/// Rendering used by console output.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum LogFormat {
    /// Compact JSON, one event per line.
    #[default]
    StructuredJson,
    /// Human-readable single line per event.
    Pretty,
}

/// Install the process `tracing` subscriber used for Strata's own
/// diagnostics (rotation, pruning, shutdown) and by the legacy logger.
///
/// * `STRATA_LOG` overrides the filter (e.g. `info`, `strata_logging=debug`).
///   When unset `RUST_LOG` is honoured, finally defaulting to `info`.
/// * Output goes to stderr through a non-blocking writer.
///
/// Calling this more than once is harmless; only the first call installs.
pub fn init_diagnostics(service_name: &str, format: LogFormat) {
    let (stderr_writer, stderr_guard) = tracing_appender::non_blocking(std::io::stderr());
    if STDERR_GUARD.set(stderr_guard).is_err() {
        return;
    }

    let filter = match std::env::var(LOG_ENV) {
        Ok(directive) => EnvFilter::try_new(directive).unwrap_or_else(|err| {
            eprintln!(
                "invalid {} directive ({}); defaulting to info logging",
                LOG_ENV, err
            );
            EnvFilter::new("info")
        }),
        Err(_) => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };

    let fmt_layer = match format {
        LogFormat::StructuredJson => fmt::layer()
            .with_target(true)
            .with_timer(fmt::time::UtcTime::rfc_3339())
            .json()
            .with_writer(stderr_writer)
            .boxed(),
        LogFormat::Pretty => fmt::layer()
            .with_target(true)
            .with_timer(fmt::time::UtcTime::rfc_3339())
            .with_writer(stderr_writer)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()
        .ok();

    info!(service = %service_name, format = ?format, "diagnostics initialised");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_is_idempotent() {
        init_diagnostics("strata-test", LogFormat::Pretty);
        init_diagnostics("strata-test", LogFormat::StructuredJson);
    }

    #[test]
    fn formats_use_kebab_case() {
        #[derive(Deserialize)]
        struct Wrapper {
            format: LogFormat,
        }
        let parsed: Wrapper = toml::from_str("format = \"structured-json\"").unwrap();
        assert_eq!(parsed.format, LogFormat::StructuredJson);
        let parsed: Wrapper = toml::from_str("format = \"pretty\"").unwrap();
        assert_eq!(parsed.format, LogFormat::Pretty);
    }
}
