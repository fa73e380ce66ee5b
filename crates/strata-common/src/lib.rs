//! ---
//! strata_section: "01-core-functionality"
//! strata_subsection: "module"
//! strata_type: "source"
//! strata_scope: "code"
//! strata_description: "Shared primitives for configuration and mode selection."
//! strata_version: "v0.0.0-prealpha"
//! strata_owner: "tbd"
//! ---
//! Shared primitives for the Strata logging workspace.
//! This crate exposes configuration loading, operating mode resolution,
//! severity levels, and the diagnostics subscriber bootstrap.

pub mod config;
pub mod level;
pub mod logging;
pub mod mode;

pub use config::{
    ConfigurationError, LoadedLoggingConfig, LoggingConfig, QueueConfig, RetentionConfig,
};
pub use level::Level;
pub use logging::{init_diagnostics, LogFormat};
pub use mode::{resolve_mode, Mode, DIAGNOSTIC_MODE_VAR, ENVIRONMENT_TIER_VAR};
