//! ---
//! strata_section: "01-core-functionality"
//! strata_subsection: "module"
//! strata_type: "source"
//! strata_scope: "code"
//! strata_description: "Shared primitives for configuration and mode selection."
//! strata_version: "v0.0.0-prealpha"
//! strata_owner: "tbd"
//! ---
//! Operating mode selection.
//!
//! All environment coupling for logging lives here: the process environment is
//! read once, and every other component receives a resolved [`Mode`].
use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Environment variable that switches on diagnostic mode when set to `true`.
pub const DIAGNOSTIC_MODE_VAR: &str = "DIAGNOSTIC_MODE";

/// Environment variable naming the deployment tier (`Development`, `Staging`, ...).
pub const ENVIRONMENT_TIER_VAR: &str = "APP_ENVIRONMENT";

const DEVELOPMENT_TIER: &str = "Development";

/// Resolved operating profile that determines active sinks and minimum levels.
#[derive(Debug, Copy, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Production,
    Diagnostic,
    Development,
}

impl Mode {
    /// Snapshot the process environment and resolve the mode from it.
    pub fn from_process_env() -> Self {
        let env: HashMap<String, String> = std::env::vars().collect();
        resolve_mode(&env)
    }

    pub fn is_diagnostic(&self) -> bool {
        matches!(self, Mode::Diagnostic)
    }

    pub fn is_development(&self) -> bool {
        matches!(self, Mode::Development)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Production => "production",
            Mode::Diagnostic => "diagnostic",
            Mode::Development => "development",
        }
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "production" => Ok(Mode::Production),
            "diagnostic" => Ok(Mode::Diagnostic),
            "development" => Ok(Mode::Development),
            other => Err(format!("unknown mode: {}", other)),
        }
    }
}

/// Resolve the operating mode from an environment snapshot.
///
/// Precedence, first match wins:
/// 1. `DIAGNOSTIC_MODE` is `true` (case-insensitive) → [`Mode::Diagnostic`]
/// 2. `APP_ENVIRONMENT` is `Development` (case-insensitive) → [`Mode::Development`]
/// 3. anything else, including unset or unknown tiers → [`Mode::Production`]
pub fn resolve_mode(env: &HashMap<String, String>) -> Mode {
    let diagnostic = env
        .get(DIAGNOSTIC_MODE_VAR)
        .map(|value| value.trim().eq_ignore_ascii_case("true"))
        .unwrap_or(false);
    if diagnostic {
        return Mode::Diagnostic;
    }

    let development = env
        .get(ENVIRONMENT_TIER_VAR)
        .map(|tier| tier.trim().eq_ignore_ascii_case(DEVELOPMENT_TIER))
        .unwrap_or(false);
    if development {
        return Mode::Development;
    }

    Mode::Production
}
