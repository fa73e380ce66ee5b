//! ---
//! strata_section: "01-core-functionality"
//! strata_subsection: "module"
//! strata_type: "source"
//! strata_scope: "code"
//! strata_description: "Shared primitives for configuration and mode selection."
//! strata_version: "v0.0.0-prealpha"
//! strata_owner: "tbd"
//! ---
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

/// Event severity. Ordering follows severity, so `Level::Debug < Level::Error`.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
)]
#[strum(ascii_case_insensitive)]
pub enum Level {
    #[strum(to_string = "Trace", serialize = "verbose")]
    #[serde(alias = "trace", alias = "verbose")]
    Trace,
    #[serde(alias = "debug")]
    Debug,
    #[strum(to_string = "Information", serialize = "info")]
    #[serde(alias = "information", alias = "info")]
    Information,
    #[strum(to_string = "Warning", serialize = "warn")]
    #[serde(alias = "warning", alias = "warn")]
    Warning,
    #[serde(alias = "error")]
    Error,
}

impl Level {
    /// Three-letter code used by the human-readable console format.
    pub fn short_code(&self) -> &'static str {
        match self {
            Level::Trace => "TRC",
            Level::Debug => "DBG",
            Level::Information => "INF",
            Level::Warning => "WRN",
            Level::Error => "ERR",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn levels_are_ordered_by_severity() {
        let levels: Vec<Level> = Level::iter().collect();
        let mut sorted = levels.clone();
        sorted.sort();
        assert_eq!(levels, sorted);
        assert!(Level::Trace < Level::Debug);
        assert!(Level::Warning < Level::Error);
    }

    #[test]
    fn parses_aliases_case_insensitively() {
        assert_eq!("info".parse::<Level>().unwrap(), Level::Information);
        assert_eq!("WARN".parse::<Level>().unwrap(), Level::Warning);
        assert_eq!("Verbose".parse::<Level>().unwrap(), Level::Trace);
        assert_eq!("error".parse::<Level>().unwrap(), Level::Error);
        assert!("fatal".parse::<Level>().is_err());
    }

    #[test]
    fn displays_full_names() {
        assert_eq!(Level::Information.to_string(), "Information");
        assert_eq!(Level::Trace.to_string(), "Trace");
        assert_eq!(Level::Warning.short_code(), "WRN");
    }
}
