//! ---
//! strata_section: "01-core-functionality"
//! strata_subsection: "binary"
//! strata_type: "source"
//! strata_scope: "code"
//! strata_description: "Binary entrypoint for the Strata daemon."
//! strata_version: "v0.0.0-prealpha"
//! strata_owner: "tbd"
//! ---
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use strata_common::{init_diagnostics, LogFormat, LoggingConfig, Mode};
use strata_logging::{
    route_table, CorrelationContext, CorrelationId, EnricherChain, LegacyLogger, Level, Log,
    Logger, Properties, Router,
};
use tokio::signal;
use tracing::{info, warn};

#[derive(Debug, Parser)]
#[command(author, version, about = "Strata logging daemon", long_about = None)]
struct Cli {
    #[arg(long, value_name = "FILE", help = "Path to configuration file")]
    config: Option<PathBuf>,

    #[arg(long, value_enum, help = "Override the operating mode resolved from the environment")]
    mode: Option<CliMode>,

    #[arg(long, help = "Log through the tracing compatibility adapter instead of the router")]
    legacy: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliMode {
    Production,
    Diagnostic,
    Development,
}

impl From<CliMode> for Mode {
    fn from(value: CliMode) -> Self {
        match value {
            CliMode::Production => Mode::Production,
            CliMode::Diagnostic => Mode::Diagnostic,
            CliMode::Development => Mode::Development,
        }
    }
}

#[derive(Debug, Subcommand)]
enum Commands {
    #[command(about = "Run until interrupted, emitting a periodic heartbeat")]
    Run {
        #[arg(long, default_value_t = 60, help = "Heartbeat interval in seconds")]
        heartbeat: u64,
    },
    #[command(about = "Print the sink routing table for the effective mode")]
    Routes,
    #[command(about = "Emit a single event and exit")]
    Emit {
        #[arg(long, default_value = "information")]
        level: Level,
        #[arg(long = "prop", value_name = "NAME=VALUE")]
        properties: Vec<String>,
        template: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_diagnostics("stratad", LogFormat::Pretty);

    let mut candidates = Vec::new();
    if let Some(path) = &cli.config {
        candidates.push(path.clone());
    }
    candidates.push(PathBuf::from("configs/strata.toml"));

    let loaded = LoggingConfig::load_with_source(&candidates)?;
    let config = loaded.config;
    let env: HashMap<String, String> = std::env::vars().collect();
    let mode = cli
        .mode
        .map(Mode::from)
        .unwrap_or_else(|| config.effective_mode(&env));
    info!(%mode, source = ?loaded.source, "configuration loaded");

    match cli.command.unwrap_or(Commands::Run { heartbeat: 60 }) {
        Commands::Routes => {
            print_routes(mode, &config);
            Ok(())
        }
        Commands::Emit {
            level,
            properties,
            template,
        } => {
            let properties = parse_properties(&properties)?;
            let router = build_router(mode, &config)?;
            let logger = select_logger(cli.legacy, &router);
            logger.write(level, None, &template, properties);
            finish(&router);
            Ok(())
        }
        Commands::Run { heartbeat } => {
            let router = build_router(mode, &config)?;
            let logger = select_logger(cli.legacy, &router);
            run(logger, Duration::from_secs(heartbeat.max(1))).await?;
            finish(&router);
            Ok(())
        }
    }
}

fn build_router(mode: Mode, config: &LoggingConfig) -> Result<Arc<Router>> {
    let router = Router::build(mode, config)
        .with_context(|| format!("failed to start log router in {mode} mode"))?;
    Ok(Arc::new(router))
}

fn select_logger(legacy: bool, router: &Arc<Router>) -> Arc<dyn Log> {
    if legacy {
        let minimum = router.minimum_level().unwrap_or(Level::Information);
        Arc::new(LegacyLogger::new(EnricherChain::default(), minimum))
    } else {
        Arc::new(Logger::new(router.clone()))
    }
}

async fn run(logger: Arc<dyn Log>, heartbeat: Duration) -> Result<()> {
    let session = CorrelationId::new();
    CorrelationContext::scope(session.clone(), async {
        logger.info(
            "stratad {Version} started",
            Properties::new().with("Version", env!("CARGO_PKG_VERSION")),
        );

        let mut ticker = tokio::time::interval(heartbeat);
        let mut beats: u64 = 0;
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    beats += 1;
                    logger.debug("heartbeat {Beat}", Properties::new().with("Beat", beats));
                }
                result = signal::ctrl_c() => {
                    result?;
                    logger.info(
                        "shutdown requested after {Beats} heartbeats",
                        Properties::new().with("Beats", beats),
                    );
                    break;
                }
            }
        }
        Ok::<_, anyhow::Error>(())
    })
    .await?;
    info!(session = %session, "session ended");
    Ok(())
}

fn finish(router: &Router) {
    let report = router.shutdown(router.shutdown_grace());
    if report.is_clean() {
        info!(closed = report.closed.len(), "log sinks closed");
    } else {
        warn!(
            failed = ?report.failed,
            abandoned = ?report.abandoned,
            "log sinks did not close cleanly"
        );
    }
}

fn print_routes(mode: Mode, config: &LoggingConfig) {
    println!("mode: {mode}");
    println!("directory: {}", config.directory.display());
    for sink in route_table(mode, config) {
        println!(
            "- {:<12} min={:<11} kind={:?} retention={:?}",
            sink.name, sink.minimum_level, sink.kind, sink.retention
        );
    }
}

fn parse_properties(raw: &[String]) -> Result<Properties> {
    let mut properties = Properties::new();
    for entry in raw {
        let Some((name, value)) = entry.split_once('=') else {
            bail!("property '{entry}' must be NAME=VALUE");
        };
        let name = name.trim();
        if name.is_empty() {
            bail!("property '{entry}' has an empty name");
        }
        match value.parse::<i64>() {
            Ok(number) => properties.insert(name, number),
            Err(_) => match value.parse::<bool>() {
                Ok(flag) => properties.insert(name, flag),
                Err(_) => properties.insert(name, value),
            },
        }
    }
    Ok(properties)
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_logging::Value;

    #[test]
    fn properties_are_typed() {
        let props = parse_properties(&[
            "Count=3".to_owned(),
            "Ok=true".to_owned(),
            "Name=edge-01".to_owned(),
        ])
        .unwrap();
        assert_eq!(props.get("Count"), Some(&Value::Int(3)));
        assert_eq!(props.get("Ok"), Some(&Value::Bool(true)));
        assert_eq!(props.get("Name"), Some(&Value::from("edge-01")));
    }

    #[test]
    fn malformed_properties_are_rejected() {
        assert!(parse_properties(&["novalue".to_owned()]).is_err());
        assert!(parse_properties(&["=x".to_owned()]).is_err());
    }

    #[test]
    fn cli_parses_mode_override() {
        let cli = Cli::parse_from(["stratad", "--mode", "diagnostic", "routes"]);
        assert!(matches!(cli.mode, Some(CliMode::Diagnostic)));
        assert!(matches!(cli.command, Some(Commands::Routes)));
    }
}
