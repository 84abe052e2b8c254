//! Data collector reporter CLI.
//!
//! Replays recorded run-event streams against the configured collector and
//! checks collector configuration files.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use collector::dispatch::{EventDispatcher, register_reporter};
use collector::exit_codes;
use collector::io::config::load_config;
use collector::io::events::load_events;
use collector::io::transport::HttpTransport;
use collector::logging;
use collector::replay::replay;

#[derive(Parser)]
#[command(
    name = "collector",
    version,
    about = "Report configuration run events to a data collector"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Replay a recorded event stream (`.jsonl`) through the reporter.
    Replay {
        events: PathBuf,
        #[arg(long, default_value = "collector.toml")]
        config: PathBuf,
    },
    /// Load and validate the collector configuration.
    CheckConfig {
        #[arg(long, default_value = "collector.toml")]
        config: PathBuf,
    },
}

fn main() {
    logging::init();
    let code = match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{:#}", err);
            exit_codes::INVALID
        }
    };
    std::process::exit(code);
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    match cli.command {
        Command::Replay { events, config } => cmd_replay(&events, &config),
        Command::CheckConfig { config } => cmd_check_config(&config),
    }
}

fn cmd_replay(events_path: &Path, config_path: &Path) -> Result<i32> {
    let cfg = load_config(config_path).context("load collector config")?;
    let events = load_events(events_path)?;

    let mut dispatcher = EventDispatcher::new();
    if let Some(transport) = HttpTransport::from_config(&cfg)? {
        register_reporter(&mut dispatcher, &cfg, transport);
    }

    let outcome = replay(&events, &mut dispatcher);
    if let Some(err) = outcome.aborted {
        eprintln!("run aborted after {} events: {:#}", outcome.dispatched, err);
        return Ok(exit_codes::REPORT_FAILED);
    }
    println!(
        "replay: events={} reporters={}",
        outcome.dispatched,
        dispatcher.len()
    );
    Ok(exit_codes::OK)
}

fn cmd_check_config(config_path: &Path) -> Result<i32> {
    let cfg = load_config(config_path)?;
    if cfg.collector_enabled() {
        println!(
            "collector: enabled url={} raise_on_failure={}",
            cfg.server_url.as_deref().unwrap_or_default(),
            cfg.raise_on_failure
        );
    } else {
        println!("collector: disabled");
    }
    Ok(exit_codes::OK)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_replay_defaults_config() {
        let cli = Cli::parse_from(["collector", "replay", "events.jsonl"]);
        match cli.command {
            Command::Replay { events, config } => {
                assert_eq!(events, PathBuf::from("events.jsonl"));
                assert_eq!(config, PathBuf::from("collector.toml"));
            }
            Command::CheckConfig { .. } => panic!("expected replay"),
        }
    }

    #[test]
    fn parse_check_config_with_path() {
        let cli = Cli::parse_from(["collector", "check-config", "--config", "/etc/c.toml"]);
        assert!(
            matches!(cli.command, Command::CheckConfig { config } if config == PathBuf::from("/etc/c.toml"))
        );
    }
}
