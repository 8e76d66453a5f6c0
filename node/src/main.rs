use anyhow::Result;
use clap::{Args, Parser};
use loyalty_types::AccountId;
use std::path::PathBuf;
use tracing::{debug, error};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod commands;
mod config;
mod lock;

use commands::{execute, Command};
use config::{parse_account, NodeConfig};

#[derive(Parser, Debug)]
#[command(name = "loyalty-node")]
#[command(about = "Operator console for the loyalty points ledger", version)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug, Default)]
struct GlobalArgs {
    /// Configuration file path
    #[arg(short, long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Data directory
    #[arg(short, long, global = true, value_name = "DIR")]
    data_dir: Option<PathBuf>,

    /// Account signing operator commands
    #[arg(long, global = true, value_parser = parse_account)]
    operator: Option<AccountId>,

    #[arg(long, global = true)]
    log_level: Option<String>,

    /// pretty or json
    #[arg(long, global = true)]
    log_format: Option<String>,
}

fn main() {
    let cli = Cli::parse();
    if let Err(err) = run(cli) {
        error!(target: "node", "{err:#}");
        eprintln!("Error: {err:#}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let mut config = NodeConfig::load(cli.global.config.as_deref())?;
    apply_overrides(&cli.global, &mut config);
    config.validate()?;

    init_logging(&config);
    debug!(target: "node", "Using data directory {}", config.data_dir.display());

    let output = execute(&config, cli.command)?;
    if !output.is_empty() {
        println!("{output}");
    }
    Ok(())
}

fn apply_overrides(args: &GlobalArgs, config: &mut NodeConfig) {
    if let Some(data_dir) = &args.data_dir {
        config.data_dir = data_dir.clone();
    }
    if let Some(operator) = args.operator {
        config.operator = Some(operator);
    }
    if let Some(log_level) = &args.log_level {
        config.log_level = log_level.clone();
    }
    if let Some(log_format) = &args.log_format {
        config.log_format = log_format.clone();
    }
}

fn init_logging(config: &NodeConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    // Command output goes to stdout, logs to stderr.
    if config.log_format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .pretty()
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn overrides_take_precedence() {
        let cli = Cli::try_parse_from([
            "loyalty-node",
            "--data-dir",
            "/tmp/override",
            "--operator",
            "@ops",
            "--log-format",
            "json",
            "status",
        ])
        .unwrap();

        let mut config = NodeConfig {
            data_dir: PathBuf::from("/tmp/original"),
            operator: None,
            owner: None,
            distribution_currency: "MANA".parse().unwrap(),
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
        };
        apply_overrides(&cli.global, &mut config);

        assert_eq!(config.data_dir, PathBuf::from("/tmp/override"));
        assert_eq!(config.operator, Some(AccountId::from_label("ops")));
        assert_eq!(config.log_format, "json");
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn accrue_arguments_parse() {
        let cli = Cli::try_parse_from([
            "loyalty-node",
            "accrue",
            "@player",
            "mana",
            "1500",
            "--caller",
            "@slots",
            "--players",
            "3",
        ])
        .unwrap();

        match cli.command {
            Command::Accrue {
                beneficiary,
                currency,
                amount,
                caller,
                players,
                wearables,
            } => {
                assert_eq!(beneficiary, AccountId::from_label("player"));
                assert_eq!(currency.as_str(), "MANA");
                assert_eq!(amount, 1500);
                assert_eq!(caller, Some(AccountId::from_label("slots")));
                assert_eq!(players, 3);
                assert_eq!(wearables, 0);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }
}
