mod commands;
mod config;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use crate::config::GatelinkConfig;

/// RFID access gateway for serial card readers.
#[derive(Parser, Debug)]
#[command(name = "gatelink", version, about)]
struct Cli {
    /// Configuration file (defaults to ./gatelink.toml when present)
    #[arg(short, long, env = "GATELINK_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the gateway until interrupted
    Run(RunArgs),

    /// List serial ports visible to this host
    Ports,

    /// Show recent access log entries
    Logs(LogsArgs),

    /// Register an RFID token, optionally with a new owner
    Enroll(EnrollArgs),
}

#[derive(Args, Debug)]
struct DatabaseArgs {
    /// SQLite database file
    #[arg(short, long)]
    database: Option<String>,
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Serial port of the reader
    #[arg(short, long)]
    port: Option<String>,

    /// Baud rate
    #[arg(short, long)]
    baud: Option<u32>,

    #[command(flatten)]
    db: DatabaseArgs,
}

#[derive(Args, Debug)]
struct LogsArgs {
    /// Number of entries
    #[arg(short = 'n', long, default_value_t = 20)]
    limit: i64,

    /// Only entries for this code
    #[arg(long)]
    code: Option<String>,

    /// Print JSON instead of text
    #[arg(long)]
    json: bool,

    #[command(flatten)]
    db: DatabaseArgs,
}

#[derive(Args, Debug)]
struct EnrollArgs {
    /// Card code as sent by the reader
    code: String,

    /// Create an owner with this name
    #[arg(long)]
    owner: Option<String>,

    /// Register the token disabled
    #[arg(long)]
    inactive: bool,

    #[command(flatten)]
    db: DatabaseArgs,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut config =
        GatelinkConfig::load(cli.config.as_deref()).context("failed to load configuration")?;

    match cli.command {
        Command::Run(args) => {
            apply_run_overrides(&mut config, &args);
            commands::run(&config).await
        }
        Command::Ports => commands::ports(),
        Command::Logs(args) => {
            apply_database_override(&mut config, &args.db);
            commands::logs(&config, args.limit, args.code.as_deref(), args.json).await
        }
        Command::Enroll(args) => {
            apply_database_override(&mut config, &args.db);
            commands::enroll(&config, &args.code, args.owner.as_deref(), !args.inactive).await
        }
    }
}

fn default_filter(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    }
}

fn init_tracing(verbosity: u8) {
    let filter = default_filter(verbosity);

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();
}

fn apply_database_override(config: &mut GatelinkConfig, args: &DatabaseArgs) {
    if let Some(path) = &args.database {
        config.database.path = path.clone();
    }
}

fn apply_run_overrides(config: &mut GatelinkConfig, args: &RunArgs) {
    if let Some(port) = &args.port {
        config.link.port_name = port.clone();
    }
    if let Some(baud) = args.baud {
        config.link.baud_rate = baud;
    }
    apply_database_override(config, &args.db);
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use rstest::rstest;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[rstest]
    #[case(0, "info")]
    #[case(1, "debug")]
    #[case(2, "trace")]
    #[case(5, "trace")]
    fn test_verbosity_filter(#[case] verbosity: u8, #[case] expected: &str) {
        assert_eq!(default_filter(verbosity), expected);
    }

    #[test]
    fn test_run_overrides_replace_file_values() {
        let cli = Cli::try_parse_from([
            "gatelink", "run", "--port", "/dev/ttyUSB1", "--baud", "19200", "-d", "/tmp/g.db",
        ])
        .unwrap();
        let Command::Run(args) = cli.command else {
            panic!("expected run");
        };

        let mut config = GatelinkConfig::default();
        config.link.port_name = "/dev/ttyUSB0".into();
        apply_run_overrides(&mut config, &args);

        assert_eq!(config.link.port_name, "/dev/ttyUSB1");
        assert_eq!(config.link.baud_rate, 19200);
        assert_eq!(config.database.path, "/tmp/g.db");
    }

    #[test]
    fn test_run_without_flags_keeps_config() {
        let cli = Cli::try_parse_from(["gatelink", "run"]).unwrap();
        let Command::Run(args) = cli.command else {
            panic!("expected run");
        };

        let mut config = GatelinkConfig::default();
        config.link.port_name = "COM3".into();
        apply_run_overrides(&mut config, &args);

        assert_eq!(config.link.port_name, "COM3");
        assert_eq!(config.link.baud_rate, 9600);
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["gatelink", "ports", "-vv", "-c", "site.toml"]).unwrap();
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.config, Some(PathBuf::from("site.toml")));
        assert!(matches!(cli.command, Command::Ports));
    }

    #[test]
    fn test_enroll_args() {
        let cli =
            Cli::try_parse_from(["gatelink", "enroll", "AB12CD34", "--owner", "Ada", "--inactive"])
                .unwrap();
        let Command::Enroll(args) = cli.command else {
            panic!("expected enroll");
        };
        assert_eq!(args.code, "AB12CD34");
        assert_eq!(args.owner.as_deref(), Some("Ada"));
        assert!(args.inactive);
    }
}
