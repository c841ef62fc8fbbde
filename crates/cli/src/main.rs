//! rsu - Resumable uploads and retried metadata operations for object storage
//!
//! Configuration lives in `config.toml` under `$RSU_CONFIG_DIR` (or the
//! platform configuration directory). Connection flags override it.

mod commands;
mod exit_code;
mod output;

use std::io::stdout;

use clap::{CommandFactory, Parser};
use tracing_subscriber::EnvFilter;

use crate::commands::{Commands, Connection};
use crate::exit_code::ExitCode;
use crate::output::OutputConfig;

#[derive(Parser, Debug)]
#[command(name = "rsu")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Output strict JSON
    #[arg(long, global = true)]
    json: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    /// Only print errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Log requests and retries to stderr
    #[arg(long, global = true)]
    debug: bool,

    /// Service endpoint (overrides the configuration file)
    #[arg(long, global = true, env = "RSU_ENDPOINT")]
    endpoint: Option<String>,

    /// Bearer token sent with every request
    #[arg(long, global = true, env = "RSU_TOKEN", hide_env_values = true)]
    token: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

fn init_tracing(debug: bool) -> anyhow::Result<()> {
    let filter = if debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(debug)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to initialize logging: {e}"))
}

#[tokio::main]
async fn main() -> std::process::ExitCode {
    let cli = Cli::parse();

    if let Err(e) = init_tracing(cli.debug) {
        eprintln!("{e:#}");
    }
    if cli.no_color {
        console::set_colors_enabled(false);
        console::set_colors_enabled_stderr(false);
    }

    if let Commands::Completions(args) = &cli.command {
        clap_complete::generate(args.shell, &mut Cli::command(), "rsu", &mut stdout());
        return ExitCode::Success.into();
    }

    let output_config = OutputConfig::from_flags(cli.json, cli.no_color, cli.quiet);
    let connection = Connection {
        endpoint: cli.endpoint,
        token: cli.token,
    };

    commands::execute(cli.command, &connection, output_config)
        .await
        .into()
}
