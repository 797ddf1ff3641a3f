mod cli;
mod commands;

use cli::{Cli, Commands};
use commands::{extract, ingest, params, process, update_wards};
use tracing_subscriber::EnvFilter;

/// `RUST_LOG` wins; otherwise warn, info (-v) or debug (-vv).
fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

pub fn run() -> anyhow::Result<()> {
    use clap::Parser;

    let cli = Cli::parse();
    init_logging(cli.verbose);

    match &cli.command {
        Commands::Process(args) => process::run(&cli, args),
        Commands::Extract(args) => extract::run(&cli, args),
        Commands::UpdateWards(args) => update_wards::run(&cli, args),
        Commands::Ingest(args) => ingest::run(&cli, args),
        Commands::Params(args) => params::run(&cli, args),
    }
}

fn main() -> anyhow::Result<()> { run() }
