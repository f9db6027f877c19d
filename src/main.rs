mod config;
mod engine;
mod error;
mod integrate;
mod manager;
mod model;
mod sweep;

use crate::manager::Manager;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::{
    io::{self, BufWriter, Write},
    path::PathBuf,
};

#[derive(Debug, Parser)]
#[command(version, about)]
struct CLI {
    #[arg(long)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run one competition with the configured SYN kinetics.
    Simulate,

    /// Run the configured competition sweeps.
    Compete,

    /// Run the configured surplus sweeps.
    Surplus,
}

fn main() {
    env_logger::Builder::new()
        .format_timestamp_millis()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    if let Err(error) = run_cli() {
        log::error!("{error:#?}");
        std::process::exit(1);
    }
}

fn run_cli() -> Result<()> {
    let args = CLI::parse();
    log::info!("{args:#?}");

    let mgr = Manager::new(&args.config).context("failed to construct mgr")?;

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());

    match args.command {
        Command::Simulate => mgr.simulate(&mut out)?,
        Command::Compete => mgr.compete(&mut out)?,
        Command::Surplus => mgr.surplus(&mut out)?,
    }

    out.flush().context("failed to flush stdout")?;

    Ok(())
}
