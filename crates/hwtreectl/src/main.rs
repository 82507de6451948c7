//! hwtree Control - hardware inventory from the command line
//!
//! Runs the probes once and prints the resulting device tree as JSON.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "hwtreectl")]
#[command(about = "hwtree - point-in-time hardware inventory", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Probe family selectable with `--only`
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OnlyProbe {
    Cpu,
    Scsi,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan the machine and print the device tree
    Scan {
        /// Configuration file (default: /etc/hwtree/config.toml)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Run a single probe family
        #[arg(long, value_enum)]
        only: Option<OnlyProbe>,

        /// Print JSON on one line
        #[arg(long)]
        compact: bool,
    },

    /// Print the effective configuration
    Config {
        /// Configuration file (default: /etc/hwtree/config.toml)
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Scan { config, only, compact } => commands::scan(config, only, compact),
        Commands::Config { config } => commands::show_config(config),
    }
}
