//! Tether CLI
//!
//! Command-line tools for inspecting the snapshots written by Tether entity
//! stores.
//!
//! # Commands
//!
//! - `inspect` - Summarize every snapshot in a directory
//! - `dump` - Print the entities of one snapshot
//! - `version` - Show version information

mod commands;

use clap::{Parser, Subcommand};
use commands::OutputFormat;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Tether snapshot tools.
#[derive(Parser)]
#[command(name = "tether")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the snapshot directory
    #[arg(global = true, short, long)]
    dir: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Summarize every snapshot in the directory
    Inspect {
        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Print the entities of one snapshot
    Dump {
        /// Store name
        name: String,

        /// Only show entities still carrying a temporary id
        #[arg(short, long)]
        temporary_only: bool,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Inspect { format } => {
            let dir = cli.dir.ok_or("Snapshot directory required for inspect")?;
            commands::inspect::run(&dir, format)?;
        }
        Commands::Dump {
            name,
            temporary_only,
            format,
        } => {
            let dir = cli.dir.ok_or("Snapshot directory required for dump")?;
            commands::dump::run(&dir, &name, temporary_only, format)?;
        }
        Commands::Version => {
            println!("Tether CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("Temporary id prefix: {}", tether_protocol::TEMPORARY_PREFIX);
        }
    }

    Ok(())
}
