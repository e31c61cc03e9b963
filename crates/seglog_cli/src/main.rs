//! seglog CLI
//!
//! Command-line driver for the seglog append-only log engine.
//!
//! # Commands
//!
//! - `write` - Append records to a log directory
//! - `replay` - Print every record in segment order
//! - `inspect` - Display index and segment metadata
//! - `verify` - Decode every segment and check the index

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// seglog command-line log tools.
#[derive(Parser)]
#[command(name = "seglog")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the log directory
    #[arg(global = true, short, long)]
    path: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Append records; reads one record per stdin line when no message is given
    Write {
        /// Messages to write, one record each
        messages: Vec<String>,

        /// Record level (trace, debug, info, warn, error, fatal)
        #[arg(short, long, default_value = "info")]
        level: String,

        /// Stamp records in UTC instead of local time
        #[arg(short, long)]
        utc: bool,

        /// Memtable capacity in bytes
        #[arg(short, long)]
        buffer_capacity: Option<usize>,

        /// Advisory segment size budget in bytes
        #[arg(short, long)]
        segment_budget: Option<u64>,
    },

    /// Print every record in segment order
    Replay {
        /// Maximum number of records to print
        #[arg(short, long)]
        limit: Option<usize>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Display index and segment metadata
    Inspect {
        /// List every segment
        #[arg(short, long)]
        segments: bool,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Decode every segment and check the index against the directory
    Verify,

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Logs go to stderr so replay output stays clean.
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
        Commands::Write {
            messages,
            level,
            utc,
            buffer_capacity,
            segment_budget,
        } => {
            let path = cli.path.ok_or("Log directory path required for write")?;
            let options = commands::write::WriteOptions {
                level: level.parse()?,
                utc,
                buffer_capacity,
                segment_budget,
            };
            commands::write::run(&path, &messages, &options)?;
        }
        Commands::Replay { limit, format } => {
            let path = cli.path.ok_or("Log directory path required for replay")?;
            commands::replay::run(&path, limit, &format)?;
        }
        Commands::Inspect { segments, format } => {
            let path = cli.path.ok_or("Log directory path required for inspect")?;
            commands::inspect::run(&path, segments, &format)?;
        }
        Commands::Verify => {
            let path = cli.path.ok_or("Log directory path required for verify")?;
            commands::verify::run(&path)?;
        }
        Commands::Version => {
            println!("seglog CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("seglog core v{}", seglog_core::VERSION);
        }
    }

    Ok(())
}
