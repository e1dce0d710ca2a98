//! reltx CLI
//!
//! Runs relation mutation scripts against in-memory datasets and prints the
//! events the transaction raises.
//!
//! # Commands
//!
//! - `run` - Execute a script against a dataset
//! - `demo` - Run the built-in OrderTicket scenario
//! - `version` - Show version information

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Bidirectional relation transactions from the command line.
#[derive(Parser)]
#[command(name = "reltx")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a mutation script against a dataset
    Run {
        /// Dataset file (mapping and stored objects)
        #[arg(short, long)]
        dataset: PathBuf,

        /// Script file (steps to execute)
        #[arg(short, long)]
        script: PathBuf,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Run the OrderTicket scenario on a built-in dataset
    Demo {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Logs go to stderr so json output stays parseable.
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Run {
            dataset,
            script,
            format,
        } => {
            commands::run::run(&dataset, &script, &format)?;
        }
        Commands::Demo { format } => {
            commands::demo::run(&format)?;
        }
        Commands::Version => {
            println!("reltx CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("reltx core v{}", reltx_core::VERSION);
        }
    }

    Ok(())
}
