//! Waypost CLI - Command-line interface
//!
//! This binary provides a command-line interface to the waypost
//! library: one-shot facility resolution against the live provider and
//! cell key inspection for debugging.

mod commands;

use clap::{Parser, Subcommand};
use std::process;

#[derive(Parser)]
#[command(name = "waypost")]
#[command(version = waypost::VERSION)]
#[command(about = "Resolve GPS coordinates to nearby truck facilities", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve a coordinate to the nearest truck facility
    Resolve(commands::ResolveArgs),
    /// Inspect the cell key and discovery geometry for a coordinate
    Cell(commands::CellArgs),
}

fn main() {
    if let Err(e) = waypost::logging::init_logging() {
        eprintln!("Error initializing logging: {}", e);
        process::exit(1);
    }

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Resolve(args) => commands::resolve(args),
        Commands::Cell(args) => commands::cell(args),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}
