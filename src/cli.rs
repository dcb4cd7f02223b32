// ABOUTME: Command-line interface definition using clap derive macros.
// ABOUTME: Defines all subcommands and their arguments.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "tagwatch")]
#[command(about = "Detect newer versions of the images your containers run")]
#[command(version)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Configuration file (default: tagwatch.yml in the current directory)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new tagwatch.yml configuration file
    Init {
        /// Overwrite an existing configuration file
        #[arg(long)]
        force: bool,
    },

    /// Watch containers on schedule until interrupted
    Run,

    /// Scan every watcher once and print the results
    Check {
        /// Only print containers with an available update
        #[arg(short, long, conflicts_with = "json")]
        quiet: bool,

        /// Print one JSON object per container
        #[arg(long)]
        json: bool,
    },
}
