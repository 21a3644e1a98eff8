use std::path::PathBuf;

use clap::Parser;

use crate::Commands;

/// Main CLI application arguments and command structure
#[derive(Parser)]
#[clap(
    name = "adventures",
    version,
    about = "Record your adventures: where you went, when, and how far it is from here"
)]
pub struct Cli {
    /// Path to the configuration file
    #[clap(short = 'c', long, value_parser)]
    pub config: Option<PathBuf>,

    /// Directory where adventures are stored
    #[clap(long, value_parser)]
    pub data_dir: Option<PathBuf>,

    /// Keep adventures in memory only, for this run
    #[clap(long)]
    pub memory: bool,

    /// Verbose output mode
    #[clap(short, long)]
    pub verbose: bool,

    /// Subcommands for the adventures application
    #[clap(subcommand)]
    pub command: Commands,
}
