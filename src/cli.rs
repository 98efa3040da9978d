use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::constants::DEFAULT_CONFIG_NAME;

/// Command-line arguments for memreclaim.
///
/// The subcommands stand in for the desktop surfaces: `clean` is the
/// "clean now" button, `watch` hosts the auto-clean timer plus a manual
/// trigger on stdin, and `stats` is the live usage readout.
#[derive(Parser, Debug)]
#[clap(name = "memreclaim", version, about = "Reclaim memory from the OS page lists and caches")]
pub struct Args {
    /// Verbose logging
    #[clap(short, long, global = true)]
    pub verbose: bool,

    /// Path to configuration YAML file (created with defaults if missing)
    #[clap(short = 'c', long, global = true, default_value = DEFAULT_CONFIG_NAME)]
    pub config: PathBuf,

    /// Subcommand
    #[clap(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Subcommand, Debug, PartialEq)]
pub enum Commands {
    /// Reclaim memory once, as a manual request
    Clean,

    /// Show CPU and memory usage
    Stats {
        /// Refresh every N seconds until interrupted
        #[clap(long)]
        watch: Option<u64>,
    },

    /// Run the auto-clean scheduler; press Enter to request a manual clean
    Watch {
        /// Run auto-clean even if it is disabled in the config
        #[clap(long)]
        force_auto: bool,
    },

    /// Create a default configuration file
    InitConfig {
        /// Path to output configuration file
        #[clap(default_value = DEFAULT_CONFIG_NAME)]
        path: PathBuf,
    },
}
