//! Command line interface definition

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// sprig - conda package cache with provenance-aware metadata records
#[derive(Parser)]
#[command(name = "sprig")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Conda package cache with provenance-aware metadata records")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[command(flatten)]
    pub global: GlobalArgs,
}

/// Global arguments available for all commands
#[derive(Parser)]
pub struct GlobalArgs {
    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Enable debug logging to stderr
    #[arg(long, global = true)]
    pub debug: bool,

    /// Use alternate config file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Package cache directory (overrides config and SPRIG_PKGS_DIR)
    #[arg(long, global = true, value_name = "DIR")]
    pub pkgs_dir: Option<PathBuf>,
}

/// Available commands
#[derive(Subcommand)]
pub enum Commands {
    /// Fetch packages into the cache and write their records
    #[command(alias = "f")]
    Fetch {
        /// Package URLs, or paths to `@EXPLICIT` / conda-lock lockfiles
        #[arg(required = true)]
        inputs: Vec<String>,

        /// Fetch again even when a healthy record is cached
        #[arg(long)]
        force: bool,

        /// Maximum concurrent downloads
        #[arg(short, long)]
        jobs: Option<usize>,
    },

    /// Check every cached record for corruption
    Verify {
        /// Rebuild corrupted records from their manifests
        #[arg(long)]
        repair: bool,
    },

    /// Show the record, provenance and verdict of one extracted package
    Inspect {
        /// Extracted package directory
        dir: PathBuf,
    },
}
