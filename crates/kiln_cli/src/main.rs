//! Kiln CLI: the command-line interface for the Kiln incremental build tool.
//!
//! Provides `kiln build` for building projects and their dependencies,
//! `kiln status` for a dry run that reports what would be rebuilt,
//! `kiln clean` for removing artifacts and stored fingerprints, and
//! `kiln fingerprint` for inspecting the fingerprint of a set of paths.

#![warn(missing_docs)]

mod build;
mod clean;
mod fingerprint;
mod status;
#[cfg(test)]
mod testing;
mod workspace;

use std::process;

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

/// Kiln: content-fingerprinted incremental builds for JVM projects.
#[derive(Parser, Debug)]
#[command(name = "kiln", version, about = "Kiln incremental build tool")]
pub struct Cli {
    /// Suppress all output except errors.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Enable verbose (debug-level) output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to a `kiln.toml` file or the directory containing it.
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// Maximum number of projects built concurrently.
    #[arg(short, long, global = true)]
    pub jobs: Option<usize>,

    /// The subcommand to run.
    #[command(subcommand)]
    pub command: Command,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Build projects and everything they depend on.
    Build(BuildArgs),
    /// Report which projects are up to date without building.
    Status(StatusArgs),
    /// Remove artifacts, staging trees and stored fingerprints.
    Clean(CleanArgs),
    /// Print the fingerprint of a set of paths or glob patterns.
    Fingerprint(FingerprintArgs),
}

/// Arguments for the `kiln build` subcommand.
#[derive(Parser, Debug)]
pub struct BuildArgs {
    /// Projects to build. Builds every project when omitted.
    pub projects: Vec<String>,

    /// Rebuild every project regardless of fingerprints.
    #[arg(short, long)]
    pub force: bool,
}

/// Arguments for the `kiln status` subcommand.
#[derive(Parser, Debug)]
pub struct StatusArgs {
    /// Projects to inspect. Inspects every project when omitted.
    pub projects: Vec<String>,

    /// Output format.
    #[arg(long, value_enum, default_value_t = ReportFormat::Text)]
    pub format: ReportFormat,
}

/// Arguments for the `kiln clean` subcommand.
#[derive(Parser, Debug)]
pub struct CleanArgs {
    /// Projects to clean. Cleans every project when omitted.
    pub projects: Vec<String>,
}

/// Arguments for the `kiln fingerprint` subcommand.
#[derive(Parser, Debug)]
pub struct FingerprintArgs {
    /// Paths or glob patterns, relative to the current directory.
    #[arg(required = true)]
    pub patterns: Vec<String>,

    /// Also print every file that contributed.
    #[arg(short, long)]
    pub list: bool,
}

/// Report output format.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ReportFormat {
    /// Human-readable terminal output.
    Text,
    /// Machine-readable JSON output.
    Json,
}

/// Global settings derived from CLI flags.
pub struct GlobalArgs {
    /// Whether to suppress non-error output.
    pub quiet: bool,
    /// Whether to print verbose/debug information.
    pub verbose: bool,
    /// Optional path to a custom config file.
    pub config: Option<String>,
    /// Concurrency override.
    pub jobs: Option<usize>,
}

fn main() {
    let cli = Cli::parse();

    let global = GlobalArgs {
        quiet: cli.quiet,
        verbose: cli.verbose,
        config: cli.config,
        jobs: cli.jobs,
    };
    init_logging(&global);

    let result = match cli.command {
        Command::Build(ref args) => build::run(args, &global),
        Command::Status(ref args) => status::run(args, &global),
        Command::Clean(ref args) => clean::run(args, &global),
        Command::Fingerprint(ref args) => fingerprint::run(args, &global),
    };

    match result {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("error: {e}");
            process::exit(1);
        }
    }
}

/// Installs the stderr log subscriber. `RUST_LOG` overrides the level
/// chosen by `--quiet` / `--verbose`.
fn init_logging(global: &GlobalArgs) {
    let level = default_log_level(global);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

fn default_log_level(global: &GlobalArgs) -> &'static str {
    if global.quiet {
        "error"
    } else if global.verbose {
        "debug"
    } else {
        "info"
    }
}
