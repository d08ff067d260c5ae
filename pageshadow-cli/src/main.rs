//! pageshadow CLI - redirected writes on read-only mappings, logged and merged.

mod commands;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use pageshadow_core::ShadowConfig;
use pageshadow_core::observability::{TracingConfig, TracingGuard, init_tracing};
use pageshadow_core::redirect::RebindStrategy;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

/// pageshadow - write to read-only file mappings without touching the files.
#[derive(Parser)]
#[command(name = "pageshadow")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// YAML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Working directory holding files/, logs/ and merge/
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create files/, logs/ and merge/ and seed the demo files
    Init {
        /// Number of demo files to create
        #[arg(short = 'n', long)]
        files: Option<usize>,
    },

    /// Run worker processes that write to the demo files through redirection
    Test {
        /// Number of worker processes
        #[arg(short, long)]
        processes: Option<usize>,

        /// Number of demo files each worker writes to
        #[arg(short = 'n', long)]
        files: Option<usize>,

        /// Page rebind strategy (auto, pteditor, remap)
        #[arg(long)]
        rebind: Option<RebindStrategy>,

        /// Let only one worker redirect and write at a time
        #[arg(long)]
        serialize: bool,
    },

    /// Replay one write log onto a copy of its source file
    Merge {
        /// The original file
        #[arg(short, long)]
        source: PathBuf,

        /// The write log to replay
        #[arg(short, long)]
        log: PathBuf,
    },

    /// Replay every write log of a source file onto a copy of it
    #[command(name = "merge_all", alias = "merge-all")]
    MergeAll {
        /// The original file
        #[arg(short, long)]
        source: PathBuf,
    },

    /// Compare two files byte by byte (exit status 1 when they differ, 2 on errors)
    Diff {
        /// First file
        left: PathBuf,

        /// Second file
        right: PathBuf,
    },

    /// Compare buffered I/O against a shared mapping on a generated file
    Bench {
        /// Size of the generated file in bytes
        #[arg(long, default_value = "10485760")]
        size: usize,

        /// Iterations per method
        #[arg(short = 'n', long, default_value = "5")]
        iterations: u32,

        /// Where to generate the file (default: <root>/bench.dat)
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// Print the page-table entry behind each page of a mapped file
    Inspect {
        /// File to map and inspect
        #[arg(short, long)]
        source: PathBuf,
    },

    /// Perform one worker's redirected, logged writes
    #[command(hide = true)]
    Worker {
        /// Worker index, for diagnostics
        #[arg(long, default_value = "0")]
        index: usize,

        /// Number of demo files to write to
        #[arg(short = 'n', long)]
        files: Option<usize>,

        /// Page rebind strategy
        #[arg(long)]
        rebind: Option<RebindStrategy>,

        /// Hold the worker lock while redirecting and writing
        #[arg(long)]
        serialize: bool,
    },
}

fn setup_logging(verbosity: u8) -> Result<TracingGuard> {
    init_tracing(TracingConfig::from_env(verbosity))
}

fn load_config(path: Option<&Path>, root: Option<&Path>) -> Result<ShadowConfig> {
    let mut config = ShadowConfig::load(path).context("Failed to load configuration")?;
    if let Some(root) = root {
        config = config.with_root(root);
    }
    Ok(config)
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let Cli {
        verbose,
        config: config_path,
        root,
        command,
    } = cli;
    let load = || load_config(config_path.as_deref(), root.as_deref());

    match command {
        Commands::Init { files } => {
            let config = match files {
                Some(files) => load()?.with_files(files),
                None => load()?,
            };
            commands::init::run(&config)?;
        }
        Commands::Test {
            processes,
            files,
            rebind,
            serialize,
        } => {
            let config = commands::apply_overrides(load()?, files, rebind, serialize);
            let config = match processes {
                Some(processes) => config.with_processes(processes),
                None => config,
            };
            let forward = commands::test::Forward {
                verbose,
                config: config_path.clone(),
            };
            commands::test::run(&config, &forward).await?;
        }
        Commands::Merge { source, log } => commands::merge::run(&load()?, &source, &log)?,
        Commands::MergeAll { source } => commands::merge_all::run(&load()?, &source)?,
        // Needs no configuration; reports its own failures with status 2.
        Commands::Diff { left, right } => return Ok(commands::diff::run(&left, &right)),
        Commands::Bench {
            size,
            iterations,
            file,
        } => commands::bench::run(&load()?, file, size, iterations)?,
        Commands::Inspect { source } => commands::inspect::run(&load()?, &source)?,
        Commands::Worker {
            index,
            files,
            rebind,
            serialize,
        } => {
            let config = commands::apply_overrides(load()?, files, rebind, serialize);
            commands::worker::run(&config, index)?;
        }
    }

    Ok(ExitCode::SUCCESS)
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let tracing_guard = match setup_logging(cli.verbose) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("pageshadow: failed to initialize logging: {:#}", e);
            return ExitCode::FAILURE;
        }
    };
    tracing::trace!(format = ?tracing_guard.format(), "Logging initialized");

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("Command failed: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn merge_requires_source_and_log() {
        assert!(Cli::try_parse_from(["pageshadow", "merge", "-s", "files/file0"]).is_err());
        assert!(Cli::try_parse_from(["pageshadow", "merge", "-l", "x.log"]).is_err());

        let cli =
            Cli::try_parse_from(["pageshadow", "merge", "-s", "files/file0", "-l", "x.log"]).unwrap();
        match cli.command {
            Commands::Merge { source, log } => {
                assert_eq!(source, PathBuf::from("files/file0"));
                assert_eq!(log, PathBuf::from("x.log"));
            }
            _ => panic!("expected merge"),
        }
    }

    #[test]
    fn merge_all_accepts_both_spellings() {
        for name in ["merge_all", "merge-all"] {
            let cli = Cli::try_parse_from(["pageshadow", name, "-s", "files/file0"]).unwrap();
            assert!(matches!(cli.command, Commands::MergeAll { .. }));
        }
        assert!(Cli::try_parse_from(["pageshadow", "merge_all"]).is_err());
    }

    #[test]
    fn unknown_subcommand_is_rejected() {
        assert!(Cli::try_parse_from(["pageshadow", "frobnicate"]).is_err());
        assert!(Cli::try_parse_from(["pageshadow"]).is_err());
    }

    #[test]
    fn test_overrides_parse() {
        let cli = Cli::try_parse_from([
            "pageshadow",
            "-vv",
            "--root",
            "/tmp/w",
            "test",
            "-p",
            "3",
            "--rebind",
            "remap",
            "--serialize",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.root, Some(PathBuf::from("/tmp/w")));
        match cli.command {
            Commands::Test {
                processes,
                rebind,
                serialize,
                ..
            } => {
                assert_eq!(processes, Some(3));
                assert_eq!(rebind, Some(RebindStrategy::Remap));
                assert!(serialize);
            }
            _ => panic!("expected test"),
        }
    }

    #[test]
    fn bad_rebind_strategy_is_rejected() {
        assert!(Cli::try_parse_from(["pageshadow", "test", "--rebind", "magic"]).is_err());
    }
}
