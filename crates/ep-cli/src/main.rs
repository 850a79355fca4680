//! evprep CLI

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod convert;
mod diagnostics;

#[derive(Parser)]
#[command(name = "evprep")]
#[command(about = "evprep - derived physics quantities and ML-ready datasets from event tables")]
#[command(version)]
struct Cli {
    /// Log verbosity level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "info")]
    log_level: tracing::Level,

    /// Shortcut for `--log-level debug`
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply define sets and export datasets for every input file
    Convert {
        /// YAML run configuration
        #[arg(short, long)]
        config: PathBuf,

        /// Single input file overriding the configured glob
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Subfolder appended to the configured output path
        #[arg(short = 'o', long)]
        output_subfolder: Option<String>,

        /// Maximum number of events read per input file
        #[arg(short = 'm', long)]
        max_events_per_file: Option<usize>,

        /// Offset added to the output index of each input file
        #[arg(long, default_value = "0")]
        file_index_offset: usize,

        /// Overwrite existing outputs instead of skipping them
        #[arg(short = 'k', long)]
        overwrite: bool,
    },

    /// Delete outputs that are missing datasets or unreadable
    Clean {
        /// YAML run configuration
        #[arg(short, long)]
        config: PathBuf,

        /// Subfolder appended to the configured output path
        #[arg(short = 'o', long)]
        output_subfolder: Option<String>,

        /// Report only, delete nothing
        #[arg(long)]
        dry_run: bool,
    },

    /// Write (and submit) one Slurm job per input file
    Batch {
        /// YAML run configuration
        #[arg(short, long)]
        config: PathBuf,

        /// Subfolder appended to the configured output path
        #[arg(short = 'o', long)]
        output_subfolder: Option<String>,

        /// Maximum number of events read per input file
        #[arg(short = 'm', long)]
        max_events_per_file: Option<usize>,

        /// Write scripts without calling sbatch
        #[arg(long)]
        dry_run: bool,

        /// Submit files whose output already exists
        #[arg(short = 'k', long)]
        overwrite: bool,
    },

    /// Show row counts and field types of exported datasets
    Inspect {
        /// Parquet file or output directory
        path: PathBuf,

        /// Also print the first N rows of each dataset
        #[arg(long, default_value = "0")]
        head: usize,
    },

    /// Print HS vertices and jet selection of the first events of an input file
    Dump {
        /// Input Parquet event file
        path: PathBuf,

        /// Number of events to print
        #[arg(short = 'n', long, default_value = "5")]
        events: usize,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.debug { tracing::Level::DEBUG } else { cli.log_level };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Convert {
            config,
            input,
            output_subfolder,
            max_events_per_file,
            file_index_offset,
            overwrite,
        } => convert::cmd_convert(
            &config,
            input.as_deref(),
            output_subfolder.as_deref(),
            max_events_per_file,
            file_index_offset,
            overwrite,
        ),
        Commands::Clean { config, output_subfolder, dry_run } => {
            convert::cmd_clean(&config, output_subfolder.as_deref(), dry_run)
        }
        Commands::Batch { config, output_subfolder, max_events_per_file, dry_run, overwrite } => {
            convert::cmd_batch(
                &config,
                output_subfolder.as_deref(),
                max_events_per_file,
                dry_run,
                cli.debug,
                overwrite,
            )
        }
        Commands::Inspect { path, head } => diagnostics::cmd_inspect(&path, head),
        Commands::Dump { path, events } => diagnostics::cmd_dump(&path, events),
    }
}
