use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

mod commands;
mod config;
mod error;
mod fasta;

use config::Config;
use linalign_core::Score;
use error::{format_error_with_suggestions, CliError};

#[derive(Parser)]
#[command(name = "linalign")]
#[command(about = "Optimal global sequence alignment in linear memory")]
#[command(version)]
#[command(long_about = "
linalign computes an optimal global alignment of two sequences under an
affine gap model while keeping memory linear in the sequence lengths.

Examples:
  linalign align --query a.fa --target b.fa
  linalign align --query a.fa.gz --target b.fq --format json --out aln.json
  linalign align --query a.fa --target b.fa --anchor 120:131 --cuts 16
  linalign config > linalign.toml
")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file path
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Number of threads to use
    #[arg(short, long, global = true)]
    pub threads: Option<usize>,

    /// Verbose output
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (suppress non-error output)
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Globally align the first record of two FASTA/FASTQ files
    Align {
        /// Query sequence file (FASTA/FASTQ, optionally .gz)
        #[arg(long, required = true)]
        query: PathBuf,

        /// Target sequence file (FASTA/FASTQ, optionally .gz)
        #[arg(long, required = true)]
        target: PathBuf,

        /// Output file (stdout if omitted)
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Output format
        #[arg(long)]
        format: Option<OutputFormat>,

        /// Force query position QUERY to pair with target position TARGET
        /// (1-based, repeatable)
        #[arg(long = "anchor", value_name = "QUERY:TARGET")]
        anchors: Vec<String>,

        /// Anchors placed per rectangle and pass
        #[arg(long)]
        cuts: Option<usize>,

        /// Largest rectangle, in DP cells, solved directly
        #[arg(long)]
        leaf_cells: Option<usize>,

        /// Passes before oversized rectangles are solved directly
        #[arg(long)]
        max_passes: Option<usize>,

        /// Score for identical symbols
        #[arg(long = "match", allow_hyphen_values = true)]
        match_score: Option<Score>,

        /// Score for differing symbols
        #[arg(long, allow_hyphen_values = true)]
        mismatch: Option<Score>,

        /// Cost of opening a gap
        #[arg(long)]
        gap_open: Option<Score>,

        /// Cost of extending a gap
        #[arg(long)]
        gap_extend: Option<Score>,

        /// Process rectangles on a single thread
        #[arg(long)]
        sequential: bool,
    },

    /// Print an example configuration file
    Config {
        /// Write to this file instead of stdout
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    fn as_str(self) -> &'static str {
        match self {
            OutputFormat::Text => "text",
            OutputFormat::Json => "json",
        }
    }
}

fn setup_logging(verbose: u8, quiet: bool) {
    let level = if quiet {
        "error"
    } else {
        match verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Config { out } => {
            let example = Config::example_toml()?;
            match out {
                Some(path) => {
                    std::fs::write(&path, example)
                        .with_context(|| format!("Failed to write configuration file: {}", path.display()))?;
                    log::info!("Example configuration written to {}", path.display());
                }
                None => print!("{}", example),
            }
        }

        Commands::Align {
            query,
            target,
            out,
            format,
            anchors,
            cuts,
            leaf_cells,
            max_passes,
            match_score,
            mismatch,
            gap_open,
            gap_extend,
            sequential,
        } => {
            let mut config = Config::load(cli.config.as_deref())?;

            // CLI flags override file values
            if let Some(format) = format {
                config.general.format = format.as_str().to_string();
            }
            if let Some(cuts) = cuts {
                config.aligner.cuts_per_section = cuts;
            }
            if let Some(cells) = leaf_cells {
                config.aligner.leaf_cells = cells;
            }
            if let Some(passes) = max_passes {
                config.aligner.max_passes = passes;
            }
            if let Some(score) = match_score {
                config.scoring.match_score = score;
            }
            if let Some(score) = mismatch {
                config.scoring.mismatch = score;
            }
            if let Some(cost) = gap_open {
                config.scoring.gap_open = cost;
            }
            if let Some(cost) = gap_extend {
                config.scoring.gap_extend = cost;
            }
            if sequential {
                config.aligner.parallel = false;
            }
            config.validate()?;

            let threads = cli.threads.unwrap_or(config.general.threads).max(1);
            rayon::ThreadPoolBuilder::new()
                .num_threads(threads)
                .build_global()
                .context("Failed to set thread count")?;
            log::debug!("Using {} threads", threads);

            commands::align::execute(&config, &query, &target, &anchors, out.as_deref())?;
        }
    }
    Ok(())
}

fn main() {
    let cli = Cli::parse();
    setup_logging(cli.verbose, cli.quiet);

    if let Err(err) = run(cli) {
        match err.downcast_ref::<CliError>() {
            Some(cli_error) => eprintln!("Error: {}", format_error_with_suggestions(cli_error)),
            None => eprintln!("Error: {:#}", err),
        }
        std::process::exit(1);
    }
}
