//! # Compliance Copilot CLI (`ccp`)
//!
//! ## Usage
//!
//! ```bash
//! ccp --config ./config/ccp.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `ccp extract` | Extract PDFs in the downloads dir into the merged text file |
//! | `ccp filter` | Chunk, tag, and write the record collection |
//! | `ccp verify` | Print and save the verification report |
//! | `ccp run` | Run extract, filter, and verify in sequence |
//!
//! Set `RUST_LOG=debug` for per-chunk diagnostics on stderr.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use compliance_copilot::config::{self, Config};
use compliance_copilot::filter::{self, FilterOptions};
use compliance_copilot::{extract, verify};

const DEFAULT_CONFIG_PATH: &str = "./config/ccp.toml";

/// Compliance Copilot: chunk, tag, and verify extracted document text.
#[derive(Parser)]
#[command(
    name = "ccp",
    about = "Compliance Copilot — chunk, tag, and verify extracted document text",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/ccp.toml`; built-in defaults apply when that
    /// file does not exist.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract text from the PDFs in the downloads directory.
    ///
    /// Writes the merged text file with one BEGIN/END marker pair per PDF.
    Extract {
        /// Rebuild the merged text even if it already exists.
        #[arg(long)]
        force: bool,
    },

    /// Chunk the merged text, tag each chunk, and write the records.
    ///
    /// Uses Gemini tagging when GEMINI_API_KEY is set (provider `auto`),
    /// falling back to keyword rules per chunk on any failure.
    Filter {
        #[command(flatten)]
        args: FilterArgs,
    },

    /// Recompute statistics from the artifacts and report pipeline health.
    ///
    /// Exits non-zero unless the status is healthy.
    Verify {
        /// Print only the health status; do not save the report.
        #[arg(long)]
        health_check: bool,
    },

    /// Run extract, filter, and verify in sequence.
    Run {
        /// Rebuild the merged text even if it already exists.
        #[arg(long)]
        force_extract: bool,

        /// Use keyword rules only, even when a Gemini key is present.
        #[arg(long)]
        rules_only: bool,
    },
}

#[derive(clap::Args)]
struct FilterArgs {
    /// Merged text file to read (overrides `paths.merged_file`).
    #[arg(long)]
    input: Option<PathBuf>,

    /// Record file to write (overrides `paths.records_file`).
    #[arg(long)]
    output: Option<PathBuf>,

    /// Compute everything but do not write the record file.
    #[arg(long)]
    dry_run: bool,

    /// Use keyword rules only, even when a Gemini key is present.
    #[arg(long)]
    rules_only: bool,

    /// Chunk target size in characters (overrides `chunking.target_size`).
    #[arg(long)]
    target_size: Option<usize>,

    /// Chunk maximum size in characters (overrides `chunking.max_size`).
    #[arg(long)]
    max_size: Option<usize>,
}

impl FilterArgs {
    fn into_options(self, cfg: &Config) -> FilterOptions {
        let defaults = FilterOptions::from_config(cfg);
        FilterOptions {
            input: self.input.unwrap_or(defaults.input),
            output: self.output.unwrap_or(defaults.output),
            dry_run: self.dry_run,
            rules_only: self.rules_only,
            target_size: self.target_size.unwrap_or(defaults.target_size),
            max_size: self.max_size.unwrap_or(defaults.max_size),
        }
    }
}

fn load(path: Option<&Path>) -> anyhow::Result<Config> {
    match path {
        Some(path) => config::load_config(path),
        None if Path::new(DEFAULT_CONFIG_PATH).exists() => {
            config::load_config(Path::new(DEFAULT_CONFIG_PATH))
        }
        None => {
            let cfg = Config::minimal();
            config::validate(&cfg)?;
            Ok(cfg)
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let cfg = load(cli.config.as_deref())?;

    match cli.command {
        Commands::Extract { force } => {
            extract::run_extract(&cfg, force)?;
        }
        Commands::Filter { args } => {
            let opts = args.into_options(&cfg);
            filter::run_filter(&cfg, &opts).await?;
        }
        Commands::Verify { health_check } => {
            let report = verify::run_verify(&cfg, health_check)?;
            if !report.is_healthy() {
                std::process::exit(1);
            }
        }
        Commands::Run {
            force_extract,
            rules_only,
        } => {
            extract::run_extract(&cfg, force_extract)?;
            println!();

            let opts = FilterOptions {
                rules_only,
                ..FilterOptions::from_config(&cfg)
            };
            filter::run_filter(&cfg, &opts).await?;
            println!();

            let report = verify::run_verify(&cfg, false)?;
            if !report.is_healthy() {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}
