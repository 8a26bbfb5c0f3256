//! # webbook CLI
//!
//! Command-line interface for numbering, cross-linking and indexing a
//! multi-file HTML book.

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "webbook")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Directory holding the book files
    #[arg(long, global = true, default_value = ".", env = "WEBBOOK_DIR")]
    book: PathBuf,

    /// Path to configuration file (defaults to <book>/resources/configuration.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Number the book, repair links, rewrite changed files and the table of contents
    Build {
        /// List the files that would change without moving or writing anything
        #[arg(long)]
        dry_run: bool,

        /// Seed for generated identifiers (overrides IdSeed)
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Scan the book and report its structure and diagnostics
    Verify {
        /// Emit JSON instead of text
        #[arg(long)]
        json: bool,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let subscriber = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(if cli.verbose {
                tracing::Level::DEBUG.into()
            } else {
                tracing::Level::INFO.into()
            }),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| webbook_core::BookConfig::default_path(&cli.book));

    match cli.command {
        Commands::Build { dry_run, seed } => commands::build_book(&config_path, dry_run, seed),
        Commands::Verify { json } => commands::verify_book(&config_path, json),
    }
}
