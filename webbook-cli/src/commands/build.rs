//! Build command implementation.

use super::load_config;
use anyhow::{Context, Result};
use std::path::Path;
use webbook_core::{BookBuilder, BuildOptions, TocMerge};

/// Run a full build (or a dry run) for the book configured at `config_path`
pub fn build_book(config_path: &Path, dry_run: bool, seed: Option<u64>) -> Result<()> {
    let mut config = load_config(config_path)?;
    if let Some(seed) = seed {
        config = config.with_seed(seed);
    }

    tracing::info!(
        "Building book in {} ({} section files)",
        config.book_dir().display(),
        config.section_files.len()
    );

    let builder = BookBuilder::new(config);
    let report = builder
        .build(&BuildOptions { dry_run })
        .context("Failed to build book")?;

    if dry_run {
        if report.pending.is_empty() {
            println!("Nothing to do: every section file is up to date");
        } else {
            println!("Would rewrite {} file(s):", report.pending.len());
            for name in &report.pending {
                println!("  {}", name);
            }
        }
    } else {
        println!(
            "Rewrote {} of {} section file(s)",
            report.rewritten.len(),
            builder.config().section_files.len()
        );
        let toc = &builder.config().toc_file;
        match report.toc {
            Some(TocMerge::Fresh) => println!("Generated {}", toc),
            Some(TocMerge::Replaced) => println!("Updated {}", toc),
            Some(TocMerge::DefaultTail) => {
                println!("Updated {} (end marker missing, default tail written)", toc)
            }
            None => {}
        }
        if let Some(dir) = &report.backup_dir {
            println!("Backup: {}", dir.display());
        }
    }

    if !report.diagnostics.is_empty() {
        println!("{} warning(s):", report.diagnostics.len());
        for diag in &report.diagnostics {
            let file = diag
                .file
                .as_deref()
                .map(|f| format!(" [{}]", f))
                .unwrap_or_default();
            println!("- {}{}: {}", diag.code, file, diag.message);
        }
    }

    Ok(())
}
