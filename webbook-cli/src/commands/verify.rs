//! Verify the book without writing anything and emit diagnostics.

use super::load_config;
use anyhow::{Context, Result};
use serde::Serialize;
use std::path::Path;
use webbook_core::{BookBuilder, Diagnostic, DiagnosticSeverity, OutlineNode};

#[derive(Serialize)]
struct VerificationSummary<'a> {
    files: usize,
    sections: usize,
    bookmarks: usize,
    pending: Vec<&'a str>,
    errors: usize,
    warnings: usize,
    diagnostics: &'a [Diagnostic],
    outline: Vec<OutlineNode>,
}

/// Scan, number and resolve the book, then report what a build would change.
pub fn verify_book(config_path: &Path, json: bool) -> Result<()> {
    let config = load_config(config_path)?;
    let builder = BookBuilder::new(config);
    let structure = builder
        .scan()
        .context("Failed to scan book for verification")?;

    let diagnostics = &structure.diagnostics;
    let count = |severity: DiagnosticSeverity| {
        diagnostics
            .iter()
            .filter(|d| d.severity == severity)
            .count()
    };

    let summary = VerificationSummary {
        files: structure.files.len(),
        sections: structure.outline.len(),
        bookmarks: structure.bookmarks.len(),
        pending: structure.pending_files(),
        errors: count(DiagnosticSeverity::Error),
        warnings: count(DiagnosticSeverity::Warning),
        diagnostics,
        outline: structure.outline.tree(),
    };

    if json {
        let payload = serde_json::to_string_pretty(&summary)?;
        println!("{}", payload);
    } else {
        println!(
            "Verification complete: {} files, {} sections, {} bookmarks, {} errors, {} warnings",
            summary.files, summary.sections, summary.bookmarks, summary.errors, summary.warnings
        );
        if summary.pending.is_empty() {
            println!("All section files are up to date");
        } else {
            println!("Files needing changes: {}", summary.pending.join(", "));
        }
        for diag in diagnostics {
            let file = diag
                .file
                .as_deref()
                .map(|f| format!(" [{}]", f))
                .unwrap_or_default();
            println!("- {:?} {}{}: {}", diag.severity, diag.code, file, diag.message);
            if let Some(ctx) = &diag.context {
                println!("  context: {}", ctx);
            }
        }
    }

    Ok(())
}
