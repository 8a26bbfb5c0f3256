//! CLI command implementations.

pub mod build;
pub mod verify;

pub use build::build_book;
pub use verify::verify_book;

use anyhow::{Context, Result};
use std::path::Path;
use webbook_core::BookConfig;

/// Load and validate the configuration at `config_path`
pub(crate) fn load_config(config_path: &Path) -> Result<BookConfig> {
    tracing::info!("Loading config from {:?}", config_path);
    BookConfig::from_file(config_path)
        .with_context(|| format!("Failed to load configuration from {}", config_path.display()))
}
