//! Configuration parsing and management.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse JSON: {0}")]
    ParseError(#[from] serde_json::Error),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Section file listed twice: {0}")]
    DuplicateSection(String),
}

/// Book configuration matching `resources/configuration.json`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookConfig {
    #[serde(rename = "BackupDirectory")]
    pub backup_directory: String,

    #[serde(rename = "CoverFileName")]
    pub cover_file: String,

    #[serde(rename = "TableOfContentsFileName")]
    pub toc_file: String,

    #[serde(rename = "SectionsFileNames")]
    pub section_files: Vec<String>,

    /// Seed for identifiers generated for elements that have none
    #[serde(rename = "IdSeed", default)]
    pub id_seed: u64,

    // Internal: directory holding the book files
    #[serde(skip)]
    book_dir: Option<PathBuf>,
}

impl BookConfig {
    /// Build a configuration in memory, rooted at `book_dir`
    pub fn new(
        book_dir: impl Into<PathBuf>,
        backup_directory: impl Into<String>,
        cover_file: impl Into<String>,
        toc_file: impl Into<String>,
        section_files: Vec<String>,
    ) -> Self {
        Self {
            backup_directory: backup_directory.into(),
            cover_file: cover_file.into(),
            toc_file: toc_file.into(),
            section_files,
            id_seed: 0,
            book_dir: Some(book_dir.into()),
        }
    }

    /// Load configuration from a JSON file.
    ///
    /// The book directory is the directory containing `resources/`, i.e. the
    /// grandparent of the configuration file when it lives at the default
    /// location, otherwise its parent.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        let mut config: BookConfig = serde_json::from_str(&contents)?;
        config.validate()?;

        let parent = path.parent().unwrap_or_else(|| Path::new("."));
        let book_dir = if parent.file_name().is_some_and(|n| n == "resources") {
            parent.parent().unwrap_or(parent)
        } else {
            parent
        };
        config.book_dir = Some(book_dir.to_path_buf());

        Ok(config)
    }

    /// Default configuration path for a book directory
    pub fn default_path(book_dir: &Path) -> PathBuf {
        book_dir.join("resources").join("configuration.json")
    }

    /// Check the invariants the rest of the pipeline relies on
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.backup_directory.trim().is_empty() {
            return Err(ConfigError::MissingField("BackupDirectory".into()));
        }
        if self.cover_file.trim().is_empty() {
            return Err(ConfigError::MissingField("CoverFileName".into()));
        }
        if self.toc_file.trim().is_empty() {
            return Err(ConfigError::MissingField("TableOfContentsFileName".into()));
        }
        if self.section_files.is_empty() {
            return Err(ConfigError::MissingField("SectionsFileNames".into()));
        }

        let mut seen = HashSet::new();
        for name in &self.section_files {
            if name.trim().is_empty() {
                return Err(ConfigError::MissingField("SectionsFileNames entry".into()));
            }
            if !seen.insert(name.as_str()) {
                return Err(ConfigError::DuplicateSection(name.clone()));
            }
        }
        Ok(())
    }

    /// Override the identifier seed (e.g. from the command line)
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.id_seed = seed;
        self
    }

    /// Directory holding the book files
    pub fn book_dir(&self) -> PathBuf {
        self.book_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// Resolve a book file name against the book directory
    pub fn resolve(&self, name: &str) -> PathBuf {
        let path = Path::new(name);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.book_dir().join(path)
        }
    }

    /// Get the backup root, resolved relative to the book directory
    pub fn backup_root(&self) -> PathBuf {
        self.resolve(&self.backup_directory)
    }

    /// True if `name` is one of the files making up the book
    pub fn is_book_file(&self, name: &str) -> bool {
        name == self.cover_file
            || name == self.toc_file
            || self.section_files.iter().any(|f| f == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_json() -> &'static str {
        r#"{
  "BackupDirectory": "backup",
  "CoverFileName": "index.html",
  "TableOfContentsFileName": "tableofcontents.html",
  "SectionsFileNames": ["preface.html", "chapter_01.html", "chapter_A.html"]
}"#
    }

    #[test]
    fn test_parse_and_resolve() {
        let dir = tempfile::tempdir().unwrap();
        let resources = dir.path().join("resources");
        std::fs::create_dir_all(&resources).unwrap();
        let path = resources.join("configuration.json");
        std::fs::write(&path, sample_json()).unwrap();

        let config = BookConfig::from_file(&path).unwrap();
        assert_eq!(config.cover_file, "index.html");
        assert_eq!(config.section_files.len(), 3);
        assert_eq!(config.id_seed, 0);
        assert_eq!(config.book_dir(), dir.path());
        assert_eq!(config.backup_root(), dir.path().join("backup"));
        assert_eq!(
            config.resolve("chapter_01.html"),
            dir.path().join("chapter_01.html")
        );
    }

    #[test]
    fn test_missing_sections_rejected() {
        let config: BookConfig = serde_json::from_str(
            r#"{"BackupDirectory": "b", "CoverFileName": "c.html",
                "TableOfContentsFileName": "t.html", "SectionsFileNames": []}"#,
        )
        .unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingField(field)) if field == "SectionsFileNames"
        ));
    }

    #[test]
    fn test_duplicate_section_rejected() {
        let config = BookConfig::new(
            ".",
            "backup",
            "index.html",
            "toc.html",
            vec!["a.html".into(), "b.html".into(), "a.html".into()],
        );
        assert!(matches!(
            config.validate(),
            Err(ConfigError::DuplicateSection(name)) if name == "a.html"
        ));
    }

    #[test]
    fn test_is_book_file() {
        let config = BookConfig::new(
            ".",
            "backup",
            "index.html",
            "toc.html",
            vec!["a.html".into()],
        );
        assert!(config.is_book_file("index.html"));
        assert!(config.is_book_file("toc.html"));
        assert!(config.is_book_file("a.html"));
        assert!(!config.is_book_file("missing.html"));
    }
}
