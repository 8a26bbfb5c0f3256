//! Book building logic - orchestrates scanning, numbering, link resolution
//! and rewriting of the book files.

use crate::{
    backup::{BackupDir, BackupError},
    config::{BookConfig, ConfigError},
    extract::{self, ExtractError, ScannedFile},
    ids::IdGenerator,
    links::resolve_links,
    models::{BookStructure, Diagnostic},
    nav::NavLinks,
    outline::{OutlineBuilder, OutlineError},
    patch::{patch_file, PatchError},
    toc::{self, TocMerge},
};
use chrono::Local;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BuildError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Failed to read {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{0:?} is not valid UTF-8")]
    Encoding(PathBuf),

    #[error("{file}: {source}")]
    Extract {
        file: String,
        #[source]
        source: ExtractError,
    },

    #[error(transparent)]
    Outline(#[from] OutlineError),

    #[error(transparent)]
    Patch(#[from] PatchError),

    #[error(transparent)]
    Backup(#[from] BackupError),

    #[error("Failed to write {path:?}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Section file {0:?} does not exist")]
    MissingSection(PathBuf),
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BuildOptions {
    /// Scan and report, but neither move nor write any file
    pub dry_run: bool,
}

/// Outcome of one run
#[derive(Debug, Clone, Serialize)]
pub struct BuildReport {
    pub backup_dir: Option<PathBuf>,
    /// Section files that were rewritten
    pub rewritten: Vec<String>,
    /// Section files that differ from what a run produces
    pub pending: Vec<String>,
    pub toc: Option<TocMerge>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Main book builder
pub struct BookBuilder {
    config: BookConfig,
}

impl BookBuilder {
    pub fn new(config: BookConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &BookConfig {
        &self.config
    }

    /// Scan every section file in book order and build the resolved
    /// structure, without touching the file system.
    pub fn scan(&self) -> Result<BookStructure, BuildError> {
        let mut scanned: Vec<(&str, ScannedFile)> = Vec::new();
        for name in &self.config.section_files {
            let path = self.config.resolve(name);
            if !path.is_file() {
                return Err(BuildError::MissingSection(path));
            }
            tracing::info!("Scanning {}", name);
            let source = read_source(&path)?;
            let file = extract::scan(&source).map_err(|source| BuildError::Extract {
                file: name.clone(),
                source,
            })?;
            scanned.push((name.as_str(), file));
        }

        let mut ids = IdGenerator::new(self.config.id_seed);
        for (_, file) in &scanned {
            ids.reserve(file.explicit_ids());
        }

        let mut outline = OutlineBuilder::new(&self.config, ids);
        for (index, (name, file)) in scanned.iter().enumerate() {
            outline.add_file(index, name, file)?;
        }
        let mut structure = outline.finish();
        resolve_links(&mut structure, &self.config);

        tracing::info!(
            "Found {} sections and {} bookmarks in {} files",
            structure.outline.len(),
            structure.bookmarks.len(),
            structure.files.len()
        );
        Ok(structure)
    }

    /// Run the whole pipeline: scan, rewrite the section files that changed
    /// and regenerate the table of contents.
    pub fn build(&self, options: &BuildOptions) -> Result<BuildReport, BuildError> {
        let structure = self.scan()?;
        let pending: Vec<String> = structure
            .pending_files()
            .into_iter()
            .map(str::to_string)
            .collect();

        if options.dry_run {
            for name in &pending {
                tracing::info!("Would rewrite {}", name);
            }
            return Ok(BuildReport {
                backup_dir: None,
                rewritten: Vec::new(),
                pending,
                toc: None,
                diagnostics: structure.diagnostics,
            });
        }

        let backup = BackupDir::create(&self.config.backup_root(), &Local::now())?;
        let mut rewritten = Vec::new();

        for (index, file) in structure.files.iter().enumerate() {
            if !file.needs_rewrite() {
                continue;
            }
            let path = self.config.resolve(&file.name);
            let moved = backup
                .relocate(&path)?
                .ok_or_else(|| BuildError::MissingSection(path.clone()))?;

            let patched = read_source(&moved).and_then(|original| {
                let nav = NavLinks::for_file(&self.config, index);
                Ok(patch_file(&original, file, &nav)?)
            });
            let patched = match patched {
                Ok(patched) => patched,
                Err(err) => {
                    restore(&moved, &path);
                    return Err(err);
                }
            };

            write_file(&path, &patched)?;
            tracing::info!("Rewrote {}", file.name);
            rewritten.push(file.name.clone());
        }

        let toc_path = self.config.resolve(&self.config.toc_file);
        let previous = match backup.relocate(&toc_path)? {
            Some(moved) => Some(read_source(&moved)?),
            None => None,
        };
        let block = toc::render_structure(&structure);
        let (content, merge) = toc::merge(previous.as_deref(), &block);
        write_file(&toc_path, &content)?;
        match merge {
            TocMerge::Fresh => tracing::info!("Generated {}", self.config.toc_file),
            TocMerge::Replaced => tracing::info!("Updated {}", self.config.toc_file),
            TocMerge::DefaultTail => tracing::warn!(
                "{} has no end marker; wrote a default tail",
                self.config.toc_file
            ),
        }

        Ok(BuildReport {
            backup_dir: Some(backup.path().to_path_buf()),
            rewritten,
            pending,
            toc: Some(merge),
            diagnostics: structure.diagnostics,
        })
    }
}

fn read_source(path: &Path) -> Result<String, BuildError> {
    let bytes = fs::read(path).map_err(|source| BuildError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    String::from_utf8(bytes).map_err(|_| BuildError::Encoding(path.to_path_buf()))
}

fn write_file(path: &Path, content: &str) -> Result<(), BuildError> {
    fs::write(path, content).map_err(|source| BuildError::Write {
        path: path.to_path_buf(),
        source,
    })
}

/// Put a relocated file back after a failed rewrite
fn restore(moved: &Path, original: &Path) {
    if let Err(err) = fs::rename(moved, original) {
        tracing::error!(
            "Could not restore {} from {}: {}",
            original.display(),
            moved.display(),
            err
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const CHAPTER_1: &str = r##"<!DOCTYPE html>
<html>
<body>
<h1 id="c1">Chapter 1 Basics</h1>
<p>See <a href="b.html#roots">the formula</a> and <a href="#t1">Table 9-9</a>.</p>
<table><caption id="t1">Values</caption></table>
<h2>Setup</h2>
</body>
</html>
"##;

    const CHAPTER_2: &str = r#"<!DOCTYPE html>
<html>
<body>
<h1 id="c2">Chapter 7 Algebra</h1>
<div class="equation" id="roots"> $$ x = 1 $$ </div>
</body>
</html>
"#;

    fn book() -> (TempDir, BookConfig) {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("index.html"), "<html><body>Cover</body></html>").unwrap();
        fs::write(dir.path().join("a.html"), CHAPTER_1).unwrap();
        fs::write(dir.path().join("b.html"), CHAPTER_2).unwrap();
        let config = BookConfig::new(
            dir.path(),
            "backup",
            "index.html",
            "toc.html",
            vec!["a.html".into(), "b.html".into()],
        );
        (dir, config)
    }

    fn read(dir: &TempDir, name: &str) -> String {
        fs::read_to_string(dir.path().join(name)).unwrap()
    }

    #[test]
    fn test_build_rewrites_and_backs_up() {
        let (dir, config) = book();
        let report = BookBuilder::new(config).build(&BuildOptions::default()).unwrap();

        assert_eq!(report.rewritten, vec!["a.html", "b.html"]);
        assert_eq!(report.toc, Some(TocMerge::Fresh));

        let a = read(&dir, "a.html");
        assert!(a.contains("<body>\n<nav><ul>\n  <li><a href=\"toc.html\">Table of Contents</a></li>\n  <li><a href=\"index.html\">Previous</a></li>\n  <li><a href=\"b.html\">Next</a></li>\n</ul></nav>\n<h1"));
        assert!(a.contains("<caption id=\"t1\">Table 1-1: Values</caption>"));
        assert!(a.contains("<a href=\"b.html#roots\">(2.1)</a>"));
        assert!(a.contains("<a href=\"#t1\" title=\"Table 1-1: Values\">Table 1-1</a>"));
        assert!(a.contains(">1.1 Setup</h2>"));

        let b = read(&dir, "b.html");
        assert!(b.contains("<h1 id=\"c2\">Chapter 2 Algebra</h1>"));
        assert!(b.contains(r#"<div class="equation" id="roots"> $$ (2.1) \;\;\;\;\;  x = 1 $$ </div>"#));

        let backup = report.backup_dir.unwrap();
        assert_eq!(fs::read_to_string(backup.join("a.html")).unwrap(), CHAPTER_1);
        assert_eq!(fs::read_to_string(backup.join("b.html")).unwrap(), CHAPTER_2);

        let toc = read(&dir, "toc.html");
        assert!(toc.contains(toc::BEGIN_MARKER));
        assert!(toc.contains("<a href=\"b.html#c2\"><strong>Chapter 2 Algebra</strong></a>"));
    }

    #[test]
    fn test_second_run_is_noop() {
        let (dir, config) = book();
        let builder = BookBuilder::new(config);
        builder.build(&BuildOptions::default()).unwrap();
        let a = read(&dir, "a.html");
        let b = read(&dir, "b.html");
        let toc = read(&dir, "toc.html");

        let report = builder.build(&BuildOptions::default()).unwrap();
        assert!(report.rewritten.is_empty());
        assert!(report.pending.is_empty());
        assert_eq!(report.toc, Some(TocMerge::Replaced));
        assert_eq!(read(&dir, "a.html"), a);
        assert_eq!(read(&dir, "b.html"), b);
        assert_eq!(read(&dir, "toc.html"), toc);
    }

    #[test]
    fn test_placeholder_ids_replaced_once() {
        let (dir, config) = book();
        fs::write(
            dir.path().join("b.html"),
            "<html><body>\n<h1 id=\"#\">Chapter 2 B</h1>\n<h2 id=\"\" class=\"x\">2.1 Sub</h2>\n</body></html>",
        )
        .unwrap();
        let builder = BookBuilder::new(config);
        builder.build(&BuildOptions::default()).unwrap();

        let b = read(&dir, "b.html");
        assert_eq!(b.matches("id=").count(), 2);
        assert!(!b.contains("id=\"#\""));
        assert!(!b.contains("id=\"\""));
        assert!(b.contains("\" class=\"x\">2.1 Sub</h2>"));

        let report = builder.build(&BuildOptions::default()).unwrap();
        assert!(report.rewritten.is_empty());
        assert_eq!(read(&dir, "b.html"), b);
    }

    #[test]
    fn test_named_entities_survive_rewrite() {
        let (dir, config) = book();
        fs::write(
            dir.path().join("a.html"),
            r##"<html><body>
<h1 id="c1">Chapter 3 Caf&eacute; &mdash; intro</h1>
<p><a href="#t1">old</a></p>
<table><caption id="t1"><em>Table 9-9:</em> x &ndash; y</caption></table>
</body></html>"##,
        )
        .unwrap();
        let builder = BookBuilder::new(config);
        builder.build(&BuildOptions::default()).unwrap();

        let a = read(&dir, "a.html");
        assert!(a.contains("<h1 id=\"c1\">Chapter 1 Caf&eacute; &mdash; intro</h1>"));
        assert!(a.contains("<caption id=\"t1\">Table 1-1: x \u{2013} y</caption>"));
        assert!(a.contains("<a href=\"#t1\" title=\"Table 1-1: x \u{2013} y\">Table 1-1</a>"));
        assert!(!a.contains("&amp;"));

        let toc = read(&dir, "toc.html");
        assert!(toc.contains("<strong>Chapter 1 Caf\u{e9} \u{2014} intro</strong>"));
        assert!(toc.contains(">Table 1-1: x \u{2013} y</a>"));

        let report = builder.build(&BuildOptions::default()).unwrap();
        assert!(report.rewritten.is_empty());
    }

    #[test]
    fn test_dry_run_writes_nothing() {
        let (dir, config) = book();
        let report = BookBuilder::new(config)
            .build(&BuildOptions { dry_run: true })
            .unwrap();
        assert_eq!(report.pending, vec!["a.html", "b.html"]);
        assert!(report.backup_dir.is_none());
        assert_eq!(read(&dir, "a.html"), CHAPTER_1);
        assert!(!dir.path().join("backup").exists());
        assert!(!dir.path().join("toc.html").exists());
    }

    #[test]
    fn test_structural_error_touches_nothing() {
        let (dir, config) = book();
        fs::write(
            dir.path().join("b.html"),
            "<body><h1>Chapter 2 B</h1><h3>Orphan</h3></body>",
        )
        .unwrap();
        let err = BookBuilder::new(config)
            .build(&BuildOptions::default())
            .unwrap_err();
        assert!(matches!(
            err,
            BuildError::Outline(OutlineError::SkippedLevel { .. })
        ));
        assert!(!dir.path().join("backup").exists());
        assert_eq!(read(&dir, "a.html"), CHAPTER_1);
    }

    #[test]
    fn test_missing_section_file() {
        let (dir, config) = book();
        fs::remove_file(dir.path().join("b.html")).unwrap();
        let err = BookBuilder::new(config).scan().unwrap_err();
        assert!(matches!(err, BuildError::MissingSection(_)));
    }

    #[test]
    fn test_unresolved_link_reported() {
        let (dir, config) = book();
        fs::write(
            dir.path().join("b.html"),
            "<body><h1 id=\"c2\">Chapter 2 B</h1><a href=\"#gone\">x</a></body>",
        )
        .unwrap();
        let structure = BookBuilder::new(config).scan().unwrap();
        let codes: Vec<_> = structure.diagnostics.iter().map(|d| d.code.as_str()).collect();
        assert!(codes.contains(&"link.unresolved"));
    }
}
