//! # webbook-core
//!
//! Core library for the webbook tool.
//!
//! This crate scans the section files of a multi-file HTML book, numbers
//! its chapters, appendices, captions and equations, repairs cross
//! references, and rewrites only the bytes that have to change.

pub mod backup;
pub mod bookmarks;
pub mod builder;
pub mod config;
pub mod extract;
pub mod html;
pub mod ids;
pub mod links;
pub mod models;
pub mod nav;
pub mod numbering;
pub mod outline;
pub mod patch;
pub mod toc;

pub use bookmarks::{Bookmark, BookmarkRegistry};
pub use builder::{BookBuilder, BuildError, BuildOptions, BuildReport};
pub use config::{BookConfig, ConfigError};
pub use models::{BookStructure, Diagnostic, DiagnosticSeverity, Outline, OutlineNode};
pub use numbering::{Counters, TopLevelKind};
pub use toc::TocMerge;
