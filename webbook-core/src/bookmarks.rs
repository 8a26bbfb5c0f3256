//! Registry of cross-reference targets.

use crate::models::Diagnostic;
use serde::Serialize;
use std::collections::HashMap;
use thiserror::Error;

/// A resolvable cross-reference target
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Bookmark {
    pub file: String,
    pub label: String,
    pub tooltip: String,
}

impl Bookmark {
    pub fn new(file: &str, label: impl Into<String>, tooltip: impl Into<String>) -> Self {
        Self {
            file: file.to_string(),
            label: label.into(),
            tooltip: tooltip.into(),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error(
    "bookmark id \"{id}\" defined twice: first in {} ({:?}), again in {} ({:?})",
    .first.file, .first.label, .second.file, .second.label
)]
pub struct DuplicateBookmark {
    pub id: String,
    pub first: Bookmark,
    pub second: Bookmark,
}

impl From<DuplicateBookmark> for Diagnostic {
    fn from(dup: DuplicateBookmark) -> Self {
        Diagnostic::error("bookmark.duplicate", dup.to_string(), Some(&dup.second.file))
            .with_context(format!("first defined in {}", dup.first.file))
    }
}

/// Bookmarks by identifier; the first definition of an id wins.
#[derive(Debug, Clone, Default)]
pub struct BookmarkRegistry {
    entries: HashMap<String, Bookmark>,
}

impl BookmarkRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: &str, bookmark: Bookmark) -> Result<(), DuplicateBookmark> {
        if let Some(first) = self.entries.get(id) {
            return Err(DuplicateBookmark {
                id: id.to_string(),
                first: first.clone(),
                second: bookmark,
            });
        }
        self.entries.insert(id.to_string(), bookmark);
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&Bookmark> {
        self.entries.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
