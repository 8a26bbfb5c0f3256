//! Cross-reference resolution.
//!
//! Runs after the outline is complete: every internal link is compared
//! against the bookmark of its target and corrected when the target file,
//! label or tooltip moved on.

use crate::config::BookConfig;
use crate::models::{BookStructure, Diagnostic, ElementKind};
use tracing::{debug, warn};

/// How an `href` is treated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Href<'a> {
    /// Outside the book; left alone
    External,
    /// `#` with nothing after it
    EmptyFragment,
    /// `file`, `file#`, `file#id` or `#id` (empty file)
    Internal { file: &'a str, id: Option<&'a str> },
}

pub fn classify_href(href: &str) -> Href<'_> {
    if href.contains('/') || has_scheme(href) {
        return Href::External;
    }
    match href.split_once('#') {
        None => Href::Internal {
            file: href,
            id: None,
        },
        Some(("", "")) => Href::EmptyFragment,
        Some((file, id)) => Href::Internal {
            file,
            id: (!id.is_empty()).then_some(id),
        },
    }
}

fn has_scheme(href: &str) -> bool {
    let Some(colon) = href.find(':') else {
        return false;
    };
    let scheme = &href[..colon];
    !scheme.is_empty()
        && scheme.starts_with(|c: char| c.is_ascii_alphabetic())
        && scheme
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

/// Correct every internal link of the book against the bookmark registry.
pub fn resolve_links(structure: &mut BookStructure, config: &BookConfig) {
    let bookmarks = &structure.bookmarks;
    let diagnostics = &mut structure.diagnostics;

    for file in &mut structure.files {
        for element in &mut file.elements {
            if element.kind != ElementKind::Link {
                continue;
            }
            let Some(target) = element.link.as_mut() else {
                continue;
            };

            let Some(id) = target.id.clone() else {
                if !target.file.is_empty() && !config.is_book_file(&target.file) {
                    warn!("{}: link to unknown file {:?}", file.name, target.href);
                    diagnostics.push(
                        Diagnostic::warning(
                            "link.unknown-file",
                            format!("link target {:?} is not a book file", target.file),
                            Some(&file.name),
                        )
                        .with_context(element.text.clone()),
                    );
                }
                continue;
            };

            let Some(bookmark) = bookmarks.get(&id) else {
                warn!("{}: unresolved link {:?}", file.name, target.href);
                diagnostics.push(
                    Diagnostic::warning(
                        "link.unresolved",
                        format!("no element with id {id:?}"),
                        Some(&file.name),
                    )
                    .with_context(target.href.clone()),
                );
                continue;
            };

            let current_file = if target.file.is_empty() {
                file.name.as_str()
            } else {
                target.file.as_str()
            };
            let current_tooltip = element.tooltip.as_deref().unwrap_or("");
            let stale = bookmark.file != current_file
                || (!bookmark.label.is_empty() && bookmark.label != element.text)
                || bookmark.tooltip != current_tooltip;
            if !stale {
                continue;
            }

            if !bookmark.label.is_empty() {
                element.new_text = bookmark.label.clone();
            }
            target.file = if bookmark.file == file.name {
                String::new()
            } else {
                bookmark.file.clone()
            };
            element.tooltip = Some(bookmark.tooltip.clone());
            element.modified = true;
            file.modified = true;
            debug!(
                "{}: link {:?} now points to {:?} ({:?})",
                file.name,
                target.href,
                target.render(),
                element.new_text
            );
        }
    }
}
