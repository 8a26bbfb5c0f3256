//! Outline building: one forward pass over every section file in book
//! order, numbering elements and growing the section tree.

use crate::bookmarks::{Bookmark, BookmarkRegistry};
use crate::config::BookConfig;
use crate::extract::{Node, NodeKind, ScannedFile};
use crate::ids::IdGenerator;
use crate::links::{classify_href, Href};
use crate::models::{
    BookStructure, Caption, CaptionKind, Diagnostic, Element, ElementKind, Equation, LinkTarget,
    Outline, Section, SectionFile, SectionId,
};
use crate::nav::NavLinks;
use crate::numbering::{self, Counters, Numbered, NumberingError};
use thiserror::Error;
use tracing::{debug, error, warn};

#[derive(Error, Debug)]
pub enum OutlineError {
    #[error("{file}: <h{level}> \"{text}\" skips a heading level")]
    SkippedLevel { file: String, level: u8, text: String },

    #[error("{file}: <{tag}> appears before the first <h1> of the book")]
    ContentBeforeChapter { file: String, tag: String },

    #[error("{file}: <nav> must come before every other element")]
    NavAfterContent { file: String },

    #[error("{file}: more than one <nav>")]
    DuplicateNav { file: String },

    #[error("{file}: <nav> holds {count} links, at most 3 are supported")]
    TooManyNavLinks { file: String, count: usize },

    #[error("{file}: link with empty target href=\"#\"")]
    EmptyFragment { file: String },

    #[error("{file}: {source}")]
    Numbering {
        file: String,
        #[source]
        source: NumberingError,
    },
}

/// State of one outline pass: counters, the open section path and the
/// bookmark registry.
pub struct OutlineBuilder<'a> {
    config: &'a BookConfig,
    counters: Counters,
    outline: Outline,
    /// Open sections, `open[0]` at level 1
    open: Vec<SectionId>,
    bookmarks: BookmarkRegistry,
    ids: IdGenerator,
    files: Vec<SectionFile>,
    diagnostics: Vec<Diagnostic>,
}

impl<'a> OutlineBuilder<'a> {
    pub fn new(config: &'a BookConfig, ids: IdGenerator) -> Self {
        Self {
            config,
            counters: Counters::new(),
            outline: Outline::default(),
            open: Vec::new(),
            bookmarks: BookmarkRegistry::new(),
            ids,
            files: Vec::new(),
            diagnostics: Vec::new(),
        }
    }

    /// Fold the next section file into the outline. Files must be added in
    /// book order; `index` is the file's position in the section list.
    pub fn add_file(
        &mut self,
        index: usize,
        name: &str,
        scanned: &ScannedFile,
    ) -> Result<(), OutlineError> {
        let mut file = SectionFile::new(name);
        file.body_open_end = scanned.body_open_end;
        file.new_nav = true;
        let mut seen_content = false;

        for (ordinal, node) in scanned.nodes.iter().enumerate() {
            match &node.kind {
                NodeKind::Nav { links } => {
                    if seen_content {
                        return Err(OutlineError::NavAfterContent { file: name.into() });
                    }
                    if file.nav_span.is_some() {
                        return Err(OutlineError::DuplicateNav { file: name.into() });
                    }
                    if links.len() > 3 {
                        return Err(OutlineError::TooManyNavLinks {
                            file: name.into(),
                            count: links.len(),
                        });
                    }
                    file.new_nav = false;
                    file.nav_span = Some(node.span);
                    file.update_nav = !NavLinks::for_file(self.config, index).matches(links);
                    if file.update_nav {
                        debug!("{}: navigation bar is stale", name);
                    }
                }
                NodeKind::References { items } => {
                    seen_content = true;
                    for item in items {
                        let Some(id) = item.id.as_deref().filter(|id| usable_id(id)) else {
                            continue;
                        };
                        let bookmark = Bookmark::new(
                            name,
                            item.title.clone().unwrap_or_default(),
                            item.emphasis.clone().unwrap_or_default(),
                        );
                        self.bookmark(id, bookmark);
                    }
                }
                NodeKind::Link => {
                    seen_content = true;
                    self.add_link(&mut file, node)?;
                }
                NodeKind::Heading(level) => {
                    seen_content = true;
                    self.add_heading(&mut file, node, *level, ordinal)?;
                }
                NodeKind::Caption | NodeKind::FigCaption => {
                    seen_content = true;
                    let kind = if node.kind == NodeKind::Caption {
                        CaptionKind::Table
                    } else {
                        CaptionKind::Figure
                    };
                    self.add_caption(&mut file, node, kind, ordinal)?;
                }
                NodeKind::Equation => {
                    seen_content = true;
                    self.add_equation(&mut file, node, ordinal)?;
                }
            }
        }

        self.files.push(file);
        Ok(())
    }

    pub fn finish(self) -> BookStructure {
        BookStructure {
            cover_file: self.config.cover_file.clone(),
            files: self.files,
            outline: self.outline,
            bookmarks: self.bookmarks,
            diagnostics: self.diagnostics,
        }
    }

    fn add_link(&mut self, file: &mut SectionFile, node: &Node) -> Result<(), OutlineError> {
        let Some(href) = node.attr("href") else {
            warn!("{}: link without href ignored", file.name);
            self.diagnostics.push(
                Diagnostic::warning("link.missing-href", "link without href", Some(&file.name))
                    .with_context(node.text.clone()),
            );
            return Ok(());
        };

        let (target_file, target_id) = match classify_href(href) {
            Href::External => return Ok(()),
            Href::EmptyFragment => {
                return Err(OutlineError::EmptyFragment {
                    file: file.name.clone(),
                })
            }
            Href::Internal { file: target, id } => (target.to_string(), id.map(str::to_string)),
        };

        file.elements.push(Element {
            kind: ElementKind::Link,
            text: node.text.clone(),
            new_text: node.text.clone(),
            link: Some(LinkTarget {
                href: href.to_string(),
                file: target_file,
                id: target_id,
            }),
            tooltip: node.attr("title").map(str::to_string),
            modified: false,
            id: node.attr("id").unwrap_or_default().to_string(),
            new_id: false,
            edit: None,
            span: node.span,
            attributes: node.attributes.clone(),
        });
        Ok(())
    }

    fn add_heading(
        &mut self,
        file: &mut SectionFile,
        node: &Node,
        level: u8,
        ordinal: usize,
    ) -> Result<(), OutlineError> {
        let name = file.name.clone();
        let (id, new_id) = self.element_id(&name, node, ordinal);

        let (numbered, position, parent) = if level == 1 {
            self.counters
                .begin_top_level(&node.text)
                .map_err(|source| OutlineError::Numbering {
                    file: name.clone(),
                    source,
                })?;
            self.open.clear();
            let numbered = numbering::label_for_heading(&self.counters, &node.text, 1, &[])
                .map_err(|source| OutlineError::Numbering {
                    file: name.clone(),
                    source,
                })?;
            let position = self.outline.roots().len() as u32 + 1;
            (numbered, position, None)
        } else {
            let depth = usize::from(level - 1);
            if self.open.len() < depth {
                return Err(OutlineError::SkippedLevel {
                    file: name,
                    level,
                    text: node.text.clone(),
                });
            }
            self.open.truncate(depth);
            let parent = self.open[depth - 1];
            let position = self.outline.get(parent).children.len() as u32 + 1;

            let mut positions: Vec<u32> = self.open[1..]
                .iter()
                .map(|&id| self.outline.get(id).ordinal)
                .collect();
            positions.push(position);
            let numbered =
                numbering::label_for_heading(&self.counters, &node.text, level, &positions)
                    .map_err(|source| OutlineError::Numbering {
                        file: name.clone(),
                        source,
                    })?;
            (numbered, position, Some(parent))
        };

        let section = Section {
            level,
            ordinal: position,
            file: name.clone(),
            id: id.clone(),
            text: numbered.text.clone(),
            modified: numbered.modified,
            children: Vec::new(),
            captions: Vec::new(),
            equations: Vec::new(),
        };
        let section_id = match parent {
            None => self.outline.add_root(section),
            Some(parent) => self.outline.add_child(parent, section),
        };
        self.open.push(section_id);

        self.push_element(file, ElementKind::Heading(level), node, id, new_id, numbered, true);
        Ok(())
    }

    fn add_caption(
        &mut self,
        file: &mut SectionFile,
        node: &Node,
        kind: CaptionKind,
        ordinal: usize,
    ) -> Result<(), OutlineError> {
        let owner = self.innermost(file, ElementKind::Caption(kind))?;
        let (id, new_id) = self.element_id(&file.name, node, ordinal);
        let index = self.counters.next_caption(kind);
        let numbered = numbering::label_for_caption(&self.counters, &node.text, kind, index);

        self.outline.get_mut(owner).captions.push(Caption {
            file: file.name.clone(),
            id: id.clone(),
            text: numbered.text.clone(),
            modified: numbered.modified,
            kind,
        });
        self.push_element(file, ElementKind::Caption(kind), node, id, new_id, numbered, true);
        Ok(())
    }

    fn add_equation(
        &mut self,
        file: &mut SectionFile,
        node: &Node,
        ordinal: usize,
    ) -> Result<(), OutlineError> {
        let owner = self.innermost(file, ElementKind::Equation)?;
        let (id, new_id) = self.element_id(&file.name, node, ordinal);
        self.counters.next_equation();
        let numbered = numbering::label_for_equation(&self.counters, &node.text).map_err(
            |source| OutlineError::Numbering {
                file: file.name.clone(),
                source,
            },
        )?;

        self.outline.get_mut(owner).equations.push(Equation {
            file: file.name.clone(),
            id: id.clone(),
            text: numbered.text.clone(),
            modified: numbered.modified,
        });
        self.push_element(file, ElementKind::Equation, node, id, new_id, numbered, false);
        Ok(())
    }

    /// Section owning a caption or equation
    fn innermost(&self, file: &SectionFile, kind: ElementKind) -> Result<SectionId, OutlineError> {
        self.open
            .last()
            .copied()
            .ok_or_else(|| OutlineError::ContentBeforeChapter {
                file: file.name.clone(),
                tag: kind.tag_name().to_string(),
            })
    }

    fn element_id(&mut self, file: &str, node: &Node, ordinal: usize) -> (String, bool) {
        match node.attr("id").filter(|id| usable_id(id)) {
            Some(id) => (id.to_string(), false),
            None => (self.ids.generate(file, ordinal), true),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn push_element(
        &mut self,
        file: &mut SectionFile,
        kind: ElementKind,
        node: &Node,
        id: String,
        new_id: bool,
        numbered: Numbered,
        with_tooltip: bool,
    ) {
        if numbered.modified {
            debug!("{}: number updated: {}", file.name, numbered.text);
        }
        if new_id {
            debug!("{}: id {} introduced for {}", file.name, id, numbered.text);
        }

        let tooltip = if with_tooltip {
            numbered.text.clone()
        } else {
            String::new()
        };
        self.bookmark(&id, Bookmark::new(&file.name, numbered.label, tooltip));

        file.modified |= numbered.modified || new_id;
        file.elements.push(Element {
            kind,
            text: node.text.clone(),
            new_text: numbered.text,
            link: None,
            tooltip: None,
            modified: numbered.modified,
            id,
            new_id,
            edit: numbered.edit,
            span: node.span,
            attributes: node.attributes.clone(),
        });
    }

    fn bookmark(&mut self, id: &str, bookmark: Bookmark) {
        if let Err(duplicate) = self.bookmarks.insert(id, bookmark) {
            error!("{}", duplicate);
            self.diagnostics.push(duplicate.into());
        }
    }
}

/// Identifiers that count as present in the source
fn usable_id(id: &str) -> bool {
    !id.is_empty() && id != "#"
}
