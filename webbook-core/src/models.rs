//! Content model for the book outline, per-file element records and
//! diagnostics.

use crate::bookmarks::BookmarkRegistry;
use crate::extract::{Attribute, TagSpan};
use crate::numbering::TextEdit;
use serde::{Deserialize, Serialize};

/// Severity of a recovered condition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticSeverity {
    Error,
    Warning,
}

/// A condition reported during a run that did not stop it
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Diagnostic {
    /// Stable machine-readable code, e.g. `link.unresolved`
    pub code: String,
    pub message: String,
    pub severity: DiagnosticSeverity,
    /// Section file the condition was found in
    pub file: Option<String>,
    pub context: Option<String>,
}

impl Diagnostic {
    fn new(
        severity: DiagnosticSeverity,
        code: &str,
        message: impl Into<String>,
        file: Option<&str>,
    ) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
            severity,
            file: file.map(str::to_string),
            context: None,
        }
    }

    pub fn warning(code: &str, message: impl Into<String>, file: Option<&str>) -> Self {
        Self::new(DiagnosticSeverity::Warning, code, message, file)
    }

    /// A broken book that the run still got through, e.g. an id defined twice
    pub fn error(code: &str, message: impl Into<String>, file: Option<&str>) -> Self {
        Self::new(DiagnosticSeverity::Error, code, message, file)
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptionKind {
    Table,
    Figure,
}

impl CaptionKind {
    /// Word used in the caption label ("Table 2-1")
    pub fn word(&self) -> &'static str {
        match self {
            CaptionKind::Table => "Table",
            CaptionKind::Figure => "Figure",
        }
    }
}

/// Table or figure caption, owned by the innermost open section
#[derive(Debug, Clone, Serialize)]
pub struct Caption {
    pub file: String,
    pub id: String,
    pub text: String,
    pub modified: bool,
    pub kind: CaptionKind,
}

/// Numbered display equation, owned by the innermost open section
#[derive(Debug, Clone, Serialize)]
pub struct Equation {
    pub file: String,
    pub id: String,
    pub text: String,
    pub modified: bool,
}

/// Index of a section in the outline arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct SectionId(pub usize);

/// One heading at level 1 to 4
#[derive(Debug, Clone, Serialize)]
pub struct Section {
    pub level: u8,
    /// Position among its siblings, starting at 1
    pub ordinal: u32,
    pub file: String,
    pub id: String,
    pub text: String,
    pub modified: bool,
    pub children: Vec<SectionId>,
    pub captions: Vec<Caption>,
    pub equations: Vec<Equation>,
}

/// The document tree: sections live in an arena and refer to their
/// children by index.
#[derive(Debug, Clone, Default)]
pub struct Outline {
    sections: Vec<Section>,
    roots: Vec<SectionId>,
}

impl Outline {
    pub fn add_root(&mut self, section: Section) -> SectionId {
        let id = SectionId(self.sections.len());
        self.sections.push(section);
        self.roots.push(id);
        id
    }

    pub fn add_child(&mut self, parent: SectionId, section: Section) -> SectionId {
        let id = SectionId(self.sections.len());
        self.sections.push(section);
        self.sections[parent.0].children.push(id);
        id
    }

    pub fn get(&self, id: SectionId) -> &Section {
        &self.sections[id.0]
    }

    pub fn get_mut(&mut self, id: SectionId) -> &mut Section {
        &mut self.sections[id.0]
    }

    pub fn roots(&self) -> &[SectionId] {
        &self.roots
    }

    pub fn len(&self) -> usize {
        self.sections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    /// Owned nested view, used for JSON output
    pub fn tree(&self) -> Vec<OutlineNode> {
        self.roots.iter().map(|&id| self.node(id)).collect()
    }

    fn node(&self, id: SectionId) -> OutlineNode {
        let section = self.get(id);
        OutlineNode {
            level: section.level,
            file: section.file.clone(),
            id: section.id.clone(),
            text: section.text.clone(),
            captions: section.captions.iter().map(|c| c.text.clone()).collect(),
            equations: section.equations.len(),
            children: section.children.iter().map(|&c| self.node(c)).collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct OutlineNode {
    pub level: u8,
    pub file: String,
    pub id: String,
    pub text: String,
    pub captions: Vec<String>,
    pub equations: usize,
    pub children: Vec<OutlineNode>,
}

/// Element kinds the patcher knows how to locate and rewrite
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementKind {
    Heading(u8),
    Caption(CaptionKind),
    Equation,
    Link,
}

impl ElementKind {
    pub fn tag_name(&self) -> &'static str {
        match self {
            ElementKind::Heading(1) => "h1",
            ElementKind::Heading(2) => "h2",
            ElementKind::Heading(3) => "h3",
            ElementKind::Heading(_) => "h4",
            ElementKind::Caption(CaptionKind::Table) => "caption",
            ElementKind::Caption(CaptionKind::Figure) => "figcaption",
            ElementKind::Equation => "div",
            ElementKind::Link => "a",
        }
    }
}

/// Where an internal link points
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkTarget {
    /// Raw `href` as found in the file
    pub href: String,
    /// Target file; empty when the link points into its own file
    pub file: String,
    /// Target identifier, `None` for links to a whole file
    pub id: Option<String>,
}

impl LinkTarget {
    /// The `href` the link should carry
    pub fn render(&self) -> String {
        match &self.id {
            Some(id) => format!("{}#{id}", self.file),
            None => self.file.clone(),
        }
    }
}

/// One element of a section file, before and after renumbering
#[derive(Debug, Clone)]
pub struct Element {
    pub kind: ElementKind,
    /// Flattened text as found in the file
    pub text: String,
    /// Corrected text (equal to `text` when unchanged)
    pub new_text: String,
    pub link: Option<LinkTarget>,
    pub tooltip: Option<String>,
    pub modified: bool,
    pub id: String,
    /// The identifier was generated and must be written into the tag
    pub new_id: bool,
    /// Minimal edit of the flattened text producing `new_text`
    pub edit: Option<TextEdit>,
    pub span: TagSpan,
    pub attributes: Vec<Attribute>,
}

/// Processing record of one section file
#[derive(Debug, Clone)]
pub struct SectionFile {
    pub name: String,
    /// No navigation bar found: insert one after `<body>`
    pub new_nav: bool,
    /// Navigation bar found with stale targets
    pub update_nav: bool,
    /// Some element changed
    pub modified: bool,
    pub elements: Vec<Element>,
    pub nav_span: Option<TagSpan>,
    pub body_open_end: Option<usize>,
}

impl SectionFile {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            new_nav: false,
            update_nav: false,
            modified: false,
            elements: Vec::new(),
            nav_span: None,
            body_open_end: None,
        }
    }

    /// True if the file on disk differs from what the run would produce
    pub fn needs_rewrite(&self) -> bool {
        self.modified || self.new_nav || self.update_nav
    }
}

/// Everything one scan of the book produces
#[derive(Debug)]
pub struct BookStructure {
    pub cover_file: String,
    pub files: Vec<SectionFile>,
    pub outline: Outline,
    pub bookmarks: BookmarkRegistry,
    pub diagnostics: Vec<Diagnostic>,
}

impl BookStructure {
    pub fn pending_files(&self) -> Vec<&str> {
        self.files
            .iter()
            .filter(|f| f.needs_rewrite())
            .map(|f| f.name.as_str())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn section(level: u8, text: &str) -> Section {
        Section {
            level,
            ordinal: 1,
            file: "a.html".into(),
            id: text.to_lowercase(),
            text: text.into(),
            modified: false,
            children: Vec::new(),
            captions: Vec::new(),
            equations: Vec::new(),
        }
    }

    #[test]
    fn test_outline_tree() {
        let mut outline = Outline::default();
        let root = outline.add_root(section(1, "Chapter 1 One"));
        let child = outline.add_child(root, section(2, "1.1 Two"));
        outline.add_child(child, section(3, "1.1.1 Three"));
        outline.add_root(section(1, "Chapter 2 Four"));

        assert_eq!(outline.len(), 4);
        assert_eq!(outline.roots().len(), 2);
        let tree = outline.tree();
        assert_eq!(tree[0].children[0].text, "1.1 Two");
        assert_eq!(tree[0].children[0].children[0].level, 3);
        assert!(tree[1].children.is_empty());
    }

    #[test]
    fn test_element_tags() {
        assert_eq!(ElementKind::Heading(2).tag_name(), "h2");
        assert_eq!(ElementKind::Caption(CaptionKind::Figure).tag_name(), "figcaption");
        assert_eq!(ElementKind::Equation.tag_name(), "div");
    }

    #[test]
    fn test_diagnostic_json() {
        let diag = Diagnostic::warning("link.unresolved", "no bookmark", Some("a.html"))
            .with_context("#missing");
        let json = serde_json::to_string(&diag).unwrap();
        assert!(json.contains("\"severity\":\"warning\""));
        assert!(json.contains("\"context\":\"#missing\""));
    }
}
