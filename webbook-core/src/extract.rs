//! Span-aware scanning of section files.
//!
//! The scanner walks the raw markup once and yields the elements the book
//! tooling works with (headings, captions, equations, links, the navigation
//! bar and reference lists) together with the byte span each one occupies in
//! the file. Everything else is skipped; the spans let the patcher rewrite a
//! file without re-parsing or re-serializing any markup it does not touch.

use crate::html::decode_entities;
use serde::Serialize;
use std::ops::Range;
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ExtractError {
    #[error("<{tag}> opened at byte {offset} is never closed")]
    Unclosed { tag: String, offset: usize },
}

/// Byte offsets of one element: `start..open_end` is the opening tag,
/// `close_start..end` the closing tag, and the inner content lies between.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct TagSpan {
    pub start: usize,
    pub open_end: usize,
    pub close_start: usize,
    pub end: usize,
}

impl TagSpan {
    pub fn inner(&self) -> Range<usize> {
        self.open_end..self.close_start
    }
}

/// One attribute of an opening tag
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    /// Lowercased attribute name
    pub name: String,
    /// Decoded value, `None` for bare attributes
    pub value: Option<String>,
    /// Absolute byte range of `name="value"` in the file
    pub raw: Range<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceItem {
    pub id: Option<String>,
    pub title: Option<String>,
    /// Text of the last `<strong>` run inside the item
    pub emphasis: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    Heading(u8),
    Caption,
    FigCaption,
    Equation,
    Link,
    /// Navigation container with the `href` of each link inside it
    Nav { links: Vec<Option<String>> },
    References { items: Vec<ReferenceItem> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub kind: NodeKind,
    pub attributes: Vec<Attribute>,
    /// Flattened, entity-decoded text content
    pub text: String,
    pub span: TagSpan,
}

impl Node {
    pub fn attr(&self, name: &str) -> Option<&str> {
        find_attr(&self.attributes, name)
    }
}

/// Result of scanning one file
#[derive(Debug, Clone, Default)]
pub struct ScannedFile {
    pub nodes: Vec<Node>,
    /// Offset just past the `<body>` opening tag
    pub body_open_end: Option<usize>,
}

impl ScannedFile {
    /// Identifiers already present in the file
    pub fn explicit_ids(&self) -> Vec<String> {
        let mut ids = Vec::new();
        for node in &self.nodes {
            if let Some(id) = node.attr("id") {
                ids.push(id.to_string());
            }
            if let NodeKind::References { items } = &node.kind {
                ids.extend(items.iter().filter_map(|item| item.id.clone()));
            }
        }
        ids
    }
}

fn find_attr<'a>(attributes: &'a [Attribute], name: &str) -> Option<&'a str> {
    attributes
        .iter()
        .find(|a| a.name == name)
        .and_then(|a| a.value.as_deref())
}

fn has_class(attributes: &[Attribute], class: &str) -> bool {
    find_attr(attributes, "class")
        .map(|v| v.split_ascii_whitespace().any(|c| c == class))
        .unwrap_or(false)
}

// ---------------------------------------------------------------------------
// Tokenizer

#[derive(Debug)]
enum Token<'a> {
    Start {
        name: String,
        attributes: Vec<Attribute>,
        span: Range<usize>,
        self_closing: bool,
    },
    End {
        name: String,
        span: Range<usize>,
    },
    Text(&'a str),
}

struct Tokenizer<'a> {
    src: &'a str,
    pos: usize,
    /// Set after `<script>`/`<style>`: skip to this closing tag
    raw_text_end: Option<&'static str>,
}

impl<'a> Tokenizer<'a> {
    fn new(src: &'a str) -> Self {
        Self {
            src,
            pos: 0,
            raw_text_end: None,
        }
    }

    fn skip_past(&mut self, needle: &str) {
        self.pos = match self.src[self.pos..].find(needle) {
            Some(i) => self.pos + i + needle.len(),
            None => self.src.len(),
        };
    }

    fn tag_name_len(rest: &str) -> usize {
        rest.find(|c: char| !c.is_ascii_alphanumeric())
            .unwrap_or(rest.len())
    }

    /// Parse attributes starting at `self.pos`, leaving `self.pos` past `>`.
    fn attributes(&mut self) -> (Vec<Attribute>, bool) {
        let src = self.src;
        let bytes = src.as_bytes();
        let len = bytes.len();
        let mut attributes = Vec::new();

        loop {
            while self.pos < len && bytes[self.pos].is_ascii_whitespace() {
                self.pos += 1;
            }
            if self.pos >= len {
                return (attributes, false);
            }
            match bytes[self.pos] {
                b'>' => {
                    self.pos += 1;
                    return (attributes, false);
                }
                b'/' if bytes.get(self.pos + 1) == Some(&b'>') => {
                    self.pos += 2;
                    return (attributes, true);
                }
                b'/' => {
                    self.pos += 1;
                    continue;
                }
                _ => {}
            }

            let name_start = self.pos;
            while self.pos < len
                && !bytes[self.pos].is_ascii_whitespace()
                && !matches!(bytes[self.pos], b'=' | b'>' | b'/')
            {
                self.pos += 1;
            }
            let name = src[name_start..self.pos].to_ascii_lowercase();
            let mut raw_end = self.pos;

            let mut probe = self.pos;
            while probe < len && bytes[probe].is_ascii_whitespace() {
                probe += 1;
            }
            let mut value = None;
            if probe < len && bytes[probe] == b'=' {
                probe += 1;
                while probe < len && bytes[probe].is_ascii_whitespace() {
                    probe += 1;
                }
                if probe < len && matches!(bytes[probe], b'"' | b'\'') {
                    let quote = bytes[probe] as char;
                    let value_start = probe + 1;
                    let value_end = src[value_start..]
                        .find(quote)
                        .map(|i| value_start + i)
                        .unwrap_or(len);
                    value = Some(decode_entities(&src[value_start..value_end]).into_owned());
                    self.pos = (value_end + 1).min(len);
                } else {
                    let value_start = probe;
                    let mut value_end = probe;
                    while value_end < len
                        && !bytes[value_end].is_ascii_whitespace()
                        && bytes[value_end] != b'>'
                    {
                        value_end += 1;
                    }
                    value = Some(decode_entities(&src[value_start..value_end]).into_owned());
                    self.pos = value_end;
                }
                raw_end = self.pos;
            }

            attributes.push(Attribute {
                name,
                value,
                raw: name_start..raw_end,
            });
        }
    }
}

impl<'a> Iterator for Tokenizer<'a> {
    type Item = Token<'a>;

    fn next(&mut self) -> Option<Token<'a>> {
        let src = self.src;
        loop {
            if let Some(closing) = self.raw_text_end.take() {
                self.pos = find_ascii_ci(&src[self.pos..], closing)
                    .map(|i| self.pos + i)
                    .unwrap_or(src.len());
            }
            if self.pos >= src.len() {
                return None;
            }

            let start = self.pos;
            let rest = &src[start..];
            if !rest.starts_with('<') {
                let end = rest.find('<').map(|i| start + i).unwrap_or(src.len());
                self.pos = end;
                return Some(Token::Text(&src[start..end]));
            }

            if rest.starts_with("<!--") {
                self.pos += 4;
                self.skip_past("-->");
                continue;
            }
            if rest.starts_with("<!") || rest.starts_with("<?") {
                self.skip_past(">");
                continue;
            }

            if let Some(after) = rest.strip_prefix("</") {
                let name_len = Self::tag_name_len(after);
                if name_len == 0 {
                    self.pos += 1;
                    return Some(Token::Text(&src[start..start + 1]));
                }
                let name = after[..name_len].to_ascii_lowercase();
                self.pos = start + 2 + name_len;
                self.skip_past(">");
                return Some(Token::End {
                    name,
                    span: start..self.pos,
                });
            }

            let after = &rest[1..];
            let name_len = Self::tag_name_len(after);
            if name_len == 0 || !after.as_bytes()[0].is_ascii_alphabetic() {
                self.pos += 1;
                return Some(Token::Text(&src[start..start + 1]));
            }
            let name = after[..name_len].to_ascii_lowercase();
            self.pos = start + 1 + name_len;
            let (attributes, self_closing) = self.attributes();
            if !self_closing {
                self.raw_text_end = match name.as_str() {
                    "script" => Some("</script"),
                    "style" => Some("</style"),
                    _ => None,
                };
            }
            return Some(Token::Start {
                name,
                attributes,
                span: start..self.pos,
                self_closing,
            });
        }
    }
}

/// ASCII case-insensitive substring search
fn find_ascii_ci(haystack: &str, needle: &str) -> Option<usize> {
    let h = haystack.as_bytes();
    let n = needle.as_bytes();
    if n.len() > h.len() {
        return None;
    }
    (0..=h.len() - n.len()).find(|&i| h[i..i + n.len()].eq_ignore_ascii_case(n))
}

// ---------------------------------------------------------------------------
// Element assembly

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source",
    "track", "wbr",
];

#[derive(Debug)]
enum OpenKind {
    Node(NodeKind),
    NavLink,
    ReferenceItem,
    Strong,
}

#[derive(Debug)]
struct Open {
    kind: OpenKind,
    name: String,
    attributes: Vec<Attribute>,
    start: usize,
    open_end: usize,
    text: String,
    /// Untracked descendants with the same tag name still open
    depth: usize,
    /// Last `<strong>` run seen inside a reference item
    emphasis: Option<String>,
}

impl Open {
    fn is_implicitly_closable(&self) -> bool {
        matches!(self.kind, OpenKind::ReferenceItem | OpenKind::Strong)
    }
}

/// Scan a section file and collect its book elements in document order.
pub fn scan(source: &str) -> Result<ScannedFile, ExtractError> {
    let mut open: Vec<Open> = Vec::new();
    let mut nodes: Vec<Node> = Vec::new();
    let mut body_open_end = None;

    for token in Tokenizer::new(source) {
        match token {
            Token::Text(raw) => {
                if open.is_empty() {
                    continue;
                }
                let text = decode_entities(raw);
                for entry in open.iter_mut() {
                    entry.text.push_str(&text);
                }
            }
            Token::Start {
                name,
                attributes,
                span,
                self_closing,
            } => {
                if name == "body" && body_open_end.is_none() {
                    body_open_end = Some(span.end);
                }
                let is_void = self_closing || VOID_ELEMENTS.contains(&name.as_str());

                let Some(kind) = classify_start(&name, &attributes, &open) else {
                    if !is_void {
                        if let Some(entry) = open.iter_mut().rev().find(|o| o.name == name) {
                            entry.depth += 1;
                        }
                    }
                    continue;
                };

                if matches!(kind, OpenKind::ReferenceItem) {
                    // A new <li> ends the previous one when </li> was omitted
                    if let Some(pos) = open
                        .iter()
                        .rposition(|o| matches!(o.kind, OpenKind::ReferenceItem) && o.depth == 0)
                    {
                        close_from(&mut open, &mut nodes, pos, span.start..span.start)?;
                    }
                }
                if is_void {
                    continue;
                }
                open.push(Open {
                    kind,
                    name,
                    attributes,
                    start: span.start,
                    open_end: span.end,
                    text: String::new(),
                    depth: 0,
                    emphasis: None,
                });
            }
            Token::End { name, span } => {
                let Some(pos) = open.iter().rposition(|o| o.name == name) else {
                    continue;
                };
                if open[pos].depth > 0 {
                    open[pos].depth -= 1;
                    continue;
                }
                close_from(&mut open, &mut nodes, pos, span)?;
            }
        }
    }

    if let Some(entry) = open.iter().find(|o| !o.is_implicitly_closable()) {
        return Err(ExtractError::Unclosed {
            tag: entry.name.clone(),
            offset: entry.start,
        });
    }

    nodes.sort_by_key(|n| n.span.start);
    Ok(ScannedFile {
        nodes,
        body_open_end,
    })
}

fn classify_start(name: &str, attributes: &[Attribute], open: &[Open]) -> Option<OpenKind> {
    let in_nav = open
        .iter()
        .any(|o| matches!(o.kind, OpenKind::Node(NodeKind::Nav { .. })));
    // Only direct items of the list, not items of a list nested inside one
    let in_references = open
        .iter()
        .rev()
        .find(|o| matches!(o.kind, OpenKind::Node(NodeKind::References { .. })))
        .is_some_and(|o| o.depth == 0);
    let in_item = open
        .iter()
        .any(|o| matches!(o.kind, OpenKind::ReferenceItem));

    let kind = match name {
        "h1" => OpenKind::Node(NodeKind::Heading(1)),
        "h2" => OpenKind::Node(NodeKind::Heading(2)),
        "h3" => OpenKind::Node(NodeKind::Heading(3)),
        "h4" => OpenKind::Node(NodeKind::Heading(4)),
        "caption" => OpenKind::Node(NodeKind::Caption),
        "figcaption" => OpenKind::Node(NodeKind::FigCaption),
        "a" if in_nav => OpenKind::NavLink,
        "a" => OpenKind::Node(NodeKind::Link),
        "nav" if !in_nav => OpenKind::Node(NodeKind::Nav { links: Vec::new() }),
        "div" if has_class(attributes, "equation") => OpenKind::Node(NodeKind::Equation),
        "ul" if has_class(attributes, "references") => {
            OpenKind::Node(NodeKind::References { items: Vec::new() })
        }
        "li" if in_references => OpenKind::ReferenceItem,
        "strong" if in_item => OpenKind::Strong,
        _ => return None,
    };
    Some(kind)
}

/// Close `open[pos]` at `end_tag`, implicitly closing list items and strong
/// runs opened after it.
fn close_from(
    open: &mut Vec<Open>,
    nodes: &mut Vec<Node>,
    pos: usize,
    end_tag: Range<usize>,
) -> Result<(), ExtractError> {
    while open.len() > pos + 1 {
        let Some(inner) = open.pop() else { break };
        if !inner.is_implicitly_closable() {
            return Err(ExtractError::Unclosed {
                tag: inner.name,
                offset: inner.start,
            });
        }
        finish(open, nodes, inner, end_tag.start..end_tag.start);
    }
    if let Some(entry) = open.pop() {
        finish(open, nodes, entry, end_tag);
    }
    Ok(())
}

fn finish(open: &mut [Open], nodes: &mut Vec<Node>, entry: Open, end_tag: Range<usize>) {
    let span = TagSpan {
        start: entry.start,
        open_end: entry.open_end,
        close_start: end_tag.start,
        end: end_tag.end,
    };
    match entry.kind {
        OpenKind::Node(kind) => nodes.push(Node {
            kind,
            attributes: entry.attributes,
            text: entry.text,
            span,
        }),
        OpenKind::NavLink => {
            let href = find_attr(&entry.attributes, "href").map(str::to_string);
            if let Some(Open {
                kind: OpenKind::Node(NodeKind::Nav { links }),
                ..
            }) = open
                .iter_mut()
                .rev()
                .find(|o| matches!(o.kind, OpenKind::Node(NodeKind::Nav { .. })))
            {
                links.push(href);
            }
        }
        OpenKind::ReferenceItem => {
            let item = ReferenceItem {
                id: find_attr(&entry.attributes, "id").map(str::to_string),
                title: find_attr(&entry.attributes, "title").map(str::to_string),
                emphasis: entry.emphasis,
            };
            if let Some(Open {
                kind: OpenKind::Node(NodeKind::References { items }),
                ..
            }) = open
                .iter_mut()
                .rev()
                .find(|o| matches!(o.kind, OpenKind::Node(NodeKind::References { .. })))
            {
                items.push(item);
            }
        }
        OpenKind::Strong => {
            if let Some(item) = open
                .iter_mut()
                .rev()
                .find(|o| matches!(o.kind, OpenKind::ReferenceItem))
            {
                item.emphasis = Some(entry.text);
            }
        }
    }
}
