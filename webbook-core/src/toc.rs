//! Table-of-contents rendering and merging into an existing file.

use crate::html::{escape_attr, escape_text};
use crate::models::{BookStructure, Outline, SectionId};
use serde::Serialize;
use unicode_segmentation::UnicodeSegmentation;

pub const BEGIN_MARKER: &str = "<!-- BeginTableOfContents -->";
pub const END_MARKER: &str = "<!-- EndTableOfContents -->";

/// Captions longer than this many characters are shortened
const CAPTION_BUDGET: usize = 60;

const DEFAULT_HEAD: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
<style type="text/css">
  ol {margin: 0px 0 15px -20px; list-style-type: none;}
  li {margin: 2px 0px 0px 0px;}
  a  {text-decoration: none; color: green;}
  a:hover {text-decoration: underline;}
</style>
</head>
<body>
"#;

const DEFAULT_TAIL: &str = "</body>\n</html>\n";

/// How the new TOC file was put together
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum TocMerge {
    /// Generated from scratch
    Fresh,
    /// Structure replaced between the markers of the previous file
    Replaced,
    /// Previous head kept, end marker missing so the default tail was used
    DefaultTail,
}

/// Render the marked structure block for the whole book.
pub fn render_structure(structure: &BookStructure) -> String {
    let mut out = String::new();
    out.push_str(BEGIN_MARKER);
    out.push_str("\n<ol>\n");
    out.push_str(&format!(
        "<li><a href=\"{}\"><strong>Book Cover</strong></a></li>\n\n",
        escape_attr(&structure.cover_file)
    ));
    for &root in structure.outline.roots() {
        render_section(&mut out, &structure.outline, root, 0);
    }
    out.push_str("</ol>\n");
    out.push_str(END_MARKER);
    out.push('\n');
    out
}

fn render_section(out: &mut String, outline: &Outline, id: SectionId, depth: usize) {
    let section = outline.get(id);
    let indent = "    ".repeat(depth);
    let inner_indent = "    ".repeat(depth + 1);
    let href = escape_attr(&format!("{}#{}", section.file, section.id));
    let text = escape_text(&section.text);

    if depth == 0 {
        out.push_str(&format!("\n<li><a href=\"{href}\"><strong>{text}</strong></a>"));
    } else {
        out.push_str(&format!("{indent}<li><a href=\"{href}\">{text}</a>"));
    }

    if section.children.is_empty() && section.captions.is_empty() {
        out.push_str("</li>\n");
        return;
    }

    if !section.captions.is_empty() {
        out.push_str(&format!("\n{inner_indent}<ul class=\"tree\">\n"));
        for caption in &section.captions {
            out.push_str(&format!(
                "{inner_indent}<li><a href=\"{}\">{}</a></li>\n",
                escape_attr(&format!("{}#{}", caption.file, caption.id)),
                escape_text(&shorten_caption(&caption.text))
            ));
        }
        out.push_str(&format!("{inner_indent}</ul>\n"));
    }

    if section.children.is_empty() {
        out.push_str(&format!("{indent}</li>\n"));
        return;
    }

    let (open, close) = if section.level == 1 {
        ("<ol>", "</ol>")
    } else {
        ("<ul class=\"tree\">", "</ul>")
    };
    out.push_str(&format!("\n{inner_indent}{open}\n"));
    for &child in &section.children {
        render_section(out, outline, child, depth + 1);
    }
    out.push_str(&format!("{inner_indent}{close}</li>\n"));
}

/// Cut a caption to the display budget, counting grapheme clusters
pub fn shorten_caption(text: &str) -> String {
    let graphemes: Vec<&str> = text.graphemes(true).collect();
    if graphemes.len() <= CAPTION_BUDGET {
        return text.to_string();
    }
    let mut short: String = graphemes[..CAPTION_BUDGET - 3].concat();
    short.push_str("...");
    short
}

/// Put `block` into the previous TOC file content, or into a fresh
/// document when there is none or it lacks the begin marker.
pub fn merge(existing: Option<&str>, block: &str) -> (String, TocMerge) {
    let Some((previous, begin)) =
        existing.and_then(|text| text.find(BEGIN_MARKER).map(|begin| (text, begin)))
    else {
        return (
            format!("{DEFAULT_HEAD}{block}{DEFAULT_TAIL}"),
            TocMerge::Fresh,
        );
    };

    let mut out = String::with_capacity(previous.len() + block.len());
    out.push_str(&previous[..begin]);
    out.push_str(block);

    match previous[begin..].find(END_MARKER) {
        Some(end) => {
            let tail = &previous[begin + end + END_MARKER.len()..];
            out.push_str(tail.strip_prefix('\n').unwrap_or(tail));
            (out, TocMerge::Replaced)
        }
        None => {
            out.push_str(DEFAULT_TAIL);
            (out, TocMerge::DefaultTail)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bookmarks::BookmarkRegistry;
    use crate::models::{Caption, CaptionKind, Section};

    fn section(level: u8, id: &str, text: &str) -> Section {
        Section {
            level,
            ordinal: 1,
            file: "ch1.html".into(),
            id: id.into(),
            text: text.into(),
            modified: false,
            children: Vec::new(),
            captions: Vec::new(),
            equations: Vec::new(),
        }
    }

    fn sample() -> BookStructure {
        let mut outline = Outline::default();
        outline.add_root(section(1, "p", "Preface"));
        let chapter = outline.add_root(section(1, "c1", "Chapter 1 A & B"));
        let sub = outline.add_child(chapter, section(2, "s1", "1.1 Sub"));
        outline.get_mut(sub).captions.push(Caption {
            file: "ch1.html".into(),
            id: "t1".into(),
            text: "Table 1-1: Data".into(),
            modified: false,
            kind: CaptionKind::Table,
        });
        outline.add_child(sub, section(3, "s11", "1.1.1 Deep"));

        BookStructure {
            cover_file: "index.html".into(),
            files: Vec::new(),
            outline,
            bookmarks: BookmarkRegistry::new(),
            diagnostics: Vec::new(),
        }
    }

    #[test]
    fn test_render_structure() {
        let block = render_structure(&sample());
        let expected = "<!-- BeginTableOfContents -->
<ol>
<li><a href=\"index.html\"><strong>Book Cover</strong></a></li>


<li><a href=\"ch1.html#p\"><strong>Preface</strong></a></li>

<li><a href=\"ch1.html#c1\"><strong>Chapter 1 A &amp; B</strong></a>
    <ol>
    <li><a href=\"ch1.html#s1\">1.1 Sub</a>
        <ul class=\"tree\">
        <li><a href=\"ch1.html#t1\">Table 1-1: Data</a></li>
        </ul>

        <ul class=\"tree\">
        <li><a href=\"ch1.html#s11\">1.1.1 Deep</a></li>
        </ul></li>
    </ol></li>
</ol>
<!-- EndTableOfContents -->
";
        assert_eq!(block, expected);
    }

    #[test]
    fn test_shorten_caption() {
        let short = "x".repeat(60);
        assert_eq!(shorten_caption(&short), short);

        let long = "é".repeat(61);
        let shortened = shorten_caption(&long);
        assert_eq!(shortened, format!("{}...", "é".repeat(57)));
    }

    #[test]
    fn test_merge_fresh() {
        let (out, how) = merge(None, "BLOCK\n");
        assert_eq!(how, TocMerge::Fresh);
        assert!(out.starts_with("<!DOCTYPE html>\n<html lang=\"en\">"));
        assert!(out.ends_with("<body>\nBLOCK\n</body>\n</html>\n"));

        let (_, how) = merge(Some("<html>no markers</html>"), "BLOCK\n");
        assert_eq!(how, TocMerge::Fresh);
    }

    #[test]
    fn test_merge_keeps_head_and_tail() {
        let previous = format!("<head>mine</head>\n{BEGIN_MARKER}\nold\n{END_MARKER}\n<footer>f</footer>\n");
        let block = format!("{BEGIN_MARKER}\nnew\n{END_MARKER}\n");
        let (out, how) = merge(Some(&previous), &block);
        assert_eq!(how, TocMerge::Replaced);
        assert_eq!(
            out,
            format!("<head>mine</head>\n{BEGIN_MARKER}\nnew\n{END_MARKER}\n<footer>f</footer>\n")
        );

        // Merging the output again changes nothing
        let (again, _) = merge(Some(&out), &block);
        assert_eq!(again, out);
    }

    #[test]
    fn test_merge_without_end_marker() {
        let previous = format!("<head>mine</head>\n{BEGIN_MARKER}\ndangling");
        let (out, how) = merge(Some(&previous), "BLOCK\n");
        assert_eq!(how, TocMerge::DefaultTail);
        assert_eq!(out, "<head>mine</head>\nBLOCK\n</body>\n</html>\n");
    }
}
