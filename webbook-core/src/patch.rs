//! Selective rewriting of section files.
//!
//! Every change is turned into a splice against the original bytes; bytes
//! outside the splices are copied unchanged.

use crate::html::{escape_attr, escape_text};
use crate::models::{Element, ElementKind, SectionFile};
use crate::nav::NavLinks;
use std::ops::Range;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum PatchError {
    #[error("{file}: no <body> tag to put the navigation bar after")]
    MissingBody { file: String },

    #[error("{file}: navigation bar not found where it was scanned")]
    MissingNav { file: String },

    #[error("{file}: <{tag}> expected at byte {offset} was not found")]
    ElementNotFound {
        file: String,
        tag: String,
        offset: usize,
    },
}

#[derive(Debug)]
struct Splice {
    range: Range<usize>,
    replacement: String,
}

impl Splice {
    fn insert(at: usize, text: String) -> Self {
        Self {
            range: at..at,
            replacement: text,
        }
    }
}

/// Produce the new content of `file` from its original bytes.
pub fn patch_file(original: &str, file: &SectionFile, nav: &NavLinks) -> Result<String, PatchError> {
    let mut splices = Vec::new();

    if file.new_nav {
        let body = file
            .body_open_end
            .filter(|&end| end <= original.len())
            .ok_or_else(|| PatchError::MissingBody {
                file: file.name.clone(),
            })?;
        splices.push(Splice::insert(body, format!("\n{}", nav.render())));
    } else if file.update_nav {
        let span = file
            .nav_span
            .filter(|span| opens_tag(original, span.start, "nav"))
            .ok_or_else(|| PatchError::MissingNav {
                file: file.name.clone(),
            })?;
        splices.push(Splice {
            range: span.start..span.end,
            replacement: nav.render(),
        });
    }

    for element in &file.elements {
        let tag = element.kind.tag_name();
        if !opens_tag(original, element.span.start, tag) {
            return Err(PatchError::ElementNotFound {
                file: file.name.clone(),
                tag: tag.to_string(),
                offset: element.span.start,
            });
        }
        if element.modified || element.new_id {
            element_splices(original, element, &mut splices);
        }
    }

    splices.sort_by_key(|s| (s.range.start, s.range.end));

    let mut out = String::with_capacity(original.len() + 256);
    let mut cursor = 0;
    for splice in splices {
        if splice.range.start < cursor {
            warn!(
                "{}: edit at byte {} overlaps a previous edit and is dropped",
                file.name, splice.range.start
            );
            continue;
        }
        out.push_str(&original[cursor..splice.range.start]);
        out.push_str(&splice.replacement);
        cursor = splice.range.end;
    }
    out.push_str(&original[cursor..]);
    Ok(out)
}

fn element_splices(original: &str, element: &Element, splices: &mut Vec<Splice>) {
    let span = element.span;
    let inner = span.inner();

    if element.kind == ElementKind::Link {
        splices.push(Splice {
            range: span.start..span.open_end,
            replacement: link_open_tag(original, element),
        });
        if element.new_text != element.text {
            splices.push(Splice {
                range: inner,
                replacement: escape_text(&element.new_text),
            });
        }
        return;
    }

    if element.new_id {
        let id = format!("id=\"{}\"", escape_attr(&element.id));
        match element.attributes.iter().find(|a| a.name == "id") {
            // Empty or placeholder value
            Some(attribute) => splices.push(Splice {
                range: attribute.raw.clone(),
                replacement: id,
            }),
            // Just before the '>' of the opening tag
            None => {
                let at = span.open_end.saturating_sub(1).max(span.start);
                splices.push(Splice::insert(at, format!(" {id}")));
            }
        }
    }

    if element.modified {
        let raw = &original[inner.clone()];
        match &element.edit {
            Some(edit)
                if element
                    .text
                    .get(..edit.range.end)
                    .is_some_and(|prefix| raw.starts_with(prefix)) =>
            {
                debug!("patching {:?} in place", edit.replacement);
                splices.push(Splice {
                    range: inner.start + edit.range.start..inner.start + edit.range.end,
                    replacement: escape_text(&edit.replacement),
                });
            }
            _ => splices.push(Splice {
                range: inner,
                replacement: escape_text(&element.new_text),
            }),
        }
    }
}

/// Rebuild a link's opening tag with its corrected `href` and `title`,
/// keeping every other attribute as written.
fn link_open_tag(original: &str, element: &Element) -> String {
    let href = element
        .link
        .as_ref()
        .map(|target| target.render())
        .unwrap_or_default();
    let tooltip = element.tooltip.as_deref().unwrap_or("");

    let mut tag = String::from("<a");
    let mut has_title = false;
    for attribute in &element.attributes {
        match attribute.name.as_str() {
            "href" => tag.push_str(&format!(" href=\"{}\"", escape_attr(&href))),
            "title" => {
                has_title = true;
                if !tooltip.is_empty() {
                    tag.push_str(&format!(" title=\"{}\"", escape_attr(tooltip)));
                }
            }
            _ => {
                tag.push(' ');
                tag.push_str(&original[attribute.raw.clone()]);
            }
        }
    }
    if !has_title && !tooltip.is_empty() {
        tag.push_str(&format!(" title=\"{}\"", escape_attr(tooltip)));
    }
    tag.push('>');
    tag
}

/// True if an opening `<tag` starts at `offset`
fn opens_tag(original: &str, offset: usize, tag: &str) -> bool {
    let Some(rest) = original.get(offset..) else {
        return false;
    };
    let bytes = rest.as_bytes();
    let n = tag.len();
    bytes.len() > n + 1
        && bytes[0] == b'<'
        && bytes[1..=n].eq_ignore_ascii_case(tag.as_bytes())
        && !bytes[n + 1].is_ascii_alphanumeric()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BookConfig;
    use crate::extract::scan;
    use crate::ids::IdGenerator;
    use crate::links::resolve_links;
    use crate::models::BookStructure;
    use crate::outline::OutlineBuilder;

    const NAV_A: &str = "<nav><ul>\n  <li><a href=\"toc.html\">Table of Contents</a></li>\n  <li><a href=\"index.html\">Previous</a></li>\n  <li><a href=\"b.html\">Next</a></li>\n</ul></nav>";
    const NAV_B: &str = "<nav><ul>\n  <li><a href=\"toc.html\">Table of Contents</a></li>\n  <li><a href=\"a.html\">Previous</a></li>\n</ul></nav>";

    fn config() -> BookConfig {
        BookConfig::new(
            ".",
            "backup",
            "index.html",
            "toc.html",
            vec!["a.html".into(), "b.html".into()],
        )
    }

    fn structure(config: &BookConfig, a: &str, b: &str) -> BookStructure {
        let mut builder = OutlineBuilder::new(config, IdGenerator::new(3));
        builder.add_file(0, "a.html", &scan(a).unwrap()).unwrap();
        builder.add_file(1, "b.html", &scan(b).unwrap()).unwrap();
        let mut structure = builder.finish();
        resolve_links(&mut structure, config);
        structure
    }

    fn patch_both(a: &str, b: &str) -> (String, String) {
        let config = config();
        let structure = structure(&config, a, b);
        let pa = patch_file(a, &structure.files[0], &NavLinks::for_file(&config, 0)).unwrap();
        let pb = patch_file(b, &structure.files[1], &NavLinks::for_file(&config, 1)).unwrap();
        (pa, pb)
    }

    #[test]
    fn test_untouched_bytes_preserved() {
        let a = format!(
            "<html><body>\n{NAV_A}\n<!-- keep -->\n<h1 id=\"c1\">Chapter 4 Start</h1>\n<p class=x>Text &amp; more</p>\n<h2 id=\"s1\" class=\"big\">Old &amp; new</h2>\n</body></html>\n"
        );
        let b = format!("<body>\n{NAV_B}\n<h2 id=\"s2\">1.2 Fine</h2></body>");
        let (pa, pb) = patch_both(&a, &b);

        let expected = format!(
            "<html><body>\n{NAV_A}\n<!-- keep -->\n<h1 id=\"c1\">Chapter 1 Start</h1>\n<p class=x>Text &amp; more</p>\n<h2 id=\"s1\" class=\"big\">1.1 Old &amp; new</h2>\n</body></html>\n"
        );
        assert_eq!(pa, expected);
        assert_eq!(pb, b);
    }

    #[test]
    fn test_new_id_and_nav_inserted() {
        let a = "<html>\n<body class=\"book\">\n<h1>Chapter 1 Start</h1>\n</body></html>";
        let b = format!("<body>\n{NAV_B}\n</body>");
        let config = config();
        let structure = structure(&config, a, &b);
        let id = &structure.files[0].elements[0].id;

        let patched = patch_file(a, &structure.files[0], &NavLinks::for_file(&config, 0)).unwrap();
        assert_eq!(
            patched,
            format!(
                "<html>\n<body class=\"book\">\n{NAV_A}\n<h1 id=\"{id}\">Chapter 1 Start</h1>\n</body></html>"
            )
        );
    }

    #[test]
    fn test_placeholder_id_replaced() {
        let a = format!(
            "<body>\n{NAV_A}\n<h1 id=\"#\" class=\"top\">Chapter 1 A</h1>\n<h2 id=''>1.1 B</h2></body>"
        );
        let b = format!("<body>\n{NAV_B}\n</body>");
        let config = config();
        let structure = structure(&config, &a, &b);
        let elements = &structure.files[0].elements;
        let (h1, h2) = (&elements[0].id, &elements[1].id);

        let (pa, _) = patch_both(&a, &b);
        assert_eq!(
            pa,
            format!(
                "<body>\n{NAV_A}\n<h1 id=\"{h1}\" class=\"top\">Chapter 1 A</h1>\n<h2 id=\"{h2}\">1.1 B</h2></body>"
            )
        );

        // The generated ids are picked up as they are on the next pass
        let (again, _) = patch_both(&pa, &b);
        assert_eq!(again, pa);
    }

    #[test]
    fn test_stale_nav_replaced() {
        let a = format!("<body>\n{NAV_A}\n<h1 id=\"c\">Chapter 1 A</h1></body>");
        let b = "<body>\n<nav><a href=\"toc.html\">TOC</a> <a href=\"old.html\">Back</a></nav>\n<p>x</p></body>";
        let (_, pb) = patch_both(&a, b);
        assert_eq!(pb, format!("<body>\n{NAV_B}\n<p>x</p></body>"));
    }

    #[test]
    fn test_link_repaired() {
        let a = format!(
            "<body>\n{NAV_A}\n<h1 id=\"c1\">Chapter 1 A</h1>\n<p>See <a class=\"ref\" href=\"old.html#sec1\">Old Label</a>.</p></body>"
        );
        let b = format!(
            "<body>\n{NAV_B}\n<h2 id=\"x\">1.1 X</h2>\n<h2 id=\"sec1\">1.2 Method</h2></body>"
        );
        let (pa, pb) = patch_both(&a, &b);
        assert!(pa.contains(
            "<p>See <a class=\"ref\" href=\"b.html#sec1\" title=\"1.2 Method\">1.2</a>.</p>"
        ));
        assert_eq!(pb, b);

        // Already correct: nothing to do
        let (again, _) = patch_both(&pa, &b);
        assert_eq!(again, pa);
    }

    #[test]
    fn test_link_title_removed_for_equation() {
        let a = format!(
            "<body>\n{NAV_A}\n<h1 id=\"c1\">Chapter 1 A</h1>\n<div class=\"equation\" id=\"e1\">$$ (1.1) x $$</div>\n"
        );
        let b = format!(
            "<body>\n{NAV_B}\n<a href=\"#e1\" title=\"stale\">(1.1)</a></body>"
        );
        let (_, pb) = patch_both(&a, &b);
        assert!(pb.contains("<a href=\"a.html#e1\">(1.1)</a>"));
    }

    #[test]
    fn test_equation_number_inserted_in_place() {
        let a = format!(
            "<body>\n{NAV_A}\n<h1 id=\"c1\">Chapter 1 A</h1>\n<h1 id=\"c2\">Chapter 2 B</h1>\n<div class=\"equation\" id=\"e\"> $$ ax^2+bx+c=0$$ </div>"
        );
        let b = format!("<body>\n{NAV_B}\n</body>");
        let (pa, _) = patch_both(&a, &b);
        assert!(pa.ends_with(
            r#"<div class="equation" id="e"> $$ (2.1) \;\;\;\;\;  ax^2+bx+c=0$$ </div>"#
        ));
    }

    #[test]
    fn test_markup_inside_heading_replaced_whole() {
        let a = format!(
            "<body>\n{NAV_A}\n<h1 id=\"c1\">Chapter 1 A</h1>\n<h2 id=\"s\"><em>9.9</em> Old</h2>"
        );
        let b = format!("<body>\n{NAV_B}\n</body>");
        let (pa, _) = patch_both(&a, &b);
        assert!(pa.ends_with("<h2 id=\"s\">1.1 Old</h2>"));
    }

    #[test]
    fn test_changed_file_is_consistency_error() {
        let config = config();
        let a = format!("<body>\n{NAV_A}\n<h1>Chapter 1 A</h1>");
        let b = format!("<body>\n{NAV_B}\n</body>");
        let structure = structure(&config, &a, &b);

        let shifted = format!("<body>\n<p>inserted</p>{NAV_A}\n<h1>Chapter 1 A</h1>");
        let err = patch_file(&shifted, &structure.files[0], &NavLinks::for_file(&config, 0))
            .unwrap_err();
        assert!(matches!(err, PatchError::ElementNotFound { ref tag, .. } if tag == "h1"));
    }

    #[test]
    fn test_missing_body() {
        let config = config();
        let a = "<h1 id=\"c\">Chapter 1 A</h1>";
        let b = format!("<body>\n{NAV_B}\n</body>");
        let structure = structure(&config, a, &b);
        let err = patch_file(a, &structure.files[0], &NavLinks::for_file(&config, 0)).unwrap_err();
        assert!(matches!(err, PatchError::MissingBody { .. }));
    }
}
