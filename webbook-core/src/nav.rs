//! The navigation bar at the top of every section file.

use crate::config::BookConfig;

/// Expected targets of one file's navigation bar
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavLinks {
    pub toc: String,
    /// Previous section, or the cover for the first section
    pub previous: String,
    /// Next section, empty for the last section
    pub next: String,
}

impl NavLinks {
    pub fn for_file(config: &BookConfig, index: usize) -> Self {
        let sections = &config.section_files;
        let previous = match index {
            0 => config.cover_file.clone(),
            i => sections.get(i - 1).cloned().unwrap_or_default(),
        };
        let next = sections.get(index + 1).cloned().unwrap_or_default();
        Self {
            toc: config.toc_file.clone(),
            previous,
            next,
        }
    }

    /// Compare against the `href`s found in an existing bar, in order.
    ///
    /// Links without `href` never match; missing links count as empty.
    pub fn matches(&self, hrefs: &[Option<String>]) -> bool {
        let found = |i: usize| match hrefs.get(i) {
            Some(Some(href)) => href.as_str(),
            Some(None) => "???",
            None => "",
        };
        found(0) == self.toc && found(1) == self.previous && found(2) == self.next
    }

    pub fn render(&self) -> String {
        let mut bar = String::from("<nav><ul>\n");
        bar.push_str(&format!(
            "  <li><a href=\"{}\">Table of Contents</a></li>\n",
            self.toc
        ));
        if !self.previous.is_empty() {
            bar.push_str(&format!(
                "  <li><a href=\"{}\">Previous</a></li>\n",
                self.previous
            ));
        }
        if !self.next.is_empty() {
            bar.push_str(&format!("  <li><a href=\"{}\">Next</a></li>\n", self.next));
        }
        bar.push_str("</ul></nav>");
        bar
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> BookConfig {
        BookConfig::new(
            ".",
            "backup",
            "index.html",
            "toc.html",
            vec!["a.html".into(), "b.html".into(), "c.html".into()],
        )
    }

    #[test]
    fn test_targets() {
        let config = config();
        let first = NavLinks::for_file(&config, 0);
        assert_eq!(first.previous, "index.html");
        assert_eq!(first.next, "b.html");

        let last = NavLinks::for_file(&config, 2);
        assert_eq!(last.previous, "b.html");
        assert_eq!(last.next, "");
    }

    #[test]
    fn test_matches() {
        let links = NavLinks::for_file(&config(), 2);
        let current = vec![Some("toc.html".to_string()), Some("b.html".to_string())];
        assert!(links.matches(&current));

        let stale = vec![
            Some("toc.html".to_string()),
            Some("b.html".to_string()),
            Some("d.html".to_string()),
        ];
        assert!(!links.matches(&stale));
        assert!(!links.matches(&[Some("toc.html".to_string()), None]));
    }

    #[test]
    fn test_render_omits_missing_next() {
        let bar = NavLinks::for_file(&config(), 2).render();
        assert_eq!(
            bar,
            "<nav><ul>\n  <li><a href=\"toc.html\">Table of Contents</a></li>\n  <li><a href=\"b.html\">Previous</a></li>\n</ul></nav>"
        );
    }
}
