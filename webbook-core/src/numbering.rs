//! Numbering of headings, captions and equations.
//!
//! `Counters` holds the running chapter/appendix state; the `label_for_*`
//! functions are pure and decide, for one element, whether its text already
//! carries the required number and which minimal edit fixes it if not.

use crate::models::CaptionKind;
use regex::Regex;
use serde::Serialize;
use std::fmt;
use std::ops::Range;
use std::sync::OnceLock;
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum NumberingError {
    #[error("equation has no \"$$\" delimiter: {0}")]
    MissingMathDelimiter(String),

    #[error("appendix number {0} is beyond Z")]
    TooManyAppendices(u32),

    #[error("heading level {0} cannot be numbered")]
    InvalidLevel(u8),
}

/// Opening delimiter of display math inside an equation container
pub const MATH_DELIMITER: &str = "$$";

/// Separator written between a newly inserted equation number and the math
const EQUATION_SEPARATOR: &str = r" \;\;\;\;\; ";

const MAX_APPENDICES: u32 = 26;

/// Kind of the most recent level-1 heading
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TopLevelKind {
    Chapter,
    Appendix,
    /// Preface, foreword and similar: nothing below it is numbered
    #[default]
    Unnumbered,
}

impl TopLevelKind {
    pub fn classify(text: &str) -> Self {
        if text.starts_with("Chapter") {
            TopLevelKind::Chapter
        } else if text.starts_with("Appendix") {
            TopLevelKind::Appendix
        } else {
            TopLevelKind::Unnumbered
        }
    }
}

/// Chapter number or appendix letter of the current top-level section
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mark {
    Digit(u32),
    Letter(char),
}

impl fmt::Display for Mark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mark::Digit(n) => write!(f, "{n}"),
            Mark::Letter(c) => write!(f, "{c}"),
        }
    }
}

/// Running numbering state of one build
#[derive(Debug, Clone, Default)]
pub struct Counters {
    pub tables: u32,
    pub figures: u32,
    pub equations: u32,
    pub chapters: u32,
    pub appendices: u32,
    pub kind: TopLevelKind,
}

impl Counters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enter a new level-1 section: reset the per-section counters and
    /// advance the chapter or appendix index.
    pub fn begin_top_level(&mut self, text: &str) -> Result<TopLevelKind, NumberingError> {
        self.tables = 0;
        self.figures = 0;
        self.equations = 0;

        let kind = TopLevelKind::classify(text);
        match kind {
            TopLevelKind::Chapter => self.chapters += 1,
            TopLevelKind::Appendix => {
                if self.appendices >= MAX_APPENDICES {
                    return Err(NumberingError::TooManyAppendices(self.appendices + 1));
                }
                self.appendices += 1;
            }
            TopLevelKind::Unnumbered => {}
        }
        self.kind = kind;
        Ok(kind)
    }

    pub fn next_caption(&mut self, kind: CaptionKind) -> u32 {
        let counter = match kind {
            CaptionKind::Table => &mut self.tables,
            CaptionKind::Figure => &mut self.figures,
        };
        *counter += 1;
        *counter
    }

    pub fn next_equation(&mut self) -> u32 {
        self.equations += 1;
        self.equations
    }

    /// `None` while inside an unnumbered top-level section
    pub fn mark(&self) -> Option<Mark> {
        match self.kind {
            TopLevelKind::Chapter => Some(Mark::Digit(self.chapters)),
            TopLevelKind::Appendix => {
                let offset = u8::try_from(self.appendices.saturating_sub(1)).unwrap_or(0);
                Some(Mark::Letter(char::from(b'A' + offset.min(25))))
            }
            TopLevelKind::Unnumbered => None,
        }
    }
}

/// Replacement of one byte range of an element's flattened text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextEdit {
    pub range: Range<usize>,
    pub replacement: String,
}

impl TextEdit {
    pub fn apply(&self, text: &str) -> String {
        let mut out = String::with_capacity(text.len() + self.replacement.len());
        out.push_str(&text[..self.range.start]);
        out.push_str(&self.replacement);
        out.push_str(&text[self.range.end..]);
        out
    }
}

/// Outcome of numbering one element
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Numbered {
    pub text: String,
    pub modified: bool,
    /// Text a cross reference to the element should display
    pub label: String,
    pub edit: Option<TextEdit>,
}

impl Numbered {
    fn unchanged(text: &str, label: impl Into<String>) -> Self {
        Self {
            text: text.to_string(),
            modified: false,
            label: label.into(),
            edit: None,
        }
    }

    fn edited(text: &str, edit: TextEdit, label: impl Into<String>) -> Self {
        Self {
            text: edit.apply(text),
            modified: true,
            label: label.into(),
            edit: Some(edit),
        }
    }
}

const DIGITS: &str = "[1-9][0-9]*";
const LETTER: &str = "[A-Z]";

fn heading_pattern(mark: Mark, level: u8) -> &'static Regex {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    let patterns = PATTERNS.get_or_init(|| {
        let mut patterns = Vec::with_capacity(8);
        for (word, first) in [("Chapter", DIGITS), ("Appendix", LETTER)] {
            patterns.push(Regex::new(&format!("^{word} {first} ")).unwrap());
            for depth in 1..4 {
                patterns.push(
                    Regex::new(&format!(r"^{first}(\.{DIGITS}){{{depth}}} ")).unwrap(),
                );
            }
        }
        patterns
    });
    let alphabet = match mark {
        Mark::Digit(_) => 0,
        Mark::Letter(_) => 4,
    };
    &patterns[alphabet + usize::from(level - 1)]
}

fn caption_pattern(mark: Mark, kind: CaptionKind) -> &'static Regex {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    let patterns = PATTERNS.get_or_init(|| {
        let mut patterns = Vec::with_capacity(4);
        for first in [DIGITS, LETTER] {
            for word in ["Table", "Figure"] {
                patterns.push(Regex::new(&format!("^{word} {first}-{DIGITS}: ")).unwrap());
            }
        }
        patterns
    });
    let alphabet = match mark {
        Mark::Digit(_) => 0,
        Mark::Letter(_) => 2,
    };
    let word = match kind {
        CaptionKind::Table => 0,
        CaptionKind::Figure => 1,
    };
    &patterns[alphabet + word]
}

fn equation_pattern(mark: Mark) -> &'static Regex {
    static DIGIT: OnceLock<Regex> = OnceLock::new();
    static LETTER_FORM: OnceLock<Regex> = OnceLock::new();
    match mark {
        Mark::Digit(_) => DIGIT
            .get_or_init(|| Regex::new(&format!(r"^\s*\(({DIGITS}\.{DIGITS})\)")).unwrap()),
        Mark::Letter(_) => LETTER_FORM
            .get_or_init(|| Regex::new(&format!(r"^\s*\(({LETTER}\.{DIGITS})\)")).unwrap()),
    }
}

/// Put `prefix` at the start of `text`, replacing an existing prefix that
/// `pattern` recognises.
fn apply_prefix(text: &str, prefix: &str, pattern: &Regex, label: String) -> Numbered {
    if text.starts_with(prefix) {
        return Numbered::unchanged(text, label);
    }
    let end = pattern.find(text).map(|m| m.end()).unwrap_or(0);
    Numbered::edited(
        text,
        TextEdit {
            range: 0..end,
            replacement: prefix.to_string(),
        },
        label,
    )
}

/// Number a heading.
///
/// `positions` holds the ordinal of the heading and its ancestors below
/// level 1, outermost first (empty for a level-1 heading).
pub fn label_for_heading(
    counters: &Counters,
    text: &str,
    level: u8,
    positions: &[u32],
) -> Result<Numbered, NumberingError> {
    if !(1..=4).contains(&level) || positions.len() != usize::from(level - 1) {
        return Err(NumberingError::InvalidLevel(level));
    }
    let Some(mark) = counters.mark() else {
        return Ok(Numbered::unchanged(text, text));
    };

    let mut number = mark.to_string();
    for position in positions {
        number.push('.');
        number.push_str(&position.to_string());
    }
    let prefix = match (level, mark) {
        (1, Mark::Digit(_)) => format!("Chapter {number} "),
        (1, Mark::Letter(_)) => format!("Appendix {number} "),
        _ => format!("{number} "),
    };
    let label = prefix.trim_end().to_string();
    Ok(apply_prefix(text, &prefix, heading_pattern(mark, level), label))
}

/// Number a table or figure caption with its per-section index.
pub fn label_for_caption(
    counters: &Counters,
    text: &str,
    kind: CaptionKind,
    index: u32,
) -> Numbered {
    let Some(mark) = counters.mark() else {
        return Numbered::unchanged(text, text);
    };
    let label = format!("{} {mark}-{index}", kind.word());
    let prefix = format!("{label}: ");
    apply_prefix(text, &prefix, caption_pattern(mark, kind), label)
}

/// Number a display equation with the current equation counter.
///
/// The number sits in parentheses right after the math delimiter.
pub fn label_for_equation(counters: &Counters, text: &str) -> Result<Numbered, NumberingError> {
    let Some(mark) = counters.mark() else {
        return Ok(Numbered::unchanged(text, ""));
    };
    let number = format!("{mark}.{}", counters.equations);
    let label = format!("({number})");

    let Some(delimiter) = text.find(MATH_DELIMITER) else {
        return Err(NumberingError::MissingMathDelimiter(text.trim().to_string()));
    };
    let after = delimiter + MATH_DELIMITER.len();

    match equation_pattern(mark).captures(&text[after..]) {
        Some(caps) => {
            let Some(existing) = caps.get(1) else {
                return Ok(Numbered::unchanged(text, label));
            };
            if existing.as_str() == number {
                return Ok(Numbered::unchanged(text, label));
            }
            Ok(Numbered::edited(
                text,
                TextEdit {
                    range: after + existing.start()..after + existing.end(),
                    replacement: number,
                },
                label,
            ))
        }
        None => Ok(Numbered::edited(
            text,
            TextEdit {
                range: after..after,
                replacement: format!(" {label}{EQUATION_SEPARATOR}"),
            },
            label,
        )),
    }
}
