//! Markup converters producing HTML and a table of contents.

pub mod markdown;
pub mod rst;

use std::collections::HashMap;

use serde::Serialize;

/// Table of contents entry.
///
/// Entries nest: a heading owns every following heading of a deeper level
/// until the next heading at its own level or above.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TocEntry {
    /// Heading level (1-6).
    pub level: u8,
    /// Anchor id of the heading.
    pub id: String,
    /// Plain heading text.
    pub name: String,
    pub children: Vec<TocEntry>,
}

/// Output of a markup conversion.
#[derive(Clone, Debug, Default)]
pub struct Converted {
    pub html: String,
    pub toc: Vec<TocEntry>,
}

/// Flat heading collected while converting.
#[derive(Clone, Debug)]
pub(crate) struct Heading {
    pub level: u8,
    pub id: String,
    pub name: String,
}

/// Nest a flat heading list into a tree.
pub(crate) fn nest_toc(headings: &[Heading]) -> Vec<TocEntry> {
    let mut entries = Vec::new();
    let mut i = 0;
    while i < headings.len() {
        let heading = &headings[i];
        let end = headings[i + 1..]
            .iter()
            .position(|h| h.level <= heading.level)
            .map_or(headings.len(), |offset| i + 1 + offset);
        entries.push(TocEntry {
            level: heading.level,
            id: heading.id.clone(),
            name: heading.name.clone(),
            children: nest_toc(&headings[i + 1..end]),
        });
        i = end;
    }
    entries
}

/// Generates unique heading ids within one document.
#[derive(Debug, Default)]
pub(crate) struct IdGenerator {
    counts: HashMap<String, usize>,
}

impl IdGenerator {
    pub(crate) fn generate(&mut self, text: &str) -> String {
        let mut base = slugify(text);
        if base.is_empty() {
            base.push_str("section");
        }
        let count = self.counts.entry(base.clone()).or_default();
        let id = match *count {
            0 => base,
            n => format!("{base}-{n}"),
        };
        *count += 1;
        id
    }
}

/// Convert text to a URL-safe slug.
///
/// Lowercases ASCII alphanumerics, turns runs of whitespace, dashes and
/// underscores into a single dash and drops everything else.
#[must_use]
pub fn slugify(text: &str) -> String {
    let mut result = String::new();
    let mut last_was_dash = true;

    for c in text.trim().chars() {
        if c.is_ascii_alphanumeric() {
            result.push(c.to_ascii_lowercase());
            last_was_dash = false;
        } else if !last_was_dash && (c.is_whitespace() || c == '-' || c == '_') {
            result.push('-');
            last_was_dash = true;
        }
    }

    if result.ends_with('-') {
        result.pop();
    }
    result
}

/// Escape text for HTML element content and attribute values.
pub(crate) fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn heading(level: u8, name: &str) -> Heading {
        Heading {
            level,
            id: slugify(name),
            name: name.to_owned(),
        }
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Hello, World!"), "hello-world");
        assert_eq!(slugify("  snake_case and-dash  "), "snake-case-and-dash");
        assert_eq!(slugify("¿?"), "");
    }

    #[test]
    fn test_unique_ids() {
        let mut ids = IdGenerator::default();
        assert_eq!(ids.generate("Setup"), "setup");
        assert_eq!(ids.generate("Setup"), "setup-1");
        assert_eq!(ids.generate("!!"), "section");
    }

    #[test]
    fn test_nest_toc() {
        let toc = nest_toc(&[
            heading(1, "Intro"),
            heading(2, "Install"),
            heading(3, "Linux"),
            heading(2, "Usage"),
            heading(1, "Appendix"),
        ]);
        assert_eq!(toc.len(), 2);
        assert_eq!(toc[0].children.len(), 2);
        assert_eq!(toc[0].children[0].children[0].name, "Linux");
        assert_eq!(toc[1].name, "Appendix");
        assert!(toc[1].children.is_empty());
    }

    #[test]
    fn test_nest_toc_starting_deep() {
        let toc = nest_toc(&[heading(3, "Deep"), heading(2, "Shallow")]);
        assert_eq!(toc.len(), 2);
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(escape_html(r#"<a href="x">&</a>"#), "&lt;a href=&quot;x&quot;&gt;&amp;&lt;/a&gt;");
    }
}
