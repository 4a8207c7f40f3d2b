//! reStructuredText to HTML for the subset used by site pages.
//!
//! Handles section titles (underlined, or over- and underlined), paragraphs,
//! bullet lists, literal blocks introduced by `::` and the inline markup
//! ``` ``literal`` ```, `**strong**` and `*emphasis*`. Section levels follow
//! the order in which adornment styles first appear in the document.
//!
//! This is a limited subset, not a docutils replacement. Directives, roles,
//! tables, enumerated and definition lists, references and substitutions
//! are not interpreted. Their source comes out escaped, as paragraph text or,
//! for an indented body after a line ending in `::`, as a literal block.

use std::fmt::Write;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value as Json;

use super::{Converted, Heading, IdGenerator, escape_html, nest_toc};

static INLINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"``(.+?)``|\*\*(.+?)\*\*|\*([^*\s](?:[^*]*[^*\s])?)\*").unwrap());

const ADORNMENT_CHARS: &str = "=-`:'\"~^_*+#<>.";
const BULLETS: [&str; 3] = ["- ", "* ", "+ "];

/// Options read from `_rst_options`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RstOptions {
    /// HTML level of the first section style (1-6).
    pub initial_header_level: u8,
}

impl Default for RstOptions {
    fn default() -> Self {
        Self {
            initial_header_level: 1,
        }
    }
}

/// Options from a node's `_rst_options` mapping.
///
/// # Errors
///
/// Returns a message for unknown keys or an out of range header level.
pub fn parse_options(rst_options: Option<&Json>) -> Result<RstOptions, String> {
    let mut options = RstOptions::default();
    let Some(map) = rst_options.and_then(Json::as_object) else {
        return Ok(options);
    };
    for (key, value) in map {
        match key.as_str() {
            "initial_header_level" => {
                options.initial_header_level = value
                    .as_u64()
                    .and_then(|level| u8::try_from(level).ok())
                    .filter(|level| (1..=6).contains(level))
                    .ok_or_else(|| {
                        format!("'initial_header_level' must be between 1 and 6, got {value}")
                    })?;
            }
            other => return Err(format!("invalid reStructuredText option '{other}'")),
        }
    }
    Ok(options)
}

/// Adornment style of a section title: the character and whether it has an overline.
type Style = (char, bool);

/// Adornment character if the line is made of one repeated punctuation character.
fn adornment(line: &str) -> Option<char> {
    let line = line.trim_end();
    let first = line.chars().next()?;
    (line.chars().count() >= 2
        && ADORNMENT_CHARS.contains(first)
        && line.chars().all(|c| c == first))
    .then_some(first)
}

fn section_title<'a>(block: &[&'a str]) -> Option<(&'a str, Style)> {
    match *block {
        [title, under] => {
            let c = adornment(under)?;
            let title = title.trim();
            (adornment(title).is_none()
                && !title.is_empty()
                && under.trim_end().chars().count() >= title.chars().count())
            .then_some((title, (c, false)))
        }
        [over, title, under] => {
            let c = adornment(over)?;
            (adornment(under) == Some(c) && !title.trim().is_empty())
                .then_some((title.trim(), (c, true)))
        }
        _ => None,
    }
}

fn bullet_text(line: &str) -> Option<&str> {
    BULLETS
        .iter()
        .find_map(|bullet| line.strip_prefix(bullet))
}

fn indentation(line: &str) -> usize {
    line.len() - line.trim_start().len()
}

/// Render inline markup, escaping everything else.
fn inline(text: &str) -> String {
    let mut html = String::with_capacity(text.len());
    let mut last = 0;
    for captures in INLINE.captures_iter(text) {
        let Some(whole) = captures.get(0) else {
            continue;
        };
        html.push_str(&escape_html(&text[last..whole.start()]));
        if let Some(literal) = captures.get(1) {
            let _ = write!(html, "<code>{}</code>", escape_html(literal.as_str()));
        } else if let Some(strong) = captures.get(2) {
            let _ = write!(html, "<strong>{}</strong>", escape_html(strong.as_str()));
        } else if let Some(emphasis) = captures.get(3) {
            let _ = write!(html, "<em>{}</em>", escape_html(emphasis.as_str()));
        }
        last = whole.end();
    }
    html.push_str(&escape_html(&text[last..]));
    html
}

/// Plain text of a title, for the table of contents.
fn plain(text: &str) -> String {
    INLINE
        .replace_all(text, |captures: &regex::Captures<'_>| {
            (1..=3)
                .find_map(|i| captures.get(i))
                .map_or_else(String::new, |m| m.as_str().to_owned())
        })
        .into_owned()
}

/// Convert a reStructuredText document.
#[must_use]
pub fn convert(text: &str, options: &RstOptions) -> Converted {
    let lines: Vec<&str> = text.lines().collect();
    let mut html = String::new();
    let mut styles: Vec<Style> = Vec::new();
    let mut headings = Vec::new();
    let mut ids = IdGenerator::default();
    let mut expect_literal = false;

    let mut i = 0;
    while i < lines.len() {
        if lines[i].trim().is_empty() {
            i += 1;
            continue;
        }

        if expect_literal && indentation(lines[i]) > 0 {
            let start = i;
            while i < lines.len() && (lines[i].trim().is_empty() || indentation(lines[i]) > 0) {
                i += 1;
            }
            let mut block = &lines[start..i];
            while let [rest @ .., last] = block {
                if !last.trim().is_empty() {
                    break;
                }
                block = rest;
            }
            let indent = block
                .iter()
                .filter(|l| !l.trim().is_empty())
                .map(|l| indentation(l))
                .min()
                .unwrap_or(0);
            let literal: Vec<&str> = block
                .iter()
                .map(|l| l.get(indent..).unwrap_or_default())
                .collect();
            let _ = writeln!(html, "<pre>{}</pre>", escape_html(&literal.join("\n")));
            expect_literal = false;
            continue;
        }
        expect_literal = false;

        let end = lines[i..]
            .iter()
            .position(|l| l.trim().is_empty())
            .map_or(lines.len(), |offset| i + offset);
        let block = &lines[i..end];
        i = end;

        if let Some((title, style)) = section_title(block) {
            let position = styles.iter().position(|s| *s == style).unwrap_or_else(|| {
                styles.push(style);
                styles.len() - 1
            });
            let level = u8::try_from(position)
                .unwrap_or(u8::MAX)
                .saturating_add(options.initial_header_level)
                .min(6);
            let name = plain(title);
            let id = ids.generate(&name);
            let _ = writeln!(html, "<h{level} id=\"{id}\">{}</h{level}>", inline(title));
            headings.push(Heading { level, id, name });
            continue;
        }

        if bullet_text(block[0]).is_some() {
            let mut items: Vec<String> = Vec::new();
            for line in block {
                match bullet_text(line) {
                    Some(text) => items.push(text.trim().to_owned()),
                    None => {
                        if let Some(item) = items.last_mut() {
                            item.push(' ');
                            item.push_str(line.trim());
                        }
                    }
                }
            }
            html.push_str("<ul>\n");
            for item in &items {
                let _ = writeln!(html, "<li>{}</li>", inline(item));
            }
            html.push_str("</ul>\n");
            continue;
        }

        let mut paragraph = block
            .iter()
            .map(|l| l.trim())
            .collect::<Vec<_>>()
            .join("\n");
        if paragraph.ends_with("::") {
            expect_literal = true;
            if paragraph == "::" {
                continue;
            }
            let trimmed_len = if paragraph[..paragraph.len() - 2].ends_with(char::is_whitespace) {
                paragraph.len() - 2
            } else {
                paragraph.len() - 1
            };
            paragraph.truncate(trimmed_len);
            paragraph.truncate(paragraph.trim_end().len());
        }
        let _ = writeln!(html, "<p>{}</p>", inline(&paragraph));
    }

    Converted {
        html,
        toc: nest_toc(&headings),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn html(text: &str) -> String {
        convert(text, &RstOptions::default()).html
    }

    #[test]
    fn test_section_levels_follow_first_appearance() {
        let converted = convert(
            "=====\nTitle\n=====\n\nIntro\n-----\n\nUsage\n-----\n\nDetails\n~~~~~~~\n",
            &RstOptions::default(),
        );
        assert!(converted.html.starts_with("<h1 id=\"title\">Title</h1>\n"));
        assert!(converted.html.contains("<h2 id=\"intro\">Intro</h2>"));
        assert!(converted.html.contains("<h3 id=\"details\">Details</h3>"));
        assert_eq!(converted.toc.len(), 1);
        assert_eq!(converted.toc[0].children.len(), 2);
        assert_eq!(converted.toc[0].children[1].children[0].name, "Details");
    }

    #[test]
    fn test_initial_header_level() {
        let converted = convert("Title\n=====\n", &RstOptions { initial_header_level: 2 });
        assert_eq!(converted.html, "<h2 id=\"title\">Title</h2>\n");
        assert_eq!(converted.toc[0].level, 2);
    }

    #[test]
    fn test_short_underline_is_paragraph() {
        assert_eq!(html("Long title\n===\n"), "<p>Long title\n===</p>\n");
    }

    #[test]
    fn test_paragraph_inline_markup() {
        assert_eq!(
            html("Use ``strata build`` with **care** and *style* & <joy>.\n"),
            "<p>Use <code>strata build</code> with <strong>care</strong> and <em>style</em> \
             &amp; &lt;joy&gt;.</p>\n"
        );
    }

    #[test]
    fn test_bullet_list() {
        assert_eq!(
            html("- one\n- two\n  continued\n* three\n"),
            "<ul>\n<li>one</li>\n<li>two continued</li>\n<li>three</li>\n</ul>\n"
        );
    }

    #[test]
    fn test_literal_block() {
        assert_eq!(
            html("Example::\n\n    fn main() {\n        run();\n    }\n\nAfter.\n"),
            "<p>Example:</p>\n<pre>fn main() {\n    run();\n}</pre>\n<p>After.</p>\n"
        );
    }

    #[test]
    fn test_unsupported_constructs_stay_text() {
        assert_eq!(
            html(".. note:: Be <careful>\n"),
            "<p>.. note:: Be &lt;careful&gt;</p>\n"
        );
        assert_eq!(html("1. first\n2. second\n"), "<p>1. first\n2. second</p>\n");
    }

    #[test]
    fn test_expanded_literal_marker() {
        assert_eq!(
            html("Example ::\n\n  <x>\n"),
            "<p>Example</p>\n<pre>&lt;x&gt;</pre>\n"
        );
        assert_eq!(html("::\n\n  code\n"), "<pre>code</pre>\n");
    }

    #[test]
    fn test_parse_options() {
        assert_eq!(parse_options(None).unwrap(), RstOptions::default());
        assert_eq!(
            parse_options(Some(&json!({"initial_header_level": 3})))
                .unwrap()
                .initial_header_level,
            3
        );
        assert!(parse_options(Some(&json!({"initial_header_level": 9}))).is_err());
        assert!(parse_options(Some(&json!({"doctitle": false}))).is_err());
    }
}
