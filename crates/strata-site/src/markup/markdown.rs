//! Markdown to HTML through `pulldown-cmark`.

use pulldown_cmark::{CowStr, Event, HeadingLevel, Options, Parser, Tag, TagEnd, html};
use serde_json::Value as Json;

use super::{Converted, Heading, IdGenerator, nest_toc};

const EXTENSIONS: [(&str, Options); 7] = [
    ("tables", Options::ENABLE_TABLES),
    ("footnotes", Options::ENABLE_FOOTNOTES),
    ("strikethrough", Options::ENABLE_STRIKETHROUGH),
    ("tasklists", Options::ENABLE_TASKLISTS),
    ("smart_punctuation", Options::ENABLE_SMART_PUNCTUATION),
    ("heading_attributes", Options::ENABLE_HEADING_ATTRIBUTES),
    ("definition_lists", Options::ENABLE_DEFINITION_LIST),
];

/// Parser features used when `_md_options.extensions` is not set.
#[must_use]
pub fn default_options() -> Options {
    Options::ENABLE_TABLES
        | Options::ENABLE_FOOTNOTES
        | Options::ENABLE_STRIKETHROUGH
        | Options::ENABLE_TASKLISTS
        | Options::ENABLE_HEADING_ATTRIBUTES
        | Options::ENABLE_DEFINITION_LIST
}

/// Parser features from a node's `_md_options` mapping.
///
/// # Errors
///
/// Returns a message for unknown option keys or extension names.
pub fn parse_options(md_options: Option<&Json>) -> Result<Options, String> {
    let Some(md_options) = md_options.and_then(Json::as_object) else {
        return Ok(default_options());
    };
    if let Some(key) = md_options.keys().find(|key| *key != "extensions") {
        return Err(format!("invalid Markdown option '{key}'"));
    }
    let Some(extensions) = md_options.get("extensions") else {
        return Ok(default_options());
    };
    let Some(extensions) = extensions.as_array() else {
        return Err("'_md_options.extensions' must be a list".to_owned());
    };

    let mut options = Options::empty();
    for extension in extensions {
        let name = extension.as_str().unwrap_or_default();
        let Some((_, flag)) = EXTENSIONS.iter().find(|(n, _)| *n == name) else {
            let known: Vec<_> = EXTENSIONS.iter().map(|(n, _)| *n).collect();
            return Err(format!(
                "Markdown extension {extension} not one of {}",
                known.join(", ")
            ));
        };
        options |= *flag;
    }
    Ok(options)
}

fn heading_level_to_num(level: HeadingLevel) -> u8 {
    match level {
        HeadingLevel::H1 => 1,
        HeadingLevel::H2 => 2,
        HeadingLevel::H3 => 3,
        HeadingLevel::H4 => 4,
        HeadingLevel::H5 => 5,
        HeadingLevel::H6 => 6,
    }
}

/// Convert Markdown to HTML, giving every heading an id.
///
/// Headings with an explicit `{#id}` attribute keep it.
#[must_use]
pub fn convert(text: &str, options: Options) -> Converted {
    let mut events: Vec<Event<'_>> = Parser::new_ext(text, options).collect();
    let mut ids = IdGenerator::default();
    let mut headings = Vec::new();

    let mut i = 0;
    while i < events.len() {
        let Event::Start(Tag::Heading { level, id, .. }) = &events[i] else {
            i += 1;
            continue;
        };
        let level = *level;
        let explicit_id = id.as_ref().map(ToString::to_string);

        let mut name = String::new();
        let mut end = i + 1;
        while end < events.len() {
            match &events[end] {
                Event::End(TagEnd::Heading(_)) => break,
                Event::Text(text) | Event::Code(text) => name.push_str(text),
                _ => {}
            }
            end += 1;
        }

        let id = explicit_id.unwrap_or_else(|| ids.generate(&name));
        if let Event::Start(Tag::Heading { id: slot, .. }) = &mut events[i] {
            *slot = Some(CowStr::from(id.clone()));
        }
        headings.push(Heading {
            level: heading_level_to_num(level),
            id,
            name,
        });
        i = end + 1;
    }

    let mut html = String::with_capacity(text.len() * 3 / 2);
    html::push_html(&mut html, events.into_iter());

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

    #[test]
    fn test_headings_get_ids() {
        let converted = convert("# Hello World\n\ntext\n\n## Hello World\n", default_options());
        assert!(converted.html.contains(r#"<h1 id="hello-world">Hello World</h1>"#));
        assert!(converted.html.contains(r#"<h2 id="hello-world-1">Hello World</h2>"#));
    }

    #[test]
    fn test_toc_nesting() {
        let converted = convert(
            "# Guide\n\n## Install\n\n## Use `strata`\n\n# Reference\n",
            default_options(),
        );
        assert_eq!(converted.toc.len(), 2);
        assert_eq!(converted.toc[0].name, "Guide");
        assert_eq!(converted.toc[0].children[1].name, "Use strata");
        assert_eq!(converted.toc[0].children[1].id, "use-strata");
    }

    #[test]
    fn test_explicit_heading_id() {
        let converted = convert("# Title {#custom}\n", default_options());
        assert_eq!(converted.toc[0].id, "custom");
        assert!(converted.html.contains(r#"id="custom""#));
    }

    #[test]
    fn test_no_headings() {
        let converted = convert("just *text*\n", default_options());
        assert_eq!(converted.html, "<p>just <em>text</em></p>\n");
        assert!(converted.toc.is_empty());
    }

    #[test]
    fn test_parse_options() {
        assert_eq!(parse_options(None).unwrap(), default_options());
        let options = parse_options(Some(&json!({"extensions": ["tables"]}))).unwrap();
        assert_eq!(options, Options::ENABLE_TABLES);

        let err = parse_options(Some(&json!({"extensions": ["toc"]}))).unwrap_err();
        assert!(err.starts_with("Markdown extension \"toc\" not one of"));
        assert!(parse_options(Some(&json!({"extras": []}))).is_err());
    }

    #[test]
    fn test_tables_enabled_by_default() {
        let converted = convert("| a |\n|---|\n| 1 |\n", default_options());
        assert!(converted.html.contains("<table>"));
    }
}
