//! YAML frontmatter parsing.
//!
//! A frontmatter block is delimited by two lines of three dashes, the first
//! of which is the very first line of the document:
//!
//! ```text
//! ---
//! _title: Getting started
//! author: Ana
//! ---
//!
//! # Getting started
//! ```

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value as Json;

use crate::value::Data;

static FRONTMATTER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?ms)\A---\s*?^(.*?)^---\s*?^(.*)\z").unwrap());

/// Error parsing a frontmatter block.
#[derive(Debug, thiserror::Error)]
pub enum FrontmatterError {
    #[error("can't parse YAML in frontmatter: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("the top level YAML element in the frontmatter must be a mapping")]
    NotMapping,
}

/// Split a document into its body and frontmatter data.
///
/// Documents without a frontmatter block are returned unchanged with empty data.
///
/// # Errors
///
/// Returns [`FrontmatterError`] if the block is not valid YAML or not a mapping.
pub fn parse(text: &str) -> Result<(String, Data), FrontmatterError> {
    let Some(captures) = FRONTMATTER.captures(text) else {
        return Ok((text.to_owned(), Data::new()));
    };
    let block = captures.get(1).map_or("", |m| m.as_str());
    let body = captures.get(2).map_or("", |m| m.as_str());

    match serde_yaml::from_str::<Json>(block)? {
        Json::Object(data) => Ok((body.to_owned(), data)),
        _ => Err(FrontmatterError::NotMapping),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_no_frontmatter() {
        let (body, data) = parse("# Title\n\nText\n").unwrap();
        assert_eq!(body, "# Title\n\nText\n");
        assert!(data.is_empty());
    }

    #[test]
    fn test_frontmatter_split() {
        let (body, data) = parse("---\nfoo: 1\nbar: [a, b]\n---\n\nTitle\n").unwrap();
        assert_eq!(body, "\nTitle\n");
        assert_eq!(Json::Object(data), json!({"foo": 1, "bar": ["a", "b"]}));
    }

    #[test]
    fn test_dashes_must_open_document() {
        let text = "intro\n---\nfoo: 1\n---\nbody";
        let (body, data) = parse(text).unwrap();
        assert_eq!(body, text);
        assert!(data.is_empty());
    }

    #[test]
    fn test_invalid_yaml() {
        let err = parse("---\nfoo: [1\n---\nbody").unwrap_err();
        assert!(err.to_string().starts_with("can't parse YAML in frontmatter"));
    }

    #[test]
    fn test_non_mapping() {
        let err = parse("---\n- a\n- b\n---\nbody").unwrap_err();
        assert!(matches!(err, FrontmatterError::NotMapping));
    }
}
