//! Page actions: text sources with frontmatter and structured data files.

use std::fs;
use std::path::Path;

use serde_json::Value as Json;

use crate::error::SiteError;
use crate::frontmatter;
use crate::markup::{markdown, rst};
use crate::node::{Node, NodeId};
use crate::template::Templates;
use crate::value::Data;

fn read_text(src: &Path) -> Result<String, SiteError> {
    fs::read_to_string(src).map_err(|e| SiteError::read(src, format!("can't read file: {e}")))
}

/// Frontmatter values plus the remaining text as `_src_text`.
pub(super) fn frontmatter_values(src: &Path) -> Result<Data, SiteError> {
    let text = read_text(src)?;
    let (body, mut data) = frontmatter::parse(&text)
        .map_err(|e| SiteError::read(src, format!("can't parse frontmatter: {e}")))?;
    data.insert("_src_text".to_owned(), Json::String(body));
    Ok(data)
}

/// The whole file as `_src_text`.
pub(super) fn text_values(src: &Path) -> Result<Data, SiteError> {
    let mut data = Data::new();
    data.insert("_src_text".to_owned(), Json::String(read_text(src)?));
    Ok(data)
}

pub(super) fn yaml_values(src: &Path) -> Result<Data, SiteError> {
    let text = read_text(src)?;
    match serde_yaml::from_str::<Json>(&text) {
        Ok(Json::Object(data)) => Ok(data),
        Ok(_) => Err(SiteError::read(
            src,
            "the top level element in a YAML file must be a mapping",
        )),
        Err(e) => Err(SiteError::read(src, format!("can't parse YAML: {e}"))),
    }
}

pub(super) fn json_values(src: &Path) -> Result<Data, SiteError> {
    let text = read_text(src)?;
    match serde_json::from_str::<Json>(&text) {
        Ok(Json::Object(data)) => Ok(data),
        Ok(_) => Err(SiteError::read(
            src,
            "the top level element in a JSON file must be an object",
        )),
        Err(e) => Err(SiteError::read(src, format!("can't parse JSON: {e}"))),
    }
}

/// Render `_src_text` as a template.
fn render_source(node: &Node, id: NodeId, templates: &Templates) -> Result<String, SiteError> {
    let source = node
        .data
        .get("_src_text")
        .and_then(Json::as_str)
        .unwrap_or_default();
    templates.render_text(id, &node.data, source, &node.src_path())
}

pub(super) fn rendered_text(
    node: &Node,
    id: NodeId,
    templates: &Templates,
) -> Result<Data, SiteError> {
    let mut content = Data::new();
    content.insert(
        "_content".to_owned(),
        Json::String(render_source(node, id, templates)?),
    );
    Ok(content)
}

pub(super) fn markdown_content(
    node: &Node,
    id: NodeId,
    templates: &Templates,
) -> Result<Data, SiteError> {
    let src = node.src_path();
    let options = markdown::parse_options(node.data.get("_md_options"))
        .map_err(|e| SiteError::value(&src, e))?;
    let text = render_source(node, id, templates)?;
    converted_content(markdown::convert(&text, options), &src)
}

pub(super) fn rst_content(
    node: &Node,
    id: NodeId,
    templates: &Templates,
) -> Result<Data, SiteError> {
    let src = node.src_path();
    let options =
        rst::parse_options(node.data.get("_rst_options")).map_err(|e| SiteError::value(&src, e))?;
    let text = render_source(node, id, templates)?;
    converted_content(rst::convert(&text, &options), &src)
}

fn converted_content(converted: crate::markup::Converted, src: &Path) -> Result<Data, SiteError> {
    let toc = serde_json::to_value(&converted.toc)
        .map_err(|e| SiteError::write(src, format!("can't serialize table of contents: {e}")))?;
    let mut content = Data::new();
    content.insert("_content".to_owned(), Json::String(converted.html));
    content.insert("_toc".to_owned(), toc);
    Ok(content)
}

/// Render the node's page template into `dst`.
pub(super) fn write_page(
    node: &Node,
    id: NodeId,
    dst: &Path,
    templates: &Templates,
) -> Result<(), SiteError> {
    let html = templates.render_page(id, &node.data, &node.src_path())?;
    fs::write(dst, html).map_err(|e| SiteError::io(dst, e))
}

/// Write `_content` as is.
pub(super) fn write_content(node: &Node, dst: &Path) -> Result<(), SiteError> {
    let content = node
        .data
        .get("_content")
        .and_then(Json::as_str)
        .unwrap_or_default();
    fs::write(dst, content).map_err(|e| SiteError::io(dst, e))
}
