//! Actions: what happens to each kind of source file.
//!
//! Every node carries one [`Action`]. The action decides whether a path
//! becomes a node at all, which values the node declares, what content it
//! renders and how its output file is written.

mod asset;
mod page;

use std::path::Path;

use crate::error::SiteError;
use crate::node::{Node, NodeId};
use crate::template::Templates;
use crate::value::Data;

/// Result of extracting the declared values of a node.
#[derive(Clone, Debug, PartialEq)]
pub enum Extraction {
    /// Raw values, still to be parsed by scope.
    Values(Data),
    /// The node declares nothing (binary or copy-only files).
    NoExtraction,
}

/// Handler for one kind of source file.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Action {
    Ignore,
    UseAsTemplate,
    CreateDir,
    VirtualNode,
    HtmlToHtml,
    MdToHtml,
    RstToHtml,
    JsonToHtml,
    YamlToHtml,
    SassToCss,
    Copy,
    Render,
    RenderWithoutFrontmatter,
}

const ACTIONS: [(&str, Action); 13] = [
    ("ignore", Action::Ignore),
    ("use_as_template", Action::UseAsTemplate),
    ("create_dir", Action::CreateDir),
    ("virtual_node", Action::VirtualNode),
    ("html_to_html", Action::HtmlToHtml),
    ("md_to_html", Action::MdToHtml),
    ("rst_to_html", Action::RstToHtml),
    ("json_to_html", Action::JsonToHtml),
    ("yaml_to_html", Action::YamlToHtml),
    ("sass_to_css", Action::SassToCss),
    ("copy", Action::Copy),
    ("render", Action::Render),
    ("render_without_frontmatter", Action::RenderWithoutFrontmatter),
];

impl Action {
    /// Look up an action by its configuration name.
    ///
    /// # Errors
    ///
    /// Returns [`SiteError::Config`] for unknown names.
    pub fn from_name(name: &str) -> Result<Self, SiteError> {
        ACTIONS
            .iter()
            .find(|(n, _)| *n == name)
            .map(|&(_, action)| action)
            .ok_or_else(|| {
                let known: Vec<_> = ACTIONS.iter().map(|(n, _)| *n).collect();
                SiteError::Config(format!(
                    "Action '{name}' is not defined. Use one of: {}.",
                    known.join(", ")
                ))
            })
    }

    /// Configuration name of this action.
    #[must_use]
    pub fn name(self) -> &'static str {
        ACTIONS
            .iter()
            .find(|(_, a)| *a == self)
            .map_or("ignore", |(n, _)| n)
    }

    /// All configuration names, in table order.
    pub fn names() -> impl Iterator<Item = &'static str> {
        ACTIONS.iter().map(|(n, _)| *n)
    }

    /// Whether paths with this action become nodes.
    #[must_use]
    pub fn creates_node(self) -> bool {
        !matches!(self, Self::Ignore | Self::UseAsTemplate)
    }

    /// New extension of the output file, if the action changes it.
    #[must_use]
    pub fn extension_change(self) -> Option<&'static str> {
        match self {
            Self::HtmlToHtml
            | Self::MdToHtml
            | Self::RstToHtml
            | Self::JsonToHtml
            | Self::YamlToHtml => Some("html"),
            Self::SassToCss => Some("css"),
            _ => None,
        }
    }

    /// Read the values a node declares.
    ///
    /// # Errors
    ///
    /// Returns [`SiteError::Read`] when the source can't be read or parsed.
    pub fn extract_values(self, node: &Node) -> Result<Extraction, SiteError> {
        let src = node.src_path();
        match self {
            Self::CreateDir => asset::dir_values(&src).map(Extraction::Values),
            Self::VirtualNode | Self::YamlToHtml => page::yaml_values(&src).map(Extraction::Values),
            Self::JsonToHtml => page::json_values(&src).map(Extraction::Values),
            Self::HtmlToHtml | Self::MdToHtml | Self::RstToHtml | Self::Render => {
                page::frontmatter_values(&src).map(Extraction::Values)
            }
            Self::RenderWithoutFrontmatter => page::text_values(&src).map(Extraction::Values),
            Self::Ignore | Self::UseAsTemplate | Self::SassToCss | Self::Copy => {
                Ok(Extraction::NoExtraction)
            }
        }
    }

    /// Render the content of a node once its values are known.
    ///
    /// The returned entries are merged into the node data.
    ///
    /// # Errors
    ///
    /// Returns [`SiteError::Write`] when rendering or conversion fails.
    pub fn extract_content(
        self,
        node: &Node,
        id: NodeId,
        templates: &Templates,
    ) -> Result<Data, SiteError> {
        match self {
            Self::HtmlToHtml | Self::Render | Self::RenderWithoutFrontmatter => {
                page::rendered_text(node, id, templates)
            }
            Self::MdToHtml => page::markdown_content(node, id, templates),
            Self::RstToHtml => page::rst_content(node, id, templates),
            _ => Ok(Data::new()),
        }
    }

    /// Write the output of a node to `dst`.
    ///
    /// # Errors
    ///
    /// Returns [`SiteError::Io`] for filesystem failures and
    /// [`SiteError::Write`] for rendering failures.
    pub fn build(
        self,
        node: &Node,
        id: NodeId,
        dst: &Path,
        templates: &Templates,
    ) -> Result<(), SiteError> {
        match self {
            Self::CreateDir => asset::create_dir(dst),
            Self::HtmlToHtml
            | Self::MdToHtml
            | Self::RstToHtml
            | Self::JsonToHtml
            | Self::YamlToHtml => page::write_page(node, id, dst, templates),
            Self::Render | Self::RenderWithoutFrontmatter => page::write_content(node, dst),
            Self::SassToCss => asset::compile_sass(node, dst),
            Self::Copy => asset::copy(&node.src_path(), dst),
            Self::Ignore | Self::UseAsTemplate | Self::VirtualNode => Ok(()),
        }
    }
}
