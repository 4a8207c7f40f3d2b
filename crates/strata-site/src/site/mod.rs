//! The site tree and its build pipeline.
//!
//! # Architecture
//!
//! Nodes are stored in a flat `Vec<Node>` and refer to each other by
//! [`NodeId`]. The registry maps each default URL to exactly one node;
//! shadowed nodes stay in the arena so later passes can still read the
//! default values they declare.
//!
//! A site is built in passes, each completing over the whole tree before the
//! next one starts:
//!
//! 1. [`Site::from_directory`] once per input directory
//! 2. [`Site::set_values`]
//! 3. [`Site::sort`]
//! 4. [`Site::set_relationships`]
//! 5. [`Site::render_content`]
//! 6. [`Site::build`]
//!
//! [`Site::generate`] runs passes 2 to 6.

mod links;
mod merge;
mod render;
mod sort;
mod values;

use std::collections::HashMap;
use std::fmt::Write;
use std::path::{Component, Path, PathBuf};

use crate::error::SiteError;
use crate::node::{Node, NodeId};
use crate::template::{NodeView, SiteView, Templates};

pub use render::BuildStats;

/// In-memory model of the whole site.
#[derive(Debug)]
pub struct Site {
    nodes: Vec<Node>,
    root: Option<NodeId>,
    registry: HashMap<String, NodeId>,
    aliases: HashMap<String, NodeId>,
    build_dir: PathBuf,
    only_modified: bool,
    templates: Templates,
}

impl Site {
    /// Empty site writing to `build_dir`.
    ///
    /// With `only_modified`, files whose destination is at least as recent
    /// as their source are not written again.
    pub fn new(build_dir: impl Into<PathBuf>, only_modified: bool) -> Self {
        Self {
            nodes: Vec::new(),
            root: None,
            registry: HashMap::new(),
            aliases: HashMap::new(),
            build_dir: build_dir.into(),
            only_modified,
            templates: Templates::default(),
        }
    }

    /// Run every pass after the input directories have been merged.
    ///
    /// # Errors
    ///
    /// Returns the first error of any pass.
    pub fn generate(&mut self) -> Result<BuildStats, SiteError> {
        self.set_values()?;
        self.sort()?;
        self.set_relationships()?;
        self.render_content()?;
        self.build()
    }

    #[must_use]
    pub fn build_dir(&self) -> &Path {
        &self.build_dir
    }

    #[must_use]
    pub fn templates(&self) -> &Templates {
        &self.templates
    }

    /// Root node, once an input directory has been merged.
    #[must_use]
    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    pub(crate) fn root_or_err(&self) -> Result<NodeId, SiteError> {
        self.root.ok_or(SiteError::NotInitialized)
    }

    /// Node by id.
    ///
    /// # Panics
    ///
    /// Panics if the id does not come from this site.
    #[must_use]
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.0]
    }

    /// Number of registered nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.registry.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.registry.is_empty()
    }

    /// Node registered at a default URL.
    ///
    /// # Errors
    ///
    /// Returns [`SiteError::Value`] if no node has that URL.
    pub fn node_by_url(&self, url: &str) -> Result<NodeId, SiteError> {
        self.registry.get(url).copied().ok_or_else(|| {
            SiteError::value(Path::new(url), format!("Can't find node with url={url}"))
        })
    }

    /// Node declaring `_alias: <alias>`.
    ///
    /// # Errors
    ///
    /// Returns [`SiteError::Value`] if no node declares the alias.
    pub fn node_by_alias(&self, alias: &str) -> Result<NodeId, SiteError> {
        self.aliases.get(alias).copied().ok_or_else(|| {
            SiteError::value(Path::new(alias), format!("Can't find node with alias={alias}"))
        })
    }

    /// Navigate from a node by `/`-separated segments (`.`, `..` or names).
    ///
    /// Names are matched against output names, so `intro.html` finds the
    /// node built from `intro.md`. Returns `None` when a segment can't be
    /// followed.
    #[must_use]
    pub fn resolve(&self, from: NodeId, path: &str) -> Option<NodeId> {
        let mut current = from;
        for component in Path::new(path).components() {
            current = match component {
                Component::CurDir => current,
                Component::ParentDir => self.parent(current)?,
                Component::RootDir => self.root?,
                Component::Normal(name) => {
                    let name = name.to_string_lossy();
                    let node = self.node(current);
                    node.index
                        .into_iter()
                        .chain(node.children.iter().copied())
                        .find(|&child| self.node(child).name() == name)?
                }
                Component::Prefix(_) => return None,
            };
        }
        Some(current)
    }

    /// Node whose navigation links an index node borrows.
    fn nav_identity(&self, id: NodeId) -> NodeId {
        let node = self.node(id);
        match node.parent {
            Some(parent) if node.is_index() => parent,
            _ => id,
        }
    }

    /// Parent directory. Index nodes report their directory's parent.
    #[must_use]
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(self.nav_identity(id)).parent
    }

    #[must_use]
    pub fn prev(&self, id: NodeId) -> Option<NodeId> {
        self.node(self.nav_identity(id)).prev
    }

    #[must_use]
    pub fn next(&self, id: NodeId) -> Option<NodeId> {
        self.node(self.nav_identity(id)).next
    }

    #[must_use]
    pub fn prev_sibling(&self, id: NodeId) -> Option<NodeId> {
        self.node(self.nav_identity(id)).prev_sibling
    }

    #[must_use]
    pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        self.node(self.nav_identity(id)).next_sibling
    }

    #[must_use]
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.node(id).children
    }

    #[must_use]
    pub fn index(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).index
    }

    /// Nodes in pre-order: a directory, then its index, then its children.
    #[must_use]
    pub fn traverse(&self) -> Vec<NodeId> {
        let mut order = Vec::with_capacity(self.registry.len());
        let mut pending: Vec<NodeId> = self.root.into_iter().collect();
        while let Some(id) = pending.pop() {
            order.push(id);
            let node = self.node(id);
            pending.extend(node.children.iter().rev());
            pending.extend(node.index);
        }
        order
    }

    /// Render the tree as text and log it at debug level.
    pub fn display_tree(&self) -> String {
        let mut tree = String::new();
        for id in self.traverse() {
            let node = self.node(id);
            if node.depth == 0 {
                tree.push_str(".\n");
                continue;
            }
            let tail = if node.is_dir { "/" } else { "" };
            let _ = writeln!(
                tree,
                "{}├── {}{tail}",
                "│   ".repeat(node.depth - 1),
                node.name()
            );
        }
        tracing::debug!("Site tree:\n{tree}");
        tree
    }

    /// Copy of the registered tree for template lookups.
    pub(crate) fn snapshot(&self) -> SiteView {
        let nodes = self
            .traverse()
            .into_iter()
            .map(|id| {
                let node = self.node(id);
                let view = NodeView {
                    url: node.url(),
                    name: node.name(),
                    title: node.title.clone(),
                    depth: node.depth,
                    is_dir: node.is_dir,
                    data: node.data.clone(),
                    parent: self.parent(id),
                    children: node.children.clone(),
                    index: node.index,
                    prev: self.prev(id),
                    next: self.next(id),
                    prev_sibling: self.prev_sibling(id),
                    next_sibling: self.next_sibling(id),
                };
                (id, view)
            })
            .collect();
        SiteView {
            nodes,
            registry: self.registry.clone(),
            aliases: self.aliases.clone(),
        }
    }
}
