//! Nodes of the site tree.
//!
//! Nodes live in the [`Site`](crate::Site) arena and refer to each other by
//! [`NodeId`]. Navigation links of index nodes are read through the site,
//! which delegates them to the containing directory.

use std::fmt;
use std::path::{Path, PathBuf};

use serde_json::Value as Json;

use crate::action::Action;
use crate::filetype::slash_path;
use crate::value::Data;

/// Output file name of directory index pages.
pub const INDEX_NAME: &str = "index.html";

/// Stable index of a node in the site arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One file or directory of the output site.
#[derive(Clone, Debug)]
pub struct Node {
    /// Input directory the node was read from.
    pub src_root: PathBuf,
    /// Source path relative to `src_root` (empty for the root).
    pub relative_src_path: PathBuf,
    pub action: Action,
    pub is_dir: bool,
    pub depth: usize,

    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
    pub(crate) index: Option<NodeId>,
    pub(crate) prev: Option<NodeId>,
    pub(crate) next: Option<NodeId>,
    pub(crate) prev_sibling: Option<NodeId>,
    pub(crate) next_sibling: Option<NodeId>,

    /// Nodes from earlier input directories this node shadows, oldest first.
    pub overridden: Vec<NodeId>,

    /// Effective data used for rendering.
    pub data: Data,
    /// Data passed to the immediate children only.
    pub level_data: Data,
    /// Data passed to every descendant.
    pub branch_data: Data,

    /// Resolved title, set once content is rendered.
    pub title: Option<String>,
}

impl Node {
    pub(crate) fn new(
        src_root: &Path,
        relative_src_path: &Path,
        action: Action,
        is_dir: bool,
        parent: Option<NodeId>,
        depth: usize,
    ) -> Self {
        Self {
            src_root: src_root.to_path_buf(),
            relative_src_path: relative_src_path.to_path_buf(),
            action,
            is_dir,
            depth,
            parent,
            children: Vec::new(),
            index: None,
            prev: None,
            next: None,
            prev_sibling: None,
            next_sibling: None,
            overridden: Vec::new(),
            data: Data::new(),
            level_data: Data::new(),
            branch_data: Data::new(),
            title: None,
        }
    }

    /// Absolute-or-as-given path of the source file.
    #[must_use]
    pub fn src_path(&self) -> PathBuf {
        self.src_root.join(&self.relative_src_path)
    }

    /// Destination path relative to the build directory.
    #[must_use]
    pub fn relative_dst_path(&self) -> PathBuf {
        match self.action.extension_change() {
            Some(extension) if !self.is_dir => self.relative_src_path.with_extension(extension),
            _ => self.relative_src_path.clone(),
        }
    }

    #[must_use]
    pub fn dst_path(&self, build_dir: &Path) -> PathBuf {
        build_dir.join(self.relative_dst_path())
    }

    /// Output file name (empty for the root).
    #[must_use]
    pub fn name(&self) -> String {
        self.relative_dst_path()
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// URL derived from the destination path, e.g. `/docs/intro.html`.
    #[must_use]
    pub fn default_url(&self) -> String {
        format!("/{}", slash_path(&self.relative_dst_path()))
    }

    /// URL exposed to templates: `_url` if set, else the default URL.
    #[must_use]
    pub fn url(&self) -> String {
        match self.data.get("_url") {
            Some(Json::String(url)) => url.clone(),
            _ => self.default_url(),
        }
    }

    /// Whether this node is the index page of its directory.
    #[must_use]
    pub fn is_index(&self) -> bool {
        !self.is_dir && self.parent.is_some() && self.name() == INDEX_NAME
    }

    /// Whether the node is left out of navigation links.
    #[must_use]
    pub fn is_skip(&self) -> bool {
        self.is_index() || self.data.get("_skip").and_then(Json::as_bool) == Some(true)
    }

    /// Direct children in their current order (index node excluded).
    #[must_use]
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// Index page of this directory, if any.
    #[must_use]
    pub fn index(&self) -> Option<NodeId> {
        self.index
    }
}
