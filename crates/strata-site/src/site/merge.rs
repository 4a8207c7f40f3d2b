//! Merging input directories into the tree.

use std::fs;
use std::path::Path;

use super::Site;
use crate::error::SiteError;
use crate::input_dir::InputDir;
use crate::node::{Node, NodeId};

impl Site {
    /// Fold an input directory into the tree.
    ///
    /// Paths of a later directory shadow nodes of earlier ones at the same
    /// URL: the new node records the old one in [`Node::overridden`] and
    /// takes over its children. Directories that end up without nodes are
    /// dropped, except for the root.
    ///
    /// # Errors
    ///
    /// Returns [`SiteError::Ambiguous`] when two files of this directory map
    /// to the same output, and [`SiteError::Io`] when a directory can't be listed.
    pub fn from_directory(&mut self, input: &InputDir) -> Result<(), SiteError> {
        tracing::info!(path = %input.path().display(), "Reading input directory");
        if input.is_template_dir() {
            self.templates.add_dir(input.path());
        }
        self.merge_path(input, Path::new(""), None, 0)?;
        Ok(())
    }

    /// Merge one path; returns the node if it was registered.
    fn merge_path(
        &mut self,
        input: &InputDir,
        relative: &Path,
        parent: Option<NodeId>,
        depth: usize,
    ) -> Result<Option<NodeId>, SiteError> {
        if parent.is_some() {
            let name = relative
                .file_name()
                .map(|n| n.to_string_lossy())
                .unwrap_or_default();
            if input.is_ignored(&name) {
                tracing::debug!(path = %relative.display(), "Ignored path");
                return Ok(None);
            }
        }

        let src = input.path().join(relative);
        let is_dir = src.is_dir();
        let action = input.action_map().get_action(relative, is_dir);
        if !action.creates_node() {
            tracing::debug!(path = %relative.display(), action = action.name(), "Skipping path");
            return Ok(None);
        }

        let node = Node::new(input.path(), relative, action, is_dir, parent, depth);
        let url = node.default_url();
        let id = NodeId(self.nodes.len());
        self.nodes.push(node);

        let old = self.registry.get(&url).copied();
        if let Some(old) = old {
            let old_node = self.node(old);
            if old_node.src_root == input.path() && old_node.relative_src_path != relative {
                return Err(SiteError::Ambiguous {
                    root: input.path().to_path_buf(),
                    first: old_node.relative_src_path.clone(),
                    second: relative.to_path_buf(),
                    output: self.node(id).relative_dst_path(),
                });
            }
            let mut overridden = old_node.overridden.clone();
            overridden.push(old);
            self.node_mut(id).overridden = overridden;
            self.move_children(old, id);
        }

        let mut has_children = false;
        if is_dir {
            for name in sorted_entries(&src)? {
                let child = relative.join(name);
                if self.merge_path(input, &child, Some(id), depth + 1)?.is_some() {
                    has_children = true;
                }
            }
        }

        if parent.is_some() && is_dir && !has_children {
            if let Some(old) = old {
                self.move_children(id, old);
            }
            tracing::debug!(path = %relative.display(), "Dropping empty directory");
            return Ok(None);
        }

        if let Some(old) = old {
            self.detach(old);
            tracing::debug!(url = %url, src = %src.display(), "Shadowed node");
        } else {
            tracing::debug!(url = %url, src = %src.display(), "New node");
        }
        self.registry.insert(url, id);
        match parent {
            Some(parent) => self.attach(parent, id),
            None => self.root = Some(id),
        }
        Ok(Some(id))
    }

    /// Hand the children and index of `from` over to `to`.
    fn move_children(&mut self, from: NodeId, to: NodeId) {
        let children = std::mem::take(&mut self.node_mut(from).children);
        let index = self.node_mut(from).index.take();
        for &child in children.iter().chain(index.iter()) {
            self.node_mut(child).parent = Some(to);
        }
        let target = self.node_mut(to);
        target.children.extend(children);
        if index.is_some() {
            target.index = index;
        }
    }

    fn attach(&mut self, parent: NodeId, id: NodeId) {
        if self.node(id).is_index() {
            self.node_mut(parent).index = Some(id);
        } else {
            self.node_mut(parent).children.push(id);
        }
    }

    fn detach(&mut self, id: NodeId) {
        let Some(parent) = self.node(id).parent else {
            return;
        };
        let parent = self.node_mut(parent);
        if parent.index == Some(id) {
            parent.index = None;
        }
        parent.children.retain(|&child| child != id);
    }
}

/// Entry names of a directory, sorted so merges don't depend on the filesystem.
fn sorted_entries(dir: &Path) -> Result<Vec<std::ffi::OsString>, SiteError> {
    let entries = fs::read_dir(dir).map_err(|e| SiteError::io(dir, e))?;
    let mut names = entries
        .map(|entry| entry.map(|e| e.file_name()))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| SiteError::io(dir, e))?;
    names.sort();
    Ok(names)
}
