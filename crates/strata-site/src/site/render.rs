//! Content rendering and the build pass.

use std::fs;
use std::path::Path;
use std::time::SystemTime;

use serde_json::Value as Json;

use super::Site;
use crate::error::SiteError;
use crate::node::NodeId;
use crate::value::Data;

/// Counts reported by [`Site::build`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BuildStats {
    /// Nodes whose build step ran.
    pub built: usize,
    /// Files left alone because their output was up to date.
    pub skipped: usize,
}

impl Site {
    /// Render the text of every node and resolve titles.
    ///
    /// Entries produced by the node's action (`_content`, `_toc`) are merged
    /// into its data. The title is `_title`, else the first TOC entry, else
    /// the URL; it is stored as `_title` and on [`Node::title`].
    ///
    /// [`Node::title`]: crate::Node::title
    ///
    /// # Errors
    ///
    /// Returns [`SiteError::Write`] for template or conversion failures and
    /// [`SiteError::Value`] for invalid markup options.
    pub fn render_content(&mut self) -> Result<(), SiteError> {
        self.root_or_err()?;
        tracing::info!("Rendering content");
        let view = self.snapshot();
        self.templates.set_view(view);

        for id in self.traverse() {
            let node = self.node(id);
            let content = node.action.extract_content(node, id, &self.templates)?;
            let node = self.node_mut(id);
            node.data.extend(content);
            let title = resolve_title(&node.data).unwrap_or_else(|| node.url());
            node.data
                .insert("_title".to_owned(), Json::String(title.clone()));
            node.title = Some(title);
        }
        Ok(())
    }

    /// Write every node to the build directory.
    ///
    /// Directories are created before their contents. With `only_modified`,
    /// a file whose output exists and is at least as recent as its source is
    /// skipped; its descendants are still visited.
    ///
    /// # Errors
    ///
    /// Returns [`SiteError::Io`] for filesystem failures and
    /// [`SiteError::Write`] for rendering failures.
    pub fn build(&mut self) -> Result<BuildStats, SiteError> {
        let mut stats = BuildStats::default();
        let Some(root) = self.root else {
            tracing::warn!("Site is empty, nothing to build");
            return Ok(stats);
        };
        if self.node(root).children.is_empty() && self.node(root).index.is_none() {
            tracing::warn!("Site is empty, nothing to build");
            return Ok(stats);
        }

        tracing::info!(path = %self.build_dir.display(), "Writing site");
        fs::create_dir_all(&self.build_dir).map_err(|e| SiteError::io(&self.build_dir, e))?;
        let view = self.snapshot();
        self.templates.set_view(view);

        for id in self.traverse() {
            let node = self.node(id);
            let dst = node.dst_path(&self.build_dir);
            if self.only_modified && !node.is_dir && is_up_to_date(&node.src_path(), &dst) {
                tracing::debug!(dst = %dst.display(), "Up to date");
                stats.skipped += 1;
                continue;
            }
            tracing::debug!(dst = %dst.display(), action = node.action.name(), "Building");
            node.action.build(node, id, &dst, &self.templates)?;
            stats.built += 1;
        }
        Ok(stats)
    }

    /// Title resolved by [`render_content`](Self::render_content).
    #[must_use]
    pub fn title(&self, id: NodeId) -> Option<&str> {
        self.node(id).title.as_deref()
    }
}

fn resolve_title(data: &Data) -> Option<String> {
    if let Some(Json::String(title)) = data.get("_title") {
        return Some(title.clone());
    }
    data.get("_toc")
        .and_then(Json::as_array)
        .and_then(|toc| toc.first())
        .and_then(|entry| entry.get("name"))
        .and_then(Json::as_str)
        .map(str::to_owned)
}

fn modified(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|m| m.modified()).ok()
}

fn is_up_to_date(src: &Path, dst: &Path) -> bool {
    if !dst.is_file() {
        return false;
    }
    match (modified(src), modified(dst)) {
        (Some(src), Some(dst)) => dst >= src,
        _ => false,
    }
}
