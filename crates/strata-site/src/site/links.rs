//! Navigation links and aliases.

use serde_json::Value as Json;

use super::Site;
use crate::error::SiteError;
use crate::node::NodeId;

impl Site {
    /// Link nodes in document order and among siblings, and collect aliases.
    ///
    /// Skip nodes (index pages and nodes with `_skip: true`) get no links
    /// and are stepped over by their neighbours.
    ///
    /// # Errors
    ///
    /// Returns [`SiteError::Value`] when two nodes declare the same
    /// `_alias`, or an alias is not a string.
    pub fn set_relationships(&mut self) -> Result<(), SiteError> {
        self.root_or_err()?;
        tracing::info!("Setting relationships");
        let order = self.traverse();
        self.aliases.clear();

        for &id in &order {
            let node = self.node_mut(id);
            node.prev = None;
            node.next = None;
            node.prev_sibling = None;
            node.next_sibling = None;
        }

        let mut previous: Option<NodeId> = None;
        for &id in &order {
            self.register_alias(id)?;
            self.link_children(id);
            if self.node(id).is_skip() {
                continue;
            }
            if let Some(prev) = previous {
                self.node_mut(prev).next = Some(id);
                self.node_mut(id).prev = Some(prev);
            }
            previous = Some(id);
        }
        Ok(())
    }

    /// Sibling links among the visible children of `id`.
    fn link_children(&mut self, id: NodeId) {
        let mut previous: Option<NodeId> = None;
        let children = self.node(id).children.clone();
        for child in children {
            if self.node(child).is_skip() {
                continue;
            }
            if let Some(prev) = previous {
                self.node_mut(prev).next_sibling = Some(child);
                self.node_mut(child).prev_sibling = Some(prev);
            }
            previous = Some(child);
        }
    }

    fn register_alias(&mut self, id: NodeId) -> Result<(), SiteError> {
        let node = self.node(id);
        let alias = match node.data.get("_alias") {
            None | Some(Json::Null) => return Ok(()),
            Some(Json::String(alias)) => alias.clone(),
            Some(other) => {
                return Err(SiteError::value(
                    &node.src_path(),
                    format!("'_alias' must be a string. Received: {other}"),
                ));
            }
        };
        if let Some(&existing) = self.aliases.get(&alias) {
            return Err(SiteError::value(
                &node.src_path(),
                format!(
                    "alias '{alias}' is already used by {}",
                    self.node(existing).src_path().display()
                ),
            ));
        }
        self.aliases.insert(alias, id);
        Ok(())
    }
}
