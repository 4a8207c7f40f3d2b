//! Value propagation pass.

use serde_json::Value as Json;

use super::Site;
use crate::action::Extraction;
use crate::error::SiteError;
use crate::node::NodeId;
use crate::value::{Data, ScopedValues, apply};

impl Site {
    /// Compute `data`, `level_data` and `branch_data` of every node.
    ///
    /// Per node, in order: inherit the parent's branch and level data, fold
    /// the default-scope values of every shadowed node, then fold the
    /// node's own values by scope. A node without `_url` gets its default URL.
    ///
    /// # Errors
    ///
    /// Returns [`SiteError::Read`] for unreadable or malformed values and
    /// [`SiteError::Value`] for merge or append type mismatches.
    pub fn set_values(&mut self) -> Result<(), SiteError> {
        self.root_or_err()?;
        tracing::info!("Setting values");
        for id in self.traverse() {
            self.set_node_values(id)?;
        }
        Ok(())
    }

    fn set_node_values(&mut self, id: NodeId) -> Result<(), SiteError> {
        let node = self.node(id);
        let origin = node.src_path();

        let (mut branch_data, mut data) = match node.parent {
            Some(parent) => {
                let parent = self.node(parent);
                let branch_data = parent.branch_data.clone();
                let mut data = branch_data.clone();
                data.extend(parent.level_data.clone());
                (branch_data, data)
            }
            None => (Data::new(), Data::new()),
        };

        for &shadowed in &node.overridden {
            if let Some(values) = self.declared_values(shadowed)? {
                let shadowed_origin = self.node(shadowed).src_path();
                apply(&values.default, &mut branch_data, &shadowed_origin)?;
                apply(&values.default, &mut data, &shadowed_origin)?;
            }
        }

        let mut level_data = Data::new();
        if let Some(values) = self.declared_values(id)? {
            apply(&values.default, &mut branch_data, &origin)?;
            apply(&values.default, &mut data, &origin)?;
            apply(&values.branch, &mut branch_data, &origin)?;
            apply(&values.branch, &mut data, &origin)?;
            level_data.clone_from(&branch_data);
            apply(&values.level, &mut level_data, &origin)?;
            apply(&values.level, &mut data, &origin)?;
            apply(&values.local, &mut data, &origin)?;
        } else {
            level_data.clone_from(&branch_data);
        }

        let node = self.node_mut(id);
        if !data.contains_key("_url") {
            data.insert("_url".to_owned(), Json::String(node.default_url()));
        }
        node.data = data;
        node.level_data = level_data;
        node.branch_data = branch_data;
        Ok(())
    }

    /// Values a node declares, parsed by scope.
    fn declared_values(&self, id: NodeId) -> Result<Option<ScopedValues>, SiteError> {
        let node = self.node(id);
        match node.action.extract_values(node)? {
            Extraction::NoExtraction => Ok(None),
            Extraction::Values(raw) => ScopedValues::from_data(raw)
                .map(Some)
                .map_err(|e| SiteError::read(&node.src_path(), format!("wrong values: {e}"))),
        }
    }
}
