//! Sibling sort pass.

use std::collections::BTreeMap;
use std::str::FromStr;

use serde_json::Value as Json;

use super::Site;
use crate::error::SiteError;
use crate::filetype::slash_path;
use crate::node::{Node, NodeId};

/// Marker in `_sort` for the automatically sorted block.
const SINK: &str = "*";

/// Node attribute children are keyed by.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum SortField {
    Name,
    Url,
    SrcPath,
}

impl SortField {
    fn key(self, node: &Node) -> String {
        match self {
            Self::Name => node.name(),
            Self::Url => node.url(),
            Self::SrcPath => slash_path(&node.relative_src_path),
        }
    }
}

impl FromStr for SortField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "name" => Ok(Self::Name),
            "url" => Ok(Self::Url),
            "src_path" => Ok(Self::SrcPath),
            other => Err(format!(
                "invalid sorting field '{other}'. Use one of: name, url, src_path."
            )),
        }
    }
}

impl Site {
    /// Order the children of every directory.
    ///
    /// Entries of `_sort` before the `*` marker go first, entries after it go
    /// last, and every other child goes in between, ordered by
    /// `_sort_options.field` (default `name`) and reversed when
    /// `_sort_options.reverse` is true. Without a marker the automatic block
    /// goes last.
    ///
    /// # Errors
    ///
    /// Returns [`SiteError::Value`] for invalid options or `_sort` entries
    /// that match no child.
    pub fn sort(&mut self) -> Result<(), SiteError> {
        let root = self.root_or_err()?;
        tracing::info!("Sorting nodes");
        let mut pending = vec![root];
        while let Some(id) = pending.pop() {
            if !self.node(id).is_dir {
                continue;
            }
            let order = self.sorted_children(id)?;
            pending.extend(order.iter().rev());
            self.node_mut(id).children = order;
        }
        Ok(())
    }

    fn sorted_children(&self, id: NodeId) -> Result<Vec<NodeId>, SiteError> {
        let node = self.node(id);
        let origin = node.src_path();
        let options = node.data.get("_sort_options").and_then(Json::as_object);

        let field = match options.and_then(|o| o.get("field")) {
            None => SortField::Name,
            Some(Json::String(name)) => name.parse().map_err(|e| SiteError::value(&origin, e))?,
            Some(other) => {
                return Err(SiteError::value(
                    &origin,
                    format!("invalid sorting field {other}. It must be a string."),
                ));
            }
        };
        let reverse = match options.and_then(|o| o.get("reverse")) {
            None => false,
            Some(Json::Bool(reverse)) => *reverse,
            Some(other) => {
                return Err(SiteError::value(
                    &origin,
                    format!("'_sort_options.reverse' must be a boolean. Received: {other}"),
                ));
            }
        };

        let entries: Vec<&str> = match node.data.get("_sort") {
            None => Vec::new(),
            Some(Json::Array(items)) => items
                .iter()
                .map(|item| {
                    item.as_str().ok_or_else(|| {
                        SiteError::value(
                            &origin,
                            format!("'_sort' entries must be strings. Received: {item}"),
                        )
                    })
                })
                .collect::<Result<_, _>>()?,
            Some(_) => return Err(SiteError::value(&origin, "'_sort' must be a list")),
        };

        let mut by_key: BTreeMap<String, NodeId> = BTreeMap::new();
        for &child in &node.children {
            let key = field.key(self.node(child));
            if let Some(&other) = by_key.get(&key) {
                return Err(SiteError::value(
                    &origin,
                    format!(
                        "duplicate sort key '{key}': {} and {}",
                        self.node(other).src_path().display(),
                        self.node(child).src_path().display()
                    ),
                ));
            }
            by_key.insert(key, child);
        }

        let (top, bottom) = match entries.iter().position(|&e| e == SINK) {
            Some(marker) => (&entries[..marker], &entries[marker + 1..]),
            None => (&entries[..], &[][..]),
        };

        let mut resolve = |entries: &[&str]| -> Result<Vec<NodeId>, SiteError> {
            entries
                .iter()
                .map(|&entry| {
                    by_key
                        .remove(entry)
                        .or_else(|| by_key.remove(&format!("{entry}.html")))
                        .ok_or_else(|| {
                            SiteError::value(
                                &origin,
                                format!("can't sort by '{entry}': no such child in this directory"),
                            )
                        })
                })
                .collect()
        };
        let mut order = resolve(top)?;
        let bottom = resolve(bottom)?;

        let mut sink: Vec<NodeId> = by_key.into_values().collect();
        if reverse {
            sink.reverse();
        }
        order.extend(sink);
        order.extend(bottom);
        Ok(order)
    }
}
