//! Jinja templating through `minijinja`.
//!
//! Environments are cached per distinct `_jinja_options` set. Templates are
//! loaded from the template directories, highest priority first.
//!
//! Template code sees the node being rendered as `_node` and can reach the
//! rest of the site through it and through the global functions:
//!
//! - `get_node(url)` / `get_node(alias="home")`
//! - `get_url(alias)`
//! - `print_as_json(value)`
//! - `now_as(format)`
//!
//! Cross-node reads go to a [`SiteView`] snapshot taken at the start of each
//! pass, so their results do not depend on traversal order.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use chrono::format::{Item, StrftimeItems};
use minijinja::value::{Enumerator, Kwargs, Object};
use minijinja::{AutoEscape, Environment, ErrorKind, State, UndefinedBehavior, Value};
use serde_json::Value as Json;

use crate::error::SiteError;
use crate::node::NodeId;
use crate::value::Data;

/// Page template used when a node sets no `_template`.
pub const DEFAULT_TEMPLATE: &str = "default.html";

/// Read-only copy of one node as seen by templates.
#[derive(Debug, Clone, Default)]
pub(crate) struct NodeView {
    pub url: String,
    pub name: String,
    pub title: Option<String>,
    pub depth: usize,
    pub is_dir: bool,
    pub data: Data,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    pub index: Option<NodeId>,
    pub prev: Option<NodeId>,
    pub next: Option<NodeId>,
    pub prev_sibling: Option<NodeId>,
    pub next_sibling: Option<NodeId>,
}

/// Snapshot of the site for template lookups.
#[derive(Debug, Default)]
pub(crate) struct SiteView {
    pub nodes: HashMap<NodeId, NodeView>,
    pub registry: HashMap<String, NodeId>,
    pub aliases: HashMap<String, NodeId>,
}

impl SiteView {
    fn by_url(&self, url: &str) -> Option<NodeId> {
        self.registry.get(url).copied()
    }

    fn by_alias(&self, alias: &str) -> Option<NodeId> {
        self.aliases.get(alias).copied()
    }
}

const NODE_FIELDS: &[&str] = &[
    "url",
    "name",
    "title",
    "depth",
    "is_dir",
    "data",
    "parent",
    "children",
    "index",
    "prev",
    "next",
    "prev_sibling",
    "next_sibling",
];

/// A node exposed to template code.
#[derive(Debug)]
struct NodeObject {
    view: Arc<SiteView>,
    id: NodeId,
}

fn node_value(view: &Arc<SiteView>, id: NodeId) -> Value {
    Value::from_object(NodeObject {
        view: Arc::clone(view),
        id,
    })
}

impl Object for NodeObject {
    fn get_value(self: &Arc<Self>, key: &Value) -> Option<Value> {
        let node = self.view.nodes.get(&self.id)?;
        let link = |id: Option<NodeId>| id.map_or(Value::from(()), |id| node_value(&self.view, id));
        let value = match key.as_str()? {
            "url" => Value::from(node.url.clone()),
            "name" => Value::from(node.name.clone()),
            "title" => node
                .title
                .clone()
                .map_or_else(|| Value::from(node.url.clone()), Value::from),
            "depth" => Value::from(node.depth),
            "is_dir" => Value::from(node.is_dir),
            "data" => Value::from_serialize(&node.data),
            "parent" => link(node.parent),
            "children" => Value::from(
                node.children
                    .iter()
                    .map(|&id| node_value(&self.view, id))
                    .collect::<Vec<_>>(),
            ),
            "index" => link(node.index),
            "prev" => link(node.prev),
            "next" => link(node.next),
            "prev_sibling" => link(node.prev_sibling),
            "next_sibling" => link(node.next_sibling),
            _ => return None,
        };
        Some(value)
    }

    fn enumerate(self: &Arc<Self>) -> Enumerator {
        Enumerator::Str(NODE_FIELDS)
    }
}

fn template_error(message: impl Into<String>) -> minijinja::Error {
    minijinja::Error::new(ErrorKind::InvalidOperation, message.into())
}

/// Site snapshot reachable from the current template state.
fn current_view(state: &State<'_, '_>) -> Result<Arc<SiteView>, minijinja::Error> {
    state
        .lookup("_node")
        .and_then(|node| node.downcast_object::<NodeObject>())
        .map(|node| Arc::clone(&node.view))
        .ok_or_else(|| template_error("no node is being rendered"))
}

fn get_node(
    state: &State<'_, '_>,
    url: Option<String>,
    kwargs: Kwargs,
) -> Result<Value, minijinja::Error> {
    let url = match url {
        Some(url) => Some(url),
        None => kwargs.get::<Option<String>>("url")?,
    };
    let alias: Option<String> = kwargs.get("alias")?;
    kwargs.assert_all_used()?;
    let view = current_view(state)?;

    let id = match (url, alias) {
        (Some(url), _) => view
            .by_url(&url)
            .ok_or_else(|| template_error(format!("Can't find node with url={url}")))?,
        (None, Some(alias)) => view
            .by_alias(&alias)
            .ok_or_else(|| template_error(format!("Can't find node with alias={alias}")))?,
        (None, None) => {
            return Err(template_error(
                "'get_node()' must be called passing either an url or an alias.",
            ));
        }
    };
    Ok(node_value(&view, id))
}

fn get_url(state: &State<'_, '_>, alias: String) -> Result<String, minijinja::Error> {
    let view = current_view(state)?;
    view.by_alias(&alias)
        .and_then(|id| view.nodes.get(&id))
        .map(|node| node.url.clone())
        .ok_or_else(|| template_error(format!("Can't find node with alias={alias}")))
}

fn print_as_json(value: Value) -> Result<String, minijinja::Error> {
    serde_json::to_string_pretty(&value)
        .map_err(|e| template_error(format!("can't serialize value as JSON: {e}")))
}

fn now_as(format: String) -> Result<String, minijinja::Error> {
    let items: Vec<Item<'_>> = StrftimeItems::new(&format).collect();
    if items.iter().any(|item| matches!(item, Item::Error)) {
        return Err(template_error(format!("invalid date format '{format}'")));
    }
    Ok(chrono::Local::now()
        .format_with_items(items.into_iter())
        .to_string())
}

/// Reject names that could escape the template directories.
fn is_safe_name(name: &str) -> bool {
    Path::new(name)
        .components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

/// Environment options parsed from `_jinja_options`.
#[derive(Clone, Copy, Debug)]
struct EnvOptions {
    trim_blocks: bool,
    lstrip_blocks: bool,
    keep_trailing_newline: bool,
    undefined: UndefinedBehavior,
}

impl Default for EnvOptions {
    fn default() -> Self {
        Self {
            trim_blocks: false,
            lstrip_blocks: false,
            keep_trailing_newline: false,
            undefined: UndefinedBehavior::Lenient,
        }
    }
}

impl EnvOptions {
    fn parse(options: &Data) -> Result<Self, String> {
        let mut parsed = Self::default();
        for (key, value) in options {
            let flag = || {
                value
                    .as_bool()
                    .ok_or_else(|| format!("Jinja option '{key}' must be a boolean"))
            };
            match key.as_str() {
                "trim_blocks" => parsed.trim_blocks = flag()?,
                "lstrip_blocks" => parsed.lstrip_blocks = flag()?,
                "keep_trailing_newline" => parsed.keep_trailing_newline = flag()?,
                "undefined" => {
                    parsed.undefined = match value.as_str() {
                        Some("lenient") => UndefinedBehavior::Lenient,
                        Some("strict") => UndefinedBehavior::Strict,
                        Some("chainable") => UndefinedBehavior::Chainable,
                        _ => {
                            return Err(format!(
                                "Jinja option 'undefined' must be one of lenient, strict, \
                                 chainable. Received: {value}"
                            ));
                        }
                    };
                }
                other => return Err(format!("invalid Jinja option '{other}'")),
            }
        }
        Ok(parsed)
    }
}

/// Template directories plus the cached environments.
#[derive(Debug, Default)]
pub struct Templates {
    dirs: Vec<PathBuf>,
    envs: RefCell<HashMap<String, Arc<Environment<'static>>>>,
    view: Arc<SiteView>,
}

impl Templates {
    /// Register a template directory with priority over the existing ones.
    pub fn add_dir(&mut self, dir: &Path) {
        self.dirs.insert(0, dir.to_path_buf());
        self.envs.get_mut().clear();
    }

    /// Template directories, highest priority first.
    #[must_use]
    pub fn dirs(&self) -> &[PathBuf] {
        &self.dirs
    }

    pub(crate) fn set_view(&mut self, view: SiteView) {
        self.view = Arc::new(view);
    }

    fn environment(
        &self,
        data: &Data,
        origin: &Path,
    ) -> Result<Arc<Environment<'static>>, SiteError> {
        let options = match data.get("_jinja_options") {
            Some(Json::Object(options)) => options.clone(),
            _ => Data::new(),
        };
        // serde_json maps are ordered by key, so this is canonical
        let key = Json::Object(options.clone()).to_string();
        if let Some(env) = self.envs.borrow().get(&key) {
            return Ok(Arc::clone(env));
        }

        let options = EnvOptions::parse(&options).map_err(|e| SiteError::value(origin, e))?;
        tracing::debug!(options = %key, "Creating template environment");
        let env = Arc::new(self.build_environment(options));
        self.envs.borrow_mut().insert(key, Arc::clone(&env));
        Ok(env)
    }

    fn build_environment(&self, options: EnvOptions) -> Environment<'static> {
        let mut env = Environment::new();
        env.set_trim_blocks(options.trim_blocks);
        env.set_lstrip_blocks(options.lstrip_blocks);
        env.set_keep_trailing_newline(options.keep_trailing_newline);
        env.set_undefined_behavior(options.undefined);
        env.set_auto_escape_callback(|_| AutoEscape::None);

        let dirs = self.dirs.clone();
        env.set_loader(move |name| {
            if !is_safe_name(name) {
                return Ok(None);
            }
            for dir in &dirs {
                let path = dir.join(name);
                if path.is_file() {
                    return fs::read_to_string(&path).map(Some).map_err(|e| {
                        template_error(format!("can't read template {}", path.display()))
                            .with_source(e)
                    });
                }
            }
            Ok(None)
        });

        env.add_function("get_node", get_node);
        env.add_function("get_url", get_url);
        env.add_function("print_as_json", print_as_json);
        env.add_function("now_as", now_as);
        env
    }

    fn context(&self, id: NodeId, data: &Data) -> BTreeMap<String, Value> {
        let mut context: BTreeMap<String, Value> = data
            .iter()
            .map(|(key, value)| (key.clone(), Value::from_serialize(value)))
            .collect();
        context.insert("_node".to_owned(), node_value(&self.view, id));
        context
    }

    /// Render a node's own text as a template.
    ///
    /// # Errors
    ///
    /// Returns [`SiteError::Write`] for template errors.
    pub fn render_text(
        &self,
        id: NodeId,
        data: &Data,
        source: &str,
        origin: &Path,
    ) -> Result<String, SiteError> {
        let env = self.environment(data, origin)?;
        let name = origin.to_string_lossy();
        env.render_named_str(&name, source, self.context(id, data))
            .map_err(|e| SiteError::write(origin, format!("can't render text: {e:#}")))
    }

    /// Render the page template of a node (`_template`, default `default.html`).
    ///
    /// # Errors
    ///
    /// Returns [`SiteError::Read`] if the template doesn't exist and
    /// [`SiteError::Write`] for template errors.
    pub fn render_page(&self, id: NodeId, data: &Data, origin: &Path) -> Result<String, SiteError> {
        let name = data
            .get("_template")
            .and_then(Json::as_str)
            .unwrap_or(DEFAULT_TEMPLATE);
        let env = self.environment(data, origin)?;
        let template = env.get_template(name).map_err(|e| {
            if e.kind() == ErrorKind::TemplateNotFound {
                SiteError::read(
                    origin,
                    format!("template '{name}' not found in the template directories"),
                )
            } else {
                SiteError::write(origin, format!("can't load template '{name}': {e:#}"))
            }
        })?;
        template
            .render(self.context(id, data))
            .map_err(|e| SiteError::write(origin, format!("can't render template '{name}': {e:#}")))
    }
}
