//! User values declared in frontmatter blocks and `_values.yaml` files.
//!
//! A [`Value`] is one named entry with a [`Scope`] that decides how far it
//! propagates down the tree and an [`Op`] that decides how it combines with
//! what is already there.
//!
//! # Key Syntax
//!
//! - `key`: plain user value, branch scope, replace operation
//! - `_key`: reserved value with a fixed scope, operation and type
//! - `__key`: advanced syntax, the payload picks scope and operation:
//!
//! ```yaml
//! __menu:
//!   scope: level        # local | level | branch | default (default: branch)
//!   operation: append   # replace | merge | append | delete (default: replace)
//!   value: [about]      # required unless operation is delete
//! ```

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde_json::Value as Json;

use crate::error::SiteError;

/// Data dictionary attached to nodes.
pub type Data = serde_json::Map<String, Json>;

/// How far a value propagates down the tree.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Scope {
    /// Only the declaring node.
    Local,
    /// The declaring node and its immediate children.
    Level,
    /// The declaring node and all of its descendants.
    Branch,
    /// Like branch, and still applied when the node is shadowed by a later input directory.
    Default,
}

impl Scope {
    /// All scopes in declaration order.
    pub const ALL: [Self; 4] = [Self::Local, Self::Level, Self::Branch, Self::Default];

    /// Lowercase name as written in source files.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Level => "level",
            Self::Branch => "branch",
            Self::Default => "default",
        }
    }
}

impl FromStr for Scope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|scope| scope.as_str() == s)
            .ok_or_else(|| {
                format!(
                    "scope '{s}' not one of {}",
                    join_names(Self::ALL.map(Self::as_str))
                )
            })
    }
}

/// Operation name, without payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operation {
    Replace,
    Merge,
    Append,
    Delete,
}

impl Operation {
    /// All operations in declaration order.
    pub const ALL: [Self; 4] = [Self::Replace, Self::Merge, Self::Append, Self::Delete];

    /// Lowercase name as written in source files.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Replace => "replace",
            Self::Merge => "merge",
            Self::Append => "append",
            Self::Delete => "delete",
        }
    }
}

impl FromStr for Operation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|operation| operation.as_str() == s)
            .ok_or_else(|| {
                format!(
                    "operation '{s}' not one of {}",
                    join_names(Self::ALL.map(Self::as_str))
                )
            })
    }
}

/// Operation together with its payload.
///
/// The payload type is checked when the value is parsed, so folding only has
/// to check the type of what is already stored.
#[derive(Clone, Debug, PartialEq)]
pub enum Op {
    Replace(Json),
    Merge(Data),
    Append(Vec<Json>),
    Delete,
}

impl Op {
    /// Operation name without payload.
    #[must_use]
    pub fn operation(&self) -> Operation {
        match self {
            Self::Replace(_) => Operation::Replace,
            Self::Merge(_) => Operation::Merge,
            Self::Append(_) => Operation::Append,
            Self::Delete => Operation::Delete,
        }
    }
}

/// Expected JSON type of a reserved key.
#[derive(Clone, Copy, Debug)]
enum Kind {
    String,
    List,
    Mapping,
    Bool,
}

impl Kind {
    fn matches(self, value: &Json) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::List => value.is_array(),
            Self::Mapping => value.is_object(),
            Self::Bool => value.is_boolean(),
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::List => "list",
            Self::Mapping => "mapping",
            Self::Bool => "boolean",
        }
    }
}

/// Contract of a reserved single-underscore key.
struct Reserved {
    name: &'static str,
    scope: Scope,
    operation: Operation,
    kind: Kind,
}

const RESERVED: &[Reserved] = &[
    // input
    reserved("_template", Scope::Default, Operation::Replace, Kind::String),
    reserved("_alias", Scope::Local, Operation::Replace, Kind::String),
    reserved("_sort", Scope::Local, Operation::Replace, Kind::List),
    reserved("_sort_options", Scope::Default, Operation::Merge, Kind::Mapping),
    reserved("_jinja_options", Scope::Default, Operation::Merge, Kind::Mapping),
    reserved("_rst_options", Scope::Default, Operation::Merge, Kind::Mapping),
    reserved("_md_options", Scope::Default, Operation::Merge, Kind::Mapping),
    reserved("_sass_options", Scope::Default, Operation::Merge, Kind::Mapping),
    reserved("_skip", Scope::Local, Operation::Replace, Kind::Bool),
    // output
    reserved("_title", Scope::Local, Operation::Replace, Kind::String),
    reserved("_url", Scope::Local, Operation::Replace, Kind::String),
    reserved("_toc", Scope::Local, Operation::Replace, Kind::List),
    reserved("_content", Scope::Local, Operation::Replace, Kind::String),
    reserved("_src_text", Scope::Local, Operation::Replace, Kind::String),
];

const fn reserved(name: &'static str, scope: Scope, operation: Operation, kind: Kind) -> Reserved {
    Reserved {
        name,
        scope,
        operation,
        kind,
    }
}

/// Names of all reserved single-underscore keys.
pub fn reserved_keys() -> impl Iterator<Item = &'static str> {
    RESERVED.iter().map(|r| r.name)
}

/// Error raised while parsing a value declaration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct ValueError(String);

impl ValueError {
    fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// A single value declared by the user.
///
/// Values are immutable once parsed; they are consumed by [`apply`] and only
/// their effect on node dictionaries survives.
#[derive(Clone, Debug, PartialEq)]
pub struct Value {
    /// Key without the advanced-syntax prefix (`_name` keeps its underscore).
    pub name: String,
    pub scope: Scope,
    pub op: Op,
}

impl Value {
    /// Parse a raw `key: value` pair.
    ///
    /// # Errors
    ///
    /// Returns [`ValueError`] if the key is not a valid name, a reserved key
    /// has the wrong type, or an advanced declaration is malformed.
    pub fn parse(key: &str, raw: Json) -> Result<Self, ValueError> {
        if let Some(name) = key.strip_prefix("__") {
            Self::parse_advanced(key, name, raw)
        } else if key.starts_with('_') {
            Self::parse_reserved(key, raw)
        } else {
            Ok(Self {
                name: key.to_owned(),
                scope: Scope::Branch,
                op: Op::Replace(raw),
            })
        }
    }

    fn parse_reserved(key: &str, raw: Json) -> Result<Self, ValueError> {
        if key.len() < 2 {
            return Err(ValueError::new(format!("Invalid key name '{key}'.")));
        }
        let Some(contract) = RESERVED.iter().find(|r| r.name == key) else {
            return Err(ValueError::new(format!(
                "Underscore key '{key}' not one of {}.",
                join_names(reserved_keys())
            )));
        };
        if !contract.kind.matches(&raw) {
            return Err(ValueError::new(format!(
                "Underscore key '{key}' must be of type {}.",
                contract.kind.as_str()
            )));
        }
        let op = match contract.operation {
            Operation::Merge => Op::Merge(into_mapping(raw)),
            _ => Op::Replace(raw),
        };
        Ok(Self {
            name: key.to_owned(),
            scope: contract.scope,
            op,
        })
    }

    fn parse_advanced(key: &str, name: &str, raw: Json) -> Result<Self, ValueError> {
        if name.is_empty() {
            return Err(ValueError::new(format!("Invalid key name '{key}'.")));
        }
        let Json::Object(mut fields) = raw else {
            return Err(ValueError::new(format!(
                "Key '{key}' starts with two underscores but its value is not a mapping."
            )));
        };

        let scope = match fields.remove("scope") {
            None => Scope::Branch,
            Some(Json::String(s)) => s
                .parse()
                .map_err(|e| ValueError::new(format!("Invalid {e} in key '{key}'.")))?,
            Some(_) => {
                return Err(ValueError::new(format!(
                    "Key '{key}' must give 'scope' as a string."
                )));
            }
        };
        let operation = match fields.remove("operation") {
            None => Operation::Replace,
            Some(Json::String(s)) => s
                .parse()
                .map_err(|e| ValueError::new(format!("Invalid {e} in key '{key}'.")))?,
            Some(_) => {
                return Err(ValueError::new(format!(
                    "Key '{key}' must give 'operation' as a string."
                )));
            }
        };
        let value = fields.remove("value");
        if let Some(extra) = fields.keys().next() {
            return Err(ValueError::new(format!(
                "Key '{key}' has unknown field '{extra}'. Use 'scope', 'operation' and 'value'."
            )));
        }

        let op = match (operation, value) {
            (Operation::Delete, Some(_)) => {
                return Err(ValueError::new(format!(
                    "Key '{key}' can't provide a 'value' field when the operation is set to 'delete'."
                )));
            }
            (Operation::Delete, None) => Op::Delete,
            (_, None) => {
                return Err(ValueError::new(format!(
                    "Key '{key}' must provide a 'value' field."
                )));
            }
            (Operation::Replace, Some(value)) => Op::Replace(value),
            (Operation::Merge, Some(Json::Object(map))) => Op::Merge(map),
            (Operation::Merge, Some(_)) => {
                return Err(ValueError::new(format!(
                    "Key '{key}' specifies a merge operation but the value is not a mapping."
                )));
            }
            (Operation::Append, Some(Json::Array(items))) => Op::Append(items),
            (Operation::Append, Some(_)) => {
                return Err(ValueError::new(format!(
                    "Key '{key}' specifies an append operation but the value is not a list."
                )));
            }
        };

        Ok(Self {
            name: name.to_owned(),
            scope,
            op,
        })
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Value(name: {}, scope: {}, operation: {})",
            self.name,
            self.scope.as_str(),
            self.op.operation().as_str()
        )
    }
}

/// Values of one source, grouped by scope in declaration order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ScopedValues {
    pub default: Vec<Value>,
    pub branch: Vec<Value>,
    pub level: Vec<Value>,
    pub local: Vec<Value>,
}

impl ScopedValues {
    /// Parse every entry of a raw dictionary.
    ///
    /// # Errors
    ///
    /// Returns the first [`ValueError`] encountered.
    pub fn from_data(data: Data) -> Result<Self, ValueError> {
        let mut values = Self::default();
        for (key, raw) in data {
            let value = Value::parse(&key, raw)?;
            match value.scope {
                Scope::Default => values.default.push(value),
                Scope::Branch => values.branch.push(value),
                Scope::Level => values.level.push(value),
                Scope::Local => values.local.push(value),
            }
        }
        Ok(values)
    }

    /// Values declared with the given scope.
    #[must_use]
    pub fn get(&self, scope: Scope) -> &[Value] {
        match scope {
            Scope::Default => &self.default,
            Scope::Branch => &self.branch,
            Scope::Level => &self.level,
            Scope::Local => &self.local,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        Scope::ALL.iter().all(|&scope| self.get(scope).is_empty())
    }
}

/// Fold values into a data dictionary.
///
/// `replace` overwrites. `merge` and `append` build a new container from the
/// stored one and the payload, so a dictionary inherited from an ancestor is
/// never modified in place. `delete` on an absent key only logs a warning.
///
/// # Errors
///
/// Returns [`SiteError::Value`] when `merge` meets a non-mapping or `append`
/// meets a non-list.
pub fn apply(values: &[Value], data: &mut Data, origin: &Path) -> Result<(), SiteError> {
    for value in values {
        match &value.op {
            Op::Replace(new) => {
                data.insert(value.name.clone(), new.clone());
            }
            Op::Merge(new) => {
                let merged = match data.get(&value.name) {
                    None => new.clone(),
                    Some(Json::Object(old)) => {
                        let mut merged = old.clone();
                        merged.extend(new.clone());
                        merged
                    }
                    Some(_) => {
                        return Err(SiteError::value(
                            origin,
                            format!(
                                "Invalid merge operation for '{}'. Destination value is not a mapping.",
                                value.name
                            ),
                        ));
                    }
                };
                data.insert(value.name.clone(), Json::Object(merged));
            }
            Op::Append(new) => {
                let appended = match data.get(&value.name) {
                    None => new.clone(),
                    Some(Json::Array(old)) => old.iter().chain(new).cloned().collect(),
                    Some(_) => {
                        return Err(SiteError::value(
                            origin,
                            format!(
                                "Invalid append operation for '{}'. Destination value is not a list.",
                                value.name
                            ),
                        ));
                    }
                };
                data.insert(value.name.clone(), Json::Array(appended));
            }
            Op::Delete => {
                if data.remove(&value.name).is_none() {
                    tracing::warn!(
                        path = %origin.display(),
                        key = %value.name,
                        "Delete of a key that is not defined"
                    );
                }
            }
        }
    }
    Ok(())
}

fn into_mapping(raw: Json) -> Data {
    match raw {
        Json::Object(map) => map,
        _ => Data::new(),
    }
}

fn join_names<'a>(names: impl IntoIterator<Item = &'a str>) -> String {
    names.into_iter().collect::<Vec<_>>().join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn data(value: Json) -> Data {
        match value {
            Json::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    fn parse_err(key: &str, raw: Json) -> String {
        Value::parse(key, raw).unwrap_err().to_string()
    }

    // ── parsing ──

    #[test]
    fn test_plain_key_defaults_to_branch_replace() {
        let value = Value::parse("author", json!("Ana")).unwrap();
        assert_eq!(value.name, "author");
        assert_eq!(value.scope, Scope::Branch);
        assert_eq!(value.op, Op::Replace(json!("Ana")));
    }

    #[test]
    fn test_reserved_key_contract() {
        let value = Value::parse("_sort_options", json!({"field": "url"})).unwrap();
        assert_eq!(value.scope, Scope::Default);
        assert_eq!(value.op.operation(), Operation::Merge);

        let value = Value::parse("_alias", json!("home")).unwrap();
        assert_eq!(value.scope, Scope::Local);
        assert_eq!(value.op, Op::Replace(json!("home")));
    }

    #[test]
    fn test_reserved_key_wrong_type() {
        assert_eq!(
            parse_err("_sort", json!("a")),
            "Underscore key '_sort' must be of type list."
        );
        assert_eq!(
            parse_err("_skip", json!("yes")),
            "Underscore key '_skip' must be of type boolean."
        );
    }

    #[test]
    fn test_unknown_reserved_key() {
        assert!(parse_err("_colour", json!(1)).starts_with("Underscore key '_colour' not one of"));
        assert_eq!(parse_err("_", json!(1)), "Invalid key name '_'.");
    }

    #[test]
    fn test_advanced_defaults() {
        let value = Value::parse("__menu", json!({"value": [1]})).unwrap();
        assert_eq!(value.name, "menu");
        assert_eq!(value.scope, Scope::Branch);
        assert_eq!(value.op, Op::Replace(json!([1])));
    }

    #[test]
    fn test_advanced_explicit_scope_and_operation() {
        let value = Value::parse(
            "__menu",
            json!({"scope": "level", "operation": "append", "value": ["a"]}),
        )
        .unwrap();
        assert_eq!(value.scope, Scope::Level);
        assert_eq!(value.op, Op::Append(vec![json!("a")]));
    }

    #[test]
    fn test_advanced_delete_rules() {
        let value = Value::parse("__menu", json!({"operation": "delete"})).unwrap();
        assert_eq!(value.op, Op::Delete);

        assert_eq!(
            parse_err("__menu", json!({"operation": "delete", "value": 1})),
            "Key '__menu' can't provide a 'value' field when the operation is set to 'delete'."
        );
        assert_eq!(
            parse_err("__menu", json!({"scope": "local"})),
            "Key '__menu' must provide a 'value' field."
        );
    }

    #[test]
    fn test_advanced_payload_types() {
        assert_eq!(
            parse_err("__m", json!({"operation": "merge", "value": [1]})),
            "Key '__m' specifies a merge operation but the value is not a mapping."
        );
        assert_eq!(
            parse_err("__m", json!({"operation": "append", "value": {"a": 1}})),
            "Key '__m' specifies an append operation but the value is not a list."
        );
    }

    #[test]
    fn test_advanced_invalid_names() {
        assert!(parse_err("__m", json!({"scope": "global", "value": 1})).contains("scope 'global'"));
        assert!(
            parse_err("__m", json!({"operation": "insert", "value": 1}))
                .contains("operation 'insert'")
        );
        assert_eq!(parse_err("__", json!({"value": 1})), "Invalid key name '__'.");
        assert_eq!(
            parse_err("__m", json!(3)),
            "Key '__m' starts with two underscores but its value is not a mapping."
        );
        assert!(parse_err("__m", json!({"value": 1, "extra": 2})).contains("unknown field 'extra'"));
    }

    #[test]
    fn test_scoped_values_grouping() {
        let values = ScopedValues::from_data(data(json!({
            "a": 1,
            "_template": "page.html",
            "_title": "Intro",
            "__b": {"scope": "level", "value": 2},
        })))
        .unwrap();
        assert_eq!(values.branch.len(), 1);
        assert_eq!(values.default.len(), 1);
        assert_eq!(values.local.len(), 1);
        assert_eq!(values.level[0].name, "b");
        assert!(!values.is_empty());
    }

    #[test]
    fn test_scoped_values_keep_declaration_order() {
        let values = ScopedValues::from_data(data(json!({
            "zeta": 1,
            "__alpha": {"value": 2},
            "mid": 3,
        })))
        .unwrap();
        let names: Vec<_> = values.branch.iter().map(|v| v.name.as_str()).collect();
        assert_eq!(names, vec!["zeta", "alpha", "mid"]);
    }

    // ── folding ──

    #[test]
    fn test_merge_allocates_new_mapping() {
        let ancestor = data(json!({"opts": {"a": 1, "b": 2}}));
        let mut child = ancestor.clone();
        let values = vec![Value::parse("__opts", json!({"operation": "merge", "value": {"b": 4, "c": 3}})).unwrap()];

        apply(&values, &mut child, Path::new("x")).unwrap();

        assert_eq!(child["opts"], json!({"a": 1, "b": 4, "c": 3}));
        assert_eq!(ancestor["opts"], json!({"a": 1, "b": 2}));
    }

    #[test]
    fn test_append_allocates_new_list() {
        let ancestor = data(json!({"items": ["a", "b"]}));
        let mut child = ancestor.clone();
        let values = vec![Value::parse("__items", json!({"operation": "append", "value": ["c", "d"]})).unwrap()];

        apply(&values, &mut child, Path::new("x")).unwrap();

        assert_eq!(child["items"], json!(["a", "b", "c", "d"]));
        assert_eq!(ancestor["items"], json!(["a", "b"]));
    }

    #[test]
    fn test_merge_and_append_on_absent_key_set_directly() {
        let mut target = Data::new();
        let values = vec![
            Value::parse("__m", json!({"operation": "merge", "value": {"x": 1}})).unwrap(),
            Value::parse("__l", json!({"operation": "append", "value": [1]})).unwrap(),
        ];
        apply(&values, &mut target, Path::new("x")).unwrap();
        assert_eq!(Json::Object(target), json!({"m": {"x": 1}, "l": [1]}));
    }

    #[test]
    fn test_merge_type_mismatch() {
        let mut target = data(json!({"m": [1]}));
        let values = vec![Value::parse("__m", json!({"operation": "merge", "value": {"x": 1}})).unwrap()];
        let err = apply(&values, &mut target, Path::new("docs/a.md")).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Value);
        assert!(err.to_string().starts_with("docs/a.md: Invalid merge operation for 'm'"));
    }

    #[test]
    fn test_append_type_mismatch() {
        let mut target = data(json!({"l": "text"}));
        let values = vec![Value::parse("__l", json!({"operation": "append", "value": [1]})).unwrap()];
        assert!(apply(&values, &mut target, Path::new("x")).is_err());
    }

    #[test]
    fn test_delete_present_and_absent() {
        let mut target = data(json!({"a": 1}));
        let values = vec![
            Value::parse("__a", json!({"operation": "delete"})).unwrap(),
            Value::parse("__missing", json!({"operation": "delete"})).unwrap(),
        ];
        apply(&values, &mut target, Path::new("x")).unwrap();
        assert!(target.is_empty());
    }
}
