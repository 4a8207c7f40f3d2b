//! File classification.
//!
//! A [`FiletypeMap`] turns a path into a filetype name. Directories,
//! underscore files and virtual nodes are recognized before any registered
//! filetype; registered filetypes are then tried in insertion order and the
//! first match wins.

use std::path::Path;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::SiteError;

/// Filetype of every directory.
pub const DIR: &str = "<dir>";
/// Filetype of files whose name starts with an underscore.
pub const UNDERSCORE_FILE: &str = "<underscore_file>";
/// Filetype of `*.meta.yaml` / `*.meta.yml` sidecar files.
pub const VIRTUAL_NODE: &str = "<virtual_node>";

const SPECIAL_NAMES: [&str; 3] = [DIR, UNDERSCORE_FILE, VIRTUAL_NODE];
const VIRTUAL_NODE_SUFFIXES: [&str; 2] = [".meta.yaml", ".meta.yml"];

static PRESET_MAP: LazyLock<FiletypeMap> = LazyLock::new(|| {
    let mut map = FiletypeMap::new();
    map.update(&presets()).unwrap();
    map
});

/// What part of the path a filetype pattern is matched against.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PatternScope {
    /// The basename only.
    #[default]
    Filename,
    /// The path relative to the input directory, `/`-separated.
    RelativePath,
}

impl FromStr for PatternScope {
    type Err = SiteError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "filename" => Ok(Self::Filename),
            "relative-path" => Ok(Self::RelativePath),
            other => Err(SiteError::Config(format!(
                "The scope for the pattern of a filetype must be one of: filename, relative-path. \
                 Received: '{other}'."
            ))),
        }
    }
}

/// How a filetype recognizes its files.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FiletypePattern {
    /// File extensions, with or without the leading dot.
    Extensions(Vec<String>),
    /// A regular expression searched in the scoped string.
    Regex(String),
}

/// Declaration of a filetype, as found in configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FiletypeDef {
    pub name: String,
    pub pattern: FiletypePattern,
    pub scope: PatternScope,
}

impl FiletypeDef {
    /// Filetype recognized by its extensions.
    pub fn extensions(name: &str, extensions: &[&str]) -> Self {
        Self {
            name: name.to_owned(),
            pattern: FiletypePattern::Extensions(
                extensions.iter().map(|&e| e.to_owned()).collect(),
            ),
            scope: PatternScope::Filename,
        }
    }

    /// Filetype recognized by a regular expression.
    pub fn regex(name: &str, regex: &str, scope: PatternScope) -> Self {
        Self {
            name: name.to_owned(),
            pattern: FiletypePattern::Regex(regex.to_owned()),
            scope,
        }
    }
}

/// A compiled filetype.
#[derive(Clone, Debug)]
pub struct Filetype {
    name: String,
    pattern: Regex,
    scope: PatternScope,
}

impl Filetype {
    fn compile(def: &FiletypeDef) -> Result<Self, SiteError> {
        let source = match &def.pattern {
            FiletypePattern::Extensions(extensions) => {
                if def.scope != PatternScope::Filename {
                    return Err(SiteError::Config(format!(
                        "Filetype '{}' is defined by extensions, so its scope can only be 'filename'.",
                        def.name
                    )));
                }
                pattern_from_extensions(extensions)
            }
            FiletypePattern::Regex(regex) => regex.clone(),
        };
        let pattern = Regex::new(&source).map_err(|e| {
            SiteError::Config(format!(
                "The pattern '{source}' of filetype '{}' is not a valid regular expression: {e}",
                def.name
            ))
        })?;
        Ok(Self {
            name: def.name.clone(),
            pattern,
            scope: def.scope,
        })
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Check whether a path relative to its input directory is of this filetype.
    #[must_use]
    pub fn check(&self, relative_path: &Path) -> bool {
        match self.scope {
            PatternScope::Filename => relative_path
                .file_name()
                .is_some_and(|name| self.pattern.is_match(&name.to_string_lossy())),
            PatternScope::RelativePath => self.pattern.is_match(&slash_path(relative_path)),
        }
    }
}

/// Build the regex matching any of the given extensions.
fn pattern_from_extensions(extensions: &[String]) -> String {
    let alternatives = extensions
        .iter()
        .map(|extension| {
            let dotted = if extension.starts_with('.') {
                extension.clone()
            } else {
                format!(".{extension}")
            };
            regex::escape(&dotted)
        })
        .collect::<Vec<_>>()
        .join("|");
    format!("^.*({alternatives})")
}

/// Ordered collection of filetypes.
#[derive(Clone, Debug, Default)]
pub struct FiletypeMap {
    filetypes: Vec<Filetype>,
}

impl FiletypeMap {
    /// Empty map: only the special filetypes are recognized.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Map with the built-in filetypes.
    #[must_use]
    pub fn with_presets() -> Self {
        PRESET_MAP.clone()
    }

    /// Register filetypes.
    ///
    /// New definitions go first, followed by the previous ones that were not
    /// redefined, so later calls take priority during classification.
    ///
    /// # Errors
    ///
    /// Returns [`SiteError::Config`] for invalid patterns or scopes.
    pub fn update(&mut self, defs: &[FiletypeDef]) -> Result<(), SiteError> {
        let mut filetypes: Vec<Filetype> = Vec::with_capacity(defs.len() + self.filetypes.len());
        for def in defs {
            let filetype = Filetype::compile(def)?;
            // a name defined twice in the same batch keeps the last definition
            filetypes.retain(|f| f.name != filetype.name);
            filetypes.push(filetype);
        }
        for old in self.filetypes.drain(..) {
            if !filetypes.iter().any(|f| f.name == old.name) {
                filetypes.push(old);
            }
        }
        self.filetypes = filetypes;
        Ok(())
    }

    /// Classify a path relative to its input directory.
    ///
    /// Returns `None` for files no filetype recognizes.
    #[must_use]
    pub fn classify(&self, relative_path: &Path, is_dir: bool) -> Option<&str> {
        if is_dir {
            return Some(DIR);
        }
        let filename = relative_path
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_default();
        if filename.starts_with('_') {
            return Some(UNDERSCORE_FILE);
        }
        if VIRTUAL_NODE_SUFFIXES.iter().any(|s| filename.ends_with(s)) {
            return Some(VIRTUAL_NODE);
        }
        self.filetypes
            .iter()
            .find(|f| f.check(relative_path))
            .map(Filetype::name)
    }

    /// Whether the name is a registered or special filetype.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        SPECIAL_NAMES.contains(&name) || self.filetypes.iter().any(|f| f.name == name)
    }

    /// Registered names in lookup order, followed by the special ones.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.filetypes
            .iter()
            .map(Filetype::name)
            .chain(SPECIAL_NAMES)
            .collect()
    }
}

/// Built-in filetypes.
#[must_use]
pub fn presets() -> Vec<FiletypeDef> {
    vec![
        FiletypeDef::extensions("html", &[".html", ".htm"]),
        FiletypeDef::extensions(
            "md",
            &[".md", ".mkd", ".mkdn", ".mdwn", ".mdwon", ".markdown"],
        ),
        FiletypeDef::extensions("rst", &[".rst"]),
        FiletypeDef::extensions("json", &[".json"]),
        FiletypeDef::extensions("yaml", &[".yaml", ".yml"]),
        FiletypeDef::extensions("css", &[".css"]),
        FiletypeDef::extensions("sass", &[".scss", ".sass"]),
        FiletypeDef::extensions("js", &[".js"]),
        FiletypeDef::extensions("jpeg", &[".jpeg", ".jpg"]),
        FiletypeDef::extensions("webp", &[".webp"]),
        FiletypeDef::extensions("png", &[".png"]),
        FiletypeDef::extensions("gif", &[".gif"]),
        FiletypeDef::extensions("svg", &[".svg"]),
    ]
}

/// Render a relative path with `/` separators on every platform.
pub(crate) fn slash_path(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn classify<'a>(map: &'a FiletypeMap, path: &str) -> Option<&'a str> {
        map.classify(Path::new(path), false)
    }

    #[test]
    fn test_extension_pattern() {
        assert_eq!(
            pattern_from_extensions(&["md".to_owned(), ".markdown".to_owned()]),
            r"^.*(\.md|\.markdown)"
        );
    }

    #[test]
    fn test_presets_classification() {
        let map = FiletypeMap::with_presets();
        assert_eq!(classify(&map, "index.md"), Some("md"));
        assert_eq!(classify(&map, "docs/guide.markdown"), Some("md"));
        assert_eq!(classify(&map, "photo.JPG"), None);
        assert_eq!(classify(&map, "photo.jpg"), Some("jpeg"));
        assert_eq!(classify(&map, "styles/main.scss"), Some("sass"));
        assert_eq!(classify(&map, "data.yml"), Some("yaml"));
        assert_eq!(classify(&map, "README"), None);
    }

    #[test]
    fn test_every_preset_is_registered() {
        let map = FiletypeMap::with_presets();
        let mut expected: Vec<String> = presets().into_iter().map(|def| def.name).collect();
        expected.extend(SPECIAL_NAMES.map(str::to_owned));
        assert_eq!(map.names(), expected);
    }

    #[test]
    fn test_special_filetypes_take_precedence() {
        let map = FiletypeMap::with_presets();
        assert_eq!(map.classify(Path::new("docs"), true), Some(DIR));
        assert_eq!(classify(&map, "_values.yaml"), Some(UNDERSCORE_FILE));
        assert_eq!(classify(&map, "foo.meta.yaml"), Some(VIRTUAL_NODE));
        assert_eq!(classify(&map, "foo.meta.yml"), Some(VIRTUAL_NODE));
    }

    #[test]
    fn test_update_gives_new_definitions_priority() {
        let mut map = FiletypeMap::with_presets();
        map.update(&[FiletypeDef::regex(
            "drafts",
            r"^drafts/",
            PatternScope::RelativePath,
        )])
        .unwrap();

        assert_eq!(classify(&map, "drafts/post.md"), Some("drafts"));
        assert_eq!(classify(&map, "posts/post.md"), Some("md"));
        assert_eq!(map.names()[0], "drafts");
    }

    #[test]
    fn test_update_redefinition_moves_to_front() {
        let mut map = FiletypeMap::with_presets();
        map.update(&[FiletypeDef::extensions("md", &[".txt"])]).unwrap();

        assert_eq!(classify(&map, "notes.txt"), Some("md"));
        assert_eq!(classify(&map, "notes.md"), None);
        assert_eq!(map.names().iter().filter(|n| **n == "md").count(), 1);
    }

    #[test]
    fn test_extensions_require_filename_scope() {
        let mut map = FiletypeMap::new();
        let mut def = FiletypeDef::extensions("txt", &[".txt"]);
        def.scope = PatternScope::RelativePath;
        let err = map.update(&[def]).unwrap_err();
        assert!(err.to_string().contains("can only be 'filename'"));
    }

    #[test]
    fn test_invalid_regex() {
        let mut map = FiletypeMap::new();
        let err = map
            .update(&[FiletypeDef::regex("bad", "(", PatternScope::Filename)])
            .unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Config);
    }

    #[test]
    fn test_pattern_scope_parse() {
        assert_eq!("filename".parse::<PatternScope>().unwrap(), PatternScope::Filename);
        assert_eq!(
            "relative-path".parse::<PatternScope>().unwrap(),
            PatternScope::RelativePath
        );
        assert!("full-path".parse::<PatternScope>().is_err());
    }

    #[test]
    fn test_contains_special_names() {
        let map = FiletypeMap::new();
        assert!(map.contains(DIR));
        assert!(!map.contains("md"));
    }
}
