//! Configuration management for Strata.
//!
//! Parses `strata.toml` configuration files with serde and provides
//! auto-discovery of config files in parent directories. Without a file, a
//! project made of `templates/`, `data/` and `content/` directories is
//! assumed.
//!
//! CLI settings can be applied during load via [`CliSettings`].
//!
//! ## Environment Variable Expansion
//!
//! Path values support `${VAR}`, `${VAR:-default}` and a leading `~`.
//!
//! Expanded fields:
//! - `output_dir`
//! - `input_dirs[].path`

mod expand;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Deserialize;
use strata_site::{
    Action, ActionRule, FiletypeDef, FiletypeMap, InputDir, PatternScope, Preset, SiteError,
};

/// Configuration filename to search for.
const CONFIG_FILENAME: &str = "strata.toml";

/// Output directory used when the configuration sets none.
const DEFAULT_OUTPUT_DIR: &str = "build";

/// Conventional input directories, in merge order.
const DEFAULT_INPUT_DIRS: [(&str, &str); 3] = [
    ("templates", "site_templates"),
    ("data", "site_data"),
    ("content", "site_content"),
];

/// CLI settings that override configuration file values.
#[derive(Debug, Default)]
pub struct CliSettings {
    /// Override the output directory.
    pub build_dir: Option<PathBuf>,
    /// Template directories (`site_templates` preset).
    pub template_dirs: Vec<PathBuf>,
    /// Data directories (`site_data` preset).
    pub data_dirs: Vec<PathBuf>,
    /// Content directories (`site_content` preset).
    pub content_dirs: Vec<PathBuf>,
}

impl CliSettings {
    fn has_input_dirs(&self) -> bool {
        !(self.template_dirs.is_empty() && self.data_dirs.is_empty() && self.content_dirs.is_empty())
    }
}

/// A user-defined filetype.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct FiletypeConfig {
    pub name: String,
    pub extensions: Option<Vec<String>>,
    pub regex: Option<String>,
    /// `filename` (default) or `relative-path`.
    pub scope: Option<String>,
}

/// A `filetype → action` rule.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ActionConfig {
    pub filetype: String,
    pub action: String,
}

/// Raw input directory as parsed from TOML.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct InputDirRaw {
    path: String,
    preset: Option<String>,
    default_action: Option<String>,
    #[serde(default)]
    actions: Vec<ActionConfig>,
}

/// Resolved input directory.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InputDirConfig {
    /// Absolute or config-relative path, after expansion.
    pub path: PathBuf,
    pub preset: Option<String>,
    pub default_action: Option<String>,
    pub actions: Vec<ActionConfig>,
}

impl InputDirConfig {
    fn with_preset(path: PathBuf, preset: &str) -> Self {
        Self {
            path,
            preset: Some(preset.to_owned()),
            default_action: None,
            actions: Vec::new(),
        }
    }
}

/// Raw configuration as parsed from TOML.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ConfigRaw {
    output_dir: Option<String>,
    filetypes: Vec<FiletypeConfig>,
    input_dirs: Vec<InputDirRaw>,
}

/// Application configuration.
#[derive(Debug)]
pub struct Config {
    /// Where the site is written.
    pub output_dir: PathBuf,
    /// Filetypes registered before the built-in ones.
    pub filetypes: Vec<FiletypeConfig>,
    /// Input directories, in merge order.
    pub input_dirs: Vec<InputDirConfig>,
    /// Path to the config file (set after loading).
    pub config_path: Option<PathBuf>,
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File not found.
    #[error("Configuration file not found: {}", .0.display())]
    NotFound(PathBuf),
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// TOML parsing error.
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),
    /// Validation error.
    #[error("Configuration error: {0}")]
    Validation(String),
    /// Environment variable error during expansion.
    #[error("Environment variable error in {field}: {message}")]
    EnvVar {
        /// Config field path (e.g., "`input_dirs[0].path`").
        field: String,
        /// Error message (e.g., "${`SITE_ROOT`} not set").
        message: String,
    },
}

/// Require a string field to be non-empty.
fn require_non_empty(value: &str, field: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::Validation(format!("{field} cannot be empty")));
    }
    Ok(())
}

impl Config {
    /// Load configuration from file with optional CLI settings.
    ///
    /// If `config_path` is provided, loads from that file. Otherwise,
    /// searches for `strata.toml` in the current directory and parents, and
    /// falls back to the conventional project layout.
    ///
    /// # Errors
    ///
    /// Returns error if explicit `config_path` doesn't exist, parsing fails,
    /// or the result has no input directories.
    pub fn load(
        config_path: Option<&Path>,
        cli_settings: Option<&CliSettings>,
    ) -> Result<Self, ConfigError> {
        let mut config = if let Some(path) = config_path {
            if !path.exists() {
                return Err(ConfigError::NotFound(path.to_path_buf()));
            }
            Self::load_from_file(path)?
        } else if let Some(discovered) = Self::discover_config() {
            Self::load_from_file(&discovered)?
        } else {
            Self::default_with_base(&std::env::current_dir()?)
        };

        if let Some(settings) = cli_settings {
            config.apply_cli_settings(settings)?;
        }

        if config.input_dirs.is_empty() {
            return Err(ConfigError::Validation(
                "no input directories: add [[input_dirs]] to strata.toml \
                 or create templates/, data/ or content/"
                    .to_owned(),
            ));
        }
        Ok(config)
    }

    /// Apply CLI settings to the configuration.
    ///
    /// Explicit directories replace the configured ones entirely.
    fn apply_cli_settings(&mut self, settings: &CliSettings) -> Result<(), ConfigError> {
        if let Some(build_dir) = &settings.build_dir {
            self.output_dir.clone_from(build_dir);
        }
        if !settings.has_input_dirs() {
            return Ok(());
        }

        let groups = [
            (&settings.template_dirs, "site_templates"),
            (&settings.data_dirs, "site_data"),
            (&settings.content_dirs, "site_content"),
        ];
        let mut input_dirs = Vec::new();
        for (dirs, preset) in groups {
            for dir in dirs {
                if !dir.is_dir() {
                    return Err(ConfigError::Validation(format!(
                        "input directory '{}' does not exist",
                        dir.display()
                    )));
                }
                input_dirs.push(InputDirConfig::with_preset(dir.clone(), preset));
            }
        }
        self.input_dirs = input_dirs;
        Ok(())
    }

    /// Search for config file in current directory and parents.
    fn discover_config() -> Option<PathBuf> {
        let mut current = std::env::current_dir().ok()?;
        loop {
            let candidate = current.join(CONFIG_FILENAME);
            if candidate.exists() {
                return Some(candidate);
            }
            if !current.pop() {
                return None;
            }
        }
    }

    /// Conventional project rooted at `base`: the default directories that exist.
    fn default_with_base(base: &Path) -> Self {
        let input_dirs = DEFAULT_INPUT_DIRS
            .iter()
            .map(|(dir, preset)| (base.join(dir), preset))
            .filter(|(path, _)| path.is_dir())
            .map(|(path, preset)| InputDirConfig::with_preset(path, preset))
            .collect();
        Self {
            output_dir: base.join(DEFAULT_OUTPUT_DIR),
            filetypes: Vec::new(),
            input_dirs,
            config_path: None,
        }
    }

    /// Load configuration from a specific file.
    fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let raw: ConfigRaw = toml::from_str(&content)?;
        let config_dir = path.parent().unwrap_or(Path::new("."));
        let mut config = Self::resolve(raw, config_dir)?;
        config.config_path = Some(path.to_path_buf());
        config.validate()?;
        Ok(config)
    }

    /// Expand variables and make paths relative to the config directory.
    fn resolve(raw: ConfigRaw, config_dir: &Path) -> Result<Self, ConfigError> {
        let output_dir = raw.output_dir.as_deref().unwrap_or(DEFAULT_OUTPUT_DIR);
        require_non_empty(output_dir, "output_dir")?;
        let output_dir = config_dir.join(expand::expand_path(output_dir, "output_dir")?);

        let input_dirs = raw
            .input_dirs
            .into_iter()
            .enumerate()
            .map(|(i, dir)| {
                let field = format!("input_dirs[{i}].path");
                require_non_empty(&dir.path, &field)?;
                Ok(InputDirConfig {
                    path: config_dir.join(expand::expand_path(&dir.path, &field)?),
                    preset: dir.preset,
                    default_action: dir.default_action,
                    actions: dir.actions,
                })
            })
            .collect::<Result<_, ConfigError>>()?;

        Ok(Self {
            output_dir,
            filetypes: raw.filetypes,
            input_dirs,
            config_path: None,
        })
    }

    /// Validate configuration values.
    ///
    /// Filetype references inside action rules are checked later, when the
    /// input directories are built.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Validation` if any validation fails.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.input_dirs.is_empty() {
            return Err(ConfigError::Validation(
                "input_dirs must list at least one directory".to_owned(),
            ));
        }
        for filetype in &self.filetypes {
            filetype.to_def()?;
        }
        for (i, dir) in self.input_dirs.iter().enumerate() {
            if let Some(preset) = &dir.preset {
                Preset::from_name(preset).map_err(|_| {
                    ConfigError::Validation(format!("input_dirs[{i}].preset: unknown preset '{preset}'"))
                })?;
            }
            let actions = dir
                .default_action
                .iter()
                .chain(dir.actions.iter().map(|rule| &rule.action));
            for action in actions {
                Action::from_name(action).map_err(|_| {
                    ConfigError::Validation(format!("input_dirs[{i}]: unknown action '{action}'"))
                })?;
            }
        }
        Ok(())
    }

    /// Built-in filetypes with the configured ones taking priority.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Validation` for invalid filetype definitions.
    pub fn filetype_map(&self) -> Result<FiletypeMap, ConfigError> {
        let defs = self
            .filetypes
            .iter()
            .map(FiletypeConfig::to_def)
            .collect::<Result<Vec<_>, _>>()?;
        let mut map = FiletypeMap::with_presets();
        map.update(&defs).map_err(site_error)?;
        Ok(map)
    }

    /// Input directories ready to merge, in order.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Validation` for missing directories or rules
    /// naming unknown filetypes or actions.
    pub fn input_dirs(&self) -> Result<Vec<InputDir>, ConfigError> {
        let filetypes = Arc::new(self.filetype_map()?);
        self.input_dirs
            .iter()
            .map(|dir| {
                let rules: Vec<ActionRule> = dir
                    .actions
                    .iter()
                    .map(|rule| ActionRule::new(&rule.filetype, &rule.action))
                    .collect();
                InputDir::new(
                    &dir.path,
                    dir.preset.as_deref(),
                    Arc::clone(&filetypes),
                    &rules,
                    dir.default_action.as_deref(),
                )
                .map_err(site_error)
            })
            .collect()
    }
}

impl FiletypeConfig {
    /// Convert to a filetype definition, checking the pattern fields.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Validation` unless exactly one of `extensions`
    /// and `regex` is set and the scope is valid for it.
    pub fn to_def(&self) -> Result<FiletypeDef, ConfigError> {
        require_non_empty(&self.name, "filetypes.name")?;
        let scope = match &self.scope {
            Some(scope) => scope.parse::<PatternScope>().map_err(site_error)?,
            None => PatternScope::Filename,
        };
        match (&self.extensions, &self.regex) {
            (Some(extensions), None) => {
                if scope != PatternScope::Filename {
                    return Err(ConfigError::Validation(format!(
                        "filetype '{}' is defined by extensions, so its scope can only be 'filename'",
                        self.name
                    )));
                }
                let extensions: Vec<&str> = extensions.iter().map(String::as_str).collect();
                Ok(FiletypeDef::extensions(&self.name, &extensions))
            }
            (None, Some(regex)) => Ok(FiletypeDef::regex(&self.name, regex, scope)),
            _ => Err(ConfigError::Validation(format!(
                "filetype '{}' needs exactly one of 'extensions' and 'regex'",
                self.name
            ))),
        }
    }
}

fn site_error(err: SiteError) -> ConfigError {
    match err {
        SiteError::Config(message) => ConfigError::Validation(message),
        other => ConfigError::Validation(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::tempdir;

    fn load_str(toml: &str) -> Result<Config, ConfigError> {
        let dir = tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILENAME);
        fs::write(&path, toml).unwrap();
        Config::load(Some(&path), None)
    }

    // ── parsing ──

    #[test]
    fn test_parse_full_config() {
        let raw: ConfigRaw = toml::from_str(
            r#"
output_dir = "public"

[[filetypes]]
name = "txt"
extensions = [".txt"]

[[filetypes]]
name = "notes"
regex = "^notes/.*"
scope = "relative-path"

[[input_dirs]]
path = "templates"
preset = "site_templates"

[[input_dirs]]
path = "content"
preset = "site_content"
default_action = "ignore"
actions = [{ filetype = "txt", action = "copy" }]
"#,
        )
        .unwrap();
        let config = Config::resolve(raw, Path::new("/project")).unwrap();
        config.validate().unwrap();

        assert_eq!(config.output_dir, PathBuf::from("/project/public"));
        assert_eq!(config.filetypes.len(), 2);
        assert_eq!(config.input_dirs.len(), 2);
        let content = &config.input_dirs[1];
        assert_eq!(content.path, PathBuf::from("/project/content"));
        assert_eq!(content.default_action.as_deref(), Some("ignore"));
        assert_eq!(
            content.actions,
            vec![ActionConfig {
                filetype: "txt".to_owned(),
                action: "copy".to_owned(),
            }]
        );
    }

    #[test]
    fn test_output_dir_defaults_to_build() {
        let raw: ConfigRaw = toml::from_str("[[input_dirs]]\npath = \"content\"\n").unwrap();
        let config = Config::resolve(raw, Path::new("/project")).unwrap();
        assert_eq!(config.output_dir, PathBuf::from("/project/build"));
    }

    #[test]
    fn test_unknown_keys_rejected() {
        let err = toml::from_str::<ConfigRaw>("outptu_dir = \"x\"\n").unwrap_err();
        assert!(err.to_string().contains("outptu_dir"));
    }

    #[test]
    fn test_env_expansion_in_paths() {
        // SAFETY: the variable name is unique to this test
        unsafe {
            std::env::set_var("STRATA_TEST_SITE", "www");
        }
        let raw: ConfigRaw = toml::from_str(
            "output_dir = \"${STRATA_TEST_SITE}/out\"\n\
             [[input_dirs]]\npath = \"${STRATA_TEST_SITE}/content\"\n",
        )
        .unwrap();
        let config = Config::resolve(raw, Path::new("/project")).unwrap();
        assert_eq!(config.output_dir, PathBuf::from("/project/www/out"));
        assert_eq!(config.input_dirs[0].path, PathBuf::from("/project/www/content"));
        unsafe {
            std::env::remove_var("STRATA_TEST_SITE");
        }
    }

    // ── validation ──

    #[test]
    fn test_missing_file() {
        let err = Config::load(Some(Path::new("/nowhere/strata.toml")), None).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound(_)));
    }

    #[test]
    fn test_empty_input_dirs() {
        let err = load_str("output_dir = \"build\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
        assert!(err.to_string().contains("input_dirs"));
    }

    #[test]
    fn test_empty_paths() {
        let err = load_str("output_dir = \"\"\n[[input_dirs]]\npath = \"c\"\n").unwrap_err();
        assert!(err.to_string().contains("output_dir cannot be empty"));
        let err = load_str("[[input_dirs]]\npath = \" \"\n").unwrap_err();
        assert!(err.to_string().contains("input_dirs[0].path cannot be empty"));
    }

    #[test]
    fn test_unknown_preset_and_action() {
        let err = load_str("[[input_dirs]]\npath = \"c\"\npreset = \"blog\"\n").unwrap_err();
        assert!(err.to_string().contains("unknown preset 'blog'"));

        let err = load_str("[[input_dirs]]\npath = \"c\"\ndefault_action = \"publish\"\n")
            .unwrap_err();
        assert!(err.to_string().contains("unknown action 'publish'"));
    }

    #[test]
    fn test_filetype_needs_one_pattern() {
        let both = FiletypeConfig {
            name: "txt".to_owned(),
            extensions: Some(vec![".txt".to_owned()]),
            regex: Some("txt$".to_owned()),
            scope: None,
        };
        assert!(both.to_def().is_err());

        let neither = FiletypeConfig {
            extensions: None,
            regex: None,
            ..both.clone()
        };
        assert!(neither.to_def().is_err());
    }

    #[test]
    fn test_filetype_scopes() {
        let extensions = FiletypeConfig {
            name: "txt".to_owned(),
            extensions: Some(vec!["txt".to_owned()]),
            regex: None,
            scope: Some("relative-path".to_owned()),
        };
        assert!(extensions.to_def().is_err());

        let regex = FiletypeConfig {
            extensions: None,
            regex: Some("^notes/".to_owned()),
            ..extensions.clone()
        };
        assert_eq!(regex.to_def().unwrap().scope, PatternScope::RelativePath);

        let bad_scope = FiletypeConfig {
            scope: Some("path".to_owned()),
            ..regex
        };
        assert!(bad_scope.to_def().is_err());
    }

    // ── defaults and CLI ──

    #[test]
    fn test_default_layout_keeps_existing_dirs() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join("content")).unwrap();
        fs::create_dir(dir.path().join("templates")).unwrap();

        let config = Config::default_with_base(dir.path());
        assert_eq!(config.output_dir, dir.path().join("build"));
        let dirs: Vec<_> = config
            .input_dirs
            .iter()
            .map(|d| (d.path.clone(), d.preset.clone().unwrap()))
            .collect();
        assert_eq!(
            dirs,
            vec![
                (dir.path().join("templates"), "site_templates".to_owned()),
                (dir.path().join("content"), "site_content".to_owned()),
            ]
        );
    }

    #[test]
    fn test_cli_dirs_replace_configured_ones() {
        let dir = tempdir().unwrap();
        for name in ["t", "c1", "c2"] {
            fs::create_dir(dir.path().join(name)).unwrap();
        }
        let mut config = Config::default_with_base(dir.path());
        let settings = CliSettings {
            build_dir: Some(dir.path().join("out")),
            template_dirs: vec![dir.path().join("t")],
            content_dirs: vec![dir.path().join("c1"), dir.path().join("c2")],
            ..Default::default()
        };
        config.apply_cli_settings(&settings).unwrap();

        assert_eq!(config.output_dir, dir.path().join("out"));
        let presets: Vec<_> = config
            .input_dirs
            .iter()
            .map(|d| d.preset.as_deref().unwrap())
            .collect();
        assert_eq!(presets, vec!["site_templates", "site_content", "site_content"]);
    }

    #[test]
    fn test_cli_dir_must_exist() {
        let mut config = Config::default_with_base(Path::new("/project"));
        let settings = CliSettings {
            content_dirs: vec![PathBuf::from("/definitely/missing")],
            ..Default::default()
        };
        let err = config.apply_cli_settings(&settings).unwrap_err();
        assert!(err.to_string().contains("/definitely/missing"));
    }

    #[test]
    fn test_input_dirs_use_configured_filetypes() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join("content")).unwrap();
        let path = dir.path().join(CONFIG_FILENAME);
        fs::write(
            &path,
            r#"
[[filetypes]]
name = "txt"
extensions = [".txt"]

[[input_dirs]]
path = "content"
preset = "site_content"
actions = [{ filetype = "txt", action = "render_without_frontmatter" }]
"#,
        )
        .unwrap();
        let config = Config::load(Some(&path), None).unwrap();
        let dirs = config.input_dirs().unwrap();
        assert_eq!(dirs.len(), 1);
        assert_eq!(
            dirs[0].action_map().action_for("txt"),
            Some(Action::RenderWithoutFrontmatter)
        );
    }

    #[test]
    fn test_unknown_filetype_in_rules() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join("content")).unwrap();
        let path = dir.path().join(CONFIG_FILENAME);
        fs::write(
            &path,
            "[[input_dirs]]\npath = \"content\"\nactions = [{ filetype = \"txt\", action = \"copy\" }]\n",
        )
        .unwrap();
        let config = Config::load(Some(&path), None).unwrap();
        let err = config.input_dirs().unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
        assert!(err.to_string().contains("txt"));
    }
}
