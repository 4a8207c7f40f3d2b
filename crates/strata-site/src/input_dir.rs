//! Input directories: a path plus the rules to process it.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use regex::Regex;

use crate::action::Action;
use crate::action_map::{ActionMap, ActionRule, Preset};
use crate::error::SiteError;
use crate::filetype::FiletypeMap;

/// Names matching these patterns never become nodes: hidden and underscore names.
const DEFAULT_IGNORE_PATTERNS: &[&str] = &[r"^\.", r"^_"];

/// A directory to merge into the site, with its action map.
#[derive(Clone, Debug)]
pub struct InputDir {
    path: PathBuf,
    action_map: ActionMap,
    ignore_patterns: Vec<Regex>,
}

impl InputDir {
    /// Create an input directory.
    ///
    /// Rules are layered so that later layers win on the same filetype:
    /// the preset, then the user's `actions` and `default_action`, then the
    /// base rules for underscore files, virtual nodes and directories.
    ///
    /// # Errors
    ///
    /// Returns [`SiteError::Config`] if the path is not a directory or a
    /// preset, filetype or action name is unknown.
    pub fn new(
        path: impl Into<PathBuf>,
        preset: Option<&str>,
        filetypes: Arc<FiletypeMap>,
        actions: &[ActionRule],
        default_action: Option<&str>,
    ) -> Result<Self, SiteError> {
        let path = path.into();
        if !path.is_dir() {
            return Err(SiteError::Config(format!(
                "The path '{}' doesn't exist, is not readable or is not a directory.",
                path.display()
            )));
        }

        let mut action_map = ActionMap::new(filetypes);

        if let Some(name) = preset {
            let preset = Preset::from_name(name)?;
            action_map.update_actions(&preset.rules())?;
            if let Some(action) = preset.default_action() {
                action_map.set_default_action(action);
            }
        }

        action_map.update_actions(actions)?;
        if let Some(name) = default_action {
            action_map.update_default_action(name)?;
        }

        action_map.update_actions(&Preset::Base.rules())?;

        let ignore_patterns = DEFAULT_IGNORE_PATTERNS
            .iter()
            .map(|p| Regex::new(p))
            .collect::<Result<_, _>>()
            .map_err(|e| SiteError::Config(e.to_string()))?;

        Ok(Self {
            path,
            action_map,
            ignore_patterns,
        })
    }

    /// Input directory using a preset and the built-in filetypes.
    ///
    /// # Errors
    ///
    /// See [`InputDir::new`].
    pub fn with_preset(path: impl Into<PathBuf>, preset: &str) -> Result<Self, SiteError> {
        Self::new(
            path,
            Some(preset),
            Arc::new(FiletypeMap::with_presets()),
            &[],
            None,
        )
    }

    /// Replace the ignore patterns (regexes matched against file names).
    ///
    /// # Errors
    ///
    /// Returns [`SiteError::Config`] for invalid regexes.
    pub fn with_ignore_patterns(mut self, patterns: &[&str]) -> Result<Self, SiteError> {
        self.ignore_patterns = patterns
            .iter()
            .map(|p| {
                Regex::new(p).map_err(|e| {
                    SiteError::Config(format!("Invalid ignore pattern '{p}': {e}"))
                })
            })
            .collect::<Result<_, _>>()?;
        Ok(self)
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn action_map(&self) -> &ActionMap {
        &self.action_map
    }

    /// Whether HTML files here are templates for other pages.
    #[must_use]
    pub fn is_template_dir(&self) -> bool {
        self.action_map.uses(Action::UseAsTemplate)
    }

    pub(crate) fn is_ignored(&self, name: &str) -> bool {
        self.ignore_patterns.iter().any(|p| p.is_match(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    #[test]
    fn test_missing_directory() {
        let err = InputDir::with_preset("/definitely/not/here", "site_content").unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Config);
    }

    #[test]
    fn test_base_rules_win_over_user_rules() {
        let dir = tempdir().unwrap();
        let input = InputDir::new(
            dir.path(),
            Some("site_content"),
            Arc::new(FiletypeMap::with_presets()),
            &[ActionRule::new(crate::filetype::DIR, "copy")],
            None,
        )
        .unwrap();
        assert_eq!(
            input.action_map().get_action(Path::new("docs"), true),
            Action::CreateDir
        );
    }

    #[test]
    fn test_user_rules_win_over_preset() {
        let dir = tempdir().unwrap();
        let input = InputDir::new(
            dir.path(),
            Some("site_content"),
            Arc::new(FiletypeMap::with_presets()),
            &[ActionRule::new("html", "render")],
            Some("ignore"),
        )
        .unwrap();
        let map = input.action_map();
        assert_eq!(map.get_action(Path::new("a.html"), false), Action::Render);
        assert_eq!(map.get_action(Path::new("a.bin"), false), Action::Ignore);
    }

    #[test]
    fn test_template_dir_detection() {
        let dir = tempdir().unwrap();
        assert!(InputDir::with_preset(dir.path(), "site_templates").unwrap().is_template_dir());
        assert!(!InputDir::with_preset(dir.path(), "site_content").unwrap().is_template_dir());
    }

    #[test]
    fn test_hidden_and_underscore_names_ignored_by_default() {
        let dir = tempdir().unwrap();
        let input = InputDir::with_preset(dir.path(), "site_data").unwrap();
        assert!(input.is_ignored(".DS_Store"));
        assert!(input.is_ignored("_partials"));
        assert!(!input.is_ignored("logo.png"));

        let input = input.with_ignore_patterns(&["^draft-"]).unwrap();
        assert!(input.is_ignored("draft-post.md"));
        assert!(!input.is_ignored(".git"));
    }
}
