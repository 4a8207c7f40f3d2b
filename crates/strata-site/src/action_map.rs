//! Filetype to action mapping and the built-in presets.

use std::path::Path;
use std::sync::Arc;

use crate::action::Action;
use crate::error::SiteError;
use crate::filetype::{self, FiletypeMap};

/// A `filetype → action` rule, by name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ActionRule {
    pub filetype: String,
    pub action: String,
}

impl ActionRule {
    pub fn new(filetype: &str, action: &str) -> Self {
        Self {
            filetype: filetype.to_owned(),
            action: action.to_owned(),
        }
    }
}

/// Named bundle of rules plus an optional default action.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Preset {
    /// Rules every input directory gets last: underscore files, virtual nodes, directories.
    Base,
    SiteContent,
    SiteTemplates,
    SiteData,
}

impl Preset {
    const ALL: [Self; 4] = [
        Self::Base,
        Self::SiteContent,
        Self::SiteTemplates,
        Self::SiteData,
    ];

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Base => "base",
            Self::SiteContent => "site_content",
            Self::SiteTemplates => "site_templates",
            Self::SiteData => "site_data",
        }
    }

    /// Look up a preset by name.
    ///
    /// # Errors
    ///
    /// Returns [`SiteError::Config`] for unknown names.
    pub fn from_name(name: &str) -> Result<Self, SiteError> {
        Self::ALL
            .into_iter()
            .find(|p| p.name() == name)
            .ok_or_else(|| {
                let known: Vec<_> = Self::ALL.iter().map(|p| p.name()).collect();
                SiteError::Config(format!(
                    "Preset '{name}' is not defined. Use one of: {}.",
                    known.join(", ")
                ))
            })
    }

    /// Rules of this preset.
    #[must_use]
    pub fn rules(self) -> Vec<ActionRule> {
        let pairs: &[(&str, &str)] = match self {
            Self::Base => &[
                (filetype::UNDERSCORE_FILE, "ignore"),
                (filetype::VIRTUAL_NODE, "virtual_node"),
                (filetype::DIR, "create_dir"),
            ],
            Self::SiteContent => &[
                ("html", "html_to_html"),
                ("md", "md_to_html"),
                ("rst", "rst_to_html"),
                ("json", "json_to_html"),
                ("yaml", "yaml_to_html"),
                ("sass", "sass_to_css"),
            ],
            Self::SiteTemplates => &[
                ("html", "use_as_template"),
                ("md", "md_to_html"),
                ("rst", "rst_to_html"),
                ("json", "json_to_html"),
                ("yaml", "yaml_to_html"),
                ("sass", "sass_to_css"),
            ],
            Self::SiteData => &[],
        };
        pairs
            .iter()
            .map(|(filetype, action)| ActionRule::new(filetype, action))
            .collect()
    }

    /// Default action of this preset, if it sets one.
    #[must_use]
    pub fn default_action(self) -> Option<Action> {
        match self {
            Self::Base => None,
            Self::SiteContent | Self::SiteTemplates | Self::SiteData => Some(Action::Copy),
        }
    }
}

/// Maps filetypes to actions (many to one).
///
/// Rules are kept in priority order: the most recent [`update_actions`]
/// call comes first.
///
/// [`update_actions`]: Self::update_actions
#[derive(Clone, Debug)]
pub struct ActionMap {
    filetypes: Arc<FiletypeMap>,
    rules: Vec<(String, Action)>,
    default_action: Action,
}

impl ActionMap {
    /// Empty map whose default action is `ignore`.
    #[must_use]
    pub fn new(filetypes: Arc<FiletypeMap>) -> Self {
        Self {
            filetypes,
            rules: Vec::new(),
            default_action: Action::Ignore,
        }
    }

    /// Merge new rules over the existing ones.
    ///
    /// # Errors
    ///
    /// Returns [`SiteError::Config`] if a rule names an unknown filetype or action.
    pub fn update_actions(&mut self, rules: &[ActionRule]) -> Result<(), SiteError> {
        if rules.is_empty() {
            return Ok(());
        }

        let mut updated: Vec<(String, Action)> = Vec::with_capacity(rules.len() + self.rules.len());
        for rule in rules {
            let action = Action::from_name(&rule.action)?;
            if !self.filetypes.contains(&rule.filetype) {
                return Err(SiteError::Config(format!(
                    "Filetype '{}' is not defined.",
                    rule.filetype
                )));
            }
            updated.retain(|(name, _)| name != &rule.filetype);
            updated.push((rule.filetype.clone(), action));
        }

        // keep earlier rules that were not overridden, after the new ones
        for (name, action) in self.rules.drain(..) {
            if !updated.iter().any(|(n, _)| n == &name) {
                updated.push((name, action));
            }
        }
        self.rules = updated;
        Ok(())
    }

    /// Replace the default action by name.
    ///
    /// # Errors
    ///
    /// Returns [`SiteError::Config`] for unknown action names.
    pub fn update_default_action(&mut self, name: &str) -> Result<(), SiteError> {
        self.default_action = Action::from_name(name)?;
        Ok(())
    }

    pub(crate) fn set_default_action(&mut self, action: Action) {
        self.default_action = action;
    }

    #[must_use]
    pub fn default_action(&self) -> Action {
        self.default_action
    }

    /// Action mapped to a filetype name, without the default fallback.
    #[must_use]
    pub fn action_for(&self, filetype: &str) -> Option<Action> {
        self.rules
            .iter()
            .find(|(name, _)| name == filetype)
            .map(|&(_, action)| action)
    }

    /// Whether any rule maps to `action`.
    #[must_use]
    pub fn uses(&self, action: Action) -> bool {
        self.rules.iter().any(|&(_, a)| a == action)
    }

    /// Resolve the action for a path relative to its input directory.
    #[must_use]
    pub fn get_action(&self, relative_path: &Path, is_dir: bool) -> Action {
        self.filetypes
            .classify(relative_path, is_dir)
            .and_then(|name| self.action_for(name))
            .unwrap_or(self.default_action)
    }

    #[must_use]
    pub fn filetypes(&self) -> &FiletypeMap {
        &self.filetypes
    }
}
