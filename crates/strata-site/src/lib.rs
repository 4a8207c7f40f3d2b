//! Layered site tree, value inheritance and build pipeline for Strata.
//!
//! This crate provides:
//! - [`InputDir`]: a source directory with its filetype → action rules
//! - [`Site`]: the merged node tree and the passes that build it
//! - [`Value`]: scoped value declarations and their merge operations
//!
//! # Quick Start
//!
//! ```no_run
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use strata_site::{InputDir, Site};
//!
//! let mut site = Site::new("build", false);
//! site.from_directory(&InputDir::with_preset("templates", "site_templates")?)?;
//! site.from_directory(&InputDir::with_preset("content", "site_content")?)?;
//!
//! let stats = site.generate()?;
//! println!("{} files written", stats.built);
//! # Ok(())
//! # }
//! ```

mod action;
mod action_map;
mod error;
mod filetype;
mod frontmatter;
mod input_dir;
pub mod markup;
mod node;
mod site;
mod template;
mod value;

pub use action::{Action, Extraction};
pub use action_map::{ActionMap, ActionRule, Preset};
pub use error::{ErrorKind, SiteError};
pub use filetype::{FiletypeDef, FiletypeMap, FiletypePattern, PatternScope};
pub use frontmatter::FrontmatterError;
pub use input_dir::InputDir;
pub use markup::TocEntry;
pub use node::{INDEX_NAME, Node, NodeId};
pub use site::{BuildStats, Site};
pub use template::Templates;
pub use value::{Data, Op, Operation, Scope, ScopedValues, Value, ValueError, reserved_keys};
