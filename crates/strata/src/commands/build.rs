//! `strata build` command implementation.

use std::path::PathBuf;

use clap::{ArgAction, Args};
use strata_config::{CliSettings, Config};
use strata_site::Site;

use crate::error::CliError;
use crate::output::Output;

/// Arguments for the build command.
#[derive(Args)]
pub(crate) struct BuildArgs {
    /// Path to configuration file (default: auto-discover strata.toml).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Output directory (overrides config).
    #[arg(short, long)]
    build_dir: Option<PathBuf>,

    /// Content directory; repeat to layer several (replaces configured input dirs).
    #[arg(short, long = "content-dir")]
    content_dir: Vec<PathBuf>,

    /// Template directory; repeat to layer several (replaces configured input dirs).
    #[arg(short, long = "template-dir")]
    template_dir: Vec<PathBuf>,

    /// Data directory; repeat to layer several (replaces configured input dirs).
    #[arg(short, long = "data-dir")]
    data_dir: Vec<PathBuf>,

    /// Only rewrite files whose source is newer than the output.
    #[arg(long)]
    only_modified: bool,

    /// Increase log verbosity (-v info, -vv debug).
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

impl BuildArgs {
    /// Execute the build command.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration fails or any build pass fails.
    pub(crate) fn execute(self) -> Result<(), CliError> {
        let output = Output::new();

        let cli_settings = CliSettings {
            build_dir: self.build_dir,
            template_dirs: self.template_dir,
            data_dirs: self.data_dir,
            content_dirs: self.content_dir,
        };
        let config = Config::load(self.config.as_deref(), Some(&cli_settings))?;
        let input_dirs = config.input_dirs()?;

        if let Some(path) = &config.config_path {
            output.detail(&format!("Config: {}", path.display()));
        }
        output.info(&format!("Building site into {}", config.output_dir.display()));

        let mut site = Site::new(&config.output_dir, self.only_modified);
        for input in &input_dirs {
            output.detail(&format!("  {}", input.path().display()));
            site.from_directory(input)?;
        }
        let stats = site.generate()?;
        site.display_tree();

        let mut summary = format!("Built {} files", stats.built);
        if stats.skipped > 0 {
            summary.push_str(&format!(", {} up to date", stats.skipped));
        }
        output.success(&summary);
        Ok(())
    }

    /// Log filter directive selected by `-v`.
    pub(crate) fn log_level(&self) -> Option<&'static str> {
        match self.verbose {
            0 => None,
            1 => Some("info"),
            _ => Some("debug"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use pretty_assertions::assert_eq;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        args: BuildArgs,
    }

    fn parse(args: &[&str]) -> BuildArgs {
        TestCli::parse_from(std::iter::once("strata").chain(args.iter().copied())).args
    }

    #[test]
    fn test_repeatable_dirs() {
        let args = parse(&["-c", "a", "--content-dir", "b", "-t", "tpl", "-d", "data"]);
        assert_eq!(args.content_dir, vec![PathBuf::from("a"), PathBuf::from("b")]);
        assert_eq!(args.template_dir, vec![PathBuf::from("tpl")]);
        assert_eq!(args.data_dir, vec![PathBuf::from("data")]);
    }

    #[test]
    fn test_verbosity_levels() {
        assert_eq!(parse(&[]).log_level(), None);
        assert_eq!(parse(&["-v"]).log_level(), Some("info"));
        assert_eq!(parse(&["-vv"]).log_level(), Some("debug"));
    }

    #[test]
    fn test_build_flags() {
        let args = parse(&["-b", "out", "--only-modified", "--config", "site.toml"]);
        assert_eq!(args.build_dir, Some(PathBuf::from("out")));
        assert!(args.only_modified);
        assert_eq!(args.config, Some(PathBuf::from("site.toml")));
    }
}
