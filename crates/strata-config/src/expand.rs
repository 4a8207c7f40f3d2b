//! Environment and home directory expansion for configured paths.

use std::path::PathBuf;

use crate::ConfigError;

/// Unset variable reported by the lookup context.
struct MissingVar(String);

/// Expand `${VAR}`, `${VAR:-default}` and a leading `~` in a path string.
///
/// Strings without `${` or a leading `~` are returned as they are, so a
/// literal `$` in a directory name survives.
pub(crate) fn expand_path(value: &str, field: &str) -> Result<PathBuf, ConfigError> {
    if !value.contains("${") && !value.starts_with('~') {
        return Ok(PathBuf::from(value));
    }

    let home = || std::env::var("HOME").ok();
    let lookup = |var: &str| match std::env::var(var) {
        Ok(val) => Ok(Some(val)),
        Err(_) => Err(MissingVar(var.to_owned())),
    };
    shellexpand::full_with_context(value, home, lookup)
        .map(|expanded| PathBuf::from(expanded.into_owned()))
        .map_err(|e| ConfigError::EnvVar {
            field: field.to_owned(),
            message: format!("${{{}}} not set", e.cause.0),
        })
}
