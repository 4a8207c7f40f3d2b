//! Error types for site construction and building.
//!
//! Every variant that concerns a single source file carries its path so the
//! user can locate the fix without knowing the pipeline internals.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

/// Broad category of a [`SiteError`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// Invalid action, filetype or classification rule. Raised before any tree is built.
    Config,
    /// Ambiguous inputs, malformed frontmatter or values files, broken value declarations.
    Read,
    /// Invalid sort options, merge/append type mismatches, failed lookups.
    Value,
    /// Template rendering, markup conversion or output write failures.
    Write,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Config => "configuration",
            Self::Read => "read",
            Self::Value => "value",
            Self::Write => "write",
        };
        f.write_str(name)
    }
}

/// Error returned by every fallible site operation.
#[derive(Debug, thiserror::Error)]
pub enum SiteError {
    /// The user supplied an invalid piece of configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Two files from the same input directory map to one output file.
    #[error(
        "Ambiguous input: both '{}' and '{}' at '{}' would generate '{}'. \
         Keep only one input file for each output file.",
        first.display(),
        second.display(),
        root.display(),
        output.display()
    )]
    Ambiguous {
        /// Input directory both files belong to.
        root: PathBuf,
        /// Source path of the node registered first.
        first: PathBuf,
        /// Source path of the node that collided with it.
        second: PathBuf,
        /// Output path both would produce.
        output: PathBuf,
    },

    /// A source file could not be read or parsed into values.
    #[error("{}: {message}", path.display())]
    Read {
        /// Offending source path.
        path: PathBuf,
        /// What went wrong.
        message: String,
    },

    /// A value could not be applied or resolved.
    #[error("{}: {message}", path.display())]
    Value {
        /// Source path of the node whose values failed.
        path: PathBuf,
        /// What went wrong.
        message: String,
    },

    /// Rendering or writing an output file failed.
    #[error("{}: {message}", path.display())]
    Write {
        /// Source path of the node being rendered.
        path: PathBuf,
        /// What went wrong, including template context when available.
        message: String,
    },

    /// Filesystem error while reading sources or writing outputs.
    #[error("{}: {source}", path.display())]
    Io {
        /// Path the operation was performed on.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// A pass was started before any input directory was added.
    #[error("Site not initialized yet. Add an input directory with Site::from_directory first.")]
    NotInitialized,
}

impl SiteError {
    pub(crate) fn read(path: &Path, message: impl Into<String>) -> Self {
        Self::Read {
            path: path.to_path_buf(),
            message: message.into(),
        }
    }

    pub(crate) fn value(path: &Path, message: impl Into<String>) -> Self {
        Self::Value {
            path: path.to_path_buf(),
            message: message.into(),
        }
    }

    pub(crate) fn write(path: &Path, message: impl Into<String>) -> Self {
        Self::Write {
            path: path.to_path_buf(),
            message: message.into(),
        }
    }

    pub(crate) fn io(path: &Path, source: io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    /// Category of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Config(_) => ErrorKind::Config,
            Self::Ambiguous { .. } | Self::Read { .. } | Self::NotInitialized => ErrorKind::Read,
            Self::Value { .. } => ErrorKind::Value,
            Self::Write { .. } | Self::Io { .. } => ErrorKind::Write,
        }
    }

    /// Source path the error refers to, if any.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::Ambiguous { second, .. } => Some(second),
            Self::Read { path, .. }
            | Self::Value { path, .. }
            | Self::Write { path, .. }
            | Self::Io { path, .. } => Some(path),
            Self::Config(_) | Self::NotInitialized => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_path() {
        let err = SiteError::value(Path::new("content/docs"), "invalid sorting field 'size'");
        assert_eq!(err.to_string(), "content/docs: invalid sorting field 'size'");
        assert_eq!(err.kind(), ErrorKind::Value);
    }

    #[test]
    fn test_ambiguous_is_read_error() {
        let err = SiteError::Ambiguous {
            root: PathBuf::from("content"),
            first: PathBuf::from("foo.md"),
            second: PathBuf::from("foo.html"),
            output: PathBuf::from("foo.html"),
        };
        assert_eq!(err.kind(), ErrorKind::Read);
        assert_eq!(err.path(), Some(Path::new("foo.html")));
        assert!(err.to_string().contains("'foo.md'"));
    }

    #[test]
    fn test_io_error_is_write_kind() {
        let err = SiteError::io(
            Path::new("build/foo.html"),
            io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        );
        assert_eq!(err.kind(), ErrorKind::Write);
        assert_eq!(err.to_string(), "build/foo.html: denied");
    }
}
