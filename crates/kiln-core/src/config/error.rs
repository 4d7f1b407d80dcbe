//! Error types for manifest loading and project validation.

use std::path::PathBuf;

/// Errors that can occur when loading or validating a `kiln.toml` manifest.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The manifest file could not be read.
    #[error("failed to read manifest {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse manifest: {0}")]
    Parse(String),

    /// A source directory could not be walked.
    #[error("failed to scan source directory {}: {reason}", dir.display())]
    Discovery { dir: PathBuf, reason: String },

    /// A target name was requested that the project does not declare.
    #[error("unknown target '{0}'")]
    UnknownTarget(String),

    /// A configuration value failed validation.
    #[error("validation error: {0}")]
    Validation(String),
}
