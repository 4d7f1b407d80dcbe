//! Error types for kiln-core.

use std::path::PathBuf;

use thiserror::Error;

use crate::config::ConfigError;

/// Result type for kiln-core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Exit code reported when no child process produced one
/// (spawn failure, fingerprint failure, orchestration I/O).
pub const SENTINEL_EXIT_CODE: i32 = -1;

/// The toolchain stage a failing child process belonged to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    /// Single-invocation compile and link of a whole target.
    Build,
    /// Preprocessor-only run of one source.
    Preprocess,
    /// Compile of one source to an object file.
    Compile,
    /// Link (or archive) of a target's objects.
    Link,
    /// Side build of a replacement executable.
    SelfRebuild,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::Build => "build",
            Stage::Preprocess => "preprocess",
            Stage::Compile => "compile",
            Stage::Link => "link",
            Stage::SelfRebuild => "self-rebuild",
        };
        f.write_str(name)
    }
}

/// Errors that can occur in kiln-core.
#[derive(Debug, Error)]
pub enum Error {
    /// The project manifest could not be loaded or failed validation.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A child process could not be created at all.
    #[error("failed to spawn '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// A child process ran and returned a nonzero exit code.
    #[error("{stage} failed for target '{target}'{}: exit code {exit_code}", source_file.as_ref().map(|s| format!(" ({s})")).unwrap_or_default())]
    StepFailed {
        stage: Stage,
        target: String,
        source_file: Option<String>,
        exit_code: i32,
        stdout: String,
        stderr: String,
    },

    /// A successfully preprocessed output could not be fingerprinted.
    #[error("failed to fingerprint {}: {source}", path.display())]
    Fingerprint {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A toolchain program could not be found on `PATH`.
    #[error("'{program}' not found: {reason}")]
    ToolNotFound { program: String, reason: String },

    /// Self-rebuild could not launch or install the replacement executable.
    #[error("self-rebuild error: {0}")]
    Bootstrap(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Process exit code a whole run should report for this error.
    ///
    /// Step failures carry the failing child's own code; everything that
    /// never got a child exit code maps to [`SENTINEL_EXIT_CODE`].
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::StepFailed { exit_code, .. } => *exit_code,
            _ => SENTINEL_EXIT_CODE,
        }
    }

    /// Captured (stdout, stderr) of the failing child, if any.
    pub fn captured_output(&self) -> Option<(&str, &str)> {
        match self {
            Error::StepFailed { stdout, stderr, .. } => Some((stdout, stderr)),
            _ => None,
        }
    }
}
