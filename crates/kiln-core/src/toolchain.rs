//! Locating toolchain programs on `PATH`.

use std::path::PathBuf;

use crate::command::{archiver_program, compiler_program};
use crate::config::{Dialect, Project, TargetKind};
use crate::error::{Error, Result};

/// Absolute locations of the programs a project will run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedToolchain {
    pub dialect: Dialect,
    pub compiler: PathBuf,
    /// Only looked up when some target is a static library.
    pub archiver: Option<PathBuf>,
}

impl ResolvedToolchain {
    /// Find the compiler (and archiver, if needed) for `project`.
    pub fn locate(project: &Project) -> Result<Self> {
        let compiler = find(&compiler_program(project))?;
        let needs_archiver = project
            .targets
            .iter()
            .any(|t| t.kind == TargetKind::StaticLibrary);
        let archiver = if needs_archiver {
            Some(find(&archiver_program(project))?)
        } else {
            None
        };

        Ok(Self {
            dialect: project.toolchain.dialect,
            compiler,
            archiver,
        })
    }
}

fn find(program: &str) -> Result<PathBuf> {
    let path = which::which(program).map_err(|e| Error::ToolNotFound {
        program: program.to_string(),
        reason: e.to_string(),
    })?;
    tracing::debug!("Found {} at {}", program, path.display());
    Ok(path)
}
