//! `kiln.toml` loading.
//!
//! The manifest is a thin serde layer over [`Project`]: relative paths are
//! resolved against the manifest's directory, `source_dirs` are expanded into
//! concrete source lists, and the resulting project is validated before it is
//! handed out.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use super::discover::{SourceDir, find_sources};
use super::error::ConfigError;
use super::types::{CompileOptions, Project, Target, TargetKind, Toolchain, WarningId};

/// Default manifest file name.
pub const MANIFEST_FILE: &str = "kiln.toml";

/// A loaded manifest: the project plus the optional self-rebuild section.
#[derive(Debug, Clone)]
pub struct Manifest {
    pub project: Project,
    pub bootstrap: Option<BootstrapConfig>,
}

/// How the orchestrator rebuilds its own executable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapConfig {
    /// Sources whose timestamps are compared against the executable.
    pub sources: Vec<PathBuf>,
    /// Executable to keep fresh; the running executable when `None`.
    pub executable: Option<PathBuf>,
    pub recipe: RebuildRecipe,
}

/// The side build that produces a replacement executable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RebuildRecipe {
    /// Explicit command tokens; `{output}` is replaced with the side path.
    Command(Vec<String>),
    /// A target built with the project's settings in a single invocation.
    Target(Box<Target>),
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawManifest {
    project: RawProject,
    #[serde(default, rename = "target")]
    targets: Vec<RawTarget>,
    #[serde(default)]
    bootstrap: Option<RawBootstrap>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawProject {
    name: String,
    #[serde(default = "default_bin_dir")]
    bin_dir: PathBuf,
    #[serde(default)]
    obj_dir: Option<PathBuf>,
    #[serde(default)]
    common_defines: Vec<String>,
    #[serde(default)]
    options: CompileOptions,
    #[serde(default)]
    toolchain: Toolchain,
}

fn default_bin_dir() -> PathBuf {
    PathBuf::from("bin")
}

fn default_kind() -> TargetKind {
    TargetKind::Executable
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawTarget {
    name: String,
    #[serde(default = "default_kind")]
    kind: TargetKind,
    #[serde(default)]
    warning_level: u8,
    #[serde(default)]
    warnings_as_errors: bool,
    #[serde(default)]
    warnings_to_ignore: Vec<WarningId>,
    #[serde(default)]
    defines: Vec<String>,
    #[serde(default)]
    include_dirs: Vec<PathBuf>,
    #[serde(default)]
    sources: Vec<PathBuf>,
    #[serde(default)]
    source_dirs: Vec<SourceDir>,
    #[serde(default)]
    link_libs: Vec<String>,
    #[serde(default)]
    link_dir: Option<PathBuf>,
    #[serde(default)]
    subsystem: Option<String>,
    #[serde(default)]
    entry_point: Option<String>,
    #[serde(default)]
    ignore_standard_includes: bool,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawBootstrap {
    sources: Vec<PathBuf>,
    #[serde(default)]
    executable: Option<PathBuf>,
    #[serde(default)]
    command: Option<Vec<String>>,
    #[serde(default)]
    target: Option<RawTarget>,
}

/// Load and validate a manifest file.
pub fn load_manifest(path: &Path) -> Result<Manifest, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let base = path.parent().unwrap_or(Path::new(""));
    load_manifest_from_str(&content, base)
}

/// Parse and validate manifest text, resolving relative paths against `base`.
///
/// Useful for testing without a manifest file on disk.
pub fn load_manifest_from_str(content: &str, base: &Path) -> Result<Manifest, ConfigError> {
    let raw: RawManifest =
        toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;

    let bin_dir = resolve(base, &raw.project.bin_dir);
    let obj_dir = match &raw.project.obj_dir {
        Some(dir) => resolve(base, dir),
        None => bin_dir.join("int"),
    };

    let targets = raw
        .targets
        .into_iter()
        .map(|t| convert_target(base, t))
        .collect::<Result<Vec<_>, _>>()?;

    let project = Project {
        name: raw.project.name,
        bin_dir,
        obj_dir,
        options: raw.project.options,
        toolchain: raw.project.toolchain,
        common_defines: raw.project.common_defines,
        targets,
    };
    project.validate()?;

    let bootstrap = raw
        .bootstrap
        .map(|b| convert_bootstrap(base, b))
        .transpose()?;

    Ok(Manifest { project, bootstrap })
}

fn resolve(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

fn convert_target(base: &Path, raw: RawTarget) -> Result<Target, ConfigError> {
    let mut src_files: Vec<PathBuf> = raw.sources.iter().map(|p| resolve(base, p)).collect();
    for dir in &raw.source_dirs {
        src_files.extend(find_sources(base, dir)?);
    }
    let mut seen = HashSet::new();
    src_files.retain(|p| seen.insert(p.clone()));

    Ok(Target {
        name: raw.name,
        kind: raw.kind,
        warning_level: raw.warning_level,
        warnings_as_errors: raw.warnings_as_errors,
        warnings_to_ignore: raw.warnings_to_ignore,
        defines: raw.defines,
        include_dirs: raw.include_dirs.iter().map(|p| resolve(base, p)).collect(),
        src_files,
        link_libs: raw.link_libs,
        link_dir: raw.link_dir.map(|p| resolve(base, &p)),
        subsystem: raw.subsystem,
        entry_point: raw.entry_point,
        ignore_standard_includes: raw.ignore_standard_includes,
    })
}

fn convert_bootstrap(base: &Path, raw: RawBootstrap) -> Result<BootstrapConfig, ConfigError> {
    if raw.sources.is_empty() {
        return Err(ConfigError::Validation(
            "bootstrap.sources must not be empty".to_string(),
        ));
    }
    let recipe = match (raw.command, raw.target) {
        (Some(command), None) => {
            if command.is_empty() {
                return Err(ConfigError::Validation(
                    "bootstrap.command must not be empty".to_string(),
                ));
            }
            RebuildRecipe::Command(command)
        }
        (None, Some(target)) => {
            let target = convert_target(base, target)?;
            if target.kind != TargetKind::Executable {
                return Err(ConfigError::Validation(
                    "bootstrap.target must be an executable".to_string(),
                ));
            }
            RebuildRecipe::Target(Box::new(target))
        }
        _ => {
            return Err(ConfigError::Validation(
                "bootstrap needs exactly one of `command` or `target`".to_string(),
            ));
        }
    };

    Ok(BootstrapConfig {
        sources: raw.sources.iter().map(|p| resolve(base, p)).collect(),
        executable: raw.executable.map(|p| resolve(base, &p)),
        recipe,
    })
}
