//! Project and target model.
//!
//! Pure data plus invariant validation. Nothing here spawns processes or
//! builds command lines; see [`crate::command`] for that.

use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::error::ConfigError;

/// Kind of artifact a target produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetKind {
    #[serde(alias = "exe")]
    Executable,
    #[serde(alias = "shared", alias = "dll")]
    SharedLibrary,
    #[serde(alias = "static", alias = "lib")]
    StaticLibrary,
}

/// C-family language a project is compiled as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Language {
    #[serde(rename = "c")]
    C,
    #[serde(rename = "c++", alias = "cpp")]
    Cpp,
}

/// Language standard, e.g. C++14 or C11.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LanguageStandard {
    pub language: Language,
    pub version: u32,
}

impl Default for LanguageStandard {
    fn default() -> Self {
        Self {
            language: Language::Cpp,
            version: 14,
        }
    }
}

impl fmt::Display for LanguageStandard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.language {
            Language::C => write!(f, "c{}", self.version),
            Language::Cpp => write!(f, "c++{}", self.version),
        }
    }
}

/// Command-line flag spelling family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    /// `cl.exe` / `lib.exe`.
    Msvc,
    /// gcc / clang with `ar`.
    Gnu,
}

impl Default for Dialect {
    fn default() -> Self {
        if cfg!(target_env = "msvc") {
            Dialect::Msvc
        } else {
            Dialect::Gnu
        }
    }
}

/// Which toolchain to drive, with optional program overrides.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Toolchain {
    pub dialect: Dialect,
    /// Compiler driver program; the dialect's default when `None`.
    pub compiler: Option<String>,
    /// Static-library archiver program; the dialect's default when `None`.
    pub archiver: Option<String>,
}

/// Project-global compile and link options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompileOptions {
    /// Debug runtime and `_DEBUG` semantics.
    pub debug_build: bool,
    /// Optimization level (0-3). 0 disables optimization.
    pub opt_level: u8,
    /// Enable compiler intrinsics.
    pub opt_intrinsics: bool,
    /// Emit debug info into objects.
    pub generate_debug_info: bool,
    /// Link the C/C++ runtime statically.
    pub static_runtime: bool,
    /// Ask the linker for incremental linking.
    pub incremental_link: bool,
    /// Strip unreferenced functions and data at link time.
    pub remove_unreferenced: bool,
    pub standard: LanguageStandard,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            debug_build: false,
            opt_level: 0,
            opt_intrinsics: false,
            generate_debug_info: true,
            static_runtime: false,
            incremental_link: false,
            remove_unreferenced: true,
            standard: LanguageStandard::default(),
        }
    }
}

/// A warning to suppress: a numeric code (`4100`) or a named warning
/// (`unused-parameter`), depending on the toolchain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WarningId {
    Code(u32),
    Name(String),
}

impl fmt::Display for WarningId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WarningId::Code(code) => write!(f, "{code}"),
            WarningId::Name(name) => f.write_str(name),
        }
    }
}

impl From<u32> for WarningId {
    fn from(code: u32) -> Self {
        WarningId::Code(code)
    }
}

impl From<&str> for WarningId {
    fn from(name: &str) -> Self {
        WarningId::Name(name.to_string())
    }
}

/// Subsystem used for executables that don't name one.
pub const DEFAULT_SUBSYSTEM: &str = "console";

/// One buildable artifact within a project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Target {
    pub name: String,
    pub kind: TargetKind,
    /// Warning level, 0-4.
    pub warning_level: u8,
    pub warnings_as_errors: bool,
    /// Emitted as one suppression flag each, in order.
    pub warnings_to_ignore: Vec<WarningId>,
    /// Appended after the project's common defines, so later entries win.
    pub defines: Vec<String>,
    pub include_dirs: Vec<PathBuf>,
    /// Translation units, in build order.
    pub src_files: Vec<PathBuf>,
    pub link_libs: Vec<String>,
    pub link_dir: Option<PathBuf>,
    /// Only meaningful for executables.
    pub subsystem: Option<String>,
    pub entry_point: Option<String>,
    pub ignore_standard_includes: bool,
}

impl Target {
    /// Create a target with no sources and default settings.
    pub fn new(name: impl Into<String>, kind: TargetKind) -> Self {
        Self {
            name: name.into(),
            kind,
            warning_level: 0,
            warnings_as_errors: false,
            warnings_to_ignore: Vec::new(),
            defines: Vec::new(),
            include_dirs: Vec::new(),
            src_files: Vec::new(),
            link_libs: Vec::new(),
            link_dir: None,
            subsystem: None,
            entry_point: None,
            ignore_standard_includes: false,
        }
    }

    /// Subsystem to hand the linker, upper-cased.
    pub fn subsystem_upper(&self) -> String {
        self.subsystem
            .as_deref()
            .unwrap_or(DEFAULT_SUBSYSTEM)
            .to_uppercase()
    }
}

/// A collection of targets sharing output directories and global options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Project {
    pub name: String,
    /// Final binaries land here.
    pub bin_dir: PathBuf,
    /// Objects, preprocessed files and fingerprint tables land here.
    pub obj_dir: PathBuf,
    pub options: CompileOptions,
    pub toolchain: Toolchain,
    pub common_defines: Vec<String>,
    /// Built in declaration order.
    pub targets: Vec<Target>,
}

impl Project {
    /// Create an empty project with `bin` / `bin/int` output directories.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            bin_dir: PathBuf::from("bin"),
            obj_dir: Path::new("bin").join("int"),
            options: CompileOptions::default(),
            toolchain: Toolchain::default(),
            common_defines: Vec::new(),
            targets: Vec::new(),
        }
    }

    /// Look up a target by name.
    pub fn target(&self, name: &str) -> Option<&Target> {
        self.targets.iter().find(|t| t.name == name)
    }

    /// Keep only the named target.
    pub fn retain_target(&mut self, name: &str) -> Result<(), ConfigError> {
        if self.target(name).is_none() {
            return Err(ConfigError::UnknownTarget(name.to_string()));
        }
        self.targets.retain(|t| t.name == name);
        Ok(())
    }

    /// Create the binary, object and per-target object directories.
    /// Idempotent.
    pub fn ensure_output_dirs(&self) -> std::io::Result<()> {
        fs::create_dir_all(&self.bin_dir)?;
        fs::create_dir_all(&self.obj_dir)?;
        for target in &self.targets {
            fs::create_dir_all(self.target_obj_dir(target))?;
        }
        Ok(())
    }

    /// Objects and preprocessed files of one target: `obj_dir/<target>`.
    ///
    /// Targets never share this directory, so two targets may both have a
    /// `main.c`.
    pub fn target_obj_dir(&self, target: &Target) -> PathBuf {
        self.obj_dir.join(&target.name)
    }

    /// Path of the fingerprint table for one target.
    pub fn table_path(&self, target: &Target) -> PathBuf {
        self.obj_dir
            .join(format!("{}_{}.table", self.name, target.name))
    }

    /// Check the invariants the build driver relies on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::Validation(
                "project name must not be empty".to_string(),
            ));
        }
        if self.options.opt_level > 3 {
            return Err(ConfigError::Validation(format!(
                "opt_level must be 0-3, got {}",
                self.options.opt_level
            )));
        }

        let mut names = HashSet::new();
        for target in &self.targets {
            if target.name.trim().is_empty() {
                return Err(ConfigError::Validation(
                    "target name must not be empty".to_string(),
                ));
            }
            // The name doubles as the target's object directory.
            if target.name.contains(['/', '\\']) || target.name == "." || target.name == ".." {
                return Err(ConfigError::Validation(format!(
                    "target name '{}' must not be a path",
                    target.name
                )));
            }
            if !names.insert(target.name.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "duplicate target name '{}'",
                    target.name
                )));
            }
            validate_target(target)?;
        }
        Ok(())
    }
}

fn validate_target(target: &Target) -> Result<(), ConfigError> {
    let name = &target.name;
    if target.src_files.is_empty() {
        return Err(ConfigError::Validation(format!(
            "target '{name}' has no sources"
        )));
    }
    if target.warning_level > 4 {
        return Err(ConfigError::Validation(format!(
            "target '{name}': warning_level must be 0-4, got {}",
            target.warning_level
        )));
    }
    if target.kind == TargetKind::StaticLibrary {
        if target.entry_point.is_some() {
            return Err(ConfigError::Validation(format!(
                "target '{name}': a static library cannot set an entry point"
            )));
        }
        if target.subsystem.is_some() {
            return Err(ConfigError::Validation(format!(
                "target '{name}': a static library cannot set a subsystem"
            )));
        }
    }

    // Objects are named after the source stem, so stems must be unique
    // within a target.
    let mut stems = HashSet::new();
    for src in &target.src_files {
        let stem = src
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        if stem.is_empty() {
            return Err(ConfigError::Validation(format!(
                "target '{name}': source '{}' has no file name",
                src.display()
            )));
        }
        if !stems.insert(stem.clone()) {
            return Err(ConfigError::Validation(format!(
                "target '{name}': more than one source named '{stem}' would share an object file"
            )));
        }
    }
    Ok(())
}
