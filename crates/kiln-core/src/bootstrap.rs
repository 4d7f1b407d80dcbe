//! Self-rebuild.
//!
//! A running executable cannot overwrite its own file on every platform, so
//! replacing it takes two processes:
//!
//! 1. The old process builds a replacement at a side path (`_<name>` next to
//!    the original). If that fails nothing else happens and the original is
//!    untouched.
//! 2. The old process launches the replacement with [`FINALIZE_ARG`] and the
//!    original path, then exits without waiting. The replacement renames
//!    itself over the original, retrying while the old process is still on
//!    its way out, and exits.
//!
//! The old process never learns whether step 2 succeeded.

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, SystemTime};

use crate::command::{CommandLine, binary_path, synthesize_build};
use crate::config::{BootstrapConfig, Project, RebuildRecipe, Target};
use crate::error::{Error, Result, Stage};
use crate::process::Runner;

/// Reserved argument that puts a replacement executable in finalize mode.
pub const FINALIZE_ARG: &str = "--kiln-finalize-self-rebuild";

/// Replaced by the side path in command recipes.
pub const OUTPUT_PLACEHOLDER: &str = "{output}";

const FINALIZE_ATTEMPTS: u32 = 50;
const FINALIZE_DELAY: Duration = Duration::from_millis(100);

/// How the replacement executable gets built.
#[derive(Debug, Clone)]
pub enum Recipe {
    /// Single-invocation build of `target` with `project`'s settings.
    Build { project: Box<Project>, target: Box<Target> },
    /// Explicit command tokens, program first.
    Command(Vec<String>),
}

/// Keeps one executable in sync with its sources.
#[derive(Debug, Clone)]
pub struct SelfRebuild {
    executable: PathBuf,
    sources: Vec<PathBuf>,
    recipe: Recipe,
}

impl SelfRebuild {
    pub fn new(executable: impl Into<PathBuf>, sources: Vec<PathBuf>, recipe: Recipe) -> Self {
        Self {
            executable: executable.into(),
            sources,
            recipe,
        }
    }

    /// Build from a manifest's `[bootstrap]` section.
    ///
    /// `running` is used when the section does not name an executable.
    pub fn from_config(config: &BootstrapConfig, project: &Project, running: PathBuf) -> Self {
        let executable = config.executable.clone().unwrap_or(running);
        let recipe = match &config.recipe {
            RebuildRecipe::Command(tokens) => Recipe::Command(tokens.clone()),
            RebuildRecipe::Target(target) => Recipe::Build {
                project: Box::new(project.clone()),
                target: target.clone(),
            },
        };
        Self::new(executable, config.sources.clone(), recipe)
    }

    pub fn executable(&self) -> &Path {
        &self.executable
    }

    pub fn sources(&self) -> &[PathBuf] {
        &self.sources
    }

    /// Whether any source is at least as new as the executable.
    ///
    /// A missing executable is stale. A missing source is an error.
    pub fn is_stale(&self) -> Result<bool> {
        let exe_time = match fs::metadata(&self.executable).and_then(|m| m.modified()) {
            Ok(time) => time,
            Err(_) => return Ok(true),
        };

        let mut newest = SystemTime::UNIX_EPOCH;
        for source in &self.sources {
            let modified = fs::metadata(source)
                .and_then(|m| m.modified())
                .map_err(|e| {
                    Error::Bootstrap(format!("cannot read mtime of {}: {}", source.display(), e))
                })?;
            newest = newest.max(modified);
        }
        Ok(newest >= exe_time)
    }

    /// Side path the replacement is built at: `_<file name>` beside the
    /// executable.
    pub fn replacement_path(&self) -> PathBuf {
        let mut name = OsString::from("_");
        if let Some(file_name) = self.executable.file_name() {
            name.push(file_name);
        }
        self.executable.with_file_name(name)
    }

    /// The command that produces the replacement.
    pub fn replacement_command(&self) -> Result<CommandLine> {
        let output = self.replacement_path();
        match &self.recipe {
            Recipe::Command(tokens) => {
                let output = output.display().to_string();
                let mut tokens = tokens
                    .iter()
                    .map(|t| t.replace(OUTPUT_PLACEHOLDER, &output));
                let program = tokens
                    .next()
                    .ok_or_else(|| Error::Bootstrap("empty rebuild command".to_string()))?;
                let mut cmd = CommandLine::new(program);
                cmd.args(tokens);
                Ok(cmd)
            }
            Recipe::Build { project, target } => {
                let (project, target) = self.side_build(project, target)?;
                Ok(synthesize_build(&project, &target))
            }
        }
    }

    fn side_build(&self, project: &Project, target: &Target) -> Result<(Project, Target)> {
        let replacement = self.replacement_path();
        let stem = replacement
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .ok_or_else(|| Error::Bootstrap("executable has no file name".to_string()))?;

        let mut project = project.clone();
        project.bin_dir = replacement
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        let mut target = target.clone();
        target.name = stem;

        let produced = binary_path(&project, &target);
        if produced != replacement {
            tracing::warn!(
                "Side build writes {} but the replacement is expected at {}",
                produced.display(),
                replacement.display()
            );
        }
        Ok((project, target))
    }

    /// Phase 1: build the replacement beside the original.
    ///
    /// On failure the original executable is left as it was.
    pub fn build_replacement<R: Runner>(&self, runner: &mut R) -> Result<PathBuf> {
        let replacement = self.replacement_path();
        let cmd = self.replacement_command()?;
        if let Recipe::Build { project, target } = &self.recipe {
            let (project, target) = self.side_build(project, target)?;
            fs::create_dir_all(project.target_obj_dir(&target))?;
        }

        tracing::info!("Rebuilding {}", self.executable.display());
        let output = runner.run(&cmd)?;
        if !output.success() {
            return Err(Error::StepFailed {
                stage: Stage::SelfRebuild,
                target: self.executable.display().to_string(),
                source_file: None,
                exit_code: output.exit_code,
                stdout: output.stdout,
                stderr: output.stderr,
            });
        }
        if !replacement.exists() {
            return Err(Error::Bootstrap(format!(
                "rebuild succeeded but {} was not produced",
                replacement.display()
            )));
        }
        Ok(replacement)
    }

    /// Phase 2: start the replacement in finalize mode and return at once.
    ///
    /// The caller is expected to exit right after.
    pub fn launch_replacement(&self) -> Result<()> {
        let replacement = self.replacement_path();
        Command::new(&replacement)
            .arg(FINALIZE_ARG)
            .arg(&self.executable)
            .stdin(Stdio::null())
            .spawn()
            .map_err(|e| Error::Spawn {
                program: replacement.display().to_string(),
                source: e,
            })?;
        tracing::debug!("Launched {} to finalize", replacement.display());
        Ok(())
    }

    /// Whether the executable being kept fresh is the one running now.
    pub fn is_running_executable(&self) -> bool {
        let Ok(current) = std::env::current_exe() else {
            return false;
        };
        match (fs::canonicalize(current), fs::canonicalize(&self.executable)) {
            (Ok(a), Ok(b)) => a == b,
            _ => false,
        }
    }

    /// Move the replacement over an executable that is not running.
    pub fn install(&self) -> Result<()> {
        finalize(&self.replacement_path(), &self.executable)
    }
}

/// Rename `replacement` over `original`, retrying while the old process
/// still holds the file.
pub fn finalize(replacement: &Path, original: &Path) -> Result<()> {
    finalize_with(replacement, original, FINALIZE_ATTEMPTS, FINALIZE_DELAY)
}

fn finalize_with(
    replacement: &Path,
    original: &Path,
    attempts: u32,
    delay: Duration,
) -> Result<()> {
    let mut last_error = None;
    for attempt in 1..=attempts.max(1) {
        match fs::rename(replacement, original) {
            Ok(()) => {
                tracing::debug!(
                    "Installed {} after {} attempt(s)",
                    original.display(),
                    attempt
                );
                return Ok(());
            }
            Err(e) => {
                last_error = Some(e);
                if attempt < attempts {
                    thread::sleep(delay);
                }
            }
        }
    }
    Err(Error::Bootstrap(format!(
        "failed to rename {} over {}: {}",
        replacement.display(),
        original.display(),
        last_error.map(|e| e.to_string()).unwrap_or_default()
    )))
}

/// Handle finalize mode if `args` (the full argv, program first) asks for it.
///
/// Returns `None` when this is an ordinary invocation.
pub fn run_finalize_if_requested<I>(args: I) -> Option<Result<()>>
where
    I: IntoIterator<Item = OsString>,
{
    let args: Vec<OsString> = args.into_iter().collect();
    if args.len() != 3 || args[1] != FINALIZE_ARG {
        return None;
    }
    let original = PathBuf::from(&args[2]);
    let result = std::env::current_exe()
        .map_err(Error::Io)
        .and_then(|replacement| finalize(&replacement, &original));
    Some(result)
}
