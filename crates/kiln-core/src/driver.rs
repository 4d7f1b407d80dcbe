//! Full and incremental builds.
//!
//! Targets are built one after another in declaration order. Within a
//! target, sources are handled one after another. The first failing step
//! stops the whole run.
//!
//! An incremental target pass moves through these phases:
//!
//! ```text
//! LoadingCache -> Preprocessing[i] -> Recompiling[i] | Skipping[i] -> ...
//!              -> Linking -> SavingCache -> Done
//! ```
//!
//! with `Failed` reachable from every step.

use std::path::Path;
use std::time::Instant;

use serde::Serialize;

use crate::cache::{Decision, Fingerprint, FingerprintTable};
use crate::command::{
    CommandLine, binary_path, object_path, synthesize_build, synthesize_compile, synthesize_link,
    synthesize_preprocess,
};
use crate::config::{Project, Target, TargetKind};
use crate::error::{Error, Result, Stage};
use crate::process::{ProcessOutput, Runner};

/// When an incremental build relinks a target.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkPolicy {
    /// Relink on every build.
    #[default]
    Always,
    /// Skip the link when nothing was recompiled and the binary exists.
    WhenChanged,
}

/// Which pipeline produced a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildMode {
    Full,
    Incremental,
}

/// Where a target pass currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetPhase {
    LoadingCache,
    /// Preprocessing the source at this index of `src_files`.
    Preprocessing(usize),
    Recompiling(usize),
    Skipping(usize),
    /// Single-invocation compile and link (full builds).
    Building,
    Linking,
    SavingCache,
    Done,
    Failed,
}

/// Progress callbacks.
pub trait BuildObserver {
    fn on_phase(&mut self, target: &Target, phase: TargetPhase);

    /// Output of a step that succeeded, e.g. compiler warnings.
    fn on_output(&mut self, _target: &Target, _stage: Stage, _output: &ProcessOutput) {}

    fn on_target_finished(&mut self, _report: &TargetReport) {}
}

/// What happened to one target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TargetReport {
    pub name: String,
    pub preprocessed: usize,
    pub compiled: usize,
    pub skipped: usize,
    pub linked: bool,
    pub cache_saved: bool,
    pub elapsed_ms: u64,
}

impl TargetReport {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            preprocessed: 0,
            compiled: 0,
            skipped: 0,
            linked: false,
            cache_saved: false,
            elapsed_ms: 0,
        }
    }
}

/// Result of a whole successful run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildReport {
    pub mode: BuildMode,
    pub targets: Vec<TargetReport>,
    pub elapsed_ms: u64,
}

impl BuildReport {
    pub fn compiled(&self) -> usize {
        self.targets.iter().map(|t| t.compiled).sum()
    }

    pub fn skipped(&self) -> usize {
        self.targets.iter().map(|t| t.skipped).sum()
    }
}

fn millis(start: Instant) -> u64 {
    u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX)
}

/// Drives a [`Runner`] through the steps of a build.
pub struct BuildDriver<R: Runner> {
    runner: R,
    link_policy: LinkPolicy,
    observer: Option<Box<dyn BuildObserver>>,
}

impl<R: Runner> BuildDriver<R> {
    pub fn new(runner: R) -> Self {
        Self {
            runner,
            link_policy: LinkPolicy::default(),
            observer: None,
        }
    }

    pub fn with_link_policy(mut self, policy: LinkPolicy) -> Self {
        self.link_policy = policy;
        self
    }

    pub fn with_observer(mut self, observer: impl BuildObserver + 'static) -> Self {
        self.observer = Some(Box::new(observer));
        self
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    pub fn into_runner(self) -> R {
        self.runner
    }

    /// Build every target from scratch, without consulting the cache.
    pub fn build_full(&mut self, project: &Project) -> Result<BuildReport> {
        self.build_all(project, BuildMode::Full)
    }

    /// Build every target, recompiling only sources whose preprocessed
    /// output changed since the last successful build.
    pub fn build_incremental(&mut self, project: &Project) -> Result<BuildReport> {
        self.build_all(project, BuildMode::Incremental)
    }

    fn build_all(&mut self, project: &Project, mode: BuildMode) -> Result<BuildReport> {
        let start = Instant::now();
        project.ensure_output_dirs()?;

        let mut targets = Vec::with_capacity(project.targets.len());
        for target in &project.targets {
            tracing::info!("Building target '{}' ({:?})", target.name, mode);
            let target_start = Instant::now();

            let result = match mode {
                BuildMode::Full => self.full_target(project, target),
                BuildMode::Incremental => self.incremental_target(project, target),
            };
            let mut report = match result {
                Ok(report) => report,
                Err(e) => {
                    tracing::info!("Target '{}' failed: {}", target.name, e);
                    self.notify(target, TargetPhase::Failed);
                    return Err(e);
                }
            };

            report.elapsed_ms = millis(target_start);
            self.notify(target, TargetPhase::Done);
            if let Some(observer) = self.observer.as_mut() {
                observer.on_target_finished(&report);
            }
            targets.push(report);
        }

        Ok(BuildReport {
            mode,
            targets,
            elapsed_ms: millis(start),
        })
    }

    fn full_target(&mut self, project: &Project, target: &Target) -> Result<TargetReport> {
        let mut report = TargetReport::new(&target.name);

        if target.kind == TargetKind::StaticLibrary {
            // No single-step form: compile each source, then archive.
            for (index, source) in target.src_files.iter().enumerate() {
                self.notify(target, TargetPhase::Recompiling(index));
                let cmd = synthesize_compile(project, target, source);
                self.run_step(&cmd, Stage::Compile, target, Some(source))?;
                report.compiled += 1;
            }
            self.notify(target, TargetPhase::Linking);
            self.run_step(&synthesize_link(project, target), Stage::Link, target, None)?;
        } else {
            self.notify(target, TargetPhase::Building);
            self.run_step(&synthesize_build(project, target), Stage::Build, target, None)?;
            report.compiled = target.src_files.len();
        }

        report.linked = true;
        Ok(report)
    }

    fn incremental_target(&mut self, project: &Project, target: &Target) -> Result<TargetReport> {
        let mut report = TargetReport::new(&target.name);

        self.notify(target, TargetPhase::LoadingCache);
        let table_path = project.table_path(target);
        let mut table = FingerprintTable::load(&table_path);
        tracing::debug!(
            "Loaded {} fingerprints from {}",
            table.len(),
            table_path.display()
        );

        for (index, source) in target.src_files.iter().enumerate() {
            self.notify(target, TargetPhase::Preprocessing(index));
            let (cmd, preprocessed) = synthesize_preprocess(project, target, source);
            self.run_step(&cmd, Stage::Preprocess, target, Some(source))?;
            report.preprocessed += 1;

            // The compile command is part of the fingerprint, so a flag
            // change recompiles too.
            let compile = synthesize_compile(project, target, source);
            let fingerprint = Fingerprint::from_file_and_command(&preprocessed, &compile)?;
            let decision = table.check_and_update(&source.display().to_string(), fingerprint);
            let object = object_path(project, target, source);

            if decision == Decision::Unchanged && object.exists() {
                tracing::debug!("{} unchanged", source.display());
                self.notify(target, TargetPhase::Skipping(index));
                report.skipped += 1;
                continue;
            }

            self.notify(target, TargetPhase::Recompiling(index));
            self.run_step(&compile, Stage::Compile, target, Some(source))?;
            report.compiled += 1;
        }

        let needs_link = match self.link_policy {
            LinkPolicy::Always => true,
            LinkPolicy::WhenChanged => {
                report.compiled > 0 || !binary_path(project, target).exists()
            }
        };
        if needs_link {
            self.notify(target, TargetPhase::Linking);
            self.run_step(&synthesize_link(project, target), Stage::Link, target, None)?;
            report.linked = true;
        } else {
            tracing::debug!("Nothing changed, skipping link of '{}'", target.name);
        }

        self.notify(target, TargetPhase::SavingCache);
        match table.save(&table_path) {
            Ok(()) => report.cache_saved = true,
            Err(e) => tracing::warn!(
                "Failed to save fingerprint table {}: {}",
                table_path.display(),
                e
            ),
        }

        Ok(report)
    }

    fn run_step(
        &mut self,
        cmd: &CommandLine,
        stage: Stage,
        target: &Target,
        source: Option<&Path>,
    ) -> Result<ProcessOutput> {
        let output = self.runner.run(cmd)?;
        if !output.success() {
            return Err(Error::StepFailed {
                stage,
                target: target.name.clone(),
                source_file: source.map(|s| s.display().to_string()),
                exit_code: output.exit_code,
                stdout: output.stdout,
                stderr: output.stderr,
            });
        }
        if let Some(observer) = self.observer.as_mut() {
            observer.on_output(target, stage, &output);
        }
        Ok(output)
    }

    fn notify(&mut self, target: &Target, phase: TargetPhase) {
        if let Some(observer) = self.observer.as_mut() {
            observer.on_phase(target, phase);
        }
    }
}
