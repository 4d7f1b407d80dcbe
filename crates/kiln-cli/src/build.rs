//! Build command implementation for kiln CLI.

use std::path::Path;

use kiln_core::{
    BootstrapConfig, BuildDriver, BuildObserver, LinkPolicy, ProcessOutput, ProcessRunner,
    Project, SelfRebuild, Stage, Target, TargetPhase, TargetReport,
};

use crate::colors;
use crate::manifest;

/// Options for `kiln build`.
pub struct BuildArgs<'a> {
    pub full: bool,
    pub target: Option<&'a str>,
    pub relink_when_changed: bool,
    pub json: bool,
}

/// Outcome of the self-rebuild check.
#[derive(Debug, PartialEq, Eq)]
pub enum Bootstrap {
    /// Nothing to do, or a separate executable was rebuilt in place.
    Continue,
    /// A replacement of this executable was launched; exit now.
    Relaunched,
}

/// Build the project described by `manifest_path`.
pub fn execute(manifest_path: &Path, args: &BuildArgs<'_>) -> anyhow::Result<Bootstrap> {
    let manifest = manifest::load(manifest_path, args.target)?;

    if let Some(config) = &manifest.bootstrap
        && self_rebuild(config, &manifest.project)? == Bootstrap::Relaunched
    {
        return Ok(Bootstrap::Relaunched);
    }

    let policy = if args.relink_when_changed {
        LinkPolicy::WhenChanged
    } else {
        LinkPolicy::Always
    };
    let mut driver = BuildDriver::new(ProcessRunner::new()).with_link_policy(policy);
    if !args.json {
        driver = driver.with_observer(Progress::default());
        println!(
            "{}Building{} {}{}{}",
            colors::CYAN,
            colors::RESET,
            colors::BOLD,
            manifest.project.name,
            colors::RESET
        );
    }

    let report = if args.full {
        driver.build_full(&manifest.project)?
    } else {
        driver.build_incremental(&manifest.project)?
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", "─".repeat(50));
        println!(
            "{}Finished{} {} target(s): {} compiled, {} unchanged in {:.2}s",
            colors::GREEN,
            colors::RESET,
            report.targets.len(),
            report.compiled(),
            report.skipped(),
            report.elapsed_ms as f64 / 1000.0
        );
    }
    Ok(Bootstrap::Continue)
}

/// Rebuild the bootstrap executable if its sources are newer.
fn self_rebuild(config: &BootstrapConfig, project: &Project) -> anyhow::Result<Bootstrap> {
    let rebuild = SelfRebuild::from_config(config, project, std::env::current_exe()?);
    if !rebuild.is_stale()? {
        tracing::debug!("{} is up to date", rebuild.executable().display());
        return Ok(Bootstrap::Continue);
    }

    print!(
        "Rebuilding self [{}]... ",
        rebuild.executable().display()
    );
    colors::flush_stdout();
    if let Err(e) = rebuild.build_replacement(&mut ProcessRunner::new()) {
        println!("{}Failed!{}", colors::RED, colors::RESET);
        return Err(e.into());
    }
    println!("{}Done.{}", colors::GREEN, colors::RESET);

    if rebuild.is_running_executable() {
        rebuild.launch_replacement()?;
        println!("Replacing the running executable; run the command again.");
        return Ok(Bootstrap::Relaunched);
    }
    rebuild.install()?;
    Ok(Bootstrap::Continue)
}

/// Prints one line per compiled source, in the style of
/// `Compiling [main.c]... ✓`.
#[derive(Default)]
struct Progress {
    /// A line was started and still needs its ✓ or ✗.
    pending: bool,
    current: Option<String>,
}

impl Progress {
    fn close(&mut self, ok: bool) {
        if !self.pending {
            return;
        }
        self.pending = false;
        if ok {
            println!("{}✓{}", colors::GREEN, colors::RESET);
        } else {
            println!("{}✗{}", colors::RED, colors::RESET);
        }
    }

    fn header(&mut self, target: &Target) {
        if self.current.as_deref() == Some(target.name.as_str()) {
            return;
        }
        self.close(true);
        println!("{}{}{}", colors::BOLD, target.name, colors::RESET);
        self.current = Some(target.name.clone());
    }

    fn open(&mut self, label: &str, subject: &str) {
        self.close(true);
        print!("  {}{label}{} [{subject}]... ", colors::DIM, colors::RESET);
        colors::flush_stdout();
        self.pending = true;
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

impl BuildObserver for Progress {
    fn on_phase(&mut self, target: &Target, phase: TargetPhase) {
        self.header(target);
        match phase {
            TargetPhase::Building => self.open("Building", &target.name),
            TargetPhase::Recompiling(index) => {
                if let Some(source) = target.src_files.get(index) {
                    self.open("Compiling", &file_name(source));
                }
            }
            TargetPhase::Linking => self.open("Linking", &target.name),
            TargetPhase::Failed => self.close(false),
            TargetPhase::LoadingCache
            | TargetPhase::Preprocessing(_)
            | TargetPhase::Skipping(_)
            | TargetPhase::SavingCache
            | TargetPhase::Done => self.close(true),
        }
    }

    fn on_output(&mut self, _target: &Target, stage: Stage, output: &ProcessOutput) {
        // Compiler and linker warnings only.
        if stage == Stage::Preprocess || output.stderr.trim().is_empty() {
            return;
        }
        self.close(true);
        eprint!("{}", output.stderr);
    }

    fn on_target_finished(&mut self, report: &TargetReport) {
        self.close(true);
        let link = if report.linked { ", linked" } else { "" };
        println!(
            "  {}{} compiled, {} unchanged{}{} ({:.2}s)",
            colors::DIM,
            report.compiled,
            report.skipped,
            link,
            colors::RESET,
            report.elapsed_ms as f64 / 1000.0
        );
    }
}
