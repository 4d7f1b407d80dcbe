//! Check command implementation for kiln CLI.
//!
//! Validates the manifest and locates the toolchain without building.

use std::path::Path;

use kiln_core::{ResolvedToolchain, SelfRebuild};

use crate::colors;
use crate::manifest;

pub fn execute(manifest_path: &Path) -> anyhow::Result<()> {
    let manifest = manifest::load(manifest_path, None)?;
    let project = &manifest.project;

    println!(
        "{}Project{} {} ({} target(s))",
        colors::BOLD,
        colors::RESET,
        project.name,
        project.targets.len()
    );
    for target in &project.targets {
        println!(
            "  {} {}{:?}, {} source(s){}",
            target.name,
            colors::DIM,
            target.kind,
            target.src_files.len(),
            colors::RESET
        );
    }

    let toolchain = ResolvedToolchain::locate(project)?;
    println!(
        "{}Compiler{} {} ({:?})",
        colors::BOLD,
        colors::RESET,
        toolchain.compiler.display(),
        toolchain.dialect
    );
    if let Some(archiver) = &toolchain.archiver {
        println!("{}Archiver{} {}", colors::BOLD, colors::RESET, archiver.display());
    }

    if let Some(config) = &manifest.bootstrap {
        let rebuild = SelfRebuild::from_config(config, project, std::env::current_exe()?);
        let state = if rebuild.is_stale()? {
            format!("{}stale{}", colors::YELLOW, colors::RESET)
        } else {
            format!("{}up to date{}", colors::GREEN, colors::RESET)
        };
        println!(
            "{}Bootstrap{} {} is {}",
            colors::BOLD,
            colors::RESET,
            rebuild.executable().display(),
            state
        );
    }

    println!("{}OK{}", colors::GREEN, colors::RESET);
    Ok(())
}
