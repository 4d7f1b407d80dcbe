//! Dry run: print the command lines a build would execute.

use std::path::Path;

use kiln_core::{
    Project, Target, TargetKind, synthesize_build, synthesize_compile, synthesize_link,
    synthesize_preprocess,
};

use crate::colors;
use crate::manifest;

/// Print every command for the selected targets without running any.
pub fn execute(manifest_path: &Path, target: Option<&str>, full: bool) -> anyhow::Result<()> {
    let manifest = manifest::load(manifest_path, target)?;
    let project = &manifest.project;

    for target in &project.targets {
        println!("{}# {}{}", colors::DIM, target.name, colors::RESET);
        for line in commands_for(project, target, full) {
            println!("{line}");
        }
    }
    Ok(())
}

fn commands_for(project: &Project, target: &Target, full: bool) -> Vec<String> {
    let mut lines = Vec::new();
    if full && target.kind != TargetKind::StaticLibrary {
        lines.push(synthesize_build(project, target).to_string());
        return lines;
    }
    for source in &target.src_files {
        if !full {
            let (cmd, _) = synthesize_preprocess(project, target, source);
            lines.push(cmd.to_string());
        }
        lines.push(synthesize_compile(project, target, source).to_string());
    }
    lines.push(synthesize_link(project, target).to_string());
    lines
}
