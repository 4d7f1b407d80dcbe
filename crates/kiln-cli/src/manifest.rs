//! Manifest loading shared by every subcommand.

use std::path::Path;

use anyhow::Context;
use kiln_core::Manifest;

/// Load `path`, optionally narrowing the project to one target.
pub fn load(path: &Path, target: Option<&str>) -> anyhow::Result<Manifest> {
    let mut manifest = kiln_core::load_manifest(path)
        .with_context(|| format!("while loading {}", path.display()))?;
    if let Some(name) = target {
        manifest.project.retain_target(name)?;
    }
    tracing::debug!(
        "Loaded project '{}' with {} target(s)",
        manifest.project.name,
        manifest.project.targets.len()
    );
    Ok(manifest)
}
