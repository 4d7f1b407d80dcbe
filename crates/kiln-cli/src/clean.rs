//! Clean command implementation for kiln CLI.

use std::path::Path;

use anyhow::Context;

use crate::manifest;

/// Remove the object directory: objects, preprocessed files and
/// fingerprint tables.
pub fn execute(manifest_path: &Path) -> anyhow::Result<()> {
    let manifest = manifest::load(manifest_path, None)?;
    let obj_dir = &manifest.project.obj_dir;

    if !obj_dir.exists() {
        println!("Nothing to clean");
        return Ok(());
    }
    std::fs::remove_dir_all(obj_dir)
        .with_context(|| format!("failed to remove {}", obj_dir.display()))?;
    println!("Removed {}", obj_dir.display());
    Ok(())
}
