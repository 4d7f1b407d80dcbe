//! Source-file discovery for `source_dirs` manifest entries.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

use super::error::ConfigError;

/// A directory to scan recursively for sources with the given extensions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceDir {
    pub dir: PathBuf,
    /// Suffixes such as `".cpp"`; a missing leading dot is added.
    pub extensions: Vec<String>,
}

impl SourceDir {
    fn matches(&self, file_name: &str) -> bool {
        self.extensions.iter().any(|ext| {
            if ext.starts_with('.') {
                file_name.ends_with(ext.as_str())
            } else {
                file_name.ends_with(&format!(".{ext}"))
            }
        })
    }
}

/// Find every file under `source.dir` (resolved against `base`) whose name
/// ends with one of the extensions. Results are sorted by path so repeated
/// scans produce the same build order.
pub fn find_sources(base: &Path, source: &SourceDir) -> Result<Vec<PathBuf>, ConfigError> {
    let root = base.join(&source.dir);
    let mut files = Vec::new();

    for entry in WalkDir::new(&root).sort_by_file_name() {
        let entry = entry.map_err(|e| ConfigError::Discovery {
            dir: root.clone(),
            reason: e.to_string(),
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy();
        if source.matches(&name) {
            files.push(entry.into_path());
        }
    }

    tracing::debug!(
        "Discovered {} sources under {}",
        files.len(),
        root.display()
    );
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_find_sources_recursive_and_sorted() {
        let temp = tempfile::tempdir().unwrap();
        let src = temp.path().join("src");
        fs::create_dir_all(src.join("render")).unwrap();
        fs::write(src.join("main.cpp"), "").unwrap();
        fs::write(src.join("render").join("draw.cpp"), "").unwrap();
        fs::write(src.join("render").join("draw.h"), "").unwrap();
        fs::write(src.join("app.cpp"), "").unwrap();

        let dir = SourceDir {
            dir: PathBuf::from("src"),
            extensions: vec![".cpp".to_string()],
        };
        let files = find_sources(temp.path(), &dir).unwrap();

        assert_eq!(
            files,
            vec![
                src.join("app.cpp"),
                src.join("main.cpp"),
                src.join("render").join("draw.cpp"),
            ]
        );
    }

    #[test]
    fn test_extension_without_dot() {
        let dir = SourceDir {
            dir: PathBuf::from("."),
            extensions: vec!["c".to_string(), ".cc".to_string()],
        };
        assert!(dir.matches("main.c"));
        assert!(dir.matches("util.cc"));
        assert!(!dir.matches("notes.txt"));
        assert!(!dir.matches("basic"));
    }

    #[test]
    fn test_missing_directory_errors() {
        let temp = tempfile::tempdir().unwrap();
        let dir = SourceDir {
            dir: PathBuf::from("does-not-exist"),
            extensions: vec![".c".to_string()],
        };
        let err = find_sources(temp.path(), &dir).unwrap_err();
        assert!(matches!(err, ConfigError::Discovery { .. }));
    }
}
