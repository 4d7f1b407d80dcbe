//! Persisted source → fingerprint table for one target.
//!
//! On disk it is a text file with one row per source,
//! `<path>, <w0>, <w1>, <w2>, <w3>`, sorted by path. The file is only ever
//! replaced whole (written beside the target and renamed over it).

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use super::fingerprint::Fingerprint;

/// Outcome of comparing a fresh fingerprint against the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// No stored fingerprint, or a different one.
    Recompile,
    /// Same fingerprint as last time.
    Unchanged,
}

/// Fingerprints keyed by source path string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FingerprintTable {
    entries: BTreeMap<String, Fingerprint>,
}

impl FingerprintTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a table, treating a missing or unreadable file as empty.
    ///
    /// Malformed rows are skipped with a warning and so count as misses.
    pub fn load(path: &Path) -> Self {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("No fingerprint table at {}", path.display());
                return Self::new();
            }
            Err(e) => {
                tracing::warn!(
                    "Ignoring unreadable fingerprint table {}: {}",
                    path.display(),
                    e
                );
                return Self::new();
            }
        };
        Self::parse(&content, path)
    }

    fn parse(content: &str, origin: &Path) -> Self {
        let mut table = Self::new();
        for (index, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match parse_row(line) {
                Some((source, fingerprint)) => {
                    table.entries.insert(source, fingerprint);
                }
                None => tracing::warn!(
                    "Skipping malformed row {} in {}",
                    index + 1,
                    origin.display()
                ),
            }
        }
        table
    }

    pub fn get(&self, source: &str) -> Option<Fingerprint> {
        self.entries.get(source).copied()
    }

    pub fn insert(&mut self, source: impl Into<String>, fingerprint: Fingerprint) {
        self.entries.insert(source.into(), fingerprint);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Fingerprint)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Compare `fingerprint` with the stored one, then store it.
    pub fn check_and_update(&mut self, source: &str, fingerprint: Fingerprint) -> Decision {
        let previous = self.entries.insert(source.to_string(), fingerprint);
        if previous == Some(fingerprint) {
            Decision::Unchanged
        } else {
            Decision::Recompile
        }
    }

    /// Serialized form, rows sorted by path.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for (source, fingerprint) in &self.entries {
            let [a, b, c, d] = fingerprint.words();
            out.push_str(&format!("{source}, {a}, {b}, {c}, {d}\n"));
        }
        out
    }

    /// Replace the table file at `path` with this table.
    ///
    /// Writes a sibling temporary file and renames it into place, so a
    /// reader sees either the old table or the new one.
    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        let tmp = tmp_path(path);
        {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(self.render().as_bytes())?;
            file.sync_all()?;
        }
        if let Err(e) = fs::rename(&tmp, path) {
            fs::remove_file(&tmp).ok();
            return Err(e);
        }
        Ok(())
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Split from the right so that paths may contain commas.
fn parse_row(line: &str) -> Option<(String, Fingerprint)> {
    let mut parts = line.rsplitn(5, ',');
    let mut words = [0u32; 4];
    for slot in words.iter_mut().rev() {
        *slot = parts.next()?.trim().parse().ok()?;
    }
    let source = parts.next()?.trim();
    if source.is_empty() {
        return None;
    }
    Some((source.to_string(), Fingerprint::from_words(words)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_is_empty() {
        let temp = tempfile::tempdir().unwrap();
        let table = FingerprintTable::load(&temp.path().join("none.table"));
        assert!(table.is_empty());
    }

    #[test]
    fn test_save_and_load() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("demo_app.table");

        let mut table = FingerprintTable::new();
        table.insert("src/b.c", Fingerprint::from_bytes(b"b"));
        table.insert("src/a.c", Fingerprint::from_bytes(b"a"));
        table.save(&path).unwrap();

        let loaded = FingerprintTable::load(&path);
        assert_eq!(loaded, table);
        assert!(!tmp_path(&path).exists());

        let content = fs::read_to_string(&path).unwrap();
        let rows: Vec<_> = content.lines().collect();
        assert_eq!(rows.len(), 2);
        assert!(rows[0].starts_with("src/a.c, "));
        assert!(rows[1].starts_with("src/b.c, "));
    }

    #[test]
    fn test_row_format() {
        let mut table = FingerprintTable::new();
        table.insert("main.c", Fingerprint::from_words([1, 2, 3, 4294967295]));
        assert_eq!(table.render(), "main.c, 1, 2, 3, 4294967295\n");
    }

    #[test]
    fn test_malformed_rows_skipped() {
        let content = "good.c, 1, 2, 3, 4\n\
                       broken.c, 1, 2\n\
                       words.c, a, b, c, d\n\
                       , 1, 2, 3, 4\n\
                       also_good.c,5,6,7,8\n";
        let table = FingerprintTable::parse(content, Path::new("t.table"));
        assert_eq!(table.len(), 2);
        assert_eq!(table.get("good.c"), Some(Fingerprint::from_words([1, 2, 3, 4])));
        assert_eq!(table.get("also_good.c"), Some(Fingerprint::from_words([5, 6, 7, 8])));
        assert!(table.get("broken.c").is_none());
    }

    #[test]
    fn test_path_with_comma() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("x.table");
        let mut table = FingerprintTable::new();
        table.insert("src/a,b.c", Fingerprint::from_bytes(b"ab"));
        table.save(&path).unwrap();
        assert_eq!(
            FingerprintTable::load(&path).get("src/a,b.c"),
            Some(Fingerprint::from_bytes(b"ab"))
        );
    }

    #[test]
    fn test_check_and_update() {
        let mut table = FingerprintTable::new();
        let v1 = Fingerprint::from_bytes(b"v1");
        let v2 = Fingerprint::from_bytes(b"v2");

        assert_eq!(table.check_and_update("a.c", v1), Decision::Recompile);
        assert_eq!(table.check_and_update("a.c", v1), Decision::Unchanged);
        assert_eq!(table.check_and_update("a.c", v2), Decision::Recompile);
        assert_eq!(table.get("a.c"), Some(v2));
    }

    #[test]
    fn test_save_to_missing_dir_fails_cleanly() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("missing").join("x.table");
        let table = FingerprintTable::new();
        assert!(table.save(&path).is_err());
        assert!(!path.exists());
    }
}
