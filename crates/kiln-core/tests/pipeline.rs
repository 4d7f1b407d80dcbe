//! End-to-end incremental builds through real child processes.
//!
//! A small `sh` script stands in for a GNU-style compiler: `-E` strips `//`
//! comment lines, `-c` writes an object, anything else writes a binary.
//! A source containing `#error` fails to preprocess with exit code 3.

#![cfg(unix)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use kiln_core::{
    BuildDriver, Error, FingerprintTable, LinkPolicy, ProcessRunner, Stage, load_manifest,
};

const FAKE_CC: &str = r#"#!/bin/sh
mode=link
out=""
src=""
prev=""
while [ $# -gt 0 ]; do
    case "$1" in
        -E) mode=pre ;;
        -c) mode=obj ;;
        -o) src="$prev"; shift; out="$1" ;;
    esac
    prev="$1"
    shift
done
case "$mode" in
    pre)
        if grep -q '#error' "$src"; then
            echo "$src: error: #error" >&2
            exit 3
        fi
        grep -v '^//' "$src" > "$out"
        ;;
    obj) echo object > "$out" ;;
    link) echo binary > "$out" ;;
esac
"#;

struct Workspace {
    _temp: tempfile::TempDir,
    root: PathBuf,
}

impl Workspace {
    fn new(sources: &[(&str, &str)]) -> Self {
        let temp = tempfile::tempdir().unwrap();
        let root = temp.path().to_path_buf();

        let cc = root.join("fakecc");
        fs::write(&cc, FAKE_CC).unwrap();
        fs::set_permissions(&cc, fs::Permissions::from_mode(0o755)).unwrap();

        fs::create_dir_all(root.join("src")).unwrap();
        for (name, text) in sources {
            fs::write(root.join("src").join(name), text).unwrap();
        }

        let manifest = format!(
            r#"
[project]
name = "demo"

[project.toolchain]
dialect = "gnu"
compiler = "{}"

[[target]]
name = "app"
source_dirs = [{{ dir = "src", extensions = [".c"] }}]
"#,
            cc.display()
        );
        fs::write(root.join("kiln.toml"), manifest).unwrap();

        Self { _temp: temp, root }
    }

    fn manifest(&self) -> PathBuf {
        self.root.join("kiln.toml")
    }

    fn source(&self, name: &str) -> PathBuf {
        self.root.join("src").join(name)
    }
}

fn build(manifest: &Path) -> kiln_core::Result<kiln_core::BuildReport> {
    let manifest = load_manifest(manifest)?;
    BuildDriver::new(ProcessRunner::new()).build_incremental(&manifest.project)
}

#[test]
fn test_incremental_pipeline_with_real_processes() {
    let ws = Workspace::new(&[
        ("a.c", "int a;\n"),
        ("b.c", "int b;\n"),
        ("c.c", "int c;\n"),
    ]);

    let first = build(&ws.manifest()).unwrap();
    assert_eq!(first.targets[0].compiled, 3);
    assert!(ws.root.join("bin").join("app").exists());

    let second = build(&ws.manifest()).unwrap();
    assert_eq!(second.targets[0].compiled, 0);
    assert_eq!(second.targets[0].skipped, 3);

    // Comment-only edit: same preprocessed output.
    fs::write(ws.source("a.c"), "// header comment\nint a;\n").unwrap();
    assert_eq!(build(&ws.manifest()).unwrap().compiled(), 0);

    // Token edit: exactly one recompile.
    fs::write(ws.source("b.c"), "int b = 2;\n").unwrap();
    let edited = build(&ws.manifest()).unwrap();
    assert_eq!(edited.targets[0].compiled, 1);
    assert!(edited.targets[0].linked);
}

#[test]
fn test_table_rows_follow_sources() {
    let ws = Workspace::new(&[("main.c", "int main;\n"), ("util.c", "int util;\n")]);
    build(&ws.manifest()).unwrap();

    let table_path = ws.root.join("bin").join("int").join("demo_app.table");
    let table = FingerprintTable::load(&table_path);
    assert_eq!(table.len(), 2);
    assert!(table.get(&ws.source("main.c").display().to_string()).is_some());

    fs::remove_file(&table_path).unwrap();
    let rebuilt = build(&ws.manifest()).unwrap();
    assert_eq!(rebuilt.compiled(), 2);
    assert_eq!(FingerprintTable::load(&table_path).len(), 2);
}

#[test]
fn test_preprocess_failure_reports_child_exit_code() {
    let ws = Workspace::new(&[("good.c", "int ok;\n"), ("zbad.c", "#error nope\n")]);

    let err = build(&ws.manifest()).unwrap_err();
    assert_eq!(err.exit_code(), 3);
    match err {
        Error::StepFailed { stage, stderr, .. } => {
            assert_eq!(stage, Stage::Preprocess);
            assert!(stderr.contains("#error"));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(!ws.root.join("bin").join("int").join("demo_app.table").exists());
}

#[test]
fn test_relink_only_when_changed() {
    let ws = Workspace::new(&[("a.c", "int a;\n")]);
    let manifest = load_manifest(&ws.manifest()).unwrap();
    let mut driver = BuildDriver::new(ProcessRunner::new()).with_link_policy(LinkPolicy::WhenChanged);

    assert!(driver.build_incremental(&manifest.project).unwrap().targets[0].linked);
    assert!(!driver.build_incremental(&manifest.project).unwrap().targets[0].linked);
}

#[test]
fn test_missing_compiler_is_spawn_error() {
    let ws = Workspace::new(&[("a.c", "int a;\n")]);
    let mut manifest = load_manifest(&ws.manifest()).unwrap();
    manifest.project.toolchain.compiler = Some(ws.root.join("missing-cc").display().to_string());

    let err = BuildDriver::new(ProcessRunner::new())
        .build_incremental(&manifest.project)
        .unwrap_err();
    assert!(matches!(err, Error::Spawn { .. }));
    assert_eq!(err.exit_code(), kiln_core::SENTINEL_EXIT_CODE);
}
