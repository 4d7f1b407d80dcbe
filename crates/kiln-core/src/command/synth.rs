//! Command synthesis.
//!
//! Every function here is pure: the same project and target always produce
//! the same tokens in the same order. Flag order is fixed:
//!
//! 1. include directories
//! 2. base flags
//! 3. runtime linkage
//! 4. optimization
//! 5. language standard
//! 6. debug info
//! 7. shared library, then ignore-standard-includes
//! 8. warning level, warnings-as-errors, per-warning suppressions
//! 9. project defines, then target defines
//! 10. sources (or objects)
//! 11. output paths
//! 12. link-stage flags
//!
//! Nothing here validates; call [`Project::validate`] first.

use std::path::{Path, PathBuf};

use crate::config::{Project, Target, TargetKind};

use super::dialect::{FlagDialect, Invocation, dialect_for};
use super::line::CommandLine;

/// Extension of preprocessor output files.
pub const PREPROCESSED_EXTENSION: &str = "i";

fn dialect(project: &Project) -> &'static dyn FlagDialect {
    dialect_for(project.toolchain.dialect)
}

/// Compiler driver program: the configured override or the dialect default.
pub fn compiler_program(project: &Project) -> String {
    project
        .toolchain
        .compiler
        .clone()
        .unwrap_or_else(|| dialect(project).compiler().to_string())
}

/// Static-library archiver program.
pub fn archiver_program(project: &Project) -> String {
    project
        .toolchain
        .archiver
        .clone()
        .unwrap_or_else(|| dialect(project).archiver().to_string())
}

fn stem(source: &Path) -> String {
    source
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default()
}

/// Object file a source compiles to: `obj_dir/<target>/<stem>.<obj ext>`.
pub fn object_path(project: &Project, target: &Target, source: &Path) -> PathBuf {
    project.target_obj_dir(target).join(format!(
        "{}.{}",
        stem(source),
        dialect(project).object_extension()
    ))
}

/// Preprocessor output for a source: `obj_dir/<target>/<stem>.i`.
pub fn preprocessed_path(project: &Project, target: &Target, source: &Path) -> PathBuf {
    project
        .target_obj_dir(target)
        .join(format!("{}.{PREPROCESSED_EXTENSION}", stem(source)))
}

/// Final artifact of a target inside `bin_dir`.
pub fn binary_path(project: &Project, target: &Target) -> PathBuf {
    project
        .bin_dir
        .join(dialect(project).binary_file_name(&target.name, target.kind))
}

/// Objects of every source of a target, in source order.
pub fn object_paths(project: &Project, target: &Target) -> Vec<PathBuf> {
    target
        .src_files
        .iter()
        .map(|src| object_path(project, target, src))
        .collect()
}

/// Steps 1-9 of the flag order for a compiling invocation.
fn compile_flags(
    cmd: &mut CommandLine,
    project: &Project,
    target: &Target,
    invocation: Invocation,
) {
    let dialect = dialect(project);
    let options = &project.options;

    for dir in &target.include_dirs {
        dialect.include_dir(cmd, dir);
    }
    dialect.base_flags(cmd, invocation);
    dialect.runtime_flags(cmd, options, invocation);
    dialect.optimization_flags(cmd, options);
    dialect.standard_flag(cmd, options.standard);
    if options.generate_debug_info {
        dialect.debug_info_flag(cmd);
    }
    if target.kind == TargetKind::SharedLibrary {
        dialect.shared_library_flag(cmd, invocation);
    }
    if target.ignore_standard_includes {
        dialect.ignore_standard_includes_flag(cmd);
    }
    dialect.warning_level_flag(cmd, target.warning_level);
    if target.warnings_as_errors {
        dialect.warnings_as_errors_flag(cmd);
    }
    for warning in &target.warnings_to_ignore {
        dialect.suppress_warning(cmd, warning);
    }
    defines(cmd, project, target);
}

fn defines(cmd: &mut CommandLine, project: &Project, target: &Target) {
    let dialect = dialect(project);
    for define in project.common_defines.iter().chain(&target.defines) {
        dialect.define(cmd, define);
    }
}

/// Compile and link every source of a target in one invocation.
///
/// Static libraries have no single-step form: for them this is the
/// compile-to-objects half and the archive step comes from
/// [`synthesize_link`].
pub fn synthesize_build(project: &Project, target: &Target) -> CommandLine {
    let dialect = dialect(project);
    let mut cmd = CommandLine::new(compiler_program(project));

    if target.kind == TargetKind::StaticLibrary {
        compile_flags(&mut cmd, project, target, Invocation::Compile);
        for src in &target.src_files {
            cmd.path(src);
        }
        dialect.objects_output(&mut cmd, &project.target_obj_dir(target));
        return cmd;
    }

    compile_flags(&mut cmd, project, target, Invocation::Build);
    for src in &target.src_files {
        cmd.path(src);
    }
    dialect.binary_output(
        &mut cmd,
        &binary_path(project, target),
        &project.target_obj_dir(target),
    );
    dialect.link_flags(&mut cmd, &project.options, target);
    cmd
}

/// Run only the preprocessor over one source.
///
/// Returns the command and the path its output is written to.
pub fn synthesize_preprocess(
    project: &Project,
    target: &Target,
    source: &Path,
) -> (CommandLine, PathBuf) {
    let dialect = dialect(project);
    let output = preprocessed_path(project, target, source);
    let mut cmd = CommandLine::new(compiler_program(project));

    for dir in &target.include_dirs {
        dialect.include_dir(&mut cmd, dir);
    }
    dialect.base_flags(&mut cmd, Invocation::Preprocess);
    // Runtime flags change predefined macros such as _DEBUG and _MT.
    dialect.runtime_flags(&mut cmd, &project.options, Invocation::Preprocess);
    dialect.standard_flag(&mut cmd, project.options.standard);
    if target.ignore_standard_includes {
        dialect.ignore_standard_includes_flag(&mut cmd);
    }
    defines(&mut cmd, project, target);
    cmd.path(source);
    dialect.preprocessed_output(&mut cmd, &output);

    (cmd, output)
}

/// Compile one source to its object file.
pub fn synthesize_compile(project: &Project, target: &Target, source: &Path) -> CommandLine {
    let mut cmd = CommandLine::new(compiler_program(project));
    compile_flags(&mut cmd, project, target, Invocation::Compile);
    cmd.path(source);
    dialect(project).object_output(&mut cmd, &object_path(project, target, source));
    cmd
}

/// Link (or archive) a target's objects into its final binary.
pub fn synthesize_link(project: &Project, target: &Target) -> CommandLine {
    let dialect = dialect(project);
    let binary = binary_path(project, target);
    let objects = object_paths(project, target);

    if target.kind == TargetKind::StaticLibrary {
        return dialect.archive(&archiver_program(project), &binary, &objects);
    }

    let options = &project.options;
    let mut cmd = CommandLine::new(compiler_program(project));
    dialect.base_flags(&mut cmd, Invocation::Link);
    dialect.runtime_flags(&mut cmd, options, Invocation::Link);
    if options.generate_debug_info {
        dialect.debug_info_flag(&mut cmd);
    }
    if target.kind == TargetKind::SharedLibrary {
        dialect.shared_library_flag(&mut cmd, Invocation::Link);
    }
    for object in &objects {
        cmd.path(object);
    }
    dialect.binary_output(&mut cmd, &binary, &project.target_obj_dir(target));
    dialect.link_flags(&mut cmd, options, target);
    cmd
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Dialect, Language, LanguageStandard, WarningId};

    fn msvc_project() -> Project {
        let mut project = Project::new("handmade");
        project.toolchain.dialect = Dialect::Msvc;
        project.options.debug_build = true;
        project.options.static_runtime = true;
        project.options.opt_intrinsics = true;
        project.common_defines = vec!["_CRT_SECURE_NO_WARNINGS".to_string()];

        let mut app = Target::new("win32_handmade", TargetKind::Executable);
        app.warning_level = 4;
        app.warnings_as_errors = true;
        app.warnings_to_ignore = vec![WarningId::from(4201), WarningId::from(4100)];
        app.defines = vec!["HANDMADE_INTERNAL=1".to_string()];
        app.include_dirs = vec![PathBuf::from("code")];
        app.src_files = vec![PathBuf::from("code/win32_handmade.cpp")];
        app.link_libs = vec!["user32.lib".to_string(), "gdi32.lib".to_string()];
        app.subsystem = Some("windows".to_string());
        project.targets.push(app);
        project
    }

    fn gnu_project() -> Project {
        let mut project = Project::new("demo");
        project.toolchain.dialect = Dialect::Gnu;
        project.options.standard = LanguageStandard {
            language: Language::C,
            version: 11,
        };
        let mut lib = Target::new("engine", TargetKind::SharedLibrary);
        lib.warning_level = 3;
        lib.src_files = vec![PathBuf::from("src/a.c"), PathBuf::from("src/b.c")];
        lib.link_libs = vec!["m".to_string()];
        project.targets.push(lib);
        project
    }

    fn position(cmd: &CommandLine, token: &str) -> usize {
        cmd.arguments()
            .iter()
            .position(|a| a == token)
            .unwrap_or_else(|| panic!("missing {token} in {cmd}"))
    }

    #[test]
    fn test_msvc_build_flag_order() {
        let project = msvc_project();
        let cmd = synthesize_build(&project, &project.targets[0]);

        let bin = Path::new("bin").join("win32_handmade.exe");
        let expected = format!(
            "cl.exe /Icode /nologo /Gm- /GR- /EHsc /FC /MTd /Odi /std:c++14 /Z7 /W4 /WX \
             /wd4201 /wd4100 /D_CRT_SECURE_NO_WARNINGS /DHANDMADE_INTERNAL=1 \
             code/win32_handmade.cpp /Fe: {} /Fo: {}{} /link user32.lib gdi32.lib \
             /SUBSYSTEM:WINDOWS /INCREMENTAL:NO /OPT:REF",
            bin.display(),
            project.obj_dir.join("win32_handmade").display(),
            std::path::MAIN_SEPARATOR,
        );
        assert_eq!(cmd.to_string(), expected);
    }

    #[test]
    fn test_build_is_deterministic() {
        let project = msvc_project();
        let first = synthesize_build(&project, &project.targets[0]);
        let second = synthesize_build(&project, &project.targets[0]);
        assert_eq!(first.to_string(), second.to_string());
    }

    #[test]
    fn test_common_defines_precede_target_defines() {
        let project = msvc_project();
        let cmd = synthesize_build(&project, &project.targets[0]);
        assert!(
            position(&cmd, "/D_CRT_SECURE_NO_WARNINGS") < position(&cmd, "/DHANDMADE_INTERNAL=1")
        );
        assert!(position(&cmd, "/wd4201") < position(&cmd, "/wd4100"));
    }

    #[test]
    fn test_preprocess_output_path() {
        let project = msvc_project();
        let target = &project.targets[0];
        let (cmd, output) =
            synthesize_preprocess(&project, target, &target.src_files[0]);

        assert_eq!(
            output,
            project
                .obj_dir
                .join("win32_handmade")
                .join("win32_handmade.i")
        );
        assert!(cmd.arguments().contains(&"/P".to_string()));
        assert!(cmd.arguments().contains(&"/MTd".to_string()));
        assert!(!cmd.arguments().contains(&"/link".to_string()));
        assert_eq!(cmd.arguments().last(), Some(&output.display().to_string()));
    }

    #[test]
    fn test_compile_writes_object() {
        let project = gnu_project();
        let target = &project.targets[0];
        let cmd = synthesize_compile(&project, target, &target.src_files[1]);

        assert_eq!(
            cmd.to_string(),
            format!(
                "cc -c -O0 -std=c11 -g -fPIC -Wall -Wextra src/b.c -o {}",
                project.obj_dir.join("engine").join("b.o").display()
            )
        );
    }

    #[test]
    fn test_gnu_link_shared_library() {
        let project = gnu_project();
        let target = &project.targets[0];
        let cmd = synthesize_link(&project, target);

        let args = cmd.arguments();
        assert!(args.contains(&"-shared".to_string()));
        let object = project.obj_dir.join("engine").join("a.o");
        assert!(position(&cmd, &object.display().to_string()) < position(&cmd, "-o"));
        assert!(position(&cmd, "-o") < position(&cmd, "-lm"));
        assert_eq!(args.last(), Some(&"-Wl,--gc-sections".to_string()));
    }

    #[test]
    fn test_static_library_uses_archiver() {
        let mut project = gnu_project();
        project.targets[0].kind = TargetKind::StaticLibrary;
        project.toolchain.archiver = Some("llvm-ar".to_string());
        let target = &project.targets[0];

        let link = synthesize_link(&project, target);
        assert_eq!(link.program(), "llvm-ar");
        assert_eq!(link.arguments()[0], "rcs");
        assert_eq!(
            link.arguments()[1],
            project.bin_dir.join("libengine.a").display().to_string()
        );

        let build = synthesize_build(&project, target);
        assert!(build.arguments().contains(&"-c".to_string()));
        assert!(!build.arguments().contains(&"-o".to_string()));
    }

    #[test]
    fn test_same_stem_in_two_targets() {
        let mut project = gnu_project();
        let mut game = Target::new("game", TargetKind::Executable);
        game.src_files = vec![PathBuf::from("game/main.c")];
        let mut tool = Target::new("tool", TargetKind::Executable);
        tool.src_files = vec![PathBuf::from("tool/main.c")];
        project.targets = vec![game, tool];
        let (game, tool) = (&project.targets[0], &project.targets[1]);

        let game_obj = object_path(&project, game, &game.src_files[0]);
        let tool_obj = object_path(&project, tool, &tool.src_files[0]);
        assert_ne!(game_obj, tool_obj);
        assert_eq!(game_obj, project.obj_dir.join("game").join("main.o"));
        assert_ne!(
            preprocessed_path(&project, game, &game.src_files[0]),
            preprocessed_path(&project, tool, &tool.src_files[0])
        );
        assert!(
            synthesize_link(&project, game)
                .arguments()
                .contains(&game_obj.display().to_string())
        );
    }

    #[test]
    fn test_compiler_override() {
        let mut project = gnu_project();
        project.toolchain.compiler = Some("clang".to_string());
        let cmd = synthesize_build(&project, &project.targets[0]);
        assert_eq!(cmd.program(), "clang");
    }

    #[test]
    fn test_debug_info_optional() {
        let mut project = gnu_project();
        project.options.generate_debug_info = false;
        let target = &project.targets[0];
        let cmd = synthesize_compile(&project, target, &target.src_files[0]);
        assert!(!cmd.arguments().contains(&"-g".to_string()));
    }
}
