//! Toolchain flag spelling.
//!
//! The synthesizer decides *which* flags appear and in what order; a
//! [`FlagDialect`] decides how each one is spelled for a given toolchain.

use std::path::{MAIN_SEPARATOR, Path, PathBuf};

use crate::config::{CompileOptions, Dialect, LanguageStandard, Target, TargetKind, WarningId};

use super::line::CommandLine;

/// The kind of toolchain invocation being assembled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Invocation {
    /// Compile and link every source in one call.
    Build,
    /// Preprocessor only.
    Preprocess,
    /// One source to one object.
    Compile,
    /// Objects to a binary.
    Link,
}

/// Flag spelling for one toolchain family.
pub trait FlagDialect: Sync {
    /// Default compiler driver program.
    fn compiler(&self) -> &'static str;
    /// Default static-library archiver program.
    fn archiver(&self) -> &'static str;
    fn object_extension(&self) -> &'static str;
    /// File name of the final artifact for a target.
    fn binary_file_name(&self, name: &str, kind: TargetKind) -> String;

    fn include_dir(&self, cmd: &mut CommandLine, dir: &Path);
    fn base_flags(&self, cmd: &mut CommandLine, invocation: Invocation);
    fn runtime_flags(&self, cmd: &mut CommandLine, options: &CompileOptions, invocation: Invocation);
    fn optimization_flags(&self, cmd: &mut CommandLine, options: &CompileOptions);
    fn standard_flag(&self, cmd: &mut CommandLine, standard: LanguageStandard);
    fn debug_info_flag(&self, cmd: &mut CommandLine);
    fn shared_library_flag(&self, cmd: &mut CommandLine, invocation: Invocation);
    fn ignore_standard_includes_flag(&self, cmd: &mut CommandLine);
    fn warning_level_flag(&self, cmd: &mut CommandLine, level: u8);
    fn warnings_as_errors_flag(&self, cmd: &mut CommandLine);
    fn suppress_warning(&self, cmd: &mut CommandLine, warning: &WarningId);
    fn define(&self, cmd: &mut CommandLine, define: &str);

    /// Output flags for a single-invocation build or a link.
    fn binary_output(&self, cmd: &mut CommandLine, binary: &Path, obj_dir: &Path);
    /// Output flags when several sources are compiled to objects at once.
    fn objects_output(&self, cmd: &mut CommandLine, obj_dir: &Path);
    fn object_output(&self, cmd: &mut CommandLine, object: &Path);
    fn preprocessed_output(&self, cmd: &mut CommandLine, preprocessed: &Path);

    /// Link-stage flags, in order: library search path, libraries,
    /// subsystem, entry point, incremental-link toggle, dead-code stripping.
    fn link_flags(&self, cmd: &mut CommandLine, options: &CompileOptions, target: &Target);

    /// Archive objects into a static library.
    fn archive(&self, program: &str, binary: &Path, objects: &[PathBuf]) -> CommandLine;
}

/// The dialect implementation for a configured [`Dialect`].
pub fn dialect_for(dialect: Dialect) -> &'static dyn FlagDialect {
    match dialect {
        Dialect::Msvc => &Msvc,
        Dialect::Gnu => &Gnu,
    }
}

/// `cl.exe` / `lib.exe` spelling.
#[derive(Debug, Clone, Copy, Default)]
pub struct Msvc;

impl FlagDialect for Msvc {
    fn compiler(&self) -> &'static str {
        "cl.exe"
    }

    fn archiver(&self) -> &'static str {
        "lib.exe"
    }

    fn object_extension(&self) -> &'static str {
        "obj"
    }

    fn binary_file_name(&self, name: &str, kind: TargetKind) -> String {
        match kind {
            TargetKind::Executable => format!("{name}.exe"),
            TargetKind::SharedLibrary => format!("{name}.dll"),
            TargetKind::StaticLibrary => format!("{name}.lib"),
        }
    }

    fn include_dir(&self, cmd: &mut CommandLine, dir: &Path) {
        cmd.joined("/I", dir.display());
    }

    fn base_flags(&self, cmd: &mut CommandLine, invocation: Invocation) {
        cmd.args(["/nologo", "/Gm-", "/GR-", "/EHsc", "/FC"]);
        match invocation {
            Invocation::Preprocess => {
                cmd.arg("/P");
            }
            Invocation::Compile => {
                cmd.arg("/c");
            }
            Invocation::Build | Invocation::Link => {}
        }
    }

    fn runtime_flags(&self, cmd: &mut CommandLine, options: &CompileOptions, _: Invocation) {
        let mut flag = String::from(if options.static_runtime { "/MT" } else { "/MD" });
        if options.debug_build {
            flag.push('d');
        }
        cmd.arg(flag);
    }

    fn optimization_flags(&self, cmd: &mut CommandLine, options: &CompileOptions) {
        let mut flag = match options.opt_level {
            0 => String::from("/Od"),
            // cl has no /O3
            level => format!("/O{}", level.min(2)),
        };
        if options.opt_intrinsics {
            flag.push('i');
        }
        cmd.arg(flag);
    }

    fn standard_flag(&self, cmd: &mut CommandLine, standard: LanguageStandard) {
        cmd.joined("/std:", standard);
    }

    fn debug_info_flag(&self, cmd: &mut CommandLine) {
        cmd.arg("/Z7");
    }

    fn shared_library_flag(&self, cmd: &mut CommandLine, _: Invocation) {
        cmd.arg("/LD");
    }

    fn ignore_standard_includes_flag(&self, cmd: &mut CommandLine) {
        cmd.arg("/X");
    }

    fn warning_level_flag(&self, cmd: &mut CommandLine, level: u8) {
        cmd.joined("/W", level.min(4));
    }

    fn warnings_as_errors_flag(&self, cmd: &mut CommandLine) {
        cmd.arg("/WX");
    }

    fn suppress_warning(&self, cmd: &mut CommandLine, warning: &WarningId) {
        cmd.joined("/wd", warning);
    }

    fn define(&self, cmd: &mut CommandLine, define: &str) {
        cmd.joined("/D", define);
    }

    fn binary_output(&self, cmd: &mut CommandLine, binary: &Path, obj_dir: &Path) {
        cmd.arg("/Fe:").path(binary);
        self.objects_output(cmd, obj_dir);
    }

    fn objects_output(&self, cmd: &mut CommandLine, obj_dir: &Path) {
        cmd.arg("/Fo:")
            .arg(format!("{}{MAIN_SEPARATOR}", obj_dir.display()));
    }

    fn object_output(&self, cmd: &mut CommandLine, object: &Path) {
        cmd.arg("/Fo:").path(object);
    }

    fn preprocessed_output(&self, cmd: &mut CommandLine, preprocessed: &Path) {
        cmd.arg("/Fi:").path(preprocessed);
    }

    fn link_flags(&self, cmd: &mut CommandLine, options: &CompileOptions, target: &Target) {
        cmd.arg("/link");
        if let Some(dir) = &target.link_dir {
            cmd.joined("/LIBPATH:", dir.display());
        }
        cmd.args(target.link_libs.iter().cloned());
        if target.kind == TargetKind::Executable {
            cmd.joined("/SUBSYSTEM:", target.subsystem_upper());
        }
        if let Some(entry) = &target.entry_point {
            cmd.joined("/ENTRY:", entry);
        }
        cmd.arg(if options.incremental_link {
            "/INCREMENTAL"
        } else {
            "/INCREMENTAL:NO"
        });
        cmd.arg(if options.remove_unreferenced {
            "/OPT:REF"
        } else {
            "/OPT:NOREF"
        });
    }

    fn archive(&self, program: &str, binary: &Path, objects: &[PathBuf]) -> CommandLine {
        let mut cmd = CommandLine::new(program);
        cmd.arg("/nologo").joined("/OUT:", binary.display());
        for object in objects {
            cmd.path(object);
        }
        cmd
    }
}

/// gcc / clang spelling.
#[derive(Debug, Clone, Copy, Default)]
pub struct Gnu;

impl Gnu {
    fn is_library_file(lib: &str) -> bool {
        lib.contains('/') || lib.contains('\\') || Path::new(lib).extension().is_some()
    }
}

impl FlagDialect for Gnu {
    fn compiler(&self) -> &'static str {
        "cc"
    }

    fn archiver(&self) -> &'static str {
        "ar"
    }

    fn object_extension(&self) -> &'static str {
        "o"
    }

    fn binary_file_name(&self, name: &str, kind: TargetKind) -> String {
        match kind {
            TargetKind::Executable if cfg!(windows) => format!("{name}.exe"),
            TargetKind::Executable => name.to_string(),
            TargetKind::SharedLibrary if cfg!(windows) => format!("{name}.dll"),
            TargetKind::SharedLibrary if cfg!(target_os = "macos") => format!("lib{name}.dylib"),
            TargetKind::SharedLibrary => format!("lib{name}.so"),
            TargetKind::StaticLibrary => format!("lib{name}.a"),
        }
    }

    fn include_dir(&self, cmd: &mut CommandLine, dir: &Path) {
        cmd.joined("-I", dir.display());
    }

    fn base_flags(&self, cmd: &mut CommandLine, invocation: Invocation) {
        match invocation {
            Invocation::Preprocess => {
                cmd.arg("-E");
            }
            Invocation::Compile => {
                cmd.arg("-c");
            }
            Invocation::Build | Invocation::Link => {}
        }
    }

    fn runtime_flags(&self, cmd: &mut CommandLine, options: &CompileOptions, invocation: Invocation) {
        if options.debug_build {
            cmd.arg("-D_DEBUG");
        }
        let links = matches!(invocation, Invocation::Build | Invocation::Link);
        if options.static_runtime && links {
            cmd.arg("-static");
        }
    }

    fn optimization_flags(&self, cmd: &mut CommandLine, options: &CompileOptions) {
        cmd.joined("-O", options.opt_level.min(3));
    }

    fn standard_flag(&self, cmd: &mut CommandLine, standard: LanguageStandard) {
        cmd.joined("-std=", standard);
    }

    fn debug_info_flag(&self, cmd: &mut CommandLine) {
        cmd.arg("-g");
    }

    fn shared_library_flag(&self, cmd: &mut CommandLine, invocation: Invocation) {
        match invocation {
            Invocation::Build => {
                cmd.args(["-fPIC", "-shared"]);
            }
            Invocation::Compile => {
                cmd.arg("-fPIC");
            }
            Invocation::Link => {
                cmd.arg("-shared");
            }
            Invocation::Preprocess => {}
        }
    }

    fn ignore_standard_includes_flag(&self, cmd: &mut CommandLine) {
        cmd.arg("-nostdinc");
    }

    fn warning_level_flag(&self, cmd: &mut CommandLine, level: u8) {
        match level {
            0 => {
                cmd.arg("-w");
            }
            1 | 2 => {
                cmd.arg("-Wall");
            }
            3 => {
                cmd.args(["-Wall", "-Wextra"]);
            }
            _ => {
                cmd.args(["-Wall", "-Wextra", "-Wpedantic"]);
            }
        }
    }

    fn warnings_as_errors_flag(&self, cmd: &mut CommandLine) {
        cmd.arg("-Werror");
    }

    fn suppress_warning(&self, cmd: &mut CommandLine, warning: &WarningId) {
        cmd.joined("-Wno-", warning);
    }

    fn define(&self, cmd: &mut CommandLine, define: &str) {
        cmd.joined("-D", define);
    }

    fn binary_output(&self, cmd: &mut CommandLine, binary: &Path, _obj_dir: &Path) {
        cmd.arg("-o").path(binary);
    }

    fn objects_output(&self, _cmd: &mut CommandLine, _obj_dir: &Path) {
        // gcc names multi-source objects after their sources in the working directory.
    }

    fn object_output(&self, cmd: &mut CommandLine, object: &Path) {
        cmd.arg("-o").path(object);
    }

    fn preprocessed_output(&self, cmd: &mut CommandLine, preprocessed: &Path) {
        cmd.arg("-o").path(preprocessed);
    }

    fn link_flags(&self, cmd: &mut CommandLine, options: &CompileOptions, target: &Target) {
        if let Some(dir) = &target.link_dir {
            cmd.joined("-L", dir.display());
        }
        for lib in &target.link_libs {
            if Self::is_library_file(lib) {
                cmd.arg(lib.clone());
            } else {
                cmd.joined("-l", lib);
            }
        }
        if let Some(entry) = &target.entry_point {
            cmd.joined("-Wl,-e,", entry);
        }
        if options.remove_unreferenced {
            cmd.arg("-Wl,--gc-sections");
        }
    }

    fn archive(&self, program: &str, binary: &Path, objects: &[PathBuf]) -> CommandLine {
        let mut cmd = CommandLine::new(program);
        cmd.arg("rcs").path(binary);
        for object in objects {
            cmd.path(object);
        }
        cmd
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options() -> CompileOptions {
        CompileOptions::default()
    }

    #[test]
    fn test_msvc_runtime_flag() {
        let mut opts = options();
        opts.static_runtime = true;
        opts.debug_build = true;
        let mut cmd = CommandLine::new("cl.exe");
        Msvc.runtime_flags(&mut cmd, &opts, Invocation::Compile);
        assert_eq!(cmd.arguments(), ["/MTd"]);

        opts.static_runtime = false;
        opts.debug_build = false;
        let mut cmd = CommandLine::new("cl.exe");
        Msvc.runtime_flags(&mut cmd, &opts, Invocation::Compile);
        assert_eq!(cmd.arguments(), ["/MD"]);
    }

    #[test]
    fn test_msvc_optimization_flag() {
        let mut opts = options();
        opts.opt_intrinsics = true;
        let mut cmd = CommandLine::new("cl.exe");
        Msvc.optimization_flags(&mut cmd, &opts);
        opts.opt_level = 3;
        opts.opt_intrinsics = false;
        Msvc.optimization_flags(&mut cmd, &opts);
        assert_eq!(cmd.arguments(), ["/Odi", "/O2"]);
    }

    #[test]
    fn test_gnu_warning_levels() {
        let mut cmd = CommandLine::new("cc");
        Gnu.warning_level_flag(&mut cmd, 0);
        Gnu.warning_level_flag(&mut cmd, 4);
        assert_eq!(cmd.arguments(), ["-w", "-Wall", "-Wextra", "-Wpedantic"]);
    }

    #[test]
    fn test_gnu_libraries() {
        let mut target = Target::new("app", TargetKind::Executable);
        target.link_libs = vec!["m".to_string(), "vendor/libfoo.a".to_string()];
        target.entry_point = Some("start".to_string());
        let mut cmd = CommandLine::new("cc");
        Gnu.link_flags(&mut cmd, &options(), &target);
        assert_eq!(
            cmd.arguments(),
            ["-lm", "vendor/libfoo.a", "-Wl,-e,start", "-Wl,--gc-sections"]
        );
    }

    #[test]
    fn test_msvc_static_library_has_no_subsystem() {
        let target = Target::new("core", TargetKind::StaticLibrary);
        let mut cmd = CommandLine::new("cl.exe");
        Msvc.link_flags(&mut cmd, &options(), &target);
        assert!(!cmd.arguments().iter().any(|a| a.starts_with("/SUBSYSTEM")));
    }

    #[test]
    fn test_binary_names() {
        assert_eq!(
            Msvc.binary_file_name("core", TargetKind::StaticLibrary),
            "core.lib"
        );
        assert_eq!(Gnu.binary_file_name("core", TargetKind::StaticLibrary), "libcore.a");
    }
}
