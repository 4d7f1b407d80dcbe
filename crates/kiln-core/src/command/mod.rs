//! Toolchain command lines.
//!
//! [`synth`] turns a project and target into [`CommandLine`]s; the
//! [`FlagDialect`] in use decides how each flag is spelled.

mod dialect;
mod line;
mod synth;

pub use dialect::{FlagDialect, Gnu, Invocation, Msvc, dialect_for};
pub use line::CommandLine;
pub use synth::{
    PREPROCESSED_EXTENSION, archiver_program, binary_path, compiler_program, object_path,
    object_paths, preprocessed_path, synthesize_build, synthesize_compile, synthesize_link,
    synthesize_preprocess,
};
