//! Project configuration.
//!
//! - [`types`]: the in-memory project/target model and its invariants
//! - [`loader`]: `kiln.toml` parsing and path resolution
//! - [`discover`]: recursive source discovery for `source_dirs`

mod discover;
mod error;
mod loader;
mod types;

pub use discover::{SourceDir, find_sources};
pub use error::ConfigError;
pub use loader::{
    BootstrapConfig, MANIFEST_FILE, Manifest, RebuildRecipe, load_manifest,
    load_manifest_from_str,
};
pub use types::{
    CompileOptions, DEFAULT_SUBSYSTEM, Dialect, Language, LanguageStandard, Project, Target,
    TargetKind, Toolchain, WarningId,
};
