//! Core engine for the kiln incremental build orchestrator.
//!
//! This crate provides:
//! - Project configuration and `kiln.toml` loading
//! - Command synthesis for MSVC and GNU-style toolchains
//! - Child process execution
//! - Preprocessed-output fingerprinting for incremental builds
//! - The build driver and self-rebuild bootstrap

pub mod bootstrap;
pub mod cache;
pub mod command;
pub mod config;
pub mod driver;
pub mod error;
pub mod process;
pub mod toolchain;

pub use bootstrap::{FINALIZE_ARG, Recipe, SelfRebuild, finalize, run_finalize_if_requested};
pub use cache::{Decision, Fingerprint, FingerprintTable};
pub use command::{
    CommandLine, synthesize_build, synthesize_compile, synthesize_link, synthesize_preprocess,
};
pub use config::{
    BootstrapConfig, ConfigError, MANIFEST_FILE, Manifest, Project, Target, TargetKind,
    load_manifest, load_manifest_from_str,
};
pub use driver::{
    BuildDriver, BuildMode, BuildObserver, BuildReport, LinkPolicy, TargetPhase, TargetReport,
};
pub use error::{Error, Result, SENTINEL_EXIT_CODE, Stage};
pub use process::{ProcessOutput, ProcessRunner, Runner};
pub use toolchain::ResolvedToolchain;
