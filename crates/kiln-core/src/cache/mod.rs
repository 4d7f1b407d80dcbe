//! Change detection for incremental builds.
//!
//! A source is recompiled when the fingerprint of its preprocessed output
//! differs from the one recorded after the last successful build.

mod fingerprint;
mod table;

pub use fingerprint::Fingerprint;
pub use table::{Decision, FingerprintTable};
