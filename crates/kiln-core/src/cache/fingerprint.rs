//! Content fingerprints of preprocessed translation units.

use std::fmt;
use std::path::Path;

use crate::command::CommandLine;
use crate::error::{Error, Result};

/// A 128-bit XXH3 fingerprint.
///
/// Persisted as four `u32` words, most significant first.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint(u128);

impl Fingerprint {
    pub fn from_bytes(data: &[u8]) -> Self {
        Self(xxhash_rust::xxh3::xxh3_128(data))
    }

    /// Fingerprint a file's bytes.
    pub fn from_file(path: &Path) -> Result<Self> {
        let data = std::fs::read(path).map_err(|e| Error::Fingerprint {
            path: path.to_path_buf(),
            source: e,
        })?;
        Ok(Self::from_bytes(&data))
    }

    /// Fingerprint a file's bytes together with the command that consumes
    /// them, so a change to either one changes the fingerprint.
    pub fn from_file_and_command(path: &Path, command: &CommandLine) -> Result<Self> {
        let mut data = std::fs::read(path).map_err(|e| Error::Fingerprint {
            path: path.to_path_buf(),
            source: e,
        })?;
        let tokens = std::iter::once(command.program())
            .chain(command.arguments().iter().map(String::as_str));
        for token in tokens {
            data.push(0);
            data.extend_from_slice(token.as_bytes());
        }
        Ok(Self::from_bytes(&data))
    }

    pub fn from_words(words: [u32; 4]) -> Self {
        let value = words
            .iter()
            .fold(0u128, |acc, word| (acc << 32) | u128::from(*word));
        Self(value)
    }

    pub fn words(&self) -> [u32; 4] {
        [
            (self.0 >> 96) as u32,
            (self.0 >> 64) as u32,
            (self.0 >> 32) as u32,
            self.0 as u32,
        ]
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:032x}", self.0)
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({:08x}..)", self.words()[0])
    }
}
