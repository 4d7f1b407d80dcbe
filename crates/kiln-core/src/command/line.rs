//! Structured command lines.

use std::ffi::OsStr;
use std::fmt;
use std::path::Path;
use std::process::Command;

use serde::Serialize;

/// A program plus its discrete argument tokens.
///
/// Tokens are never concatenated with each other: a path containing spaces
/// stays one token all the way to the OS. Joining into a single string only
/// happens for display (logs, dry runs), where such tokens are quoted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct CommandLine {
    program: String,
    args: Vec<String>,
}

impl CommandLine {
    /// Start a command line for `program` with no arguments.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Append one token.
    pub fn arg(&mut self, arg: impl Into<String>) -> &mut Self {
        self.args.push(arg.into());
        self
    }

    /// Append a path as one token.
    pub fn path(&mut self, path: &Path) -> &mut Self {
        self.args.push(path.display().to_string());
        self
    }

    /// Append a flag immediately followed by a value, as one token
    /// (`/Isrc`, `-DNAME`).
    pub fn joined(&mut self, flag: &str, value: impl fmt::Display) -> &mut Self {
        self.args.push(format!("{flag}{value}"));
        self
    }

    /// Append several tokens.
    pub fn args<I, S>(&mut self, args: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn arguments(&self) -> &[String] {
        &self.args
    }

    /// Build a [`Command`] with the same program and tokens.
    pub fn to_command(&self) -> Command {
        let mut cmd = Command::new(OsStr::new(&self.program));
        cmd.args(&self.args);
        cmd
    }
}

fn needs_quotes(token: &str) -> bool {
    token.is_empty() || token.chars().any(|c| c.is_whitespace() || c == '"')
}

fn write_token(f: &mut fmt::Formatter<'_>, token: &str) -> fmt::Result {
    if needs_quotes(token) {
        write!(f, "\"{}\"", token.replace('"', "\\\""))
    } else {
        f.write_str(token)
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_token(f, &self.program)?;
        for arg in &self.args {
            f.write_str(" ")?;
            write_token(f, arg)?;
        }
        Ok(())
    }
}
