//! Child process execution.
//!
//! Exactly one child is alive at a time. Both of its output streams are
//! drained to EOF before the exit status is collected.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};

use crate::command::CommandLine;
use crate::error::{Error, Result};

/// Outcome of one child process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    /// 0 on success.
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Something that can run a command line to completion.
///
/// A nonzero exit is a normal [`ProcessOutput`]; `Err` is reserved for
/// failures where no child ever ran.
pub trait Runner {
    fn run(&mut self, cmd: &CommandLine) -> Result<ProcessOutput>;
}

impl<R: Runner + ?Sized> Runner for &mut R {
    fn run(&mut self, cmd: &CommandLine) -> Result<ProcessOutput> {
        (**self).run(cmd)
    }
}

/// Runs commands as real OS child processes.
#[derive(Debug, Clone, Default)]
pub struct ProcessRunner {
    working_dir: Option<PathBuf>,
}

impl ProcessRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run every child with `dir` as its working directory.
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            working_dir: Some(dir.into()),
        }
    }

    pub fn working_dir(&self) -> Option<&Path> {
        self.working_dir.as_deref()
    }
}

impl Runner for ProcessRunner {
    fn run(&mut self, cmd: &CommandLine) -> Result<ProcessOutput> {
        tracing::debug!("Running: {}", cmd);

        let mut command = cmd.to_command();
        command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = &self.working_dir {
            command.current_dir(dir);
        }

        let mut child = command.spawn().map_err(|e| Error::Spawn {
            program: cmd.program().to_string(),
            source: e,
        })?;

        let stderr_pipe = child.stderr.take();
        let stderr_thread = thread::spawn(move || {
            let mut buf = Vec::new();
            if let Some(mut pipe) = stderr_pipe {
                pipe.read_to_end(&mut buf).ok();
            }
            buf
        });

        let mut stdout = Vec::new();
        let read = match child.stdout.take() {
            Some(mut pipe) => pipe.read_to_end(&mut stdout).map(|_| stdout),
            None => Ok(stdout),
        };
        let (status, stdout, stderr) = reap(&mut child, read, stderr_thread)?;

        let exit_code = exit_code(status);
        tracing::debug!("{} exited with {}", cmd.program(), exit_code);

        Ok(ProcessOutput {
            exit_code,
            stdout: String::from_utf8_lossy(&stdout).into_owned(),
            stderr: String::from_utf8_lossy(&stderr).into_owned(),
        })
    }
}

/// Wait for the child and the stderr reader, even when reading stdout failed.
fn reap(
    child: &mut Child,
    stdout: std::io::Result<Vec<u8>>,
    stderr: JoinHandle<Vec<u8>>,
) -> std::io::Result<(ExitStatus, Vec<u8>, Vec<u8>)> {
    if stdout.is_err() {
        // Nothing drains stdout any more, so the child could block forever.
        child.kill().ok();
    }
    let status = child.wait();
    let stderr = stderr.join().unwrap_or_default();
    Ok((status?, stdout?, stderr))
}

/// Numeric exit code; a signal-terminated child reports `-signal`.
fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return -signal;
        }
    }
    crate::error::SENTINEL_EXIT_CODE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spawn_failure_is_error() {
        let mut runner = ProcessRunner::new();
        let cmd = CommandLine::new("kiln-definitely-not-a-real-program");
        let err = runner.run(&cmd).unwrap_err();
        assert!(matches!(err, Error::Spawn { ref program, .. } if program == "kiln-definitely-not-a-real-program"));
        assert_eq!(err.exit_code(), crate::error::SENTINEL_EXIT_CODE);
    }

    #[cfg(unix)]
    #[test]
    fn test_captures_both_streams_and_code() {
        let mut runner = ProcessRunner::new();
        let mut cmd = CommandLine::new("sh");
        cmd.args(["-c", "echo out; echo err 1>&2; exit 3"]);
        let output = runner.run(&cmd).unwrap();
        assert_eq!(output.exit_code, 3);
        assert_eq!(output.stdout, "out\n");
        assert_eq!(output.stderr, "err\n");
        assert!(!output.success());
    }

    #[cfg(unix)]
    #[test]
    fn test_large_stderr_does_not_block() {
        let mut runner = ProcessRunner::new();
        let mut cmd = CommandLine::new("sh");
        // Well past a typical 64 KiB pipe buffer on both streams.
        cmd.args([
            "-c",
            "i=0; while [ $i -lt 4000 ]; do echo 0123456789012345678901234567890123456789 1>&2; echo x; i=$((i+1)); done",
        ]);
        let output = runner.run(&cmd).unwrap();
        assert!(output.success());
        assert_eq!(output.stderr.lines().count(), 4000);
        assert_eq!(output.stdout.lines().count(), 4000);
    }

    #[cfg(unix)]
    #[test]
    fn test_working_dir() {
        let temp = tempfile::tempdir().unwrap();
        std::fs::write(temp.path().join("marker.txt"), "here").unwrap();
        let mut runner = ProcessRunner::in_dir(temp.path());
        let mut cmd = CommandLine::new("cat");
        cmd.arg("marker.txt");
        let output = runner.run(&cmd).unwrap();
        assert_eq!(output.stdout, "here");
    }

    #[cfg(unix)]
    #[test]
    fn test_stdout_read_error_still_reaps_child() {
        let mut child = std::process::Command::new("sh")
            .args(["-c", "sleep 30"])
            .stdin(Stdio::null())
            .spawn()
            .unwrap();

        let broken = Err(std::io::Error::other("stdout went away"));
        let err = reap(&mut child, broken, thread::spawn(Vec::new)).unwrap_err();

        assert_eq!(err.to_string(), "stdout went away");
        assert!(child.try_wait().unwrap().is_some());
    }

    #[cfg(unix)]
    #[test]
    fn test_stdin_is_closed() {
        let mut runner = ProcessRunner::new();
        let cmd = CommandLine::new("cat");
        let output = runner.run(&cmd).unwrap();
        assert!(output.success());
        assert!(output.stdout.is_empty());
    }
}
