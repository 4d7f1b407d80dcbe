//! ANSI escape codes for terminal output.

use std::io::Write;

pub const RESET: &str = "\x1b[0m";
pub const BOLD: &str = "\x1b[1m";
pub const DIM: &str = "\x1b[2m";
pub const RED: &str = "\x1b[31m";
pub const GREEN: &str = "\x1b[32m";
pub const YELLOW: &str = "\x1b[33m";
pub const CYAN: &str = "\x1b[36m";

/// Flush stdout so a `print!` without newline shows up before a long step.
#[inline]
pub fn flush_stdout() {
    std::io::stdout().flush().ok();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flush_stdout_is_infallible() {
        print!("{BOLD}partial line{RESET} ");
        flush_stdout();
        flush_stdout();
    }
}
