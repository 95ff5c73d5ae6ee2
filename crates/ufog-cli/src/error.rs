//! CLI-level error type and exit-code mapping.
//!
//! Mirrors the teacher's `anyhow::Result` + `std::process::exit` pattern
//! in `phago_cli::main`'s `Mcp` subcommand, generalized with an explicit
//! variant-to-exit-code table rather than a single always-1 exit path.

use std::fmt;

/// Exit codes returned by `ufog`'s `main` (spec §6).
#[derive(Debug)]
pub enum CliError {
    /// Invalid CLI arguments or an invalid/unparsable config file.
    Config(String),
    /// The run failed, or the remote server rejected/could not be reached.
    Runtime(String),
    /// Interrupted by Ctrl-C.
    Interrupted,
}

impl CliError {
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Config(_) => 2,
            CliError::Runtime(_) => 3,
            CliError::Interrupted => 130,
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Config(msg) => write!(f, "configuration error: {msg}"),
            CliError::Runtime(msg) => write!(f, "runtime error: {msg}"),
            CliError::Interrupted => write!(f, "interrupted"),
        }
    }
}

impl std::error::Error for CliError {}
