//! Errors raised while setting up or invoking external symbol tools.

use thiserror::Error;

use crate::types::ToolchainKind;

/// Why an external tool could not be prepared or did not produce usable output
///
/// Setup errors (`CommandTooLong`, `InvalidTemplate`, `UnsupportedToolchain`) make the
/// module unavailable. Invocation errors (`Spawn`, `ExitStatus`, `EmptyOutput`) only turn
/// the one lookup into a miss.
#[derive(Error, Debug)]
pub enum ToolchainError
{
    /// The tool binary could not be started
    #[error("Failed to start {program}: {source}")]
    Spawn
    {
        /// Program that was run
        program: String,
        /// Underlying OS error
        #[source]
        source: std::io::Error,
    },

    /// The tool ran but reported failure
    #[error("{program} exited with status {code:?}")]
    ExitStatus
    {
        /// Program that was run
        program: String,
        /// Exit code, `None` when killed by a signal
        code: Option<i32>,
    },

    /// The tool succeeded but printed nothing useful
    #[error("{program} produced no output")]
    EmptyOutput
    {
        /// Program that was run
        program: String,
    },

    /// A rendered command line exceeds the configured limit
    #[error("Command line is {len} bytes, limit is {limit}")]
    CommandTooLong
    {
        /// Rendered length
        len: usize,
        /// Configured maximum
        limit: usize,
    },

    /// A command template override could not be parsed
    #[error("Invalid command template: {0}")]
    InvalidTemplate(String),

    /// The toolchain has no external tools (native or unknown modules)
    #[error("No external tools for toolchain '{0}'")]
    UnsupportedToolchain(ToolchainKind),
}

/// Convenience type alias for `Result<T, ToolchainError>`
pub type ToolchainResult<T> = std::result::Result<T, ToolchainError>;
