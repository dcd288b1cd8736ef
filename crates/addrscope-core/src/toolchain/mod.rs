//! # External toolchain backend
//!
//! Modules built by GCC-like or console toolchains have no PDB; their addresses are
//! resolved by running the toolchain's own utilities.
//!
//! - [`command`]: command templates and placeholder rendering
//! - [`runner`]: the [`CommandRunner`] seam and the process-spawning default
//! - [`external`]: per-toolchain strategy and [`ExternalToolResolver`]

pub mod command;
pub mod error;
pub mod external;
pub mod runner;

pub use command::{CommandTemplate, Invocation, DEFAULT_MAX_COMMAND_LEN};
pub use error::{ToolchainError, ToolchainResult};
pub use external::{ExternalToolResolver, ExternalToolchain, ToolTemplates};
pub use runner::{CommandRunner, ProcessRunner};
