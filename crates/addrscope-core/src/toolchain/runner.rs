//! Running rendered tool invocations.
//!
//! [`CommandRunner`] is the seam between the external-tool backend and the OS. The
//! default [`ProcessRunner`] spawns a child process per call and blocks until it exits;
//! tests substitute a runner that returns canned output.

use tracing::trace;

use super::command::Invocation;
use super::error::{ToolchainError, ToolchainResult};
use crate::process::output_of;

/// Executes an [`Invocation`] and returns its standard output.
pub trait CommandRunner: Send + Sync
{
    /// Run to completion.
    ///
    /// ## Errors
    ///
    /// [`ToolchainError::Spawn`] if the program could not start,
    /// [`ToolchainError::ExitStatus`] on a non-zero exit,
    /// [`ToolchainError::EmptyOutput`] when stdout is blank.
    fn run(&self, invocation: &Invocation) -> ToolchainResult<String>;
}

/// Runs invocations as child processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner;

impl CommandRunner for ProcessRunner
{
    fn run(&self, invocation: &Invocation) -> ToolchainResult<String>
    {
        let output = output_of(&invocation.program, &invocation.args).map_err(|source| ToolchainError::Spawn {
            program: invocation.program_name(),
            source,
        })?;

        if !output.status.success() {
            return Err(ToolchainError::ExitStatus {
                program: invocation.program_name(),
                code: output.status.code(),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        trace!("{} printed {} bytes", invocation.program_name(), stdout.len());
        if stdout.trim().is_empty() {
            return Err(ToolchainError::EmptyOutput {
                program: invocation.program_name(),
            });
        }
        Ok(stdout)
    }
}
