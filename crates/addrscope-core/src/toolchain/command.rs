//! Command templates for external symbol tools.
//!
//! A template is a program plus arguments in which `{module}`, `{address}` and `{symbol}`
//! are substituted at render time. Default templates name a bare tool (`addr2line`) that
//! is qualified with the toolchain root, binary prefix and platform executable suffix.
//! Override templates come from configuration and are used verbatim after `shlex`
//! splitting.

use std::fmt;
use std::path::{Path, PathBuf};

use super::error::{ToolchainError, ToolchainResult};

pub const MODULE_PLACEHOLDER: &str = "{module}";
pub const ADDRESS_PLACEHOLDER: &str = "{address}";
pub const SYMBOL_PLACEHOLDER: &str = "{symbol}";

/// Default upper bound on a rendered command line, in bytes.
pub const DEFAULT_MAX_COMMAND_LEN: usize = 8192;

/// A program and argument list ready to spawn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation
{
    pub program: PathBuf,
    pub args: Vec<String>,
}

impl Invocation
{
    /// Length of the command line as it would be typed: program and arguments joined by spaces.
    pub fn command_len(&self) -> usize
    {
        self.program.as_os_str().len() + self.args.iter().map(|arg| arg.len() + 1).sum::<usize>()
    }

    pub fn program_name(&self) -> String
    {
        self.program.display().to_string()
    }
}

impl fmt::Display for Invocation
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        write!(f, "{}", self.program.display())?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Placeholder values for one render.
#[derive(Debug, Clone, Copy, Default)]
pub struct Bindings<'a>
{
    pub module: &'a str,
    pub address: &'a str,
    pub symbol: &'a str,
}

impl Bindings<'_>
{
    fn apply(&self, arg: &str) -> String
    {
        arg.replace(MODULE_PLACEHOLDER, self.module)
            .replace(ADDRESS_PLACEHOLDER, self.address)
            .replace(SYMBOL_PLACEHOLDER, self.symbol)
    }
}

/// An unrendered command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandTemplate
{
    program: String,
    args: Vec<String>,
    qualified: bool,
}

impl CommandTemplate
{
    /// Built-in template for `tool`; the program gets root, prefix and suffix at render time.
    pub fn tool(tool: &str, args: &[&str]) -> Self
    {
        Self {
            program: tool.to_string(),
            args: args.iter().map(|arg| (*arg).to_string()).collect(),
            qualified: true,
        }
    }

    /// Parse a user-supplied command line. The program is used exactly as written.
    ///
    /// ## Errors
    ///
    /// [`ToolchainError::InvalidTemplate`] for unbalanced quotes or an empty command.
    pub fn parse(line: &str) -> ToolchainResult<Self>
    {
        let mut words = shlex::split(line)
            .ok_or_else(|| ToolchainError::InvalidTemplate(format!("unbalanced quoting in '{line}'")))?
            .into_iter();
        let program = words
            .next()
            .ok_or_else(|| ToolchainError::InvalidTemplate("empty command".to_string()))?;
        Ok(Self {
            program,
            args: words.collect(),
            qualified: false,
        })
    }

    pub fn program(&self) -> &str
    {
        &self.program
    }

    pub fn args(&self) -> &[String]
    {
        &self.args
    }

    /// Substitute placeholders and resolve the program path.
    ///
    /// ## Errors
    ///
    /// [`ToolchainError::CommandTooLong`] if the result exceeds `limit` bytes.
    pub fn render(
        &self,
        root: &Path,
        prefix: &str,
        bindings: &Bindings<'_>,
        limit: usize,
    ) -> ToolchainResult<Invocation>
    {
        let program = if self.qualified {
            let file = format!("{prefix}{}{}", self.program, std::env::consts::EXE_SUFFIX);
            if root.as_os_str().is_empty() {
                PathBuf::from(file)
            } else {
                root.join(file)
            }
        } else {
            PathBuf::from(bindings.apply(&self.program))
        };

        let invocation = Invocation {
            program,
            args: self.args.iter().map(|arg| bindings.apply(arg)).collect(),
        };

        let len = invocation.command_len();
        if len > limit {
            return Err(ToolchainError::CommandTooLong { len, limit });
        }
        Ok(invocation)
    }
}
