//! Module and toolchain descriptions.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Compiler/linker family that produced a module
///
/// Selects the resolution backend for every address inside the module.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ToolchainKind
{
    /// Microsoft toolchain; symbols come from a PDB read in-process.
    Native,
    /// GCC/Clang style binaries resolved with `addr2line`, `nm` and `c++filt`.
    Gnu,
    /// Console platform binaries resolved with `ps3bin` and `ps3name`.
    Console,
    /// No known toolchain; addresses in the module never resolve past the module name.
    #[default]
    Unknown,
}

impl fmt::Display for ToolchainKind
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        let label = match self {
            ToolchainKind::Native => "native",
            ToolchainKind::Gnu => "gnu",
            ToolchainKind::Console => "console",
            ToolchainKind::Unknown => "unknown",
        };
        write!(f, "{label}")
    }
}

impl FromStr for ToolchainKind
{
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err>
    {
        match s.to_lowercase().as_str() {
            "native" | "msvc" | "pdb" => Ok(ToolchainKind::Native),
            "gnu" | "gcc" | "clang" | "mingw" => Ok(ToolchainKind::Gnu),
            "console" | "ps3" | "snc" => Ok(ToolchainKind::Console),
            "unknown" | "none" => Ok(ToolchainKind::Unknown),
            _ => Err(format!("Unknown toolchain: {s}. Use 'native', 'gnu', 'console' or 'unknown'")),
        }
    }
}

/// Replacement command templates for one module's external tools
///
/// Each template is a shell-style command line containing `{module}`, `{address}` or
/// `{symbol}` placeholders. `None` keeps the toolchain default.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOverrides
{
    /// Address → function/file/line tool (`addr2line` by default).
    pub symbolize: Option<String>,
    /// Whole-module symbol listing tool (`nm` by default).
    pub symbol_map: Option<String>,
    /// Name demangler (`c++filt` by default).
    pub demangle: Option<String>,
}

/// How to resolve symbols for a module
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolchainDescriptor
{
    pub kind: ToolchainKind,
    /// Directory holding the toolchain binaries. Empty means "search `PATH`".
    pub root: PathBuf,
    /// Prefix prepended to tool names, e.g. `x86_64-w64-mingw32-`.
    pub prefix: String,
    pub overrides: CommandOverrides,
}

impl ToolchainDescriptor
{
    pub fn new(kind: ToolchainKind) -> Self
    {
        Self {
            kind,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self
    {
        self.root = root.into();
        self
    }

    #[must_use]
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self
    {
        self.prefix = prefix.into();
        self
    }

    #[must_use]
    pub fn with_overrides(mut self, overrides: CommandOverrides) -> Self
    {
        self.overrides = overrides;
        self
    }
}

/// A loaded binary image in the profiled process
///
/// Modules are immutable once handed to the [`Resolver`](crate::Resolver); decoded
/// debug data is attached lazily on the first query that lands inside the module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleInfo
{
    /// Load address of the image.
    pub base: u64,
    /// Size of the mapped image in bytes.
    pub size: u64,
    /// Path to the image (or directly to its `.pdb`).
    pub path: PathBuf,
    pub toolchain: ToolchainDescriptor,
}

impl ModuleInfo
{
    pub fn new(base: u64, size: u64, path: impl Into<PathBuf>, toolchain: ToolchainDescriptor) -> Self
    {
        Self {
            base,
            size,
            path: path.into(),
            toolchain,
        }
    }

    /// File name component of [`path`](Self::path), as reported in frames.
    pub fn name(&self) -> String
    {
        module_name(&self.path)
    }

    /// First address past the end of the module.
    pub fn end(&self) -> u64
    {
        self.base.saturating_add(self.size)
    }
}

fn module_name(path: &Path) -> String
{
    path.file_name()
        .map_or_else(|| path.to_string_lossy().into_owned(), |name| name.to_string_lossy().into_owned())
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn test_module_name_is_file_name()
    {
        let module = ModuleInfo::new(0x1000, 0x100, "/opt/app/lib/libfoo.so", ToolchainDescriptor::default());
        assert_eq!(module.name(), "libfoo.so");
        assert_eq!(module.end(), 0x1100);
    }

    #[test]
    fn test_toolchain_kind_from_str()
    {
        assert_eq!("native".parse::<ToolchainKind>().unwrap(), ToolchainKind::Native);
        assert_eq!("MSVC".parse::<ToolchainKind>().unwrap(), ToolchainKind::Native);
        assert_eq!("gcc".parse::<ToolchainKind>().unwrap(), ToolchainKind::Gnu);
        assert_eq!("ps3".parse::<ToolchainKind>().unwrap(), ToolchainKind::Console);
        assert!("borland".parse::<ToolchainKind>().is_err());
    }
}
