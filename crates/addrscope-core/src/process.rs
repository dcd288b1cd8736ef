//! Thin OS helpers: running a command, probing a binary's bitness and listing the
//! modules mapped into a live process.

use std::collections::BTreeMap;
use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};

use object::FileKind;
use tracing::trace;

use crate::error::{AddrscopeError, Result};
use crate::types::{ModuleInfo, ToolchainDescriptor};

/// Run `program` with `args` and capture its stdout and exit status.
///
/// Stdin is closed and stderr discarded; only stdout carries results.
pub fn output_of<I, S>(program: impl AsRef<OsStr>, args: I) -> std::io::Result<Output>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let program = program.as_ref();
    trace!("Running {}", program.to_string_lossy());
    Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stderr(Stdio::null())
        .output()
}

/// Split `command_line` shell-style and run it, returning stdout as text.
///
/// ## Errors
///
/// [`AddrscopeError::InvalidArgument`] for an empty or badly quoted command line,
/// [`AddrscopeError::Io`] if the program could not be started.
pub fn run_command_line(command_line: &str) -> Result<String>
{
    let words = shlex::split(command_line)
        .ok_or_else(|| AddrscopeError::InvalidArgument(format!("unbalanced quoting in '{command_line}'")))?;
    let (program, args) = words
        .split_first()
        .ok_or_else(|| AddrscopeError::InvalidArgument("empty command line".to_string()))?;
    let output = output_of(program, args)?;
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Whether the executable or object file at `path` targets a 64-bit architecture.
///
/// ## Errors
///
/// [`AddrscopeError::Io`] if the file cannot be read, [`AddrscopeError::InvalidArgument`]
/// if it is not a recognised binary format.
pub fn is_64bit_binary(path: &Path) -> Result<bool>
{
    let data = fs::read(path)?;
    let kind = FileKind::parse(&*data)
        .map_err(|e| AddrscopeError::InvalidArgument(format!("{}: {e}", path.display())))?;
    match kind {
        FileKind::Elf64 | FileKind::Pe64 | FileKind::MachO64 | FileKind::MachOFat64 | FileKind::Xcoff64 => Ok(true),
        FileKind::Elf32 | FileKind::Pe32 | FileKind::MachO32 | FileKind::MachOFat32 | FileKind::Xcoff32 => Ok(false),
        other => Err(AddrscopeError::InvalidArgument(format!(
            "{}: cannot tell bitness of {other:?} file",
            path.display()
        ))),
    }
}

/// Modules mapped into process `pid`, read from `/proc/<pid>/maps`.
///
/// Every file-backed mapping of the same path is merged into one module spanning from
/// its lowest start to its highest end. All modules get `toolchain`.
pub fn modules_of_process(pid: u32, toolchain: &ToolchainDescriptor) -> Result<Vec<ModuleInfo>>
{
    let maps = fs::read_to_string(format!("/proc/{pid}/maps"))?;
    Ok(modules_from_maps(&maps, toolchain))
}

/// Parse the text of a `/proc/<pid>/maps` file.
pub fn modules_from_maps(maps: &str, toolchain: &ToolchainDescriptor) -> Vec<ModuleInfo>
{
    let mut ranges: BTreeMap<PathBuf, (u64, u64)> = BTreeMap::new();

    for line in maps.lines() {
        // start-end perms offset dev inode path
        let Some(range) = line.split_whitespace().next() else {
            continue;
        };
        let Some(path) = mapped_path(line) else {
            continue;
        };
        let Some((start, end)) = range.split_once('-') else {
            continue;
        };
        let (Ok(start), Ok(end)) = (u64::from_str_radix(start, 16), u64::from_str_radix(end, 16)) else {
            continue;
        };

        let entry = ranges.entry(PathBuf::from(path)).or_insert((start, end));
        entry.0 = entry.0.min(start);
        entry.1 = entry.1.max(end);
    }

    let mut modules: Vec<_> = ranges
        .into_iter()
        .map(|(path, (start, end))| ModuleInfo::new(start, end - start, path, toolchain.clone()))
        .collect();
    modules.sort_by_key(|module| module.base);
    modules
}

/// Path column of a maps line, if it names a file.
fn mapped_path(line: &str) -> Option<&str>
{
    let mut rest = line;
    for _ in 0..5 {
        rest = rest.trim_start();
        let end = rest.find(char::is_whitespace)?;
        rest = &rest[end..];
    }
    let path = rest.trim();
    path.starts_with('/').then_some(path)
}
