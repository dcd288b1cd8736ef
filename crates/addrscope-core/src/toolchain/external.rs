//! # External-tool backend
//!
//! Resolves module offsets by running the toolchain's own utilities and parsing what
//! they print.
//!
//! ## Per-toolchain strategy
//!
//! [`ExternalToolchain`] bundles, for one toolchain family, the three default command
//! templates and the two output parsers:
//!
//! | | GNU | Console |
//! |---|---|---|
//! | symbolize | `addr2line -f -e {module} {address}` | `ps3bin -a2l {address} -i {module}` |
//! | symbol map | `nm -C --print-size --numeric-sort --line-numbers {module}` | `ps3bin -dsy {module}` |
//! | demangle | `c++filt {symbol}` | `ps3name {symbol}` |
//!
//! ## Failure handling
//!
//! A tool that cannot start, exits non-zero, prints nothing, or reports a missing file
//! makes that one lookup a miss. The frame keeps its defaults and nothing is retried.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use once_cell::sync::OnceCell;
use tracing::{debug, warn};

use super::command::{Bindings, CommandTemplate, Invocation};
use super::error::{ToolchainError, ToolchainResult};
use super::runner::CommandRunner;
use crate::symbols::demangle::{demangle_rust, first_output_line, looks_mangled};
use crate::symbols::parse::{parse_addr2line, parse_console_a2l};
use crate::symbols::SymbolMap;
use crate::types::{StackFrame, ToolchainDescriptor, ToolchainKind};

/// Output fragments tools print instead of failing when the module is missing.
const MISSING_FILE_MARKERS: [&str; 2] = ["No such file", "not found"];

/// Widest address the symbolize template will ever receive, used for setup checks.
const WIDEST_ADDRESS: &str = "0xffffffffffffffff";

/// Toolchain family served by external tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExternalToolchain
{
    Gnu,
    Console,
}

impl ExternalToolchain
{
    /// Strategy for `kind`.
    ///
    /// ## Errors
    ///
    /// [`ToolchainError::UnsupportedToolchain`] for native and unknown modules.
    pub fn for_kind(kind: ToolchainKind) -> ToolchainResult<Self>
    {
        match kind {
            ToolchainKind::Gnu => Ok(ExternalToolchain::Gnu),
            ToolchainKind::Console => Ok(ExternalToolchain::Console),
            ToolchainKind::Native | ToolchainKind::Unknown => Err(ToolchainError::UnsupportedToolchain(kind)),
        }
    }

    pub fn default_templates(self) -> ToolTemplates
    {
        match self {
            ExternalToolchain::Gnu => ToolTemplates {
                symbolize: CommandTemplate::tool("addr2line", &["-f", "-e", "{module}", "{address}"]),
                symbol_map: CommandTemplate::tool(
                    "nm",
                    &["-C", "--print-size", "--numeric-sort", "--line-numbers", "{module}"],
                ),
                demangle: CommandTemplate::tool("c++filt", &["{symbol}"]),
            },
            ExternalToolchain::Console => ToolTemplates {
                symbolize: CommandTemplate::tool("ps3bin", &["-a2l", "{address}", "-i", "{module}"]),
                symbol_map: CommandTemplate::tool("ps3bin", &["-dsy", "{module}"]),
                demangle: CommandTemplate::tool("ps3name", &["{symbol}"]),
            },
        }
    }

    /// Fill `frame` from symbolize output.
    pub fn parse_frame(self, output: &str, frame: &mut StackFrame)
    {
        match self {
            ExternalToolchain::Gnu => parse_addr2line(output, frame),
            ExternalToolchain::Console => parse_console_a2l(output, frame),
        }
    }

    /// Build a sorted symbol map from symbol-map output.
    pub fn parse_symbol_map(self, output: &str) -> SymbolMap
    {
        match self {
            ExternalToolchain::Gnu => SymbolMap::parse_gnu(output),
            ExternalToolchain::Console => SymbolMap::parse_console(output),
        }
    }
}

/// The three command templates used for one module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolTemplates
{
    pub symbolize: CommandTemplate,
    pub symbol_map: CommandTemplate,
    pub demangle: CommandTemplate,
}

impl ToolTemplates
{
    /// Toolchain defaults with any configured overrides applied.
    pub fn for_descriptor(toolchain: ExternalToolchain, descriptor: &ToolchainDescriptor) -> ToolchainResult<Self>
    {
        let mut templates = toolchain.default_templates();
        let overrides = &descriptor.overrides;
        if let Some(line) = &overrides.symbolize {
            templates.symbolize = CommandTemplate::parse(line)?;
        }
        if let Some(line) = &overrides.symbol_map {
            templates.symbol_map = CommandTemplate::parse(line)?;
        }
        if let Some(line) = &overrides.demangle {
            templates.demangle = CommandTemplate::parse(line)?;
        }
        Ok(templates)
    }
}

/// Resolves offsets inside one module with external tools
///
/// Built once per module on first use. The symbol map is only produced if an address
/// identifier is requested.
pub struct ExternalToolResolver
{
    toolchain: ExternalToolchain,
    templates: ToolTemplates,
    root: PathBuf,
    prefix: String,
    module: String,
    runner: Arc<dyn CommandRunner>,
    max_command_len: usize,
    symbol_map: OnceCell<SymbolMap>,
}

impl fmt::Debug for ExternalToolResolver
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        f.debug_struct("ExternalToolResolver")
            .field("toolchain", &self.toolchain)
            .field("module", &self.module)
            .field("templates", &self.templates)
            .finish_non_exhaustive()
    }
}

impl ExternalToolResolver
{
    /// Prepare the tools for `module_path`.
    ///
    /// ## Errors
    ///
    /// [`ToolchainError::UnsupportedToolchain`] for non-external kinds,
    /// [`ToolchainError::InvalidTemplate`] for a bad override,
    /// [`ToolchainError::CommandTooLong`] if the symbolize or symbol-map command cannot
    /// fit within `max_command_len`.
    pub fn new(
        descriptor: &ToolchainDescriptor,
        module_path: &Path,
        runner: Arc<dyn CommandRunner>,
        max_command_len: usize,
    ) -> ToolchainResult<Self>
    {
        let toolchain = ExternalToolchain::for_kind(descriptor.kind)?;
        let templates = ToolTemplates::for_descriptor(toolchain, descriptor)?;

        let resolver = Self {
            toolchain,
            templates,
            root: descriptor.root.clone(),
            prefix: descriptor.prefix.clone(),
            module: module_path.display().to_string(),
            runner,
            max_command_len,
            symbol_map: OnceCell::new(),
        };

        resolver.render(&resolver.templates.symbolize, WIDEST_ADDRESS, "")?;
        resolver.render(&resolver.templates.symbol_map, "", "")?;
        debug!("Prepared {:?} tools for {}", toolchain, resolver.module);

        Ok(resolver)
    }

    pub fn toolchain(&self) -> ExternalToolchain
    {
        self.toolchain
    }

    /// Resolve a module-relative offset. Misses leave the frame at its defaults.
    pub fn frame(&self, offset: u64) -> StackFrame
    {
        let mut frame = StackFrame::default();
        let address = format!("{offset:#x}");

        let Some(output) = self.run(&self.templates.symbolize, &address, "") else {
            return frame;
        };
        self.toolchain.parse_frame(&output, &mut frame);

        if frame.has_function() {
            if let Some(name) = self.demangle(frame.function()) {
                frame.set_function(&name);
            }
        }
        frame
    }

    /// Start offset of the symbol covering `offset`, from the module's symbol map.
    pub fn symbol_offset(&self, offset: u64) -> Option<u64>
    {
        self.symbol_map().find_symbol(offset).map(|symbol| symbol.offset)
    }

    /// The module's symbol map, built by the symbol-map tool on first call.
    pub fn symbol_map(&self) -> &SymbolMap
    {
        self.symbol_map.get_or_init(|| {
            let map = self
                .run(&self.templates.symbol_map, "", "")
                .map(|output| self.toolchain.parse_symbol_map(&output))
                .unwrap_or_default();
            debug!("Symbol map for {} has {} symbols", self.module, map.len());
            map
        })
    }

    /// Readable form of `name`, or `None` to keep it as is.
    pub fn demangle(&self, name: &str) -> Option<String>
    {
        if let Some(demangled) = demangle_rust(name) {
            return Some(demangled);
        }
        if !looks_mangled(name) {
            return None;
        }

        let output = self.run(&self.templates.demangle, "", name)?;
        first_output_line(&output).map(str::to_string)
    }

    fn render(&self, template: &CommandTemplate, address: &str, symbol: &str) -> ToolchainResult<Invocation>
    {
        let bindings = Bindings {
            module: &self.module,
            address,
            symbol,
        };
        template.render(&self.root, &self.prefix, &bindings, self.max_command_len)
    }

    /// Render and run `template`; any failure is logged and reported as `None`.
    fn run(&self, template: &CommandTemplate, address: &str, symbol: &str) -> Option<String>
    {
        let invocation = match self.render(template, address, symbol) {
            Ok(invocation) => invocation,
            Err(e) => {
                warn!("Skipping {} for {}: {e}", template.program(), self.module);
                return None;
            }
        };

        match self.runner.run(&invocation) {
            Ok(output) if MISSING_FILE_MARKERS.iter().any(|marker| output.contains(marker)) => {
                debug!("{invocation} reported a missing file");
                None
            }
            Ok(output) => Some(output),
            Err(e) => {
                debug!("{invocation} failed: {e}");
                None
            }
        }
    }
}
