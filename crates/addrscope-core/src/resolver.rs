//! # Resolver
//!
//! Owns the module list of one profiled process and turns absolute addresses into
//! [`StackFrame`]s.
//!
//! ## Lookup
//!
//! Modules are sorted by base address and must not overlap, so the owner of an address
//! is found with one binary search and a half-open containment test
//! (`address - base < size`, wrapping).
//!
//! ## Lazy backends
//!
//! Nothing is loaded up front. The first query landing in a module builds its backend:
//!
//! - **Native**: locate the PDB and build a [`DebugDatabaseIndex`]
//! - **Gnu / Console**: prepare an [`ExternalToolResolver`]
//! - **Unknown**, or any setup failure: the module is marked unavailable and its frames
//!   carry only the module name
//!
//! Each module's backend is initialised at most once, even under concurrent queries;
//! [`Resolver::load_phase`] reports where a module is in that lifecycle.

use std::fmt;
use std::path::Path;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use once_cell::sync::OnceCell;
use tracing::{debug, warn};

use crate::error::{AddrscopeError, Result};
use crate::pdb::{locate_debug_database, DebugDatabaseIndex};
use crate::toolchain::{CommandRunner, ExternalToolResolver, ProcessRunner, DEFAULT_MAX_COMMAND_LEN};
use crate::types::{Address, ModuleInfo, StackFrame, ToolchainKind};

const PHASE_UNLOADED: u8 = 0;
const PHASE_LOADING: u8 = 1;
const PHASE_LOADED: u8 = 2;

/// Where a module's backend is in its lazy initialisation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadPhase
{
    /// No query has touched the module yet.
    Unloaded,
    /// The first query is building the backend.
    Loading,
    /// The backend is ready, or setup failed and the module is unavailable.
    Loaded,
}

impl LoadPhase
{
    fn from_raw(raw: u8) -> Self
    {
        match raw {
            PHASE_UNLOADED => LoadPhase::Unloaded,
            PHASE_LOADING => LoadPhase::Loading,
            _ => LoadPhase::Loaded,
        }
    }
}

/// Resolution backend attached to a module on first use.
#[derive(Debug)]
enum Backend
{
    Native(DebugDatabaseIndex),
    External(ExternalToolResolver),
    Unavailable,
}

#[derive(Debug)]
struct ModuleSlot
{
    info: ModuleInfo,
    name: String,
    phase: AtomicU8,
    backend: OnceCell<Backend>,
}

impl ModuleSlot
{
    fn new(info: ModuleInfo) -> Self
    {
        Self {
            name: info.name(),
            info,
            phase: AtomicU8::new(PHASE_UNLOADED),
            backend: OnceCell::new(),
        }
    }
}

/// Configures a [`Resolver`].
pub struct ResolverBuilder
{
    modules: Vec<ModuleInfo>,
    symbol_store: Option<String>,
    max_command_len: usize,
    runner: Arc<dyn CommandRunner>,
}

impl Default for ResolverBuilder
{
    fn default() -> Self
    {
        Self {
            modules: Vec::new(),
            symbol_store: None,
            max_command_len: DEFAULT_MAX_COMMAND_LEN,
            runner: Arc::new(ProcessRunner),
        }
    }
}

impl ResolverBuilder
{
    #[must_use]
    pub fn modules(mut self, modules: impl IntoIterator<Item = ModuleInfo>) -> Self
    {
        self.modules.extend(modules);
        self
    }

    #[must_use]
    pub fn module(mut self, module: ModuleInfo) -> Self
    {
        self.modules.push(module);
        self
    }

    /// Symbol path searched for PDBs; `_NT_SYMBOL_PATH` is used when unset.
    #[must_use]
    pub fn symbol_store(mut self, store: impl Into<String>) -> Self
    {
        self.symbol_store = Some(store.into());
        self
    }

    /// Longest external command line allowed, in bytes.
    #[must_use]
    pub fn max_command_len(mut self, len: usize) -> Self
    {
        self.max_command_len = len;
        self
    }

    /// Replace the process-spawning runner used for external tools.
    #[must_use]
    pub fn command_runner(mut self, runner: Arc<dyn CommandRunner>) -> Self
    {
        self.runner = runner;
        self
    }

    /// Sort and validate the modules.
    ///
    /// ## Errors
    ///
    /// - [`AddrscopeError::InvalidArgument`] for a zero-sized module
    /// - [`AddrscopeError::OverlappingModules`] if two modules share any address
    pub fn build(self) -> Result<Resolver>
    {
        let mut modules = self.modules;
        if let Some(empty) = modules.iter().find(|module| module.size == 0) {
            return Err(AddrscopeError::InvalidArgument(format!(
                "module {} has zero size",
                empty.path.display()
            )));
        }

        modules.sort_by_key(|module| module.base);
        for pair in modules.windows(2) {
            if pair[0].end() > pair[1].base {
                return Err(AddrscopeError::OverlappingModules {
                    first: pair[0].name(),
                    second: pair[1].name(),
                });
            }
        }

        debug!("Resolver created with {} modules", modules.len());
        Ok(Resolver {
            modules: modules.into_iter().map(ModuleSlot::new).collect(),
            symbol_store: self.symbol_store,
            max_command_len: self.max_command_len,
            runner: self.runner,
        })
    }
}

/// Address-to-frame resolver over a fixed set of modules
///
/// ## Example
///
/// ```rust
/// use addrscope_core::{ModuleInfo, Resolver, ToolchainDescriptor, ToolchainKind};
///
/// let module = ModuleInfo::new(0x10000, 0x1000, "/opt/app/plugin.so", ToolchainDescriptor::default());
/// let resolver = Resolver::new(vec![module]).unwrap();
///
/// assert_eq!(resolver.frame(0x10FFF).module(), "plugin.so");
/// assert_eq!(resolver.frame(0x11000).module(), "Unknown");
/// ```
pub struct Resolver
{
    modules: Vec<ModuleSlot>,
    symbol_store: Option<String>,
    max_command_len: usize,
    runner: Arc<dyn CommandRunner>,
}

impl fmt::Debug for Resolver
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        f.debug_struct("Resolver")
            .field("modules", &self.modules)
            .field("symbol_store", &self.symbol_store)
            .field("max_command_len", &self.max_command_len)
            .finish_non_exhaustive()
    }
}

impl Resolver
{
    pub fn builder() -> ResolverBuilder
    {
        ResolverBuilder::default()
    }

    /// Resolver with default settings over `modules`.
    pub fn new(modules: Vec<ModuleInfo>) -> Result<Self>
    {
        Self::builder().modules(modules).build()
    }

    /// Modules in ascending base-address order.
    pub fn modules(&self) -> impl Iterator<Item = &ModuleInfo>
    {
        self.modules.iter().map(|slot| &slot.info)
    }

    /// The module whose range contains `address`.
    pub fn module_for_address(&self, address: u64) -> Option<&ModuleInfo>
    {
        self.slot_for(address).map(|(slot, _)| &slot.info)
    }

    /// Resolve `address`. Fields that cannot be resolved stay "Unknown" (line 0).
    pub fn frame(&self, address: u64) -> StackFrame
    {
        let Some((slot, offset)) = self.slot_for(address) else {
            return StackFrame::default();
        };

        let mut frame = match self.backend(slot) {
            Backend::Native(index) => match u32::try_from(offset) {
                Ok(rva) => index.symbol_by_address(rva),
                Err(_) => StackFrame::default(),
            },
            Backend::External(tools) => tools.frame(offset),
            Backend::Unavailable => StackFrame::default(),
        };
        frame.set_module(&slot.name);
        frame
    }

    /// Identifier shared by every address inside the same function.
    ///
    /// This is the absolute start address of the covering symbol, or `address` itself
    /// when no symbol covers it. Identifiers are only meaningful within one resolver.
    pub fn address_id(&self, address: u64) -> u64
    {
        let Some((slot, offset)) = self.slot_for(address) else {
            return address;
        };

        let start = match self.backend(slot) {
            Backend::Native(index) => u32::try_from(offset)
                .ok()
                .and_then(|rva| index.symbol_id(rva))
                .map(u64::from),
            Backend::External(tools) => tools.symbol_offset(offset),
            Backend::Unavailable => None,
        };
        start.map_or(address, |start| slot.info.base.wrapping_add(start))
    }

    /// Lifecycle phase of the module containing `address`.
    pub fn load_phase(&self, address: u64) -> Option<LoadPhase>
    {
        self.slot_for(address)
            .map(|(slot, _)| LoadPhase::from_raw(slot.phase.load(Ordering::Acquire)))
    }

    fn slot_for(&self, address: u64) -> Option<(&ModuleSlot, u64)>
    {
        let index = self.modules.partition_point(|slot| slot.info.base <= address);
        let slot = self.modules.get(index.checked_sub(1)?)?;
        let offset = Address::new(address).offset_within(slot.info.base, slot.info.size)?;
        Some((slot, offset))
    }

    fn backend<'a>(&self, slot: &'a ModuleSlot) -> &'a Backend
    {
        slot.backend.get_or_init(|| {
            slot.phase.store(PHASE_LOADING, Ordering::Release);
            let backend = self.load_backend(&slot.info);
            slot.phase.store(PHASE_LOADED, Ordering::Release);
            backend
        })
    }

    fn load_backend(&self, module: &ModuleInfo) -> Backend
    {
        match module.toolchain.kind {
            ToolchainKind::Native => self.load_native(&module.path),
            ToolchainKind::Gnu | ToolchainKind::Console => {
                match ExternalToolResolver::new(
                    &module.toolchain,
                    &module.path,
                    Arc::clone(&self.runner),
                    self.max_command_len,
                ) {
                    Ok(tools) => Backend::External(tools),
                    Err(e) => {
                        warn!("External tools unavailable for {}: {e}", module.path.display());
                        Backend::Unavailable
                    }
                }
            }
            ToolchainKind::Unknown => {
                debug!("No toolchain for {}", module.path.display());
                Backend::Unavailable
            }
        }
    }

    fn load_native(&self, module_path: &Path) -> Backend
    {
        let Some(pdb) = locate_debug_database(module_path, self.symbol_store.as_deref()) else {
            warn!("No debug database found for {}", module_path.display());
            return Backend::Unavailable;
        };

        match DebugDatabaseIndex::load(&pdb) {
            Ok(index) => {
                debug!(
                    "Loaded {} ({} functions, {} lines)",
                    pdb.display(),
                    index.functions().len(),
                    index.lines().len()
                );
                Backend::Native(index)
            }
            Err(e) => {
                warn!("Failed to load {}: {e}", pdb.display());
                Backend::Unavailable
            }
        }
    }
}
