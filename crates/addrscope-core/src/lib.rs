//! # addrscope-core
//!
//! Turns raw instruction addresses captured at runtime into readable stack frames.
//!
//! This crate provides:
//! - A native reader for MSF/PDB debug databases, decoded straight from a memory-mapped file
//! - Sorted function and line tables with nearest-below address lookup
//! - An external-tool backend that drives `addr2line`/`nm`/`c++filt` style utilities
//! - A [`Resolver`] that maps addresses to modules and dispatches to the right backend
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use addrscope_core::{ModuleInfo, Resolver, ToolchainDescriptor, ToolchainKind};
//!
//! let module = ModuleInfo::new(
//!     0x1_4000_0000,
//!     0x20_0000,
//!     "C:/app/app.exe",
//!     ToolchainDescriptor::new(ToolchainKind::Native),
//! );
//! let resolver = Resolver::new(vec![module]).expect("valid module list");
//! let frame = resolver.frame(0x1_4000_1234);
//! println!("{frame}");
//! ```
//!
//! ## Why unsafe code is needed
//!
//! Debug databases are read through a memory mapping (`memmap2::Mmap::map`), which is
//! an `unsafe` API because another process could truncate the file underneath us. The
//! single call lives in [`crate::pdb::source`] behind a safe wrapper.

#![allow(unsafe_code)] // Required for memory-mapping debug databases

pub mod error;
pub mod pdb;
pub mod process;
pub mod resolver;
pub mod symbols;
pub mod toolchain;
pub mod types;

pub use error::{AddrscopeError, Result};
pub use crate::pdb::DebugDatabaseIndex;
pub use resolver::{LoadPhase, Resolver, ResolverBuilder};
pub use symbols::{Symbol, SymbolMap};
pub use toolchain::{CommandRunner, ExternalToolResolver, ProcessRunner};
pub use types::{Address, CommandOverrides, ModuleInfo, StackFrame, ToolchainDescriptor, ToolchainKind};
