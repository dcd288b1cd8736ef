//! # Error Types
//!
//! Top-level error handling for address resolution.
//!
//! We use `thiserror` to derive `Error` implementations. Each backend keeps its own
//! error enum ([`PdbError`], [`ToolchainError`]) and converts into [`AddrscopeError`]
//! through `#[from]`, so `?` works across layers.
//!
//! Note that a *missing symbol* is never an error: queries that find nothing return the
//! default "Unknown" [`StackFrame`](crate::types::StackFrame). Errors here are reserved for
//! construction and load-time failures.

use thiserror::Error;

pub use crate::pdb::PdbError;
pub use crate::toolchain::ToolchainError;

/// Main error type for resolver operations
///
/// ## Error Categories
///
/// 1. **Setup errors**: InvalidArgument, OverlappingModules
/// 2. **Native backend errors**: Pdb (malformed or unsupported debug database)
/// 3. **External backend errors**: Toolchain (tool setup or invocation)
/// 4. **I/O errors**: Io
#[derive(Error, Debug)]
pub enum AddrscopeError
{
    /// Invalid argument passed to a resolver function
    ///
    /// Examples:
    /// - A module with a size of zero
    /// - An empty module list passed to a CLI command
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Two modules handed to the resolver claim overlapping address ranges
    ///
    /// Module ranges must be disjoint so that every address has at most one owner.
    #[error("Modules overlap: {first} and {second}")]
    OverlappingModules
    {
        /// Name of the module with the lower base address
        first: String,
        /// Name of the module whose range starts inside `first`
        second: String,
    },

    /// The native debug database could not be loaded
    #[error("Debug database error: {0}")]
    Pdb(#[from] PdbError),

    /// An external toolchain could not be set up or invoked
    #[error("Toolchain error: {0}")]
    Toolchain(#[from] ToolchainError),

    /// I/O error (for file operations, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience type alias for `Result<T, AddrscopeError>`
///
/// ```rust
/// use addrscope_core::error::Result;
/// fn foo() -> Result<()>
/// {
///     Ok(())
/// }
/// ```
pub type Result<T> = std::result::Result<T, AddrscopeError>;
