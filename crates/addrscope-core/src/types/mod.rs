//! # Types
//!
//! Value types shared by every backend: addresses, module descriptions and the
//! [`StackFrame`] output contract.

pub mod address;
pub mod frame;
pub mod module;

pub use address::Address;
pub use frame::{StackFrame, FILE_NAME_CAPACITY, FUNCTION_NAME_CAPACITY, MODULE_NAME_CAPACITY, UNKNOWN};
pub use module::{CommandOverrides, ModuleInfo, ToolchainDescriptor, ToolchainKind};
