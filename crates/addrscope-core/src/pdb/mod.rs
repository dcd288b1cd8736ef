//! # Native debug database reader
//!
//! Builds the sorted function and line tables used for address resolution from a
//! memory-mapped PDB. The MSF container and its fixed streams are parsed by the `pdb`
//! crate; this module owns ingestion and lookup.
//!
//! ## Layers
//!
//! - [`source`]: read-only mapping handed to the container parser
//! - [`sections`], [`frame`]: RVA translation and the records the parser leaves raw
//! - [`tables`], [`index`]: ingestion into [`DebugDatabaseIndex`]
//! - [`locate`]: finding a module's database on disk

pub mod error;
pub mod frame;
pub mod index;
pub mod locate;
pub mod sections;
pub mod source;
pub mod tables;

pub use error::{PdbError, PdbResult};
pub use index::{DatabaseIdentity, DebugDatabaseIndex};
pub use locate::locate_debug_database;
pub use pdb::MachineType;
pub use tables::{FilenameEntry, FunctionSymbol, LineEntry};
