//! Symbol tables and text-format parsers shared by both backends.

pub mod demangle;
pub mod parse;
pub mod symbol_map;
pub mod table;

pub use symbol_map::{Symbol, SymbolMap};
pub use table::{SortedTable, TableEntry};
