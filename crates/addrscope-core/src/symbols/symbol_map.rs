//! Plain-text symbol map built from `nm`-style tool output.

use super::table::{SortedTable, TableEntry};

/// One symbol listed by an external symbol-map tool.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Symbol
{
    /// Module-relative offset of the first byte.
    pub offset: u64,
    /// Byte length; zero when the tool did not report one.
    pub size: u64,
    pub line: u32,
    pub file: String,
    pub name: String,
}

impl TableEntry for Symbol
{
    fn address(&self) -> u64
    {
        self.offset
    }

    fn size(&self) -> Option<u64>
    {
        Some(self.size)
    }
}

/// Offset-ordered symbol list for one module
///
/// Build with [`add_symbol`](Self::add_symbol), then call [`sort`](Self::sort) exactly once
/// before using [`find_symbol`](Self::find_symbol).
///
/// ## Example
///
/// ```rust
/// use addrscope_core::{Symbol, SymbolMap};
///
/// let mut map = SymbolMap::new();
/// map.add_symbol(Symbol { offset: 0x100, name: "init".into(), ..Symbol::default() });
/// map.add_symbol(Symbol { offset: 0x200, size: 0x40, name: "run".into(), ..Symbol::default() });
/// map.sort();
///
/// assert_eq!(map.find_symbol(0x1fe).map(|s| s.name.as_str()), Some("init"));
/// assert!(map.find_symbol(0x240).is_none());
/// ```
#[derive(Debug, Clone, Default)]
pub struct SymbolMap
{
    table: SortedTable<Symbol>,
}

impl SymbolMap
{
    pub fn new() -> Self
    {
        Self::default()
    }

    /// Sorted map from `nm --print-size --line-numbers` output.
    pub fn parse_gnu(output: &str) -> Self
    {
        super::parse::parse_gnu_symbol_map(output)
    }

    /// Sorted map from `ps3bin -dsy` output.
    pub fn parse_console(output: &str) -> Self
    {
        super::parse::parse_console_symbol_map(output)
    }

    /// Add a symbol. A symbol at the same offset as the previous one replaces it.
    pub fn add_symbol(&mut self, symbol: Symbol)
    {
        self.table.insert(symbol);
    }

    /// Order by offset and repair sizes.
    ///
    /// A zero size becomes `next.offset - offset - 1`. Symbols still sized zero
    /// afterwards (typically the last one) are dropped.
    pub fn sort(&mut self)
    {
        self.table.sort();

        let entries = self.table.entries_mut();
        for i in 1..entries.len() {
            let next_offset = entries[i].offset;
            let current = &mut entries[i - 1];
            if current.size == 0 {
                current.size = next_offset.saturating_sub(current.offset).saturating_sub(1);
            }
        }

        self.table.retain(|symbol| symbol.size != 0);
    }

    /// Symbol whose `[offset, offset + size)` range contains `address`.
    pub fn find_symbol(&self, address: u64) -> Option<&Symbol>
    {
        self.table.find_containing(address)
    }

    pub fn len(&self) -> usize
    {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool
    {
        self.table.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Symbol>
    {
        self.table.iter()
    }
}
