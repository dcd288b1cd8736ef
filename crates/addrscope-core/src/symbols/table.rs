//! Sorted address index shared by every symbol table.
//!
//! A [`SortedTable`] is a vector kept in ascending address order once [`SortedTable::sort`]
//! has run. Lookups use the "largest entry not greater than the key" primitive
//! ([`slice::partition_point`]) and optionally a containment test on the entry size.
//!
//! The same shape backs three tables:
//! - the plain-text [`SymbolMap`](super::SymbolMap) (offset + size containment)
//! - the native function table (nearest RVA at or below the query)
//! - the native line table (nearest RVA at or below the query)

/// An entry that can live in a [`SortedTable`].
pub trait TableEntry
{
    /// Start address (or RVA/offset) of the entry.
    fn address(&self) -> u64;

    /// Byte length of the entry, when known.
    fn size(&self) -> Option<u64>
    {
        None
    }
}

/// Vector of entries ordered by [`TableEntry::address`]
///
/// Insertions may arrive in any order; call [`sort`](Self::sort) once all entries are in
/// and before the first lookup. Lookups on an unsorted table trip a debug assertion.
#[derive(Debug, Clone)]
pub struct SortedTable<T>
{
    entries: Vec<T>,
    sorted: bool,
}

impl<T> Default for SortedTable<T>
{
    fn default() -> Self
    {
        Self {
            entries: Vec::new(),
            sorted: true,
        }
    }
}

impl<T: TableEntry> SortedTable<T>
{
    pub fn new() -> Self
    {
        Self::default()
    }

    /// Append an entry, overwriting the previous one if both start at the same address.
    ///
    /// Only the most recent entry is compared, so merging applies to consecutive
    /// insertions at one address.
    pub fn insert(&mut self, entry: T)
    {
        if let Some(last) = self.entries.last_mut() {
            if last.address() == entry.address() {
                *last = entry;
                return;
            }
            if last.address() > entry.address() {
                self.sorted = false;
            }
        }
        self.entries.push(entry);
    }

    /// Append without merging.
    pub fn push(&mut self, entry: T)
    {
        if self.entries.last().is_some_and(|last| last.address() > entry.address()) {
            self.sorted = false;
        }
        self.entries.push(entry);
    }

    /// Stable sort by address. Entries sharing an address keep insertion order.
    pub fn sort(&mut self)
    {
        if !self.sorted {
            self.entries.sort_by_key(TableEntry::address);
            self.sorted = true;
        }
    }

    /// Collapse runs of entries at the same address, keeping the last inserted one.
    ///
    /// Must run after [`sort`](Self::sort).
    pub fn dedup_keep_last(&mut self)
    {
        debug_assert!(self.sorted, "dedup on an unsorted table");
        self.entries.dedup_by(|later, kept| {
            if later.address() == kept.address() {
                std::mem::swap(later, kept);
                true
            } else {
                false
            }
        });
    }

    /// Greatest entry whose address is `<= address`.
    pub fn nearest_below(&self, address: u64) -> Option<&T>
    {
        debug_assert!(self.sorted, "lookup on an unsorted table");
        let index = self.entries.partition_point(|entry| entry.address() <= address);
        index.checked_sub(1).map(|i| &self.entries[i])
    }

    /// Entry whose `[address, address + size)` range contains `address`.
    ///
    /// Entries with an unknown size never match.
    pub fn find_containing(&self, address: u64) -> Option<&T>
    {
        self.nearest_below(address)
            .filter(|entry| address.wrapping_sub(entry.address()) < entry.size().unwrap_or(0))
    }

    pub fn retain(&mut self, keep: impl FnMut(&T) -> bool)
    {
        self.entries.retain(keep);
    }

    pub fn is_sorted(&self) -> bool
    {
        self.sorted
    }

    pub fn entries(&self) -> &[T]
    {
        &self.entries
    }

    /// Mutable view for in-place fix-ups that do not move addresses.
    pub fn entries_mut(&mut self) -> &mut [T]
    {
        &mut self.entries
    }

    pub fn len(&self) -> usize
    {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool
    {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T>
    {
        self.entries.iter()
    }
}
