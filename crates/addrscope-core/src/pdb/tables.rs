//! Function and line tables built during a database load.
//!
//! ## Function table
//!
//! Entries arrive from two places: per-module procedure/thunk records (authoritative,
//! usually sized) and public symbols (unsized, used only for RVAs no module covered).
//! [`FunctionTableBuilder::finish`] sorts by RVA, collapses duplicates keeping the later
//! record, then infers missing sizes from the next entry. The last entry, which has no
//! successor, takes its size from the section contribution that starts at the same RVA.
//!
//! ## Line table
//!
//! One [`LineEntry`] per line record, in the order the container yields them. A line's
//! code size is the distance to the next record; the last record of a lines subsection
//! runs to the end of that subsection.

use std::collections::HashSet;

use smallvec::SmallVec;

use super::frame::FrameProcedure;
use crate::symbols::{SortedTable, TableEntry};

/// Line numbers above this value are continuation markers (e.g. `0xFEEFEE`), not real lines.
pub const LINE_SENTINEL: u32 = 1 << 23;

/// A function-like code range: procedure, thunk, trampoline or public symbol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionSymbol
{
    pub name: String,
    pub rva: u32,
    /// Byte length; `None` until inferred.
    pub size: Option<u32>,
    pub frame: Option<FrameProcedure>,
}

impl TableEntry for FunctionSymbol
{
    fn address(&self) -> u64
    {
        u64::from(self.rva)
    }

    fn size(&self) -> Option<u64>
    {
        self.size.map(u64::from)
    }
}

/// A section contribution translated to an RVA range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContributionRange
{
    pub rva: u32,
    pub size: u32,
}

/// One line record placed in the image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineEntry
{
    pub line: u32,
    pub code_size: u32,
    pub rva: u32,
    /// Index into the filename table.
    pub filename_index: u32,
}

impl TableEntry for LineEntry
{
    fn address(&self) -> u64
    {
        u64::from(self.rva)
    }

    fn size(&self) -> Option<u64>
    {
        Some(u64::from(self.code_size))
    }
}

/// Hash algorithm of a file checksum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChecksumKind
{
    None,
    Md5,
    Sha1,
    Sha256,
}

/// Checksum bytes; SHA-256 is the longest at 32 bytes.
pub type ChecksumBytes = SmallVec<[u8; 32]>;

/// Source file referenced by line records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilenameEntry
{
    /// Offset of the file's entry in its module's checksums subsection.
    pub checksum_offset: u32,
    /// Offset of the name in `/names`.
    pub name_offset: Option<u32>,
    pub checksum_kind: ChecksumKind,
    pub checksum: ChecksumBytes,
}

/// Accumulates function symbols across modules and public symbols.
#[derive(Debug, Default)]
pub struct FunctionTableBuilder
{
    table: SortedTable<FunctionSymbol>,
    seen: HashSet<u32>,
    last_procedure: Option<usize>,
}

impl FunctionTableBuilder
{
    pub fn new() -> Self
    {
        Self::default()
    }

    /// Start a new module; frame procedure records never cross module boundaries.
    pub fn begin_module(&mut self)
    {
        self.last_procedure = None;
    }

    /// Add a record from a module symbol stream. RVA 0 means "unmapped" and is dropped.
    pub fn add_module_symbol(&mut self, name: impl Into<String>, rva: u32, size: Option<u32>) -> bool
    {
        if rva == 0 {
            self.last_procedure = None;
            return false;
        }
        self.last_procedure = Some(self.table.len());
        self.table.push(FunctionSymbol {
            name: name.into(),
            rva,
            size,
            frame: None,
        });
        self.seen.insert(rva);
        true
    }

    /// Attach frame layout to the procedure decoded just before it.
    pub fn attach_frame_procedure(&mut self, frame: FrameProcedure)
    {
        if let Some(index) = self.last_procedure {
            if let Some(entry) = self.table.entries_mut().get_mut(index) {
                entry.frame = Some(frame);
            }
        }
    }

    /// Add a public function symbol unless a module record already covers its RVA.
    pub fn add_public_symbol(&mut self, name: impl Into<String>, rva: u32) -> bool
    {
        if rva == 0 || !self.seen.insert(rva) {
            return false;
        }
        self.table.push(FunctionSymbol {
            name: name.into(),
            rva,
            size: None,
            frame: None,
        });
        true
    }

    pub fn len(&self) -> usize
    {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool
    {
        self.table.is_empty()
    }

    /// Sort, de-duplicate and infer sizes.
    ///
    /// `contributions` must be in stored (ascending) order; the scan for the last
    /// entry's size stops at the first contribution past its RVA.
    pub fn finish(self, contributions: &[ContributionRange]) -> SortedTable<FunctionSymbol>
    {
        let mut table = self.table;
        table.sort();
        table.dedup_keep_last();

        let entries = table.entries_mut();
        for i in 1..entries.len() {
            let next_rva = entries[i].rva;
            let current = &mut entries[i - 1];
            if current.size.is_none() {
                current.size = Some(next_rva - current.rva);
            }
        }

        if let Some(last) = entries.last_mut() {
            if last.size.is_none() {
                last.size = contribution_size(contributions, last.rva);
            }
        }

        table
    }
}

fn contribution_size(contributions: &[ContributionRange], rva: u32) -> Option<u32>
{
    for contribution in contributions {
        if contribution.rva == rva {
            return Some(contribution.size);
        }
        if contribution.rva > rva {
            break;
        }
    }
    None
}

/// Accumulates line entries and the filename table across modules.
#[derive(Debug, Default)]
pub struct LineTableBuilder
{
    lines: SortedTable<LineEntry>,
    filenames: Vec<FilenameEntry>,
    last_real_line: Option<(u32, u32)>,
}

impl LineTableBuilder
{
    pub fn new() -> Self
    {
        Self::default()
    }

    /// Start a new module; sentinel lines never borrow a line from another module.
    pub fn begin_module(&mut self)
    {
        self.last_real_line = None;
    }

    /// Add a source file and return its index in the filename table.
    pub fn add_file(&mut self, file: FilenameEntry) -> u32
    {
        let index = u32::try_from(self.filenames.len()).unwrap_or(u32::MAX);
        self.filenames.push(file);
        index
    }

    /// Add one line record at `rva`.
    ///
    /// Line values above [`LINE_SENTINEL`] repeat the previous real line of the same
    /// file run (0 if there is none yet).
    pub fn add_line(&mut self, rva: u32, line: u32, code_size: u32, filename_index: u32)
    {
        let line = if line > LINE_SENTINEL {
            match self.last_real_line {
                Some((index, previous)) if index == filename_index => previous,
                _ => 0,
            }
        } else {
            self.last_real_line = Some((filename_index, line));
            line
        };

        self.lines.push(LineEntry {
            line,
            code_size,
            rva,
            filename_index,
        });
    }

    pub fn len(&self) -> usize
    {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool
    {
        self.lines.is_empty()
    }

    /// Sort lines by RVA and hand back both tables.
    pub fn finish(self) -> (SortedTable<LineEntry>, Vec<FilenameEntry>)
    {
        let mut lines = self.lines;
        lines.sort();
        (lines, self.filenames)
    }
}
