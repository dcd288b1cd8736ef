//! # Debug database index
//!
//! [`DebugDatabaseIndex`] ingests a PDB once and answers address queries from two sorted
//! tables:
//!
//! - the **function table**: procedures, thunks and trampolines from every module's
//!   symbol stream, plus function-flagged public symbols for RVAs no module covered
//! - the **line table**: one entry per line record of every module's line program, each
//!   pointing into a filename table resolved through `/names`
//!
//! The MSF container and its streams are read through the `pdb` crate; this module only
//! turns the records it delivers into the two tables.
//!
//! ## Load order
//!
//! 1. Map the file and open the container
//! 2. Read the PDB info and DBI streams; reject fast-link databases
//! 3. Require the section headers, section contributions and module list
//! 4. Validate the TPI header
//! 5. Walk every module (symbols, then line program)
//! 6. Add public symbols not already seen
//! 7. Sort both tables (in parallel), back-fill function sizes
//!
//! Any structural failure aborts the load and drops the mapping; nothing partial is kept.
//!
//! ## Queries
//!
//! Both lookups pick the entry with the greatest RVA not above the query, independently:
//! a frame may name a function without a line, or the reverse.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::io::Cursor;
use std::path::Path;

use pdb::{
    FallibleIterator, FileChecksum, FileIndex, LineProgram, MachineType, ModuleInfo, Source, StreamIndex, StringRef,
    StringTable, SymbolData, SymbolTable, ThunkKind, PDB,
};
use tracing::{debug, trace};

use super::error::{PdbError, PdbResult};
use super::frame::{FrameProcedure, S_FRAMEPROC, THUNK_TRAMPOLINE_INCREMENTAL, TRAMPOLINE_NAME, TRAMPOLINE_SIZE};
use super::sections::ImageSections;
use super::source::map_file;
use super::tables::{
    ChecksumBytes, ChecksumKind, ContributionRange, FilenameEntry, FunctionSymbol, FunctionTableBuilder, LineEntry,
    LineTableBuilder,
};
use crate::symbols::SortedTable;
use crate::types::StackFrame;

const PDB_INFO_STREAM: StreamIndex = StreamIndex(1);

/// Feature code for `/DEBUG:FASTLINK` databases ("MINI").
const FEATURE_MINIMAL_DEBUG_INFO: u32 = 0x494E_494D;
/// Feature code emitted by VC110 and later.
const FEATURE_VC110: u32 = 20_091_201;
/// Feature code emitted by VC140 and later.
const FEATURE_VC140: u32 = 20_140_508;
/// Feature code for databases without type merging ("NOTM").
const FEATURE_NO_TYPE_MERGE: u32 = 0x4D54_4F4E;

const KNOWN_FEATURES: [u32; 4] = [FEATURE_VC110, FEATURE_VC140, FEATURE_NO_TYPE_MERGE, FEATURE_MINIMAL_DEBUG_INFO];

/// Identity of a loaded database, as recorded in its info and DBI streams.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DatabaseIdentity
{
    /// GUID in on-disk byte order.
    pub guid: [u8; 16],
    pub age: u32,
    pub machine: MachineType,
}

/// Sorted function and line tables built from one PDB.
#[derive(Debug, Clone)]
pub struct DebugDatabaseIndex
{
    identity: DatabaseIdentity,
    functions: SortedTable<FunctionSymbol>,
    lines: SortedTable<LineEntry>,
    filenames: Vec<FilenameEntry>,
    names: HashMap<u32, String>,
}

impl DebugDatabaseIndex
{
    /// Map and ingest the PDB at `path`.
    ///
    /// ## Errors
    ///
    /// Any [`PdbError`]: unreadable file, bad container, missing required stream,
    /// fast-link database or no function symbols at all.
    pub fn load(path: impl AsRef<Path>) -> PdbResult<Self>
    {
        let path = path.as_ref();
        debug!("Loading debug database {}", path.display());
        Self::from_source(map_file(path)?)
    }

    /// Ingest a PDB already read into memory.
    pub fn from_bytes(data: Vec<u8>) -> PdbResult<Self>
    {
        Self::from_source(Cursor::new(data))
    }

    fn from_source<'s, S: Source<'s> + 's>(source: S) -> PdbResult<Self>
    {
        let mut pdb = PDB::open(source)?;
        let info = pdb.pdb_information()?;
        let debug_info = pdb.debug_information()?;

        if is_fast_link(&mut pdb)? {
            return Err(PdbError::FastLinkUnsupported);
        }

        let sections = pdb
            .sections()?
            .map(|headers| ImageSections::from_headers(&headers))
            .ok_or(PdbError::MissingStream("section headers"))?;

        let contributions: Vec<_> = debug_info.section_contributions()?.collect()?;
        if contributions.is_empty() {
            return Err(PdbError::MissingStream("section contributions"));
        }

        let modules: Vec<_> = debug_info.modules()?.collect()?;
        if modules.is_empty() {
            return Err(PdbError::MissingStream("module info"));
        }

        // Only the header is validated; type records are never consulted.
        pdb.type_information()?;

        debug!(
            "PDB has {} sections, {} modules, {} contributions",
            sections.len(),
            modules.len(),
            contributions.len()
        );

        let mut functions = FunctionTableBuilder::new();
        let mut lines = LineTableBuilder::new();
        for module in &modules {
            let Some(module_info) = pdb.module_info(module)? else {
                continue;
            };

            functions.begin_module();
            ingest_module_symbols(&module_info, &sections, &mut functions)?;

            lines.begin_module();
            ingest_module_lines(&module_info.line_program()?, &sections, &mut lines)?;

            trace!(
                "Module {} -> {} functions, {} lines so far",
                module.module_name(),
                functions.len(),
                lines.len()
            );
        }

        let global_symbols = pdb.global_symbols()?;
        ingest_public_symbols(&global_symbols, &sections, &mut functions)?;

        let ranges: Vec<_> = contributions
            .iter()
            .map(|contribution| ContributionRange {
                rva: sections.rva_or_zero(contribution.offset),
                size: contribution.size,
            })
            .collect();
        let (functions, (lines, filenames)) = rayon::join(|| functions.finish(&ranges), || lines.finish());

        if functions.is_empty() {
            return Err(PdbError::NoFunctionSymbols);
        }

        let names = match pdb.string_table() {
            Ok(strings) => resolve_names(&strings, &filenames),
            Err(error) => {
                debug!("No /names stream, filenames stay unresolved: {error}");
                HashMap::new()
            }
        };

        debug!(
            "Indexed {} functions, {} lines, {} files",
            functions.len(),
            lines.len(),
            filenames.len()
        );

        Ok(Self {
            identity: DatabaseIdentity {
                guid: info.guid.to_bytes_le(),
                age: info.age,
                machine: debug_info.machine_type()?,
            },
            functions,
            lines,
            filenames,
            names,
        })
    }

    /// Resolve an RVA. Unresolved fields keep their "Unknown"/0 defaults.
    pub fn symbol_by_address(&self, rva: u32) -> StackFrame
    {
        let mut frame = StackFrame::default();

        if let Some(function) = self.functions.nearest_below(u64::from(rva)) {
            frame.set_function(&function.name);
        }

        if let Some(line) = self.lines.nearest_below(u64::from(rva)) {
            if let Some(file) = self.filename(line) {
                frame.set_file(file);
            }
            frame.set_line(line.line);
        }

        frame
    }

    /// RVA of the function covering `rva`, usable as a per-session identifier.
    pub fn symbol_id(&self, rva: u32) -> Option<u32>
    {
        self.functions.nearest_below(u64::from(rva)).map(|f| f.rva)
    }

    /// Name of the source file a line entry belongs to.
    pub fn filename(&self, line: &LineEntry) -> Option<&str>
    {
        let entry = self.filenames.get(line.filename_index as usize)?;
        self.names.get(&entry.name_offset?).map(String::as_str)
    }

    pub fn functions(&self) -> &[FunctionSymbol]
    {
        self.functions.entries()
    }

    pub fn lines(&self) -> &[LineEntry]
    {
        self.lines.entries()
    }

    pub fn filenames(&self) -> &[FilenameEntry]
    {
        &self.filenames
    }

    pub fn identity(&self) -> DatabaseIdentity
    {
        self.identity
    }
}

/// `true` when the info stream's trailing feature codes include minimal debug info.
fn is_fast_link<'s, S: Source<'s> + 's>(pdb: &mut PDB<'s, S>) -> PdbResult<bool>
{
    let stream = pdb
        .raw_stream(PDB_INFO_STREAM)?
        .ok_or(PdbError::MissingStream("PDB info"))?;
    Ok(trailing_features(stream.as_slice()).contains(&FEATURE_MINIMAL_DEBUG_INFO))
}

/// Feature codes at the end of the info stream, after the named-stream map.
///
/// The map's length is not exposed by the container parser, so codes are collected
/// backwards for as long as they are ones this reader knows.
fn trailing_features(info: &[u8]) -> Vec<u32>
{
    let mut features: Vec<u32> = info
        .rchunks_exact(4)
        .map(|chunk| u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .take_while(|code| KNOWN_FEATURES.contains(code))
        .collect();
    features.reverse();
    features
}

fn ingest_module_symbols(
    module_info: &ModuleInfo<'_>,
    sections: &ImageSections,
    functions: &mut FunctionTableBuilder,
) -> PdbResult<()>
{
    let mut symbols = module_info.symbols()?;
    while let Some(symbol) = symbols.next()? {
        if symbol.raw_kind() == S_FRAMEPROC {
            if let Some(frame) = FrameProcedure::parse(symbol.raw_bytes()) {
                functions.attach_frame_procedure(frame);
            }
            continue;
        }

        match symbol.parse() {
            Ok(SymbolData::Procedure(procedure)) => {
                let rva = sections.rva_or_zero(procedure.offset);
                functions.add_module_symbol(procedure.name.to_string(), rva, Some(procedure.len));
            }
            Ok(SymbolData::Thunk(thunk)) => {
                let rva = sections.rva_or_zero(thunk.offset);
                match thunk.kind {
                    ThunkKind::Unknown(THUNK_TRAMPOLINE_INCREMENTAL) => {
                        functions.add_module_symbol(TRAMPOLINE_NAME, rva, Some(TRAMPOLINE_SIZE))
                    }
                    _ => functions.add_module_symbol(thunk.name.to_string(), rva, Some(u32::from(thunk.len))),
                };
            }
            Ok(SymbolData::Trampoline(trampoline)) => {
                let rva = sections.rva_or_zero(trampoline.thunk);
                functions.add_module_symbol(TRAMPOLINE_NAME, rva, Some(TRAMPOLINE_SIZE));
            }
            // Record kinds the parser does not model carry nothing the tables need.
            Ok(_) | Err(_) => {}
        }
    }
    Ok(())
}

/// Lines whose section does not map into the image are skipped.
fn ingest_module_lines(program: &LineProgram<'_>, sections: &ImageSections, lines: &mut LineTableBuilder)
    -> PdbResult<()>
{
    let mut files: HashMap<u32, u32> = HashMap::new();
    let mut records = program.lines();
    while let Some(record) = records.next()? {
        let Some(rva) = sections.rva(record.offset.section, record.offset.offset) else {
            continue;
        };

        let filename_index = match files.entry(record.file_index.0) {
            Entry::Occupied(entry) => *entry.get(),
            Entry::Vacant(entry) => *entry.insert(lines.add_file(filename_entry(program, record.file_index)?)),
        };
        lines.add_line(rva, record.line_start, record.length.unwrap_or(0), filename_index);
    }
    Ok(())
}

fn filename_entry(program: &LineProgram<'_>, file_index: FileIndex) -> PdbResult<FilenameEntry>
{
    let file = program.get_file_info(file_index)?;
    let (checksum_kind, bytes): (_, &[u8]) = match file.checksum {
        FileChecksum::Md5(bytes) => (ChecksumKind::Md5, bytes),
        FileChecksum::Sha1(bytes) => (ChecksumKind::Sha1, bytes),
        FileChecksum::Sha256(bytes) => (ChecksumKind::Sha256, bytes),
        _ => (ChecksumKind::None, &[]),
    };
    Ok(FilenameEntry {
        checksum_offset: file_index.0,
        name_offset: Some(file.name.0),
        checksum_kind,
        checksum: ChecksumBytes::from_slice(bytes),
    })
}

fn ingest_public_symbols(
    global_symbols: &SymbolTable<'_>,
    sections: &ImageSections,
    functions: &mut FunctionTableBuilder,
) -> PdbResult<()>
{
    let mut added = 0usize;
    let mut symbols = global_symbols.iter();
    while let Some(symbol) = symbols.next()? {
        let Ok(SymbolData::Public(public)) = symbol.parse() else {
            continue;
        };
        let rva = sections.rva_or_zero(public.offset);
        if public.function && functions.add_public_symbol(public.name.to_string(), rva) {
            added += 1;
        }
    }
    debug!("Added {added} public function symbols");
    Ok(())
}

fn resolve_names(strings: &StringTable<'_>, filenames: &[FilenameEntry]) -> HashMap<u32, String>
{
    filenames
        .iter()
        .filter_map(|file| file.name_offset)
        .filter_map(|offset| {
            let name = StringRef(offset).to_string_lossy(strings).ok()?;
            Some((offset, name.into_owned()))
        })
        .collect()
}
