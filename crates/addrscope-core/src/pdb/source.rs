//! Memory-mapped backing for debug databases.

use std::fs::File;
use std::io::Cursor;
use std::path::Path;

use memmap2::Mmap;

use super::error::PdbResult;

/// A read-only mapping of a PDB file, seekable so the container parser can read it
pub type MappedPdb = Cursor<Mmap>;

/// Map `path` read-only.
///
/// The mapping lives as long as the returned value; dropping it (on success or on any
/// load failure) releases the file.
pub fn map_file(path: &Path) -> PdbResult<MappedPdb>
{
    let file = File::open(path)?;
    // SAFETY: the mapping is read-only and private to the returned cursor. A concurrent
    // truncation of the file by another process is outside what this reader defends.
    let map = unsafe { Mmap::map(&file) }?;
    Ok(Cursor::new(map))
}
