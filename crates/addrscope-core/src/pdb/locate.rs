//! Finding the debug database that belongs to a module.
//!
//! Candidates are tried in order and the first existing file wins:
//!
//! 1. the module path itself when it already is a `.pdb`
//! 2. the path recorded in the image's CodeView debug directory entry
//! 3. that file name next to the module
//! 4. `<module stem>.pdb` next to the module
//! 5. every symbol-store directory, flat (`<store>/<name>`) and in symbol-server layout
//!    (`<store>/<name>/<GUID><AGE>/<name>`)
//!
//! Store directories come from the explicit store if given, else `_NT_SYMBOL_PATH`.

use std::env;
use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};

use object::Object;
use tracing::{debug, trace};

/// Environment variable listing symbol-store directories.
pub const SYMBOL_PATH_VAR: &str = "_NT_SYMBOL_PATH";

/// CodeView debug record of a PE image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeViewRecord
{
    pub path: PathBuf,
    pub guid: [u8; 16],
    pub age: u32,
}

impl CodeViewRecord
{
    /// Symbol-server directory key: GUID in registry order, upper-case, followed by the age.
    pub fn store_key(&self) -> String
    {
        store_key(&self.guid, self.age)
    }

    fn file_name(&self) -> Option<&OsStr>
    {
        // Recorded paths are usually Windows paths; split on either separator.
        let raw = self.path.to_str()?;
        let name = raw.rsplit(['\\', '/']).next()?;
        (!name.is_empty()).then(|| OsStr::new(name))
    }
}

/// Symbol-server directory key for a GUID and age, e.g. `3F2504E04F8911D39A0C0305E82C33011`.
pub fn store_key(guid: &[u8; 16], age: u32) -> String
{
    let data1 = u32::from_le_bytes([guid[0], guid[1], guid[2], guid[3]]);
    let data2 = u16::from_le_bytes([guid[4], guid[5]]);
    let data3 = u16::from_le_bytes([guid[6], guid[7]]);
    let data4: String = guid[8..].iter().map(|b| format!("{b:02X}")).collect();
    format!("{data1:08X}{data2:04X}{data3:04X}{data4}{age:X}")
}

/// Read the CodeView record from a PE image, if it has one.
pub fn read_codeview(module_path: &Path) -> Option<CodeViewRecord>
{
    let data = fs::read(module_path).ok()?;
    let file = object::File::parse(&*data).ok()?;
    let info = file.pdb_info().ok()??;
    Some(CodeViewRecord {
        path: PathBuf::from(String::from_utf8_lossy(info.path()).into_owned()),
        guid: info.guid(),
        age: info.age(),
    })
}

/// Local directories named by a symbol path (`dir;srv*cache*https://server;cache*dir`).
pub fn parse_symbol_path(value: &str) -> Vec<PathBuf>
{
    let mut dirs = Vec::new();
    for element in value.split(';').map(str::trim).filter(|e| !e.is_empty()) {
        let lower = element.to_ascii_lowercase();
        if lower.starts_with("srv*") || lower.starts_with("cache*") || lower.starts_with("symsrv*") {
            dirs.extend(
                element
                    .split('*')
                    .skip(1)
                    .filter(|part| !part.is_empty() && !part.contains("://") && !part.ends_with(".dll"))
                    .map(PathBuf::from),
            );
        } else {
            dirs.push(PathBuf::from(element));
        }
    }
    dirs
}

/// Store directories to search: the explicit store, else the environment.
pub fn symbol_store_dirs(symbol_store: Option<&str>) -> Vec<PathBuf>
{
    match symbol_store {
        Some(store) => parse_symbol_path(store),
        None => env::var(SYMBOL_PATH_VAR)
            .map(|value| parse_symbol_path(&value))
            .unwrap_or_default(),
    }
}

/// Every candidate location for `module_path`'s debug database, in search order.
pub fn candidate_paths(module_path: &Path, symbol_store: Option<&str>) -> Vec<PathBuf>
{
    let mut candidates = Vec::new();

    if module_path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("pdb")) {
        candidates.push(module_path.to_path_buf());
    }

    let codeview = read_codeview(module_path);
    let module_dir = module_path.parent().unwrap_or_else(|| Path::new(""));

    if let Some(codeview) = &codeview {
        candidates.push(codeview.path.clone());
        if let Some(name) = codeview.file_name() {
            candidates.push(module_dir.join(name));
        }
    }
    candidates.push(module_path.with_extension("pdb"));

    let name = codeview
        .as_ref()
        .and_then(CodeViewRecord::file_name)
        .map(OsStr::to_os_string)
        .or_else(|| module_path.with_extension("pdb").file_name().map(OsStr::to_os_string));

    if let Some(name) = name {
        for store in symbol_store_dirs(symbol_store) {
            candidates.push(store.join(&name));
            if let Some(codeview) = &codeview {
                candidates.push(store.join(&name).join(codeview.store_key()).join(&name));
            }
        }
    }

    candidates
}

/// First existing debug database for `module_path`.
pub fn locate_debug_database(module_path: &Path, symbol_store: Option<&str>) -> Option<PathBuf>
{
    for candidate in candidate_paths(module_path, symbol_store) {
        trace!("Probing {}", candidate.display());
        if candidate.is_file() {
            debug!("Debug database for {} is {}", module_path.display(), candidate.display());
            return Some(candidate);
        }
    }
    debug!("No debug database found for {}", module_path.display());
    None
}
