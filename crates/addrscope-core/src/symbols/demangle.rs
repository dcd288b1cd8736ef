//! Symbol demangling helpers.
//!
//! Rust symbols (legacy `_ZN...E` with a hash, or v0 `_R...`) are demangled in-process
//! with `rustc_demangle`. Everything else that looks decorated is left to the
//! toolchain's external demangler (`c++filt`, `ps3name`), driven by
//! [`ExternalToolResolver`](crate::toolchain::ExternalToolResolver).
//!
//! ## Mangling Schemes
//!
//! - **Rust**: `_R...` (v0) or `_ZN...17h<hash>E` (legacy)
//! - **C++ (Itanium)**: `_Z...`, or `__Z...` on platforms with a leading underscore
//! - **MSVC**: `?...` decorated names

use rustc_demangle::try_demangle;

/// Demangle a Rust symbol, dropping the trailing hash.
///
/// Returns `None` when `raw` is not a Rust symbol.
///
/// ## Example
///
/// ```rust
/// use addrscope_core::symbols::demangle::demangle_rust;
///
/// let name = demangle_rust("_ZN4core3ptr13drop_in_place17h0123456789abcdefE");
/// assert_eq!(name.as_deref(), Some("core::ptr::drop_in_place"));
/// assert_eq!(demangle_rust("main"), None);
/// ```
pub fn demangle_rust(raw: &str) -> Option<String>
{
    try_demangle(raw).ok().map(|demangled| format!("{demangled:#}"))
}

/// Heuristic check for a compiler-decorated name worth handing to a demangler.
pub fn looks_mangled(name: &str) -> bool
{
    name.starts_with("_Z") || name.starts_with("__Z") || name.starts_with("_R") || name.starts_with('?')
}

/// First line of demangler output, without line terminators.
///
/// Returns `None` for empty output.
pub fn first_output_line(output: &str) -> Option<&str>
{
    output
        .lines()
        .next()
        .map(|line| line.trim_end_matches(['\r', '\n']))
        .filter(|line| !line.trim().is_empty())
}
