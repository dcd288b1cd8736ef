//! Parsers for the text emitted by external symbol tools.
//!
//! ## Formats
//!
//! | tool | output |
//! |---|---|
//! | `addr2line -f` | two lines: function name, then `file:line` (`??` / `??:0` when unknown) |
//! | `ps3bin -a2l` | labelled block: `Address:`, `Directory:`, `File Name:`, `Line Number:`, `Symbol:` |
//! | `nm --print-size --line-numbers` | `offset [size] type name[\tfile:line]` per line |
//! | `ps3bin -dsy` | `offset scope Function segment name` per line |
//!
//! Frame parsers only overwrite fields they could read, so a frame keeps its
//! "Unknown" defaults for anything the tool did not know.

use super::symbol_map::{Symbol, SymbolMap};
use crate::types::StackFrame;

/// Parse two-line `addr2line -f` output into `frame`.
///
/// ## Example
///
/// ```rust
/// use addrscope_core::StackFrame;
/// use addrscope_core::symbols::parse::parse_addr2line;
///
/// let mut frame = StackFrame::default();
/// parse_addr2line("myFunc\n/path/file.c:42\n", &mut frame);
/// assert_eq!(frame.function(), "myFunc");
/// assert_eq!(frame.file(), "/path/file.c");
/// assert_eq!(frame.line(), 42);
/// ```
pub fn parse_addr2line(output: &str, frame: &mut StackFrame)
{
    let mut lines = output.lines().map(str::trim);

    if let Some(function) = lines.next().filter(|name| !name.is_empty() && *name != "??") {
        frame.set_function(function);
    }

    let Some(location) = lines.next() else {
        return;
    };
    if location.is_empty() || location.starts_with("??") {
        return;
    }

    match split_location(location) {
        Some((file, line)) => {
            frame.set_file(file);
            frame.set_line(line);
        }
        None => frame.set_file(location),
    }
}

/// Parse a `ps3bin -a2l` labelled block into `frame`.
///
/// All five labels must be present, otherwise the frame is left untouched.
pub fn parse_console_a2l(output: &str, frame: &mut StackFrame)
{
    let mut address = None;
    let mut directory = None;
    let mut file = None;
    let mut line = None;
    let mut symbol = None;

    for text in output.lines() {
        let text = text.trim();
        if let Some(value) = text.strip_prefix("Address:") {
            address = Some(value.trim());
        } else if let Some(value) = text.strip_prefix("Directory:") {
            directory = Some(value.trim());
        } else if let Some(value) = text.strip_prefix("File Name:") {
            file = Some(value.trim());
        } else if let Some(value) = text.strip_prefix("Line Number:") {
            line = Some(value.trim());
        } else if let Some(value) = text.strip_prefix("Symbol:") {
            symbol = Some(value.trim());
        }
    }

    let (Some(_), Some(directory), Some(file), Some(line), Some(symbol)) = (address, directory, file, line, symbol)
    else {
        return;
    };

    if directory != "??" && file != "??" {
        frame.set_file(&format!("{directory}/{file}"));
    }
    if !symbol.is_empty() && symbol != "??" {
        frame.set_function(symbol);
    }
    frame.set_line(leading_number(line));
}

/// Build a sorted [`SymbolMap`] from `nm --print-size --line-numbers` output.
///
/// Only text symbols (`t`, `T`, `w`, `W`) are kept; undefined and data symbols are skipped.
pub fn parse_gnu_symbol_map(output: &str) -> SymbolMap
{
    let mut map = SymbolMap::new();
    for line in output.lines() {
        if let Some(symbol) = parse_gnu_symbol_line(line) {
            map.add_symbol(symbol);
        }
    }
    map.sort();
    map
}

/// Build a sorted [`SymbolMap`] from `ps3bin -dsy` output.
///
/// The tool reports no sizes; [`SymbolMap::sort`] infers them from the next symbol.
pub fn parse_console_symbol_map(output: &str) -> SymbolMap
{
    let mut map = SymbolMap::new();
    for line in output.lines() {
        if let Some(symbol) = parse_console_symbol_line(line) {
            map.add_symbol(symbol);
        }
    }
    map.sort();
    map
}

fn parse_gnu_symbol_line(line: &str) -> Option<Symbol>
{
    let (listing, location) = match line.split_once('\t') {
        Some((listing, location)) => (listing, Some(location)),
        None => (line, None),
    };

    let (offset, rest) = next_token(listing)?;
    let offset = parse_hex(offset)?;

    let (token, mut rest) = next_token(rest)?;
    let mut size = 0;
    let mut kind = token;
    // nm pads sizes to the full address width, so a one-character token is the type.
    if token.len() > 1 {
        size = parse_hex(token)?;
        let (next, after) = next_token(rest)?;
        kind = next;
        rest = after;
    }

    if !matches!(kind, "t" | "T" | "w" | "W") {
        return None;
    }

    let name = rest.trim();
    if name.is_empty() {
        return None;
    }

    let mut symbol = Symbol {
        offset,
        size,
        name: name.to_string(),
        ..Symbol::default()
    };

    if let Some(location) = location.map(str::trim).filter(|l| !l.is_empty()) {
        match split_location(location) {
            Some((file, line)) => {
                symbol.file = file.to_string();
                symbol.line = line;
            }
            None => symbol.file = location.to_string(),
        }
    }

    Some(symbol)
}

fn parse_console_symbol_line(line: &str) -> Option<Symbol>
{
    let (offset, rest) = next_token(line)?;
    let offset = parse_hex(offset)?;
    let (_scope, rest) = next_token(rest)?;
    let (kind, rest) = next_token(rest)?;
    if kind != "Function" {
        return None;
    }
    let (_segment, rest) = next_token(rest)?;

    let name = rest.trim_start().split('\t').next()?.trim_end();
    if name.is_empty() {
        return None;
    }

    Some(Symbol {
        offset,
        name: name.to_string(),
        ..Symbol::default()
    })
}

/// Split a `path:line` string at its last colon.
///
/// The line is the run of digits after the colon, so `file.c:?` yields line 0 and
/// `file.c:12 (discriminator 3)` yields 12. A colon that only separates a drive letter
/// (`C:\src\a.c`) is not a line separator.
fn split_location(location: &str) -> Option<(&str, u32)>
{
    let (file, suffix) = location.rsplit_once(':')?;
    if file.is_empty() || suffix.starts_with(['\\', '/']) {
        return None;
    }
    Some((file, leading_number(suffix.trim_start())))
}

fn next_token(text: &str) -> Option<(&str, &str)>
{
    let text = text.trim_start();
    if text.is_empty() {
        return None;
    }
    match text.find(char::is_whitespace) {
        Some(end) => Some((&text[..end], &text[end..])),
        None => Some((text, "")),
    }
}

fn parse_hex(token: &str) -> Option<u64>
{
    let digits = token
        .strip_prefix("0x")
        .or_else(|| token.strip_prefix("0X"))
        .unwrap_or(token);
    if digits.is_empty() || digits.len() > 16 {
        return None;
    }
    u64::from_str_radix(digits, 16).ok()
}

fn leading_number(text: &str) -> u32
{
    let end = text.find(|c: char| !c.is_ascii_digit()).unwrap_or(text.len());
    text[..end].parse().unwrap_or(0)
}
