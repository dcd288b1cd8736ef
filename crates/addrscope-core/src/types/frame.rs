//! Resolved stack frame.

use std::fmt;

/// Placeholder used for every name field that could not be resolved.
pub const UNKNOWN: &str = "Unknown";

/// Maximum stored length of a module name, in bytes.
pub const MODULE_NAME_CAPACITY: usize = 256;
/// Maximum stored length of a source file path, in bytes.
pub const FILE_NAME_CAPACITY: usize = 1024;
/// Maximum stored length of a function name, in bytes.
///
/// Large enough for heavily templated C++ names after demangling.
pub const FUNCTION_NAME_CAPACITY: usize = 16384;

/// One resolved entry of a call stack
///
/// Every field resolves independently: a frame with a known function but an unknown
/// file and line is normal for code without line information. Unresolved names read
/// [`UNKNOWN`] and an unresolved line reads `0`.
///
/// Names longer than their capacity are truncated on a character boundary, so callers
/// can rely on [`MODULE_NAME_CAPACITY`], [`FILE_NAME_CAPACITY`] and
/// [`FUNCTION_NAME_CAPACITY`] as hard limits.
///
/// ## Example
///
/// ```rust
/// use addrscope_core::StackFrame;
///
/// let mut frame = StackFrame::default();
/// assert!(frame.is_unknown());
///
/// frame.set_function("main");
/// frame.set_line(42);
/// assert_eq!(frame.function(), "main");
/// assert_eq!(frame.file(), "Unknown");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StackFrame
{
    module: String,
    file: String,
    function: String,
    line: u32,
}

impl Default for StackFrame
{
    fn default() -> Self
    {
        Self {
            module: UNKNOWN.to_string(),
            file: UNKNOWN.to_string(),
            function: UNKNOWN.to_string(),
            line: 0,
        }
    }
}

impl StackFrame
{
    pub fn module(&self) -> &str
    {
        &self.module
    }

    pub fn file(&self) -> &str
    {
        &self.file
    }

    pub fn function(&self) -> &str
    {
        &self.function
    }

    pub fn line(&self) -> u32
    {
        self.line
    }

    pub fn set_module(&mut self, name: &str)
    {
        self.module = bounded(name, MODULE_NAME_CAPACITY);
    }

    pub fn set_file(&mut self, path: &str)
    {
        self.file = bounded(path, FILE_NAME_CAPACITY);
    }

    pub fn set_function(&mut self, name: &str)
    {
        self.function = bounded(name, FUNCTION_NAME_CAPACITY);
    }

    pub fn set_line(&mut self, line: u32)
    {
        self.line = line;
    }

    /// `true` when the function name is still the placeholder.
    pub fn has_function(&self) -> bool
    {
        self.function != UNKNOWN
    }

    /// `true` when neither function nor file nor line were resolved.
    pub fn is_unknown(&self) -> bool
    {
        !self.has_function() && self.file == UNKNOWN && self.line == 0
    }
}

impl fmt::Display for StackFrame
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        write!(f, "{}!{} {}:{}", self.module, self.function, self.file, self.line)
    }
}

fn bounded(value: &str, capacity: usize) -> String
{
    if value.len() <= capacity {
        return value.to_string();
    }
    let mut end = capacity;
    while !value.is_char_boundary(end) {
        end -= 1;
    }
    value[..end].to_string()
}
