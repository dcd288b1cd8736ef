//! Symbol records the container parser leaves undecoded.
//!
//! `S_FRAMEPROC` describes the stack frame of the procedure record just before it. It
//! is decoded here from the record's raw bytes.

/// Record kind of `S_FRAMEPROC`.
pub const S_FRAMEPROC: u16 = 0x1012;

/// Thunk ordinal for incremental-linking trampolines.
pub const THUNK_TRAMPOLINE_INCREMENTAL: u8 = 5;

/// Name given to incremental-linking stubs, which carry none of their own.
pub const TRAMPOLINE_NAME: &str = "ILT/Trampoline";
/// Size assumed for incremental-linking stubs: one `jmp rel32`.
pub const TRAMPOLINE_SIZE: u32 = 5;

/// Stack frame layout of a procedure.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameProcedure
{
    pub frame_size: u32,
    pub padding_size: u32,
    pub padding_offset: u32,
    pub saved_registers_size: u32,
    pub exception_handler_offset: u32,
    pub exception_handler_section: u16,
    pub flags: u32,
}

impl FrameProcedure
{
    /// Decode an `S_FRAMEPROC` record from its raw bytes, kind field included.
    ///
    /// Returns `None` for any other kind or a truncated record.
    pub fn parse(raw: &[u8]) -> Option<Self>
    {
        let (kind, payload) = raw.split_first_chunk::<2>()?;
        if u16::from_le_bytes(*kind) != S_FRAMEPROC {
            return None;
        }

        let u32_at = |at: usize| payload.get(at..at + 4)?.try_into().ok().map(u32::from_le_bytes);
        let u16_at = |at: usize| payload.get(at..at + 2)?.try_into().ok().map(u16::from_le_bytes);

        Some(Self {
            frame_size: u32_at(0)?,
            padding_size: u32_at(4)?,
            padding_offset: u32_at(8)?,
            saved_registers_size: u32_at(12)?,
            exception_handler_offset: u32_at(16)?,
            exception_handler_section: u16_at(20)?,
            flags: u32_at(22)?,
        })
    }
}
