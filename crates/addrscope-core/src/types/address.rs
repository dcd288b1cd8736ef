//! Instruction address type.

/// Strongly typed instruction address
///
/// This wrapper around `u64` keeps absolute addresses (as captured in a call stack)
/// apart from module-relative offsets and sizes, which stay plain integers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Address(u64);

impl Address
{
    pub const fn new(value: u64) -> Self
    {
        Address(value)
    }

    /// Offset of this address inside the half-open range `[base, base + size)`
    ///
    /// Uses wrapping subtraction so an address below `base` turns into a huge offset and
    /// fails the `< size` test instead of matching.
    ///
    /// ## Example
    ///
    /// ```rust
    /// use addrscope_core::types::Address;
    ///
    /// assert_eq!(Address::new(0x10FFF).offset_within(0x10000, 0x1000), Some(0xFFF));
    /// assert_eq!(Address::new(0x11000).offset_within(0x10000, 0x1000), None);
    /// assert_eq!(Address::new(0x0FFFF).offset_within(0x10000, 0x1000), None);
    /// ```
    pub const fn offset_within(self, base: u64, size: u64) -> Option<u64>
    {
        let offset = self.0.wrapping_sub(base);
        if offset < size {
            Some(offset)
        } else {
            None
        }
    }
}
