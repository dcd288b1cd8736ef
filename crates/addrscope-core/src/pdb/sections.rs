//! `(section, offset)` → RVA translation over the image section headers.

use pdb::{ImageSectionHeader, PdbInternalSectionOffset};

/// Virtual addresses of the image sections, in section-number order
///
/// Symbol and line records address code as a 1-based section number plus an offset;
/// this table turns that pair into a relative virtual address.
#[derive(Debug, Clone, Default)]
pub struct ImageSections
{
    virtual_addresses: Vec<u32>,
}

impl ImageSections
{
    pub fn from_headers(headers: &[ImageSectionHeader]) -> Self
    {
        Self {
            virtual_addresses: headers.iter().map(|header| header.virtual_address).collect(),
        }
    }

    /// RVA of `offset` bytes into 1-based section `section`.
    ///
    /// `None` when the section number is 0 or past the table.
    pub fn rva(&self, section: u16, offset: u32) -> Option<u32>
    {
        let index = usize::from(section).checked_sub(1)?;
        self.virtual_addresses
            .get(index)
            .map(|virtual_address| virtual_address.wrapping_add(offset))
    }

    /// RVA of a section-relative offset, or 0 (never a valid code RVA) when unmapped.
    pub fn rva_or_zero(&self, offset: PdbInternalSectionOffset) -> u32
    {
        self.rva(offset.section, offset.offset).unwrap_or(0)
    }

    pub fn len(&self) -> usize
    {
        self.virtual_addresses.len()
    }

    pub fn is_empty(&self) -> bool
    {
        self.virtual_addresses.is_empty()
    }
}
