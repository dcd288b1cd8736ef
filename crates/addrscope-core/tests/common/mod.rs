//! Synthetic PDB writer shared by the integration tests
//!
//! Produces the smallest MSF 7.00 container the index accepts: info, TPI, DBI, section
//! headers, symbol records, publics, `/names` and one stream per module.

#![allow(dead_code)]

const MSF_MAGIC: &[u8; 32] = b"Microsoft C/C++ MSF 7.00\r\n\x1aDS\0\0\0";
const NAMES_SIGNATURE: u32 = 0xEFFE_EFFE;
const SECTION_CONTRIBUTION_V60: u32 = 0xEFFE_0000 + 19_970_605;
const FEATURE_VC140: u32 = 20_140_508;
const FEATURE_MINIMAL_DEBUG_INFO: u32 = 0x494E_494D;

const DEBUG_S_LINES: u32 = 0xF2;
const DEBUG_S_FILECHKSMS: u32 = 0xF4;

const S_END: u16 = 0x0006;
const S_THUNK32: u16 = 0x1102;
const S_PUB32: u16 = 0x110E;
const S_GPROC32: u16 = 0x1110;
const S_TRAMPOLINE: u16 = 0x112C;

pub const BLOCK_SIZE: usize = 512;

pub const GUID: [u8; 16] = [
    0xE0, 0x04, 0x25, 0x3F, 0x89, 0x4F, 0xD3, 0x11, 0x9A, 0x0C, 0x03, 0x05, 0xE8, 0x2C, 0x33, 0x01,
];

const INFO_STREAM: usize = 1;
const SECTION_HEADER_STREAM: u16 = 5;
const SYMBOL_RECORD_STREAM: u16 = 6;
const PUBLIC_STREAM: u16 = 7;
const NAMES_STREAM: u32 = 8;
const FIRST_MODULE_STREAM: u16 = 9;

/// One image section.
#[derive(Debug, Clone)]
struct SectionSpec
{
    name: &'static str,
    virtual_address: u32,
    virtual_size: u32,
}

/// Symbol records and C13 line data of one compiland.
#[derive(Debug, Clone, Default)]
pub struct ModuleSpec
{
    name: String,
    symbols: Vec<u8>,
    c13: Vec<u8>,
}

impl ModuleSpec
{
    pub fn new(name: &str) -> Self
    {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }

    /// `S_GPROC32` followed by its `S_END`.
    pub fn procedure(mut self, name: &str, section: u16, offset: u32, len: u32) -> Self
    {
        let mut payload = Vec::new();
        for field in [0u32, 0, 0, len, 0, len, 0x1001, offset] {
            payload.extend_from_slice(&field.to_le_bytes());
        }
        payload.extend_from_slice(&section.to_le_bytes());
        payload.push(0);
        push_cstr(&mut payload, name);
        push_record(&mut self.symbols, S_GPROC32, &payload);
        push_record(&mut self.symbols, S_END, &[]);
        self
    }

    /// `S_THUNK32` with the given ordinal.
    pub fn thunk(mut self, name: &str, section: u16, offset: u32, len: u16, ordinal: u8) -> Self
    {
        let mut payload = Vec::new();
        for field in [0u32, 0, 0, offset] {
            payload.extend_from_slice(&field.to_le_bytes());
        }
        payload.extend_from_slice(&section.to_le_bytes());
        payload.extend_from_slice(&len.to_le_bytes());
        payload.push(ordinal);
        push_cstr(&mut payload, name);
        push_record(&mut self.symbols, S_THUNK32, &payload);
        self
    }

    /// `S_TRAMPOLINE` stub at `(section, offset)`.
    pub fn trampoline(mut self, section: u16, offset: u32) -> Self
    {
        let mut payload = Vec::new();
        payload.extend_from_slice(&0u16.to_le_bytes());
        payload.extend_from_slice(&5u16.to_le_bytes());
        payload.extend_from_slice(&offset.to_le_bytes());
        payload.extend_from_slice(&0u32.to_le_bytes());
        payload.extend_from_slice(&section.to_le_bytes());
        payload.extend_from_slice(&section.to_le_bytes());
        push_record(&mut self.symbols, S_TRAMPOLINE, &payload);
        self
    }

    /// File checksums subsection without checksum bytes; entry `i` sits at offset `8 * i`.
    pub fn checksums(mut self, name_offsets: &[u32]) -> Self
    {
        let mut payload = Vec::new();
        for name_offset in name_offsets {
            payload.extend_from_slice(&name_offset.to_le_bytes());
            payload.extend_from_slice(&[0, 0, 0, 0]);
        }
        push_subsection(&mut self.c13, DEBUG_S_FILECHKSMS, &payload);
        self
    }

    /// Lines subsection with one block of `(offset, line)` pairs.
    pub fn lines(
        mut self,
        section: u16,
        offset: u32,
        code_size: u32,
        checksum_offset: u32,
        lines: &[(u32, u32)],
    ) -> Self
    {
        let mut payload = Vec::new();
        payload.extend_from_slice(&offset.to_le_bytes());
        payload.extend_from_slice(&section.to_le_bytes());
        payload.extend_from_slice(&0u16.to_le_bytes());
        payload.extend_from_slice(&code_size.to_le_bytes());

        let count = u32::try_from(lines.len()).unwrap();
        payload.extend_from_slice(&checksum_offset.to_le_bytes());
        payload.extend_from_slice(&count.to_le_bytes());
        payload.extend_from_slice(&(12 + 8 * count).to_le_bytes());
        for (line_offset, line) in lines {
            payload.extend_from_slice(&line_offset.to_le_bytes());
            payload.extend_from_slice(&(line | 0x8000_0000).to_le_bytes());
        }
        push_subsection(&mut self.c13, DEBUG_S_LINES, &payload);
        self
    }
}

#[derive(Debug, Clone)]
struct PublicSpec
{
    name: String,
    section: u16,
    offset: u32,
    function: bool,
}

#[derive(Debug, Clone, Copy)]
struct ContributionSpec
{
    section: u16,
    offset: u32,
    size: u32,
    module: u16,
}

/// Builds a PDB image in memory.
#[derive(Debug, Clone)]
pub struct PdbBuilder
{
    pub age: u32,
    pub machine: u16,
    pub fast_link: bool,
    pub section_headers: bool,
    /// Lay every stream's blocks out in descending order so nothing is contiguous.
    pub scatter_blocks: bool,
    sections: Vec<SectionSpec>,
    modules: Vec<ModuleSpec>,
    publics: Vec<PublicSpec>,
    contributions: Vec<ContributionSpec>,
    names: Vec<u8>,
}

impl Default for PdbBuilder
{
    fn default() -> Self
    {
        Self {
            age: 1,
            machine: 0x8664,
            fast_link: false,
            section_headers: true,
            scatter_blocks: false,
            sections: vec![
                SectionSpec {
                    name: ".text",
                    virtual_address: 0x1000,
                    virtual_size: 0x3000,
                },
                SectionSpec {
                    name: ".data",
                    virtual_address: 0x5000,
                    virtual_size: 0x1000,
                },
            ],
            modules: Vec::new(),
            publics: Vec::new(),
            contributions: Vec::new(),
            names: vec![0],
        }
    }
}

impl PdbBuilder
{
    pub fn new() -> Self
    {
        Self::default()
    }

    /// Add `name` to `/names` and return its offset.
    pub fn intern(&mut self, name: &str) -> u32
    {
        let offset = u32::try_from(self.names.len()).unwrap();
        push_cstr(&mut self.names, name);
        offset
    }

    pub fn module(mut self, module: ModuleSpec) -> Self
    {
        self.modules.push(module);
        self
    }

    pub fn public(mut self, name: &str, section: u16, offset: u32, function: bool) -> Self
    {
        self.publics.push(PublicSpec {
            name: name.to_string(),
            section,
            offset,
            function,
        });
        self
    }

    pub fn contribution(mut self, section: u16, offset: u32, size: u32, module: u16) -> Self
    {
        self.contributions.push(ContributionSpec {
            section,
            offset,
            size,
            module,
        });
        self
    }

    /// Serialize into MSF form.
    pub fn build(&self) -> Vec<u8>
    {
        let module_count = u16::try_from(self.modules.len()).unwrap();
        let mut streams: Vec<Vec<u8>> = vec![Vec::new(); usize::from(FIRST_MODULE_STREAM + module_count)];

        streams[INFO_STREAM] = self.info_stream();
        streams[2] = tpi_stream();
        streams[3] = self.dbi_stream();
        streams[usize::from(SECTION_HEADER_STREAM)] = self.section_header_stream();

        let (records, offsets) = self.symbol_records();
        streams[usize::from(SYMBOL_RECORD_STREAM)] = records;
        streams[usize::from(PUBLIC_STREAM)] = publics_stream(&offsets);
        streams[NAMES_STREAM as usize] = self.names_stream();

        for (i, module) in self.modules.iter().enumerate() {
            let mut data = 4u32.to_le_bytes().to_vec();
            data.extend_from_slice(&module.symbols);
            data.extend_from_slice(&module.c13);
            streams[usize::from(FIRST_MODULE_STREAM) + i] = data;
        }

        write_msf(&streams, self.scatter_blocks)
    }

    fn info_stream(&self) -> Vec<u8>
    {
        let mut data = Vec::new();
        for field in [20_000_404u32, 0x5F00_0000, self.age] {
            data.extend_from_slice(&field.to_le_bytes());
        }
        data.extend_from_slice(&GUID);

        let buffer = b"/names\0";
        push_u32(&mut data, buffer.len());
        data.extend_from_slice(buffer);
        for field in [1u32, 1, 1, 0b1, 0, 0, NAMES_STREAM] {
            data.extend_from_slice(&field.to_le_bytes());
        }

        data.extend_from_slice(&FEATURE_VC140.to_le_bytes());
        if self.fast_link {
            data.extend_from_slice(&FEATURE_MINIMAL_DEBUG_INFO.to_le_bytes());
        }
        data
    }

    fn dbi_stream(&self) -> Vec<u8>
    {
        let mut module_info = Vec::new();
        for (i, module) in self.modules.iter().enumerate() {
            let stream = FIRST_MODULE_STREAM + u16::try_from(i).unwrap();
            push_u32(&mut module_info, 0);
            module_info.extend_from_slice(&contribution_bytes(&ContributionSpec {
                section: 0,
                offset: 0,
                size: 0,
                module: 0,
            }));
            module_info.extend_from_slice(&0u16.to_le_bytes());
            module_info.extend_from_slice(&stream.to_le_bytes());
            push_u32(&mut module_info, 4 + module.symbols.len());
            push_u32(&mut module_info, 0);
            push_u32(&mut module_info, module.c13.len());
            module_info.extend_from_slice(&0u16.to_le_bytes());
            module_info.extend_from_slice(&0u16.to_le_bytes());
            for _ in 0..3 {
                push_u32(&mut module_info, 0);
            }
            push_cstr(&mut module_info, &module.name);
            push_cstr(&mut module_info, &module.name);
            pad_to_4(&mut module_info);
        }

        let mut contributions = SECTION_CONTRIBUTION_V60.to_le_bytes().to_vec();
        for contribution in &self.contributions {
            contributions.extend_from_slice(&contribution_bytes(contribution));
        }

        let mut debug_header = Vec::new();
        for index in 0..11u16 {
            let stream = if index == 5 && self.section_headers {
                SECTION_HEADER_STREAM
            } else {
                0xFFFF
            };
            debug_header.extend_from_slice(&stream.to_le_bytes());
        }

        let mut data = Vec::new();
        data.extend_from_slice(&(-1i32).to_le_bytes());
        push_u32(&mut data, 19_990_903);
        push_u32(&mut data, self.age as usize);
        for stream in [0xFFFFu16, 0, PUBLIC_STREAM, 0, SYMBOL_RECORD_STREAM, 0] {
            data.extend_from_slice(&stream.to_le_bytes());
        }
        push_u32(&mut data, module_info.len());
        push_u32(&mut data, contributions.len());
        push_u32(&mut data, 0); // section map
        push_u32(&mut data, 0); // file info
        push_u32(&mut data, 0); // type server map
        push_u32(&mut data, 0); // MFC type server
        push_u32(&mut data, debug_header.len());
        push_u32(&mut data, 0); // EC
        data.extend_from_slice(&0u16.to_le_bytes());
        data.extend_from_slice(&self.machine.to_le_bytes());
        push_u32(&mut data, 0);
        assert_eq!(data.len(), 64);

        data.extend_from_slice(&module_info);
        data.extend_from_slice(&contributions);
        data.extend_from_slice(&debug_header);
        data
    }

    fn section_header_stream(&self) -> Vec<u8>
    {
        let mut data = Vec::new();
        for section in &self.sections {
            let mut name = [0u8; 8];
            name[..section.name.len()].copy_from_slice(section.name.as_bytes());
            data.extend_from_slice(&name);
            for field in [section.virtual_size, section.virtual_address, 0, 0, 0, 0] {
                data.extend_from_slice(&field.to_le_bytes());
            }
            data.extend_from_slice(&[0u8; 4]);
            data.extend_from_slice(&0x6000_0020u32.to_le_bytes());
        }
        data
    }

    fn symbol_records(&self) -> (Vec<u8>, Vec<usize>)
    {
        let mut records = Vec::new();
        let mut offsets = Vec::new();
        for public in &self.publics {
            offsets.push(records.len());
            let mut payload = Vec::new();
            payload.extend_from_slice(&(if public.function { 0x2u32 } else { 0 }).to_le_bytes());
            payload.extend_from_slice(&public.offset.to_le_bytes());
            payload.extend_from_slice(&public.section.to_le_bytes());
            push_cstr(&mut payload, &public.name);
            push_record(&mut records, S_PUB32, &payload);
        }
        (records, offsets)
    }

    fn names_stream(&self) -> Vec<u8>
    {
        let mut data = NAMES_SIGNATURE.to_le_bytes().to_vec();
        push_u32(&mut data, 1);
        push_u32(&mut data, self.names.len());
        data.extend_from_slice(&self.names);
        pad_to_4(&mut data);
        push_u32(&mut data, 0); // hash buckets
        push_u32(&mut data, 0); // name count
        data
    }
}

fn tpi_stream() -> Vec<u8>
{
    let mut data = Vec::new();
    for field in [20_040_203u32, 56, 0x1000, 0x1000, 0] {
        data.extend_from_slice(&field.to_le_bytes());
    }
    data.resize(56, 0);
    data
}

fn publics_stream(record_offsets: &[usize]) -> Vec<u8>
{
    let mut hash = Vec::new();
    push_u32(&mut hash, 0xFFFF_FFFF);
    hash.extend_from_slice(&(0xEFFE_0000u32 + 19_990_810).to_le_bytes());
    push_u32(&mut hash, record_offsets.len() * 8);
    push_u32(&mut hash, 0);
    for offset in record_offsets {
        push_u32(&mut hash, offset + 1);
        push_u32(&mut hash, 1);
    }

    let mut data = Vec::new();
    push_u32(&mut data, hash.len());
    data.extend_from_slice(&[0u8; 24]);
    data.extend_from_slice(&hash);
    data
}

fn contribution_bytes(contribution: &ContributionSpec) -> Vec<u8>
{
    let mut data = Vec::new();
    data.extend_from_slice(&contribution.section.to_le_bytes());
    data.extend_from_slice(&0u16.to_le_bytes());
    data.extend_from_slice(&contribution.offset.to_le_bytes());
    data.extend_from_slice(&contribution.size.to_le_bytes());
    data.extend_from_slice(&0x6000_0020u32.to_le_bytes());
    data.extend_from_slice(&contribution.module.to_le_bytes());
    data.extend_from_slice(&0u16.to_le_bytes());
    data.extend_from_slice(&[0u8; 8]);
    data
}

/// Superblock in block 0, free block maps in 1-2, directory block map in 3, then streams
/// and finally the directory.
fn write_msf(streams: &[Vec<u8>], scatter: bool) -> Vec<u8>
{
    let mut next_block = 4u32;
    let mut allocate = |len: usize| -> Vec<u32> {
        let count = u32::try_from(len.div_ceil(BLOCK_SIZE)).unwrap();
        let mut blocks: Vec<u32> = (next_block..next_block + count).collect();
        next_block += count;
        if scatter {
            blocks.reverse();
        }
        blocks
    };

    let stream_blocks: Vec<Vec<u32>> = streams.iter().map(|stream| allocate(stream.len())).collect();

    let mut directory = Vec::new();
    push_u32(&mut directory, streams.len());
    for stream in streams {
        push_u32(&mut directory, stream.len());
    }
    for blocks in &stream_blocks {
        for block in blocks {
            directory.extend_from_slice(&block.to_le_bytes());
        }
    }
    let directory_blocks = allocate(directory.len());
    let num_blocks = next_block as usize;

    let mut file = vec![0u8; num_blocks * BLOCK_SIZE];
    let mut superblock = MSF_MAGIC.to_vec();
    for field in [BLOCK_SIZE, 1, num_blocks, directory.len(), 0, 3] {
        push_u32(&mut superblock, field);
    }
    file[..superblock.len()].copy_from_slice(&superblock);

    for (i, block) in directory_blocks.iter().enumerate() {
        let at = 3 * BLOCK_SIZE + i * 4;
        file[at..at + 4].copy_from_slice(&block.to_le_bytes());
    }

    scatter_into(&mut file, &directory, &directory_blocks);
    for (stream, blocks) in streams.iter().zip(&stream_blocks) {
        scatter_into(&mut file, stream, blocks);
    }
    file
}

fn scatter_into(file: &mut [u8], data: &[u8], blocks: &[u32])
{
    for (chunk, block) in data.chunks(BLOCK_SIZE).zip(blocks) {
        let start = *block as usize * BLOCK_SIZE;
        file[start..start + chunk.len()].copy_from_slice(chunk);
    }
}

fn push_record(out: &mut Vec<u8>, kind: u16, payload: &[u8])
{
    let mut body = kind.to_le_bytes().to_vec();
    body.extend_from_slice(payload);
    while (body.len() + 2) % 4 != 0 {
        body.push(0);
    }
    out.extend_from_slice(&u16::try_from(body.len()).unwrap().to_le_bytes());
    out.extend_from_slice(&body);
}

fn push_subsection(out: &mut Vec<u8>, kind: u32, payload: &[u8])
{
    out.extend_from_slice(&kind.to_le_bytes());
    push_u32(out, payload.len());
    out.extend_from_slice(payload);
    pad_to_4(out);
}

fn push_cstr(out: &mut Vec<u8>, text: &str)
{
    out.extend_from_slice(text.as_bytes());
    out.push(0);
}

fn push_u32(out: &mut Vec<u8>, value: usize)
{
    out.extend_from_slice(&u32::try_from(value).unwrap().to_le_bytes());
}

fn pad_to_4(out: &mut Vec<u8>)
{
    while out.len() % 4 != 0 {
        out.push(0);
    }
}

/// Two modules, one function-flagged public, one data public and a line table:
///
/// | RVA | function | source |
/// |---|---|---|
/// | 0x1000 | `main` (0x40) | main.cpp 10, 11 @0x1010, 14 @0x1030 |
/// | 0x1040 | `helper` (0x20) | main.cpp 20, 21 @0x1048 |
/// | 0x1100 | `compute` (0x80) | util.cpp 5, 6 @0x1120 |
/// | 0x1200 | `entry_stub` (public) | |
pub fn sample_pdb() -> Vec<u8>
{
    sample_builder().build()
}

pub fn sample_builder() -> PdbBuilder
{
    let mut builder = PdbBuilder::new();
    let main_cpp = builder.intern("C:\\src\\main.cpp");
    let util_cpp = builder.intern("C:\\src\\util.cpp");

    let main_obj = ModuleSpec::new("main.obj")
        .procedure("main", 1, 0x0, 0x40)
        .procedure("helper", 1, 0x40, 0x20)
        .lines(1, 0x0, 0x40, 0, &[(0x0, 10), (0x10, 11), (0x30, 14)])
        .lines(1, 0x40, 0x20, 0, &[(0x0, 20), (0x8, 21)])
        .checksums(&[main_cpp]);

    // Checksums ahead of the lines that use them.
    let util_obj = ModuleSpec::new("util.obj")
        .checksums(&[util_cpp])
        .procedure("compute", 1, 0x100, 0x80)
        .lines(1, 0x100, 0x80, 0, &[(0x0, 5), (0x20, 6)]);

    builder
        .module(main_obj)
        .module(util_obj)
        .public("main", 1, 0x0, true)
        .public("entry_stub", 1, 0x200, true)
        .public("g_counter", 2, 0x10, false)
        .contribution(1, 0x0, 0x60, 0)
        .contribution(1, 0x100, 0x80, 1)
        .contribution(1, 0x200, 0x10, 1)
        .contribution(2, 0x0, 0x100, 0)
}
