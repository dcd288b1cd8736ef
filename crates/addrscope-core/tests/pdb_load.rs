//! Tests for loading synthetic debug databases and querying the built tables

mod common;

use addrscope_core::pdb::{DebugDatabaseIndex, MachineType, PdbError};
use common::{sample_builder, sample_pdb, ModuleSpec, PdbBuilder, GUID};

#[test]
fn test_tables_are_sorted_and_sized()
{
    let index = DebugDatabaseIndex::from_bytes(sample_pdb()).unwrap();

    let functions: Vec<_> = index.functions().iter().map(|f| (f.name.as_str(), f.rva, f.size)).collect();
    assert_eq!(
        functions,
        [
            ("main", 0x1000, Some(0x40)),
            ("helper", 0x1040, Some(0x20)),
            ("compute", 0x1100, Some(0x80)),
            ("entry_stub", 0x1200, Some(0x10)),
        ]
    );

    let lines: Vec<_> = index.lines().iter().map(|l| (l.rva, l.line, l.code_size)).collect();
    assert_eq!(
        lines,
        [
            (0x1000, 10, 0x10),
            (0x1010, 11, 0x20),
            (0x1030, 14, 0x10),
            (0x1040, 20, 0x8),
            (0x1048, 21, 0x18),
            (0x1100, 5, 0x20),
            (0x1120, 6, 0x60),
        ]
    );
    assert!(index.lines().windows(2).all(|pair| pair[0].rva <= pair[1].rva));
}

#[test]
fn test_identity()
{
    let index = DebugDatabaseIndex::from_bytes(sample_pdb()).unwrap();
    let identity = index.identity();
    assert_eq!(identity.guid, GUID);
    assert_eq!(identity.age, 1);
    assert_eq!(identity.machine, MachineType::Amd64);
}

#[test]
fn test_symbol_by_address()
{
    let index = DebugDatabaseIndex::from_bytes(sample_pdb()).unwrap();

    let frame = index.symbol_by_address(0x1012);
    assert_eq!(frame.function(), "main");
    assert_eq!(frame.file(), "C:\\src\\main.cpp");
    assert_eq!(frame.line(), 11);

    let frame = index.symbol_by_address(0x104C);
    assert_eq!(frame.function(), "helper");
    assert_eq!(frame.line(), 21);

    // util.obj lists its checksums before its lines
    let frame = index.symbol_by_address(0x1130);
    assert_eq!(frame.function(), "compute");
    assert_eq!(frame.file(), "C:\\src\\util.cpp");
    assert_eq!(frame.line(), 6);
}

#[test]
fn test_function_and_line_resolve_independently()
{
    let index = DebugDatabaseIndex::from_bytes(sample_pdb()).unwrap();

    // No line entry starts inside entry_stub, so the nearest one below is used.
    let frame = index.symbol_by_address(0x1204);
    assert_eq!(frame.function(), "entry_stub");
    assert_eq!(frame.file(), "C:\\src\\util.cpp");
    assert_eq!(frame.line(), 6);
}

#[test]
fn test_address_below_first_entry_is_unknown()
{
    let index = DebugDatabaseIndex::from_bytes(sample_pdb()).unwrap();
    let frame = index.symbol_by_address(0x0FFF);
    assert!(frame.is_unknown());
    assert_eq!(index.symbol_id(0x0FFF), None);
}

#[test]
fn test_symbol_id_is_function_start()
{
    let index = DebugDatabaseIndex::from_bytes(sample_pdb()).unwrap();
    assert_eq!(index.symbol_id(0x1100), Some(0x1100));
    assert_eq!(index.symbol_id(0x117F), Some(0x1100));
    assert_eq!(index.symbol_id(0x1041), Some(0x1040));
}

#[test]
fn test_queries_are_repeatable()
{
    let index = DebugDatabaseIndex::from_bytes(sample_pdb()).unwrap();
    let first = index.symbol_by_address(0x1030);
    for _ in 0..3 {
        assert_eq!(index.symbol_by_address(0x1030), first);
    }
}

#[test]
fn test_load_from_file()
{
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("game.pdb");
    std::fs::write(&path, sample_pdb()).unwrap();

    let index = DebugDatabaseIndex::load(&path).unwrap();
    assert_eq!(index.functions().len(), 4);
    assert_eq!(index.filenames().len(), 2);
}

#[test]
fn test_non_contiguous_streams()
{
    let mut builder = sample_builder();
    let mut module = ModuleSpec::new("big.obj");
    for i in 0..40u32 {
        module = module.procedure(&format!("generated_function_{i:02}"), 1, 0x1000 + i * 0x10, 0x10);
    }
    builder = builder.module(module);
    builder.scatter_blocks = true;

    let index = DebugDatabaseIndex::from_bytes(builder.build()).unwrap();
    assert_eq!(index.functions().len(), 44);
    assert_eq!(index.symbol_by_address(0x2015).function(), "generated_function_01");
    assert_eq!(index.symbol_by_address(0x1012).function(), "main");
}

#[test]
fn test_line_sentinel_repeats_previous_line()
{
    let mut builder = PdbBuilder::new();
    let file = builder.intern("a.cpp");
    let module = ModuleSpec::new("a.obj")
        .procedure("f", 1, 0, 0x30)
        .lines(1, 0, 0x30, 0, &[(0x0, 42), (0x10, 0xFEEFEE), (0x20, 43)])
        .checksums(&[file]);
    let data = builder.module(module).contribution(1, 0, 0x30, 0).build();

    let index = DebugDatabaseIndex::from_bytes(data).unwrap();
    let lines: Vec<_> = index.lines().iter().map(|l| l.line).collect();
    assert_eq!(lines, [42, 42, 43]);
}

#[test]
fn test_thunks_and_trampolines()
{
    let module = ModuleSpec::new("* Linker *")
        .trampoline(1, 0x0)
        .thunk("import_thunk", 1, 0x10, 6, 0)
        .thunk("ignored_name", 1, 0x20, 5, 5);
    let data = PdbBuilder::new().module(module).contribution(1, 0, 0x30, 0).build();

    let index = DebugDatabaseIndex::from_bytes(data).unwrap();
    let functions: Vec<_> = index.functions().iter().map(|f| (f.name.as_str(), f.size)).collect();
    assert_eq!(
        functions,
        [
            ("ILT/Trampoline", Some(5)),
            ("import_thunk", Some(6)),
            ("ILT/Trampoline", Some(5)),
        ]
    );
}

#[test]
fn test_later_module_record_wins()
{
    let data = PdbBuilder::new()
        .module(ModuleSpec::new("a.obj").procedure("first", 1, 0, 0x10))
        .module(ModuleSpec::new("b.obj").procedure("second", 1, 0, 0x10))
        .contribution(1, 0, 0x10, 0)
        .build();

    let index = DebugDatabaseIndex::from_bytes(data).unwrap();
    assert_eq!(index.functions().len(), 1);
    assert_eq!(index.symbol_by_address(0x1000).function(), "second");
}

#[test]
fn test_rejects_fast_link()
{
    let mut builder = sample_builder();
    builder.fast_link = true;
    assert!(matches!(
        DebugDatabaseIndex::from_bytes(builder.build()),
        Err(PdbError::FastLinkUnsupported)
    ));
}

#[test]
fn test_rejects_missing_section_headers()
{
    let mut builder = sample_builder();
    builder.section_headers = false;
    assert!(matches!(
        DebugDatabaseIndex::from_bytes(builder.build()),
        Err(PdbError::MissingStream("section headers"))
    ));
}

#[test]
fn test_rejects_missing_contributions()
{
    let data = PdbBuilder::new()
        .module(ModuleSpec::new("a.obj").procedure("f", 1, 0, 0x10))
        .build();
    assert!(matches!(
        DebugDatabaseIndex::from_bytes(data),
        Err(PdbError::MissingStream("section contributions"))
    ));
}

#[test]
fn test_rejects_missing_modules()
{
    let data = PdbBuilder::new().contribution(1, 0, 0x10, 0).build();
    assert!(matches!(
        DebugDatabaseIndex::from_bytes(data),
        Err(PdbError::MissingStream("module info"))
    ));
}

#[test]
fn test_rejects_database_without_functions()
{
    let data = PdbBuilder::new()
        .module(ModuleSpec::new("data.obj"))
        .public("g_counter", 2, 0, false)
        .contribution(2, 0, 0x10, 0)
        .build();
    assert!(matches!(
        DebugDatabaseIndex::from_bytes(data),
        Err(PdbError::NoFunctionSymbols)
    ));
}

#[test]
fn test_rejects_bad_magic()
{
    let mut data = sample_pdb();
    data[0] = b'X';
    assert!(matches!(DebugDatabaseIndex::from_bytes(data), Err(PdbError::InvalidMagic)));
}

#[test]
fn test_missing_file_is_io_error()
{
    let dir = tempfile::tempdir().unwrap();
    assert!(matches!(
        DebugDatabaseIndex::load(dir.path().join("absent.pdb")),
        Err(PdbError::Io(_))
    ));
}
