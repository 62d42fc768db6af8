//! Address resolution against a table shaped like a small kernel's.

use kmon_core::error::KmonError;
use kmon_core::symbols::{ResolverConfig, StringBlob, SymbolResolver, SymbolTable, SymbolTableBuilder};
use kmon_core::types::Address;

/// Two files; `kern/init.c` has two functions and `kern/monitor.c` one.
fn kernel() -> SymbolTable
{
    SymbolTableBuilder::new()
        .header("obj/kern/kernel")
        .source_file("kern/entry.S", 0xf010_0000)
        .line(44, 0xf010_0000)
        .line(57, 0xf010_002f)
        .source_file("kern/init.c", 0xf010_0040)
        .function("test_backtrace:F(0,1)", 0xf010_0040)
        .param("x:p(0,1)")
        .line(13, 0x0)
        .line(14, 0xa)
        .line(16, 0x14)
        .line(17, 0x14)
        .line(18, 0x29)
        .function("i386_init:F(0,1)", 0xf010_009c)
        .line(24, 0x0)
        .line(39, 0x48)
        .source_file("kern/monitor.c", 0xf010_0200)
        .function("mon_backtrace:F(0,1)", 0xf010_0200)
        .param("argc:p(0,1)")
        .param("argv:p(0,2)")
        .param("tf:p(0,3)")
        .line(62, 0x0)
        .line(69, 0x12)
        .source_file("", 0xf010_0300)
        .build()
}

fn resolver(table: &SymbolTable) -> SymbolResolver<'_>
{
    SymbolResolver::new(table, ResolverConfig::default())
}

#[test]
fn test_every_function_start_resolves_to_itself()
{
    let table = kernel();
    let resolver = resolver(&table);
    for (addr, name) in [
        (0xf010_0040, "test_backtrace"),
        (0xf010_009c, "i386_init"),
        (0xf010_0200, "mon_backtrace"),
    ] {
        let info = resolver.resolve(Address::new(addr)).unwrap();
        assert_eq!(info.function_name, name);
        assert_eq!(info.function_offset, 0);
    }
}

#[test]
fn test_last_byte_of_function_stays_in_function()
{
    let table = kernel();
    let info = resolver(&table).resolve(Address::new(0xf010_009b)).unwrap();
    assert_eq!(info.function_name, "test_backtrace");
    assert_eq!(info.line, 18);
    assert_eq!(info.function_offset, 0x5b);
}

#[test]
fn test_duplicate_line_records_pick_rightmost()
{
    let table = kernel();
    let info = resolver(&table).resolve(Address::new(0xf010_0054)).unwrap();
    assert_eq!(info.line, 17);
}

#[test]
fn test_param_count()
{
    let table = kernel();
    let resolver = resolver(&table);
    assert_eq!(resolver.resolve(Address::new(0xf010_0210)).unwrap().param_count, 3);
    assert_eq!(resolver.resolve(Address::new(0xf010_0050)).unwrap().param_count, 1);
    assert_eq!(resolver.resolve(Address::new(0xf010_00a0)).unwrap().param_count, 0);
}

#[test]
fn test_file_boundary()
{
    let table = kernel();
    let resolver = resolver(&table);
    assert_eq!(resolver.resolve(Address::new(0xf010_01ff)).unwrap().file, "kern/init.c");
    assert_eq!(resolver.resolve(Address::new(0xf010_0200)).unwrap().file, "kern/monitor.c");
}

#[test]
fn test_one_below_first_region_is_not_found()
{
    let table = kernel();
    let err = resolver(&table).resolve(Address::new(0xf00f_ffff)).unwrap_err();
    assert!(matches!(err, KmonError::NotFound(_)));
    assert!(!err.is_fatal());
}

#[test]
fn test_empty_table_is_not_found()
{
    let table = SymbolTable::new(Vec::new(), StringBlob::new(b"\0".to_vec()));
    assert!(matches!(
        resolver(&table).resolve(Address::new(0xf010_0000)),
        Err(KmonError::NotFound(_))
    ));
}

#[test]
fn test_domain_check_precedes_blob_check()
{
    let (stab, mut stabstr) = kernel().to_stabs();
    stabstr.pop();
    let table = SymbolTable::from_stabs(&stab, &stabstr).unwrap();
    let resolver = resolver(&table);
    assert!(matches!(
        resolver.resolve(Address::new(0x0080_0000)),
        Err(KmonError::OutOfDomain { .. })
    ));
    assert!(matches!(
        resolver.resolve(Address::new(0xf010_0040)),
        Err(KmonError::CorruptSymbolTable)
    ));
}

#[test]
fn test_display_matches_backtrace_line()
{
    let table = kernel();
    let info = resolver(&table).resolve(Address::new(0xf010_0214)).unwrap();
    assert_eq!(info.to_string(), "kern/monitor.c:69: mon_backtrace+20");
}
