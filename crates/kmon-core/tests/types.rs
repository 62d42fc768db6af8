//! Tests for shared value types

use kmon_core::types::{Address, ResolvedLocation, StackFrame, SymbolKind};

#[test]
fn test_address_display_is_zero_padded()
{
    assert_eq!(Address::new(0x42).to_string(), "0x00000042");
    assert_eq!(format!("{:x}", Address::new(0xf010_0000)), "f0100000");
}

#[test]
fn test_address_conversions()
{
    let addr = Address::from(0xf010_0040u32);
    let raw: u32 = addr.into();
    assert_eq!(raw, 0xf010_0040);
    assert!(Address::ZERO.is_zero());
}

#[test]
fn test_address_checked_arithmetic()
{
    let top = Address::new(0xffff_fffc);
    assert_eq!(top.checked_add(4), None);
    assert_eq!(top.checked_add(3), Some(Address::new(0xffff_ffff)));
    assert_eq!(Address::new(3).checked_sub(4), None);
    assert_eq!(top.saturating_add(0x10), Address::new(0xffff_ffff));
}

#[test]
fn test_symbol_kind_raw_values()
{
    assert_eq!(SymbolKind::from_raw(0x64), SymbolKind::SourceFile);
    assert_eq!(SymbolKind::from_raw(0x24), SymbolKind::Function);
    assert_eq!(SymbolKind::from_raw(0x44), SymbolKind::SourceLine);
    assert_eq!(SymbolKind::from_raw(0xa0), SymbolKind::Param);
    assert_eq!(SymbolKind::from_raw(0x84), SymbolKind::IncludedFile);
    assert_eq!(SymbolKind::from_raw(0x2e), SymbolKind::Other(0x2e));
    assert_eq!(SymbolKind::Other(0x2e).raw(), 0x2e);
    assert_eq!(SymbolKind::SourceLine.to_string(), "SLINE");
}

#[test]
fn test_unknown_location_defaults()
{
    let location = ResolvedLocation::unknown(Address::new(0xf010_0100));
    assert_eq!(location.file, "<unknown>");
    assert_eq!(location.function_name, "<unknown>");
    assert_eq!(location.line, 0);
    assert_eq!(location.function_addr, Address::new(0xf010_0100));
    assert_eq!(location.to_string(), "<unknown>:0: <unknown>+0");
}

#[test]
fn test_frame_offset_in_function()
{
    let mut location = ResolvedLocation::unknown(Address::new(0xf010_0040));
    location.function_addr = Address::new(0xf010_0040);
    let frame = StackFrame {
        frame_pointer: Address::new(0xf010_ff98),
        return_address: Address::new(0xf010_0068),
        raw_args: [0; 5],
    };
    assert_eq!(frame.offset_in(&location), 0x28);
}
