//! Symbol table records and source location types.

use std::fmt;

use super::Address;

/// Placeholder used for file and function names that could not be resolved.
pub const UNKNOWN_NAME: &str = "<unknown>";

/// Kind of a symbol table record.
///
/// The discriminants are the STABS `n_type` values emitted by the compiler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SymbolKind
{
    /// Start of a primary source file (`N_SO`).
    SourceFile,
    /// Function definition (`N_FUN`); `value` is the entry address.
    Function,
    /// Line number record (`N_SLINE`); the line lives in `descriptor`.
    SourceLine,
    /// Function parameter (`N_PSYM`).
    Param,
    /// Switch to an included source file (`N_SOL`).
    IncludedFile,
    /// Any other record type, kept verbatim.
    Other(u8),
}

impl SymbolKind
{
    /// Raw `n_type` for `N_FUN`.
    pub const N_FUN: u8 = 0x24;
    /// Raw `n_type` for `N_SLINE`.
    pub const N_SLINE: u8 = 0x44;
    /// Raw `n_type` for `N_SO`.
    pub const N_SO: u8 = 0x64;
    /// Raw `n_type` for `N_SOL`.
    pub const N_SOL: u8 = 0x84;
    /// Raw `n_type` for `N_PSYM`.
    pub const N_PSYM: u8 = 0xa0;

    /// Classify a raw STABS type byte.
    pub const fn from_raw(raw: u8) -> Self
    {
        match raw {
            Self::N_SO => SymbolKind::SourceFile,
            Self::N_FUN => SymbolKind::Function,
            Self::N_SLINE => SymbolKind::SourceLine,
            Self::N_PSYM => SymbolKind::Param,
            Self::N_SOL => SymbolKind::IncludedFile,
            other => SymbolKind::Other(other),
        }
    }

    /// The raw STABS type byte for this kind.
    pub const fn raw(self) -> u8
    {
        match self {
            SymbolKind::SourceFile => Self::N_SO,
            SymbolKind::Function => Self::N_FUN,
            SymbolKind::SourceLine => Self::N_SLINE,
            SymbolKind::Param => Self::N_PSYM,
            SymbolKind::IncludedFile => Self::N_SOL,
            SymbolKind::Other(raw) => raw,
        }
    }
}

impl fmt::Display for SymbolKind
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        let label = match self {
            SymbolKind::SourceFile => "SO",
            SymbolKind::Function => "FUN",
            SymbolKind::SourceLine => "SLINE",
            SymbolKind::Param => "PSYM",
            SymbolKind::IncludedFile => "SOL",
            SymbolKind::Other(raw) => return write!(f, "0x{raw:02x}"),
        };
        write!(f, "{label}")
    }
}

/// One record of the debug symbol table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SymbolEntry
{
    /// Record kind.
    pub kind: SymbolKind,
    /// Address (or address offset for lines inside a function).
    pub value: u32,
    /// Offset of the record's name in the string blob.
    pub name_offset: u32,
    /// Type-specific descriptor; the line number for `SourceLine`.
    pub descriptor: u16,
}

impl SymbolEntry
{
    /// Build an entry.
    pub const fn new(kind: SymbolKind, value: u32, name_offset: u32, descriptor: u16) -> Self
    {
        Self {
            kind,
            value,
            name_offset,
            descriptor,
        }
    }
}

/// Source location of an address, as produced by the resolver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedLocation
{
    /// Source file name.
    pub file: String,
    /// Source line, 0 if unknown.
    pub line: u32,
    /// Function name with any `:` type suffix removed.
    pub function_name: String,
    /// Entry address of the function.
    pub function_addr: Address,
    /// `address - function_addr` for the queried address.
    pub function_offset: u32,
    /// Number of parameter records of the function.
    pub param_count: u32,
}

impl ResolvedLocation
{
    /// The state before any search narrowed the query down.
    pub fn unknown(address: Address) -> Self
    {
        Self {
            file: UNKNOWN_NAME.to_string(),
            line: 0,
            function_name: UNKNOWN_NAME.to_string(),
            function_addr: address,
            function_offset: 0,
            param_count: 0,
        }
    }
}

impl fmt::Display for ResolvedLocation
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        write!(
            f,
            "{}:{}: {}+{}",
            self.file, self.line, self.function_name, self.function_offset
        )
    }
}
