//! # Symbol Table
//!
//! The debug symbol table is one flat array of [`SymbolEntry`] records in
//! compilation order plus a blob of NUL-terminated names:
//!
//! ```text
//! SO     kern/init.c      f0100000
//! FUN    i386_init:F(0,1) f0100040
//! PSYM   ...
//! SLINE  line 24          00000000   (offset from i386_init)
//! SLINE  line 26          00000006
//! SOL    inc/x86.h        f0100052   (code from an included header)
//! FUN    ...
//! SO     kern/console.c   f0100200
//! ```
//!
//! The records are only sorted piecewise, per kind and per enclosing region,
//! which is what the region search in [`super::search`] copes with.
//!
//! On disk this is the `.stab` section (12-byte records) and the `.stabstr`
//! section (the string blob).

use std::borrow::Cow;

use crate::error::{KmonError, KmonResult};
use crate::types::{SymbolEntry, SymbolKind};

/// Size of one `.stab` record on disk.
pub const STAB_RECORD_SIZE: usize = 12;

/// Immutable blob of NUL-terminated names.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StringBlob
{
    bytes: Vec<u8>,
}

impl StringBlob
{
    /// Wrap raw `.stabstr` bytes. No validation happens here; see [`StringBlob::validate`].
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self
    {
        Self { bytes: bytes.into() }
    }

    /// Raw bytes of the blob.
    pub fn as_bytes(&self) -> &[u8]
    {
        &self.bytes
    }

    /// Length in bytes.
    pub fn len(&self) -> usize
    {
        self.bytes.len()
    }

    /// Returns `true` for an empty blob.
    pub fn is_empty(&self) -> bool
    {
        self.bytes.is_empty()
    }

    /// Check that the blob is non-empty and ends in a NUL byte.
    ///
    /// ## Errors
    ///
    /// [`KmonError::CorruptSymbolTable`] when the invariant does not hold.
    pub fn validate(&self) -> KmonResult<()>
    {
        match self.bytes.last() {
            Some(0) => Ok(()),
            _ => Err(KmonError::CorruptSymbolTable),
        }
    }

    /// The name starting at `offset`, up to its NUL.
    ///
    /// Returns `None` for an offset past the end of the blob. Invalid UTF-8 is
    /// replaced rather than rejected.
    pub fn name_at(&self, offset: u32) -> Option<Cow<'_, str>>
    {
        let start = usize::try_from(offset).ok()?;
        let tail = self.bytes.get(start..).filter(|tail| !tail.is_empty())?;
        let end = tail.iter().position(|&b| b == 0).unwrap_or(tail.len());
        Some(String::from_utf8_lossy(&tail[..end]))
    }
}

/// Read-only symbol table: records plus their string blob.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SymbolTable
{
    entries: Vec<SymbolEntry>,
    strings: StringBlob,
}

impl SymbolTable
{
    /// Assemble a table from decoded records and a string blob.
    pub fn new(entries: Vec<SymbolEntry>, strings: StringBlob) -> Self
    {
        Self { entries, strings }
    }

    /// Decode raw `.stab` and `.stabstr` section contents.
    ///
    /// Each record is little-endian:
    ///
    /// ```text
    /// 0..4   n_strx   name offset
    /// 4      n_type   record kind
    /// 5      n_other  (unused)
    /// 6..8   n_desc   descriptor (line number for SLINE)
    /// 8..12  n_value  address
    /// ```
    ///
    /// ## Errors
    ///
    /// [`KmonError::InvalidSymbolTable`] if `stab` is not a whole number of
    /// records. The string blob is not checked here; a bad blob is reported by
    /// the resolver on first use.
    pub fn from_stabs(stab: &[u8], stabstr: &[u8]) -> KmonResult<Self>
    {
        if stab.len() % STAB_RECORD_SIZE != 0 {
            return Err(KmonError::InvalidSymbolTable(format!(
                ".stab is {} bytes, not a multiple of {STAB_RECORD_SIZE}",
                stab.len()
            )));
        }

        let entries = stab
            .chunks_exact(STAB_RECORD_SIZE)
            .map(|record| {
                let n_strx = u32::from_le_bytes([record[0], record[1], record[2], record[3]]);
                let n_type = record[4];
                let n_desc = u16::from_le_bytes([record[6], record[7]]);
                let n_value = u32::from_le_bytes([record[8], record[9], record[10], record[11]]);
                SymbolEntry::new(SymbolKind::from_raw(n_type), n_value, n_strx, n_desc)
            })
            .collect::<Vec<_>>();

        tracing::debug!(
            records = entries.len(),
            strings = stabstr.len(),
            "decoded stab sections"
        );
        Ok(Self::new(entries, StringBlob::new(stabstr)))
    }

    /// All records in compilation order.
    pub fn entries(&self) -> &[SymbolEntry]
    {
        &self.entries
    }

    /// The string blob.
    pub fn strings(&self) -> &StringBlob
    {
        &self.strings
    }

    /// Number of records.
    pub fn len(&self) -> usize
    {
        self.entries.len()
    }

    /// Returns `true` when there are no records.
    pub fn is_empty(&self) -> bool
    {
        self.entries.is_empty()
    }

    /// Name of the record at `index`, bounds-checked against the blob.
    pub fn name_of(&self, index: usize) -> Option<Cow<'_, str>>
    {
        let entry = self.entries.get(index)?;
        self.strings.name_at(entry.name_offset)
    }

    /// Encode back into `.stab` / `.stabstr` bytes.
    pub fn to_stabs(&self) -> (Vec<u8>, Vec<u8>)
    {
        let mut stab = Vec::with_capacity(self.entries.len() * STAB_RECORD_SIZE);
        for entry in &self.entries {
            stab.extend_from_slice(&entry.name_offset.to_le_bytes());
            stab.push(entry.kind.raw());
            stab.push(0);
            stab.extend_from_slice(&entry.descriptor.to_le_bytes());
            stab.extend_from_slice(&entry.value.to_le_bytes());
        }
        (stab, self.strings.as_bytes().to_vec())
    }
}

/// Fluent builder for symbol tables.
///
/// Names are appended to the blob as they are added; offset 0 is the empty
/// name, as in a real `.stabstr`.
///
/// ## Example
///
/// ```rust
/// use kmon_core::symbols::SymbolTableBuilder;
///
/// let table = SymbolTableBuilder::new()
///     .source_file("kern/init.c", 0xf010_0000)
///     .function("i386_init:F(0,1)", 0xf010_0040)
///     .line(24, 0x0)
///     .line(26, 0x6)
///     .build();
/// assert_eq!(table.len(), 4);
/// assert_eq!(table.name_of(1).as_deref(), Some("i386_init:F(0,1)"));
/// ```
#[derive(Debug, Clone)]
pub struct SymbolTableBuilder
{
    entries: Vec<SymbolEntry>,
    strings: Vec<u8>,
}

impl Default for SymbolTableBuilder
{
    fn default() -> Self
    {
        Self::new()
    }
}

impl SymbolTableBuilder
{
    /// Start with no records and a blob holding only the empty name.
    pub fn new() -> Self
    {
        Self {
            entries: Vec::new(),
            strings: vec![0],
        }
    }

    fn intern(&mut self, name: &str) -> u32
    {
        if name.is_empty() {
            return 0;
        }
        let offset = u32::try_from(self.strings.len()).unwrap_or(u32::MAX);
        self.strings.extend_from_slice(name.as_bytes());
        self.strings.push(0);
        offset
    }

    /// Append a raw record.
    #[must_use]
    pub fn entry(mut self, kind: SymbolKind, name: &str, value: u32, descriptor: u16) -> Self
    {
        let name_offset = self.intern(name);
        self.entries.push(SymbolEntry::new(kind, value, name_offset, descriptor));
        self
    }

    /// A leading header record, as the compiler emits one per object.
    #[must_use]
    pub fn header(self, name: &str) -> Self
    {
        self.entry(SymbolKind::Other(0), name, 0, 0)
    }

    /// Start of a source file at `address`.
    #[must_use]
    pub fn source_file(self, name: &str, address: u32) -> Self
    {
        self.entry(SymbolKind::SourceFile, name, address, 0)
    }

    /// Switch to an included file.
    #[must_use]
    pub fn included_file(self, name: &str, address: u32) -> Self
    {
        self.entry(SymbolKind::IncludedFile, name, address, 0)
    }

    /// A function starting at `address`.
    #[must_use]
    pub fn function(self, name: &str, address: u32) -> Self
    {
        self.entry(SymbolKind::Function, name, address, 0)
    }

    /// A function parameter.
    #[must_use]
    pub fn param(self, name: &str) -> Self
    {
        self.entry(SymbolKind::Param, name, 0, 0)
    }

    /// A line record. `value` is relative to the enclosing function.
    #[must_use]
    pub fn line(self, line: u16, value: u32) -> Self
    {
        self.entry(SymbolKind::SourceLine, "", value, line)
    }

    /// Finish the table.
    pub fn build(self) -> SymbolTable
    {
        SymbolTable::new(self.entries, StringBlob::new(self.strings))
    }
}
