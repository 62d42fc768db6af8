//! Kernel image parsing: symbol sections and linker-provided symbols.

use std::borrow::Cow;
use std::fs;
use std::path::{Path, PathBuf};

use object::{Object, ObjectSection, ObjectSymbol};
use tracing::{debug, warn};

use super::table::SymbolTable;
use crate::error::{KmonError, KmonResult};
use crate::types::Address;

/// Virtual address the kernel is linked at; physical = virtual - `KERNBASE`.
pub const KERNBASE: Address = Address::new(0xf000_0000);

const STAB_SECTIONS: &[&str] = &[".stab", "__stab"];
const STABSTR_SECTIONS: &[&str] = &[".stabstr", "__stabstr"];

/// Addresses of the linker symbols `kerninfo` reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SpecialSymbols
{
    /// `_start`, the physical entry point.
    pub start: Option<Address>,
    /// `entry`, the virtual entry point.
    pub entry: Option<Address>,
    /// `etext`, end of kernel text.
    pub etext: Option<Address>,
    /// `edata`, end of initialized data.
    pub edata: Option<Address>,
    /// `end`, end of the kernel image.
    pub end: Option<Address>,
}

impl SpecialSymbols
{
    fn record(&mut self, name: &str, address: Address)
    {
        let slot = match name {
            "_start" => &mut self.start,
            "entry" => &mut self.entry,
            "etext" => &mut self.etext,
            "edata" => &mut self.edata,
            "end" => &mut self.end,
            _ => return,
        };
        slot.get_or_insert(address);
    }

    /// Kernel memory footprint in KB, `ceil((end - entry) / 1024)`.
    pub fn footprint_kb(&self) -> Option<u32>
    {
        let span = self.end?.checked_sub(self.entry?.value())?;
        Some(span.value().div_ceil(1024))
    }
}

/// A kernel ELF image with its debug symbol table.
#[derive(Debug, Clone)]
pub struct KernelImage
{
    path: Option<PathBuf>,
    symbols: SymbolTable,
    specials: SpecialSymbols,
}

fn load_section_bytes<'data>(file: &object::File<'data>, names: &[&str]) -> KmonResult<Option<Vec<u8>>>
{
    for name in names {
        if let Some(section) = file.section_by_name(name) {
            let data = section
                .uncompressed_data()
                .map_err(|err| KmonError::InvalidSymbolTable(format!("failed to read {name}: {err}")))?;
            return Ok(Some(match data {
                Cow::Borrowed(bytes) => bytes.to_vec(),
                Cow::Owned(vec) => vec,
            }));
        }
    }

    Ok(None)
}

impl KernelImage
{
    /// Read and parse the kernel image at `path`.
    ///
    /// ## Errors
    ///
    /// [`KmonError::Io`] if the file cannot be read, otherwise as [`KernelImage::parse`].
    pub fn open(path: impl AsRef<Path>) -> KmonResult<Self>
    {
        let path = path.as_ref();
        let bytes = fs::read(path)?;
        let mut image = Self::parse(&bytes)
            .map_err(|err| match err {
                KmonError::InvalidSymbolTable(msg) => KmonError::InvalidSymbolTable(format!("{}: {msg}", path.display())),
                other => other,
            })?;
        image.path = Some(path.to_path_buf());
        Ok(image)
    }

    /// Parse an in-memory kernel image.
    ///
    /// Missing sections decode as empty. An empty `.stabstr` is not an error
    /// here; the resolver rejects it as corrupt on the first query.
    ///
    /// ## Errors
    ///
    /// [`KmonError::InvalidSymbolTable`] if the bytes are not an object file or
    /// the `.stab` section is malformed.
    pub fn parse(data: &[u8]) -> KmonResult<Self>
    {
        let file = object::File::parse(data)
            .map_err(|err| KmonError::InvalidSymbolTable(format!("failed to parse image: {err}")))?;

        let stab = load_section_bytes(&file, STAB_SECTIONS)?;
        let stabstr = load_section_bytes(&file, STABSTR_SECTIONS)?;
        if stab.is_none() {
            warn!("image has no .stab section; addresses will not resolve");
        }
        let symbols = SymbolTable::from_stabs(
            stab.as_deref().unwrap_or_default(),
            stabstr.as_deref().unwrap_or_default(),
        )?;

        let mut specials = SpecialSymbols::default();
        for symbol in file.symbols() {
            let Ok(name) = symbol.name() else {
                continue;
            };
            if let Ok(address) = u32::try_from(symbol.address()) {
                specials.record(name, Address::new(address));
            }
        }

        debug!(
            architecture = ?file.architecture(),
            records = symbols.len(),
            ?specials,
            "parsed kernel image"
        );
        Ok(Self {
            path: None,
            symbols,
            specials,
        })
    }

    /// Build an image from an already decoded table, without linker symbols.
    pub fn from_table(symbols: SymbolTable) -> Self
    {
        Self {
            path: None,
            symbols,
            specials: SpecialSymbols::default(),
        }
    }

    /// Same image with the given linker symbols.
    #[must_use]
    pub fn with_specials(mut self, specials: SpecialSymbols) -> Self
    {
        self.specials = specials;
        self
    }

    /// Path the image was read from, if any.
    pub fn path(&self) -> Option<&Path>
    {
        self.path.as_deref()
    }

    /// The debug symbol table.
    pub fn symbols(&self) -> &SymbolTable
    {
        &self.symbols
    }

    /// Linker symbol addresses.
    pub fn specials(&self) -> &SpecialSymbols
    {
        &self.specials
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn test_footprint_rounds_up()
    {
        let specials = SpecialSymbols {
            entry: Some(Address::new(0xf010_000c)),
            end: Some(Address::new(0xf011_3970)),
            ..SpecialSymbols::default()
        };
        assert_eq!(specials.footprint_kb(), Some(79));
    }

    #[test]
    fn test_footprint_needs_both_ends()
    {
        assert_eq!(SpecialSymbols::default().footprint_kb(), None);
        let inverted = SpecialSymbols {
            entry: Some(Address::new(0x2000)),
            end: Some(Address::new(0x1000)),
            ..SpecialSymbols::default()
        };
        assert_eq!(inverted.footprint_kb(), None);
    }

    #[test]
    fn test_record_keeps_first_definition()
    {
        let mut specials = SpecialSymbols::default();
        specials.record("etext", Address::new(0xf010_1a00));
        specials.record("etext", Address::new(0x1));
        specials.record("printf", Address::new(0x2));
        assert_eq!(specials.etext, Some(Address::new(0xf010_1a00)));
        assert_eq!(specials.start, None);
    }

    #[test]
    fn test_parse_rejects_garbage()
    {
        assert!(matches!(
            KernelImage::parse(b"not an elf"),
            Err(KmonError::InvalidSymbolTable(_))
        ));
    }
}
