//! # Symbol Resolver
//!
//! Maps a kernel text address to file, line and enclosing function with three
//! nested region searches: source file over the whole table, function within
//! the file, line within the function (or within the file when no function
//! covers the address).
//!
//! ## Usage
//!
//! ```rust
//! use kmon_core::symbols::{ResolverConfig, SymbolResolver, SymbolTableBuilder};
//! use kmon_core::types::Address;
//!
//! let table = SymbolTableBuilder::new()
//!     .source_file("kern/monitor.c", 0xf010_0800)
//!     .function("mon_backtrace:F(0,1)", 0xf010_0800)
//!     .line(62, 0x0)
//!     .line(66, 0x1b)
//!     .build();
//! let resolver = SymbolResolver::new(&table, ResolverConfig::default());
//!
//! let location = resolver.resolve(Address::new(0xf010_0820)).unwrap();
//! assert_eq!(location.file, "kern/monitor.c");
//! assert_eq!(location.line, 66);
//! assert_eq!(location.function_name, "mon_backtrace");
//! assert_eq!(location.function_offset, 0x20);
//! ```

use tracing::debug;

use super::search::{region_search, Region};
use super::table::SymbolTable;
use crate::error::{KmonError, KmonResult};
use crate::types::{Address, ResolvedLocation, SymbolKind};

/// Lowest kernel address: everything below belongs to user environments.
pub const ULIM: Address = Address::new(0xef80_0000);

/// Resolver configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolverConfig
{
    /// First address of the kernel domain. Queries below it are rejected.
    pub domain_start: Address,
}

impl Default for ResolverConfig
{
    fn default() -> Self
    {
        Self { domain_start: ULIM }
    }
}

/// Address-to-source resolver over a read-only [`SymbolTable`].
#[derive(Debug, Clone, Copy)]
pub struct SymbolResolver<'a>
{
    table: &'a SymbolTable,
    config: ResolverConfig,
}

impl<'a> SymbolResolver<'a>
{
    /// Resolver over `table`.
    pub fn new(table: &'a SymbolTable, config: ResolverConfig) -> Self
    {
        Self { table, config }
    }

    /// The table being searched.
    pub fn table(&self) -> &'a SymbolTable
    {
        self.table
    }

    /// Resolver configuration.
    pub fn config(&self) -> ResolverConfig
    {
        self.config
    }

    /// Resolve `address` to its source location.
    ///
    /// ## Errors
    ///
    /// - [`KmonError::OutOfDomain`] if `address` is below the kernel domain.
    /// - [`KmonError::CorruptSymbolTable`] if the string blob is malformed.
    /// - [`KmonError::NotFound`] if no file or line covers `address`.
    pub fn resolve(&self, address: Address) -> KmonResult<ResolvedLocation>
    {
        if address < self.config.domain_start {
            return Err(KmonError::OutOfDomain {
                address,
                domain_start: self.config.domain_start,
            });
        }
        self.table.strings().validate()?;

        let entries = self.table.entries();
        let mut info = ResolvedLocation::unknown(address);

        let files = region_search(entries, Region::whole(entries.len()), SymbolKind::SourceFile, address.value());
        let Some((lfile, rfile)) = files.matched(entries, SymbolKind::SourceFile) else {
            debug!(%address, "no source file covers address");
            return Err(KmonError::NotFound(address));
        };

        let functions = region_search(entries, files, SymbolKind::Function, address.value());
        let function = functions.matched(entries, SymbolKind::Function);
        let (line_bounds, line_address) = match function {
            Some((lfun, _)) => {
                if let Some(name) = self.table.name_of(lfun) {
                    info.function_name = name.into_owned();
                }
                info.function_addr = Address::new(entries[lfun].value);
                (functions, address.value().wrapping_sub(entries[lfun].value))
            }
            None => (files, address.value()),
        };
        if let Some(colon) = info.function_name.find(':') {
            info.function_name.truncate(colon);
        }
        info.function_offset = address.value().wrapping_sub(info.function_addr.value());

        let lines = region_search(entries, line_bounds, SymbolKind::SourceLine, line_address);
        let Some((lline, _)) = lines.matched(entries, SymbolKind::SourceLine) else {
            debug!(%address, function = %info.function_name, "no line record covers address");
            return Err(KmonError::NotFound(address));
        };
        info.line = u32::from(entries[lline].descriptor);

        let file_record = (lfile..=lline).rev().find(|&i| match entries[i].kind {
            SymbolKind::IncludedFile => true,
            SymbolKind::SourceFile => entries[i].value != 0,
            _ => false,
        });
        if let Some(name) = file_record.and_then(|i| self.table.name_of(i)) {
            info.file = name.into_owned();
        }

        if let Some((lfun, rfun)) = function {
            let params = entries[lfun + 1..rfun]
                .iter()
                .take_while(|entry| entry.kind == SymbolKind::Param)
                .count();
            info.param_count = u32::try_from(params).unwrap_or(u32::MAX);
        }

        debug!(
            %address,
            file = %info.file,
            line = info.line,
            function = %info.function_name,
            lfile,
            rfile,
            lline,
            "resolved address"
        );
        Ok(info)
    }
}
