//! # Symbols
//!
//! STABS symbol tables and address resolution.
//!
//! - [`table`]: the record array and its string blob, decoding and building.
//! - [`search`]: region search over interleaved, piecewise-sorted records.
//! - [`resolver`]: address to file, line and function.
//! - [`image`]: loading the tables and linker symbols out of a kernel ELF.

pub mod image;
pub mod resolver;
pub mod search;
pub mod table;

pub use image::{KernelImage, SpecialSymbols, KERNBASE};
pub use resolver::{ResolverConfig, SymbolResolver, ULIM};
pub use search::{region_search, Region};
pub use table::{StringBlob, SymbolTable, SymbolTableBuilder, STAB_RECORD_SIZE};
