//! Common module for library exports

pub use crate::error::{KmonError, KmonResult};
pub use crate::fmt::{format, render, snprintf, Arg, BufferSink, Sink, WriteSink};
pub use crate::memory::{MemoryAccess, StackArena};
pub use crate::symbols::{KernelImage, ResolverConfig, SpecialSymbols, SymbolResolver, SymbolTable, SymbolTableBuilder};
pub use crate::types::{Address, BacktraceFrame, ResolvedLocation, StackFrame, SymbolEntry, SymbolKind};
pub use crate::unwind::{print_backtrace, walk, WalkerConfig};
