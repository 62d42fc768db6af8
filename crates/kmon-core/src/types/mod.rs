//! # Types
//!
//! Shared value types used by the walker, the resolver and the monitor.
//!
//! These are plain data: they carry no references into the symbol table or
//! kernel memory, so callers can keep them around after a query.

pub mod address;
pub mod stack;
pub mod symbols;

// Re-export all public types
pub use address::Address;
pub use stack::{BacktraceFrame, StackFrame, FRAME_ARG_COUNT};
pub use symbols::{ResolvedLocation, SymbolEntry, SymbolKind, UNKNOWN_NAME};
