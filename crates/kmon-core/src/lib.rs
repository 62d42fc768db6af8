//! # kmon-core
//!
//! Introspection core of the kernel monitor: turns a frame-pointer chain and
//! a return address into a readable backtrace.
//!
//! This crate provides:
//! - A `printf`-style diagnostic formatter writing through a byte sink
//! - STABS symbol tables, region search and address resolution
//! - A frame walker over kernel stack memory
//!
//! ## Layering
//!
//! The formatter depends on nothing else in the crate. The resolver reads an
//! immutable [`symbols::SymbolTable`]. The walker uses both: it resolves
//! every return address before yielding the frame and prints through the
//! formatter as it goes, so a fault mid-walk still leaves the earlier frames
//! on the console.
//!
//! Everything is synchronous and single-threaded. Tables are loaded once and
//! never mutated.

pub mod error;
pub mod fmt;
pub mod memory;
pub mod prelude;
pub mod symbols;
pub mod types;
pub mod unwind;

// Re-export commonly used types
pub use error::{KmonError, KmonResult};
pub use memory::{MemoryAccess, StackArena};
pub use symbols::{KernelImage, SymbolResolver, SymbolTable};
pub use types::{Address, BacktraceFrame, ResolvedLocation, StackFrame};
pub use unwind::{print_backtrace, walk, FrameWalker, WalkerConfig};
