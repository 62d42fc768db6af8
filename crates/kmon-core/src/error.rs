//! # Error Types
//!
//! General error handling for the kernel monitor core.
//!
//! We use `thiserror` to automatically generate `Error` trait implementations
//! and nice error messages.
//!
//! ## Severity
//!
//! Not every error ends a diagnostic session. The variants fall into three
//! groups, see [`KmonError::is_fatal`]:
//!
//! 1. **Recoverable**: `NotFound` degrades to `<unknown>` output and ends the
//!    current backtrace quietly.
//! 2. **Walk-terminating**: `AddressFault` stops the frame walk, frames that
//!    were already printed stay valid.
//! 3. **Fatal**: `CorruptSymbolTable` and `OutOfDomain` abort the session.

use thiserror::Error;

use crate::fmt::FormatError;
use crate::types::Address;

/// Main error type for monitor operations
#[derive(Error, Debug)]
pub enum KmonError
{
    /// A region search found no symbol covering the address
    ///
    /// This is definitive for that address: nothing is retried.
    #[error("No symbol information for address {0}")]
    NotFound(Address),

    /// The string blob of the symbol table is empty or not NUL-terminated
    ///
    /// This means the debug sections were truncated or mislinked at build
    /// time. The resolver refuses to guess names out of such a table.
    #[error("Corrupt symbol table: string table is empty or not NUL-terminated")]
    CorruptSymbolTable,

    /// The address lies outside the kernel's reserved range
    ///
    /// Only kernel text is ever symbolized. Asking for anything else is a
    /// caller bug, so this is fatal.
    #[error("Address {address} is outside the kernel domain (starts at {domain_start})")]
    OutOfDomain
    {
        /// Address that was asked for
        address: Address,
        /// First address of the kernel domain
        domain_start: Address,
    },

    /// A word read from kernel memory failed
    ///
    /// Raised while chasing frame pointers through an unmapped or invalid
    /// address.
    #[error("Address fault reading {0}")]
    AddressFault(Address),

    /// The raw symbol sections could not be decoded
    #[error("Invalid symbol table: {0}")]
    InvalidSymbolTable(String),

    /// Rendering a diagnostic message failed
    #[error("Format error: {0}")]
    Format(#[from] FormatError),

    /// I/O error (for file operations, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl KmonError
{
    /// Whether this error must abort the whole diagnostic session.
    ///
    /// `NotFound` and `AddressFault` only cut the current backtrace short;
    /// everything else is escalated to the fatal handler.
    #[must_use]
    pub const fn is_fatal(&self) -> bool
    {
        !matches!(self, KmonError::NotFound(_) | KmonError::AddressFault(_))
    }
}

/// Convenience type alias for `Result<T, KmonError>`
///
/// ```rust
/// use kmon_core::error::KmonResult;
/// fn foo() -> KmonResult<()>
/// {
///     Ok(())
/// }
/// ```
pub type KmonResult<T> = std::result::Result<T, KmonError>;
