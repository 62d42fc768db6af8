//! # Kernel Memory Access
//!
//! The frame walker reads the kernel stack one 32-bit word at a time through
//! [`MemoryAccess`]. Reads are trusted (the kernel walks its own stack) but
//! can still fault, which surfaces as [`KmonError::AddressFault`].
//!
//! [`StackArena`] is the host-side implementation: a byte buffer mapped at a
//! base address, typically a dump of the kernel stack.

use crate::error::{KmonError, KmonResult};
use crate::types::Address;

const WORD: u32 = 4;

/// Minimal memory accessor required for stack walking.
pub trait MemoryAccess
{
    /// Read the little-endian word at `address`.
    ///
    /// ## Errors
    ///
    /// [`KmonError::AddressFault`] if any of the four bytes is unmapped.
    fn read_u32(&self, address: Address) -> KmonResult<u32>;
}

impl<M: MemoryAccess + ?Sized> MemoryAccess for &M
{
    fn read_u32(&self, address: Address) -> KmonResult<u32>
    {
        (**self).read_u32(address)
    }
}

/// A contiguous range of kernel memory backed by a byte buffer.
///
/// ## Example
///
/// ```rust
/// use kmon_core::memory::{MemoryAccess, StackArena};
/// use kmon_core::types::Address;
///
/// let mut stack = StackArena::zeroed(Address::new(0xf010_f000), 0x100);
/// stack.write_u32(Address::new(0xf010_f010), 0xdead_beef).unwrap();
/// assert_eq!(stack.read_u32(Address::new(0xf010_f010)).unwrap(), 0xdead_beef);
/// assert!(stack.read_u32(Address::new(0xf010_f0fe)).is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackArena
{
    base: Address,
    bytes: Vec<u8>,
}

impl StackArena
{
    /// Map `bytes` at `base`.
    pub fn new(base: Address, bytes: Vec<u8>) -> Self
    {
        Self { base, bytes }
    }

    /// A zero-filled arena of `len` bytes.
    pub fn zeroed(base: Address, len: usize) -> Self
    {
        Self::new(base, vec![0; len])
    }

    /// First mapped address.
    pub fn base(&self) -> Address
    {
        self.base
    }

    /// Number of mapped bytes.
    pub fn len(&self) -> usize
    {
        self.bytes.len()
    }

    /// Returns `true` if nothing is mapped.
    pub fn is_empty(&self) -> bool
    {
        self.bytes.is_empty()
    }

    /// Whether a full word at `address` is mapped.
    pub fn contains_word(&self, address: Address) -> bool
    {
        self.word_range(address).is_some()
    }

    /// Store a little-endian word at `address`.
    ///
    /// ## Errors
    ///
    /// [`KmonError::AddressFault`] if the word does not fit in the arena.
    pub fn write_u32(&mut self, address: Address, value: u32) -> KmonResult<()>
    {
        let range = self.word_range(address).ok_or(KmonError::AddressFault(address))?;
        self.bytes[range].copy_from_slice(&value.to_le_bytes());
        Ok(())
    }

    fn word_range(&self, address: Address) -> Option<std::ops::Range<usize>>
    {
        let offset = address.value().checked_sub(self.base.value())?;
        let start = usize::try_from(offset).ok()?;
        let end = start.checked_add(WORD as usize)?;
        (end <= self.bytes.len()).then_some(start..end)
    }
}

impl MemoryAccess for StackArena
{
    fn read_u32(&self, address: Address) -> KmonResult<u32>
    {
        let range = self.word_range(address).ok_or(KmonError::AddressFault(address))?;
        let mut word = [0u8; 4];
        word.copy_from_slice(&self.bytes[range]);
        Ok(u32::from_le_bytes(word))
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn test_read_below_base_faults()
    {
        let arena = StackArena::zeroed(Address::new(0x1000), 16);
        assert!(matches!(
            arena.read_u32(Address::new(0xffc)),
            Err(KmonError::AddressFault(addr)) if addr == Address::new(0xffc)
        ));
    }

    #[test]
    fn test_read_straddling_end_faults()
    {
        let arena = StackArena::zeroed(Address::new(0x1000), 16);
        assert!(arena.contains_word(Address::new(0x100c)));
        assert!(!arena.contains_word(Address::new(0x100d)));
    }

    #[test]
    fn test_little_endian_layout()
    {
        let arena = StackArena::new(Address::new(0), vec![0x78, 0x56, 0x34, 0x12]);
        assert_eq!(arena.read_u32(Address::ZERO).unwrap(), 0x1234_5678);
    }

    #[test]
    fn test_reference_forwards()
    {
        let arena = StackArena::new(Address::new(0), vec![1, 0, 0, 0]);
        let by_ref: &dyn MemoryAccess = &arena;
        assert_eq!((&by_ref).read_u32(Address::ZERO).unwrap(), 1);
    }
}
