//! Memory address type.

use std::fmt;
use std::ops::{Add, Sub};

/// Strongly typed 32-bit kernel address
///
/// This wrapper around `u32` keeps addresses apart from the other `u32`
/// values flowing through a backtrace (raw arguments, line numbers, string
/// offsets).
///
/// The monitored kernel is a 32-bit x86 kernel, so every frame pointer,
/// return address and symbol value fits in 32 bits.
///
/// ## Example
///
/// ```rust
/// use kmon_core::types::Address;
///
/// let addr = Address::from(0xf010_0000);
/// let next_addr = addr + 0x100; // Add offset
/// assert_eq!(next_addr.value(), 0xf010_0100);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Address(u32);

impl Address
{
    /// The null address (0x0)
    ///
    /// A frame pointer equal to `ZERO` terminates the frame chain.
    pub const ZERO: Self = Address(0);

    /// Create a new address from a `u32` value
    ///
    /// ## Example
    ///
    /// ```rust
    /// use kmon_core::types::Address;
    ///
    /// const ULIM: Address = Address::new(0xef80_0000);
    /// assert_eq!(ULIM.value(), 0xef80_0000);
    /// ```
    pub const fn new(value: u32) -> Self
    {
        Address(value)
    }

    /// Get the raw `u32` value of this address
    pub const fn value(self) -> u32
    {
        self.0
    }

    /// Returns `true` for the null address.
    pub const fn is_zero(self) -> bool
    {
        self.0 == 0
    }

    /// Add an offset to this address, checking for overflow
    ///
    /// ## Example
    ///
    /// ```rust
    /// use kmon_core::types::Address;
    ///
    /// let addr = Address::from(0x1000);
    /// assert_eq!(addr.checked_add(0x100), Some(Address::from(0x1100)));
    /// assert_eq!(addr.checked_add(u32::MAX), None); // Overflow
    /// ```
    pub fn checked_add(self, offset: u32) -> Option<Self>
    {
        self.0.checked_add(offset).map(Address)
    }

    /// Subtract an offset from this address, checking for underflow
    ///
    /// ## Example
    ///
    /// ```rust
    /// use kmon_core::types::Address;
    ///
    /// let addr = Address::from(0x1000);
    /// assert_eq!(addr.checked_sub(0x100), Some(Address::from(0xf00)));
    /// assert_eq!(addr.checked_sub(u32::MAX), None); // Underflow
    /// ```
    pub fn checked_sub(self, offset: u32) -> Option<Self>
    {
        self.0.checked_sub(offset).map(Address)
    }

    /// Add an offset to this address, saturating at the maximum value
    pub fn saturating_add(self, offset: u32) -> Self
    {
        Address(self.0.saturating_add(offset))
    }
}

impl From<u32> for Address
{
    fn from(value: u32) -> Self
    {
        Address(value)
    }
}

impl From<Address> for u32
{
    fn from(address: Address) -> Self
    {
        address.0
    }
}

impl fmt::Display for Address
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        write!(f, "0x{:08x}", self.0)
    }
}

impl fmt::LowerHex for Address
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        fmt::LowerHex::fmt(&self.0, f)
    }
}

impl Add<u32> for Address
{
    type Output = Address;

    fn add(self, rhs: u32) -> Self::Output
    {
        Address(self.0.wrapping_add(rhs))
    }
}

impl Sub<u32> for Address
{
    type Output = Address;

    fn sub(self, rhs: u32) -> Self::Output
    {
        Address(self.0.wrapping_sub(rhs))
    }
}
