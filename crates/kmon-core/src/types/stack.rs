//! Stack frame types.

use super::symbols::ResolvedLocation;
use super::Address;

/// Number of argument words captured above each saved return address.
pub const FRAME_ARG_COUNT: usize = 5;

/// One physical frame read from the frame-pointer chain.
///
/// Layout relative to `frame_pointer` (32-bit x86 cdecl):
///
/// ```text
/// fp + 8 + 4*i   argument i (i in 0..5)
/// fp + 4         return address
/// fp + 0         caller's saved frame pointer
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StackFrame
{
    /// Value of the frame pointer for this frame (`%ebp`).
    pub frame_pointer: Address,
    /// Saved return address (`%eip` of the caller).
    pub return_address: Address,
    /// The first five words above the return address.
    ///
    /// These are whatever the caller pushed; the walker has no idea how many
    /// arguments the function really takes.
    pub raw_args: [u32; FRAME_ARG_COUNT],
}

impl StackFrame
{
    /// Distance from the start of the enclosing function to the return address.
    pub fn offset_in(&self, location: &ResolvedLocation) -> u32
    {
        self.return_address.value().wrapping_sub(location.function_addr.value())
    }
}

/// A walked frame together with the source location of its return address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BacktraceFrame
{
    /// Raw frame contents.
    pub frame: StackFrame,
    /// Where `frame.return_address` lives in the source.
    pub location: ResolvedLocation,
}
