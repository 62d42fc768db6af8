//! Typed variadic arguments for the formatter.
//!
//! Directives pull arguments off an [`ArgList`] one at a time, and the length
//! modifier decides how many bits of the argument are looked at, the same way
//! `va_arg(ap, int)` and `va_arg(ap, long long)` would read a C argument
//! list. An `Arg::Long(-1)` read through `%x` therefore prints `ffffffff`, and
//! through `%llx` prints `ffffffffffffffff`.

use super::FormatError;
use crate::types::Address;

/// A single formatter argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arg<'a>
{
    /// `int`
    Int(i32),
    /// `unsigned int`
    Uint(u32),
    /// `long long`
    Long(i64),
    /// `unsigned long long`
    ULong(u64),
    /// A single character for `%c`.
    Char(char),
    /// A string for `%s`; `None` plays the role of a null pointer.
    Str(Option<&'a str>),
    /// A 32-bit pointer for `%p`.
    Ptr(u32),
}

impl Arg<'_>
{
    /// Bit pattern of a numeric argument, sign-extended to 64 bits.
    fn bits(self) -> Option<u64>
    {
        match self {
            Arg::Int(v) => Some(i64::from(v) as u64),
            Arg::Uint(v) | Arg::Ptr(v) => Some(u64::from(v)),
            Arg::Long(v) => Some(v as u64),
            Arg::ULong(v) => Some(v),
            Arg::Char(c) => Some(u64::from(u32::from(c))),
            Arg::Str(_) => None,
        }
    }
}

impl From<i32> for Arg<'_>
{
    fn from(value: i32) -> Self
    {
        Arg::Int(value)
    }
}

impl From<u32> for Arg<'_>
{
    fn from(value: u32) -> Self
    {
        Arg::Uint(value)
    }
}

impl From<i64> for Arg<'_>
{
    fn from(value: i64) -> Self
    {
        Arg::Long(value)
    }
}

impl From<u64> for Arg<'_>
{
    fn from(value: u64) -> Self
    {
        Arg::ULong(value)
    }
}

impl From<usize> for Arg<'_>
{
    fn from(value: usize) -> Self
    {
        Arg::ULong(value as u64)
    }
}

impl From<u16> for Arg<'_>
{
    fn from(value: u16) -> Self
    {
        Arg::Uint(u32::from(value))
    }
}

impl From<char> for Arg<'_>
{
    fn from(value: char) -> Self
    {
        Arg::Char(value)
    }
}

impl From<Address> for Arg<'_>
{
    fn from(value: Address) -> Self
    {
        Arg::Uint(value.value())
    }
}

impl<'a> From<&'a str> for Arg<'a>
{
    fn from(value: &'a str) -> Self
    {
        Arg::Str(Some(value))
    }
}

impl<'a> From<&'a String> for Arg<'a>
{
    fn from(value: &'a String) -> Self
    {
        Arg::Str(Some(value.as_str()))
    }
}

impl<'a> From<Option<&'a str>> for Arg<'a>
{
    fn from(value: Option<&'a str>) -> Self
    {
        Arg::Str(value)
    }
}

/// How many bits a numeric directive consumes, from its `l` count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Length
{
    /// No modifier: 32 bits.
    Int,
    /// `l`: `long` is 32 bits on i386.
    Long,
    /// `ll` (or more `l`s): 64 bits.
    LongLong,
}

impl Length
{
    /// Map the number of `l` characters seen to a length.
    pub const fn from_flag(lflag: u8) -> Self
    {
        match lflag {
            0 => Length::Int,
            1 => Length::Long,
            _ => Length::LongLong,
        }
    }
}

/// Cursor over the argument slice of one `format` call.
#[derive(Debug)]
pub struct ArgList<'a, 'b>
{
    args: &'b [Arg<'a>],
    next: usize,
}

impl<'a, 'b> ArgList<'a, 'b>
{
    /// Start at the first argument.
    pub fn new(args: &'b [Arg<'a>]) -> Self
    {
        Self { args, next: 0 }
    }

    /// Number of arguments consumed so far.
    pub fn consumed(&self) -> usize
    {
        self.next
    }

    fn take(&mut self) -> Result<(usize, Arg<'a>), FormatError>
    {
        let index = self.next;
        let arg = self
            .args
            .get(index)
            .copied()
            .ok_or(FormatError::MissingArgument { index })?;
        self.next += 1;
        Ok((index, arg))
    }

    fn take_bits(&mut self, expected: &'static str) -> Result<u64, FormatError>
    {
        let (index, arg) = self.take()?;
        arg.bits().ok_or(FormatError::ArgumentMismatch { index, expected })
    }

    /// Read the next argument as an `int` (used by `*`, `%c` and `%e`).
    pub fn next_int(&mut self) -> Result<i32, FormatError>
    {
        Ok(self.take_bits("int")? as u32 as i32)
    }

    /// Read a signed integer of the given length.
    pub fn next_signed(&mut self, length: Length) -> Result<i64, FormatError>
    {
        let bits = self.take_bits("signed integer")?;
        Ok(match length {
            Length::Int | Length::Long => i64::from(bits as u32 as i32),
            Length::LongLong => bits as i64,
        })
    }

    /// Read an unsigned integer of the given length.
    pub fn next_unsigned(&mut self, length: Length) -> Result<u64, FormatError>
    {
        let bits = self.take_bits("unsigned integer")?;
        Ok(match length {
            Length::Int | Length::Long => u64::from(bits as u32),
            Length::LongLong => bits,
        })
    }

    /// Read a 32-bit pointer.
    pub fn next_pointer(&mut self) -> Result<u32, FormatError>
    {
        Ok(self.take_bits("pointer")? as u32)
    }

    /// Read a character; integers are truncated to their low byte like C does.
    pub fn next_char(&mut self) -> Result<char, FormatError>
    {
        let (index, arg) = self.take()?;
        match arg {
            Arg::Char(c) => Ok(c),
            Arg::Str(_) => Err(FormatError::ArgumentMismatch {
                index,
                expected: "character",
            }),
            other => Ok(char::from(other.bits().unwrap_or_default() as u8)),
        }
    }

    /// Read a possibly-null string.
    pub fn next_str(&mut self) -> Result<Option<&'a str>, FormatError>
    {
        match self.take()? {
            (_, Arg::Str(s)) => Ok(s),
            (index, _) => Err(FormatError::ArgumentMismatch {
                index,
                expected: "string",
            }),
        }
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn test_int_width_reinterpretation()
    {
        let args = [Arg::Long(-1), Arg::Long(-1), Arg::Int(-2)];
        let mut list = ArgList::new(&args);
        assert_eq!(list.next_unsigned(Length::Int).unwrap(), 0xffff_ffff);
        assert_eq!(list.next_unsigned(Length::LongLong).unwrap(), u64::MAX);
        assert_eq!(list.next_signed(Length::LongLong).unwrap(), -2);
        assert_eq!(list.consumed(), 3);
    }

    #[test]
    fn test_long_modifier_stays_32_bit()
    {
        let args = [Arg::ULong(0x1_0000_0005)];
        let mut list = ArgList::new(&args);
        assert_eq!(list.next_signed(Length::from_flag(1)).unwrap(), 5);
    }

    #[test]
    fn test_missing_argument()
    {
        let mut list = ArgList::new(&[]);
        assert_eq!(list.next_int(), Err(FormatError::MissingArgument { index: 0 }));
    }

    #[test]
    fn test_string_where_number_expected()
    {
        let args = [Arg::Str(Some("x"))];
        let mut list = ArgList::new(&args);
        assert!(matches!(
            list.next_signed(Length::Int),
            Err(FormatError::ArgumentMismatch { index: 0, .. })
        ));
    }

    #[test]
    fn test_char_from_integer_truncates()
    {
        let args = [Arg::Int(0x141)];
        let mut list = ArgList::new(&args);
        assert_eq!(list.next_char().unwrap(), 'A');
    }
}
