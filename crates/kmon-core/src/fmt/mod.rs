//! # Diagnostic Formatter
//!
//! `printf`-style formatting over a byte [`Sink`]. Every message the monitor
//! prints, the backtrace included, goes through [`format`].
//!
//! ## Directive grammar
//!
//! ```text
//! %[-|0|#]*[width|*][.[precision|*]][l|ll]conversion
//! ```
//!
//! | conversion | meaning                                              |
//! |------------|------------------------------------------------------|
//! | `d` `i`    | signed decimal                                       |
//! | `u`        | unsigned decimal                                     |
//! | `o`        | unsigned octal                                       |
//! | `x` `X`    | unsigned hex (always lowercase digits)               |
//! | `p`        | `0x` followed by 8 zero-padded hex digits            |
//! | `c`        | single character                                     |
//! | `s`        | string, `(null)` for `None`                          |
//! | `e`        | kernel error code, see [`error_string`]              |
//! | `%`        | literal `%`                                          |
//!
//! A width or precision number first lands in `precision` and is moved into
//! `width` when no width was given yet, which is how `%5d` and `%.5s` end up
//! in different fields from the same digit-parsing code.
//!
//! Unknown conversions print `%` and then the directive text verbatim.
//!
//! ## Example
//!
//! ```rust
//! use kmon_core::fmt::{format, Arg};
//!
//! let mut out = Vec::new();
//! let n = format(&mut out, "%s:%d: %05x", &[Arg::from("init.c"), Arg::from(42), Arg::from(255u32)]).unwrap();
//! assert_eq!(out, b"init.c:42: 000ff");
//! assert_eq!(n, out.len());
//! ```

pub mod args;
pub mod sink;

pub use args::{Arg, ArgList, Length};
pub use sink::{BufferSink, Sink, WriteSink};
use thiserror::Error;

use self::sink::Counting;

const DIGITS: &[u8; 16] = b"0123456789abcdef";

/// Kernel error codes understood by `%e`.
pub const E_UNSPECIFIED: i32 = 1;
/// Environment does not exist or is otherwise unusable.
pub const E_BAD_ENV: i32 = 2;
/// Invalid parameter.
pub const E_INVAL: i32 = 3;
/// Request failed due to memory shortage.
pub const E_NO_MEM: i32 = 4;
/// Attempt to create a new environment beyond the maximum allowed.
pub const E_NO_FREE_ENV: i32 = 5;
/// Memory fault.
pub const E_FAULT: i32 = 6;

const ERROR_STRINGS: [Option<&str>; 7] = [
    None,
    Some("unspecified error"),
    Some("bad environment"),
    Some("invalid parameter"),
    Some("out of memory"),
    Some("out of environments"),
    Some("segmentation fault"),
];

/// Description of a kernel error code, sign ignored.
pub fn error_string(code: i32) -> Option<&'static str>
{
    let index = usize::try_from(code.unsigned_abs()).ok()?;
    ERROR_STRINGS.get(index).copied().flatten()
}

/// Errors raised while rendering a format string.
///
/// Output produced before the error has already reached the sink.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FormatError
{
    /// A directive needed an argument but the list was exhausted.
    #[error("missing argument {index}")]
    MissingArgument
    {
        /// Zero-based index of the argument that was missing
        index: usize,
    },

    /// A directive found an argument of the wrong shape.
    #[error("argument {index} is not a {expected}")]
    ArgumentMismatch
    {
        /// Zero-based index of the offending argument
        index: usize,
        /// What the directive wanted
        expected: &'static str,
    },

    /// A bounded sink was given no room at all.
    #[error("output buffer is empty")]
    EmptyBuffer,
}

/// Padding mode of a directive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Padding
{
    /// Right-justify with spaces.
    #[default]
    Space,
    /// Right-justify with zeros (`0` flag).
    Zero,
    /// Left-justify, pad with trailing spaces (`-` flag).
    LeftJustify,
}

impl Padding
{
    /// Byte used when padding in front of the value.
    pub const fn fill(self) -> u8
    {
        match self {
            Padding::Zero => b'0',
            Padding::Space | Padding::LeftJustify => b' ',
        }
    }
}

/// Per-directive flags, reset at every `%`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatState
{
    /// Padding mode.
    pub padding: Padding,
    /// `#` flag.
    pub alternate: bool,
    /// Field width, -1 when unspecified.
    pub width: i32,
    /// Precision, -1 when unspecified.
    pub precision: i32,
    /// Number of `l` modifiers seen.
    pub length: u8,
}

impl Default for FormatState
{
    fn default() -> Self
    {
        Self {
            padding: Padding::Space,
            alternate: false,
            width: -1,
            precision: -1,
            length: 0,
        }
    }
}

impl FormatState
{
    fn take_number(&mut self, value: i32)
    {
        self.precision = value;
        if self.width < 0 {
            self.width = self.precision;
            self.precision = -1;
        }
    }

    fn left_justified(&self) -> bool
    {
        self.padding == Padding::LeftJustify
    }
}

struct Cursor<'f>
{
    bytes: &'f [u8],
    pos: usize,
}

impl Cursor<'_>
{
    /// Next byte; the end of the string reads as NUL.
    fn bump(&mut self) -> u8
    {
        let ch = self.peek();
        self.pos += 1;
        ch
    }

    fn peek(&self) -> u8
    {
        self.bytes.get(self.pos).copied().unwrap_or(0)
    }

    /// Step back to just after the `%` that opened the current directive.
    fn rewind_to_directive(&mut self)
    {
        self.pos -= 1;
        while self.pos > 0 && self.bytes[self.pos - 1] != b'%' {
            self.pos -= 1;
        }
    }
}

/// Render `fmt` with `args` into `sink`.
///
/// Returns the number of bytes produced.
///
/// ## Errors
///
/// Fails when a directive runs out of arguments or finds one of the wrong
/// type. Everything before the failing directive has already been written.
pub fn format<S: Sink + ?Sized>(sink: &mut S, fmt: &str, args: &[Arg<'_>]) -> Result<usize, FormatError>
{
    let mut out = Counting::new(sink);
    let mut args = ArgList::new(args);
    let mut cursor = Cursor {
        bytes: fmt.as_bytes(),
        pos: 0,
    };

    loop {
        loop {
            match cursor.bump() {
                0 => return Ok(out.count()),
                b'%' => break,
                ch => out.put(ch),
            }
        }

        let mut state = FormatState::default();
        loop {
            match cursor.bump() {
                b'-' => state.padding = Padding::LeftJustify,
                b'0' => state.padding = Padding::Zero,
                first @ b'1'..=b'9' => {
                    let mut value = i32::from(first - b'0');
                    while cursor.peek().is_ascii_digit() {
                        let digit = i32::from(cursor.bump() - b'0');
                        value = value.saturating_mul(10).saturating_add(digit);
                    }
                    state.take_number(value);
                }
                b'*' => state.take_number(args.next_int()?),
                b'.' => {
                    if state.width < 0 {
                        state.width = 0;
                    }
                }
                b'#' => state.alternate = true,
                b'l' => state.length = state.length.saturating_add(1),
                b'c' => {
                    out.put_char(args.next_char()?);
                    break;
                }
                b's' => {
                    print_str(&mut out, args.next_str()?, &state);
                    break;
                }
                b'e' => {
                    let code = args.next_int()?;
                    match error_string(code) {
                        Some(text) => put_bytes(&mut out, text.as_bytes()),
                        None => {
                            put_bytes(&mut out, b"error ");
                            printnum(&mut out, u64::from(code.unsigned_abs()), 10, 0, b' ');
                        }
                    }
                    break;
                }
                b'd' | b'i' => {
                    let value = args.next_signed(Length::from_flag(state.length))?;
                    print_number(&mut out, value.unsigned_abs(), 10, value < 0, &state);
                    break;
                }
                b'u' => {
                    let value = args.next_unsigned(Length::from_flag(state.length))?;
                    print_number(&mut out, value, 10, false, &state);
                    break;
                }
                b'o' => {
                    let value = args.next_unsigned(Length::from_flag(state.length))?;
                    print_number(&mut out, value, 8, false, &state);
                    break;
                }
                b'x' | b'X' => {
                    let value = args.next_unsigned(Length::from_flag(state.length))?;
                    print_number(&mut out, value, 16, false, &state);
                    break;
                }
                b'p' => {
                    let value = args.next_pointer()?;
                    out.put(b'0');
                    out.put(b'x');
                    printnum(&mut out, u64::from(value), 16, 8, b'0');
                    break;
                }
                b'%' => {
                    out.put(b'%');
                    break;
                }
                _ => {
                    out.put(b'%');
                    cursor.rewind_to_directive();
                    break;
                }
            }
        }
    }
}

/// Render into a fixed buffer, always NUL-terminating it.
///
/// Returns the length the full output would have had, which is larger than
/// the buffer when the output was truncated.
///
/// ## Errors
///
/// [`FormatError::EmptyBuffer`] for an empty `buf`, otherwise as [`format`].
/// The buffer is NUL-terminated even when formatting fails part way.
pub fn snprintf(buf: &mut [u8], fmt: &str, args: &[Arg<'_>]) -> Result<usize, FormatError>
{
    let mut sink = BufferSink::new(buf)?;
    let result = format(&mut sink, fmt, args);
    sink.terminate();
    result
}

/// Render into a new `String`.
///
/// ## Errors
///
/// As [`format`].
pub fn render(fmt: &str, args: &[Arg<'_>]) -> Result<String, FormatError>
{
    let mut out = Vec::new();
    format(&mut out, fmt, args)?;
    Ok(String::from_utf8_lossy(&out).into_owned())
}

/// Emit `num` most significant digit first.
///
/// The innermost call (the most significant digit) pads with `width - 1`
/// copies of `pad`, each level of recursion having taken one off `width`.
/// Returns the number of bytes written.
fn printnum<S: Sink + ?Sized>(out: &mut S, num: u64, base: u64, width: i32, pad: u8) -> usize
{
    let mut written = 0;
    if num >= base {
        written += printnum(out, num / base, base, width - 1, pad);
    } else {
        let mut width = width;
        loop {
            width -= 1;
            if width <= 0 {
                break;
            }
            out.put(pad);
            written += 1;
        }
    }
    out.put(DIGITS[(num % base) as usize]);
    written + 1
}

fn digit_count(mut num: u64, base: u64) -> i32
{
    let mut count = 1;
    while num >= base {
        num /= base;
        count += 1;
    }
    count
}

fn put_bytes<S: Sink + ?Sized>(out: &mut S, bytes: &[u8])
{
    for &byte in bytes {
        out.put(byte);
    }
}

/// Characters a number with a precision occupies, sign included.
fn precision_body(magnitude: u64, base: u64, precision: i32, negative: bool) -> i32
{
    digit_count(magnitude, base)
        .max(precision)
        .saturating_add(i32::from(negative))
}

fn pad<S: Sink + ?Sized>(out: &mut S, fill: u8, count: i32)
{
    for _ in 0..count.max(0) {
        out.put(fill);
    }
}

fn print_number<S: Sink + ?Sized>(out: &mut S, magnitude: u64, base: u64, negative: bool, state: &FormatState)
{
    let width = state.width.max(0);

    if state.precision >= 0 {
        let body = precision_body(magnitude, base, state.precision, negative);
        if !state.left_justified() {
            pad(out, b' ', width.saturating_sub(body));
        }
        if negative {
            out.put(b'-');
        }
        printnum(out, magnitude, base, state.precision, b'0');
        if state.left_justified() {
            pad(out, b' ', width.saturating_sub(body));
        }
        return;
    }

    // The sign goes out first; printnum then pads the digits to the full width.
    if negative {
        out.put(b'-');
    }
    match state.padding {
        Padding::LeftJustify => {
            let written = printnum(out, magnitude, base, 0, b' ');
            pad(out, b' ', width.saturating_sub(i32::try_from(written).unwrap_or(i32::MAX)));
        }
        Padding::Zero | Padding::Space => {
            printnum(out, magnitude, base, width, state.padding.fill());
        }
    }
}

fn print_str<S: Sink + ?Sized>(out: &mut S, s: Option<&str>, state: &FormatState)
{
    let bytes = s.unwrap_or("(null)").as_bytes();
    let bytes = match bytes.iter().position(|&b| b == 0) {
        Some(nul) => &bytes[..nul],
        None => bytes,
    };
    let shown = match usize::try_from(state.precision) {
        Ok(cap) => &bytes[..bytes.len().min(cap)],
        Err(_) => bytes,
    };

    let mut width = state.width;
    if width > 0 && !state.left_justified() {
        width = width.saturating_sub(i32::try_from(shown.len()).unwrap_or(i32::MAX));
        pad(out, state.padding.fill(), width);
        width = 0;
    }
    for &ch in shown {
        if state.alternate && !(b' '..=b'~').contains(&ch) {
            out.put(b'?');
        } else {
            out.put(ch);
        }
        width = width.saturating_sub(1);
    }
    pad(out, b' ', width);
}

/// Format into a sink with Rust values as arguments.
///
/// ```rust
/// use kmon_core::kprintf;
///
/// let mut out = Vec::new();
/// kprintf!(&mut out, "%s has %d args\n", "mon_backtrace", 3).unwrap();
/// assert_eq!(out, b"mon_backtrace has 3 args\n");
/// ```
#[macro_export]
macro_rules! kprintf {
    ($sink:expr, $fmt:expr $(, $arg:expr)* $(,)?) => {
        $crate::fmt::format($sink, $fmt, &[$($crate::fmt::Arg::from($arg)),*])
    };
}

#[cfg(test)]
mod tests
{
    use super::*;

    fn fmt(f: &str, args: &[Arg<'_>]) -> String
    {
        render(f, args).unwrap()
    }

    #[test]
    fn test_width_and_justification()
    {
        assert_eq!(fmt("%5d", &[Arg::Int(3)]), "    3");
        assert_eq!(fmt("%-5d", &[Arg::Int(3)]), "3    ");
        assert_eq!(fmt("%05x", &[Arg::Uint(255)]), "000ff");
        assert_eq!(fmt("%08x", &[Arg::Uint(0xf010_0040)]), "f0100040");
        assert_eq!(fmt("%2d", &[Arg::Int(12345)]), "12345");
    }

    #[test]
    fn test_negative_numbers()
    {
        assert_eq!(fmt("%d", &[Arg::Int(-42)]), "-42");
        assert_eq!(fmt("%lld", &[Arg::Long(i64::MIN)]), "-9223372036854775808");
    }

    #[test]
    fn test_sign_precedes_full_width_padding()
    {
        assert_eq!(fmt("[%5d]", &[Arg::Int(-3)]), "[-    3]");
        assert_eq!(fmt("[%05d]", &[Arg::Int(-3)]), "[-00003]");
        assert_eq!(fmt("[%-5d]", &[Arg::Int(-3)]), "[-3    ]");
        assert_eq!(fmt("[%5d]", &[Arg::Int(-12345)]), "[-12345]");
    }

    #[test]
    fn test_int_min_round_trips()
    {
        let text = fmt("%d", &[Arg::Int(i32::MIN)]);
        assert_eq!(text.parse::<i32>().unwrap(), i32::MIN);
    }

    #[test]
    fn test_bases()
    {
        assert_eq!(fmt("%o", &[Arg::Uint(8)]), "10");
        assert_eq!(fmt("%x %X", &[Arg::Uint(0xabc), Arg::Uint(0xabc)]), "abc abc");
        assert_eq!(fmt("%u", &[Arg::Int(-1)]), "4294967295");
        assert_eq!(fmt("%llx", &[Arg::ULong(0x1_0000_0000)]), "100000000");
        assert_eq!(fmt("%lx", &[Arg::ULong(0x1_0000_0000)]), "0");
    }

    #[test]
    fn test_numeric_precision_is_minimum_digits()
    {
        assert_eq!(fmt("%.3d", &[Arg::Int(7)]), "007");
        assert_eq!(fmt("%6.3d|", &[Arg::Int(-7)]), "  -007|");
        assert_eq!(fmt("%-6.3x|", &[Arg::Uint(0xa)]), "00a   |");
    }

    #[test]
    fn test_huge_precision_does_not_overflow()
    {
        assert_eq!(precision_body(1, 10, i32::MAX, true), i32::MAX);
        assert_eq!(precision_body(7, 10, 3, true), 4);

        let text = fmt("%*.*d", &[Arg::Int(4), Arg::Int(1000), Arg::Int(-1)]);
        assert_eq!(text.len(), 1001);
        assert!(text.starts_with("-000"));
        assert!(text.ends_with("01"));
    }

    #[test]
    fn test_pointer()
    {
        assert_eq!(fmt("%p", &[Arg::Ptr(0x1234)]), "0x00001234");
        assert_eq!(fmt("%p", &[Arg::Ptr(0xf011_0000)]), "0xf0110000");
    }

    #[test]
    fn test_strings()
    {
        assert_eq!(fmt("%s", &[Arg::Str(None)]), "(null)");
        assert_eq!(fmt("%.3s", &[Arg::from("hello")]), "hel");
        assert_eq!(fmt("%7s|", &[Arg::from("abc")]), "    abc|");
        assert_eq!(fmt("%-7s|", &[Arg::from("abc")]), "abc    |");
        assert_eq!(fmt("%05s", &[Arg::from("ab")]), "000ab");
        assert_eq!(fmt("%.*s", &[Arg::Int(4), Arg::from("i386_init:F(0,1)")]), "i386");
        assert_eq!(fmt("%#s", &[Arg::from("a\tb\x7f")]), "a?b?");
        assert_eq!(fmt("%s", &[Arg::from("a\tb")]), "a\tb");
    }

    #[test]
    fn test_star_width()
    {
        assert_eq!(fmt("%*d", &[Arg::Int(4), Arg::Int(9)]), "   9");
        assert_eq!(fmt("%*d", &[Arg::Int(-4), Arg::Int(9)]), "9");
    }

    #[test]
    fn test_char()
    {
        assert_eq!(fmt("[%c]", &[Arg::Char('K')]), "[K]");
        assert_eq!(fmt("%c", &[Arg::Int(i32::from(b'>'))]), ">");
    }

    #[test]
    fn test_error_codes()
    {
        assert_eq!(fmt("%e", &[Arg::Int(-E_NO_MEM)]), "out of memory");
        assert_eq!(fmt("%e", &[Arg::Int(E_FAULT)]), "segmentation fault");
        assert_eq!(fmt("%e", &[Arg::Int(-99)]), "error 99");
        assert_eq!(fmt("%e", &[Arg::Int(0)]), "error 0");
        assert_eq!(fmt("%e", &[Arg::Int(i32::MIN)]), "error 2147483648");
    }

    #[test]
    fn test_error_code_output_is_counted()
    {
        let mut out = Vec::new();
        let n = format(&mut out, "[%e] [%e]", &[Arg::Int(-E_INVAL), Arg::Int(42)]).unwrap();
        assert_eq!(out, b"[invalid parameter] [error 42]");
        assert_eq!(n, out.len());

        let mut buf = [0u8; 6];
        let n = snprintf(&mut buf, "%e", &[Arg::Int(-E_NO_MEM)]).unwrap();
        assert_eq!(n, "out of memory".len());
        assert_eq!(&buf, b"out o\0");
    }

    #[test]
    fn test_percent_and_unknown_directives()
    {
        assert_eq!(fmt("100%%", &[]), "100%");
        assert_eq!(fmt("%z", &[]), "%z");
        assert_eq!(fmt("%-5q!", &[]), "%-5q!");
        assert_eq!(fmt("50%", &[]), "50%");
    }

    #[test]
    fn test_nul_terminates_format()
    {
        assert_eq!(fmt("abc\0def", &[]), "abc");
    }

    #[test]
    fn test_count_matches_output()
    {
        let mut out = Vec::new();
        let n = format(&mut out, "ebp %x  eip %x", &[Arg::Uint(0xf010ff78), Arg::Uint(0xf01000a5)]).unwrap();
        assert_eq!(n, out.len());
        assert_eq!(out, b"ebp f010ff78  eip f01000a5");
    }

    #[test]
    fn test_partial_output_survives_missing_argument()
    {
        let mut out = Vec::new();
        let err = format(&mut out, "x=%d y=%d", &[Arg::Int(1)]).unwrap_err();
        assert_eq!(err, FormatError::MissingArgument { index: 1 });
        assert_eq!(out, b"x=1 y=");
    }

    #[test]
    fn test_snprintf_truncates()
    {
        let mut buf = [0xaau8; 8];
        let n = snprintf(&mut buf, "%s-%d", &[Arg::from("kernel"), Arg::Int(42)]).unwrap();
        assert_eq!(n, 9);
        assert_eq!(&buf, b"kernel-\0");
    }

    #[test]
    fn test_kprintf_macro()
    {
        let mut out = Vec::new();
        let n = kprintf!(&mut out, "%s:%d: %.*s+%d", "kern/init.c", 24, 9, "i386_init:F(0,1)", 0x10).unwrap();
        assert_eq!(out, b"kern/init.c:24: i386_init+16");
        assert_eq!(n, out.len());
    }
}
