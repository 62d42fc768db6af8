//! Character console the monitor reads commands from and prints to.

use std::io::{self, BufRead, Read};

use kmon_core::fmt::{Sink, WriteSink};

const BACKSPACE: u8 = 0x08;
const DELETE: u8 = 0x7f;
/// Longest line `readline` keeps; further characters are dropped.
pub const BUFLEN: usize = 1024;

/// One-character-at-a-time console.
pub trait Console
{
    /// Next input byte, `None` at end of input.
    ///
    /// ## Errors
    ///
    /// Any I/O error from the underlying device.
    fn read_char(&mut self) -> io::Result<Option<u8>>;

    /// Write one output byte.
    fn write_char(&mut self, byte: u8);

    /// Push buffered output to the device.
    ///
    /// ## Errors
    ///
    /// Any I/O error from the underlying device.
    fn flush(&mut self) -> io::Result<()>
    {
        Ok(())
    }
}

/// Formatter sink over a console.
pub struct ConsoleSink<'c, C: ?Sized>(pub &'c mut C);

impl<C: Console + ?Sized> Sink for ConsoleSink<'_, C>
{
    fn put(&mut self, byte: u8)
    {
        self.0.write_char(byte);
    }
}

/// Print `prompt`, then read one line. Backspace edits the pending line.
///
/// Returns `None` at end of input with nothing pending.
///
/// ## Errors
///
/// Any I/O error from the console.
pub fn readline<C: Console + ?Sized>(console: &mut C, prompt: &str) -> io::Result<Option<String>>
{
    for &byte in prompt.as_bytes() {
        console.write_char(byte);
    }
    console.flush()?;

    let mut line = Vec::new();
    loop {
        match console.read_char()? {
            None if line.is_empty() => return Ok(None),
            None | Some(b'\n' | b'\r') => break,
            Some(BACKSPACE | DELETE) => {
                line.pop();
            }
            Some(byte) if line.len() < BUFLEN - 1 => line.push(byte),
            Some(_) => {}
        }
    }
    Ok(Some(String::from_utf8_lossy(&line).into_owned()))
}

/// Console over the process's stdin and stdout.
pub struct StdConsole
{
    input: io::StdinLock<'static>,
    output: WriteSink<io::Stdout>,
}

impl StdConsole
{
    /// Lock stdin and wrap stdout.
    pub fn new() -> Self
    {
        Self {
            input: io::stdin().lock(),
            output: WriteSink::new(io::stdout()),
        }
    }
}

impl Default for StdConsole
{
    fn default() -> Self
    {
        Self::new()
    }
}

impl Console for StdConsole
{
    fn read_char(&mut self) -> io::Result<Option<u8>>
    {
        if self.input.fill_buf()?.is_empty() {
            return Ok(None);
        }
        let mut byte = [0u8; 1];
        self.input.read_exact(&mut byte)?;
        Ok(Some(byte[0]))
    }

    fn write_char(&mut self, byte: u8)
    {
        self.output.put(byte);
    }

    fn flush(&mut self) -> io::Result<()>
    {
        self.output.finish()
    }
}

/// Console over in-memory input, collecting output.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct BufferConsole
{
    input: io::Cursor<Vec<u8>>,
    /// Everything written so far.
    pub output: Vec<u8>,
}

#[cfg(test)]
impl BufferConsole
{
    /// Console that will read `input`.
    pub fn new(input: impl Into<Vec<u8>>) -> Self
    {
        Self {
            input: io::Cursor::new(input.into()),
            output: Vec::new(),
        }
    }

    /// Output as text.
    pub fn output_str(&self) -> String
    {
        String::from_utf8_lossy(&self.output).into_owned()
    }
}

#[cfg(test)]
impl Console for BufferConsole
{
    fn read_char(&mut self) -> io::Result<Option<u8>>
    {
        let mut byte = [0u8; 1];
        match self.input.read(&mut byte)? {
            0 => Ok(None),
            _ => Ok(Some(byte[0])),
        }
    }

    fn write_char(&mut self, byte: u8)
    {
        self.output.push(byte);
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn test_readline_prints_prompt()
    {
        let mut console = BufferConsole::new("help\nkerninfo\n");
        assert_eq!(readline(&mut console, "K> ").unwrap().as_deref(), Some("help"));
        assert_eq!(readline(&mut console, "K> ").unwrap().as_deref(), Some("kerninfo"));
        assert_eq!(readline(&mut console, "K> ").unwrap(), None);
        assert_eq!(console.output_str(), "K> K> K> ");
    }

    #[test]
    fn test_readline_backspace()
    {
        let mut console = BufferConsole::new(b"helq\x08p\r".to_vec());
        assert_eq!(readline(&mut console, "").unwrap().as_deref(), Some("help"));
    }

    #[test]
    fn test_readline_last_line_without_newline()
    {
        let mut console = BufferConsole::new("backtrace");
        assert_eq!(readline(&mut console, "").unwrap().as_deref(), Some("backtrace"));
        assert_eq!(readline(&mut console, "").unwrap(), None);
    }

    #[test]
    fn test_readline_caps_length()
    {
        let mut console = BufferConsole::new(vec![b'a'; BUFLEN * 2]);
        assert_eq!(readline(&mut console, "").unwrap().map(|l| l.len()), Some(BUFLEN - 1));
    }
}
