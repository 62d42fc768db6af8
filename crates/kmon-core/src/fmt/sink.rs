//! Character sinks the formatter writes through.
//!
//! A sink only has to accept one byte at a time, in order. Output is never
//! batched or reordered by the formatter, so a sink that writes straight to a
//! device shows partial output even if rendering later fails.

use std::io;

use super::FormatError;

/// Single-character output capability.
pub trait Sink
{
    /// Write one byte.
    fn put(&mut self, byte: u8);

    /// Write a character as its UTF-8 bytes.
    fn put_char(&mut self, ch: char)
    {
        let mut buf = [0u8; 4];
        for &byte in ch.encode_utf8(&mut buf).as_bytes() {
            self.put(byte);
        }
    }
}

impl<S: Sink + ?Sized> Sink for &mut S
{
    fn put(&mut self, byte: u8)
    {
        (**self).put(byte);
    }
}

impl Sink for Vec<u8>
{
    fn put(&mut self, byte: u8)
    {
        self.push(byte);
    }
}

/// Counts every byte that passes through to the inner sink.
#[derive(Debug)]
pub(crate) struct Counting<'s, S: ?Sized>
{
    inner: &'s mut S,
    count: usize,
}

impl<'s, S: Sink + ?Sized> Counting<'s, S>
{
    pub(crate) fn new(inner: &'s mut S) -> Self
    {
        Self { inner, count: 0 }
    }

    pub(crate) fn count(&self) -> usize
    {
        self.count
    }
}

impl<S: Sink + ?Sized> Sink for Counting<'_, S>
{
    fn put(&mut self, byte: u8)
    {
        self.count += 1;
        self.inner.put(byte);
    }
}

/// Bounded sink over a fixed buffer.
///
/// Bytes beyond `buf.len() - 1` are counted but dropped; the last slot is
/// reserved for the terminating NUL written by [`BufferSink::terminate`].
#[derive(Debug)]
pub struct BufferSink<'a>
{
    buf: &'a mut [u8],
    len: usize,
    count: usize,
}

impl<'a> BufferSink<'a>
{
    /// Wrap a buffer. An empty buffer has no room for the NUL and is rejected.
    ///
    /// ## Errors
    ///
    /// Returns [`FormatError::EmptyBuffer`] if `buf` is empty.
    pub fn new(buf: &'a mut [u8]) -> Result<Self, FormatError>
    {
        if buf.is_empty() {
            return Err(FormatError::EmptyBuffer);
        }
        Ok(Self { buf, len: 0, count: 0 })
    }

    /// Bytes stored so far (without the NUL).
    pub fn as_bytes(&self) -> &[u8]
    {
        &self.buf[..self.len]
    }

    /// Number of bytes offered to the sink, including truncated ones.
    pub fn count(&self) -> usize
    {
        self.count
    }

    /// Remaining room before truncation starts.
    pub fn remaining(&self) -> usize
    {
        self.buf.len() - 1 - self.len
    }

    /// Write the terminating NUL after the stored bytes.
    pub fn terminate(&mut self)
    {
        self.buf[self.len] = 0;
    }
}

impl Sink for BufferSink<'_>
{
    fn put(&mut self, byte: u8)
    {
        self.count += 1;
        if self.len < self.buf.len() - 1 {
            self.buf[self.len] = byte;
            self.len += 1;
        }
    }
}

/// Sink over any `io::Write`, e.g. the host console.
///
/// The first write error is remembered and later bytes are discarded, so a
/// closed pipe does not turn into a cascade of failures mid-message.
#[derive(Debug)]
pub struct WriteSink<W>
{
    writer: W,
    error: Option<io::Error>,
}

impl<W: io::Write> WriteSink<W>
{
    /// Wrap a writer.
    pub fn new(writer: W) -> Self
    {
        Self { writer, error: None }
    }

    /// Flush and report the first error seen, if any.
    ///
    /// ## Errors
    ///
    /// Returns the first I/O error hit while writing, or the flush error.
    pub fn finish(&mut self) -> io::Result<()>
    {
        if let Some(err) = self.error.take() {
            return Err(err);
        }
        self.writer.flush()
    }
}

impl<W: io::Write> Sink for WriteSink<W>
{
    fn put(&mut self, byte: u8)
    {
        if self.error.is_some() {
            return;
        }
        if let Err(err) = self.writer.write_all(&[byte]) {
            self.error = Some(err);
        }
    }
}
