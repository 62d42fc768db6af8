//! # Frame Walker
//!
//! Follows the saved frame-pointer chain of a 32-bit x86 kernel stack and
//! renders a backtrace. Each frame is resolved before it is yielded; the walk
//! ends at the zero frame pointer installed at kernel entry, or at the first
//! return address the resolver cannot place.
//!
//! ```text
//!   higher addresses
//!   | arg 4          |  fp + 24
//!   | ...            |
//!   | arg 0          |  fp + 8
//!   | return address |  fp + 4
//!   | caller's fp    |  fp + 0   <- fp
//!   lower addresses
//! ```
//!
//! ## Example
//!
//! ```rust
//! use kmon_core::memory::StackArena;
//! use kmon_core::symbols::{ResolverConfig, SymbolResolver, SymbolTableBuilder};
//! use kmon_core::types::Address;
//! use kmon_core::unwind::{print_backtrace, WalkerConfig};
//!
//! let table = SymbolTableBuilder::new()
//!     .source_file("kern/init.c", 0xf010_0040)
//!     .function("i386_init:F(0,1)", 0xf010_0040)
//!     .line(24, 0x0)
//!     .build();
//! let resolver = SymbolResolver::new(&table, ResolverConfig::default());
//!
//! let mut stack = StackArena::zeroed(Address::new(0xf010_f000), 0x40);
//! stack.write_u32(Address::new(0xf010_f004), 0xf010_0048).unwrap();
//!
//! let mut out = Vec::new();
//! print_backtrace(&mut out, &stack, resolver, Address::new(0xf010_f000), WalkerConfig::default()).unwrap();
//! assert_eq!(
//!     String::from_utf8(out).unwrap(),
//!     "Stack backtrace:\n\
//!      ebp f010f000  eip f0100048  args 00000000 00000000 00000000 00000000 00000000\n\
//!      \x20    kern/init.c:24: i386_init+8\n"
//! );
//! ```

use std::iter::FusedIterator;

use tracing::{debug, warn};

use crate::error::{KmonError, KmonResult};
use crate::fmt::Sink;
use crate::kprintf;
use crate::memory::MemoryAccess;
use crate::symbols::SymbolResolver;
use crate::types::{Address, BacktraceFrame, StackFrame, FRAME_ARG_COUNT};

/// Frame cap applied by [`WalkerConfig::default`].
pub const DEFAULT_MAX_FRAMES: usize = 64;

/// Walker configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WalkerConfig
{
    /// Stop after this many frames. `None` walks until the chain ends, which
    /// never happens for a cyclic chain.
    pub max_frames: Option<usize>,
}

impl Default for WalkerConfig
{
    fn default() -> Self
    {
        Self {
            max_frames: Some(DEFAULT_MAX_FRAMES),
        }
    }
}

impl WalkerConfig
{
    /// No frame cap.
    pub const fn unbounded() -> Self
    {
        Self { max_frames: None }
    }
}

fn word_at(frame_pointer: Address, index: u32) -> KmonResult<Address>
{
    frame_pointer
        .checked_add(index * 4)
        .ok_or(KmonError::AddressFault(frame_pointer))
}

/// Read the frame stored at `frame_pointer`, without following its link.
///
/// ## Errors
///
/// [`KmonError::AddressFault`] if any of the words is unreadable.
pub fn read_frame<M: MemoryAccess + ?Sized>(memory: &M, frame_pointer: Address) -> KmonResult<StackFrame>
{
    let return_address = Address::new(memory.read_u32(word_at(frame_pointer, 1)?)?);
    let mut raw_args = [0u32; FRAME_ARG_COUNT];
    for (slot, index) in raw_args.iter_mut().zip(2u32..) {
        *slot = memory.read_u32(word_at(frame_pointer, index)?)?;
    }
    Ok(StackFrame {
        frame_pointer,
        return_address,
        raw_args,
    })
}

/// Lazy iterator over resolved frames, innermost first.
///
/// Yields `Err` at most once and then ends. A return address the resolver
/// reports as `NotFound` ends the walk without an error; that frame is not
/// yielded.
#[derive(Debug)]
pub struct FrameWalker<'a, M>
{
    memory: M,
    resolver: SymbolResolver<'a>,
    config: WalkerConfig,
    next_frame: Address,
    previous: Option<Address>,
    yielded: usize,
    done: bool,
}

impl<'a, M: MemoryAccess> FrameWalker<'a, M>
{
    /// Start a walk at `frame_pointer`.
    pub fn new(memory: M, resolver: SymbolResolver<'a>, frame_pointer: Address, config: WalkerConfig) -> Self
    {
        Self {
            memory,
            resolver,
            config,
            next_frame: frame_pointer,
            previous: None,
            yielded: 0,
            done: false,
        }
    }

    fn finish(&mut self, err: KmonError) -> Option<KmonResult<BacktraceFrame>>
    {
        self.done = true;
        Some(Err(err))
    }

    fn step(&mut self) -> Option<KmonResult<BacktraceFrame>>
    {
        // The saved link is read only once the caller asks for the next frame.
        if let Some(previous) = self.previous.take() {
            match self.memory.read_u32(previous) {
                Ok(link) => self.next_frame = Address::new(link),
                Err(err) => return self.finish(err),
            }
        }

        let frame_pointer = self.next_frame;
        if frame_pointer.is_zero() {
            self.done = true;
            return None;
        }
        if self.config.max_frames.is_some_and(|cap| self.yielded >= cap) {
            debug!(frames = self.yielded, %frame_pointer, "frame cap reached");
            self.done = true;
            return None;
        }

        let frame = match read_frame(&self.memory, frame_pointer) {
            Ok(frame) => frame,
            Err(err) => return self.finish(err),
        };
        let location = match self.resolver.resolve(frame.return_address) {
            Ok(location) => location,
            Err(KmonError::NotFound(address)) => {
                debug!(%frame_pointer, %address, "unresolvable return address ends the walk");
                self.done = true;
                return None;
            }
            Err(err) => return self.finish(err),
        };

        self.previous = Some(frame_pointer);
        self.yielded += 1;
        Some(Ok(BacktraceFrame { frame, location }))
    }
}

impl<M: MemoryAccess> Iterator for FrameWalker<'_, M>
{
    type Item = KmonResult<BacktraceFrame>;

    fn next(&mut self) -> Option<Self::Item>
    {
        if self.done {
            return None;
        }
        self.step()
    }
}

impl<M: MemoryAccess> FusedIterator for FrameWalker<'_, M> {}

/// Walk the chain starting at `frame_pointer`.
pub fn walk<'a, M: MemoryAccess>(
    memory: M,
    resolver: SymbolResolver<'a>,
    frame_pointer: Address,
    config: WalkerConfig,
) -> FrameWalker<'a, M>
{
    FrameWalker::new(memory, resolver, frame_pointer, config)
}

/// Render one frame as its two backtrace lines.
///
/// ## Errors
///
/// [`KmonError::Format`] if the arguments do not match the directives.
pub fn print_frame<S: Sink + ?Sized>(sink: &mut S, entry: &BacktraceFrame) -> KmonResult<()>
{
    let BacktraceFrame { frame, location } = entry;
    let [a0, a1, a2, a3, a4] = frame.raw_args;
    kprintf!(
        &mut *sink,
        "ebp %x  eip %x  args %08x %08x %08x %08x %08x\n",
        frame.frame_pointer,
        frame.return_address,
        a0,
        a1,
        a2,
        a3,
        a4
    )?;
    kprintf!(
        &mut *sink,
        "     %s:%d: %.*s+%d\n",
        &location.file,
        location.line,
        location.function_name.len(),
        &location.function_name,
        frame.offset_in(location)
    )?;
    Ok(())
}

/// Print the backtrace of the chain starting at `frame_pointer` to `sink`.
///
/// Frames are printed as they are walked. Returns the number of frames
/// printed.
///
/// ## Errors
///
/// Fatal resolver errors ([`KmonError::CorruptSymbolTable`],
/// [`KmonError::OutOfDomain`]) and formatting errors. An
/// [`KmonError::AddressFault`] only ends the trace early and is logged.
pub fn print_backtrace<S, M>(
    sink: &mut S,
    memory: M,
    resolver: SymbolResolver<'_>,
    frame_pointer: Address,
    config: WalkerConfig,
) -> KmonResult<usize>
where
    S: Sink + ?Sized,
    M: MemoryAccess,
{
    kprintf!(&mut *sink, "Stack backtrace:\n")?;
    let mut printed = 0;
    for entry in walk(memory, resolver, frame_pointer, config) {
        match entry {
            Ok(entry) => {
                print_frame(sink, &entry)?;
                printed += 1;
            }
            Err(KmonError::AddressFault(address)) => {
                warn!(%address, frames = printed, "address fault cut the backtrace short");
                break;
            }
            Err(err) => return Err(err),
        }
    }
    Ok(printed)
}

#[cfg(test)]
mod tests
{
    use super::*;
    use crate::memory::StackArena;
    use crate::symbols::{ResolverConfig, SymbolTable, SymbolTableBuilder};

    const STACK_BASE: u32 = 0xf010_f000;

    fn table() -> SymbolTable
    {
        SymbolTableBuilder::new()
            .source_file("kern/init.c", 0xf010_0040)
            .function("test_backtrace:F(0,1)", 0xf010_0040)
            .param("x:p(0,1)")
            .line(13, 0x0)
            .line(16, 0x20)
            .function("i386_init:F(0,1)", 0xf010_0090)
            .line(24, 0x0)
            .line(39, 0x30)
            .source_file("", 0xf010_0100)
            .build()
    }

    /// Frames at `STACK_BASE + 0x10 * i`, each linked to the next, the last to 0.
    fn stack(return_addresses: &[u32]) -> StackArena
    {
        let mut arena = StackArena::zeroed(Address::new(STACK_BASE), 0x100);
        for (i, &ret) in return_addresses.iter().enumerate() {
            let fp = STACK_BASE + 0x20 * i as u32;
            let link = if i + 1 == return_addresses.len() { 0 } else { fp + 0x20 };
            arena.write_u32(Address::new(fp), link).unwrap();
            arena.write_u32(Address::new(fp + 4), ret).unwrap();
            arena.write_u32(Address::new(fp + 8), i as u32).unwrap();
        }
        arena
    }

    #[test]
    fn test_read_frame_layout()
    {
        let arena = stack(&[0xf010_0060]);
        let frame = read_frame(&arena, Address::new(STACK_BASE)).unwrap();
        assert_eq!(frame.return_address, Address::new(0xf010_0060));
        assert_eq!(frame.raw_args, [0, 0, 0, 0, 0]);
    }

    #[test]
    fn test_read_frame_overflow_faults()
    {
        let arena = stack(&[0xf010_0060]);
        assert!(matches!(
            read_frame(&arena, Address::new(0xffff_fffc)),
            Err(KmonError::AddressFault(_))
        ));
    }

    #[test]
    fn test_walk_stops_at_zero_link()
    {
        let table = table();
        let resolver = SymbolResolver::new(&table, ResolverConfig::default());
        let arena = stack(&[0xf010_0062, 0xf010_00c0]);

        let frames = walk(&arena, resolver, Address::new(STACK_BASE), WalkerConfig::default())
            .collect::<KmonResult<Vec<_>>>()
            .unwrap();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].location.function_name, "test_backtrace");
        assert_eq!(frames[0].location.line, 16);
        assert_eq!(frames[1].location.function_name, "i386_init");
        assert_eq!(frames[1].frame.raw_args[0], 1);
    }

    #[test]
    fn test_frame_cap()
    {
        let table = table();
        let resolver = SymbolResolver::new(&table, ResolverConfig::default());
        let mut arena = stack(&[0xf010_0062]);
        // A frame that links to itself.
        arena.write_u32(Address::new(STACK_BASE), STACK_BASE).unwrap();

        let config = WalkerConfig { max_frames: Some(3) };
        assert_eq!(walk(&arena, resolver, Address::new(STACK_BASE), config).count(), 3);
    }

    #[test]
    fn test_fault_is_yielded_once()
    {
        let table = table();
        let resolver = SymbolResolver::new(&table, ResolverConfig::default());
        let mut arena = stack(&[0xf010_0062]);
        arena.write_u32(Address::new(STACK_BASE), 0x1000).unwrap();

        let mut walker = walk(&arena, resolver, Address::new(STACK_BASE), WalkerConfig::default());
        assert!(walker.next().unwrap().is_ok());
        assert!(matches!(walker.next(), Some(Err(KmonError::AddressFault(_)))));
        assert!(walker.next().is_none());
    }

    #[test]
    fn test_print_frame_lines()
    {
        let table = table();
        let resolver = SymbolResolver::new(&table, ResolverConfig::default());
        let arena = stack(&[0xf010_0062]);
        let entry = walk(&arena, resolver, Address::new(STACK_BASE), WalkerConfig::default())
            .next()
            .unwrap()
            .unwrap();

        let mut out = Vec::new();
        print_frame(&mut out, &entry).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "ebp f010f000  eip f0100062  args 00000000 00000000 00000000 00000000 00000000\n     kern/init.c:16: test_backtrace+34\n"
        );
    }
}
