//! Example: resolve and print a backtrace without a real kernel
//!
//! Builds a small symbol table and a stack arena that mimic a recursive
//! `test_backtrace` call chain, then prints the backtrace to stdout.
//!
//! Run with `RUST_LOG=kmon_core=debug` to see every resolution, or
//! `RUST_LOG=kmon_core::symbols::search=trace` for each search probe.

use std::io;

use kmon_core::fmt::WriteSink;
use kmon_core::memory::StackArena;
use kmon_core::symbols::{ResolverConfig, SymbolResolver, SymbolTableBuilder};
use kmon_core::types::Address;
use kmon_core::unwind::{print_backtrace, WalkerConfig};
use kmon_utils::{info, init_logging, LogConfig};

const STACK_BASE: u32 = 0xf010_fe00;

fn main() -> Result<(), Box<dyn std::error::Error>>
{
    let _guard = init_logging(&LogConfig::from_env())?;

    let table = SymbolTableBuilder::new()
        .header("obj/kern/kernel")
        .source_file("kern/init.c", 0xf010_0040)
        .function("test_backtrace:F(0,1)", 0xf010_0040)
        .param("x:p(0,1)")
        .line(13, 0x0)
        .line(16, 0x1a)
        .line(17, 0x29)
        .function("i386_init:F(0,1)", 0xf010_009c)
        .line(24, 0x0)
        .line(39, 0x48)
        .source_file("", 0xf010_0100)
        .build();
    let resolver = SymbolResolver::new(&table, ResolverConfig::default());

    // test_backtrace(0) <- test_backtrace(1) <- test_backtrace(2) <- i386_init
    let mut stack = StackArena::zeroed(Address::new(STACK_BASE), 0x200);
    let frames: [(u32, u32, u32); 4] = [
        (0xf010_ff18, 0xf010_0069, 0),
        (0xf010_ff38, 0xf010_0069, 1),
        (0xf010_ff58, 0xf010_0069, 2),
        (0xf010_ff78, 0xf010_00e4, 3),
    ];
    for (i, &(fp, ret, arg)) in frames.iter().enumerate() {
        let link = frames.get(i + 1).map_or(0, |next| next.0);
        stack.write_u32(Address::new(fp), link)?;
        stack.write_u32(Address::new(fp + 4), ret)?;
        stack.write_u32(Address::new(fp + 8), arg)?;
    }

    let mut console = WriteSink::new(io::stdout());
    let printed = print_backtrace(
        &mut console,
        &stack,
        resolver,
        Address::new(frames[0].0),
        WalkerConfig::default(),
    )?;
    console.finish()?;

    info!(printed, "backtrace complete");
    Ok(())
}
