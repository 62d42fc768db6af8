//! # Kernel Monitor
//!
//! A tiny command interpreter: read a line, split it on whitespace, look the
//! first word up in [`COMMANDS`] and run the handler. All output goes through
//! the kernel formatter.

use kmon_core::fmt::Sink;
use kmon_core::kprintf;
use kmon_core::memory::StackArena;
use kmon_core::symbols::{KernelImage, SymbolResolver, KERNBASE};
use kmon_core::types::Address;
use kmon_core::unwind::{print_backtrace, WalkerConfig};
use kmon_core::KmonResult;
use kmon_utils::debug;

use crate::console::{readline, Console, ConsoleSink};

/// Argument separators.
pub const WHITESPACE: &str = "\t\r\n ";
/// Size of the argument vector; one slot stays reserved, so a line may hold
/// at most `MAXARGS - 1` arguments.
pub const MAXARGS: usize = 16;
/// Prompt printed before each command line.
pub const PROMPT: &str = "K> ";

type Handler = fn(&Monitor<'_>, &[&str], &mut dyn Sink) -> KmonResult<()>;

/// A monitor command.
pub struct Command
{
    /// Word typed to run it.
    pub name: &'static str,
    /// One-line description for `help`.
    pub desc: &'static str,
    func: Handler,
}

/// The command table, in `help` order.
pub const COMMANDS: &[Command] = &[
    Command {
        name: "help",
        desc: "Display this list of commands",
        func: mon_help,
    },
    Command {
        name: "kerninfo",
        desc: "Display information about the kernel",
        func: mon_kerninfo,
    },
    Command {
        name: "backtrace",
        desc: "Display stack backtrace information",
        func: mon_backtrace,
    },
];

/// A stack dump and the frame pointer to start walking from.
#[derive(Debug, Clone)]
pub struct StackDump
{
    /// Stack memory.
    pub memory: StackArena,
    /// Innermost `%ebp`.
    pub frame_pointer: Address,
}

/// Line had more arguments than fit in the argument vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TooManyArgs;

/// Split `line` into arguments.
///
/// ## Errors
///
/// [`TooManyArgs`] when the line holds `MAXARGS` or more arguments.
pub fn tokenize(line: &str) -> Result<Vec<&str>, TooManyArgs>
{
    let mut argv = Vec::new();
    for arg in line.split(|c| WHITESPACE.contains(c)).filter(|arg| !arg.is_empty()) {
        if argv.len() == MAXARGS - 1 {
            return Err(TooManyArgs);
        }
        argv.push(arg);
    }
    Ok(argv)
}

/// Parse `0x`-prefixed hex or plain decimal into an address.
///
/// ## Errors
///
/// A message naming the rejected text.
pub fn parse_address(text: &str) -> Result<Address, String>
{
    let parsed = match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => text.parse::<u32>(),
    };
    parsed
        .map(Address::new)
        .map_err(|err| format!("invalid address '{text}': {err}"))
}

/// Everything the commands can look at.
pub struct Monitor<'a>
{
    image: &'a KernelImage,
    resolver: SymbolResolver<'a>,
    stack: Option<&'a StackDump>,
    walker: WalkerConfig,
}

impl<'a> Monitor<'a>
{
    /// Monitor over a loaded kernel image and an optional stack dump.
    pub fn new(
        image: &'a KernelImage,
        resolver: SymbolResolver<'a>,
        stack: Option<&'a StackDump>,
        walker: WalkerConfig,
    ) -> Self
    {
        Self {
            image,
            resolver,
            stack,
            walker,
        }
    }

    /// Interpret one command line.
    ///
    /// ## Errors
    ///
    /// Fatal errors from the command; usage mistakes are printed, not returned.
    pub fn runcmd(&self, line: &str, out: &mut dyn Sink) -> KmonResult<()>
    {
        let argv = match tokenize(line) {
            Ok(argv) => argv,
            Err(TooManyArgs) => {
                kprintf!(&mut *out, "Too many arguments (max %d)\n", MAXARGS)?;
                return Ok(());
            }
        };
        let Some(&name) = argv.first() else {
            return Ok(());
        };

        match COMMANDS.iter().find(|cmd| cmd.name == name) {
            Some(cmd) => {
                debug!(command = cmd.name, args = argv.len(), "running monitor command");
                (cmd.func)(self, &argv, out)
            }
            None => {
                kprintf!(&mut *out, "Unknown command '%s'\n", name)?;
                Ok(())
            }
        }
    }

    /// Greet, then read and run commands until the console runs dry.
    ///
    /// ## Errors
    ///
    /// Console I/O errors and fatal command errors end the session.
    pub fn run<C: Console + ?Sized>(&self, console: &mut C) -> KmonResult<()>
    {
        {
            let mut out = ConsoleSink(&mut *console);
            kprintf!(&mut out, "Welcome to the kernel monitor!\n")?;
            kprintf!(&mut out, "Type 'help' for a list of commands.\n")?;
        }

        while let Some(line) = readline(console, PROMPT)? {
            self.runcmd(&line, &mut ConsoleSink(&mut *console))?;
        }
        console.flush()?;
        Ok(())
    }
}

fn mon_help(_monitor: &Monitor<'_>, _argv: &[&str], out: &mut dyn Sink) -> KmonResult<()>
{
    for cmd in COMMANDS {
        kprintf!(&mut *out, "%s - %s\n", cmd.name, cmd.desc)?;
    }
    Ok(())
}

fn print_symbol(out: &mut dyn Sink, label: &str, address: Option<Address>) -> KmonResult<()>
{
    match address {
        Some(addr) => kprintf!(
            &mut *out,
            "  %-6s %08x (virt)  %08x (phys)\n",
            label,
            addr,
            addr - KERNBASE.value()
        )?,
        None => kprintf!(&mut *out, "  %-6s (undefined)\n", label)?,
    };
    Ok(())
}

fn mon_kerninfo(monitor: &Monitor<'_>, _argv: &[&str], out: &mut dyn Sink) -> KmonResult<()>
{
    let specials = monitor.image.specials();
    kprintf!(&mut *out, "Special kernel symbols:\n")?;
    match specials.start {
        Some(start) => kprintf!(&mut *out, "  _start                  %08x (phys)\n", start)?,
        None => kprintf!(&mut *out, "  _start                  (undefined)\n")?,
    };
    print_symbol(out, "entry", specials.entry)?;
    print_symbol(out, "etext", specials.etext)?;
    print_symbol(out, "edata", specials.edata)?;
    print_symbol(out, "end", specials.end)?;
    if let Some(kb) = specials.footprint_kb() {
        kprintf!(&mut *out, "Kernel executable memory footprint: %dKB\n", kb)?;
    }
    Ok(())
}

fn mon_backtrace(monitor: &Monitor<'_>, argv: &[&str], out: &mut dyn Sink) -> KmonResult<()>
{
    let Some(stack) = monitor.stack else {
        kprintf!(&mut *out, "No stack dump loaded (start the monitor with --stack)\n")?;
        return Ok(());
    };
    let frame_pointer = match argv.get(1) {
        Some(text) => match parse_address(text) {
            Ok(addr) => addr,
            Err(msg) => {
                kprintf!(&mut *out, "%s\n", &msg)?;
                return Ok(());
            }
        },
        None => stack.frame_pointer,
    };
    print_backtrace(out, &stack.memory, monitor.resolver, frame_pointer, monitor.walker)?;
    Ok(())
}
