mod console;
mod monitor;

use std::path::{Path, PathBuf};
use std::{fs, io, process};

use clap::{Parser, Subcommand};
use kmon_core::fmt::{Sink, WriteSink};
use kmon_core::kprintf;
use kmon_core::memory::StackArena;
use kmon_core::symbols::{KernelImage, ResolverConfig, SymbolResolver};
use kmon_core::types::Address;
use kmon_core::unwind::{print_backtrace, WalkerConfig, DEFAULT_MAX_FRAMES};
use kmon_core::{KmonError, KmonResult};
use kmon_utils::{error, info, init_logging, init_monitor_logging, LogConfig, LogGuard, LogLevel, LoggingError};

use crate::console::StdConsole;
use crate::monitor::{parse_address, Monitor, StackDump};

/// Host-side kernel monitor: symbolize addresses and walk kernel stack dumps.
#[derive(Parser, Debug)]
#[command(name = "kmon")]
#[command(version)]
#[command(about = "Host-side kernel monitor: symbolize addresses and walk kernel stack dumps", long_about = None)]
struct Cli
{
    /// Kernel ELF image carrying .stab/.stabstr sections
    #[arg(long, global = true, env = "KMON_KERNEL", default_value = "obj/kern/kernel")]
    kernel: PathBuf,
    /// Log level (overrides RUST_LOG)
    #[arg(long, global = true)]
    log_level: Option<LogLevel>,
    /// Lowest address the resolver accepts
    #[arg(long, global = true, value_parser = parse_address, default_value = "0xef800000")]
    domain_start: Address,
    /// Stop a backtrace after this many frames (0 for no limit)
    #[arg(long, global = true, default_value_t = DEFAULT_MAX_FRAMES)]
    max_frames: usize,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands
{
    /// Print the source location of a kernel text address
    Resolve
    {
        /// Address (hex with 0x prefix, or decimal)
        #[arg(value_parser = parse_address)]
        address: Address,
    },
    /// Print the backtrace of a raw stack dump
    Backtrace
    {
        /// Raw little-endian stack memory
        #[arg(long)]
        stack: PathBuf,
        /// Address the first byte of the dump was read from
        #[arg(long, value_parser = parse_address)]
        base: Address,
        /// Innermost frame pointer
        #[arg(long, value_parser = parse_address)]
        ebp: Address,
    },
    /// Show the special kernel symbols and the memory footprint
    Kerninfo,
    /// Run the interactive monitor on stdin/stdout
    Monitor
    {
        /// Raw stack dump for the `backtrace` command
        #[arg(long, requires_all = ["base", "ebp"])]
        stack: Option<PathBuf>,
        /// Address the first byte of the dump was read from
        #[arg(long, value_parser = parse_address)]
        base: Option<Address>,
        /// Innermost frame pointer
        #[arg(long, value_parser = parse_address)]
        ebp: Option<Address>,
    },
}

fn main()
{
    let cli = Cli::parse();

    // The monitor owns the terminal, so its logs go to a file only.
    let config = LogConfig::from_env().with_level(cli.log_level);
    let logging: Result<LogGuard, LoggingError> = if matches!(cli.command, Commands::Monitor { .. }) {
        init_monitor_logging(&config).map(|(path, guard)| {
            info!(path = %path.display(), "monitor session logging to file");
            guard
        })
    } else {
        init_logging(&config)
    };
    let _log_guard = match logging {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {e}");
            process::exit(1);
        }
    };

    let image = match KernelImage::open(&cli.kernel) {
        Ok(image) => image,
        Err(e) => {
            eprintln!("Error: cannot load kernel image {}: {e}", cli.kernel.display());
            process::exit(1);
        }
    };
    info!(
        kernel = %cli.kernel.display(),
        records = image.symbols().len(),
        "kernel image loaded"
    );

    let mut out = WriteSink::new(io::stdout());
    let result = run_command(&cli, &image, &mut out);
    if let Err(e) = out.finish() {
        eprintln!("Error: failed to write output: {e}");
        process::exit(1);
    }

    match result {
        Ok(()) => {}
        Err(err) if err.is_fatal() => kernel_panic(&err),
        Err(err) => {
            eprintln!("Error: {err}");
            process::exit(1);
        }
    }
}

fn run_command(cli: &Cli, image: &KernelImage, out: &mut dyn Sink) -> KmonResult<()>
{
    let resolver = SymbolResolver::new(
        image.symbols(),
        ResolverConfig {
            domain_start: cli.domain_start,
        },
    );
    let walker = WalkerConfig {
        max_frames: (cli.max_frames != 0).then_some(cli.max_frames),
    };

    match &cli.command {
        Commands::Resolve { address } => {
            let location = resolver.resolve(*address)?;
            kprintf!(
                &mut *out,
                "%08x: %s:%d: %s+%d (%d args)\n",
                *address,
                &location.file,
                location.line,
                &location.function_name,
                location.function_offset,
                location.param_count
            )?;
            Ok(())
        }
        Commands::Backtrace { stack, base, ebp } => {
            let memory = load_stack(stack, *base)?;
            print_backtrace(out, &memory, resolver, *ebp, walker)?;
            Ok(())
        }
        Commands::Kerninfo => Monitor::new(image, resolver, None, walker).runcmd("kerninfo", out),
        Commands::Monitor { stack, base, ebp } => {
            let dump = match (stack, base, ebp) {
                (Some(path), Some(base), Some(ebp)) => Some(StackDump {
                    memory: load_stack(path, *base)?,
                    frame_pointer: *ebp,
                }),
                _ => None,
            };
            let monitor = Monitor::new(image, resolver, dump.as_ref(), walker);
            monitor.run(&mut StdConsole::new())
        }
    }
}

fn load_stack(path: &Path, base: Address) -> KmonResult<StackArena>
{
    let bytes = fs::read(path)?;
    info!(path = %path.display(), %base, len = bytes.len(), "stack dump loaded");
    Ok(StackArena::new(base, bytes))
}

/// Report a fatal error the way the kernel would, then exit.
fn kernel_panic(err: &KmonError) -> !
{
    error!(%err, "fatal error");
    let mut console = WriteSink::new(io::stdout());
    let message = err.to_string();
    if kprintf!(&mut console, "kernel panic: %s\n", &message).is_err() || console.finish().is_err() {
        eprintln!("kernel panic: {message}");
    }
    process::exit(1);
}
