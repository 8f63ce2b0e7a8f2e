use std::io::{self, IsTerminal};
use std::path::PathBuf;
use std::process;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use ls8_vm::{load_file, Machine, MachineConfig};

/// Run an LS-8 program.
#[derive(Parser, Debug)]
#[command(name = "ls8", version, about = "LS-8 virtual machine", long_about = None)]
struct Cli {
    /// Program file: one 8-digit binary byte per line, `#` starts a comment
    #[arg(value_name = "PROGRAM")]
    program: PathBuf,

    /// Log a register trace line before every instruction
    #[arg(long, default_value_t = false)]
    trace: bool,

    /// Keep running when execution returns to an earlier jump origin
    #[arg(long, default_value_t = false)]
    allow_revisits: bool,

    /// Abort after this many instructions
    #[arg(long, value_name = "N")]
    max_steps: Option<u64>,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, default_value_t = false)]
    verbose: bool,
}

fn init_logging(cli: &Cli) {
    let default_level = if cli.verbose || cli.trace { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_ansi(io::stderr().is_terminal())
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(&cli);

    // 1. Loading
    let image = match load_file(&cli.program)
        .with_context(|| format!("failed to load {}", cli.program.display()))
    {
        Ok(image) => image,
        Err(e) => {
            eprintln!("Load Error: {:#}", e);
            process::exit(1);
        }
    };

    // 2. Execution
    let config = MachineConfig::default()
        .with_trace(cli.trace)
        .with_revisit_guard(!cli.allow_revisits)
        .with_step_limit(cli.max_steps);
    let mut vm = Machine::with_config(io::stdout().lock(), config);
    vm.load(&image);

    if let Err(e) = run(&mut vm) {
        eprintln!("Runtime Error: {:#}", e);
        eprintln!("{}", vm.trace_line()); // Machine state at the failing instruction
        process::exit(1);
    }
}

fn run<W: io::Write>(vm: &mut Machine<W>) -> Result<()> {
    vm.run()
        .with_context(|| format!("execution stopped at pc {:#04x}", vm.pc()))?;
    vm.output_mut().flush().context("failed to flush output")?;
    Ok(())
}
