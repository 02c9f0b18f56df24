use anyhow::Result;
use clap::Parser;
use env_logger::Builder;
use log::{error, LevelFilter};
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use talktalk::compiler::compile;
use talktalk::vm::Vm;
use talktalk::InterpretError;

const EXIT_COMPILE_ERROR: u8 = 65;
const EXIT_RUNTIME_ERROR: u8 = 70;

#[derive(Parser, Debug)]
#[command(version, about = "Runs TalkTalk scripts, or a REPL without a file")]
struct Args {
    #[arg(short, long)]
    file: Option<PathBuf>,
    /// Print the compiled bytecode before running
    #[arg(short, long)]
    disassemble: bool,
    /// -v for debug logs, -vv for a trace of every instruction
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> Result<ExitCode> {
    let args = Args::parse();
    init_logger(args.verbose);

    match args.file {
        Some(path) => run_file(&path, args.disassemble),
        None => {
            repl(args.disassemble)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn repl(disassemble: bool) -> Result<()> {
    let mut stdout = std::io::stdout();
    let mut vm = Vm::new(&mut stdout);
    prompt()?;
    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        let line = line?;
        if line.is_empty() {
            break;
        }
        if disassemble {
            print_disassembly(&line);
        }
        match vm.interpret(&line) {
            Ok(_) => {}
            // Runtime diagnostics already went to the output
            Err(InterpretError::Runtime(_)) => {}
            Err(e) => error!("{e}"),
        }
        prompt()?;
    }
    Ok(())
}

fn prompt() -> Result<()> {
    let mut stdout = std::io::stdout();
    write!(stdout, "> ")?;
    stdout.flush()?;
    Ok(())
}

fn run_file(path: &Path, disassemble: bool) -> Result<ExitCode> {
    let contents = std::fs::read_to_string(path)?;
    if disassemble {
        print_disassembly(&contents);
    }
    let mut stdout = std::io::stdout();
    let mut vm = Vm::new(&mut stdout);
    match vm.interpret(&contents) {
        Ok(_) => Ok(ExitCode::SUCCESS),
        Err(InterpretError::Compile(e)) => {
            eprint!("{e}");
            Ok(ExitCode::from(EXIT_COMPILE_ERROR))
        }
        Err(InterpretError::Runtime(_)) => Ok(ExitCode::from(EXIT_RUNTIME_ERROR)),
    }
}

fn print_disassembly(source: &str) {
    // Compile errors are reported by the run that follows
    if let Ok(function) = compile(source) {
        println!("{}", function.chunk.disassemble());
    }
}

fn init_logger(verbosity: u8) {
    let level = match verbosity {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init()
}
