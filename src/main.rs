//! zip_prolog CLI: load a program, then answer queries interactively.

use std::fs;
use std::io::{self, IsTerminal};
use std::process::ExitCode;

use zip_prolog::{compile_program, repl, BufferInput, EditorInput, Machine};

fn print_usage() {
    println!("Usage: zip_prolog <program-file>");
    println!();
    println!("Loads the Prolog program and starts a query prompt.");
    println!("End a query with '.'; answer ';' for more solutions.");
    println!("'halt' or end of input leaves the prompt.");
}

fn main() -> ExitCode {
    env_logger::init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        print_usage();
        return ExitCode::SUCCESS;
    }

    let path = &args[1];
    let source = match fs::read_to_string(path) {
        Ok(source) => source,
        Err(e) => {
            eprintln!("Error reading {}: {}", path, e);
            return ExitCode::FAILURE;
        }
    };

    let mut machine = Machine::new();
    if let Err(e) = compile_program(&mut machine, &source) {
        eprintln!("{}", e);
        return ExitCode::FAILURE;
    }

    let stdout = io::stdout();
    let mut out = stdout.lock();
    let result = if io::stdin().is_terminal() {
        match EditorInput::new() {
            Ok(mut input) => repl::run(&mut machine, &mut input, &mut out),
            Err(e) => {
                eprintln!("{}", e);
                return ExitCode::FAILURE;
            }
        }
    } else {
        let stdin = io::stdin();
        let mut input = BufferInput::new(stdin.lock());
        repl::run(&mut machine, &mut input, &mut out)
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e);
            ExitCode::FAILURE
        }
    }
}
