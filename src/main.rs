use std::fs::File;
use std::io::BufReader;
use std::io::Read;
use std::io::Write;
use std::path::PathBuf;

use clap::Parser as ClapParser;
use log::info;

use rox::error::LoxError;
use rox::interpreter::Interpreter;
use rox::parser::Parser;
use rox::resolver::Resolver;
use rox::scanner::Scanner;
use rox::stmt::Stmt;

#[derive(ClapParser, Debug)]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to a Lox script.  Omit it to start a REPL.
    script: Option<PathBuf>,
}

/// How one run of the pipeline ended; maps onto the process exit codes
/// (65 for compile errors, 70 for runtime errors).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Ok,
    CompileError,
    RuntimeError,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let args: Cli = match Cli::try_parse() {
        Ok(args) => args,

        Err(_) => {
            eprintln!("Usage: rox [script]");
            std::process::exit(64);
        }
    };

    match args.script {
        Some(path) => run_file(path),

        None => run_prompt(),
    }
}

fn run_file(path: PathBuf) -> anyhow::Result<()> {
    info!("Running script {:?}", path);

    let mut buf: Vec<u8> = Vec::new();
    let mut reader: BufReader<File> = BufReader::new(File::open(path)?);
    reader.read_to_end(&mut buf)?;

    let mut interpreter: Interpreter = Interpreter::new();

    match run(&buf, &mut interpreter) {
        Outcome::Ok => Ok(()),

        Outcome::CompileError => std::process::exit(65),

        Outcome::RuntimeError => std::process::exit(70),
    }
}

fn run_prompt() -> anyhow::Result<()> {
    info!("Starting REPL");

    // One interpreter for the whole session: definitions persist across
    // lines, errors don't.
    let mut interpreter: Interpreter = Interpreter::new();

    let stdin = std::io::stdin();

    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let mut line: String = String::new();

        if stdin.read_line(&mut line)? == 0 {
            break;
        }

        let _ = run(line.as_bytes(), &mut interpreter);
    }

    Ok(())
}

/// One pass of the full pipeline.  Each stage runs only if the previous one
/// produced no errors; diagnostics go to stderr as they surface.
fn run(source: &[u8], interpreter: &mut Interpreter) -> Outcome {
    let scanner: Scanner = Scanner::new(source);
    let (tokens, scan_errors) = scanner.scan_tokens();

    for e in &scan_errors {
        eprintln!("{}", e);
    }

    let parser: Parser = Parser::new(tokens);
    let (statements, parse_errors): (Vec<Stmt>, Vec<LoxError>) = parser.parse();

    for e in &parse_errors {
        eprintln!("{}", e);
    }

    if !scan_errors.is_empty() || !parse_errors.is_empty() {
        return Outcome::CompileError;
    }

    {
        let mut resolver: Resolver = Resolver::new(interpreter);

        if let Err(errors) = resolver.resolve(&statements) {
            for e in &errors {
                eprintln!("{}", e);
            }

            return Outcome::CompileError;
        }
    }

    match interpreter.interpret(&statements) {
        Ok(()) => Outcome::Ok,

        Err(e) => {
            eprintln!("{}", e);

            Outcome::RuntimeError
        }
    }
}
