use std::{env, fs, path::Path, process};

use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use linnet::bytecode::disasm::disassemble;
use linnet::lexer::Lexer;
use linnet::parser::Parser;
use linnet::runtime::{Environment, Interpreter};

fn main() {
    let args: Vec<String> = env::args().collect();

    let tokens_only = args.contains(&"--tokens".to_string());
    let bytecode = args.contains(&"--bc".to_string()) || args.contains(&"--bytecode".to_string());
    let repl_mode = args.contains(&"--repl".to_string()) || args.contains(&"-i".to_string());
    let help = args.contains(&"--help".to_string()) || args.contains(&"-h".to_string());

    if help {
        print_usage();
        return;
    }

    // The first non-flag argument is the filename.
    let filename = args.iter().skip(1).find(|a| !a.starts_with('-'));

    match filename {
        Some(filename) if tokens_only => {
            with_source(filename, dump_tokens);
        }
        Some(filename) if bytecode => {
            ensure_extension(filename);
            with_source(filename, dump_bytecode);
        }
        Some(filename) => {
            ensure_extension(filename);
            with_source(filename, run_program);
        }
        None => {
            if repl_mode || args.len() == 1 {
                run_repl();
            } else {
                print_usage();
            }
        }
    }
}

fn print_usage() {
    println!("LINNET - A Prototype-Based, Message-Passing Language");
    println!();
    println!("Usage:");
    println!("  linnet                    Start the interactive REPL");
    println!("  linnet <file.ln>          Run a program");
    println!("  linnet --repl, -i         Start the interactive REPL");
    println!("  linnet --tokens <file>    Show tokens only");
    println!("  linnet --bc <file.ln>     Show compiled bytecode");
    println!("  linnet --help, -h         Show this help");
}

fn ensure_extension(filename: &str) {
    let path = Path::new(filename);
    if path.extension().and_then(|e| e.to_str()) != Some("ln") {
        eprintln!("Error: expected a .ln file, got {}", filename);
        process::exit(1);
    }
}

fn with_source(filename: &str, run: fn(&str)) {
    match fs::read_to_string(filename) {
        Ok(source) => run(&source),
        Err(e) => {
            eprintln!("Failed to read '{}': {}", filename, e);
            process::exit(1);
        }
    }
}

fn dump_tokens(source: &str) {
    match Lexer::new(source).tokenize() {
        Ok(tokens) => {
            for spanned in tokens {
                println!(
                    "{:>4}:{:<3} {:?}",
                    spanned.span.line, spanned.span.col, spanned.token
                );
            }
        }
        Err(e) => {
            eprintln!("Lexer error: {}", e);
            process::exit(1);
        }
    }
}

fn dump_bytecode(source: &str) {
    let mut env = Environment::new();
    let expr = match parse_source(source) {
        Some(expr) => expr,
        None => process::exit(1),
    };
    let code = env.compile(&expr);
    print!("{}", disassemble(&code, env.strings(), env.blocks()));
}

fn run_program(source: &str) {
    let mut env = Environment::new();
    let expr = match parse_source(source) {
        Some(expr) => expr,
        None => process::exit(1),
    };

    let code = env.compile(&expr);
    Interpreter::new(&mut env).execute(code);
}

fn parse_source(source: &str) -> Option<linnet::ast::Expr> {
    let tokens = match Lexer::new(source).tokenize() {
        Ok(tokens) => tokens,
        Err(e) => {
            eprintln!("Lexer error: {}", e);
            return None;
        }
    };

    let mut parser = Parser::new(tokens);
    match parser.parse() {
        Some(expr) => Some(expr),
        None => {
            for error in parser.errors() {
                eprintln!("Parse error: {}", error);
            }
            None
        }
    }
}

fn run_repl() {
    println!("LINNET - A Prototype-Based, Message-Passing Language");
    println!("Type expressions to evaluate them, or Ctrl+D to exit.");
    println!();

    let mut rl = match DefaultEditor::new() {
        Ok(rl) => rl,
        Err(e) => {
            eprintln!("Could not initialize the REPL: {}", e);
            process::exit(1);
        }
    };

    let mut env = Environment::new();

    loop {
        match rl.readline("linnet> ") {
            Ok(line) => {
                if line.trim().is_empty() {
                    continue;
                }
                let _ = rl.add_history_entry(line.as_str());

                let expr = match parse_source(&line) {
                    Some(expr) => expr,
                    None => continue,
                };

                let code = env.compile(&expr);
                let mut interp = Interpreter::new(&mut env);
                let result = interp.execute(code);
                let stopped = !interp.is_running();

                println!("{}", result.borrow().to_text());

                if stopped {
                    break;
                }
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(e) => {
                eprintln!("Readline error: {}", e);
                break;
            }
        }
    }
}
