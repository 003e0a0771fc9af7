//! Vibe Language CLI
//!
//! Command-line compiler and runner for Vibe programs.

use std::env;
use std::fs;
use std::process;
use std::sync::Arc;

use vibe_lang::error::Diagnostic;
use vibe_lang::runtime::{NullClient, Runtime, RuntimeConfig, Value};
use vibe_lang::{Lexer, VERSION};

fn main() {
    let args: Vec<String> = env::args().collect();

    let mut show_tokens = false;
    let mut check_only = false;
    let mut show_help = false;
    let mut config_path: Option<String> = None;
    let mut filename: Option<String> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--tokens" | "-t" => show_tokens = true,
            "--check" | "-c" => check_only = true,
            "--help" | "-h" => show_help = true,
            "--config" => {
                i += 1;
                match args.get(i) {
                    Some(path) => config_path = Some(path.clone()),
                    None => {
                        eprintln!("Error: --config requires a path");
                        print_usage();
                        process::exit(1);
                    }
                }
            }
            arg if arg.starts_with('-') => {
                eprintln!("Unknown flag: {}", arg);
                print_usage();
                process::exit(1);
            }
            arg => filename = Some(arg.to_string()),
        }
        i += 1;
    }

    if show_help {
        print_help();
        return;
    }

    let Some(file) = filename else {
        eprintln!("Error: No input file specified");
        print_usage();
        process::exit(1);
    };

    let result = if show_tokens {
        show_file_tokens(&file)
    } else {
        run_file(&file, check_only, config_path.as_deref())
    };

    if let Err(e) = result {
        eprintln!("{}", e);
        process::exit(1);
    }
}

fn print_usage() {
    eprintln!("Usage: vibec [OPTIONS] <script>");
    eprintln!("       vibec --help");
}

fn print_help() {
    println!("Vibe v{} - a language with model-backed functions", VERSION);
    println!();
    println!("USAGE:");
    println!("    vibec [OPTIONS] <script>");
    println!();
    println!("OPTIONS:");
    println!("    -t, --tokens       Show tokenization output (lexer only)");
    println!("    -c, --check        Compile without running");
    println!("        --config <f>   Load runtime configuration from a JSON file");
    println!("    -h, --help         Show this help message");
    println!();
    println!("EXAMPLES:");
    println!("    vibec script.vibe            Compile and run main()");
    println!("    vibec --check script.vibe    Compile only");
    println!("    vibec --tokens script.vibe   Show tokens from lexer");
}

/// Compile a Vibe script and, unless checking only, run its main function
fn run_file(filename: &str, check_only: bool, config_path: Option<&str>) -> Result<(), String> {
    let source = fs::read_to_string(filename)
        .map_err(|e| format!("Failed to read file '{}': {}", filename, e))?;

    let module = vibe_lang::compile(&source, Some(filename))
        .map_err(|e| Diagnostic::with_source(e, &source).format())?;

    if check_only {
        println!("✓ {} compiled: {} function(s)", filename, module.len());
        for name in module.exports() {
            println!("    {}", name);
        }
        return Ok(());
    }

    let config = match config_path {
        Some(path) => RuntimeConfig::from_file(path).map_err(|e| e.to_string())?,
        None => {
            let mut config = RuntimeConfig::default();
            config.apply_env();
            config
        }
    };

    // Model-backed calls need a real provider wired in by a host program;
    // the CLI runs with a client that rejects them.
    let runtime = Runtime::new(config, Arc::new(NullClient)).map_err(|e| e.to_string())?;
    let result = runtime
        .execute(&module, "main", &[])
        .map_err(|e| Diagnostic::with_source(e, &source).format())?;

    if result != Value::Null {
        println!("{}", result);
    }
    Ok(())
}

/// Show tokens from lexing a file
fn show_file_tokens(filename: &str) -> Result<(), String> {
    let source = fs::read_to_string(filename)
        .map_err(|e| format!("Failed to read file '{}': {}", filename, e))?;

    let mut lexer = Lexer::new(&source, Some(filename));
    let tokens = lexer.tokenize();

    println!("Tokens for '{}':", filename);
    println!("{}", "=".repeat(60));

    for (i, token) in tokens.iter().enumerate() {
        println!(
            "{:4}: {:24} | {:?}",
            i,
            format!("{:?}", token.token_type),
            token.lexeme
        );
    }

    println!("{}", "=".repeat(60));
    println!("Total tokens: {}", tokens.len());

    Ok(())
}
