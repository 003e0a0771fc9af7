//! # Vibe Programming Language
//!
//! A small statically typed language whose distinguishing feature is
//! model-backed functions: a function body can be a single prompt template,
//! and calling the function sends the rendered prompt to a language model
//! and coerces the response to the declared return type.
//!
//! ## Architecture
//!
//! The implementation is organized into several modules:
//! - `lexer`: Tokenization of source code
//! - `parser`: Parsing tokens into an Abstract Syntax Tree (AST)
//! - `semantic`: Type resolution and program validation
//! - `codegen`: Lowering the analyzed AST into an immutable bytecode module
//! - `runtime`: The virtual machine, model bridge, and host-facing runtime
//! - `error`: Error handling and diagnostics
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use vibe_lang::runtime::{Runtime, ScriptedClient, Value};
//!
//! let module = vibe_lang::compile(
//!     r#"fn greet(name: String) -> String { prompt "Say hello to {name}"; }"#,
//!     None,
//! )
//! .unwrap();
//!
//! let client = Arc::new(ScriptedClient::new(["Hello, Ada!"]));
//! let runtime = Runtime::with_defaults(client).unwrap();
//! let greeting = runtime
//!     .execute(&module, "greet", &[Value::string("Ada")])
//!     .unwrap();
//! assert_eq!(greeting, Value::string("Hello, Ada!"));
//! ```

pub mod codegen;
pub mod error;
pub mod lexer;
pub mod parser;
pub mod runtime;
pub mod semantic;

// Re-export commonly used types
pub use codegen::Module;
pub use error::{SourceLocation, VibeError, VibeResult};
pub use lexer::{Lexer, Token, TokenType};
pub use parser::{Ast, Parser};
pub use runtime::{ModelClient, Runtime, RuntimeConfig, Value};
pub use semantic::Analyzer;

/// Version of the Vibe language
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Compile Vibe source code into an executable module
///
/// Runs the full pipeline: lexical analysis, parsing, semantic analysis,
/// and code generation. The returned [`Module`] is immutable and can be
/// executed any number of times by any [`Runtime`].
///
/// # Arguments
///
/// * `source` - The source code to compile
/// * `filename` - Optional filename for error reporting
pub fn compile(source: &str, filename: Option<&str>) -> VibeResult<Module> {
    // Phase 1: Lexical Analysis
    let mut lexer = Lexer::new(source, filename);
    let tokens = lexer.tokenize();

    // Phase 2: Parsing
    let mut ast = Parser::new(tokens).parse()?;

    // Phase 3: Semantic Analysis
    let mut analyzer = Analyzer::new();
    analyzer.analyze(&mut ast)?;

    // Phase 4: Code Generation
    codegen::generate(&ast)
}

/// Compile a Vibe source file into an executable module
pub fn compile_file(path: impl AsRef<std::path::Path>) -> VibeResult<Module> {
    let path = path.as_ref();
    let source = std::fs::read_to_string(path)
        .map_err(|e| VibeError::io(format!("cannot read '{}': {}", path.display(), e)))?;
    compile(&source, path.to_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_compile_reports_stage_errors() {
        assert!(matches!(
            compile("fn f( {", None),
            Err(VibeError::Parser { .. })
        ));
        assert!(matches!(
            compile("fn f() { return x; }", None),
            Err(VibeError::Semantic { .. })
        ));
    }

    #[test]
    fn test_compiled_function_end_to_end() {
        use crate::runtime::NullClient;
        use std::sync::Arc;

        let module = compile(r#"fn greet() -> String { return "hi"; }"#, None).unwrap();
        assert_eq!(module.exports(), vec!["greet"]);

        let runtime = Runtime::with_defaults(Arc::new(NullClient)).unwrap();
        let result = runtime.execute(&module, "greet", &[]).unwrap();
        assert_eq!(result, Value::string("hi"));
    }

    #[test]
    fn test_end_to_end_meaning_directed_call() {
        use crate::runtime::ScriptedClient;
        use std::sync::Arc;

        let module = compile(
            concat!(
                "type Temperature = Meaning<Int>(\"temperature in Celsius\");\n",
                "fn forecast(city: String) -> Temperature { prompt \"Temperature in {city} tomorrow\"; }",
            ),
            None,
        )
        .unwrap();

        let client = Arc::new(ScriptedClient::new(["21"]));
        let runtime = Runtime::with_defaults(Arc::clone(&client) as Arc<dyn ModelClient>).unwrap();
        let result = runtime
            .execute(&module, "forecast", &[Value::string("Oslo")])
            .unwrap();
        assert_eq!(result, Value::int(21));

        let prompts = client.prompts();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].starts_with("Temperature in Oslo tomorrow"));
        assert!(prompts[0].contains("temperature in Celsius"));
    }

    #[test]
    fn test_compile_file_missing_is_io_error() {
        assert!(matches!(
            compile_file("/nonexistent/program.vibe"),
            Err(VibeError::Io { .. })
        ));
    }
}
