//! Runtime module
//!
//! Hosts compiled modules: owns the model client and configuration, and
//! exposes [`Runtime::execute`] as the single entry point for calling into
//! a module. Arguments are re-validated at this boundary even though the
//! compiler already checked call sites inside the module, because host
//! callers are not type-checked.

pub mod bridge;
pub mod client;
pub mod config;
pub mod value;
pub mod vm;

pub use client::{ConnectionError, ModelClient, NullClient, ScriptedClient};
pub use config::RuntimeConfig;
pub use value::Value;
pub use vm::Vm;

use crate::codegen::Module;
use crate::error::{VibeError, VibeResult};
use std::sync::Arc;
use std::time::Duration;

/// An initialized execution environment
pub struct Runtime {
    config: RuntimeConfig,
    client: Arc<dyn ModelClient>,
    active: bool,
}

impl Runtime {
    /// Creates a runtime with a validated configuration and a model client
    pub fn new(config: RuntimeConfig, client: Arc<dyn ModelClient>) -> VibeResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            client,
            active: true,
        })
    }

    /// Creates a runtime with default configuration
    pub fn with_defaults(client: Arc<dyn ModelClient>) -> VibeResult<Self> {
        Self::new(RuntimeConfig::default(), client)
    }

    /// Calls an exported function with host-supplied arguments
    pub fn execute(&self, module: &Module, name: &str, args: &[Value]) -> VibeResult<Value> {
        if !self.active {
            return Err(VibeError::general("runtime has been shut down"));
        }

        let index = module.function_index(name).ok_or_else(|| {
            VibeError::runtime(format!("module exports no function '{}'", name), None)
        })?;
        let function = module
            .function_at(index)
            .ok_or_else(|| VibeError::runtime("corrupt module index", None))?;

        if args.len() != function.params.len() {
            return Err(VibeError::runtime(
                format!(
                    "function '{}' expects {} arguments, got {}",
                    name,
                    function.params.len(),
                    args.len()
                ),
                None,
            ));
        }
        for (arg, (param, expected)) in args.iter().zip(&function.params) {
            let actual = arg.type_of();
            if !expected.accepts(actual) {
                return Err(VibeError::runtime(
                    format!(
                        "argument '{}' of '{}' expects {}, got {}",
                        param, name, expected, actual
                    ),
                    None,
                ));
            }
        }

        let vm = Vm::new(
            module,
            self.client.as_ref(),
            Duration::from_millis(self.config.timeout_ms),
        );
        vm.call(index, args.to_vec())
    }

    /// Releases the runtime; later calls to `execute` fail
    ///
    /// Shutdown is idempotent. Compiled modules stay valid and can be
    /// executed again by a new runtime.
    pub fn shutdown(&mut self) {
        self.active = false;
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen;
    use crate::lexer::Lexer;
    use crate::parser::Parser;
    use crate::semantic::Analyzer;
    use pretty_assertions::assert_eq;

    fn compile(source: &str) -> Module {
        let tokens = Lexer::new(source, None).tokenize();
        let mut ast = Parser::new(tokens).parse().unwrap();
        Analyzer::new().analyze(&mut ast).unwrap();
        codegen::generate(&ast).unwrap()
    }

    #[test]
    fn test_execute_compiled_function() {
        let module = compile("fn double(x: Int) -> Int { return x * 2; }");
        let runtime = Runtime::with_defaults(Arc::new(NullClient)).unwrap();
        let result = runtime
            .execute(&module, "double", &[Value::int(21)])
            .unwrap();
        assert_eq!(result, Value::int(42));
    }

    #[test]
    fn test_boundary_arity_validation() {
        let module = compile("fn double(x: Int) -> Int { return x * 2; }");
        let runtime = Runtime::with_defaults(Arc::new(NullClient)).unwrap();
        let err = runtime.execute(&module, "double", &[]).unwrap_err();
        assert!(matches!(err, VibeError::Runtime { .. }));
        assert!(err.message().contains("expects 1 arguments, got 0"));
    }

    #[test]
    fn test_boundary_type_validation() {
        let module = compile("fn double(x: Int) -> Int { return x * 2; }");
        let runtime = Runtime::with_defaults(Arc::new(NullClient)).unwrap();
        let err = runtime
            .execute(&module, "double", &[Value::string("21")])
            .unwrap_err();
        assert!(err.message().contains("expects Int, got String"));
    }

    #[test]
    fn test_unknown_function() {
        let module = compile("fn f() {}");
        let runtime = Runtime::with_defaults(Arc::new(NullClient)).unwrap();
        let err = runtime.execute(&module, "g", &[]).unwrap_err();
        assert!(err.message().contains("exports no function 'g'"));
    }

    #[test]
    fn test_shutdown_blocks_execution() {
        let module = compile("fn f() {}");
        let mut runtime = Runtime::with_defaults(Arc::new(NullClient)).unwrap();
        assert!(runtime.is_active());
        runtime.shutdown();
        runtime.shutdown(); // idempotent
        assert!(!runtime.is_active());

        let err = runtime.execute(&module, "f", &[]).unwrap_err();
        assert!(matches!(err, VibeError::General { .. }));

        // The module outlives the runtime that ran it.
        let fresh = Runtime::with_defaults(Arc::new(NullClient)).unwrap();
        assert_eq!(fresh.execute(&module, "f", &[]).unwrap(), Value::null());
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let mut config = RuntimeConfig::default();
        config.temperature = -1.0;
        assert!(Runtime::new(config, Arc::new(NullClient)).is_err());
    }

    #[test]
    fn test_model_function_through_scripted_client() {
        let module = compile(
            r#"fn classify(text: String) -> Bool { prompt "Is this positive? {text}"; }"#,
        );
        let client = Arc::new(ScriptedClient::new(["true"]));
        let runtime = Runtime::with_defaults(Arc::clone(&client) as Arc<dyn ModelClient>).unwrap();
        let result = runtime
            .execute(&module, "classify", &[Value::string("what a day")])
            .unwrap();
        assert_eq!(result, Value::bool(true));
        assert_eq!(client.prompts(), vec!["Is this positive? what a day"]);
    }

    #[test]
    fn test_connection_failure_is_distinct_from_coercion_failure() {
        let module = compile(
            r#"fn classify(text: String) -> Bool { prompt "Is this positive? {text}"; }"#,
        );

        // Exhausted client: transport failure.
        let client = Arc::new(ScriptedClient::new(Vec::<String>::new()));
        let runtime = Runtime::with_defaults(client).unwrap();
        let err = runtime
            .execute(&module, "classify", &[Value::string("hm")])
            .unwrap_err();
        assert!(matches!(err, VibeError::ModelConnection { .. }));

        // Unparseable response: runtime failure, and the module stays usable.
        let client = Arc::new(ScriptedClient::new(["maybe", "no"]));
        let runtime = Runtime::with_defaults(client).unwrap();
        let err = runtime
            .execute(&module, "classify", &[Value::string("hm")])
            .unwrap_err();
        assert!(matches!(err, VibeError::Runtime { .. }));
        let result = runtime
            .execute(&module, "classify", &[Value::string("hm")])
            .unwrap();
        assert_eq!(result, Value::bool(false));
    }
}
