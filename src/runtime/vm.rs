//! Bytecode virtual machine
//!
//! A stack machine over [`Chunk`] bytecode. Each call gets its own frame
//! with a fixed-size local slot array and a value stack; calls nest through
//! host recursion, bounded by `MAX_CALL_DEPTH` so a runaway program fails
//! with a Runtime error instead of exhausting the host stack.

use crate::codegen::{Chunk, FunctionKind, Module, Op};
use crate::error::{VibeError, VibeResult};
use crate::runtime::bridge;
use crate::runtime::client::ModelClient;
use crate::runtime::value::Value;
use std::time::Duration;

const MAX_CALL_DEPTH: usize = 256;

/// Executes functions from one module against one model client
pub struct Vm<'a> {
    module: &'a Module,
    client: &'a dyn ModelClient,
    timeout: Duration,
}

impl<'a> Vm<'a> {
    pub fn new(module: &'a Module, client: &'a dyn ModelClient, timeout: Duration) -> Self {
        Self {
            module,
            client,
            timeout,
        }
    }

    /// Calls a function by its module index
    pub fn call(&self, function: usize, args: Vec<Value>) -> VibeResult<Value> {
        self.call_at_depth(function, args, 0)
    }

    fn call_at_depth(&self, function: usize, args: Vec<Value>, depth: usize) -> VibeResult<Value> {
        if depth > MAX_CALL_DEPTH {
            return Err(VibeError::runtime("call stack overflow", None));
        }
        let function = self.module.function_at(function).ok_or_else(|| {
            VibeError::runtime(format!("no function at index {}", function), None)
        })?;

        // Compiled call sites always pass the right count; hosts calling in
        // directly may not.
        if args.len() != function.params.len() {
            return Err(VibeError::runtime(
                format!(
                    "function '{}' expects {} arguments, got {}",
                    function.name,
                    function.params.len(),
                    args.len()
                ),
                None,
            ));
        }

        match &function.kind {
            FunctionKind::Model(model) => {
                bridge::invoke_model(self.client, function, model, &args, self.timeout)
            }
            FunctionKind::Compiled(chunk) => self.run(chunk, args, depth),
        }
    }

    fn run(&self, chunk: &Chunk, args: Vec<Value>, depth: usize) -> VibeResult<Value> {
        let mut locals = vec![Value::Null; chunk.local_count];
        for (slot, arg) in args.into_iter().enumerate() {
            locals[slot] = arg;
        }
        let mut stack: Vec<Value> = Vec::new();
        let mut ip = 0;

        while ip < chunk.code.len() {
            let op = chunk.code[ip];
            ip += 1;

            match op {
                Op::Constant(slot) => {
                    let value = chunk.constants.get(slot).ok_or_else(|| {
                        VibeError::runtime(format!("bad constant index {}", slot), None)
                    })?;
                    stack.push(value.clone());
                }

                Op::LoadLocal(slot) => {
                    let value = locals.get(slot).ok_or_else(|| {
                        VibeError::runtime(format!("bad local slot {}", slot), None)
                    })?;
                    stack.push(value.clone());
                }

                Op::StoreLocal(slot) => {
                    let value = peek(&stack)?.clone();
                    let target = locals.get_mut(slot).ok_or_else(|| {
                        VibeError::runtime(format!("bad local slot {}", slot), None)
                    })?;
                    *target = value;
                }

                Op::Pop => {
                    pop(&mut stack)?;
                }

                Op::Add | Op::Subtract | Op::Multiply | Op::Divide | Op::Modulo => {
                    let right = pop(&mut stack)?;
                    let left = pop(&mut stack)?;
                    stack.push(arithmetic(op, left, right)?);
                }

                Op::Negate => {
                    let value = pop(&mut stack)?;
                    stack.push(match value {
                        Value::Int(n) => Value::Int(n.checked_neg().ok_or_else(|| {
                            VibeError::runtime("integer overflow in negation", None)
                        })?),
                        Value::Float(n) => Value::Float(-n),
                        Value::Number(n) => Value::Number(-n),
                        other => {
                            return Err(VibeError::runtime(
                                format!("cannot negate a {} value", other.type_of()),
                                None,
                            ))
                        }
                    });
                }

                Op::Not => {
                    let value = pop(&mut stack)?;
                    match value {
                        Value::Bool(b) => stack.push(Value::Bool(!b)),
                        other => {
                            return Err(VibeError::runtime(
                                format!("'not' applied to a {} value", other.type_of()),
                                None,
                            ))
                        }
                    }
                }

                Op::Equal => {
                    let right = pop(&mut stack)?;
                    let left = pop(&mut stack)?;
                    stack.push(Value::Bool(left == right));
                }

                Op::NotEqual => {
                    let right = pop(&mut stack)?;
                    let left = pop(&mut stack)?;
                    stack.push(Value::Bool(left != right));
                }

                Op::Less | Op::LessEqual | Op::Greater | Op::GreaterEqual => {
                    let right = pop(&mut stack)?;
                    let left = pop(&mut stack)?;
                    let ordering = left.partial_cmp_value(&right).ok_or_else(|| {
                        VibeError::runtime(
                            format!(
                                "cannot order {} against {}",
                                left.type_of(),
                                right.type_of()
                            ),
                            None,
                        )
                    })?;
                    let result = match op {
                        Op::Less => ordering.is_lt(),
                        Op::LessEqual => ordering.is_le(),
                        Op::Greater => ordering.is_gt(),
                        Op::GreaterEqual => ordering.is_ge(),
                        _ => unreachable!(),
                    };
                    stack.push(Value::Bool(result));
                }

                Op::Jump(target) => {
                    ip = target;
                }

                Op::JumpIfFalse(target) => {
                    if !pop(&mut stack)?.is_truthy() {
                        ip = target;
                    }
                }

                Op::JumpIfTrue(target) => {
                    if pop(&mut stack)?.is_truthy() {
                        ip = target;
                    }
                }

                Op::Call { function, argc } => {
                    let mut args = Vec::with_capacity(argc);
                    for _ in 0..argc {
                        args.push(pop(&mut stack)?);
                    }
                    args.reverse();
                    let result = self.call_at_depth(function, args, depth + 1)?;
                    stack.push(result);
                }

                Op::Return => {
                    return pop(&mut stack);
                }
            }
        }

        // Chunks end in an explicit Return; reaching here means bad bytecode.
        Err(VibeError::runtime("function ended without a return", None))
    }
}

fn pop(stack: &mut Vec<Value>) -> VibeResult<Value> {
    stack
        .pop()
        .ok_or_else(|| VibeError::runtime("value stack underflow", None))
}

fn peek(stack: &[Value]) -> VibeResult<&Value> {
    stack
        .last()
        .ok_or_else(|| VibeError::runtime("value stack underflow", None))
}

fn arithmetic(op: Op, left: Value, right: Value) -> VibeResult<Value> {
    if let (Value::String(a), Value::String(b)) = (&left, &right) {
        if op == Op::Add {
            return Ok(Value::String(format!("{}{}", a, b)));
        }
    }

    if let (Value::Int(a), Value::Int(b)) = (&left, &right) {
        let (a, b) = (*a, *b);
        let result = match op {
            Op::Add => a.checked_add(b),
            Op::Subtract => a.checked_sub(b),
            Op::Multiply => a.checked_mul(b),
            Op::Divide => {
                if b == 0 {
                    return Err(VibeError::runtime("division by zero", None));
                }
                a.checked_div(b)
            }
            Op::Modulo => {
                if b == 0 {
                    return Err(VibeError::runtime("division by zero", None));
                }
                a.checked_rem(b)
            }
            _ => unreachable!(),
        };
        return result
            .map(Value::Int)
            .ok_or_else(|| VibeError::runtime("integer overflow", None));
    }

    let (a, b) = match (left.as_f64(), right.as_f64()) {
        (Some(a), Some(b)) => (a, b),
        _ => {
            return Err(VibeError::runtime(
                format!(
                    "invalid operand types {} and {} for arithmetic",
                    left.type_of(),
                    right.type_of()
                ),
                None,
            ))
        }
    };
    let result = match op {
        Op::Add => a + b,
        Op::Subtract => a - b,
        Op::Multiply => a * b,
        Op::Divide => a / b,
        Op::Modulo => a % b,
        _ => unreachable!(),
    };
    // Number is contagious; otherwise mixed arithmetic stays Float.
    let generic = matches!(left, Value::Number(_)) || matches!(right, Value::Number(_));
    Ok(if generic {
        Value::Number(result)
    } else {
        Value::Float(result)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen;
    use crate::lexer::Lexer;
    use crate::parser::Parser;
    use crate::runtime::client::NullClient;
    use crate::semantic::Analyzer;
    use pretty_assertions::assert_eq;

    fn compile(source: &str) -> Module {
        let tokens = Lexer::new(source, None).tokenize();
        let mut ast = Parser::new(tokens).parse().unwrap();
        Analyzer::new().analyze(&mut ast).unwrap();
        codegen::generate(&ast).unwrap()
    }

    fn run(source: &str, name: &str, args: Vec<Value>) -> VibeResult<Value> {
        let module = compile(source);
        let vm = Vm::new(&module, &NullClient, Duration::from_secs(1));
        vm.call(module.function_index(name).unwrap(), args)
    }

    #[test]
    fn test_arithmetic_and_locals() {
        let result = run(
            "fn f(x: Int) -> Int { let y = x * 2; return y + 1; }",
            "f",
            vec![Value::int(20)],
        )
        .unwrap();
        assert_eq!(result, Value::int(41));
    }

    #[test]
    fn test_if_else() {
        let source = "fn sign(x: Int) -> Int { if x > 0 { return 1; } else if x < 0 { return -1; } else { return 0; } }";
        assert_eq!(run(source, "sign", vec![Value::int(5)]).unwrap(), Value::int(1));
        assert_eq!(run(source, "sign", vec![Value::int(-5)]).unwrap(), Value::int(-1));
        assert_eq!(run(source, "sign", vec![Value::int(0)]).unwrap(), Value::int(0));
    }

    #[test]
    fn test_while_loop_with_break_and_continue() {
        let source = concat!(
            "fn f() -> Int {\n",
            "  let total = 0;\n",
            "  let i = 0;\n",
            "  while true {\n",
            "    i = i + 1;\n",
            "    if i > 10 { break; }\n",
            "    if i % 2 == 0 { continue; }\n",
            "    total = total + i;\n",
            "  }\n",
            "  return total;\n",
            "}",
        );
        // 1 + 3 + 5 + 7 + 9
        assert_eq!(run(source, "f", vec![]).unwrap(), Value::int(25));
    }

    #[test]
    fn test_for_loop() {
        let source =
            "fn sum(n: Int) -> Int { let total = 0; for (let i = 1; i <= n; i = i + 1) { total = total + i; } return total; }";
        assert_eq!(run(source, "sum", vec![Value::int(10)]).unwrap(), Value::int(55));
    }

    #[test]
    fn test_function_calls_and_recursion() {
        let source =
            "fn fib(n: Int) -> Int { if n < 2 { return n; } return fib(n - 1) + fib(n - 2); }";
        assert_eq!(run(source, "fib", vec![Value::int(10)]).unwrap(), Value::int(55));
    }

    #[test]
    fn test_mutual_recursion() {
        let source = concat!(
            "fn even(n: Int) -> Bool { if n == 0 { return true; } return odd(n - 1); }\n",
            "fn odd(n: Int) -> Bool { if n == 0 { return false; } return even(n - 1); }",
        );
        assert_eq!(run(source, "even", vec![Value::int(8)]).unwrap(), Value::bool(true));
        assert_eq!(run(source, "odd", vec![Value::int(8)]).unwrap(), Value::bool(false));
    }

    #[test]
    fn test_division_by_zero() {
        let err = run(
            "fn f(x: Int) -> Int { return 1 / x; }",
            "f",
            vec![Value::int(0)],
        )
        .unwrap_err();
        assert!(matches!(err, VibeError::Runtime { .. }));
        assert!(err.message().contains("division by zero"));
    }

    #[test]
    fn test_integer_overflow() {
        let source = "fn f(x: Int) -> Int { return x + x; }";
        let err = run(source, "f", vec![Value::int(i64::MAX)]).unwrap_err();
        assert!(err.message().contains("integer overflow"));
    }

    #[test]
    fn test_runaway_recursion_is_an_error() {
        let source = "fn f(x: Int) -> Int { return f(x); }";
        let err = run(source, "f", vec![Value::int(1)]).unwrap_err();
        assert!(err.message().contains("call stack overflow"));
    }

    #[test]
    fn test_direct_call_rejects_extra_arguments() {
        let module = compile("fn f() {}");
        let vm = Vm::new(&module, &NullClient, Duration::from_secs(1));
        let err = vm
            .call(module.function_index("f").unwrap(), vec![Value::int(1)])
            .unwrap_err();
        assert!(matches!(err, VibeError::Runtime { .. }));
        assert!(err.message().contains("expects 0 arguments, got 1"));
    }

    #[test]
    fn test_string_concatenation() {
        let result = run(
            r#"fn greet(name: String) -> String { return "hello, " + name; }"#,
            "greet",
            vec![Value::string("world")],
        )
        .unwrap();
        assert_eq!(result, Value::string("hello, world"));
    }

    #[test]
    fn test_logical_short_circuit() {
        // The right side would divide by zero if evaluated.
        let source =
            "fn f(x: Int) -> Bool { return x == 0 or 10 / x > 1; }";
        assert_eq!(run(source, "f", vec![Value::int(0)]).unwrap(), Value::bool(true));
        assert_eq!(run(source, "f", vec![Value::int(4)]).unwrap(), Value::bool(true));
        assert_eq!(run(source, "f", vec![Value::int(100)]).unwrap(), Value::bool(false));
    }

    #[test]
    fn test_fall_off_end_returns_null() {
        assert_eq!(run("fn f() { let x = 1; }", "f", vec![]).unwrap(), Value::null());
    }

    #[test]
    fn test_mixed_numeric_arithmetic() {
        let result = run(
            "fn f(x: Int, y: Float) -> Float { return x + y; }",
            "f",
            vec![Value::int(1), Value::float(0.5)],
        )
        .unwrap();
        assert_eq!(result, Value::float(1.5));
    }
}
