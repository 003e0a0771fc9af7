//! Code generation module
//!
//! Lowers the analyzed AST into an immutable [`Module`] of stack-machine
//! bytecode. Model-backed functions compile to a [`ModelFunction`] record
//! instead of a chunk; the runtime bridge interprets those at call time.
//!
//! Code generation trusts the analyzer: it reads the `resolved` and
//! `inferred` slots the analyzer filled in, and reports a `Codegen` error if
//! it finds one empty.

use crate::error::{VibeError, VibeResult};
use crate::parser::ast::{
    Ast, BinaryOp, Expr, FunctionBody, FunctionDecl, Item, Literal, LogicalOp, Stmt, Type,
    UnaryOp,
};
use crate::runtime::value::Value;
use std::collections::HashMap;

/// A single bytecode instruction
///
/// Jump targets are absolute instruction indices within the chunk.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Op {
    /// Push a constant from the constant pool
    Constant(usize),
    /// Push the value of a local slot
    LoadLocal(usize),
    /// Store the top of stack into a local slot, leaving it on the stack
    StoreLocal(usize),
    /// Discard the top of stack
    Pop,

    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    Negate,
    Not,

    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,

    /// Unconditional jump
    Jump(usize),
    /// Pop the condition and jump if it is false
    JumpIfFalse(usize),
    /// Pop the condition and jump if it is true
    JumpIfTrue(usize),

    /// Call the module function at `function` with `argc` stacked arguments
    Call { function: usize, argc: usize },
    /// Return the top of stack to the caller
    Return,
}

/// Bytecode and constants for one compiled function body
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub code: Vec<Op>,
    pub constants: Vec<Value>,
    /// Number of local slots the frame needs, parameters included
    pub local_count: usize,
}

/// How a function executes
#[derive(Debug, Clone, PartialEq)]
pub enum FunctionKind {
    /// Ordinary bytecode body
    Compiled(Chunk),
    /// Model-backed body, executed through the bridge
    Model(ModelFunction),
}

/// Compiled form of a prompt body
#[derive(Debug, Clone, PartialEq)]
pub struct ModelFunction {
    /// Prompt template with `{param}` placeholders
    pub template: String,
    /// Natural-language hint from a Meaning return type, if any
    pub meaning: Option<String>,
}

/// A compiled function with its boundary signature
#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    pub name: String,
    pub params: Vec<(String, Type)>,
    pub return_type: Type,
    pub kind: FunctionKind,
}

/// An immutable compiled program
///
/// Functions keep their declaration order; the index maps exported names to
/// positions in that order.
#[derive(Debug, Clone, PartialEq)]
pub struct Module {
    functions: Vec<Function>,
    index: HashMap<String, usize>,
}

impl Module {
    /// Looks up a function by exported name
    pub fn function(&self, name: &str) -> Option<&Function> {
        self.index.get(name).map(|&i| &self.functions[i])
    }

    pub fn function_at(&self, index: usize) -> Option<&Function> {
        self.functions.get(index)
    }

    /// Position of a function in declaration order
    pub fn function_index(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    /// Exported function names, in declaration order
    pub fn exports(&self) -> Vec<&str> {
        self.functions.iter().map(|f| f.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

/// Generates a module from an analyzed AST
pub fn generate(ast: &Ast) -> VibeResult<Module> {
    let mut index = HashMap::new();
    let declarations: Vec<&FunctionDecl> = ast
        .items
        .iter()
        .filter_map(|item| match item {
            Item::Function(f) => Some(f),
            Item::TypeAlias(_) => None,
        })
        .collect();
    for (position, function) in declarations.iter().enumerate() {
        index.insert(function.name.clone(), position);
    }

    let mut functions = Vec::with_capacity(declarations.len());
    for declaration in &declarations {
        functions.push(generate_function(declaration, &index)?);
    }

    Ok(Module { functions, index })
}

fn generate_function(
    declaration: &FunctionDecl,
    index: &HashMap<String, usize>,
) -> VibeResult<Function> {
    let mut params = Vec::with_capacity(declaration.params.len());
    for param in &declaration.params {
        let ty = param.ty.resolved.ok_or_else(|| {
            VibeError::codegen(format!(
                "parameter '{}' of '{}' has no resolved type",
                param.name, declaration.name
            ))
        })?;
        params.push((param.name.clone(), ty));
    }

    let return_type = match &declaration.return_type {
        Some(ty) => ty.resolved.ok_or_else(|| {
            VibeError::codegen(format!(
                "return type of '{}' is unresolved",
                declaration.name
            ))
        })?,
        None => Type::Null,
    };

    let kind = match &declaration.body {
        FunctionBody::Prompt { template, .. } => FunctionKind::Model(ModelFunction {
            template: template.clone(),
            meaning: declaration
                .return_type
                .as_ref()
                .and_then(|ty| ty.meaning_hint())
                .map(str::to_string),
        }),
        FunctionBody::Block(statements) => {
            let mut generator = Generator::new(index);
            for param in &declaration.params {
                generator.declare_local(&param.name);
            }
            generator.generate_block(statements)?;
            // Falling off the end yields null.
            let null = generator.constant(Value::Null);
            generator.emit(Op::Constant(null));
            generator.emit(Op::Return);
            FunctionKind::Compiled(generator.finish())
        }
    };

    Ok(Function {
        name: declaration.name.clone(),
        params,
        return_type,
        kind,
    })
}

struct Local {
    name: String,
    depth: usize,
    slot: usize,
}

struct LoopContext {
    break_jumps: Vec<usize>,
    continue_jumps: Vec<usize>,
}

/// Per-function bytecode emitter
struct Generator<'a> {
    index: &'a HashMap<String, usize>,
    code: Vec<Op>,
    constants: Vec<Value>,
    locals: Vec<Local>,
    depth: usize,
    slot_high_water: usize,
    loops: Vec<LoopContext>,
}

impl<'a> Generator<'a> {
    fn new(index: &'a HashMap<String, usize>) -> Self {
        Self {
            index,
            code: Vec::new(),
            constants: Vec::new(),
            locals: Vec::new(),
            depth: 0,
            slot_high_water: 0,
            loops: Vec::new(),
        }
    }

    fn finish(self) -> Chunk {
        Chunk {
            code: self.code,
            constants: self.constants,
            local_count: self.slot_high_water,
        }
    }

    fn emit(&mut self, op: Op) -> usize {
        self.code.push(op);
        self.code.len() - 1
    }

    fn constant(&mut self, value: Value) -> usize {
        self.constants.push(value);
        self.constants.len() - 1
    }

    /// Allocates a fresh local slot; slots are never reused, so shadowed
    /// bindings from sibling scopes cannot alias each other
    fn declare_local(&mut self, name: &str) -> usize {
        let slot = self.slot_high_water;
        self.slot_high_water += 1;
        self.locals.push(Local {
            name: name.to_string(),
            depth: self.depth,
            slot,
        });
        slot
    }

    fn resolve_local(&self, name: &str) -> Option<usize> {
        self.locals
            .iter()
            .rev()
            .find(|local| local.name == name)
            .map(|local| local.slot)
    }

    fn begin_scope(&mut self) {
        self.depth += 1;
    }

    fn end_scope(&mut self) {
        self.depth -= 1;
        while matches!(self.locals.last(), Some(local) if local.depth > self.depth) {
            self.locals.pop();
        }
    }

    /// Points the jump at `at` to the next emitted instruction
    fn patch_jump(&mut self, at: usize) -> VibeResult<()> {
        self.patch_jump_to(at, self.code.len())
    }

    fn generate_block(&mut self, statements: &[Stmt]) -> VibeResult<()> {
        for statement in statements {
            self.generate_statement(statement)?;
        }
        Ok(())
    }

    fn generate_statement(&mut self, statement: &Stmt) -> VibeResult<()> {
        match statement {
            Stmt::Let { name, value, .. } => {
                self.generate_expr(value)?;
                let slot = self.declare_local(name);
                self.emit(Op::StoreLocal(slot));
                self.emit(Op::Pop);
                Ok(())
            }

            Stmt::Expression { expr, .. } => {
                self.generate_expr(expr)?;
                self.emit(Op::Pop);
                Ok(())
            }

            Stmt::If {
                condition,
                then_branch,
                else_branch,
                ..
            } => {
                self.generate_expr(condition)?;
                let to_else = self.emit(Op::JumpIfFalse(usize::MAX));

                self.begin_scope();
                self.generate_block(then_branch)?;
                self.end_scope();

                if let Some(else_branch) = else_branch {
                    let to_end = self.emit(Op::Jump(usize::MAX));
                    self.patch_jump(to_else)?;
                    self.begin_scope();
                    self.generate_block(else_branch)?;
                    self.end_scope();
                    self.patch_jump(to_end)?;
                } else {
                    self.patch_jump(to_else)?;
                }
                Ok(())
            }

            Stmt::While {
                condition, body, ..
            } => {
                let loop_start = self.code.len();
                self.generate_expr(condition)?;
                let to_exit = self.emit(Op::JumpIfFalse(usize::MAX));

                self.loops.push(LoopContext {
                    break_jumps: Vec::new(),
                    continue_jumps: Vec::new(),
                });
                self.begin_scope();
                self.generate_block(body)?;
                self.end_scope();
                self.emit(Op::Jump(loop_start));

                let context = self.loops.pop().ok_or_else(|| {
                    VibeError::codegen("loop context stack underflow")
                })?;
                self.patch_jump(to_exit)?;
                for jump in context.break_jumps {
                    self.patch_jump(jump)?;
                }
                for jump in context.continue_jumps {
                    self.patch_jump_to(jump, loop_start)?;
                }
                Ok(())
            }

            Stmt::For {
                initializer,
                condition,
                increment,
                body,
                ..
            } => {
                // The initializer's binding is scoped to the loop.
                self.begin_scope();
                if let Some(initializer) = initializer {
                    self.generate_statement(initializer)?;
                }

                let condition_start = self.code.len();
                let to_exit = match condition {
                    Some(condition) => {
                        self.generate_expr(condition)?;
                        Some(self.emit(Op::JumpIfFalse(usize::MAX)))
                    }
                    None => None,
                };

                self.loops.push(LoopContext {
                    break_jumps: Vec::new(),
                    continue_jumps: Vec::new(),
                });
                self.begin_scope();
                self.generate_block(body)?;
                self.end_scope();

                // Continue lands on the increment clause.
                let increment_start = self.code.len();
                if let Some(increment) = increment {
                    self.generate_expr(increment)?;
                    self.emit(Op::Pop);
                }
                self.emit(Op::Jump(condition_start));

                let context = self.loops.pop().ok_or_else(|| {
                    VibeError::codegen("loop context stack underflow")
                })?;
                if let Some(to_exit) = to_exit {
                    self.patch_jump(to_exit)?;
                }
                for jump in context.break_jumps {
                    self.patch_jump(jump)?;
                }
                for jump in context.continue_jumps {
                    self.patch_jump_to(jump, increment_start)?;
                }
                self.end_scope();
                Ok(())
            }

            Stmt::Return { value, .. } => {
                match value {
                    Some(expr) => self.generate_expr(expr)?,
                    None => {
                        let null = self.constant(Value::Null);
                        self.emit(Op::Constant(null));
                    }
                }
                self.emit(Op::Return);
                Ok(())
            }

            Stmt::Break { location } => {
                let jump = self.emit(Op::Jump(usize::MAX));
                self.loops
                    .last_mut()
                    .ok_or_else(|| {
                        VibeError::codegen(format!("'break' outside of a loop at {}", location))
                    })?
                    .break_jumps
                    .push(jump);
                Ok(())
            }

            Stmt::Continue { location } => {
                let jump = self.emit(Op::Jump(usize::MAX));
                self.loops
                    .last_mut()
                    .ok_or_else(|| {
                        VibeError::codegen(format!(
                            "'continue' outside of a loop at {}",
                            location
                        ))
                    })?
                    .continue_jumps
                    .push(jump);
                Ok(())
            }

            Stmt::Block { statements, .. } => {
                self.begin_scope();
                let result = self.generate_block(statements);
                self.end_scope();
                result
            }
        }
    }

    fn generate_expr(&mut self, expr: &Expr) -> VibeResult<()> {
        match expr {
            Expr::Literal { value, .. } => {
                let constant = match value {
                    Literal::Integer(n) => Value::Int(*n),
                    Literal::Float(n) => Value::Float(*n),
                    Literal::String(s) => Value::String(s.clone()),
                    Literal::Boolean(b) => Value::Bool(*b),
                    Literal::Null => Value::Null,
                };
                let slot = self.constant(constant);
                self.emit(Op::Constant(slot));
                Ok(())
            }

            Expr::Variable { name, location } => {
                let slot = self.resolve_local(name).ok_or_else(|| {
                    VibeError::codegen(format!(
                        "variable '{}' at {} has no local slot",
                        name, location
                    ))
                })?;
                self.emit(Op::LoadLocal(slot));
                Ok(())
            }

            Expr::Assign {
                name,
                value,
                location,
            } => {
                self.generate_expr(value)?;
                let slot = self.resolve_local(name).ok_or_else(|| {
                    VibeError::codegen(format!(
                        "assignment target '{}' at {} has no local slot",
                        name, location
                    ))
                })?;
                self.emit(Op::StoreLocal(slot));
                Ok(())
            }

            Expr::Binary {
                left,
                operator,
                right,
                ..
            } => {
                self.generate_expr(left)?;
                self.generate_expr(right)?;
                self.emit(match operator {
                    BinaryOp::Add => Op::Add,
                    BinaryOp::Subtract => Op::Subtract,
                    BinaryOp::Multiply => Op::Multiply,
                    BinaryOp::Divide => Op::Divide,
                    BinaryOp::Modulo => Op::Modulo,
                    BinaryOp::Equal => Op::Equal,
                    BinaryOp::NotEqual => Op::NotEqual,
                    BinaryOp::Less => Op::Less,
                    BinaryOp::LessEqual => Op::LessEqual,
                    BinaryOp::Greater => Op::Greater,
                    BinaryOp::GreaterEqual => Op::GreaterEqual,
                });
                Ok(())
            }

            Expr::Logical {
                left,
                operator,
                right,
                ..
            } => {
                // Short-circuit by re-materializing the deciding operand;
                // the analyzer guarantees both sides are Bool.
                self.generate_expr(left)?;
                let (short, short_value) = match operator {
                    LogicalOp::And => (self.emit(Op::JumpIfFalse(usize::MAX)), false),
                    LogicalOp::Or => (self.emit(Op::JumpIfTrue(usize::MAX)), true),
                };
                self.generate_expr(right)?;
                let to_end = self.emit(Op::Jump(usize::MAX));
                self.patch_jump(short)?;
                let constant = self.constant(Value::Bool(short_value));
                self.emit(Op::Constant(constant));
                self.patch_jump(to_end)?;
                Ok(())
            }

            Expr::Unary {
                operator, operand, ..
            } => {
                self.generate_expr(operand)?;
                self.emit(match operator {
                    UnaryOp::Negate => Op::Negate,
                    UnaryOp::Not => Op::Not,
                });
                Ok(())
            }

            Expr::Call {
                callee,
                arguments,
                location,
            } => {
                let function = *self.index.get(callee).ok_or_else(|| {
                    VibeError::codegen(format!(
                        "call to unknown function '{}' at {}",
                        callee, location
                    ))
                })?;
                for argument in arguments {
                    self.generate_expr(argument)?;
                }
                self.emit(Op::Call {
                    function,
                    argc: arguments.len(),
                });
                Ok(())
            }
        }
    }

    fn patch_jump_to(&mut self, at: usize, target: usize) -> VibeResult<()> {
        match &mut self.code[at] {
            Op::Jump(slot) | Op::JumpIfFalse(slot) | Op::JumpIfTrue(slot) => {
                *slot = target;
                Ok(())
            }
            other => Err(VibeError::codegen(format!(
                "attempted to patch non-jump instruction {:?}",
                other
            ))),
        }
    }
}
