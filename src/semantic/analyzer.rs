//! Semantic analyzer
//!
//! Validates the AST and annotates it in place: every `TypeExpr` gets its
//! `resolved` slot filled, unannotated `let` bindings get their inferred
//! type recorded, and alias-named Meaning types are rewritten so later
//! stages can read the hint directly. Runs in two passes so functions can
//! call each other regardless of declaration order.

use crate::error::{SourceLocation, VibeError, VibeResult};
use crate::parser::ast::{
    Ast, BinaryOp, Expr, FunctionBody, FunctionDecl, Item, Literal, LogicalOp, Stmt, Type,
    TypeAliasDecl, TypeExpr, TypeExprKind, UnaryOp,
};
use std::collections::HashMap;

/// Resolved signature of a declared function
#[derive(Debug, Clone)]
struct FunctionSig {
    params: Vec<Type>,
    return_type: Type,
}

/// Semantic analyzer state
pub struct Analyzer {
    /// Alias name -> (underlying type, meaning hint if the alias wraps one)
    aliases: HashMap<String, (Type, Option<String>)>,
    functions: HashMap<String, FunctionSig>,
    scopes: Vec<HashMap<String, Type>>,
    loop_depth: usize,
}

impl Analyzer {
    pub fn new() -> Self {
        Self {
            aliases: HashMap::new(),
            functions: HashMap::new(),
            scopes: Vec::new(),
            loop_depth: 0,
        }
    }

    /// Analyzes and annotates a program
    pub fn analyze(&mut self, ast: &mut Ast) -> VibeResult<()> {
        // Pass 1: record every alias and function signature so bodies can
        // reference declarations that appear later in the file.
        for item in &mut ast.items {
            match item {
                Item::TypeAlias(alias) => self.declare_alias(alias)?,
                Item::Function(_) => {}
            }
        }
        for item in &mut ast.items {
            if let Item::Function(function) = item {
                self.declare_function(function)?;
            }
        }

        // Pass 2: check bodies.
        for item in &mut ast.items {
            if let Item::Function(function) = item {
                self.check_function(function)?;
            }
        }
        Ok(())
    }

    fn declare_alias(&mut self, alias: &mut TypeAliasDecl) -> VibeResult<()> {
        if self.aliases.contains_key(&alias.name) {
            return Err(VibeError::semantic(
                format!("duplicate type alias '{}'", alias.name),
                alias.location.clone(),
            ));
        }
        if Type::from_name(&alias.name).is_some() {
            return Err(VibeError::semantic(
                format!("type alias '{}' shadows a built-in type", alias.name),
                alias.location.clone(),
            ));
        }
        let resolved = self.resolve_type(&mut alias.target)?;
        let hint = alias.target.meaning_hint().map(str::to_string);
        self.aliases.insert(alias.name.clone(), (resolved, hint));
        Ok(())
    }

    fn declare_function(&mut self, function: &mut FunctionDecl) -> VibeResult<()> {
        if self.functions.contains_key(&function.name) {
            return Err(VibeError::semantic(
                format!("duplicate function '{}'", function.name),
                function.location.clone(),
            ));
        }

        let mut params = Vec::with_capacity(function.params.len());
        for param in &mut function.params {
            params.push(self.resolve_type(&mut param.ty)?);
        }
        let return_type = match &mut function.return_type {
            Some(ty) => self.resolve_type(ty)?,
            None => Type::Null,
        };

        self.functions.insert(
            function.name.clone(),
            FunctionSig {
                params,
                return_type,
            },
        );
        Ok(())
    }

    /// Resolves a type expression, filling its `resolved` slot
    ///
    /// An alias that wraps a Meaning type is rewritten into the Meaning form
    /// so the hint survives name indirection.
    fn resolve_type(&mut self, ty: &mut TypeExpr) -> VibeResult<Type> {
        if let TypeExprKind::Meaning { inner, .. } = &mut ty.kind {
            let resolved = self.resolve_type(inner)?;
            ty.resolved = Some(resolved);
            return Ok(resolved);
        }

        let TypeExprKind::Named(name) = &ty.kind else {
            unreachable!();
        };
        let name = name.clone();

        let resolved = if let Some(builtin) = Type::from_name(&name) {
            builtin
        } else if let Some((aliased, hint)) = self.aliases.get(&name).cloned() {
            if let Some(hint) = hint {
                let mut inner = TypeExpr::named(name, ty.location.clone());
                inner.resolved = Some(aliased);
                ty.kind = TypeExprKind::Meaning {
                    inner: Box::new(inner),
                    hint,
                };
            }
            aliased
        } else {
            return Err(VibeError::semantic(
                format!("unknown type '{}'", name),
                ty.location.clone(),
            ));
        };
        ty.resolved = Some(resolved);
        Ok(resolved)
    }

    fn check_function(&mut self, function: &mut FunctionDecl) -> VibeResult<()> {
        let sig = self.functions[&function.name].clone();

        if let FunctionBody::Prompt { template, location } = &function.body {
            let template = template.clone();
            let location = location.clone();
            return self.check_prompt_body(function, &template, &location);
        }

        self.scopes.push(HashMap::new());
        let result = (|| {
            for (param, ty) in function.params.iter().zip(&sig.params) {
                self.define(&param.name, *ty, &param.location)?;
            }
            let FunctionBody::Block(statements) = &mut function.body else {
                unreachable!();
            };
            self.check_block_statements(statements, sig.return_type)
        })();
        self.scopes.pop();
        result?;

        let FunctionBody::Block(statements) = &function.body else {
            unreachable!();
        };
        if sig.return_type != Type::Null && !Self::always_returns(statements) {
            return Err(VibeError::semantic(
                format!(
                    "function '{}' declares return type {} but does not return on every path",
                    function.name, sig.return_type
                ),
                function.location.clone(),
            ));
        }
        Ok(())
    }

    /// Validates a prompt template against its function's parameters
    fn check_prompt_body(
        &self,
        function: &FunctionDecl,
        template: &str,
        location: &SourceLocation,
    ) -> VibeResult<()> {
        if function.return_type.is_none() {
            return Err(VibeError::semantic(
                format!(
                    "model-backed function '{}' must declare a return type",
                    function.name
                ),
                function.location.clone(),
            ));
        }

        let placeholders = template_placeholders(template)
            .map_err(|message| VibeError::semantic(message, location.clone()))?;
        for placeholder in placeholders {
            if placeholder.is_empty() {
                return Err(VibeError::semantic(
                    "empty placeholder '{}' in prompt template",
                    location.clone(),
                ));
            }
            if !function.params.iter().any(|p| p.name == placeholder) {
                return Err(VibeError::semantic(
                    format!(
                        "prompt template references unknown parameter '{{{}}}'",
                        placeholder
                    ),
                    location.clone(),
                ));
            }
        }
        Ok(())
    }

    fn check_block_statements(
        &mut self,
        statements: &mut [Stmt],
        return_type: Type,
    ) -> VibeResult<()> {
        for statement in statements {
            self.check_statement(statement, return_type)?;
        }
        Ok(())
    }

    fn check_statement(&mut self, statement: &mut Stmt, return_type: Type) -> VibeResult<()> {
        match statement {
            Stmt::Let {
                name,
                annotation,
                inferred,
                value,
                location,
            } => {
                let value_type = self.check_expr(value)?;
                let declared = match annotation {
                    Some(ty) => {
                        let declared = self.resolve_type(ty)?;
                        if !declared.accepts(value_type) {
                            return Err(VibeError::semantic(
                                format!(
                                    "cannot initialize '{}' of type {} with a {} value",
                                    name, declared, value_type
                                ),
                                location.clone(),
                            ));
                        }
                        declared
                    }
                    None => {
                        *inferred = Some(value_type);
                        value_type
                    }
                };
                self.define(name, declared, location)
            }

            Stmt::Expression { expr, .. } => {
                self.check_expr(expr)?;
                Ok(())
            }

            Stmt::If {
                condition,
                then_branch,
                else_branch,
                location,
            } => {
                self.expect_bool(condition, "if condition", location)?;
                self.check_scoped(then_branch, return_type)?;
                if let Some(else_branch) = else_branch {
                    self.check_scoped(else_branch, return_type)?;
                }
                Ok(())
            }

            Stmt::While {
                condition,
                body,
                location,
            } => {
                self.expect_bool(condition, "while condition", location)?;
                self.loop_depth += 1;
                let result = self.check_scoped(body, return_type);
                self.loop_depth -= 1;
                result
            }

            Stmt::For {
                initializer,
                condition,
                increment,
                body,
                location,
            } => {
                // The initializer's binding is visible to the whole loop.
                self.scopes.push(HashMap::new());
                let result = (|| {
                    if let Some(initializer) = initializer {
                        self.check_statement(initializer, return_type)?;
                    }
                    if let Some(condition) = condition {
                        self.expect_bool(condition, "for condition", location)?;
                    }
                    if let Some(increment) = increment {
                        self.check_expr(increment)?;
                    }
                    self.loop_depth += 1;
                    let body_result = self.check_scoped(body, return_type);
                    self.loop_depth -= 1;
                    body_result
                })();
                self.scopes.pop();
                result
            }

            Stmt::Return { value, location } => {
                let value_type = match value {
                    Some(expr) => self.check_expr(expr)?,
                    None => Type::Null,
                };
                if !return_type.accepts(value_type) {
                    return Err(VibeError::semantic(
                        format!(
                            "cannot return a {} value from a function declared to return {}",
                            value_type, return_type
                        ),
                        location.clone(),
                    ));
                }
                Ok(())
            }

            Stmt::Break { location } => {
                if self.loop_depth == 0 {
                    return Err(VibeError::semantic(
                        "'break' outside of a loop",
                        location.clone(),
                    ));
                }
                Ok(())
            }

            Stmt::Continue { location } => {
                if self.loop_depth == 0 {
                    return Err(VibeError::semantic(
                        "'continue' outside of a loop",
                        location.clone(),
                    ));
                }
                Ok(())
            }

            Stmt::Block { statements, .. } => self.check_scoped(statements, return_type),
        }
    }

    fn check_scoped(&mut self, statements: &mut [Stmt], return_type: Type) -> VibeResult<()> {
        self.scopes.push(HashMap::new());
        let result = self.check_block_statements(statements, return_type);
        self.scopes.pop();
        result
    }

    fn check_expr(&mut self, expr: &Expr) -> VibeResult<Type> {
        match expr {
            Expr::Literal { value, .. } => Ok(match value {
                Literal::Integer(_) => Type::Int,
                Literal::Float(_) => Type::Float,
                Literal::String(_) => Type::String,
                Literal::Boolean(_) => Type::Bool,
                Literal::Null => Type::Null,
            }),

            Expr::Variable { name, location } => self.lookup(name).ok_or_else(|| {
                VibeError::semantic(format!("undefined variable '{}'", name), location.clone())
            }),

            Expr::Assign {
                name,
                value,
                location,
            } => {
                let value_type = self.check_expr(value)?;
                let variable_type = self.lookup(name).ok_or_else(|| {
                    VibeError::semantic(
                        format!("assignment to undefined variable '{}'", name),
                        location.clone(),
                    )
                })?;
                if !variable_type.accepts(value_type) {
                    return Err(VibeError::semantic(
                        format!(
                            "cannot assign a {} value to '{}' of type {}",
                            value_type, name, variable_type
                        ),
                        location.clone(),
                    ));
                }
                Ok(variable_type)
            }

            Expr::Binary {
                left,
                operator,
                right,
                location,
            } => {
                let left_type = self.check_expr(left)?;
                let right_type = self.check_expr(right)?;
                self.check_binary(*operator, left_type, right_type, location)
            }

            Expr::Logical {
                left,
                operator,
                right,
                location,
            } => {
                let left_type = self.check_expr(left)?;
                let right_type = self.check_expr(right)?;
                if left_type != Type::Bool || right_type != Type::Bool {
                    let op = match operator {
                        LogicalOp::And => "and",
                        LogicalOp::Or => "or",
                    };
                    return Err(VibeError::semantic(
                        format!(
                            "'{}' requires Bool operands, got {} and {}",
                            op, left_type, right_type
                        ),
                        location.clone(),
                    ));
                }
                Ok(Type::Bool)
            }

            Expr::Unary {
                operator,
                operand,
                location,
            } => {
                let operand_type = self.check_expr(operand)?;
                match operator {
                    UnaryOp::Negate => {
                        if !operand_type.is_numeric() {
                            return Err(VibeError::semantic(
                                format!("cannot negate a {} value", operand_type),
                                location.clone(),
                            ));
                        }
                        Ok(operand_type)
                    }
                    UnaryOp::Not => {
                        if operand_type != Type::Bool {
                            return Err(VibeError::semantic(
                                format!("'not' requires a Bool operand, got {}", operand_type),
                                location.clone(),
                            ));
                        }
                        Ok(Type::Bool)
                    }
                }
            }

            Expr::Call {
                callee,
                arguments,
                location,
            } => {
                let sig = self
                    .functions
                    .get(callee)
                    .cloned()
                    .ok_or_else(|| {
                        VibeError::semantic(
                            format!("call to undefined function '{}'", callee),
                            location.clone(),
                        )
                    })?;
                if arguments.len() != sig.params.len() {
                    return Err(VibeError::semantic(
                        format!(
                            "function '{}' expects {} arguments, got {}",
                            callee,
                            sig.params.len(),
                            arguments.len()
                        ),
                        location.clone(),
                    ));
                }
                for (index, (argument, expected)) in
                    arguments.iter().zip(&sig.params).enumerate()
                {
                    let actual = self.check_expr(argument)?;
                    if !expected.accepts(actual) {
                        return Err(VibeError::semantic(
                            format!(
                                "argument {} of '{}' expects {}, got {}",
                                index + 1,
                                callee,
                                expected,
                                actual
                            ),
                            argument.location().clone(),
                        ));
                    }
                }
                Ok(sig.return_type)
            }
        }
    }

    fn check_binary(
        &self,
        operator: BinaryOp,
        left: Type,
        right: Type,
        location: &SourceLocation,
    ) -> VibeResult<Type> {
        if operator.is_arithmetic() {
            if operator == BinaryOp::Add && left == Type::String && right == Type::String {
                return Ok(Type::String);
            }
            if left.is_numeric() && right.is_numeric() {
                let result = if left == Type::Number || right == Type::Number {
                    Type::Number
                } else if left == Type::Float || right == Type::Float {
                    Type::Float
                } else {
                    Type::Int
                };
                return Ok(result);
            }
            return Err(VibeError::semantic(
                format!("invalid operand types {} and {} for arithmetic", left, right),
                location.clone(),
            ));
        }

        // Comparison operators
        match operator {
            BinaryOp::Equal | BinaryOp::NotEqual => {
                let comparable =
                    left == right || (left.is_numeric() && right.is_numeric());
                if !comparable {
                    return Err(VibeError::semantic(
                        format!("cannot compare {} with {}", left, right),
                        location.clone(),
                    ));
                }
            }
            _ => {
                let orderable = (left.is_numeric() && right.is_numeric())
                    || (left == Type::String && right == Type::String);
                if !orderable {
                    return Err(VibeError::semantic(
                        format!("cannot order {} against {}", left, right),
                        location.clone(),
                    ));
                }
            }
        }
        Ok(Type::Bool)
    }

    fn expect_bool(
        &mut self,
        condition: &Expr,
        context: &str,
        location: &SourceLocation,
    ) -> VibeResult<()> {
        let ty = self.check_expr(condition)?;
        if ty != Type::Bool {
            return Err(VibeError::semantic(
                format!("{} must be Bool, got {}", context, ty),
                location.clone(),
            ));
        }
        Ok(())
    }

    fn define(&mut self, name: &str, ty: Type, location: &SourceLocation) -> VibeResult<()> {
        let scope = self
            .scopes
            .last_mut()
            .ok_or_else(|| VibeError::general("no active scope"))?;
        if scope.contains_key(name) {
            return Err(VibeError::semantic(
                format!("duplicate declaration of '{}' in this scope", name),
                location.clone(),
            ));
        }
        scope.insert(name.to_string(), ty);
        Ok(())
    }

    fn lookup(&self, name: &str) -> Option<Type> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.get(name).copied())
    }

    /// Whether every control path through the statements reaches a return
    fn always_returns(statements: &[Stmt]) -> bool {
        statements.iter().any(|statement| match statement {
            Stmt::Return { .. } => true,
            Stmt::If {
                then_branch,
                else_branch: Some(else_branch),
                ..
            } => Self::always_returns(then_branch) && Self::always_returns(else_branch),
            Stmt::Block { statements, .. } => Self::always_returns(statements),
            _ => false,
        })
    }
}

impl Default for Analyzer {
    fn default() -> Self {
        Self::new()
    }
}

/// Extracts `{name}` placeholder names from a prompt template
///
/// A `{` that never meets its `}` is an error, not a placeholder.
pub fn template_placeholders(template: &str) -> Result<Vec<String>, String> {
    let mut placeholders = Vec::new();
    let mut chars = template.chars();
    while let Some(c) = chars.next() {
        if c == '{' {
            let mut name = String::new();
            let mut closed = false;
            for inner in chars.by_ref() {
                if inner == '}' {
                    closed = true;
                    break;
                }
                name.push(inner);
            }
            if !closed {
                return Err(format!(
                    "unterminated placeholder '{{{}' in prompt template",
                    name
                ));
            }
            placeholders.push(name);
        }
    }
    Ok(placeholders)
}
