//! Parser module
//!
//! This module handles parsing tokens into an Abstract Syntax Tree (AST).

pub mod ast;
pub mod parser;

pub use ast::{
    Ast, BinaryOp, Expr, FunctionBody, FunctionDecl, Item, Literal, LogicalOp, Param, Stmt, Type,
    TypeAliasDecl, TypeExpr, TypeExprKind, UnaryOp,
};
pub use parser::Parser;
