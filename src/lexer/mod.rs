//! Lexical analysis module
//!
//! This module handles tokenization of Vibe source code.

pub mod scanner;
pub mod token;

pub use scanner::Lexer;
pub use token::{Keyword, Literal, Token, TokenType};
