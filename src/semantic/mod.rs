//! Semantic analysis module
//!
//! This module validates the parsed program and annotates the AST with
//! resolved type information.

pub mod analyzer;

pub use analyzer::{template_placeholders, Analyzer};
