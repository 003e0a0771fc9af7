//! Error handling and diagnostics for the Vibe language
//!
//! Every pipeline stage and every runtime call reports exactly one of the
//! kinds below; no stage reinterprets an earlier stage's error as its own.

use std::fmt;

pub mod diagnostic;

pub use diagnostic::Diagnostic;

/// Result type alias for Vibe operations
pub type VibeResult<T> = Result<T, VibeError>;

/// Source location information for error reporting
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLocation {
    /// Line number (1-based)
    pub line: usize,
    /// Column number (1-based)
    pub column: usize,
    /// Optional filename
    pub filename: Option<String>,
}

impl SourceLocation {
    /// Create a new source location
    pub fn new(line: usize, column: usize, filename: Option<String>) -> Self {
        Self {
            line,
            column,
            filename,
        }
    }

    /// Create a source location without a filename
    pub fn at(line: usize, column: usize) -> Self {
        Self::new(line, column, None)
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(ref filename) = self.filename {
            write!(f, "{}:{}:{}", filename, self.line, self.column)
        } else {
            write!(f, "{}:{}", self.line, self.column)
        }
    }
}

/// Main error type for the Vibe language
///
/// Success is expressed as `Ok(..)`; these are the seven failure kinds.
#[derive(Debug, Clone, PartialEq)]
pub enum VibeError {
    /// Lifecycle misuse or any failure outside the other categories
    General { message: String },
    /// Syntax error, including lexical faults surfaced as error tokens
    Parser {
        message: String,
        location: SourceLocation,
    },
    /// Name resolution or type error
    Semantic {
        message: String,
        location: SourceLocation,
    },
    /// Invariant violation during lowering (an analyzer bug, not user error)
    Codegen { message: String },
    /// Execution failure: arity/type mismatch at the execute boundary,
    /// arithmetic faults, or an unusable model response
    Runtime {
        message: String,
        location: Option<SourceLocation>,
    },
    /// File-system failure while reading source or configuration
    Io { message: String },
    /// Transport failure reaching the model service: the call never produced
    /// a payload, as opposed to a payload that failed coercion
    ModelConnection { message: String },
}

impl VibeError {
    /// Create a new general error
    pub fn general(message: impl Into<String>) -> Self {
        Self::General {
            message: message.into(),
        }
    }

    /// Create a new parser error
    pub fn parser(message: impl Into<String>, location: SourceLocation) -> Self {
        Self::Parser {
            message: message.into(),
            location,
        }
    }

    /// Create a new semantic error
    pub fn semantic(message: impl Into<String>, location: SourceLocation) -> Self {
        Self::Semantic {
            message: message.into(),
            location,
        }
    }

    /// Create a new codegen error
    pub fn codegen(message: impl Into<String>) -> Self {
        Self::Codegen {
            message: message.into(),
        }
    }

    /// Create a new runtime error
    pub fn runtime(message: impl Into<String>, location: Option<SourceLocation>) -> Self {
        Self::Runtime {
            message: message.into(),
            location,
        }
    }

    /// Create a new I/O error
    pub fn io(message: impl Into<String>) -> Self {
        Self::Io {
            message: message.into(),
        }
    }

    /// Create a new model-connection error
    pub fn model_connection(message: impl Into<String>) -> Self {
        Self::ModelConnection {
            message: message.into(),
        }
    }

    /// Get the error kind as a string
    pub fn kind(&self) -> &str {
        match self {
            Self::General { .. } => "General Error",
            Self::Parser { .. } => "Parser Error",
            Self::Semantic { .. } => "Semantic Error",
            Self::Codegen { .. } => "Codegen Error",
            Self::Runtime { .. } => "Runtime Error",
            Self::Io { .. } => "IO Error",
            Self::ModelConnection { .. } => "Model Connection Failed",
        }
    }

    /// Get the error message
    pub fn message(&self) -> &str {
        match self {
            Self::General { message }
            | Self::Parser { message, .. }
            | Self::Semantic { message, .. }
            | Self::Codegen { message }
            | Self::Runtime { message, .. }
            | Self::Io { message }
            | Self::ModelConnection { message } => message,
        }
    }

    /// Get the source location if available
    pub fn location(&self) -> Option<&SourceLocation> {
        match self {
            Self::Parser { location, .. } | Self::Semantic { location, .. } => Some(location),
            Self::Runtime { location, .. } => location.as_ref(),
            Self::General { .. }
            | Self::Codegen { .. }
            | Self::Io { .. }
            | Self::ModelConnection { .. } => None,
        }
    }
}

impl fmt::Display for VibeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(location) = self.location() {
            write!(f, "{}: {} at {}", self.kind(), self.message(), location)
        } else {
            write!(f, "{}: {}", self.kind(), self.message())
        }
    }
}

impl std::error::Error for VibeError {}
