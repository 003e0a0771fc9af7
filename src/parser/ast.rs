//! Abstract Syntax Tree definitions
//!
//! The AST is a single-owner tree: every node owns its children exclusively,
//! so dropping the root (or any partial subtree on a parse failure) releases
//! everything exactly once. The analyzer mutates nodes in place, filling the
//! `resolved`/`inferred` slots that code generation later relies on.

use crate::error::SourceLocation;
use std::fmt;

/// Root AST node representing a complete program
#[derive(Debug, Clone, PartialEq)]
pub struct Ast {
    pub items: Vec<Item>,
}

/// Top-level declaration
#[derive(Debug, Clone, PartialEq)]
pub enum Item {
    Function(FunctionDecl),
    TypeAlias(TypeAliasDecl),
}

impl Item {
    pub fn name(&self) -> &str {
        match self {
            Item::Function(f) => &f.name,
            Item::TypeAlias(t) => &t.name,
        }
    }

    pub fn location(&self) -> &SourceLocation {
        match self {
            Item::Function(f) => &f.location,
            Item::TypeAlias(t) => &t.location,
        }
    }
}

/// Function declaration (ordinary or model-backed, depending on the body)
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDecl {
    pub name: String,
    pub params: Vec<Param>,
    pub return_type: Option<TypeExpr>,
    pub body: FunctionBody,
    pub location: SourceLocation,
}

impl FunctionDecl {
    /// Whether this function delegates execution to the model bridge
    pub fn is_model_backed(&self) -> bool {
        matches!(self.body, FunctionBody::Prompt { .. })
    }
}

/// Function parameter with its declared type
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    pub ty: TypeExpr,
    pub location: SourceLocation,
}

/// Body of a function declaration
#[derive(Debug, Clone, PartialEq)]
pub enum FunctionBody {
    /// Ordinary compiled body
    Block(Vec<Stmt>),
    /// Model-backed: a prompt template with `{param}` placeholders
    Prompt {
        template: String,
        location: SourceLocation,
    },
}

/// Type alias declaration: `type Name = Target;`
#[derive(Debug, Clone, PartialEq)]
pub struct TypeAliasDecl {
    pub name: String,
    pub target: TypeExpr,
    pub location: SourceLocation,
}

/// A type as written in source, before resolution
#[derive(Debug, Clone, PartialEq)]
pub struct TypeExpr {
    pub kind: TypeExprKind,
    /// Filled in by the semantic analyzer
    pub resolved: Option<Type>,
    pub location: SourceLocation,
}

impl TypeExpr {
    pub fn named(name: impl Into<String>, location: SourceLocation) -> Self {
        Self {
            kind: TypeExprKind::Named(name.into()),
            resolved: None,
            location,
        }
    }

    pub fn meaning(inner: TypeExpr, hint: impl Into<String>, location: SourceLocation) -> Self {
        Self {
            kind: TypeExprKind::Meaning {
                inner: Box::new(inner),
                hint: hint.into(),
            },
            resolved: None,
            location,
        }
    }

    /// The natural-language hint, if this is (or wraps) a Meaning type
    pub fn meaning_hint(&self) -> Option<&str> {
        match &self.kind {
            TypeExprKind::Meaning { hint, .. } => Some(hint),
            TypeExprKind::Named(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TypeExprKind {
    /// `Int`, `String`, ... or a declared alias name
    Named(String),
    /// `Meaning<T>("natural language hint")`
    Meaning { inner: Box<TypeExpr>, hint: String },
}

/// Statement node
#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    /// Variable binding: `let x: Int = 42;`
    Let {
        name: String,
        annotation: Option<TypeExpr>,
        /// Filled in by the analyzer when no annotation is written
        inferred: Option<Type>,
        value: Expr,
        location: SourceLocation,
    },

    /// Expression statement
    Expression { expr: Expr, location: SourceLocation },

    /// If statement
    If {
        condition: Expr,
        then_branch: Vec<Stmt>,
        else_branch: Option<Vec<Stmt>>,
        location: SourceLocation,
    },

    /// While loop
    While {
        condition: Expr,
        body: Vec<Stmt>,
        location: SourceLocation,
    },

    /// C-style for loop
    For {
        initializer: Option<Box<Stmt>>,
        condition: Option<Expr>,
        increment: Option<Expr>,
        body: Vec<Stmt>,
        location: SourceLocation,
    },

    /// Return statement
    Return {
        value: Option<Expr>,
        location: SourceLocation,
    },

    /// Break statement
    Break { location: SourceLocation },

    /// Continue statement
    Continue { location: SourceLocation },

    /// Block statement
    Block {
        statements: Vec<Stmt>,
        location: SourceLocation,
    },
}

/// Expression node
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Literal value
    Literal {
        value: Literal,
        location: SourceLocation,
    },

    /// Variable reference
    Variable {
        name: String,
        location: SourceLocation,
    },

    /// Assignment to an existing binding
    Assign {
        name: String,
        value: Box<Expr>,
        location: SourceLocation,
    },

    /// Binary operation
    Binary {
        left: Box<Expr>,
        operator: BinaryOp,
        right: Box<Expr>,
        location: SourceLocation,
    },

    /// Logical operation with short-circuit semantics
    Logical {
        left: Box<Expr>,
        operator: LogicalOp,
        right: Box<Expr>,
        location: SourceLocation,
    },

    /// Unary operation
    Unary {
        operator: UnaryOp,
        operand: Box<Expr>,
        location: SourceLocation,
    },

    /// Call of a top-level function
    Call {
        callee: String,
        arguments: Vec<Expr>,
        location: SourceLocation,
    },
}

impl Expr {
    pub fn location(&self) -> &SourceLocation {
        match self {
            Expr::Literal { location, .. }
            | Expr::Variable { location, .. }
            | Expr::Assign { location, .. }
            | Expr::Binary { location, .. }
            | Expr::Logical { location, .. }
            | Expr::Unary { location, .. }
            | Expr::Call { location, .. } => location,
        }
    }
}

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
}

impl BinaryOp {
    pub fn is_arithmetic(&self) -> bool {
        matches!(
            self,
            Self::Add | Self::Subtract | Self::Multiply | Self::Divide | Self::Modulo
        )
    }

    pub fn is_comparison(&self) -> bool {
        !self.is_arithmetic()
    }
}

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Negate,
    Not,
}

/// Logical operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
}

/// Literal value
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Integer(i64),
    Float(f64),
    String(String),
    Boolean(bool),
    Null,
}

/// A fully resolved Vibe type
///
/// `Number` is the generic numeric kind: an f64-backed value used chiefly at
/// the model boundary, where a program does not pin down Int vs Float.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Type {
    Int,
    Float,
    String,
    Bool,
    Null,
    Number,
}

impl Type {
    /// Look up a built-in type by its source-level name
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "Int" => Some(Self::Int),
            "Float" => Some(Self::Float),
            "String" => Some(Self::String),
            "Bool" => Some(Self::Bool),
            "Null" => Some(Self::Null),
            "Number" => Some(Self::Number),
            _ => None,
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Self::Int | Self::Float | Self::Number)
    }

    /// Whether a value of type `from` may be passed where `self` is declared
    pub fn accepts(&self, from: Type) -> bool {
        if *self == from {
            return true;
        }
        match (self, from) {
            (Type::Float, Type::Int) => true,
            (Type::Number, Type::Int) | (Type::Number, Type::Float) => true,
            _ => false,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Int => "Int",
            Self::Float => "Float",
            Self::String => "String",
            Self::Bool => "Bool",
            Self::Null => "Null",
            Self::Number => "Number",
        };
        write!(f, "{}", name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_from_name() {
        assert_eq!(Type::from_name("Int"), Some(Type::Int));
        assert_eq!(Type::from_name("Number"), Some(Type::Number));
        assert_eq!(Type::from_name("Temperature"), None);
    }

    #[test]
    fn test_type_accepts_widening() {
        assert!(Type::Float.accepts(Type::Int));
        assert!(Type::Number.accepts(Type::Int));
        assert!(Type::Number.accepts(Type::Float));
        assert!(!Type::Int.accepts(Type::Float));
        assert!(!Type::String.accepts(Type::Int));
        assert!(Type::Bool.accepts(Type::Bool));
    }

    #[test]
    fn test_model_backed_detection() {
        let loc = crate::error::SourceLocation::at(1, 1);
        let f = FunctionDecl {
            name: "classify".to_string(),
            params: vec![],
            return_type: None,
            body: FunctionBody::Prompt {
                template: "Is this positive? {text}".to_string(),
                location: loc.clone(),
            },
            location: loc,
        };
        assert!(f.is_model_backed());
    }
}
