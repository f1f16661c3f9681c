//! The AST (spec.md §3 "AST"): two disjoint node families, expressions and
//! statements, as a tagged sum type with exhaustive matching — the
//! teacher's visitor-pattern AST collapses into this shape per spec.md §9.

use crate::common::token::Token;

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Str(String),
    Number(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal {
        token: Token,
        value: Literal,
    },
    Variable {
        name: Token,
    },
    Grouping {
        inner: Box<Expr>,
    },
    Binary {
        left:  Box<Expr>,
        op:    Token,
        right: Box<Expr>,
    },
    /// `equals` is the `=` token; spec.md §3 lists `Assign(name, value)`,
    /// but scenario 6 (spec.md §8) requires the immutable-reassignment
    /// error to point at the `=` of the offending line, so this carries
    /// that token too.
    Assign {
        name:   Token,
        equals: Token,
        value:  Box<Expr>,
    },
    Call {
        callee:    Box<Expr>,
        paren:     Token,
        arguments: Vec<Expr>,
    },
}

impl Expr {
    /// The token that best identifies this expression's source location.
    pub fn token(&self) -> &Token {
        match self {
            Expr::Literal { token, .. } => token,
            Expr::Variable { name } => name,
            Expr::Grouping { inner } => inner.token(),
            Expr::Binary { op, .. } => op,
            Expr::Assign { equals, .. } => equals,
            Expr::Call { paren, .. } => paren,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name:      Token,
    pub type_expr: Option<Token>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Import {
        path: Token,
    },
    VarDecl {
        name:        Token,
        type_expr:   Option<Token>,
        initializer: Option<Expr>,
        mutable:     bool,
        exported:    bool,
    },
    FunctionDef {
        name:        Token,
        params:      Vec<Param>,
        return_type: Option<Token>,
        body:        Vec<Stmt>,
        exported:    bool,
    },
    /// A `def` without a body: a header, used to declare a function that
    /// is provided externally (e.g. imported from a library).
    FunctionDecl {
        name:        Token,
        params:      Vec<Param>,
        return_type: Option<Token>,
        exported:    bool,
    },
    Return {
        keyword: Token,
        value:   Option<Expr>,
    },
    ExprStmt {
        expr: Expr,
    },
}
