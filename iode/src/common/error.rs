//! The error model shared by every compile stage and the VM.
//!
//! Grounded on the teacher's `compiler::syntax::Syntax` (a reason string
//! plus one or more located `Note`s); this reimplementation collapses that
//! into one `thiserror`-derived enum, one variant per kind named in
//! spec.md §7, since every stage here only ever attaches a single note.

use std::fmt;

/// A 1-based source location, the column of the first character of a
/// lexeme or token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Location {
    pub line:   usize,
    pub column: usize,
}

impl Location {
    pub fn new(line: usize, column: usize) -> Self { Location { line, column } }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum IodeError {
    #[error("{location}: lexer error: {message}")]
    Lexer { message: String, location: Location },

    #[error("{location}: parse error: {message}")]
    Parser { message: String, location: Location },

    #[error("{location}: {message}")]
    Semantic { message: String, location: Location },

    #[error("codegen error: {message}")]
    Generator { message: String },

    #[error("object I/O error: {message}")]
    ObjectIo { message: String },

    #[error("runtime error: {message}")]
    Runtime { message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl IodeError {
    pub fn lexer(message: impl Into<String>, location: Location) -> Self {
        IodeError::Lexer { message: message.into(), location }
    }

    pub fn parser(message: impl Into<String>, location: Location) -> Self {
        IodeError::Parser { message: message.into(), location }
    }

    pub fn semantic(message: impl Into<String>, location: Location) -> Self {
        IodeError::Semantic { message: message.into(), location }
    }

    pub fn generator(message: impl Into<String>) -> Self {
        IodeError::Generator { message: message.into() }
    }

    pub fn object_io(message: impl Into<String>) -> Self {
        IodeError::ObjectIo { message: message.into() }
    }

    pub fn runtime(message: impl Into<String>) -> Self {
        IodeError::Runtime { message: message.into() }
    }
}
