//! Compilation errors
//!
//! Every variant is fatal to the statement being analyzed, never to the
//! batch; sibling statements are still attempted.

use sqlgen_ast::Span;
use sqlgen_catalog::CatalogError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CompileError {
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error("function not found: {0}")]
    FunctionNotFound(String),

    #[error("{span}: expected 1 parameter to {func}; got {got}")]
    MarkerArgCount { func: String, got: usize, span: Span },

    #[error("{span}: expected parameter to {func} to be a constant or column reference")]
    MarkerArgShape { func: String, span: Span },

    #[error("{span}: column reference {name:?} is ambiguous")]
    AmbiguousColumn { name: String, span: Span },

    #[error("{span}: column {name:?} does not exist")]
    ColumnNotFound { name: String, span: Span },

    #[error("{span}: table {name:?} is not in the statement's FROM clause")]
    UnknownQualifier { name: String, span: Span },

    #[error("named value {name} has incompatible types: {first}, {second}")]
    IncompatibleTypes {
        name: String,
        first: String,
        second: String,
    },

    #[error("set operation arms project {left} and {right} columns")]
    SetOpMismatch { left: usize, right: usize },

    #[error("invalid query annotation: {0}")]
    InvalidMetadata(String),

    #[error("invalid query command: {0}")]
    InvalidCmd(String),

    #[error("invalid query name: {0}")]
    InvalidQueryName(String),

    #[error("duplicate query name: {0}")]
    DuplicateQueryName(String),

    #[error(":copyfrom requires an INSERT statement")]
    InvalidCopyFrom,
}

impl CompileError {
    /// The source location attached to the error, when one is known.
    pub fn span(&self) -> Option<Span> {
        match self {
            CompileError::MarkerArgCount { span, .. }
            | CompileError::MarkerArgShape { span, .. }
            | CompileError::AmbiguousColumn { span, .. }
            | CompileError::ColumnNotFound { span, .. }
            | CompileError::UnknownQualifier { span, .. } => Some(*span),
            _ => None,
        }
    }
}
