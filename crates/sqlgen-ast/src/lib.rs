//! sqlgen AST - statement and expression types
//!
//! Parser front-ends (one per SQL dialect) produce these nodes; the analyzer
//! consumes them without re-tokenizing the source text.

pub mod ast;

pub use ast::*;
