//! sqlgen compiler
//!
//! Resolves parsed SQL statements against a catalog and produces the
//! language-agnostic generation model. Each statement compiles independently:
//! a failure is fatal to that statement only, and the batch output collects
//! every failure alongside the queries that succeeded.

use sqlgen_ast::{Span, Statement};
use sqlgen_catalog::Catalog;
use sqlgen_config::Settings;
use sqlgen_model::{CmdKind, GenerateResult, Identifier};
use std::collections::HashSet;
use tracing::debug;

pub mod error;
mod metadata;
mod names;
mod outputs;
mod params;
pub mod query_catalog;
mod result;
mod validate;

pub use error::CompileError;
pub use params::Parameter;
pub use query_catalog::{Column, QueryCatalog, Table};

/// Schema qualifier reserved for marker functions (`sqlc.arg` and friends).
pub const MARKER_NAMESPACE: &str = "sqlc";

/// One statement from the parser boundary: the root AST node plus the exact
/// source text and originating file name.
#[derive(Debug, Clone)]
pub struct ParsedStatement {
    pub ast: Statement,
    pub text: String,
    pub file: String,
}

/// A fully resolved statement, before model building.
#[derive(Debug, Clone)]
pub struct ResolvedQuery {
    pub name: String,
    pub cmd: CmdKind,
    pub text: String,
    pub file: String,
    pub comments: Vec<String>,
    pub params: Vec<Parameter>,
    pub columns: Vec<Column>,
    pub insert_into_table: Option<Identifier>,
}

/// A per-statement failure, reported alongside the rest of the batch.
#[derive(Debug)]
pub struct Failure {
    pub file: String,
    pub query: Option<String>,
    pub error: CompileError,
}

impl Failure {
    pub fn span(&self) -> Option<Span> {
        self.error.span()
    }
}

#[derive(Debug)]
pub struct CompileOutput {
    pub result: GenerateResult,
    pub failures: Vec<Failure>,
}

pub struct Compiler {
    catalog: Catalog,
    settings: Settings,
}

impl Compiler {
    pub fn new(catalog: Catalog, settings: Settings) -> Self {
        Self { catalog, settings }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Resolve a single statement. `Ok(None)` means the statement carries no
    /// query annotation and is skipped.
    pub fn compile_statement(
        &self,
        input: &ParsedStatement,
    ) -> Result<Option<ResolvedQuery>, CompileError> {
        let Some(meta) = metadata::parse(&input.text)? else {
            return Ok(None);
        };
        debug!(query = %meta.name, cmd = meta.cmd.as_str(), "compiling statement");

        validate::func_calls(&self.catalog, &self.settings, &input.ast)?;

        let insert_into_table = match (&input.ast, meta.cmd) {
            (Statement::Insert(insert), CmdKind::CopyFrom) => Some(Identifier {
                catalog: insert.relation.catalog.clone(),
                schema: insert.relation.schema.clone(),
                name: insert.relation.name.clone(),
            }),
            (_, CmdKind::CopyFrom) => return Err(CompileError::InvalidCopyFrom),
            _ => None,
        };

        let qc = QueryCatalog::build(&self.catalog, &input.ast)?;
        let params = params::resolve(&qc, &input.ast)?;
        let columns = outputs::output_columns(&qc, &input.ast)?;
        debug!(
            query = %meta.name,
            params = params.len(),
            columns = columns.len(),
            "statement resolved"
        );

        Ok(Some(ResolvedQuery {
            name: meta.name,
            cmd: meta.cmd,
            text: input.text.clone(),
            file: input.file.clone(),
            comments: meta.comments,
            params,
            columns,
            insert_into_table,
        }))
    }

    /// Compile a batch. Statement failures never abort the batch; they are
    /// returned together with the model built from the statements that
    /// succeeded.
    pub fn compile(&self, inputs: &[ParsedStatement]) -> CompileOutput {
        let mut failures = Vec::new();
        let mut resolved = Vec::new();
        let mut seen_names = HashSet::new();

        for input in inputs {
            match self.compile_statement(input) {
                Ok(Some(rq)) => {
                    if !seen_names.insert(rq.name.clone()) {
                        failures.push(Failure {
                            file: input.file.clone(),
                            query: Some(rq.name.clone()),
                            error: CompileError::DuplicateQueryName(rq.name),
                        });
                        continue;
                    }
                    resolved.push(rq);
                }
                Ok(None) => {}
                Err(error) => failures.push(Failure {
                    file: input.file.clone(),
                    query: None,
                    error,
                }),
            }
        }

        let builder = result::ResultBuilder::new(&self.catalog, &self.settings);
        let result = builder.build(resolved, &mut failures);
        CompileOutput { result, failures }
    }
}
