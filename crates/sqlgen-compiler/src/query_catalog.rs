//! Per-statement catalog overlay
//!
//! Wraps the immutable catalog with the statement's CTEs and embed targets.
//! Built fresh for every top-level statement and discarded afterwards, so CTE
//! names never leak across statements.

use crate::error::CompileError;
use crate::outputs;
use crate::MARKER_NAMESPACE;
use sqlgen_ast::{Expr, FuncName, Relation, Statement, Target};
use sqlgen_catalog::{Catalog, CatalogError};
use std::collections::HashMap;

/// A statement-scoped column: the catalog column plus everything resolution
/// learns about it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Column {
    pub name: String,
    pub data_type: String,
    pub not_null: bool,
    pub unsigned: bool,
    pub is_array: bool,
    pub length: Option<u32>,
    /// The owning relation, once resolved.
    pub table: Option<Relation>,
    /// True when the column stands for a named marker parameter.
    pub is_named_param: bool,
    /// True when the column's name derives from a function call.
    pub is_func_call: bool,
    /// True for `sqlc.slice` placeholders, expanded to a variadic IN-list at
    /// emission time.
    pub is_slice: bool,
    /// Set when the column represents an embedded sub-struct.
    pub embed_table: Option<Relation>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub rel: Relation,
    pub columns: Vec<Column>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    pub name: FuncName,
    pub return_type: Option<String>,
    pub return_not_null: bool,
}

pub struct QueryCatalog<'a> {
    catalog: &'a Catalog,
    ctes: HashMap<String, Table>,
    embeds: Vec<Relation>,
}

impl<'a> QueryCatalog<'a> {
    /// Resolve the statement's CTEs, in declaration order, against the
    /// overlay built so far. A CTE may reference earlier CTEs; forward or
    /// self references fall through to the catalog and fail there.
    pub fn build(catalog: &'a Catalog, stmt: &Statement) -> Result<Self, CompileError> {
        let mut qc = QueryCatalog {
            catalog,
            ctes: HashMap::new(),
            embeds: collect_embeds(stmt),
        };
        if let Some(with) = stmt.with_clause() {
            for cte in &with.ctes {
                let mut columns = outputs::select_columns(&qc, &cte.query)?;
                let rel = Relation::bare(cte.name.clone());
                for col in &mut columns {
                    col.table = Some(rel.clone());
                }
                qc.ctes.insert(cte.name.clone(), Table { rel, columns });
            }
        }
        // Embed targets must name a resolvable relation.
        for rel in &qc.embeds {
            qc.get_table(rel)?;
        }
        Ok(qc)
    }

    /// CTE overlay first (by bare name; CTEs are never schema-qualified),
    /// then the catalog, re-tagging catalog columns with their relation.
    pub fn get_table(&self, rel: &Relation) -> Result<Table, CompileError> {
        if rel.schema.is_none() {
            if let Some(cte) = self.ctes.get(&rel.name) {
                return Ok(cte.clone());
            }
        }
        let src = self.catalog.get_table(rel)?;
        let resolved = src.rel.clone();
        let columns = src
            .columns
            .iter()
            .map(|c| convert_column(&resolved, c))
            .collect();
        Ok(Table {
            rel: resolved,
            columns,
        })
    }

    pub fn get_func(&self, name: &FuncName) -> Result<Function, CompileError> {
        let funcs = self.catalog.list_funcs_by_name(name);
        match funcs.first() {
            Some(first) => Ok(Function {
                name: name.clone(),
                return_type: first.return_type.clone(),
                return_not_null: first.return_not_null,
            }),
            None => Err(CompileError::Catalog(CatalogError::FunctionNotFound(
                name.to_string(),
            ))),
        }
    }

    pub fn default_schema(&self) -> &str {
        &self.catalog.default_schema
    }

    /// The relations named by the statement's `sqlc.embed(...)` calls.
    pub fn embeds(&self) -> &[Relation] {
        &self.embeds
    }
}

fn convert_column(rel: &Relation, c: &sqlgen_catalog::Column) -> Column {
    Column {
        name: c.name.clone(),
        data_type: c.data_type.clone(),
        not_null: c.not_null,
        unsigned: c.is_unsigned,
        is_array: c.is_array,
        length: c.length,
        table: Some(rel.clone()),
        ..Column::default()
    }
}

fn collect_embeds(stmt: &Statement) -> Vec<Relation> {
    let mut embeds = Vec::new();
    let targets: &[Target] = match stmt {
        Statement::Select(s) => &s.targets,
        Statement::Insert(s) => &s.returning,
        Statement::Update(s) => &s.returning,
        Statement::Delete(s) => &s.returning,
    };
    for target in targets {
        if let Expr::Call(call) = &target.expr {
            if call.name.schema.as_deref() == Some(MARKER_NAMESPACE)
                && call.name.name == "embed"
            {
                if let Some(Expr::Column(col)) = call.args.first() {
                    embeds.push(Relation {
                        catalog: None,
                        schema: col.table.clone(),
                        name: col.name.clone(),
                    });
                }
            }
        }
    }
    embeds
}
