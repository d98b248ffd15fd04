//! Output-column resolution
//!
//! Determines the name, type, nullability, and origin table of every value a
//! statement projects. Wildcards expand in scope order; LEFT/RIGHT/FULL joins
//! null-extend the appropriate side; set operations intersect not-null flags
//! across arms.

use crate::error::CompileError;
use crate::query_catalog::{Column, QueryCatalog, Table};
use crate::MARKER_NAMESPACE;
use sqlgen_ast::{
    ColumnRef, Expr, FuncCall, JoinKind, Literal, Relation, SelectStmt, Span, Statement, TableRef,
    Target, UnaryOp,
};

/// One table visible to the statement, with its alias and whether a join
/// null-extends it.
pub(crate) struct ScopeEntry {
    pub table: Table,
    pub alias: Option<String>,
    pub null_extended: bool,
}

impl ScopeEntry {
    fn matches(&self, qualifier: &str) -> bool {
        match &self.alias {
            Some(alias) => alias == qualifier,
            None => self.table.rel.name == qualifier,
        }
    }
}

pub(crate) fn output_columns(
    qc: &QueryCatalog,
    stmt: &Statement,
) -> Result<Vec<Column>, CompileError> {
    match stmt {
        Statement::Select(s) => select_columns(qc, s),
        Statement::Insert(s) => {
            let scope = relation_scope(qc, &s.relation)?;
            targets_columns(qc, &s.returning, &scope)
        }
        Statement::Update(s) => {
            let scope = relation_scope(qc, &s.relation)?;
            targets_columns(qc, &s.returning, &scope)
        }
        Statement::Delete(s) => {
            let scope = relation_scope(qc, &s.relation)?;
            targets_columns(qc, &s.returning, &scope)
        }
    }
}

pub(crate) fn select_columns(
    qc: &QueryCatalog,
    s: &SelectStmt,
) -> Result<Vec<Column>, CompileError> {
    let scope = build_scope(qc, &s.from)?;
    let mut columns = targets_columns(qc, &s.targets, &scope)?;

    if let Some(op) = &s.set_op {
        let right = select_columns(qc, &op.right)?;
        if right.len() != columns.len() {
            return Err(CompileError::SetOpMismatch {
                left: columns.len(),
                right: right.len(),
            });
        }
        // Column names and types come from the left arm; a value is not-null
        // only when every arm guarantees it.
        for (left, right) in columns.iter_mut().zip(&right) {
            left.not_null = left.not_null && right.not_null;
        }
    }
    Ok(columns)
}

pub(crate) fn build_scope(
    qc: &QueryCatalog,
    from: &[TableRef],
) -> Result<Vec<ScopeEntry>, CompileError> {
    let mut scope = Vec::new();
    for table_ref in from {
        add_table_ref(qc, table_ref, false, &mut scope)?;
    }
    Ok(scope)
}

fn add_table_ref(
    qc: &QueryCatalog,
    table_ref: &TableRef,
    null_extended: bool,
    scope: &mut Vec<ScopeEntry>,
) -> Result<(), CompileError> {
    match table_ref {
        TableRef::Relation { rel, alias } => {
            let table = qc.get_table(rel)?;
            scope.push(ScopeEntry {
                table,
                alias: alias.clone(),
                null_extended,
            });
            Ok(())
        }
        TableRef::Join(join) => {
            let (left_null, right_null) = match join.kind {
                JoinKind::Left => (false, true),
                JoinKind::Right => (true, false),
                JoinKind::Full => (true, true),
                JoinKind::Inner | JoinKind::Cross => (false, false),
            };
            add_table_ref(qc, &join.left, null_extended || left_null, scope)?;
            add_table_ref(qc, &join.right, null_extended || right_null, scope)
        }
    }
}

fn relation_scope(qc: &QueryCatalog, rel: &Relation) -> Result<Vec<ScopeEntry>, CompileError> {
    let table = qc.get_table(rel)?;
    Ok(vec![ScopeEntry {
        table,
        alias: None,
        null_extended: false,
    }])
}

fn targets_columns(
    qc: &QueryCatalog,
    targets: &[Target],
    scope: &[ScopeEntry],
) -> Result<Vec<Column>, CompileError> {
    let mut out = Vec::new();
    for target in targets {
        match &target.expr {
            Expr::Wildcard { table: None } => {
                for entry in scope {
                    expand_entry(entry, &mut out);
                }
            }
            Expr::Wildcard { table: Some(qualifier) } => {
                let entry = scope
                    .iter()
                    .find(|e| e.matches(qualifier))
                    .ok_or_else(|| CompileError::UnknownQualifier {
                        name: qualifier.clone(),
                        span: target.span,
                    })?;
                expand_entry(entry, &mut out);
            }
            expr => {
                let mut column = resolve_expr(qc, expr, scope, target.span)?;
                if let Some(alias) = &target.alias {
                    column.name = alias.clone();
                }
                out.push(column);
            }
        }
    }
    Ok(out)
}

fn expand_entry(entry: &ScopeEntry, out: &mut Vec<Column>) {
    for column in &entry.table.columns {
        let mut column = column.clone();
        column.not_null = column.not_null && !entry.null_extended;
        out.push(column);
    }
}

fn resolve_expr(
    qc: &QueryCatalog,
    expr: &Expr,
    scope: &[ScopeEntry],
    span: Span,
) -> Result<Column, CompileError> {
    match expr {
        Expr::Column(col_ref) => find_column(scope, col_ref),
        Expr::Literal { value } => Ok(literal_column(value)),
        Expr::Param { .. } => Ok(Column {
            data_type: "any".to_string(),
            ..Column::default()
        }),
        Expr::Cast { expr, type_name } => {
            let mut inner = resolve_expr(qc, expr, scope, span)?;
            inner.data_type = type_name.clone();
            Ok(inner)
        }
        Expr::Call(call) if call.name.schema.as_deref() == Some(MARKER_NAMESPACE) => {
            marker_column(qc, call)
        }
        Expr::Call(call) => {
            let name = call.name.name.clone();
            match qc.get_func(&call.name) {
                Ok(func) => Ok(Column {
                    name,
                    data_type: func.return_type.unwrap_or_else(|| "any".to_string()),
                    not_null: func.return_not_null,
                    is_func_call: true,
                    ..Column::default()
                }),
                // Unresolved calls were already vetted by the validator;
                // lenient mode leaves them untyped.
                Err(_) => Ok(Column {
                    name,
                    data_type: "any".to_string(),
                    is_func_call: true,
                    ..Column::default()
                }),
            }
        }
        Expr::Binary { op, left, right } => {
            if op.is_predicate() {
                Ok(Column {
                    data_type: "bool".to_string(),
                    not_null: operands_not_null(qc, scope, [left, right], span),
                    ..Column::default()
                })
            } else {
                let base = match (left.as_ref(), right.as_ref()) {
                    (Expr::Column(_), _) => resolve_expr(qc, left, scope, span)?,
                    (_, Expr::Column(_)) => resolve_expr(qc, right, scope, span)?,
                    _ => Column {
                        data_type: "any".to_string(),
                        ..Column::default()
                    },
                };
                Ok(Column {
                    name: String::new(),
                    data_type: base.data_type,
                    not_null: operands_not_null(qc, scope, [left, right], span),
                    ..Column::default()
                })
            }
        }
        Expr::Unary { op, expr } => match op {
            UnaryOp::Not => Ok(Column {
                data_type: "bool".to_string(),
                not_null: operands_not_null(qc, scope, [expr], span),
                ..Column::default()
            }),
            UnaryOp::Neg => {
                let mut inner = resolve_expr(qc, expr, scope, span)?;
                inner.name = String::new();
                Ok(inner)
            }
        },
        Expr::InList { .. } | Expr::IsNull { .. } => Ok(Column {
            data_type: "bool".to_string(),
            not_null: true,
            ..Column::default()
        }),
        Expr::Wildcard { .. } => Ok(Column {
            data_type: "any".to_string(),
            ..Column::default()
        }),
    }
}

fn literal_column(value: &Literal) -> Column {
    let (data_type, not_null) = match value {
        Literal::Null => ("any", false),
        Literal::Bool(_) => ("bool", true),
        Literal::Int(_) => ("int", true),
        Literal::Float(_) => ("float", true),
        Literal::String(_) => ("text", true),
    };
    Column {
        data_type: data_type.to_string(),
        not_null,
        ..Column::default()
    }
}

fn marker_column(qc: &QueryCatalog, call: &FuncCall) -> Result<Column, CompileError> {
    match call.name.name.as_str() {
        "embed" => {
            let rel = match call.args.first() {
                Some(Expr::Column(col)) => Relation {
                    catalog: None,
                    schema: col.table.clone(),
                    name: col.name.clone(),
                },
                _ => {
                    return Err(CompileError::MarkerArgShape {
                        func: call.name.to_string(),
                        span: call.span,
                    })
                }
            };
            let table = qc.get_table(&rel)?;
            Ok(Column {
                name: table.rel.name.clone(),
                not_null: true,
                table: Some(table.rel.clone()),
                embed_table: Some(table.rel),
                ..Column::default()
            })
        }
        name => {
            // arg/narg/slice in a projection position: an untyped named value.
            let bound = match call.args.first() {
                Some(Expr::Column(col)) => col.name.clone(),
                Some(Expr::Literal {
                    value: Literal::String(s),
                }) => s.clone(),
                _ => String::new(),
            };
            Ok(Column {
                name: bound,
                data_type: "any".to_string(),
                not_null: name == "arg",
                is_named_param: true,
                is_slice: name == "slice",
                ..Column::default()
            })
        }
    }
}

fn operands_not_null<'e>(
    qc: &QueryCatalog,
    scope: &[ScopeEntry],
    operands: impl IntoIterator<Item = &'e Box<Expr>>,
    span: Span,
) -> bool {
    operands.into_iter().all(|e| {
        resolve_expr(qc, e, scope, span)
            .map(|c| c.not_null)
            .unwrap_or(true)
    })
}

fn find_column(scope: &[ScopeEntry], col_ref: &ColumnRef) -> Result<Column, CompileError> {
    let mut found: Option<Column> = None;
    for entry in scope {
        if let Some(qualifier) = &col_ref.table {
            if !entry.matches(qualifier) {
                continue;
            }
        }
        for column in &entry.table.columns {
            if column.name != col_ref.name {
                continue;
            }
            if found.is_some() {
                return Err(CompileError::AmbiguousColumn {
                    name: col_ref.name.clone(),
                    span: col_ref.span,
                });
            }
            let mut column = column.clone();
            column.not_null = column.not_null && !entry.null_extended;
            found = Some(column);
        }
    }
    found.ok_or_else(|| CompileError::ColumnNotFound {
        name: col_ref.name.clone(),
        span: col_ref.span,
    })
}
