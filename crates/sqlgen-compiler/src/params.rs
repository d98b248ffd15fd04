//! Parameter resolution
//!
//! Collects every placeholder and marker call in a statement and binds each
//! to a column where the surrounding context names one: comparison operands,
//! IN-lists, INSERT value positions, UPDATE assignments, LIMIT/OFFSET.
//! Repeated references to one placeholder number collapse into a single
//! parameter; named markers share one number per distinct name.

use crate::error::CompileError;
use crate::outputs::{self, ScopeEntry};
use crate::query_catalog::{Column, QueryCatalog};
use crate::MARKER_NAMESPACE;
use sqlgen_ast::{
    Assignment, BinaryOp, Expr, FuncCall, InsertSource, Literal, SelectStmt, Statement, TableRef,
};
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub number: u32,
    pub column: Column,
}

pub(crate) fn resolve(qc: &QueryCatalog, stmt: &Statement) -> Result<Vec<Parameter>, CompileError> {
    let mut collector = Collector {
        qc,
        params: BTreeMap::new(),
        named: HashMap::new(),
        next_number: max_explicit_number(stmt) + 1,
    };
    collector.statement(stmt)?;
    Ok(collector
        .params
        .into_iter()
        .map(|(number, column)| Parameter { number, column })
        .collect())
}

struct Collector<'a, 'c> {
    qc: &'c QueryCatalog<'a>,
    params: BTreeMap<u32, Column>,
    named: HashMap<String, u32>,
    next_number: u32,
}

impl Collector<'_, '_> {
    fn statement(&mut self, stmt: &Statement) -> Result<(), CompileError> {
        if let Some(with) = stmt.with_clause() {
            for cte in &with.ctes {
                self.select(&cte.query)?;
            }
        }
        match stmt {
            Statement::Select(s) => self.select_body(s),
            Statement::Insert(s) => {
                let scope = outputs::build_scope(
                    self.qc,
                    &[TableRef::relation(s.relation.clone())],
                )?;
                match &s.source {
                    InsertSource::Values { rows } => {
                        for row in rows {
                            for (column_name, expr) in s.columns.iter().zip(row) {
                                let bound = scope_column(&scope, column_name);
                                self.value(expr, bound, &scope)?;
                            }
                        }
                    }
                    InsertSource::Query { query } => self.select(query)?,
                    InsertSource::DefaultValues => {}
                }
                for target in &s.returning {
                    self.value(&target.expr, None, &scope)?;
                }
                Ok(())
            }
            Statement::Update(s) => {
                let scope = outputs::build_scope(
                    self.qc,
                    &[TableRef::relation(s.relation.clone())],
                )?;
                for Assignment { column, value } in &s.assignments {
                    let bound = scope_column(&scope, column);
                    self.value(value, bound, &scope)?;
                }
                if let Some(selection) = &s.selection {
                    self.condition(selection, &scope)?;
                }
                for target in &s.returning {
                    self.value(&target.expr, None, &scope)?;
                }
                Ok(())
            }
            Statement::Delete(s) => {
                let scope = outputs::build_scope(
                    self.qc,
                    &[TableRef::relation(s.relation.clone())],
                )?;
                if let Some(selection) = &s.selection {
                    self.condition(selection, &scope)?;
                }
                for target in &s.returning {
                    self.value(&target.expr, None, &scope)?;
                }
                Ok(())
            }
        }
    }

    fn select(&mut self, s: &SelectStmt) -> Result<(), CompileError> {
        if let Some(with) = &s.with {
            for cte in &with.ctes {
                self.select(&cte.query)?;
            }
        }
        self.select_body(s)
    }

    fn select_body(&mut self, s: &SelectStmt) -> Result<(), CompileError> {
        let scope = outputs::build_scope(self.qc, &s.from)?;
        for table_ref in &s.from {
            self.join_conditions(table_ref, &scope)?;
        }
        for target in &s.targets {
            self.value(&target.expr, None, &scope)?;
        }
        if let Some(selection) = &s.selection {
            self.condition(selection, &scope)?;
        }
        for expr in &s.group_by {
            self.value(expr, None, &scope)?;
        }
        if let Some(having) = &s.having {
            self.condition(having, &scope)?;
        }
        self.row_count(&s.limit, "limit", &scope)?;
        self.row_count(&s.offset, "offset", &scope)?;
        if let Some(op) = &s.set_op {
            self.select(&op.right)?;
        }
        Ok(())
    }

    fn join_conditions(
        &mut self,
        table_ref: &TableRef,
        scope: &[ScopeEntry],
    ) -> Result<(), CompileError> {
        if let TableRef::Join(join) = table_ref {
            self.join_conditions(&join.left, scope)?;
            self.join_conditions(&join.right, scope)?;
            if let Some(on) = &join.on {
                self.condition(on, scope)?;
            }
        }
        Ok(())
    }

    /// `LIMIT`/`OFFSET` placeholders are integer row counts.
    fn row_count(
        &mut self,
        expr: &Option<Expr>,
        name: &str,
        scope: &[ScopeEntry],
    ) -> Result<(), CompileError> {
        let Some(expr) = expr else { return Ok(()) };
        if as_placeholder(expr).is_some() {
            let column = Column {
                name: name.to_string(),
                data_type: "integer".to_string(),
                not_null: true,
                ..Column::default()
            };
            self.bind(expr, Some(column))
        } else {
            self.value(expr, None, scope)
        }
    }

    /// Predicate context: comparisons bind a placeholder on one side to the
    /// column on the other.
    fn condition(&mut self, expr: &Expr, scope: &[ScopeEntry]) -> Result<(), CompileError> {
        match expr {
            Expr::Binary { op, left, right } => {
                if matches!(op, BinaryOp::And | BinaryOp::Or) {
                    self.condition(left, scope)?;
                    return self.condition(right, scope);
                }
                let left_bound = bound_column(scope, right);
                let right_bound = bound_column(scope, left);
                self.value(left, left_bound, scope)?;
                self.value(right, right_bound, scope)
            }
            Expr::InList { expr: lhs, list, .. } => {
                let bound = bound_column(scope, lhs);
                self.value(lhs, None, scope)?;
                for item in list {
                    self.value(item, bound.clone(), scope)?;
                }
                Ok(())
            }
            Expr::Unary { expr, .. } => self.condition(expr, scope),
            Expr::IsNull { expr, .. } => self.value(expr, None, scope),
            other => self.value(other, None, scope),
        }
    }

    /// Walk an expression, binding any placeholder to `bound` when present.
    fn value(
        &mut self,
        expr: &Expr,
        bound: Option<Column>,
        scope: &[ScopeEntry],
    ) -> Result<(), CompileError> {
        if as_placeholder(expr).is_some() {
            return self.bind(expr, bound);
        }
        match expr {
            Expr::Binary { .. } => self.condition(expr, scope),
            Expr::Unary { expr, .. } | Expr::IsNull { expr, .. } => {
                self.value(expr, None, scope)
            }
            Expr::Cast { expr, .. } => self.value(expr, None, scope),
            Expr::InList { expr, list, .. } => {
                self.value(expr, None, scope)?;
                for item in list {
                    self.value(item, None, scope)?;
                }
                Ok(())
            }
            Expr::Call(call) => {
                for arg in &call.args {
                    self.value(arg, None, scope)?;
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    fn bind(&mut self, expr: &Expr, bound: Option<Column>) -> Result<(), CompileError> {
        let Some(placeholder) = as_placeholder(expr) else {
            return Ok(());
        };
        let column = bound.unwrap_or_else(|| Column {
            data_type: "any".to_string(),
            ..Column::default()
        });

        match placeholder {
            Placeholder::Positional { number, cast } => {
                let mut column = column;
                if let Some(cast) = cast {
                    column.data_type = cast;
                    if column.name.is_empty() {
                        column.not_null = true;
                    }
                }
                self.insert(number, column);
            }
            Placeholder::Marker { call, cast } => {
                let mut column = column;
                let name = marker_arg_name(call);
                if !name.is_empty() {
                    column.name = name.clone();
                }
                column.is_named_param = true;
                match call.name.name.as_str() {
                    "narg" => column.not_null = false,
                    "slice" => column.is_slice = true,
                    _ => {}
                }
                if let Some(cast) = cast {
                    column.data_type = cast;
                }
                let number = match self.named.get(&name) {
                    Some(&n) if !name.is_empty() => n,
                    _ => {
                        let n = self.next_number;
                        self.next_number += 1;
                        if !name.is_empty() {
                            self.named.insert(name, n);
                        }
                        n
                    }
                };
                self.insert(number, column);
            }
        }
        Ok(())
    }

    fn insert(&mut self, number: u32, column: Column) {
        match self.params.get_mut(&number) {
            // The first binding with a real name wins for repeated
            // references to one placeholder.
            Some(existing) => {
                if existing.name.is_empty() && !column.name.is_empty() {
                    *existing = column;
                }
            }
            None => {
                self.params.insert(number, column);
            }
        }
    }
}

enum Placeholder<'e> {
    Positional { number: u32, cast: Option<String> },
    Marker { call: &'e FuncCall, cast: Option<String> },
}

/// A placeholder expression, seen through at most one cast.
fn as_placeholder(expr: &Expr) -> Option<Placeholder<'_>> {
    match expr {
        Expr::Param { number, .. } => Some(Placeholder::Positional {
            number: *number,
            cast: None,
        }),
        Expr::Call(call)
            if call.name.schema.as_deref() == Some(MARKER_NAMESPACE)
                && matches!(call.name.name.as_str(), "arg" | "narg" | "slice") =>
        {
            Some(Placeholder::Marker { call, cast: None })
        }
        Expr::Cast { expr, type_name } => match as_placeholder(expr) {
            Some(Placeholder::Positional { number, .. }) => Some(Placeholder::Positional {
                number,
                cast: Some(type_name.clone()),
            }),
            Some(Placeholder::Marker { call, .. }) => Some(Placeholder::Marker {
                call,
                cast: Some(type_name.clone()),
            }),
            None => None,
        },
        _ => None,
    }
}

fn marker_arg_name(call: &FuncCall) -> String {
    match call.args.first() {
        Some(Expr::Column(col)) => col.name.clone(),
        Some(Expr::Literal {
            value: Literal::String(s),
        }) => s.clone(),
        _ => String::new(),
    }
}

/// The column an opposite comparison operand names, if it resolves
/// unambiguously in the statement's scope.
fn bound_column(scope: &[ScopeEntry], expr: &Expr) -> Option<Column> {
    match expr {
        Expr::Column(col_ref) => find_in_scope(scope, col_ref),
        Expr::Cast { expr, type_name } => {
            let mut column = bound_column(scope, expr)?;
            column.data_type = type_name.clone();
            Some(column)
        }
        _ => None,
    }
}

fn find_in_scope(scope: &[ScopeEntry], col_ref: &sqlgen_ast::ColumnRef) -> Option<Column> {
    let mut found = None;
    for entry in scope {
        if let Some(qualifier) = &col_ref.table {
            match &entry.alias {
                Some(alias) if alias == qualifier => {}
                None if entry.table.rel.name == *qualifier => {}
                _ => continue,
            }
        }
        for column in &entry.table.columns {
            if column.name == col_ref.name {
                if found.is_some() {
                    return None;
                }
                found = Some(column.clone());
            }
        }
    }
    found
}

fn scope_column(scope: &[ScopeEntry], name: &str) -> Option<Column> {
    scope
        .iter()
        .flat_map(|entry| entry.table.columns.iter())
        .find(|column| column.name == name)
        .cloned()
}

fn max_explicit_number(stmt: &Statement) -> u32 {
    let mut max = 0;
    for_each_expr(stmt, &mut |expr| {
        if let Expr::Param { number, .. } = expr {
            max = max.max(*number);
        }
    });
    max
}

fn for_each_expr(stmt: &Statement, f: &mut impl FnMut(&Expr)) {
    fn walk_expr(expr: &Expr, f: &mut impl FnMut(&Expr)) {
        f(expr);
        match expr {
            Expr::Binary { left, right, .. } => {
                walk_expr(left, f);
                walk_expr(right, f);
            }
            Expr::Unary { expr, .. } | Expr::Cast { expr, .. } | Expr::IsNull { expr, .. } => {
                walk_expr(expr, f)
            }
            Expr::InList { expr, list, .. } => {
                walk_expr(expr, f);
                for item in list {
                    walk_expr(item, f);
                }
            }
            Expr::Call(call) => {
                for arg in &call.args {
                    walk_expr(arg, f);
                }
            }
            _ => {}
        }
    }

    fn walk_select(s: &SelectStmt, f: &mut impl FnMut(&Expr)) {
        if let Some(with) = &s.with {
            for cte in &with.ctes {
                walk_select(&cte.query, f);
            }
        }
        for target in &s.targets {
            walk_expr(&target.expr, f);
        }
        for table_ref in &s.from {
            walk_table_ref(table_ref, f);
        }
        for expr in s
            .selection
            .iter()
            .chain(&s.having)
            .chain(&s.limit)
            .chain(&s.offset)
        {
            walk_expr(expr, f);
        }
        for expr in &s.group_by {
            walk_expr(expr, f);
        }
        if let Some(op) = &s.set_op {
            walk_select(&op.right, f);
        }
    }

    fn walk_table_ref(table_ref: &TableRef, f: &mut impl FnMut(&Expr)) {
        if let TableRef::Join(join) = table_ref {
            walk_table_ref(&join.left, f);
            walk_table_ref(&join.right, f);
            if let Some(on) = &join.on {
                walk_expr(on, f);
            }
        }
    }

    if let Some(with) = stmt.with_clause() {
        for cte in &with.ctes {
            walk_select(&cte.query, f);
        }
    }
    match stmt {
        Statement::Select(s) => walk_select(s, f),
        Statement::Insert(s) => {
            match &s.source {
                InsertSource::Values { rows } => {
                    for row in rows {
                        for expr in row {
                            walk_expr(expr, f);
                        }
                    }
                }
                InsertSource::Query { query } => walk_select(query, f),
                InsertSource::DefaultValues => {}
            }
            for target in &s.returning {
                walk_expr(&target.expr, f);
            }
        }
        Statement::Update(s) => {
            for assignment in &s.assignments {
                walk_expr(&assignment.value, f);
            }
            for expr in &s.selection {
                walk_expr(expr, f);
            }
            for target in &s.returning {
                walk_expr(&target.expr, f);
            }
        }
        Statement::Delete(s) => {
            for expr in &s.selection {
                walk_expr(expr, f);
            }
            for target in &s.returning {
                walk_expr(&target.expr, f);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlgen_ast::{FuncName, Relation, Target};
    use sqlgen_catalog::{Catalog, Column as CatColumn};

    fn catalog() -> Catalog {
        let mut catalog = Catalog::new("public");
        catalog
            .create_table(
                Relation::bare("accounts"),
                vec![
                    CatColumn::new("id", "bigint", true),
                    CatColumn::new("email", "text", false),
                ],
            )
            .unwrap();
        catalog
    }

    fn params_for(catalog: &Catalog, stmt: &Statement) -> Vec<Parameter> {
        let qc = QueryCatalog::build(catalog, stmt).unwrap();
        resolve(&qc, stmt).unwrap()
    }

    fn where_select(selection: Expr) -> Statement {
        Statement::Select(SelectStmt {
            targets: vec![Target::expr(Expr::Wildcard { table: None })],
            from: vec![TableRef::relation(Relation::bare("accounts"))],
            selection: Some(selection),
            ..SelectStmt::default()
        })
    }

    #[test]
    fn test_comparison_binds_column() {
        let catalog = catalog();
        let stmt = where_select(Expr::Binary {
            op: BinaryOp::Eq,
            left: Box::new(Expr::column("id")),
            right: Box::new(Expr::param(1)),
        });
        let params = params_for(&catalog, &stmt);
        assert_eq!(params.len(), 1);
        assert_eq!(params[0].number, 1);
        assert_eq!(params[0].column.name, "id");
        assert_eq!(params[0].column.data_type, "bigint");
        assert!(params[0].column.not_null);
    }

    #[test]
    fn test_repeated_placeholder_collapses() {
        let catalog = catalog();
        let stmt = where_select(Expr::Binary {
            op: BinaryOp::Or,
            left: Box::new(Expr::Binary {
                op: BinaryOp::Eq,
                left: Box::new(Expr::column("id")),
                right: Box::new(Expr::param(1)),
            }),
            right: Box::new(Expr::Binary {
                op: BinaryOp::Eq,
                left: Box::new(Expr::column("id")),
                right: Box::new(Expr::param(1)),
            }),
        });
        let params = params_for(&catalog, &stmt);
        assert_eq!(params.len(), 1);
    }

    #[test]
    fn test_named_markers_share_number_per_name() {
        let catalog = catalog();
        let arg = |name: &str| {
            Expr::Call(FuncCall::new(
                FuncName::qualified("sqlc", "arg"),
                vec![Expr::column(name)],
            ))
        };
        let stmt = where_select(Expr::Binary {
            op: BinaryOp::And,
            left: Box::new(Expr::Binary {
                op: BinaryOp::Eq,
                left: Box::new(Expr::column("email")),
                right: Box::new(arg("email")),
            }),
            right: Box::new(Expr::Binary {
                op: BinaryOp::Eq,
                left: Box::new(Expr::column("email")),
                right: Box::new(arg("email")),
            }),
        });
        let params = params_for(&catalog, &stmt);
        assert_eq!(params.len(), 1);
        assert_eq!(params[0].column.name, "email");
        assert!(params[0].column.is_named_param);
    }

    #[test]
    fn test_narg_is_nullable() {
        let catalog = catalog();
        let stmt = where_select(Expr::Binary {
            op: BinaryOp::Eq,
            left: Box::new(Expr::column("id")),
            right: Box::new(Expr::Call(FuncCall::new(
                FuncName::qualified("sqlc", "narg"),
                vec![Expr::column("id")],
            ))),
        });
        let params = params_for(&catalog, &stmt);
        assert!(!params[0].column.not_null);
        assert_eq!(params[0].column.data_type, "bigint");
    }

    #[test]
    fn test_slice_marker_flags_column() {
        let catalog = catalog();
        let stmt = where_select(Expr::InList {
            expr: Box::new(Expr::column("id")),
            list: vec![Expr::Call(FuncCall::new(
                FuncName::qualified("sqlc", "slice"),
                vec![Expr::column("ids")],
            ))],
            negated: false,
        });
        let params = params_for(&catalog, &stmt);
        assert_eq!(params.len(), 1);
        assert!(params[0].column.is_slice);
        assert_eq!(params[0].column.name, "ids");
        assert_eq!(params[0].column.data_type, "bigint");
    }

    #[test]
    fn test_insert_values_bind_positionally() {
        let catalog = catalog();
        let stmt = Statement::Insert(sqlgen_ast::InsertStmt {
            with: None,
            relation: Relation::bare("accounts"),
            columns: vec!["id".to_string(), "email".to_string()],
            source: InsertSource::Values {
                rows: vec![vec![Expr::param(1), Expr::param(2)]],
            },
            returning: vec![],
        });
        let params = params_for(&catalog, &stmt);
        assert_eq!(params.len(), 2);
        assert_eq!(params[0].column.name, "id");
        assert_eq!(params[1].column.name, "email");
        assert_eq!(params[1].column.data_type, "text");
        assert!(!params[1].column.not_null);
    }

    #[test]
    fn test_limit_is_integer() {
        let catalog = catalog();
        let stmt = Statement::Select(SelectStmt {
            targets: vec![Target::expr(Expr::Wildcard { table: None })],
            from: vec![TableRef::relation(Relation::bare("accounts"))],
            limit: Some(Expr::param(1)),
            ..SelectStmt::default()
        });
        let params = params_for(&catalog, &stmt);
        assert_eq!(params[0].column.name, "limit");
        assert_eq!(params[0].column.data_type, "integer");
    }

    #[test]
    fn test_marker_numbers_follow_explicit_max() {
        let catalog = catalog();
        let stmt = where_select(Expr::Binary {
            op: BinaryOp::And,
            left: Box::new(Expr::Binary {
                op: BinaryOp::Eq,
                left: Box::new(Expr::column("email")),
                right: Box::new(Expr::Call(FuncCall::new(
                    FuncName::qualified("sqlc", "arg"),
                    vec![Expr::column("email")],
                ))),
            }),
            right: Box::new(Expr::Binary {
                op: BinaryOp::Eq,
                left: Box::new(Expr::column("id")),
                right: Box::new(Expr::param(1)),
            }),
        });
        let params = params_for(&catalog, &stmt);
        assert_eq!(params.len(), 2);
        assert_eq!(params[0].number, 1);
        assert_eq!(params[0].column.name, "id");
        assert_eq!(params[1].number, 2);
        assert_eq!(params[1].column.name, "email");
    }

    #[test]
    fn test_cast_supplies_parameter_type() {
        let catalog = catalog();
        let stmt = where_select(Expr::Binary {
            op: BinaryOp::Eq,
            left: Box::new(Expr::column("email")),
            right: Box::new(Expr::Cast {
                expr: Box::new(Expr::param(1)),
                type_name: "citext".to_string(),
            }),
        });
        let params = params_for(&catalog, &stmt);
        assert_eq!(params[0].column.data_type, "citext");
        assert_eq!(params[0].column.name, "email");
    }
}
