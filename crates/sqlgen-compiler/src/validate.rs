//! Function-call validation
//!
//! Runs before resolution. Marker calls in the reserved namespace are checked
//! structurally (name, arity, argument shape) and never resolved as real
//! functions; ordinary calls must exist in the catalog unless strict checking
//! is disabled. The traversal is fallible: the first error short-circuits the
//! statement.

use crate::error::CompileError;
use crate::MARKER_NAMESPACE;
use sqlgen_ast::{Expr, FuncCall, InsertSource, SelectStmt, Statement, TableRef};
use sqlgen_catalog::{Catalog, CatalogError};
use sqlgen_config::Settings;

pub fn func_calls(
    catalog: &Catalog,
    settings: &Settings,
    stmt: &Statement,
) -> Result<(), CompileError> {
    let v = Validator {
        catalog,
        strict: settings.strict_function_checks,
    };
    v.statement(stmt)
}

struct Validator<'a> {
    catalog: &'a Catalog,
    strict: bool,
}

impl Validator<'_> {
    fn statement(&self, stmt: &Statement) -> Result<(), CompileError> {
        if let Some(with) = stmt.with_clause() {
            for cte in &with.ctes {
                self.select(&cte.query)?;
            }
        }
        match stmt {
            Statement::Select(s) => self.select_body(s),
            Statement::Insert(s) => {
                match &s.source {
                    InsertSource::Values { rows } => {
                        for row in rows {
                            for expr in row {
                                self.expr(expr)?;
                            }
                        }
                    }
                    InsertSource::Query { query } => self.select(query)?,
                    InsertSource::DefaultValues => {}
                }
                for target in &s.returning {
                    self.expr(&target.expr)?;
                }
                Ok(())
            }
            Statement::Update(s) => {
                for assignment in &s.assignments {
                    self.expr(&assignment.value)?;
                }
                self.opt_expr(&s.selection)?;
                for target in &s.returning {
                    self.expr(&target.expr)?;
                }
                Ok(())
            }
            Statement::Delete(s) => {
                self.opt_expr(&s.selection)?;
                for target in &s.returning {
                    self.expr(&target.expr)?;
                }
                Ok(())
            }
        }
    }

    fn select(&self, s: &SelectStmt) -> Result<(), CompileError> {
        if let Some(with) = &s.with {
            for cte in &with.ctes {
                self.select(&cte.query)?;
            }
        }
        self.select_body(s)
    }

    fn select_body(&self, s: &SelectStmt) -> Result<(), CompileError> {
        for target in &s.targets {
            self.expr(&target.expr)?;
        }
        for table_ref in &s.from {
            self.table_ref(table_ref)?;
        }
        self.opt_expr(&s.selection)?;
        for expr in &s.group_by {
            self.expr(expr)?;
        }
        self.opt_expr(&s.having)?;
        self.opt_expr(&s.limit)?;
        self.opt_expr(&s.offset)?;
        if let Some(op) = &s.set_op {
            self.select(&op.right)?;
        }
        Ok(())
    }

    fn table_ref(&self, table_ref: &TableRef) -> Result<(), CompileError> {
        match table_ref {
            TableRef::Relation { .. } => Ok(()),
            TableRef::Join(join) => {
                self.table_ref(&join.left)?;
                self.table_ref(&join.right)?;
                self.opt_expr(&join.on)
            }
        }
    }

    fn opt_expr(&self, expr: &Option<Expr>) -> Result<(), CompileError> {
        match expr {
            Some(e) => self.expr(e),
            None => Ok(()),
        }
    }

    fn expr(&self, expr: &Expr) -> Result<(), CompileError> {
        match expr {
            Expr::Call(call) => self.func_call(call),
            Expr::Binary { left, right, .. } => {
                self.expr(left)?;
                self.expr(right)
            }
            Expr::Unary { expr, .. }
            | Expr::Cast { expr, .. }
            | Expr::IsNull { expr, .. } => self.expr(expr),
            Expr::InList { expr, list, .. } => {
                self.expr(expr)?;
                for item in list {
                    self.expr(item)?;
                }
                Ok(())
            }
            Expr::Literal { .. } | Expr::Column(_) | Expr::Wildcard { .. } | Expr::Param { .. } => {
                Ok(())
            }
        }
    }

    fn func_call(&self, call: &FuncCall) -> Result<(), CompileError> {
        if call.name.schema.as_deref() == Some(MARKER_NAMESPACE) {
            if !matches!(call.name.name.as_str(), "arg" | "narg" | "slice" | "embed") {
                return Err(CompileError::FunctionNotFound(call.name.to_string()));
            }
            if call.args.len() != 1 {
                return Err(CompileError::MarkerArgCount {
                    func: call.name.to_string(),
                    got: call.args.len(),
                    span: call.span,
                });
            }
            match &call.args[0] {
                Expr::Literal { .. } | Expr::Column(_) => {}
                _ => {
                    return Err(CompileError::MarkerArgShape {
                        func: call.name.to_string(),
                        span: call.span,
                    })
                }
            }
            // Markers are rewritten by the parameter resolver; they never
            // resolve as real functions, so stop here.
            return Ok(());
        }

        if self.strict && self.catalog.list_funcs_by_name(&call.name).is_empty() {
            return Err(CompileError::Catalog(CatalogError::FunctionNotFound(
                call.name.to_string(),
            )));
        }
        for arg in &call.args {
            self.expr(arg)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlgen_ast::{FuncName, Literal, SelectStmt, Target};

    fn select_with_target(expr: Expr) -> Statement {
        Statement::Select(SelectStmt {
            targets: vec![Target::expr(expr)],
            ..SelectStmt::default()
        })
    }

    fn marker(name: &str, args: Vec<Expr>) -> Expr {
        Expr::Call(FuncCall::new(FuncName::qualified("sqlc", name), args))
    }

    #[test]
    fn test_marker_arity_enforced() {
        let catalog = Catalog::new("public");
        let stmt = select_with_target(marker(
            "arg",
            vec![
                Expr::Literal {
                    value: Literal::Int(1),
                },
                Expr::Literal {
                    value: Literal::Int(2),
                },
            ],
        ));
        let err = func_calls(&catalog, &Settings::default(), &stmt).unwrap_err();
        assert!(matches!(err, CompileError::MarkerArgCount { got: 2, .. }));
    }

    #[test]
    fn test_unknown_marker_rejected() {
        let catalog = Catalog::new("public");
        let stmt = select_with_target(marker("bogus", vec![Expr::column("x")]));
        let err = func_calls(&catalog, &Settings::default(), &stmt).unwrap_err();
        assert_eq!(err.to_string(), "function not found: sqlc.bogus");
    }

    #[test]
    fn test_marker_column_reference_accepted() {
        let catalog = Catalog::new("public");
        let stmt = select_with_target(marker("arg", vec![Expr::column("name")]));
        assert!(func_calls(&catalog, &Settings::default(), &stmt).is_ok());
    }

    #[test]
    fn test_marker_rejects_expression_argument() {
        let catalog = Catalog::new("public");
        let stmt = select_with_target(marker(
            "slice",
            vec![Expr::Binary {
                op: sqlgen_ast::BinaryOp::Add,
                left: Box::new(Expr::column("a")),
                right: Box::new(Expr::column("b")),
            }],
        ));
        let err = func_calls(&catalog, &Settings::default(), &stmt).unwrap_err();
        assert!(matches!(err, CompileError::MarkerArgShape { .. }));
    }

    #[test]
    fn test_unresolved_call_tolerated_when_lenient() {
        let catalog = Catalog::new("public");
        let stmt = select_with_target(Expr::Call(FuncCall::new(
            FuncName::bare("lower"),
            vec![Expr::column("email")],
        )));
        assert!(func_calls(&catalog, &Settings::default(), &stmt).is_ok());

        let strict = Settings {
            strict_function_checks: true,
            ..Settings::default()
        };
        let err = func_calls(&catalog, &strict, &stmt).unwrap_err();
        assert_eq!(err.to_string(), "function not found: lower");
    }
}
