//! End-to-end compilation over a small catalog: annotation handling,
//! parameter and output shaping, struct reuse, and batch error isolation.

use sqlgen_ast::{
    BinaryOp, Expr, FuncCall, FuncName, InsertSource, InsertStmt, Join, JoinKind, Relation,
    SelectStmt, Statement, TableRef, Target,
};
use sqlgen_catalog::{Catalog, Column};
use sqlgen_compiler::{CompileError, Compiler, ParsedStatement};
use sqlgen_config::Settings;
use sqlgen_model::{CmdKind, FieldType};

fn catalog() -> Catalog {
    let mut catalog = Catalog::new("public");
    catalog
        .create_table(
            Relation::bare("accounts"),
            vec![
                Column::new("id", "bigint", true),
                Column::new("email", "text", false),
            ],
        )
        .unwrap();
    catalog
        .create_table(
            Relation::bare("orders"),
            vec![
                Column::new("id", "bigint", true),
                Column::new("account_id", "bigint", true),
                Column::new("total", "numeric", true),
            ],
        )
        .unwrap();
    catalog
}

fn compiler() -> Compiler {
    Compiler::new(catalog(), Settings::default())
}

fn statement(text: &str, ast: Statement) -> ParsedStatement {
    ParsedStatement {
        ast,
        text: text.to_string(),
        file: "queries.sql".to_string(),
    }
}

fn get_account() -> ParsedStatement {
    statement(
        "-- name: GetAccount :one\nSELECT * FROM accounts WHERE id = $1",
        Statement::Select(SelectStmt {
            targets: vec![Target::expr(Expr::Wildcard { table: None })],
            from: vec![TableRef::relation(Relation::bare("accounts"))],
            selection: Some(Expr::Binary {
                op: BinaryOp::Eq,
                left: Box::new(Expr::column("id")),
                right: Box::new(Expr::param(1)),
            }),
            ..SelectStmt::default()
        }),
    )
}

#[test]
fn test_get_account_end_to_end() {
    let output = compiler().compile(&[get_account()]);
    assert!(output.failures.is_empty(), "{:?}", output.failures);
    assert_eq!(output.result.queries.len(), 1);

    let query = &output.result.queries[0];
    assert_eq!(query.name, "GetAccount");
    assert_eq!(query.cmd, CmdKind::One);

    // One parameter, bound to accounts.id.
    assert_eq!(query.arg.name, "id");
    assert_eq!(query.arg.field_type, Some(FieldType::db("bigint")));
    assert!(query.arg.not_null);
    assert!(!query.arg.is_struct());

    // SELECT * reuses the table's model struct.
    assert_eq!(query.ret.struct_name.as_deref(), Some("Account"));

    let account = output
        .result
        .structs
        .iter()
        .find(|s| s.name == "Account")
        .unwrap();
    assert_eq!(account.fields[0].name, "ID");
    assert_eq!(account.fields[0].field_type, FieldType::db("bigint"));
    assert!(account.fields[0].not_null);
    assert_eq!(account.fields[1].name, "Email");
    assert_eq!(account.fields[1].field_type, FieldType::db("text"));
    assert!(!account.fields[1].not_null);
}

#[test]
fn test_single_anonymous_column_is_scalar() {
    let stmt = statement(
        "-- name: One :one\nSELECT 1",
        Statement::Select(SelectStmt {
            targets: vec![Target::expr(Expr::Literal {
                value: sqlgen_ast::Literal::Int(1),
            })],
            ..SelectStmt::default()
        }),
    );
    let output = compiler().compile(&[stmt]);
    assert!(output.failures.is_empty());

    let query = &output.result.queries[0];
    assert!(query.ret.struct_name.is_none());
    assert_eq!(query.ret.name, "column_1");
}

#[test]
fn test_params_struct_synthesized_at_limit_zero() {
    let settings = Settings {
        query_parameter_limit: 0,
        ..Settings::default()
    };
    let stmt = statement(
        "-- name: UpdateEmail :exec\nUPDATE accounts SET email = $1 WHERE id = $2",
        Statement::Update(sqlgen_ast::UpdateStmt {
            with: None,
            relation: Relation::bare("accounts"),
            assignments: vec![sqlgen_ast::Assignment {
                column: "email".to_string(),
                value: Expr::param(1),
            }],
            selection: Some(Expr::Binary {
                op: BinaryOp::Eq,
                left: Box::new(Expr::column("id")),
                right: Box::new(Expr::param(2)),
            }),
            returning: vec![],
        }),
    );
    let output = Compiler::new(catalog(), settings).compile(&[stmt]);
    assert!(output.failures.is_empty(), "{:?}", output.failures);

    let query = &output.result.queries[0];
    assert_eq!(query.arg.struct_name.as_deref(), Some("UpdateEmailParams"));
    assert!(query.arg.emit_struct);

    let params = output
        .result
        .structs
        .iter()
        .find(|s| s.name == "UpdateEmailParams")
        .unwrap();
    assert_eq!(params.fields.len(), 2);
    assert_eq!(params.fields[0].name, "Email");
    assert_eq!(params.fields[1].name, "ID");
}

#[test]
fn test_struct_reuse_is_referentially_stable() {
    let projection = || SelectStmt {
        targets: vec![
            Target::aliased(Expr::column("email"), "contact"),
            Target::aliased(Expr::column("id"), "ident"),
        ],
        from: vec![TableRef::relation(Relation::bare("accounts"))],
        ..SelectStmt::default()
    };
    let first = statement(
        "-- name: ListContacts :many\nSELECT email AS contact, id AS ident FROM accounts",
        Statement::Select(projection()),
    );
    let second = statement(
        "-- name: ListContactsAgain :many\nSELECT email AS contact, id AS ident FROM accounts",
        Statement::Select(projection()),
    );
    let output = compiler().compile(&[first, second]);
    assert!(output.failures.is_empty());

    let names: Vec<_> = output
        .result
        .queries
        .iter()
        .map(|q| q.ret.struct_name.clone().unwrap())
        .collect();
    assert_eq!(names[0], names[1]);

    let row_structs = output
        .result
        .structs
        .iter()
        .filter(|s| s.name.ends_with("Row"))
        .count();
    assert_eq!(row_structs, 1);
}

#[test]
fn test_cte_shadows_catalog_table() {
    let mut catalog = catalog();
    catalog
        .create_table(
            Relation::bare("recent"),
            vec![Column::new("other", "text", false)],
        )
        .unwrap();

    let stmt = statement(
        "-- name: Recent :many\nWITH recent AS (SELECT id FROM accounts) SELECT * FROM recent",
        Statement::Select(SelectStmt {
            with: Some(sqlgen_ast::WithClause {
                ctes: vec![sqlgen_ast::CommonTableExpr {
                    name: "recent".to_string(),
                    query: Box::new(SelectStmt {
                        targets: vec![Target::expr(Expr::column("id"))],
                        from: vec![TableRef::relation(Relation::bare("accounts"))],
                        ..SelectStmt::default()
                    }),
                }],
            }),
            targets: vec![Target::expr(Expr::Wildcard { table: None })],
            from: vec![TableRef::relation(Relation::bare("recent"))],
            ..SelectStmt::default()
        }),
    );
    let output = Compiler::new(catalog, Settings::default()).compile(&[stmt]);
    assert!(output.failures.is_empty());

    // One column from the CTE body, not the real table's `other` column.
    let query = &output.result.queries[0];
    let row = output
        .result
        .structs
        .iter()
        .find(|s| Some(&s.name) == query.ret.struct_name.as_ref());
    assert!(row.is_none(), "single-column result should stay scalar");
    assert_eq!(query.ret.name, "id");
    assert_eq!(query.ret.field_type, Some(FieldType::db("bigint")));
}

#[test]
fn test_embedded_struct_resolves_to_model() {
    let stmt = statement(
        "-- name: OrderWithAccount :one\nSELECT sqlc.embed(accounts), orders.total FROM orders JOIN accounts ON accounts.id = orders.account_id",
        Statement::Select(SelectStmt {
            targets: vec![
                Target::expr(Expr::Call(FuncCall::new(
                    FuncName::qualified("sqlc", "embed"),
                    vec![Expr::column("accounts")],
                ))),
                Target::expr(Expr::qualified_column("orders", "total")),
            ],
            from: vec![TableRef::Join(Box::new(Join {
                kind: JoinKind::Inner,
                left: TableRef::relation(Relation::bare("orders")),
                right: TableRef::relation(Relation::bare("accounts")),
                on: Some(Expr::Binary {
                    op: BinaryOp::Eq,
                    left: Box::new(Expr::qualified_column("accounts", "id")),
                    right: Box::new(Expr::qualified_column("orders", "account_id")),
                }),
            }))],
            ..SelectStmt::default()
        }),
    );
    let output = compiler().compile(&[stmt]);
    assert!(output.failures.is_empty(), "{:?}", output.failures);

    let query = &output.result.queries[0];
    let row_name = query.ret.struct_name.as_deref().unwrap();
    assert_eq!(row_name, "OrderWithAccountRow");

    let row = output
        .result
        .structs
        .iter()
        .find(|s| s.name == row_name)
        .unwrap();
    assert_eq!(row.fields[0].name, "Account");
    assert_eq!(
        row.fields[0].field_type,
        FieldType::Struct {
            name: "Account".to_string()
        }
    );
    assert_eq!(row.fields[0].embed_fields, vec!["ID", "Email"]);
    assert_eq!(row.fields[1].name, "Total");
}

#[test]
fn test_failures_do_not_abort_siblings() {
    let bad = statement(
        "-- name: Bad :one\nSELECT sqlc.arg(1, 2)",
        Statement::Select(SelectStmt {
            targets: vec![Target::expr(Expr::Call(FuncCall::new(
                FuncName::qualified("sqlc", "arg"),
                vec![
                    Expr::Literal {
                        value: sqlgen_ast::Literal::Int(1),
                    },
                    Expr::Literal {
                        value: sqlgen_ast::Literal::Int(2),
                    },
                ],
            )))],
            ..SelectStmt::default()
        }),
    );
    let output = compiler().compile(&[bad, get_account()]);

    assert_eq!(output.failures.len(), 1);
    assert!(matches!(
        output.failures[0].error,
        CompileError::MarkerArgCount { got: 2, .. }
    ));
    assert_eq!(output.result.queries.len(), 1);
    assert_eq!(output.result.queries[0].name, "GetAccount");
}

#[test]
fn test_unannotated_statement_skipped() {
    let stmt = statement(
        "SELECT * FROM accounts",
        Statement::Select(SelectStmt {
            targets: vec![Target::expr(Expr::Wildcard { table: None })],
            from: vec![TableRef::relation(Relation::bare("accounts"))],
            ..SelectStmt::default()
        }),
    );
    let output = compiler().compile(&[stmt]);
    assert!(output.failures.is_empty());
    assert!(output.result.queries.is_empty());
}

#[test]
fn test_duplicate_query_names_fail() {
    let output = compiler().compile(&[get_account(), get_account()]);
    assert_eq!(output.result.queries.len(), 1);
    assert_eq!(output.failures.len(), 1);
    assert!(matches!(
        output.failures[0].error,
        CompileError::DuplicateQueryName(_)
    ));
}

#[test]
fn test_copyfrom_records_target_table() {
    let insert = statement(
        "-- name: BulkInsertOrders :copyfrom\nINSERT INTO orders (id, account_id, total) VALUES ($1, $2, $3)",
        Statement::Insert(InsertStmt {
            with: None,
            relation: Relation::bare("orders"),
            columns: vec![
                "id".to_string(),
                "account_id".to_string(),
                "total".to_string(),
            ],
            source: InsertSource::Values {
                rows: vec![vec![Expr::param(1), Expr::param(2), Expr::param(3)]],
            },
            returning: vec![],
        }),
    );
    let output = compiler().compile(&[insert]);
    assert!(output.failures.is_empty(), "{:?}", output.failures);

    let query = &output.result.queries[0];
    assert_eq!(query.cmd, CmdKind::CopyFrom);
    assert_eq!(query.insert_into_table.as_ref().unwrap().name, "orders");
}

#[test]
fn test_copyfrom_rejects_non_insert() {
    let stmt = statement(
        "-- name: NotAnInsert :copyfrom\nSELECT * FROM accounts",
        Statement::Select(SelectStmt {
            targets: vec![Target::expr(Expr::Wildcard { table: None })],
            from: vec![TableRef::relation(Relation::bare("accounts"))],
            ..SelectStmt::default()
        }),
    );
    let output = compiler().compile(&[stmt]);
    assert_eq!(output.failures.len(), 1);
    assert!(matches!(
        output.failures[0].error,
        CompileError::InvalidCopyFrom
    ));
}

#[test]
fn test_compilation_is_idempotent() -> anyhow::Result<()> {
    let inputs = vec![get_account()];
    let compiler = compiler();
    let first = compiler.compile(&inputs);
    let second = compiler.compile(&inputs);
    assert_eq!(first.result.fingerprint(), second.result.fingerprint());
    Ok(())
}

#[test]
fn test_left_join_wildcard_null_extends() {
    let stmt = statement(
        "-- name: AccountsWithOrders :many\nSELECT * FROM accounts LEFT JOIN orders ON orders.account_id = accounts.id",
        Statement::Select(SelectStmt {
            targets: vec![Target::expr(Expr::Wildcard { table: None })],
            from: vec![TableRef::Join(Box::new(Join {
                kind: JoinKind::Left,
                left: TableRef::relation(Relation::bare("accounts")),
                right: TableRef::relation(Relation::bare("orders")),
                on: Some(Expr::Binary {
                    op: BinaryOp::Eq,
                    left: Box::new(Expr::qualified_column("orders", "account_id")),
                    right: Box::new(Expr::qualified_column("accounts", "id")),
                }),
            }))],
            ..SelectStmt::default()
        }),
    );
    let output = compiler().compile(&[stmt]);
    assert!(output.failures.is_empty(), "{:?}", output.failures);

    let query = &output.result.queries[0];
    let row = output
        .result
        .structs
        .iter()
        .find(|s| Some(&s.name) == query.ret.struct_name.as_ref())
        .unwrap();
    // accounts.id stays not-null; every orders column is null-extended.
    assert_eq!(row.fields[0].db_name, "id");
    assert!(row.fields[0].not_null);
    let orders_id = row.fields.iter().find(|f| f.name == "ID_2").unwrap();
    assert!(!orders_id.not_null);
}
