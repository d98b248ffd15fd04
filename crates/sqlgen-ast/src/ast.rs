//! AST types for SQL statements
//!
//! Closed variant sets per node category. Dialect parsers map their grammars
//! onto these shapes; adding a node kind means extending the enum, never
//! subclassing.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Source position of a node, 1-based. A zeroed span means "unknown".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub line: u32,
    pub column: u32,
}

impl Span {
    pub fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// A (catalog, schema, name) table identifier. Catalog and schema may be
/// absent; the analyzer applies engine defaults during resolution.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Relation {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub catalog: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
    pub name: String,
}

impl Relation {
    /// An unqualified relation.
    pub fn bare(name: impl Into<String>) -> Self {
        Self {
            catalog: None,
            schema: None,
            name: name.into(),
        }
    }

    pub fn with_schema(schema: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            catalog: None,
            schema: Some(schema.into()),
            name: name.into(),
        }
    }
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(schema) = &self.schema {
            write!(f, "{}.{}", schema, self.name)
        } else {
            write!(f, "{}", self.name)
        }
    }
}

/// A possibly schema-qualified function name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FuncName {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
    pub name: String,
}

impl FuncName {
    pub fn bare(name: impl Into<String>) -> Self {
        Self {
            schema: None,
            name: name.into(),
        }
    }

    pub fn qualified(schema: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            schema: Some(schema.into()),
            name: name.into(),
        }
    }
}

impl fmt::Display for FuncName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(schema) = &self.schema {
            write!(f, "{}.{}", schema, self.name)
        } else {
            write!(f, "{}", self.name)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "stmt")]
pub enum Statement {
    Select(SelectStmt),
    Insert(InsertStmt),
    Update(UpdateStmt),
    Delete(DeleteStmt),
}

impl Statement {
    /// The statement's `WITH` clause, if any.
    pub fn with_clause(&self) -> Option<&WithClause> {
        match self {
            Statement::Select(s) => s.with.as_ref(),
            Statement::Insert(s) => s.with.as_ref(),
            Statement::Update(s) => s.with.as_ref(),
            Statement::Delete(s) => s.with.as_ref(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WithClause {
    pub ctes: Vec<CommonTableExpr>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommonTableExpr {
    pub name: String,
    pub query: Box<SelectStmt>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SelectStmt {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub with: Option<WithClause>,
    pub targets: Vec<Target>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub from: Vec<TableRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selection: Option<Expr>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub group_by: Vec<Expr>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub having: Option<Expr>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<Expr>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<Expr>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub set_op: Option<SetOperation>,
}

/// `UNION`/`INTERSECT`/`EXCEPT` tail attached to a SELECT.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetOperation {
    pub kind: SetOpKind,
    pub all: bool,
    pub right: Box<SelectStmt>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SetOpKind {
    Union,
    Intersect,
    Except,
}

/// One projection item. Wildcards are expression kinds, so `SELECT *` is a
/// single target whose expression is [`Expr::Wildcard`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Target {
    pub expr: Expr,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    #[serde(default)]
    pub span: Span,
}

impl Target {
    pub fn expr(expr: Expr) -> Self {
        Self {
            expr,
            alias: None,
            span: Span::default(),
        }
    }

    pub fn aliased(expr: Expr, alias: impl Into<String>) -> Self {
        Self {
            expr,
            alias: Some(alias.into()),
            span: Span::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TableRef {
    Relation {
        rel: Relation,
        #[serde(skip_serializing_if = "Option::is_none")]
        alias: Option<String>,
    },
    Join(Box<Join>),
}

impl TableRef {
    pub fn relation(rel: Relation) -> Self {
        TableRef::Relation { rel, alias: None }
    }

    pub fn aliased(rel: Relation, alias: impl Into<String>) -> Self {
        TableRef::Relation {
            rel,
            alias: Some(alias.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Join {
    pub kind: JoinKind,
    pub left: TableRef,
    pub right: TableRef,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub on: Option<Expr>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JoinKind {
    Inner,
    Left,
    Right,
    Full,
    Cross,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsertStmt {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub with: Option<WithClause>,
    pub relation: Relation,
    pub columns: Vec<String>,
    pub source: InsertSource,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub returning: Vec<Target>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum InsertSource {
    /// `VALUES (..), (..)` row lists.
    Values { rows: Vec<Vec<Expr>> },
    Query { query: Box<SelectStmt> },
    DefaultValues,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateStmt {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub with: Option<WithClause>,
    pub relation: Relation,
    pub assignments: Vec<Assignment>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selection: Option<Expr>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub returning: Vec<Target>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    pub column: String,
    pub value: Expr,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeleteStmt {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub with: Option<WithClause>,
    pub relation: Relation,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selection: Option<Expr>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub returning: Vec<Target>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Expr {
    Literal { value: Literal },
    Column(ColumnRef),
    /// `*` or `t.*`.
    Wildcard {
        #[serde(skip_serializing_if = "Option::is_none")]
        table: Option<String>,
    },
    /// A positional placeholder such as `$3`.
    Param {
        number: u32,
        #[serde(default)]
        span: Span,
    },
    Call(FuncCall),
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Unary {
        op: UnaryOp,
        expr: Box<Expr>,
    },
    InList {
        expr: Box<Expr>,
        list: Vec<Expr>,
        negated: bool,
    },
    /// `expr::type` / `CAST(expr AS type)`.
    Cast {
        expr: Box<Expr>,
        type_name: String,
    },
    IsNull {
        expr: Box<Expr>,
        negated: bool,
    },
}

impl Expr {
    pub fn column(name: impl Into<String>) -> Self {
        Expr::Column(ColumnRef::bare(name))
    }

    pub fn qualified_column(table: impl Into<String>, name: impl Into<String>) -> Self {
        Expr::Column(ColumnRef::qualified(table, name))
    }

    pub fn param(number: u32) -> Self {
        Expr::Param {
            number,
            span: Span::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnRef {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table: Option<String>,
    pub name: String,
    #[serde(default)]
    pub span: Span,
}

impl ColumnRef {
    pub fn bare(name: impl Into<String>) -> Self {
        Self {
            table: None,
            name: name.into(),
            span: Span::default(),
        }
    }

    pub fn qualified(table: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            table: Some(table.into()),
            name: name.into(),
            span: Span::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FuncCall {
    pub name: FuncName,
    pub args: Vec<Expr>,
    #[serde(default)]
    pub span: Span,
}

impl FuncCall {
    pub fn new(name: FuncName, args: Vec<Expr>) -> Self {
        Self {
            name,
            args,
            span: Span::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Literal {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOp {
    // Arithmetic
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    // Comparison
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    // Logical
    And,
    Or,
    // String
    Like,
    ILike,
}

impl BinaryOp {
    /// Operators whose result is boolean regardless of operand types.
    pub fn is_predicate(&self) -> bool {
        use BinaryOp::*;
        matches!(self, Eq | Ne | Lt | Le | Gt | Ge | And | Or | Like | ILike)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOp {
    Neg,
    Not,
}
