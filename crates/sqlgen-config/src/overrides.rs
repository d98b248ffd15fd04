//! Type-override rules
//!
//! An override redirects the inferred type for matching columns, either by
//! dotted column specifier or by source `db_type`. Rules are tried in
//! declaration order; the first match wins.

use crate::pattern::Match;
use crate::{ConfigError, Engine};
use serde::{Deserialize, Serialize};
use sqlgen_ast::Relation;
use sqlgen_model::TypeRef;
use tracing::warn;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Override {
    /// Replacement type, e.g. `github.com/gofrs/uuid.UUID` or a builtin name.
    #[serde(rename = "type", default, skip_serializing_if = "String::is_empty")]
    pub type_path: String,

    /// Match wherever the source type equals this tag, regardless of column.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub db_type: String,

    /// Deprecated. Use `db_type` instead.
    #[serde(rename = "postgres_type", default, skip_serializing_if = "String::is_empty")]
    pub deprecated_postgres_type: String,

    /// Restricts the rule to one engine when several are configured.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub engine: Option<Engine>,

    /// Apply only when the matched column is nullable.
    #[serde(default)]
    pub nullable: bool,

    /// Apply only when the matched column is unsigned.
    #[serde(default)]
    pub unsigned: bool,

    /// Deprecated. Use `nullable` instead.
    #[serde(rename = "null", default)]
    pub deprecated_null: bool,

    /// Dotted column specifier, `[[catalog.]schema.]table.column`.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub column: String,

    // Compiled by `parse()`.
    #[serde(skip)]
    pub column_name: Option<Match>,
    #[serde(skip)]
    pub table_catalog: Option<Match>,
    #[serde(skip)]
    pub table_schema: Option<Match>,
    #[serde(skip)]
    pub table_rel: Option<Match>,
    #[serde(skip)]
    pub type_ref: Option<TypeRef>,
}

impl Override {
    /// Validate the rule and compile its patterns. Runs at config-load time;
    /// any error here fails the batch before statements are analyzed.
    pub fn parse(&mut self) -> Result<(), ConfigError> {
        if !self.deprecated_postgres_type.is_empty() {
            warn!("\"postgres_type\" is deprecated; use \"db_type\" to specify a type override");
            if !self.db_type.is_empty() {
                return Err(ConfigError::ConflictingDbType);
            }
            self.db_type = self.deprecated_postgres_type.clone();
        }

        if self.deprecated_null {
            warn!("\"null\" is deprecated; use the \"nullable\" field");
            if self.nullable {
                return Err(ConfigError::ConflictingNullable);
            }
            self.nullable = true;
        }

        match (self.column.is_empty(), self.db_type.is_empty()) {
            (false, false) => {
                return Err(ConfigError::ConflictingTarget {
                    column: self.column.clone(),
                    db_type: self.db_type.clone(),
                })
            }
            (true, true) => return Err(ConfigError::MissingTarget),
            _ => {}
        }

        if !self.column.is_empty() {
            let parts: Vec<&str> = self.column.split('.').collect();
            match parts.as_slice() {
                [col] => {
                    self.column_name = Some(Match::compile(col)?);
                }
                [table, col] => {
                    self.column_name = Some(Match::compile(col)?);
                    self.table_rel = Some(Match::compile(table)?);
                    self.table_schema = Some(Match::compile("public")?);
                }
                [schema, table, col] => {
                    self.column_name = Some(Match::compile(col)?);
                    self.table_rel = Some(Match::compile(table)?);
                    self.table_schema = Some(Match::compile(schema)?);
                }
                [catalog, schema, table, col] => {
                    self.column_name = Some(Match::compile(col)?);
                    self.table_rel = Some(Match::compile(table)?);
                    self.table_schema = Some(Match::compile(schema)?);
                    self.table_catalog = Some(Match::compile(catalog)?);
                }
                _ => return Err(ConfigError::InvalidColumnSpec(self.column.clone())),
            }
        }

        self.type_ref = Some(TypeRef::parse(&self.type_path)?);
        Ok(())
    }

    /// Whether this rule's table patterns accept the given relation. The
    /// relation's schema falls back to the engine default; a rule that
    /// declares no schema pattern never matches a relation whose effective
    /// schema is non-empty.
    pub fn matches(&self, rel: Option<&Relation>, default_schema: &str) -> bool {
        let Some(rel) = rel else {
            return false;
        };

        let schema = match rel.schema.as_deref() {
            Some(s) if !s.is_empty() => s,
            _ => default_schema,
        };

        if let Some(pat) = &self.table_catalog {
            if !pat.matches(rel.catalog.as_deref().unwrap_or("")) {
                return false;
            }
        }

        if self.table_schema.is_none() && !schema.is_empty() {
            return false;
        }
        if let Some(pat) = &self.table_schema {
            if !pat.matches(schema) {
                return false;
            }
        }

        if self.table_rel.is_none() && !rel.name.is_empty() {
            return false;
        }
        if let Some(pat) = &self.table_rel {
            if !pat.matches(&rel.name) {
                return false;
            }
        }

        true
    }
}

/// First-match lookup over the declared override list.
pub struct OverrideResolver<'a> {
    overrides: &'a [Override],
    engine: Engine,
    default_schema: &'a str,
}

impl<'a> OverrideResolver<'a> {
    pub fn new(overrides: &'a [Override], engine: Engine, default_schema: &'a str) -> Self {
        Self {
            overrides,
            engine,
            default_schema,
        }
    }

    /// The replacement type for the given column identity, if any rule
    /// matches. Declaration order is the only precedence mechanism.
    pub fn resolve(
        &self,
        table: Option<&Relation>,
        column_name: &str,
        db_type: &str,
        not_null: bool,
        unsigned: bool,
    ) -> Option<&'a TypeRef> {
        for o in self.overrides {
            let Some(type_ref) = o.type_ref.as_ref() else {
                continue;
            };
            if let Some(engine) = o.engine {
                if engine != self.engine {
                    continue;
                }
            }
            if o.nullable && not_null {
                continue;
            }
            if o.unsigned && !unsigned {
                continue;
            }

            if !o.db_type.is_empty() {
                if o.db_type.eq_ignore_ascii_case(db_type) {
                    return Some(type_ref);
                }
                continue;
            }

            let name_matches = o
                .column_name
                .as_ref()
                .map(|m| m.matches(column_name))
                .unwrap_or(false);
            if name_matches && o.matches(table, self.default_schema) {
                return Some(type_ref);
            }
        }
        None
    }
}
