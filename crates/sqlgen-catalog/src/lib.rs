//! Schema-object catalog
//!
//! In-memory model of one database's schemas, tables, enums, and functions.
//! Built once per engine before any query is analyzed (by replaying DDL),
//! read-only while a compilation batch runs, mutated only between batches.

use serde::{Deserialize, Serialize};
use sqlgen_ast::{FuncName, Relation};
use std::collections::BTreeSet;
use thiserror::Error;

/// Built-in schemas that never contribute to generated output.
pub const RESERVED_SCHEMAS: [&str; 2] = ["pg_catalog", "information_schema"];

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("schema not found: {0}")]
    SchemaNotFound(String),

    #[error("table not found: {0}")]
    TableNotFound(String),

    #[error("function not found: {0}")]
    FunctionNotFound(String),

    #[error("schema already exists: {0}")]
    SchemaExists(String),

    #[error("relation already exists: {0}")]
    RelationExists(String),
}

impl CatalogError {
    /// True for the lookup-miss variants callers may choose to tolerate.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            CatalogError::SchemaNotFound(_)
                | CatalogError::TableNotFound(_)
                | CatalogError::FunctionNotFound(_)
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    /// Engine-specific type tag, e.g. `bigint`, `text`.
    pub data_type: String,
    pub not_null: bool,
    #[serde(default)]
    pub is_array: bool,
    #[serde(default)]
    pub is_unsigned: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub length: Option<u32>,
}

impl Column {
    pub fn new(name: impl Into<String>, data_type: impl Into<String>, not_null: bool) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            not_null,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    pub rel: Relation,
    pub columns: Vec<Column>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Enum {
    pub name: String,
    pub values: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Function {
    pub name: String,
    /// Engine type tag of the return value, if declared.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub return_type: Option<String>,
    #[serde(default)]
    pub return_not_null: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tables: Vec<Table>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub enums: Vec<Enum>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub funcs: Vec<Function>,
}

impl Schema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tables: Vec::new(),
            enums: Vec::new(),
            funcs: Vec::new(),
        }
    }

    fn get_table(&self, name: &str) -> Option<&Table> {
        self.tables.iter().find(|t| t.rel.name == name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    pub default_schema: String,
    /// Declaration-ordered; names unique.
    pub schemas: Vec<Schema>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub extensions: BTreeSet<String>,
}

impl Catalog {
    /// A catalog holding only its default schema.
    pub fn new(default_schema: impl Into<String>) -> Self {
        let default_schema = default_schema.into();
        Self {
            schemas: vec![Schema::new(default_schema.clone())],
            default_schema,
            extensions: BTreeSet::new(),
        }
    }

    pub fn get_schema(&self, name: &str) -> Result<&Schema, CatalogError> {
        self.schemas
            .iter()
            .find(|s| s.name == name)
            .ok_or_else(|| CatalogError::SchemaNotFound(name.to_string()))
    }

    fn get_schema_mut(&mut self, name: &str) -> Result<&mut Schema, CatalogError> {
        self.schemas
            .iter_mut()
            .find(|s| s.name == name)
            .ok_or_else(|| CatalogError::SchemaNotFound(name.to_string()))
    }

    pub fn create_schema(&mut self, name: impl Into<String>) -> Result<(), CatalogError> {
        let name = name.into();
        if self.schemas.iter().any(|s| s.name == name) {
            return Err(CatalogError::SchemaExists(name));
        }
        self.schemas.push(Schema::new(name));
        Ok(())
    }

    /// Register a table. The relation's schema defaults to the catalog's
    /// default schema when unqualified.
    pub fn create_table(
        &mut self,
        rel: Relation,
        columns: Vec<Column>,
    ) -> Result<(), CatalogError> {
        let rel = self.qualify(rel);
        let schema_name = rel.schema.clone().unwrap_or_default();
        let schema = self.get_schema_mut(&schema_name)?;
        if schema.get_table(&rel.name).is_some() {
            return Err(CatalogError::RelationExists(rel.to_string()));
        }
        schema.tables.push(Table { rel, columns });
        Ok(())
    }

    pub fn create_enum(
        &mut self,
        schema: Option<&str>,
        name: impl Into<String>,
        values: Vec<String>,
    ) -> Result<(), CatalogError> {
        let name = name.into();
        let schema_name = schema.unwrap_or(&self.default_schema).to_string();
        let schema = self.get_schema_mut(&schema_name)?;
        if schema.enums.iter().any(|e| e.name == name) {
            return Err(CatalogError::RelationExists(format!(
                "{}.{}",
                schema_name, name
            )));
        }
        schema.enums.push(Enum { name, values });
        Ok(())
    }

    pub fn create_function(
        &mut self,
        schema: Option<&str>,
        func: Function,
    ) -> Result<(), CatalogError> {
        let schema_name = schema.unwrap_or(&self.default_schema).to_string();
        let schema = self.get_schema_mut(&schema_name)?;
        // Overloads share a name; declaration order decides resolution.
        schema.funcs.push(func);
        Ok(())
    }

    /// Exact, case-sensitive table lookup. The relation's schema defaults to
    /// the catalog's default schema when unqualified.
    pub fn get_table(&self, rel: &Relation) -> Result<&Table, CatalogError> {
        let schema_name = rel.schema.as_deref().unwrap_or(&self.default_schema);
        let schema = self
            .get_schema(schema_name)
            .map_err(|_| CatalogError::TableNotFound(rel.to_string()))?;
        schema
            .get_table(&rel.name)
            .ok_or_else(|| CatalogError::TableNotFound(rel.to_string()))
    }

    /// All declared overloads for a function name, in declaration order.
    /// Function names compare case-insensitively; an unqualified name is
    /// searched in the default schema and the reserved built-in schemas.
    pub fn list_funcs_by_name(&self, name: &FuncName) -> Vec<&Function> {
        let lowered = name.name.to_lowercase();
        let mut out = Vec::new();
        for schema in &self.schemas {
            let searched = match &name.schema {
                Some(s) => schema.name == *s,
                None => {
                    schema.name == self.default_schema
                        || RESERVED_SCHEMAS.contains(&schema.name.as_str())
                }
            };
            if !searched {
                continue;
            }
            out.extend(
                schema
                    .funcs
                    .iter()
                    .filter(|f| f.name.to_lowercase() == lowered),
            );
        }
        out
    }

    fn qualify(&self, mut rel: Relation) -> Relation {
        if rel.schema.is_none() {
            rel.schema = Some(self.default_schema.clone());
        }
        rel
    }
}
