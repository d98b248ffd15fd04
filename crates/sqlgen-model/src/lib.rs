//! sqlgen generation model
//!
//! The language-agnostic output of query compilation: enums, structs, and
//! queries, fully typed and override-applied. Emitters consume this model
//! read-only; all serialization is deterministic so results can be cached
//! and compared by fingerprint.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

mod types;
pub use types::*;

/// How a query executes and what it hands back to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CmdKind {
    /// Execute, discard the result.
    Exec,
    /// Exactly one row.
    One,
    /// Zero or more rows.
    Many,
    /// Execute, return the affected-row count.
    ExecRows,
    /// Execute, return the last inserted id.
    ExecLastId,
    /// Execute, return the driver's full result handle.
    ExecResult,
    /// High-throughput multi-row insert against a single table.
    CopyFrom,
    BatchExec,
    BatchOne,
    BatchMany,
}

impl CmdKind {
    /// Parse the `:cmd` token of a query annotation.
    pub fn parse(token: &str) -> Option<CmdKind> {
        match token {
            ":exec" => Some(CmdKind::Exec),
            ":one" => Some(CmdKind::One),
            ":many" => Some(CmdKind::Many),
            ":execrows" => Some(CmdKind::ExecRows),
            ":execlastid" => Some(CmdKind::ExecLastId),
            ":execresult" => Some(CmdKind::ExecResult),
            ":copyfrom" => Some(CmdKind::CopyFrom),
            ":batchexec" => Some(CmdKind::BatchExec),
            ":batchone" => Some(CmdKind::BatchOne),
            ":batchmany" => Some(CmdKind::BatchMany),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CmdKind::Exec => ":exec",
            CmdKind::One => ":one",
            CmdKind::Many => ":many",
            CmdKind::ExecRows => ":execrows",
            CmdKind::ExecLastId => ":execlastid",
            CmdKind::ExecResult => ":execresult",
            CmdKind::CopyFrom => ":copyfrom",
            CmdKind::BatchExec => ":batchexec",
            CmdKind::BatchOne => ":batchone",
            CmdKind::BatchMany => ":batchmany",
        }
    }

    /// Command kinds whose generated method scans result rows.
    pub fn returns_rows(&self) -> bool {
        matches!(
            self,
            CmdKind::One | CmdKind::Many | CmdKind::BatchOne | CmdKind::BatchMany
        )
    }
}

/// A fully qualified table identity, schema already defaulted where known.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identifier {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub catalog: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
    pub name: String,
}

/// One field of a generated struct.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    /// The column name as it appears in the database result set.
    pub db_name: String,
    pub field_type: FieldType,
    pub not_null: bool,
    #[serde(default)]
    pub is_array: bool,
    /// Ordered tag key/value pairs; emitters render these to concrete syntax.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<(String, String)>,
    /// For embedded fields, the names of the nested struct's fields so
    /// emitters can address them without going through the embedding field.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub embed_fields: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructDef {
    pub name: String,
    /// The originating relation, if the struct mirrors a catalog table.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table: Option<Identifier>,
    pub fields: Vec<Field>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnumConstant {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnumDef {
    pub name: String,
    pub constants: Vec<EnumConstant>,
}

/// A query's parameter or return value: either a scalar or a struct
/// reference. An empty value means the query takes/returns nothing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryValue {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub db_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field_type: Option<FieldType>,
    #[serde(default)]
    pub not_null: bool,
    /// Set when the value is a struct; names a struct in the result.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub struct_name: Option<String>,
    /// When false on a struct-valued parameter, emitters expand the struct's
    /// fields into separate scalar arguments instead.
    #[serde(default)]
    pub emit_struct: bool,
    #[serde(default)]
    pub emit_pointer: bool,
}

impl QueryValue {
    pub fn is_empty(&self) -> bool {
        self.name.is_empty() && self.field_type.is_none() && self.struct_name.is_none()
    }

    pub fn is_struct(&self) -> bool {
        self.struct_name.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Query {
    pub name: String,
    pub cmd: CmdKind,
    /// Exact source text the parser consumed.
    pub text: String,
    pub source_file: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub comments: Vec<String>,
    #[serde(default, skip_serializing_if = "QueryValue::is_empty")]
    pub arg: QueryValue,
    #[serde(default, skip_serializing_if = "QueryValue::is_empty")]
    pub ret: QueryValue,
    /// Target table for bulk-copy commands.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub insert_into_table: Option<Identifier>,
}

/// Everything an emitter needs: enums, structs, and queries, each sorted by
/// name so generation output is independent of source ordering.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerateResult {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub enums: Vec<EnumDef>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub structs: Vec<StructDef>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub queries: Vec<Query>,
}

impl GenerateResult {
    /// Calculate fingerprint (SHA-256) over the canonical JSON form.
    pub fn fingerprint(&self) -> String {
        let json = serde_json::to_string(self).expect("model should always serialize");
        let mut hasher = Sha256::new();
        hasher.update(json.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    /// Apply the deterministic name sorts.
    pub fn sort(&mut self) {
        self.enums.sort_by(|a, b| a.name.cmp(&b.name));
        self.structs.sort_by(|a, b| a.name.cmp(&b.name));
        self.queries.sort_by(|a, b| a.name.cmp(&b.name));
    }
}
