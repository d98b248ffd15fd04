//! Type descriptors for generated fields

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TypeRefError {
    #[error("type reference is empty")]
    Empty,
    #[error("type reference {0:?} has an empty type name")]
    MissingName(String),
}

/// A reference to a target-language type, as written in an override rule:
/// either a bare builtin name or a `package.path.TypeName` form whose last
/// dot splits path from name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeRef {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    pub name: String,
    /// True when the reference names a builtin with no import path.
    pub basic: bool,
}

impl TypeRef {
    pub fn parse(spec: &str) -> Result<TypeRef, TypeRefError> {
        if spec.is_empty() {
            return Err(TypeRefError::Empty);
        }
        match spec.rfind('.') {
            None => Ok(TypeRef {
                path: None,
                name: spec.to_string(),
                basic: true,
            }),
            Some(idx) => {
                let (path, name) = spec.split_at(idx);
                let name = &name[1..];
                if path.is_empty() || name.is_empty() {
                    return Err(TypeRefError::MissingName(spec.to_string()));
                }
                Ok(TypeRef {
                    path: Some(path.to_string()),
                    name: name.to_string(),
                    basic: false,
                })
            }
        }
    }
}

/// The resolved type of a field or scalar value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum FieldType {
    /// The column's engine-native type tag, e.g. `bigint`.
    Db { name: String },
    /// An override-supplied replacement type.
    Named(TypeRef),
    /// Another generated struct, for embedded sub-structs.
    Struct { name: String },
    /// No type could be determined; emitters fall back to their most
    /// permissive representation.
    Unknown,
}

impl FieldType {
    pub fn db(name: impl Into<String>) -> FieldType {
        FieldType::Db { name: name.into() }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, FieldType::Unknown)
    }
}
