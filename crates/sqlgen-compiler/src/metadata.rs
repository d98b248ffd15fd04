//! Query annotations
//!
//! A compilable statement starts with a `-- name: <Name> :<cmd>` comment
//! line. Statements without one are silently skipped; a malformed annotation
//! is fatal to the statement. Comment lines after the annotation are kept as
//! documentation comments on the generated query.

use crate::error::CompileError;
use sqlgen_model::CmdKind;

#[derive(Debug, Clone, PartialEq)]
pub struct Metadata {
    pub name: String,
    pub cmd: CmdKind,
    pub comments: Vec<String>,
}

pub fn parse(text: &str) -> Result<Option<Metadata>, CompileError> {
    let mut found: Option<(String, CmdKind)> = None;
    let mut comments = Vec::new();

    for line in text.lines() {
        let trimmed = line.trim_start();
        let Some(body) = trimmed.strip_prefix("--") else {
            break;
        };
        let body = body.trim_start();

        if let Some(rest) = body.strip_prefix("name:") {
            let tokens: Vec<&str> = rest.split_whitespace().collect();
            let [name, cmd] = tokens.as_slice() else {
                return Err(CompileError::InvalidMetadata(trimmed.to_string()));
            };
            if !is_valid_name(name) {
                return Err(CompileError::InvalidQueryName(name.to_string()));
            }
            let cmd = CmdKind::parse(cmd)
                .ok_or_else(|| CompileError::InvalidCmd(cmd.to_string()))?;
            found = Some((name.to_string(), cmd));
        } else if found.is_some() {
            comments.push(body.to_string());
        }
    }

    Ok(found.map(|(name, cmd)| Metadata {
        name,
        cmd,
        comments,
    }))
}

fn is_valid_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
}
