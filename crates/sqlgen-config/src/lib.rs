//! Configuration for the analyzer
//!
//! Per-engine settings plus the user's type-override rules, loaded from a
//! YAML file. Override specifiers are validated up front (`Settings::parse`)
//! so malformed configuration fails the whole batch before any statement is
//! analyzed.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

pub mod overrides;
pub mod pattern;

pub use overrides::{Override, OverrideResolver};
pub use pattern::Match;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("override cannot set both \"db_type\" and deprecated \"postgres_type\"")]
    ConflictingDbType,

    #[error("override cannot set both \"nullable\" and deprecated \"null\"")]
    ConflictingNullable,

    #[error("override specifying both `column` ({column:?}) and `db_type` ({db_type:?}) is not valid")]
    ConflictingTarget { column: String, db_type: String },

    #[error("override must specify one of `column` or `db_type`")]
    MissingTarget,

    #[error("override `column` specifier {0:?} is not the proper format, expected '[catalog.][schema.]table.column'")]
    InvalidColumnSpec(String),

    #[error(transparent)]
    Pattern(#[from] pattern::PatternError),

    #[error("invalid override type: {0}")]
    TypeRef(#[from] sqlgen_model::TypeRefError),
}

/// Target database engine. Determines the default schema and gates
/// engine-restricted overrides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Engine {
    #[serde(rename = "postgresql")]
    Postgres,
    #[serde(rename = "mysql")]
    MySql,
    #[serde(rename = "sqlite")]
    Sqlite,
}

impl Engine {
    pub fn default_schema(&self) -> &'static str {
        match self {
            Engine::Postgres => "public",
            Engine::MySql => "",
            Engine::Sqlite => "main",
        }
    }
}

impl Default for Engine {
    fn default() -> Self {
        Engine::Postgres
    }
}

/// Per-engine analyzer settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub engine: Engine,

    /// Overrides the engine's default schema when set.
    #[serde(default)]
    pub default_schema: Option<String>,

    /// When true, unresolved ordinary function calls fail the statement.
    #[serde(default)]
    pub strict_function_checks: bool,

    /// Parameter count at or below which parameters stay separate scalar
    /// arguments. `0` disables single-parameter inlining.
    #[serde(default = "default_query_parameter_limit")]
    pub query_parameter_limit: u32,

    #[serde(default)]
    pub emit_params_struct_pointers: bool,

    #[serde(default)]
    pub emit_result_struct_pointers: bool,

    #[serde(default)]
    pub emit_db_tags: bool,

    #[serde(default)]
    pub emit_json_tags: bool,

    /// Keep table names as-is instead of singularizing for struct names.
    #[serde(default)]
    pub emit_exact_table_names: bool,

    /// Table names exempt from singularization.
    #[serde(default)]
    pub inflection_exclude_table_names: Vec<String>,

    #[serde(default)]
    pub overrides: Vec<Override>,
}

fn default_query_parameter_limit() -> u32 {
    1
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            engine: Engine::default(),
            default_schema: None,
            strict_function_checks: false,
            query_parameter_limit: default_query_parameter_limit(),
            emit_params_struct_pointers: false,
            emit_result_struct_pointers: false,
            emit_db_tags: false,
            emit_json_tags: false,
            emit_exact_table_names: false,
            inflection_exclude_table_names: Vec::new(),
            overrides: Vec::new(),
        }
    }
}

impl Settings {
    /// Load settings from a YAML file and validate every override.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let mut settings: Settings = serde_yaml::from_str(&contents)?;
        settings.parse()?;
        Ok(settings)
    }

    /// Compile and validate the override rules. Must run before the settings
    /// are handed to the compiler.
    pub fn parse(&mut self) -> Result<(), ConfigError> {
        for o in &mut self.overrides {
            o.parse()?;
        }
        Ok(())
    }

    pub fn default_schema(&self) -> &str {
        self.default_schema
            .as_deref()
            .unwrap_or_else(|| self.engine.default_schema())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.engine, Engine::Postgres);
        assert_eq!(settings.default_schema(), "public");
        assert_eq!(settings.query_parameter_limit, 1);
        assert!(!settings.strict_function_checks);
    }

    #[test]
    fn test_yaml_round_trip() {
        let yaml = r#"
engine: sqlite
strict_function_checks: true
query_parameter_limit: 0
overrides:
  - column: "accounts.id"
    type: "github.com/gofrs/uuid.UUID"
"#;
        let mut settings: Settings = serde_yaml::from_str(yaml).unwrap();
        settings.parse().unwrap();

        assert_eq!(settings.engine, Engine::Sqlite);
        assert_eq!(settings.default_schema(), "main");
        assert_eq!(settings.query_parameter_limit, 0);
        assert!(settings.strict_function_checks);
        assert_eq!(settings.overrides.len(), 1);
    }

    #[test]
    fn test_explicit_default_schema_wins() {
        let settings = Settings {
            engine: Engine::Postgres,
            default_schema: Some("app".to_string()),
            ..Settings::default()
        };
        assert_eq!(settings.default_schema(), "app");
    }
}
