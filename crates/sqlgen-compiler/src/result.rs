//! Generation-model building
//!
//! Turns resolved statements plus the catalog into the emitter-facing model:
//! enums, table structs, and queries. Overrides are applied here, per column,
//! and struct shapes are reused wherever a known struct already matches the
//! projection.

use crate::error::CompileError;
use crate::names;
use crate::params::Parameter;
use crate::query_catalog::Column;
use crate::{Failure, ResolvedQuery};
use sqlgen_ast::Relation;
use sqlgen_catalog::{Catalog, RESERVED_SCHEMAS};
use sqlgen_config::{OverrideResolver, Settings};
use sqlgen_model::{
    EnumConstant, EnumDef, Field, FieldType, GenerateResult, Identifier, Query, QueryValue,
    StructDef, TypeRef,
};
use std::collections::{HashMap, HashSet};

pub(crate) struct ResultBuilder<'a> {
    catalog: &'a Catalog,
    settings: &'a Settings,
    overrides: OverrideResolver<'a>,
}

struct IdColumn {
    /// Collision-suffix key: the parameter number for parameters, the
    /// projection position for output columns.
    id: usize,
    column: Column,
    embed: Option<EmbedInfo>,
}

struct EmbedInfo {
    struct_name: String,
    fields: Vec<String>,
}

impl<'a> ResultBuilder<'a> {
    pub fn new(catalog: &'a Catalog, settings: &'a Settings) -> Self {
        Self {
            catalog,
            settings,
            overrides: OverrideResolver::new(
                &settings.overrides,
                settings.engine,
                &catalog.default_schema,
            ),
        }
    }

    pub fn build(
        &self,
        queries: Vec<ResolvedQuery>,
        failures: &mut Vec<Failure>,
    ) -> GenerateResult {
        let enums = self.build_enums();
        // The reuse pool: catalog structs plus synthesized row structs.
        // Parameter structs are collected apart so projections never match
        // them.
        let mut structs = self.build_table_structs();
        let mut param_structs = Vec::new();

        let mut out = Vec::new();
        for rq in queries {
            match self.build_query(&rq, &mut structs, &mut param_structs) {
                Ok(query) => out.push(query),
                Err(error) => failures.push(Failure {
                    file: rq.file.clone(),
                    query: Some(rq.name.clone()),
                    error,
                }),
            }
        }

        structs.extend(param_structs);
        let mut result = GenerateResult {
            enums,
            structs,
            queries: out,
        };
        result.sort();
        result
    }

    fn build_enums(&self) -> Vec<EnumDef> {
        let mut enums = Vec::new();
        for schema in &self.catalog.schemas {
            if RESERVED_SCHEMAS.contains(&schema.name.as_str()) {
                continue;
            }
            for decl in &schema.enums {
                let enum_name = if schema.name == self.catalog.default_schema {
                    decl.name.clone()
                } else {
                    format!("{}_{}", schema.name, decl.name)
                };

                let mut constants = Vec::new();
                let mut seen = HashSet::new();
                for (i, value) in decl.values.iter().enumerate() {
                    let mut label = names::enum_replace(value);
                    if label.is_empty() || seen.contains(&label) {
                        label = format!("value_{}", i);
                    }
                    constants.push(EnumConstant {
                        name: names::struct_name(&format!("{}_{}", enum_name, label)),
                        value: value.clone(),
                    });
                    seen.insert(label);
                }
                enums.push(EnumDef {
                    name: names::struct_name(&enum_name),
                    constants,
                });
            }
        }
        enums
    }

    fn build_table_structs(&self) -> Vec<StructDef> {
        let mut structs = Vec::new();
        for schema in &self.catalog.schemas {
            if RESERVED_SCHEMAS.contains(&schema.name.as_str()) {
                continue;
            }
            for table in &schema.tables {
                let table_name = if schema.name == self.catalog.default_schema {
                    table.rel.name.clone()
                } else {
                    format!("{}_{}", schema.name, table.rel.name)
                };
                let struct_base = if self.settings.emit_exact_table_names {
                    table_name
                } else {
                    names::singular(&table_name, &self.settings.inflection_exclude_table_names)
                };

                let mut fields = Vec::new();
                for column in &table.columns {
                    let (field_type, not_null) = self.column_type(
                        Some(&table.rel),
                        &column.name,
                        &column.data_type,
                        column.not_null,
                        column.is_unsigned,
                    );
                    fields.push(Field {
                        name: names::struct_name(&column.name),
                        db_name: column.name.clone(),
                        field_type,
                        not_null,
                        is_array: column.is_array,
                        tags: self.tags(&column.name),
                        embed_fields: vec![],
                    });
                }
                structs.push(StructDef {
                    name: names::struct_name(&struct_base),
                    table: Some(Identifier {
                        catalog: table.rel.catalog.clone(),
                        schema: Some(schema.name.clone()),
                        name: table.rel.name.clone(),
                    }),
                    fields,
                });
            }
        }
        structs
    }

    fn build_query(
        &self,
        rq: &ResolvedQuery,
        structs: &mut Vec<StructDef>,
        param_structs: &mut Vec<StructDef>,
    ) -> Result<Query, CompileError> {
        let mut query = Query {
            name: rq.name.clone(),
            cmd: rq.cmd,
            text: rq.text.clone(),
            source_file: rq.file.clone(),
            comments: rq.comments.clone(),
            arg: QueryValue::default(),
            ret: QueryValue::default(),
            insert_into_table: rq.insert_into_table.clone(),
        };

        self.build_arg(&mut query, &rq.params, param_structs)?;
        self.build_ret(&mut query, rq, structs)?;
        Ok(query)
    }

    fn build_arg(
        &self,
        query: &mut Query,
        params: &[Parameter],
        structs: &mut Vec<StructDef>,
    ) -> Result<(), CompileError> {
        let limit = self.settings.query_parameter_limit as usize;

        if params.len() == 1 && limit != 0 {
            let p = &params[0];
            let (field_type, not_null) = self.resolved_type(&p.column);
            query.arg = QueryValue {
                name: names::param_name(p.number, &p.column.name),
                db_name: Some(p.column.name.clone()),
                field_type: Some(field_type),
                not_null,
                ..QueryValue::default()
            };
            return Ok(());
        }

        if !params.is_empty() {
            let columns = params
                .iter()
                .map(|p| IdColumn {
                    id: p.number as usize,
                    column: p.column.clone(),
                    embed: None,
                })
                .collect();
            let def =
                self.columns_to_struct(format!("{}Params", query.name), columns, false)?;
            query.arg = QueryValue {
                name: "arg".to_string(),
                struct_name: Some(def.name.clone()),
                emit_struct: params.len() > limit,
                emit_pointer: self.settings.emit_params_struct_pointers,
                ..QueryValue::default()
            };
            structs.push(def);
        }
        Ok(())
    }

    fn build_ret(
        &self,
        query: &mut Query,
        rq: &ResolvedQuery,
        structs: &mut Vec<StructDef>,
    ) -> Result<(), CompileError> {
        if rq.columns.len() == 1 && rq.columns[0].embed_table.is_none() {
            let column = &rq.columns[0];
            let mut name = names::column_name(&column.name, 0);
            if column.is_func_call {
                name = name.replace('$', "_");
            }
            let (field_type, not_null) = self.resolved_type(column);
            query.ret = QueryValue {
                name: name.clone(),
                db_name: Some(name),
                field_type: Some(field_type),
                not_null,
                ..QueryValue::default()
            };
            return Ok(());
        }

        if !put_out_columns(rq) {
            return Ok(());
        }

        if let Some(existing) = structs
            .iter()
            .find(|s| self.struct_matches(s, &rq.columns))
        {
            query.ret = QueryValue {
                name: "i".to_string(),
                struct_name: Some(existing.name.clone()),
                emit_pointer: self.settings.emit_result_struct_pointers,
                ..QueryValue::default()
            };
            return Ok(());
        }

        let columns = rq
            .columns
            .iter()
            .enumerate()
            .map(|(i, c)| IdColumn {
                id: i,
                column: c.clone(),
                embed: self.find_embed(c, structs),
            })
            .collect();
        let def = self.columns_to_struct(format!("{}Row", query.name), columns, true)?;
        query.ret = QueryValue {
            name: "i".to_string(),
            struct_name: Some(def.name.clone()),
            emit_pointer: self.settings.emit_result_struct_pointers,
            ..QueryValue::default()
        };
        structs.push(def);
        Ok(())
    }

    /// Build a struct from id-tagged columns, applying the collision-suffix
    /// and type-backfill rules.
    fn columns_to_struct(
        &self,
        name: String,
        columns: Vec<IdColumn>,
        use_id: bool,
    ) -> Result<StructDef, CompileError> {
        let mut def = StructDef {
            name,
            table: None,
            fields: Vec::new(),
        };
        let mut seen: HashMap<String, Vec<usize>> = HashMap::new();
        let mut suffixes: HashMap<usize, usize> = HashMap::new();

        for (i, c) in columns.iter().enumerate() {
            let mut col_name = names::column_name(&c.column.name, i);
            let mut tag_name = col_name.clone();
            if let Some(embed) = &c.embed {
                col_name = embed.struct_name.clone();
                tag_name = names::snake_case(&col_name);
            }

            let base_name = names::struct_name(&col_name);
            let mut field_name = base_name.clone();

            let mut suffix = 0;
            match suffixes.get(&c.id) {
                Some(&prior) if use_id => suffix = prior,
                _ => {
                    let collisions = seen.get(&base_name).map(Vec::len).unwrap_or(0);
                    if collisions > 0 && !c.column.is_named_param {
                        suffix = collisions + 1;
                    }
                }
            }
            suffixes.insert(c.id, suffix);
            if suffix > 0 {
                tag_name = format!("{}_{}", tag_name, suffix);
                field_name = format!("{}_{}", field_name, suffix);
            }

            let field = match &c.embed {
                None => {
                    let (field_type, not_null) = self.resolved_type(&c.column);
                    Field {
                        name: field_name,
                        db_name: col_name,
                        field_type,
                        not_null,
                        is_array: c.column.is_array,
                        tags: self.tags(&tag_name),
                        embed_fields: vec![],
                    }
                }
                Some(embed) => Field {
                    name: field_name,
                    db_name: col_name,
                    field_type: FieldType::Struct {
                        name: embed.struct_name.clone(),
                    },
                    not_null: true,
                    is_array: false,
                    tags: self.tags(&tag_name),
                    embed_fields: embed.fields.clone(),
                },
            };
            def.fields.push(field);
            seen.entry(base_name).or_default().push(i);
        }

        // A field with no known type adopts the type of a same-named field.
        for i in 0..def.fields.len() {
            if !def.fields[i].field_type.is_unknown() {
                continue;
            }
            let Some(indices) = seen.get(&def.fields[i].name) else {
                continue;
            };
            if indices.len() < 2 {
                continue;
            }
            for &j in indices {
                if j != i && def.fields[j].field_type != def.fields[i].field_type {
                    def.fields[i].field_type = def.fields[j].field_type.clone();
                }
            }
        }

        check_incompatible_types(&def.fields)?;
        Ok(def)
    }

    fn struct_matches(&self, def: &StructDef, columns: &[Column]) -> bool {
        if def.fields.len() != columns.len() {
            return false;
        }
        def.fields.iter().zip(columns).enumerate().all(|(i, (f, c))| {
            let (field_type, not_null) = self.resolved_type(c);
            f.name == names::struct_name(&names::column_name(&c.name, i))
                && f.field_type == field_type
                && f.not_null == not_null
                && f.is_array == c.is_array
                && same_table(c.table.as_ref(), def.table.as_ref(), &self.catalog.default_schema)
        })
    }

    fn find_embed(&self, column: &Column, structs: &[StructDef]) -> Option<EmbedInfo> {
        let embed = column.embed_table.as_ref()?;
        let embed_schema = embed
            .schema
            .as_deref()
            .unwrap_or(&self.catalog.default_schema);
        structs
            .iter()
            .find(|s| {
                s.table.as_ref().is_some_and(|t| {
                    t.catalog == embed.catalog
                        && t.name == embed.name
                        && t.schema.as_deref() == Some(embed_schema)
                })
            })
            .map(|s| EmbedInfo {
                struct_name: s.name.clone(),
                fields: s.fields.iter().map(|f| f.name.clone()).collect(),
            })
    }

    fn resolved_type(&self, column: &Column) -> (FieldType, bool) {
        self.column_type(
            column.table.as_ref(),
            &column.name,
            &column.data_type,
            column.not_null,
            column.unsigned,
        )
    }

    fn column_type(
        &self,
        table: Option<&Relation>,
        name: &str,
        data_type: &str,
        not_null: bool,
        unsigned: bool,
    ) -> (FieldType, bool) {
        if let Some(type_ref) = self
            .overrides
            .resolve(table, name, data_type, not_null, unsigned)
        {
            return (FieldType::Named(type_ref.clone()), not_null);
        }
        if data_type.is_empty() || data_type == "any" {
            return (FieldType::Unknown, not_null);
        }
        (FieldType::db(data_type), not_null)
    }

    fn tags(&self, tag_name: &str) -> Vec<(String, String)> {
        let mut tags = Vec::new();
        if self.settings.emit_db_tags {
            tags.push(("db".to_string(), tag_name.to_string()));
        }
        if self.settings.emit_json_tags {
            tags.push(("json".to_string(), tag_name.to_string()));
        }
        tags
    }
}

fn put_out_columns(rq: &ResolvedQuery) -> bool {
    rq.cmd.returns_rows() || (!rq.columns.is_empty() && rq.cmd != sqlgen_model::CmdKind::Exec)
}

fn same_table(
    column_table: Option<&Relation>,
    struct_table: Option<&Identifier>,
    default_schema: &str,
) -> bool {
    match (column_table, struct_table) {
        // Synthesized structs carry no table; they match on shape alone.
        (_, None) => true,
        (None, Some(_)) => false,
        (Some(rel), Some(ident)) => {
            let rel_schema = rel.schema.as_deref().unwrap_or(default_schema);
            let ident_schema = ident.schema.as_deref().unwrap_or(default_schema);
            rel.catalog == ident.catalog && rel_schema == ident_schema && rel.name == ident.name
        }
    }
}

fn check_incompatible_types(fields: &[Field]) -> Result<(), CompileError> {
    let mut types: HashMap<&str, &FieldType> = HashMap::new();
    for field in fields {
        match types.get(field.name.as_str()) {
            None => {
                types.insert(&field.name, &field.field_type);
            }
            Some(existing) if **existing != field.field_type => {
                return Err(CompileError::IncompatibleTypes {
                    name: field.name.clone(),
                    first: type_label(existing),
                    second: type_label(&field.field_type),
                });
            }
            Some(_) => {}
        }
    }
    Ok(())
}

fn type_label(field_type: &FieldType) -> String {
    match field_type {
        FieldType::Db { name } => name.clone(),
        FieldType::Named(TypeRef { path, name, .. }) => match path {
            Some(path) => format!("{}.{}", path, name),
            None => name.clone(),
        },
        FieldType::Struct { name } => name.clone(),
        FieldType::Unknown => "unknown".to_string(),
    }
}
