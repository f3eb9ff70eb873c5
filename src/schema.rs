//! Tables, specs and the schema registry that every pass resolves names against.

use std::collections::HashMap;

use thiserror::Error;
use tracing::{debug, info_span};

use crate::ast::{Expr, NodeIdGen};
use crate::parser::parse_source;
use crate::ref_checker::RefChecker;
use crate::sql_compiler::Sqlizer;
use crate::type_checker::{TypeCheckError, TypeChecker};
use crate::types::TypeSpecifier;

/// Structural problems found while building a schema.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("schema error: {message}")]
pub struct SchemaError {
    pub message: String,
}

impl SchemaError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldType {
    Boolean,
    Number,
    String,
    Date,
}

impl FieldType {
    /// Names are matched exactly; anything else falls back to `String`.
    pub fn from_name(name: &str) -> Self {
        match name {
            "boolean" => FieldType::Boolean,
            "number" => FieldType::Number,
            "date" => FieldType::Date,
            _ => FieldType::String,
        }
    }

    pub fn type_specifier(self) -> TypeSpecifier {
        match self {
            FieldType::Boolean => TypeSpecifier::Boolean,
            FieldType::Number => TypeSpecifier::Number,
            FieldType::String => TypeSpecifier::String,
            FieldType::Date => TypeSpecifier::Date,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    pub field_type: FieldType,
}

impl Field {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
        }
    }
}

/// A foreign-key relationship from the owning table to `table`.
#[derive(Debug, Clone, PartialEq)]
pub struct Parent {
    pub name: String,
    pub table: String,
    /// Foreign-key field on the owning table
    pub id: String,
}

impl Parent {
    pub fn new(name: impl Into<String>, table: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            table: table.into(),
            id: id.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub name: String,
    pub id: String,
    fields: Vec<Field>,
    parents: Vec<Parent>,
}

impl Table {
    /// Builds a table, rejecting duplicate fields or parents, a missing id
    /// field, foreign keys that are not fields, and parents named like fields.
    pub fn new(
        name: impl Into<String>,
        id: impl Into<String>,
        fields: Vec<Field>,
        parents: Vec<Parent>,
    ) -> Result<Self, SchemaError> {
        let name = name.into();
        let id = id.into();

        for (i, field) in fields.iter().enumerate() {
            if fields[..i].iter().any(|f| f.name == field.name) {
                return Err(SchemaError::new(format!(
                    "duplicate field on table {}: {}",
                    name, field.name
                )));
            }
        }
        for (i, parent) in parents.iter().enumerate() {
            if parents[..i].iter().any(|p| p.name == parent.name) {
                return Err(SchemaError::new(format!(
                    "duplicate parent on table {}: {}",
                    name, parent.name
                )));
            }
        }

        let has_field = |n: &str| fields.iter().any(|f| f.name == n);

        if !has_field(&id) {
            return Err(SchemaError::new(format!(
                "table {} id field not found: {}",
                name, id
            )));
        }

        let missing: Vec<&str> = parents
            .iter()
            .filter(|p| !has_field(&p.id))
            .map(|p| p.id.as_str())
            .collect();
        if !missing.is_empty() {
            return Err(SchemaError::new(format!(
                "table {} parent id not found: {}",
                name,
                missing.join(", ")
            )));
        }

        let colliding: Vec<&str> = parents
            .iter()
            .filter(|p| has_field(&p.name))
            .map(|p| p.name.as_str())
            .collect();
        if !colliding.is_empty() {
            return Err(SchemaError::new(format!(
                "table {} parent relationship collides with field: {}",
                name,
                colliding.join(", ")
            )));
        }

        Ok(Self {
            name,
            id,
            fields,
            parents,
        })
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn parent(&self, name: &str) -> Option<&Parent> {
        self.parents.iter().find(|p| p.name == name)
    }

    /// The first parent relationship pointing at `table`.
    pub fn relationship_to(&self, table: &str) -> Option<&Parent> {
        self.parents.iter().find(|p| p.table == table)
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn parents(&self) -> &[Parent] {
        &self.parents
    }
}

/// A named boolean predicate over one table.
#[derive(Debug, Clone, PartialEq)]
pub struct Spec {
    pub name: String,
    pub table: String,
    pub source: String,
    pub ast: Expr,
}

impl Spec {
    /// Type checks then ref checks the spec body.
    pub fn check(&self, schema: &Schema) -> crate::Result<()> {
        let _span = info_span!("check_spec", spec = %self.name).entered();

        let ty = TypeChecker::new(schema).check(&self.ast)?;
        require_boolean(&format!("spec {}", self.name), &ty)?;
        RefChecker::new(schema).check(&self.table, &self.ast)?;

        debug!(table = %self.table, "spec checked");
        Ok(())
    }

    /// Compiles the spec into a complete `SELECT` over its table.
    pub fn to_sql(&self, schema: &Schema) -> crate::Result<String> {
        let _span = info_span!("spec_to_sql", spec = %self.name).entered();
        let mut sqlizer = Sqlizer::new(schema, &self.table);
        let predicate = self.ast.walk_postorder(&mut sqlizer)?;
        Ok(sqlizer.finish(&predicate))
    }
}

fn require_boolean(what: &str, ty: &TypeSpecifier) -> Result<(), TypeCheckError> {
    if *ty != TypeSpecifier::Boolean {
        return Err(TypeCheckError::new(format!(
            "{} must be Boolean, found {}",
            what, ty
        )));
    }
    Ok(())
}

/// Name resolution for the checker and compiler passes.
pub trait SchemaProvider {
    fn table(&self, name: &str) -> Option<&Table>;
    fn spec(&self, name: &str) -> Option<&Spec>;
}

/// The compilation unit: every table and spec, plus the node id generator
/// shared by every expression parsed against it.
#[derive(Debug, Default)]
pub struct Schema {
    tables: Vec<Table>,
    specs: Vec<Spec>,
    table_index: HashMap<String, usize>,
    spec_index: HashMap<String, usize>,
    ids: NodeIdGen,
}

impl Schema {
    pub fn new(tables: Vec<Table>) -> Result<Self, SchemaError> {
        let mut schema = Self::default();
        for table in tables {
            if schema.table_index.contains_key(&table.name) {
                return Err(SchemaError::new(format!(
                    "duplicate table: {}",
                    table.name
                )));
            }
            schema
                .table_index
                .insert(table.name.clone(), schema.tables.len());
            schema.tables.push(table);
        }
        Ok(schema)
    }

    /// Parses `source` and registers it as a spec over `table`.
    pub fn add_spec(
        &mut self,
        name: impl Into<String>,
        table: impl Into<String>,
        source: impl Into<String>,
    ) -> crate::Result<()> {
        let name = name.into();
        let table = table.into();
        let source = source.into();

        if self.spec_index.contains_key(&name) {
            return Err(SchemaError::new(format!("duplicate spec: {}", name)).into());
        }
        if !self.table_index.contains_key(&table) {
            return Err(SchemaError::new(format!(
                "spec {} table not found: {}",
                name, table
            ))
            .into());
        }

        let ast = parse_source(&source, &self.ids)?;
        debug!(spec = %name, %table, ast = %ast, "spec registered");

        self.spec_index.insert(name.clone(), self.specs.len());
        self.specs.push(Spec {
            name,
            table,
            source,
            ast,
        });
        Ok(())
    }

    pub fn tables(&self) -> &[Table] {
        &self.tables
    }

    pub fn specs(&self) -> &[Spec] {
        &self.specs
    }

    pub fn ids(&self) -> &NodeIdGen {
        &self.ids
    }

    /// Parses an ad-hoc expression with ids from this schema's generator.
    pub fn parse_expression(&self, source: &str) -> crate::Result<Expr> {
        parse_source(source, &self.ids)
    }

    /// Checks every registered spec, stopping at the first failure.
    pub fn check(&self) -> crate::Result<()> {
        for spec in &self.specs {
            spec.check(self)?;
        }
        debug!(specs = self.specs.len(), "schema checked");
        Ok(())
    }

    /// Parses, checks and compiles `source` as a predicate over `table`.
    pub fn compile_expression(&self, table: &str, source: &str) -> crate::Result<String> {
        let _span = info_span!("compile_expression", %table).entered();

        if self.table(table).is_none() {
            return Err(SchemaError::new(format!("table not found: {}", table)).into());
        }

        let expr = self.parse_expression(source)?;
        let ty = TypeChecker::new(self).check(&expr)?;
        require_boolean("expression", &ty)?;
        RefChecker::new(self).check(table, &expr)?;

        let mut sqlizer = Sqlizer::new(self, table);
        let predicate = expr.walk_postorder(&mut sqlizer)?;
        Ok(sqlizer.finish(&predicate))
    }
}

impl SchemaProvider for Schema {
    fn table(&self, name: &str) -> Option<&Table> {
        self.table_index.get(name).map(|&i| &self.tables[i])
    }

    fn spec(&self, name: &str) -> Option<&Spec> {
        self.spec_index.get(name).map(|&i| &self.specs[i])
    }
}
