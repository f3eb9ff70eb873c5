//! SQL compiler that turns a checked spec expression into a T-SQL predicate.
//!
//! ```text
//! Expr ──walk_postorder──▶ Sqlizer ──▶ predicate text
//!                            │
//!                            ├─ joins   INNER JOIN per parent hop, LEFT JOIN per reducer
//!                            └─ ctes    one per ANY / NONE / ALL
//!
//! finish(predicate):
//!   WITH cte1,
//!   cte2
//!   SELECT [Table].* FROM [Table]
//!   <joins>
//!   WHERE <predicate>
//! ```
//!
//! Identifiers are bracket quoted. Joins are keyed by alias path (`Account.Owner`)
//! so the same relationship chain is joined once, however often it is used.

use thiserror::Error;
use tracing::{debug, trace};

use crate::ast::{Expr, NodeId, Reference};
use crate::builtins::{self, Reducer};
use crate::schema::{FieldType, SchemaProvider, Table};
use crate::token::Operator;
use crate::walker::PostorderWalker;

#[derive(Debug, Clone, PartialEq, Error)]
#[error("compile error: {message}")]
pub struct CompileError {
    pub message: String,
}

impl CompileError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Post-order walker producing SQL for one root table.
///
/// The returned text is only the predicate; joins and CTEs it depends on
/// accumulate on the compiler and are assembled by [`Sqlizer::finish`].
pub struct Sqlizer<'s> {
    schema: &'s dyn SchemaProvider,
    table: String,
    alias: Option<String>,
    /// `(alias path, clause)` in first-use order
    joins: Vec<(String, String)>,
    ctes: Vec<String>,
}

impl<'s> Sqlizer<'s> {
    pub fn new(schema: &'s dyn SchemaProvider, table: &str) -> Self {
        Self {
            schema,
            table: table.to_string(),
            alias: None,
            joins: Vec::new(),
            ctes: Vec::new(),
        }
    }

    /// Compiles references to `table` against an existing alias, as when a
    /// spec is invoked on `Account.Owner`.
    pub fn with_alias(schema: &'s dyn SchemaProvider, table: &str, alias: impl Into<String>) -> Self {
        Self {
            alias: Some(alias.into()),
            ..Self::new(schema, table)
        }
    }

    pub fn schema(&self) -> &'s dyn SchemaProvider {
        self.schema
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// The name the root table is known by in the generated SQL.
    pub fn root(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.table)
    }

    pub fn joins(&self) -> impl Iterator<Item = &str> {
        self.joins.iter().map(|(_, clause)| clause.as_str())
    }

    pub fn ctes(&self) -> &[String] {
        &self.ctes
    }

    pub(crate) fn add_join(&mut self, key: String, clause: String) {
        if self.joins.iter().any(|(k, _)| *k == key) {
            return;
        }
        trace!(%key, %clause, "join added");
        self.joins.push((key, clause));
    }

    pub(crate) fn add_cte(&mut self, cte: String) {
        if !self.ctes.contains(&cte) {
            self.ctes.push(cte);
        }
    }

    /// Takes over the joins and CTEs of a nested compile.
    fn absorb(&mut self, nested: Sqlizer<'_>) {
        for cte in nested.ctes {
            self.add_cte(cte);
        }
        for (key, clause) in nested.joins {
            self.add_join(key, clause);
        }
    }

    /// Assembles the full statement around `predicate`.
    pub fn finish(&self, predicate: &str) -> String {
        let mut parts = Vec::with_capacity(self.joins.len() + 3);
        if !self.ctes.is_empty() {
            parts.push(format!("WITH {}", self.ctes.join(",\n")));
        }
        parts.push(format!("SELECT [{0}].* FROM [{0}]", self.table));
        parts.extend(self.joins().map(str::to_string));
        parts.push(format!("WHERE {}", predicate));
        parts.join("\n")
    }

    fn lookup_table(&self, name: &str) -> Result<&'s Table, CompileError> {
        self.schema
            .table(name)
            .ok_or_else(|| CompileError::new(format!("table not found: {}", name)))
    }

    /// Walks `segments` from `alias` over `table`, joining each parent hop.
    fn serialize_path(
        &mut self,
        mut alias: String,
        mut table: &'s Table,
        segments: &[String],
    ) -> Result<String, CompileError> {
        for (i, segment) in segments.iter().enumerate() {
            if let Some(field) = table.field(segment) {
                if i + 1 != segments.len() {
                    return Err(CompileError::new(format!(
                        "field {}.{} has no members",
                        table.name, field.name
                    )));
                }
                let column = format!("[{}].[{}]", alias, field.name);
                return Ok(match field.field_type {
                    FieldType::Boolean => column + " = 1",
                    _ => column,
                });
            }

            let parent = table.parent(segment).ok_or_else(|| {
                CompileError::new(format!(
                    "parent not found on table {}: {}",
                    table.name, segment
                ))
            })?;
            let target = self.lookup_table(&parent.table)?;

            let rel = format!("{}.{}", alias, parent.name);
            let clause = format!(
                "INNER JOIN [{}] [{}] ON [{}].[{}] = [{}].[{}]",
                target.name, rel, rel, target.id, alias, parent.id
            );
            self.add_join(rel.clone(), clause);

            alias = rel;
            table = target;
        }

        Ok(format!("[{}]", alias))
    }

    fn expand_spec(&mut self, name: &str, arguments: &[Expr]) -> Result<String, CompileError> {
        let Some(spec) = self.schema.spec(name) else {
            return Err(CompileError::new(format!("function not found: {}", name)));
        };

        let [argument] = arguments else {
            return Err(CompileError::new(format!(
                "spec {} takes exactly one argument, found {}",
                name,
                arguments.len()
            )));
        };

        let rendered = argument.walk_postorder(self)?;
        let alias = rendered
            .strip_prefix('[')
            .and_then(|s| s.strip_suffix(']'))
            .filter(|s| !s.contains("].["))
            .ok_or_else(|| {
                CompileError::new(format!(
                    "spec {} argument must be a table reference, found {}",
                    name, rendered
                ))
            })?;

        debug!(spec = name, alias, "inlining spec");

        let mut nested = Sqlizer::with_alias(self.schema, &spec.table, alias);
        let predicate = spec.ast.walk_postorder(&mut nested)?;
        self.absorb(nested);
        Ok(predicate)
    }
}

impl PostorderWalker for Sqlizer<'_> {
    type Output = String;
    type Error = CompileError;

    fn walk_null(&mut self) -> Result<String, CompileError> {
        Ok("NULL".to_string())
    }

    fn walk_boolean(&mut self, value: bool) -> Result<String, CompileError> {
        Ok(if value { "TRUE" } else { "FALSE" }.to_string())
    }

    fn walk_number(&mut self, value: f64) -> Result<String, CompileError> {
        Ok(value.to_string())
    }

    fn walk_string(&mut self, value: &str) -> Result<String, CompileError> {
        Ok(format!(
            "'{}'",
            value.replace('\\', "\\\\").replace('\'', "\\'")
        ))
    }

    fn walk_reference(&mut self, reference: &Reference) -> Result<String, CompileError> {
        if reference.is_empty() {
            return Err(CompileError::new("reference has no segments"));
        }

        let first = reference.first();
        let table = self.lookup_table(first)?;
        let alias = if first == self.table {
            self.root().to_string()
        } else {
            first.to_string()
        };

        self.serialize_path(alias, table, &reference.segments[1..])
    }

    fn walk_binary(&mut self, op: Operator, left: String, right: String) -> Result<String, CompileError> {
        Ok(format!("({} {} {})", left, op.as_str(), right))
    }

    fn walk_conjunction(&mut self, left: String, right: String) -> Result<String, CompileError> {
        Ok(format!("({} AND {})", left, right))
    }

    fn walk_disjunction(&mut self, left: String, right: String) -> Result<String, CompileError> {
        Ok(format!("({} OR {})", left, right))
    }

    fn walk_negation(&mut self, child: String) -> Result<String, CompileError> {
        Ok(format!("NOT({})", child))
    }

    fn walk_macro_expansion(
        &mut self,
        id: NodeId,
        callee: &Reference,
        arguments: &[Expr],
    ) -> Result<String, CompileError> {
        let Some(name) = callee.as_single() else {
            return Err(CompileError::new(format!(
                "function reference has invalid segment count: {}",
                callee
            )));
        };

        match Reducer::lookup(name) {
            Some(reducer) => builtins::expand(self, reducer, id, arguments),
            None => self.expand_spec(name, arguments),
        }
    }
}
