//! Checks that every table a reference starts from is reachable at that
//! point: either the root table or a child table brought in by a builtin.

use thiserror::Error;
use tracing::trace;

use crate::ast::{Expr, Reference};
use crate::builtins::Reducer;
use crate::schema::SchemaProvider;
use crate::token::Operator;
use crate::walker::PreorderWalker;

#[derive(Debug, Clone, PartialEq, Error)]
#[error("reference error: {message}")]
pub struct RefCheckError {
    pub message: String,
}

impl RefCheckError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Pre-order walker whose accumulator is the list of joined tables.
pub struct RefChecker<'s> {
    schema: &'s dyn SchemaProvider,
}

impl<'s> RefChecker<'s> {
    pub fn new(schema: &'s dyn SchemaProvider) -> Self {
        Self { schema }
    }

    /// Checks `expr` with only `root` joined.
    pub fn check(&mut self, root: &str, expr: &Expr) -> Result<(), RefCheckError> {
        expr.walk_preorder(self, &vec![root.to_string()])?;
        trace!(root, expr = %expr, "references checked");
        Ok(())
    }

    fn is_callable(&self, name: &str) -> bool {
        Reducer::lookup(name).is_some() || self.schema.spec(name).is_some()
    }
}

type Tables = Vec<String>;

impl PreorderWalker for RefChecker<'_> {
    type Accumulator = Tables;
    type Error = RefCheckError;

    fn walk_null(&mut self, tables: &Tables) -> Result<Tables, RefCheckError> {
        Ok(tables.clone())
    }

    fn walk_boolean(&mut self, tables: &Tables, _value: bool) -> Result<Tables, RefCheckError> {
        Ok(tables.clone())
    }

    fn walk_number(&mut self, tables: &Tables, _value: f64) -> Result<Tables, RefCheckError> {
        Ok(tables.clone())
    }

    fn walk_string(&mut self, tables: &Tables, _value: &str) -> Result<Tables, RefCheckError> {
        Ok(tables.clone())
    }

    fn walk_reference(
        &mut self,
        tables: &Tables,
        reference: &Reference,
    ) -> Result<Tables, RefCheckError> {
        if reference.is_empty() {
            return Err(RefCheckError::new("reference has no segments"));
        }

        if reference.as_single().is_some_and(|name| self.is_callable(name)) {
            return Ok(tables.clone());
        }

        if !tables.iter().any(|t| t == reference.first()) {
            return Err(RefCheckError::new(format!(
                "reference is not to a joined table: {}",
                reference.first()
            )));
        }

        Ok(tables.clone())
    }

    fn walk_binary(
        &mut self,
        tables: &Tables,
        _op: Operator,
        _left: &Expr,
        _right: &Expr,
    ) -> Result<Tables, RefCheckError> {
        Ok(tables.clone())
    }

    fn walk_conjunction(
        &mut self,
        tables: &Tables,
        _left: &Expr,
        _right: &Expr,
    ) -> Result<Tables, RefCheckError> {
        Ok(tables.clone())
    }

    fn walk_disjunction(
        &mut self,
        tables: &Tables,
        _left: &Expr,
        _right: &Expr,
    ) -> Result<Tables, RefCheckError> {
        Ok(tables.clone())
    }

    fn walk_negation(&mut self, tables: &Tables, _child: &Expr) -> Result<Tables, RefCheckError> {
        Ok(tables.clone())
    }

    fn walk_macro_expansion(
        &mut self,
        tables: &Tables,
        callee: &Reference,
        arguments: &[Expr],
    ) -> Result<Tables, RefCheckError> {
        let Some(name) = callee.as_single() else {
            return Err(RefCheckError::new(format!(
                "function reference has invalid segment count: {}",
                callee
            )));
        };

        if Reducer::lookup(name).is_some() {
            let child = arguments
                .first()
                .and_then(Expr::as_reference)
                .filter(|r| matches!(r.len(), 1 | 2))
                .ok_or_else(|| RefCheckError::new("builtin requires reference parameter"))?;

            let mut joined = tables.clone();
            joined.push(child.first().to_string());
            return Ok(joined);
        }

        if self.schema.spec(name).is_some() {
            return Ok(tables.clone());
        }

        Err(RefCheckError::new(format!(
            "function reference not found: {}",
            callee
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Field, FieldType, Parent, Schema, Table};

    fn schema() -> Schema {
        let foobar = Table::new(
            "Foobar",
            "Id",
            vec![Field::new("Id", FieldType::Number)],
            vec![],
        )
        .unwrap();
        let potato = Table::new(
            "Potato",
            "Id",
            vec![
                Field::new("Id", FieldType::Number),
                Field::new("FoobarId", FieldType::Number),
                Field::new("Type", FieldType::String),
            ],
            vec![Parent::new("Foobar", "Foobar", "FoobarId")],
        )
        .unwrap();
        let mut schema = Schema::new(vec![foobar, potato]).unwrap();
        schema.add_spec("isTasty", "Potato", "Potato.Type = 'Russet'").unwrap();
        schema
    }

    fn check(source: &str) -> Result<(), RefCheckError> {
        let schema = schema();
        let expr = schema.parse_expression(source).unwrap();
        RefChecker::new(&schema).check("Foobar", &expr)
    }

    #[test]
    fn test_root_table_is_joined() {
        check("Foobar.Id = 1").unwrap();
        check("null = 1 or true").unwrap();
    }

    #[test]
    fn test_unjoined_table_is_rejected() {
        let err = check("Potato.Type = 'Fingerling'").unwrap_err();
        assert_eq!(err.message, "reference is not to a joined table: Potato");

        let err = check("not (Potato.Id = 1)").unwrap_err();
        assert!(err.message.contains("Potato"));
    }

    #[test]
    fn test_builtin_joins_child_table() {
        check("ANY(Potato, Potato.Type = 'Fingerling')").unwrap();
        check("all(Potato.Foobar, Potato.Type = 'Fingerling')").unwrap();
        check("NONE(Potato, isTasty(Potato))").unwrap();
    }

    #[test]
    fn test_builtin_scope_does_not_leak() {
        let err = check("ANY(Potato, true) and Potato.Id = 1").unwrap_err();
        assert!(err.message.contains("not to a joined table: Potato"));
    }

    #[test]
    fn test_builtin_requires_reference() {
        let err = check("ANY(1, true)").unwrap_err();
        assert_eq!(err.message, "builtin requires reference parameter");

        let err = check("ANY(Potato.Foobar.Id, true)").unwrap_err();
        assert_eq!(err.message, "builtin requires reference parameter");
    }

    #[test]
    fn test_spec_arguments_keep_scope() {
        let err = check("isTasty(Potato)").unwrap_err();
        assert!(err.message.contains("not to a joined table: Potato"));
    }

    #[test]
    fn test_unknown_function() {
        let err = check("potato(Foobar)").unwrap_err();
        assert!(err.message.contains("reference"));

        let err = check("Foobar.any(Foobar)").unwrap_err();
        assert!(err.message.contains("segment count"));
    }
}
