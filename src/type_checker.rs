//! Structural type checking of spec expressions against a schema.

use thiserror::Error;
use tracing::trace;

use crate::ast::{Expr, NodeId, Reference};
use crate::builtins::Reducer;
use crate::schema::SchemaProvider;
use crate::token::Operator;
use crate::types::TypeSpecifier;
use crate::walker::PostorderWalker;

#[derive(Debug, Clone, PartialEq, Error)]
#[error("type error: {message}")]
pub struct TypeCheckError {
    pub message: String,
}

impl TypeCheckError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Computes the type of every node bottom-up.
pub struct TypeChecker<'s> {
    schema: &'s dyn SchemaProvider,
}

impl<'s> TypeChecker<'s> {
    pub fn new(schema: &'s dyn SchemaProvider) -> Self {
        Self { schema }
    }

    /// The type of the whole expression.
    pub fn check(&mut self, expr: &Expr) -> Result<TypeSpecifier, TypeCheckError> {
        let ty = expr.walk_postorder(self)?;
        trace!(expr = %expr, ty = %ty, "type checked");
        Ok(ty)
    }

    fn resolve_path(&self, reference: &Reference) -> Result<TypeSpecifier, TypeCheckError> {
        let Some(mut table) = self.schema.table(reference.first()) else {
            return Err(TypeCheckError::new(format!(
                "unknown reference: {}",
                reference
            )));
        };

        let rest = &reference.segments[1..];
        for (i, segment) in rest.iter().enumerate() {
            if let Some(field) = table.field(segment) {
                if i + 1 != rest.len() {
                    return Err(TypeCheckError::new(format!(
                        "field {}.{} has no members: {}",
                        table.name, field.name, reference
                    )));
                }
                return Ok(field.field_type.type_specifier());
            }

            let Some(parent) = table.parent(segment) else {
                return Err(TypeCheckError::new(format!(
                    "no field or parent named {} on table {}",
                    segment, table.name
                )));
            };
            table = self.schema.table(&parent.table).ok_or_else(|| {
                TypeCheckError::new(format!("parent table not found: {}", parent.table))
            })?;
        }

        Ok(TypeSpecifier::table(&table.name))
    }
}

fn invalid_operands(op: Operator, left: &TypeSpecifier, right: &TypeSpecifier) -> TypeCheckError {
    TypeCheckError::new(format!(
        "invalid types for operator {}: {} and {}",
        op, left, right
    ))
}

impl PostorderWalker for TypeChecker<'_> {
    type Output = TypeSpecifier;
    type Error = TypeCheckError;

    fn walk_null(&mut self) -> Result<TypeSpecifier, TypeCheckError> {
        Ok(TypeSpecifier::Any)
    }

    fn walk_boolean(&mut self, _value: bool) -> Result<TypeSpecifier, TypeCheckError> {
        Ok(TypeSpecifier::Boolean)
    }

    fn walk_number(&mut self, _value: f64) -> Result<TypeSpecifier, TypeCheckError> {
        Ok(TypeSpecifier::Number)
    }

    fn walk_string(&mut self, _value: &str) -> Result<TypeSpecifier, TypeCheckError> {
        Ok(TypeSpecifier::String)
    }

    fn walk_reference(&mut self, reference: &Reference) -> Result<TypeSpecifier, TypeCheckError> {
        if self.schema.table(reference.first()).is_some() {
            return self.resolve_path(reference);
        }

        if let Some(name) = reference.as_single() {
            if Reducer::lookup(name).is_some() {
                return Ok(TypeSpecifier::function(
                    TypeSpecifier::Boolean,
                    vec![TypeSpecifier::Any, TypeSpecifier::Any],
                ));
            }
            if let Some(spec) = self.schema.spec(name) {
                return Ok(TypeSpecifier::function(
                    TypeSpecifier::Boolean,
                    vec![TypeSpecifier::table(&spec.table)],
                ));
            }
        }

        Err(TypeCheckError::new(format!("unknown reference: {}", reference)))
    }

    fn walk_binary(
        &mut self,
        op: Operator,
        left: TypeSpecifier,
        right: TypeSpecifier,
    ) -> Result<TypeSpecifier, TypeCheckError> {
        if op.is_arithmetic() {
            if left != TypeSpecifier::Number || right != TypeSpecifier::Number {
                return Err(invalid_operands(op, &left, &right));
            }
            return Ok(TypeSpecifier::Number);
        }

        if matches!(left, TypeSpecifier::Function { .. })
            || matches!(right, TypeSpecifier::Function { .. })
        {
            return Err(invalid_operands(op, &left, &right));
        }

        if (left == TypeSpecifier::Any || right == TypeSpecifier::Any) && !op.is_equality() {
            return Err(invalid_operands(op, &left, &right));
        }

        let Some(coalesced) = left.coalesce(&right) else {
            return Err(TypeCheckError::new(format!(
                "incompatible types in {}: {} and {}",
                op, left, right
            )));
        };

        let orderable = matches!(
            coalesced,
            TypeSpecifier::Number | TypeSpecifier::String | TypeSpecifier::Date
        );
        if !op.is_equality() && !orderable {
            return Err(invalid_operands(op, &left, &right));
        }

        Ok(TypeSpecifier::Boolean)
    }

    fn walk_conjunction(
        &mut self,
        left: TypeSpecifier,
        right: TypeSpecifier,
    ) -> Result<TypeSpecifier, TypeCheckError> {
        if left != TypeSpecifier::Boolean || right != TypeSpecifier::Boolean {
            return Err(TypeCheckError::new(format!(
                "incompatible types in conjunction: {} and {}",
                left, right
            )));
        }
        Ok(TypeSpecifier::Boolean)
    }

    fn walk_disjunction(
        &mut self,
        left: TypeSpecifier,
        right: TypeSpecifier,
    ) -> Result<TypeSpecifier, TypeCheckError> {
        if left != TypeSpecifier::Boolean || right != TypeSpecifier::Boolean {
            return Err(TypeCheckError::new(format!(
                "incompatible types in disjunction: {} and {}",
                left, right
            )));
        }
        Ok(TypeSpecifier::Boolean)
    }

    fn walk_negation(&mut self, child: TypeSpecifier) -> Result<TypeSpecifier, TypeCheckError> {
        if child != TypeSpecifier::Boolean {
            return Err(TypeCheckError::new(format!(
                "incompatible types in negation: {}",
                child
            )));
        }
        Ok(TypeSpecifier::Boolean)
    }

    fn walk_macro_expansion(
        &mut self,
        _id: NodeId,
        callee: &Reference,
        arguments: &[Expr],
    ) -> Result<TypeSpecifier, TypeCheckError> {
        let TypeSpecifier::Function {
            returns,
            parameters,
        } = self.walk_reference(callee)?
        else {
            return Err(TypeCheckError::new(format!("{} is not a function", callee)));
        };

        if arguments.len() != parameters.len() {
            return Err(TypeCheckError::new(format!(
                "arity mismatch calling {}: expected {} arguments, found {}",
                callee,
                parameters.len(),
                arguments.len()
            )));
        }

        for (argument, parameter) in arguments.iter().zip(&parameters) {
            let ty = argument.walk_postorder(self)?;
            if ty.coalesce(parameter).is_none() {
                return Err(TypeCheckError::new(format!(
                    "parameter mismatch calling {}: expected {}, found {}",
                    callee, parameter, ty
                )));
            }
        }

        Ok(*returns)
    }
}
