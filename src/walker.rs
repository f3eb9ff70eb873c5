//! The two AST traversal protocols.
//!
//! ```text
//! post-order   children reduced first, values flow up     (type checker, sqlizer)
//! pre-order    accumulator flows down from parent to child (ref checker)
//! ```
//!
//! Each protocol is one trait with one method per node kind; [`Expr`] does the
//! dispatch with an exhaustive match, so adding a node kind is a compile error
//! in every walker until it is handled.

use crate::ast::{Expr, ExprKind, NodeId, Reference};
use crate::token::Operator;

pub trait PostorderWalker {
    type Output;
    type Error;

    fn walk_null(&mut self) -> Result<Self::Output, Self::Error>;
    fn walk_boolean(&mut self, value: bool) -> Result<Self::Output, Self::Error>;
    fn walk_number(&mut self, value: f64) -> Result<Self::Output, Self::Error>;
    fn walk_string(&mut self, value: &str) -> Result<Self::Output, Self::Error>;
    fn walk_reference(&mut self, reference: &Reference) -> Result<Self::Output, Self::Error>;

    fn walk_binary(
        &mut self,
        op: Operator,
        left: Self::Output,
        right: Self::Output,
    ) -> Result<Self::Output, Self::Error>;
    fn walk_conjunction(
        &mut self,
        left: Self::Output,
        right: Self::Output,
    ) -> Result<Self::Output, Self::Error>;
    fn walk_disjunction(
        &mut self,
        left: Self::Output,
        right: Self::Output,
    ) -> Result<Self::Output, Self::Error>;
    fn walk_negation(&mut self, child: Self::Output) -> Result<Self::Output, Self::Error>;

    /// Arguments are passed unreduced: whether an argument is a table
    /// reference, a predicate or a value depends on the callee.
    fn walk_macro_expansion(
        &mut self,
        id: NodeId,
        callee: &Reference,
        arguments: &[Expr],
    ) -> Result<Self::Output, Self::Error>;
}

pub trait PreorderWalker {
    type Accumulator;
    type Error;

    fn walk_null(&mut self, previous: &Self::Accumulator)
        -> Result<Self::Accumulator, Self::Error>;
    fn walk_boolean(
        &mut self,
        previous: &Self::Accumulator,
        value: bool,
    ) -> Result<Self::Accumulator, Self::Error>;
    fn walk_number(
        &mut self,
        previous: &Self::Accumulator,
        value: f64,
    ) -> Result<Self::Accumulator, Self::Error>;
    fn walk_string(
        &mut self,
        previous: &Self::Accumulator,
        value: &str,
    ) -> Result<Self::Accumulator, Self::Error>;
    fn walk_reference(
        &mut self,
        previous: &Self::Accumulator,
        reference: &Reference,
    ) -> Result<Self::Accumulator, Self::Error>;

    fn walk_binary(
        &mut self,
        previous: &Self::Accumulator,
        op: Operator,
        left: &Expr,
        right: &Expr,
    ) -> Result<Self::Accumulator, Self::Error>;
    fn walk_conjunction(
        &mut self,
        previous: &Self::Accumulator,
        left: &Expr,
        right: &Expr,
    ) -> Result<Self::Accumulator, Self::Error>;
    fn walk_disjunction(
        &mut self,
        previous: &Self::Accumulator,
        left: &Expr,
        right: &Expr,
    ) -> Result<Self::Accumulator, Self::Error>;
    fn walk_negation(
        &mut self,
        previous: &Self::Accumulator,
        child: &Expr,
    ) -> Result<Self::Accumulator, Self::Error>;
    fn walk_macro_expansion(
        &mut self,
        previous: &Self::Accumulator,
        callee: &Reference,
        arguments: &[Expr],
    ) -> Result<Self::Accumulator, Self::Error>;
}

impl Expr {
    /// Reduces the tree bottom-up.
    pub fn walk_postorder<W: PostorderWalker>(&self, walker: &mut W) -> Result<W::Output, W::Error> {
        match &self.kind {
            ExprKind::Null => walker.walk_null(),
            ExprKind::Boolean(b) => walker.walk_boolean(*b),
            ExprKind::Number(n) => walker.walk_number(*n),
            ExprKind::String(s) => walker.walk_string(s),
            ExprKind::Reference(r) => walker.walk_reference(r),
            ExprKind::Binary { op, left, right } => {
                let left = left.walk_postorder(walker)?;
                let right = right.walk_postorder(walker)?;
                walker.walk_binary(*op, left, right)
            }
            ExprKind::Conjunction(left, right) => {
                let left = left.walk_postorder(walker)?;
                let right = right.walk_postorder(walker)?;
                walker.walk_conjunction(left, right)
            }
            ExprKind::Disjunction(left, right) => {
                let left = left.walk_postorder(walker)?;
                let right = right.walk_postorder(walker)?;
                walker.walk_disjunction(left, right)
            }
            ExprKind::Negation(child) => {
                let child = child.walk_postorder(walker)?;
                walker.walk_negation(child)
            }
            ExprKind::MacroExpansion { callee, arguments } => {
                walker.walk_macro_expansion(self.id, callee, arguments)
            }
        }
    }

    /// Computes the accumulator at this node and threads it into every
    /// child. Returns the accumulator computed at this node.
    pub fn walk_preorder<W: PreorderWalker>(
        &self,
        walker: &mut W,
        previous: &W::Accumulator,
    ) -> Result<W::Accumulator, W::Error> {
        match &self.kind {
            ExprKind::Null => walker.walk_null(previous),
            ExprKind::Boolean(b) => walker.walk_boolean(previous, *b),
            ExprKind::Number(n) => walker.walk_number(previous, *n),
            ExprKind::String(s) => walker.walk_string(previous, s),
            ExprKind::Reference(r) => walker.walk_reference(previous, r),
            ExprKind::Binary { op, left, right } => {
                let current = walker.walk_binary(previous, *op, left, right)?;
                left.walk_preorder(walker, &current)?;
                right.walk_preorder(walker, &current)?;
                Ok(current)
            }
            ExprKind::Conjunction(left, right) => {
                let current = walker.walk_conjunction(previous, left, right)?;
                left.walk_preorder(walker, &current)?;
                right.walk_preorder(walker, &current)?;
                Ok(current)
            }
            ExprKind::Disjunction(left, right) => {
                let current = walker.walk_disjunction(previous, left, right)?;
                left.walk_preorder(walker, &current)?;
                right.walk_preorder(walker, &current)?;
                Ok(current)
            }
            ExprKind::Negation(child) => {
                let current = walker.walk_negation(previous, child)?;
                child.walk_preorder(walker, &current)?;
                Ok(current)
            }
            ExprKind::MacroExpansion { callee, arguments } => {
                let current = walker.walk_macro_expansion(previous, callee, arguments)?;
                for argument in arguments {
                    argument.walk_preorder(walker, &current)?;
                }
                Ok(current)
            }
        }
    }
}
