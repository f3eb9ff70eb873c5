//! AST for the spec language.
//!
//! Every node carries a [`NodeId`] that is unique within the compilation unit
//! that allocated it; generated SQL artifacts (CTE names, marker columns) are
//! named after these ids.

use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

use crate::token::Operator;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Hands out node ids. One generator is owned by each compilation unit
/// (normally the [`Schema`](crate::schema::Schema)) and shared by every parse
/// within it.
#[derive(Debug, Default)]
pub struct NodeIdGen {
    next: AtomicU32,
}

impl NodeIdGen {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fresh(&self) -> NodeId {
        NodeId(self.next.fetch_add(1, Ordering::Relaxed) + 1)
    }
}

/// A dotted reference, e.g. `Account.Owner.Type`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Reference {
    pub segments: Vec<String>,
}

impl Reference {
    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            segments: segments.into_iter().map(Into::into).collect(),
        }
    }

    /// Splits a raw `a.b.c` token.
    pub fn parse(raw: &str) -> Self {
        Self::new(raw.split('.'))
    }

    pub fn first(&self) -> &str {
        self.segments.first().map(String::as_str).unwrap_or("")
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// The single segment of a one-segment reference.
    pub fn as_single(&self) -> Option<&str> {
        match self.segments.as_slice() {
            [only] => Some(only),
            _ => None,
        }
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("."))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub id: NodeId,
    pub kind: ExprKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Null,
    Boolean(bool),
    Number(f64),
    String(String),
    Reference(Reference),
    /// Comparison or arithmetic; never `and`/`or`
    Binary {
        op: Operator,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Conjunction(Box<Expr>, Box<Expr>),
    Disjunction(Box<Expr>, Box<Expr>),
    Negation(Box<Expr>),
    /// A builtin reducer or spec invocation, e.g. `ANY(Account, ...)`
    MacroExpansion {
        callee: Reference,
        arguments: Vec<Expr>,
    },
}

impl Expr {
    pub fn new(id: NodeId, kind: ExprKind) -> Self {
        Self { id, kind }
    }

    pub fn as_reference(&self) -> Option<&Reference> {
        match &self.kind {
            ExprKind::Reference(r) => Some(r),
            _ => None,
        }
    }
}

/// Convenience constructors drawing ids from a generator; used by tests and
/// by callers that build specs programmatically.
impl NodeIdGen {
    pub fn null(&self) -> Expr {
        Expr::new(self.fresh(), ExprKind::Null)
    }

    pub fn boolean(&self, value: bool) -> Expr {
        Expr::new(self.fresh(), ExprKind::Boolean(value))
    }

    pub fn number(&self, value: f64) -> Expr {
        Expr::new(self.fresh(), ExprKind::Number(value))
    }

    pub fn string(&self, value: impl Into<String>) -> Expr {
        Expr::new(self.fresh(), ExprKind::String(value.into()))
    }

    pub fn reference(&self, raw: &str) -> Expr {
        Expr::new(self.fresh(), ExprKind::Reference(Reference::parse(raw)))
    }

    pub fn binary(&self, op: Operator, left: Expr, right: Expr) -> Expr {
        let kind = match op {
            Operator::And => ExprKind::Conjunction(Box::new(left), Box::new(right)),
            Operator::Or => ExprKind::Disjunction(Box::new(left), Box::new(right)),
            _ => ExprKind::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            },
        };
        Expr::new(self.fresh(), kind)
    }

    pub fn negation(&self, child: Expr) -> Expr {
        Expr::new(self.fresh(), ExprKind::Negation(Box::new(child)))
    }

    pub fn macro_expansion(&self, callee: &str, arguments: Vec<Expr>) -> Expr {
        Expr::new(
            self.fresh(),
            ExprKind::MacroExpansion {
                callee: Reference::parse(callee),
                arguments,
            },
        )
    }
}

/// Renders the expression back as fully parenthesized spec source.
impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ExprKind::Null => write!(f, "null"),
            ExprKind::Boolean(b) => write!(f, "{}", b),
            ExprKind::Number(n) => write!(f, "{}", n),
            ExprKind::String(s) => {
                write!(f, "'{}'", s.replace('\\', "\\\\").replace('\'', "\\'"))
            }
            ExprKind::Reference(r) => write!(f, "{}", r),
            ExprKind::Binary { op, left, right } => write!(f, "({} {} {})", left, op, right),
            ExprKind::Conjunction(l, r) => write!(f, "({} and {})", l, r),
            ExprKind::Disjunction(l, r) => write!(f, "({} or {})", l, r),
            ExprKind::Negation(c) => write!(f, "not({})", c),
            ExprKind::MacroExpansion { callee, arguments } => {
                write!(f, "{}(", callee)?;
                for (i, arg) in arguments.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                write!(f, ")")
            }
        }
    }
}
