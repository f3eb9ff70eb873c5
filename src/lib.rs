//! Compiles spec expressions, small typed predicates over a relational
//! schema, into T-SQL `WHERE` clauses.
//!
//! ```text
//! source ─▶ lexer ─▶ parser ─▶ Expr ─▶ type_checker ─▶ ref_checker ─▶ sql_compiler ─▶ SQL
//!                                 ▲            ▲              ▲              ▲
//!                                 └────────────┴──── schema ──┴──────────────┘
//! ```

pub mod ast;
pub mod builtins;
pub mod config;
pub mod error;
pub mod lexer;
pub mod parser;
pub mod ref_checker;
pub mod schema;
pub mod sql_compiler;
pub mod token;
pub mod type_checker;
pub mod types;
pub mod walker;

pub use error::{Error, Result};
