use thiserror::Error;

use crate::sql_compiler::CompileError;
use crate::config::ConfigError;
use crate::lexer::LexError;
use crate::parser::ParseError;
use crate::ref_checker::RefCheckError;
use crate::schema::SchemaError;
use crate::type_checker::TypeCheckError;

/// Any failure along the pipeline from config file to SQL text.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Lex(#[from] LexError),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    TypeCheck(#[from] TypeCheckError),
    #[error(transparent)]
    RefCheck(#[from] RefCheckError),
    #[error(transparent)]
    Compile(#[from] CompileError),
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
