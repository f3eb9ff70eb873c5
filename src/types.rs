//! Type specifiers for spec expressions.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeSpecifier {
    /// Only the `null` literal has this type
    Any,
    Boolean,
    Number,
    String,
    Date,
    Table(String),
    Function {
        returns: Box<TypeSpecifier>,
        parameters: Vec<TypeSpecifier>,
    },
}

impl TypeSpecifier {
    pub fn table(name: impl Into<String>) -> Self {
        TypeSpecifier::Table(name.into())
    }

    pub fn function(returns: TypeSpecifier, parameters: Vec<TypeSpecifier>) -> Self {
        TypeSpecifier::Function {
            returns: Box::new(returns),
            parameters,
        }
    }

    /// Combines two specifiers into the more specific one. `Any` absorbs into
    /// anything; otherwise the two must be equal. `None` when incompatible.
    pub fn coalesce(&self, other: &TypeSpecifier) -> Option<TypeSpecifier> {
        match (self, other) {
            (TypeSpecifier::Any, _) => Some(other.clone()),
            (_, TypeSpecifier::Any) => Some(self.clone()),
            (a, b) if a == b => Some(a.clone()),
            _ => None,
        }
    }
}

impl fmt::Display for TypeSpecifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeSpecifier::Any => write!(f, "Any"),
            TypeSpecifier::Boolean => write!(f, "Boolean"),
            TypeSpecifier::Number => write!(f, "Number"),
            TypeSpecifier::String => write!(f, "String"),
            TypeSpecifier::Date => write!(f, "Date"),
            TypeSpecifier::Table(name) => write!(f, "{}", name),
            TypeSpecifier::Function {
                returns,
                parameters,
            } => {
                write!(f, "(")?;
                for (i, p) in parameters.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", p)?;
                }
                write!(f, ") -> {}", returns)
            }
        }
    }
}
