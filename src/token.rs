//! The token definition for the spec language.

use std::borrow::Cow;
use std::fmt;

/// A token is a single unit of the language, with a specific kind and location.
#[derive(Debug, Clone, PartialEq)]
pub struct Token<'a> {
    pub kind: TokenKind<'a>,
    pub span: Span,
}

impl<'a> Token<'a> {
    pub fn new(kind: TokenKind<'a>, span: Span) -> Self {
        Self { kind, span }
    }

    /// The source text this token was lexed from.
    pub fn raw<'s>(&self, source: &'s str) -> &'s str {
        source.get(self.span.start..self.span.end).unwrap_or("")
    }
}

/// The kind of a token.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind<'a> {
    /// A dotted identifier chain, e.g. `Account.Owner.Type`
    Reference(&'a str),
    /// The unescaped contents of a quoted string
    String(Cow<'a, str>),
    Number(f64),
    Operator(Operator),

    // Punctuation
    OpenParen,  // (
    CloseParen, // )
    Comma,      // ,

    EndOfInput,
}

impl fmt::Display for TokenKind<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Reference(r) => write!(f, "{}", r),
            TokenKind::String(s) => write!(f, "'{}'", s),
            TokenKind::Number(n) => write!(f, "{}", n),
            TokenKind::Operator(op) => write!(f, "{}", op),
            TokenKind::OpenParen => write!(f, "("),
            TokenKind::CloseParen => write!(f, ")"),
            TokenKind::Comma => write!(f, ","),
            TokenKind::EndOfInput => write!(f, "end of input"),
        }
    }
}

/// Infix operators, canonicalized (`AND` and `and` are the same operator).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    Mul,   // *
    Div,   // /
    Add,   // +
    Sub,   // -
    Lt,    // <
    Gt,    // >
    Lte,   // <=
    Gte,   // >=
    Eq,    // =
    NotEq, // !=
    And,   // and
    Or,    // or
}

impl Operator {
    /// Binding strength for precedence climbing; higher binds tighter.
    pub fn precedence(self) -> u8 {
        match self {
            Operator::Mul | Operator::Div => 40,
            Operator::Add | Operator::Sub => 20,
            Operator::Lt
            | Operator::Gt
            | Operator::Lte
            | Operator::Gte
            | Operator::Eq
            | Operator::NotEq => 10,
            Operator::And => 4,
            Operator::Or => 2,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Operator::Mul => "*",
            Operator::Div => "/",
            Operator::Add => "+",
            Operator::Sub => "-",
            Operator::Lt => "<",
            Operator::Gt => ">",
            Operator::Lte => "<=",
            Operator::Gte => ">=",
            Operator::Eq => "=",
            Operator::NotEq => "!=",
            Operator::And => "and",
            Operator::Or => "or",
        }
    }

    pub fn is_comparison(self) -> bool {
        self.precedence() == 10
    }

    pub fn is_equality(self) -> bool {
        matches!(self, Operator::Eq | Operator::NotEq)
    }

    pub fn is_arithmetic(self) -> bool {
        matches!(
            self,
            Operator::Mul | Operator::Div | Operator::Add | Operator::Sub
        )
    }

    /// Looks up a symbolic or word operator, ignoring case for `and`/`or`.
    pub fn from_word(word: &str) -> Option<Self> {
        if word.eq_ignore_ascii_case("and") {
            Some(Operator::And)
        } else if word.eq_ignore_ascii_case("or") {
            Some(Operator::Or)
        } else {
            None
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Represents a span in the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    /// The starting byte offset.
    pub start: usize,
    /// The ending byte offset.
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_precedence_ordering() {
        assert!(Operator::Mul.precedence() > Operator::Add.precedence());
        assert!(Operator::Add.precedence() > Operator::Eq.precedence());
        assert!(Operator::Eq.precedence() > Operator::And.precedence());
        assert!(Operator::And.precedence() > Operator::Or.precedence());
        assert_eq!(Operator::Div.precedence(), Operator::Mul.precedence());
    }

    #[test]
    fn test_word_operators_ignore_case() {
        assert_eq!(Operator::from_word("AND"), Some(Operator::And));
        assert_eq!(Operator::from_word("Or"), Some(Operator::Or));
        assert_eq!(Operator::from_word("not"), None);
    }

    #[test]
    fn test_operator_classes() {
        assert!(Operator::Lte.is_comparison());
        assert!(!Operator::Lte.is_equality());
        assert!(Operator::NotEq.is_equality());
        assert!(Operator::Sub.is_arithmetic());
        assert!(!Operator::And.is_comparison());
    }
}
