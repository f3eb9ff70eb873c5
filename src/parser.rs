//! Spec语言的语法分析器
//!
//! ## 解析流程图
//!
//! ```text
//! parse()
//!   ├─ parse_expression()
//!   │    ├─ parse_primary()
//!   │    │    ├─ Number / String        → 字面值
//!   │    │    ├─ null / true / false    → 字面值 (仅单段引用)
//!   │    │    ├─ not <primary>          → 取反
//!   │    │    ├─ Reference "(" args ")" → 宏展开
//!   │    │    ├─ Reference              → 引用
//!   │    │    └─ "(" expression ")"     → 分组表达式
//!   │    │
//!   │    └─ 遇到运算符时: parse_binary(left, op)
//!   │         ├─ parse_primary() 解析右侧
//!   │         └─ 优先级更高的运算符并入右侧
//!   │
//!   └─ 期望输入结束
//! ```
//!
//! ## 运算符优先级（数值越大结合越紧）
//!
//! | operators                 | precedence |
//! |---------------------------|------------|
//! | `*` `/`                   | 40         |
//! | `+` `-`                   | 20         |
//! | `<` `>` `<=` `>=` `=` `!=`| 10         |
//! | `and`                     | 4          |
//! | `or`                      | 2          |
//!
//! `not` 只作用于紧随其后的基本表达式，`not false = true` 即
//! `(not(false) = true)`。

use thiserror::Error;

use crate::ast::{Expr, ExprKind, NodeIdGen, Reference};
use crate::lexer::tokenize;
use crate::token::{Operator, Span, Token, TokenKind};

static END_OF_INPUT: Token<'static> = Token {
    kind: TokenKind::EndOfInput,
    span: Span { start: 0, end: 0 },
};

#[derive(Debug, Clone, PartialEq, Error)]
#[error("parse error: {message}{}", .span.map(|s| format!(" at {}", s)).unwrap_or_default())]
pub struct ParseError {
    pub message: String,
    pub span: Option<Span>,
}

impl ParseError {
    fn new(message: impl Into<String>, span: Option<Span>) -> Self {
        Self {
            message: message.into(),
            span,
        }
    }

    fn at_position(message: impl Into<String>, span: Span) -> Self {
        Self::new(message, Some(span))
    }
}

pub struct Parser<'a> {
    tokens: &'a [Token<'a>],
    position: usize,
    ids: &'a NodeIdGen,
}

impl<'a> Parser<'a> {
    pub fn new(tokens: &'a [Token<'a>], ids: &'a NodeIdGen) -> Self {
        Self {
            tokens,
            position: 0,
            ids,
        }
    }

    /// 当前token，耗尽后视为输入结束
    fn peek(&self) -> &Token<'a> {
        self.tokens.get(self.position).unwrap_or(&END_OF_INPUT)
    }

    /// 当前token的下一个
    fn peek_next(&self) -> &Token<'a> {
        self.tokens.get(self.position + 1).unwrap_or(&END_OF_INPUT)
    }

    /// 返回当前token并前进
    fn advance(&mut self) -> &Token<'a> {
        let token = self.tokens.get(self.position).unwrap_or(&END_OF_INPUT);
        if self.position < self.tokens.len() {
            self.position += 1;
        }
        token
    }

    fn current_operator(&self) -> Option<Operator> {
        match self.peek().kind {
            TokenKind::Operator(op) => Some(op),
            _ => None,
        }
    }

    fn node(&self, kind: ExprKind) -> Expr {
        Expr::new(self.ids.fresh(), kind)
    }

    /// 解析一个完整表达式，之后必须是输入结束
    pub fn parse(&mut self) -> Result<Expr, ParseError> {
        let result = self.parse_expression()?;

        let token = self.peek();
        if token.kind != TokenKind::EndOfInput {
            return Err(ParseError::at_position(
                format!("too much input at {}", token.kind),
                token.span,
            ));
        }
        Ok(result)
    }

    fn parse_expression(&mut self) -> Result<Expr, ParseError> {
        let mut result = self.parse_primary()?;
        while let Some(op) = self.current_operator() {
            result = self.parse_binary(result, op)?;
        }
        Ok(result)
    }

    /// 优先级爬升，当前token为 `op`
    fn parse_binary(&mut self, left: Expr, op: Operator) -> Result<Expr, ParseError> {
        self.advance(); // 消费运算符

        let mut right = self.parse_primary()?;
        while let Some(next) = self.current_operator() {
            if next.precedence() <= op.precedence() {
                break;
            }
            right = self.parse_binary(right, next)?;
        }

        let kind = match op {
            Operator::And => ExprKind::Conjunction(Box::new(left), Box::new(right)),
            Operator::Or => ExprKind::Disjunction(Box::new(left), Box::new(right)),
            _ => ExprKind::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            },
        };
        Ok(self.node(kind))
    }

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        let token = self.peek().clone();
        match token.kind {
            TokenKind::EndOfInput => Err(ParseError::new("not enough input", None)),
            TokenKind::Number(n) => {
                self.advance();
                Ok(self.node(ExprKind::Number(n)))
            }
            TokenKind::String(s) => {
                self.advance();
                Ok(self.node(ExprKind::String(s.into_owned())))
            }
            TokenKind::Reference(raw) => self.parse_reference(raw),
            TokenKind::OpenParen => {
                self.advance(); // consume (
                let expr = self.parse_expression()?;
                let close = self.peek().clone();
                match close.kind {
                    TokenKind::CloseParen => {
                        self.advance();
                        Ok(expr)
                    }
                    TokenKind::EndOfInput => Err(ParseError::new("not enough input", None)),
                    _ => Err(ParseError::at_position(
                        format!("expected close paren, found {}", close.kind),
                        close.span,
                    )),
                }
            }
            other => Err(ParseError::at_position(
                format!("unexpected {}", other),
                token.span,
            )),
        }
    }

    fn parse_reference(&mut self, raw: &str) -> Result<Expr, ParseError> {
        let reference = Reference::parse(raw);

        if let Some(word) = reference.as_single() {
            match word.to_ascii_lowercase().as_str() {
                "null" => {
                    self.advance();
                    return Ok(self.node(ExprKind::Null));
                }
                "true" => {
                    self.advance();
                    return Ok(self.node(ExprKind::Boolean(true)));
                }
                "false" => {
                    self.advance();
                    return Ok(self.node(ExprKind::Boolean(false)));
                }
                "not" => {
                    self.advance();
                    let child = self.parse_primary()?;
                    return Ok(self.node(ExprKind::Negation(Box::new(child))));
                }
                _ => {}
            }
        }

        if self.peek_next().kind == TokenKind::OpenParen {
            self.advance(); // reference
            self.advance(); // (
            let arguments = self.parse_arguments()?;
            return Ok(self.node(ExprKind::MacroExpansion {
                callee: reference,
                arguments,
            }));
        }

        self.advance();
        Ok(self.node(ExprKind::Reference(reference)))
    }

    /// 解析 `expr ("," expr)* ")"`，左括号已经被消费
    fn parse_arguments(&mut self) -> Result<Vec<Expr>, ParseError> {
        let mut arguments = Vec::new();
        loop {
            arguments.push(self.parse_expression()?);

            let token = self.peek().clone();
            match token.kind {
                TokenKind::Comma => {
                    self.advance();
                }
                TokenKind::CloseParen => {
                    self.advance();
                    return Ok(arguments);
                }
                TokenKind::EndOfInput => return Err(ParseError::new("not enough input", None)),
                _ => {
                    return Err(ParseError::at_position(
                        format!("expected comma or close paren, found {}", token.kind),
                        token.span,
                    ));
                }
            }
        }
    }
}

/// 词法分析并解析 `source`，节点id取自 `ids`
pub fn parse_source(source: &str, ids: &NodeIdGen) -> Result<Expr, crate::Error> {
    let tokens = tokenize(source)?;
    let expr = Parser::new(&tokens, ids).parse()?;
    Ok(expr)
}
