//! Spec语言的词法分析器

use std::borrow::Cow;

use thiserror::Error;

use crate::token::{Operator, Span, Token, TokenKind};

/// 无法切分为token的输入
#[derive(Debug, Clone, PartialEq, Error)]
#[error("lexer error: {message} at {span}")]
pub struct LexError {
    pub message: String,
    pub span: Span,
}

impl LexError {
    fn new(message: impl Into<String>, span: Span) -> Self {
        Self {
            message: message.into(),
            span,
        }
    }
}

pub struct Lexer<'a> {
    input: &'a str,
    /// 输入字符串中的当前位置（字节索引）
    position: usize,
    /// 迭代器已产出输入结束或错误后置位
    finished: bool,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Lexer {
            input,
            position: 0,
            finished: false,
        }
    }

    /// 返回当前位置的字符，不推进位置
    fn peek(&self) -> Option<char> {
        self.input[self.position..].chars().next()
    }

    /// 返回下一个位置的字符，不推进位置
    fn peek_next(&self) -> Option<char> {
        self.input[self.position..].chars().nth(1)
    }

    /// 推进位置一个字符并返回该字符
    fn bump(&mut self) -> Option<char> {
        let c = self.peek();
        if let Some(c) = c {
            self.position += c.len_utf8();
        }
        c
    }

    /// 跳过空白字符和 `#` 行注释
    fn skip_trivia(&mut self) {
        while let Some(c) = self.peek() {
            if c.is_whitespace() {
                self.bump();
            } else if c == '#' {
                while let Some(c) = self.peek() {
                    if c == '\n' || c == '\r' {
                        break;
                    }
                    self.bump();
                }
            } else {
                break;
            }
        }
    }

    fn token(&self, kind: TokenKind<'a>, start: usize) -> Token<'a> {
        Token::new(kind, Span::new(start, self.position))
    }

    /// 读取数字字面量 `-?[0-9]+(\.[0-9]+)?`
    /// 注意：前导的 `-` 已经被调用者消费
    fn read_number(&mut self, start: usize) -> Result<Token<'a>, LexError> {
        self.eat_digits();
        if self.peek() == Some('.') && self.peek_next().is_some_and(|c| c.is_ascii_digit()) {
            self.bump(); // '.'
            self.eat_digits();
        }

        let text = &self.input[start..self.position];
        let value = text.parse::<f64>().map_err(|_| {
            LexError::new(
                format!("invalid number {}", text),
                Span::new(start, self.position),
            )
        })?;
        Ok(self.token(TokenKind::Number(value), start))
    }

    fn eat_digits(&mut self) {
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.bump();
        }
    }

    /// 读取引号包围的字符串字面量
    /// 注意：开始的引号已经被调用者消费
    fn read_string(&mut self, start: usize, quote: char) -> Result<Token<'a>, LexError> {
        let content_start = self.position;
        loop {
            match self.bump() {
                Some('\\') => {
                    // 转义后的字符不会结束字符串
                    self.bump();
                }
                Some(c) if c == quote => break,
                Some(_) => {}
                None => {
                    return Err(LexError::new(
                        "string value not closed",
                        Span::new(start, self.position),
                    ));
                }
            }
        }
        let content = &self.input[content_start..self.position - quote.len_utf8()];
        Ok(self.token(TokenKind::String(unescape(content, quote)), start))
    }

    /// 读取以点分隔的引用链
    /// `and`/`or` 读作运算符
    fn read_reference(&mut self, start: usize) -> Token<'a> {
        loop {
            while self.peek().is_some_and(is_ident_continue) {
                self.bump();
            }
            if self.peek() == Some('.') && self.peek_next().is_some_and(is_ident_start) {
                self.bump(); // '.'
                continue;
            }
            break;
        }

        let literal = &self.input[start..self.position];
        let kind = match Operator::from_word(literal) {
            Some(op) => TokenKind::Operator(op),
            None => TokenKind::Reference(literal),
        };
        self.token(kind, start)
    }

    /// 产出下一个token，到达输入末尾后一直返回 `EndOfInput`
    pub fn next_token(&mut self) -> Result<Token<'a>, LexError> {
        self.skip_trivia();
        let start = self.position;

        let Some(c) = self.bump() else {
            return Ok(self.token(TokenKind::EndOfInput, start));
        };

        let token = match c {
            '(' => self.token(TokenKind::OpenParen, start),
            ')' => self.token(TokenKind::CloseParen, start),
            ',' => self.token(TokenKind::Comma, start),
            '=' => self.token(TokenKind::Operator(Operator::Eq), start),
            '+' => self.token(TokenKind::Operator(Operator::Add), start),
            '*' => self.token(TokenKind::Operator(Operator::Mul), start),
            '/' => self.token(TokenKind::Operator(Operator::Div), start),
            '<' => {
                if self.peek() == Some('=') {
                    self.bump();
                    self.token(TokenKind::Operator(Operator::Lte), start)
                } else {
                    self.token(TokenKind::Operator(Operator::Lt), start)
                }
            }
            '>' => {
                if self.peek() == Some('=') {
                    self.bump();
                    self.token(TokenKind::Operator(Operator::Gte), start)
                } else {
                    self.token(TokenKind::Operator(Operator::Gt), start)
                }
            }
            '!' => {
                if self.peek() == Some('=') {
                    self.bump();
                    self.token(TokenKind::Operator(Operator::NotEq), start)
                } else {
                    return Err(LexError::new(
                        "invalid input !",
                        Span::new(start, self.position),
                    ));
                }
            }
            '-' => {
                if self.peek().is_some_and(|c| c.is_ascii_digit()) {
                    self.read_number(start)?
                } else {
                    self.token(TokenKind::Operator(Operator::Sub), start)
                }
            }
            '\'' | '"' => self.read_string(start, c)?,
            c if c.is_ascii_digit() => self.read_number(start)?,
            c if is_ident_start(c) => self.read_reference(start),
            other => {
                return Err(LexError::new(
                    format!("invalid input {}", other),
                    Span::new(start, self.position),
                ));
            }
        };
        Ok(token)
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_ident_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Removes backslash escapes of the enclosing quote and of the backslash
/// itself. Any other escape sequence is kept verbatim.
fn unescape(content: &str, quote: char) -> Cow<'_, str> {
    if !content.contains('\\') {
        return Cow::Borrowed(content);
    }

    let mut value = String::with_capacity(content.len());
    let mut chars = content.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            value.push(c);
            continue;
        }
        match chars.next() {
            Some(escaped) if escaped == quote || escaped == '\\' => value.push(escaped),
            Some(other) => {
                value.push('\\');
                value.push(other);
            }
            None => value.push('\\'),
        }
    }
    Cow::Owned(value)
}

/// 切分整个输入，以 `EndOfInput` 结尾
pub fn tokenize(input: &str) -> Result<Vec<Token<'_>>, LexError> {
    let mut lexer = Lexer::new(input);
    let mut tokens = Vec::new();
    loop {
        let token = lexer.next_token()?;
        let done = token.kind == TokenKind::EndOfInput;
        tokens.push(token);
        if done {
            return Ok(tokens);
        }
    }
}

impl<'a> Iterator for Lexer<'a> {
    type Item = Result<Token<'a>, LexError>;

    /// Yields every token before end of input, then stops. An error is
    /// yielded once and ends the iteration.
    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        match self.next_token() {
            Ok(token) if token.kind == TokenKind::EndOfInput => {
                self.finished = true;
                None
            }
            Ok(token) => Some(Ok(token)),
            Err(e) => {
                self.finished = true;
                Some(Err(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(input: &str) -> Vec<TokenKind<'_>> {
        Lexer::new(input)
            .map(|t| t.map(|t| t.kind))
            .collect::<Result<_, _>>()
            .unwrap()
    }

    #[test]
    fn test_empty_input_is_end_of_input_forever() {
        for input in ["", "   \n\t ", "# just a comment", "  # one\n# two\n"] {
            let mut lexer = Lexer::new(input);
            for _ in 0..3 {
                assert_eq!(lexer.next_token().unwrap().kind, TokenKind::EndOfInput);
            }
        }
    }

    #[test]
    fn test_references() {
        assert_eq!(
            kinds("foo Bar.Baz _q1.x_2"),
            vec![
                TokenKind::Reference("foo"),
                TokenKind::Reference("Bar.Baz"),
                TokenKind::Reference("_q1.x_2"),
            ]
        );
    }

    #[test]
    fn test_all_operators_and_punctuation() {
        let input = "< > <= >= = != + - * / and OR ( ) ,";
        assert_eq!(
            kinds(input),
            vec![
                TokenKind::Operator(Operator::Lt),
                TokenKind::Operator(Operator::Gt),
                TokenKind::Operator(Operator::Lte),
                TokenKind::Operator(Operator::Gte),
                TokenKind::Operator(Operator::Eq),
                TokenKind::Operator(Operator::NotEq),
                TokenKind::Operator(Operator::Add),
                TokenKind::Operator(Operator::Sub),
                TokenKind::Operator(Operator::Mul),
                TokenKind::Operator(Operator::Div),
                TokenKind::Operator(Operator::And),
                TokenKind::Operator(Operator::Or),
                TokenKind::OpenParen,
                TokenKind::CloseParen,
                TokenKind::Comma,
            ]
        );
    }

    #[test]
    fn test_word_operators_need_whole_word() {
        assert_eq!(
            kinds("android Foo.and"),
            vec![
                TokenKind::Reference("android"),
                TokenKind::Reference("Foo.and"),
            ]
        );
    }

    #[test]
    fn test_numbers() {
        assert_eq!(
            kinds("42 -1 4.2 0"),
            vec![
                TokenKind::Number(42.0),
                TokenKind::Number(-1.0),
                TokenKind::Number(4.2),
                TokenKind::Number(0.0),
            ]
        );
    }

    #[test]
    fn test_strings() {
        assert_eq!(
            kinds(r#"'foo' "bar baz" 'it\'s' "say \"hi\"" '\\'"#),
            vec![
                TokenKind::String("foo".into()),
                TokenKind::String("bar baz".into()),
                TokenKind::String("it's".into()),
                TokenKind::String("say \"hi\"".into()),
                TokenKind::String("\\".into()),
            ]
        );
    }

    #[test]
    fn test_escaped_quotes_round_trip() {
        assert_eq!(kinds(r"'\'\''"), vec![TokenKind::String("''".into())]);
    }

    #[test]
    fn test_other_escapes_are_kept() {
        assert_eq!(kinds(r"'a\nb'"), vec![TokenKind::String("a\\nb".into())]);
    }

    #[test]
    fn test_unclosed_string() {
        for input in ["'foo", "\"bar", r"'escaped\'"] {
            let err = Lexer::new(input).next_token().unwrap_err();
            assert!(err.message.contains("not closed"), "{}", err);
        }
    }

    #[test]
    fn test_invalid_input() {
        for input in ["@", "!", "Foo ; Bar"] {
            let err = tokenize(input).unwrap_err();
            assert!(err.message.contains("invalid"), "{}", err);
        }
    }

    #[test]
    fn test_comments_are_skipped() {
        let input = "Foo.Bar # trailing\n= 'x' # another";
        assert_eq!(
            kinds(input),
            vec![
                TokenKind::Reference("Foo.Bar"),
                TokenKind::Operator(Operator::Eq),
                TokenKind::String("x".into()),
            ]
        );
    }

    #[test]
    fn test_tokenize_ends_with_end_of_input() {
        let tokens = tokenize("isManager(Account.Owner)").unwrap();
        assert_eq!(tokens.len(), 5);
        assert_eq!(tokens[4].kind, TokenKind::EndOfInput);
        assert_eq!(tokens[2].raw("isManager(Account.Owner)"), "Account.Owner");
    }

    #[test]
    fn test_complex_spec() {
        let input = "ANY(Account, Account.Owner.Type = 'Manager') and not User.IsActive";
        assert_eq!(
            kinds(input),
            vec![
                TokenKind::Reference("ANY"),
                TokenKind::OpenParen,
                TokenKind::Reference("Account"),
                TokenKind::Comma,
                TokenKind::Reference("Account.Owner.Type"),
                TokenKind::Operator(Operator::Eq),
                TokenKind::String("Manager".into()),
                TokenKind::CloseParen,
                TokenKind::Operator(Operator::And),
                TokenKind::Reference("not"),
                TokenKind::Reference("User.IsActive"),
            ]
        );
    }
}
