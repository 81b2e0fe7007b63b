// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use super::EvalError;

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Token {
    pub kind: TokenKind,
    pub column: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum TokenKind {
    Number(f64),
    Str(String),
    Ident(String),
    True,
    False,
    And,
    Or,
    Not,
    If,
    Else,
    Plus,
    Minus,
    Star,
    DoubleStar,
    Slash,
    DoubleSlash,
    Percent,
    EqEq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
    LParen,
    RParen,
    Comma,
    Eof,
}

impl TokenKind {
    pub fn describe(&self) -> String {
        match self {
            TokenKind::Number(n) => format!("number {}", n),
            TokenKind::Str(_) => "string literal".to_string(),
            TokenKind::Ident(name) => format!("name '{}'", name),
            TokenKind::Eof => "end of expression".to_string(),
            other => format!("{:?}", other),
        }
    }
}

pub(crate) struct Lexer<'a> {
    source: &'a str,
    index: usize,
    column: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            index: 0,
            column: 1,
        }
    }

    pub fn tokenize(mut self) -> Result<Vec<Token>, EvalError> {
        let mut tokens = Vec::new();

        while let Some(ch) = self.peek_char() {
            if ch.is_whitespace() {
                self.advance_char();
                continue;
            }

            let column = self.column;
            let kind = match ch {
                '(' => self.single(TokenKind::LParen),
                ')' => self.single(TokenKind::RParen),
                ',' => self.single(TokenKind::Comma),
                '+' => self.single(TokenKind::Plus),
                '-' => self.single(TokenKind::Minus),
                '%' => self.single(TokenKind::Percent),
                '*' if self.starts_with("**") => self.double(TokenKind::DoubleStar),
                '*' => self.single(TokenKind::Star),
                '/' if self.starts_with("//") => self.double(TokenKind::DoubleSlash),
                '/' => self.single(TokenKind::Slash),
                '=' if self.starts_with("==") => self.double(TokenKind::EqEq),
                '!' if self.starts_with("!=") => self.double(TokenKind::NotEq),
                '<' if self.starts_with("<=") => self.double(TokenKind::Le),
                '<' => self.single(TokenKind::Lt),
                '>' if self.starts_with(">=") => self.double(TokenKind::Ge),
                '>' => self.single(TokenKind::Gt),
                '\'' | '"' => self.lex_string(ch)?,
                c if c.is_ascii_digit()
                    || (c == '.'
                        && self
                            .peek_second_char()
                            .map(|next| next.is_ascii_digit())
                            .unwrap_or(false)) =>
                {
                    self.lex_number()?
                }
                c if is_ident_start(c) => self.lex_identifier(),
                '.' => return Err(EvalError::syntax("attribute access is not allowed", column)),
                '[' | ']' => return Err(EvalError::syntax("subscripts are not allowed", column)),
                '=' => return Err(EvalError::syntax("assignment is not allowed", column)),
                _ => {
                    return Err(EvalError::syntax(
                        format!("unexpected character '{}'", ch),
                        column,
                    ))
                }
            };

            tokens.push(Token { kind, column });
        }

        tokens.push(Token {
            kind: TokenKind::Eof,
            column: self.column,
        });

        Ok(tokens)
    }

    fn single(&mut self, kind: TokenKind) -> TokenKind {
        self.advance_char();
        kind
    }

    fn double(&mut self, kind: TokenKind) -> TokenKind {
        self.advance_char();
        self.advance_char();
        kind
    }

    fn lex_identifier(&mut self) -> TokenKind {
        let start = self.index;
        self.advance_char();
        while self.peek_char().map(is_ident_continue).unwrap_or(false) {
            self.advance_char();
        }

        match &self.source[start..self.index] {
            "and" => TokenKind::And,
            "or" => TokenKind::Or,
            "not" => TokenKind::Not,
            "if" => TokenKind::If,
            "else" => TokenKind::Else,
            "True" | "true" => TokenKind::True,
            "False" | "false" => TokenKind::False,
            ident => TokenKind::Ident(ident.to_string()),
        }
    }

    fn lex_number(&mut self) -> Result<TokenKind, EvalError> {
        let column = self.column;
        let start = self.index;

        while self.peek_char().map(|c| c.is_ascii_digit()).unwrap_or(false) {
            self.advance_char();
        }

        if self.peek_char() == Some('.')
            && !self
                .peek_second_char()
                .map(is_ident_start)
                .unwrap_or(false)
        {
            self.advance_char();
            while self.peek_char().map(|c| c.is_ascii_digit()).unwrap_or(false) {
                self.advance_char();
            }
        }

        if let Some('e' | 'E') = self.peek_char() {
            self.advance_char();
            if let Some('+' | '-') = self.peek_char() {
                self.advance_char();
            }

            let mut exp_digits = 0usize;
            while self.peek_char().map(|c| c.is_ascii_digit()).unwrap_or(false) {
                exp_digits += 1;
                self.advance_char();
            }

            if exp_digits == 0 {
                return Err(EvalError::syntax("invalid exponent in number", column));
            }
        }

        if self.peek_char().map(is_ident_start).unwrap_or(false) {
            return Err(EvalError::syntax("invalid number literal", column));
        }

        let text = &self.source[start..self.index];
        let value = text
            .parse::<f64>()
            .map_err(|e| EvalError::syntax(format!("invalid number literal: {}", e), column))?;

        if !value.is_finite() {
            return Err(EvalError::syntax("number literal out of range", column));
        }

        Ok(TokenKind::Number(value))
    }

    fn lex_string(&mut self, quote: char) -> Result<TokenKind, EvalError> {
        let column = self.column;
        self.advance_char();

        let mut value = String::new();
        loop {
            match self.advance_char() {
                None => return Err(EvalError::syntax("unterminated string literal", column)),
                Some(c) if c == quote => break,
                Some('\\') => match self.advance_char() {
                    Some('n') => value.push('\n'),
                    Some('t') => value.push('\t'),
                    Some(c @ ('\\' | '\'' | '"')) => value.push(c),
                    _ => return Err(EvalError::syntax("invalid escape sequence", self.column)),
                },
                Some(c) => value.push(c),
            }
        }

        Ok(TokenKind::Str(value))
    }

    fn starts_with(&self, pattern: &str) -> bool {
        self.source[self.index..].starts_with(pattern)
    }

    fn peek_char(&self) -> Option<char> {
        self.source[self.index..].chars().next()
    }

    fn peek_second_char(&self) -> Option<char> {
        let mut chars = self.source[self.index..].chars();
        chars.next()?;
        chars.next()
    }

    fn advance_char(&mut self) -> Option<char> {
        let ch = self.peek_char()?;
        self.index += ch.len_utf8();
        self.column += 1;
        Some(ch)
    }
}

fn is_ident_start(ch: char) -> bool {
    ch == '_' || ch.is_ascii_alphabetic()
}

fn is_ident_continue(ch: char) -> bool {
    ch == '_' || ch.is_ascii_alphanumeric()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        Lexer::new(source)
            .tokenize()
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn test_operators() {
        assert_eq!(
            kinds("a ** 2 // 3 <= b != 'x'"),
            vec![
                TokenKind::Ident("a".into()),
                TokenKind::DoubleStar,
                TokenKind::Number(2.0),
                TokenKind::DoubleSlash,
                TokenKind::Number(3.0),
                TokenKind::Le,
                TokenKind::Ident("b".into()),
                TokenKind::NotEq,
                TokenKind::Str("x".into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_numbers() {
        assert_eq!(kinds("1.5")[0], TokenKind::Number(1.5));
        assert_eq!(kinds(".25")[0], TokenKind::Number(0.25));
        assert_eq!(kinds("2e3")[0], TokenKind::Number(2000.0));
        assert_eq!(kinds("3.")[0], TokenKind::Number(3.0));
    }

    #[test]
    fn test_keywords() {
        assert_eq!(
            kinds("not True and false or x if y else z"),
            vec![
                TokenKind::Not,
                TokenKind::True,
                TokenKind::And,
                TokenKind::False,
                TokenKind::Or,
                TokenKind::Ident("x".into()),
                TokenKind::If,
                TokenKind::Ident("y".into()),
                TokenKind::Else,
                TokenKind::Ident("z".into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_rejects_forbidden_syntax() {
        for source in ["obj.attr", "x[0]", "a = 1", "$x", "1 & 2", "`x`", "'open", "2e"] {
            assert!(
                matches!(Lexer::new(source).tokenize(), Err(EvalError::Syntax { .. })),
                "expected syntax error for {:?}",
                source
            );
        }
    }

    #[test]
    fn test_error_column() {
        let err = Lexer::new("width.real").tokenize().unwrap_err();
        assert_eq!(
            err,
            EvalError::Syntax {
                message: "attribute access is not allowed".into(),
                column: 6
            }
        );
    }
}
