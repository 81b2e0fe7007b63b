// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use super::functions::Function;
use super::lexer::{Lexer, Token, TokenKind};
use super::{EvalError, MAX_EXPRESSION_LENGTH, MAX_NESTING_DEPTH};

/// Parsed expression tree
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    Str(String),
    Bool(bool),
    Variable(String),
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    /// `a < b <= c` evaluates as `a < b and b <= c` with each operand evaluated once
    Compare {
        first: Box<Expr>,
        rest: Vec<(CompareOp, Expr)>,
    },
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Conditional {
        condition: Box<Expr>,
        then_branch: Box<Expr>,
        else_branch: Box<Expr>,
    },
    Call {
        function: Function,
        args: Vec<Expr>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Pos,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    FloorDiv,
    Mod,
    Pow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
}

/// Parse expression source into a tree, enforcing the length and nesting limits
pub fn parse(source: &str) -> Result<Expr, EvalError> {
    let length = source.chars().count();
    if length > MAX_EXPRESSION_LENGTH {
        return Err(EvalError::InputTooLong {
            length,
            limit: MAX_EXPRESSION_LENGTH,
        });
    }

    let tokens = Lexer::new(source).tokenize()?;
    let mut parser = Parser::new(tokens);

    if parser.check_kind(&TokenKind::Eof) {
        return Err(EvalError::syntax("empty expression", parser.peek().column));
    }

    let expr = parser.parse_expression()?;

    if !parser.check_kind(&TokenKind::Eof) {
        let token = parser.peek();
        return Err(EvalError::syntax(
            format!("unexpected {}", token.kind.describe()),
            token.column,
        ));
    }

    Ok(expr)
}

struct Parser {
    tokens: Vec<Token>,
    index: usize,
    depth: usize,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            index: 0,
            depth: 0,
        }
    }

    fn parse_expression(&mut self) -> Result<Expr, EvalError> {
        self.enter()?;
        let result = self.parse_conditional();
        self.leave();
        result
    }

    fn parse_conditional(&mut self) -> Result<Expr, EvalError> {
        let value = self.parse_or()?;

        if !self.match_kind(&TokenKind::If) {
            return Ok(value);
        }

        let condition = self.parse_or()?;
        self.expect_kind(TokenKind::Else, "expected 'else' in conditional expression")?;
        let else_branch = self.parse_expression()?;

        Ok(Expr::Conditional {
            condition: Box::new(condition),
            then_branch: Box::new(value),
            else_branch: Box::new(else_branch),
        })
    }

    fn parse_or(&mut self) -> Result<Expr, EvalError> {
        let mut left = self.parse_and()?;
        let mut links = 0;
        while self.match_kind(&TokenKind::Or) {
            self.enter()?;
            links += 1;
            let right = self.parse_and()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        self.leave_chain(links);
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, EvalError> {
        let mut left = self.parse_not()?;
        let mut links = 0;
        while self.match_kind(&TokenKind::And) {
            self.enter()?;
            links += 1;
            let right = self.parse_not()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        self.leave_chain(links);
        Ok(left)
    }

    fn parse_not(&mut self) -> Result<Expr, EvalError> {
        if self.match_kind(&TokenKind::Not) {
            self.enter()?;
            let operand = self.parse_not();
            self.leave();
            return Ok(Expr::Unary {
                op: UnaryOp::Not,
                operand: Box::new(operand?),
            });
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<Expr, EvalError> {
        let first = self.parse_arith()?;

        let mut rest = Vec::new();
        while let Some(op) = self.compare_op() {
            self.advance();
            rest.push((op, self.parse_arith()?));
        }

        if rest.is_empty() {
            Ok(first)
        } else {
            Ok(Expr::Compare {
                first: Box::new(first),
                rest,
            })
        }
    }

    fn compare_op(&self) -> Option<CompareOp> {
        Some(match self.peek_kind() {
            TokenKind::EqEq => CompareOp::Eq,
            TokenKind::NotEq => CompareOp::NotEq,
            TokenKind::Lt => CompareOp::Lt,
            TokenKind::Le => CompareOp::Le,
            TokenKind::Gt => CompareOp::Gt,
            TokenKind::Ge => CompareOp::Ge,
            _ => return None,
        })
    }

    fn parse_arith(&mut self) -> Result<Expr, EvalError> {
        let mut left = self.parse_term()?;
        let mut links = 0;
        loop {
            let op = match self.peek_kind() {
                TokenKind::Plus => BinaryOp::Add,
                TokenKind::Minus => BinaryOp::Sub,
                _ => break,
            };
            self.advance();
            self.enter()?;
            links += 1;
            let right = self.parse_term()?;
            left = binary(op, left, right);
        }
        self.leave_chain(links);
        Ok(left)
    }

    fn parse_term(&mut self) -> Result<Expr, EvalError> {
        let mut left = self.parse_factor()?;
        let mut links = 0;
        loop {
            let op = match self.peek_kind() {
                TokenKind::Star => BinaryOp::Mul,
                TokenKind::Slash => BinaryOp::Div,
                TokenKind::DoubleSlash => BinaryOp::FloorDiv,
                TokenKind::Percent => BinaryOp::Mod,
                _ => break,
            };
            self.advance();
            self.enter()?;
            links += 1;
            let right = self.parse_factor()?;
            left = binary(op, left, right);
        }
        self.leave_chain(links);
        Ok(left)
    }

    fn parse_factor(&mut self) -> Result<Expr, EvalError> {
        let op = match self.peek_kind() {
            TokenKind::Minus => UnaryOp::Neg,
            TokenKind::Plus => UnaryOp::Pos,
            _ => return self.parse_power(),
        };
        self.advance();

        self.enter()?;
        let operand = self.parse_factor();
        self.leave();

        Ok(Expr::Unary {
            op,
            operand: Box::new(operand?),
        })
    }

    fn parse_power(&mut self) -> Result<Expr, EvalError> {
        let base = self.parse_primary()?;

        if !self.match_kind(&TokenKind::DoubleStar) {
            return Ok(base);
        }

        // Right-associative and binds tighter than a unary minus on its left
        self.enter()?;
        let exponent = self.parse_factor();
        self.leave();

        Ok(binary(BinaryOp::Pow, base, exponent?))
    }

    fn parse_primary(&mut self) -> Result<Expr, EvalError> {
        let token = self.peek().clone();

        match token.kind {
            TokenKind::Number(value) => {
                self.advance();
                Ok(Expr::Number(value))
            }
            TokenKind::Str(value) => {
                self.advance();
                Ok(Expr::Str(value))
            }
            TokenKind::True => {
                self.advance();
                Ok(Expr::Bool(true))
            }
            TokenKind::False => {
                self.advance();
                Ok(Expr::Bool(false))
            }
            TokenKind::Ident(name) => {
                self.advance();
                if self.check_kind(&TokenKind::LParen) {
                    self.parse_call(&name)
                } else {
                    Ok(Expr::Variable(name))
                }
            }
            TokenKind::LParen => {
                self.advance();
                let expr = self.parse_expression()?;
                self.expect_kind(TokenKind::RParen, "expected ')'")?;
                Ok(expr)
            }
            other => Err(EvalError::syntax(
                format!("unexpected {}", other.describe()),
                token.column,
            )),
        }
    }

    fn parse_call(&mut self, name: &str) -> Result<Expr, EvalError> {
        let function = Function::from_name(name)
            .ok_or_else(|| EvalError::UnknownFunction(name.to_string()))?;

        self.expect_kind(TokenKind::LParen, "expected '(' after function name")?;

        let mut args = Vec::new();
        if !self.check_kind(&TokenKind::RParen) {
            loop {
                args.push(self.parse_expression()?);
                if !self.match_kind(&TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect_kind(TokenKind::RParen, "expected ')' to close argument list")?;

        function.check_arity(args.len())?;

        Ok(Expr::Call { function, args })
    }

    fn enter(&mut self) -> Result<(), EvalError> {
        self.depth += 1;
        if self.depth > MAX_NESTING_DEPTH {
            return Err(EvalError::NestingTooDeep(MAX_NESTING_DEPTH));
        }
        Ok(())
    }

    fn leave(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    /// Each operator in a left-associative chain nests the tree one level deeper
    fn leave_chain(&mut self, links: usize) {
        self.depth = self.depth.saturating_sub(links);
    }

    fn expect_kind(&mut self, expected: TokenKind, message: &str) -> Result<(), EvalError> {
        if self.match_kind(&expected) {
            Ok(())
        } else {
            Err(EvalError::syntax(message, self.peek().column))
        }
    }

    fn match_kind(&mut self, expected: &TokenKind) -> bool {
        if self.check_kind(expected) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn check_kind(&self, expected: &TokenKind) -> bool {
        std::mem::discriminant(self.peek_kind()) == std::mem::discriminant(expected)
    }

    fn peek_kind(&self) -> &TokenKind {
        &self.peek().kind
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.index]
    }

    fn advance(&mut self) {
        if self.index + 1 < self.tokens.len() {
            self.index += 1;
        }
    }
}

fn binary(op: BinaryOp, left: Expr, right: Expr) -> Expr {
    Expr::Binary {
        op,
        left: Box::new(left),
        right: Box::new(right),
    }
}
