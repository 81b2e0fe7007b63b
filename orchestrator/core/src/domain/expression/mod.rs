// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Safe Expression Engine
//!
//! A small whitelisted interpreter for computed workflow parameters and step
//! conditions. Source text is tokenized and parsed into an [`Expr`] tree and
//! evaluated against a flat [`EvaluationContext`]; nothing is ever handed to a
//! general-purpose evaluator.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** One interpreter, two façades:
//!   [`Evaluator`] (numeric, hard errors) and [`ConditionEvaluator`]
//!   (boolean, fail-open)
//!
//! # Grammar
//!
//! ```text
//! expression := or_expr [ "if" or_expr "else" expression ]
//! or_expr    := and_expr ( "or" and_expr )*
//! and_expr   := not_expr ( "and" not_expr )*
//! not_expr   := "not" not_expr | comparison
//! comparison := arith ( ("=="|"!="|"<"|"<="|">"|">=") arith )*
//! arith      := term ( ("+"|"-") term )*
//! term       := factor ( ("*"|"/"|"//"|"%") factor )*
//! factor     := ("-"|"+") factor | power
//! power      := primary [ "**" factor ]
//! primary    := NUMBER | STRING | "True" | "False" | NAME
//!             | FUNCTION "(" [ expression ("," expression)* ] ")"
//!             | "(" expression ")"
//! ```

mod condition;
mod context;
mod dependency;
mod evaluator;
mod functions;
mod lexer;
mod parser;

pub use condition::ConditionEvaluator;
pub use context::EvaluationContext;
pub use dependency::{DependencyError, DependencyResolver, ResolvedParameters};
pub use evaluator::Evaluator;
pub use functions::Function;
pub use parser::{parse, BinaryOp, CompareOp, Expr, UnaryOp};

use std::fmt;
use thiserror::Error;

/// Longest expression source accepted, in characters
pub const MAX_EXPRESSION_LENGTH: usize = 4096;

/// Deepest nesting accepted by the parser
pub const MAX_NESTING_DEPTH: usize = 64;

/// Runtime value produced by evaluation
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Number(f64),
    Str(String),
    Bool(bool),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Number(_) => "number",
            Value::Str(_) => "string",
            Value::Bool(_) => "bool",
        }
    }

    /// Numeric view; booleans count as `1.0` / `0.0`, strings are rejected
    pub fn as_number(&self) -> Result<f64, EvalError> {
        match self {
            Value::Number(n) => Ok(*n),
            Value::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
            Value::Str(_) => Err(EvalError::TypeError(
                "expected a number, got a string".to_string(),
            )),
        }
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Number(n) => *n != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::Bool(b) => *b,
        }
    }

    /// Convert a JSON scalar; arrays, objects and null have no expression form
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Number(n) => n.as_f64().map(Value::Number),
            serde_json::Value::String(s) => Some(Value::Str(s.clone())),
            serde_json::Value::Bool(b) => Some(Value::Bool(*b)),
            _ => None,
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Number(n) => serde_json::Number::from_f64(*n)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::Str(s) => serde_json::Value::String(s.clone()),
            Value::Bool(b) => serde_json::Value::Bool(*b),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) => write!(f, "{}", n),
            Value::Str(s) => write!(f, "'{}'", s),
            Value::Bool(b) => write!(f, "{}", if *b { "True" } else { "False" }),
        }
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Number(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Str(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Str(value)
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    #[error("Syntax error at column {column}: {message}")]
    Syntax { message: String, column: usize },

    #[error("Unknown variable '{0}'")]
    UnknownVariable(String),

    #[error("Function '{0}' is not allowed")]
    UnknownFunction(String),

    #[error("Function '{function}' expects {expected} argument(s), got {got}")]
    ArgumentCount {
        function: String,
        expected: String,
        got: usize,
    },

    #[error("Type error: {0}")]
    TypeError(String),

    #[error("Division by zero")]
    DivisionByZero,

    #[error("Result of {0} is not a finite number")]
    NonFinite(String),

    #[error("Expression is {length} characters long, limit is {limit}")]
    InputTooLong { length: usize, limit: usize },

    #[error("Expression nesting exceeds depth {0}")]
    NestingTooDeep(usize),
}

impl EvalError {
    pub(crate) fn syntax(message: impl Into<String>, column: usize) -> Self {
        EvalError::Syntax {
            message: message.into(),
            column,
        }
    }
}
