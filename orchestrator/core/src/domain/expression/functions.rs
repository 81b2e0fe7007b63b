// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use super::EvalError;

/// Whitelisted math functions; any other call name is rejected at parse time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Function {
    Abs,
    Min,
    Max,
    Round,
    Floor,
    Ceil,
    Sqrt,
    Trunc,
    Sin,
    Cos,
    Tan,
    Asin,
    Acos,
    Atan,
    Atan2,
    Degrees,
    Radians,
    Log,
    Log10,
    Log2,
    Exp,
    Pow,
    Hypot,
}

impl Function {
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "abs" => Function::Abs,
            "min" => Function::Min,
            "max" => Function::Max,
            "round" => Function::Round,
            "floor" => Function::Floor,
            "ceil" => Function::Ceil,
            "sqrt" => Function::Sqrt,
            "trunc" => Function::Trunc,
            "sin" => Function::Sin,
            "cos" => Function::Cos,
            "tan" => Function::Tan,
            "asin" => Function::Asin,
            "acos" => Function::Acos,
            "atan" => Function::Atan,
            "atan2" => Function::Atan2,
            "degrees" => Function::Degrees,
            "radians" => Function::Radians,
            "log" => Function::Log,
            "log10" => Function::Log10,
            "log2" => Function::Log2,
            "exp" => Function::Exp,
            "pow" => Function::Pow,
            "hypot" => Function::Hypot,
            _ => return None,
        })
    }

    pub fn name(&self) -> &'static str {
        match self {
            Function::Abs => "abs",
            Function::Min => "min",
            Function::Max => "max",
            Function::Round => "round",
            Function::Floor => "floor",
            Function::Ceil => "ceil",
            Function::Sqrt => "sqrt",
            Function::Trunc => "trunc",
            Function::Sin => "sin",
            Function::Cos => "cos",
            Function::Tan => "tan",
            Function::Asin => "asin",
            Function::Acos => "acos",
            Function::Atan => "atan",
            Function::Atan2 => "atan2",
            Function::Degrees => "degrees",
            Function::Radians => "radians",
            Function::Log => "log",
            Function::Log10 => "log10",
            Function::Log2 => "log2",
            Function::Exp => "exp",
            Function::Pow => "pow",
            Function::Hypot => "hypot",
        }
    }

    /// Accepted argument count as `(min, max)`; `None` means variadic
    fn arity(&self) -> (usize, Option<usize>) {
        match self {
            Function::Min | Function::Max | Function::Hypot => (1, None),
            Function::Round | Function::Log => (1, Some(2)),
            Function::Atan2 | Function::Pow => (2, Some(2)),
            _ => (1, Some(1)),
        }
    }

    pub fn check_arity(&self, got: usize) -> Result<(), EvalError> {
        let (min, max) = self.arity();
        let within = got >= min && max.map_or(true, |max| got <= max);
        if within {
            return Ok(());
        }

        let expected = match max {
            Some(max) if max == min => min.to_string(),
            Some(max) => format!("{} to {}", min, max),
            None => format!("at least {}", min),
        };
        Err(EvalError::ArgumentCount {
            function: self.name().to_string(),
            expected,
            got,
        })
    }

    pub fn apply(&self, args: &[f64]) -> Result<f64, EvalError> {
        self.check_arity(args.len())?;

        let result = match self {
            Function::Abs => args[0].abs(),
            Function::Min => args.iter().copied().fold(f64::INFINITY, f64::min),
            Function::Max => args.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            Function::Round => {
                let digits = match args.get(1) {
                    Some(d) if d.fract() != 0.0 => {
                        return Err(EvalError::TypeError(
                            "round() digits must be an integer".to_string(),
                        ))
                    }
                    Some(d) => *d as i32,
                    None => 0,
                };
                round_half_even(args[0], digits)
            }
            Function::Floor => args[0].floor(),
            Function::Ceil => args[0].ceil(),
            Function::Sqrt => args[0].sqrt(),
            Function::Trunc => args[0].trunc(),
            Function::Sin => args[0].sin(),
            Function::Cos => args[0].cos(),
            Function::Tan => args[0].tan(),
            Function::Asin => args[0].asin(),
            Function::Acos => args[0].acos(),
            Function::Atan => args[0].atan(),
            Function::Atan2 => args[0].atan2(args[1]),
            Function::Degrees => args[0].to_degrees(),
            Function::Radians => args[0].to_radians(),
            Function::Log => match args.get(1) {
                Some(base) => args[0].ln() / base.ln(),
                None => args[0].ln(),
            },
            Function::Log10 => args[0].log10(),
            Function::Log2 => args[0].log2(),
            Function::Exp => args[0].exp(),
            Function::Pow => args[0].powf(args[1]),
            Function::Hypot => args.iter().map(|v| v * v).sum::<f64>().sqrt(),
        };

        if result.is_finite() {
            Ok(result)
        } else {
            Err(EvalError::NonFinite(format!("{}()", self.name())))
        }
    }
}

/// Round to `digits` decimal places, ties to even
fn round_half_even(value: f64, digits: i32) -> f64 {
    if digits == 0 {
        return value.round_ties_even();
    }

    let factor = 10f64.powi(digits);
    let scaled = value * factor;
    if !factor.is_finite() || factor == 0.0 || !scaled.is_finite() {
        return value;
    }
    scaled.round_ties_even() / factor
}
