// Copyright 2025 STARGA Inc.
// Licensed under the Apache License, Version 2.0 (the “License”);
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at:
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an “AS IS” BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

// Part of the Frechet project (directional derivatives as nested closures).

//! Lowering of parsed functions into recorded programs.
//!
//! The syntax tree is walked once with [`Traced`] placeholders bound to the
//! parameters, so every builtin goes through the same recording path as
//! hand-written Rust passed to [`record_function`](crate::trace::record_function).

use std::collections::HashMap;

use crate::ast::{BinOp, Expr, Function, Span};
use crate::diagnostics::Diagnostic;
use crate::ir::{MalformedProgram, Program};
use crate::trace::{try_record_function, Traced};

#[derive(Debug, thiserror::Error)]
pub enum LowerError {
    #[error("unknown variable '{name}'")]
    UnknownVariable { name: String, span: Span },
    #[error("unknown function '{name}'")]
    UnknownFunction { name: String, span: Span },
    #[error("'{callee}' expects {expected} argument(s), got {found}")]
    WrongArity {
        callee: String,
        expected: usize,
        found: usize,
        span: Span,
    },
    #[error("circshift amount must be an integer literal within isize range")]
    NonIntegerShift { span: Span },
    #[error("function '{name}' must take at least one parameter")]
    NoParameters { name: String, span: Span },
    #[error("parameter '{name}' is declared twice")]
    DuplicateParameter { name: String, span: Span },
    #[error(transparent)]
    Malformed(#[from] MalformedProgram),
}

impl LowerError {
    pub fn span(&self) -> Option<Span> {
        match self {
            LowerError::UnknownVariable { span, .. }
            | LowerError::UnknownFunction { span, .. }
            | LowerError::WrongArity { span, .. }
            | LowerError::NonIntegerShift { span }
            | LowerError::NoParameters { span, .. }
            | LowerError::DuplicateParameter { span, .. } => Some(*span),
            LowerError::Malformed(_) => None,
        }
    }

    pub fn to_diagnostic(&self, src: &str) -> Diagnostic {
        let span = self.span().map(|s| s.range()).unwrap_or(0..0);
        Diagnostic::new(src, self.to_string(), span)
    }
}

/// Record `function` as a program whose arguments are its parameters.
pub fn lower_function(function: &Function) -> Result<Program, LowerError> {
    if function.params.is_empty() {
        return Err(LowerError::NoParameters {
            name: function.name.clone(),
            span: function.span,
        });
    }
    let mut seen = HashMap::new();
    for (position, param) in function.params.iter().enumerate() {
        if seen.insert(param.name.as_str(), position).is_some() {
            return Err(LowerError::DuplicateParameter {
                name: param.name.clone(),
                span: param.span,
            });
        }
    }

    try_record_function(function.params.len(), |args| {
        let scope: HashMap<&str, &Traced> = function
            .params
            .iter()
            .map(|p| p.name.as_str())
            .zip(args.iter())
            .collect();
        // Constants are recorded through the first placeholder.
        lower_expr(&function.body, &scope, &args[0])
    })
}

fn lower_expr(
    expr: &Expr,
    scope: &HashMap<&str, &Traced>,
    anchor: &Traced,
) -> Result<Traced, LowerError> {
    match expr {
        Expr::Num(value, _) => Ok(anchor.constant(*value)),
        Expr::Var(name, span) => scope
            .get(name.as_str())
            .map(|traced| (*traced).clone())
            .ok_or_else(|| LowerError::UnknownVariable {
                name: name.clone(),
                span: *span,
            }),
        Expr::Neg(inner, _) => Ok(-lower_expr(inner, scope, anchor)?),
        Expr::Binary {
            op, left, right, ..
        } => {
            let lhs = lower_expr(left, scope, anchor)?;
            let rhs = lower_expr(right, scope, anchor)?;
            Ok(match op {
                BinOp::Add => lhs + rhs,
                BinOp::Sub => lhs - rhs,
                BinOp::Mul => lhs * rhs,
                BinOp::Div => lhs / rhs,
            })
        }
        Expr::Index { base, index, .. } => Ok(lower_expr(base, scope, anchor)?.index(*index)),
        Expr::Call { callee, args, span } => lower_call(callee, args, *span, scope, anchor),
    }
}

fn lower_call(
    callee: &str,
    args: &[Expr],
    span: Span,
    scope: &HashMap<&str, &Traced>,
    anchor: &Traced,
) -> Result<Traced, LowerError> {
    let expect = |expected: usize| {
        if args.len() == expected {
            Ok(())
        } else {
            Err(LowerError::WrongArity {
                callee: callee.to_string(),
                expected,
                found: args.len(),
                span,
            })
        }
    };

    if callee == "circshift" {
        expect(2)?;
        let value = lower_expr(&args[0], scope, anchor)?;
        let shift = match &args[1] {
            Expr::Num(k, span) => shift_amount(*k, *span)?,
            Expr::Neg(inner, _) => match inner.as_ref() {
                Expr::Num(k, span) => -shift_amount(*k, *span)?,
                other => return Err(LowerError::NonIntegerShift { span: other.span() }),
            },
            other => return Err(LowerError::NonIntegerShift { span: other.span() }),
        };
        return Ok(value.circshift(shift));
    }

    if callee == "dot" {
        expect(2)?;
        let lhs = lower_expr(&args[0], scope, anchor)?;
        let rhs = lower_expr(&args[1], scope, anchor)?;
        return Ok(lhs.dot(&rhs));
    }

    let unary: fn(&Traced) -> Traced = match callee {
        "sin" => Traced::sin,
        "cos" => Traced::cos,
        "exp" => Traced::exp,
        "log" => Traced::ln,
        "sqrt" => Traced::sqrt,
        "abs" => Traced::abs,
        "sign" => Traced::sign,
        "sum" => Traced::sum,
        "zero_like" => Traced::zero_like,
        _ => {
            return Err(LowerError::UnknownFunction {
                name: callee.to_string(),
                span,
            })
        }
    };
    expect(1)?;
    Ok(unary(&lower_expr(&args[0], scope, anchor)?))
}

fn shift_amount(value: f64, span: Span) -> Result<isize, LowerError> {
    // isize::MAX as f64 rounds up to 2^63, so the bound is exclusive.
    if value.fract() == 0.0 && value.abs() < isize::MAX as f64 {
        Ok(value as isize)
    } else {
        Err(LowerError::NonIntegerShift { span })
    }
}
