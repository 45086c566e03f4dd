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

//! Parser for the expression front-end.
//!
//! # Example
//! ```
//! use frechet::parser;
//! let function = parser::parse("fn f(x, y) = x[0] * sin(y)").unwrap();
//! assert_eq!(function.params.len(), 2);
//! ```

use std::ops::Range;

use chumsky::prelude::*;

use crate::ast::{BinOp, Expr, Function, Param, Span};
use crate::diagnostics::Diagnostic;

fn span_of(sp: Range<usize>) -> Span {
    Span::new(sp.start, sp.end)
}

fn binary(left: Expr, (op, right): (BinOp, Expr)) -> Expr {
    let span = Span::new(left.span().start(), right.span().end());
    Expr::Binary {
        op,
        left: Box::new(left),
        right: Box::new(right),
        span,
    }
}

pub fn parser() -> impl Parser<char, Function, Error = Simple<char>> {
    let expr = recursive(|expr| {
        let number = text::int(10)
            .then(just('.').ignore_then(text::digits(10)).or_not())
            .try_map(|(int, frac): (String, Option<String>), sp: Range<usize>| {
                let digits = match frac {
                    Some(frac) => format!("{int}.{frac}"),
                    None => int,
                };
                digits
                    .parse::<f64>()
                    .map(|value| Expr::Num(value, span_of(sp.clone())))
                    .map_err(|e| Simple::custom(sp, e.to_string()))
            })
            .padded();

        let args = expr
            .clone()
            .separated_by(just(',').padded())
            .allow_trailing()
            .delimited_by(just('(').padded(), just(')').padded());

        let named = text::ident()
            .then(args.or_not())
            .map_with_span(|(name, args): (String, Option<Vec<Expr>>), sp| {
                let span = span_of(sp);
                match args {
                    Some(args) => Expr::Call {
                        callee: name,
                        args,
                        span,
                    },
                    None => Expr::Var(name, span),
                }
            })
            .padded();

        let paren = expr
            .clone()
            .delimited_by(just('(').padded(), just(')').padded());

        let atom = choice((number, named, paren));

        let index = text::int(10)
            .try_map(|digits: String, sp: Range<usize>| {
                digits
                    .parse::<usize>()
                    .map_err(|e| Simple::custom(sp, e.to_string()))
            })
            .padded()
            .delimited_by(just('['), just(']'))
            .map_with_span(|index, sp: Range<usize>| (index, sp))
            .padded();

        let postfix = atom
            .then(index.repeated())
            .foldl(|base, (index, sp): (usize, Range<usize>)| {
                let span = Span::new(base.span().start(), sp.end);
                Expr::Index {
                    base: Box::new(base),
                    index,
                    span,
                }
            });

        let op = |c| just(c).padded();

        let unary = op('-')
            .map_with_span(|_, sp: Range<usize>| sp)
            .repeated()
            .then(postfix)
            .foldr(|sp, operand| {
                let span = Span::new(sp.start, operand.span().end());
                Expr::Neg(Box::new(operand), span)
            });

        let product = unary
            .clone()
            .then(
                op('*')
                    .to(BinOp::Mul)
                    .or(op('/').to(BinOp::Div))
                    .then(unary)
                    .repeated(),
            )
            .foldl(binary);

        product
            .clone()
            .then(
                op('+')
                    .to(BinOp::Add)
                    .or(op('-').to(BinOp::Sub))
                    .then(product)
                    .repeated(),
            )
            .foldl(binary)
    });

    let params = text::ident()
        .map_with_span(|name, sp| Param {
            name,
            span: span_of(sp),
        })
        .padded()
        .separated_by(just(','))
        .allow_trailing()
        .delimited_by(just('('), just(')'))
        .padded();

    text::keyword("fn")
        .padded()
        .ignore_then(text::ident().padded())
        .then(params)
        .then_ignore(just('=').padded())
        .then(expr)
        .then_ignore(end())
        .map_with_span(|((name, params), body), sp| Function {
            name,
            params,
            body,
            span: span_of(sp),
        })
}

pub fn parse(src: &str) -> Result<Function, Vec<Simple<char>>> {
    parser().parse(src)
}

/// Parse and convert any errors into rendered-ready diagnostics.
pub fn parse_with_diagnostics(src: &str) -> Result<Function, Vec<Diagnostic>> {
    parse(src).map_err(|errors| {
        errors
            .into_iter()
            .map(|e| Diagnostic::from_chumsky(src, e))
            .collect()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn precedence_binds_products_tighter() {
        let f = parse("fn f(x) = x + x * x").expect("parse");
        match f.body {
            Expr::Binary {
                op: BinOp::Add,
                right,
                ..
            } => assert!(matches!(*right, Expr::Binary { op: BinOp::Mul, .. })),
            other => panic!("unexpected body {other:?}"),
        }
    }

    #[test]
    fn postfix_index_and_unary_minus() {
        let f = parse("fn f(x) = -x[1]").expect("parse");
        match f.body {
            Expr::Neg(inner, _) => {
                assert!(matches!(*inner, Expr::Index { index: 1, .. }))
            }
            other => panic!("unexpected body {other:?}"),
        }
    }

    #[test]
    fn decimals_parse_as_numbers() {
        let f = parse("fn f(x) = 0.5 * x").expect("parse");
        match f.body {
            Expr::Binary { left, .. } => assert!(matches!(*left, Expr::Num(v, _) if v == 0.5)),
            other => panic!("unexpected body {other:?}"),
        }
    }

    #[test]
    fn missing_body_is_an_error() {
        assert!(parse("fn f(x) =").is_err());
    }
}
