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

use crate::ir::{Op, Opcode};

use super::{ExecError, Value};

/// Apply `op` to already evaluated operands.
///
/// Elementwise operations broadcast scalars over vectors.
pub(super) fn apply(op: &Op, operands: &[&Value]) -> Result<Value, ExecError> {
    let opcode = op.opcode();
    match (op, operands) {
        (Op::Constant(lit), []) => Ok(Value::Scalar(lit.value())),
        (Op::Add, [a, b]) => zip_with(opcode, a, b, |x, y| x + y),
        (Op::Sub, [a, b]) => zip_with(opcode, a, b, |x, y| x - y),
        (Op::Mul, [a, b]) => zip_with(opcode, a, b, |x, y| x * y),
        (Op::Div, [a, b]) => zip_with(opcode, a, b, |x, y| x / y),
        (Op::Neg, [a]) => map(opcode, a, |x| -x),
        (Op::Sin, [a]) => map(opcode, a, f64::sin),
        (Op::Cos, [a]) => map(opcode, a, f64::cos),
        (Op::Exp, [a]) => map(opcode, a, f64::exp),
        (Op::Log, [a]) => map(opcode, a, f64::ln),
        (Op::Sqrt, [a]) => map(opcode, a, f64::sqrt),
        (Op::Abs, [a]) => map(opcode, a, f64::abs),
        (Op::Sign, [a]) => map(opcode, a, |x| if x == 0.0 { 0.0 } else { x.signum() }),
        (Op::ZeroLike, [a]) => map(opcode, a, |_| 0.0),
        (Op::Dot, [a, b]) => dot(a, b),
        (Op::Sum, [a]) => match a {
            Value::Scalar(x) => Ok(Value::Scalar(*x)),
            Value::Vector(items) => Ok(Value::Scalar(items.iter().sum())),
            other => Err(mismatch(opcode, "a scalar or vector", other)),
        },
        (Op::Index(index), [a]) => match a {
            Value::Vector(items) => items
                .get(*index)
                .copied()
                .map(Value::Scalar)
                .ok_or(ExecError::IndexOutOfRange {
                    index: *index,
                    len: items.len(),
                }),
            other => Err(mismatch(opcode, "a vector", other)),
        },
        (Op::CircShift(shift), [a]) => match a {
            Value::Scalar(x) => Ok(Value::Scalar(*x)),
            Value::Vector(items) => Ok(Value::Vector(circshift(items, *shift))),
            other => Err(mismatch(opcode, "a scalar or vector", other)),
        },
        _ => Err(ExecError::ArityMismatch {
            stage: 0,
            expected: op.arity(),
            found: operands.len(),
        }),
    }
}

fn mismatch(op: Opcode, expected: &'static str, found: &Value) -> ExecError {
    ExecError::TypeMismatch {
        op,
        expected,
        found: found.kind(),
    }
}

fn map(op: Opcode, value: &Value, f: impl Fn(f64) -> f64) -> Result<Value, ExecError> {
    match value {
        Value::Scalar(x) => Ok(Value::Scalar(f(*x))),
        Value::Vector(items) => Ok(Value::Vector(items.iter().map(|x| f(*x)).collect())),
        other => Err(mismatch(op, "a scalar or vector", other)),
    }
}

fn zip_with(
    op: Opcode,
    lhs: &Value,
    rhs: &Value,
    f: impl Fn(f64, f64) -> f64,
) -> Result<Value, ExecError> {
    match (lhs, rhs) {
        (Value::Scalar(a), Value::Scalar(b)) => Ok(Value::Scalar(f(*a, *b))),
        (Value::Scalar(a), Value::Vector(bs)) => {
            Ok(Value::Vector(bs.iter().map(|b| f(*a, *b)).collect()))
        }
        (Value::Vector(as_), Value::Scalar(b)) => {
            Ok(Value::Vector(as_.iter().map(|a| f(*a, *b)).collect()))
        }
        (Value::Vector(as_), Value::Vector(bs)) => {
            if as_.len() != bs.len() {
                return Err(ExecError::ShapeMismatch {
                    op,
                    lhs: as_.len(),
                    rhs: bs.len(),
                });
            }
            Ok(Value::Vector(
                as_.iter().zip(bs).map(|(a, b)| f(*a, *b)).collect(),
            ))
        }
        (Value::Closure(_), _) => Err(mismatch(op, "a scalar or vector", lhs)),
        (_, other) => Err(mismatch(op, "a scalar or vector", other)),
    }
}

fn dot(lhs: &Value, rhs: &Value) -> Result<Value, ExecError> {
    match (lhs, rhs) {
        (Value::Scalar(a), Value::Scalar(b)) => Ok(Value::Scalar(a * b)),
        (Value::Vector(as_), Value::Vector(bs)) => {
            if as_.len() != bs.len() {
                return Err(ExecError::ShapeMismatch {
                    op: Opcode::Dot,
                    lhs: as_.len(),
                    rhs: bs.len(),
                });
            }
            Ok(Value::Scalar(as_.iter().zip(bs).map(|(a, b)| a * b).sum()))
        }
        (Value::Vector(_), other) | (other, _) => {
            Err(mismatch(Opcode::Dot, "operands of matching kind", other))
        }
    }
}

/// Rotate right by `shift`: `out[i] = items[(i - shift) mod n]`.
fn circshift(items: &[f64], shift: isize) -> Vec<f64> {
    let n = items.len();
    if n == 0 {
        return Vec::new();
    }
    let offset = shift.rem_euclid(n as isize) as usize;
    let mut out = items.to_vec();
    out.rotate_right(offset);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn circshift_rotates_right() {
        assert_eq!(circshift(&[1.0, 2.0, 3.0], 1), vec![3.0, 1.0, 2.0]);
        assert_eq!(circshift(&[1.0, 2.0, 3.0], -1), vec![2.0, 3.0, 1.0]);
        assert_eq!(circshift(&[1.0, 2.0, 3.0], 4), vec![3.0, 1.0, 2.0]);
    }

    #[test]
    fn scalars_broadcast_over_vectors() {
        let out = apply(
            &Op::Mul,
            &[&Value::Scalar(2.0), &Value::Vector(vec![1.0, -1.0])],
        )
        .expect("mul");
        assert_eq!(out, Value::Vector(vec![2.0, -2.0]));
    }

    #[test]
    fn mismatched_lengths_are_reported() {
        let err = apply(
            &Op::Add,
            &[&Value::Vector(vec![1.0]), &Value::Vector(vec![1.0, 2.0])],
        )
        .unwrap_err();
        assert_eq!(
            err,
            ExecError::ShapeMismatch {
                op: Opcode::Add,
                lhs: 1,
                rhs: 2
            }
        );
    }

    #[test]
    fn index_checks_bounds() {
        let v = Value::Vector(vec![4.0, 5.0]);
        assert_eq!(apply(&Op::Index(1), &[&v]).expect("index"), Value::Scalar(5.0));
        assert!(matches!(
            apply(&Op::Index(2), &[&v]),
            Err(ExecError::IndexOutOfRange { index: 2, len: 2 })
        ));
    }
}
