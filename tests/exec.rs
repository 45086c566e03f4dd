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

use std::sync::Arc;

use frechet::exec::{self, ExecError, Value};
use frechet::trace::{record_function, Traced};
use frechet::{differentiate, emit, Op, Program};

fn primal_at(program: &Program, x: f64) -> f64 {
    let code = emit(program).expect("emit");
    exec::evaluate(&code, &[x.into()])
        .expect("evaluate")
        .as_scalar()
        .expect("scalar")
}

fn derivative_at(program: &Program, x: f64) -> f64 {
    let code = emit(&differentiate(program).expect("differentiate")).expect("emit");
    exec::evaluate_along(&code, &[x.into()], &[1.0.into()])
        .expect("evaluate")
        .as_scalar()
        .expect("scalar")
}

fn assert_matches_finite_difference(f: impl FnOnce(&[Traced]) -> Traced, x: f64) {
    let program = record_function(1, f).expect("record");
    let h = 1e-6;
    let numeric = (primal_at(&program, x + h) - primal_at(&program, x - h)) / (2.0 * h);
    let exact = derivative_at(&program, x);
    assert!(
        (numeric - exact).abs() < 1e-6 * (1.0 + exact.abs()),
        "derivative {exact} disagrees with finite difference {numeric}"
    );
}

#[test]
fn trigonometric_rules() {
    assert_matches_finite_difference(|x| x[0].sin() * x[0].cos(), 0.7);
}

#[test]
fn exponential_and_logarithm_rules() {
    assert_matches_finite_difference(|x| (x[0].exp() + 1.0).ln(), -0.4);
}

#[test]
fn quotient_rules() {
    assert_matches_finite_difference(|x| x[0].sin() / (&x[0] * &x[0] + 1.0), 1.9);
    assert_matches_finite_difference(|x| 3.0 / &x[0], 2.5);
}

#[test]
fn square_root_and_negation_rules() {
    assert_matches_finite_difference(|x| -(x[0].sqrt()) - &x[0], 4.0);
}

#[test]
fn outer_closure_is_reusable_across_tangents() {
    let f = record_function(1, |x| x[0].sin() * &x[0]).expect("record");
    let code = emit(&differentiate(&f).expect("differentiate")).expect("emit");
    let at = exec::evaluate(&code, &[0.5.into()]).expect("evaluate");

    let one = at.call(1.0.into()).expect("call").as_scalar().expect("scalar");
    let two = at.call(2.0.into()).expect("call").as_scalar().expect("scalar");
    assert!((two - 2.0 * one).abs() < 1e-12);
}

#[test]
fn dot_product_is_bilinear() {
    let f = record_function(1, |x| x[0].dot(&x[0])).expect("record");
    let code = emit(&differentiate(&f).expect("differentiate")).expect("emit");
    let value = exec::evaluate_along(
        &code,
        &[vec![1.0, 2.0, 3.0].into()],
        &[vec![0.0, 1.0, 1.0].into()],
    )
    .expect("evaluate");
    // 2 <x, u>
    assert_eq!(value, Value::Scalar(10.0));
}

#[test]
fn circshift_hessian_entry() {
    // x[0] * sum(x .* circshift(x, 1))
    let f = record_function(1, |x| {
        let v = &x[0];
        v.index(0) * (v * v.circshift(1)).sum()
    })
    .expect("record");
    let hessian = differentiate(&differentiate(&f).expect("first")).expect("second");
    let code = emit(&hessian).expect("emit");

    let value = exec::evaluate_along(
        &code,
        &[vec![1.0, 2.0, 3.0].into()],
        &[vec![1.0, 0.0, 0.0].into(), vec![0.0, 1.0, 0.0].into()],
    )
    .expect("evaluate");
    assert_eq!(value, Value::Scalar(5.0));
}

#[test]
fn wrong_argument_count_is_an_error() {
    let f = record_function(2, |a| &a[0] * &a[1]).expect("record");
    let code = emit(&f).expect("emit");
    assert_eq!(
        exec::evaluate(&code, &[1.0.into()]),
        Err(ExecError::ArityMismatch {
            stage: 0,
            expected: 2,
            found: 1
        })
    );
}

#[test]
fn applying_a_number_is_an_error() {
    let f = record_function(1, |x| x[0].clone()).expect("record");
    let code = emit(&f).expect("emit");
    let value = exec::evaluate(&code, &[1.0.into()]).expect("evaluate");
    assert_eq!(value.call(1.0.into()), Err(ExecError::NotCallable("scalar")));
}

#[test]
fn values_round_trip_through_json() {
    let json: serde_json::Value = serde_json::from_str("[1.5, -2]").expect("json");
    let value = Value::from_json(&json).expect("value");
    assert_eq!(value, Value::Vector(vec![1.5, -2.0]));
    assert_eq!(value.to_json().expect("json"), serde_json::json!([1.5, -2.0]));
}

#[test]
fn tangent_calls_share_base_point_values() {
    let f = record_function(2, |a| &a[0] * &a[0] * a[1].exp().sum()).expect("record");
    let second = differentiate(&differentiate(&f).expect("first")).expect("second");
    let code = emit(&second).expect("emit");
    let exp_symbol = code
        .scope(0)
        .expect("outer")
        .bindings
        .iter()
        .find(|b| b.op == Op::Exp)
        .map(|b| b.symbol)
        .expect("exp is computed at the base point");

    let y: Vec<f64> = (0..1000).map(|i| i as f64 / 1000.0).collect();
    let outer = match exec::evaluate(&code, &[1.5.into(), y.into()]).expect("evaluate") {
        Value::Closure(closure) => closure,
        other => panic!("expected a closure, got {other}"),
    };
    let captured = outer.captured(exp_symbol).expect("captured").clone();

    for tangent in [1.0, 2.0, -0.5] {
        let inner = match outer.call(&[tangent.into()]).expect("call") {
            Value::Closure(closure) => closure,
            other => panic!("expected a closure, got {other}"),
        };
        assert!(Arc::ptr_eq(&captured, inner.captured(exp_symbol).expect("captured")));
    }
}
