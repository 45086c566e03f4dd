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

use frechet::exec::{self, Value};
use frechet::pipeline::derivative_chain;
use frechet::trace::record_function;
use frechet::{compile_source, PipelineError, PipelineOptions};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn opts(order: usize, wrt: Option<&str>) -> PipelineOptions {
    PipelineOptions {
        order,
        wrt: wrt.map(str::to_string),
    }
}

#[test]
fn order_zero_evaluates_the_function() {
    let products = compile_source("fn f(x, y) = x * y + 1", &opts(0, None)).expect("compile");
    assert!(products.derivatives.is_empty());
    let value = exec::evaluate(&products.code, &[2.0.into(), 3.0.into()]).expect("evaluate");
    assert_eq!(value, Value::Scalar(7.0));
}

#[test]
fn chain_keeps_every_intermediate_program() {
    init_logging();
    let products = compile_source("fn f(x) = x * x * x", &opts(3, None)).expect("compile");
    assert_eq!(products.derivatives.len(), 3);
    let orders: Vec<usize> = products.derivatives.iter().map(|p| p.order()).collect();
    assert_eq!(orders, vec![1, 2, 3]);
    assert_eq!(products.program().order(), 3);

    // third derivative of x^3 is 6 along unit tangents
    let value = exec::evaluate_along(
        &products.code,
        &[5.0.into()],
        &[1.0.into(), 1.0.into(), 1.0.into()],
    )
    .expect("evaluate");
    assert_eq!(value, Value::Scalar(6.0));
}

#[test]
fn wrt_selects_the_named_parameter() {
    let products = compile_source("fn f(x, y) = sin(x) * y", &opts(1, Some("y"))).expect("compile");
    let value = exec::evaluate_along(&products.code, &[0.5.into(), 9.0.into()], &[1.0.into()])
        .expect("evaluate");
    assert_eq!(value, Value::Scalar(0.5f64.sin()));
}

#[test]
fn hessian_from_source() {
    let src = "fn h(x) = x[0] * sum(x * circshift(x, 1))";
    let products = compile_source(src, &opts(2, None)).expect("compile");
    let value = exec::evaluate_along(
        &products.code,
        &[vec![1.0, 2.0, 3.0].into()],
        &[vec![1.0, 0.0, 0.0].into(), vec![0.0, 1.0, 0.0].into()],
    )
    .expect("evaluate");
    assert_eq!(value, Value::Scalar(5.0));
}

#[test]
fn unknown_wrt_is_reported() {
    let err = compile_source("fn f(x) = x", &opts(1, Some("z"))).unwrap_err();
    assert!(matches!(err, PipelineError::UnknownParameter(ref name) if name == "z"));
    let diags = err.diagnostics("fn f(x) = x");
    assert_eq!(diags.len(), 1);
    assert!(diags[0].message.contains("'z'"));
}

#[test]
fn parse_errors_surface_as_diagnostics() {
    let src = "fn f(x) = (x";
    let err = compile_source(src, &opts(0, None)).unwrap_err();
    assert!(matches!(err, PipelineError::ParseError(_)));
    assert!(!err.diagnostics(src).is_empty());
}

#[test]
fn non_smooth_builtin_fails_to_differentiate() {
    let err = compile_source("fn f(x) = abs(x)", &opts(1, None)).unwrap_err();
    assert!(matches!(err, PipelineError::Autodiff(_)));
    assert!(err.to_string().contains("no derivative rule for 'abs'"));
    assert!(compile_source("fn f(x) = abs(x)", &opts(0, None)).is_ok());
}

#[test]
fn derivative_chain_of_zero_length() {
    let f = record_function(1, |x| x[0].exp()).expect("record");
    assert!(derivative_chain(&f, 0, 0).expect("chain").is_empty());
    assert_eq!(derivative_chain(&f, 0, 2).expect("chain").len(), 2);
}
