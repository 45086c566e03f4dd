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

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use frechet::lower::lower_function;
use frechet::parser::parse;
use frechet::pipeline::derivative_chain;
use frechet::{differentiate, Program};

/// Scalar polynomial
const CUBIC: &str = "fn cubic(x) = x * x * x + 2 * x";

/// Transcendental mix
const SMOOTH: &str = "fn smooth(x, y) = sin(x * y) * exp(x) / sqrt(y + 1) + log(x * x + 1)";

/// Hessian example over a vector
const SHIFTED: &str = "fn shifted(x) = x[0] * sum(x * circshift(x, 1))";

fn program(source: &str) -> Program {
    lower_function(&parse(source).expect("parse failed")).expect("lowering failed")
}

fn bench_first_derivative(c: &mut Criterion) {
    let mut group = c.benchmark_group("differentiate");

    for (name, source) in [("cubic", CUBIC), ("smooth", SMOOTH), ("shifted", SHIFTED)] {
        let primal = program(source);
        group.bench_with_input(BenchmarkId::new("first", name), &primal, |b, p| {
            b.iter(|| differentiate(black_box(p)).expect("autodiff failed"));
        });
    }

    group.finish();
}

fn bench_higher_order(c: &mut Criterion) {
    let mut group = c.benchmark_group("derivative_chain");
    let primal = program(SMOOTH);

    for order in [2usize, 3, 4] {
        group.bench_with_input(BenchmarkId::new("smooth", order), &order, |b, &order| {
            b.iter(|| derivative_chain(black_box(&primal), 0, order).expect("autodiff failed"));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_first_derivative, bench_higher_order);
criterion_main!(benches);
