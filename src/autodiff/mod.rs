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

//! Symbolic forward-mode differentiation of recorded programs.
//!
//! [`differentiate`] extends a [`Program`](crate::ir::Program) with a tangent
//! argument `v` and the nodes computing `f'(x) v`. The pass is a pure
//! function: applying it again to its own output differentiates once more and
//! yields a program whose result is a multilinear map in all tangents.
//!
//! Partial derivatives come from a [`RuleRegistry`]; every rule records its
//! fragment through the same [`ProgramBuilder`](crate::ir::ProgramBuilder)
//! the tracer uses.

mod engine;
mod rules;

pub use engine::{differentiate, differentiate_at, differentiate_with, AutodiffError};
pub use rules::{standard_registry, LinearMap, RuleGenerator, RuleRegistry};
