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

//! Frechet: directional derivatives of recorded programs, emitted as nested
//! closures.
//!
//! The pipeline has three stages:
//!
//! 1. record a function as a [`Program`] ([`trace`], or the [`parser`]
//!    front-end through [`lower`]);
//! 2. [`differentiate`] it any number of times, each pass appending one
//!    tangent argument;
//! 3. [`emit`] the result as nested closures, one per tangent, so values that
//!    depend only on the base point are computed once.
//!
//! ```
//! use frechet::{differentiate, emit, exec, trace::record_function};
//!
//! let square = record_function(1, |x| &x[0] * &x[0]).unwrap();
//! let second = differentiate(&differentiate(&square).unwrap()).unwrap();
//! let code = emit(&second).unwrap();
//! let value = exec::evaluate_along(&code, &[2.0.into()], &[1.0.into(), 1.0.into()]).unwrap();
//! assert_eq!(value.as_scalar(), Some(2.0));
//! ```

pub mod ast;
pub mod autodiff;
pub mod diagnostics;
pub mod emit;
pub mod exec;
pub mod ir;
pub mod lower;
pub mod parser;
pub mod pipeline;
pub mod trace;

pub use autodiff::{
    differentiate, differentiate_at, differentiate_with, AutodiffError, RuleRegistry,
};
pub use emit::{emit, CodeExpression};
pub use ir::{MalformedProgram, Node, NodeRef, Op, Opcode, Program, ProgramBuilder};
pub use pipeline::{compile_source, PipelineError, PipelineOptions, PipelineProducts};
