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

//! High-level pipeline utilities.
//!
//! The helpers in this module parse a front-end function, record it as a
//! program, differentiate it the requested number of times and emit the
//! nested-closure code for the last program of the chain.

use log::info;

use crate::ast::Function;
use crate::autodiff::{self, AutodiffError};
use crate::diagnostics::Diagnostic;
use crate::emit::{self, CodeExpression};
use crate::ir::{MalformedProgram, Program};
use crate::lower::{self, LowerError};
use crate::parser;

/// Options controlling the pipeline.
#[derive(Debug, Default, Clone)]
pub struct PipelineOptions {
    /// How many times to differentiate.
    pub order: usize,
    /// Parameter to differentiate with respect to; the first one when unset.
    pub wrt: Option<String>,
}

/// Artifacts produced by [`compile_source`].
#[derive(Debug, Clone)]
pub struct PipelineProducts {
    pub function: Function,
    /// Program recorded from the function body.
    pub primal: Program,
    /// One program per differentiation, in order.
    pub derivatives: Vec<Program>,
    /// Emitted code for the last program of the chain.
    pub code: CodeExpression,
}

impl PipelineProducts {
    /// The program `code` was emitted from.
    pub fn program(&self) -> &Program {
        self.derivatives.last().unwrap_or(&self.primal)
    }
}

/// Errors surfaced by the pipeline.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Parsing failed with one or more diagnostics.
    #[error("parse error")]
    ParseError(Vec<Diagnostic>),
    /// The syntax tree could not be recorded.
    #[error("{0}")]
    Lower(#[from] LowerError),
    /// `wrt` names no parameter of the function.
    #[error("function has no parameter named '{0}'")]
    UnknownParameter(String),
    #[error("autodiff failed: {0}")]
    Autodiff(#[from] AutodiffError),
    #[error("emission failed: {0}")]
    Emit(#[from] MalformedProgram),
}

impl PipelineError {
    /// Source-anchored diagnostics for front-end failures.
    pub fn diagnostics(&self, src: &str) -> Vec<Diagnostic> {
        match self {
            PipelineError::ParseError(diags) => diags.clone(),
            PipelineError::Lower(err) => vec![err.to_diagnostic(src)],
            other => vec![Diagnostic::new(src, other.to_string(), 0..0)],
        }
    }
}

/// Differentiate `program` `order` times with respect to the argument at
/// `position`, returning every intermediate program.
pub fn derivative_chain(
    program: &Program,
    position: usize,
    order: usize,
) -> Result<Vec<Program>, AutodiffError> {
    let mut chain: Vec<Program> = Vec::with_capacity(order);
    for _ in 0..order {
        let current = chain.last().unwrap_or(program);
        let next = autodiff::differentiate_at(current, position)?;
        chain.push(next);
    }
    Ok(chain)
}

/// Parse, record, differentiate and emit `source`.
pub fn compile_source(
    source: &str,
    opts: &PipelineOptions,
) -> Result<PipelineProducts, PipelineError> {
    let function = parser::parse_with_diagnostics(source).map_err(PipelineError::ParseError)?;
    let primal = lower::lower_function(&function)?;

    let position = match &opts.wrt {
        None => 0,
        Some(name) => function
            .params
            .iter()
            .position(|p| &p.name == name)
            .ok_or_else(|| PipelineError::UnknownParameter(name.clone()))?,
    };

    let derivatives = derivative_chain(&primal, position, opts.order)?;
    let code = emit::emit(derivatives.last().unwrap_or(&primal))?;
    info!(
        "compiled '{}' (order {}, {} symbols)",
        function.name,
        opts.order,
        code.symbol_count()
    );

    Ok(PipelineProducts {
        function,
        primal,
        derivatives,
        code,
    })
}
