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

//! Reference executor for emitted code.
//!
//! Emitted [`CodeExpression`]s are meant for an external executor; this one
//! interprets them directly so derivatives can be evaluated in-process. Each
//! stage runs once per call: evaluating the outer closure at a base point
//! computes every stage-0 binding, and the returned [`Closure`] reuses those
//! values for every tangent it is applied to.

use std::fmt;
use std::sync::Arc;

use crate::emit::{CodeExpression, Scope, ScopeBody, Symbol};
use crate::ir::Opcode;

mod cpu;
mod value;

pub use value::Value;

#[derive(Debug, thiserror::Error, Clone, PartialEq)]
pub enum ExecError {
    /// A closure was applied to the wrong number of values.
    #[error("stage {stage} expects {expected} argument(s), got {found}")]
    ArityMismatch {
        stage: usize,
        expected: usize,
        found: usize,
    },
    /// Elementwise operands have different lengths.
    #[error("{op}: length mismatch ({lhs} vs {rhs})")]
    ShapeMismatch { op: Opcode, lhs: usize, rhs: usize },
    #[error("index {index} out of range for vector of length {len}")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("{op} expects {expected}, got {found}")]
    TypeMismatch {
        op: Opcode,
        expected: &'static str,
        found: &'static str,
    },
    #[error("value of kind '{0}' is not callable")]
    NotCallable(&'static str),
    #[error("symbol {0} is not bound")]
    UnboundSymbol(Symbol),
    #[error("closures cannot be converted to JSON")]
    NotSerializable,
    #[error("invalid JSON value: {0}")]
    InvalidJson(String),
}

// Slots hold shared handles so capturing an environment never copies values.
type Env = Vec<Option<Arc<Value>>>;

/// A partially applied stage: the scope still to run and every binding of
/// the enclosing stages.
#[derive(Clone)]
pub struct Closure {
    scope: Arc<Scope>,
    env: Arc<Env>,
}

impl Closure {
    pub fn stage(&self) -> usize {
        self.scope.stage
    }

    pub fn call(&self, args: &[Value]) -> Result<Value, ExecError> {
        run_scope(&self.scope, self.env.as_ref().clone(), args)
    }

    /// Value bound to `symbol` by an enclosing stage, if any.
    pub fn captured(&self, symbol: Symbol) -> Option<&Arc<Value>> {
        self.env.get(symbol.0).and_then(|slot| slot.as_ref())
    }
}

impl PartialEq for Closure {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.scope, &other.scope) && Arc::ptr_eq(&self.env, &other.env)
    }
}

impl fmt::Debug for Closure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Closure(stage {})", self.scope.stage)
    }
}

/// Run the outer closure of `code` on the base arguments.
pub fn evaluate(code: &CodeExpression, args: &[Value]) -> Result<Value, ExecError> {
    let env = vec![None; code.symbol_count() + 1];
    run_scope(code.root(), env, args)
}

/// Evaluate `code` at `args` and apply the result to one tangent per stage.
pub fn evaluate_along(
    code: &CodeExpression,
    args: &[Value],
    tangents: &[Value],
) -> Result<Value, ExecError> {
    let mut value = evaluate(code, args)?;
    for tangent in tangents {
        value = value.call(tangent.clone())?;
    }
    Ok(value)
}

fn run_scope(scope: &Arc<Scope>, mut env: Env, args: &[Value]) -> Result<Value, ExecError> {
    if args.len() != scope.params.len() {
        return Err(ExecError::ArityMismatch {
            stage: scope.stage,
            expected: scope.params.len(),
            found: args.len(),
        });
    }
    for (param, arg) in scope.params.iter().zip(args) {
        bind(&mut env, param.symbol, arg.clone());
    }

    for binding in &scope.bindings {
        let operands = binding
            .args
            .iter()
            .map(|symbol| lookup(&env, *symbol))
            .collect::<Result<Vec<&Value>, ExecError>>()?;
        let value = cpu::apply(&binding.op, &operands)?;
        bind(&mut env, binding.symbol, value);
    }

    match &scope.body {
        ScopeBody::Return(symbol) => lookup(&env, *symbol).cloned(),
        ScopeBody::Closure(inner) => Ok(Value::Closure(Closure {
            scope: Arc::clone(inner),
            env: Arc::new(env),
        })),
    }
}

fn bind(env: &mut Env, symbol: Symbol, value: Value) {
    if symbol.0 >= env.len() {
        env.resize(symbol.0 + 1, None);
    }
    env[symbol.0] = Some(Arc::new(value));
}

fn lookup(env: &Env, symbol: Symbol) -> Result<&Value, ExecError> {
    env.get(symbol.0)
        .and_then(|slot| slot.as_deref())
        .ok_or(ExecError::UnboundSymbol(symbol))
}
