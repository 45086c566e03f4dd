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

//! Staged code emission.
//!
//! [`emit`] drops nodes the result does not need, assigns every remaining
//! node the stage of its latest-bound input and lays the stages out as nested
//! closures: stage 0 binds everything computable from the base arguments, and
//! each tangent argument opens a closure that captures all outer bindings.

use std::sync::Arc;

use log::debug;

use crate::ir::{self, MalformedProgram, Node, NodeRef, Program};

mod code;

pub use code::{Binding, CodeExpression, Param, Scope, ScopeBody, Symbol};

/// Liveness and stage assignment for every node of a program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schedule {
    /// Whether the node is needed to compute the return value.
    pub live: Vec<bool>,
    /// Closure level at which the node's value becomes available.
    pub stages: Vec<usize>,
    /// Number of tangent stages (closures below the outer one).
    pub order: usize,
}

impl Schedule {
    pub fn new(program: &Program) -> Self {
        let live = ir::ancestors(program, program.ret());
        let mut stages = vec![0; program.len()];
        for (node_ref, node) in program.nodes() {
            stages[node_ref.0] = match node {
                Node::Argument { position } => program.argument_stage(*position),
                Node::Call { operands, .. } => operands
                    .iter()
                    .map(|operand| stages.get(operand.0).copied().unwrap_or(0))
                    .max()
                    .unwrap_or(0),
            };
        }
        Self {
            live,
            stages,
            order: program.order(),
        }
    }

    /// Live nodes assigned to `stage`, in arena order.
    pub fn nodes_at(&self, stage: usize) -> impl Iterator<Item = NodeRef> + '_ {
        self.stages
            .iter()
            .enumerate()
            .filter(move |(idx, s)| **s == stage && self.live[*idx])
            .map(|(idx, _)| NodeRef(idx))
    }

    pub fn live_count(&self) -> usize {
        self.live.iter().filter(|live| **live).count()
    }
}

/// Emit `program` as a nested-closure expression.
///
/// A program differentiated `n` times yields an outer closure over the base
/// arguments and `n` nested closures, one per tangent, even when the result
/// does not depend on some of them.
pub fn emit(program: &Program) -> Result<CodeExpression, MalformedProgram> {
    ir::verify_program(program)?;
    let schedule = Schedule::new(program);
    debug!(
        "emitting {} of {} nodes across {} stage(s)",
        schedule.live_count(),
        program.len(),
        schedule.order + 1
    );

    let mut symbols: Vec<Option<Symbol>> = vec![None; program.len()];
    let mut next_symbol = 1;
    let mut fresh = |slot: &mut Option<Symbol>| {
        let symbol = Symbol(next_symbol);
        next_symbol += 1;
        *slot = Some(symbol);
        symbol
    };

    let mut levels = Vec::with_capacity(schedule.order + 1);
    for stage in 0..=schedule.order {
        let mut params = Vec::new();
        for (position, &node) in program.arguments().iter().enumerate() {
            if program.argument_stage(position) == stage {
                let symbol = fresh(&mut symbols[node.0]);
                params.push(Param { symbol, node });
            }
        }

        let mut bindings = Vec::new();
        for node_ref in schedule.nodes_at(stage) {
            let Some(Node::Call { op, operands }) = program.node(node_ref) else {
                continue;
            };
            let mut args = Vec::with_capacity(operands.len());
            for &operand in operands {
                let symbol = symbols[operand.0].ok_or(MalformedProgram::OperandOutOfScope {
                    node: node_ref,
                    operand,
                    stage,
                })?;
                args.push(symbol);
            }
            let symbol = fresh(&mut symbols[node_ref.0]);
            bindings.push(Binding {
                symbol,
                node: node_ref,
                op: *op,
                args,
            });
        }
        levels.push((stage, params, bindings));
    }

    let ret = program.ret();
    let ret_symbol = symbols[ret.0].ok_or(MalformedProgram::OperandOutOfScope {
        node: ret,
        operand: ret,
        stage: schedule.order,
    })?;

    let root = levels
        .into_iter()
        .rev()
        .fold(None, |inner: Option<Arc<Scope>>, (stage, params, bindings)| {
            let body = match inner {
                Some(scope) => ScopeBody::Closure(scope),
                None => ScopeBody::Return(ret_symbol),
            };
            Some(Arc::new(Scope {
                stage,
                params,
                bindings,
                body,
            }))
        });
    let root = root.ok_or(MalformedProgram::ReturnOutOfRange {
        ret,
        len: program.len(),
    })?;

    Ok(CodeExpression::new(root, next_symbol - 1))
}
