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

use log::{debug, trace};

use crate::ir::{self, MalformedProgram, Node, NodeRef, Op, Opcode, Program, ProgramBuilder};

use super::rules::{standard_registry, RuleRegistry};

/// Errors returned by the differentiator.
#[derive(Debug, thiserror::Error)]
pub enum AutodiffError {
    /// No derivative rule is registered for an operation at an operand
    /// position (1-based).
    #[error("no derivative rule for '{op}' at operand {position}")]
    UnsupportedOperation { op: Opcode, position: usize },
    /// The requested argument does not exist.
    #[error("cannot differentiate with respect to argument {position}: program has {arity} arguments")]
    ArgumentOutOfRange { position: usize, arity: usize },
    /// The input program violates an IR invariant.
    #[error("malformed program: {0}")]
    Malformed(#[from] MalformedProgram),
}

/// Differentiate with respect to the first argument using the standard rules.
pub fn differentiate(program: &Program) -> Result<Program, AutodiffError> {
    differentiate_at(program, 0)
}

/// Differentiate with respect to the argument at `position` (0-based).
pub fn differentiate_at(program: &Program, position: usize) -> Result<Program, AutodiffError> {
    differentiate_with(standard_registry(), program, position)
}

/// Build the program computing the directional derivative of `program` with
/// respect to the argument at `position`, along a new trailing tangent
/// argument.
///
/// The input is left untouched; the result shares its nodes and appends the
/// tangent argument followed by the derivative nodes.
pub fn differentiate_with(
    registry: &RuleRegistry,
    program: &Program,
    position: usize,
) -> Result<Program, AutodiffError> {
    ir::verify_program(program)?;
    let x = *program
        .arguments()
        .get(position)
        .ok_or(AutodiffError::ArgumentOutOfRange {
            position,
            arity: program.arguments().len(),
        })?;

    let mut builder = TangentBuilder::new(registry, program, x);
    builder.propagate()?;
    let derivative = builder.finish()?;
    debug!(
        "differentiated argument {} of a {}-node program into {} nodes (order {})",
        position,
        program.len(),
        derivative.len(),
        derivative.order()
    );
    Ok(derivative)
}

struct TangentBuilder<'a> {
    registry: &'a RuleRegistry,
    primal: &'a Program,
    x: NodeRef,
    out: ProgramBuilder,
    tangents: Vec<Option<NodeRef>>,
}

impl<'a> TangentBuilder<'a> {
    fn new(registry: &'a RuleRegistry, primal: &'a Program, x: NodeRef) -> Self {
        let mut out = ProgramBuilder::extend(primal);
        let v = out.add_argument();
        let mut tangents = vec![None; primal.len()];
        tangents[x.0] = Some(v);
        Self {
            registry,
            primal,
            x,
            out,
            tangents,
        }
    }

    fn propagate(&mut self) -> Result<(), AutodiffError> {
        let reached = ir::dependents(self.primal, self.x);
        let required = ir::ancestors(self.primal, self.primal.ret());

        for (node_ref, node) in self.primal.nodes() {
            if node_ref == self.x || !(reached[node_ref.0] && required[node_ref.0]) {
                continue;
            }
            let Node::Call { op, operands } = node else {
                continue;
            };
            if let Some(tangent) = self.tangent_of_call(op, operands)? {
                trace!("tangent of {} ({}) is {}", node_ref, op, tangent);
                self.tangents[node_ref.0] = Some(tangent);
            }
        }
        Ok(())
    }

    // d op(a_1, ..., a_m) v = sum_k d_k op(a_1, ..., a_m) (d a_k v)
    fn tangent_of_call(
        &mut self,
        op: &Op,
        operands: &[NodeRef],
    ) -> Result<Option<NodeRef>, AutodiffError> {
        let mut total: Option<NodeRef> = None;
        for (idx, operand) in operands.iter().enumerate() {
            let Some(operand_tangent) = self.tangents[operand.0] else {
                continue;
            };
            let rule = self.registry.lookup(op.opcode(), idx + 1)?;
            let map = rule(op, operands, &mut self.out);
            let contribution = map.apply(&mut self.out, operand_tangent);
            total = Some(match total {
                None => contribution,
                Some(acc) => self.out.binary(Op::Add, acc, contribution),
            });
        }
        Ok(total)
    }

    fn finish(mut self) -> Result<Program, MalformedProgram> {
        let ret = self.primal.ret();
        let result = match self.tangents[ret.0] {
            Some(tangent) => tangent,
            None => {
                debug!("result does not depend on {}; derivative is zero", self.x);
                self.out.unary(Op::ZeroLike, ret)
            }
        };
        self.out.finish(result)
    }
}
