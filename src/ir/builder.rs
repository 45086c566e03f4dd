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

use super::{Arena, MalformedProgram, Node, NodeRef, Op, Program};

/// Append-only recorder shared by the tracer and every derivative rule.
///
/// A builder either starts a fresh program or extends an existing one; in the
/// latter case the existing nodes are shared, never copied or altered.
#[derive(Debug, Clone)]
pub struct ProgramBuilder {
    base: Arena,
    pending: Vec<Node>,
    arguments: Vec<NodeRef>,
    base_arity: usize,
}

impl ProgramBuilder {
    /// Start a program whose first `arity` nodes are its arguments.
    pub fn new(arity: usize) -> Self {
        let mut builder = Self {
            base: Arena::new(),
            pending: Vec::new(),
            arguments: Vec::with_capacity(arity),
            base_arity: arity,
        };
        for _ in 0..arity {
            builder.add_argument();
        }
        builder
    }

    /// Continue recording after the last node of `program`.
    pub fn extend(program: &Program) -> Self {
        Self {
            base: program.arena().clone(),
            pending: Vec::new(),
            arguments: program.arguments().to_vec(),
            base_arity: program.base_arity(),
        }
    }

    pub fn len(&self) -> usize {
        self.base.len() + self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn arguments(&self) -> &[NodeRef] {
        &self.arguments
    }

    /// Node of the argument at `position`.
    ///
    /// # Panics
    /// Panics when `position` is not a recorded argument.
    pub fn argument(&self, position: usize) -> NodeRef {
        self.arguments[position]
    }

    pub fn node(&self, node: NodeRef) -> Option<&Node> {
        match node.0.checked_sub(self.base.len()) {
            None => self.base.get(node),
            Some(offset) => self.pending.get(offset),
        }
    }

    /// Append a new trailing argument.
    pub fn add_argument(&mut self) -> NodeRef {
        let position = self.arguments.len();
        let node = self.push(Node::Argument { position });
        self.arguments.push(node);
        node
    }

    /// Record `op` applied to `operands`. This is the only way nodes enter a
    /// program.
    pub fn call(&mut self, op: Op, operands: Vec<NodeRef>) -> NodeRef {
        self.push(Node::Call { op, operands })
    }

    pub fn unary(&mut self, op: Op, operand: NodeRef) -> NodeRef {
        self.call(op, vec![operand])
    }

    pub fn binary(&mut self, op: Op, lhs: NodeRef, rhs: NodeRef) -> NodeRef {
        self.call(op, vec![lhs, rhs])
    }

    pub fn constant(&mut self, value: f64) -> NodeRef {
        self.call(Op::constant(value), Vec::new())
    }

    /// Seal the recording with `ret` as the result and verify it.
    pub fn finish(self, ret: NodeRef) -> Result<Program, MalformedProgram> {
        let mut arena = self.base;
        arena.push_segment(self.pending);
        let program = Program::from_parts(arena, self.arguments, ret, self.base_arity);
        super::verify_program(&program)?;
        Ok(program)
    }

    fn push(&mut self, node: Node) -> NodeRef {
        let id = NodeRef(self.len());
        self.pending.push(node);
        id
    }
}
