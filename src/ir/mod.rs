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

//! Graph IR for recorded programs.
//!
//! A [`Program`] is an append-only arena of [`Node`]s. Operands always refer
//! to strictly earlier nodes, so arena order doubles as a topological order.
//! Programs are immutable; transforms extend a program into a new one that
//! shares the unchanged prefix.

use std::fmt;
use std::sync::Arc;

mod builder;
mod print;
mod verify;

pub use builder::ProgramBuilder;
pub use print::format_program;
pub use verify::{verify_program, MalformedProgram};

/// Index of a node inside the arena of the program that created it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeRef(pub usize);

impl NodeRef {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "%{}", self.0)
    }
}

/// Bit-exact wrapper so constants can participate in `Eq`/`Hash`.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Literal(u64);

impl Literal {
    pub fn new(value: f64) -> Self {
        Literal(value.to_bits())
    }

    pub fn value(self) -> f64 {
        f64::from_bits(self.0)
    }
}

impl fmt::Debug for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.value())
    }
}

/// Operations a [`Node::Call`] may apply.
///
/// Static parameters (constants, indices, shift amounts) live in the variant;
/// only values computed by the graph appear as operands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    Constant(Literal),
    Add,
    Sub,
    Mul,
    Div,
    Neg,
    Sin,
    Cos,
    Exp,
    Log,
    Sqrt,
    Abs,
    Sign,
    Dot,
    Sum,
    Index(usize),
    CircShift(isize),
    ZeroLike,
}

/// Fieldless identity of an [`Op`], used to key derivative rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Opcode {
    Constant,
    Add,
    Sub,
    Mul,
    Div,
    Neg,
    Sin,
    Cos,
    Exp,
    Log,
    Sqrt,
    Abs,
    Sign,
    Dot,
    Sum,
    Index,
    CircShift,
    ZeroLike,
}

impl Op {
    pub fn constant(value: f64) -> Self {
        Op::Constant(Literal::new(value))
    }

    pub fn opcode(&self) -> Opcode {
        match self {
            Op::Constant(_) => Opcode::Constant,
            Op::Add => Opcode::Add,
            Op::Sub => Opcode::Sub,
            Op::Mul => Opcode::Mul,
            Op::Div => Opcode::Div,
            Op::Neg => Opcode::Neg,
            Op::Sin => Opcode::Sin,
            Op::Cos => Opcode::Cos,
            Op::Exp => Opcode::Exp,
            Op::Log => Opcode::Log,
            Op::Sqrt => Opcode::Sqrt,
            Op::Abs => Opcode::Abs,
            Op::Sign => Opcode::Sign,
            Op::Dot => Opcode::Dot,
            Op::Sum => Opcode::Sum,
            Op::Index(_) => Opcode::Index,
            Op::CircShift(_) => Opcode::CircShift,
            Op::ZeroLike => Opcode::ZeroLike,
        }
    }

    /// Number of operands the operation consumes.
    pub fn arity(&self) -> usize {
        match self {
            Op::Constant(_) => 0,
            Op::Add | Op::Sub | Op::Mul | Op::Div | Op::Dot => 2,
            _ => 1,
        }
    }
}

impl Opcode {
    pub fn name(self) -> &'static str {
        match self {
            Opcode::Constant => "constant",
            Opcode::Add => "add",
            Opcode::Sub => "sub",
            Opcode::Mul => "mul",
            Opcode::Div => "div",
            Opcode::Neg => "neg",
            Opcode::Sin => "sin",
            Opcode::Cos => "cos",
            Opcode::Exp => "exp",
            Opcode::Log => "log",
            Opcode::Sqrt => "sqrt",
            Opcode::Abs => "abs",
            Opcode::Sign => "sign",
            Opcode::Dot => "dot",
            Opcode::Sum => "sum",
            Opcode::Index => "index",
            Opcode::CircShift => "circshift",
            Opcode::ZeroLike => "zero_like",
        }
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Op::Constant(lit) => write!(f, "constant[{:?}]", lit.value()),
            Op::Index(i) => write!(f, "index[{i}]"),
            Op::CircShift(k) => write!(f, "circshift[{k}]"),
            other => f.write_str(other.opcode().name()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Argument { position: usize },
    Call { op: Op, operands: Vec<NodeRef> },
}

impl Node {
    pub fn operands(&self) -> &[NodeRef] {
        match self {
            Node::Argument { .. } => &[],
            Node::Call { operands, .. } => operands,
        }
    }

    pub fn is_argument(&self) -> bool {
        matches!(self, Node::Argument { .. })
    }
}

/// Append-only node storage made of shared immutable segments.
///
/// Extending an arena clones the segment handles, never the nodes.
#[derive(Debug, Clone, Default)]
pub struct Arena {
    segments: Vec<Arc<[Node]>>,
    len: usize,
}

impl Arena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_nodes(nodes: Vec<Node>) -> Self {
        let mut arena = Arena::new();
        arena.push_segment(nodes);
        arena
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn get(&self, node: NodeRef) -> Option<&Node> {
        let mut offset = node.0;
        for segment in &self.segments {
            if offset < segment.len() {
                return Some(&segment[offset]);
            }
            offset -= segment.len();
        }
        None
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeRef, &Node)> + '_ {
        self.segments
            .iter()
            .flat_map(|segment| segment.iter())
            .enumerate()
            .map(|(idx, node)| (NodeRef(idx), node))
    }

    /// Number of shared segments; each transform appends at most one.
    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    /// True when both arenas hold the very same first segment allocation.
    pub fn shares_prefix_with(&self, other: &Arena) -> bool {
        match (self.segments.first(), other.segments.first()) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    pub(crate) fn push_segment(&mut self, nodes: Vec<Node>) {
        if nodes.is_empty() {
            return;
        }
        self.len += nodes.len();
        self.segments.push(Arc::from(nodes));
    }
}

/// An immutable recorded computation: nodes, arguments and a single return.
#[derive(Debug, Clone)]
pub struct Program {
    arena: Arena,
    arguments: Vec<NodeRef>,
    ret: NodeRef,
    base_arity: usize,
}

impl Program {
    /// Assemble a program without checking any invariant.
    ///
    /// Callers that did not obtain the parts from a [`ProgramBuilder`] should
    /// run [`verify_program`] before handing the result to a transform.
    pub fn from_parts(
        arena: Arena,
        arguments: Vec<NodeRef>,
        ret: NodeRef,
        base_arity: usize,
    ) -> Self {
        Self {
            arena,
            arguments,
            ret,
            base_arity,
        }
    }

    pub fn builder(arity: usize) -> ProgramBuilder {
        ProgramBuilder::new(arity)
    }

    pub fn arena(&self) -> &Arena {
        &self.arena
    }

    pub fn len(&self) -> usize {
        self.arena.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arena.is_empty()
    }

    pub fn node(&self, node: NodeRef) -> Option<&Node> {
        self.arena.get(node)
    }

    pub fn nodes(&self) -> impl Iterator<Item = (NodeRef, &Node)> + '_ {
        self.arena.iter()
    }

    pub fn arguments(&self) -> &[NodeRef] {
        &self.arguments
    }

    pub fn ret(&self) -> NodeRef {
        self.ret
    }

    /// Number of arguments of the originally recorded function.
    pub fn base_arity(&self) -> usize {
        self.base_arity
    }

    /// Number of tangent arguments appended by differentiation.
    pub fn order(&self) -> usize {
        self.arguments.len().saturating_sub(self.base_arity)
    }

    /// Closure nesting depth at which the argument at `position` is bound.
    pub fn argument_stage(&self, position: usize) -> usize {
        if position < self.base_arity {
            0
        } else {
            position - self.base_arity + 1
        }
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format_program(self))
    }
}

/// Nodes reachable forward from `source` (nodes that depend on it).
///
/// Single pass in arena order; operands always precede their users.
pub fn dependents(program: &Program, source: NodeRef) -> Vec<bool> {
    let mut reached = vec![false; program.len()];
    if source.0 >= reached.len() {
        return reached;
    }
    reached[source.0] = true;
    for (node_ref, node) in program.nodes().skip(source.0 + 1) {
        if node
            .operands()
            .iter()
            .any(|op| reached.get(op.0).copied().unwrap_or(false))
        {
            reached[node_ref.0] = true;
        }
    }
    reached
}

/// Nodes reachable backward from `sink` (nodes required to compute it).
pub fn ancestors(program: &Program, sink: NodeRef) -> Vec<bool> {
    let mut live = vec![false; program.len()];
    if sink.0 >= live.len() {
        return live;
    }
    live[sink.0] = true;
    let nodes: Vec<&Node> = program.nodes().map(|(_, node)| node).collect();
    for idx in (0..=sink.0).rev() {
        if !live[idx] {
            continue;
        }
        for operand in nodes[idx].operands() {
            if let Some(slot) = live.get_mut(operand.0) {
                *slot = true;
            }
        }
    }
    live
}

#[cfg(test)]
mod tests {
    use super::*;

    fn diamond() -> Program {
        let mut b = ProgramBuilder::new(1);
        let x = b.argument(0);
        let s = b.call(Op::Sin, vec![x]);
        let c = b.call(Op::Cos, vec![x]);
        let out = b.call(Op::Mul, vec![s, c]);
        let _dead = b.call(Op::Exp, vec![x]);
        b.finish(out).expect("valid program")
    }

    #[test]
    fn dependents_follow_diamonds() {
        let program = diamond();
        let reached = dependents(&program, NodeRef(0));
        assert_eq!(reached, vec![true, true, true, true, true]);
        let from_sin = dependents(&program, NodeRef(1));
        assert_eq!(from_sin, vec![false, true, false, true, false]);
    }

    #[test]
    fn ancestors_skip_dead_nodes() {
        let program = diamond();
        let live = ancestors(&program, program.ret());
        assert_eq!(live, vec![true, true, true, true, false]);
    }

    #[test]
    fn arena_lookup_crosses_segments() {
        let mut arena = Arena::from_nodes(vec![Node::Argument { position: 0 }]);
        arena.push_segment(vec![Node::Call {
            op: Op::Neg,
            operands: vec![NodeRef(0)],
        }]);
        assert_eq!(arena.len(), 2);
        assert_eq!(arena.segment_count(), 2);
        assert!(matches!(arena.get(NodeRef(1)), Some(Node::Call { op: Op::Neg, .. })));
        assert!(arena.get(NodeRef(2)).is_none());
    }

    #[test]
    fn literal_round_trips_bits() {
        let lit = Literal::new(-0.5);
        assert_eq!(lit.value(), -0.5);
        assert_eq!(Op::constant(2.0), Op::constant(2.0));
        assert_ne!(Op::constant(2.0), Op::constant(3.0));
    }
}
