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

//! Derivative rules keyed by `(opcode, operand position)`.
//!
//! Operand counts are verified before any rule runs, so generators index
//! their operand slices directly.

use std::collections::HashMap;
use std::fmt;
use std::sync::OnceLock;

use crate::ir::{NodeRef, Op, Opcode, ProgramBuilder};

use super::engine::AutodiffError;

/// Symbolic linear map produced by a rule generator.
///
/// Applying it to a tangent node records the nodes that compute the partial
/// derivative contribution and returns the node holding it.
pub struct LinearMap(Box<dyn FnOnce(&mut ProgramBuilder, NodeRef) -> NodeRef>);

impl LinearMap {
    pub fn new(map: impl FnOnce(&mut ProgramBuilder, NodeRef) -> NodeRef + 'static) -> Self {
        LinearMap(Box::new(map))
    }

    pub fn identity() -> Self {
        LinearMap::new(|_, tangent| tangent)
    }

    /// Multiply the tangent by a node computed from primal values.
    pub fn scale_by(factor: NodeRef) -> Self {
        LinearMap::new(move |b, tangent| b.binary(Op::Mul, tangent, factor))
    }

    pub fn apply(self, builder: &mut ProgramBuilder, tangent: NodeRef) -> NodeRef {
        (self.0)(builder, tangent)
    }
}

impl fmt::Debug for LinearMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("LinearMap(..)")
    }
}

/// Builds the partial derivative of `op` at the given operand values.
///
/// Nodes recorded eagerly by the generator depend only on primal values;
/// nodes recorded by the returned map also depend on the tangent.
pub type RuleGenerator =
    fn(op: &Op, operands: &[NodeRef], builder: &mut ProgramBuilder) -> LinearMap;

/// Lookup table from `(opcode, 1-based operand position)` to a rule.
#[derive(Clone, Default)]
pub struct RuleRegistry {
    rules: HashMap<(Opcode, usize), RuleGenerator>,
}

impl RuleRegistry {
    /// A registry without any rule.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Rules for every smooth builtin operation.
    ///
    /// `abs` stays unregistered: it has no derivative at zero.
    pub fn standard() -> Self {
        let mut registry = Self::empty();
        registry.register(Opcode::Add, 1, identity);
        registry.register(Opcode::Add, 2, identity);
        registry.register(Opcode::Sub, 1, identity);
        registry.register(Opcode::Sub, 2, negate);
        registry.register(Opcode::Mul, 1, mul_lhs);
        registry.register(Opcode::Mul, 2, mul_rhs);
        registry.register(Opcode::Div, 1, div_lhs);
        registry.register(Opcode::Div, 2, div_rhs);
        registry.register(Opcode::Neg, 1, reapply);
        registry.register(Opcode::Sin, 1, sin);
        registry.register(Opcode::Cos, 1, cos);
        registry.register(Opcode::Exp, 1, exp);
        registry.register(Opcode::Log, 1, log);
        registry.register(Opcode::Sqrt, 1, sqrt);
        registry.register(Opcode::Dot, 1, dot_lhs);
        registry.register(Opcode::Dot, 2, dot_rhs);
        registry.register(Opcode::Sum, 1, reapply);
        registry.register(Opcode::Index, 1, reapply);
        registry.register(Opcode::CircShift, 1, reapply);
        registry.register(Opcode::ZeroLike, 1, vanish);
        registry.register(Opcode::Sign, 1, vanish);
        registry
    }

    /// Add or replace the rule for `(opcode, position)`; returns the replaced
    /// rule, if any.
    pub fn register(
        &mut self,
        opcode: Opcode,
        position: usize,
        rule: RuleGenerator,
    ) -> Option<RuleGenerator> {
        self.rules.insert((opcode, position), rule)
    }

    pub fn lookup(&self, opcode: Opcode, position: usize) -> Result<RuleGenerator, AutodiffError> {
        self.rules
            .get(&(opcode, position))
            .copied()
            .ok_or(AutodiffError::UnsupportedOperation {
                op: opcode,
                position,
            })
    }

    pub fn contains(&self, opcode: Opcode, position: usize) -> bool {
        self.rules.contains_key(&(opcode, position))
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl fmt::Debug for RuleRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<_> = self.rules.keys().copied().collect();
        keys.sort();
        f.debug_struct("RuleRegistry").field("rules", &keys).finish()
    }
}

/// Process-wide read-only copy of [`RuleRegistry::standard`].
pub fn standard_registry() -> &'static RuleRegistry {
    static REGISTRY: OnceLock<RuleRegistry> = OnceLock::new();
    REGISTRY.get_or_init(RuleRegistry::standard)
}

fn identity(_: &Op, _: &[NodeRef], _: &mut ProgramBuilder) -> LinearMap {
    LinearMap::identity()
}

fn negate(_: &Op, _: &[NodeRef], _: &mut ProgramBuilder) -> LinearMap {
    LinearMap::new(|b, y| b.unary(Op::Neg, y))
}

// Linear operations are their own derivative.
fn reapply(op: &Op, _: &[NodeRef], _: &mut ProgramBuilder) -> LinearMap {
    let op = *op;
    LinearMap::new(move |b, y| b.unary(op, y))
}

fn vanish(_: &Op, _: &[NodeRef], _: &mut ProgramBuilder) -> LinearMap {
    LinearMap::new(|b, y| b.unary(Op::ZeroLike, y))
}

fn mul_lhs(_: &Op, operands: &[NodeRef], _: &mut ProgramBuilder) -> LinearMap {
    let rhs = operands[1];
    LinearMap::new(move |b, y| b.binary(Op::Mul, y, rhs))
}

fn mul_rhs(_: &Op, operands: &[NodeRef], _: &mut ProgramBuilder) -> LinearMap {
    let lhs = operands[0];
    LinearMap::new(move |b, y| b.binary(Op::Mul, lhs, y))
}

fn div_lhs(_: &Op, operands: &[NodeRef], _: &mut ProgramBuilder) -> LinearMap {
    let rhs = operands[1];
    LinearMap::new(move |b, y| b.binary(Op::Div, y, rhs))
}

// d/db (a / b) = -a / b^2
fn div_rhs(_: &Op, operands: &[NodeRef], builder: &mut ProgramBuilder) -> LinearMap {
    let (lhs, rhs) = (operands[0], operands[1]);
    let quotient = builder.binary(Op::Div, lhs, rhs);
    let scaled = builder.binary(Op::Div, quotient, rhs);
    let factor = builder.unary(Op::Neg, scaled);
    LinearMap::scale_by(factor)
}

fn sin(_: &Op, operands: &[NodeRef], builder: &mut ProgramBuilder) -> LinearMap {
    let factor = builder.unary(Op::Cos, operands[0]);
    LinearMap::scale_by(factor)
}

fn cos(_: &Op, operands: &[NodeRef], builder: &mut ProgramBuilder) -> LinearMap {
    let sine = builder.unary(Op::Sin, operands[0]);
    let factor = builder.unary(Op::Neg, sine);
    LinearMap::scale_by(factor)
}

fn exp(_: &Op, operands: &[NodeRef], builder: &mut ProgramBuilder) -> LinearMap {
    let factor = builder.unary(Op::Exp, operands[0]);
    LinearMap::scale_by(factor)
}

fn log(_: &Op, operands: &[NodeRef], _: &mut ProgramBuilder) -> LinearMap {
    let x = operands[0];
    LinearMap::new(move |b, y| b.binary(Op::Div, y, x))
}

fn sqrt(_: &Op, operands: &[NodeRef], builder: &mut ProgramBuilder) -> LinearMap {
    let root = builder.unary(Op::Sqrt, operands[0]);
    let twice = builder.binary(Op::Add, root, root);
    LinearMap::new(move |b, y| b.binary(Op::Div, y, twice))
}

fn dot_lhs(_: &Op, operands: &[NodeRef], _: &mut ProgramBuilder) -> LinearMap {
    let rhs = operands[1];
    LinearMap::new(move |b, y| b.binary(Op::Dot, y, rhs))
}

fn dot_rhs(_: &Op, operands: &[NodeRef], _: &mut ProgramBuilder) -> LinearMap {
    let lhs = operands[0];
    LinearMap::new(move |b, y| b.binary(Op::Dot, lhs, y))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_registry_covers_smooth_builtins() {
        let registry = RuleRegistry::standard();
        assert!(registry.contains(Opcode::Mul, 1));
        assert!(registry.contains(Opcode::Mul, 2));
        assert!(registry.contains(Opcode::CircShift, 1));
        assert!(!registry.contains(Opcode::Abs, 1));
        assert!(!registry.contains(Opcode::Neg, 2));
    }

    #[test]
    fn missing_rule_names_operation_and_position() {
        let registry = RuleRegistry::empty();
        let err = registry.lookup(Opcode::Sin, 1).unwrap_err();
        assert_eq!(err.to_string(), "no derivative rule for 'sin' at operand 1");
    }

    #[test]
    fn mul_rule_records_product_with_sibling() {
        let mut b = ProgramBuilder::new(3);
        let (x, y, t) = (b.argument(0), b.argument(1), b.argument(2));
        let rule = standard_registry().lookup(Opcode::Mul, 1).expect("rule");
        let map = rule(&Op::Mul, &[x, y], &mut b);
        let out = map.apply(&mut b, t);
        assert_eq!(
            b.node(out),
            Some(&crate::ir::Node::Call {
                op: Op::Mul,
                operands: vec![t, y]
            })
        );
    }

    #[test]
    fn eager_factor_is_recorded_before_the_tangent_product() {
        let mut b = ProgramBuilder::new(2);
        let (x, t) = (b.argument(0), b.argument(1));
        let rule = standard_registry().lookup(Opcode::Sin, 1).expect("rule");
        let map = rule(&Op::Sin, &[x], &mut b);
        assert_eq!(b.len(), 3, "cos(x) is recorded by the generator");
        let out = map.apply(&mut b, t);
        assert_eq!(out, NodeRef(3));
    }
}
