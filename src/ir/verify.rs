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

use super::{Node, NodeRef, Opcode, Program};

/// Internal consistency violations of a [`Program`].
///
/// These always indicate a defect in whatever built or transformed the
/// program and are never retryable.
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum MalformedProgram {
    /// An operand points past the end of the arena.
    #[error("node {node} uses {operand}, which is outside the arena")]
    OperandOutOfRange { node: NodeRef, operand: NodeRef },
    /// An operand points at the node itself or a later node (a cycle).
    #[error("node {node} uses {operand}, which is not defined before it")]
    ForwardReference { node: NodeRef, operand: NodeRef },
    /// An operation received the wrong number of operands.
    #[error("node {node} applies {op} to {found} operands, expected {expected}")]
    ArityMismatch {
        node: NodeRef,
        op: Opcode,
        expected: usize,
        found: usize,
    },
    /// The designated return node does not exist.
    #[error("return value {ret} is outside the arena of {len} nodes")]
    ReturnOutOfRange { ret: NodeRef, len: usize },
    /// The argument list does not line up with the argument nodes.
    #[error("argument {position} refers to {node}, which is not argument {position}")]
    ArgumentMismatch { position: usize, node: NodeRef },
    /// An argument node is missing from the argument list.
    #[error("argument node {node} is not listed as a program argument")]
    UnlistedArgument { node: NodeRef },
    /// More base arguments were declared than exist.
    #[error("base arity {base_arity} exceeds the {arguments} recorded arguments")]
    BaseArityExceedsArguments { base_arity: usize, arguments: usize },
    /// Emission found an operand not bound in any enclosing scope.
    #[error("node {node} at stage {stage} uses {operand}, which is not in scope")]
    OperandOutOfScope {
        node: NodeRef,
        operand: NodeRef,
        stage: usize,
    },
}

/// Verify that a [`Program`] is well-formed.
///
/// Checks operand ordering (which rules out cycles), operand counts, the
/// argument list and the return reference. Returns the first violation found
/// in arena order.
pub fn verify_program(program: &Program) -> Result<(), MalformedProgram> {
    let len = program.len();

    if program.base_arity() > program.arguments().len() {
        return Err(MalformedProgram::BaseArityExceedsArguments {
            base_arity: program.base_arity(),
            arguments: program.arguments().len(),
        });
    }

    for (position, &node) in program.arguments().iter().enumerate() {
        match program.node(node) {
            Some(Node::Argument { position: p }) if *p == position => {}
            _ => return Err(MalformedProgram::ArgumentMismatch { position, node }),
        }
    }

    for (node_ref, node) in program.nodes() {
        match node {
            Node::Argument { position } => {
                if program.arguments().get(*position) != Some(&node_ref) {
                    return Err(MalformedProgram::UnlistedArgument { node: node_ref });
                }
            }
            Node::Call { op, operands } => {
                if operands.len() != op.arity() {
                    return Err(MalformedProgram::ArityMismatch {
                        node: node_ref,
                        op: op.opcode(),
                        expected: op.arity(),
                        found: operands.len(),
                    });
                }
                for &operand in operands {
                    if operand.0 >= len {
                        return Err(MalformedProgram::OperandOutOfRange {
                            node: node_ref,
                            operand,
                        });
                    }
                    if operand >= node_ref {
                        return Err(MalformedProgram::ForwardReference {
                            node: node_ref,
                            operand,
                        });
                    }
                }
            }
        }
    }

    if program.ret().0 >= len {
        return Err(MalformedProgram::ReturnOutOfRange {
            ret: program.ret(),
            len,
        });
    }

    Ok(())
}
