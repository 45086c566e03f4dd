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

// Verifier coverage for hand-assembled programs.

use frechet::ir::{verify_program, Arena, Node};
use frechet::{MalformedProgram, NodeRef, Op, Opcode, Program, ProgramBuilder};

fn arg(position: usize) -> Node {
    Node::Argument { position }
}

fn call(op: Op, operands: &[usize]) -> Node {
    Node::Call {
        op,
        operands: operands.iter().map(|&i| NodeRef(i)).collect(),
    }
}

fn program(nodes: Vec<Node>, arguments: &[usize], ret: usize, base_arity: usize) -> Program {
    Program::from_parts(
        Arena::from_nodes(nodes),
        arguments.iter().map(|&i| NodeRef(i)).collect(),
        NodeRef(ret),
        base_arity,
    )
}

#[test]
fn well_formed_program_passes() {
    let p = program(vec![arg(0), call(Op::Sin, &[0])], &[0], 1, 1);
    assert!(verify_program(&p).is_ok());
}

#[test]
fn operand_past_the_end_is_rejected() {
    let p = program(vec![arg(0), call(Op::Sin, &[7])], &[0], 1, 1);
    assert_eq!(
        verify_program(&p),
        Err(MalformedProgram::OperandOutOfRange {
            node: NodeRef(1),
            operand: NodeRef(7)
        })
    );
}

#[test]
fn self_reference_is_a_cycle() {
    let p = program(vec![arg(0), call(Op::Add, &[0, 1])], &[0], 1, 1);
    assert_eq!(
        verify_program(&p),
        Err(MalformedProgram::ForwardReference {
            node: NodeRef(1),
            operand: NodeRef(1)
        })
    );
}

#[test]
fn wrong_operand_count_is_rejected() {
    let p = program(vec![arg(0), call(Op::Mul, &[0])], &[0], 1, 1);
    assert_eq!(
        verify_program(&p),
        Err(MalformedProgram::ArityMismatch {
            node: NodeRef(1),
            op: Opcode::Mul,
            expected: 2,
            found: 1
        })
    );
}

#[test]
fn constant_with_operands_is_rejected() {
    let p = program(vec![arg(0), call(Op::constant(1.0), &[0])], &[0], 1, 1);
    assert!(matches!(
        verify_program(&p),
        Err(MalformedProgram::ArityMismatch {
            op: Opcode::Constant,
            expected: 0,
            ..
        })
    ));
}

#[test]
fn return_outside_arena_is_rejected() {
    let p = program(vec![arg(0)], &[0], 4, 1);
    assert_eq!(
        verify_program(&p),
        Err(MalformedProgram::ReturnOutOfRange {
            ret: NodeRef(4),
            len: 1
        })
    );
}

#[test]
fn argument_list_must_match_argument_nodes() {
    let p = program(vec![arg(0), arg(1)], &[1, 0], 0, 2);
    assert_eq!(
        verify_program(&p),
        Err(MalformedProgram::ArgumentMismatch {
            position: 0,
            node: NodeRef(1)
        })
    );

    let p = program(vec![arg(0), call(Op::Sin, &[0])], &[1], 1, 1);
    assert!(matches!(
        verify_program(&p),
        Err(MalformedProgram::ArgumentMismatch { position: 0, .. })
    ));
}

#[test]
fn every_argument_node_must_be_listed() {
    let p = program(vec![arg(0), arg(1)], &[0], 0, 1);
    assert_eq!(
        verify_program(&p),
        Err(MalformedProgram::UnlistedArgument { node: NodeRef(1) })
    );
}

#[test]
fn base_arity_cannot_exceed_argument_count() {
    let p = program(vec![arg(0)], &[0], 0, 3);
    assert_eq!(
        verify_program(&p),
        Err(MalformedProgram::BaseArityExceedsArguments {
            base_arity: 3,
            arguments: 1
        })
    );
}

#[test]
fn builder_finish_runs_the_verifier() {
    let mut b = ProgramBuilder::new(1);
    let bogus = b.unary(Op::Exp, NodeRef(5));
    assert!(matches!(
        b.finish(bogus),
        Err(MalformedProgram::OperandOutOfRange { .. })
    ));
}

#[test]
fn errors_render_node_references() {
    let err = MalformedProgram::ForwardReference {
        node: NodeRef(2),
        operand: NodeRef(3),
    };
    assert_eq!(
        err.to_string(),
        "node %2 uses %3, which is not defined before it"
    );
}
