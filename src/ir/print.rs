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

use std::fmt::Write;

use super::{Node, Program};

/// Format a [`Program`] into a stable, human-readable string.
pub fn format_program(program: &Program) -> String {
    let mut out = String::new();
    let params: Vec<String> = program
        .arguments()
        .iter()
        .map(|arg| arg.to_string())
        .collect();
    writeln!(&mut out, "program({}) {{", params.join(", ")).expect("write to string cannot fail");
    for (id, node) in program.nodes() {
        match node {
            Node::Argument { position } => {
                let stage = program.argument_stage(*position);
                writeln!(&mut out, "  {id} = arg {position} stage={stage}")
                    .expect("write to string cannot fail");
            }
            Node::Call { op, operands } => {
                let operands: Vec<String> = operands.iter().map(|o| o.to_string()).collect();
                if operands.is_empty() {
                    writeln!(&mut out, "  {id} = {op}").expect("write to string cannot fail");
                } else {
                    writeln!(&mut out, "  {id} = {op} {}", operands.join(", "))
                        .expect("write to string cannot fail");
                }
            }
        }
    }
    writeln!(&mut out, "  return {}", program.ret()).expect("write to string cannot fail");
    writeln!(&mut out, "}}  // order = {}", program.order()).expect("write to string cannot fail");
    out
}
