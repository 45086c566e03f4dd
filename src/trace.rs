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

//! Recording programs by running ordinary Rust code on placeholders.
//!
//! A [`Traced`] value stands for a node of the program being recorded;
//! arithmetic on it appends `Call` nodes through the shared
//! [`ProgramBuilder`] instead of computing numbers.
//!
//! ```
//! use frechet::trace::record_function;
//!
//! let program = record_function(1, |x| &x[0] * &x[0] + 1.0).unwrap();
//! assert_eq!(program.base_arity(), 1);
//! ```

use std::cell::RefCell;
use std::ops::{Add, Div, Mul, Neg, Sub};
use std::rc::Rc;

use crate::ir::{MalformedProgram, NodeRef, Op, Program, ProgramBuilder};

type Recorder = Rc<RefCell<ProgramBuilder>>;

/// Graph-backed placeholder for a value of the function being recorded.
#[derive(Clone)]
pub struct Traced {
    recorder: Recorder,
    node: NodeRef,
}

impl std::fmt::Debug for Traced {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Traced({})", self.node)
    }
}

impl Traced {
    pub fn node(&self) -> NodeRef {
        self.node
    }

    /// A constant recorded into the same program.
    pub fn constant(&self, value: f64) -> Traced {
        self.record(Op::constant(value), Vec::new())
    }

    pub fn sin(&self) -> Traced {
        self.unary(Op::Sin)
    }

    pub fn cos(&self) -> Traced {
        self.unary(Op::Cos)
    }

    pub fn exp(&self) -> Traced {
        self.unary(Op::Exp)
    }

    /// Natural logarithm.
    pub fn ln(&self) -> Traced {
        self.unary(Op::Log)
    }

    pub fn sqrt(&self) -> Traced {
        self.unary(Op::Sqrt)
    }

    pub fn abs(&self) -> Traced {
        self.unary(Op::Abs)
    }

    pub fn sign(&self) -> Traced {
        self.unary(Op::Sign)
    }

    pub fn sum(&self) -> Traced {
        self.unary(Op::Sum)
    }

    pub fn zero_like(&self) -> Traced {
        self.unary(Op::ZeroLike)
    }

    /// Element `i` (0-based) of a vector.
    pub fn index(&self, i: usize) -> Traced {
        self.unary(Op::Index(i))
    }

    /// Rotate a vector right by `shift` positions.
    pub fn circshift(&self, shift: isize) -> Traced {
        self.unary(Op::CircShift(shift))
    }

    pub fn dot(&self, other: &Traced) -> Traced {
        self.binary(Op::Dot, other)
    }

    pub fn apply(&self, op: Op, rest: &[&Traced]) -> Traced {
        let mut operands = Vec::with_capacity(rest.len() + 1);
        operands.push(self.node);
        for other in rest {
            self.assert_same_recording(other);
            operands.push(other.node);
        }
        self.record(op, operands)
    }

    fn unary(&self, op: Op) -> Traced {
        self.record(op, vec![self.node])
    }

    fn binary(&self, op: Op, rhs: &Traced) -> Traced {
        self.assert_same_recording(rhs);
        self.record(op, vec![self.node, rhs.node])
    }

    fn record(&self, op: Op, operands: Vec<NodeRef>) -> Traced {
        let node = self.recorder.borrow_mut().call(op, operands);
        Traced {
            recorder: Rc::clone(&self.recorder),
            node,
        }
    }

    fn assert_same_recording(&self, other: &Traced) {
        assert!(
            Rc::ptr_eq(&self.recorder, &other.recorder),
            "placeholders from different recordings cannot be combined"
        );
    }
}

macro_rules! binary_operator {
    ($trait:ident, $method:ident, $op:expr) => {
        impl $trait<&Traced> for &Traced {
            type Output = Traced;
            fn $method(self, rhs: &Traced) -> Traced {
                self.binary($op, rhs)
            }
        }

        impl $trait<Traced> for Traced {
            type Output = Traced;
            fn $method(self, rhs: Traced) -> Traced {
                self.binary($op, &rhs)
            }
        }

        impl $trait<&Traced> for Traced {
            type Output = Traced;
            fn $method(self, rhs: &Traced) -> Traced {
                self.binary($op, rhs)
            }
        }

        impl $trait<Traced> for &Traced {
            type Output = Traced;
            fn $method(self, rhs: Traced) -> Traced {
                self.binary($op, &rhs)
            }
        }

        impl $trait<f64> for &Traced {
            type Output = Traced;
            fn $method(self, rhs: f64) -> Traced {
                let rhs = self.constant(rhs);
                self.binary($op, &rhs)
            }
        }

        impl $trait<f64> for Traced {
            type Output = Traced;
            fn $method(self, rhs: f64) -> Traced {
                let rhs = self.constant(rhs);
                self.binary($op, &rhs)
            }
        }

        impl $trait<&Traced> for f64 {
            type Output = Traced;
            fn $method(self, rhs: &Traced) -> Traced {
                rhs.constant(self).binary($op, rhs)
            }
        }

        impl $trait<Traced> for f64 {
            type Output = Traced;
            fn $method(self, rhs: Traced) -> Traced {
                rhs.constant(self).binary($op, &rhs)
            }
        }
    };
}

binary_operator!(Add, add, Op::Add);
binary_operator!(Sub, sub, Op::Sub);
binary_operator!(Mul, mul, Op::Mul);
binary_operator!(Div, div, Op::Div);

impl Neg for &Traced {
    type Output = Traced;
    fn neg(self) -> Traced {
        self.unary(Op::Neg)
    }
}

impl Neg for Traced {
    type Output = Traced;
    fn neg(self) -> Traced {
        self.unary(Op::Neg)
    }
}

/// Record `f` as a program of `arity` arguments.
pub fn record_function<F>(arity: usize, f: F) -> Result<Program, MalformedProgram>
where
    F: FnOnce(&[Traced]) -> Traced,
{
    try_record_function(arity, |args| Ok::<_, MalformedProgram>(f(args)))
}

/// Like [`record_function`] for bodies that can fail while recording.
pub fn try_record_function<F, E>(arity: usize, f: F) -> Result<Program, E>
where
    F: FnOnce(&[Traced]) -> Result<Traced, E>,
    E: From<MalformedProgram>,
{
    let recorder: Recorder = Rc::new(RefCell::new(ProgramBuilder::new(arity)));
    let args: Vec<Traced> = (0..arity)
        .map(|position| Traced {
            recorder: Rc::clone(&recorder),
            node: recorder.borrow().argument(position),
        })
        .collect();

    let result = f(&args)?;
    assert!(
        Rc::ptr_eq(&result.recorder, &recorder),
        "the recorded function returned a placeholder from another recording"
    );
    let builder = recorder.replace(ProgramBuilder::new(0));
    Ok(builder.finish(result.node)?)
}
