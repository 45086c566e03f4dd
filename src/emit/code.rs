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

use std::fmt;
use std::sync::Arc;

use crate::ir::{NodeRef, Op};

/// Name of an emitted binding or parameter, numbered in emission order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Symbol(pub usize);

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s{}", self.0)
    }
}

/// A closure parameter and the argument node it binds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    pub symbol: Symbol,
    pub node: NodeRef,
}

/// `let symbol = op(args...)`, emitted for `node`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    pub symbol: Symbol,
    pub node: NodeRef,
    pub op: Op,
    pub args: Vec<Symbol>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScopeBody {
    /// Innermost scope: yield the value bound to the symbol.
    Return(Symbol),
    /// Yield a closure over the next stage.
    Closure(Arc<Scope>),
}

/// One closure level: its parameters, its bindings in execution order and
/// what it yields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scope {
    pub stage: usize,
    pub params: Vec<Param>,
    pub bindings: Vec<Binding>,
    pub body: ScopeBody,
}

impl Scope {
    pub fn inner(&self) -> Option<&Arc<Scope>> {
        match &self.body {
            ScopeBody::Closure(inner) => Some(inner),
            ScopeBody::Return(_) => None,
        }
    }
}

/// Nested-closure expression produced by [`emit`](super::emit).
///
/// Evaluating the outer closure at the base arguments yields a closure per
/// tangent stage; the innermost one returns the program's result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeExpression {
    root: Arc<Scope>,
    symbols: usize,
}

impl CodeExpression {
    pub(crate) fn new(root: Arc<Scope>, symbols: usize) -> Self {
        Self { root, symbols }
    }

    pub fn root(&self) -> &Arc<Scope> {
        &self.root
    }

    /// Number of symbols used; symbols are `s1..=s{symbol_count}`.
    pub fn symbol_count(&self) -> usize {
        self.symbols
    }

    /// Scopes from the outermost (stage 0) inwards.
    pub fn scopes(&self) -> impl Iterator<Item = &Scope> + '_ {
        let mut next: Option<&Scope> = Some(self.root.as_ref());
        std::iter::from_fn(move || {
            let current = next?;
            next = current.inner().map(|inner| inner.as_ref());
            Some(current)
        })
    }

    pub fn scope(&self, stage: usize) -> Option<&Scope> {
        self.scopes().nth(stage)
    }

    /// Number of nested closures below the outer one.
    pub fn order(&self) -> usize {
        self.scopes().count() - 1
    }

    pub fn bindings(&self) -> impl Iterator<Item = &Binding> + '_ {
        self.scopes().flat_map(|scope| scope.bindings.iter())
    }
}

impl fmt::Display for CodeExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_scope(f, &self.root, 0)?;
        writeln!(f)
    }
}

fn write_scope(f: &mut fmt::Formatter<'_>, scope: &Scope, depth: usize) -> fmt::Result {
    let pad = "    ".repeat(depth + 1);
    let params: Vec<String> = scope.params.iter().map(|p| p.symbol.to_string()).collect();
    if depth > 0 {
        f.write_str("move ")?;
    }
    writeln!(f, "|{}| {{", params.join(", "))?;
    for binding in &scope.bindings {
        let args: Vec<String> = binding.args.iter().map(|a| a.to_string()).collect();
        writeln!(f, "{pad}let {} = {}({});", binding.symbol, binding.op, args.join(", "))?;
    }
    match &scope.body {
        ScopeBody::Return(symbol) => writeln!(f, "{pad}{symbol}")?,
        ScopeBody::Closure(inner) => {
            f.write_str(&pad)?;
            write_scope(f, inner, depth + 1)?;
            writeln!(f)?;
        }
    }
    write!(f, "{}}}", "    ".repeat(depth))
}
