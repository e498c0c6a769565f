//! Control-flow paths.
//!
//! Every `if`/`elif`/`else` chain, `switch` and FSM inside a module takes a
//! fresh *parallel* index at its nesting depth, and each of its arms takes the
//! next *alternative*. The sequence of `(alternative, parallel)` edges from
//! the module top to a point in the code is that point's [`CtrlPath`].
//!
//! Two paths are mutually exclusive exactly when, after a common prefix, they
//! enter different arms of the same chain. Such points can never be active in
//! the same cycle, which is what lets one caller call a method from several
//! places.

use serde::Serialize;

use crate::ids::ModuleId;

/// One step into an arm of a conditional chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct PathEdge {
    /// Which arm of the chain.
    pub alternative: u32,
    /// Which chain at this depth.
    pub parallel: u32,
}

/// A control-flow path inside one module.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct CtrlPath {
    /// The module the path belongs to.
    pub module: ModuleId,
    /// Edges from the module top, outermost first.
    pub edges: Vec<PathEdge>,
}

impl CtrlPath {
    /// The path of the module top.
    pub fn root(module: ModuleId) -> Self {
        Self {
            module,
            edges: Vec::new(),
        }
    }

    /// Returns `true` if code at `self` and at `other` can never run in the
    /// same cycle.
    pub fn exclusive_with(&self, other: &CtrlPath) -> bool {
        if self.module != other.module {
            return false;
        }
        for (a, b) in self.edges.iter().zip(&other.edges) {
            if a == b {
                continue;
            }
            // Different chains at the same depth are independent of each other.
            return a.parallel == b.parallel;
        }
        false
    }
}

/// Tracks the current path while a module body is recorded.
#[derive(Debug, Clone)]
pub struct PathBuilder {
    module: ModuleId,
    edges: Vec<PathEdge>,
    /// Next parallel index per depth; always one longer than `edges`.
    next_parallel: Vec<u32>,
}

impl PathBuilder {
    /// Starts at the top of `module`.
    pub fn new(module: ModuleId) -> Self {
        Self {
            module,
            edges: Vec::new(),
            next_parallel: vec![0],
        }
    }

    /// Allocates the parallel index for a new chain at the current depth.
    pub fn new_chain(&mut self) -> u32 {
        let depth = self.edges.len();
        let parallel = self.next_parallel[depth];
        self.next_parallel[depth] += 1;
        parallel
    }

    /// Enters arm `alternative` of chain `parallel`.
    pub fn push(&mut self, parallel: u32, alternative: u32) {
        self.edges.push(PathEdge {
            alternative,
            parallel,
        });
        self.next_parallel.push(0);
    }

    /// Leaves the innermost arm.
    pub fn pop(&mut self) {
        if self.edges.pop().is_some() {
            self.next_parallel.pop();
        }
    }

    /// Nesting depth.
    pub fn depth(&self) -> usize {
        self.edges.len()
    }

    /// The current path.
    pub fn current(&self) -> CtrlPath {
        CtrlPath {
            module: self.module,
            edges: self.edges.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn m(n: u32) -> ModuleId {
        ModuleId::from_raw(n)
    }

    #[test]
    fn arms_of_one_chain_are_exclusive() {
        let mut b = PathBuilder::new(m(0));
        let chain = b.new_chain();
        b.push(chain, 0);
        let then_path = b.current();
        b.pop();
        b.push(chain, 1);
        let else_path = b.current();
        b.pop();
        assert!(then_path.exclusive_with(&else_path));
        assert!(else_path.exclusive_with(&then_path));
    }

    #[test]
    fn separate_chains_are_not_exclusive() {
        let mut b = PathBuilder::new(m(0));
        let first = b.new_chain();
        b.push(first, 0);
        let p1 = b.current();
        b.pop();
        let second = b.new_chain();
        b.push(second, 1);
        let p2 = b.current();
        b.pop();
        assert_ne!(first, second);
        assert!(!p1.exclusive_with(&p2));
    }

    #[test]
    fn prefix_is_not_exclusive() {
        let mut b = PathBuilder::new(m(0));
        let outer = b.current();
        let chain = b.new_chain();
        b.push(chain, 0);
        let inner = b.current();
        assert!(!outer.exclusive_with(&inner));
        assert!(!inner.exclusive_with(&inner.clone()));
    }

    #[test]
    fn nested_arms_inherit_exclusivity() {
        let mut b = PathBuilder::new(m(0));
        let chain = b.new_chain();
        b.push(chain, 0);
        let nested = b.new_chain();
        b.push(nested, 0);
        let deep = b.current();
        b.pop();
        b.pop();
        b.push(chain, 1);
        let other = b.current();
        assert!(deep.exclusive_with(&other));
    }

    #[test]
    fn different_modules_never_exclusive() {
        let a = CtrlPath {
            module: m(0),
            edges: vec![PathEdge {
                alternative: 0,
                parallel: 0,
            }],
        };
        let b = CtrlPath {
            module: m(1),
            edges: vec![PathEdge {
                alternative: 1,
                parallel: 0,
            }],
        };
        assert!(!a.exclusive_with(&b));
    }

    #[test]
    fn pop_at_root_is_harmless() {
        let mut b = PathBuilder::new(m(0));
        b.pop();
        assert_eq!(b.depth(), 0);
        assert_eq!(b.current(), CtrlPath::root(m(0)));
    }
}
