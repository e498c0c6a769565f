//! The transaction graph: transactions, methods, call sites and relations.
//!
//! Transactions and methods share a [`Node`] header (name, definition order,
//! declaration site, simultaneity lists, recorded calls) and differ in the
//! [`NodeKind`] tail that holds their control signals. Nodes refer to each
//! other only by [`NodeId`].

use std::fmt;
use std::rc::Rc;

use serde::Serialize;
use tessel_common::Ident;
use tessel_ir::{Expr, SignalId};
use tessel_source::SrcLoc;

use crate::combiner::Combiner;
use crate::ids::NodeId;
use crate::layout::Layout;
use crate::path::CtrlPath;

/// Scheduling preference attached to a [`Relation`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Priority {
    /// No preference.
    Undefined,
    /// `start` wins over `end`.
    Left,
    /// `end` wins over `start`.
    Right,
}

/// A recorded relation between two nodes.
#[derive(Debug, Clone, Serialize)]
pub struct Relation {
    /// First node.
    pub start: NodeId,
    /// Second node.
    pub end: NodeId,
    /// Which side is preferred.
    pub priority: Priority,
    /// Whether the two sides may not run in the same cycle.
    pub conflict: bool,
    /// Skip the definition-order check for this relation.
    pub silenced: bool,
    /// Where the relation was declared.
    pub loc: SrcLoc,
}

/// One call of a method from a caller's body.
#[derive(Debug, Clone)]
pub struct CallSite {
    /// Control-flow path of the call.
    pub path: CtrlPath,
    /// Argument, already sized to the callee's input.
    pub arg: Expr,
    /// Single-bit enable, including the enclosing branch conditions.
    pub enable: Expr,
    /// Where the call was made.
    pub loc: SrcLoc,
}

/// Checks the arguments of every call of a method.
///
/// The function receives a caller's argument and returns a single-bit
/// expression that must hold for the call to be allowed.
#[derive(Clone)]
pub struct Validator(Rc<dyn Fn(&Expr) -> Expr>);

impl Validator {
    /// Wraps a validation function.
    pub fn new(f: impl Fn(&Expr) -> Expr + 'static) -> Self {
        Self(Rc::new(f))
    }

    /// Applies the validator to `arg`.
    pub fn validate(&self, arg: &Expr) -> Expr {
        (self.0)(arg).any_bit()
    }
}

impl fmt::Debug for Validator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Validator(..)")
    }
}

/// Control signals of a transaction.
#[derive(Debug, Clone)]
pub struct TransactionInfo {
    /// Set by the body: the transaction wants to run.
    pub request: SignalId,
    /// Set by wiring: every method it calls is ready.
    pub runnable: SignalId,
    /// Set by the scheduler: the transaction runs this cycle.
    pub grant: SignalId,
}

/// Control and data signals of a method.
#[derive(Debug, Clone)]
pub struct MethodInfo {
    /// Argument shape.
    pub input: Layout,
    /// Result shape.
    pub output: Layout,
    /// Set by the body: the method may be called.
    pub ready: SignalId,
    /// Set by wiring: the method is called this cycle.
    pub run: SignalId,
    /// Argument bus, absent for an empty input layout.
    pub data_in: Option<SignalId>,
    /// Result bus, absent for an empty output layout.
    pub data_out: Option<SignalId>,
    /// Several callers may call it in one cycle.
    pub nonexclusive: bool,
    /// At most one caller is allowed.
    pub single_caller: bool,
    /// Merges arguments of simultaneous callers.
    pub combiner: Option<Combiner>,
    /// Per-call argument check, set by the body.
    pub validator: Option<Validator>,
    /// Signals of the transaction this method was fused from, if any.
    pub fused_from: Option<TransactionInfo>,
}

/// The variant-specific part of a [`Node`].
#[derive(Debug, Clone)]
pub enum NodeKind {
    /// A top-level unit of work.
    Transaction(TransactionInfo),
    /// A callable unit of work.
    Method(MethodInfo),
}

/// A transaction or a method.
#[derive(Debug, Clone)]
pub struct Node {
    /// This node's ID.
    pub id: NodeId,
    /// Unique name.
    pub name: Ident,
    /// Where the node was declared.
    pub loc: SrcLoc,
    /// Position in definition order, set when the body is first opened.
    pub def_order: Option<u32>,
    /// Where the body was opened.
    pub def_loc: Option<SrcLoc>,
    /// Path at which the body was opened.
    pub ctrl_path: Option<CtrlPath>,
    /// Nodes that must run in the same cycles as this one.
    pub simultaneous: Vec<NodeId>,
    /// Nodes that must never be fused with each other or this one.
    pub independent: Vec<NodeId>,
    /// Called methods with their call sites, in first-call order.
    pub calls: Vec<(NodeId, Vec<CallSite>)>,
    /// Variant-specific data.
    pub kind: NodeKind,
}

impl Node {
    /// Returns `true` for transactions.
    pub fn is_transaction(&self) -> bool {
        matches!(self.kind, NodeKind::Transaction(_))
    }

    /// Method data, if this is a method.
    pub fn as_method(&self) -> Option<&MethodInfo> {
        match &self.kind {
            NodeKind::Method(info) => Some(info),
            NodeKind::Transaction(_) => None,
        }
    }

    /// Transaction data, if this is a transaction.
    pub fn as_transaction(&self) -> Option<&TransactionInfo> {
        match &self.kind {
            NodeKind::Transaction(info) => Some(info),
            NodeKind::Method(_) => None,
        }
    }

    /// Returns `true` once the body has been opened.
    pub fn is_defined(&self) -> bool {
        self.def_order.is_some()
    }

    /// Returns `true` for nonexclusive methods.
    pub fn is_nonexclusive(&self) -> bool {
        self.as_method().is_some_and(|m| m.nonexclusive)
    }

    /// The signal that is high while this node's body executes: `grant` for
    /// transactions, `run` for methods.
    pub fn activator(&self) -> SignalId {
        match &self.kind {
            NodeKind::Transaction(info) => info.grant,
            NodeKind::Method(info) => info.run,
        }
    }

    /// Call sites of `callee` in this node's body.
    pub fn sites_to(&self, callee: NodeId) -> &[CallSite] {
        self.calls
            .iter()
            .find(|(id, _)| *id == callee)
            .map_or(&[], |(_, sites)| sites.as_slice())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::ModuleId;

    fn method_node() -> Node {
        Node {
            id: NodeId::from_raw(0),
            name: Ident::from_raw(0),
            loc: SrcLoc::DUMMY,
            def_order: None,
            def_loc: None,
            ctrl_path: None,
            simultaneous: Vec::new(),
            independent: Vec::new(),
            calls: Vec::new(),
            kind: NodeKind::Method(MethodInfo {
                input: Layout::empty(),
                output: Layout::empty(),
                ready: SignalId::from_raw(0),
                run: SignalId::from_raw(1),
                data_in: None,
                data_out: None,
                nonexclusive: true,
                single_caller: false,
                combiner: None,
                validator: None,
                fused_from: None,
            }),
        }
    }

    #[test]
    fn method_accessors() {
        let node = method_node();
        assert!(!node.is_transaction());
        assert!(node.as_transaction().is_none());
        assert!(node.is_nonexclusive());
        assert!(!node.is_defined());
        assert_eq!(node.activator(), SignalId::from_raw(1));
    }

    #[test]
    fn sites_lookup() {
        let mut node = method_node();
        let callee = NodeId::from_raw(5);
        assert!(node.sites_to(callee).is_empty());
        node.calls.push((
            callee,
            vec![CallSite {
                path: CtrlPath::root(ModuleId::from_raw(0)),
                arg: Expr::zero(0),
                enable: Expr::one(),
                loc: SrcLoc::DUMMY,
            }],
        ));
        assert_eq!(node.sites_to(callee).len(), 1);
    }

    #[test]
    fn validator_reduces_to_bit() {
        let v = Validator::new(|arg| arg.clone());
        assert_eq!(v.validate(&Expr::constant(4, 3)), Expr::one());
        assert_eq!(format!("{v:?}"), "Validator(..)");
    }
}
