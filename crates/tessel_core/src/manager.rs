//! The transaction manager: owner of the graph under construction.
//!
//! [`TransactionManager`] holds every node, relation and netlist signal
//! created while the user describes hardware. Nodes are created here;
//! their bodies are recorded through a [`ModuleCtx`](crate::ModuleCtx)
//! obtained from [`TransactionManager::module`].

use std::collections::BTreeMap;

use tessel_common::Interner;
use tessel_config::ElaborationConfig;
use tessel_ir::{Arena, Expr, Netlist, SignalId, SignalKind};
use tessel_source::SrcLoc;

use crate::combiner::Combiner;
use crate::errors::ElabError;
use crate::ids::{ModuleId, NodeId};
use crate::layout::Layout;
use crate::node::{MethodInfo, Node, NodeKind, Priority, Relation, TransactionInfo};

/// Handle to a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Transaction(pub(crate) NodeId);

/// Handle to a method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Method(pub(crate) NodeId);

impl Transaction {
    /// The underlying node.
    pub fn id(self) -> NodeId {
        self.0
    }
}

impl Method {
    /// The underlying node.
    pub fn id(self) -> NodeId {
        self.0
    }
}

impl From<Transaction> for NodeId {
    fn from(t: Transaction) -> NodeId {
        t.0
    }
}

impl From<Method> for NodeId {
    fn from(m: Method) -> NodeId {
        m.0
    }
}

/// Declaration of a method's shape and calling discipline.
#[derive(Debug, Clone)]
pub struct MethodDecl {
    name: String,
    input: Layout,
    output: Layout,
    nonexclusive: bool,
    single_caller: bool,
    combiner: Option<Combiner>,
}

impl MethodDecl {
    /// A method named `method`, `method_1`, ... once declared.
    pub fn unnamed() -> Self {
        Self::new("")
    }

    /// A method with empty input and output.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            input: Layout::empty(),
            output: Layout::empty(),
            nonexclusive: false,
            single_caller: false,
            combiner: None,
        }
    }

    /// Sets the argument layout.
    pub fn input(mut self, layout: Layout) -> Self {
        self.input = layout;
        self
    }

    /// Sets the result layout.
    pub fn output(mut self, layout: Layout) -> Self {
        self.output = layout;
        self
    }

    /// Allows several callers in one cycle.
    pub fn nonexclusive(mut self) -> Self {
        self.nonexclusive = true;
        self
    }

    /// Rejects graphs where more than one node calls this method.
    pub fn single_caller(mut self) -> Self {
        self.single_caller = true;
        self
    }

    /// Sets the combiner for simultaneous callers.
    pub fn combiner(mut self, combiner: Combiner) -> Self {
        self.combiner = Some(combiner);
        self
    }
}

/// Assignment domain of a recorded assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Domain {
    Comb,
    Sync,
}

/// An assignment recorded under a guard; lowered to mux chains later.
#[derive(Debug, Clone)]
pub(crate) struct GuardedAssign {
    pub target: SignalId,
    pub guard: Expr,
    pub value: Expr,
    pub domain: Domain,
}

/// Owns the transaction graph and the netlist being built.
pub struct TransactionManager {
    pub(crate) config: ElaborationConfig,
    pub(crate) nodes: Arena<NodeId, Node>,
    pub(crate) relations: Vec<Relation>,
    pub(crate) names: Interner,
    signal_names: Interner,
    pub(crate) netlist: Netlist,
    pub(crate) assigns: Vec<GuardedAssign>,
    next_def_order: u32,
    next_module: u32,
}

impl Default for TransactionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl TransactionManager {
    /// Creates a manager with the default configuration.
    pub fn new() -> Self {
        Self::with_config(ElaborationConfig::default())
    }

    /// Creates a manager with the given configuration.
    pub fn with_config(config: ElaborationConfig) -> Self {
        Self {
            config,
            nodes: Arena::new(),
            relations: Vec::new(),
            names: Interner::new(),
            signal_names: Interner::new(),
            netlist: Netlist::new("top"),
            assigns: Vec::new(),
            next_def_order: 0,
            next_module: 0,
        }
    }

    /// The active configuration.
    pub fn config(&self) -> &ElaborationConfig {
        &self.config
    }

    /// Declares a transaction. Its body is recorded with
    /// [`ModuleCtx::transaction_body`](crate::ModuleCtx::transaction_body).
    /// An empty `name` gets a generated one.
    #[track_caller]
    pub fn transaction(&mut self, name: &str) -> Transaction {
        let loc = SrcLoc::caller();
        let ident = self.names.fresh(or_default_name(name, "transaction"));
        let name = self.names.resolve(ident).to_string();
        let kind = NodeKind::Transaction(TransactionInfo {
            request: self.new_signal(&format!("{name}_request"), 1, SignalKind::Wire, 0),
            runnable: self.new_signal(&format!("{name}_runnable"), 1, SignalKind::Wire, 0),
            grant: self.new_signal(&format!("{name}_grant"), 1, SignalKind::Wire, 0),
        });
        Transaction(self.push_node(ident, loc, kind))
    }

    /// Declares a transaction named `transaction`, `transaction_1`, ...
    #[track_caller]
    pub fn unnamed_transaction(&mut self) -> Transaction {
        self.transaction("")
    }

    /// Declares a method. Its body is recorded with
    /// [`ModuleCtx::method_body`](crate::ModuleCtx::method_body).
    #[track_caller]
    pub fn method(&mut self, decl: MethodDecl) -> Result<Method, ElabError> {
        let loc = SrcLoc::caller();
        let base = or_default_name(&decl.name, "method");
        decl.input.check_width(&format!("input of `{base}`"), loc)?;
        decl.output.check_width(&format!("output of `{base}`"), loc)?;
        let ident = self.names.fresh(base);
        let name = self.names.resolve(ident).to_string();
        let data_in = (!decl.input.is_empty()).then(|| {
            self.new_signal(&format!("{name}_data_in"), decl.input.width(), SignalKind::Wire, 0)
        });
        let data_out = (!decl.output.is_empty()).then(|| {
            self.new_signal(&format!("{name}_data_out"), decl.output.width(), SignalKind::Wire, 0)
        });
        let kind = NodeKind::Method(MethodInfo {
            ready: self.new_signal(&format!("{name}_ready"), 1, SignalKind::Wire, 0),
            run: self.new_signal(&format!("{name}_run"), 1, SignalKind::Wire, 0),
            data_in,
            data_out,
            input: decl.input,
            output: decl.output,
            nonexclusive: decl.nonexclusive,
            single_caller: decl.single_caller,
            combiner: decl.combiner,
            validator: None,
            fused_from: None,
        });
        Ok(Method(self.push_node(ident, loc, kind)))
    }

    pub(crate) fn push_node(&mut self, name: tessel_common::Ident, loc: SrcLoc, kind: NodeKind) -> NodeId {
        self.nodes.alloc_with(|id| Node {
            id,
            name,
            loc,
            def_order: None,
            def_loc: None,
            ctrl_path: None,
            simultaneous: Vec::new(),
            independent: Vec::new(),
            calls: Vec::new(),
            kind,
        })
    }

    /// Forbids `a` and `b` from running in the same cycle.
    #[track_caller]
    pub fn add_conflict(&mut self, a: impl Into<NodeId>, b: impl Into<NodeId>, priority: Priority) {
        self.push_relation(a.into(), b.into(), priority, true, false, SrcLoc::caller());
    }

    /// Prefers `a` over `b` when both could run.
    #[track_caller]
    pub fn schedule_before(&mut self, a: impl Into<NodeId>, b: impl Into<NodeId>) {
        self.push_relation(a.into(), b.into(), Priority::Left, false, false, SrcLoc::caller());
    }

    /// Like [`schedule_before`](Self::schedule_before), without the
    /// definition-order check.
    #[track_caller]
    pub fn schedule_before_silenced(&mut self, a: impl Into<NodeId>, b: impl Into<NodeId>) {
        self.push_relation(a.into(), b.into(), Priority::Left, false, true, SrcLoc::caller());
    }

    fn push_relation(
        &mut self,
        start: NodeId,
        end: NodeId,
        priority: Priority,
        conflict: bool,
        silenced: bool,
        loc: SrcLoc,
    ) {
        self.relations.push(Relation {
            start,
            end,
            priority,
            conflict,
            silenced,
            loc,
        });
    }

    /// Requires `a` to run exactly in the cycles where every one of `others`
    /// runs.
    pub fn simultaneous(&mut self, a: impl Into<NodeId>, others: &[NodeId]) {
        self.nodes[a.into()].simultaneous.extend_from_slice(others);
    }

    /// Requires `a` to run together with one of `others`, never with two of
    /// them.
    pub fn simultaneous_alternatives(&mut self, a: impl Into<NodeId>, others: &[NodeId]) {
        self.simultaneous(a, others);
        if let Some((first, rest)) = others.split_first() {
            self.nodes[*first].independent.extend_from_slice(rest);
        }
    }

    /// Name of a node.
    pub fn name(&self, id: impl Into<NodeId>) -> &str {
        self.names.resolve(self.nodes[id.into()].name)
    }

    /// A node of the graph.
    pub fn node(&self, id: impl Into<NodeId>) -> &Node {
        &self.nodes[id.into()]
    }

    /// Iterates over all nodes in creation order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// IDs of the current transactions, in creation order.
    pub fn transactions(&self) -> Vec<NodeId> {
        self.nodes
            .values()
            .filter(|n| n.is_transaction())
            .map(|n| n.id)
            .collect()
    }

    /// The `request` signal of `t`.
    pub fn request(&self, t: Transaction) -> Expr {
        self.transaction_signal(t, |info| info.request)
    }

    /// The `runnable` signal of `t`.
    pub fn runnable(&self, t: Transaction) -> Expr {
        self.transaction_signal(t, |info| info.runnable)
    }

    /// The `grant` signal of `t`.
    pub fn grant(&self, t: Transaction) -> Expr {
        self.transaction_signal(t, |info| info.grant)
    }

    /// The `ready` signal of `m`.
    pub fn ready(&self, m: Method) -> Expr {
        self.method_signal(m, |info| Some(info.ready))
    }

    /// The `run` signal of `m`.
    pub fn run(&self, m: Method) -> Expr {
        self.method_signal(m, |info| Some(info.run))
    }

    /// The `data_in` bus of `m`; zero-width for an empty input.
    pub fn data_in(&self, m: Method) -> Expr {
        self.method_signal(m, |info| info.data_in)
    }

    /// The `data_out` bus of `m`; zero-width for an empty output.
    pub fn data_out(&self, m: Method) -> Expr {
        self.method_signal(m, |info| info.data_out)
    }

    fn transaction_signal(&self, t: Transaction, pick: impl Fn(&TransactionInfo) -> SignalId) -> Expr {
        match &self.nodes[t.0].kind {
            NodeKind::Transaction(info) => self.read(pick(info)),
            NodeKind::Method(info) => match &info.fused_from {
                Some(origin) => self.read(pick(origin)),
                None => Expr::zero(1),
            },
        }
    }

    fn method_signal(&self, m: Method, pick: impl Fn(&MethodInfo) -> Option<SignalId>) -> Expr {
        self.nodes[m.0]
            .as_method()
            .and_then(pick)
            .map_or_else(|| Expr::zero(0), |id| self.read(id))
    }

    /// Maps each control and data signal to the declaration of the node
    /// that owns it.
    pub(crate) fn signal_owners(&self) -> BTreeMap<SignalId, SrcLoc> {
        let mut owners = BTreeMap::new();
        for node in self.nodes() {
            let mut own = |ids: &[Option<SignalId>]| {
                for id in ids.iter().flatten() {
                    owners.entry(*id).or_insert(node.loc);
                }
            };
            match &node.kind {
                NodeKind::Transaction(info) => {
                    own(&[Some(info.request), Some(info.runnable), Some(info.grant)]);
                }
                NodeKind::Method(info) => {
                    own(&[Some(info.ready), Some(info.run), info.data_in, info.data_out]);
                    if let Some(origin) = &info.fused_from {
                        own(&[Some(origin.runnable)]);
                    }
                }
            }
        }
        owners
    }

    /// Reads a netlist signal.
    pub(crate) fn read(&self, id: SignalId) -> Expr {
        self.netlist.read(id)
    }

    /// Creates a netlist signal with a unique, prefixed name.
    pub(crate) fn new_signal(&mut self, base: &str, width: u32, kind: SignalKind, init: u64) -> SignalId {
        let prefixed = format!("{}{base}", self.config.name_prefix);
        let ident = self.signal_names.fresh(&prefixed);
        let name = self.signal_names.resolve(ident).to_string();
        self.netlist.add_signal(name, width, kind, init)
    }

    /// Drives `target` unconditionally in the combinational domain.
    pub(crate) fn drive(&mut self, target: SignalId, value: Expr) {
        self.assigns.push(GuardedAssign {
            target,
            guard: Expr::one(),
            value,
            domain: Domain::Comb,
        });
    }

    pub(crate) fn alloc_module(&mut self) -> ModuleId {
        let id = ModuleId::from_raw(self.next_module);
        self.next_module += 1;
        id
    }

    pub(crate) fn alloc_def_order(&mut self) -> u32 {
        let order = self.next_def_order;
        self.next_def_order += 1;
        order
    }
}

fn or_default_name<'a>(name: &'a str, default: &'a str) -> &'a str {
    if name.is_empty() {
        default
    } else {
        name
    }
}
