//! A serializable summary of an elaborated schedule.

use std::collections::BTreeMap;

use serde::Serialize;
use tessel_ir::SignalId;
use tessel_source::SrcLoc;

use crate::ids::NodeId;
use crate::manager::TransactionManager;
use crate::node::NodeKind;
use crate::simultaneity::FusedGroup;
use crate::solver::Solution;

/// What a node ended up as after elaboration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeRole {
    /// A scheduled transaction.
    Transaction,
    /// A method.
    Method,
    /// A transaction folded into a simultaneity group.
    Fused,
}

/// One node of the elaborated graph.
#[derive(Debug, Clone, Serialize)]
pub struct NodeReport {
    /// Unique name.
    pub name: String,
    /// Role after elaboration.
    pub role: NodeRole,
    /// Definition order, if the body was recorded.
    pub def_order: Option<u32>,
    /// Declaration site.
    pub loc: SrcLoc,
    /// Netlist names of the control and data signals, keyed by role
    /// (`request`, `grant`, `ready`, `run`, ...).
    pub signals: BTreeMap<&'static str, String>,
}

/// A simultaneity group and the transaction it was fused into.
#[derive(Debug, Clone, Serialize)]
pub struct FusedReport {
    /// The synthetic transaction.
    pub transaction: String,
    /// The fused transactions.
    pub members: Vec<String>,
}

/// Scheduling decisions taken during elaboration.
#[derive(Debug, Clone, Serialize)]
pub struct ScheduleReport {
    /// Transactions, highest priority first.
    pub porder: Vec<String>,
    /// Conflicting transaction pairs.
    pub conflicts: Vec<(String, String)>,
    /// Conflict components, each in priority order.
    pub components: Vec<Vec<String>>,
    /// Simultaneity groups.
    pub fused: Vec<FusedReport>,
    /// Every node, in creation order.
    pub nodes: Vec<NodeReport>,
}

impl ScheduleReport {
    pub(crate) fn new(tm: &TransactionManager, solution: &Solution, fused: &[FusedGroup]) -> Self {
        let name = |id: NodeId| tm.name(id).to_string();
        let signal = |id: SignalId| tm.netlist.signals[id].name.clone();
        let nodes = tm
            .nodes()
            .map(|node| {
                let mut signals = BTreeMap::new();
                let role = match &node.kind {
                    NodeKind::Transaction(info) => {
                        signals.insert("request", signal(info.request));
                        signals.insert("runnable", signal(info.runnable));
                        signals.insert("grant", signal(info.grant));
                        NodeRole::Transaction
                    }
                    NodeKind::Method(info) => {
                        signals.insert("ready", signal(info.ready));
                        signals.insert("run", signal(info.run));
                        if let Some(id) = info.data_in {
                            signals.insert("data_in", signal(id));
                        }
                        if let Some(id) = info.data_out {
                            signals.insert("data_out", signal(id));
                        }
                        match &info.fused_from {
                            Some(origin) => {
                                signals.insert("runnable", signal(origin.runnable));
                                NodeRole::Fused
                            }
                            None => NodeRole::Method,
                        }
                    }
                };
                NodeReport {
                    name: name(node.id),
                    role,
                    def_order: node.def_order,
                    loc: node.loc,
                    signals,
                }
            })
            .collect();

        Self {
            porder: solution.porder.iter().map(|t| name(*t)).collect(),
            conflicts: solution
                .conflict_pairs()
                .into_iter()
                .map(|(a, b)| (name(a), name(b)))
                .collect(),
            components: solution
                .components
                .iter()
                .map(|c| c.iter().map(|t| name(*t)).collect())
                .collect(),
            fused: fused
                .iter()
                .map(|g| FusedReport {
                    transaction: name(g.transaction),
                    members: g.members.iter().map(|m| name(*m)).collect(),
                })
                .collect(),
            nodes,
        }
    }

    /// Position of a transaction in priority order.
    pub fn position(&self, transaction: &str) -> Option<usize> {
        self.porder.iter().position(|t| t == transaction)
    }

    /// Returns `true` if the two transactions conflict.
    pub fn conflict(&self, a: &str, b: &str) -> bool {
        self.conflicts
            .iter()
            .any(|(x, y)| (x == a && y == b) || (x == b && y == a))
    }

    /// Index of the component containing `transaction`.
    pub fn component_of(&self, transaction: &str) -> Option<usize> {
        self.components
            .iter()
            .position(|c| c.iter().any(|t| t == transaction))
    }

    /// Looks up a node by name.
    pub fn node(&self, name: &str) -> Option<&NodeReport> {
        self.nodes.iter().find(|n| n.name == name)
    }

    /// Netlist name of a node's signal, e.g. `signal("t1", "grant")`.
    pub fn signal(&self, node: &str, role: &str) -> Option<&str> {
        self.node(node)?.signals.get(role).map(String::as_str)
    }
}
