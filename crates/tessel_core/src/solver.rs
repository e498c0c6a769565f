//! Conflict and priority analysis.
//!
//! The solver lifts every relation and every shared method call to the
//! transactions involved, producing an undirected conflict graph and a
//! directed priority graph. The priority graph is sorted into `porder` and
//! the conflict graph is split into connected components, each of which gets
//! its own arbiter.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet};

use petgraph::algo::tarjan_scc;
use petgraph::graphmap::{DiGraphMap, UnGraphMap};
use petgraph::unionfind::UnionFind;
use tessel_config::OrderPolicy;
use tessel_diagnostics::DiagnosticSink;
use tessel_source::SrcLoc;

use crate::errors::{warning_schedule_order, ElabError};
use crate::ids::NodeId;
use crate::manager::TransactionManager;
use crate::method_map::MethodMap;
use crate::node::Priority;

/// Result of conflict and priority analysis.
#[derive(Debug, Clone)]
pub struct Solution {
    /// Every transaction, highest priority first.
    pub porder: Vec<NodeId>,
    /// The conflict graph.
    pub conflicts: UnGraphMap<NodeId, ()>,
    /// Connected components of the conflict graph, each in `porder`.
    pub components: Vec<Vec<NodeId>>,
}

impl Solution {
    /// Returns `true` if `a` and `b` may not run in the same cycle.
    pub fn conflict(&self, a: NodeId, b: NodeId) -> bool {
        self.conflicts.contains_edge(a, b)
    }

    /// Conflict edges as pairs in `porder`, sorted.
    pub fn conflict_pairs(&self) -> Vec<(NodeId, NodeId)> {
        let rank = self.rank();
        let mut pairs: Vec<(NodeId, NodeId)> = self
            .conflicts
            .all_edges()
            .map(|(a, b, _)| if rank[&a] <= rank[&b] { (a, b) } else { (b, a) })
            .collect();
        pairs.sort_by_key(|(a, b)| (rank[a], rank[b]));
        pairs
    }

    fn rank(&self) -> HashMap<NodeId, usize> {
        self.porder.iter().enumerate().map(|(i, t)| (*t, i)).collect()
    }
}

struct Solver<'a> {
    tm: &'a TransactionManager,
    map: &'a MethodMap,
    transactions: Vec<NodeId>,
}

/// Analyses the transactions of `tm`.
pub(crate) fn solve(
    tm: &TransactionManager,
    map: &MethodMap,
    sink: &DiagnosticSink,
) -> Result<Solution, ElabError> {
    let solver = Solver {
        tm,
        map,
        transactions: tm.transactions(),
    };
    solver.check_order(sink)?;
    let conflicts = solver.conflict_graph();
    let priorities = solver.priority_graph();
    let porder = solver.sort(&priorities)?;
    let components = components(&porder, &conflicts);
    log::debug!(
        "conflict graph: {} transactions, {} edges, {} components",
        porder.len(),
        conflicts.edge_count(),
        components.len()
    );
    Ok(Solution {
        porder,
        conflicts,
        components,
    })
}

impl Solver<'_> {
    /// Checks `schedule_before` relations against definition order.
    fn check_order(&self, sink: &DiagnosticSink) -> Result<(), ElabError> {
        for r in &self.tm.relations {
            if r.conflict || r.silenced || r.priority != Priority::Left {
                continue;
            }
            let (Some(start), Some(end)) = (
                self.tm.node(r.start).def_order,
                self.tm.node(r.end).def_order,
            ) else {
                continue;
            };
            if end >= start {
                continue;
            }
            let before = self.tm.name(r.start);
            let after = self.tm.name(r.end);
            match self.tm.config.schedule_order {
                OrderPolicy::Error => {
                    return Err(ElabError::ScheduleOrder {
                        before: before.to_string(),
                        after: after.to_string(),
                        loc: r.loc,
                    })
                }
                OrderPolicy::Warn => sink.emit(warning_schedule_order(before, after, r.loc)),
                OrderPolicy::Allow => {}
            }
        }
        Ok(())
    }

    fn statically_exclusive(&self, t1: NodeId, t2: NodeId) -> bool {
        let paths = |t: NodeId| {
            std::iter::once(t)
                .chain(self.map.methods_by_transaction(t).iter().copied())
                .filter_map(|n| self.tm.node(n).ctrl_path.as_ref())
                .collect::<Vec<_>>()
        };
        let second = paths(t2);
        paths(t1)
            .iter()
            .any(|p1| second.iter().any(|p2| p1.exclusive_with(p2)))
    }

    /// Whether the chains of `t1` and `t2` to `m` merge at a nonexclusive
    /// method.
    fn merges_nonexclusive(&self, t1: NodeId, t2: NodeId, m: NodeId) -> bool {
        let a1 = self.map.ancestors_by_call(t1, m);
        let a2 = self.map.ancestors_by_call(t2, m);
        a1.iter()
            .zip(a2)
            .take_while(|(x, y)| x == y)
            .last()
            .is_some_and(|(x, _)| self.tm.node(*x).is_nonexclusive())
    }

    fn conflict_graph(&self) -> UnGraphMap<NodeId, ()> {
        let mut graph = UnGraphMap::new();
        for t in &self.transactions {
            graph.add_node(*t);
        }
        let mut exclusive_cache: HashMap<(NodeId, NodeId), bool> = HashMap::new();
        let mut exclusive = |a: NodeId, b: NodeId| {
            let key = if a < b { (a, b) } else { (b, a) };
            *exclusive_cache
                .entry(key)
                .or_insert_with(|| self.statically_exclusive(a, b))
        };

        for node in self.tm.nodes() {
            if node.is_transaction() {
                continue;
            }
            let users = self.map.transactions_by_method(node.id);
            for (i, t1) in users.iter().enumerate() {
                for t2 in &users[i + 1..] {
                    if self.merges_nonexclusive(*t1, *t2, node.id) || exclusive(*t1, *t2) {
                        continue;
                    }
                    log::trace!(
                        "`{}` and `{}` conflict on `{}`",
                        self.tm.name(*t1),
                        self.tm.name(*t2),
                        self.tm.name(node.id)
                    );
                    graph.add_edge(*t1, *t2, ());
                }
            }
        }

        for r in self.tm.relations.iter().filter(|r| r.conflict) {
            for t1 in self.map.transactions_for(self.tm, r.start) {
                for t2 in self.map.transactions_for(self.tm, r.end) {
                    if t1 != t2 && !exclusive(t1, t2) {
                        graph.add_edge(t1, t2, ());
                    }
                }
            }
        }
        graph
    }

    /// Edges point from the preferred transaction to the other one.
    fn priority_graph(&self) -> DiGraphMap<NodeId, SrcLoc> {
        let mut graph = DiGraphMap::new();
        for t in &self.transactions {
            graph.add_node(*t);
        }
        for r in &self.tm.relations {
            let (first, second) = match r.priority {
                Priority::Undefined => continue,
                Priority::Left => (r.start, r.end),
                Priority::Right => (r.end, r.start),
            };
            for t1 in self.map.transactions_for(self.tm, first) {
                for t2 in self.map.transactions_for(self.tm, second) {
                    if t1 != t2 {
                        graph.add_edge(t1, t2, r.loc);
                    }
                }
            }
        }
        graph
    }

    /// Kahn's algorithm, breaking ties by definition order.
    fn sort(&self, graph: &DiGraphMap<NodeId, SrcLoc>) -> Result<Vec<NodeId>, ElabError> {
        let key = |t: NodeId| Reverse((self.tm.node(t).def_order.unwrap_or(u32::MAX), t));
        let mut in_degree: HashMap<NodeId, usize> = graph
            .nodes()
            .map(|n| (n, graph.neighbors_directed(n, petgraph::Incoming).count()))
            .collect();
        let mut ready: BinaryHeap<_> = in_degree
            .iter()
            .filter(|(_, deg)| **deg == 0)
            .map(|(t, _)| key(*t))
            .collect();

        let mut order = Vec::with_capacity(in_degree.len());
        while let Some(Reverse((_, t))) = ready.pop() {
            order.push(t);
            for next in graph.neighbors(t) {
                if let Some(deg) = in_degree.get_mut(&next) {
                    *deg -= 1;
                    if *deg == 0 {
                        ready.push(key(next));
                    }
                }
            }
        }

        if order.len() < in_degree.len() {
            let placed: HashSet<NodeId> = order.iter().copied().collect();
            let cycle = tarjan_scc(graph)
                .into_iter()
                .find(|scc| scc.len() > 1 && scc.iter().all(|t| !placed.contains(t)))
                .unwrap_or_default();
            let mut members = cycle.clone();
            members.sort_by_key(|t| (self.tm.node(*t).def_order, *t));
            let loc = graph
                .all_edges()
                .find(|(a, b, _)| cycle.contains(a) && cycle.contains(b))
                .map_or(SrcLoc::DUMMY, |(_, _, loc)| *loc);
            return Err(ElabError::PriorityCycle {
                members: members
                    .iter()
                    .map(|t| self.tm.name(*t).to_string())
                    .collect(),
                loc,
            });
        }
        Ok(order)
    }
}

/// Splits the conflict graph into connected components, each ordered by
/// `porder`; components are ordered by their first member.
fn components(porder: &[NodeId], conflicts: &UnGraphMap<NodeId, ()>) -> Vec<Vec<NodeId>> {
    let index: HashMap<NodeId, usize> = porder.iter().enumerate().map(|(i, t)| (*t, i)).collect();
    let mut sets = UnionFind::<usize>::new(porder.len());
    for (a, b, _) in conflicts.all_edges() {
        sets.union(index[&a], index[&b]);
    }
    let mut by_root: HashMap<usize, usize> = HashMap::new();
    let mut components: Vec<Vec<NodeId>> = Vec::new();
    for (i, t) in porder.iter().enumerate() {
        let root = sets.find(i);
        let slot = *by_root.entry(root).or_insert_with(|| {
            components.push(Vec::new());
            components.len() - 1
        });
        components[slot].push(*t);
    }
    components
}
