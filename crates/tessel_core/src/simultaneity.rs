//! Simultaneity resolution.
//!
//! Transactions that must run in the same cycles are collected into groups
//! and each group is fused into one synthetic transaction: the members turn
//! into methods whose `ready` is their old `request` and whose `run` is their
//! old `grant`, and the synthetic transaction calls all of them. Relations on
//! the members carry over to the synthetic transaction because they are
//! lifted through the members' callers.

use std::collections::{BTreeMap, BTreeSet, HashSet, VecDeque};

use serde::Serialize;
use tessel_ir::{Expr, SignalId, SignalKind};
use tessel_source::SrcLoc;

use crate::errors::ElabError;
use crate::ids::NodeId;
use crate::layout::Layout;
use crate::manager::TransactionManager;
use crate::method_map::MethodMap;
use crate::node::{CallSite, MethodInfo, NodeKind, TransactionInfo};
use crate::path::CtrlPath;

/// A group of transactions fused into one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FusedGroup {
    /// The synthetic transaction.
    pub transaction: NodeId,
    /// The former transactions, now methods, in creation order.
    pub members: Vec<NodeId>,
}

type Pair = (NodeId, NodeId);

fn pair(a: NodeId, b: NodeId) -> Pair {
    if a < b {
        (a, b)
    } else {
        (b, a)
    }
}

/// Independence between transactions, either declared by the user or
/// implied by a shared exclusive method.
#[derive(Debug, Default)]
struct Independence {
    declared: HashSet<Pair>,
    derived: HashSet<Pair>,
}

impl Independence {
    fn collect(tm: &TransactionManager, map: &MethodMap) -> Self {
        let mut indep = Independence::default();
        for node in tm.nodes() {
            if node.independent.is_empty() {
                continue;
            }
            let mut set: Vec<NodeId> = map.transactions_for(tm, node.id);
            for other in &node.independent {
                set.extend(map.transactions_for(tm, *other));
            }
            for (i, a) in set.iter().enumerate() {
                for b in &set[i + 1..] {
                    if a != b {
                        indep.declared.insert(pair(*a, *b));
                    }
                }
            }
        }
        for node in tm.nodes() {
            let Some(info) = node.as_method() else {
                continue;
            };
            if info.nonexclusive {
                continue;
            }
            let users = map.transactions_by_method(node.id);
            for (i, a) in users.iter().enumerate() {
                for b in &users[i + 1..] {
                    indep.derived.insert(pair(*a, *b));
                }
            }
        }
        indep
    }

    fn contains(&self, a: NodeId, b: NodeId) -> bool {
        let key = pair(a, b);
        self.declared.contains(&key) || self.derived.contains(&key)
    }

    fn conflicting(&self, group: &BTreeSet<NodeId>) -> bool {
        group
            .iter()
            .any(|a| group.range(..*a).any(|b| self.contains(*a, *b)))
    }
}

/// Removes non-conflict priority relations between entities declared
/// simultaneous with each other.
pub(crate) fn prune_orderings(tm: &mut TransactionManager) {
    let before = tm.relations.len();
    let nodes = &tm.nodes;
    tm.relations.retain(|r| {
        r.conflict
            || !(nodes[r.start].simultaneous.contains(&r.end)
                || nodes[r.end].simultaneous.contains(&r.start))
    });
    let pruned = before - tm.relations.len();
    if pruned > 0 {
        log::debug!("pruned {pruned} orderings between simultaneous entities");
    }
}

/// Computes the maximal groups of transactions that must run together.
pub(crate) fn groups(tm: &TransactionManager, map: &MethodMap) -> Result<Vec<Vec<NodeId>>, ElabError> {
    let indep = Independence::collect(tm, map);

    let mut pairs: Vec<BTreeSet<NodeId>> = Vec::new();
    for node in tm.nodes() {
        for other in &node.simultaneous {
            let first = map.transactions_for(tm, node.id);
            let second = map.transactions_for(tm, *other);
            if first.is_empty() || second.is_empty() {
                let missing = if first.is_empty() { node.id } else { *other };
                return Err(ElabError::UnsatisfiableSimultaneity {
                    first: tm.name(node.id).to_string(),
                    second: tm.name(*other).to_string(),
                    reason: format!("`{}` is not reached by any transaction", tm.name(missing)),
                    loc: node.loc,
                });
            }
            for a in &first {
                for b in &second {
                    if a == b {
                        continue;
                    }
                    if indep.declared.contains(&pair(*a, *b)) {
                        return Err(ElabError::IndependenceViolatesSimultaneity {
                            first: tm.name(*a).to_string(),
                            second: tm.name(*b).to_string(),
                            loc: node.loc,
                        });
                    }
                    if indep.derived.contains(&pair(*a, *b)) {
                        return Err(ElabError::UnsatisfiableSimultaneity {
                            first: tm.name(*a).to_string(),
                            second: tm.name(*b).to_string(),
                            reason: "they call the same exclusive method".to_string(),
                            loc: node.loc,
                        });
                    }
                    let group = BTreeSet::from([*a, *b]);
                    if !pairs.contains(&group) {
                        pairs.push(group);
                    }
                }
            }
        }
    }

    let mut closed: Vec<BTreeSet<NodeId>> = Vec::new();
    let mut queue: VecDeque<BTreeSet<NodeId>> = pairs.iter().cloned().collect();
    while let Some(group) = queue.pop_front() {
        if closed.contains(&group) || indep.conflicting(&group) {
            continue;
        }
        for other in &pairs {
            if !group.is_disjoint(other) && !other.is_subset(&group) {
                queue.push_back(group.union(other).copied().collect());
            }
        }
        closed.push(group);
    }

    let maximal: Vec<Vec<NodeId>> = closed
        .iter()
        .filter(|g| !closed.iter().any(|h| h != *g && g.is_subset(h)))
        .map(|g| g.iter().copied().collect())
        .collect();
    Ok(maximal)
}

/// Fuses every group into a synthetic transaction.
pub(crate) fn fuse(tm: &mut TransactionManager, groups: Vec<Vec<NodeId>>) -> Vec<FusedGroup> {
    let mut converted: HashSet<NodeId> = HashSet::new();
    for member in groups.iter().flatten() {
        if converted.insert(*member) {
            convert_to_method(tm, *member);
        }
    }

    // A member of overlapping groups is runnable when any of its fused
    // transactions is, so each old `runnable` is driven once at the end.
    let mut fused_by: BTreeMap<NodeId, Vec<SignalId>> = BTreeMap::new();
    let mut fused = Vec::with_capacity(groups.len());
    for members in groups {
        let base = members
            .iter()
            .map(|m| tm.name(*m).to_string())
            .collect::<Vec<_>>()
            .join("_");
        let ident = tm.names.fresh(&base);
        let name = tm.names.resolve(ident).to_string();
        let info = TransactionInfo {
            request: tm.new_signal(&format!("{name}_request"), 1, SignalKind::Wire, 0),
            runnable: tm.new_signal(&format!("{name}_runnable"), 1, SignalKind::Wire, 0),
            grant: tm.new_signal(&format!("{name}_grant"), 1, SignalKind::Wire, 0),
        };
        tm.drive(info.request, Expr::one());
        let module = tm.alloc_module();
        let def_order = members.iter().filter_map(|m| tm.nodes[*m].def_order).min();
        let calls = members
            .iter()
            .map(|m| {
                let site = CallSite {
                    path: CtrlPath::root(module),
                    arg: Expr::zero(0),
                    enable: Expr::one(),
                    loc: SrcLoc::DUMMY,
                };
                (*m, vec![site])
            })
            .collect();
        let loc = tm.nodes[members[0]].loc;
        let id = tm.push_node(ident, loc, NodeKind::Transaction(info.clone()));
        let node = &mut tm.nodes[id];
        node.def_order = def_order;
        node.def_loc = Some(loc);
        node.calls = calls;

        for member in &members {
            fused_by.entry(*member).or_default().push(info.runnable);
        }
        log::debug!("fused {} transactions into `{name}`", members.len());
        fused.push(FusedGroup {
            transaction: id,
            members,
        });
    }

    for (member, runnables) in fused_by {
        let Some(origin) = tm.nodes[member]
            .as_method()
            .and_then(|m| m.fused_from.as_ref())
        else {
            continue;
        };
        let target = origin.runnable;
        let value = Expr::any(runnables.into_iter().map(|r| tm.read(r)));
        tm.drive(target, value);
    }
    fused
}

fn convert_to_method(tm: &mut TransactionManager, id: NodeId) {
    let node = &mut tm.nodes[id];
    let NodeKind::Transaction(info) = &node.kind else {
        return;
    };
    node.kind = NodeKind::Method(MethodInfo {
        input: Layout::empty(),
        output: Layout::empty(),
        ready: info.request,
        run: info.grant,
        data_in: None,
        data_out: None,
        nonexclusive: false,
        single_caller: false,
        combiner: None,
        validator: None,
        fused_from: Some(info.clone()),
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::MethodBody;
    use crate::errors::{E321, E322};
    use crate::manager::{Method, MethodDecl, Transaction};

    fn bodies(tm: &mut TransactionManager, ts: &[Transaction], calls: &[(usize, Method)]) {
        let ts = ts.to_vec();
        let calls = calls.to_vec();
        let methods: Vec<Method> = calls.iter().map(|(_, m)| *m).collect();
        tm.module("top", |cx| {
            let mut defined: Vec<Method> = Vec::new();
            for m in methods {
                if !defined.contains(&m) {
                    cx.method_body(m, MethodBody::new(), |_, _| Ok(Expr::zero(0)))?;
                    defined.push(m);
                }
            }
            for (i, t) in ts.iter().enumerate() {
                cx.transaction_body(*t, Expr::one(), |cx| {
                    for (_, m) in calls.iter().filter(|(j, _)| *j == i) {
                        cx.call(*m, Expr::zero(0))?;
                    }
                    Ok(())
                })?;
            }
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn pairs_close_transitively() {
        let mut tm = TransactionManager::new();
        let a = tm.transaction("a");
        let b = tm.transaction("b");
        let c = tm.transaction("c");
        bodies(&mut tm, &[a, b, c], &[]);
        tm.simultaneous(a, &[b.id()]);
        tm.simultaneous(b, &[c.id()]);
        let map = MethodMap::build(&tm).unwrap();
        let groups = groups(&tm, &map).unwrap();
        assert_eq!(groups, vec![vec![a.id(), b.id(), c.id()]]);
    }

    #[test]
    fn alternatives_stay_apart() {
        let mut tm = TransactionManager::new();
        let a = tm.transaction("a");
        let b = tm.transaction("b");
        let c = tm.transaction("c");
        bodies(&mut tm, &[a, b, c], &[]);
        tm.simultaneous_alternatives(a, &[b.id(), c.id()]);
        let map = MethodMap::build(&tm).unwrap();
        let mut groups = groups(&tm, &map).unwrap();
        groups.sort();
        assert_eq!(groups, vec![vec![a.id(), b.id()], vec![a.id(), c.id()]]);
    }

    #[test]
    fn declared_independence_violation() {
        let mut tm = TransactionManager::new();
        let a = tm.transaction("a");
        let b = tm.transaction("b");
        bodies(&mut tm, &[a, b], &[]);
        tm.simultaneous(a, &[b.id()]);
        tm.nodes[a.id()].independent.push(b.id());
        let map = MethodMap::build(&tm).unwrap();
        assert_eq!(groups(&tm, &map).unwrap_err().code(), E322);
    }

    #[test]
    fn shared_exclusive_method_is_unsatisfiable() {
        let mut tm = TransactionManager::new();
        let m = tm.method(MethodDecl::new("m")).unwrap();
        let a = tm.transaction("a");
        let b = tm.transaction("b");
        bodies(&mut tm, &[a, b], &[(0, m), (1, m)]);
        tm.simultaneous(a, &[b.id()]);
        let map = MethodMap::build(&tm).unwrap();
        assert_eq!(groups(&tm, &map).unwrap_err().code(), E321);
    }

    #[test]
    fn unreached_method_is_unsatisfiable() {
        let mut tm = TransactionManager::new();
        let m = tm.method(MethodDecl::new("m")).unwrap();
        let a = tm.transaction("a");
        bodies(&mut tm, &[a], &[]);
        tm.module("extra", |cx| {
            cx.method_body(m, MethodBody::new(), |_, _| Ok(Expr::zero(0)))
        })
        .unwrap();
        tm.simultaneous(a, &[m.id()]);
        let map = MethodMap::build(&tm).unwrap();
        let err = groups(&tm, &map).unwrap_err();
        assert_eq!(err.code(), E321);
        assert!(err.to_string().contains("not reached"));
    }

    #[test]
    fn prune_drops_orderings_only() {
        let mut tm = TransactionManager::new();
        let a = tm.transaction("a");
        let b = tm.transaction("b");
        tm.schedule_before(a, b);
        tm.add_conflict(a, b, crate::Priority::Left);
        tm.simultaneous(b, &[a.id()]);
        prune_orderings(&mut tm);
        assert_eq!(tm.relations.len(), 1);
        assert!(tm.relations[0].conflict);
    }

    #[test]
    fn fusion_rewrites_members() {
        let mut tm = TransactionManager::new();
        let a = tm.transaction("a");
        let b = tm.transaction("b");
        bodies(&mut tm, &[a, b], &[]);
        let fused = fuse(&mut tm, vec![vec![a.id(), b.id()]]);
        assert_eq!(fused.len(), 1);
        let group = &fused[0];
        assert_eq!(tm.name(group.transaction), "a_b");
        assert_eq!(tm.transactions(), vec![group.transaction]);
        let member = tm.node(a).as_method().unwrap();
        assert!(member.fused_from.is_some());
        assert_eq!(tm.node(group.transaction).calls.len(), 2);
        assert_eq!(tm.node(group.transaction).def_order, Some(0));
        // The handle still reads the old grant.
        assert_eq!(tm.grant(a), tm.run(Method(a.id())));
    }
}
